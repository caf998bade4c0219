//! Execution venue port trait (live order routing).

use crate::domain::error::CmfError;
use crate::domain::event::Action;

/// Opaque order identifier issued by a venue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderHandle(pub String);

#[derive(Debug, Clone, PartialEq)]
pub enum VenueStatus {
    Pending,
    Filled { price: f64 },
    PartiallyFilled { quantity: f64, price: f64 },
    Rejected { reason: String },
}

pub trait ExecutionVenue {
    fn submit_order(
        &mut self,
        symbol: &str,
        side: Action,
        quantity: f64,
        limit_price: Option<f64>,
    ) -> Result<OrderHandle, CmfError>;

    fn query_status(&mut self, handle: &OrderHandle) -> Result<VenueStatus, CmfError>;
}
