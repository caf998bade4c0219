//! Market data port trait.

use crate::domain::error::CmfError;
use crate::domain::event::MarketObservation;
use chrono::NaiveDate;

/// Lazy, single-pass sequence of observations in timestamp order.
///
/// Item-level errors are recoverable: the driver skips them and moves on.
pub type ObservationStream<'a> =
    Box<dyn Iterator<Item = Result<MarketObservation, CmfError>> + 'a>;

pub trait DataPort {
    /// Open a stream over `symbols` between `start_date` and `end_date`
    /// inclusive. Failing to open the stream at all is fatal for the run.
    fn stream(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ObservationStream<'_>, CmfError>;
}
