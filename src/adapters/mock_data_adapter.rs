//! Synthetic market data.
//!
//! Each symbol follows its own random walk starting at `start_price`, with
//! one bar per calendar day. Bars are generated lazily as the stream is
//! consumed. Tests can swap the walk for any [`PriceWalkGenerator`] via
//! [`MockDataAdapter::with_generators`].

use crate::domain::error::CmfError;
use crate::domain::event::MarketObservation;
use crate::ports::data_port::{DataPort, ObservationStream};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_START_PRICE: f64 = 100.0;
pub const DEFAULT_VOLATILITY: f64 = 0.02;

/// Bar values without timestamp or symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

pub trait PriceWalkGenerator {
    fn next_bar(&mut self) -> SyntheticBar;
}

impl<G: PriceWalkGenerator + ?Sized> PriceWalkGenerator for Box<G> {
    fn next_bar(&mut self) -> SyntheticBar {
        (**self).next_bar()
    }
}

/// Builds the generator for the symbol at a given index.
pub type WalkFactory = Box<dyn Fn(usize) -> Box<dyn PriceWalkGenerator>>;

/// Uniform daily return in `[-volatility, volatility]`, wicks up to half that.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    rng: StdRng,
    price: f64,
    volatility: f64,
}

impl RandomWalk {
    pub fn new(rng: StdRng, start_price: f64, volatility: f64) -> Self {
        Self {
            rng,
            price: start_price,
            volatility: volatility.abs(),
        }
    }
}

impl PriceWalkGenerator for RandomWalk {
    fn next_bar(&mut self) -> SyntheticBar {
        let v = self.volatility;
        let daily_return: f64 = self.rng.gen_range(-v..=v);
        let open = self.price;
        let close = (open * (1.0 + daily_return)).max(f64::MIN_POSITIVE);
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..=v / 2.0));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..=v / 2.0));
        let volume = self.rng.gen_range(1_000.0..=100_000.0_f64).round();

        self.price = close;
        SyntheticBar {
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

pub struct MockDataAdapter {
    start_price: f64,
    volatility: f64,
    seed: Option<u64>,
    generators: Option<WalkFactory>,
}

impl MockDataAdapter {
    pub fn new(start_price: f64, volatility: f64, seed: Option<u64>) -> Self {
        Self {
            start_price,
            volatility,
            seed,
            generators: None,
        }
    }

    /// Drive each symbol with the generator `factory` returns for its index
    /// instead of a [`RandomWalk`].
    pub fn with_generators<F>(factory: F) -> Self
    where
        F: Fn(usize) -> Box<dyn PriceWalkGenerator> + 'static,
    {
        Self {
            generators: Some(Box::new(factory)),
            ..Self::default()
        }
    }

    fn walk_for(&self, index: usize) -> Box<dyn PriceWalkGenerator> {
        if let Some(factory) = &self.generators {
            return factory(index);
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        };
        Box::new(RandomWalk::new(rng, self.start_price, self.volatility))
    }
}

impl Default for MockDataAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_START_PRICE, DEFAULT_VOLATILITY, None)
    }
}

struct WalkStream<G> {
    day: NaiveDate,
    end_date: NaiveDate,
    symbols: Vec<String>,
    walks: Vec<G>,
    next_symbol: usize,
}

impl<G: PriceWalkGenerator> Iterator for WalkStream<G> {
    type Item = Result<MarketObservation, CmfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.symbols.is_empty() || self.day > self.end_date {
            return None;
        }
        let index = self.next_symbol;
        let timestamp = self.day.and_hms_opt(0, 0, 0)?;
        let bar = self.walks[index].next_bar();

        self.next_symbol += 1;
        if self.next_symbol == self.symbols.len() {
            self.next_symbol = 0;
            self.day += Duration::days(1);
        }

        Some(Ok(MarketObservation {
            timestamp,
            symbol: self.symbols[index].clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }))
    }
}

impl DataPort for MockDataAdapter {
    fn stream(
        &self,
        symbols: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ObservationStream<'_>, CmfError> {
        if self.generators.is_none() && !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(CmfError::DataSource {
                reason: format!("mock start price must be positive, got {}", self.start_price),
            });
        }
        let walks: Vec<_> = (0..symbols.len()).map(|i| self.walk_for(i)).collect();
        Ok(Box::new(WalkStream {
            day: start_date,
            end_date,
            symbols: symbols.to_vec(),
            walks,
            next_symbol: 0,
        }))
    }
}
