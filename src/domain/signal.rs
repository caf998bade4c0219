//! Signal stage: market observation to directional signal.
//!
//! Direction comes from the candle body (close vs open). Strength is
//! delegated to a [`StrengthScorer`] so the placeholder random scoring can be
//! swapped for a deterministic one in tests or a real model later.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;
use tracing::debug;

use super::event::{Direction, MarketObservation, Signal};

/// Policy seam between market data and the rest of the pipeline.
pub trait ObservationToSignal {
    fn derive_signal(&mut self, observation: &MarketObservation) -> Option<Signal>;
}

/// Confidence in [0, 1] for a directional observation.
pub trait StrengthScorer {
    fn score(&mut self, observation: &MarketObservation, direction: Direction) -> f64;
}

/// Placeholder scorer: uniform in [0.6, 1.0] for buy/sell, [0.0, 0.4] for hold.
#[derive(Debug, Clone)]
pub struct RandomStrength {
    rng: StdRng,
}

impl RandomStrength {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl StrengthScorer for RandomStrength {
    fn score(&mut self, _observation: &MarketObservation, direction: Direction) -> f64 {
        match direction {
            Direction::Buy | Direction::Sell => self.rng.gen_range(0.6..=1.0),
            Direction::Hold => self.rng.gen_range(0.0..=0.4),
        }
    }
}

/// Same strength for every directional signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedStrength(pub f64);

impl StrengthScorer for FixedStrength {
    fn score(&mut self, _observation: &MarketObservation, direction: Direction) -> f64 {
        match direction {
            Direction::Hold => 0.0,
            _ => self.0,
        }
    }
}

/// |close - open| / (high - low): share of the bar's range covered by the body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyStrength;

impl StrengthScorer for BodyStrength {
    fn score(&mut self, observation: &MarketObservation, _direction: Direction) -> f64 {
        let range = observation.high - observation.low;
        if range <= 0.0 {
            return 0.0;
        }
        (observation.close - observation.open).abs() / range
    }
}

/// Candle-body momentum policy.
#[derive(Debug, Clone)]
pub struct CandleSignal<S> {
    scorer: S,
}

impl<S: StrengthScorer> CandleSignal<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }
}

pub fn classify(observation: &MarketObservation) -> Direction {
    if observation.close > observation.open {
        Direction::Buy
    } else if observation.close < observation.open {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

impl<S: StrengthScorer> ObservationToSignal for CandleSignal<S> {
    fn derive_signal(&mut self, observation: &MarketObservation) -> Option<Signal> {
        let direction = classify(observation);
        if direction == Direction::Hold {
            return None;
        }

        let raw = self.scorer.score(observation, direction);
        let strength = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };

        debug!(
            symbol = %observation.symbol,
            %direction,
            strength,
            "signal generated"
        );

        Some(Signal {
            timestamp: observation.timestamp,
            symbol: observation.symbol.clone(),
            direction,
            strength,
        })
    }
}

impl<T: ObservationToSignal + ?Sized> ObservationToSignal for Box<T> {
    fn derive_signal(&mut self, observation: &MarketObservation) -> Option<Signal> {
        (**self).derive_signal(observation)
    }
}

/// Configurable choice of strength scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScorerKind {
    #[default]
    Random,
    Body,
}

impl FromStr for ScorerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(ScorerKind::Random),
            "body" => Ok(ScorerKind::Body),
            other => Err(format!("unknown signal scorer '{other}' (expected random or body)")),
        }
    }
}

/// Candle policy with the configured scorer. `seed` only affects `Random`.
pub fn build_signal_policy(kind: ScorerKind, seed: Option<u64>) -> Box<dyn ObservationToSignal> {
    match kind {
        ScorerKind::Random => {
            let scorer = match seed {
                Some(seed) => RandomStrength::seeded(seed),
                None => RandomStrength::from_entropy(),
            };
            Box::new(CandleSignal::new(scorer))
        }
        ScorerKind::Body => Box::new(CandleSignal::new(BodyStrength)),
    }
}
