//! Maps phase-level progress onto a single 0–100 scale.

use crate::strategy::Strategy;

/// Percent boundaries of each phase for one transfer strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseLayout {
    pub hash_start: f64,
    pub hash_end: f64,
    pub prechecked: f64,
    pub initialized: f64,
    pub transfer_start: f64,
    pub transfer_end: f64,
    pub finalizing: f64,
    pub confirming: f64,
}

impl PhaseLayout {
    /// Hashing 5→20, pre-check 25, transfer 30→90, confirm 95.
    pub const SINGLE_SHOT: PhaseLayout = PhaseLayout {
        hash_start: 5.0,
        hash_end: 20.0,
        prechecked: 25.0,
        initialized: 30.0,
        transfer_start: 30.0,
        transfer_end: 90.0,
        finalizing: 90.0,
        confirming: 95.0,
    };

    /// Hashing 5→15, chunks 15→85 (post-hash baseline 15), finalize 90, confirm 95.
    pub const CHUNKED: PhaseLayout = PhaseLayout {
        hash_start: 5.0,
        hash_end: 15.0,
        prechecked: 15.0,
        initialized: 15.0,
        transfer_start: 15.0,
        transfer_end: 85.0,
        finalizing: 90.0,
        confirming: 95.0,
    };

    pub fn for_strategy(strategy: &Strategy) -> PhaseLayout {
        if strategy.is_chunked() {
            Self::CHUNKED
        } else {
            Self::SINGLE_SHOT
        }
    }
}

/// A low-level progress observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressPoint {
    /// Hashing progress in `[0, 100]`.
    Hashing(f64),
    Prechecked,
    Initialized,
    /// `done` of `total` units transferred (bytes or chunks).
    Transfer { done: u64, total: u64 },
    Finalizing,
    Confirming,
    Done,
}

/// Converts observations into an overall percent that never decreases.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    layout: PhaseLayout,
    last: Option<f64>,
}

impl ProgressAggregator {
    pub fn new(layout: PhaseLayout) -> Self {
        Self { layout, last: None }
    }

    pub fn layout(&self) -> &PhaseLayout {
        &self.layout
    }

    /// Overall percent for `point`, ignoring history.
    pub fn percent_for(&self, point: ProgressPoint) -> f64 {
        let l = &self.layout;
        let value = match point {
            ProgressPoint::Hashing(p) => {
                let p = p.clamp(0.0, 100.0);
                l.hash_start + (l.hash_end - l.hash_start) * p / 100.0
            }
            ProgressPoint::Prechecked => l.prechecked,
            ProgressPoint::Initialized => l.initialized,
            ProgressPoint::Transfer { done, total } => {
                let frac = if total == 0 {
                    1.0
                } else {
                    (done as f64 / total as f64).min(1.0)
                };
                l.transfer_start + (l.transfer_end - l.transfer_start) * frac
            }
            ProgressPoint::Finalizing => l.finalizing,
            ProgressPoint::Confirming => l.confirming,
            ProgressPoint::Done => 100.0,
        };
        value.clamp(0.0, 100.0)
    }

    /// Records `point` and returns the new overall percent if it advanced.
    ///
    /// The first observation is always reported; later ones only when they
    /// exceed the highest value reported so far.
    pub fn advance(&mut self, point: ProgressPoint) -> Option<f64> {
        let value = self.percent_for(point);
        match self.last {
            Some(last) if value <= last => None,
            _ => {
                self.last = Some(value);
                Some(value)
            }
        }
    }

    /// Highest percent reported so far (0 before any report).
    pub fn current(&self) -> f64 {
        self.last.unwrap_or(0.0)
    }
}
