use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Arena axis on which a wall contact occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// Inward-pointing unit normal of a wall on this axis (sign is irrelevant
    /// to reflection, which is symmetric in the normal).
    #[inline]
    pub fn normal(self) -> crate::core::Vec2 {
        match self {
            Axis::X => crate::core::Vec2::new(1.0, 0.0),
            Axis::Y => crate::core::Vec2::new(0.0, 1.0),
        }
    }
}

/// Kinds of contact the substep scan can discover.
///
/// Tie-breaking for deterministic ordering prefers `Pair` < `Wall` when
/// times are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    /// Surface contact between particles `first` and `second`.
    Pair { first: usize, second: usize },
    /// Contact between particle `index` and an arena wall on `axis`.
    Wall { index: usize, axis: Axis },
}

impl ContactKind {
    #[inline]
    fn order_key(&self) -> (u8, usize, usize) {
        match *self {
            ContactKind::Pair { first, second } => (0, first, second),
            ContactKind::Wall { index, axis } => (1, index, axis as usize),
        }
    }
}

/// The earliest-impact candidate produced by one substep scan.
///
/// - `toi`: time of impact as a fraction of the substep's remaining time,
///   in `[0, 1)` (finite, non-NaN; 0 marks an already-touching pair).
/// - `kind`: contact kind and participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub toi: NotNan<f64>,
    pub kind: ContactKind,
}

impl Contact {
    /// Create a new contact, validating that the impact time is a finite,
    /// non-negative fraction.
    pub fn new(toi: f64, kind: ContactKind) -> Result<Self> {
        if toi.is_nan() {
            return Err(Error::MathError("impact time cannot be NaN".into()));
        }
        if !toi.is_finite() || toi < 0.0 {
            return Err(Error::MathError(
                "impact time must be finite and non-negative".into(),
            ));
        }
        let toi =
            NotNan::new(toi).map_err(|_| Error::MathError("impact time cannot be NaN".into()))?;
        Ok(Self { toi, kind })
    }

    /// Returns the raw fractional impact time.
    #[inline]
    pub fn toi_f64(&self) -> f64 {
        self.toi.into_inner()
    }
}

impl Ord for Contact {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.toi.cmp(&other.toi) {
            Ordering::Equal => self.kind.order_key().cmp(&other.kind.order_key()),
            o => o,
        }
    }
}

impl PartialOrd for Contact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
