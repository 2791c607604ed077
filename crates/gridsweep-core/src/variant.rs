use serde::{Deserialize, Serialize};

/// Partitioning strategy under comparison.
///
/// Declaration order is significant: it is the order in which generated runs
/// and aggregated rows are emitted (Optimized before Baseline).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Optimized,
    Baseline,
}

impl Variant {
    pub fn label(&self) -> &'static str {
        match self {
            Variant::Optimized => "Optimized",
            Variant::Baseline => "Baseline",
        }
    }

    /// Single-character tag used in submission lines and aggregate tables.
    pub fn tag(&self) -> &'static str {
        match self {
            Variant::Optimized => "o",
            Variant::Baseline => "c",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "o" => Some(Variant::Optimized),
            "c" => Some(Variant::Baseline),
            _ => None,
        }
    }

    pub fn all() -> &'static [Variant] {
        &[Variant::Optimized, Variant::Baseline]
    }
}

/// Whether a run additionally partitions along a second axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimensionality {
    #[serde(rename = "1d")]
    OneD,
    #[serde(rename = "2d")]
    TwoD,
}

impl Dimensionality {
    pub fn label(&self) -> &'static str {
        match self {
            Dimensionality::OneD => "1D",
            Dimensionality::TwoD => "2D",
        }
    }

    pub fn digit(&self) -> u8 {
        match self {
            Dimensionality::OneD => 1,
            Dimensionality::TwoD => 2,
        }
    }

    pub fn from_digit(digit: &str) -> Option<Self> {
        match digit {
            "1" => Some(Dimensionality::OneD),
            "2" => Some(Dimensionality::TwoD),
            _ => None,
        }
    }

    pub fn all() -> &'static [Dimensionality] {
        &[Dimensionality::OneD, Dimensionality::TwoD]
    }
}
