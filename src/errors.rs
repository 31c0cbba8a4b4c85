use std::error;
use std::fmt;

/// Errors raised while validating engine configuration.
///
/// All variants are produced synchronously at construction time, before any
/// generation is simulated. A configuration error is fatal to the replicate
/// that attempted the construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Two parallel configuration vectors have different lengths.
    ArityMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A selected region was declared without an effect or dominance model.
    MissingEffectModel { region: usize },
    /// A rate or probability parameter is outside its legal range.
    InvalidRate(&'static str, f64),
    /// A weight vector could not be turned into a discrete sampler.
    InvalidWeights(String),
    /// A required vector was empty.
    Empty(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArityMismatch {
                what,
                expected,
                found,
            } => {
                write!(f, "{what}: expected {expected} entries, found {found}")
            }
            Self::MissingEffectModel { region } => {
                write!(f, "selected region {region} has no effect/dominance model")
            }
            Self::InvalidRate(name, value) => {
                write!(f, "invalid value for {name}: {value}")
            }
            Self::InvalidWeights(msg) => {
                write!(f, "invalid weight vector: {msg}")
            }
            Self::Empty(what) => {
                write!(f, "{what} must not be empty")
            }
        }
    }
}

impl error::Error for ConfigError {}
