//! Error taxonomy shared by every crate of the simulation.

use thiserror::Error;

use crate::{FirmGroup, FirmId, Phase};

/// Result alias used by the agent and runtime crates.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised when constructing a [`crate::Num`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NumError {
    /// The float's binary value differs from its decimal literal.
    #[error("float {0} is not exactly representable as a decimal; convert it explicitly")]
    FloatContamination(f64),
    /// NaN, infinity or out of decimal range.
    #[error("float {0} cannot be represented as a decimal")]
    Unrepresentable(f64),
    /// Text is not a decimal literal.
    #[error("invalid decimal literal: {0}")]
    Parse(String),
}

/// Invalid or missing configuration. Fatal at construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A count or level that must be strictly positive.
    #[error("{field} must be > 0")]
    NonPositive {
        /// Offending option.
        field: &'static str,
    },
    /// A value outside its documented interval.
    #[error("{field} is out of range: {value}")]
    OutOfRange {
        /// Offending option.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
    /// The adaptive demand forecast needs four lag coefficients.
    #[error("betas must hold at least 4 coefficients, got {0}")]
    TooFewBetas(usize),
    /// Innovation draw bounds are reversed.
    #[error("distribution bounds must satisfy lower <= upper")]
    InvalidBounds,
    /// Malformed configuration document.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Errors surfaced by the simulation. Every variant other than `Config` and
/// `Num` is a simulation fault: the step is aborted and the run halts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Float contamination or a bad literal.
    #[error(transparent)]
    Num(#[from] NumError),
    /// Division by zero at a site with no explicit policy.
    #[error("arithmetic degeneracy: zero divisor in {site}")]
    Degenerate {
        /// Computation that hit the zero divisor.
        site: &'static str,
    },
    /// An id that does not resolve to a live firm of the expected kind.
    #[error("unknown firm id {0}")]
    UnknownFirm(FirmId),
    /// Every firm of a sector exited in the same step.
    #[error("every {0} exited; no incumbent left to clone")]
    SectorCollapse(FirmGroup),
    /// Phases were driven out of order.
    #[error("phase {got} requested but phase {expected} is next")]
    PhaseOrder {
        /// Phase the scheduler expects.
        expected: Phase,
        /// Phase that was requested.
        got: Phase,
    },
    /// Stock-flow accounting drifted.
    #[error("accounting invariant violated: {0}")]
    Invariant(String),
    /// A previous step faulted; the run accepts no more steps.
    #[error("simulation halted after an earlier fault")]
    Halted,
}

impl SimError {
    /// Shorthand for [`SimError::Degenerate`].
    pub fn degenerate(site: &'static str) -> Self {
        SimError::Degenerate { site }
    }

    /// Whether this error halts a running simulation.
    pub fn is_fault(&self) -> bool {
        !matches!(self, SimError::Config(_) | SimError::Num(_))
    }
}
