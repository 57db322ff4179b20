#![deny(warnings)]

//! Core domain types for the two-sector economy simulation.
//!
//! This crate defines the pieces shared by the firm agents and the runtime:
//! - [`Num`], the fixed-precision decimal used for every economic quantity
//! - [`Machine`], the capital-good vintage value object
//! - [`SimConfig`] with validation and YAML loading
//! - result records and the [`RecordSink`] contract, with the in-memory
//!   [`DataCollector`]
//! - the error taxonomy ([`NumError`], [`ConfigError`], [`SimError`])

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod error;
pub mod machine;
pub mod num;
pub mod record;

pub use config::{
    DemandForecast, InitialConditions, Parameters, SimConfig, SocialPolicy, WageSetting,
};
pub use error::{ConfigError, NumError, SimError, SimResult};
pub use machine::{Machine, VintageKey};
pub use num::{Num, SIGNIFICANT_DIGITS};
pub use record::{
    CapitalFirmRow, ConsumptionFirmRow, DataCollector, FirmRow, MacroRecord, RecordSink,
};

/// Identifier of a firm. Ids are unique among live firms.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FirmId(pub u64);

impl FirmId {
    /// The id directly after this one.
    pub fn next(self) -> FirmId {
        FirmId(self.0 + 1)
    }
}

impl fmt::Display for FirmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sector a firm belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmGroup {
    /// Producers of the consumption good.
    Consumption,
    /// Producers of machines.
    Capital,
}

impl FirmGroup {
    /// Order in which groups run within a phase and during exit/entry.
    pub const ORDER: [FirmGroup; 2] = [FirmGroup::Consumption, FirmGroup::Capital];

    /// Table name used by result sinks.
    pub fn as_str(self) -> &'static str {
        match self {
            FirmGroup::Consumption => "consumption_firm",
            FirmGroup::Capital => "capital_firm",
        }
    }
}

impl fmt::Display for FirmGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the five ordered phases of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Price and cost discovery.
    One,
    /// Planning, supplier choice and investment orders.
    Two,
    /// Capital-good production; labor market and wage.
    Three,
    /// Consumption-good production and sales.
    Four,
    /// Settlement, recording, innovation and exit/entry.
    Five,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 5] = [Phase::One, Phase::Two, Phase::Three, Phase::Four, Phase::Five];

    /// Zero-based position within a step.
    pub fn index(self) -> usize {
        match self {
            Phase::One => 0,
            Phase::Two => 1,
            Phase::Three => 2,
            Phase::Four => 3,
            Phase::Five => 4,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index() + 1)
    }
}
