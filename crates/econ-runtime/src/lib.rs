#![deny(warnings)]

//! Simulation runtime: the firm population, the macro economy, the staged
//! scheduler and the step driver.
//!
//! ```no_run
//! use econ_core::SimConfig;
//! use econ_runtime::Simulation;
//!
//! let mut sim = Simulation::from_config(&SimConfig::benchmark())?;
//! let report = sim.run(100);
//! assert!(report.fault.is_none());
//! # Ok::<(), econ_core::SimError>(())
//! ```

pub mod economy;
pub mod population;
pub mod scheduler;
pub mod simulation;

pub use economy::{Economy, MacroState};
pub use population::Population;
pub use scheduler::{MacroCallback, StagedScheduler};
pub use simulation::{RunReport, Simulation};
