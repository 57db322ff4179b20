//! The step driver that binds an economy and its scheduler to a result sink.

use econ_core::{
    DataCollector, FirmRow, MacroRecord, Phase, RecordSink, SimConfig, SimError, SimResult,
};
use tracing::{debug, info, warn};

use crate::economy::Economy;
use crate::scheduler::StagedScheduler;

/// Outcome of [`Simulation::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Steps completed before the run ended.
    pub completed: u64,
    /// The fault that ended the run early, if any.
    pub fault: Option<SimError>,
}

/// A single deterministic run.
///
/// Construction records the initial state as step 0. Each completed step
/// hands its firm rows and macro record to the sink; a faulted step hands
/// over nothing and halts the run.
#[derive(Debug)]
pub struct Simulation<S: RecordSink = DataCollector> {
    economy: Economy,
    scheduler: StagedScheduler,
    sink: S,
    last_rows: Vec<FirmRow>,
    last_macro: MacroRecord,
    /// Step last handed to the sink.
    collected: Option<u64>,
    halted: bool,
}

impl Simulation<DataCollector> {
    /// Simulation recording into an in-memory [`DataCollector`].
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        Self::new(config, DataCollector::new())
    }
}

impl<S: RecordSink> Simulation<S> {
    pub fn new(config: &SimConfig, sink: S) -> SimResult<Self> {
        let economy = Economy::new(config)?;
        let mut scheduler = StagedScheduler::new(config.seed, config.shuffle);
        for (phase, callback) in Economy::phase_callbacks() {
            scheduler.register(phase, callback);
        }
        let last_rows = economy.snapshot_rows(0);
        let last_macro = economy.macro_record(0);
        let mut sim = Self {
            economy,
            scheduler,
            sink,
            last_rows,
            last_macro,
            collected: None,
            halted: false,
        };
        sim.collect();
        info!(seed = config.seed, shuffle = config.shuffle, "simulation ready");
        Ok(sim)
    }

    /// Advance by one full step. Returns the number of completed steps.
    pub fn step(&mut self) -> SimResult<u64> {
        self.ensure_running()?;
        let result = self.scheduler.step(&mut self.economy);
        self.complete(result)
    }

    /// Run the next phase of the current step on its own.
    pub fn run_phase(&mut self, phase: Phase) -> SimResult<()> {
        self.ensure_running()?;
        self.scheduler
            .run_phase(&mut self.economy, phase)
            .map_err(|e| self.fault(e))
    }

    /// Close a step driven with [`Simulation::run_phase`].
    pub fn finish_step(&mut self) -> SimResult<u64> {
        self.ensure_running()?;
        let result = self.scheduler.finish_step();
        self.complete(result)
    }

    /// Step up to `steps` times, stopping at the first fault.
    pub fn run(&mut self, steps: u64) -> RunReport {
        let start = self.steps();
        for _ in 0..steps {
            if let Err(fault) = self.step() {
                let completed = self.steps() - start;
                info!(%fault, step = self.steps() + 1, "run stopped early");
                return RunReport {
                    completed,
                    fault: Some(fault),
                };
            }
        }
        RunReport {
            completed: steps,
            fault: None,
        }
    }

    /// Hand the latest completed step to the sink. A step already handed
    /// over is not sent again, so append-only sinks see each row once.
    pub fn collect(&mut self) {
        let step = self.last_macro.step;
        if self.collected == Some(step) {
            debug!(step, "step already collected");
            return;
        }
        self.collected = Some(step);
        for row in &self.last_rows {
            self.sink.record_firm(row.clone());
        }
        self.sink.record_macro(self.last_macro.clone());
    }

    pub fn steps(&self) -> u64 {
        self.scheduler.steps()
    }

    /// Phase the next [`Simulation::run_phase`] call must request, or `None`
    /// when the step only needs [`Simulation::finish_step`].
    pub fn next_phase(&self) -> Option<Phase> {
        self.scheduler.next_phase()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn economy(&self) -> &Economy {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut Economy {
        &mut self.economy
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn ensure_running(&self) -> SimResult<()> {
        if self.halted {
            return Err(SimError::Halted);
        }
        Ok(())
    }

    fn complete(&mut self, result: SimResult<Vec<FirmRow>>) -> SimResult<u64> {
        let rows = result.map_err(|e| self.fault(e))?;
        let step = self.scheduler.steps();
        self.last_rows = rows;
        self.last_macro = self.economy.macro_record(step);
        self.collect();
        debug!(
            step,
            gdp = %self.last_macro.gdp,
            wage = %self.last_macro.market_wage,
            "step recorded"
        );
        Ok(step)
    }

    /// Misordered phase requests leave the state untouched; anything else
    /// aborts the step and halts the run.
    fn fault(&mut self, error: SimError) -> SimError {
        if matches!(error, SimError::PhaseOrder { .. }) {
            return error;
        }
        self.scheduler.abort_step();
        self.halted = true;
        warn!(%error, step = self.scheduler.steps() + 1, "simulation fault, run halted");
        error
    }
}
