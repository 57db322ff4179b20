//! Staged activation: every phase runs each sector group in a fixed order,
//! then the macro callbacks registered for that phase.

use std::collections::BTreeMap;
use std::fmt;

use econ_core::{FirmGroup, FirmRow, Phase, SimError, SimResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::economy::Economy;

/// RNG stream reserved for iteration-order shuffling.
const SHUFFLE_STREAM: u64 = 1;

/// A named macro aggregation step.
#[derive(Clone, Copy)]
pub struct MacroCallback {
    pub name: &'static str,
    pub run: fn(&mut Economy) -> SimResult<()>,
}

impl MacroCallback {
    pub const fn new(name: &'static str, run: fn(&mut Economy) -> SimResult<()>) -> Self {
        Self { name, run }
    }
}

impl fmt::Debug for MacroCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MacroCallback").field(&self.name).finish()
    }
}

/// Drives the five phases of a step.
///
/// Rows produced by firms are held until the step completes, so an aborted
/// step never reaches a sink.
#[derive(Debug)]
pub struct StagedScheduler {
    groups: [FirmGroup; 2],
    shuffle: bool,
    rng: ChaCha8Rng,
    next_phase: usize,
    steps: u64,
    callbacks: BTreeMap<Phase, Vec<MacroCallback>>,
    pending: Vec<FirmRow>,
}

impl StagedScheduler {
    pub fn new(seed: u64, shuffle: bool) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(SHUFFLE_STREAM);
        Self {
            groups: FirmGroup::ORDER,
            shuffle,
            rng,
            next_phase: 0,
            steps: 0,
            callbacks: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Append a callback to a phase; callbacks run in registration order.
    pub fn register(&mut self, phase: Phase, callback: MacroCallback) {
        self.callbacks.entry(phase).or_default().push(callback);
    }

    /// Completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Phase the next `run_phase` call must request.
    pub fn next_phase(&self) -> Option<Phase> {
        Phase::ALL.get(self.next_phase).copied()
    }

    /// Whether some but not all phases of the current step have run.
    pub fn in_step(&self) -> bool {
        self.next_phase > 0
    }

    pub fn run_phase(&mut self, economy: &mut Economy, phase: Phase) -> SimResult<()> {
        match self.next_phase() {
            Some(expected) if expected == phase => {}
            Some(expected) => return Err(SimError::PhaseOrder { expected, got: phase }),
            None => {
                return Err(SimError::PhaseOrder {
                    expected: Phase::One,
                    got: phase,
                })
            }
        }
        let step = self.steps + 1;
        for group in self.groups {
            let mut ids = economy.population().ids(group);
            if self.shuffle {
                ids.shuffle(&mut self.rng);
            }
            let rows = economy.run_agents(phase, &ids, step)?;
            self.pending.extend(rows);
        }
        if let Some(callbacks) = self.callbacks.get(&phase) {
            for callback in callbacks {
                trace!(%phase, callback = callback.name, "macro callback");
                (callback.run)(economy)?;
            }
        }
        self.next_phase += 1;
        Ok(())
    }

    /// Close a step after phase 5 and hand over its rows.
    pub fn finish_step(&mut self) -> SimResult<Vec<FirmRow>> {
        if let Some(expected) = self.next_phase() {
            return Err(SimError::PhaseOrder {
                expected,
                got: Phase::One,
            });
        }
        self.steps += 1;
        self.next_phase = 0;
        Ok(std::mem::take(&mut self.pending))
    }

    /// Drop the rows of a step that will not complete.
    pub fn abort_step(&mut self) {
        self.pending.clear();
        self.next_phase = 0;
    }

    /// Run all five phases and close the step.
    pub fn step(&mut self, economy: &mut Economy) -> SimResult<Vec<FirmRow>> {
        for phase in Phase::ALL {
            self.run_phase(economy, phase)?;
        }
        self.finish_step()
    }
}
