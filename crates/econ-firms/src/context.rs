//! What a firm sees while running a phase, and what it hands back.

use std::collections::BTreeMap;

use econ_core::{FirmId, FirmRow, Machine, Num, Parameters, SimError, SimResult};

/// Macro variables a firm reads during a phase.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MacroView {
    pub market_wage: Num,
    pub consumption: Num,
    pub labor_supply: Num,
    /// Labor hired by the capital sector this step.
    pub capital_labor_demand: Num,
    /// Upper bound on capital-sector labor: `labor_supply * max_capital_labor_share`.
    pub max_capital_labor: Num,
    pub avg_consumption_competitiveness: Num,
    /// Aggregate investment ordered in phase 2.
    pub investment: Num,
}

/// Snapshot of a capital-good firm as seen by its customers.
#[derive(Clone, Debug, PartialEq)]
pub struct SupplierView {
    pub id: FirmId,
    pub machine: Machine,
    pub unit_production_cost: Num,
    /// Units ordered by customers this step.
    pub orders: Num,
    pub demand: Num,
    pub output: Num,
}

impl SupplierView {
    pub fn price(&self) -> Num {
        self.machine.price()
    }
}

/// Read-only inputs for one firm's phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseContext<'a> {
    pub step: u64,
    pub params: &'a Parameters,
    pub macro_view: &'a MacroView,
    /// Live, solvent capital-good firms.
    pub suppliers: &'a BTreeMap<FirmId, SupplierView>,
}

impl<'a> PhaseContext<'a> {
    /// Resolve a supplier id against the snapshot.
    pub fn supplier(&self, id: FirmId) -> SimResult<&'a SupplierView> {
        self.suppliers.get(&id).ok_or(SimError::UnknownFirm(id))
    }
}

/// Machines ordered from a supplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub supplier: FirmId,
    pub quantity: Num,
}

/// Output of one firm's phase, applied by the scheduler after the group ran.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseEffects {
    pub order: Option<Order>,
    pub row: Option<FirmRow>,
}

impl PhaseEffects {
    pub fn order(order: Order) -> Self {
        Self {
            order: Some(order),
            row: None,
        }
    }

    pub fn row(row: FirmRow) -> Self {
        Self {
            order: None,
            row: Some(row),
        }
    }
}
