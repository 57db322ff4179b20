#![deny(warnings)]

//! Firm agents of the two-sector economy.
//!
//! Each firm type implements [`PhaseAgent`]: the scheduler calls one method
//! per phase, and a firm only touches its own state. Cross-firm effects
//! (machine orders, result rows) are returned as [`PhaseEffects`] and applied
//! by the runtime after the whole group has run.

use econ_core::{FirmGroup, FirmId, FirmRow, Num, Phase, SimResult};

pub mod base;
pub mod capital;
pub mod consumption;
pub mod context;

pub use base::FirmCore;
pub use capital::CapitalGoodFirm;
pub use consumption::{ConsumptionGoodFirm, VintageStock};
pub use context::{MacroView, Order, PhaseContext, PhaseEffects, SupplierView};

/// Per-phase behavior of a firm. Phases a firm has nothing to do in keep the
/// default no-op.
pub trait PhaseAgent {
    /// Shared state.
    fn core(&self) -> &FirmCore;

    fn phase_one(&mut self, _ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        Ok(PhaseEffects::default())
    }

    fn phase_two(&mut self, _ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        Ok(PhaseEffects::default())
    }

    fn phase_three(&mut self, _ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        Ok(PhaseEffects::default())
    }

    fn phase_four(&mut self, _ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        Ok(PhaseEffects::default())
    }

    /// Every firm records a row in phase 5, bankrupt or not.
    fn phase_five(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects>;

    /// Dispatch by phase. Bankrupt firms sit out phases 1 to 4.
    fn run_phase(&mut self, phase: Phase, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        if self.core().bankrupt && phase != Phase::Five {
            return Ok(PhaseEffects::default());
        }
        match phase {
            Phase::One => self.phase_one(ctx),
            Phase::Two => self.phase_two(ctx),
            Phase::Three => self.phase_three(ctx),
            Phase::Four => self.phase_four(ctx),
            Phase::Five => self.phase_five(ctx),
        }
    }
}

/// Any firm in the population.
#[derive(Clone, Debug)]
pub enum Firm {
    Consumption(ConsumptionGoodFirm),
    Capital(CapitalGoodFirm),
}

impl Firm {
    pub fn core(&self) -> &FirmCore {
        match self {
            Firm::Consumption(f) => &f.core,
            Firm::Capital(f) => &f.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut FirmCore {
        match self {
            Firm::Consumption(f) => &mut f.core,
            Firm::Capital(f) => &mut f.core,
        }
    }

    pub fn id(&self) -> FirmId {
        self.core().id
    }

    pub fn group(&self) -> FirmGroup {
        match self {
            Firm::Consumption(_) => FirmGroup::Consumption,
            Firm::Capital(_) => FirmGroup::Capital,
        }
    }

    pub fn as_consumption(&self) -> Option<&ConsumptionGoodFirm> {
        match self {
            Firm::Consumption(f) => Some(f),
            Firm::Capital(_) => None,
        }
    }

    pub fn as_consumption_mut(&mut self) -> Option<&mut ConsumptionGoodFirm> {
        match self {
            Firm::Consumption(f) => Some(f),
            Firm::Capital(_) => None,
        }
    }

    pub fn as_capital(&self) -> Option<&CapitalGoodFirm> {
        match self {
            Firm::Capital(f) => Some(f),
            Firm::Consumption(_) => None,
        }
    }

    pub fn as_capital_mut(&mut self) -> Option<&mut CapitalGoodFirm> {
        match self {
            Firm::Capital(f) => Some(f),
            Firm::Consumption(_) => None,
        }
    }

    /// Run one phase on whichever firm this is.
    pub fn run_phase(&mut self, phase: Phase, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        match self {
            Firm::Consumption(f) => f.run_phase(phase, ctx),
            Firm::Capital(f) => f.run_phase(phase, ctx),
        }
    }

    /// Current state as a table row.
    pub fn snapshot(&self, step: u64) -> FirmRow {
        match self {
            Firm::Consumption(f) => FirmRow::Consumption(f.snapshot(step)),
            Firm::Capital(f) => FirmRow::Capital(f.snapshot(step)),
        }
    }

    /// New firm of the same kind modeled on this one, with a fresh random
    /// stream. Consumption entrants size their flows from `consumption`.
    pub fn entrant(&self, id: FirmId, consumption: Num, seed: u64) -> SimResult<Firm> {
        Ok(match self {
            Firm::Consumption(f) => Firm::Consumption(f.entrant(id, consumption, seed)),
            Firm::Capital(f) => Firm::Capital(f.entrant(id, seed)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_core::{Machine, Num};

    fn capital() -> Firm {
        Firm::Capital(
            CapitalGoodFirm::new(FirmId(0), Num::ONE, Num::ONE, Num::from(100i64), Num::ONE, 1)
                .unwrap(),
        )
    }

    fn consumption() -> Firm {
        let machine = Machine::new(FirmId(0), 1, Num::from(100i64), Num::ONE).unwrap();
        Firm::Consumption(
            ConsumptionGoodFirm::new(
                FirmId(1),
                Num::ONE,
                Num::from(10i64),
                Num::ONE,
                Some(FirmId(0)),
                &[machine],
                Num::from(100i64),
                2,
            )
            .unwrap(),
        )
    }

    #[test]
    fn enum_exposes_kind_and_core() {
        let c = capital();
        assert_eq!(c.group(), FirmGroup::Capital);
        assert!(c.as_capital().is_some());
        assert!(c.as_consumption().is_none());
        let k = consumption();
        assert_eq!(k.id(), FirmId(1));
        assert_eq!(k.core().group, FirmGroup::Consumption);
    }

    #[test]
    fn snapshot_matches_kind() {
        assert!(matches!(capital().snapshot(0), FirmRow::Capital(_)));
        assert!(matches!(consumption().snapshot(0), FirmRow::Consumption(_)));
    }

    #[test]
    fn entrant_starts_solvent_with_the_incumbents_machines() {
        let mut k = consumption();
        k.core_mut().bankrupt = true;
        k.core_mut().debt_stock = Num::from(40i64);
        let e = k.entrant(FirmId(9), Num::from(1000i64), 3).unwrap();
        assert_eq!(e.id(), FirmId(9));
        assert!(!e.core().bankrupt);
        assert_eq!(e.core().debt_stock, Num::ZERO);
        let e = e.as_consumption().unwrap();
        assert_eq!(e.capital_stock(), Num::from(10i64));
        assert_eq!(e.supplier, None);
        assert_eq!(e.demand, k.core().market_share * Num::from(1000i64));
    }
}
