//! Capital-good firms: they build one machine generation at a time, fill
//! orders and innovate.

use econ_core::{CapitalFirmRow, FirmGroup, FirmId, FirmRow, Machine, Num, SimResult};
use tracing::{debug, trace};

use crate::base::FirmCore;
use crate::context::{MacroView, PhaseContext, PhaseEffects, SupplierView};
use crate::PhaseAgent;

/// A producer of machines.
#[derive(Clone, Debug)]
pub struct CapitalGoodFirm {
    pub core: FirmCore,
    machine: Machine,
    /// Units ordered by customers this step.
    pub orders: Num,
    pub demand: Num,
    pub output: Num,
    pub sales: Num,
    pub labor_demand: Num,
    pub profit: Num,
}

impl CapitalGoodFirm {
    /// New firm selling its first machine generation.
    pub fn new(
        id: FirmId,
        liquid_assets: Num,
        market_share: Num,
        labor_productivity: Num,
        machine_price: Num,
        seed: u64,
    ) -> SimResult<Self> {
        Ok(Self {
            core: FirmCore::new(id, FirmGroup::Capital, liquid_assets, market_share, seed),
            machine: Machine::new(id, 1, labor_productivity, machine_price)?,
            orders: Num::ZERO,
            demand: Num::ZERO,
            output: Num::ZERO,
            sales: Num::ZERO,
            labor_demand: Num::ZERO,
            profit: Num::ZERO,
        })
    }

    /// Entrant modeled on an incumbent: same liquid assets and market share,
    /// no debt and no flows. Its machine restarts at generation 1 with the
    /// incumbent's productivity and price.
    pub fn entrant(&self, id: FirmId, seed: u64) -> SimResult<Self> {
        Self::new(
            id,
            self.core.liquid_assets,
            self.core.market_share,
            self.machine.labor_productivity(),
            self.machine.price(),
            seed,
        )
    }

    /// Machine currently on sale.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn price(&self) -> Num {
        self.machine.price()
    }

    /// Book machines ordered by a customer.
    pub fn receive_order(&mut self, quantity: Num) {
        self.orders += quantity;
    }

    /// What customers see when they compare suppliers.
    pub fn quote(&self) -> SupplierView {
        SupplierView {
            id: self.core.id,
            machine: self.machine.clone(),
            unit_production_cost: self.core.unit_production_cost,
            orders: self.orders,
            demand: self.demand,
            output: self.output,
        }
    }

    /// Output capped by financing and by the sector's labor allowance.
    fn max_production(&self, view: &MacroView) -> SimResult<Num> {
        let by_funds = self.core.max_quantity(self.core.unit_production_cost)?;
        let by_labor =
            self.core.market_share * view.max_capital_labor * self.machine.labor_productivity();
        Ok(by_funds.min(by_labor).non_negative())
    }

    /// Draw a productivity shock and adopt it when it improves the machine.
    /// Returns whether a new generation was adopted.
    pub fn innovate(&mut self, (lower, upper): (Num, Num)) -> SimResult<bool> {
        let shock = self.core.draw_uniform(lower, upper);
        let current = self.machine.labor_productivity();
        let candidate = current * (Num::ONE + shock);
        if candidate <= current {
            return Ok(false);
        }
        self.machine = self.machine.next_generation(candidate)?;
        debug!(
            firm = %self.core.id,
            generation = self.machine.generation(),
            productivity = %candidate,
            "new machine generation"
        );
        Ok(true)
    }

    /// Row for the capital firm table.
    pub fn snapshot(&self, step: u64) -> CapitalFirmRow {
        CapitalFirmRow {
            step,
            agent_id: self.core.id,
            competitiveness: self.core.competitiveness,
            demand: self.demand,
            production: self.output,
            labor_demand: self.labor_demand,
            output: self.output,
            sales: self.sales,
            profit: self.profit,
            liquid_assets: self.core.liquid_assets,
            debt_stock: self.core.debt_stock,
            market_share: self.core.market_share,
            machine_generation: self.machine.generation(),
            price: self.machine.price(),
            unit_production_cost: self.core.unit_production_cost,
            labor_productivity: self.machine.labor_productivity(),
            available_debt: self.core.available_debt,
            bankrupt: self.core.bankrupt,
        }
    }
}

impl PhaseAgent for CapitalGoodFirm {
    fn core(&self) -> &FirmCore {
        &self.core
    }

    fn phase_one(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        let params = ctx.params;
        self.core
            .reset_financing(params.max_debt_sales_ratio, self.sales);
        self.core.unit_production_cost = self.machine.unit_labor_cost(ctx.macro_view.market_wage)?;
        self.machine = self.machine.priced_at(self.core.fix_price(params.markup))?;
        let (price_weight, productivity_weight) = params.competitiveness_weights.1;
        self.core.competitiveness = -price_weight * self.machine.price()
            + productivity_weight * self.machine.labor_productivity();
        trace!(
            firm = %self.core.id,
            price = %self.machine.price(),
            competitiveness = %self.core.competitiveness,
            "capital firm priced"
        );
        Ok(PhaseEffects::default())
    }

    /// Fill orders, hire labor and update the share of aggregate investment.
    fn phase_three(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        let params = ctx.params;
        let view = ctx.macro_view;
        self.demand = self.orders;
        let output = self.demand.min(self.max_production(view)?);
        let (capital, debt) = self
            .core
            .finance_operations(output, self.core.unit_production_cost);
        self.core.commit_financing(capital, debt);
        self.core.debt_stock += debt;
        self.output = output;
        self.sales = output;
        self.labor_demand = output.try_div(
            self.machine.labor_productivity(),
            "capital labor demand",
        )?;
        self.profit = (self.machine.price() - self.core.unit_production_cost) * self.sales
            - params.interest_rate * self.core.debt_stock;
        self.core.liquid_assets += self.profit;
        if view.investment.is_positive() {
            self.core.market_share = self
                .demand
                .try_div(view.investment, "capital market share")?;
        }
        trace!(
            firm = %self.core.id,
            orders = %self.orders,
            output = %self.output,
            "capital firm produced"
        );
        Ok(PhaseEffects::default())
    }

    /// Check solvency and record the row; solvent firms then innovate and clear their order book.
    fn phase_five(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        self.core.settle_solvency();
        let row = FirmRow::Capital(self.snapshot(ctx.step));
        if !self.core.bankrupt {
            if ctx.params.innovation {
                self.innovate(ctx.params.distribution_bounds)?;
            }
            self.orders = Num::ZERO;
        }
        Ok(PhaseEffects::row(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_core::{Parameters, Phase, SimConfig};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn params() -> Parameters {
        let mut p = SimConfig::benchmark().parameters;
        p.n_consumption_firms = 4;
        p.n_capital_firms = 1;
        p
    }

    fn view(investment: i64) -> MacroView {
        MacroView {
            market_wage: Num::from(100i64),
            consumption: Num::from(330_000i64),
            labor_supply: Num::from(3000i64),
            capital_labor_demand: Num::ZERO,
            max_capital_labor: Num::from(600i64),
            avg_consumption_competitiveness: Num::from(100i64),
            investment: Num::from(investment),
        }
    }

    fn firm(seed: u64) -> CapitalGoodFirm {
        CapitalGoodFirm::new(
            FirmId(0),
            Num::from(3000i64),
            Num::ONE,
            Num::from(100i64),
            Num::ONE,
            seed,
        )
        .unwrap()
    }

    #[test]
    fn phase_one_prices_the_machine() {
        let p = params();
        let v = view(0);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 1, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.run_phase(Phase::One, &ctx).unwrap();
        assert_eq!(f.core.unit_production_cost, Num::ONE);
        assert_eq!(f.price(), Num::new(13, 1));
        assert_eq!(f.core.competitiveness, Num::new(987, 1));
        assert_eq!(f.quote().price(), Num::new(13, 1));
    }

    #[test]
    fn phase_three_fills_orders_and_takes_its_share() {
        let p = params();
        let v = view(800);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 1, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.run_phase(Phase::One, &ctx).unwrap();
        f.receive_order(Num::from(500i64));
        f.receive_order(Num::from(300i64));
        f.run_phase(Phase::Three, &ctx).unwrap();
        assert_eq!(f.demand, Num::from(800i64));
        assert_eq!(f.output, Num::from(800i64));
        assert_eq!(f.labor_demand, Num::from(8i64));
        assert_eq!(f.profit, Num::from(240i64));
        assert_eq!(f.core.liquid_assets, Num::from(3240i64));
        assert_eq!(f.core.market_share, Num::ONE);
    }

    #[test]
    fn output_is_capped_by_funds() {
        let p = params();
        let v = view(5000);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 1, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.run_phase(Phase::One, &ctx).unwrap();
        f.receive_order(Num::from(5000i64));
        f.run_phase(Phase::Three, &ctx).unwrap();
        assert_eq!(f.output, Num::from(3000i64));
        assert_eq!(f.core.market_share, Num::ONE);
    }

    #[test]
    fn share_is_kept_without_aggregate_investment() {
        let p = params();
        let v = view(0);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 1, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.core.market_share = Num::new(4, 1);
        f.run_phase(Phase::One, &ctx).unwrap();
        f.run_phase(Phase::Three, &ctx).unwrap();
        assert_eq!(f.output, Num::ZERO);
        assert_eq!(f.core.market_share, Num::new(4, 1));
    }

    #[test]
    fn phase_five_records_then_clears_orders() {
        let p = params();
        let v = view(0);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 2, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.receive_order(Num::from(10i64));
        let effects = f.run_phase(Phase::Five, &ctx).unwrap();
        assert_eq!(f.orders, Num::ZERO);
        assert!(matches!(
            effects.row,
            Some(FirmRow::Capital(ref r)) if r.step == 2 && r.machine_generation == 1
        ));
    }

    #[test]
    fn firm_without_share_records_bankruptcy_and_stops() {
        let mut p = params();
        p.innovation = true;
        let v = view(0);
        let s = BTreeMap::new();
        let ctx = PhaseContext { step: 4, params: &p, macro_view: &v, suppliers: &s };
        let mut f = firm(1);
        f.core.market_share = Num::ZERO;
        f.receive_order(Num::from(10i64));
        let effects = f.run_phase(Phase::Five, &ctx).unwrap();
        assert!(matches!(effects.row, Some(FirmRow::Capital(ref r)) if r.bankrupt));
        assert_eq!(f.orders, Num::from(10i64));
        assert_eq!(f.machine().generation(), 1);
    }

    #[test]
    fn negative_shocks_never_regress() {
        let mut f = firm(3);
        for _ in 0..20 {
            assert!(!f.innovate((Num::new(-1, 1), Num::new(-1, 2))).unwrap());
        }
        assert_eq!(f.machine().generation(), 1);
        assert_eq!(f.machine().labor_productivity(), Num::from(100i64));
    }

    #[test]
    fn entrant_restarts_the_generation_count() {
        let mut f = firm(3);
        f.innovate((Num::new(1, 2), Num::new(5, 2))).unwrap();
        assert_eq!(f.machine().generation(), 2);
        f.receive_order(Num::from(30i64));
        f.output = Num::from(30i64);
        let e = f.entrant(FirmId(12), 4).unwrap();
        assert_eq!(e.machine().key(), (FirmId(12), 1));
        assert_eq!(e.machine().labor_productivity(), f.machine().labor_productivity());
        assert_eq!(e.machine().price(), f.machine().price());
        assert_eq!(e.core.liquid_assets, f.core.liquid_assets);
        assert_eq!(e.orders, Num::ZERO);
        assert_eq!(e.output, Num::ZERO);
    }

    proptest! {
        #[test]
        fn productivity_is_monotone(seed in any::<u64>(), rounds in 1usize..20) {
            let mut f = firm(seed);
            let bounds = (Num::new(-5, 2), Num::new(5, 2));
            for _ in 0..rounds {
                let before = f.machine().clone();
                let adopted = f.innovate(bounds).unwrap();
                let after = f.machine();
                prop_assert!(after.labor_productivity() >= before.labor_productivity());
                prop_assert_eq!(adopted, after.generation() == before.generation() + 1);
                prop_assert_eq!(after.price(), before.price());
            }
        }
    }
}
