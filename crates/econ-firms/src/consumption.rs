//! Consumption-good firms: they price output, forecast demand, buy machines
//! and produce with the vintages they hold.

use std::collections::{BTreeMap, VecDeque};

use econ_core::{
    ConsumptionFirmRow, DemandForecast, FirmGroup, FirmId, FirmRow, Machine, Num, Parameters,
    SimError, SimResult, VintageKey,
};
use rand::seq::SliceRandom;
use tracing::trace;

use crate::base::FirmCore;
use crate::context::{MacroView, Order, PhaseContext, PhaseEffects, SupplierView};
use crate::PhaseAgent;

/// Number of past demands kept for the adaptive forecast.
pub const DEMAND_HISTORY: usize = 4;

/// Units of one vintage held by a firm.
#[derive(Clone, Debug, PartialEq)]
pub struct VintageStock {
    pub machine: Machine,
    pub stock: Num,
}

/// A producer of the consumption good.
///
/// `capital_stock` always equals the summed stock of `machines`; both are only
/// changed by the firm itself in phase 5.
#[derive(Clone, Debug)]
pub struct ConsumptionGoodFirm {
    /// Balance sheet and market position.
    pub core: FirmCore,
    /// Capital firm machines are ordered from; chosen in phase 2.
    pub supplier: Option<FirmId>,
    machines: BTreeMap<VintageKey, VintageStock>,
    capital_stock: Num,
    /// Unsold units carried into the next step.
    pub inventory: Num,
    /// Market share of aggregate consumption, in units.
    pub demand: Num,
    /// Phase-2 forecast of this step's demand.
    pub expected_demand: Num,
    /// Units produced in phase 4.
    pub production: Num,
    /// Production plus the inventory carried in.
    pub output: Num,
    /// Units sold: demand capped by output.
    pub sales: Num,
    /// Markup over unit production cost.
    pub price: Num,
    /// Revenue less production cost and interest.
    pub profit: Num,
    /// Share of last step's demand that went unserved.
    pub unfilled_demand_rate: Num,
    /// Stock-weighted productivity of the installed vintages.
    pub average_productivity: Num,
    /// Expected demand net of inventory.
    pub desired_production: Num,
    /// Machines needed for desired production at the target utilization.
    pub desired_capital_stock: Num,
    /// Desired production capped by what the firm can finance.
    pub planned_production: Num,
    /// Set when financing could not cover desired production. A rationed
    /// firm orders no machines.
    pub production_rationed: bool,
    /// Workers needed for planned production.
    pub labor_demand: Num,
    /// Expansion wanted before financing.
    pub desired_expansion_investment: Num,
    /// Replacement wanted before financing.
    pub desired_replacement_investment: Num,
    /// Machines ordered to grow capacity, after financing.
    pub expansion_investment: Num,
    /// Machines ordered to replace scrapped vintages, after financing.
    pub replacement_investment: Num,
    scrap: Vec<VintageKey>,
    demand_history: VecDeque<Num>,
}

impl ConsumptionGoodFirm {
    /// New firm holding `capital_stock` units spread evenly over `vintages`;
    /// the remainder goes one unit each to the earliest vintages. Flows start
    /// at the firm's share of `consumption`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: FirmId,
        liquid_assets: Num,
        capital_stock: Num,
        market_share: Num,
        supplier: Option<FirmId>,
        vintages: &[Machine],
        consumption: Num,
        seed: u64,
    ) -> SimResult<Self> {
        if vintages.is_empty() {
            return Err(SimError::Invariant(format!(
                "consumption firm {id} created without machines"
            )));
        }
        let count = Num::from(vintages.len());
        let base = capital_stock
            .try_div(count, "initial machine allocation")?
            .trunc();
        let remainder = capital_stock - base * count;
        let mut machines: BTreeMap<VintageKey, VintageStock> = BTreeMap::new();
        for (i, machine) in vintages.iter().enumerate() {
            let extra = if Num::from(i) < remainder {
                Num::ONE
            } else {
                Num::ZERO
            };
            let stock = base + extra;
            machines
                .entry(machine.key())
                .and_modify(|v| v.stock += stock)
                .or_insert_with(|| VintageStock {
                    machine: machine.clone(),
                    stock,
                });
        }
        Ok(Self::assemble(
            FirmCore::new(id, FirmGroup::Consumption, liquid_assets, market_share, seed),
            supplier,
            machines,
            consumption,
        ))
    }

    /// Entrant modeled on an incumbent. It holds the incumbent's machines,
    /// liquid assets and market share, starts debt-free with empty inventory
    /// and no supplier, and takes its flows from `consumption`.
    pub fn entrant(&self, id: FirmId, consumption: Num, seed: u64) -> Self {
        let core = FirmCore::new(
            id,
            FirmGroup::Consumption,
            self.core.liquid_assets,
            self.core.market_share,
            seed,
        );
        Self::assemble(core, None, self.machines.clone(), consumption)
    }

    fn assemble(
        core: FirmCore,
        supplier: Option<FirmId>,
        machines: BTreeMap<VintageKey, VintageStock>,
        consumption: Num,
    ) -> Self {
        let demand = core.market_share * consumption;
        let mut firm = Self {
            core,
            supplier,
            machines,
            capital_stock: Num::ZERO,
            inventory: Num::ZERO,
            demand,
            expected_demand: demand,
            production: demand,
            output: demand,
            sales: demand,
            price: Num::ZERO,
            profit: Num::ZERO,
            unfilled_demand_rate: Num::ZERO,
            average_productivity: Num::ZERO,
            desired_production: Num::ZERO,
            desired_capital_stock: Num::ZERO,
            planned_production: Num::ZERO,
            production_rationed: false,
            labor_demand: Num::ZERO,
            desired_expansion_investment: Num::ZERO,
            desired_replacement_investment: Num::ZERO,
            expansion_investment: Num::ZERO,
            replacement_investment: Num::ZERO,
            scrap: Vec::new(),
            demand_history: VecDeque::with_capacity(DEMAND_HISTORY),
        };
        firm.capital_stock = firm.summed_stock();
        firm.record_demand();
        firm
    }

    /// Units of machines held.
    pub fn capital_stock(&self) -> Num {
        self.capital_stock
    }

    /// Vintages held, keyed by `(producer, generation)`.
    pub fn machines(&self) -> &BTreeMap<VintageKey, VintageStock> {
        &self.machines
    }

    /// Vintages chosen for replacement in phase 2.
    pub fn scrap_plan(&self) -> &[VintageKey] {
        &self.scrap
    }

    pub fn investment(&self) -> Num {
        self.expansion_investment + self.replacement_investment
    }

    fn summed_stock(&self) -> Num {
        self.machines.values().map(|v| v.stock).sum()
    }

    fn record_demand(&mut self) {
        self.demand_history.push_back(self.demand);
        while self.demand_history.len() > DEMAND_HISTORY {
            self.demand_history.pop_front();
        }
    }

    /// `1 - sales/demand`, or zero when there was no demand.
    pub fn unfilled_demand_rate(&self) -> Num {
        match self.sales.checked_div(self.demand) {
            Some(filled) => Num::ONE - filled,
            None => Num::ZERO,
        }
    }

    /// Stock-weighted productivity of the machines held.
    pub fn compute_average_productivity(&self) -> SimResult<Num> {
        let weighted: Num = self
            .machines
            .values()
            .map(|v| v.machine.labor_productivity() * v.stock)
            .sum();
        weighted.try_div(self.capital_stock, "consumption average productivity")
    }

    fn adjust_competitiveness(&mut self, (price_weight, unfilled_weight): (Num, Num)) {
        let adjustment =
            (-price_weight * self.price - unfilled_weight * self.unfilled_demand_rate).round_dp(2);
        self.core.competitiveness = (self.core.competitiveness - adjustment).non_negative();
    }

    /// Expected demand under the configured forecast rule.
    pub fn forecast_demand(&self, params: &Parameters) -> Num {
        match params.demand_forecast {
            DemandForecast::Myopic => self.demand,
            DemandForecast::Adaptive => params
                .betas
                .iter()
                .zip(self.demand_history.iter())
                .map(|(beta, demand)| *beta * *demand)
                .sum(),
        }
    }

    fn plan_production(&mut self) -> SimResult<Num> {
        let affordable = self.core.max_quantity(self.core.unit_production_cost)?;
        let planned = self.desired_production.min(affordable);
        self.production_rationed = planned < self.desired_production;
        Ok(planned)
    }

    /// Best supplier by productivity/price among a random sample. The current
    /// supplier is kept unless the sample holds a strictly better one.
    pub(crate) fn choose_supplier(&mut self, ctx: &PhaseContext<'_>) -> SimResult<FirmId> {
        let ids: Vec<FirmId> = ctx.suppliers.keys().copied().collect();
        let sample_size = ctx.params.supplier_sample_size.min(ids.len());
        let mut best: Option<(FirmId, Num)> = None;
        for id in ids.choose_multiple(&mut self.core.rng, sample_size) {
            let ratio = ctx.supplier(*id)?.machine.productivity_price_ratio()?;
            if best.map_or(true, |(_, r)| ratio > r) {
                best = Some((*id, ratio));
            }
        }
        let (candidate, best_ratio) = best.ok_or(SimError::SectorCollapse(FirmGroup::Capital))?;
        if let Some(current) = self.supplier.and_then(|id| ctx.suppliers.get(&id)) {
            if current.machine.productivity_price_ratio()? >= best_ratio {
                return Ok(current.id);
            }
        }
        Ok(candidate)
    }

    /// Vintages whose running-cost saving pays back the supplier's price
    /// within `payback` periods. Vintages that are not more expensive to run
    /// than the supplier's are kept.
    pub(crate) fn plan_replacement(
        &self,
        quote: &SupplierView,
        market_wage: Num,
        payback: Num,
    ) -> SimResult<Vec<VintageKey>> {
        let mut scrap = Vec::new();
        for (key, vintage) in &self.machines {
            if !vintage.stock.is_positive() {
                continue;
            }
            let saving = vintage.machine.unit_labor_cost(market_wage)? - quote.unit_production_cost;
            if !saving.is_positive() {
                continue;
            }
            if quote.price().try_div(saving, "payback period")? <= payback {
                scrap.push(*key);
            }
        }
        Ok(scrap)
    }

    fn forecast_expansion_investment(&self, trigger_rule: Num) -> Num {
        let trigger = (self.capital_stock * (Num::ONE + trigger_rule)).trunc();
        if self.desired_capital_stock >= trigger {
            trigger - self.capital_stock
        } else {
            Num::ZERO
        }
    }

    /// Investment affordable once production is funded, expansion first.
    /// A firm that could not fund its planned production does not invest.
    fn fix_investment(&mut self, machine_price: Num) -> SimResult<(Num, Num)> {
        if self.production_rationed {
            self.core.capital_employed = Num::ZERO;
            self.core.debt_employed = Num::ZERO;
            return Ok((Num::ZERO, Num::ZERO));
        }
        let (capital_q, debt_q) = self
            .core
            .finance_operations(self.planned_production, self.core.unit_production_cost);
        self.core.commit_financing(capital_q, debt_q);

        let limit = self.core.max_quantity(machine_price)?;
        let expansion = self.desired_expansion_investment.min(limit);
        let (capital_e, debt_e) = self.core.finance_operations(expansion, machine_price);
        self.core.commit_financing(capital_e, debt_e);

        let replacement = self
            .desired_replacement_investment
            .min((limit - expansion).non_negative());
        let (capital_r, debt_r) = self.core.finance_operations(replacement, machine_price);
        self.core.commit_financing(capital_r, debt_r);

        // production is financed again once it is realized in phase 4
        self.core.release_financing(capital_q, debt_q);
        self.core.capital_employed = capital_e + capital_r;
        self.core.debt_employed = debt_e + debt_r;
        Ok((expansion, replacement))
    }

    fn replicator_share(&self, coeff: Num, average: Num) -> Num {
        match (self.core.competitiveness - average).checked_div(average) {
            Some(relative) => (self.core.market_share * (Num::ONE + coeff * relative)).non_negative(),
            None => self.core.market_share,
        }
    }

    fn fix_production(&mut self, view: &MacroView) -> SimResult<Num> {
        let labor = (self.core.market_share * (view.labor_supply - view.capital_labor_demand))
            .non_negative();
        let capacity = labor * self.average_productivity;
        let production = capacity.min(self.planned_production).non_negative();
        let (capital, debt) = self
            .core
            .finance_operations(production, self.core.unit_production_cost);
        self.core.commit_financing(capital, debt);
        self.core.debt_stock += self.core.debt_employed + debt;
        Ok(production)
    }

    fn carry_inventory(&self, depreciation: Num) -> Num {
        let unsold = self.output - self.sales;
        if unsold.is_positive() {
            (unsold * (Num::ONE - depreciation)).trunc()
        } else {
            unsold
        }
    }

    /// Settle machine orders: take what the supplier delivered, retire
    /// scrapped vintages and install the new machines.
    fn settle_investment(&mut self, ctx: &PhaseContext<'_>) -> SimResult<()> {
        let Some(supplier) = self.supplier else {
            return Ok(());
        };
        let quote = ctx.supplier(supplier)?;
        if quote.output < quote.demand {
            let share = self
                .investment()
                .checked_div(quote.orders)
                .unwrap_or(Num::ONE);
            let received = (share * quote.output).trunc();
            self.core.liquid_assets += received * quote.price();
            let replacement = received.min(self.replacement_investment);
            self.replacement_investment = replacement;
            self.expansion_investment = received - replacement;
        }

        let mut installed = self.expansion_investment;
        let mut remaining = self.replacement_investment;
        for key in std::mem::take(&mut self.scrap) {
            if !remaining.is_positive() {
                break;
            }
            let Some(stock) = self.machines.get(&key).map(|v| v.stock) else {
                continue;
            };
            if stock <= remaining {
                self.machines.remove(&key);
                remaining -= stock;
                installed += stock;
            } else if let Some(vintage) = self.machines.get_mut(&key) {
                vintage.stock -= remaining;
                installed += remaining;
                remaining = Num::ZERO;
            }
        }

        if installed.is_positive() {
            self.machines
                .entry(quote.machine.key())
                .and_modify(|v| v.stock += installed)
                .or_insert_with(|| VintageStock {
                    machine: quote.machine.clone(),
                    stock: installed,
                });
        }
        self.capital_stock = self.summed_stock();
        Ok(())
    }

    /// Row for the consumption firm table.
    pub fn snapshot(&self, step: u64) -> ConsumptionFirmRow {
        ConsumptionFirmRow {
            step,
            agent_id: self.core.id,
            competitiveness: self.core.competitiveness,
            expected_demand: self.expected_demand,
            market_share: self.core.market_share,
            demand: self.demand,
            desired_production: self.desired_production,
            desired_capital_stock: self.desired_capital_stock,
            labor_demand: self.labor_demand,
            desired_expansion_investment: self.desired_expansion_investment,
            desired_replacement_investment: self.desired_replacement_investment,
            supplier: self.supplier,
            expansion_investment: self.expansion_investment,
            replacement_investment: self.replacement_investment,
            production: self.production,
            output: self.output,
            inventory: self.inventory,
            sales: self.sales,
            profit: self.profit,
            liquid_assets: self.core.liquid_assets,
            capital_stock: self.capital_stock,
            debt_stock: self.core.debt_stock,
            price: self.price,
            unit_production_cost: self.core.unit_production_cost,
            average_productivity: self.average_productivity,
            available_debt: self.core.available_debt,
            bankrupt: self.core.bankrupt,
        }
    }
}

impl PhaseAgent for ConsumptionGoodFirm {
    fn core(&self) -> &FirmCore {
        &self.core
    }

    /// Costs, price and competitiveness.
    fn phase_one(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        let params = ctx.params;
        self.core
            .reset_financing(params.max_debt_sales_ratio, self.sales);
        self.unfilled_demand_rate = self.unfilled_demand_rate();
        self.average_productivity = self.compute_average_productivity()?;
        self.core.unit_production_cost = ctx
            .macro_view
            .market_wage
            .try_div(self.average_productivity, "consumption unit production cost")?;
        self.price = self.core.fix_price(params.markup);
        if self.output < self.demand {
            self.adjust_competitiveness(params.competitiveness_weights.0);
        }
        trace!(
            firm = %self.core.id,
            price = %self.price,
            competitiveness = %self.core.competitiveness,
            "consumption firm priced"
        );
        Ok(PhaseEffects::default())
    }

    /// Forecast, production plan, supplier choice and machine order.
    fn phase_two(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        let params = ctx.params;
        self.expected_demand = self.forecast_demand(params);
        self.desired_production = (self.expected_demand - self.inventory).non_negative();
        self.desired_capital_stock = self
            .desired_production
            .try_div(params.desired_capital_utilization, "desired capital stock")?
            .trunc();
        self.planned_production = self.plan_production()?;
        self.labor_demand = self
            .planned_production
            .try_div(self.average_productivity, "consumption labor demand")?;

        let supplier = self.choose_supplier(ctx)?;
        self.supplier = Some(supplier);
        let quote = ctx.supplier(supplier)?;
        self.scrap = self.plan_replacement(
            quote,
            ctx.macro_view.market_wage,
            params.payback_period_parameter,
        )?;
        self.desired_expansion_investment = self.forecast_expansion_investment(params.trigger_rule);
        self.desired_replacement_investment = self
            .scrap
            .iter()
            .filter_map(|key| self.machines.get(key))
            .map(|v| v.stock)
            .sum();
        let (expansion, replacement) = self.fix_investment(quote.price())?;
        self.expansion_investment = expansion;
        self.replacement_investment = replacement;
        trace!(
            firm = %self.core.id,
            %supplier,
            planned = %self.planned_production,
            expansion = %expansion,
            replacement = %replacement,
            "consumption firm ordered machines"
        );
        Ok(PhaseEffects::order(Order {
            supplier,
            quantity: self.investment(),
        }))
    }

    /// Market share, production, sales and profit.
    fn phase_four(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        let params = ctx.params;
        let view = ctx.macro_view;
        self.core.market_share = self.replicator_share(
            params.replicator_dynamics_coeff.0,
            view.avg_consumption_competitiveness,
        );
        self.demand = view.consumption * self.core.market_share;
        self.production = self.fix_production(view)?;
        self.output = self.production + self.inventory;
        self.sales = self.demand.min(self.output);
        self.inventory = self.carry_inventory(params.inventory_depreciation);
        self.profit = self.price * self.sales
            - self.core.unit_production_cost * self.production
            - params.interest_rate * self.core.debt_stock;
        self.core.liquid_assets += self.profit - self.core.capital_employed;
        trace!(
            firm = %self.core.id,
            sales = %self.sales,
            profit = %self.profit,
            "consumption firm sold"
        );
        Ok(PhaseEffects::default())
    }

    /// Check solvency and record the row, then settle machine deliveries
    /// unless bankrupt.
    fn phase_five(&mut self, ctx: &PhaseContext<'_>) -> SimResult<PhaseEffects> {
        self.core.settle_solvency();
        let row = FirmRow::Consumption(self.snapshot(ctx.step));
        self.record_demand();
        if !self.core.bankrupt {
            self.settle_investment(ctx)?;
        }
        Ok(PhaseEffects::row(row))
    }
}
