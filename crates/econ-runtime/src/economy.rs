//! Macro state, phase aggregation and firm exit/entry.

use econ_core::{
    FirmGroup, FirmId, FirmRow, MacroRecord, Num, Parameters, Phase, SimConfig, SimError,
    SimResult, SocialPolicy,
};
use econ_firms::{
    CapitalGoodFirm, ConsumptionGoodFirm, Firm, MacroView, PhaseContext, PhaseEffects,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::population::Population;
use crate::scheduler::MacroCallback;

/// Consumption firms per supplier when suppliers are assigned at start.
const CUSTOMERS_PER_SUPPLIER: usize = 4;

/// Aggregate variables of the economy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MacroState {
    /// Wage paid per worker.
    pub market_wage: Num,
    /// Consumer price index: mean consumption-good price.
    pub cpi: Num,
    /// Relative change of the CPI over the last step.
    pub delta_cpi: Num,
    /// Mean price of the machines on sale.
    pub avg_capital_price: Num,
    /// Mean wage cost per unit of output over the machines on sale.
    pub avg_unit_labor_cost: Num,
    /// Market-share weighted productivity of the machines on sale.
    pub avg_labor_productivity: Num,
    /// Relative change of the average productivity over the last step.
    pub delta_productivity: Num,
    /// Share-weighted competitiveness of consumption firms.
    pub avg_consumption_competitiveness: Num,
    /// Share-weighted competitiveness of capital firms.
    pub avg_capital_competitiveness: Num,
    /// Machines ordered this step to grow capacity.
    pub expansion_investment: Num,
    /// Machines ordered this step to replace scrapped vintages.
    pub replacement_investment: Num,
    /// Workers available; grows each step at the configured rate.
    pub labor_supply: Num,
    /// Ceiling on the capital sector's share of the labor supply.
    pub max_capital_labor_share: Num,
    /// Workers the capital sector needs to fill its order books.
    pub capital_labor_demand: Num,
    /// Workers the consumption sector needs for planned production.
    pub consumption_labor_demand: Num,
    /// Total labor demand capped by the labor supply.
    pub employment: Num,
    /// Labor supply left unemployed.
    pub unemployment: Num,
    /// Unemployment over labor supply.
    pub unemployment_rate: Num,
    /// Change of the unemployment rate over the last step.
    pub delta_unemployment: Num,
    /// Nominal household and government spending on consumption goods.
    pub consumption: Num,
    /// Units produced by consumption firms this step.
    pub production: Num,
    /// Units held in consumption-firm inventories after sales.
    pub inventories: Num,
    /// Consumption firms that exited this step.
    pub bankrupt_consumption: usize,
    /// Capital firms that exited this step.
    pub bankrupt_capital: usize,
}

impl MacroState {
    pub fn investment(&self) -> Num {
        self.expansion_investment + self.replacement_investment
    }

    pub fn labor_demand(&self) -> Num {
        self.capital_labor_demand + self.consumption_labor_demand
    }

    pub fn max_capital_labor(&self) -> Num {
        self.max_capital_labor_share * self.labor_supply
    }
}

/// `(new - old) / old`, zero when there is no previous level.
fn relative_change(new: Num, old: Num) -> Num {
    (new - old).checked_div(old).unwrap_or(Num::ZERO)
}

fn mean(values: impl Iterator<Item = Num>, site: &'static str) -> SimResult<Num> {
    let (sum, count) = values.fold((Num::ZERO, 0usize), |(s, n), v| (s + v, n + 1));
    sum.try_div(Num::from(count), site)
}

/// The simulated economy: parameters, macro state and the firm population.
#[derive(Debug)]
pub struct Economy {
    params: Parameters,
    pub macro_state: MacroState,
    population: Population,
    rng: ChaCha8Rng,
}

impl Economy {
    /// Validate the configuration and create the initial population:
    /// capital firms first, then consumption firms holding a copy of every
    /// capital firm's machine.
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        config.validate()?;
        let params = config.parameters.clone();
        let init = &config.initial_conditions;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut macro_state = MacroState {
            market_wage: init.market_wage,
            cpi: init.cpi,
            avg_capital_price: init.machine_price,
            avg_labor_productivity: init.avg_labor_productivity,
            labor_supply: init.labor_supply,
            max_capital_labor_share: params.max_capital_labor_share(),
            employment: init.labor_supply,
            ..MacroState::default()
        };
        macro_state.avg_unit_labor_cost = init
            .market_wage
            .try_div(init.avg_labor_productivity, "initial unit labor cost")?;
        macro_state.consumption = Self::household_and_government(&params, &macro_state);

        let n_cap = params.n_capital_firms;
        let n_cons = params.n_consumption_firms;
        let cap_share = Num::ONE.try_div(Num::from(n_cap), "initial capital market share")?;
        let cons_share =
            Num::ONE.try_div(Num::from(n_cons), "initial consumption market share")?;

        let mut population = Population::new();
        for i in 0..n_cap {
            let firm = CapitalGoodFirm::new(
                FirmId(i as u64),
                init.liquid_assets,
                cap_share,
                init.avg_labor_productivity,
                init.machine_price,
                rng.gen(),
            )?;
            population.insert(Firm::Capital(firm))?;
        }
        let vintages: Vec<_> = population
            .capital_firms()
            .map(|f| f.machine().clone())
            .collect();
        for i in 0..n_cons {
            let supplier = params
                .fix_supplier
                .then(|| FirmId(((i / CUSTOMERS_PER_SUPPLIER) % n_cap) as u64));
            let firm = ConsumptionGoodFirm::new(
                FirmId((n_cap + i) as u64),
                init.liquid_assets,
                init.capital_stock,
                cons_share,
                supplier,
                &vintages,
                macro_state.consumption,
                rng.gen(),
            )?;
            population.insert(Firm::Consumption(firm))?;
        }

        info!(
            wage = %macro_state.market_wage,
            cpi = %macro_state.cpi,
            labor_supply = %macro_state.labor_supply,
            consumption = %macro_state.consumption,
            consumption_firms = n_cons,
            capital_firms = n_cap,
            "economy initialized"
        );
        Ok(Self {
            params,
            macro_state,
            population,
            rng,
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Macro callbacks per phase, in execution order.
    pub fn phase_callbacks() -> Vec<(Phase, MacroCallback)> {
        vec![
            (Phase::One, MacroCallback::new("update_average_prices", Self::update_average_prices)),
            (
                Phase::One,
                MacroCallback::new("update_average_unit_labor_cost", Self::update_average_unit_labor_cost),
            ),
            (
                Phase::One,
                MacroCallback::new(
                    "update_average_labor_productivity",
                    Self::update_average_labor_productivity,
                ),
            ),
            (
                Phase::One,
                MacroCallback::new("update_sector_competitiveness", Self::update_sector_competitiveness),
            ),
            (Phase::Two, MacroCallback::new("aggregate_investment", Self::aggregate_investment)),
            (Phase::Three, MacroCallback::new("update_labor_supply", Self::update_labor_supply)),
            (Phase::Three, MacroCallback::new("aggregate_labor_demand", Self::aggregate_labor_demand)),
            (Phase::Three, MacroCallback::new("update_employment", Self::update_employment)),
            (Phase::Three, MacroCallback::new("update_market_wage", Self::update_market_wage)),
            (Phase::Three, MacroCallback::new("update_consumption", Self::update_consumption)),
            (Phase::Four, MacroCallback::new("aggregate_production", Self::aggregate_production)),
            (Phase::Four, MacroCallback::new("aggregate_inventories", Self::aggregate_inventories)),
            (Phase::Four, MacroCallback::new("aggregate_investment", Self::aggregate_investment)),
            (Phase::Five, MacroCallback::new("exit_and_entry", Self::exit_and_entry)),
        ]
    }

    /// What firms read of the macro state during a phase.
    pub fn macro_view(&self) -> MacroView {
        let m = &self.macro_state;
        MacroView {
            market_wage: m.market_wage,
            consumption: m.consumption,
            labor_supply: m.labor_supply,
            capital_labor_demand: m.capital_labor_demand,
            max_capital_labor: m.max_capital_labor(),
            avg_consumption_competitiveness: m.avg_consumption_competitiveness,
            investment: m.investment(),
        }
    }

    /// Run one phase for the given firms against the state at phase start,
    /// then deliver their machine orders. Returns the rows they emitted.
    pub fn run_agents(
        &mut self,
        phase: Phase,
        ids: &[FirmId],
        step: u64,
    ) -> SimResult<Vec<FirmRow>> {
        let suppliers = self.population.capital_market();
        let view = self.macro_view();
        let ctx = PhaseContext {
            step,
            params: &self.params,
            macro_view: &view,
            suppliers: &suppliers,
        };
        let mut orders = Vec::new();
        let mut rows = Vec::new();
        for id in ids {
            let firm = self
                .population
                .get_mut(*id)
                .ok_or(SimError::UnknownFirm(*id))?;
            let PhaseEffects { order, row } = firm.run_phase(phase, &ctx)?;
            orders.extend(order);
            rows.extend(row);
        }
        for order in orders {
            self.population
                .capital_firm_mut(order.supplier)?
                .receive_order(order.quantity);
        }
        Ok(rows)
    }

    pub fn update_average_prices(&mut self) -> SimResult<()> {
        let cpi = mean(
            self.population.consumption_firms().map(|f| f.price),
            "consumer price index",
        )?;
        self.macro_state.delta_cpi = relative_change(cpi, self.macro_state.cpi);
        self.macro_state.cpi = cpi;
        self.macro_state.avg_capital_price = mean(
            self.population.capital_firms().map(|f| f.price()),
            "average capital price",
        )?;
        Ok(())
    }

    pub fn update_average_unit_labor_cost(&mut self) -> SimResult<()> {
        let wage = self.macro_state.market_wage;
        let costs = self
            .population
            .capital_firms()
            .map(|f| f.machine().unit_labor_cost(wage))
            .collect::<SimResult<Vec<_>>>()?;
        self.macro_state.avg_unit_labor_cost =
            mean(costs.into_iter(), "average unit labor cost")?;
        Ok(())
    }

    pub fn update_average_labor_productivity(&mut self) -> SimResult<()> {
        let productivity: Num = self
            .population
            .capital_firms()
            .map(|f| f.core.market_share * f.machine().labor_productivity())
            .sum();
        self.macro_state.delta_productivity =
            relative_change(productivity, self.macro_state.avg_labor_productivity);
        self.macro_state.avg_labor_productivity = productivity;
        Ok(())
    }

    fn sector_competitiveness(&self, group: FirmGroup) -> Num {
        self.population
            .group(group)
            .filter(|f| !f.core().bankrupt)
            .map(|f| f.core().competitiveness * f.core().market_share)
            .sum::<Num>()
            .round_dp(2)
    }

    pub fn update_sector_competitiveness(&mut self) -> SimResult<()> {
        self.macro_state.avg_consumption_competitiveness =
            self.sector_competitiveness(FirmGroup::Consumption);
        self.macro_state.avg_capital_competitiveness =
            self.sector_competitiveness(FirmGroup::Capital);
        Ok(())
    }

    pub fn aggregate_investment(&mut self) -> SimResult<()> {
        let (expansion, replacement) = self
            .population
            .consumption_firms()
            .fold((Num::ZERO, Num::ZERO), |(e, r), f| {
                (e + f.expansion_investment, r + f.replacement_investment)
            });
        self.macro_state.expansion_investment = expansion;
        self.macro_state.replacement_investment = replacement;
        debug!(%expansion, %replacement, "investment aggregated");
        Ok(())
    }

    pub fn update_labor_supply(&mut self) -> SimResult<()> {
        self.macro_state.labor_supply *= Num::ONE + self.params.labor_supply_growth;
        Ok(())
    }

    pub fn aggregate_labor_demand(&mut self) -> SimResult<()> {
        self.macro_state.consumption_labor_demand = self
            .population
            .consumption_firms()
            .map(|f| f.labor_demand)
            .sum();
        self.macro_state.capital_labor_demand = self
            .population
            .capital_firms()
            .map(|f| f.labor_demand)
            .sum();
        Ok(())
    }

    pub fn update_employment(&mut self) -> SimResult<()> {
        let m = &mut self.macro_state;
        m.employment = m.labor_demand().min(m.labor_supply);
        m.unemployment = (m.labor_supply - m.employment).non_negative();
        let rate = m.unemployment.try_div(m.labor_supply, "unemployment rate")?;
        m.delta_unemployment = rate - m.unemployment_rate;
        m.unemployment_rate = rate;
        Ok(())
    }

    /// `wage += 1 + psi1 * dCPI + psi2 * dProductivity + psi3 * dUnemployment`.
    pub fn update_market_wage(&mut self) -> SimResult<()> {
        let w = &self.params.wage_setting;
        let m = &mut self.macro_state;
        m.market_wage += Num::ONE
            + w.cpi_weight * m.delta_cpi
            + w.avg_lp_weight * m.delta_productivity
            + w.unemployment_weight * m.delta_unemployment;
        debug!(
            wage = %m.market_wage,
            employment = %m.employment,
            unemployment = %m.unemployment,
            "labor market cleared"
        );
        Ok(())
    }

    fn household_and_government(params: &Parameters, m: &MacroState) -> Num {
        let households = m.market_wage * m.employment;
        let government = match params.social_policy {
            SocialPolicy::Base => params.wage_share * m.market_wage * m.labor_supply,
            SocialPolicy::Welfare => params.wage_share * m.unemployment,
        };
        households + government
    }

    pub fn update_consumption(&mut self) -> SimResult<()> {
        self.macro_state.consumption = Self::household_and_government(&self.params, &self.macro_state);
        Ok(())
    }

    pub fn aggregate_production(&mut self) -> SimResult<()> {
        self.macro_state.production = self
            .population
            .consumption_firms()
            .map(|f| f.production)
            .sum();
        Ok(())
    }

    pub fn aggregate_inventories(&mut self) -> SimResult<()> {
        self.macro_state.inventories = self
            .population
            .consumption_firms()
            .map(|f| f.inventory)
            .sum();
        Ok(())
    }

    /// Replace every insolvent firm with a copy of a random surviving
    /// incumbent of the same sector, then rescale that sector's market shares
    /// to sum to one.
    pub fn exit_and_entry(&mut self) -> SimResult<()> {
        for group in FirmGroup::ORDER {
            let exiting: Vec<FirmId> = self
                .population
                .group(group)
                .filter(|f| f.core().bankrupt || f.core().is_insolvent())
                .map(Firm::id)
                .collect();
            for id in &exiting {
                self.population.remove(*id)?;
            }
            if !exiting.is_empty() {
                let survivors = self.population.ids(group);
                for _ in &exiting {
                    let model = *survivors
                        .choose(&mut self.rng)
                        .ok_or(SimError::SectorCollapse(group))?;
                    let id = self.population.next_id();
                    let seed = self.rng.gen();
                    let consumption = self.macro_state.consumption;
                    let entrant = self
                        .population
                        .get(model)
                        .ok_or(SimError::UnknownFirm(model))?
                        .entrant(id, consumption, seed)?;
                    debug!(%group, %id, incumbent = %model, "firm entered");
                    self.population.insert(entrant)?;
                }
                info!(%group, exits = exiting.len(), ?exiting, "insolvent firms replaced");
            }
            match group {
                FirmGroup::Consumption => self.macro_state.bankrupt_consumption = exiting.len(),
                FirmGroup::Capital => self.macro_state.bankrupt_capital = exiting.len(),
            }
            self.normalize_market_shares(group)?;
        }
        Ok(())
    }

    fn normalize_market_shares(&mut self, group: FirmGroup) -> SimResult<()> {
        let total: Num = self
            .population
            .group(group)
            .map(|f| f.core().market_share)
            .sum();
        if total == Num::ONE {
            return Ok(());
        }
        debug!(%group, %total, "recalibrating market shares");
        for firm in self.population.group_mut(group) {
            let core = firm.core_mut();
            core.market_share = core.market_share.try_div(total, "market share normalization")?;
        }
        Ok(())
    }

    /// Consumption sales plus capital output, both at current prices.
    pub fn gdp(&self) -> Num {
        let consumption: Num = self
            .population
            .consumption_firms()
            .map(|f| f.sales * f.price)
            .sum();
        let capital: Num = self
            .population
            .capital_firms()
            .map(|f| f.output * f.price())
            .sum();
        consumption + capital
    }

    pub fn macro_record(&self, step: u64) -> MacroRecord {
        let m = &self.macro_state;
        MacroRecord {
            step,
            market_wage: m.market_wage,
            cpi: m.cpi,
            consumption: m.consumption,
            expansion_investment: m.expansion_investment,
            replacement_investment: m.replacement_investment,
            investment: m.investment(),
            inventories: m.inventories,
            production: m.production,
            avg_capital_price: m.avg_capital_price,
            avg_labor_productivity: m.avg_labor_productivity,
            labor_supply: m.labor_supply,
            labor_demand: m.labor_demand(),
            employment: m.employment,
            unemployment: m.unemployment,
            avg_consumption_competitiveness: m.avg_consumption_competitiveness,
            avg_capital_competitiveness: m.avg_capital_competitiveness,
            gdp: self.gdp(),
            bankrupt_consumption: m.bankrupt_consumption,
            bankrupt_capital: m.bankrupt_capital,
        }
    }

    /// Rows for every live firm, tagged with `step`.
    pub fn snapshot_rows(&self, step: u64) -> Vec<FirmRow> {
        self.population.iter().map(|f| f.snapshot(step)).collect()
    }
}
