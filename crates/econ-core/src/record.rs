//! Result records and the sink they are handed to.
//!
//! Every step produces one [`MacroRecord`] and one row per live firm. Rows are
//! keyed by `(step, agent_id)` and macro records by `step`, so recording the
//! same key twice replaces the earlier value instead of appending a duplicate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{FirmId, Num};

/// Macro variables at the end of a step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroRecord {
    /// Step the values belong to; 0 is the initial state.
    pub step: u64,
    /// Wage paid per worker.
    pub market_wage: Num,
    /// Consumer price index: mean consumption-good price.
    pub cpi: Num,
    /// Nominal household and government spending.
    pub consumption: Num,
    /// Machines ordered to grow capacity.
    pub expansion_investment: Num,
    /// Machines ordered to replace scrapped vintages.
    pub replacement_investment: Num,
    /// Sum of expansion and replacement investment.
    pub investment: Num,
    /// Units held by consumption firms after sales.
    pub inventories: Num,
    /// Units produced by consumption firms.
    pub production: Num,
    /// Mean price of the machines on sale.
    pub avg_capital_price: Num,
    /// Share-weighted productivity of the machines on sale.
    pub avg_labor_productivity: Num,
    /// Workers available.
    pub labor_supply: Num,
    /// Workers demanded by both sectors.
    pub labor_demand: Num,
    /// Labor demand capped by the labor supply.
    pub employment: Num,
    /// Labor supply left unemployed.
    pub unemployment: Num,
    /// Share-weighted competitiveness of consumption firms.
    pub avg_consumption_competitiveness: Num,
    /// Share-weighted competitiveness of capital firms.
    pub avg_capital_competitiveness: Num,
    /// Consumption sales plus capital output, both at current prices.
    pub gdp: Num,
    /// Consumption firms that exited in this step.
    pub bankrupt_consumption: usize,
    /// Capital firms that exited in this step.
    pub bankrupt_capital: usize,
}

/// State of a consumption-good firm as recorded in phase 5.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionFirmRow {
    /// Step the values belong to; 0 is the initial state.
    pub step: u64,
    /// Firm the row describes.
    pub agent_id: FirmId,
    /// Price and unfilled-demand competitiveness from phase 1.
    pub competitiveness: Num,
    /// Demand forecast for the step.
    pub expected_demand: Num,
    /// Share of the firm's sector, in [0, 1].
    pub market_share: Num,
    /// Units households asked for.
    pub demand: Num,
    /// Expected demand net of inventory.
    pub desired_production: Num,
    /// Machines needed to produce the desired output at the target utilization.
    pub desired_capital_stock: Num,
    /// Workers needed for planned production.
    pub labor_demand: Num,
    /// Expansion wanted before financing.
    pub desired_expansion_investment: Num,
    /// Replacement wanted before financing.
    pub desired_replacement_investment: Num,
    /// Capital firm the machines are ordered from.
    pub supplier: Option<FirmId>,
    /// Financed expansion order.
    pub expansion_investment: Num,
    /// Financed replacement order.
    pub replacement_investment: Num,
    /// Units produced in the step.
    pub production: Num,
    /// Production plus inventory carried in.
    pub output: Num,
    /// Units carried out, after depreciation.
    pub inventory: Num,
    /// Units sold, at most the demand.
    pub sales: Num,
    /// Revenue less production cost and interest.
    pub profit: Num,
    /// Cash at the end of the step; negative means insolvent.
    pub liquid_assets: Num,
    /// Machines installed over all vintages.
    pub capital_stock: Num,
    /// Outstanding debt.
    pub debt_stock: Num,
    /// Price per unit of output.
    pub price: Num,
    /// Labor cost per unit of output.
    pub unit_production_cost: Num,
    /// Stock-weighted productivity of the installed vintages.
    pub average_productivity: Num,
    /// Borrowing headroom left for the step.
    pub available_debt: Num,
    /// Set on the last row of a firm that exits at the end of the step.
    pub bankrupt: bool,
}

/// State of a capital-good firm as recorded in phase 5.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CapitalFirmRow {
    /// Step the values belong to; 0 is the initial state.
    pub step: u64,
    /// Firm the row describes.
    pub agent_id: FirmId,
    /// Price competitiveness from phase 1.
    pub competitiveness: Num,
    /// Machines ordered by consumption firms.
    pub demand: Num,
    /// Machines built; equal to the output.
    pub production: Num,
    /// Workers needed to build the output.
    pub labor_demand: Num,
    /// Machines built, capped by funds and the sector's labor ceiling.
    pub output: Num,
    /// Machines delivered.
    pub sales: Num,
    /// Revenue less production cost and interest.
    pub profit: Num,
    /// Cash at the end of the step; negative means insolvent.
    pub liquid_assets: Num,
    /// Outstanding debt.
    pub debt_stock: Num,
    /// Share of the firm's sector, in [0, 1].
    pub market_share: Num,
    /// Generation of the machine on sale.
    pub machine_generation: u32,
    /// Price of the machine on sale.
    pub price: Num,
    /// Labor cost per unit of output.
    pub unit_production_cost: Num,
    /// Productivity of the machine on sale.
    pub labor_productivity: Num,
    /// Borrowing headroom left for the step.
    pub available_debt: Num,
    /// Set on the last row of a firm that exits at the end of the step.
    pub bankrupt: bool,
}

/// A row for one of the two firm tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum FirmRow {
    Consumption(ConsumptionFirmRow),
    Capital(CapitalFirmRow),
}

impl FirmRow {
    /// `(step, agent_id)`.
    pub fn key(&self) -> (u64, FirmId) {
        match self {
            FirmRow::Consumption(r) => (r.step, r.agent_id),
            FirmRow::Capital(r) => (r.step, r.agent_id),
        }
    }
}

/// Append-only destination for simulation results.
pub trait RecordSink {
    /// Store the macro record of a step.
    fn record_macro(&mut self, record: MacroRecord);
    /// Store one firm row.
    fn record_firm(&mut self, row: FirmRow);
}

/// In-memory sink holding the macro series and both firm tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataCollector {
    macro_records: BTreeMap<u64, MacroRecord>,
    consumption_firms: BTreeMap<(u64, FirmId), ConsumptionFirmRow>,
    capital_firms: BTreeMap<(u64, FirmId), CapitalFirmRow>,
}

#[derive(Serialize)]
struct Tables<'a> {
    model: Vec<&'a MacroRecord>,
    consumption_firm: Vec<&'a ConsumptionFirmRow>,
    capital_firm: Vec<&'a CapitalFirmRow>,
}

impl DataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Macro records in step order.
    pub fn macro_records(&self) -> impl Iterator<Item = &MacroRecord> {
        self.macro_records.values()
    }

    pub fn macro_record(&self, step: u64) -> Option<&MacroRecord> {
        self.macro_records.get(&step)
    }

    pub fn last_macro_record(&self) -> Option<&MacroRecord> {
        self.macro_records.values().next_back()
    }

    /// Consumption firm rows ordered by `(step, agent_id)`.
    pub fn consumption_rows(&self) -> impl Iterator<Item = &ConsumptionFirmRow> {
        self.consumption_firms.values()
    }

    /// Capital firm rows ordered by `(step, agent_id)`.
    pub fn capital_rows(&self) -> impl Iterator<Item = &CapitalFirmRow> {
        self.capital_firms.values()
    }

    pub fn consumption_row(&self, step: u64, id: FirmId) -> Option<&ConsumptionFirmRow> {
        self.consumption_firms.get(&(step, id))
    }

    pub fn capital_row(&self, step: u64, id: FirmId) -> Option<&CapitalFirmRow> {
        self.capital_firms.get(&(step, id))
    }

    /// Total number of firm rows across both tables.
    pub fn firm_row_count(&self) -> usize {
        self.consumption_firms.len() + self.capital_firms.len()
    }

    /// All tables as one JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Tables {
            model: self.macro_records.values().collect(),
            consumption_firm: self.consumption_firms.values().collect(),
            capital_firm: self.capital_firms.values().collect(),
        })
    }
}

impl RecordSink for DataCollector {
    fn record_macro(&mut self, record: MacroRecord) {
        self.macro_records.insert(record.step, record);
    }

    fn record_firm(&mut self, row: FirmRow) {
        match row {
            FirmRow::Consumption(r) => {
                self.consumption_firms.insert((r.step, r.agent_id), r);
            }
            FirmRow::Capital(r) => {
                self.capital_firms.insert((r.step, r.agent_id), r);
            }
        }
    }
}
