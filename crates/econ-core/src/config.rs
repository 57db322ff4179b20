//! Simulation parameters, initial conditions and their validation.
//!
//! Configuration is plain data deserialized from YAML. Every numeric option is
//! a [`Num`]; YAML numbers are read through their literal text, never through
//! binary floating point arithmetic.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::Num;

/// Weights of the wage-setting rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WageSetting {
    /// Weight on the relative CPI change.
    pub cpi_weight: Num,
    /// Weight on the relative average productivity change.
    pub avg_lp_weight: Num,
    /// Weight on the change of the unemployment rate.
    pub unemployment_weight: Num,
}

/// Government consumption rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPolicy {
    /// `wage_share * wage * labor_supply`.
    #[default]
    Base,
    /// `wage_share * unemployment`.
    Welfare,
}

/// How consumption firms form expected demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandForecast {
    /// Expected demand equals current demand.
    #[default]
    Myopic,
    /// Weighted sum of the last four recorded demands with `betas`.
    Adaptive,
}

/// Behavioral parameters. Immutable once the simulation is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of consumption-good firms.
    pub n_consumption_firms: usize,
    /// Number of capital-good firms.
    pub n_capital_firms: usize,
    /// Replicator coefficients; the first applies to consumption firms.
    pub replicator_dynamics_coeff: (Num, Num),
    /// `((w1, w2), (w3, w4))` for the consumption and capital sectors.
    pub competitiveness_weights: ((Num, Num), (Num, Num)),
    /// Bounds of the uniform productivity shock drawn on innovation.
    pub distribution_bounds: (Num, Num),
    /// Per-step growth rate of labor supply.
    pub labor_supply_growth: Num,
    /// Wage rule weights.
    pub wage_setting: WageSetting,
    /// Desired capital utilization in (0, 1].
    pub desired_capital_utilization: Num,
    /// Relative capital gap that triggers expansion investment.
    pub trigger_rule: Num,
    /// Payback threshold below which a vintage is scrapped.
    pub payback_period_parameter: Num,
    /// Markup over unit production cost.
    pub markup: Num,
    /// Interest rate on the debt stock.
    pub interest_rate: Num,
    /// Share used by the government consumption rule.
    pub wage_share: Num,
    /// Lag coefficients of the adaptive demand forecast, at least four.
    pub betas: Vec<Num>,
    /// Debt ceiling as a multiple of last sales.
    pub max_debt_sales_ratio: Num,
    /// Whether capital firms draw productivity shocks.
    pub innovation: bool,
    /// Government consumption rule.
    pub social_policy: SocialPolicy,
    /// Fraction of unsold inventory lost per step, in [0, 1].
    pub inventory_depreciation: Num,
    /// Assign initial suppliers in blocks of four instead of leaving them unset.
    pub fix_supplier: bool,
    /// How many capital firms a consumption firm samples when choosing a supplier.
    #[serde(default = "default_supplier_sample_size")]
    pub supplier_sample_size: usize,
    /// Demand expectation rule.
    #[serde(default)]
    pub demand_forecast: DemandForecast,
}

fn default_supplier_sample_size() -> usize {
    10
}

fn default_machine_price() -> Num {
    Num::ONE
}

/// Macro levels and firm endowments at step 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    /// Market wage.
    pub market_wage: Num,
    /// Consumer price index.
    pub cpi: Num,
    /// Average labor productivity; also the productivity of every initial machine.
    pub avg_labor_productivity: Num,
    /// Liquid assets of every initial firm.
    pub liquid_assets: Num,
    /// Capital stock (machine units) of every initial consumption firm.
    pub capital_stock: Num,
    /// Labor supply.
    pub labor_supply: Num,
    /// Price of every initial machine.
    #[serde(default = "default_machine_price")]
    pub machine_price: Num,
}

/// Everything needed to build a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Behavioral parameters.
    pub parameters: Parameters,
    /// Step-0 state.
    pub initial_conditions: InitialConditions,
    /// Seed for every random draw.
    #[serde(default)]
    pub seed: u64,
    /// Shuffle agent iteration order within each phase.
    #[serde(default)]
    pub shuffle: bool,
}

fn positive(field: &'static str, value: Num) -> Result<(), ConfigError> {
    if value.is_positive() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field })
    }
}

fn at_least(field: &'static str, value: Num, min: Num) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
        })
    }
}

fn above(field: &'static str, value: Num, min: Num) -> Result<(), ConfigError> {
    if value > min {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
        })
    }
}

impl Parameters {
    /// Check every documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_consumption_firms == 0 {
            return Err(ConfigError::NonPositive {
                field: "n_consumption_firms",
            });
        }
        if self.n_capital_firms == 0 {
            return Err(ConfigError::NonPositive {
                field: "n_capital_firms",
            });
        }
        if self.supplier_sample_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "supplier_sample_size",
            });
        }
        if self.distribution_bounds.0 > self.distribution_bounds.1 {
            return Err(ConfigError::InvalidBounds);
        }
        above(
            "distribution_bounds",
            self.distribution_bounds.0,
            -Num::ONE,
        )?;
        above("labor_supply_growth", self.labor_supply_growth, -Num::ONE)?;
        positive(
            "desired_capital_utilization",
            self.desired_capital_utilization,
        )?;
        if self.desired_capital_utilization > Num::ONE {
            return Err(ConfigError::OutOfRange {
                field: "desired_capital_utilization",
                value: self.desired_capital_utilization.to_string(),
            });
        }
        at_least("inventory_depreciation", self.inventory_depreciation, Num::ZERO)?;
        if self.inventory_depreciation > Num::ONE {
            return Err(ConfigError::OutOfRange {
                field: "inventory_depreciation",
                value: self.inventory_depreciation.to_string(),
            });
        }
        at_least("trigger_rule", self.trigger_rule, Num::ZERO)?;
        above("markup", self.markup, -Num::ONE)?;
        at_least("interest_rate", self.interest_rate, Num::ZERO)?;
        at_least("wage_share", self.wage_share, Num::ZERO)?;
        at_least("max_debt_sales_ratio", self.max_debt_sales_ratio, Num::ZERO)?;
        if self.betas.len() < 4 {
            return Err(ConfigError::TooFewBetas(self.betas.len()));
        }
        Ok(())
    }

    /// Capital sector's share of labor: `n_capital / (n_consumption + n_capital)`.
    pub fn max_capital_labor_share(&self) -> Num {
        let total = Num::from(self.n_consumption_firms + self.n_capital_firms);
        Num::from(self.n_capital_firms)
            .checked_div(total)
            .unwrap_or(Num::ZERO)
    }
}

impl InitialConditions {
    /// Check every documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("market_wage", self.market_wage)?;
        positive("cpi", self.cpi)?;
        positive("avg_labor_productivity", self.avg_labor_productivity)?;
        positive("labor_supply", self.labor_supply)?;
        positive("capital_stock", self.capital_stock)?;
        positive("machine_price", self.machine_price)?;
        if self.capital_stock.trunc() != self.capital_stock {
            return Err(ConfigError::OutOfRange {
                field: "capital_stock",
                value: self.capital_stock.to_string(),
            });
        }
        at_least("liquid_assets", self.liquid_assets, Num::ZERO)?;
        Ok(())
    }
}

impl SimConfig {
    /// Validate parameters and initial conditions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters.validate()?;
        self.initial_conditions.validate()
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading simulation config");
        Self::from_yaml_str(&text)
    }

    /// Reference parameter set: 200 consumption and 50 capital firms.
    pub fn benchmark() -> Self {
        SimConfig {
            parameters: Parameters {
                n_consumption_firms: 200,
                n_capital_firms: 50,
                replicator_dynamics_coeff: (Num::new(-5, 1), Num::new(-5, 1)),
                competitiveness_weights: ((Num::ONE, Num::ONE), (Num::ONE, Num::ONE)),
                distribution_bounds: (Num::new(-5, 2), Num::new(5, 2)),
                labor_supply_growth: Num::ZERO,
                wage_setting: WageSetting {
                    cpi_weight: Num::new(75, 2),
                    avg_lp_weight: Num::ONE,
                    unemployment_weight: Num::new(1, 1),
                },
                desired_capital_utilization: Num::new(75, 2),
                trigger_rule: Num::new(1, 1),
                payback_period_parameter: Num::from(4i64),
                markup: Num::new(3, 1),
                interest_rate: Num::new(1, 2),
                wage_share: Num::new(1, 1),
                betas: vec![
                    Num::new(7, 1),
                    Num::new(3, 1),
                    Num::ZERO,
                    Num::ZERO,
                    Num::new(25, 2),
                    Num::ONE,
                    Num::new(5, 2),
                    Num::new(25, 2),
                ],
                max_debt_sales_ratio: Num::ONE,
                innovation: false,
                social_policy: SocialPolicy::Base,
                inventory_depreciation: Num::ZERO,
                fix_supplier: true,
                supplier_sample_size: default_supplier_sample_size(),
                demand_forecast: DemandForecast::Myopic,
            },
            initial_conditions: InitialConditions {
                market_wage: Num::from(100i64),
                cpi: Num::new(13, 1),
                avg_labor_productivity: Num::from(100i64),
                liquid_assets: Num::from(3000i64),
                capital_stock: Num::from(2000i64),
                labor_supply: Num::from(3000i64),
                machine_price: Num::ONE,
            },
            seed: 42,
            shuffle: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
parameters:
  n_consumption_firms: 8
  n_capital_firms: 2
  replicator_dynamics_coeff: [-0.5, -0.5]
  competitiveness_weights: [[1, 1], [1, 1]]
  distribution_bounds: [-0.05, 0.05]
  labor_supply_growth: 0.01
  wage_setting:
    cpi_weight: 0.75
    avg_lp_weight: 1
    unemployment_weight: 0.1
  desired_capital_utilization: 0.75
  trigger_rule: 0.1
  payback_period_parameter: 4
  markup: 0.3
  interest_rate: 0.01
  wage_share: 0.1
  betas: [0.7, 0.3, 0, 0]
  max_debt_sales_ratio: 1
  innovation: true
  social_policy: welfare
  inventory_depreciation: 0
  fix_supplier: false
initial_conditions:
  market_wage: 100
  cpi: 1.3
  avg_labor_productivity: 100
  liquid_assets: 3000
  capital_stock: 2000
  labor_supply: 3000
seed: 7
"#;

    #[test]
    fn benchmark_is_valid() {
        let cfg = SimConfig::benchmark();
        cfg.validate().unwrap();
        assert_eq!(cfg.parameters.max_capital_labor_share(), Num::new(2, 1));
    }

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg = SimConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(cfg.parameters.n_consumption_firms, 8);
        assert_eq!(cfg.parameters.labor_supply_growth, Num::new(1, 2));
        assert_eq!(cfg.parameters.social_policy, SocialPolicy::Welfare);
        assert_eq!(cfg.parameters.supplier_sample_size, 10);
        assert_eq!(cfg.parameters.demand_forecast, DemandForecast::Myopic);
        assert_eq!(cfg.initial_conditions.cpi, Num::new(13, 1));
        assert_eq!(cfg.initial_conditions.machine_price, Num::ONE);
        assert_eq!(cfg.seed, 7);
        assert!(!cfg.shuffle);
    }

    #[test]
    fn shipped_benchmark_file_matches_builtin() {
        let cfg = SimConfig::from_yaml_str(include_str!("../../../configs/benchmark.yaml")).unwrap();
        assert_eq!(cfg, SimConfig::benchmark());
    }

    #[test]
    fn rejects_zero_firm_counts() {
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.n_capital_firms = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositive {
                field: "n_capital_firms"
            })
        );
    }

    #[test]
    fn rejects_out_of_range_utilization_and_depreciation() {
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.desired_capital_utilization = Num::new(11, 1);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "desired_capital_utilization",
                ..
            })
        ));
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.desired_capital_utilization = Num::ZERO;
        assert!(cfg.validate().is_err());
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.inventory_depreciation = Num::new(-1, 1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_short_betas_and_reversed_bounds() {
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.betas.truncate(3);
        assert_eq!(cfg.validate(), Err(ConfigError::TooFewBetas(3)));
        let mut cfg = SimConfig::benchmark();
        cfg.parameters.distribution_bounds = (Num::ONE, Num::ZERO);
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidBounds));
    }

    #[test]
    fn rejects_fractional_capital_stock() {
        let mut cfg = SimConfig::benchmark();
        cfg.initial_conditions.capital_stock = Num::new(205, 1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            SimConfig::from_yaml_str("parameters: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }
}
