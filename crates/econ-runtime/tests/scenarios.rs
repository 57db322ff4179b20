use econ_core::{
    DataCollector, FirmGroup, FirmId, FirmRow, MacroRecord, Num, Phase, RecordSink, SimConfig,
    SimError,
};
use econ_runtime::Simulation;
use proptest::prelude::*;

fn small_config(n_consumption: usize, n_capital: usize) -> SimConfig {
    let mut config = SimConfig::benchmark();
    config.parameters.n_consumption_firms = n_consumption;
    config.parameters.n_capital_firms = n_capital;
    config.parameters.innovation = false;
    config.parameters.fix_supplier = true;
    config.seed = 7;
    config
}

fn tolerance() -> Num {
    Num::new(1, 6)
}

fn assert_invariants(sim: &Simulation) {
    let population = sim.economy().population();
    for firm in population.consumption_firms() {
        let stock: Num = firm.machines().values().map(|v| v.stock).sum();
        assert_eq!(firm.capital_stock(), stock, "firm {}", firm.core.id);
    }
    for group in FirmGroup::ORDER {
        let total: Num = population
            .group(group)
            .map(|f| f.core().market_share)
            .sum();
        let gap = if total > Num::ONE {
            total - Num::ONE
        } else {
            Num::ONE - total
        };
        assert!(gap <= tolerance(), "{group} shares sum to {total}");
    }
}

#[test]
fn deterministic_bootstrap_keeps_the_only_supplier() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    let suppliers: Vec<Option<FirmId>> = sim
        .economy()
        .population()
        .consumption_firms()
        .map(|f| f.supplier)
        .collect();
    assert_eq!(suppliers, vec![Some(FirmId(0)); 4]);

    assert_eq!(sim.step().unwrap(), 1);
    for firm in sim.economy().population().consumption_firms() {
        assert_eq!(firm.supplier, Some(FirmId(0)));
        assert_eq!(firm.capital_stock(), Num::from(2200i64));
    }
    let record = sim.sink().macro_record(1).unwrap();
    assert_eq!(record.market_wage, Num::from(101i64));
    assert_eq!(record.investment, Num::from(800i64));
    assert_eq!(record.employment, Num::from(3000i64));
    assert_eq!(record.production, Num::from(299_200i64));
}

#[test]
fn construction_records_step_zero() {
    let sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    let sink = sim.sink();
    assert_eq!(sink.macro_records().count(), 1);
    assert_eq!(sink.macro_record(0).unwrap().consumption, Num::from(330_000i64));
    assert_eq!(sink.consumption_rows().count(), 4);
    assert_eq!(sink.capital_rows().count(), 1);
}

#[test]
fn bankrupt_firm_is_replaced_by_an_entrant() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    for phase in [Phase::One, Phase::Two, Phase::Three, Phase::Four] {
        sim.run_phase(phase).unwrap();
    }
    sim.economy_mut()
        .population_mut()
        .get_mut(FirmId(2))
        .unwrap()
        .core_mut()
        .liquid_assets = Num::from(-1i64);
    sim.run_phase(Phase::Five).unwrap();
    assert_eq!(sim.finish_step().unwrap(), 1);

    let population = sim.economy().population();
    assert!(!population.contains(FirmId(2)));
    assert_eq!(population.count(FirmGroup::Consumption), 4);
    assert_eq!(population.count(FirmGroup::Capital), 1);
    let entrant = population.consumption_firm(FirmId(5)).unwrap();
    let incumbent = population.consumption_firm(FirmId(1)).unwrap();
    assert_eq!(entrant.core.liquid_assets, incumbent.core.liquid_assets);
    assert_eq!(entrant.core.market_share, incumbent.core.market_share);
    assert_eq!(entrant.capital_stock(), incumbent.capital_stock());

    let sink = sim.sink();
    assert!(sink.consumption_row(1, FirmId(2)).unwrap().bankrupt);
    assert!(!sink.consumption_row(1, FirmId(1)).unwrap().bankrupt);
    assert!(sink.consumption_row(1, FirmId(5)).is_none());
    assert_eq!(sink.macro_record(1).unwrap().bankrupt_consumption, 1);
    assert_invariants(&sim);
}

#[test]
fn entrant_starts_without_the_incumbents_inventory_or_debt() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    for phase in [Phase::One, Phase::Two, Phase::Three, Phase::Four] {
        sim.run_phase(phase).unwrap();
    }
    for firm in sim
        .economy_mut()
        .population_mut()
        .group_mut(FirmGroup::Consumption)
    {
        if let Some(firm) = firm.as_consumption_mut() {
            firm.inventory = Num::from(5000i64);
        }
    }
    sim.economy_mut()
        .population_mut()
        .get_mut(FirmId(3))
        .unwrap()
        .core_mut()
        .liquid_assets = Num::from(-1i64);
    sim.run_phase(Phase::Five).unwrap();
    sim.finish_step().unwrap();

    let population = sim.economy().population();
    let entrant = population.consumption_firm(FirmId(5)).unwrap();
    assert_eq!(entrant.inventory, Num::ZERO);
    assert_eq!(entrant.core.debt_stock, Num::ZERO);
    assert_eq!(entrant.supplier, None);
    assert!(entrant.demand.is_positive());
    assert_eq!(entrant.production, entrant.demand);
    assert_eq!(entrant.sales, entrant.demand);
    for id in [1, 2, 4] {
        let incumbent = population.consumption_firm(FirmId(id)).unwrap();
        assert_eq!(incumbent.inventory, Num::from(5000i64));
    }

    sim.step().unwrap();
    assert!(sim.sink().consumption_row(2, FirmId(5)).is_some());
    assert_invariants(&sim);
}

#[test]
fn zero_demand_is_not_a_fault() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    let firm = sim
        .economy_mut()
        .population_mut()
        .get_mut(FirmId(3))
        .and_then(|f| f.as_consumption_mut())
        .unwrap();
    firm.demand = Num::ZERO;
    firm.sales = Num::ZERO;
    sim.step().unwrap();
    let row = sim.sink().consumption_row(1, FirmId(3)).unwrap();
    assert_eq!(row.expected_demand, Num::ZERO);
    assert_eq!(row.expansion_investment, Num::ZERO);
}

#[test]
fn invariants_hold_every_step() {
    let mut config = small_config(20, 5);
    config.parameters.innovation = true;
    config.parameters.fix_supplier = false;
    let mut sim = Simulation::from_config(&config).unwrap();
    let counts = (
        sim.economy().population().count(FirmGroup::Consumption),
        sim.economy().population().count(FirmGroup::Capital),
    );
    for _ in 0..12 {
        sim.step().unwrap();
        assert_invariants(&sim);
        let population = sim.economy().population();
        assert_eq!(
            (
                population.count(FirmGroup::Consumption),
                population.count(FirmGroup::Capital)
            ),
            counts
        );
    }
}

#[test]
fn shuffling_does_not_change_results() {
    for seed in [1, 7, 42] {
        let mut config = small_config(20, 5);
        config.seed = seed;
        config.parameters.innovation = true;
        config.parameters.fix_supplier = false;
        let mut plain = Simulation::from_config(&config).unwrap();
        config.shuffle = true;
        let mut shuffled = Simulation::from_config(&config).unwrap();
        assert_eq!(plain.run(8), shuffled.run(8), "seed {seed}");
        assert_eq!(plain.into_sink(), shuffled.into_sink(), "seed {seed}");
    }
}

#[test]
fn same_seed_same_run() {
    let config = small_config(8, 2);
    let mut a = Simulation::from_config(&config).unwrap();
    let mut b = Simulation::from_config(&config).unwrap();
    a.run(5);
    b.run(5);
    assert_eq!(a.sink(), b.sink());
}

#[test]
fn collecting_twice_does_not_duplicate_rows() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    sim.step().unwrap();
    sim.step().unwrap();
    let before = sim.sink().clone();
    sim.collect();
    sim.collect();
    assert_eq!(sim.sink(), &before);
    assert_eq!(sim.sink().firm_row_count(), 15);
    assert_eq!(sim.sink().macro_records().count(), 3);
}

#[test]
fn phases_out_of_order_are_rejected_without_halting() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    assert_eq!(
        sim.run_phase(Phase::Three),
        Err(SimError::PhaseOrder {
            expected: Phase::One,
            got: Phase::Three
        })
    );
    assert!(!sim.is_halted());
    assert_eq!(sim.step().unwrap(), 1);
}

#[test]
fn a_fault_discards_the_step_and_halts() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    for phase in [Phase::One, Phase::Two, Phase::Three, Phase::Four] {
        sim.run_phase(phase).unwrap();
    }
    sim.economy_mut()
        .population_mut()
        .capital_firm_mut(FirmId(0))
        .unwrap()
        .core
        .market_share = Num::ZERO;
    assert_eq!(
        sim.run_phase(Phase::Five),
        Err(SimError::SectorCollapse(FirmGroup::Capital))
    );
    assert!(sim.is_halted());
    assert_eq!(sim.step(), Err(SimError::Halted));
    assert_eq!(sim.steps(), 0);
    assert!(sim.sink().macro_record(1).is_none());
    assert!(sim.sink().consumption_row(1, FirmId(1)).is_none());

    let report = sim.run(3);
    assert_eq!(report.completed, 0);
    assert_eq!(report.fault, Some(SimError::Halted));
}

#[test]
fn a_sector_without_survivors_collapses() {
    let mut sim = Simulation::from_config(&small_config(4, 1)).unwrap();
    for phase in [Phase::One, Phase::Two, Phase::Three, Phase::Four] {
        sim.run_phase(phase).unwrap();
    }
    for firm in sim
        .economy_mut()
        .population_mut()
        .group_mut(FirmGroup::Consumption)
    {
        firm.core_mut().liquid_assets = Num::from(-1i64);
    }
    assert_eq!(
        sim.run_phase(Phase::Five),
        Err(SimError::SectorCollapse(FirmGroup::Consumption))
    );
    assert!(sim.is_halted());
}

#[derive(Default)]
struct CountingSink {
    macros: usize,
    rows: usize,
}

impl RecordSink for CountingSink {
    fn record_macro(&mut self, _record: MacroRecord) {
        self.macros += 1;
    }

    fn record_firm(&mut self, _row: FirmRow) {
        self.rows += 1;
    }
}

#[test]
fn any_sink_receives_each_completed_step() {
    let mut sim = Simulation::new(&small_config(4, 1), CountingSink::default()).unwrap();
    let report = sim.run(2);
    assert_eq!(report.completed, 2);
    let sink = sim.into_sink();
    assert_eq!(sink.macros, 3);
    assert_eq!(sink.rows, 15);
}

#[test]
fn collecting_again_sends_nothing_to_the_sink() {
    let mut sim = Simulation::new(&small_config(4, 1), CountingSink::default()).unwrap();
    sim.step().unwrap();
    sim.collect();
    sim.collect();
    let sink = sim.into_sink();
    assert_eq!(sink.rows, 10);
    assert_eq!(sink.macros, 2);
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let mut config = small_config(4, 1);
    config.parameters.desired_capital_utilization = Num::ZERO;
    let err = Simulation::new(&config, DataCollector::new()).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
    assert!(!err.is_fault());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn exit_and_entry_keep_population_and_shares(seed in any::<u64>()) {
        let mut config = small_config(20, 5);
        config.seed = seed;
        config.parameters.innovation = true;
        config.parameters.fix_supplier = false;
        let mut sim = Simulation::from_config(&config).unwrap();
        for step in 1..=4u64 {
            prop_assert_eq!(sim.step(), Ok(step));
            assert_invariants(&sim);
            let population = sim.economy().population();
            prop_assert_eq!(population.count(FirmGroup::Consumption), 20);
            prop_assert_eq!(population.count(FirmGroup::Capital), 5);
        }
    }
}
