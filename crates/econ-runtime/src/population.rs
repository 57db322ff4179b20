//! The live firm population: an arena keyed by id with per-sector views.
//!
//! Ids only grow (`next_id` is one past the largest live id), so key order is
//! creation order.

use std::collections::BTreeMap;

use econ_core::{FirmGroup, FirmId, SimError, SimResult};
use econ_firms::{CapitalGoodFirm, ConsumptionGoodFirm, Firm, SupplierView};

#[derive(Clone, Debug, Default)]
pub struct Population {
    firms: BTreeMap<FirmId, Firm>,
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a firm. Its id must not belong to a live firm.
    pub fn insert(&mut self, firm: Firm) -> SimResult<()> {
        let id = firm.id();
        if self.firms.contains_key(&id) {
            return Err(SimError::Invariant(format!("firm id {id} is already live")));
        }
        self.firms.insert(id, firm);
        Ok(())
    }

    pub fn remove(&mut self, id: FirmId) -> SimResult<Firm> {
        self.firms.remove(&id).ok_or(SimError::UnknownFirm(id))
    }

    pub fn get(&self, id: FirmId) -> Option<&Firm> {
        self.firms.get(&id)
    }

    pub fn get_mut(&mut self, id: FirmId) -> Option<&mut Firm> {
        self.firms.get_mut(&id)
    }

    pub fn contains(&self, id: FirmId) -> bool {
        self.firms.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.firms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.firms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Firm> {
        self.firms.values()
    }

    /// Firms of one sector in id order.
    pub fn group(&self, group: FirmGroup) -> impl Iterator<Item = &Firm> {
        self.firms.values().filter(move |f| f.group() == group)
    }

    pub fn group_mut(&mut self, group: FirmGroup) -> impl Iterator<Item = &mut Firm> {
        self.firms.values_mut().filter(move |f| f.group() == group)
    }

    /// Ids of one sector in id order.
    pub fn ids(&self, group: FirmGroup) -> Vec<FirmId> {
        self.group(group).map(Firm::id).collect()
    }

    pub fn count(&self, group: FirmGroup) -> usize {
        self.group(group).count()
    }

    /// Solvent consumption-good firms.
    pub fn consumption_firms(&self) -> impl Iterator<Item = &ConsumptionGoodFirm> {
        self.firms
            .values()
            .filter_map(Firm::as_consumption)
            .filter(|f| !f.core.bankrupt)
    }

    /// Solvent capital-good firms.
    pub fn capital_firms(&self) -> impl Iterator<Item = &CapitalGoodFirm> {
        self.firms
            .values()
            .filter_map(Firm::as_capital)
            .filter(|f| !f.core.bankrupt)
    }

    pub fn consumption_firm(&self, id: FirmId) -> SimResult<&ConsumptionGoodFirm> {
        self.get(id)
            .and_then(Firm::as_consumption)
            .ok_or(SimError::UnknownFirm(id))
    }

    pub fn capital_firm_mut(&mut self, id: FirmId) -> SimResult<&mut CapitalGoodFirm> {
        self.get_mut(id)
            .and_then(Firm::as_capital_mut)
            .ok_or(SimError::UnknownFirm(id))
    }

    /// One past the largest live id, or 0 for an empty population.
    pub fn next_id(&self) -> FirmId {
        self.firms
            .keys()
            .next_back()
            .map_or(FirmId(0), |id| id.next())
    }

    /// What consumption firms see of the capital-good market.
    pub fn capital_market(&self) -> BTreeMap<FirmId, SupplierView> {
        self.capital_firms().map(|f| (f.core.id, f.quote())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use econ_core::{Machine, Num};

    fn capital(id: u64) -> Firm {
        Firm::Capital(
            CapitalGoodFirm::new(FirmId(id), Num::ONE, Num::ONE, Num::from(100i64), Num::ONE, id)
                .unwrap(),
        )
    }

    fn consumption(id: u64) -> Firm {
        let machine = Machine::new(FirmId(0), 1, Num::from(100i64), Num::ONE).unwrap();
        Firm::Consumption(
            ConsumptionGoodFirm::new(
                FirmId(id),
                Num::ONE,
                Num::from(10i64),
                Num::ONE,
                Some(FirmId(0)),
                &[machine],
                Num::from(100i64),
                id,
            )
            .unwrap(),
        )
    }

    #[test]
    fn next_id_is_one_past_the_largest() {
        let mut p = Population::new();
        assert_eq!(p.next_id(), FirmId(0));
        p.insert(capital(0)).unwrap();
        p.insert(consumption(4)).unwrap();
        p.insert(consumption(2)).unwrap();
        assert_eq!(p.next_id(), FirmId(5));
        p.remove(FirmId(4)).unwrap();
        assert_eq!(p.next_id(), FirmId(3));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut p = Population::new();
        p.insert(capital(0)).unwrap();
        assert!(matches!(p.insert(capital(0)), Err(SimError::Invariant(_))));
        assert_eq!(p.remove(FirmId(9)).unwrap_err(), SimError::UnknownFirm(FirmId(9)));
    }

    #[test]
    fn group_views() {
        let mut p = Population::new();
        p.insert(capital(0)).unwrap();
        p.insert(consumption(1)).unwrap();
        p.insert(consumption(2)).unwrap();
        assert_eq!(p.ids(FirmGroup::Consumption), vec![FirmId(1), FirmId(2)]);
        assert_eq!(p.count(FirmGroup::Capital), 1);
        assert_eq!(p.capital_market().len(), 1);
        assert!(p.capital_firm_mut(FirmId(1)).is_err());
        assert!(p.consumption_firm(FirmId(2)).is_ok());
    }

    #[test]
    fn bankrupt_suppliers_leave_the_market() {
        let mut p = Population::new();
        p.insert(capital(0)).unwrap();
        p.insert(capital(1)).unwrap();
        p.capital_firm_mut(FirmId(1)).unwrap().core.bankrupt = true;
        let market = p.capital_market();
        assert!(market.contains_key(&FirmId(0)));
        assert!(!market.contains_key(&FirmId(1)));
    }
}
