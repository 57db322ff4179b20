//! Capital-good vintages.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::{FirmId, Num};

/// Key of a vintage inside a consumption firm's machine stock.
pub type VintageKey = (FirmId, u32);

/// A machine generation built by a capital-good firm.
///
/// Values are immutable; a producer that reprices or innovates replaces its
/// machine with a new value, and buyers keep their own copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    producer: FirmId,
    generation: u32,
    labor_productivity: Num,
    price: Num,
}

impl Machine {
    /// Validated constructor: generation >= 1, productivity and price > 0.
    pub fn new(
        producer: FirmId,
        generation: u32,
        labor_productivity: Num,
        price: Num,
    ) -> SimResult<Self> {
        if generation == 0 {
            return Err(SimError::Invariant(format!(
                "machine of producer {producer} has generation 0"
            )));
        }
        if !labor_productivity.is_positive() || !price.is_positive() {
            return Err(SimError::Invariant(format!(
                "machine of producer {producer} needs positive productivity and price, \
                 got {labor_productivity} and {price}"
            )));
        }
        Ok(Self {
            producer,
            generation,
            labor_productivity,
            price,
        })
    }

    /// Firm that built this vintage.
    pub fn producer(&self) -> FirmId {
        self.producer
    }

    /// Generation counter, starting at 1.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Labor productivity coefficient.
    pub fn labor_productivity(&self) -> Num {
        self.labor_productivity
    }

    /// Price of one unit.
    pub fn price(&self) -> Num {
        self.price
    }

    /// `(producer, generation)`.
    pub fn key(&self) -> VintageKey {
        (self.producer, self.generation)
    }

    /// Productivity per unit of price; buyers rank suppliers by it.
    pub fn productivity_price_ratio(&self) -> SimResult<Num> {
        self.labor_productivity
            .try_div(self.price, "machine productivity/price ratio")
    }

    /// Labor cost of one unit of output produced on this machine.
    pub fn unit_labor_cost(&self, wage: Num) -> SimResult<Num> {
        wage.try_div(self.labor_productivity, "machine unit labor cost")
    }

    /// Same vintage at a new price.
    pub fn priced_at(&self, price: Num) -> SimResult<Self> {
        Self::new(self.producer, self.generation, self.labor_productivity, price)
    }

    /// The next generation at the given productivity, keeping the current price.
    pub fn next_generation(&self, labor_productivity: Num) -> SimResult<Self> {
        Self::new(
            self.producer,
            self.generation + 1,
            labor_productivity,
            self.price,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine {
        Machine::new(FirmId(3), 1, Num::from(100i64), Num::new(13, 1)).unwrap()
    }

    #[test]
    fn derived_ratios() {
        let m = machine();
        assert_eq!(
            m.productivity_price_ratio().unwrap(),
            "76.923077".parse::<Num>().unwrap()
        );
        assert_eq!(m.unit_labor_cost(Num::from(100i64)).unwrap(), Num::ONE);
        assert_eq!(m.key(), (FirmId(3), 1));
    }

    #[test]
    fn rejects_degenerate_vintages() {
        assert!(Machine::new(FirmId(0), 1, Num::ZERO, Num::ONE).is_err());
        assert!(Machine::new(FirmId(0), 1, Num::ONE, Num::ZERO).is_err());
        assert!(Machine::new(FirmId(0), 0, Num::ONE, Num::ONE).is_err());
    }

    #[test]
    fn next_generation_keeps_price() {
        let m = machine();
        let next = m.next_generation(Num::from(110i64)).unwrap();
        assert_eq!(next.generation(), 2);
        assert_eq!(next.price(), m.price());
        assert_eq!(next.producer(), m.producer());
        assert_eq!(m.generation(), 1);
    }
}
