//! State and financing rules shared by both kinds of firm.

use econ_core::{FirmGroup, FirmId, Num, SimResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Competitiveness every firm starts with.
pub const INITIAL_COMPETITIVENESS: i64 = 100;

/// Resolution of uniform draws: eight decimal places.
const UNIFORM_RESOLUTION: i64 = 100_000_000;

/// Balance sheet, market position and financing capacity of a firm.
///
/// `residual_assets` and `available_debt` are the internal and external funds
/// still unallocated in the current step. They are reset in phase 1 and
/// drawn down by [`FirmCore::commit_financing`].
#[derive(Clone, Debug)]
pub struct FirmCore {
    pub id: FirmId,
    pub group: FirmGroup,
    pub liquid_assets: Num,
    pub market_share: Num,
    pub debt_stock: Num,
    pub unit_production_cost: Num,
    pub competitiveness: Num,
    pub bankrupt: bool,
    pub residual_assets: Num,
    pub available_debt: Num,
    /// Internal funds committed to investment this step.
    pub capital_employed: Num,
    /// Debt committed to investment this step.
    pub debt_employed: Num,
    pub(crate) rng: ChaCha8Rng,
}

impl FirmCore {
    /// Fresh firm with no debt. `seed` initializes the firm's private random stream.
    pub fn new(
        id: FirmId,
        group: FirmGroup,
        liquid_assets: Num,
        market_share: Num,
        seed: u64,
    ) -> Self {
        Self {
            id,
            group,
            liquid_assets,
            market_share,
            debt_stock: Num::ZERO,
            unit_production_cost: Num::ZERO,
            competitiveness: Num::from(INITIAL_COMPETITIVENESS),
            bankrupt: false,
            residual_assets: liquid_assets,
            available_debt: Num::ZERO,
            capital_employed: Num::ZERO,
            debt_employed: Num::ZERO,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Markup pricing: `(1 + markup) * unit_production_cost`.
    pub fn fix_price(&self, markup: Num) -> Num {
        (Num::ONE + markup) * self.unit_production_cost
    }

    /// New borrowing capacity: `max(0, ratio * sales - debt_stock)`.
    pub fn debt_availability(&self, max_debt_sales_ratio: Num, sales: Num) -> Num {
        (max_debt_sales_ratio * sales - self.debt_stock).non_negative()
    }

    /// Phase-1 reset of the step's funds.
    pub fn reset_financing(&mut self, max_debt_sales_ratio: Num, sales: Num) {
        self.residual_assets = self.liquid_assets;
        self.available_debt = self.debt_availability(max_debt_sales_ratio, sales);
    }

    /// Internal plus external funds still unallocated.
    pub fn available_financing(&self) -> Num {
        self.residual_assets + self.available_debt
    }

    /// Largest whole quantity the unallocated funds can pay for at `unit_cost`.
    pub fn max_quantity(&self, unit_cost: Num) -> SimResult<Num> {
        Ok(self
            .available_financing()
            .try_div(unit_cost, "financeable quantity")?
            .trunc()
            .non_negative())
    }

    /// Pecking order for `quantity * unit_cost`: internal funds first, then
    /// debt. Returns `(capital, debt)`; their sum falls short of the cost when
    /// the firm cannot afford it.
    pub fn finance_operations(&self, quantity: Num, unit_cost: Num) -> (Num, Num) {
        let cost = quantity * unit_cost;
        let capital = cost.min(self.residual_assets.non_negative());
        let debt = (cost - capital).min(self.available_debt.non_negative());
        (capital, debt)
    }

    /// Draw down the step's funds.
    pub fn commit_financing(&mut self, capital: Num, debt: Num) {
        self.residual_assets -= capital;
        self.available_debt -= debt;
    }

    /// Return funds to the step's pool.
    pub fn release_financing(&mut self, capital: Num, debt: Num) {
        self.residual_assets += capital;
        self.available_debt += debt;
    }

    /// Exit condition: no market share left or negative liquidity.
    pub fn is_insolvent(&self) -> bool {
        !self.market_share.is_positive() || self.liquid_assets.is_negative()
    }

    /// Phase-5 check before the row is recorded. A bankrupt firm leaves the
    /// population at the end of the step.
    pub fn settle_solvency(&mut self) -> bool {
        self.bankrupt |= self.is_insolvent();
        self.bankrupt
    }

    /// Uniform draw from `[lower, upper]` on the firm's random stream.
    pub fn draw_uniform(&mut self, lower: Num, upper: Num) -> Num {
        let u = Num::new(self.rng.gen_range(0..=UNIFORM_RESOLUTION), 8);
        lower + (upper - lower) * u
    }
}
