//! Share quantity for a resolved sizing rule.

use crate::compiler::Sizing;

impl Sizing {
    /// Whole shares to trade at `price` given current `equity`.
    ///
    /// Cash-based modes round down so the order never exceeds the budget.
    /// A non-positive or non-finite price, or non-positive equity for the
    /// equity-based modes, sizes to zero.
    pub fn quantity(&self, price: f64, equity: f64) -> f64 {
        if !price.is_finite() || price <= 0.0 {
            return 0.0;
        }
        let budget = match self {
            Self::FixedShares { shares } => return *shares,
            Self::FixedCash { amount } => *amount,
            Self::AllAvailable => equity,
            Self::PercentOfEquity { percent } => equity * percent / 100.0,
        };
        if !budget.is_finite() || budget <= 0.0 {
            return 0.0;
        }
        (budget / price).floor()
    }

    /// Whether an entry sized this way opens a position at `price`.
    ///
    /// Equity-based modes are judged on their share alone (a zero percent
    /// never buys); fixed cash must cover at least one share.
    pub fn opens_at(&self, price: f64) -> bool {
        match self {
            Self::AllAvailable | Self::FixedShares { .. } => true,
            Self::PercentOfEquity { percent } => *percent > 0.0,
            Self::FixedCash { .. } => self.quantity(price, 0.0) >= 1.0,
        }
    }
}
