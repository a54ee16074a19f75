//! Position sizing for autonomous trades.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::money::Amount;
use super::snapshot::PoolSnapshot;

/// Scales the single-trade cap by pool depth and turnover.
///
/// Shallow pools get a smaller slice of the cap; pools whose daily volume is
/// a large fraction of their TVL get a small boost. The result never
/// exceeds the cap and is rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSizer {
    cap: Decimal,
}

impl PositionSizer {
    #[must_use]
    pub const fn new(cap: Decimal) -> Self {
        Self { cap }
    }

    /// Size a trade for `snapshot`, or `None` if the result rounds to zero.
    #[must_use]
    pub fn size(&self, snapshot: &PoolSnapshot) -> Option<Amount> {
        let tvl = snapshot.tvl();
        let depth = if tvl < 100_000.0 {
            dec!(0.1)
        } else if tvl < 1_000_000.0 {
            dec!(0.3)
        } else {
            dec!(0.5)
        };

        let turnover = snapshot.turnover();
        let activity = if turnover > 0.5 {
            dec!(1.2)
        } else if turnover < 0.1 {
            dec!(0.8)
        } else {
            Decimal::ONE
        };

        let raw = (self.cap * depth * activity).min(self.cap);
        let rounded = raw.round_dp_with_strategy(2, RoundingStrategy::ToZero);
        Amount::try_new(rounded).ok()
    }

    /// Convert a floating-point dollar value to a cent-rounded amount.
    #[must_use]
    pub fn from_f64(value: f64) -> Option<Amount> {
        let decimal = Decimal::from_f64(value)?;
        Amount::try_new(decimal.round_dp_with_strategy(2, RoundingStrategy::ToZero)).ok()
    }
}
