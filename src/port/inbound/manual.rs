//! Manual invest requests.
//!
//! Button presses in the chat front-end arrive as callback strings of the
//! form `invest:<pool>:<amount>` and are parsed into a
//! [`ManualInvestRequest`] that goes through the same dispatch path as
//! autonomous cycles.
//!
//! The request id comes from the front-end, so a redelivered or repeated
//! press of the same button maps to the same idempotency key.

use rust_decimal::Decimal;

use crate::domain::id::{PoolId, RequestId, UserId};
use crate::domain::money::Amount;

/// Prefix of invest callback data.
pub const INVEST_CALLBACK_PREFIX: &str = "invest";

/// A user asked to invest a fixed amount into one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualInvestRequest {
    pub request_id: RequestId,
    pub user: UserId,
    pub pool: PoolId,
    pub amount: Amount,
}

impl ManualInvestRequest {
    #[must_use]
    pub fn new(user: UserId, pool: PoolId, amount: Amount) -> Self {
        Self {
            request_id: RequestId::new(),
            user,
            pool,
            amount,
        }
    }

    /// Parse `invest:<pool>:<amount>` callback data pressed at `origin`.
    ///
    /// Pool ids may themselves contain `:`; the amount is everything after
    /// the last separator.
    #[must_use]
    pub fn from_callback(user: UserId, origin: RequestId, data: &str) -> Option<Self> {
        let rest = data.strip_prefix(INVEST_CALLBACK_PREFIX)?.strip_prefix(':')?;
        let (pool, amount) = rest.rsplit_once(':')?;
        if pool.is_empty() {
            return None;
        }
        let amount: Decimal = amount.trim().parse().ok()?;
        let amount = Amount::try_new(amount).ok()?;
        Some(Self {
            request_id: origin,
            user,
            pool: PoolId::from(pool),
            amount,
        })
    }

    /// Render callback data for an invest button.
    #[must_use]
    pub fn callback_data(pool: &PoolId, amount: Amount) -> String {
        format!("{INVEST_CALLBACK_PREFIX}:{pool}:{}", amount.value())
    }
}
