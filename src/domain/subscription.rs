//! User subscriptions to autonomous trading.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::{PoolId, UserId};
use super::money::Amount;
use super::opportunity::Opportunity;

/// Which pools a subscription reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolFilter {
    /// Any pool that produced an opportunity.
    Any,
    /// One specific pool.
    Pool(PoolId),
}

impl PoolFilter {
    #[must_use]
    pub fn matches(&self, pool: &PoolId) -> bool {
        match self {
            Self::Any => true,
            Self::Pool(id) => id == pool,
        }
    }
}

impl fmt::Display for PoolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Pool(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for PoolFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            Ok(Self::Any)
        } else {
            Ok(Self::Pool(PoolId::from(trimmed)))
        }
    }
}

/// Whether trades are really executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    /// Quote only; never calls execute.
    #[default]
    Simulate,
    Live,
}

impl TradeMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simulate => "simulate",
            Self::Live => "live",
        }
    }

    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulate" | "simulation" | "sim" => Ok(Self::Simulate),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown trade mode '{other}'")),
        }
    }
}

/// A user's standing instruction to act on matching opportunities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub user: UserId,
    pub filter: PoolFilter,
    pub mode: TradeMode,
    /// Fixed trade size; when absent the position sizer decides.
    #[serde(default)]
    pub amount: Option<Amount>,
    /// Personal APY floor on top of the global rule.
    #[serde(default)]
    pub min_apy: Option<f64>,
    /// Personal daily exposure limit. Only ever tightens the global cap.
    #[serde(default)]
    pub max_daily: Option<Amount>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Subscription {
    #[must_use]
    pub const fn new(user: UserId, filter: PoolFilter, mode: TradeMode) -> Self {
        Self {
            user,
            filter,
            mode,
            amount: None,
            min_apy: None,
            max_daily: None,
            active: true,
        }
    }

    /// True when this subscription should act on the opportunity.
    #[must_use]
    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        if !self.active || !self.filter.matches(opportunity.pool_id()) {
            return false;
        }
        match self.min_apy {
            Some(floor) => opportunity.snapshot().apy() >= floor,
            None => true,
        }
    }
}
