//! Pool risk assessment shown alongside opportunities.
//!
//! Independent of the decision rules: a pool can clear every rule and still
//! be flagged as risky here. Scores are kept in tenths so level boundaries
//! are exact.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::snapshot::PoolSnapshot;

/// Coarse risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

/// One reason a pool scored as risky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    LowTvl,
    MediumTvl,
    VeryHighApy,
    HighApy,
    LowLiquidity,
}

impl RiskFactor {
    /// Contribution to the score, in tenths.
    const fn weight(self) -> u8 {
        match self {
            Self::LowTvl => 4,
            Self::VeryHighApy => 3,
            Self::MediumTvl | Self::HighApy | Self::LowLiquidity => 2,
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LowTvl => "low TVL",
            Self::MediumTvl => "medium TVL",
            Self::VeryHighApy => "very high APY",
            Self::HighApy => "high APY",
            Self::LowLiquidity => "low liquidity",
        })
    }
}

/// Result of [`assess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRisk {
    /// Score in tenths, 0 to 10.
    pub points: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

impl PoolRisk {
    /// Score in `[0, 1]`.
    #[must_use]
    pub fn score(&self) -> f64 {
        f64::from(self.points) / 10.0
    }

    /// Pools scoring under 0.6 are worth recommending.
    #[must_use]
    pub const fn recommended(&self) -> bool {
        self.points < 6
    }
}

/// Score a pool by depth, yield and turnover.
#[must_use]
pub fn assess(snapshot: &PoolSnapshot) -> PoolRisk {
    let mut factors = Vec::new();

    let tvl = snapshot.tvl();
    if tvl < 100_000.0 {
        factors.push(RiskFactor::LowTvl);
    } else if tvl < 1_000_000.0 {
        factors.push(RiskFactor::MediumTvl);
    }

    let apy = snapshot.apy();
    if apy > 100.0 {
        factors.push(RiskFactor::VeryHighApy);
    } else if apy > 50.0 {
        factors.push(RiskFactor::HighApy);
    }

    if tvl > 0.0 && snapshot.turnover() < 0.05 {
        factors.push(RiskFactor::LowLiquidity);
    }

    let points = factors.iter().map(|f| f.weight()).sum::<u8>().min(10);
    let level = if points > 7 {
        RiskLevel::High
    } else if points > 4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    PoolRisk {
        points,
        level,
        factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::PoolId;
    use chrono::Utc;

    fn snap(apy: f64, tvl: f64, volume: f64) -> PoolSnapshot {
        PoolSnapshot::new(PoolId::from("p"), "A/B", apy, tvl, volume, Utc::now())
    }

    #[test]
    fn deep_active_pool_is_low_risk() {
        let risk = assess(&snap(20.0, 5_000_000.0, 1_000_000.0));
        assert_eq!(risk.level, RiskLevel::Low);
        assert!(risk.factors.is_empty());
        assert!(risk.recommended());
    }

    #[test]
    fn shallow_high_yield_quiet_pool_is_high_risk() {
        let risk = assess(&snap(150.0, 50_000.0, 100.0));
        assert_eq!(
            risk.factors,
            vec![RiskFactor::LowTvl, RiskFactor::VeryHighApy, RiskFactor::LowLiquidity]
        );
        assert_eq!(risk.points, 9);
        assert_eq!(risk.level, RiskLevel::High);
        assert!(!risk.recommended());
    }

    #[test]
    fn medium_tvl_and_high_apy_is_low_at_the_boundary() {
        let risk = assess(&snap(60.0, 500_000.0, 100_000.0));
        assert_eq!(risk.points, 4);
        assert_eq!(risk.level, RiskLevel::Low);
    }

    #[test]
    fn medium_band() {
        let risk = assess(&snap(60.0, 500_000.0, 1_000.0));
        assert_eq!(risk.points, 6);
        assert_eq!(risk.level, RiskLevel::Medium);
        assert!(!risk.recommended());
        assert!((risk.score() - 0.6).abs() < f64::EPSILON);
    }
}
