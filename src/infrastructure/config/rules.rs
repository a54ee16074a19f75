//! Opportunity rule configuration.

use serde::Deserialize;

use crate::domain::rule::{Rule, RuleConfig, RuleSet, RuleWeights};

/// `[rules.weights]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_apy_weight")]
    pub apy: f64,
    #[serde(default = "default_tvl_weight")]
    pub tvl: f64,
    #[serde(default = "default_volume_weight")]
    pub volume: f64,
}

const fn default_apy_weight() -> f64 {
    0.5
}

const fn default_tvl_weight() -> f64 {
    0.3
}

const fn default_volume_weight() -> f64 {
    0.2
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            apy: default_apy_weight(),
            tvl: default_tvl_weight(),
            volume: default_volume_weight(),
        }
    }
}

/// `[rules]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Minimum APY in percent (default: 15).
    #[serde(default = "default_min_apy")]
    pub min_apy: f64,
    /// Minimum TVL in dollars (default: 1,000,000).
    #[serde(default = "default_min_tvl")]
    pub min_tvl: f64,
    /// Minimum 24h volume in dollars (default: 100,000).
    #[serde(default = "default_min_volume")]
    pub min_volume_24h: f64,
    #[serde(default)]
    pub weights: WeightsConfig,
    /// Rules that must all hold (default: apy and tvl).
    #[serde(default = "default_required")]
    pub required: Vec<Rule>,
    /// Confidence floor (default: 0).
    #[serde(default)]
    pub min_confidence: f64,
}

const fn default_min_apy() -> f64 {
    15.0
}

const fn default_min_tvl() -> f64 {
    1_000_000.0
}

const fn default_min_volume() -> f64 {
    100_000.0
}

fn default_required() -> Vec<Rule> {
    vec![Rule::Apy, Rule::Tvl]
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            min_apy: default_min_apy(),
            min_tvl: default_min_tvl(),
            min_volume_24h: default_min_volume(),
            weights: WeightsConfig::default(),
            required: default_required(),
            min_confidence: 0.0,
        }
    }
}

impl From<&RulesConfig> for RuleConfig {
    fn from(config: &RulesConfig) -> Self {
        Self {
            min_apy: config.min_apy,
            min_tvl: config.min_tvl,
            min_volume_24h: config.min_volume_24h,
            weights: RuleWeights {
                apy: config.weights.apy,
                tvl: config.weights.tvl,
                volume: config.weights.volume,
            },
            required: config.required.iter().copied().collect::<RuleSet>(),
            min_confidence: config.min_confidence,
        }
    }
}
