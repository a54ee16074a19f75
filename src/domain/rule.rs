//! Threshold rules evaluated against pool snapshots.
//!
//! Each [`Rule`] is an independent boolean predicate. A value exactly at its
//! threshold satisfies the rule.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::snapshot::PoolSnapshot;

/// One threshold predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    Apy,
    Tvl,
    Volume,
}

impl Rule {
    pub const ALL: [Rule; 3] = [Rule::Apy, Rule::Tvl, Rule::Volume];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apy => "apy",
            Self::Tvl => "tvl",
            Self::Volume => "volume",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Apy => 0b001,
            Self::Tvl => 0b010,
            Self::Volume => 0b100,
        }
    }

    /// The snapshot metric this rule inspects.
    #[must_use]
    pub fn value(self, snapshot: &PoolSnapshot) -> f64 {
        match self {
            Self::Apy => snapshot.apy(),
            Self::Tvl => snapshot.tvl(),
            Self::Volume => snapshot.volume_24h(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of rules, used both for "which rules fired" and "which are required".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RuleSet(u8);

impl RuleSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn with(mut self, rule: Rule) -> Self {
        self.insert(rule);
        self
    }

    pub fn insert(&mut self, rule: Rule) {
        self.0 |= rule.bit();
    }

    #[must_use]
    pub const fn contains(&self, rule: Rule) -> bool {
        self.0 & rule.bit() != 0
    }

    /// True when every rule in `other` is also in `self`.
    #[must_use]
    pub const fn is_superset(&self, other: &RuleSet) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Rule> + '_ {
        Rule::ALL.into_iter().filter(|rule| self.contains(*rule))
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = Self::empty();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(Rule::as_str).collect();
        write!(f, "[{}]", names.join(","))
    }
}

/// Relative weight of each rule in the confidence score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleWeights {
    pub apy: f64,
    pub tvl: f64,
    pub volume: f64,
}

impl RuleWeights {
    #[must_use]
    pub const fn get(&self, rule: Rule) -> f64 {
        match rule {
            Rule::Apy => self.apy,
            Rule::Tvl => self.tvl,
            Rule::Volume => self.volume,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.apy + self.tvl + self.volume
    }
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            apy: 0.5,
            tvl: 0.3,
            volume: 0.2,
        }
    }
}

/// Thresholds, weights and acceptance criteria for opportunity evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleConfig {
    /// Minimum APY in percent.
    pub min_apy: f64,
    /// Minimum TVL in USD.
    pub min_tvl: f64,
    /// Minimum 24h volume in USD.
    pub min_volume_24h: f64,
    pub weights: RuleWeights,
    /// Rules that must all hold for an opportunity to exist.
    pub required: RuleSet,
    /// Floor on the confidence score.
    pub min_confidence: f64,
}

impl RuleConfig {
    #[must_use]
    pub const fn threshold(&self, rule: Rule) -> f64 {
        match rule {
            Rule::Apy => self.min_apy,
            Rule::Tvl => self.min_tvl,
            Rule::Volume => self.min_volume_24h,
        }
    }

    /// Inclusive threshold check for a single rule.
    #[must_use]
    pub fn is_satisfied(&self, rule: Rule, snapshot: &PoolSnapshot) -> bool {
        rule.value(snapshot) >= self.threshold(rule)
    }

    /// Every rule the snapshot satisfies.
    #[must_use]
    pub fn triggered(&self, snapshot: &PoolSnapshot) -> RuleSet {
        Rule::ALL
            .into_iter()
            .filter(|rule| self.is_satisfied(*rule, snapshot))
            .collect()
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_apy: 15.0,
            min_tvl: 1_000_000.0,
            min_volume_24h: 100_000.0,
            weights: RuleWeights::default(),
            required: RuleSet::empty().with(Rule::Apy).with(Rule::Tvl),
            min_confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::PoolId;
    use chrono::Utc;

    fn snapshot(apy: f64, tvl: f64, volume: f64) -> PoolSnapshot {
        PoolSnapshot::new(PoolId::from("p"), "A/B", apy, tvl, volume, Utc::now())
    }

    #[test]
    fn threshold_is_inclusive() {
        let rules = RuleConfig::default();
        let at = snapshot(15.0, 1_000_000.0, 100_000.0);
        let fired = rules.triggered(&at);
        assert!(fired.contains(Rule::Apy));
        assert!(fired.contains(Rule::Tvl));
        assert!(fired.contains(Rule::Volume));
    }

    #[test]
    fn below_threshold_does_not_fire() {
        let rules = RuleConfig::default();
        let fired = rules.triggered(&snapshot(14.99, 2_000_000.0, 0.0));
        assert!(!fired.contains(Rule::Apy));
        assert!(fired.contains(Rule::Tvl));
        assert!(!fired.contains(Rule::Volume));
    }

    #[test]
    fn nan_never_satisfies() {
        let rules = RuleConfig::default();
        assert!(rules.triggered(&snapshot(f64::NAN, f64::NAN, f64::NAN)).is_empty());
    }

    #[test]
    fn superset_checks_required_rules() {
        let required = RuleSet::empty().with(Rule::Apy).with(Rule::Tvl);
        let fired = RuleSet::empty().with(Rule::Apy);
        assert!(!fired.is_superset(&required));
        assert!(fired.with(Rule::Tvl).is_superset(&required));
    }

    #[test]
    fn rule_set_display() {
        let set: RuleSet = [Rule::Volume, Rule::Apy].into_iter().collect();
        assert_eq!(set.to_string(), "[apy,volume]");
    }
}
