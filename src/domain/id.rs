//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// User identifier as issued by the chat front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Liquidity pool identifier - newtype for type safety.
///
/// The inner String is private to ensure all construction goes through
/// the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Create a new `PoolId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the pool ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PoolId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Monotonic cycle number assigned by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(u64);

impl CycleId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The cycle that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

/// Identifier of a user-triggered (manual) invest request.
///
/// Generated as UUID v4 for new requests, or constructed from an existing
/// string when the front-end supplies its own identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new `RequestId` with a generated UUID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handle for a provisional exposure hold issued by the risk guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationId(u64);

impl ReservationId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// The logical event a trade was triggered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TradeTrigger {
    /// Autonomous trigger from a monitoring cycle.
    Cycle(CycleId),
    /// User-triggered invest request.
    Manual(RequestId),
}

impl TradeTrigger {
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

impl fmt::Display for TradeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle(id) => write!(f, "cycle:{}", id.value()),
            Self::Manual(id) => write!(f, "manual:{id}"),
        }
    }
}

/// Deterministic trade identifier derived from (user, pool, trigger).
///
/// Two dispatches of the same logical trigger always produce the same key,
/// which is what makes a repeated dispatch a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Hash the triple into a hex-encoded SHA-256 key.
    #[must_use]
    pub fn derive(user: UserId, pool: &PoolId, trigger: &TradeTrigger) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(user.value().to_be_bytes());
        hasher.update([0x1f]);
        hasher.update(pool.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(trigger.to_string().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already-derived key (e.g. loaded from storage).
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in logs and user messages.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_id_from_str() {
        let id = PoolId::from("sol-usdc");
        assert_eq!(id.as_str(), "sol-usdc");
        assert_eq!(format!("{id}"), "sol-usdc");
    }

    #[test]
    fn cycle_id_next_increments() {
        assert_eq!(CycleId::new(7).next(), CycleId::new(8));
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn idempotency_key_is_deterministic() {
        let pool = PoolId::from("pool-a");
        let trigger = TradeTrigger::Cycle(CycleId::new(3));
        let a = IdempotencyKey::derive(UserId::new(1), &pool, &trigger);
        let b = IdempotencyKey::derive(UserId::new(1), &pool, &trigger);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn idempotency_key_distinguishes_inputs() {
        let pool = PoolId::from("pool-a");
        let base = IdempotencyKey::derive(
            UserId::new(1),
            &pool,
            &TradeTrigger::Cycle(CycleId::new(3)),
        );
        let other_cycle = IdempotencyKey::derive(
            UserId::new(1),
            &pool,
            &TradeTrigger::Cycle(CycleId::new(4)),
        );
        let other_user = IdempotencyKey::derive(
            UserId::new(2),
            &pool,
            &TradeTrigger::Cycle(CycleId::new(3)),
        );
        let manual = IdempotencyKey::derive(
            UserId::new(1),
            &pool,
            &TradeTrigger::Manual(RequestId::from("3")),
        );
        assert_ne!(base, other_cycle);
        assert_ne!(base, other_user);
        assert_ne!(base, manual);
    }

    #[test]
    fn trigger_display() {
        assert_eq!(TradeTrigger::Cycle(CycleId::new(9)).to_string(), "cycle:9");
        assert_eq!(
            TradeTrigger::Manual(RequestId::from("abc")).to_string(),
            "manual:abc"
        );
    }
}
