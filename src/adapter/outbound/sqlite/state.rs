//! SQLite agent state store.

use chrono::Utc;
use diesel::prelude::*;

use super::database::connection::{checkout, DbPool};
use super::database::model::AgentStateRow;
use super::database::schema::agent_state;
use super::store::{decode, encode, format_time};
use crate::domain::agent::AgentState;
use crate::error::StoreError;
use crate::port::outbound::store::AgentStateStore;

const STATE_ROW: i32 = 1;

/// Stores the coordinator state as one JSON row.
pub struct SqliteAgentStateStore {
    pool: DbPool,
}

impl SqliteAgentStateStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AgentStateStore for SqliteAgentStateStore {
    fn load(&self) -> Result<Option<AgentState>, StoreError> {
        let mut conn = checkout(&self.pool)?;
        let row: Option<AgentStateRow> = agent_state::table
            .find(STATE_ROW)
            .select(AgentStateRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(|r| decode(&r.state)).transpose()
    }

    fn save(&self, state: &AgentState) -> Result<(), StoreError> {
        let row = AgentStateRow {
            id: STATE_ROW,
            state: encode(state)?,
            updated_at: format_time(Utc::now()),
        };
        let mut conn = checkout(&self.pool)?;
        diesel::replace_into(agent_state::table)
            .values(&row)
            .execute(&mut conn)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::CycleOutcome;
    use crate::adapter::outbound::sqlite::database::connection::open;

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let path = path.to_str().unwrap();

        let store = SqliteAgentStateStore::new(open(path).unwrap());
        assert!(store.load().unwrap().is_none());

        let mut state = AgentState::default();
        let cycle = state.next_cycle();
        let now = Utc::now();
        state.record_cycle(cycle, now, now, CycleOutcome::Completed, Default::default(), None);
        store.save(&state).unwrap();

        let reopened = SqliteAgentStateStore::new(open(path).unwrap());
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.cycle_count, 1);
        assert_eq!(loaded.last_outcome, Some(CycleOutcome::Completed));
    }
}
