use parking_lot::Mutex;

use crate::domain::agent::AgentState;
use crate::error::StoreError;
use crate::port::outbound::store::AgentStateStore;

#[derive(Default)]
pub struct MemoryAgentStateStore {
    state: Mutex<Option<AgentState>>,
}

impl MemoryAgentStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AgentStateStore for MemoryAgentStateStore {
    fn load(&self) -> Result<Option<AgentState>, StoreError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &AgentState) -> Result<(), StoreError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
