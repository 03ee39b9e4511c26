use std::sync::Arc;

use anyhow::Result;

use crate::RegistryState;

pub struct TestStateStore {
    pub state: Arc<RegistryState>,
    // Held so the backing directory outlives the store.
    _temp_dir: tempfile::TempDir,
}

impl TestStateStore {
    pub fn new() -> Result<TestStateStore> {
        let temp_dir = tempfile::tempdir()?;
        let state = RegistryState::new(temp_dir.path().join("state"))?;
        Ok(TestStateStore {
            state,
            _temp_dir: temp_dir,
        })
    }
}
