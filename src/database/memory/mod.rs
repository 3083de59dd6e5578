
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::SnapshotStore;
use crate::index::{IndexManifest, IndexSnapshot};
use crate::{RagError, Result};

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<String, IndexSnapshot>>,
}

impl MemorySnapshotStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: &str) -> Option<IndexSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    #[inline]
    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id))
    }

    #[inline]
    async fn write(&self, id: &str, snapshot: &IndexSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), snapshot.clone());
        Ok(())
    }

    #[inline]
    async fn read(&self, id: &str) -> Result<IndexSnapshot> {
        self.get(id)
            .ok_or_else(|| RagError::Storage(format!("no snapshot stored under '{}'", id)))
    }

    #[inline]
    async fn read_manifest(&self, id: &str) -> Result<Option<IndexManifest>> {
        Ok(self.get(id).map(|snapshot| snapshot.manifest))
    }
}
