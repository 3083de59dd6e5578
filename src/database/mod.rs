// Database module
// Persistence for index snapshots: LanceDB on disk, or memory for tests and one-off runs

pub mod lancedb;
pub mod memory;

pub use self::lancedb::LanceSnapshotStore;
pub use memory::MemorySnapshotStore;

use async_trait::async_trait;

use crate::Result;
use crate::index::{IndexManifest, IndexSnapshot};

/// Durable storage for whole index snapshots, keyed by index id
///
/// A snapshot is written all-or-nothing: `exists` and `read_manifest` must not
/// report a snapshot whose write did not complete.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn exists(&self, id: &str) -> Result<bool>;

    async fn write(&self, id: &str, snapshot: &IndexSnapshot) -> Result<()>;

    /// Fails with `Storage` when nothing is stored under `id`
    async fn read(&self, id: &str) -> Result<IndexSnapshot>;

    async fn read_manifest(&self, id: &str) -> Result<Option<IndexManifest>>;
}
