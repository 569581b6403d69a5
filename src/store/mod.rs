//! Durable state storage — JSON documents keyed by scope namespace.

pub mod local;
pub mod memory;
pub mod traits;

pub use local::LocalStateStore;
pub use memory::MemoryStateStore;
pub use traits::StateStore;

use std::path::Path;
use std::sync::Arc;

/// Create the default file-backed state store rooted at `state_dir`.
pub fn create_state_store(state_dir: &Path) -> Arc<dyn StateStore> {
    Arc::new(LocalStateStore::new(state_dir))
}
