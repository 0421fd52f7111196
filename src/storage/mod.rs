pub mod codec;
pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::{DEFAULT_QUOTA_BYTES, KeyValueStore};
pub use memory::MemoryStore;
pub use persistence::FileStore;
