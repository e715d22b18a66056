pub mod memory;
pub mod postgres;
pub mod storage;

pub use memory::{MemoryBackend, MemoryRemoteStore, MemoryRemoteStoreFactory};
pub use postgres::{PgRemoteStore, PgRemoteStoreFactory};
pub use storage::{FileStorage, MemoryStorage};
