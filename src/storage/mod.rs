pub mod engine;
pub mod memory;
pub mod persistence;

pub use engine::{ProfileStore, StorageResult};
pub use memory::InMemoryProfileStore;
pub use persistence::JsonFileProfileStore;
