mod file;
mod memory;

pub use file::FileMailStore;
pub use memory::{MemoryMailStore, Operation};
