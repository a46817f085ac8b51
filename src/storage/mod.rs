pub mod memory;

pub use memory::{BuildOptions, IndexSnapshot, SnapshotStats};
