pub mod node;
pub mod snapshot;

// Re-export node types
pub use node::*;
// Re-export snapshot types
pub use snapshot::*;
