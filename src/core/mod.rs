pub mod path;
pub mod tree;

pub use path::{PathKey, PropertyPath};
pub use tree::{TRACE_IDENTITY_KEY, UNDEFINED_SENTINEL};
