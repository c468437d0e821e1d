pub mod cache;
pub mod loader;

pub use cache::*;
pub use loader::*;
