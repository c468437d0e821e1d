pub mod document;
pub mod legacy;

pub use document::*;
pub use legacy::*;
