pub mod spherical;
pub mod validate;

pub use spherical::*;
pub use validate::*;
