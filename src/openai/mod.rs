mod core;
pub mod sse;

pub use self::core::*;
