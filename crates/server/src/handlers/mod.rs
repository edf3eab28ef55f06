//! HTTP request handlers.

pub mod system;
pub mod uploads;

pub use system::*;
pub use uploads::*;
