//! Wire-level utilities for the JSON-over-socket convention.

pub mod codec;
pub mod constants;

pub use codec::*;
pub use constants::*;
