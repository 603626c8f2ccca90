//! CLI command implementations.

pub mod capacity;
pub mod keygen;
pub mod seal;
pub mod verify;
