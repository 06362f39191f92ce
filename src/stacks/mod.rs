//! Stack declarations shipped with the binary.

pub mod musabi;
