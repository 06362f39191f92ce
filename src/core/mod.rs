//! Core synthesis logic: types, parsing, construct tree, resolution, planning.

pub mod construct;
pub mod error;
pub mod intrinsics;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod schedule;
pub mod state;
pub mod synth;
pub mod types;
