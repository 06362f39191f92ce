//! Tripwire: BLAKE3 hashing, synth provenance, and template drift detection.

pub mod drift;
pub mod eventlog;
pub mod hasher;
