//! Console UI helpers

pub mod progress;
