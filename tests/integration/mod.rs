//! Integration tests for shipway
//!
//! These tests drive the pipeline against real temporary git
//! repositories, using in-memory counter and snapshot stores.

mod helpers;
mod test_build;
mod test_bump;
mod test_history;
mod test_prepare;
mod test_publish;
