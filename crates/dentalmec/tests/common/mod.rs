//! Shared test utilities for dentalmec integration tests.
//!
//! `TestHarness` owns a temp directory with a file-backed database, upload
//! and temp directories, two registered users and the services on top.

pub mod harness;

pub use harness::TestHarness;
