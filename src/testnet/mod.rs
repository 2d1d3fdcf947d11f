//! In-process test network
//!
//! Replicas, a shared directory and recording stores wired together without
//! sockets, plus signing fixtures for test users.

pub mod test_utils;

pub use test_utils::*;
