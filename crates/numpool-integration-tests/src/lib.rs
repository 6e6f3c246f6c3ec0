//! Integration test crate for numpool.
//!
//! This crate has no library code; it only contains integration tests that
//! exercise allocation end to end against file-backed SQLite databases.
//!
//! ```sh
//! cargo test -p numpool-integration-tests
//! ```
