//! # chainfeed Test Suite
//!
//! Unified test crate exercising the crates together, end to end:
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── pipeline_flow.rs   # broker → pipeline → ledger delivery flows
//!     └── recovery_flow.rs   # fork reverts and crash recovery across restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All integration flows
//! cargo test -p chainfeed-tests
//!
//! # By module
//! cargo test -p chainfeed-tests pipeline_flow::
//! cargo test -p chainfeed-tests recovery_flow::
//! ```

pub mod integration;
