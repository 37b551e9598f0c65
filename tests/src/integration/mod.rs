//! Cross-crate integration flows.

pub mod pipeline_flow;
pub mod recovery_flow;
