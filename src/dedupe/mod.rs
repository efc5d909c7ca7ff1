// Batch deduplication against the remote oracle

pub mod oracle;
pub mod stage;

pub use oracle::{DedupeDecision, DedupeOracle, HttpDedupeOracle, OracleError};
pub use stage::{DedupeConfig, DedupeReport, DedupeStage, StageState};
