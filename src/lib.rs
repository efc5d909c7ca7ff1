pub mod config;
pub mod constants;
pub mod dedupe;
pub mod domain;
pub mod error;
pub mod interpolation;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod readers;
pub mod sources;
