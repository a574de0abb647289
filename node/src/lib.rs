//! Authentimed ledger node.
//!
//! Opens the LMDB ledger, pins the validator set agreed at deployment, and
//! exposes registration, verification and audit queries over one handle:
//! - Registers products once a validator quorum has approved them
//! - Verifies scans and detects cross-factor replays
//! - Answers status and history queries from the audit log
//! - Counts outcomes in Prometheus metrics

pub mod config;
pub mod deployment;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod tracing_spans;

pub use config::NodeConfig;
pub use deployment::DeploymentRecord;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::LedgerNode;
pub use shutdown::ShutdownController;
