//! # memory-service
//!
//! Composition root. Loads `MemoryConfig`, initializes `tracing`, and wires
//! C1–C9 into one `MemoryService` handle. Carries no RPC/HTTP surface of
//! its own (out of scope) — it is the thing such a surface
//! would be built on top of.

pub mod logging;
pub mod metrics;
pub mod service;

pub use logging::init_tracing;
pub use metrics::{Metrics, MetricsSnapshot};
pub use service::{get, initialize, is_initialized, MemoryService, ServiceOptions};
