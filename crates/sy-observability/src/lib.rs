//! # sy-observability
//!
//! Logging and audit infrastructure for the Schoolyard platform.
//!
//! Structured logging is built on tracing; the audit module records
//! tenant-lifecycle and administrative events with a capped in-memory ring
//! plus tracing emission.

pub mod audit;
pub mod logging;

pub use audit::{AuditEventType, AuditLog, AuditLogEntry, AuditResult};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
