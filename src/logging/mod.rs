//! Structured logging setup and NDJSON audit lines.

mod format;

pub use format::{AuditLine, StructuredLogger};
