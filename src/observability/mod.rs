//! Observability: structured logging initialization.

mod tracing_init;

pub use tracing_init::{TracingError, init_tracing};
