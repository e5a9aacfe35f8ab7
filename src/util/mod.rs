//! General utility code that didn't fit anywhere else
// (c) 2024 Ross Younger

mod tracing;
pub use tracing::TimeFormat;
pub(crate) use tracing::{
    is_initialized as tracing_is_initialised, setup as setup_tracing, trace_level,
    ConsoleTraceType,
};

#[cfg(test)]
pub(crate) mod test_protocol;
