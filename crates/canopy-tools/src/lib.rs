//! Tooling primitives for observing behavior graphs.
//!
//! Trace events are plain data recorded during ticking so tests and hosts can
//! assert on lifecycle order without a debugger.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, TraceEvent, TraceLog, TraceSink, Tracer, VecTraceSink};
