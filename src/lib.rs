//! simsweep
//!
//! Benchmark automation for trace-driven simulators: build, run concurrently,
//! extract counters, compare configurations.

pub mod sweep;
