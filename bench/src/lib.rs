//! Benchmark utilities for the schedule builder and executor.
//!
//! - **Build benchmarks**: time to compile a schedule graph into a plan, for chains, wide
//!   unordered layers with random data access, and deep set hierarchies
//! - **Run benchmarks**: time to execute a compiled plan, including condition evaluation and
//!   sync points
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_schedule_bench
//!
//! # Run specific benchmark group
//! cargo bench -p rusty_schedule_bench -- build
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports for visualization.

pub mod components;
pub mod scenarios;
