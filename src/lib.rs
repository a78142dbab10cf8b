//! matrix_diff - differential testing for matrix-operation drivers
//!
//! Generates random matrix problems, feeds the same bytes to a reference and
//! a candidate executable, and stops at the first round whose outputs differ.
//!
//! # Modules
//!
//! - [`core_types`] - Domain, operation, shape, role
//! - [`generator`] - Seeded problem-instance generator and wire encoding
//! - [`wire`] - Grammar checker for instance text
//! - [`executor`] - Child process with merged output and a deadline
//! - [`driver`] - Round classification and the session state machine
//! - [`report`] - Finding reports and artifacts
//! - [`config`] / [`logging`] - YAML config and tracing setup

// Core types - must be first!
pub mod core_types;
pub mod error;

pub mod config;
pub mod driver;
pub mod executor;
pub mod generator;
pub mod logging;
pub mod report;
pub mod wire;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigSource, GeneratorConfig, HarnessConfig};
pub use core_types::{MatrixShape, NumericDomain, Operation, Role};
pub use driver::{
    Finding, HaltReason, RoundOutcome, Session, SessionState, SessionStats, TextEncoding,
    replay_listing, run_round,
};
pub use error::{HarnessError, WireError};
pub use executor::{ExecutableSpec, ExecutionResult, ExitState, run_executable};
pub use generator::{InputGenerator, ProblemInstance, ShapePolicy, generate_instance};
pub use report::Replay;
