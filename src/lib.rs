//! Multi-tenant case lifecycle service.
//!
//! Cases move through a fixed lifecycle (draft, in-process, prepared,
//! completed, archived) gated by procedure-driven validation and a step
//! wizard, culminating in an immutable submission snapshot and a metered,
//! credit-backed export.

pub mod cases;
pub mod config;
pub mod credits;
pub mod error;
pub mod telemetry;
