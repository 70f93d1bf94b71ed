//! Time-series utilities shared by the scanner and the orchestrator.
//!
//! - `gaps`: snap windows to the candle grid and sweep present times into gaps.
/// Grid alignment and the linear gap sweep.
pub mod gaps;
