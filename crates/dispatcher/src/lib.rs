//! Outbound-request governance
//!
//! Path health tracking, health-aware path selection, pacing and the dispatch
//! controller that ties them together around a caller-supplied call.

pub mod controller;
pub mod health_registry;
pub mod outcome_recorder;
pub mod pacing_gate;
pub mod strategies;


pub use controller::*;
pub use health_registry::*;
pub use outcome_recorder::*;
pub use pacing_gate::*;
pub use strategies::*;
