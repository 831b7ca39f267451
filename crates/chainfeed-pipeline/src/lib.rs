//! Collection orchestration for chainfeed.
//!
//! A pipeline drives one or more registered providers through a
//! collection cycle, isolates per-provider failures, consolidates
//! schema-compatible results, and persists everything through the
//! store. The scheduler repeats cycles on an interval until cancelled.

pub mod collector;
pub mod scheduler;

pub use collector::{
    CollectionResult, CollectionRun, CycleState, Pipeline, PipelineError, PipelineOptions,
};
pub use scheduler::{start_automated_collection, ScheduleHandle};
