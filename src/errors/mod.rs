//! Error type definitions for the radio back end.

pub mod types;

pub use types::{AppError, SchedulerError, StoreError, WebError, WorkerError};
