//! Background job processing for Cardwall.
//!
//! This crate provides:
//! - A job processor that claims a job, runs the handler for its kind, and
//!   records the terminal outcome
//! - Inline and queued executors deciding where the processor runs
//! - Named in-process queues and the worker runner consuming them
//! - A cron scheduler for the retention sweep
//! - The built-in import and export handlers

pub mod context;
pub mod executor;
pub mod handler;
pub mod jobs;
pub mod processor;
pub mod progress;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use context::JobContext;
pub use executor::{Executor, InlineExecutor, QueuedExecutor};
pub use handler::{HandlerRegistry, JobExecutionError, JobHandler};
pub use processor::JobProcessor;
pub use progress::ProgressTracker;
pub use queue::{JobQueue, QueueMessage};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
