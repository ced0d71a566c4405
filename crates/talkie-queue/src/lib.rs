//! In-process FIFO task queue.
//!
//! This crate provides:
//! - Strict FIFO enqueue/dequeue with a dequeue that suspends until work arrives
//! - Advisory position lookup for queued tasks

pub mod queue;

pub use queue::TaskQueue;
