//! Business logic services.

pub mod task;

pub use task::{TaskService, TaskStatusView};
