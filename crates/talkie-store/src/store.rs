//! Store contract.
//!
//! [`TaskStore`] is the seam between the core and the database. The API
//! creates records and reads them; after creation only the worker writes.
//!
//! Trait methods use `impl Future` in their signatures so no `async-trait`
//! boxing is needed.

use std::future::Future;

use talkie_models::{TaskId, TaskRecord, TaskStatus};

use crate::error::StoreResult;

/// Durable task record store.
pub trait TaskStore: Send + Sync + 'static {
    /// Insert a new record with a null result.
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists)
    /// if the id is taken.
    fn create(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Advance the status, leaving the result untouched.
    ///
    /// Fails with [`StoreError::InvalidTransition`](crate::StoreError::InvalidTransition)
    /// when the step is not allowed by [`TaskStatus::can_transition_to`].
    fn update_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Set the result field.
    fn update_result(
        &self,
        id: &TaskId,
        result: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Set the result and move from `running` to `success` in one statement.
    fn complete(
        &self,
        id: &TaskId,
        result: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Fetch a record, `None` when unknown.
    fn get(&self, id: &TaskId) -> impl Future<Output = StoreResult<Option<TaskRecord>>> + Send;

    /// Fail every record left `running` by a previous process.
    fn interrupt_running(&self) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Count records in a given status.
    fn count_by_status(&self, status: TaskStatus)
        -> impl Future<Output = StoreResult<u64>> + Send;
}
