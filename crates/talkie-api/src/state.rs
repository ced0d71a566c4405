//! Application state.

use std::sync::Arc;

use talkie_queue::TaskQueue;
use talkie_store::SqliteTaskStore;

use crate::auth::TicketAuthenticator;
use crate::config::ApiConfig;
use crate::services::TaskService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<SqliteTaskStore>,
    pub queue: Arc<TaskQueue>,
    pub auth: Arc<TicketAuthenticator>,
    pub tasks: TaskService<SqliteTaskStore>,
}

impl AppState {
    /// Create new application state.
    ///
    /// The store and queue are shared with the worker.
    pub fn new(
        config: ApiConfig,
        store: Arc<SqliteTaskStore>,
        queue: Arc<TaskQueue>,
        auth: TicketAuthenticator,
    ) -> Self {
        let tasks = TaskService::new(Arc::clone(&store), Arc::clone(&queue));

        Self {
            config,
            store,
            queue,
            auth: Arc::new(auth),
            tasks,
        }
    }
}
