//! Domain services over the injected store and index.

pub mod notifications;
pub mod reminders;
pub mod tasks;

pub use notifications::NotificationService;
pub use reminders::ReminderService;
pub use tasks::{SearchHit, TaskFilter, TaskService};

use std::sync::Arc;

use crate::index::SemanticIndex;
use crate::store::TaskStore;

/// All services sharing one store and index.
#[derive(Clone)]
pub struct Services {
    pub tasks: TaskService,
    pub reminders: ReminderService,
    pub notifications: NotificationService,
}

impl Services {
    pub fn new(store: Arc<dyn TaskStore>, index: Arc<dyn SemanticIndex>) -> Self {
        Self {
            tasks: TaskService::new(Arc::clone(&store), index),
            reminders: ReminderService::new(Arc::clone(&store)),
            notifications: NotificationService::new(store),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        self.tasks.store()
    }
}
