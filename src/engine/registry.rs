// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::errors::{BuildlaneError, Result};
use crate::types::ProjectId;

use super::coordinator::ExecutionCoordinator;

/// Explicit map from project to its coordinator, owned by the host
/// application and handed to whoever needs to run actions.
#[derive(Debug, Default)]
pub struct CoordinatorRegistry {
    coordinators: Mutex<HashMap<ProjectId, ExecutionCoordinator>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProjectId, ExecutionCoordinator>> {
        self.coordinators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the coordinator of a newly opened project.
    ///
    /// With `warm_start`, the build tool is started in the background without
    /// waiting for its prompt, so the first action does not pay for JVM
    /// startup.
    pub fn open_project(
        &self,
        project: impl Into<ProjectId>,
        coordinator: ExecutionCoordinator,
        warm_start: bool,
    ) -> Result<()> {
        let project = project.into();
        {
            let mut coordinators = self.lock();
            if coordinators.contains_key(&project) {
                return Err(BuildlaneError::ConfigError(format!(
                    "project '{project}' is already registered"
                )));
            }
            coordinators.insert(project.clone(), coordinator.clone());
        }
        info!(%project, warm_start, "project opened");

        if warm_start {
            coordinator.start_in_background();
        }

        Ok(())
    }

    pub fn get(&self, project: &str) -> Option<ExecutionCoordinator> {
        self.lock().get(project).cloned()
    }

    pub fn projects(&self) -> Vec<ProjectId> {
        let mut projects: Vec<_> = self.lock().keys().cloned().collect();
        projects.sort();
        projects
    }

    /// Dispose and forget the coordinator of a closed project.
    ///
    /// Returns false if the project was not registered.
    pub fn close_project(&self, project: &str) -> bool {
        let removed = self.lock().remove(project);
        match removed {
            Some(coordinator) => {
                coordinator.dispose();
                info!(%project, "project closed");
                true
            }
            None => false,
        }
    }

    /// Dispose every registered coordinator (host shutdown).
    pub fn dispose_all(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        for (project, coordinator) in drained {
            coordinator.dispose();
            info!(%project, "project closed");
        }
    }
}
