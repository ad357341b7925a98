//! Config-seeded project directory
//!
//! Projects are declared in the config file, mirroring how the rest of the
//! deployment is provisioned. Lookups are in-memory and infallible.

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::data::error::DataError;
use crate::data::traits::ProjectDirectory;
use crate::data::types::Project;

pub struct ConfigProjectDirectory {
    projects: FxHashMap<u32, Project>,
}

impl ConfigProjectDirectory {
    pub fn new(projects: &[Project]) -> Self {
        Self {
            projects: projects.iter().map(|p| (p.id, p.clone())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[async_trait]
impl ProjectDirectory for ConfigProjectDirectory {
    async fn resolve_project(&self, project_id: u32) -> Result<Option<Project>, DataError> {
        Ok(self.projects.get(&project_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_projects() -> Vec<Project> {
        vec![
            Project {
                id: 1,
                name: "app".to_string(),
                prom_compat: false,
            },
            Project {
                id: 2,
                name: "prom".to_string(),
                prom_compat: true,
            },
        ]
    }

    #[tokio::test]
    async fn test_resolve_known_project() {
        let dir = ConfigProjectDirectory::new(&sample_projects());
        let project = dir.resolve_project(2).await.unwrap().unwrap();
        assert_eq!(project.name, "prom");
        assert!(project.prom_compat);
    }

    #[tokio::test]
    async fn test_resolve_unknown_project() {
        let dir = ConfigProjectDirectory::new(&sample_projects());
        assert!(dir.resolve_project(99).await.unwrap().is_none());
    }
}
