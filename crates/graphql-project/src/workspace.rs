use crate::project::{uri_to_path, Project, ProjectServices, TextDocument};
use crate::{ProjectError, Result};
use dashmap::DashMap;
use graphql_config::{find_config_files, load_config};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Every project of the open workspace folders, keyed by config root
#[derive(Debug)]
pub struct Workspace {
    projects: DashMap<PathBuf, Arc<Project>>,
    services: ProjectServices,
}

impl Workspace {
    #[must_use]
    pub fn new(services: ProjectServices) -> Self {
        Self {
            projects: DashMap::new(),
            services,
        }
    }

    #[must_use]
    pub fn projects(&self) -> Vec<Arc<Project>> {
        let mut projects: Vec<_> = self
            .projects
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        projects.sort_by(|a, b| a.root().cmp(b.root()));
        projects
    }

    fn report(&self, error: &ProjectError) {
        tracing::error!(error = %error, "Project error");
        self.services.log.error(&error.to_string());
        self.services.listener.report_error(error);
    }

    fn load_project(&self, config_path: &Path) -> Result<Arc<Project>> {
        let config = load_config(config_path)?;
        tracing::info!(
            root = %config.root.display(),
            kind = ?config.kind,
            "Loaded project config"
        );
        Project::new(config, self.services.clone())
    }

    /// Create and initialize a project for every config file in `folder`.
    ///
    /// Projects that fail to load are reported and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn add_projects_in_folder(&self, folder: &Path) -> Vec<Arc<Project>> {
        let mut added = Vec::new();
        for config_path in find_config_files(folder) {
            match self.load_project(&config_path) {
                Ok(project) => {
                    if let Some(previous) = self
                        .projects
                        .insert(project.root().to_path_buf(), Arc::clone(&project))
                    {
                        previous.shutdown().await;
                    }
                    added.push(project);
                }
                Err(error) => self.report(&error),
            }
        }

        for project in &added {
            if let Err(error) = project.initialize().await {
                self.report(&error);
            }
        }
        added
    }

    /// Drop every project rooted inside `folder`
    pub async fn remove_projects_in_folder(&self, folder: &Path) {
        let roots: Vec<PathBuf> = self
            .projects
            .iter()
            .filter(|entry| entry.key().starts_with(folder))
            .map(|entry| entry.key().clone())
            .collect();

        for root in roots {
            if let Some((_, project)) = self.projects.remove(&root) {
                tracing::info!(root = %root.display(), "Removing project");
                project.shutdown().await;
            }
        }
    }

    /// Replace the project whose config file changed with a fresh instance.
    ///
    /// A config file that no longer exists removes its project.
    pub async fn reload_project_for_config(
        &self,
        config_path: &Path,
    ) -> Result<Option<Arc<Project>>> {
        let Some(root) = config_path.parent() else {
            return Ok(None);
        };

        if let Some((_, previous)) = self.projects.remove(root) {
            previous.shutdown().await;
        }
        if !config_path.exists() {
            tracing::info!(config = %config_path.display(), "Config removed");
            return Ok(None);
        }

        let project = self.load_project(config_path).inspect_err(|e| self.report(e))?;
        self.projects
            .insert(project.root().to_path_buf(), Arc::clone(&project));
        project.initialize().await.inspect_err(|e| self.report(e))?;
        Ok(Some(project))
    }

    /// The project with the deepest root whose file patterns select `path`
    #[must_use]
    pub fn project_for_file(&self, path: &Path) -> Option<Arc<Project>> {
        self.projects
            .iter()
            .filter(|entry| entry.value().includes_file(path))
            .max_by_key(|entry| entry.key().components().count())
            .map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn project_for_uri(&self, uri: &str) -> Option<Arc<Project>> {
        self.project_for_file(&uri_to_path(uri))
    }

    /// Route changed documents to their projects
    pub async fn documents_changed(&self, documents: &[TextDocument]) {
        for document in documents {
            match self.project_for_uri(&document.uri) {
                Some(project) => project.document_did_change(document).await,
                None => tracing::trace!(uri = %document.uri, "No project for document"),
            }
        }
    }

    pub async fn document_deleted(&self, uri: &str) {
        if let Some(project) = self.project_for_uri(uri) {
            project.file_was_deleted(uri).await;
        }
    }

    /// Shut down every project
    pub async fn shutdown(&self) {
        for project in self.projects() {
            project.shutdown().await;
        }
        self.projects.clear();
    }
}
