//! Command surface of the engine
//!
//! [`Reconciler`] owns the store handle, the provider registry and the
//! engine settings, and exposes one method per operator command. Every
//! project-level command follows the same error policy: fatal errors
//! (configuration, store) abort the run, anything else is logged and the
//! project is reported as skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::batcher::{BatchSummary, Batcher};
use crate::config::EngineConfig;
use crate::diff::{DiffEngine, DiffReport, DiffRequest};
use crate::error::{Error, Result};
use crate::lifecycle::{CommitOutcome, ProjectLifecycle, ProjectProgress, SubmitOutcome};
use crate::model::{Project, ProjectStatus, ProviderKind};
use crate::provider::ProviderRegistry;
use crate::push::{PushPipeline, PushReport};
use crate::source::{ImportReport, import_messages};
use crate::store::{CorpusStore, all_projects};

/// What happened to one project in a command run
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Done(T),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectReport<T> {
    pub project_id: String,
    pub step: Step<T>,
}

impl<T> ProjectReport<T> {
    fn done(project_id: &str, outcome: T) -> Self {
        Self {
            project_id: project_id.to_string(),
            step: Step::Done(outcome),
        }
    }

    fn skipped(project_id: &str, reason: impl Into<String>) -> Self {
        Self {
            project_id: project_id.to_string(),
            step: Step::Skipped(reason.into()),
        }
    }

    pub fn outcome(&self) -> Option<&T> {
        match &self.step {
            Step::Done(outcome) => Some(outcome),
            Step::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOutcome {
    pub target_language: String,
    pub report: DiffReport,
    pub batches: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub import: ImportReport,
    pub diffs: Vec<DiffOutcome>,
}

pub struct Reconciler {
    store: Arc<dyn CorpusStore>,
    providers: ProviderRegistry,
    config: EngineConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CorpusStore>, providers: ProviderRegistry, config: EngineConfig) -> Self {
        Self {
            store,
            providers,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn CorpusStore {
        self.store.as_ref()
    }

    fn lifecycle(&self) -> ProjectLifecycle<'_> {
        ProjectLifecycle::new(self.store.as_ref(), &self.providers, &self.config)
    }

    /// Queue every source entry missing in `target_language` into new
    /// pending projects of at most `limit` items
    pub async fn diff(
        &self,
        target_language: &str,
        provider: ProviderKind,
        limit: Option<usize>,
    ) -> Result<DiffOutcome> {
        self.diff_namespace(None, target_language, provider, limit)
            .await
    }

    /// Like [`Reconciler::diff`], restricted to one namespace
    pub async fn diff_namespace(
        &self,
        namespace: Option<&str>,
        target_language: &str,
        provider: ProviderKind,
        limit: Option<usize>,
    ) -> Result<DiffOutcome> {
        let request = DiffRequest {
            source_language: self.config.source_language.clone(),
            namespace: namespace.map(str::to_string),
            target_language: target_language.to_string(),
            provider,
        };
        let limit = self.config.project_limit_for(limit);

        let engine = DiffEngine::new(self.store.as_ref(), self.config.page_size);
        let mut batcher = Batcher::new(self.store.as_ref(), provider, target_language, limit);
        let report = engine.run(&request, &mut batcher).await?;
        let batches = batcher.finish().await?;

        info!(
            "Diff for [{}] finished: {} scanned, {} missing, {} projects created",
            target_language,
            report.scanned,
            report.missing,
            batches.projects.len()
        );
        Ok(DiffOutcome {
            target_language: target_language.to_string(),
            report,
            batches,
        })
    }

    /// Run a diff for several target languages in order
    pub async fn diff_all(
        &self,
        target_languages: &[String],
        provider: ProviderKind,
        limit: Option<usize>,
    ) -> Result<Vec<DiffOutcome>> {
        let mut outcomes = Vec::with_capacity(target_languages.len());
        for target in target_languages {
            outcomes.push(self.diff(target, provider, limit).await?);
        }
        Ok(outcomes)
    }

    /// Submit pending projects: the given ones, or all of them
    pub async fn add(&self, project_ids: &[String]) -> Result<Vec<ProjectReport<SubmitOutcome>>> {
        let (projects, mut reports) = self
            .select_projects(project_ids, &[ProjectStatus::Pending])
            .await?;
        self.require_providers(&projects, ProjectStatus::Pending)?;

        let lifecycle = self.lifecycle();
        for mut project in projects {
            info!("Starting processing project: {}", project.id);
            if project.status != ProjectStatus::Pending {
                reports.push(ProjectReport::skipped(
                    &project.id,
                    format!("project is {}, not pending", project.status),
                ));
                continue;
            }
            let result = lifecycle.submit(&mut project).await;
            reports.push(settle(&project.id, result)?);
        }
        Ok(reports)
    }

    /// Report progress of pending and in-progress projects
    pub async fn status(&self, project_ids: &[String]) -> Result<Vec<ProjectReport<ProjectProgress>>> {
        let (projects, mut reports) = self
            .select_projects(
                project_ids,
                &[ProjectStatus::Pending, ProjectStatus::InProgress],
            )
            .await?;
        self.require_providers(&projects, ProjectStatus::InProgress)?;

        let lifecycle = self.lifecycle();
        for project in projects {
            let result = lifecycle.poll(&project).await;
            reports.push(settle(&project.id, result)?);
        }
        Ok(reports)
    }

    /// Pull finished translations of in-progress projects
    pub async fn commit(&self, project_ids: &[String]) -> Result<Vec<ProjectReport<CommitOutcome>>> {
        let (projects, mut reports) = self
            .select_projects(project_ids, &[ProjectStatus::InProgress])
            .await?;
        self.require_providers(&projects, ProjectStatus::InProgress)?;

        let lifecycle = self.lifecycle();
        for mut project in projects {
            info!("Committing project: {}", project.id);
            let result = lifecycle.commit(&mut project).await;
            reports.push(settle(&project.id, result)?);
        }
        Ok(reports)
    }

    /// Write every ready translation into the corpus
    pub async fn push(&self) -> Result<PushReport> {
        PushPipeline::new(self.store.as_ref(), self.config.page_size)
            .run()
            .await
    }

    /// Import a message set into `namespace`, then diff it against each
    /// target language
    pub async fn sync(
        &self,
        namespace: &str,
        messages: &BTreeMap<String, String>,
        target_languages: &[String],
        provider: ProviderKind,
        limit: Option<usize>,
    ) -> Result<SyncReport> {
        let import = import_messages(
            self.store.as_ref(),
            &self.config.source_language,
            Some(namespace),
            messages,
        )
        .await?;
        info!(
            "Imported namespace [{}]: {} new entries, {} unchanged",
            namespace, import.created, import.unchanged
        );

        let mut diffs = Vec::with_capacity(target_languages.len());
        for target in target_languages {
            diffs.push(
                self.diff_namespace(Some(namespace), target, provider, limit)
                    .await?,
            );
        }
        Ok(SyncReport { import, diffs })
    }

    /// Load the projects a command works on
    ///
    /// Explicit ids are read one by one; unknown ids become skipped reports.
    /// Without ids, every project in one of `statuses` is selected.
    async fn select_projects<T>(
        &self,
        project_ids: &[String],
        statuses: &[ProjectStatus],
    ) -> Result<(Vec<Project>, Vec<ProjectReport<T>>)> {
        if project_ids.is_empty() {
            let projects = all_projects(self.store.as_ref(), statuses, self.config.page_size).await?;
            return Ok((projects, Vec::new()));
        }

        let mut projects = Vec::with_capacity(project_ids.len());
        let mut skipped = Vec::new();
        for id in project_ids {
            match self.store.get_project(id).await? {
                Some(project) => projects.push(project),
                None => {
                    let e = Error::not_found("project", id.as_str());
                    warn!("{}", e);
                    skipped.push(ProjectReport::skipped(id, e.to_string()));
                }
            }
        }
        Ok((projects, skipped))
    }

    /// Refuse the whole run before touching anything if a project in
    /// `status` needs a provider that is not configured
    fn require_providers(&self, projects: &[Project], status: ProjectStatus) -> Result<()> {
        for project in projects.iter().filter(|p| p.status == status) {
            self.providers.resolve(project.provider)?;
        }
        Ok(())
    }
}

fn settle<T>(project_id: &str, result: Result<T>) -> Result<ProjectReport<T>> {
    match result {
        Ok(outcome) => Ok(ProjectReport::done(project_id, outcome)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("Project {} skipped: {}", project_id, e);
            Ok(ProjectReport::skipped(project_id, e.to_string()))
        }
    }
}
