//! Project lifecycle controller
//!
//! Drives one project through its states:
//!
//! ```text
//! Pending ──submit──▶ InProgress ──commit──▶ Completed   (asynchronous providers)
//! Pending ──submit──────────────────────────▶ Completed   (synchronous providers)
//! ```
//!
//! Queue items move `Pending → Ready` inside this controller; the push
//! pipeline takes them the rest of the way.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{Project, ProjectStatus, QueueItem};
use crate::provider::payload::{self, PayloadUnit, SubmissionDocument};
use crate::provider::{
    AsyncProjectProvider, ProjectRequest, Provider, ProviderRegistry, RemoteProgress,
    ResourcePayload, SyncBatchProvider,
};
use crate::store::{CorpusStore, QueueFilter, all_queue_items};

/// Result of submitting a pending project
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A synchronous provider translated the project in place
    Translated {
        ready: usize,
        /// Items still pending after this run
        remaining: usize,
        failed_chunks: usize,
        /// Items retired because their source entry is gone
        retired: usize,
        completed: bool,
    },
    /// An asynchronous provider accepted the project
    Submitted {
        external_id: String,
        cost: Option<f64>,
        items: usize,
        retired: usize,
    },
    /// The project had no pending items and was closed
    Empty,
}

/// Answer to a status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectProgress {
    /// Nothing to ask a provider about
    Local(ProjectStatus),
    Remote {
        code: String,
        label: Option<String>,
        progress: RemoteProgress,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Items that moved to ready in this commit
    pub staged: usize,
    /// Units for items that were already ready or completed
    pub already_staged: usize,
    /// Unit ids that are not members of the project
    pub foreign_ids: Vec<String>,
    /// Members still pending after the commit
    pub missing_ids: Vec<String>,
    /// Members retired because their source entry is gone
    pub retired: usize,
    pub completed: bool,
}

impl CommitReport {
    pub fn has_mismatch(&self) -> bool {
        !self.foreign_ids.is_empty() || !self.missing_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    AlreadyCompleted,
    NotReady {
        code: String,
        progress: RemoteProgress,
    },
    Committed(CommitReport),
}

pub struct ProjectLifecycle<'a> {
    store: &'a dyn CorpusStore,
    providers: &'a ProviderRegistry,
    config: &'a EngineConfig,
}

impl<'a> ProjectLifecycle<'a> {
    pub fn new(
        store: &'a dyn CorpusStore,
        providers: &'a ProviderRegistry,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            providers,
            config,
        }
    }

    /// Hand a pending project to its provider
    ///
    /// On success `project` reflects what was persisted. On failure nothing
    /// about the project was written, so it stays pending and can be
    /// retried.
    pub async fn submit(&self, project: &mut Project) -> Result<SubmitOutcome> {
        if project.status != ProjectStatus::Pending {
            return Err(Error::StateConflict(format!(
                "project {} is {}, only pending projects can be submitted",
                project.id, project.status
            )));
        }

        let provider = self.providers.resolve(project.provider)?;
        let pending = self.pending_members(&project.id).await?;
        if pending.is_empty() {
            return self.close_empty(project).await;
        }

        match provider {
            Provider::Sync(provider) => self.translate_now(project, provider.as_ref(), pending).await,
            Provider::Async(provider) => {
                self.submit_for_translation(project, provider.as_ref(), pending)
                    .await
            }
        }
    }

    /// Report where a project stands, asking the provider when it holds the work
    pub async fn poll(&self, project: &Project) -> Result<ProjectProgress> {
        if project.status != ProjectStatus::InProgress {
            return Ok(ProjectProgress::Local(project.status));
        }

        let provider = self.async_provider(project)?;
        let external_id = external_id(project)?;
        let status = provider.project_status(external_id).await?;
        let progress = provider.progress(&status.code);
        info!(
            "Project {} ({}) status: {} [{}]",
            project.id, external_id, status.code, progress
        );

        Ok(ProjectProgress::Remote {
            code: status.code,
            label: status.label,
            progress,
        })
    }

    /// Pull finished translations of an in-progress project
    ///
    /// Translated units are matched to queue items by id only, never by
    /// position. The project completes only once every member has a result;
    /// otherwise it stays in progress and the mismatch is reported.
    pub async fn commit(&self, project: &mut Project) -> Result<CommitOutcome> {
        match project.status {
            ProjectStatus::Completed => {
                info!("Project {} is already completed", project.id);
                return Ok(CommitOutcome::AlreadyCompleted);
            }
            ProjectStatus::Pending => {
                return Err(Error::StateConflict(format!(
                    "project {} is still pending, submit it first",
                    project.id
                )));
            }
            ProjectStatus::InProgress => {}
        }

        let provider = self.async_provider(project)?;
        let external_id = external_id(project)?.to_string();
        let status = provider.project_status(&external_id).await?;
        let progress = provider.progress(&status.code);
        if progress != RemoteProgress::ReadyToCommit {
            info!(
                "Project {} is not ready to commit: {} [{}]",
                project.id, status.code, progress
            );
            return Ok(CommitOutcome::NotReady {
                code: status.code,
                progress,
            });
        }

        let mut members: HashMap<String, QueueItem> = all_queue_items(
            self.store,
            &QueueFilter::Project(project.id.clone()),
            self.config.page_size,
        )
        .await?
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect();

        let mut report = CommitReport::default();
        let mut staged = Vec::new();
        for resource_id in &status.translations {
            let document = provider.download_resource(resource_id, &external_id).await?;
            for unit in payload::parse_units(&document)? {
                match members.get_mut(&unit.id) {
                    None => {
                        warn!(
                            "Project {} returned unit {} which is not one of its items",
                            project.id, unit.id
                        );
                        report.foreign_ids.push(unit.id);
                    }
                    Some(item) if !item.is_pending() => report.already_staged += 1,
                    Some(item) => {
                        debug!("Queue item {} is ready", item.id);
                        item.mark_ready(&unit.text);
                        staged.push(item.clone());
                    }
                }
            }
        }

        if !staged.is_empty() {
            self.store.batch_put_queue_items(&staged).await?;
        }
        report.staged = staged.len();

        let leftovers: Vec<QueueItem> = members
            .into_values()
            .filter(QueueItem::is_pending)
            .collect();
        let (missing, retired) = self.with_source_text(leftovers).await?;
        report.retired = retired;
        report.missing_ids = missing.into_iter().map(|(item, _)| item.id).collect();
        report.missing_ids.sort();

        if report.missing_ids.is_empty() {
            self.transition(project, ProjectStatus::Completed).await?;
            report.completed = true;
            info!("Project {} committed, {} items ready", project.id, report.staged);
        } else {
            warn!(
                "Project {} stays in progress, {} items have no translation",
                project.id,
                report.missing_ids.len()
            );
        }

        Ok(CommitOutcome::Committed(report))
    }

    async fn translate_now(
        &self,
        project: &mut Project,
        provider: &dyn SyncBatchProvider,
        pending: Vec<QueueItem>,
    ) -> Result<SubmitOutcome> {
        let (units, retired) = self.with_source_text(pending).await?;
        let total = units.len();

        let mut ready = 0;
        let mut failed_chunks = 0;
        for (index, chunk) in units.chunks(self.config.sync_chunk_size).enumerate() {
            let texts: BTreeMap<String, String> = chunk
                .iter()
                .map(|(item, text)| (item.id.clone(), text.clone()))
                .collect();

            let translated = match provider
                .translate_batch(
                    &texts,
                    &self.config.source_language,
                    &project.target_language,
                )
                .await
            {
                Ok(translated) => translated,
                Err(e) if e.is_transient() => {
                    warn!(
                        "Chunk {} of project {} failed via {}: {}",
                        index + 1,
                        project.id,
                        provider.provider_name(),
                        e
                    );
                    failed_chunks += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let staged: Vec<QueueItem> = chunk
                .iter()
                .filter_map(|(item, _)| {
                    translated.get(&item.id).map(|text| {
                        let mut item = item.clone();
                        item.mark_ready(text);
                        item
                    })
                })
                .collect();
            if staged.len() < chunk.len() {
                warn!(
                    "{} of {} texts in chunk {} of project {} came back untranslated",
                    chunk.len() - staged.len(),
                    chunk.len(),
                    index + 1,
                    project.id
                );
            }
            if !staged.is_empty() {
                self.store.batch_put_queue_items(&staged).await?;
            }
            ready += staged.len();
        }

        let remaining = total - ready;
        let completed = remaining == 0;
        if completed {
            self.transition(project, ProjectStatus::Completed).await?;
        }
        info!(
            "Project {} translated via {}: {} ready, {} remaining",
            project.id,
            provider.provider_name(),
            ready,
            remaining
        );

        Ok(SubmitOutcome::Translated {
            ready,
            remaining,
            failed_chunks,
            retired,
            completed,
        })
    }

    async fn submit_for_translation(
        &self,
        project: &mut Project,
        provider: &dyn AsyncProjectProvider,
        pending: Vec<QueueItem>,
    ) -> Result<SubmitOutcome> {
        let (units, retired) = self.with_source_text(pending).await?;
        if units.is_empty() {
            return self.close_empty(project).await;
        }

        let source_language = provider.language_code(&self.config.source_language);
        let target_language = provider.language_code(&project.target_language);
        let word_count = units
            .iter()
            .map(|(_, text)| text.split_whitespace().count())
            .sum();
        let content = payload::build_document(&SubmissionDocument {
            project_id: project.id.clone(),
            source_language: source_language.clone(),
            target_language: target_language.clone(),
            units: units
                .iter()
                .map(|(item, text)| PayloadUnit::new(&item.id, text))
                .collect(),
        })?;

        let resource_id = provider
            .upload_resource(&ResourcePayload {
                file_name: format!("{}.xml", project.id),
                content,
            })
            .await?;
        debug!("Project {} uploaded as resource {}", project.id, resource_id);

        let data = provider
            .create_project(&ProjectRequest {
                project_id: project.id.clone(),
                source_language,
                target_language,
                resource_ids: vec![resource_id],
                word_count,
            })
            .await?;

        let outcome = SubmitOutcome::Submitted {
            external_id: data.external_id.clone(),
            cost: data.cost,
            items: units.len(),
            retired,
        };
        info!(
            "Project {} submitted to {} as {} ({} items, {} words)",
            project.id,
            provider.provider_name(),
            data.external_id,
            units.len(),
            word_count
        );

        let mut updated = project.clone();
        updated.provider_data = Some(data);
        updated.set_status(ProjectStatus::InProgress);
        self.store.put_project(&updated).await?;
        *project = updated;
        Ok(outcome)
    }

    async fn close_empty(&self, project: &mut Project) -> Result<SubmitOutcome> {
        warn!(
            "Project {} has no pending items, marking it completed",
            project.id
        );
        self.transition(project, ProjectStatus::Completed).await?;
        Ok(SubmitOutcome::Empty)
    }

    async fn transition(&self, project: &mut Project, status: ProjectStatus) -> Result<()> {
        let mut updated = project.clone();
        updated.set_status(status);
        self.store.put_project(&updated).await?;
        *project = updated;
        Ok(())
    }

    async fn pending_members(&self, project_id: &str) -> Result<Vec<QueueItem>> {
        let members = all_queue_items(
            self.store,
            &QueueFilter::Project(project_id.to_string()),
            self.config.page_size,
        )
        .await?;
        Ok(members.into_iter().filter(QueueItem::is_pending).collect())
    }

    /// Pair queue items with the text of their source entry
    ///
    /// Items whose source entry disappeared can never be translated. They
    /// are completed without a target text so they no longer hold their
    /// project open, and their count is returned alongside the units.
    async fn with_source_text(
        &self,
        items: Vec<QueueItem>,
    ) -> Result<(Vec<(QueueItem, String)>, usize)> {
        let mut units = Vec::with_capacity(items.len());
        let mut orphans = Vec::new();
        for mut item in items {
            match self.store.get_entry(&item.source_id).await? {
                Some(source) => units.push((item, source.text)),
                None => {
                    warn!(
                        "{}, retiring queue item {}",
                        Error::not_found("source entry", item.source_id.as_str()),
                        item.id
                    );
                    item.mark_completed();
                    orphans.push(item);
                }
            }
        }
        if !orphans.is_empty() {
            self.store.batch_put_queue_items(&orphans).await?;
        }
        Ok((units, orphans.len()))
    }

    fn async_provider(&self, project: &Project) -> Result<std::sync::Arc<dyn AsyncProjectProvider>> {
        match self.providers.resolve(project.provider)? {
            Provider::Async(provider) => Ok(provider),
            Provider::Sync(provider) => Err(Error::StateConflict(format!(
                "project {} is handled by {}, which has no remote projects",
                project.id,
                provider.provider_name()
            ))),
        }
    }
}

fn external_id(project: &Project) -> Result<&str> {
    project
        .provider_data
        .as_ref()
        .map(|data| data.external_id.as_str())
        .ok_or_else(|| {
            Error::StateConflict(format!(
                "project {} is in progress without a provider handle",
                project.id
            ))
        })
}
