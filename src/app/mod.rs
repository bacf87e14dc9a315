//! Run orchestration used by the binary.
//!
//! [`Orchestrator`] wires the pieces together for one run: the shared HTTP
//! session, the marketplace client, the version resolver and the scheduler.
//! Callers hand it a parsed [`ConfigDocument`] and get a [`RunReport`] back.

mod report;
mod settings;

pub use report::{ProcessExit, RunReport, determine_exit_outcome};
pub use settings::{Settings, SettingsError};

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::artifact::DownloadTask;
use crate::config::{ConfigDocument, ConfigError};
use crate::download::HttpClient;
use crate::marketplace::{MarketplaceApi, MarketplaceClient};
use crate::resolver::VersionResolver;
use crate::scheduler::{DownloadScheduler, RunStats, SchedulerError};
use crate::walker::walk_document;

/// Errors that stop a run before any download starts.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected settings.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Invalid configuration document.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("failed to initialize HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The scheduler rejected its parameters.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// One configured run.
#[derive(Debug)]
pub struct Orchestrator {
    settings: Settings,
    scheduler: DownloadScheduler,
}

impl Orchestrator {
    /// Builds the HTTP session and marketplace client from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] for invalid settings or when the HTTP client
    /// cannot be initialized.
    #[instrument(level = "debug", skip(settings), fields(output_dir = %settings.output_dir.display()))]
    pub fn new(settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;
        let http = HttpClient::with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
            .map_err(AppError::Client)?;
        let marketplace = MarketplaceClient::new(http.clone(), settings.endpoints.clone());
        Self::with_marketplace(settings, http, Arc::new(marketplace))
    }

    /// Builds an orchestrator over a caller-supplied metadata collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] for invalid settings.
    pub fn with_marketplace(
        settings: Settings,
        http: HttpClient,
        marketplace: Arc<dyn MarketplaceApi>,
    ) -> Result<Self, AppError> {
        settings.validate()?;
        let resolver = Arc::new(VersionResolver::new(marketplace));
        let scheduler = DownloadScheduler::new(settings.concurrency, resolver, http)?;
        debug!(concurrency = settings.concurrency, "orchestrator ready");
        Ok(Self {
            settings,
            scheduler,
        })
    }

    /// Interrupts the run when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.scheduler = self.scheduler.with_cancellation(cancel);
        self
    }

    /// The validated settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Live counters of the current run.
    #[must_use]
    pub fn stats(&self) -> Arc<RunStats> {
        self.scheduler.stats()
    }

    /// Walks `document` into tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on the first invalid entry; nothing is
    /// downloaded in that case.
    pub fn plan(document: &ConfigDocument) -> Result<Vec<DownloadTask>, ConfigError> {
        let tasks = walk_document(document)?;
        debug!(task_count = tasks.len(), "planned tasks");
        Ok(tasks)
    }

    /// Walks and downloads everything in `document`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the document is invalid. Download
    /// failures are reported in the [`RunReport`], not as errors.
    pub async fn run_document(&self, document: &ConfigDocument) -> Result<RunReport, AppError> {
        let tasks = Self::plan(document)?;
        Ok(self.run_tasks(tasks).await)
    }

    /// Downloads already planned tasks.
    pub async fn run_tasks(&self, tasks: Vec<DownloadTask>) -> RunReport {
        if tasks.is_empty() {
            info!("nothing to download");
            return RunReport::default();
        }
        let results = self.scheduler.run(tasks, &self.settings.output_dir).await;
        RunReport::new(results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::resolver::tests::FakeMarketplace;

    fn settings_in(dir: &TempDir) -> Settings {
        Settings {
            output_dir: dir.path().to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        assert!(matches!(
            Orchestrator::new(settings),
            Err(AppError::Settings(SettingsError::InvalidConcurrency { value: 0 }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_document_fails_before_any_download() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::with_marketplace(
            settings_in(&tmp),
            HttpClient::new(),
            Arc::new(FakeMarketplace::default()),
        )
        .unwrap();
        let document =
            ConfigDocument::from_json_str(r#"{"vscode": {"platform": "solaris"}}"#);

        // Unknown platforms are caught either at parse time or at walk time.
        let result = match document {
            Ok(document) => orchestrator.run_document(&document).await.map(|_| ()),
            Err(e) => Err(AppError::Config(e)),
        };
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::UnknownPlatform { .. }))
        ));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_document_is_success() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::with_marketplace(
            settings_in(&tmp),
            HttpClient::new(),
            Arc::new(FakeMarketplace::default()),
        )
        .unwrap();
        let document = ConfigDocument::from_json_str("{}").unwrap();

        let report = orchestrator.run_document(&document).await.unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.exit_outcome(), ProcessExit::Success);
    }

    #[tokio::test]
    async fn test_unknown_extension_reported_as_failure() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = Orchestrator::with_marketplace(
            settings_in(&tmp),
            HttpClient::new(),
            Arc::new(FakeMarketplace::default()),
        )
        .unwrap();
        let document =
            ConfigDocument::from_json_str(r#"{"extensions": {"python": "nobody.nothing"}}"#)
                .unwrap();

        let report = orchestrator.run_document(&document).await.unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.exit_outcome(), ProcessExit::Failure);
        assert!(!tmp.path().join("python").exists());
    }
}
