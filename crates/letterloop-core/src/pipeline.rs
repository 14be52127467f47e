use std::sync::Arc;
use std::time::Instant;

use letterloop_client::ModelClient;
use letterloop_logging::{LogEvent, Logger};
use letterloop_store::{keys, ArtifactStore};
use letterloop_writer::{AnalysisKind, Analyzer};
use serde::{Deserialize, Serialize};

use crate::LoopError;

/// Raw documents the analyzers read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSources {
    pub job_posting: String,
    pub resume: Option<String>,
    pub portfolio: Option<String>,
}

/// Which analyses a pipeline run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub completed: Vec<AnalysisKind>,
}

/// Runs company, applicant and project analysis in order.
///
/// The applicant and project steps run only when their source is given;
/// a skipped step leaves any earlier analysis of that kind in place.
/// The first failure stops the pipeline; earlier artifacts stay in the store.
pub struct AnalysisPipeline<'a> {
    run_id: String,
    client: &'a dyn ModelClient,
    store: &'a dyn ArtifactStore,
    logger: Arc<Logger>,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(client: &'a dyn ModelClient, store: &'a dyn ArtifactStore, logger: Arc<Logger>) -> Self {
        Self {
            run_id: keys::new_run_id(),
            client,
            store,
            logger,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn run(&self, sources: &AnalysisSources) -> Result<AnalysisReport, LoopError> {
        self.store.put(
            &keys::run_scoped(&self.run_id, keys::JOB_POSTING),
            &sources.job_posting,
        )?;
        self.store.put(keys::JOB_POSTING, &sources.job_posting)?;

        let steps = [
            (AnalysisKind::Company, Some(sources.job_posting.as_str())),
            (AnalysisKind::Applicant, sources.resume.as_deref()),
            (AnalysisKind::Project, sources.portfolio.as_deref()),
        ];

        let mut report = AnalysisReport::default();
        for (kind, source) in steps {
            let Some(source) = source else {
                if self.store.exists(kind.artifact_key())? {
                    tracing::warn!(
                        kind = %kind,
                        key = kind.artifact_key(),
                        "No source given; keeping the analysis from an earlier run"
                    );
                } else {
                    tracing::debug!(kind = %kind, "No source given, skipping analysis");
                }
                continue;
            };

            self.logger.log(&LogEvent::AnalysisStarted {
                kind: kind.to_string(),
            });
            let started = Instant::now();
            let text = Analyzer::new(kind, self.client, self.store)
                .with_run_id(self.run_id.as_str())
                .analyze(source)
                .await?;
            self.logger.log(&LogEvent::AnalysisCompleted {
                kind: kind.to_string(),
                chars: text.chars().count(),
                duration_secs: started.elapsed().as_secs_f64(),
            });
            report.completed.push(kind);
        }

        Ok(report)
    }
}
