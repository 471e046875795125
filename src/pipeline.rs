//! Run orchestration
//!
//! Wires the stages together for one window, strictly sequentially: token,
//! caller summary, one detail fetch per caller, normalization, load. All
//! waiting (backoff, rate limit) happens inside the fetch layer; everything
//! here either succeeds or aborts the run.

use crate::auth::acquire_access_token;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::fetch::{ReportsClient, UserFailureMode};
use crate::models::CallActivity;
use crate::normalize::normalize_batch;
use crate::store::{CallStore, MergeReport};
use crate::window::TimeWindow;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How often the per-user loop reports progress at info level
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of one completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub users_total: usize,
    /// Users whose fetch was skipped after exhausting retries; empty unless
    /// the failure mode is [`UserFailureMode::Skip`]
    pub users_skipped: Vec<String>,
    pub report: MergeReport,
    pub elapsed: Duration,
}

/// One run of the replication pipeline over one time window
pub struct SyncPipeline {
    config: Config,
    credentials: Credentials,
}

impl SyncPipeline {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    pub async fn run(&self, window: &TimeWindow) -> Result<RunSummary> {
        let timer = Instant::now();
        info!("{}", "=".repeat(80));
        info!(
            start = %window.start_param(),
            end = %window.end_param(),
            span_hours = window.span().num_hours(),
            "starting new run"
        );

        let http = reqwest::Client::new();

        info!("acquiring access token");
        let token = acquire_access_token(&http, &self.config.provider, &self.credentials)
            .await
            .context("failed to acquire an access token")?;

        let reports = ReportsClient::new(
            http,
            self.config.provider.reports_url.clone(),
            self.config.fetch.page_size,
            self.config.fetch.retry_policy(),
        );

        info!("collecting user ids from the call activity summary");
        let callers = reports
            .caller_summaries(&token, window)
            .await
            .context("no user ids could be retrieved from the API")?;

        info!(
            users = callers.len(),
            "collecting call records per user, this can take a few minutes"
        );
        let mut raw_calls: Vec<CallActivity> = Vec::new();
        let mut users_skipped = Vec::new();
        let mut last_progress: Option<Instant> = None;

        for (index, caller) in callers.iter().enumerate() {
            debug!(
                index = index + 1,
                total = callers.len(),
                user_id = %caller.user_id,
                user_name = %caller.user_name,
                "getting call records"
            );
            if last_progress.map_or(true, |at| at.elapsed() > PROGRESS_INTERVAL) {
                info!(
                    index = index + 1,
                    total = callers.len(),
                    user_id = %caller.user_id,
                    user_name = %caller.user_name,
                    "working"
                );
                last_progress = Some(Instant::now());
            }

            match reports
                .user_call_activity(&token, &caller.user_id, window)
                .await
            {
                Ok(calls) => raw_calls.extend(calls),
                Err(err) => match self.config.fetch.on_user_failure {
                    UserFailureMode::Abort => {
                        return Err(err).with_context(|| {
                            format!(
                                "failed to get call records for {} ({}), giving up",
                                caller.user_id, caller.user_name
                            )
                        });
                    }
                    UserFailureMode::Skip => {
                        error!(
                            user_id = %caller.user_id,
                            user_name = %caller.user_name,
                            error = %format!("{err:#}"),
                            "skipping user after exhausting retries"
                        );
                        users_skipped.push(format!("{} ({})", caller.user_id, caller.user_name));
                    }
                },
            }
        }

        let (records, recordings) = normalize_batch(&raw_calls)?;

        info!(
            calls = records.len(),
            recordings = recordings.len(),
            "writing batch to the database"
        );
        let store = CallStore::connect(&self.credentials.database_url(&self.config.database.url))
            .await
            .context("failed to open the call record store")?;
        let report = store
            .load_batch(&records, &recordings, self.config.database.recording_dedup)
            .await
            .context("failed to load the batch")?;

        info!(
            calls_merged = report.calls_merged,
            calls_duplicate = report.calls_duplicate(),
            recordings_merged = report.recordings_merged,
            recordings_duplicate = report.recordings_duplicate(),
            "committed batch"
        );
        if !users_skipped.is_empty() {
            error!(users = ?users_skipped, "run completed with skipped users");
        }

        let elapsed = timer.elapsed();
        info!("{}", format_elapsed(elapsed));
        info!("{}", "=".repeat(80));

        Ok(RunSummary {
            users_total: callers.len(),
            users_skipped,
            report,
            elapsed,
        })
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    if seconds > 60 {
        format!(
            "finished in {} minutes and {} seconds.",
            seconds / 60,
            seconds % 60
        )
    } else {
        format!("finished in {seconds} seconds.")
    }
}
