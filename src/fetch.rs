//! Paginated report fetching
//!
//! Wraps the `reports/user-activity` endpoint: one call shape for the
//! site-wide caller summary and one for a single user's call detail. Every
//! fetch runs under a bounded retry with quadratic backoff; per-user fetches
//! additionally wait out a fixed rate-limit delay on every attempt, including
//! the first, so a fully healthy run still stays under the provider's
//! request-rate ceiling.
//!
//! The default page size is large enough that pagination is unused in
//! practice, but the fetcher still walks pages until one comes back short.

use crate::models::{CallActivity, CallerSummary, ReportPage};
use crate::window::TimeWindow;
use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do when one user's fetch exhausts its retry budget. Selected once
/// from configuration; the pipeline branches on it at the loop boundary and
/// nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserFailureMode {
    /// Abort the whole run (one persistently failing user blocks the window)
    Abort,
    /// Record the failure, continue with the remaining users, and report the
    /// skipped users in the run summary
    Skip,
}

/// Bounded retry with quadratic backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// One backoff unit; attempt `t` waits `t² × unit` before trying
    pub backoff_unit: Duration,
    /// Extra delay on every rate-limited attempt, including the first
    pub rate_limit: Duration,
}

impl RetryPolicy {
    /// Delay before 0-indexed attempt `t`: 0, 1, 4, 9, ... backoff units
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_unit * (attempt * attempt)
    }

    /// Drive `op` until it succeeds or the attempt budget is spent. The last
    /// error is propagated, wrapped with `label` so the failing operation is
    /// identifiable in the log stream.
    pub async fn run<T, F, Fut>(&self, label: &str, rate_limited: bool, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let extra = if rate_limited {
            self.rate_limit
        } else {
            Duration::ZERO
        };

        let mut last_error = None;
        for attempt in 0..self.attempts {
            tokio::time::sleep(self.backoff_delay(attempt) + extra).await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.attempts,
                        error = %format!("{err:#}"),
                        "{} failed, will retry",
                        label
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err)
                .with_context(|| format!("{label}: giving up after {} attempts", self.attempts)),
            None => bail!("{label}: retry budget is zero"),
        }
    }
}

/// Client for the `reports/user-activity` endpoint
pub struct ReportsClient {
    http: Client,
    reports_url: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl ReportsClient {
    pub fn new(http: Client, reports_url: String, page_size: u32, retry: RetryPolicy) -> Self {
        Self {
            http,
            reports_url,
            page_size,
            retry,
        }
    }

    /// Fetch the site-wide activity summary for the window: one
    /// [`CallerSummary`] per user that had any activity.
    pub async fn caller_summaries(
        &self,
        token: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CallerSummary>> {
        self.retry
            .run("call activity summary fetch", false, || {
                self.fetch_all(token, None, window)
            })
            .await
    }

    /// Fetch one user's call activity for the window, rate-limited.
    pub async fn user_call_activity(
        &self,
        token: &str,
        user_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<CallActivity>> {
        let label = format!("call record fetch for user {user_id}");
        self.retry
            .run(&label, true, || self.fetch_all(token, Some(user_id), window))
            .await
    }

    /// Walk pages until one comes back short, concatenating items.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        token: &str,
        user: Option<&str>,
        window: &TimeWindow,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 0u32;

        loop {
            let batch = self.fetch_page::<T>(token, user, window, page).await?;
            let full_page = batch.len() >= self.page_size as usize;
            items.extend(batch);

            if !full_page {
                break;
            }
            page += 1;
            debug!(page, user = user.unwrap_or("<summary>"), "fetching next report page");
        }

        Ok(items)
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        token: &str,
        user: Option<&str>,
        window: &TimeWindow,
        page: u32,
    ) -> Result<Vec<T>> {
        let url = match user {
            Some(user_id) => format!("{}/{}", self.reports_url, user_id),
            None => self.reports_url.clone(),
        };

        let response = self
            .http
            .get(&url)
            .query(&[
                ("startTime", window.start_param()),
                ("endTime", window.end_param()),
                ("page", page.to_string()),
                ("pageSize", self.page_size.to_string()),
            ])
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("report request to {url} failed"))?;

        if response.status() != StatusCode::OK {
            bail!(
                "report request to {} failed, HTTP response was: {}",
                url,
                response.status()
            );
        }

        let body: ReportPage<T> = response
            .json()
            .await
            .with_context(|| format!("report response from {url} was not valid JSON"))?;

        Ok(body.items)
    }
}
