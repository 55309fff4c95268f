use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;

use crate::error::PipelineError;
use crate::models::RawAttempt;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the grader attempts API.
pub struct AttemptsClient {
    http: reqwest::Client,
    api_url: String,
    client: String,
    client_key: String,
}

impl AttemptsClient {
    pub fn new(api_url: String, client: String, client_key: String) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_url,
            client,
            client_key,
        })
    }

    /// Downloads every attempt in the `[start, end]` window. Non-2xx
    /// responses and transport failures are network errors.
    pub async fn fetch_attempts(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawAttempt>, PipelineError> {
        info!(%start, %end, "fetching attempts from the grader API");

        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("client", self.client.as_str()),
                ("client_key", self.client_key.as_str()),
                ("start", &window_bound(start)),
                ("end", &window_bound(end)),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Network(format!(
                "attempts API returned {status}"
            )));
        }

        let attempts: Vec<RawAttempt> = response
            .json()
            .await
            .map_err(|e| PipelineError::Serialization(e.to_string()))?;

        info!(count = attempts.len(), "attempts downloaded");
        Ok(attempts)
    }
}

/// Formats a window bound the way the API expects:
/// `YYYY-MM-DD HH:MM:SS.ffffff`, at midnight of the given date.
pub fn window_bound(date: NaiveDate) -> String {
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .unwrap_or_default()
}
