use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::PipelineError;
use crate::metrics::SUMMARY_HEADER;
use crate::models::DailySummary;

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const WORKSHEET: &str = "RawData";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Publishes the daily summary to one worksheet of a Google spreadsheet,
/// authenticating with a service-account JWT grant.
pub struct SheetsPublisher {
    http: reqwest::Client,
    spreadsheet_id: String,
    key: ServiceAccountKey,
}

impl SheetsPublisher {
    pub fn new(service_account_file: &Path, spreadsheet_id: String) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(service_account_file).map_err(|e| {
            PipelineError::Publish(format!(
                "cannot read service account file {}: {e}",
                service_account_file.display()
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::Publish(format!("invalid service account file: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Publish(e.to_string()))?;

        Ok(Self {
            http,
            spreadsheet_id,
            key,
        })
    }

    /// Clears the worksheet, then writes the summary (header included)
    /// starting at A1. Full overwrite, never incremental.
    pub async fn publish(&self, summary: &[DailySummary]) -> Result<(), PipelineError> {
        let token = self.access_token().await?;

        info!(worksheet = WORKSHEET, "clearing the summary worksheet");
        let clear_url = format!(
            "{SHEETS_API}/{}/values/{WORKSHEET}:clear",
            self.spreadsheet_id
        );
        let response = self
            .http
            .post(&clear_url)
            .bearer_auth(&token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        check_status("clear", response)?;

        info!(rows = summary.len(), "writing the daily summary");
        let update_url = format!(
            "{SHEETS_API}/{}/values/{WORKSHEET}!A1?valueInputOption=RAW",
            self.spreadsheet_id
        );
        let response = self
            .http
            .put(&update_url)
            .bearer_auth(&token)
            .json(&json!({ "values": sheet_values(summary) }))
            .send()
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        check_status("update", response)?;

        info!("daily summary published");
        Ok(())
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        let now = Utc::now().timestamp();
        let claims = GrantClaims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| PipelineError::Publish(format!("invalid service account key: {e}")))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| PipelineError::Publish(format!("cannot sign token grant: {e}")))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        let response = check_status("token grant", response)?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        Ok(token.access_token)
    }
}

fn check_status(
    stage: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PipelineError::Publish(format!("{stage} returned {status}")))
    }
}

/// Lays the summary out as sheet cells: header row first, one row per date.
pub fn sheet_values(summary: &[DailySummary]) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(summary.len() + 1);
    values.push(SUMMARY_HEADER.iter().map(|label| label.to_string()).collect());
    for day in summary {
        values.push(vec![
            day.date.to_string(),
            day.total_attempts.to_string(),
            day.successful_attempts.to_string(),
            day.unique_users.to_string(),
        ]);
    }
    values
}
