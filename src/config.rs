use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;

/// Settings for the attempt analytics pipeline, loaded from the
/// environment (a `.env` file is honored when present).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub api_url: String,
    pub client: String,
    pub client_key: String,
    pub database_url: String,
    pub service_account_file: PathBuf,
    pub spreadsheet_id: String,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub receiver: String,
    pub subject: String,
    pub body: String,
}

impl PipelineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            start_date: parse_date(&var("START_DATE")?)?,
            end_date: parse_date(&var("END_DATE")?)?,
            api_url: var("API_URL")?,
            client: var("CLIENT")?,
            client_key: var("CLIENT_KEY")?,
            database_url: var("DATABASE_URL")?,
            service_account_file: PathBuf::from(var("SERVICE_ACCOUNT_FILE")?),
            spreadsheet_id: var("SPREADSHEET_ID")?,
            mail: MailConfig::from_env()?,
        })
    }
}

impl MailConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = var("SMTP_PORT")?;
        Ok(Self {
            server: var("SMTP_SERVER")?,
            port: port
                .parse()
                .with_context(|| format!("SMTP_PORT is not a port number: {port}"))?,
            sender: var("SENDER_EMAIL")?,
            password: var("EMAIL_PASSWORD")?,
            receiver: var("RECEIVER_EMAIL")?,
            subject: var("EMAIL_SUBJECT")?,
            body: var("EMAIL_BODY")?,
        })
    }
}

fn var(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn parse_date(value: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("expected a YYYY-MM-DD date, got {value}"))
}
