use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::error::PipelineError;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends the fixed run notification over SMTPS. The message content comes
/// entirely from configuration; nothing about the run is templated in.
pub async fn send_notification(mail: &MailConfig) -> Result<(), PipelineError> {
    let message = Message::builder()
        .from(parse_mailbox(&mail.sender)?)
        .to(parse_mailbox(&mail.receiver)?)
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.body.clone())
        .map_err(|e| PipelineError::Notification(e.to_string()))?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&mail.server)
        .map_err(|e| PipelineError::Notification(e.to_string()))?
        .port(mail.port)
        .credentials(Credentials::new(mail.sender.clone(), mail.password.clone()))
        .timeout(Some(SEND_TIMEOUT))
        .build();

    transport
        .send(message)
        .await
        .map_err(|e| PipelineError::Notification(e.to_string()))?;

    info!(receiver = %mail.receiver, "notification email sent");
    Ok(())
}

fn parse_mailbox(address: &str) -> Result<lettre::message::Mailbox, PipelineError> {
    address
        .parse()
        .map_err(|e| PipelineError::Notification(format!("bad address {address}: {e}")))
}
