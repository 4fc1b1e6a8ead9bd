//! Email delivery of generated artifacts.
//!
//! Sending never fails the caller: every problem, from a disabled transport
//! to an SMTP rejection, comes back as an [`EmailOutcome`] with `sent=false`.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::SmtpConfig;
use crate::docx::DOCX_MIME;

pub const DEFAULT_SUBJECT: &str = "Documento generado";
pub const DEFAULT_BODY: &str = "Adjunto encontrarás el documento generado.";

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmailOutcome {
    pub sent: bool,
    pub to: Option<String>,
    pub error: Option<String>,
}

impl EmailOutcome {
    /// No recipient was given, so nothing was attempted.
    pub fn skipped() -> Self {
        Self {
            sent: false,
            to: None,
            error: None,
        }
    }

    pub fn delivered(to: &str) -> Self {
        Self {
            sent: true,
            to: Some(to.to_string()),
            error: None,
        }
    }

    pub fn failed(to: &str, error: impl Into<String>) -> Self {
        Self {
            sent: false,
            to: Some(to.to_string()),
            error: Some(error.into()),
        }
    }
}

/// Optional email block of a generation request.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EmailRequest {
    #[serde(default, alias = "destino")]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl EmailRequest {
    /// Trimmed, non-empty recipient.
    pub fn recipient(&self) -> Option<&str> {
        self.to.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

pub struct Mailer {
    config: SmtpConfig,
    transport: Result<AsyncSmtpTransport<Tokio1Executor>, String>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("config", &self.config)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl Mailer {
    pub fn new(config: SmtpConfig) -> Self {
        let transport = if !config.enabled {
            Err("SMTP is disabled (SMTP_ENABLED=0)".to_string())
        } else if !config.has_credentials() {
            Err("SMTP_USER / SMTP_PASS are not configured".to_string())
        } else {
            build_transport(&config)
        };
        if let Err(reason) = &transport {
            if config.enabled {
                log::warn!("Email delivery unavailable: {}", reason);
            }
        }
        Self { config, transport }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send `attachment` to `to`. Subject and body fall back to the defaults.
    pub async fn send(
        &self,
        to: &str,
        subject: Option<&str>,
        body: Option<&str>,
        attachment: &Path,
        attachment_name: &str,
    ) -> EmailOutcome {
        let transport = match &self.transport {
            Ok(transport) => transport,
            Err(reason) => return EmailOutcome::failed(to, reason.clone()),
        };

        let bytes = match tokio::fs::read(attachment).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("Attachment {} unreadable: {}", attachment.display(), e);
                return EmailOutcome::failed(to, format!("attachment not found: {}", attachment_name));
            }
        };

        let message = match build_message(
            self.config.sender(),
            to,
            subject.filter(|s| !s.trim().is_empty()).unwrap_or(DEFAULT_SUBJECT),
            body.filter(|b| !b.trim().is_empty()).unwrap_or(DEFAULT_BODY),
            bytes,
            attachment_name,
        ) {
            Ok(message) => message,
            Err(e) => return EmailOutcome::failed(to, e),
        };

        log::info!("Sending '{}' to {}", attachment_name, to);
        match transport.send(message).await {
            Ok(_) => {
                log::info!("Email sent to {}", to);
                EmailOutcome::delivered(to)
            }
            Err(e) => {
                log::error!("SMTP send to {} failed: {}", to, e);
                EmailOutcome::failed(to, map_smtp_error(&e))
            }
        }
    }

    /// Send per the request's email block, or to `fallback_to` when the block
    /// names no recipient. Skipped when neither is set.
    pub async fn deliver(
        &self,
        request: Option<&EmailRequest>,
        fallback_to: Option<&str>,
        attachment: &Path,
        attachment_name: &str,
    ) -> EmailOutcome {
        let to = request
            .and_then(EmailRequest::recipient)
            .or_else(|| fallback_to.map(str::trim).filter(|t| !t.is_empty()));
        match to {
            Some(to) => {
                self.send(
                    to,
                    request.and_then(|r| r.subject.as_deref()),
                    request.and_then(|r| r.body.as_deref()),
                    attachment,
                    attachment_name,
                )
                .await
            }
            None => EmailOutcome::skipped(),
        }
    }
}

/// MIME type for an attachment, falling back to the word-processing type.
pub fn attachment_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_raw()
        .unwrap_or(DOCX_MIME)
        .to_string()
}

/// Build a plain-text message carrying one attachment.
pub fn build_message(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
    attachment: Vec<u8>,
    attachment_name: &str,
) -> Result<Message, String> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| format!("invalid sender address: {}", e))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| format!("invalid recipient address: {}", e))?;
    let content_type = ContentType::parse(&attachment_content_type(attachment_name))
        .map_err(|e| format!("invalid attachment type: {}", e))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body.to_string()))
                .singlepart(Attachment::new(attachment_name.to_string()).body(attachment, content_type)),
        )
        .map_err(|e| format!("failed to build email: {}", e))
}

fn build_transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    let builder = if config.ssl {
        AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| format!("SMTP TLS relay error: {}", e))?
    } else if config.starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP STARTTLS relay error: {}", e))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
    };

    Ok(builder
        .port(config.port)
        .credentials(Credentials::new(
            config.user.clone(),
            config.password.clone(),
        ))
        .timeout(Some(config.timeout))
        .build())
}

fn map_smtp_error(error: &lettre::transport::smtp::Error) -> String {
    if error.is_transient() {
        format!("transient SMTP error: {}", error)
    } else if error.is_permanent() {
        format!("permanent SMTP error: {}", error)
    } else {
        format!("SMTP error: {}", error)
    }
}
