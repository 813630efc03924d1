//! Confirmation mail sent after a registration is stored

use askama::Template;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::registration::registration_info::Registration;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Delivers the confirmation for one registration.
///
/// Implementations report failure through the return value only.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, registration: &Registration) -> bool;
}

/// Mail body. The name is HTML-escaped on render.
#[derive(Template)]
#[template(path = "confirmation.html")]
pub struct ConfirmationEmail<'a> {
    pub name: &'a str,
}

pub fn render_confirmation(name: &str) -> Result<String, NotifyError> {
    Ok(ConfirmationEmail { name }.render()?)
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    subject: String,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout()))
            .build();

        info!("SMTP notifier initialized for {}:{}", config.host, config.port);

        Ok(Self {
            transport,
            from: config.user.clone(),
            subject: config.subject.clone(),
        })
    }

    pub fn build_message(&self, registration: &Registration) -> Result<Message, NotifyError> {
        let body = render_confirmation(&registration.input.name)?;
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(registration.input.email.parse()?)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(body)?;
        Ok(message)
    }

    async fn send(&self, registration: &Registration) -> Result<(), NotifyError> {
        let message = self.build_message(registration)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, registration: &Registration) -> bool {
        match self.send(registration).await {
            Ok(()) => {
                debug!("Confirmation sent for registration {}", registration.id);
                true
            }
            Err(e) => {
                warn!(
                    "Failed to send confirmation for registration {}: {}",
                    registration.id, e
                );
                false
            }
        }
    }
}
