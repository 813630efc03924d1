//! Registration pipeline: upload -> extract -> validate -> persist -> notify
//!
//! The payment image is uploaded before the form is validated, so the upload
//! URL is itself a required field. A rejection after a successful upload
//! leaves the uploaded image behind; nothing here deletes it. Retrying after
//! a persistence failure uploads the image again.
//!
//! The confirmation mail is spawned onto its own task once the record is
//! stored. Nothing joins it, and nothing bounds how many run at once: a burst
//! of registrations is a burst of SMTP sessions. Its failure is only logged.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::registration::error::RegistrationError;
use crate::registration::form::{FormSubmission, PaymentImage};
use crate::registration::media::MediaUploader;
use crate::registration::notifier::Notifier;
use crate::registration::registration_info::{Registration, RegistrationInput};
use crate::registration::store::RegistrationStore;

pub const SUCCESS_MESSAGE: &str = "User created successfully";

/// Stage of a registration attempt, named in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Uploading,
    Validating,
    Persisting,
    NotifyScheduled,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => write!(f, "received"),
            Stage::Uploading => write!(f, "uploading"),
            Stage::Validating => write!(f, "validating"),
            Stage::Persisting => write!(f, "persisting"),
            Stage::NotifyScheduled => write!(f, "notify-scheduled"),
            Stage::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub success: bool,
    pub registration_id: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub upload_folder: String,
    pub upload_timeout: Duration,
    pub store_timeout: Duration,
    pub notify_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_folder: config.upload.folder.clone(),
            upload_timeout: config.upload.timeout(),
            store_timeout: config.store.timeout(),
            notify_timeout: config.mail.timeout(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct RegistrationPipeline {
    uploader: Arc<dyn MediaUploader>,
    store: Arc<dyn RegistrationStore>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl RegistrationPipeline {
    pub fn new(
        uploader: Arc<dyn MediaUploader>,
        store: Arc<dyn RegistrationStore>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            uploader,
            store,
            notifier,
            settings,
        }
    }

    /// Drives one submission to a stored registration or a rejection.
    pub async fn register(
        &self,
        mut form: FormSubmission,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let image = form
            .take_payment_image()
            .map_err(|e| failed(Stage::Received, e))?;

        let url = self
            .upload(image)
            .await
            .map_err(|e| failed(Stage::Uploading, e))?;

        let input = form
            .extract_input(url)
            .and_then(|input| input.validate().map(|_| input))
            .map_err(|e| failed(Stage::Validating, e))?;

        let registration = self
            .persist(&input)
            .await
            .map_err(|e| failed(Stage::Persisting, e))?;

        info!("Registered {}", registration);

        self.dispatch_notification(registration.clone());
        debug!(
            "Registration {} is {} -> {}",
            registration.id,
            Stage::NotifyScheduled,
            Stage::Done
        );

        Ok(RegistrationOutcome {
            success: true,
            registration_id: registration.id,
            message: SUCCESS_MESSAGE.to_string(),
        })
    }

    async fn upload(&self, image: PaymentImage) -> Result<String, RegistrationError> {
        let timeout = self.settings.upload_timeout;
        let folder = self.settings.upload_folder.as_str();

        match tokio::time::timeout(timeout, self.uploader.upload(image, folder)).await {
            Ok(Ok(url)) => {
                debug!("Payment image uploaded: {}", url);
                Ok(url)
            }
            Ok(Err(e)) => Err(RegistrationError::UploadError(e.to_string())),
            Err(_) => Err(RegistrationError::UploadError(format!(
                "timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn persist(&self, input: &RegistrationInput) -> Result<Registration, RegistrationError> {
        let timeout = self.settings.store_timeout;

        match tokio::time::timeout(timeout, self.store.create(input)).await {
            Ok(Ok(registration)) => Ok(registration),
            Ok(Err(e)) => Err(RegistrationError::PersistenceError(e.to_string())),
            Err(_) => Err(RegistrationError::PersistenceError(format!(
                "timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }

    fn dispatch_notification(&self, registration: Registration) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.settings.notify_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.notify(&registration)).await {
                Ok(true) => info!("Confirmation sent to {}", registration.input.email),
                Ok(false) => warn!(
                    "Failed to send confirmation for registration {}",
                    registration.id
                ),
                Err(_) => warn!(
                    "Confirmation for registration {} timed out after {} ms",
                    registration.id,
                    timeout.as_millis()
                ),
            }
        });
    }
}

fn failed(stage: Stage, err: RegistrationError) -> RegistrationError {
    match &err {
        RegistrationError::ValidationError(_) => {
            info!("Registration rejected while {}: {}", stage, err)
        }
        _ => warn!("Registration failed while {}: {}", stage, err),
    }
    err
}
