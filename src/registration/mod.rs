//! Event registration intake and referral leaderboard

pub mod error;
pub mod form;
pub mod leaderboard;
pub mod media;
pub mod notifier;
pub mod pipeline;
pub mod registration_info;
pub mod store;

pub use error::{RegistrationError, StoreError};
pub use form::{FormSubmission, PaymentImage};
pub use leaderboard::ReferralAggregator;
pub use media::{CloudinaryUploader, MediaUploader};
pub use notifier::{Notifier, SmtpNotifier};
pub use pipeline::{PipelineSettings, RegistrationOutcome, RegistrationPipeline};
pub use registration_info::{ReferralScore, Registration, RegistrationInput};
pub use store::{InMemoryStore, JsonDirStore, RegistrationStore};
