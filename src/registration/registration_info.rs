//! Registration records and the required-field check

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registration::error::RegistrationError;

/// Profile assembled from one registration form, plus the uploaded payment image URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub transaction_id: String,
    pub college_name: String,
    pub year_of_study: String,
    pub branch: String,
    pub is_dual_booted: bool,
    #[serde(default)]
    pub referral_code: String,
    #[serde(rename = "paymentImg")]
    pub payment_image_url: String,
}

/// A persisted registration. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    #[serde(flatten)]
    pub input: RegistrationInput,
    pub registered_at: DateTime<Utc>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralScore {
    pub referral_code: String,
    /// Number of registrations carrying this code.
    pub score: usize,
}

type FieldExtractor = fn(&RegistrationInput) -> &str;

/// Required fields in the order they are checked.
const REQUIRED_FIELDS: [(&str, FieldExtractor); 8] = [
    ("Name", |r| r.name.as_str()),
    ("Email", |r| r.email.as_str()),
    ("Phone", |r| r.phone.as_str()),
    ("TransactionId", |r| r.transaction_id.as_str()),
    ("CollegeName", |r| r.college_name.as_str()),
    ("YearOfStudy", |r| r.year_of_study.as_str()),
    ("Branch", |r| r.branch.as_str()),
    ("PaymentImg", |r| r.payment_image_url.as_str()),
];

impl RegistrationInput {
    /// Fails on the first empty required field. Whitespace counts as a value.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        match REQUIRED_FIELDS
            .iter()
            .find(|(_, extract)| extract(self).is_empty())
        {
            Some(&(field, _)) => Err(RegistrationError::ValidationError(field)),
            None => Ok(()),
        }
    }

    pub fn has_referral(&self) -> bool {
        !self.referral_code.is_empty()
    }
}

impl Registration {
    pub fn filename(&self) -> String {
        format!("registration-{}.json", self.id)
    }
}

impl std::fmt::Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}> ({})", self.input.name, self.input.email, self.id)
    }
}

#[cfg(test)]
pub(crate) fn complete_input() -> RegistrationInput {
    RegistrationInput {
        name: "Ada".into(),
        email: "ada@example.com".into(),
        phone: "9000000000".into(),
        transaction_id: "TXN-1".into(),
        college_name: "WCE".into(),
        year_of_study: "TY".into(),
        branch: "CSE".into(),
        is_dual_booted: false,
        referral_code: String::new(),
        payment_image_url: "https://img.example/p.png".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(field: &str) -> RegistrationInput {
        let mut input = complete_input();
        match field {
            "Name" => input.name.clear(),
            "Email" => input.email.clear(),
            "Phone" => input.phone.clear(),
            "TransactionId" => input.transaction_id.clear(),
            "CollegeName" => input.college_name.clear(),
            "YearOfStudy" => input.year_of_study.clear(),
            "Branch" => input.branch.clear(),
            "PaymentImg" => input.payment_image_url.clear(),
            other => panic!("unknown field {other}"),
        }
        input
    }

    #[test]
    fn complete_input_is_valid() {
        assert_eq!(complete_input().validate(), Ok(()));
    }

    #[test]
    fn each_missing_field_is_reported_by_name() {
        for (field, _) in REQUIRED_FIELDS.iter() {
            let err = missing(field).validate().unwrap_err();
            assert_eq!(err.user_message(), format!("{} is required", field));
        }
    }

    #[test]
    fn first_missing_field_wins() {
        let mut input = complete_input();
        input.branch.clear();
        input.phone.clear();
        assert_eq!(input.validate(), Err(RegistrationError::ValidationError("Phone")));
    }

    #[test]
    fn whitespace_is_not_trimmed() {
        let mut input = complete_input();
        input.name = "  ".into();
        assert!(input.validate().is_ok());
    }

    #[test]
    fn optional_fields_are_never_required() {
        let mut input = complete_input();
        input.referral_code.clear();
        input.is_dual_booted = false;
        assert!(input.validate().is_ok());
        assert!(!input.has_referral());
    }

    #[test]
    fn registration_serializes_with_form_field_names() {
        let registration = Registration {
            id: "abc".into(),
            input: complete_input(),
            registered_at: Utc::now(),
        };
        let json = serde_json::to_value(&registration).unwrap();
        assert_eq!(json["transactionId"], "TXN-1");
        assert_eq!(json["paymentImg"], "https://img.example/p.png");
        assert_eq!(json["isDualBooted"], false);
        assert_eq!(registration.filename(), "registration-abc.json");

        let back: Registration = serde_json::from_value(json).unwrap();
        assert_eq!(back, registration);
    }
}
