//! Decoded registration form, as handed over by the HTTP layer

use std::collections::HashMap;

use crate::registration::error::RegistrationError;
use crate::registration::registration_info::RegistrationInput;

/// Name of the multipart file field carrying the payment screenshot.
pub const PAYMENT_IMAGE_FIELD: &str = "paymentImg";

#[derive(Debug, Clone)]
pub struct PaymentImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Everything read from one multipart submission.
///
/// Decoding keeps going past a bad part where it can; the first decode error
/// is recorded and only reported once the pipeline reaches field extraction.
#[derive(Debug, Clone, Default)]
pub struct FormSubmission {
    fields: HashMap<String, String>,
    payment_image: Option<PaymentImage>,
    payment_image_error: Option<String>,
    decode_error: Option<String>,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn with_payment_image(mut self, image: PaymentImage) -> Self {
        self.payment_image = Some(image);
        self
    }

    /// Later values for the same name are ignored, like a form's first-value lookup.
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_insert_with(|| value.into());
    }

    pub fn set_payment_image(&mut self, image: PaymentImage) {
        if self.payment_image.is_none() {
            self.payment_image = Some(image);
        }
    }

    /// The file part was present but its body could not be read.
    pub fn mark_payment_image_unreadable(&mut self, reason: impl Into<String>) {
        self.payment_image_error.get_or_insert_with(|| reason.into());
    }

    pub fn mark_malformed(&mut self, reason: impl Into<String>) {
        self.decode_error.get_or_insert_with(|| reason.into());
    }

    /// Takes the payment image out of the submission.
    pub fn take_payment_image(&mut self) -> Result<PaymentImage, RegistrationError> {
        if let Some(reason) = self.payment_image_error.take() {
            return Err(RegistrationError::UploadInputError(reason));
        }
        match self.payment_image.take() {
            Some(image) if !image.bytes.is_empty() => Ok(image),
            Some(_) => Err(RegistrationError::UploadInputError(format!(
                "{} is empty",
                PAYMENT_IMAGE_FIELD
            ))),
            None => match &self.decode_error {
                Some(reason) => Err(RegistrationError::UploadInputError(reason.clone())),
                None => Err(RegistrationError::UploadInputError(format!(
                    "no {} part in form",
                    PAYMENT_IMAGE_FIELD
                ))),
            },
        }
    }

    /// Builds the profile from the text fields. Absent fields become empty strings.
    pub fn extract_input(
        &self,
        payment_image_url: String,
    ) -> Result<RegistrationInput, RegistrationError> {
        if let Some(reason) = &self.decode_error {
            return Err(RegistrationError::MalformedRequestError(reason.clone()));
        }

        Ok(RegistrationInput {
            name: self.field("name"),
            email: self.field("email"),
            phone: self.field("phone"),
            transaction_id: self.field("transactionId"),
            college_name: self.field("collegeName"),
            year_of_study: self.field("yearOfStudy"),
            branch: self.field("branch"),
            is_dual_booted: self.field("isDualBooted") == "true",
            referral_code: self.field("referralCode"),
            payment_image_url,
        })
    }

    fn field(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn image() -> PaymentImage {
    PaymentImage {
        file_name: Some("receipt.png".into()),
        content_type: Some("image/png".into()),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

#[cfg(test)]
pub(crate) fn complete_form() -> FormSubmission {
    FormSubmission::new()
        .with_field("name", "Ada")
        .with_field("email", "ada@example.com")
        .with_field("phone", "9000000000")
        .with_field("transactionId", "TXN-1")
        .with_field("collegeName", "WCE")
        .with_field("yearOfStudy", "TY")
        .with_field("branch", "CSE")
        .with_field("isDualBooted", "true")
        .with_field("referralCode", "LD-42")
        .with_payment_image(image())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_every_field() {
        let input = complete_form()
            .extract_input("https://img.example/p.png".into())
            .unwrap();
        assert_eq!(input.name, "Ada");
        assert_eq!(input.transaction_id, "TXN-1");
        assert_eq!(input.year_of_study, "TY");
        assert!(input.is_dual_booted);
        assert_eq!(input.referral_code, "LD-42");
        assert_eq!(input.payment_image_url, "https://img.example/p.png");
    }

    #[test]
    fn dual_boot_flag_is_only_true_for_literal_true() {
        for value in ["TRUE", "yes", "1", ""] {
            let input = FormSubmission::new()
                .with_field("isDualBooted", value)
                .extract_input(String::new())
                .unwrap();
            assert!(!input.is_dual_booted, "{value:?} should not count");
        }
    }

    #[test]
    fn missing_fields_extract_as_empty() {
        let input = FormSubmission::new().extract_input("u".into()).unwrap();
        assert_eq!(input.email, "");
        assert_eq!(input.referral_code, "");
    }

    #[test]
    fn first_value_wins_for_repeated_fields() {
        let form = FormSubmission::new()
            .with_field("name", "first")
            .with_field("name", "second");
        assert_eq!(form.extract_input(String::new()).unwrap().name, "first");
    }

    #[test]
    fn missing_image_is_an_upload_input_error() {
        let mut form = FormSubmission::new().with_field("name", "Ada");
        assert!(matches!(
            form.take_payment_image(),
            Err(RegistrationError::UploadInputError(_))
        ));
    }

    #[test]
    fn empty_or_unreadable_image_is_rejected() {
        let mut empty = FormSubmission::new().with_payment_image(PaymentImage {
            file_name: None,
            content_type: None,
            bytes: Vec::new(),
        });
        assert!(matches!(
            empty.take_payment_image(),
            Err(RegistrationError::UploadInputError(_))
        ));

        let mut broken = complete_form();
        broken.mark_payment_image_unreadable("stream reset");
        assert_eq!(
            broken.take_payment_image().unwrap_err(),
            RegistrationError::UploadInputError("stream reset".into())
        );
    }

    #[test]
    fn malformed_form_fails_field_extraction_only() {
        let mut form = complete_form();
        form.mark_malformed("unexpected end of part");
        assert!(form.take_payment_image().is_ok());
        assert_eq!(
            form.extract_input("u".into()).unwrap_err(),
            RegistrationError::MalformedRequestError("unexpected end of part".into())
        );
    }
}
