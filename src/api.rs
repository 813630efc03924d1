//! HTTP API for event registration and the referral leaderboard

use crate::registration::form::PAYMENT_IMAGE_FIELD;
use crate::registration::{
    FormSubmission, PaymentImage, ReferralAggregator, RegistrationError, RegistrationPipeline,
};
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Largest accepted registration body.
pub const MAX_FORM_BYTES: usize = 10 << 20;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RegistrationPipeline>,
    pub leaderboard: Arc<ReferralAggregator>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub service: String,
}

// Configure routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .route("/register", post(register))
        .route("/leaderboard", get(leaderboard))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = match self {
            RegistrationError::UploadInputError(_)
            | RegistrationError::MalformedRequestError(_)
            | RegistrationError::ValidationError(_) => StatusCode::BAD_REQUEST,
            RegistrationError::UploadError(_) => StatusCode::BAD_GATEWAY,
            RegistrationError::PersistenceError(_)
            | RegistrationError::AggregationReadError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ApiResponse {
            message: self.user_message(),
            success: false,
            data: None,
            error: self.cause().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_check() -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok".to_string(),
        service: "event-registration".to_string(),
    })
}

async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, RegistrationError> {
    let form = match multipart {
        Ok(multipart) => read_form(multipart).await,
        Err(rejection) => {
            let mut form = FormSubmission::new();
            form.mark_malformed(rejection.body_text());
            form
        }
    };

    let outcome = state.pipeline.register(form).await?;
    info!("Registration {} accepted", outcome.registration_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            message: outcome.message,
            success: outcome.success,
            data: Some(outcome.registration_id),
            error: None,
        }),
    ))
}

async fn leaderboard(State(state): State<AppState>) -> Response {
    match state.leaderboard.leaderboard().await {
        Ok(scores) => (StatusCode::OK, Json(scores)).into_response(),
        Err(e) => {
            error!("Leaderboard request failed: {}", e);
            e.into_response()
        }
    }
}

/// Reads every part of the submission. Stops at the first broken part.
async fn read_form(mut multipart: Multipart) -> FormSubmission {
    let mut form = FormSubmission::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                form.mark_malformed(e.body_text());
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        // A value-only part under the image name is read as text and never uploaded.
        if name == PAYMENT_IMAGE_FIELD && field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            match field.bytes().await {
                Ok(bytes) => form.set_payment_image(PaymentImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                }),
                Err(e) => {
                    form.mark_payment_image_unreadable(e.body_text());
                    break;
                }
            }
        } else {
            match field.text().await {
                Ok(value) => form.insert_field(name, value),
                Err(e) => {
                    form.mark_malformed(e.body_text());
                    break;
                }
            }
        }
    }

    form
}
