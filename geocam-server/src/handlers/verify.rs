//! Image verification handler
//!
//! Handles POST /api/verify-image requests.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use geocam_core::{VerificationService, VerifyImageRequest, VerifyImageResponse};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Verify the payload hidden in an uploaded image
///
/// Accepts `{ "imageBase64": "<base64 or data URL>" }` and answers with the
/// verification contract: `success` tells whether a payload was found,
/// `verification_result.signature_valid` whether it verified, and
/// `decoded_info` carries the signed metadata of an authentic image.
///
/// A missing payload or a bad signature is a 200 response; only an
/// unreadable request is an error.
#[instrument(level = "debug", skip_all)]
pub async fn verify_image_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyImageRequest>, JsonRejection>,
) -> Result<Json<VerifyImageResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
    if request.image_base64.trim().is_empty() {
        return Err(ApiError::bad_request("imageBase64 is required"));
    }

    let response = state.engine.verify_image(&request).await?;

    info!(
        success = response.success,
        signature_valid = response
            .verification_result
            .as_ref()
            .is_some_and(|r| r.signature_valid),
        "Image verification served"
    );
    Ok(Json(response))
}
