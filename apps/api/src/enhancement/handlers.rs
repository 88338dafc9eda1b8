use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use uuid::Uuid;

use crate::enhancement::models::EnhanceRequest;
use crate::enhancement::pipeline::EnhanceResponse;
use crate::errors::AppError;
use crate::models::CallerIdentity;
use crate::state::AppState;

/// POST /api/v1/resumes/:id/enhance
pub async fn handle_enhance(
    State(state): State<AppState>,
    caller: CallerIdentity,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<EnhanceRequest>, JsonRejection>,
) -> Result<Json<EnhanceResponse>, AppError> {
    let Path(document_id) =
        path.map_err(|e| AppError::Validation(format!("Invalid resume id: {}", e.body_text())))?;
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let response = state.service.enhance(&caller, document_id, request).await?;
    Ok(Json(response))
}
