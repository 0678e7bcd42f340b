use super::error::ApiError;
use super::AppState;
use crate::fields::FormFields;
use crate::process::{FillOutput, ProcessOutput, Upload};
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Body of `POST /fill`.
#[derive(Debug, Clone, Deserialize)]
pub struct FillRequest {
    pub fields: FormFields,
    #[serde(default)]
    pub template_pdf_filename: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /process`: multipart with one `form_image` and any number of
/// `documents`. Other parts are ignored.
pub async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessOutput>, ApiError> {
    let mut multipart = multipart.map_err(ApiError::from)?;
    let mut form = None;
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        let file_name = field.file_name().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?;

        match name.as_deref() {
            Some("form_image") => form = Some(Upload::new(file_name, data)),
            Some("documents") => documents.push(Upload::new(file_name, data)),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let form = form.ok_or_else(|| ApiError::unprocessable("form_image is required"))?;
    let output = state.filler.process_upload(form, documents).await?;
    Ok(Json(output))
}

/// `POST /fill`: write reviewed fields onto the template or a summary page.
pub async fn fill(
    State(state): State<AppState>,
    request: Result<Json<FillRequest>, JsonRejection>,
) -> Result<Json<FillOutput>, ApiError> {
    let Json(request) = request.map_err(ApiError::from)?;
    let output = state
        .filler
        .fill(&request.fields, request.template_pdf_filename.as_deref())
        .await?;
    Ok(Json(output))
}
