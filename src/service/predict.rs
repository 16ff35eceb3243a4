use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use super::AppState;

const FILE_FIELD: &str = "file";

/// `POST /api/predict` with a multipart `file` field.
pub(super) async fn predict(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<Bytes> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(FILE_FIELD) {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => upload = Some(bytes),
                    Err(e) => return (e.status(), e.body_text()).into_response(),
                }
            }
            Ok(None) => break,
            Err(e) => return (e.status(), e.body_text()).into_response(),
        }
    }

    let image = match upload {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return (StatusCode::BAD_REQUEST, "File is empty!").into_response(),
    };

    let predictor = state.predictor.clone();
    let size = image.len();
    let result = tokio::task::spawn_blocking(move || predictor.predict(&image)).await;

    match result {
        Ok(Ok(prediction)) => {
            info!(bytes = size, "Prediction served");
            Json(prediction).into_response()
        }
        Ok(Err(e)) => {
            error!("Prediction failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
        }
        Err(e) => {
            error!("Prediction worker failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
        }
    }
}
