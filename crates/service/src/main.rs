use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, routing::put, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

use lessonforge_core::{sanitize_name, CurriculumMetadata};
use lessonforge_llm::ChatClient;
use lessonforge_planner::{
    run_pipeline, Phase, PipelineDeps, PlanRecord, PlannerConfig, PlanRequest, RecordStore,
    Session,
};
use lessonforge_rag::{EmbeddingClient, VectorIndex};

#[derive(Clone)]
struct AppState {
    deps: Arc<PipelineDeps>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let config = PlannerConfig::from_env()?;
    let deps = PipelineDeps {
        records: RecordStore::open(&config.records_db)?,
        index: VectorIndex::open(&config.index_db)?,
        embeddings: EmbeddingClient::from_env().unwrap_or_else(|_| EmbeddingClient::hash()),
        chat: ChatClient::new(config.provider, config.model.clone())?,
    };
    let state = AppState {
        deps: Arc::new(deps),
    };
    let app = Router::new()
        .route("/plans", post(handle_create_plan))
        .route("/plans/:id", get(handle_get_plan))
        .route("/plans/:id", put(handle_update_plan))
        .route("/plans/:id/download", get(handle_download_plan))
        .with_state(state);
    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    record_id: String,
    collection: String,
    metadata: CurriculumMetadata,
    lesson_plan: String,
}

#[derive(Debug, Deserialize)]
struct PlanUpdateBody {
    lesson_plan: String,
}

#[derive(Debug, Serialize)]
struct PlanUpdateResponse {
    modified: usize,
}

async fn handle_create_plan(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PlanResponse>, AppError> {
    let request = extract_plan_request(&mut multipart).await?;
    request.validate().map_err(AppError::bad_request)?;
    let deps = state.deps.clone();
    let outcome = task::spawn_blocking(move || run_pipeline(&deps, &request))
        .await
        .map_err(AppError::internal)?
        .map_err(classify_pipeline_error)?;
    Ok(Json(PlanResponse {
        record_id: outcome.record_id,
        collection: outcome.collection,
        metadata: outcome.metadata,
        lesson_plan: outcome.lesson_plan,
    }))
}

async fn handle_get_plan(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<PlanRecord>, AppError> {
    let record = fetch_record(&state, id).await?;
    Ok(Json(record))
}

async fn handle_update_plan(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<PlanUpdateBody>,
) -> Result<Json<PlanUpdateResponse>, AppError> {
    // The record must exist and hold a generated plan before edits apply.
    let record = fetch_record(&state, id.clone()).await?;
    if record.lesson_plan.is_none() {
        return Err(AppError::bad_request("record has no generated plan to edit"));
    }
    let mut session = Session::resume_at(Phase::Generated);
    session.begin_edit().map_err(AppError::internal)?;
    let deps = state.deps.clone();
    let text = body.lesson_plan.clone();
    let modified = task::spawn_blocking(move || deps.records.update_plan(&id, &text))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::upstream)?;
    session.save_edit().map_err(AppError::internal)?;
    Ok(Json(PlanUpdateResponse { modified }))
}

async fn handle_download_plan(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, AppError> {
    let record = fetch_record(&state, id).await?;
    let plan = record
        .lesson_plan
        .ok_or_else(|| AppError::bad_request("record has no generated plan to download"))?;
    let filename = format!(
        "lesson_plan_{}.md",
        sanitize_name(&record.grade).to_lowercase()
    );
    let headers = [
        (header::CONTENT_TYPE, "text/markdown".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, plan).into_response())
}

async fn fetch_record(state: &AppState, id: String) -> Result<PlanRecord, AppError> {
    let deps = state.deps.clone();
    let record = task::spawn_blocking(move || deps.records.fetch(&id))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::upstream)?;
    record.ok_or(AppError::NotFound)
}

/// Pulls the upload and the three scalar fields out of the multipart form.
async fn extract_plan_request(multipart: &mut Multipart) -> Result<PlanRequest, AppError> {
    let mut pdf_bytes = Vec::new();
    let mut file_name = String::new();
    let mut grade = String::new();
    let mut topic = String::new();
    let mut days: Option<u32> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(AppError::bad_request)?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "file" => {
                file_name = field.file_name().unwrap_or("upload").to_string();
                pdf_bytes = field
                    .bytes()
                    .await
                    .map_err(AppError::bad_request)?
                    .to_vec();
            }
            "grade" => grade = field.text().await.map_err(AppError::bad_request)?,
            "topic" => topic = field.text().await.map_err(AppError::bad_request)?,
            "days" => {
                let raw = field.text().await.map_err(AppError::bad_request)?;
                days = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| AppError::bad_request("days must be an integer"))?,
                );
            }
            _ => {}
        }
    }
    Ok(PlanRequest {
        file_name,
        pdf_bytes,
        grade,
        topic,
        days: days.ok_or_else(|| AppError::bad_request("days is required"))?,
    })
}

/// Maps a pipeline failure onto the HTTP taxonomy: unusable uploads are the
/// client's fault, model and store failures are upstream, the rest internal.
fn classify_pipeline_error(err: anyhow::Error) -> AppError {
    let chain = format!("{err:#}");
    if chain.contains("pdf extraction failed") {
        return AppError::BadRequest(chain);
    }
    if chain.contains("call failed")
        || chain.contains("failed to persist")
        || chain.contains("not valid JSON")
        || chain.contains("failed validation")
    {
        return AppError::Upstream(chain);
    }
    AppError::Internal(err)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn upstream<E: ToString>(msg: E) -> Self {
        Self::Upstream(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
            AppError::Upstream(msg) => {
                error!(%msg, "upstream failure");
                (StatusCode::BAD_GATEWAY, msg).into_response()
            }
            AppError::Internal(err) => {
                error!("internal_error" = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_filename_follows_the_grade_label() {
        let filename = format!(
            "lesson_plan_{}.md",
            sanitize_name("Grade 5").to_lowercase()
        );
        assert_eq!(filename, "lesson_plan_grade_5.md");
    }

    #[test]
    fn pipeline_errors_map_to_the_http_taxonomy() {
        let upload = classify_pipeline_error(anyhow::anyhow!("pdf extraction failed: bad bytes"));
        assert!(matches!(upload, AppError::BadRequest(_)));
        let store = classify_pipeline_error(anyhow::anyhow!(
            "failed to persist extracted metadata: record store unreachable"
        ));
        assert!(matches!(store, AppError::Upstream(_)));
        let other = classify_pipeline_error(anyhow::anyhow!("something else"));
        assert!(matches!(other, AppError::Internal(_)));
    }
}
