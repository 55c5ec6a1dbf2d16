//! 推論API
//!
//! - `GET /health` モデルの有無
//! - `POST /predict?conf=&iou=` multipartの `image` を推論して `{"boxes": [...]}` を返す
//! - `GET /metrics` ルートごとのリクエスト数とレイテンシ（Prometheus）
//!
//! モデルは起動時に作って状態に渡す。成功した推論は予測ログに1行追記する。

pub mod metrics;

pub use metrics::HttpMetrics;

use crate::detector::{DetectParams, ModelHandle};
use crate::error::{Result, TacoSortError};
use crate::monitor::prediction_log::{now_timestamp, PredictionLog};
use axum::{
    extract::{multipart::Multipart, rejection::QueryRejection, DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use taco_sort_common::{Detection, PredictionLogRecord};

/// 画像アップロードの上限
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub model: Option<Arc<ModelHandle>>,
    pub prediction_log: Arc<PredictionLog>,
    pub metrics: Arc<HttpMetrics>,
}

impl AppState {
    pub fn new(model: Option<Arc<ModelHandle>>, prediction_log: PredictionLog) -> Result<Self> {
        Ok(Self {
            model,
            prediction_log: Arc::new(prediction_log),
            metrics: Arc::new(HttpMetrics::new()?),
        })
    }
}

/// リクエスト単位のエラー
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }

    fn internal(cause: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("Internal Server Error: {}", cause),
        }
    }

    fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "Model not loaded".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::error!("{} {}", self.status, self.detail);
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track_metrics,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> std::result::Result<Response, ApiError> {
    let body = state.metrics.render().map_err(ApiError::internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.model {
        Some(_) => Json(json!({ "status": "ok", "model_loaded": true })),
        None => Json(json!({ "status": "error", "model_loaded": false })),
    }
}

async fn predict_handler(
    State(state): State<AppState>,
    query: std::result::Result<Query<DetectParams>, QueryRejection>,
    multipart: Multipart,
) -> std::result::Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    params
        .validate()
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;

    let model = state.model.clone().ok_or_else(ApiError::unavailable)?;
    let bytes = read_image_field(multipart).await?;

    let prediction_log = state.prediction_log.clone();
    let detections = tokio::task::spawn_blocking(move || {
        let detections = detect_bytes(&model, &bytes, &params)?;
        append_prediction(&prediction_log, &detections);
        Ok::<_, TacoSortError>(detections)
    })
    .await
    .map_err(ApiError::internal)?
    .map_err(ApiError::internal)?;

    Ok(Json(json!({ "boxes": detections })))
}

async fn read_image_field(mut multipart: Multipart) -> std::result::Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::unprocessable(e.body_text()))?
    {
        if field.name() == Some("image") {
            let bytes = field.bytes().await.map_err(ApiError::internal)?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::unprocessable("field required: image"))
}

/// 予測ログに1行追記（失敗してもリクエストは成功扱い）
fn append_prediction(prediction_log: &PredictionLog, detections: &[Detection]) {
    let record = PredictionLogRecord::from_detections(detections, now_timestamp());
    if let Err(e) = prediction_log.append(&record) {
        log::warn!("予測ログに書き込めません: {}: {}", prediction_log.path().display(), e);
    }
}

/// アップロード画像を一時ファイルに置いて推論
fn detect_bytes(model: &ModelHandle, bytes: &[u8], params: &DetectParams) -> Result<Vec<Detection>> {
    let format = image::guess_format(bytes)
        .map_err(|e| TacoSortError::ImageLoad(e.to_string()))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| TacoSortError::ImageLoad(e.to_string()))?;

    let suffix = format
        .extensions_str()
        .first()
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix("taco-sort-upload-")
        .suffix(&suffix)
        .tempfile()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;

    model.detect(tmp.path(), params)
}

/// サーバー起動（Ctrl+C で停止）
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;

    match &state.model {
        Some(model) => println!("✔ モデル: {}", model.name()),
        None => println!("⚠ モデル未設定（/predict は 503 を返します）"),
    }
    println!("✔ http://{}", addr);
    println!("  Ctrl+C で停止\n");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n停止しました");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("シグナル待機に失敗: {}", e);
    }
}
