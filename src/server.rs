// src/server.rs
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::chat;
use crate::genai::Generator;
use crate::pipeline::{self, PipelineError};
use crate::types::{AnalysisInput, MediaAttachment, VerdictRecord};

#[derive(Clone)]
pub struct Engine {
    pub genai: Arc<dyn Generator>,
    pub search_concurrency: usize,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
struct ChatReply {
    reply: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
}

async fn chat_handler(State(engine): State<Engine>, Json(req): Json<ChatRequest>) -> Response {
    match chat::civic_reply(engine.genai.as_ref(), &req.message).await {
        Ok(reply) => Json(ChatReply { reply }).into_response(),
        Err(PipelineError::Input(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ChatReply { reply: "Please enter a message.".into() }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ChatReply { reply: "System error: unable to process chat request.".into() }),
            )
                .into_response()
        }
    }
}

/// Multipart form: optional `text` field, optional `image` file part. The
/// image only ever exists as request-scoped bytes; nothing is written to
/// disk.
async fn analyze_handler(State(engine): State<Engine>, mut multipart: Multipart) -> Response {
    let mut claim: Option<String> = None;
    let mut image_bytes: Option<Vec<u8>> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart body: {e}")),
        };
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => match field.text().await {
                Ok(t) => claim = Some(t),
                Err(e) => return bad_request(format!("unreadable text field: {e}")),
            },
            Some("image") => match field.bytes().await {
                Ok(b) => image_bytes = Some(b.to_vec()),
                Err(e) => return bad_request(format!("unreadable image field: {e}")),
            },
            _ => {}
        }
    }

    let image = match image_bytes
        .filter(|b| !b.is_empty())
        .map(MediaAttachment::from_bytes)
        .transpose()
    {
        Ok(image) => image,
        Err(e) => return bad_request(e.to_string()),
    };
    let input = AnalysisInput { claim, image };

    match pipeline::run(engine.genai.as_ref(), &input, engine.search_concurrency).await {
        Ok(record) => Json(record).into_response(),
        Err(PipelineError::Input(msg)) => bad_request(msg),
        // Failure status plus the ERROR record; never 2xx with a
        // misleading verdict.
        Err(e) => {
            tracing::error!(error = %e, "forensic analysis failed");
            (StatusCode::BAD_GATEWAY, Json(VerdictRecord::failure(e.to_string()))).into_response()
        }
    }
}

pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/analyze", post(analyze_handler))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

pub async fn run_server(engine: Engine, addr: &str) -> anyhow::Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "factlab listening");
    axum::serve(listener, app).await?;
    Ok(())
}
