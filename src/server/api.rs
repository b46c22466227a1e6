use crate::dispatcher::Dispatcher;
use crate::history::ConversationLog;
use crate::models::api::{
    ChatRequest,
    ChatResponse,
    ConversationsQuery,
    ErrorResponse,
    HealthResponse,
    TrainResponse,
};
use crate::server::tls::TlsPaths;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, Query },
    response::{ IntoResponse, Response },
    http::{ HeaderValue, StatusCode },
};
use tower_http::cors::{ Any, AllowOrigin, CorsLayer };
use log::{ info, error };

const MAX_PAGE_SIZE: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub conversation_log: Arc<dyn ConversationLog>,
    pub page_size: usize,
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { detail: "Internal server error".into() }),
    ).into_response()
}

fn cors_layer(origin: &str) -> Result<CorsLayer, Box<dyn Error + Send + Sync>> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::exact(
            HeaderValue::from_str(origin.trim()).map_err(|e|
                format!("Invalid CORS origin '{}': {}", origin, e)
            )?
        )
    };
    Ok(CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any))
}

pub fn router(state: AppState, cors_origin: &str) -> Result<Router, Box<dyn Error + Send + Sync>> {
    Ok(
        Router::new()
            .route("/chat", post(chat_handler))
            .route("/train", post(train_handler))
            .route("/health", get(health_handler))
            .route("/conversations", get(conversations_handler))
            .layer(cors_layer(cors_origin)?)
            .with_state(state)
    )
}

pub async fn serve_http(
    addr: &str,
    app: Router,
    tls: Option<TlsPaths>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;

    if let Some(tls) = tls {
        let tls_config = axum_server::tls_rustls::RustlsConfig
            ::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        info!("Starting HTTPS API server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Starting HTTP API server on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

async fn chat_handler(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    info!("Received chat request: {}", req.user_message);
    let reply = state.dispatcher.dispatch(&req.user_message).await;
    info!("Chat reply route: {}", reply.route());
    let bot_response = reply.into_text();

    match state.conversation_log.record(&req.user_message, &bot_response).await {
        Ok(record) => {
            info!("Stored conversation #{}", record.id);
            Json(ChatResponse { bot_response }).into_response()
        }
        Err(e) => {
            error!("Error in chat endpoint: {}", e);
            internal_error()
        }
    }
}

async fn train_handler() -> Json<TrainResponse> {
    info!("Starting model training");
    Json(TrainResponse { message: "Training completed".into() })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".into() })
}

async fn conversations_handler(
    State(state): State<AppState>,
    Query(query): Query<ConversationsQuery>
) -> Response {
    let limit = query.limit.unwrap_or(state.page_size).min(MAX_PAGE_SIZE);
    match state.conversation_log.recent(limit).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!("Error listing conversations: {}", e);
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::{ greeting_intents, StubClient };
    use crate::dispatcher::FixedPicker;
    use crate::error::PersistenceError;
    use crate::history::MemoryConversationLog;
    use crate::models::chat::ConversationRecord;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{ json, Value };
    use tower::ServiceExt;

    struct BrokenLog;

    #[async_trait]
    impl ConversationLog for BrokenLog {
        async fn record(&self, _: &str, _: &str) -> Result<ConversationRecord, PersistenceError> {
            Err(PersistenceError::Poisoned)
        }

        async fn recent(&self, _: usize) -> Result<Vec<ConversationRecord>, PersistenceError> {
            Err(PersistenceError::Poisoned)
        }
    }

    fn app_with(client: Arc<StubClient>, log: Arc<dyn ConversationLog>) -> Router {
        let dispatcher = Dispatcher::new(greeting_intents(), client, "sys").with_picker(
            Arc::new(FixedPicker(0))
        );
        router(AppState { dispatcher, conversation_log: log, page_size: 20 }, "*").unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_always_healthy() {
        let app = app_with(StubClient::failing(), Arc::new(BrokenLog));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn chat_returns_reply_and_persists_exchange() {
        let log = Arc::new(MemoryConversationLog::default());
        let app = app_with(StubClient::failing(), log.clone());

        let res = app.oneshot(post_json("/chat", json!({ "user_message": "Hello" }))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({ "bot_response": "Hi there!" }));

        let stored = log.recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].user_input, "Hello");
        assert_eq!(stored[0].bot_response, "Hi there!");
    }

    #[tokio::test]
    async fn chat_degrades_to_fallback_when_model_fails() {
        let log = Arc::new(MemoryConversationLog::default());
        let app = app_with(StubClient::failing(), log.clone());

        let res = app
            .oneshot(post_json("/chat", json!({ "user_message": "quantum entanglement explained simply" })))
            .await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["bot_response"], crate::config::FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn persistence_failure_is_a_generic_500() {
        let app = app_with(StubClient::answering("fine"), Arc::new(BrokenLog));
        let res = app.oneshot(post_json("/chat", json!({ "user_message": "Hello" }))).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, json!({ "detail": "Internal server error" }));
    }

    #[tokio::test]
    async fn chat_rejects_missing_field() {
        let app = app_with(StubClient::failing(), Arc::new(MemoryConversationLog::default()));
        let res = app.oneshot(post_json("/chat", json!({ "message": "Hello" }))).await.unwrap();
        assert!(res.status().is_client_error());
    }

    #[tokio::test]
    async fn train_accepts_an_empty_body() {
        let app = app_with(StubClient::failing(), Arc::new(BrokenLog));
        let req = Request::builder().method("POST").uri("/train").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "Training completed");
    }

    #[tokio::test]
    async fn conversations_lists_newest_first() {
        let log = Arc::new(MemoryConversationLog::default());
        log.record("first", "one").await.unwrap();
        log.record("second", "two").await.unwrap();
        let app = app_with(StubClient::failing(), log);

        let req = Request::builder().uri("/conversations?limit=1").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["user_input"], "second");
    }

    #[test]
    fn rejects_unparseable_cors_origin() {
        assert!(cors_layer("bad\norigin").is_err());
        assert!(cors_layer("http://localhost:5173").is_ok());
    }
}
