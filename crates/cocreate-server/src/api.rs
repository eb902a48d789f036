use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cocreate_common::config::AppConfig;
use cocreate_common::{ChatTurn, Properties, DEFAULT_DOCUMENT_LABEL};
use cocreate_core::chat::DEFAULT_HISTORY_LIMIT;
use cocreate_core::ingest::{ConversationIngested, DocumentIngested, EntitiesLinked, EntityCreated};
use cocreate_core::{ChatHistory, ChatRelay, ConversationMessage, Envelope, IngestionPipeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub chat: ChatRelay,
    pub config: AppConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origins_list());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/api/chat", post(chat))
        .route("/api/chat/history/:session_id", get(chat_history))
        .route("/api/ingest/document", post(ingest_document))
        .route("/api/ingest/conversation", post(ingest_conversation))
        .route("/api/entity", post(create_entity))
        .route("/api/relationship", post(create_relationship))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .into_inner(),
        )
        .with_state(state)
}

/// Credentials are allowed, so methods and headers mirror the request instead of using `*`.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn error_detail(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "detail": detail.into() }))).into_response()
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "CoCreateAI Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    context: Option<Properties>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    session_id: Option<String>,
}

async fn chat(State(state): State<Arc<AppState>>, Json(payload): Json<ChatRequest>) -> Response {
    if let Some(session_id) = &payload.session_id {
        if let Err(e) = ChatHistory::validate_session_id(session_id) {
            return error_detail(StatusCode::BAD_REQUEST, e.to_string());
        }
    }

    match state
        .chat
        .chat(&payload.message, payload.session_id.as_deref(), payload.context.as_ref())
        .await
    {
        Ok(response) => Json(ChatResponse {
            response,
            session_id: payload.session_id,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Chat failed: {:?}", e);
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<ChatTurn>,
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    if let Err(e) = ChatHistory::validate_session_id(&session_id) {
        return error_detail(StatusCode::BAD_REQUEST, e.to_string());
    }

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.chat.history(&session_id, limit) {
        Ok(messages) => Json(HistoryResponse { session_id, messages }).into_response(),
        Err(e) => {
            tracing::error!("Failed to read chat history for {}: {:?}", session_id, e);
            error_detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ── Ingestion ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DocumentRequest {
    document: Properties,
    #[serde(default)]
    document_type: Option<String>,
}

async fn ingest_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DocumentRequest>,
) -> Json<Envelope<DocumentIngested>> {
    let document_type = payload.document_type.as_deref().unwrap_or(DEFAULT_DOCUMENT_LABEL);
    Json(state.pipeline.ingest_document(payload.document, document_type).await)
}

#[derive(Deserialize)]
struct ConversationRequest {
    conversation_id: String,
    messages: Vec<ConversationMessage>,
    #[serde(default)]
    metadata: Option<Properties>,
}

async fn ingest_conversation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConversationRequest>,
) -> Json<Envelope<ConversationIngested>> {
    Json(
        state
            .pipeline
            .ingest_conversation(&payload.conversation_id, &payload.messages, payload.metadata)
            .await,
    )
}

#[derive(Deserialize)]
struct EntityRequest {
    entity_type: String,
    properties: Properties,
}

async fn create_entity(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EntityRequest>,
) -> Json<Envelope<EntityCreated>> {
    Json(state.pipeline.create_entity(&payload.entity_type, payload.properties).await)
}

#[derive(Deserialize)]
struct RelationshipRequest {
    from_type: String,
    from_id: String,
    to_type: String,
    to_id: String,
    relationship_type: String,
    #[serde(default)]
    properties: Option<Properties>,
}

async fn create_relationship(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RelationshipRequest>,
) -> Json<Envelope<EntitiesLinked>> {
    Json(
        state
            .pipeline
            .link_entities(
                &payload.from_type,
                &payload.from_id,
                &payload.to_type,
                &payload.to_id,
                &payload.relationship_type,
                payload.properties,
            )
            .await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use cocreate_common::config::LLMProvider;
    use cocreate_core::{create_llm_client, MemoryGraphStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(chat: ChatRelay) -> Arc<AppState> {
        Arc::new(AppState {
            pipeline: IngestionPipeline::new(Arc::new(MemoryGraphStore::new())),
            chat,
            config: AppConfig::default(),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = router(test_state(ChatRelay::new(None)));

        let (status, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["message"], "CoCreateAI Backend API");

        let (_, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(body, json!({"status": "healthy"}));

        let (_, body) = send(&app, Method::GET, "/version", None).await;
        assert!(body["build_time"].is_string());
    }

    #[tokio::test]
    async fn test_ingest_document_defaults_type() {
        let app = router(test_state(ChatRelay::new(None)));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ingest/document",
            Some(json!({"document": {"title": "x"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["node"]["label"], "Document");
        assert_eq!(body["node"]["properties"]["title"], "x");
    }

    #[tokio::test]
    async fn test_validation_failure_is_http_200_envelope() {
        let app = router(test_state(ChatRelay::new(None)));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/entity",
            Some(json!({"entity_type": "Person) DETACH DELETE n //", "properties": {"id": "p1"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_kind"], "validation");
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_then_relationship() {
        let app = router(test_state(ChatRelay::new(None)));

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/ingest/conversation",
            Some(json!({
                "conversation_id": "c1",
                "messages": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}],
                "metadata": {"channel": "web"}
            })),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["conversation"]["properties"]["id"], "c1");
        assert_eq!(body["message_count"], 2);

        send(
            &app,
            Method::POST,
            "/api/entity",
            Some(json!({"entity_type": "Person", "properties": {"id": "ana"}})),
        )
        .await;

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/relationship",
            Some(json!({
                "from_type": "Person", "from_id": "ana",
                "to_type": "Conversation", "to_id": "c1",
                "relationship_type": "PARTICIPATED_IN"
            })),
        )
        .await;
        assert_eq!(body["success"], true);
        assert_eq!(body["relationship"]["rel_type"], "PARTICIPATED_IN");

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/relationship",
            Some(json!({
                "from_type": "Person", "from_id": "nobody",
                "to_type": "Conversation", "to_id": "c1",
                "relationship_type": "PARTICIPATED_IN"
            })),
        )
        .await;
        assert_eq!(body, json!({"success": true, "relationship": null}));
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let app = router(test_state(ChatRelay::new(None)));
        let (status, _) = send(&app, Method::POST, "/api/entity", Some(json!({"properties": {}}))).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_chat_without_llm_is_500_with_detail() {
        let app = router(test_state(ChatRelay::new(None)));
        let (status, body) = send(&app, Method::POST, "/api/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_chat_relays_and_records_history() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
            })))
            .mount(&mock_server)
            .await;

        let mut llm_config = AppConfig::default().llm;
        llm_config.provider = LLMProvider::OpenAI;
        llm_config.endpoint = Some(mock_server.uri());
        llm_config.api_key = Some("test-key".into());

        let dir = tempfile::tempdir().unwrap();
        let relay = ChatRelay::new(create_llm_client(&llm_config))
            .with_history(ChatHistory::open(dir.path()).unwrap(), 3);
        let app = router(test_state(relay));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/chat",
            Some(json!({"message": "hello", "session_id": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"response": "Hi there", "session_id": "s1"}));

        let (status, body) = send(&app, Method::GET, "/api/chat/history/s1?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "s1");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["content"], "Hi there");

        let (status, _) = send(&app, Method::GET, "/api/chat/history/a:b", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_limit_extremes() {
        let dir = tempfile::tempdir().unwrap();
        let history = ChatHistory::open(dir.path()).unwrap();
        history
            .append_all("s1", &[
                ChatTurn::new(cocreate_common::ChatRole::User, "hi"),
                ChatTurn::new(cocreate_common::ChatRole::Assistant, "hello"),
            ])
            .unwrap();
        let app = router(test_state(ChatRelay::new(None).with_history(history, 3)));

        let uri = format!("/api/chat/history/s1?limit={}", usize::MAX);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, Method::GET, "/api/chat/history/s1?limit=4398046511104", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, Method::GET, "/api/chat/history/s1?limit=0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));
    }

    #[tokio::test]
    async fn test_conversation_accepts_numeric_timestamp() {
        let app = router(test_state(ChatRelay::new(None)));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ingest/conversation",
            Some(json!({
                "conversation_id": "c9",
                "messages": [{"role": "user", "content": "hi", "timestamp": 1700000000}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message_count"], 1);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let app = router(test_state(ChatRelay::new(None)));
        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
    }
}
