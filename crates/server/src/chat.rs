//! Chat endpoints in the two wire formats local chat front-ends speak:
//! OpenAI chat completions and Ollama's `/api/chat`. Neither streams.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use tablechat_agent::{DispatchContext, Dispatcher};
use tablechat_core::{ApplicationError, ChatMessage, InterfaceError, Message};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct ChatState {
    dispatcher: Arc<Dispatcher>,
    model: String,
}

impl ChatState {
    pub fn new(dispatcher: Arc<Dispatcher>, model: impl Into<String>) -> Self {
        Self { dispatcher, model: model.into() }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/api/chat", post(ollama_chat))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionsRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionsResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct OllamaChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub created_at: String,
    pub message: ChatMessage,
    pub done: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self.0 {
            InterfaceError::Internal { .. } => self.0.user_message().to_string(),
            other => other.message().to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                message,
                kind: self.0.kind(),
                correlation_id: self.0.correlation_id().to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn rejected(rejection: JsonRejection, correlation_id: String) -> ApiError {
    warn!(
        event_name = "chat.request.rejected",
        correlation_id = %correlation_id,
        error = %rejection.body_text()
    );
    ApiError(InterfaceError::BadRequest { message: rejection.body_text(), correlation_id })
}

async fn answer(
    state: &ChatState,
    messages: Vec<ChatMessage>,
    correlation_id: &str,
) -> Result<String, ApiError> {
    let ctx = DispatchContext { correlation_id: correlation_id.to_string() };
    let routed = state.dispatcher.route_with_context(&Message::new(messages), &ctx).await;
    routed.map_err(|dispatch_error| {
        let application = ApplicationError::from(dispatch_error);
        if matches!(application, ApplicationError::Integration(_)) {
            error!(
                event_name = "chat.request.failed",
                correlation_id = %correlation_id,
                error = %application
            );
        } else {
            warn!(
                event_name = "chat.request.unanswered",
                correlation_id = %correlation_id,
                error = %application
            );
        }
        ApiError(application.into_interface(correlation_id))
    })
}

pub async fn chat_completions(
    State(state): State<ChatState>,
    headers: HeaderMap,
    payload: Result<Json<ChatCompletionsRequest>, JsonRejection>,
) -> Result<Json<ChatCompletionsResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload.map_err(|rejection| rejected(rejection, correlation_id.clone()))?;

    let content = answer(&state, request.messages, &correlation_id).await?;

    Ok(Json(ChatCompletionsResponse {
        id: format!("chatcmpl-{}", Uuid::new_v4()),
        object: "chat.completion",
        created: Utc::now().timestamp(),
        model: request.model.unwrap_or_else(|| state.model.clone()),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ChatMessage::assistant(content),
            finish_reason: "stop",
        }],
    }))
}

pub async fn ollama_chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    payload: Result<Json<OllamaChatRequest>, JsonRejection>,
) -> Result<Json<OllamaChatResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload.map_err(|rejection| rejected(rejection, correlation_id.clone()))?;
    debug!(
        event_name = "chat.ollama.request",
        correlation_id = %correlation_id,
        stream_requested = request.stream.unwrap_or(false),
        has_options = request.options.is_some()
    );

    let content = answer(&state, request.messages, &correlation_id).await?;

    Ok(Json(OllamaChatResponse {
        model: request.model.unwrap_or_else(|| state.model.clone()),
        created_at: Utc::now().to_rfc3339(),
        message: ChatMessage::assistant(content),
        done: true,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tablechat_agent::llm::ScriptedLlmClient;
    use tablechat_agent::{default_dispatcher, CompletionGateway};
    use tablechat_store::InMemoryTabularStore;
    use tower::ServiceExt;

    use super::{router, ChatState};

    fn app(llm: Arc<ScriptedLlmClient>) -> Router {
        let store = Arc::new(InMemoryTabularStore::new());
        store.add_table("tblTasks000000001", "Tasks");
        let dispatcher = default_dispatcher(store, CompletionGateway::new(llm, 0.0, 256), "Tasks");
        router(ChatState::new(Arc::new(dispatcher), "tablechat"))
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-request-id", "req-test")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn completions_wraps_answer_in_openai_shape() {
        let (status, body) = post(
            app(Arc::new(ScriptedLlmClient::default())),
            "/v1/chat/completions",
            json!({"model": "gpt-4", "messages": [{"role": "user", "content": "list tables"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["id"].as_str().expect("id").starts_with("chatcmpl-"));
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["model"], "gpt-4");
        assert!(body["created"].as_i64().expect("created") > 0);
        assert_eq!(body["choices"][0]["index"], 0);
        assert_eq!(body["choices"][0]["message"]["role"], "assistant");
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        let content = body["choices"][0]["message"]["content"].as_str().expect("content");
        assert!(content.contains("1. Tasks"));
    }

    #[tokio::test]
    async fn ollama_route_answers_in_one_frame() {
        let (status, body) = post(
            app(Arc::new(ScriptedLlmClient::new(["{}"]))),
            "/api/chat",
            json!({
                "messages": [
                    {"role": "system", "content": "be nice"},
                    {"role": "user", "content": "find blocked tasks"}
                ],
                "stream": true,
                "options": {"temperature": 0.1}
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["done"], true);
        assert_eq!(body["model"], "tablechat");
        assert_eq!(body["message"]["role"], "assistant");
        assert!(body["created_at"].as_str().is_some());
        let content = body["message"]["content"].as_str().expect("content");
        assert!(content.contains("couldn't find any records"));
    }

    #[tokio::test]
    async fn missing_user_message_is_bad_request() {
        let (status, body) = post(
            app(Arc::new(ScriptedLlmClient::default())),
            "/v1/chat/completions",
            json!({"messages": [{"role": "system", "content": "setup only"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");
        assert_eq!(body["error"]["correlation_id"], "req-test");
    }

    #[tokio::test]
    async fn unmatched_message_is_unprocessable_and_echoes_text() {
        let (status, body) = post(
            app(Arc::new(ScriptedLlmClient::default())),
            "/api/chat",
            json!({"messages": [{"role": "user", "content": "sing me a song"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["type"], "no_agent_matched");
        assert!(body["error"]["message"].as_str().expect("message").contains("sing me a song"));
    }

    #[tokio::test]
    async fn model_failure_is_internal_error() {
        let llm = Arc::new(ScriptedLlmClient::default());
        llm.push_failure("connection refused");

        let (status, body) = post(
            app(llm),
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "find my tasks"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "internal_error");
        let message = body["error"]["message"].as_str().expect("message");
        assert!(!message.contains("connection refused"));
    }

    #[tokio::test]
    async fn unknown_role_is_rejected_with_error_body() {
        let (status, body) = post(
            app(Arc::new(ScriptedLlmClient::default())),
            "/v1/chat/completions",
            json!({"messages": [{"role": "tool", "content": "list tables"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request");
    }
}
