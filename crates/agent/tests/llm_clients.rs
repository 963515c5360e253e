use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tablechat_agent::llm::{OllamaClient, OpenAiClient};
use tablechat_agent::{CompletionRequest, LlmClient, LlmError};
use tablechat_core::ChatMessage;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let address = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake model server should serve");
    });
    format!("http://{address}")
}

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest {
        messages: vec![ChatMessage::system("reply briefly"), ChatMessage::user(prompt)],
        temperature: 0.2,
        max_tokens: 128,
    }
}

async fn ollama_chat(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    assert_eq!(body["stream"], json!(false));
    assert_eq!(body["model"], json!("llama3.1"));
    assert_eq!(body["messages"][0]["role"], json!("system"));
    assert_eq!(body["options"]["num_predict"], json!(128));

    let prompt = body["messages"][1]["content"].as_str().unwrap_or_default();
    if prompt == "say nothing" {
        let reply = json!({"message": {"role": "assistant", "content": "  "}, "done": true});
        return (StatusCode::OK, Json(reply));
    }
    if prompt == "unknown model" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "model 'llama3.1' not found"})));
    }
    let reply = json!({
        "model": "llama3.1",
        "message": {"role": "assistant", "content": format!("echo: {prompt}")},
        "done": true
    });
    (StatusCode::OK, Json(reply))
}

async fn ollama_tags() -> Json<Value> {
    Json(json!({"models": [{"name": "llama3.1"}]}))
}

#[tokio::test]
async fn ollama_client_round_trips_chat() {
    let router =
        Router::new().route("/api/chat", post(ollama_chat)).route("/api/tags", get(ollama_tags));
    let base_url = spawn(router).await;
    let client = OllamaClient::new(reqwest::Client::new(), &base_url, "llama3.1");

    let reply = client.complete(request("hello")).await.expect("completion");

    assert_eq!(reply, "echo: hello");
    client.check_health().await.expect("health");
}

#[tokio::test]
async fn ollama_blank_completion_is_returned_as_text() {
    let base_url = spawn(Router::new().route("/api/chat", post(ollama_chat))).await;
    let client = OllamaClient::new(reqwest::Client::new(), &base_url, "llama3.1");

    let reply = client.complete(request("say nothing")).await.expect("blank reply");

    assert!(reply.trim().is_empty());
}

#[tokio::test]
async fn ollama_error_status_keeps_body() {
    let base_url = spawn(Router::new().route("/api/chat", post(ollama_chat))).await;
    let client = OllamaClient::new(reqwest::Client::new(), &base_url, "llama3.1");

    let error = client.complete(request("unknown model")).await.expect_err("missing model");

    match error {
        LlmError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

async fn openai_chat(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorization = headers.get("authorization").and_then(|value| value.to_str().ok());
    if authorization != Some("Bearer sk-test") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "invalid api key"}})));
    }
    assert_eq!(body["max_tokens"], json!(128));

    let content = match body["messages"][1]["content"].as_str() {
        Some("say nothing") => Value::Null,
        _ => json!("from openai"),
    };
    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })),
    )
}

#[tokio::test]
async fn openai_client_sends_bearer_key() {
    let base_url = spawn(Router::new().route("/v1/chat/completions", post(openai_chat))).await;
    let client = OpenAiClient::new(
        reqwest::Client::new(),
        &base_url,
        "gpt-4o-mini",
        Some(SecretString::from("sk-test".to_string())),
    );

    assert_eq!(client.complete(request("hi")).await.expect("completion"), "from openai");
}

#[tokio::test]
async fn openai_null_content_is_returned_as_empty_text() {
    let base_url = spawn(Router::new().route("/v1/chat/completions", post(openai_chat))).await;
    let client = OpenAiClient::new(
        reqwest::Client::new(),
        &base_url,
        "gpt-4o-mini",
        Some(SecretString::from("sk-test".to_string())),
    );

    assert_eq!(client.complete(request("say nothing")).await.expect("completion"), "");
}

#[tokio::test]
async fn openai_client_without_key_is_rejected_by_server() {
    let base_url = spawn(Router::new().route("/v1/chat/completions", post(openai_chat))).await;
    let client = OpenAiClient::new(reqwest::Client::new(), &base_url, "gpt-4o-mini", None);

    let error = client.complete(request("hi")).await.expect_err("unauthorized");

    assert!(matches!(error, LlmError::Status { status: 401, .. }));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    let client =
        OllamaClient::new(reqwest::Client::new(), &format!("http://{address}"), "llama3.1");

    let error = client.complete(request("hello")).await.expect_err("nothing listening");

    assert!(matches!(error, LlmError::Http(_)));
}
