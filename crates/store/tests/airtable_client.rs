use axum::{
    extract::{Path, RawQuery},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tablechat_core::{FieldMap, QueryParameters};
use tablechat_store::{fetch_all, AirtableClient, StoreError, TabularStore};

const TOKEN: &str = "pat-integration";

async fn spawn_fake_airtable() -> String {
    let router = Router::new()
        .route("/v0/meta/bases/{base}/tables", get(list_tables))
        .route("/v0/{base}/{table}", get(list_records).post(create_record));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let address = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake airtable should serve");
    });
    format!("http://{address}/v0")
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {TOKEN}");
    headers.get("authorization").and_then(|value| value.to_str().ok()) == Some(expected.as_str())
}

const CREATED: &str = "2024-01-01T00:00:00.000Z";

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {"type": "AUTHENTICATION_REQUIRED", "message": "Authentication required"}
        })),
    )
}

async fn list_tables(
    Path(base): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(base, "appFAKE");
    (
        StatusCode::OK,
        Json(json!({"tables": [
            {"id": "tblTasks0000001", "name": "Tasks", "primaryFieldId": "fld1"},
            {"id": "tblProj0000002", "name": "Open Projects", "primaryFieldId": "fld2"}
        ]})),
    )
}

async fn list_records(
    Path((_base, table)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    if table != "Open Projects" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "NOT_FOUND"})));
    }

    let query = query.unwrap_or_default();
    if query.contains("offset=itrPAGE2") {
        return (
            StatusCode::OK,
            Json(json!({"records": [
                {"id": "rec3", "createdTime": CREATED, "fields": {"Name": "Gamma"}}
            ]})),
        );
    }

    assert!(query.contains("filterByFormula="), "filter should be forwarded: {query}");
    (
        StatusCode::OK,
        Json(json!({
            "records": [
                {"id": "rec1", "createdTime": CREATED, "fields": {"Name": "Alpha"}},
                {"id": "rec2", "createdTime": CREATED, "fields": {"Name": "Beta"}}
            ],
            "offset": "itrPAGE2"
        })),
    )
}

async fn create_record(
    Path((_base, table)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(table, "Tasks");
    assert_eq!(body["typecast"], json!(true));

    if body["fields"].get("Colour").is_some() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": {"type": "UNKNOWN_FIELD_NAME", "message": "Unknown field name: \"Colour\""}
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({"id": "recNEW", "createdTime": CREATED, "fields": body["fields"]})),
    )
}

fn client(api_url: &str, token: &str) -> AirtableClient {
    AirtableClient::with_client(
        reqwest::Client::new(),
        api_url,
        "appFAKE",
        SecretString::from(token.to_string()),
    )
    .expect("client should build")
}

#[tokio::test]
async fn lists_tables_from_metadata_api() {
    let api_url = spawn_fake_airtable().await;

    let tables = client(&api_url, TOKEN).list_tables().await.expect("tables should load");

    let names = tables.iter().map(|table| table.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Tasks", "Open Projects"]);
    assert_eq!(tables[0].id, "tblTasks0000001");
}

#[tokio::test]
async fn follows_offsets_across_pages() {
    let api_url = spawn_fake_airtable().await;
    let params = QueryParameters {
        filter_by_formula: "SEARCH('a', {Name})".to_string(),
        max_records: 10,
        ..QueryParameters::default()
    };

    let records = fetch_all(&client(&api_url, TOKEN), "Open Projects", &params)
        .await
        .expect("records should load");

    let ids = records.iter().map(|record| record.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["rec1", "rec2", "rec3"]);
}

#[tokio::test]
async fn create_returns_new_record() {
    let api_url = spawn_fake_airtable().await;
    let mut fields = FieldMap::new();
    fields.insert("Name".to_string(), json!("Write docs"));

    let record =
        client(&api_url, TOKEN).create_record("Tasks", fields).await.expect("create should work");

    assert_eq!(record.id, "recNEW");
    assert_eq!(record.fields["Name"], json!("Write docs"));
}

#[tokio::test]
async fn rejected_write_surfaces_store_message() {
    let api_url = spawn_fake_airtable().await;
    let mut fields = FieldMap::new();
    fields.insert("Colour".to_string(), json!("red"));

    let error = client(&api_url, TOKEN)
        .create_record("Tasks", fields)
        .await
        .expect_err("unknown field should be rejected");

    match error {
        StoreError::Status { status, message } => {
            assert_eq!(status, 422);
            assert!(message.contains("UNKNOWN_FIELD_NAME"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn bad_token_is_reported_as_status_error() {
    let api_url = spawn_fake_airtable().await;

    let error = client(&api_url, "pat-wrong").list_tables().await.expect_err("should be rejected");

    assert!(matches!(error, StoreError::Status { status: 401, .. }));
}
