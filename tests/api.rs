//! HTTP surface, exercised with `tower::ServiceExt::oneshot` against the
//! router and mocked OCR/model seams.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{mock_filler, pdfium_or_skip, FixedText, ScriptedLlm};
use formfill::{create_router, AppState, ServerConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;

const BOUNDARY: &str = "formfill-test-boundary";

fn app(uploads: &Path, ocr_text: &str, reply: &str) -> Router {
    let filler = mock_filler(uploads, FixedText::new(ocr_text), ScriptedLlm::replying(reply));
    create_router(AppState::new(filler), &ServerConfig::default())
}

/// Build a multipart body from `(field name, file name, bytes)` parts.
fn multipart(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let tmp = tempfile::tempdir().unwrap();
    let response = app(tmp.path(), "", "{}")
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_process_returns_verified_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let app = app(
        tmp.path(),
        "John Smith lives in Texas",
        r#"{"name": "John Smith", "dob": "1990-01-01", "email": null}"#,
    );

    let body = multipart(&[
        ("form_image", "form.pdf", b"%PDF-1.4\n".as_slice()),
        ("documents", "id.png", b"not really a png".as_slice()),
    ]);
    let response = app.oneshot(multipart_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let fields = &json["fields"];
    assert_eq!(fields["name"], "John Smith");
    assert_eq!(fields["dob"], Value::Null);
    assert_eq!(fields["raw_text"], "John Smith lives in Texas");

    let template = json["template_pdf_filename"].as_str().expect("template name");
    assert!(template.ends_with(".pdf"));
    assert!(tmp.path().join(template).is_file());
    assert_eq!(std::fs::read_dir(tmp.path().join("docs")).unwrap().count(), 1);
}

#[tokio::test]
async fn test_process_requires_form_image() {
    let tmp = tempfile::tempdir().unwrap();
    let body = multipart(&[("documents", "id.png", b"png".as_slice())]);
    let response = app(tmp.path(), "", "{}")
        .oneshot(multipart_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("form_image"));
}

#[tokio::test]
async fn test_process_rejects_broken_multipart() {
    let tmp = tempfile::tempdir().unwrap();
    let body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"form_image\"\r\n\r\ntruncated")
        .into_bytes();
    let response = app(tmp.path(), "", "{}")
        .oneshot(multipart_request(body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_fill_without_template_writes_summary() {
    if !pdfium_or_skip() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let request = json_request(
        "/fill",
        &json!({
            "fields": { "name": "Jane Doe", "email": "jane@example.org" },
            "template_pdf_filename": "../../etc/passwd"
        }),
    );
    let response = app(tmp.path(), "", "{}").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "filled_pdf_filename": "filled_form.pdf" }));
    assert!(tmp.path().join("filled_form.pdf").is_file());
}

#[tokio::test]
async fn test_uploads_are_served() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("result.pdf"), b"%PDF-1.4\n").unwrap();

    let response = app(tmp.path(), "", "{}")
        .oneshot(Request::get("/uploads/result.pdf").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"%PDF-1.4\n");
}

#[tokio::test]
async fn test_process_without_multipart_is_json_error() {
    let tmp = tempfile::tempdir().unwrap();
    let request = json_request("/process", &json!({ "form_image": "nope" }));
    let response = app(tmp.path(), "", "{}").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn test_fill_rejects_non_json_with_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/fill")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"fields\": "))
        .unwrap();
    let response = app(tmp.path(), "", "{}").oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    assert!(body_json(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_fill_accepts_numeric_values() {
    if !pdfium_or_skip() {
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let request = json_request("/fill", &json!({ "fields": { "name": 42, "phone": 5550100 } }));
    let response = app(tmp.path(), "", "{}").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "filled_pdf_filename": "filled_form.pdf" })
    );
}
