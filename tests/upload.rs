//! Upload endpoint: multipart in, UTF-8 text out.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

mod common;

async fn gateway() -> (common::Gateway, tempfile::TempDir) {
    let (upstream, _) = common::start_fixed_upstream(b"unused", Duration::ZERO).await;
    let lock = tempfile::tempdir().unwrap();
    let gateway = common::start_gateway(common::config_for(upstream, &lock.path().join("flock"))).await;
    (gateway, lock)
}

async fn post(gateway: &common::Gateway, form: Form) -> (StatusCode, String, String) {
    let res = common::client()
        .post(gateway.url("/load_file"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = res.status();
    let content_type = res.headers()["content-type"].to_str().unwrap().to_string();
    (status, content_type, res.text().await.unwrap())
}

fn file_form(bytes: Vec<u8>) -> Form {
    Form::new().part("source_file", Part::bytes(bytes).file_name("source.txt"))
}

#[tokio::test]
async fn utf8_file_is_returned_as_is() {
    let (gateway, _lock) = gateway().await;
    let text = "La casa es verde.\nEl perro está aquí.\n";

    let (status, content_type, body) = post(&gateway, file_form(text.as_bytes().to_vec())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "text/plain; charset=utf-8");
    assert_eq!(body, text);
}

#[tokio::test]
async fn latin1_file_is_transcoded() {
    let (gateway, _lock) = gateway().await;
    // "canción" in ISO-8859-1
    let latin1 = vec![b'c', b'a', b'n', b'c', b'i', 0xF3, b'n'];

    let (_, _, body) = post(&gateway, file_form(latin1)).await;
    assert_eq!(body, "canción");
}

#[tokio::test]
async fn file_at_limit_is_accepted() {
    let (gateway, _lock) = gateway().await;
    let (_, _, body) = post(&gateway, file_form(vec![b'a'; 1_000_000])).await;
    assert_eq!(body.len(), 1_000_000);
}

#[tokio::test]
async fn oversized_file_is_rejected() {
    let (gateway, _lock) = gateway().await;
    let (status, _, body) = post(&gateway, file_form(vec![b'a'; 1_000_001])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Exceeded filesize limit.");
}

#[tokio::test]
async fn missing_file_is_reported() {
    let (gateway, _lock) = gateway().await;
    let form = Form::new().text("other_field", "hello");
    let (_, _, body) = post(&gateway, form).await;
    assert_eq!(body, "No file sent.");

    let empty_input = Form::new().part("source_file", Part::bytes(Vec::new()).file_name(""));
    let (_, _, body) = post(&gateway, empty_input).await;
    assert_eq!(body, "No file sent.");
}

#[tokio::test]
async fn non_multipart_body_is_invalid() {
    let (gateway, _lock) = gateway().await;
    let res = common::client()
        .post(gateway.url("/load_file"))
        .body("source_file=abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "Invalid parameters.");
}

#[tokio::test]
async fn strict_mode_uses_status_codes() {
    let lock = tempfile::tempdir().unwrap();
    let mut config = common::config_for("127.0.0.1:9".parse().unwrap(), &lock.path().join("flock"));
    config.responses.legacy_status = false;
    let gateway = common::start_gateway(config).await;

    let (status, _, body) = post(&gateway, file_form(vec![b'a'; 1_000_001])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, "Exceeded filesize limit.");

    let (status, _, body) = post(&gateway, file_form(b"ok".to_vec())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn body_over_limit_is_rejected_as_too_large() {
    let (gateway, _lock) = gateway().await;
    let (status, _, body) = post(&gateway, file_form(vec![b'a'; 3_000_000])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Exceeded filesize limit.");
}

#[tokio::test]
async fn truncated_multipart_is_unknown_error() {
    let (gateway, _lock) = gateway().await;
    let body = "--XBOUNDARY\r\n\
                Content-Disposition: form-data; name=\"source_file\"; filename=\"a.txt\"\r\n\
                \r\n\
                half a fi";
    let res = common::client()
        .post(gateway.url("/load_file"))
        .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "Unknown errors.");
}

#[tokio::test]
async fn reloaded_limits_apply_to_next_upload() {
    let (upstream, _) = common::start_fixed_upstream(b"unused", Duration::ZERO).await;
    let lock = tempfile::tempdir().unwrap();
    let lock_path = lock.path().join("flock");
    let gateway = common::start_gateway(common::config_for(upstream, &lock_path)).await;

    let mut bigger = common::config_for(upstream, &lock_path);
    bigger.upload.max_file_bytes = 4_000_000;
    bigger.upload.max_body_bytes = 5_000_000;
    gateway.updates.send(bigger).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (status, _, body) = post(&gateway, file_form(vec![b'a'; 3_000_000])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 3_000_000);
}
