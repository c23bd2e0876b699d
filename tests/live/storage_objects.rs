//! Live Object Tests
//!
//! ## Test Coverage
//!
//! - PUT, GET, HEAD and DELETE with content checks
//! - ETag validation and conditional requests
//! - Object metadata
//! - Server-side copy (COPY and X-Copy-From)
//! - Range requests

use super::common::{md5_hex, random_text};
use cloudroast::storage::ObjectHeaders;

/// Test: an object round-trips with its ETag, length and content type
#[tokio::test]
async fn test_object_crud() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("objects").await;
    let body = random_text();

    let put = storage
        .put_object(
            &container,
            "greeting.txt",
            body.clone(),
            &ObjectHeaders::new().content_type("text/plain"),
        )
        .await
        .unwrap();
    let get = storage
        .get_object(&container, "greeting.txt", &ObjectHeaders::new())
        .await
        .unwrap();
    let head = storage.head_object(&container, "greeting.txt").await.unwrap();
    let deleted = storage.delete_object(&container, "greeting.txt").await.unwrap();
    let missing = storage
        .get_object(&container, "greeting.txt", &ObjectHeaders::new())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(put.status_code(), 201);
    assert_eq!(put.etag(), Some(md5_hex(body.as_bytes())));
    assert_eq!(get.status_code(), 200);
    assert_eq!(get.text(), body);
    assert_eq!(head.status_code(), 200);
    assert_eq!(head.content_length(), Some(body.len() as u64));
    assert!(head
        .header("Content-Type")
        .is_some_and(|ct| ct.starts_with("text/plain")));
    assert_eq!(deleted.status_code(), 204);
    assert_eq!(missing.status_code(), 404);
}

/// Test: names with spaces and unicode are stored and listed verbatim
#[tokio::test]
async fn test_object_name_encoding() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("names").await;
    let name = "dir one/ünï cødé?.txt";

    let put = storage
        .put_object(&container, name, "x", &ObjectHeaders::new())
        .await
        .unwrap();
    let get = storage
        .get_object(&container, name, &ObjectHeaders::new())
        .await
        .unwrap();
    let entries = storage
        .list_object_entries(&container, &Default::default())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(put.status_code(), 201);
    assert_eq!(get.text(), "x");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name(), name);
}

/// Test: a wrong ETag on upload is rejected
#[tokio::test]
async fn test_etag_mismatch() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("etag").await;

    let response = storage
        .put_object(
            &container,
            "bad",
            "payload",
            &ObjectHeaders::new().etag(&md5_hex(b"something else")),
        )
        .await
        .unwrap();
    let head = storage.head_object(&container, "bad").await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(response.status_code(), 422);
    assert_eq!(head.status_code(), 404);
}

/// Test: conditional GETs honour If-None-Match and If-Match
#[tokio::test]
async fn test_conditional_get() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("conditional").await;
    let body = random_text();
    let etag = md5_hex(body.as_bytes());
    storage
        .put_object(&container, "obj", body, &ObjectHeaders::new())
        .await
        .unwrap();

    let not_modified = storage
        .get_object(&container, "obj", &ObjectHeaders::new().if_none_match(&etag))
        .await
        .unwrap();
    let matched = storage
        .get_object(&container, "obj", &ObjectHeaders::new().if_match(&etag))
        .await
        .unwrap();
    let failed = storage
        .get_object(&container, "obj", &ObjectHeaders::new().if_match("0000"))
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(not_modified.status_code(), 304);
    assert_eq!(matched.status_code(), 200);
    assert_eq!(failed.status_code(), 412);
}

/// Test: object metadata is replaced by POST
#[tokio::test]
async fn test_object_metadata() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("obj_meta").await;
    storage
        .put_object(
            &container,
            "obj",
            "data",
            &ObjectHeaders::new().object_meta("Color", "blue"),
        )
        .await
        .unwrap();

    let before = storage.head_object(&container, "obj").await.unwrap();
    let posted = storage
        .set_object_metadata(
            &container,
            "obj",
            &ObjectHeaders::new().object_meta("Shape", "round"),
        )
        .await
        .unwrap();
    let after = storage.head_object(&container, "obj").await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(before.header("X-Object-Meta-Color"), Some("blue"));
    assert_eq!(posted.status_code(), 202);
    assert_eq!(after.header("X-Object-Meta-Shape"), Some("round"));
    assert_eq!(after.header("X-Object-Meta-Color"), None);
}

/// Test: COPY and X-Copy-From produce identical objects
#[tokio::test]
async fn test_server_side_copy() {
    let env = live_env!();
    let storage = env.storage();
    let source = env.container("copy_src").await;
    let dest = env.container("copy_dst").await;
    let body = random_text();
    storage
        .put_object(
            &source,
            "original",
            body.clone(),
            &ObjectHeaders::new().object_meta("Origin", "source"),
        )
        .await
        .unwrap();

    let copied = storage
        .copy_object(&source, "original", &dest, "via_copy", &ObjectHeaders::new())
        .await
        .unwrap();
    let copied_from = storage
        .copy_from(&dest, "via_put", &source, "original", &ObjectHeaders::new())
        .await
        .unwrap();
    let via_copy = storage
        .get_object(&dest, "via_copy", &ObjectHeaders::new())
        .await
        .unwrap();
    let via_put = storage
        .get_object(&dest, "via_put", &ObjectHeaders::new())
        .await
        .unwrap();

    env.cleanup_container(&source).await;
    env.cleanup_container(&dest).await;

    assert_eq!(copied.status_code(), 201);
    assert_eq!(copied_from.status_code(), 201);
    assert_eq!(via_copy.text(), body);
    assert_eq!(via_put.text(), body);
    assert_eq!(via_copy.header("X-Object-Meta-Origin"), Some("source"));
    assert_eq!(via_copy.etag(), via_put.etag());
}

/// Test: a single byte range returns 206 with the slice
#[tokio::test]
async fn test_single_range() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("range").await;
    storage
        .put_object(&container, "digits", "0123456789", &ObjectHeaders::new())
        .await
        .unwrap();

    let middle = storage
        .get_object(&container, "digits", &ObjectHeaders::new().range("2-5"))
        .await
        .unwrap();
    let suffix = storage
        .get_object(&container, "digits", &ObjectHeaders::new().range("-3"))
        .await
        .unwrap();
    let unsatisfiable = storage
        .get_object(&container, "digits", &ObjectHeaders::new().range("20-30"))
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(middle.status_code(), 206);
    assert_eq!(middle.text(), "2345");
    assert_eq!(middle.header("Content-Range"), Some("bytes 2-5/10"));
    assert_eq!(suffix.text(), "789");
    assert_eq!(unsatisfiable.status_code(), 416);
}

/// Test: multiple ranges return a multipart/byteranges body
#[tokio::test]
#[ignore = "known upstream issue: multi-range responses are returned as the full object"]
async fn test_multiple_ranges() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("multi_range").await;
    storage
        .put_object(&container, "digits", "0123456789", &ObjectHeaders::new())
        .await
        .unwrap();

    let response = storage
        .get_object(&container, "digits", &ObjectHeaders::new().range("0-1,8-9"))
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(response.status_code(), 206);
    assert!(response
        .header("Content-Type")
        .is_some_and(|ct| ct.starts_with("multipart/byteranges")));
    let body = response.text();
    assert!(body.contains("01"));
    assert!(body.contains("89"));
}
