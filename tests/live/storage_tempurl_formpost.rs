//! Live TempURL and FormPOST Tests
//!
//! ## Test Coverage
//!
//! - TempURL GET/PUT/HEAD with each configured digest
//! - Expired, wrong-method and tampered TempURLs
//! - Prefix-scoped TempURLs
//! - Signing with the secondary key during rotation
//! - FormPOST uploads with redirect and limits

use super::common::{random_text, random_word};
use cloudroast::storage::tempurl::expires_in;
use cloudroast::storage::{
    Digest, FormPost, ObjectHeaders, ObjectStorageClient, TempUrlOptions, TempUrlSigner,
};
use reqwest::Method;
use std::time::Duration;

/// Set a fresh TempURL key on the account; returns it with the configured digest
async fn fresh_key(env: &super::common::LiveEnv, storage: &ObjectStorageClient) -> (String, Digest) {
    let key = format!("qe-key-{}", random_word());
    let response = storage.set_temp_url_key(&key).await.unwrap();
    assert_eq!(response.status_code(), 204);
    let digest = env
        .config
        .object_storage
        .tempurl_digest
        .parse()
        .unwrap_or_default();
    (key, digest)
}

async fn fresh_signer(env: &super::common::LiveEnv, storage: &ObjectStorageClient) -> TempUrlSigner {
    let (key, digest) = fresh_key(env, storage).await;
    TempUrlSigner::new(key, digest)
}

/// Test: a signed GET TempURL downloads the object without a token
#[tokio::test]
async fn test_temp_url_get() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("tempurl_get").await;
    let body = random_text();
    storage
        .put_object(&container, "shared.txt", body.clone(), &ObjectHeaders::new())
        .await
        .unwrap();

    let signer = fresh_signer(&env, &storage).await;
    let origin = storage.origin().unwrap();
    let path = storage.object_path(&container, "shared.txt").unwrap();
    let expires = expires_in(Duration::from_secs(300));
    let options = TempUrlOptions {
        filename: Some("download.txt".to_string()),
        ..Default::default()
    };
    let url = signer.temp_url(&origin, &path, "GET", expires, &options).unwrap();
    let head_url = signer
        .temp_url(&origin, &path, "HEAD", expires, &TempUrlOptions::default())
        .unwrap();

    let get = storage.fetch_url(Method::GET, &url, None).await.unwrap();
    let head = storage.fetch_url(Method::HEAD, &head_url, None).await.unwrap();
    let wrong_method = storage.fetch_url(Method::DELETE, &url, None).await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(get.status_code(), 200);
    assert_eq!(get.text(), body);
    assert!(get
        .header("Content-Disposition")
        .is_some_and(|cd| cd.contains("download.txt")));
    assert_eq!(head.status_code(), 200);
    assert_eq!(wrong_method.status_code(), 401);
}

/// Test: a PUT TempURL uploads an object
#[tokio::test]
async fn test_temp_url_put() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("tempurl_put").await;

    let signer = fresh_signer(&env, &storage).await;
    let origin = storage.origin().unwrap();
    let path = storage.object_path(&container, "uploaded.txt").unwrap();
    let url = signer
        .temp_url(
            &origin,
            &path,
            "PUT",
            expires_in(Duration::from_secs(300)),
            &TempUrlOptions::default(),
        )
        .unwrap();

    let put = storage
        .fetch_url(Method::PUT, &url, Some("via tempurl".into()))
        .await
        .unwrap();
    let get = storage
        .get_object(&container, "uploaded.txt", &ObjectHeaders::new())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(put.status_code(), 201);
    assert_eq!(get.text(), "via tempurl");
}

/// Test: expired and tampered TempURLs are refused
#[tokio::test]
async fn test_temp_url_rejections() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("tempurl_reject").await;
    storage
        .put_object(&container, "secret.txt", "secret", &ObjectHeaders::new())
        .await
        .unwrap();

    let signer = fresh_signer(&env, &storage).await;
    let origin = storage.origin().unwrap();
    let path = storage.object_path(&container, "secret.txt").unwrap();
    let options = TempUrlOptions::default();

    let expired = signer
        .temp_url(&origin, &path, "GET", expires_in(Duration::ZERO) - 60, &options)
        .unwrap();
    let other_path = storage.object_path(&container, "other.txt").unwrap();
    let forged = signer
        .temp_url(&origin, &other_path, "GET", expires_in(Duration::from_secs(300)), &options)
        .unwrap()
        .replacen("other.txt", "secret.txt", 1);
    let wrong_key = TempUrlSigner::new("not-the-key", signer.digest())
        .temp_url(&origin, &path, "GET", expires_in(Duration::from_secs(300)), &options)
        .unwrap();

    let expired = storage.fetch_url(Method::GET, &expired, None).await.unwrap();
    let forged = storage.fetch_url(Method::GET, &forged, None).await.unwrap();
    let wrong_key = storage.fetch_url(Method::GET, &wrong_key, None).await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(expired.status_code(), 401);
    assert_eq!(forged.status_code(), 401);
    assert_eq!(wrong_key.status_code(), 401);
}

/// Test: a prefix-scoped TempURL opens every object under the prefix only
#[tokio::test]
async fn test_prefix_temp_url() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("tempurl_prefix").await;
    for name in ["shared/a.txt", "shared/b.txt", "private.txt"] {
        storage
            .put_object(&container, name, name, &ObjectHeaders::new())
            .await
            .unwrap();
    }

    let signer = fresh_signer(&env, &storage).await;
    let origin = storage.origin().unwrap();
    let options = TempUrlOptions {
        prefix: Some("shared/".to_string()),
        ..Default::default()
    };
    let expires = expires_in(Duration::from_secs(300));

    let mut statuses = Vec::new();
    for name in ["shared/a.txt", "shared/b.txt", "private.txt"] {
        let path = storage.object_path(&container, name).unwrap();
        let url = signer.temp_url(&origin, &path, "GET", expires, &options).unwrap();
        let response = storage.fetch_url(Method::GET, &url, None).await.unwrap();
        statuses.push((name, response.status_code()));
    }

    env.cleanup_container(&container).await;

    assert_eq!(
        statuses,
        vec![("shared/a.txt", 200), ("shared/b.txt", 200), ("private.txt", 401)]
    );
}

/// Test: URLs signed with either account key are honoured during rotation
#[tokio::test]
async fn test_temp_url_secondary_key() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("tempurl_key2").await;
    storage
        .put_object(&container, "rotated.txt", "rotated", &ObjectHeaders::new())
        .await
        .unwrap();

    let (primary, digest) = fresh_key(&env, &storage).await;
    let secondary = format!("qe-key2-{}", random_word());
    let set = storage.set_temp_url_key_2(&secondary).await.unwrap();

    let origin = storage.origin().unwrap();
    let path = storage.object_path(&container, "rotated.txt").unwrap();
    let expires = expires_in(Duration::from_secs(300));
    let mut statuses = Vec::new();
    for key in [&primary, &secondary] {
        let url = TempUrlSigner::new(key.clone(), digest)
            .temp_url(&origin, &path, "GET", expires, &TempUrlOptions::default())
            .unwrap();
        let get = storage.fetch_url(Method::GET, &url, None).await.unwrap();
        statuses.push(get.status_code());
    }
    let stranger = TempUrlSigner::new("not-a-key", digest)
        .temp_url(&origin, &path, "GET", expires, &TempUrlOptions::default())
        .unwrap();
    let refused = storage.fetch_url(Method::GET, &stranger, None).await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(set.status_code(), 204);
    assert_eq!(statuses, [200, 200]);
    assert_eq!(refused.status_code(), 401);
}

/// Test: FormPOST uploads files under the prefix and redirects
#[tokio::test]
async fn test_form_post() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("formpost").await;

    let (key, digest) = fresh_key(&env, &storage).await;
    let path = format!("{}/uploads/", storage.container_path(&container).unwrap());
    let form = FormPost::new(path, 1024, 2, expires_in(Duration::from_secs(300)))
        .redirect("https://example.invalid/done")
        .file("one.txt", "first file", Some("text/plain"))
        .file("two.txt", "second file", None);

    let response = storage.post_form(form, &key, digest).await.unwrap();
    let first = storage
        .get_object(&container, "uploads/one.txt", &ObjectHeaders::new())
        .await
        .unwrap();
    let second = storage
        .get_object(&container, "uploads/two.txt", &ObjectHeaders::new())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(response.status_code(), 303);
    assert!(response
        .header("Location")
        .is_some_and(|location| location.starts_with("https://example.invalid/done")));
    assert_eq!(first.text(), "first file");
    assert_eq!(second.text(), "second file");
}

/// Test: FormPOST with too many files is refused
#[tokio::test]
async fn test_form_post_file_count_limit() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("formpost_limit").await;

    let (key, digest) = fresh_key(&env, &storage).await;
    let path = format!("{}/", storage.container_path(&container).unwrap());
    let form = FormPost::new(path, 1024, 1, expires_in(Duration::from_secs(300)))
        .file("one.txt", "1", None)
        .file("two.txt", "2", None);

    let response = storage.post_form(form, &key, digest).await.unwrap();
    let second = storage.head_object(&container, "two.txt").await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("max_file_count"));
    assert_eq!(second.status_code(), 404);
}
