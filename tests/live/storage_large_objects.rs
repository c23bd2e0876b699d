//! Live Large Object Tests
//!
//! ## Test Coverage
//!
//! - Dynamic large objects (X-Object-Manifest)
//! - Static large objects (multipart-manifest=put/get/delete)
//! - Content, ETag and length of the assembled object

use cloudroast::storage::{LargeObject, ObjectHeaders, SegmentPlan, SegmentSource};

const SEGMENT_SIZE: u64 = 64 * 1024;

fn generated(container: &str, name: &str, total: u64, seed: u64) -> LargeObject {
    let plan = SegmentPlan::new(total, SEGMENT_SIZE).unwrap();
    LargeObject::generate(container, name, plan, SegmentSource::Random { seed }).unwrap()
}

/// Test: a DLO assembles its segments in order
#[tokio::test]
async fn test_dynamic_large_object() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("dlo").await;
    let object = generated(&container, "big.bin", 3 * SEGMENT_SIZE + 100, 7);

    let report = object.upload_dynamic(&storage).await.unwrap();
    let get = storage
        .get_object(&container, "big.bin", &ObjectHeaders::new())
        .await
        .unwrap();
    let head = storage.head_object(&container, "big.bin").await.unwrap();

    env.cleanup_container(&container).await;

    assert!(report.is_complete(), "upload failed: {:?}", report.failed_segment);
    assert_eq!(report.segments_uploaded, 4);
    assert_eq!(get.status_code(), 200);
    assert_eq!(get.body(), &object.content());
    assert_eq!(head.content_length(), Some(object.total_len()));
    assert_eq!(head.etag(), Some(object.etag()));
    assert_eq!(head.header("X-Object-Manifest"), Some(object.manifest_prefix().as_str()));
}

/// Test: an SLO with segments in a separate container
#[tokio::test]
async fn test_static_large_object() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("slo").await;
    let segments = env.container("slo_segments").await;
    let object =
        generated(&container, "big.bin", 2 * SEGMENT_SIZE + 1, 11).with_segment_container(&segments);

    let report = object.upload_static(&storage).await.unwrap();
    let get = storage
        .get_object(&container, "big.bin", &ObjectHeaders::new())
        .await
        .unwrap();
    let head = storage.head_object(&container, "big.bin").await.unwrap();
    let manifest = storage.get_slo_manifest(&container, "big.bin").await.unwrap();
    let ranged = storage
        .get_object(
            &container,
            "big.bin",
            &ObjectHeaders::new().range(&format!("{}-{}", SEGMENT_SIZE - 2, SEGMENT_SIZE + 1)),
        )
        .await
        .unwrap();

    env.cleanup_container(&container).await;
    env.cleanup_container(&segments).await;

    assert!(report.is_complete(), "upload failed: {:?}", report.failed_segment);
    assert_eq!(get.body(), &object.content());
    assert_eq!(head.content_length(), Some(object.total_len()));
    assert_eq!(head.etag(), Some(object.etag()));
    assert_eq!(head.header("X-Static-Large-Object"), Some("True"));

    let stored: serde_json::Value = manifest.json().unwrap();
    let stored = stored.as_array().unwrap();
    assert_eq!(stored.len(), object.segments().len());
    for (entry, segment) in stored.iter().zip(object.segments()) {
        assert_eq!(entry["hash"], segment.etag.as_str());
        assert_eq!(entry["bytes"], segment.size());
    }

    let start = (SEGMENT_SIZE - 2) as usize;
    assert_eq!(ranged.status_code(), 206);
    assert_eq!(ranged.body(), &object.content().slice(start..start + 4));
}

/// Test: deleting an SLO with multipart-manifest=delete removes its segments
#[tokio::test]
async fn test_delete_static_large_object() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("slo_delete").await;
    let object = generated(&container, "doomed.bin", 2 * SEGMENT_SIZE, 3);

    let report = object.upload_static(&storage).await.unwrap();
    let deleted = storage.delete_slo(&container, "doomed.bin").await.unwrap();
    let remaining = storage
        .list_object_entries(&container, &Default::default())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    assert!(report.is_complete());
    assert_eq!(deleted.status_code(), 200);
    assert!(remaining.is_empty(), "left behind: {:?}", remaining);
}

/// Test: an SLO manifest with a wrong segment ETag is rejected
#[tokio::test]
async fn test_static_manifest_with_bad_etag() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("slo_bad").await;
    let object = generated(&container, "bad.bin", 2 * SEGMENT_SIZE, 5);

    let mut manifest = object.slo_manifest();
    manifest[0]["etag"] = serde_json::Value::from("0".repeat(32));
    for segment in object.segments() {
        storage
            .put_object(&container, &segment.name, object.segment_data(segment), &ObjectHeaders::new())
            .await
            .unwrap();
    }
    let response = storage
        .put_slo_manifest(&container, "bad.bin", &manifest)
        .await
        .unwrap();
    let head = storage.head_object(&container, "bad.bin").await.unwrap();

    env.cleanup_container(&container).await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(head.status_code(), 404);
}
