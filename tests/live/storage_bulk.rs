//! Live Bulk Operation Tests
//!
//! ## Test Coverage
//!
//! - Archive extraction into a container (tar, tar.gz, tar.bz2)
//! - Archive extraction creating containers from top-level directories
//! - Bulk delete of objects and containers

use super::common::random_text;
use cloudroast::storage::archive::build_archive;
use cloudroast::storage::{ArchiveFormat, BulkDeleteResult, ExtractArchiveResult, ObjectHeaders};

/// Test: each archive format unpacks every entry into the container
#[tokio::test]
async fn test_extract_archive_formats() {
    let env = live_env!();
    let storage = env.storage();
    let entries = vec![
        ("readme.txt".to_string(), random_text()),
        ("docs/guide.txt".to_string(), random_text()),
        ("docs/faq.txt".to_string(), random_text()),
    ];

    for format in [ArchiveFormat::Tar, ArchiveFormat::TarGz, ArchiveFormat::TarBz2] {
        let container = env.container("extract").await;
        let archive = build_archive(&entries, format).unwrap();

        let response = storage
            .extract_archive(&container, format, archive)
            .await
            .unwrap();
        let result = ExtractArchiveResult::parse(response.body());
        let mut contents = Vec::new();
        for (name, _) in &entries {
            let get = storage
                .get_object(&container, name, &ObjectHeaders::new())
                .await
                .unwrap();
            contents.push(get.text());
        }

        env.cleanup_container(&container).await;

        assert_eq!(response.status_code(), 200, "{}", format);
        let result = result.unwrap();
        assert_eq!(result.files_created, 3, "{}", format);
        assert_eq!(result.status_code(), Some(201), "{}", format);
        assert!(result.errors.is_empty(), "{}: {:?}", format, result.errors);
        let expected: Vec<String> = entries.iter().map(|(_, body)| body.clone()).collect();
        assert_eq!(contents, expected, "{}", format);
    }
}

/// Test: extracting at account level creates one container per directory
#[tokio::test]
async fn test_extract_archive_creates_containers() {
    let env = live_env!();
    let storage = env.storage();
    let first = env.name("extract_a");
    let second = env.name("extract_b");
    let entries = vec![
        (format!("{}/one.txt", first), "1".to_string()),
        (format!("{}/two.txt", second), "2".to_string()),
    ];
    let archive = build_archive(&entries, ArchiveFormat::TarGz).unwrap();

    let response = storage
        .extract_archive("", ArchiveFormat::TarGz, archive)
        .await
        .unwrap();
    let one = storage
        .get_object(&first, "one.txt", &ObjectHeaders::new())
        .await
        .unwrap();
    let two = storage
        .get_object(&second, "two.txt", &ObjectHeaders::new())
        .await
        .unwrap();

    env.cleanup_container(&first).await;
    env.cleanup_container(&second).await;

    let result = ExtractArchiveResult::parse(response.body()).unwrap();
    assert_eq!(result.files_created, 2);
    assert_eq!(one.text(), "1");
    assert_eq!(two.text(), "2");
}

/// Test: a corrupt archive reports an error instead of creating objects
#[tokio::test]
async fn test_extract_corrupt_archive() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("extract_bad").await;

    let response = storage
        .extract_archive(&container, ArchiveFormat::TarGz, b"not a gzip stream".to_vec())
        .await
        .unwrap();
    let listing = storage
        .list_object_entries(&container, &Default::default())
        .await
        .unwrap();

    env.cleanup_container(&container).await;

    let result = ExtractArchiveResult::parse(response.body()).unwrap();
    assert_eq!(result.status_code(), Some(400));
    assert_eq!(result.files_created, 0);
    assert!(listing.is_empty());
}

/// Test: bulk delete removes objects and their container, counting misses
#[tokio::test]
async fn test_bulk_delete() {
    let env = live_env!();
    let storage = env.storage();
    let container = env.container("bulk_delete").await;
    let names = ["a b.txt", "dir/c.txt", "dir/d.txt"];
    for name in names {
        storage
            .put_object(&container, name, name, &ObjectHeaders::new())
            .await
            .unwrap();
    }

    let mut paths: Vec<String> = names
        .iter()
        .map(|name| format!("{}/{}", container, name))
        .collect();
    paths.push(format!("{}/never-existed", container));
    paths.push(container.clone());

    let response = storage.bulk_delete(&paths).await.unwrap();
    let head = storage.head_container(&container).await.unwrap();

    if head.status_code() != 404 {
        env.cleanup_container(&container).await;
    }

    assert_eq!(response.status_code(), 200);
    let result = BulkDeleteResult::parse(response.body()).unwrap();
    assert_eq!(result.deleted, 4);
    assert_eq!(result.not_found, 1);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(head.status_code(), 404);
}
