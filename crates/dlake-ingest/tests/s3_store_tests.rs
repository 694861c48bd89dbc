//! S3 object store integration tests
//!
//! **Requirements**:
//! - MinIO or S3 must be running and accessible
//! - S3_ENDPOINT environment variable must be set (e.g., "http://localhost:9000")
//! - The bucket named by S3_TEST_BUCKET (default `dlake-test`) must exist
//! - Tests will be skipped if S3_ENDPOINT is not configured
//!
//! **Running tests**:
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 S3_PATH_STYLE=true \
//!   S3_ACCESS_KEY=minioadmin S3_SECRET_KEY=minioadmin \
//!   cargo test --test s3_store_tests
//! ```
#![allow(clippy::unwrap_used, clippy::expect_used)]

use dlake_ingest::store::{ObjectLocation, ObjectStore, S3ObjectStore, StorageConfig};

const DEFAULT_TEST_BUCKET: &str = "dlake-test";

/// Setup helper that creates a store if an endpoint is configured
async fn setup_store() -> Option<S3ObjectStore> {
    if std::env::var("S3_ENDPOINT").is_err() {
        return None;
    }

    match S3ObjectStore::new(StorageConfig::from_env()).await {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("Failed to create storage client: {:#}", e);
            None
        },
    }
}

fn test_location(test_name: &str, suffix: &str) -> ObjectLocation {
    let bucket = std::env::var("S3_TEST_BUCKET").unwrap_or_else(|_| DEFAULT_TEST_BUCKET.to_string());
    ObjectLocation::new(bucket, format!("test/{}/{}", test_name, suffix))
}

#[tokio::test]
async fn test_s3_put_get() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let location = test_location("put_get", "weather.csv");
    let body = b"ObservationDate,WindSpeed\n2016-02-01,3\n".to_vec();

    store
        .put(&location, body.clone(), Some("text/csv"))
        .await
        .expect("Put should succeed");
    assert_eq!(store.get(&location).await.expect("Get should succeed"), body);

    let metadata = store.head_metadata(&location).await.expect("Head should succeed");
    assert!(metadata.is_empty());

    store.delete(&location).await.ok();
}

#[tokio::test]
async fn test_s3_missing_object() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let location = test_location("missing", "nothing-here.csv");
    assert!(store.get_if_exists(&location).await.unwrap().is_none());
    assert!(store.get(&location).await.is_err());
    // deleting a missing object is not an error
    store.delete(&location).await.unwrap();
}

#[tokio::test]
async fn test_s3_list_and_delete_prefix() {
    let Some(store) = setup_store().await else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let prefix = test_location("delete_prefix", "table/");
    for partition in ["d=2016-02-01", "d=2016-02-02"] {
        let location = prefix.join(&format!("{}/part-0.parquet", partition));
        store.put(&location, vec![1, 2, 3], None).await.unwrap();
    }

    let listed = store.list(&prefix).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].key < listed[1].key);

    assert_eq!(store.delete_prefix(&prefix).await.unwrap(), 2);
    assert!(store.list(&prefix).await.unwrap().is_empty());
}
