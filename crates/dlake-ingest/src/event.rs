//! Trigger events
//!
//! The function is invoked with an S3 object-created notification. Each
//! record names one source object; its table is derived from the second
//! segment of the key (`csv_to_parquet/weather/2016.csv` → `tbl_weather`).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::ObjectLocation;

pub const TARGET_TABLE_PREFIX: &str = "tbl_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct S3Object {
    /// URL-encoded as delivered by S3
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl S3Event {
    /// Build an event for the given `(bucket, key)` pairs; keys are taken as
    /// already decoded.
    pub fn for_objects<'a>(objects: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let records = objects
            .into_iter()
            .map(|(bucket, key)| S3EventRecord {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.to_string(),
                    },
                    object: S3Object {
                        key: urlencoding::encode(key).into_owned(),
                        size: None,
                    },
                },
            })
            .collect();
        Self { records }
    }

    /// Source objects in event order. Records whose key has no table
    /// segment are skipped with a warning.
    pub fn source_objects(&self) -> Vec<SourceObject> {
        self.records
            .iter()
            .filter_map(|record| {
                let key = decode_object_key(&record.s3.object.key);
                let source = SourceObject::new(ObjectLocation::new(record.s3.bucket.name.clone(), key));
                if source.is_none() {
                    warn!(
                        bucket = %record.s3.bucket.name,
                        key = %record.s3.object.key,
                        "Skipping object: key has no table segment"
                    );
                }
                source
            })
            .collect()
    }
}

/// Decode an event key: `+` is a space, then percent-decoding. A key that
/// does not decode to UTF-8 is used as delivered.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// One file to ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceObject {
    pub location: ObjectLocation,
    pub target_table: String,
}

impl SourceObject {
    /// `None` when the key has fewer than two non-empty segments
    pub fn new(location: ObjectLocation) -> Option<Self> {
        let table_segment = location.key.split('/').nth(1).filter(|s| !s.is_empty())?;
        let target_table = format!("{}{}", TARGET_TABLE_PREFIX, table_segment);
        Some(Self {
            location,
            target_table,
        })
    }

    /// `s3://bucket/key`
    pub fn path(&self) -> String {
        self.location.to_string()
    }

    pub fn file_name(&self) -> &str {
        self.location.file_name()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "Records": [
            {
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "eu-west-1",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": {"name": "raw-bucket", "arn": "arn:aws:s3:::raw-bucket"},
                    "object": {"key": "csv_to_parquet/weather/Wind+Report%282016%29.csv", "size": 42}
                }
            },
            {
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": {"name": "raw-bucket"},
                    "object": {"key": "loose.csv"}
                }
            }
        ]
    }"#;

    #[test]
    fn test_source_objects() {
        let event: S3Event = serde_json::from_str(EVENT).unwrap();
        assert_eq!(event.records.len(), 2);

        let sources = event.source_objects();
        assert_eq!(sources.len(), 1);
        let source = &sources[0];
        assert_eq!(source.location.bucket, "raw-bucket");
        assert_eq!(source.location.key, "csv_to_parquet/weather/Wind Report(2016).csv");
        assert_eq!(source.target_table, "tbl_weather");
        assert_eq!(source.file_name(), "Wind Report(2016).csv");
        assert_eq!(
            source.path(),
            "s3://raw-bucket/csv_to_parquet/weather/Wind Report(2016).csv"
        );
    }

    #[test]
    fn test_table_segment_required() {
        assert!(SourceObject::new(ObjectLocation::new("b", "single.csv")).is_none());
        assert!(SourceObject::new(ObjectLocation::new("b", "a//b.csv")).is_none());
        let source = SourceObject::new(ObjectLocation::new("b", "a/sales")).unwrap();
        assert_eq!(source.target_table, "tbl_sales");
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("a/b+c%2Bd.csv"), "a/b c+d.csv");
        assert_eq!(decode_object_key("plain/key.csv"), "plain/key.csv");
    }

    #[test]
    fn test_for_objects_round_trips_keys() {
        let event = S3Event::for_objects([("raw", "csv_to_parquet/sales/q1 2024.csv")]);
        let sources = event.source_objects();
        assert_eq!(sources[0].location.key, "csv_to_parquet/sales/q1 2024.csv");
    }

    #[test]
    fn test_empty_event() {
        let event: S3Event = serde_json::from_str("{}").unwrap();
        assert!(event.source_objects().is_empty());
    }
}
