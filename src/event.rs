//! S3 upload notifications.
//!
//! Only the fields the handler reads are modelled; everything else in the
//! notification is ignored by serde. Object keys arrive form-encoded: `+` is
//! a space and other reserved bytes are percent-escaped.

use crate::error::HandlerError;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Record {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    /// Form-encoded key, exactly as delivered.
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// The object an invocation converts: bucket plus decoded key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub bucket: String,
    pub key: String,
}

impl S3Event {
    /// Build a single-record event, as S3 would deliver for one upload.
    pub fn single(bucket: impl Into<String>, encoded_key: impl Into<String>) -> Self {
        Self {
            records: vec![S3Record {
                event_name: Some("ObjectCreated:Put".to_string()),
                s3: S3Entity {
                    bucket: S3Bucket {
                        name: bucket.into(),
                    },
                    object: S3Object {
                        key: encoded_key.into(),
                        size: None,
                    },
                },
            }],
        }
    }

    /// The object named by the first record, with its key decoded.
    ///
    /// One invocation converts one object; further records are ignored.
    pub fn source_object(&self) -> Result<SourceObject, HandlerError> {
        let record = self
            .records
            .first()
            .ok_or_else(|| HandlerError::InvalidEvent("event has no records".into()))?;

        if self.records.len() > 1 {
            warn!(
                "Event carries {} records; only the first is converted",
                self.records.len()
            );
        }

        let bucket = record.s3.bucket.name.trim();
        if bucket.is_empty() {
            return Err(HandlerError::InvalidEvent("bucket name is empty".into()));
        }

        let key = decode_key(&record.s3.object.key)?;
        if key.is_empty() || key.ends_with('/') {
            return Err(HandlerError::InvalidEvent(format!(
                "object key '{key}' does not name a file"
            )));
        }

        Ok(SourceObject {
            bucket: bucket.to_string(),
            key,
        })
    }
}

/// Decode a notification key: `+` becomes a space, then percent-escapes
/// are resolved. `%2B` therefore still yields a literal `+`.
pub fn decode_key(raw: &str) -> Result<String, HandlerError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|k| k.into_owned())
        .map_err(|e| HandlerError::InvalidEvent(format!("object key '{raw}' is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_and_escapes() {
        assert_eq!(decode_key("folder/My+File.docx").unwrap(), "folder/My File.docx");
        assert_eq!(decode_key("a%2Bb.docx").unwrap(), "a+b.docx");
        assert_eq!(decode_key("r%C3%A9sum%C3%A9.doc").unwrap(), "résumé.doc");
        assert_eq!(decode_key("plain.xlsx").unwrap(), "plain.xlsx");
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(
            decode_key("bad%FF.docx"),
            Err(HandlerError::InvalidEvent(_))
        ));
    }

    #[test]
    fn parses_s3_notification() {
        let json = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "docs", "arn": "arn:aws:s3:::docs" },
                    "object": { "key": "folder/My+File.docx", "size": 1024, "eTag": "abc" }
                }
            }]
        }"#;
        let event: S3Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.records[0].s3.object.size, Some(1024));

        let src = event.source_object().unwrap();
        assert_eq!(
            src,
            SourceObject {
                bucket: "docs".into(),
                key: "folder/My File.docx".into(),
            }
        );
    }

    #[test]
    fn empty_event_is_invalid() {
        let event: S3Event = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            event.source_object(),
            Err(HandlerError::InvalidEvent(_))
        ));
    }

    #[test]
    fn folder_marker_is_invalid() {
        let event = S3Event::single("docs", "folder/");
        assert!(event.source_object().is_err());
    }

    #[test]
    fn first_record_wins() {
        let mut event = S3Event::single("docs", "first.docx");
        event
            .records
            .extend(S3Event::single("docs", "second.docx").records);
        assert_eq!(event.source_object().unwrap().key, "first.docx");
    }
}
