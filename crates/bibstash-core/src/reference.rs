//! Reference entity
//!
//! A `Reference` wraps exactly one validated record and guarantees the
//! identity invariant: its `uuid` is always a valid UUID v4 equal to the
//! record's `custom.uuid`. Construction normalizes the record's identity
//! metadata, so the "reference without a UUID" state cannot be built.

use serde_json::Value;
use uuid::Uuid;

use crate::identity::normalize_custom;
use crate::record::{Name, Record};
use bibstash_identifiers::{generate_unique_key, make_key_unique, sanitize_key};

/// An in-memory wrapper owning one record.
#[derive(Clone, Debug)]
pub struct Reference {
    uuid: Uuid,
    record: Record,
}

impl Reference {
    /// Wrap a record, normalizing its identity metadata in place.
    pub fn new(mut record: Record) -> Self {
        let uuid = normalize_custom(&mut record.custom);
        Self { uuid, record }
    }

    /// Wrap a record, additionally assigning a citation key if none is
    /// present. A missing or empty key is generated from author/year/title
    /// and uniquified against `existing_keys`; a caller-supplied key is
    /// sanitized and uniquified the same way.
    pub fn with_generated_key(mut record: Record, existing_keys: &[String]) -> Self {
        let supplied = sanitize_key(record.id.trim());
        record.id = if supplied.is_empty() {
            generate_unique_key(
                record.first_author_name(),
                record.issued_year().as_deref(),
                record.title.as_deref(),
                existing_keys,
            )
        } else {
            make_key_unique(&supplied, existing_keys)
        };
        Self::new(record)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Citation key.
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn record_type(&self) -> &str {
        &self.record.record_type
    }

    pub fn title(&self) -> Option<&str> {
        self.record.title.as_deref()
    }

    pub fn authors(&self) -> &[Name] {
        self.record.authors.as_deref().unwrap_or(&[])
    }

    /// Issued year from `date-parts[0][0]`, tolerating numeric strings.
    pub fn year(&self) -> Option<i32> {
        let parts = self.record.issued.as_ref()?.date_parts.as_ref()?;
        match parts.first()?.first()? {
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn doi(&self) -> Option<&str> {
        self.record.doi.as_deref()
    }

    pub fn pmid(&self) -> Option<&str> {
        self.record.pmid.as_deref()
    }

    pub fn pmcid(&self) -> Option<&str> {
        self.record.pmcid.as_deref()
    }

    pub fn isbn(&self) -> Option<&str> {
        self.record.isbn.as_deref()
    }

    pub fn issn(&self) -> Option<&str> {
        self.record.issn.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.record.url.as_deref()
    }

    pub fn container_title(&self) -> Option<&str> {
        self.record.container_title.as_deref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.record.publisher.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        self.record.keywords.as_deref().unwrap_or(&[])
    }
}
