//! Record domain model
//!
//! A `Record` is one CSL-JSON-shaped bibliographic entry: a typed core of
//! well-known fields plus a flattened side-map that carries any other
//! field through read/write cycles unchanged. The schema is open on
//! purpose: the store interprets only what it indexes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A contributor name (CSL name variable).
///
/// `family`/`given` for people, `literal` for institutional authors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct Name {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Name {
    pub fn family(family: impl Into<String>) -> Self {
        Self {
            family: Some(family.into()),
            ..Default::default()
        }
    }

    pub fn literal(literal: impl Into<String>) -> Self {
        Self {
            literal: Some(literal.into()),
            ..Default::default()
        }
    }
}

/// A CSL date variable. Year lives at `date-parts[0][0]` and may be a
/// number or a numeric string, depending on the producing tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct DateVariable {
    #[serde(rename = "date-parts", skip_serializing_if = "Option::is_none")]
    pub date_parts: Option<Vec<Vec<Value>>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DateVariable {
    pub fn year(year: i32) -> Self {
        Self {
            date_parts: Some(vec![vec![Value::from(year)]]),
            ..Default::default()
        }
    }
}

/// Engine-owned metadata nested under `custom`.
///
/// `uuid` and `created_at` are immutable once set; `timestamp` is the
/// last-modified time. Everything else (tags, attachment manifests,
/// external-tool data) passes through the store untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
pub struct CustomMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One bibliographic entry.
///
/// `id` is the human-readable citation key (mutable, store-unique);
/// stable identity lives in `custom.uuid`. Unknown fields are preserved
/// in `extra` on every round trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Citation key. Empty means "not yet assigned"; the store fills it
    /// in on `add`.
    #[serde(default)]
    pub id: String,

    /// Entry category (`article-journal`, `book`, ...). Free-form.
    #[serde(rename = "type")]
    pub record_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "author", skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<Name>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateVariable>,

    #[serde(rename = "container-title", skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,

    // Volume/issue/page may be numbers or strings in the wild
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,

    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "PMID", skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(rename = "PMCID", skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(rename = "ISBN", skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(rename = "ISSN", skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(rename = "keyword", skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    /// Engine-owned metadata. Always populated after normalization.
    #[serde(default)]
    pub custom: CustomMeta,

    /// Catch-all for fields the store does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Record {
    fn default() -> Self {
        Self {
            id: String::new(),
            record_type: String::new(),
            title: None,
            authors: None,
            issued: None,
            container_title: None,
            volume: None,
            issue: None,
            page: None,
            doi: None,
            pmid: None,
            pmcid: None,
            isbn: None,
            issn: None,
            url: None,
            abstract_text: None,
            publisher: None,
            keywords: None,
            custom: CustomMeta::default(),
            extra: Map::new(),
        }
    }
}

impl Record {
    /// Create an empty record of the given type.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            ..Default::default()
        }
    }

    /// First author's family name, or literal name for institutional
    /// authors. Used for citation key generation.
    pub fn first_author_name(&self) -> Option<&str> {
        let name = self.authors.as_ref()?.first()?;
        name.family
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| name.literal.as_deref().filter(|s| !s.trim().is_empty()))
    }

    /// Issued year from `date-parts[0][0]`, rendered as a string.
    pub fn issued_year(&self) -> Option<String> {
        let parts = self.issued.as_ref()?.date_parts.as_ref()?;
        match parts.first()?.first()? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}
