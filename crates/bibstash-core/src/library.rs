//! The reference store
//!
//! `Library` owns an insertion-ordered list of references plus five
//! secondary indices (citation key, uuid, DOI, PMID, ISBN) mapping
//! identifier strings to slots in that list. The list is the sole owner
//! of the entities; the index maps hold handles only and are rebuilt
//! from the list after any structural change, so list and indices can
//! never drift apart.
//!
//! Persistence is a single JSON file. A SHA-256 hash of the file's bytes
//! is recorded on every load/save; `reload` compares against it to tell
//! this process's own writes (hash unchanged, skip) from external edits
//! (hash differs, re-parse and rebuild). This is optimistic concurrency:
//! last external writer wins, and no file lock is taken.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::codec;
use crate::error::LibraryError;
use crate::identity::now_iso;
use crate::record::Record;
use crate::reference::Reference;
use bibstash_identifiers::{make_key_unique, sanitize_key};

/// Engine-owned custom fields that `update` never touches directly.
const PROTECTED_CUSTOM: [&str; 3] = ["uuid", "created_at", "timestamp"];

/// Which index a lookup goes through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdType {
    #[default]
    Id,
    Uuid,
    Doi,
    Pmid,
    Isbn,
}

impl IdType {
    const ALL: [IdType; 5] = [
        IdType::Id,
        IdType::Uuid,
        IdType::Doi,
        IdType::Pmid,
        IdType::Isbn,
    ];
}

impl std::str::FromStr for IdType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "uuid" => Ok(Self::Uuid),
            "doi" => Ok(Self::Doi),
            "pmid" => Ok(Self::Pmid),
            "isbn" => Ok(Self::Isbn),
            other => Err(format!("unknown identifier type: {other}")),
        }
    }
}

/// What `update` should do when the requested citation key is already
/// taken by a different record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnIdCollision {
    /// Return [`UpdateOutcome::IdCollision`] without mutating anything.
    #[default]
    Fail,
    /// Resolve the key with a bijective base-26 letter suffix and proceed.
    Suffix,
}

/// Result of an `update` call. Collision and not-found are ordinary
/// outcomes the caller matches on, not errors.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// Fields changed; the returned record is the new state.
    Updated(Record),
    /// Nothing differed from the current record; `timestamp` was not
    /// bumped. Returns the unchanged record.
    Unchanged(Record),
    /// The requested citation key belongs to a different record and
    /// collision mode was [`OnIdCollision::Fail`].
    IdCollision { requested: String },
    /// No record matched the identifier.
    NotFound,
}

/// The file-backed, in-memory indexed reference collection.
pub struct Library {
    path: PathBuf,
    references: Vec<Reference>,
    by_id: HashMap<String, usize>,
    by_uuid: HashMap<String, usize>,
    by_doi: HashMap<String, usize>,
    by_pmid: HashMap<String, usize>,
    by_isbn: HashMap<String, usize>,
    current_hash: String,
}

impl Library {
    /// Load a library from `path`, creating an empty file (and parent
    /// directories) first if it does not exist, so loading a fresh
    /// library always succeeds.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| LibraryError::io(parent, e))?;
                }
            }
            fs::write(&path, "[]\n").map_err(|e| LibraryError::io(&path, e))?;
        }

        let bytes = fs::read(&path).map_err(|e| LibraryError::io(&path, e))?;
        let records = codec::parse(&bytes)?;
        let references = build_references(records)?;

        let mut library = Self {
            path,
            references,
            by_id: HashMap::new(),
            by_uuid: HashMap::new(),
            by_doi: HashMap::new(),
            by_pmid: HashMap::new(),
            by_isbn: HashMap::new(),
            current_hash: content_hash(&bytes),
        };
        library.rebuild_indices();
        debug!(
            path = %library.path.display(),
            records = library.references.len(),
            "library loaded"
        );
        Ok(library)
    }

    /// Serialize current state to the backing file and adopt the new
    /// content hash, so a subsequent `reload` recognizes this write as
    /// our own.
    pub fn save(&mut self) -> Result<(), LibraryError> {
        let records: Vec<&Record> = self.references.iter().map(Reference::record).collect();
        let text = codec::serialize(&records)?;
        fs::write(&self.path, &text).map_err(|e| LibraryError::io(&self.path, e))?;
        self.current_hash = content_hash(text.as_bytes());
        debug!(path = %self.path.display(), records = records.len(), "library saved");
        Ok(())
    }

    /// Add a record, generating identity metadata and a citation key as
    /// needed. Returns the finalized record.
    pub fn add(&mut self, record: Record) -> Result<Record, LibraryError> {
        // The codec rejects an empty type on parse; refusing it here keeps
        // the store from ever writing a file it could not load back
        if record.record_type.trim().is_empty() {
            return Err(LibraryError::validation(
                "type",
                "must be a non-empty string",
            ));
        }

        if let Some(uuid) = record.custom.uuid.as_deref() {
            if self.by_uuid.contains_key(&uuid.to_lowercase()) {
                return Err(LibraryError::validation(
                    "custom.uuid",
                    format!("a record with uuid {uuid} already exists"),
                ));
            }
        }

        let existing: Vec<String> = self.by_id.keys().cloned().collect();
        let reference = Reference::with_generated_key(record, &existing);
        let record = reference.record().clone();

        self.references.push(reference);
        self.rebuild_indices();
        debug!(id = %record.id, "record added");
        Ok(record)
    }

    /// Remove the record matching `identifier` under the given index.
    /// Returns the removed record, or `None` if nothing matched.
    pub fn remove(&mut self, identifier: &str, id_type: IdType) -> Option<Record> {
        let slot = self.lookup(identifier, id_type)?;
        let reference = self.references.remove(slot);
        self.rebuild_indices();
        debug!(id = %reference.id(), "record removed");
        Some(reference.into_record())
    }

    /// Apply a partial update to the record matching `identifier`.
    ///
    /// Top-level fields are shallow-merged over the current record;
    /// `custom` is itself shallow-merged, with `uuid` and `created_at`
    /// always preserved. A `null` value clears an optional field. If the
    /// merge produces no observable change (ignoring the engine-owned
    /// custom fields), the record is left untouched and `timestamp` is
    /// not bumped.
    pub fn update(
        &mut self,
        identifier: &str,
        updates: Map<String, Value>,
        id_type: IdType,
        on_id_collision: OnIdCollision,
    ) -> Result<UpdateOutcome, LibraryError> {
        let Some(slot) = self.lookup(identifier, id_type) else {
            return Ok(UpdateOutcome::NotFound);
        };
        let current = self.references[slot].record().clone();

        for field in ["id", "type", "custom"] {
            if updates.get(field).is_some_and(Value::is_null) {
                return Err(LibraryError::validation(field, "cannot be cleared"));
            }
        }

        let mut updates = updates;

        // A renamed citation key gets the same sanitization as add
        let requested_id = updates
            .get("id")
            .and_then(Value::as_str)
            .map(|id| sanitize_key(id.trim()));
        if let Some(requested) = requested_id {
            if requested.is_empty() {
                return Err(LibraryError::validation("id", "must be a non-empty string"));
            }
            updates.insert("id".to_string(), Value::from(requested.clone()));

            let collides = self
                .by_id
                .get(&requested)
                .is_some_and(|&other| other != slot);
            if collides {
                match on_id_collision {
                    OnIdCollision::Fail => {
                        return Ok(UpdateOutcome::IdCollision { requested });
                    }
                    OnIdCollision::Suffix => {
                        let existing: Vec<String> = self
                            .by_id
                            .keys()
                            .filter(|k| k.as_str() != current.id)
                            .cloned()
                            .collect();
                        let resolved = make_key_unique(&requested, &existing);
                        updates.insert("id".to_string(), Value::from(resolved));
                    }
                }
            }
        }

        let mut merged = to_object(&current)?;
        for (key, value) in updates {
            if key == "custom" {
                let mut custom = merged
                    .get("custom")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if let Value::Object(patch) = value {
                    for (custom_key, custom_value) in patch {
                        if PROTECTED_CUSTOM.contains(&custom_key.as_str()) {
                            continue;
                        }
                        if custom_value.is_null() {
                            custom.remove(&custom_key);
                        } else {
                            custom.insert(custom_key, custom_value);
                        }
                    }
                }
                merged.insert("custom".to_string(), Value::Object(custom));
            } else if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }

        // No-op detection: nothing observable changed, do not bump timestamp
        if without_protected_custom(merged.clone()) == without_protected_custom(to_object(&current)?)
        {
            return Ok(UpdateOutcome::Unchanged(current));
        }

        let mut candidate: Record = serde_json::from_value(Value::Object(merged))
            .map_err(|e| LibraryError::validation(&current.id, e.to_string()))?;
        if candidate.id.trim().is_empty() {
            return Err(LibraryError::validation("id", "must be a non-empty string"));
        }
        if candidate.record_type.trim().is_empty() {
            return Err(LibraryError::validation(
                "type",
                "must be a non-empty string",
            ));
        }
        candidate.custom.uuid = current.custom.uuid.clone();
        candidate.custom.created_at = current.custom.created_at.clone();
        candidate.custom.timestamp = Some(now_iso());

        let record = candidate.clone();
        self.references[slot] = Reference::new(candidate);
        self.rebuild_indices();
        debug!(id = %record.id, "record updated");
        Ok(UpdateOutcome::Updated(record))
    }

    /// Index lookup. `None` means not found.
    pub fn find(&self, identifier: &str, id_type: IdType) -> Option<&Record> {
        self.lookup(identifier, id_type)
            .map(|slot| self.references[slot].record())
    }

    /// Try every index in order (id, uuid, DOI, PMID, ISBN).
    pub fn find_any(&self, identifier: &str) -> Option<&Record> {
        IdType::ALL
            .iter()
            .find_map(|&id_type| self.find(identifier, id_type))
    }

    /// All records in insertion order.
    pub fn all(&self) -> Vec<&Record> {
        self.references.iter().map(Reference::record).collect()
    }

    /// References in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.references.iter()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 hex digest of the backing file content as of the last
    /// load/save/reload.
    pub fn current_hash(&self) -> &str {
        &self.current_hash
    }

    /// Re-read the backing file if it changed underneath us.
    ///
    /// Returns `Ok(false)` when the file's hash matches the known-good
    /// hash (a self-write echo; in-memory state is left untouched) and
    /// `Ok(true)` when an external change was detected and the entire
    /// in-memory state was rebuilt from disk.
    pub fn reload(&mut self) -> Result<bool, LibraryError> {
        let bytes = fs::read(&self.path).map_err(|e| LibraryError::io(&self.path, e))?;
        let hash = content_hash(&bytes);
        if hash == self.current_hash {
            debug!(path = %self.path.display(), "reload skipped: self-write echo");
            return Ok(false);
        }

        let records = codec::parse(&bytes)?;
        // Build the replacement fully before touching current state, so a
        // parse or validation failure leaves the store as it was
        let references = build_references(records)?;
        self.references = references;
        self.rebuild_indices();
        self.current_hash = hash;
        info!(
            path = %self.path.display(),
            records = self.references.len(),
            "library reloaded after external change"
        );
        Ok(true)
    }

    fn lookup(&self, identifier: &str, id_type: IdType) -> Option<usize> {
        match id_type {
            IdType::Id => self.by_id.get(identifier).copied(),
            IdType::Uuid => self.by_uuid.get(&identifier.to_lowercase()).copied(),
            IdType::Doi => self.by_doi.get(identifier).copied(),
            IdType::Pmid => self.by_pmid.get(identifier).copied(),
            IdType::Isbn => self.by_isbn.get(identifier).copied(),
        }
    }

    /// Recompute every index map from the reference list. The maps are
    /// derived state; recomputing after each structural change keeps
    /// them in lockstep with the list on every path.
    fn rebuild_indices(&mut self) {
        self.by_id.clear();
        self.by_uuid.clear();
        self.by_doi.clear();
        self.by_pmid.clear();
        self.by_isbn.clear();

        for (slot, reference) in self.references.iter().enumerate() {
            let record = reference.record();
            self.by_id.insert(record.id.clone(), slot);
            self.by_uuid.insert(reference.uuid().to_string(), slot);
            if let Some(doi) = index_key(record.doi.as_deref()) {
                self.by_doi.insert(doi, slot);
            }
            if let Some(pmid) = index_key(record.pmid.as_deref()) {
                self.by_pmid.insert(pmid, slot);
            }
            if let Some(isbn) = index_key(record.isbn.as_deref()) {
                self.by_isbn.insert(isbn, slot);
            }
        }
    }
}

/// Wrap parsed records, rejecting duplicate citation keys or UUIDs.
fn build_references(records: Vec<Record>) -> Result<Vec<Reference>, LibraryError> {
    let mut ids = HashSet::new();
    let mut uuids = HashSet::new();
    let mut references = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let reference = Reference::new(record);
        if !ids.insert(reference.id().to_string()) {
            return Err(LibraryError::validation(
                format!("[{index}].id"),
                format!("duplicate citation key \"{}\"", reference.id()),
            ));
        }
        if !uuids.insert(reference.uuid()) {
            return Err(LibraryError::validation(
                format!("[{index}].custom.uuid"),
                format!("duplicate uuid {}", reference.uuid()),
            ));
        }
        references.push(reference);
    }
    Ok(references)
}

/// SHA-256 hex digest of raw bytes.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A field participates in the DOI/PMID/ISBN indices iff present and
/// non-empty after trimming.
fn index_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn to_object(record: &Record) -> Result<Map<String, Value>, LibraryError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err(LibraryError::Serialize(
            "record did not serialize to an object".to_string(),
        )),
        Err(e) => Err(LibraryError::Serialize(e.to_string())),
    }
}

/// Strip the engine-owned custom fields for change detection.
fn without_protected_custom(mut obj: Map<String, Value>) -> Map<String, Value> {
    if let Some(Value::Object(custom)) = obj.get_mut("custom") {
        for field in PROTECTED_CUSTOM {
            custom.remove(field);
        }
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_deterministic() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        // Well-known SHA-256 of the empty string
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_index_key_filters_blank() {
        assert_eq!(index_key(None), None);
        assert_eq!(index_key(Some("")), None);
        assert_eq!(index_key(Some("  ")), None);
        assert_eq!(index_key(Some(" 10.1/x ")), Some("10.1/x".to_string()));
    }

    #[test]
    fn test_id_type_from_str() {
        use std::str::FromStr;
        assert_eq!(IdType::from_str("doi").unwrap(), IdType::Doi);
        assert_eq!(IdType::from_str("UUID").unwrap(), IdType::Uuid);
        assert!(IdType::from_str("orcid").is_err());
    }

    #[test]
    fn test_without_protected_custom() {
        let obj: Map<String, Value> = serde_json::from_str(
            r#"{"id": "x", "custom": {"uuid": "u", "created_at": "c", "timestamp": "t", "tags": []}}"#,
        )
        .unwrap();
        let stripped = without_protected_custom(obj);
        let custom = stripped.get("custom").unwrap().as_object().unwrap();
        assert!(!custom.contains_key("uuid"));
        assert!(!custom.contains_key("created_at"));
        assert!(!custom.contains_key("timestamp"));
        assert!(custom.contains_key("tags"));
    }
}
