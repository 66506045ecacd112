use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use surrealdb::RecordId;

/// Persisted credential row (table: `user`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable database identifier for this user.
    pub id: RecordId,
    /// Unique login, enforced by the `user_login` index.
    pub login: String,
    /// One-way hash of the password. Plaintext is never stored.
    pub password_hash: String,
    /// Creation time, unix milliseconds.
    pub created_at: i64,
}

/// Payload for inserting a credential row.
#[derive(Debug, Clone, Serialize)]
pub struct UserCreate {
    pub login: String,
    pub password_hash: String,
    pub created_at: i64,
}

/// Persisted session row (table: `session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: RecordId,
    /// Opaque bearer token, unique across all sessions.
    pub token: String,
    /// Owning user.
    pub user_id: RecordId,
    /// Owning user's login, copied at creation time. Logins are immutable.
    pub login: String,
    /// Expiry, unix milliseconds. The session is valid while `expires_at > now`.
    pub expires_at: i64,
    pub created_at: i64,
}

/// Payload for inserting a session row.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreate {
    pub token: String,
    pub user_id: RecordId,
    pub login: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// Persisted document metadata (table: `document`).
///
/// The payload lives in the `content` column of the same row but is only read
/// by `DocumentStore::get_content`, so listings never pull file bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Public document id (UUID), unique.
    pub doc_id: String,
    /// Login of the owner.
    pub owner: String,
    /// Optional display name from the metadata form.
    pub name: Option<String>,
    /// `true` when `content` holds base64 file bytes, `false` for JSON text.
    pub has_file: bool,
    /// MIME type, only for file documents.
    pub mime: Option<String>,
    /// Shared documents are visible to every authenticated caller.
    pub is_public: bool,
    /// String key/value tags, the target of metadata filters.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Free-form metadata that is not a plain string tag. Stored as JSON
    /// text so large integers and `null` entries survive the round trip.
    #[serde(default, with = "json_text")]
    pub extra: Map<String, Value>,
    pub created_at: i64,
}

/// Payload for inserting a document row, metadata and content together.
#[derive(Debug, Clone)]
pub struct DocumentCreate {
    pub record: DocumentRecord,
    /// Base64 of the file bytes, or the submitted JSON text verbatim.
    pub content: String,
}

/// Content column of a document row.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentContentRecord {
    pub has_file: bool,
    pub mime: Option<String>,
    pub content: String,
}

/// Serialize a JSON object as its text form, and parse it back on read.
pub(crate) mod json_text {
    use serde::{Deserialize, Deserializer, Serializer, de, ser};
    use serde_json::{Map, Value};

    pub fn serialize<S: Serializer>(map: &Map<String, Value>, s: S) -> Result<S::Ok, S::Error> {
        let text = to_text(map).map_err(ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(text) if !text.is_empty() => serde_json::from_str(&text).map_err(de::Error::custom),
            _ => Ok(Map::new()),
        }
    }

    pub fn to_text(map: &Map<String, Value>) -> serde_json::Result<String> {
        serde_json::to_string(map)
    }
}
