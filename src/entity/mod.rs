//! Feed entities: the payload types flowing through the transport.
//!
//! A [`Feed`] is one sensor stream. Feeds nest: a device feed typically
//! carries one child feed per sensor, and each feed carries time-keyed
//! [`Entry`] values. The transport never interprets these; they are encoded
//! into the request body and decoded out of the response body as plain JSON.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// KeyType / ValueType
// ============================================================================

/// How entries of a feed are keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Unkeyed feed.
    #[default]
    None,
    /// Entries keyed by timestamp.
    Date,
    /// Entries keyed by arbitrary string.
    String,
}

/// Value type carried by a feed's entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// No value (grouping feed).
    #[default]
    None,
    /// Integer readings.
    Integer,
    /// Floating-point readings.
    Number,
    /// String readings.
    String,
    /// Raw byte readings, base64-encoded on the wire.
    Bytes,
}

// ============================================================================
// FeedStatus / FeedAccess
// ============================================================================

/// Whether a feed still receives data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Actively updated.
    #[default]
    Live,
    /// No longer updated.
    Frozen,
}

/// Feed visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedAccess {
    /// Visible to everyone.
    #[default]
    Public,
    /// Visible to the owner only.
    Private,
}

// ============================================================================
// Entry
// ============================================================================

/// One data point of a feed.
///
/// The key is a timestamp string for date-keyed feeds or an arbitrary string
/// otherwise; the value shape follows the feed's [`ValueType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry key.
    pub key: String,

    /// Entry value.
    pub value: Value,
}

impl Entry {
    /// Creates an entry.
    #[inline]
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

// ============================================================================
// Feed
// ============================================================================

/// One sensor stream, possibly with nested child feeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    /// Feed name, unique within its parent.
    pub name: String,

    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// How entries are keyed.
    #[serde(default, rename = "keyType")]
    pub key_type: KeyType,

    /// Entry value type.
    #[serde(default, rename = "valueType")]
    pub value_type: ValueType,

    /// Live or frozen.
    #[serde(default)]
    pub status: FeedStatus,

    /// Public or private.
    #[serde(default)]
    pub access: FeedAccess,

    /// Search tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Owner website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    /// Owner contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Nested child feeds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Feed>,

    /// Data entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<Entry>,

    /// Most recent value, if the service included it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
}

// ============================================================================
// Feed - Constructors & Builder Methods
// ============================================================================

impl Feed {
    /// Creates a feed with the given name and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the title.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the key type.
    #[inline]
    #[must_use]
    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }

    /// Sets the value type.
    #[inline]
    #[must_use]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Sets the access level.
    #[inline]
    #[must_use]
    pub fn with_access(mut self, access: FeedAccess) -> Self {
        self.access = access;
        self
    }

    /// Adds a search tag.
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds a child feed.
    #[inline]
    #[must_use]
    pub fn with_child(mut self, child: Feed) -> Self {
        self.children.push(child);
        self
    }

    /// Adds a data entry.
    #[inline]
    #[must_use]
    pub fn with_entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Finds a direct child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Feed> {
        self.children.iter().find(|child| child.name == name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feed_defaults() {
        let feed = Feed::new("temperature");
        assert_eq!(feed.name, "temperature");
        assert_eq!(feed.key_type, KeyType::None);
        assert_eq!(feed.value_type, ValueType::None);
        assert_eq!(feed.status, FeedStatus::Live);
        assert_eq!(feed.access, FeedAccess::Public);
        assert!(feed.children.is_empty());
    }

    #[test]
    fn test_feed_builder_chain() {
        let feed = Feed::new("office")
            .with_title("Office sensors")
            .with_tag("indoor")
            .with_child(
                Feed::new("temperature")
                    .with_key_type(KeyType::Date)
                    .with_value_type(ValueType::Number)
                    .with_entry(Entry::new("2013-04-01T00:00:00Z", json!(21.5))),
            );

        assert_eq!(feed.title.as_deref(), Some("Office sensors"));
        let child = feed.child("temperature").expect("child");
        assert_eq!(child.value_type, ValueType::Number);
        assert_eq!(child.entries[0].value, json!(21.5));
    }

    #[test]
    fn test_feed_serialization_shape() {
        let feed = Feed::new("temperature")
            .with_key_type(KeyType::Date)
            .with_value_type(ValueType::Number);

        let json = serde_json::to_value(&feed).expect("serialize");
        assert_eq!(json["name"], "temperature");
        assert_eq!(json["keyType"], "date");
        assert_eq!(json["valueType"], "number");
        assert_eq!(json["status"], "live");
        // Empty collections are omitted from the wire form.
        assert!(json.get("children").is_none());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_feed_round_trip_with_nesting() {
        let feed = Feed::new("device")
            .with_access(FeedAccess::Private)
            .with_child(
                Feed::new("humidity")
                    .with_key_type(KeyType::Date)
                    .with_value_type(ValueType::Integer)
                    .with_entry(Entry::new("2013-04-01T00:00:00Z", json!(63))),
            );

        let bytes = serde_json::to_vec(&feed).expect("serialize");
        let back: Feed = serde_json::from_slice(&bytes).expect("deserialize");
        assert_eq!(back, feed);
    }

    #[test]
    fn test_feed_deserializes_with_missing_optionals() {
        let back: Feed = serde_json::from_str(r#"{"name":"bare"}"#).expect("deserialize");
        assert_eq!(back.name, "bare");
        assert_eq!(back.status, FeedStatus::Live);
        assert!(back.entries.is_empty());
    }
}
