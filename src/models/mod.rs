use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TVG_ID: &str = "tvg-id";
pub const TVG_NAME: &str = "tvg-name";
pub const TVG_LOGO: &str = "tvg-logo";
pub const GROUP_TITLE: &str = "group-title";

/// Pseudo-field names that address the stream URL and the EXTINF label
pub const STREAM_FIELD: &str = "stream";
pub const LABEL_FIELD: &str = "label";

/// One playlist entry: the attributes of an EXTINF line plus the URL that follows it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub attributes: BTreeMap<String, String>,
    pub label: String,
    pub stream: String,
}

impl PlaylistRecord {
    pub fn new<S: Into<String>>(stream: S) -> Self {
        Self {
            stream: stream.into(),
            ..Default::default()
        }
    }

    /// Builder style attribute setter, mostly useful in tests
    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }

    /// Current value of a field, including the `stream` and `label` pseudo-fields
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            STREAM_FIELD => Some(self.stream.as_str()),
            LABEL_FIELD => Some(self.label.as_str()),
            _ => self.attributes.get(name).map(String::as_str),
        }
    }

    /// Mutable access to an existing field; `None` when the record lacks it
    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            STREAM_FIELD => Some(&mut self.stream),
            LABEL_FIELD => Some(&mut self.label),
            _ => self.attributes.get_mut(name),
        }
    }

    /// Attribute value treating empty strings as absent
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn tvg_id(&self) -> Option<&str> {
        self.non_empty(TVG_ID)
    }

    pub fn tvg_name(&self) -> Option<&str> {
        self.attributes.get(TVG_NAME).map(String::as_str)
    }

    pub fn group_title(&self) -> Option<&str> {
        self.attributes.get(GROUP_TITLE).map(String::as_str)
    }
}

/// Kind of XMLTV element the guide filter cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmltvElementKind {
    Channel,
    Programme,
}

impl XmltvElementKind {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"channel" => Some(Self::Channel),
            b"programme" => Some(Self::Programme),
            _ => None,
        }
    }
}

/// A `channel` or `programme` subtree with its attributes and verbatim serialized bytes
#[derive(Debug, Clone)]
pub struct XmltvElement {
    pub kind: XmltvElementKind,
    pub attributes: BTreeMap<String, String>,
    pub xml: Vec<u8>,
}

impl XmltvElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Counters reported by the guide filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpgFilterStats {
    pub channels_kept: usize,
    pub channels_dropped: usize,
    pub programmes_kept: usize,
    pub programmes_dropped: usize,
    pub invalid_timestamps: usize,
    /// The input broke off with an XML error; output holds what was read before it
    pub truncated: bool,
}

/// Counters reported by one model pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub parsed: usize,
    pub retained: usize,
    pub filtered_out: usize,
    pub transform_failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_fields() {
        let mut record = PlaylistRecord::new("http://x")
            .with_label("ESPN")
            .with_attribute(TVG_ID, "espn.us");

        assert_eq!(record.field(STREAM_FIELD), Some("http://x"));
        assert_eq!(record.field(LABEL_FIELD), Some("ESPN"));
        assert_eq!(record.field(TVG_ID), Some("espn.us"));
        assert_eq!(record.field(TVG_LOGO), None);

        *record.field_mut(STREAM_FIELD).unwrap() = "http://y".to_string();
        assert_eq!(record.stream, "http://y");
        assert!(record.field_mut(TVG_LOGO).is_none());
    }

    #[test]
    fn test_empty_tvg_id_is_absent() {
        let record = PlaylistRecord::new("http://x").with_attribute(TVG_ID, "");
        assert_eq!(record.tvg_id(), None);
    }
}
