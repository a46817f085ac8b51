//! Raw documentation tree as published by the docs generator.
//!
//! Only the fields the index needs are typed; everything else is kept in the
//! `extra` maps so a descriptor round-trips to callers unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentationRoot {
    #[serde(default, deserialize_with = "lenient_corpus_meta")]
    pub meta: CorpusMeta,
    #[serde(default)]
    pub classes: Vec<TopLevelDescriptor>,
    #[serde(default)]
    pub typedefs: Vec<TopLevelDescriptor>,
}

impl DocumentationRoot {
    pub fn from_slice(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

/// Corpus-wide metadata. Surfaced to callers, never interpreted: values are kept
/// as published, whatever their JSON type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CorpusMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CorpusMeta {
    pub fn generator_version(&self) -> Option<String> {
        match self.generator.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn format_version(&self) -> Option<u32> {
        as_integer(self.format.as_ref()?).and_then(|n| u32::try_from(n).ok())
    }

    /// Generation time in milliseconds since the epoch, when published as a number.
    pub fn date_millis(&self) -> Option<i64> {
        as_integer(self.date.as_ref()?)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A class or typedef.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopLevelDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_meta",
        skip_serializing_if = "Option::is_none"
    )]
    pub meta: Option<DescriptorMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<Vec<Arc<ChildDescriptor>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<Arc<ChildDescriptor>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Arc<ChildDescriptor>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TopLevelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            meta: None,
            props: None,
            methods: None,
            events: None,
            extra: Map::new(),
        }
    }

    pub fn with_meta(mut self, meta: DescriptorMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_methods(mut self, methods: Vec<ChildDescriptor>) -> Self {
        self.methods = Some(methods.into_iter().map(Arc::new).collect());
        self
    }

    pub fn with_props(mut self, props: Vec<ChildDescriptor>) -> Self {
        self.props = Some(props.into_iter().map(Arc::new).collect());
        self
    }

    pub fn with_events(mut self, events: Vec<ChildDescriptor>) -> Self {
        self.events = Some(events.into_iter().map(Arc::new).collect());
        self
    }
}

/// A method, member (prop) or event of a top-level descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_meta",
        skip_serializing_if = "Option::is_none"
    )]
    pub meta: Option<DescriptorMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChildDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            scope: None,
            meta: None,
            extra: Map::new(),
        }
    }

    pub fn with_meta(mut self, meta: DescriptorMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Source location of a file-backed descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DescriptorMeta {
    #[serde(
        default,
        deserialize_with = "lenient_line",
        skip_serializing_if = "Option::is_none"
    )]
    pub line: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_line",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_line: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub path: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DescriptorMeta {
    pub fn file_backed(path: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            line: Some(line),
            file: Some(file.into()),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// `path/file`, skipping whichever part is missing.
    pub fn file_path(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        Some(match self.file.as_deref().filter(|f| !f.is_empty()) {
            Some(file) if !path.is_empty() => format!("{path}/{file}"),
            Some(file) => file.to_string(),
            None => path.to_string(),
        })
    }

    pub fn line_range(&self) -> Option<(u32, Option<u32>)> {
        self.line.map(|start| (start, self.end_line))
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(as_integer)
        .and_then(|n| u32::try_from(n).ok()))
}

fn lenient_corpus_meta<'de, D>(deserializer: D) -> Result<CorpusMeta, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => CorpusMeta::default(),
    })
}

fn lenient_meta<'de, D>(deserializer: D) -> Result<Option<DescriptorMeta>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    })
}
