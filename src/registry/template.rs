//! Endpoint roles and parsed URL templates

use std::fmt;

/// The endpoints the service advertises for every entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlRole {
    /// Schema of the entity
    Describe,
    /// A single record, addressed by primary id
    RowTemplate,
    /// The set of all records; also the prefix for external-id addressing
    Collection,
}

impl fmt::Display for UrlRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UrlRole::Describe => "describe",
            UrlRole::RowTemplate => "row-template",
            UrlRole::Collection => "collection",
        };
        f.write_str(name)
    }
}

/// A URL split around its id slot.
///
/// Parsed once when the registry is populated. Only the first occurrence of
/// the placeholder becomes the slot; anything after it is literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    prefix: String,
    suffix: Option<String>,
}

impl UrlTemplate {
    /// Parse `raw`, treating the first `placeholder` as the id slot
    pub fn parse(raw: impl Into<String>, placeholder: &str) -> Self {
        let raw = raw.into();
        let split = if placeholder.is_empty() {
            None
        } else {
            raw.split_once(placeholder)
                .map(|(prefix, suffix)| (prefix.to_string(), suffix.to_string()))
        };

        match split {
            Some((prefix, suffix)) => Self {
                raw,
                prefix,
                suffix: Some(suffix),
            },
            None => Self {
                prefix: raw.clone(),
                raw,
                suffix: None,
            },
        }
    }

    /// Whether the template carries an id slot
    pub fn has_slot(&self) -> bool {
        self.suffix.is_some()
    }

    /// The URL exactly as advertised
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fill the id slot with `id`. Templates without a slot render unchanged.
    pub fn render(&self, id: &str) -> String {
        match &self.suffix {
            Some(suffix) => {
                let mut out = String::with_capacity(self.prefix.len() + id.len() + suffix.len());
                out.push_str(&self.prefix);
                out.push_str(id);
                out.push_str(suffix);
                out
            }
            None => self.raw.clone(),
        }
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
