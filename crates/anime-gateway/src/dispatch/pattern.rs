//! Path templates: literal segments, `:name` captures, and trailing `:name?`
//! segments that may be absent.
//!
//! Matching rules:
//! - Literal segments compare exactly (case-sensitive)
//! - A capture takes exactly one non-empty segment, percent-decoded
//! - A trailing slash on the request path is ignored

use std::collections::HashMap;
use std::fmt;

/// Captured path parameters, keyed by segment name.
pub type PathParams = HashMap<String, String>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    MissingLeadingSlash(String),
    #[error("empty segment in pattern: {0}")]
    EmptySegment(String),
    #[error("unnamed parameter in pattern: {0}")]
    UnnamedParam(String),
    #[error("required segment after optional one in pattern: {0}")]
    RequiredAfterOptional(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, optional: bool },
}

/// A compiled route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
        }

        let trimmed = pattern.trim_end_matches('/');
        let mut segments = Vec::new();
        let mut seen_optional = false;

        if !trimmed.is_empty() {
            for raw in trimmed[1..].split('/') {
                if raw.is_empty() {
                    return Err(PatternError::EmptySegment(pattern.to_string()));
                }
                let segment = match raw.strip_prefix(':') {
                    Some(param) => {
                        let (name, optional) = match param.strip_suffix('?') {
                            Some(name) => (name, true),
                            None => (param, false),
                        };
                        if name.is_empty() {
                            return Err(PatternError::UnnamedParam(pattern.to_string()));
                        }
                        Segment::Param {
                            name: name.to_string(),
                            optional,
                        }
                    }
                    None => Segment::Literal(raw.to_string()),
                };

                let optional = matches!(segment, Segment::Param { optional: true, .. });
                if seen_optional && !optional {
                    return Err(PatternError::RequiredAfterOptional(pattern.to_string()));
                }
                seen_optional |= optional;
                segments.push(segment);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The template as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path, returning captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let trimmed = path.trim_end_matches('/');
        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.strip_prefix('/')?.split('/').collect()
        };

        if parts.len() > self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match (segment, parts.get(i)) {
                (Segment::Literal(expected), Some(part)) => {
                    if expected != part {
                        return None;
                    }
                }
                (Segment::Param { name, .. }, Some(part)) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| part.to_string());
                    params.insert(name.clone(), value);
                }
                (Segment::Param { optional: true, .. }, None) => {}
                (_, None) => return None,
            }
        }

        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
