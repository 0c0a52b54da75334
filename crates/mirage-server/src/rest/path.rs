//! Endpoint path patterns: `:param` templates or regular expressions.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone)]
enum Kind {
    Template { raw: String, segments: Vec<Segment> },
    Pattern(Regex),
}

/// Path an endpoint answers on, relative to the dispatcher base URL.
///
/// Either literal segments with `:name` placeholders (`/users/:id`) or a
/// regular expression whose named groups become params.
#[derive(Clone)]
pub struct PathPattern(Kind);

impl PathPattern {
    pub fn template(path: &str) -> Self {
        let segments = split(path)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(segment.to_string()),
            })
            .collect();
        PathPattern(Kind::Template {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn regex(regex: Regex) -> Self {
        PathPattern(Kind::Pattern(regex))
    }

    /// Params extracted from `path` when it matches, `None` otherwise.
    pub fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        match &self.0 {
            Kind::Template { segments, .. } => {
                let actual: Vec<&str> = split(path).collect();
                if actual.len() != segments.len() {
                    return None;
                }
                let mut params = Map::new();
                for (segment, actual) in segments.iter().zip(actual) {
                    match segment {
                        Segment::Literal(literal) if literal == actual => {}
                        Segment::Literal(_) => return None,
                        Segment::Param(name) => {
                            let value = urlencoding::decode(actual)
                                .map(|decoded| decoded.into_owned())
                                .unwrap_or_else(|_| actual.to_string());
                            params.insert(name.clone(), Value::String(value));
                        }
                    }
                }
                Some(params)
            }
            Kind::Pattern(regex) => {
                let captures = regex.captures(path)?;
                let params = regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        captures
                            .name(name)
                            .map(|m| (name.to_string(), Value::String(m.as_str().to_string())))
                    })
                    .collect();
                Some(params)
            }
        }
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Kind::Template { raw, .. } => f.write_str(raw),
            Kind::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Request path relative to `base`, when it lies under it.
pub(crate) fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
