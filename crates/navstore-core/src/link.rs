//! # Binding Links
//!
//! Resolution of binding-link text (`Owners('7')`) into an entity set name
//! and typed key predicates. The store never parses URIs itself; it calls a
//! `LinkResolver`, and `EntityLinkParser` is the resolver shipped with the
//! crate for the canonical key-as-segment form.

use crate::schema::Schema;
use crate::types::{KeyPredicate, Scalar, StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// A resolved binding link: the addressed entity set and its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    pub entity_set: String,
    pub keys: Vec<KeyPredicate>,
}

/// Resolves binding-link text against a schema.
pub trait LinkResolver {
    /// Resolve `link`, relative to `base_uri` when it carries that prefix.
    fn resolve(&self, schema: &Schema, base_uri: &str, link: &str) -> StoreResult<EntityLink>;
}

/// Parser for links of the form `[base/]Set(key)` and `[base/]Set(A=1,B='x')`.
///
/// Literals: integers, decimals, `true`/`false`, and single-quoted strings
/// where `''` is an escaped quote.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityLinkParser;

impl LinkResolver for EntityLinkParser {
    fn resolve(&self, schema: &Schema, base_uri: &str, link: &str) -> StoreResult<EntityLink> {
        let invalid = |reason: &str| {
            StoreError::BadRequest(format!("Invalid entity binding link {}: {}", link, reason))
        };

        let relative = link
            .strip_prefix(base_uri)
            .unwrap_or(link)
            .trim_start_matches('/');

        let open = relative.find('(').ok_or_else(|| invalid("missing key"))?;
        let inner = relative[open..]
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| invalid("unbalanced key parentheses"))?;
        let set_name = &relative[..open];

        let (_, entity_type) = schema
            .require_entity_set(set_name)
            .map_err(|_| invalid("unknown entity set"))?;

        let segments = split_key_segments(inner).ok_or_else(|| invalid("unterminated string"))?;
        if segments.len() != entity_type.keys.len() {
            return Err(invalid("key predicate count does not match the entity key"));
        }

        let mut keys = Vec::with_capacity(segments.len());
        for segment in segments {
            let (name, literal) = match split_outside_quotes(segment, '=') {
                Some((name, literal)) => (name.trim(), literal.trim()),
                None if entity_type.keys.len() == 1 => {
                    (entity_type.keys[0].as_str(), segment.trim())
                }
                None => return Err(invalid("positional key on a composed key")),
            };
            if !entity_type.is_key(name) {
                return Err(invalid("predicate names a non-key property"));
            }
            if keys.iter().any(|k: &KeyPredicate| k.name == name) {
                return Err(invalid("duplicate key predicate"));
            }
            let value = parse_literal(literal).ok_or_else(|| invalid("malformed literal"))?;
            keys.push(KeyPredicate::new(name, value));
        }

        Ok(EntityLink {
            entity_set: set_name.to_string(),
            keys,
        })
    }
}

/// Split on commas that are not inside a quoted string.
fn split_key_segments(inner: &str) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    let mut in_string = false;
    let mut start = 0;

    for (i, c) in inner.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            ',' if !in_string => {
                segments.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return None;
    }
    segments.push(&inner[start..]);
    Some(segments)
}

fn split_outside_quotes(segment: &str, separator: char) -> Option<(&str, &str)> {
    let mut in_string = false;
    for (i, c) in segment.char_indices() {
        if c == '\'' {
            in_string = !in_string;
        } else if c == separator && !in_string {
            return Some((&segment[..i], &segment[i + c.len_utf8()..]));
        }
    }
    None
}

fn parse_literal(literal: &str) -> Option<Scalar> {
    if let Some(quoted) = literal.strip_prefix('\'') {
        let body = quoted.strip_suffix('\'')?;
        // Every quote inside the body must be doubled.
        let mut text = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c == '\'' && chars.next() != Some('\'') {
                return None;
            }
            text.push(c);
        }
        return Some(Scalar::String(text));
    }

    match literal {
        "true" => Some(Scalar::Boolean(true)),
        "false" => Some(Scalar::Boolean(false)),
        "" => None,
        _ => literal
            .parse::<i64>()
            .map(Scalar::Int)
            .ok()
            .or_else(|| literal.parse::<f64>().ok().filter(|d| d.is_finite()).map(Scalar::Double)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
