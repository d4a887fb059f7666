//! Parser for metadata trigger expressions.
//!
//! A trigger expression lists the settings a parent controls, as
//! semicolon-separated groups:
//!
//! ```text
//! namelist:foo=bar: enabled, on; namelist:foo=baz; namelist:qux=opt: 2;
//! ```
//!
//! Each group is `id` (any value of the parent enables `id`) or
//! `id: value, value, ...` (only the listed values enable `id`). The key
//! delimiter is colon-space, so ids containing bare colons
//! (`namelist:foo=bar`) parse correctly. Single or double quotes protect
//! delimiter characters inside values, and a backslash escapes a delimiter
//! outside quotes.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ident::SettingId;
use crate::types::ValueSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// `": "`: the item before it is a target id with a value list.
    Key,
    /// `","`: the item before it is one permitted value.
    Value,
    /// `";"` (or end of input): closes the current group.
    GroupEnd,
}

/// An unescaped `$NAME` or `${NAME}` reference.
static ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\*)\$(\{)?[A-Za-z_][A-Za-z0-9_]*(\})?").expect("env pattern"));

/// Whether a value contains an unescaped environment-substitution reference.
///
/// Such values cannot be compared against a permitted-value list before the
/// external substitution step runs, so the evaluator treats them as
/// satisfying any trigger (fail-open).
pub fn contains_env_reference(value: &str) -> bool {
    ENV_REFERENCE
        .captures_iter(value)
        .any(|caps| caps.get(1).map_or(0, |m| m.len()) % 2 == 0)
}

/// Parse a trigger expression into target-id -> permitted-values, in
/// canonical id order. Parsing never fails; the structural validator rejects
/// expressions that yield no usable targets.
pub fn parse_trigger_expression(expr: &str) -> BTreeMap<SettingId, ValueSet> {
    let expr = expr.replace('\n', "");
    let mut raw: BTreeMap<SettingId, Vec<String>> = BTreeMap::new();
    let mut current: Option<SettingId> = None;
    let mut in_group = false;

    for (item, token) in scan(&expr) {
        match token {
            Token::Key => {
                let id = SettingId::parse(&item);
                raw.insert(id.clone(), Vec::new());
                current = Some(id);
                in_group = true;
            }
            Token::GroupEnd => {
                if in_group {
                    if let Some(id) = &current {
                        raw.entry(id.clone()).or_default().push(item);
                    }
                } else {
                    let id = SettingId::parse(&item);
                    raw.insert(id.clone(), Vec::new());
                    current = Some(id);
                }
                in_group = false;
            }
            Token::Value => {
                if in_group
                    && let Some(id) = &current
                {
                    raw.entry(id.clone()).or_default().push(item);
                }
            }
        }
    }

    raw.into_iter()
        .map(|(id, values)| {
            let set = if values.is_empty() {
                ValueSet::Any
            } else {
                ValueSet::OneOf(values)
            };
            (id, set)
        })
        .collect()
}

fn delimiter_at(chars: &[char], i: usize) -> Option<(usize, Token)> {
    match chars.get(i) {
        Some(':') if chars.get(i + 1) == Some(&' ') => Some((2, Token::Key)),
        Some(',') => Some((1, Token::Value)),
        Some(';') => Some((1, Token::GroupEnd)),
        _ => None,
    }
}

/// Split an expression into `(item, token)` pairs, honouring quotes and
/// backslash escapes. A trailing item with no closing `;` yields a final
/// `GroupEnd`.
fn scan(expr: &str) -> Vec<(String, Token)> {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = Vec::new();
    let mut item = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let mut junk = false;

        match c {
            '\'' if !in_double && !escaped => in_single = !in_single,
            '"' if !in_single && !escaped => in_double = !in_double,
            _ => {}
        }

        if !in_single && !in_double && !escaped {
            if let Some((len, token)) = delimiter_at(&chars, i) {
                out.push((item.trim().to_string(), token));
                item.clear();
                i += len - 1;
                junk = true;
            }
        }

        escaped = c == '\\' && !escaped;
        if c == '\\'
            && escaped
            && !in_single
            && !in_double
            && delimiter_at(&chars, i + 1).is_some()
        {
            // The escape protects the next delimiter; drop it from the text.
            junk = true;
        }

        if !junk {
            item.push(c);
        }
        i += 1;
    }

    let tail = item.trim();
    if !tail.is_empty() {
        out.push((tail.to_string(), Token::GroupEnd));
    }
    out
}
