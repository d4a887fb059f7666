//! Setting identifiers: the `section` / `section=option` addressing scheme.
//!
//! Every setting in a configuration is addressed by a [`SettingId`]: either a
//! bare section name (`namelist:foo`) or a section and option joined by `=`
//! (`namelist:foo=bar`). Sections may carry a trailing *duplicate index*
//! (`namelist:foo(2)`) and/or a *modifier* (`namelist:foo{radiation}`); the
//! suffix-stripped forms map an instance back to the metadata entry that
//! describes its template.
//!
//! All transforms here are pure and infallible: there is no such thing as an
//! invalid id, only an id that no metadata entry matches.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Separator between the section and option parts of an id.
pub const DELIMITER: char = '=';

/// Trailing `{modifier}` and/or `(index)` group on a section name.
static TRAILING_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\{.+\})?(?:\([\d:, ]+\))?$").expect("suffix pattern"));

/// A duplicate index group anywhere in an id: `(1)`, `(1:3)`, `(1, 2)`.
static DUPLICATE_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([\d:, ]+\)").expect("index pattern"));

/// A `{modifier}` group anywhere in an id.
static MODIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{.+\}").expect("modifier pattern"));

/// A single array element reference at the end of an option: `(4)`.
static SINGLE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\d+\)$").expect("element pattern"));

/// Remove every duplicate-index group (`(1)`, `(2:4)`) from an id string.
pub fn strip_duplicate_indices(id: &str) -> String {
    DUPLICATE_INDEX.replace_all(id, "").into_owned()
}

/// Remove every `{modifier}` group from an id string.
pub fn strip_modifiers(id: &str) -> String {
    MODIFIER.replace_all(id, "").into_owned()
}

/// Remove one trailing `{modifier}` and/or `(index)` group from a section name.
pub fn strip_section_suffix(section: &str) -> String {
    TRAILING_SUFFIX.replace(section, "").into_owned()
}

/// Whether an option name addresses a single array element (`values(3)`)
/// rather than a whole array or a slice.
pub fn is_single_element(option: &str) -> bool {
    SINGLE_ELEMENT.is_match(option)
}

/// The identifier of one section or one option within a section.
///
/// Stored as the joined `section=option` string; comparison and ordering
/// operate on the split `(section, option)` pair so that a section always
/// sorts immediately before its own options. This is the one canonical
/// ordering every evaluation pass uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SettingId(String);

impl SettingId {
    /// Id for a whole section.
    pub fn section(name: impl Into<String>) -> Self {
        SettingId(name.into())
    }

    /// Join a section and an optional option name into an id.
    pub fn new(section: &str, option: Option<&str>) -> Self {
        match option {
            None => SettingId(section.to_string()),
            Some(option) => SettingId(format!("{section}{DELIMITER}{option}")),
        }
    }

    /// Interpret a raw id string (splitting on the first delimiter).
    pub fn parse(id: &str) -> Self {
        SettingId(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `(section, option)` pair; `option` is `None` for section ids.
    pub fn split(&self) -> (&str, Option<&str>) {
        match self.0.split_once(DELIMITER) {
            Some((section, option)) => (section, Some(option)),
            None => (self.0.as_str(), None),
        }
    }

    pub fn section_name(&self) -> &str {
        self.split().0
    }

    pub fn option(&self) -> Option<&str> {
        self.split().1
    }

    pub fn is_section(&self) -> bool {
        self.option().is_none()
    }

    /// The id of the owning section (identity for section ids).
    pub fn owning_section(&self) -> SettingId {
        SettingId(self.section_name().to_string())
    }

    /// The id with the section's trailing duplicate/modifier suffix removed,
    /// mapping a duplicated instance back to its template.
    pub fn base(&self) -> SettingId {
        let (section, option) = self.split();
        SettingId::new(&strip_section_suffix(section), option)
    }
}

impl Ord for SettingId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split().cmp(&other.split())
    }
}

impl PartialOrd for SettingId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SettingId {
    fn from(id: &str) -> Self {
        SettingId::parse(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_section_only() {
        assert_eq!(SettingId::new("namelist:foo", None).as_str(), "namelist:foo");
    }

    #[test]
    fn join_with_option() {
        let id = SettingId::new("namelist:foo", Some("bar"));
        assert_eq!(id.as_str(), "namelist:foo=bar");
    }

    #[test]
    fn split_on_first_delimiter() {
        let id = SettingId::parse("namelist:foo=bar=baz");
        assert_eq!(id.split(), ("namelist:foo", Some("bar=baz")));
    }

    #[test]
    fn split_section_only() {
        let id = SettingId::parse("env");
        assert_eq!(id.split(), ("env", None));
        assert!(id.is_section());
    }

    #[test]
    fn section_name_keeps_colons() {
        let id = SettingId::parse("namelist:foo=bar");
        assert_eq!(id.section_name(), "namelist:foo");
        assert_eq!(id.option(), Some("bar"));
    }

    #[test]
    fn owning_section_of_option() {
        let id = SettingId::parse("namelist:foo=bar");
        assert_eq!(id.owning_section(), SettingId::section("namelist:foo"));
    }

    #[test]
    fn base_strips_duplicate_index() {
        let id = SettingId::parse("namelist:foo(1)=bar");
        assert_eq!(id.base().as_str(), "namelist:foo=bar");
    }

    #[test]
    fn base_strips_modifier_and_index() {
        let id = SettingId::parse("namelist:foo{rad}(2)");
        assert_eq!(id.base().as_str(), "namelist:foo");
    }

    #[test]
    fn base_is_identity_without_suffix() {
        let id = SettingId::parse("namelist:foo=bar");
        assert_eq!(id.base(), id);
    }

    #[test]
    fn strip_indices_hits_option_part_too() {
        assert_eq!(strip_duplicate_indices("namelist:foo(1)=bar(3)"), "namelist:foo=bar");
    }

    #[test]
    fn strip_suffix_leaves_prefix_sections_alone() {
        // namelist:foobar(1) must not collapse onto namelist:foo.
        assert_eq!(strip_section_suffix("namelist:foobar(1)"), "namelist:foobar");
        assert_eq!(strip_section_suffix("namelist:foo"), "namelist:foo");
    }

    #[test]
    fn strip_modifier_only() {
        assert_eq!(strip_modifiers("namelist:foo{rad}"), "namelist:foo");
    }

    #[test]
    fn single_element_detection() {
        assert!(is_single_element("bar(3)"));
        assert!(!is_single_element("bar(1:3)"));
        assert!(!is_single_element("bar"));
    }

    #[test]
    fn section_sorts_before_its_options() {
        let mut ids = vec![
            SettingId::parse("namelist:foo=bar"),
            SettingId::parse("namelist:foo"),
            SettingId::parse("env=X"),
            SettingId::parse("env"),
        ];
        ids.sort();
        let raw: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(raw, vec!["env", "env=X", "namelist:foo", "namelist:foo=bar"]);
    }

    #[test]
    fn ordering_is_by_section_then_option() {
        // '(' sorts below '=' in raw bytes, so raw-string ordering would put
        // "namelist:foo(1)" before "namelist:foo=bar"; the canonical ordering
        // compares sections first.
        let a = SettingId::parse("namelist:foo=bar");
        let b = SettingId::parse("namelist:foo(1)");
        assert!(a < b);
    }
}
