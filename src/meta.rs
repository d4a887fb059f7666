//! Metadata lookup: resolve the property bag that applies to a setting id.
//!
//! Lookup walks the inheritance chain for duplicated and modified sections: a
//! concrete instance (`namelist:foo{rad}(2)=opt`) first inherits from the
//! bare template (`namelist:foo=opt`), then takes the modified template's own
//! properties (`namelist:foo{rad}=opt`) on top. Titles and array lengths are
//! fixed up so instances do not claim template-only properties.
//!
//! Lookup never fails: an id no metadata entry matches resolves to an empty
//! bag carrying just the id.

use std::collections::BTreeMap;

use crate::ident::{self, SettingId};
use crate::tree::{ConfigTree, MetaTree};
use crate::types::{SettingState, prop};

/// The resolved metadata for one setting: interpreted properties plus opaque
/// pass-through data, and the display namespace assigned at snapshot build.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PropertyBag {
    pub id: SettingId,
    /// Display grouping, e.g. `/app/namelist/foo`. Assigned by the snapshot
    /// builder; orthogonal to trigger logic.
    pub full_ns: Option<String>,
    props: BTreeMap<String, String>,
}

impl PropertyBag {
    pub fn new(id: SettingId) -> Self {
        PropertyBag {
            id,
            full_ns: None,
            props: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.props.insert(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.props.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// All properties, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_compulsory(&self) -> bool {
        self.get(prop::COMPULSORY) == Some(prop::VALUE_TRUE)
    }

    pub fn is_duplicate(&self) -> bool {
        self.get(prop::DUPLICATE) == Some(prop::VALUE_TRUE)
    }

    pub fn trigger(&self) -> Option<&str> {
        self.get(prop::TRIGGER)
    }

    pub fn title(&self) -> Option<&str> {
        self.get(prop::TITLE)
    }

    pub fn value_type(&self) -> Option<&str> {
        self.get(prop::TYPE)
    }
}

/// Resolve the metadata property bag for a setting id.
///
/// The empty id resolves to a bare bag with no further processing, and a
/// missing entry resolves to a bare bag: absence of metadata is not a fault.
pub fn lookup(meta: &MetaTree, setting_id: &SettingId) -> PropertyBag {
    let mut bag = PropertyBag::new(setting_id.clone());
    if setting_id.as_str().is_empty() {
        return bag;
    }

    let (_, option) = setting_id.split();
    let search_option = option.map(ident::strip_duplicate_indices);
    let search_id = ident::strip_duplicate_indices(setting_id.as_str());
    let no_modifier_id = ident::strip_modifiers(&search_id);

    if no_modifier_id != search_id {
        // A modifier is present, e.g. namelist:foo{rad}: inherit the bare
        // template's properties first.
        if let Some(node) = meta.node(&no_modifier_id) {
            for (name, value) in node.props() {
                bag.set(name, value);
            }
            if option.is_none()
                && let Some(title) = bag.get(prop::TITLE)
            {
                let modifier = search_id.replacen(&no_modifier_id, "", 1);
                let title = format!("{title} {modifier}");
                bag.set(prop::TITLE, title);
            }
            if setting_id.as_str() != search_id && bag.contains(prop::DUPLICATE) {
                // An instance cannot inherit being the duplicate template.
                bag.remove(prop::DUPLICATE);
            }
        }
    }

    if let Some(node) = meta.node(&search_id) {
        for (name, value) in node.props() {
            bag.set(name, value);
        }
    }

    if bag.contains(prop::TITLE) {
        match option {
            None => {
                if search_id != setting_id.as_str() {
                    // A duplicated section instance does not steal the
                    // template's title.
                    bag.remove(prop::TITLE);
                }
            }
            Some(option) => {
                let search_option = search_option.as_deref().unwrap_or(option);
                if search_option != option {
                    let index = option.replacen(search_option, "", 1);
                    let title = format!("{} {index}", bag.get(prop::TITLE).unwrap_or_default());
                    bag.set(prop::TITLE, title);
                }
            }
        }
    }

    if bag.contains(prop::LENGTH)
        && let Some(option) = option
        && search_option.as_deref() != Some(option)
        && ident::is_single_element(option)
    {
        // length applies to the whole array, not one element of it.
        bag.remove(prop::LENGTH);
    }

    bag
}

/// Expand `file:*=NAME` wildcard metadata onto every concrete, enabled
/// `file:...` section in the configuration, without overwriting explicit
/// per-file entries.
pub fn expand_file_wildcards(config: &ConfigTree, meta: &mut MetaTree) {
    let file_sections: Vec<String> = config
        .sections()
        .filter(|(name, node)| name.starts_with("file:") && node.state == SettingState::Enabled)
        .map(|(name, _)| name.to_string())
        .collect();

    let wildcard_entries: Vec<(String, Vec<(String, String)>)> = meta
        .ids()
        .filter(|id| id.starts_with("file:*="))
        .map(String::from)
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|id| {
            let props: Vec<(String, String)> = meta
                .node(&id)?
                .props()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            Some((id, props))
        })
        .collect();

    for section in &file_sections {
        for (wildcard_id, props) in &wildcard_entries {
            let option = wildcard_id
                .strip_prefix("file:*=")
                .expect("filtered on prefix");
            let new_id = format!("{section}={option}");
            for (name, value) in props {
                if meta.prop(&new_id, name).is_none() {
                    meta.set(&new_id, name, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MetaTree {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo", "title", "Foo");
        meta.set("namelist:foo", "duplicate", "true");
        meta.set("namelist:foo", "ns", "physics/foo");
        meta.set("namelist:foo=bar", "type", "integer");
        meta.set("namelist:foo=bar", "title", "Bar");
        meta.set("namelist:foo=bar", "compulsory", "true");
        meta.set("namelist:foo=values", "length", ":");
        meta.set("namelist:foo=values", "title", "Values");
        meta.set("namelist:foo{rad}", "title", "Radiation");
        meta.set("namelist:foo{rad}=bar", "type", "real");
        meta
    }

    #[test]
    fn empty_id_resolves_to_bare_bag() {
        let bag = lookup(&meta(), &SettingId::parse(""));
        assert_eq!(bag.id.as_str(), "");
        assert_eq!(bag.iter().count(), 0);
    }

    #[test]
    fn missing_entry_resolves_to_bare_bag() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:nope=x"));
        assert_eq!(bag.id.as_str(), "namelist:nope=x");
        assert_eq!(bag.iter().count(), 0);
    }

    #[test]
    fn direct_lookup() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo=bar"));
        assert_eq!(bag.value_type(), Some("integer"));
        assert!(bag.is_compulsory());
        assert_eq!(bag.title(), Some("Bar"));
    }

    #[test]
    fn duplicate_instance_inherits_template_options() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo(2)=bar"));
        assert_eq!(bag.value_type(), Some("integer"));
        assert!(bag.is_compulsory());
        assert_eq!(bag.id.as_str(), "namelist:foo(2)=bar");
    }

    #[test]
    fn duplicate_instance_section_drops_title() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo(2)"));
        assert!(bag.title().is_none());
        assert!(bag.is_duplicate());
    }

    #[test]
    fn modifier_section_inherits_and_appends_title() {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo", "title", "Foo");
        meta.set("namelist:foo", "type", "x");
        let bag = lookup(&meta, &SettingId::parse("namelist:foo{rad}"));
        assert_eq!(bag.title(), Some("Foo {rad}"));
        assert_eq!(bag.value_type(), Some("x"));
    }

    #[test]
    fn modifier_own_entry_wins_over_template() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo{rad}=bar"));
        assert_eq!(bag.value_type(), Some("real"));
        // compulsory still inherited from the bare template entry.
        assert!(bag.is_compulsory());
    }

    #[test]
    fn modified_instance_does_not_inherit_duplicate() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo{rad}(1)"));
        assert!(!bag.is_duplicate());
    }

    #[test]
    fn array_element_title_gets_index_marker() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo=values(3)"));
        assert_eq!(bag.title(), Some("Values (3)"));
    }

    #[test]
    fn array_element_drops_length() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo=values(3)"));
        assert!(!bag.contains(prop::LENGTH));
    }

    #[test]
    fn array_slice_keeps_length() {
        let bag = lookup(&meta(), &SettingId::parse("namelist:foo=values"));
        assert_eq!(bag.get(prop::LENGTH), Some(":"));
    }

    #[test]
    fn ignored_metadata_entry_is_skipped() {
        let mut m = meta();
        m.set_node_ignored("namelist:foo=bar", true);
        let bag = lookup(&m, &SettingId::parse("namelist:foo=bar"));
        assert_eq!(bag.value_type(), None);
    }

    #[test]
    fn unknown_properties_pass_through() {
        let mut m = MetaTree::new();
        m.set("env=A", "widget[custom]", "SpinnerValueWidget");
        let bag = lookup(&m, &SettingId::parse("env=A"));
        assert_eq!(bag.get("widget[custom]"), Some("SpinnerValueWidget"));
    }

    #[test]
    fn wildcard_expansion_copies_onto_real_file_sections() {
        let mut config = ConfigTree::new();
        config.set_value("file:data", "source", "x");
        config.set_value("file:other", "source", "y");
        let mut meta = MetaTree::new();
        meta.set("file:*=source", "type", "file_list");
        expand_file_wildcards(&config, &mut meta);
        assert_eq!(meta.prop("file:data=source", "type"), Some("file_list"));
        assert_eq!(meta.prop("file:other=source", "type"), Some("file_list"));
    }

    #[test]
    fn wildcard_expansion_keeps_explicit_entries() {
        let mut config = ConfigTree::new();
        config.set_value("file:data", "source", "x");
        let mut meta = MetaTree::new();
        meta.set("file:*=source", "type", "file_list");
        meta.set("file:data=source", "type", "explicit");
        expand_file_wildcards(&config, &mut meta);
        assert_eq!(meta.prop("file:data=source", "type"), Some("explicit"));
    }

    #[test]
    fn wildcard_expansion_skips_ignored_file_sections() {
        let mut config = ConfigTree::new();
        config.set_value("file:data", "source", "x");
        config.set_section_state("file:data", SettingState::UserIgnored);
        let mut meta = MetaTree::new();
        meta.set("file:*=source", "type", "file_list");
        expand_file_wildcards(&config, &mut meta);
        assert!(meta.prop("file:data=source", "type").is_none());
    }
}
