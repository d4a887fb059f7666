//! In-memory input representations handed over by the (external) loaders.
//!
//! [`ConfigTree`] mirrors one live configuration: named sections holding
//! option nodes, each with a string value, a stored [`SettingState`], and
//! comments. Top-level options that sit outside any named section live in the
//! reserved root section `""`, which always exists conceptually.
//!
//! [`MetaTree`] mirrors the metadata schema: one property bag per setting id,
//! where both whole entries and individual properties can be marked ignored.
//!
//! [`ConfigView`] is the small capability set the trigger evaluator is
//! written against, so the same rule engine runs over a raw tree at load time
//! and over the live snapshot during incremental updates.

use std::collections::BTreeMap;

use crate::ident::SettingId;
use crate::types::SettingState;

/// One option's stored value and state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionNode {
    pub value: String,
    pub state: SettingState,
    pub comments: Vec<String>,
}

/// One section's stored state and options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionNode {
    pub state: SettingState,
    pub comments: Vec<String>,
    pub options: BTreeMap<String, OptionNode>,
}

/// A whole configuration, as handed over by the external loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    pub comments: Vec<String>,
    sections: BTreeMap<String, SectionNode>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a section node. Top-level options go in section `""`.
    pub fn add_section(&mut self, name: &str) -> &mut SectionNode {
        self.sections.entry(name.to_string()).or_default()
    }

    /// Set an option's value, creating the section and option as needed.
    pub fn set_value(&mut self, section: &str, option: &str, value: &str) {
        let node = self
            .add_section(section)
            .options
            .entry(option.to_string())
            .or_default();
        node.value = value.to_string();
    }

    pub fn set_option_state(&mut self, section: &str, option: &str, state: SettingState) {
        if let Some(node) = self
            .sections
            .get_mut(section)
            .and_then(|s| s.options.get_mut(option))
        {
            node.state = state;
        }
    }

    pub fn set_section_state(&mut self, section: &str, state: SettingState) {
        self.add_section(section).state = state;
    }

    pub fn section(&self, name: &str) -> Option<&SectionNode> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &SectionNode)> {
        self.sections.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn option(&self, section: &str, option: &str) -> Option<&OptionNode> {
        self.sections.get(section)?.options.get(option)
    }

    /// The stored state of a setting: an option's own state, or a section's.
    pub fn state(&self, id: &SettingId) -> Option<SettingState> {
        let (section, option) = id.split();
        match option {
            None => self.sections.get(section).map(|node| node.state),
            Some(option) => self.option(section, option).map(|node| node.state),
        }
    }
}

/// The capability set the trigger evaluator needs from a configuration.
///
/// Two variants exist: the raw [`ConfigTree`] (load time) and the live
/// snapshot view (incremental updates). The evaluator never looks behind this
/// interface.
pub trait ConfigView {
    /// All section names, in canonical order. Includes the root section `""`
    /// when it holds options.
    fn section_names(&self) -> Vec<String>;

    /// Option names within one section, in canonical order.
    fn options_of(&self, section: &str) -> Vec<String>;

    /// Whether the setting exists in the live configuration.
    fn contains_id(&self, id: &SettingId) -> bool;

    /// An option's current value; `None` for sections and absent settings.
    fn value_of(&self, id: &SettingId) -> Option<String>;

    /// The stored state, if the setting exists.
    fn state_of(&self, id: &SettingId) -> Option<SettingState>;
}

impl ConfigView for ConfigTree {
    fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    fn options_of(&self, section: &str) -> Vec<String> {
        self.sections
            .get(section)
            .map(|node| node.options.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn contains_id(&self, id: &SettingId) -> bool {
        let (section, option) = id.split();
        match option {
            None => self.sections.contains_key(section),
            Some(option) => self.option(section, option).is_some(),
        }
    }

    fn value_of(&self, id: &SettingId) -> Option<String> {
        let (section, option) = id.split();
        self.option(section, option?).map(|node| node.value.clone())
    }

    fn state_of(&self, id: &SettingId) -> Option<SettingState> {
        self.state(id)
    }
}

/// One metadata property value. Ignored properties are kept but skipped by
/// every lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaProp {
    pub value: String,
    pub ignored: bool,
}

/// The metadata entry for one setting id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaNode {
    pub ignored: bool,
    props: BTreeMap<String, MetaProp>,
}

impl MetaNode {
    /// A property value, skipping ignored properties.
    pub fn prop(&self, name: &str) -> Option<&str> {
        let prop = self.props.get(name)?;
        (!prop.ignored).then_some(prop.value.as_str())
    }

    /// All non-ignored properties, in name order.
    pub fn props(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props
            .iter()
            .filter(|(_, prop)| !prop.ignored)
            .map(|(name, prop)| (name.as_str(), prop.value.as_str()))
    }

    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        self.props.insert(
            name.to_string(),
            MetaProp {
                value: value.to_string(),
                ignored: false,
            },
        );
        self
    }

    pub fn set_prop_ignored(&mut self, name: &str, ignored: bool) {
        if let Some(prop) = self.props.get_mut(name) {
            prop.ignored = ignored;
        }
    }
}

/// A whole metadata schema, keyed by setting id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTree {
    entries: BTreeMap<String, MetaNode>,
}

impl MetaTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the entry for a setting id.
    pub fn entry(&mut self, id: &str) -> &mut MetaNode {
        self.entries.entry(id.to_string()).or_default()
    }

    /// Set one property on one entry, creating the entry as needed.
    pub fn set(&mut self, id: &str, name: &str, value: &str) {
        self.entry(id).set(name, value);
    }

    pub fn set_node_ignored(&mut self, id: &str, ignored: bool) {
        self.entry(id).ignored = ignored;
    }

    /// The entry for an id, skipping ignored entries.
    pub fn node(&self, id: &str) -> Option<&MetaNode> {
        let node = self.entries.get(id)?;
        (!node.ignored).then_some(node)
    }

    /// One property of one entry, skipping ignored entries and properties.
    pub fn prop(&self, id: &str, name: &str) -> Option<&str> {
        self.node(id)?.prop(name)
    }

    /// Non-ignored entry ids, in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, node)| !node.ignored)
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigTree {
        let mut config = ConfigTree::new();
        config.set_value("namelist:foo", "bar", "5");
        config.set_value("namelist:foo", "switch", "on");
        config.set_value("", "top_opt", "x");
        config.add_section("env");
        config
    }

    #[test]
    fn set_value_creates_section_and_option() {
        let config = sample();
        assert_eq!(config.option("namelist:foo", "bar").unwrap().value, "5");
    }

    #[test]
    fn root_options_live_in_empty_section() {
        let config = sample();
        assert_eq!(config.option("", "top_opt").unwrap().value, "x");
        assert!(config.section_names().contains(&String::new()));
    }

    #[test]
    fn section_names_are_sorted() {
        let config = sample();
        assert_eq!(config.section_names(), vec!["", "env", "namelist:foo"]);
    }

    #[test]
    fn options_of_missing_section_is_empty() {
        assert!(sample().options_of("nope").is_empty());
    }

    #[test]
    fn contains_id_for_sections_and_options() {
        let config = sample();
        assert!(config.contains_id(&SettingId::parse("env")));
        assert!(config.contains_id(&SettingId::parse("namelist:foo=bar")));
        assert!(!config.contains_id(&SettingId::parse("namelist:foo=missing")));
        assert!(!config.contains_id(&SettingId::parse("namelist:other")));
    }

    #[test]
    fn value_of_section_is_none() {
        let config = sample();
        assert_eq!(config.value_of(&SettingId::parse("env")), None);
        assert_eq!(
            config.value_of(&SettingId::parse("namelist:foo=switch")),
            Some("on".to_string())
        );
    }

    #[test]
    fn state_tracks_option_and_section() {
        let mut config = sample();
        config.set_option_state("namelist:foo", "bar", SettingState::UserIgnored);
        config.set_section_state("env", SettingState::TriggerIgnored);
        assert_eq!(
            config.state(&SettingId::parse("namelist:foo=bar")),
            Some(SettingState::UserIgnored)
        );
        assert_eq!(
            config.state(&SettingId::parse("env")),
            Some(SettingState::TriggerIgnored)
        );
        assert_eq!(config.state(&SettingId::parse("missing")), None);
    }

    #[test]
    fn meta_ignored_entry_is_invisible() {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo=bar", "type", "integer");
        meta.set_node_ignored("namelist:foo=bar", true);
        assert!(meta.node("namelist:foo=bar").is_none());
        assert!(meta.prop("namelist:foo=bar", "type").is_none());
        assert_eq!(meta.ids().count(), 0);
    }

    #[test]
    fn meta_ignored_prop_is_skipped() {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo=bar", "type", "integer");
        meta.set("namelist:foo=bar", "title", "Bar");
        meta.entry("namelist:foo=bar").set_prop_ignored("title", true);
        let node = meta.node("namelist:foo=bar").unwrap();
        assert_eq!(node.prop("type"), Some("integer"));
        assert_eq!(node.prop("title"), None);
        let names: Vec<&str> = node.props().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["type"]);
    }

    #[test]
    fn meta_ids_sorted_and_filtered() {
        let mut meta = MetaTree::new();
        meta.set("b", "title", "B");
        meta.set("a", "title", "A");
        meta.set("c", "title", "C");
        meta.set_node_ignored("b", true);
        let ids: Vec<&str> = meta.ids().collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
