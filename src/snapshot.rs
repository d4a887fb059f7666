//! The in-memory mirror of one live configuration: [`Section`] and
//! [`Variable`] objects split into *real* (present in the configuration) and
//! *latent* (declared by metadata but absent) populations, each with a saved
//! copy taken at load for change detection.
//!
//! Latent variables get a type-appropriate synthesized value so triggers can
//! be evaluated against settings the user has not added yet. Metadata
//! declared against a duplicated-section template is re-targeted onto every
//! concrete instance present in the configuration, so the template itself
//! never shows up as an addable phantom.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::ident::{self, SettingId};
use crate::meta::{self, PropertyBag};
use crate::namespace;
use crate::tree::{ConfigTree, ConfigView, MetaTree};
use crate::types::{DiagnosticKind, IgnoreReason, SettingState, prop, status};

/// Reserved pseudo-sections: structural metadata markers, never real
/// configuration sections and never offered as latent ones.
const RESERVED_SECTIONS: [&str; 2] = ["ns", "file:*"];

/// Shared mutable surface of [`Section`] and [`Variable`], so the reconciler
/// applies one decision table to both.
pub trait SettingNode {
    fn metadata(&self) -> &PropertyBag;
    fn ignored_reason(&self) -> &BTreeMap<IgnoreReason, String>;
    fn ignored_reason_mut(&mut self) -> &mut BTreeMap<IgnoreReason, String>;
    fn error_mut(&mut self) -> &mut BTreeMap<DiagnosticKind, String>;
    fn warning_mut(&mut self) -> &mut BTreeMap<DiagnosticKind, String>;
}

macro_rules! impl_setting_node {
    ($ty:ty) => {
        impl SettingNode for $ty {
            fn metadata(&self) -> &PropertyBag {
                &self.metadata
            }
            fn ignored_reason(&self) -> &BTreeMap<IgnoreReason, String> {
                &self.ignored_reason
            }
            fn ignored_reason_mut(&mut self) -> &mut BTreeMap<IgnoreReason, String> {
                &mut self.ignored_reason
            }
            fn error_mut(&mut self) -> &mut BTreeMap<DiagnosticKind, String> {
                &mut self.error
            }
            fn warning_mut(&mut self) -> &mut BTreeMap<DiagnosticKind, String> {
                &mut self.warning
            }
        }
    };
}

/// One section of the configuration, real or latent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    /// Option names currently present, in order.
    pub options: Vec<String>,
    pub metadata: PropertyBag,
    pub comments: Vec<String>,
    pub ignored_reason: BTreeMap<IgnoreReason, String>,
    pub error: BTreeMap<DiagnosticKind, String>,
    pub warning: BTreeMap<DiagnosticKind, String>,
}

impl Section {
    pub fn new(name: &str, options: Vec<String>, metadata: PropertyBag) -> Self {
        Section {
            name: name.to_string(),
            options,
            metadata,
            comments: Vec::new(),
            ignored_reason: BTreeMap::new(),
            error: BTreeMap::new(),
            warning: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SettingId {
        SettingId::section(&self.name)
    }

    pub fn is_ignored(&self) -> bool {
        !self.ignored_reason.is_empty()
    }

    /// The stored state this section's ignore reasons amount to.
    pub fn state(&self) -> SettingState {
        state_from_reasons(&self.ignored_reason)
    }
}

impl_setting_node!(Section);

/// One option setting, real or latent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    /// The option name within its section.
    pub name: String,
    pub value: String,
    /// The value as of the previous edit, for change detection.
    pub old_value: String,
    pub metadata: PropertyBag,
    /// Auxiliary annotations (e.g. optional-configuration overrides),
    /// carried opaquely.
    pub flags: BTreeMap<String, String>,
    pub comments: Vec<String>,
    pub ignored_reason: BTreeMap<IgnoreReason, String>,
    pub error: BTreeMap<DiagnosticKind, String>,
    pub warning: BTreeMap<DiagnosticKind, String>,
}

impl Variable {
    pub fn new(name: &str, value: &str, metadata: PropertyBag) -> Self {
        Variable {
            name: name.to_string(),
            value: value.to_string(),
            old_value: value.to_string(),
            metadata,
            flags: BTreeMap::new(),
            comments: Vec::new(),
            ignored_reason: BTreeMap::new(),
            error: BTreeMap::new(),
            warning: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &SettingId {
        &self.metadata.id
    }

    pub fn is_ignored(&self) -> bool {
        !self.ignored_reason.is_empty()
    }

    pub fn state(&self) -> SettingState {
        state_from_reasons(&self.ignored_reason)
    }
}

impl_setting_node!(Variable);

fn state_from_reasons(reasons: &BTreeMap<IgnoreReason, String>) -> SettingState {
    if reasons.contains_key(&IgnoreReason::User) {
        SettingState::UserIgnored
    } else if reasons.contains_key(&IgnoreReason::Trigger) {
        SettingState::TriggerIgnored
    } else {
        SettingState::Enabled
    }
}

/// Derive a plausible value for a latent setting from its metadata.
pub fn value_from_metadata(bag: &PropertyBag) -> String {
    if let Some(values) = bag.get(prop::VALUES) {
        return values
            .replace(' ', "")
            .replace(',', " ")
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
    }
    match bag.value_type() {
        Some("logical") => ".false.".to_string(),
        Some("boolean") => "false".to_string(),
        Some("integer") | Some("real") => "0".to_string(),
        _ => String::new(),
    }
}

/// Real and latent sections, with saved copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionMaps {
    pub now: BTreeMap<String, Section>,
    pub latent: BTreeMap<String, Section>,
    pub save: BTreeMap<String, Section>,
    pub latent_save: BTreeMap<String, Section>,
}

impl SectionMaps {
    /// Look a section up in the real population first, then the latent one.
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.now.get(name).or_else(|| self.latent.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Section> {
        match self.now.get_mut(name) {
            Some(section) => Some(section),
            None => self.latent.get_mut(name),
        }
    }
}

/// Real and latent variables keyed by id, with saved copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariableMaps {
    pub now: BTreeMap<SettingId, Variable>,
    pub latent: BTreeMap<SettingId, Variable>,
    pub save: BTreeMap<SettingId, Variable>,
    pub latent_save: BTreeMap<SettingId, Variable>,
}

impl VariableMaps {
    pub fn get(&self, id: &SettingId) -> Option<&Variable> {
        self.now.get(id).or_else(|| self.latent.get(id))
    }

    pub fn get_mut(&mut self, id: &SettingId) -> Option<&mut Variable> {
        match self.now.get_mut(id) {
            Some(var) => Some(var),
            None => self.latent.get_mut(id),
        }
    }

    /// Ids of real and latent variables within one section, in order.
    pub fn ids_in_section(&self, section: &str) -> Vec<SettingId> {
        self.now
            .keys()
            .chain(self.latent.keys())
            .filter(|id| id.section_name() == section)
            .cloned()
            .collect()
    }
}

/// The full mirror of one configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub config_name: String,
    pub sections: SectionMaps,
    pub vars: VariableMaps,
}

impl Snapshot {
    /// Build the mirror for one configuration+metadata pair.
    pub fn build(config: &ConfigTree, meta: &MetaTree, config_name: &str) -> Snapshot {
        let config_name = namespace::normalize_config_name(config_name);
        let mut sections = SectionMaps::default();
        let mut vars = VariableMaps::default();

        for (name, node) in config.sections() {
            let bag = meta::lookup(meta, &SettingId::section(name));
            let mut section = Section::new(name, node.options.keys().cloned().collect(), bag);
            section.comments = node.comments.clone();
            seed_reason(&mut section.ignored_reason, node.state);
            sections.now.insert(name.to_string(), section);
        }
        // The root section always exists and owns any top-level options.
        sections.now.entry(String::new()).or_insert_with(|| {
            Section::new("", Vec::new(), meta::lookup(meta, &SettingId::section("")))
        });

        for id_str in meta.ids() {
            let section = SettingId::parse(id_str).section_name().to_string();
            if sections.now.contains_key(&section)
                || sections.latent.contains_key(&section)
                || RESERVED_SECTIONS.contains(&section.as_str())
            {
                continue;
            }
            let bag = meta::lookup(meta, &SettingId::section(&section));
            sections
                .latent
                .insert(section.clone(), Section::new(&section, Vec::new(), bag));
        }

        let duplicate_map = duplicate_section_map(config);

        let mut real_ids: BTreeSet<SettingId> = BTreeSet::new();
        for (sect_name, sect_node) in config.sections() {
            let section_ignored = sections
                .now
                .get(sect_name)
                .is_some_and(Section::is_ignored);
            for (opt_name, opt_node) in &sect_node.options {
                let id = SettingId::new(sect_name, Some(opt_name));
                let bag = meta::lookup(meta, &id);
                let mut var = Variable::new(opt_name, &opt_node.value, bag);
                var.comments = opt_node.comments.clone();
                if section_ignored {
                    var.ignored_reason
                        .insert(IgnoreReason::Section, status::FROM_CONFIGURATION.to_string());
                }
                seed_reason(&mut var.ignored_reason, opt_node.state);
                real_ids.insert(id.clone());
                vars.now.insert(id, var);
            }
        }

        let mut pending: VecDeque<SettingId> =
            meta.ids().map(SettingId::parse).collect();
        while let Some(id) = pending.pop_front() {
            let (section, option) = id.split();
            if let Some(instances) = duplicate_map.get(section) {
                // Metadata for a duplicated template applies to each concrete
                // instance, never to the template itself.
                for instance in instances {
                    pending.push_front(SettingId::new(instance, option));
                }
                continue;
            }
            let Some(option) = option else { continue };
            if RESERVED_SECTIONS.contains(&section) || real_ids.contains(&id) {
                continue;
            }
            let section = section.to_string();
            let bag = meta::lookup(meta, &id);
            let mut var = Variable::new(option, &value_from_metadata(&bag), bag);
            if sections.get(&section).is_some_and(Section::is_ignored) {
                var.ignored_reason
                    .insert(IgnoreReason::Section, status::FROM_CONFIGURATION.to_string());
            }
            vars.latent.insert(id, var);
        }

        for section in sections.now.values_mut().chain(sections.latent.values_mut()) {
            let ns = namespace::default_namespace_for_section(&section.name, &config_name, meta);
            section.metadata.full_ns = Some(ns);
        }
        for var in vars.now.values_mut().chain(vars.latent.values_mut()) {
            let id = var.metadata.id.clone();
            let ns = namespace::namespace_for_setting(&id, &var.metadata, &config_name, meta);
            var.metadata.full_ns = Some(ns);
        }

        debug!(
            sections = sections.now.len(),
            latent_sections = sections.latent.len(),
            variables = vars.now.len(),
            latent_variables = vars.latent.len(),
            "built configuration snapshot"
        );

        let mut snapshot = Snapshot {
            config_name,
            sections,
            vars,
        };
        snapshot.mark_saved();
        snapshot
    }

    /// A [`ConfigView`] over the real populations, for incremental trigger
    /// evaluation.
    pub fn view(&self) -> SnapshotView<'_> {
        SnapshotView {
            sections: &self.sections.now,
            vars: &self.vars.now,
        }
    }

    /// Refresh the saved copies to the current state.
    pub fn mark_saved(&mut self) {
        self.sections.save = self.sections.now.clone();
        self.sections.latent_save = self.sections.latent.clone();
        self.vars.save = self.vars.now.clone();
        self.vars.latent_save = self.vars.latent.clone();
    }

    /// Ids whose value or ignore state differs from the saved copy, plus ids
    /// added or removed since, in canonical order.
    pub fn modified_ids(&self) -> Vec<SettingId> {
        let mut out: BTreeSet<SettingId> = BTreeSet::new();
        for (id, var) in &self.vars.now {
            match self.vars.save.get(id) {
                None => {
                    out.insert(id.clone());
                }
                Some(saved) => {
                    if saved.value != var.value
                        || saved.ignored_reason.keys().ne(var.ignored_reason.keys())
                    {
                        out.insert(id.clone());
                    }
                }
            }
        }
        for id in self.vars.save.keys() {
            if !self.vars.now.contains_key(id) {
                out.insert(id.clone());
            }
        }
        for (name, section) in &self.sections.now {
            match self.sections.save.get(name) {
                None => {
                    out.insert(SettingId::section(name));
                }
                Some(saved) => {
                    if saved.ignored_reason.keys().ne(section.ignored_reason.keys()) {
                        out.insert(SettingId::section(name));
                    }
                }
            }
        }
        for name in self.sections.save.keys() {
            if !self.sections.now.contains_key(name) {
                out.insert(SettingId::section(name));
            }
        }
        out.into_iter().collect()
    }

    /// Every setting id in the snapshot (sections and variables, real and
    /// latent), in canonical order.
    pub fn setting_ids(&self) -> Vec<SettingId> {
        let mut ids: BTreeSet<SettingId> = BTreeSet::new();
        ids.extend(self.sections.now.keys().map(SettingId::section));
        ids.extend(self.sections.latent.keys().map(SettingId::section));
        ids.extend(self.vars.now.keys().cloned());
        ids.extend(self.vars.latent.keys().cloned());
        ids.into_iter().collect()
    }

    /// Whether an id addresses a latent (metadata-only) setting.
    pub fn is_latent(&self, id: &SettingId) -> bool {
        let (section, option) = id.split();
        match option {
            None => !self.sections.now.contains_key(section),
            Some(_) => !self.vars.now.contains_key(id),
        }
    }

    /// Mutable access to the section or variable a setting id addresses,
    /// searching real then latent populations.
    pub fn node_mut(&mut self, id: &SettingId) -> Option<&mut dyn SettingNode> {
        if id.is_section() {
            self.sections
                .get_mut(id.section_name())
                .map(|s| s as &mut dyn SettingNode)
        } else {
            self.vars.get_mut(id).map(|v| v as &mut dyn SettingNode)
        }
    }
}

fn seed_reason(reasons: &mut BTreeMap<IgnoreReason, String>, state: SettingState) {
    match state {
        SettingState::Enabled => {}
        SettingState::UserIgnored => {
            reasons.insert(IgnoreReason::User, status::FROM_CONFIGURATION.to_string());
        }
        SettingState::TriggerIgnored => {
            reasons.insert(IgnoreReason::Trigger, status::FROM_CONFIGURATION.to_string());
        }
    }
}

/// Map each duplicated-section base name (`namelist:foo`, and the modified
/// form `namelist:foo{rad}` when present) to its concrete instances, by exact
/// suffix-stripped matching.
pub fn duplicate_section_map(view: &dyn ConfigView) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for section in view.section_names() {
        let basic = ident::strip_section_suffix(&section);
        if basic != section {
            map.entry(basic.clone()).or_default().push(section.clone());
            let modified = ident::strip_duplicate_indices(&section);
            if modified != basic && modified != section {
                map.entry(modified).or_default().push(section.clone());
            }
        }
    }
    map
}

/// A [`ConfigView`] over a snapshot's real sections and variables.
pub struct SnapshotView<'a> {
    sections: &'a BTreeMap<String, Section>,
    vars: &'a BTreeMap<SettingId, Variable>,
}

impl ConfigView for SnapshotView<'_> {
    fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    fn options_of(&self, section: &str) -> Vec<String> {
        self.vars
            .values()
            .filter(|var| var.id().section_name() == section)
            .map(|var| var.name.clone())
            .collect()
    }

    fn contains_id(&self, id: &SettingId) -> bool {
        match id.option() {
            None => self.sections.contains_key(id.section_name()),
            Some(_) => self.vars.contains_key(id),
        }
    }

    fn value_of(&self, id: &SettingId) -> Option<String> {
        self.vars.get(id).map(|var| var.value.clone())
    }

    fn state_of(&self, id: &SettingId) -> Option<SettingState> {
        match id.option() {
            None => self.sections.get(id.section_name()).map(Section::state),
            Some(_) => self.vars.get(id).map(Variable::state),
        }
    }
}
