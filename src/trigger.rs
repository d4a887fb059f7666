//! The trigger evaluator: the rule engine that decides, from metadata trigger
//! declarations and current values, which settings must be enabled and which
//! must be trigger-ignored.
//!
//! The evaluator keeps three tables:
//!
//! - the *family* table: parent id -> (target id -> permitted values), built
//!   once from the metadata's `trigger` properties;
//! - the *enabled* table: target id -> (parent id -> explanation) for targets
//!   whose parents currently satisfy them;
//! - the *ignored* table: same shape, for targets whose parents currently
//!   ignore them.
//!
//! Structural problems in the declarations (unknown ids, cycles, duplicate
//! sections triggering across sections, empty expressions) are found by
//! [`TriggerEvaluator::validate`] before any state is transformed; on failure
//! the whole configuration's trigger handling is suspended rather than
//! partially applied.
//!
//! Triggers declared against a duplicated-section template fan out to every
//! concrete instance through an explicit duplicate-family index; instance
//! matching is exact on the suffix-stripped base name, never a string-prefix
//! test.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::error::StructuralError;
use crate::expr::{self, parse_trigger_expression};
use crate::ident::{self, SettingId};
use crate::snapshot::duplicate_section_map;
use crate::tree::{ConfigView, MetaTree};
use crate::types::{ChangeReport, SettingState, ValueSet, prop};

/// Parent id -> human explanation of what that parent decided.
pub type ParentMap = BTreeMap<SettingId, String>;

/// The current value of a trigger parent, as the evaluator sees it.
enum ParentValue {
    /// Absent from the configuration, or itself ignored upstream.
    Unavailable,
    /// A present section, which has no value of its own.
    SectionPresent,
    Value(String),
}

enum Outcome {
    Enable(String),
    Ignore(String),
}

#[derive(Debug, Default)]
pub struct TriggerEvaluator {
    family: BTreeMap<SettingId, BTreeMap<SettingId, ValueSet>>,
    enabled: BTreeMap<SettingId, ParentMap>,
    ignored: BTreeMap<SettingId, ParentMap>,
    /// Every id that appears in any trigger declaration, as parent or target.
    involved: BTreeSet<SettingId>,
    duplicate_cache: HashMap<SettingId, bool>,
}

impl TriggerEvaluator {
    /// Build the family table from the metadata's `trigger` properties.
    pub fn new(meta: &MetaTree) -> Self {
        let mut family: BTreeMap<SettingId, BTreeMap<SettingId, ValueSet>> = BTreeMap::new();
        for id in meta.ids() {
            if let Some(expression) = meta.prop(id, prop::TRIGGER) {
                family.insert(SettingId::parse(id), parse_trigger_expression(expression));
            }
        }
        let mut involved: BTreeSet<SettingId> = family.keys().cloned().collect();
        involved.extend(family.values().flat_map(|targets| targets.keys().cloned()));
        debug!(parents = family.len(), involved = involved.len(), "trigger families loaded");
        TriggerEvaluator {
            family,
            enabled: BTreeMap::new(),
            ignored: BTreeMap::new(),
            involved,
            duplicate_cache: HashMap::new(),
        }
    }

    /// Parent -> targets, as declared.
    pub fn family(&self) -> &BTreeMap<SettingId, BTreeMap<SettingId, ValueSet>> {
        &self.family
    }

    pub fn enabled(&self) -> &BTreeMap<SettingId, ParentMap> {
        &self.enabled
    }

    pub fn ignored(&self) -> &BTreeMap<SettingId, ParentMap> {
        &self.ignored
    }

    pub fn enabled_parents(&self, id: &SettingId) -> Option<&ParentMap> {
        self.enabled.get(id)
    }

    pub fn ignored_parents(&self, id: &SettingId) -> Option<&ParentMap> {
        self.ignored.get(id)
    }

    /// Whether any trigger declaration mentions this id.
    pub fn is_involved(&self, id: &SettingId) -> bool {
        self.involved.contains(id)
    }

    /// Drop every table. Used when structural validation fails: no
    /// trigger-derived state may survive for the configuration.
    pub fn clear(&mut self) {
        self.family.clear();
        self.enabled.clear();
        self.ignored.clear();
        self.involved.clear();
        self.duplicate_cache.clear();
    }

    /// The state the current tables imply for a setting. When conflicting
    /// triggers put an id in both tables, enabled wins; the reconciler
    /// surfaces the conflict separately.
    pub fn implied_state(&self, id: &SettingId) -> SettingState {
        if self.ignored.contains_key(id) && !self.enabled.contains_key(id) {
            SettingState::TriggerIgnored
        } else {
            SettingState::Enabled
        }
    }

    /// Check the trigger declarations against the metadata: every referenced
    /// id must resolve to a metadata entry, a duplicated section may only
    /// trigger within itself, expressions must name at least one target, and
    /// the dependency graph must be acyclic.
    pub fn validate(&mut self, meta: &MetaTree) -> Result<(), StructuralError> {
        let meta_ids: BTreeSet<&str> = meta.ids().collect();
        let declared: Vec<(SettingId, Vec<SettingId>)> = self
            .family
            .iter()
            .map(|(parent, targets)| (parent.clone(), targets.keys().cloned().collect()))
            .collect();

        for (parent, targets) in &declared {
            if targets.is_empty() {
                return Err(StructuralError::BadExpression(parent.to_string()));
            }
            let parent_base = self.stripped_id(parent, meta);
            if !meta_ids.contains(parent_base.as_str()) {
                return Err(StructuralError::MissingMetadata(parent.clone()));
            }
            let parent_is_duplicate = self.is_duplicate_id(parent, meta);
            for target in targets {
                if target.as_str().is_empty() {
                    return Err(StructuralError::BadExpression(parent.to_string()));
                }
                if parent_is_duplicate && target.section_name() != parent.section_name() {
                    return Err(StructuralError::DuplicateSectionTrigger(
                        parent.section_name().to_string(),
                    ));
                }
                let target_base = self.stripped_id(target, meta);
                if !meta_ids.contains(target_base.as_str()) {
                    return Err(StructuralError::MissingMetadata(target.clone()));
                }
            }
        }

        self.find_cycle()
    }

    /// Depth-first search over the declared dependency graph; reports the
    /// first back edge found.
    fn find_cycle(&self) -> Result<(), StructuralError> {
        const IN_PROGRESS: u8 = 1;
        const DONE: u8 = 2;
        let mut state: BTreeMap<&SettingId, u8> = BTreeMap::new();

        for root in self.family.keys() {
            if state.contains_key(root) {
                continue;
            }
            state.insert(root, IN_PROGRESS);
            let mut stack: Vec<(&SettingId, Vec<&SettingId>, usize)> =
                vec![(root, self.family[root].keys().collect(), 0)];
            while !stack.is_empty() {
                let top = stack.len() - 1;
                let frame = &mut stack[top];
                if frame.2 >= frame.1.len() {
                    state.insert(frame.0, DONE);
                    stack.pop();
                    continue;
                }
                let node = frame.0;
                let child = frame.1[frame.2];
                frame.2 += 1;
                match state.get(child) {
                    Some(&IN_PROGRESS) => {
                        return Err(StructuralError::CyclicDependency {
                            parent: node.clone(),
                            child: child.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        if let Some(grandchildren) = self.family.get(child) {
                            state.insert(child, IN_PROGRESS);
                            stack.push((child, grandchildren.keys().collect(), 0));
                        } else {
                            state.insert(child, DONE);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Full evaluation: rebuild the enabled/ignored tables from scratch
    /// against the given view, walking parents in canonical id order, and
    /// report every setting whose stored state disagrees with the implied
    /// one.
    pub fn transform(&mut self, view: &dyn ConfigView, meta: &MetaTree) -> Vec<ChangeReport> {
        self.enabled.clear();
        self.ignored.clear();
        let parents: Vec<SettingId> = self.family.keys().cloned().collect();
        for parent in &parents {
            self.update(parent, view, meta);
        }
        debug!(
            enabled = self.enabled.len(),
            ignored = self.ignored.len(),
            "trigger transform complete"
        );

        let mut reports = Vec::new();
        for section in view.section_names() {
            let mut ids = vec![SettingId::section(&section)];
            ids.extend(
                view.options_of(&section)
                    .iter()
                    .map(|option| SettingId::new(&section, Some(option.as_str()))),
            );
            for id in ids {
                let stored = view.state_of(&id).unwrap_or_default();
                let implied = if self.ignored.contains_key(&id) && !self.enabled.contains_key(&id)
                {
                    SettingState::TriggerIgnored
                } else if stored == SettingState::TriggerIgnored {
                    SettingState::Enabled
                } else if stored == SettingState::UserIgnored && self.involved.contains(&id) {
                    SettingState::Enabled
                } else {
                    stored
                };
                if implied != stored {
                    reports.push(ChangeReport {
                        id,
                        from: stored,
                        to: implied,
                    });
                }
            }
        }
        reports
    }

    /// Scoped evaluation: re-walk only the settings reachable from `start`,
    /// updating the enabled/ignored tables for that set. Returns every id
    /// visited, in walk order (callers dedupe and sort as needed).
    pub fn update(
        &mut self,
        start: &SettingId,
        view: &dyn ConfigView,
        meta: &MetaTree,
    ) -> Vec<SettingId> {
        let duplicate_map = duplicate_section_map(view);
        let section_names: BTreeSet<String> = view.section_names().into_iter().collect();

        let mut start_ids = self.id_duplicates(start, &duplicate_map, meta);
        if start_ids.is_empty() {
            start_ids.push(start.clone());
        }

        let mut stack: Vec<(SettingId, bool)> = Vec::new();
        for sid in start_ids {
            let mut has_ignored_parent = true;
            if self.enabled.contains_key(&sid) && !self.ignored.contains_key(&sid) {
                has_ignored_parent = false;
            }
            if !self.is_trigger_target(&sid) {
                has_ignored_parent = false;
            }
            if sid.option().is_some() && self.ignored.contains_key(&sid.owning_section()) {
                has_ignored_parent = true;
            }
            if !view.contains_id(&sid) {
                has_ignored_parent = true;
            }
            stack.push((sid, has_ignored_parent));
        }

        let mut update_ids: Vec<SettingId> = Vec::new();
        while !stack.is_empty() {
            let (front_id, has_ignored_parent) = stack[0].clone();
            let mut this_id = front_id;
            let mut alternates = self.id_duplicates(&this_id, &duplicate_map, meta);
            if !alternates.is_empty() {
                this_id = alternates.remove(0);
                for (offset, alternate) in alternates.into_iter().enumerate() {
                    stack.insert(1 + offset, (alternate, has_ignored_parent));
                }
            }

            if this_id.is_section() && section_names.contains(this_id.as_str()) {
                // A walked section pulls its trigger-declaring options along,
                // so their own dependents are re-examined too.
                for option in view.options_of(this_id.as_str()) {
                    let member = SettingId::new(this_id.as_str(), Some(option.as_str()));
                    if self.family.contains_key(&member) {
                        stack.insert(1, (member, has_ignored_parent));
                    }
                }
            }

            update_ids.push(this_id.clone());
            if !self.is_trigger_parent(&this_id, meta) {
                stack.remove(0);
                continue;
            }

            let value = if has_ignored_parent {
                ParentValue::Unavailable
            } else if this_id.is_section() {
                if view.contains_id(&this_id) {
                    ParentValue::SectionPresent
                } else {
                    ParentValue::Unavailable
                }
            } else {
                match view.value_of(&this_id) {
                    Some(value) => ParentValue::Value(value),
                    None => ParentValue::Unavailable,
                }
            };

            for (target_id, permitted) in self.family_targets(&this_id, &duplicate_map, meta) {
                let outcome = decide(&this_id, &value, &permitted);
                match outcome {
                    Outcome::Ignore(help) => {
                        self.ignored
                            .entry(target_id.clone())
                            .or_default()
                            .insert(this_id.clone(), help);
                        if let Some(parents) = self.enabled.get_mut(&target_id) {
                            parents.remove(&this_id);
                            if parents.is_empty() {
                                self.enabled.remove(&target_id);
                            }
                        }
                        stack.insert(1, (target_id, true));
                    }
                    Outcome::Enable(help) => {
                        self.enabled
                            .entry(target_id.clone())
                            .or_default()
                            .insert(this_id.clone(), help);
                        if let Some(parents) = self.ignored.get_mut(&target_id) {
                            parents.remove(&this_id);
                            if parents.is_empty() {
                                self.ignored.remove(&target_id);
                            }
                        }
                        stack.insert(1, (target_id, false));
                    }
                }
            }
            stack.remove(0);
        }
        update_ids
    }

    /// Cache the current value of every id some trigger reads, fanning
    /// duplicated-template parents out to their concrete instances. The
    /// update propagator consults this to decide whether an edit can change
    /// any trigger outcome at all.
    pub fn value_cache(
        &self,
        view: &dyn ConfigView,
        meta: &MetaTree,
    ) -> BTreeMap<SettingId, Option<String>> {
        let duplicate_map = duplicate_section_map(view);
        let mut cache: BTreeMap<SettingId, Option<String>> = BTreeMap::new();
        let mut pending: Vec<SettingId> = self.family.keys().cloned().collect();
        while let Some(id) = pending.pop() {
            cache.insert(id.clone(), view.value_of(&id));
            let (section, option) = id.split();
            if section.ends_with(')') {
                // Already a concrete instance.
                continue;
            }
            if meta.prop(section, prop::DUPLICATE) == Some(prop::VALUE_TRUE)
                && let Some(instances) = duplicate_map.get(section)
            {
                for instance in instances {
                    pending.push(SettingId::new(instance, option));
                }
            }
        }
        cache
    }

    /// The declared targets of a parent, adjusted for duplicated sections:
    /// a concrete-instance parent re-targets same-section targets onto its
    /// own section; a template parent fans each target out to its instances.
    fn family_targets(
        &mut self,
        this_id: &SettingId,
        duplicate_map: &BTreeMap<String, Vec<String>>,
        meta: &MetaTree,
    ) -> Vec<(SettingId, ValueSet)> {
        if self.is_duplicate_id(this_id, meta) {
            let (section, option) = this_id.split();
            let section = section.to_string();
            let base_section = ident::strip_section_suffix(&section);
            let template_id = SettingId::new(&base_section, option);
            let declared: Vec<(SettingId, ValueSet)> = self
                .family
                .get(&template_id)
                .map(|targets| {
                    targets
                        .iter()
                        .map(|(id, values)| (id.clone(), values.clone()))
                        .collect()
                })
                .unwrap_or_default();
            declared
                .into_iter()
                .map(|(target, values)| {
                    let (target_section, target_option) = target.split();
                    if ident::strip_section_suffix(target_section) == base_section {
                        (SettingId::new(&section, target_option), values)
                    } else {
                        (target, values)
                    }
                })
                .collect()
        } else {
            let declared: Vec<(SettingId, ValueSet)> = self
                .family
                .get(this_id)
                .map(|targets| {
                    targets
                        .iter()
                        .map(|(id, values)| (id.clone(), values.clone()))
                        .collect()
                })
                .unwrap_or_default();
            let mut out = Vec::new();
            for (target, values) in declared {
                let instances = self.id_duplicates(&target, duplicate_map, meta);
                if instances.is_empty() {
                    out.push((target, values));
                } else {
                    for instance in instances {
                        out.push((instance, values.clone()));
                    }
                }
            }
            out
        }
    }

    /// The concrete-instance ids a duplicated-template id expands to; empty
    /// for ordinary ids and for ids that are already concrete instances.
    fn id_duplicates(
        &mut self,
        id: &SettingId,
        duplicate_map: &BTreeMap<String, Vec<String>>,
        meta: &MetaTree,
    ) -> Vec<SettingId> {
        if !self.is_duplicate_id(id, meta) {
            return Vec::new();
        }
        let (section, option) = id.split();
        duplicate_map
            .get(section)
            .map(|instances| {
                instances
                    .iter()
                    .map(|instance| SettingId::new(instance, option))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the id's suffix-stripped section is marked `duplicate=true`.
    fn is_duplicate_id(&mut self, id: &SettingId, meta: &MetaTree) -> bool {
        if let Some(&known) = self.duplicate_cache.get(id) {
            return known;
        }
        let base_section = ident::strip_section_suffix(id.section_name());
        let result = meta.prop(&base_section, prop::DUPLICATE) == Some(prop::VALUE_TRUE);
        self.duplicate_cache.insert(id.clone(), result);
        result
    }

    /// Map a duplicated-instance id back to its template; identity otherwise.
    fn stripped_id(&mut self, id: &SettingId, meta: &MetaTree) -> SettingId {
        if self.is_duplicate_id(id, meta) {
            id.base()
        } else {
            id.clone()
        }
    }

    /// Whether this id (template-stripped) declares a trigger.
    pub fn is_trigger_parent(&mut self, id: &SettingId, meta: &MetaTree) -> bool {
        let stripped = self.stripped_id(id, meta);
        self.family.contains_key(&stripped)
    }

    /// Whether this exact id is the target of any declared trigger.
    fn is_trigger_target(&self, id: &SettingId) -> bool {
        self.family.values().any(|targets| targets.contains_key(id))
    }
}

fn decide(parent: &SettingId, value: &ParentValue, permitted: &ValueSet) -> Outcome {
    match value {
        ParentValue::Unavailable => Outcome::Ignore(format!("from state of parent: {parent}")),
        ParentValue::SectionPresent => match permitted {
            ValueSet::Any => Outcome::Enable(format!("from presence of parent: {parent}")),
            ValueSet::OneOf(_) => Outcome::Ignore(format!(
                "from parent value: {parent} is a section without a value, not {permitted}"
            )),
        },
        ParentValue::Value(value) => {
            if permitted.permits(value) || expr::contains_env_reference(value) {
                Outcome::Enable(format!("from parent value: {parent} = {value}"))
            } else {
                match permitted {
                    ValueSet::OneOf(values) if values.len() > 1 => Outcome::Ignore(format!(
                        "from parent value: {parent} with value {value} is not in the allowed values: {permitted}"
                    )),
                    _ => Outcome::Ignore(format!(
                        "from parent value: {parent} is not {permitted} (value {value})"
                    )),
                }
            }
        }
    }
}
