//! One loaded configuration and all of its trigger state, behind an explicit
//! handle.
//!
//! A [`Session`] owns the configuration tree, the (wildcard-expanded)
//! metadata, the snapshot, the trigger tables, and the trigger-value cache.
//! Multiple configurations are modelled as independent sibling sessions; the
//! engine is single-threaded and synchronous, so a session expects one
//! logical thread of control to drive all mutations.
//!
//! [`Session::set_value`] is the update propagator: it re-evaluates only the
//! settings reachable from one changed setting and returns their ids so the
//! caller knows what to redraw. [`Session::refresh`] re-runs the whole
//! pipeline; [`Session::reset`] drops all trigger-derived state.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{EngineError, StructuralError};
use crate::ident::SettingId;
use crate::reconcile;
use crate::report::{self, SettingReport};
use crate::resolve::{self, ResolveInput};
use crate::snapshot::Snapshot;
use crate::tree::{ConfigTree, MetaTree};
use crate::trigger::TriggerEvaluator;
use crate::types::ChangeReport;

/// Entry point for loading a configuration session.
pub struct SessionBuilder {
    name: String,
    config: ConfigTree,
    meta: MetaTree,
}

impl SessionBuilder {
    fn new() -> Self {
        SessionBuilder {
            name: "config".to_string(),
            config: ConfigTree::new(),
            meta: MetaTree::new(),
        }
    }

    /// The configuration's display name; becomes the namespace root.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn config(mut self, config: ConfigTree) -> Self {
        self.config = config;
        self
    }

    pub fn metadata(mut self, meta: MetaTree) -> Self {
        self.meta = meta;
        self
    }

    /// Run the full pipeline and hand back the loaded session.
    pub fn load(self) -> Session {
        let resolution = resolve::resolve(ResolveInput {
            config: &self.config,
            meta: &self.meta,
            config_name: &self.name,
        });
        Session {
            name: self.name,
            config: self.config,
            source_meta: self.meta,
            meta: resolution.meta,
            snapshot: resolution.snapshot,
            evaluator: resolution.evaluator,
            value_cache: resolution.value_cache,
            structural: resolution.structural,
            changes: resolution.changes,
        }
    }
}

/// One loaded configuration with its evaluated trigger state.
pub struct Session {
    name: String,
    config: ConfigTree,
    /// The metadata as handed over, before wildcard expansion.
    source_meta: MetaTree,
    /// The metadata the engine evaluates against (wildcards expanded).
    meta: MetaTree,
    snapshot: Snapshot,
    evaluator: TriggerEvaluator,
    value_cache: BTreeMap<SettingId, Option<String>>,
    structural: Option<StructuralError>,
    changes: Vec<ChangeReport>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    /// The metadata the engine evaluates against (wildcards expanded).
    pub fn metadata(&self) -> &MetaTree {
        &self.meta
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    pub fn evaluator(&self) -> &TriggerEvaluator {
        &self.evaluator
    }

    /// The structural problem that suspended trigger handling, if any.
    pub fn structural_error(&self) -> Option<&StructuralError> {
        self.structural.as_ref()
    }

    /// Stored-versus-implied disagreements found at the last full pass.
    pub fn change_reports(&self) -> &[ChangeReport] {
        &self.changes
    }

    /// Annotated per-setting output for the presentation layer.
    pub fn reports(&self) -> Vec<SettingReport> {
        report::reports_for(&self.snapshot)
    }

    /// Re-run the full pipeline against the current configuration tree.
    pub fn refresh(&mut self) {
        let resolution = resolve::resolve(ResolveInput {
            config: &self.config,
            meta: &self.source_meta,
            config_name: &self.name,
        });
        self.meta = resolution.meta;
        self.snapshot = resolution.snapshot;
        self.evaluator = resolution.evaluator;
        self.value_cache = resolution.value_cache;
        self.structural = resolution.structural;
        self.changes = resolution.changes;
    }

    /// Drop every piece of trigger-derived state. The session keeps its
    /// configuration and metadata; call [`refresh`](Self::refresh) to
    /// re-evaluate.
    pub fn reset(&mut self) {
        self.evaluator.clear();
        self.value_cache.clear();
        self.structural = None;
        self.changes.clear();
    }

    /// Apply one value edit and propagate its trigger consequences.
    ///
    /// Fast path: if no trigger reads the changed setting, or its cached
    /// value already equals the new one, nothing is re-evaluated. Otherwise
    /// only the settings transitively reachable from the changed id are
    /// re-examined and reconciled. Returns the affected ids (in canonical
    /// order) so the caller knows what to redraw.
    pub fn set_value(
        &mut self,
        id: &SettingId,
        new_value: &str,
    ) -> Result<Vec<SettingId>, EngineError> {
        let (section, option) = id.split();
        let Some(option) = option else {
            return Err(EngineError::NotAnOption(id.clone()));
        };
        {
            let var = self
                .snapshot
                .vars
                .now
                .get_mut(id)
                .ok_or_else(|| EngineError::UnknownSetting(id.clone()))?;
            var.old_value = std::mem::replace(&mut var.value, new_value.to_string());
        }
        self.config.set_value(section, option, new_value);

        if self.structural.is_some() {
            debug!(setting = %id, "trigger handling suspended; value stored without propagation");
            return Ok(Vec::new());
        }
        match self.value_cache.get(id) {
            Some(cached) if cached.as_deref() != Some(new_value) => {}
            _ => {
                debug!(setting = %id, "edit cannot change any trigger outcome");
                return Ok(Vec::new());
            }
        }

        let visited = {
            let Session {
                snapshot,
                evaluator,
                meta,
                ..
            } = self;
            evaluator.update(id, &snapshot.view(), meta)
        };
        reconcile::reconcile_updated(&mut self.snapshot, &self.evaluator, &visited, id);

        let mut touched: BTreeSet<SettingId> = visited.iter().cloned().collect();
        touched.insert(id.clone());
        for touched_id in &touched {
            if self.value_cache.contains_key(touched_id) {
                let value = self
                    .snapshot
                    .vars
                    .now
                    .get(touched_id)
                    .map(|var| var.value.clone());
                self.value_cache.insert(touched_id.clone(), value);
            }
        }

        let affected: Vec<SettingId> = touched.into_iter().collect();
        debug!(setting = %id, affected = affected.len(), "propagated value edit");
        Ok(affected)
    }
}
