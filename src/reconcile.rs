//! The ignore-state reconciler: compares each setting's stored ignore state
//! against the state the trigger evaluator implies, and attaches error or
//! warning diagnostics where they disagree.
//!
//! Two passes exist. The full pass ([`reconcile_all`]) runs at load over every
//! real and latent setting; it *flags* disagreements on real settings and
//! silently corrects latent ones (latent settings have no live state to
//! contradict). The scoped pass ([`reconcile_updated`]) runs after an
//! incremental trigger update; during live editing the engine owns the
//! trigger-ignored flag, so this pass *corrects* states instead of flagging
//! them, and cascades section-level changes onto member options.
//!
//! Both passes first clear every reconciler-owned diagnostic kind, so
//! re-running them is idempotent.

use std::collections::BTreeSet;

use tracing::debug;

use crate::ident::SettingId;
use crate::snapshot::Snapshot;
use crate::trigger::{ParentMap, TriggerEvaluator};
use crate::types::{DiagnosticKind, IgnoreReason, SettingState, status};

const NOT_IGNORED_TEXT: &str = "should be trigger-ignored: ";
const NOT_ENABLED_TEXT: &str = "should be enabled from: ";
const NOT_TRIGGER_TEXT: &str = "not part of the trigger mechanism";
const NOT_USER_IGNORABLE_TEXT: &str = "user-ignored, but is compulsory";
const USER_IGNORED_OVERRIDE_TEXT: &str = "user-ignored, but should be trigger-ignored: ";
const TRIGGER_CONFLICT_TEXT: &str = "conflicting triggers: enabled from ";

fn join_explanations(parents: &ParentMap) -> String {
    parents.values().cloned().collect::<Vec<_>>().join(", ")
}

fn join_ids(parents: &ParentMap) -> String {
    parents
        .keys()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full reconciliation over every real and latent section and variable.
pub(crate) fn reconcile_all(snapshot: &mut Snapshot, evaluator: &TriggerEvaluator) {
    let mut flagged = 0usize;
    for id in snapshot.setting_ids() {
        let is_latent = snapshot.is_latent(&id);
        let implied = evaluator.implied_state(&id);
        let in_enabled = evaluator.enabled_parents(&id).is_some();
        let in_ignored = evaluator.ignored_parents(&id).is_some();
        let ignored_help = evaluator.ignored_parents(&id).map(join_explanations);
        let enabled_ids = evaluator.enabled_parents(&id).map(join_ids);
        let ignored_ids = evaluator.ignored_parents(&id).map(join_ids);

        let Some(node) = snapshot.node_mut(&id) else {
            continue;
        };
        for kind in DiagnosticKind::ALL {
            node.error_mut().remove(&kind);
            node.warning_mut().remove(&kind);
        }

        if in_enabled && in_ignored {
            // Two parents disagree about this setting; enabled wins for
            // state, but the metadata conflict must be visible.
            node.error_mut().insert(
                DiagnosticKind::TriggerConflict,
                format!(
                    "{TRIGGER_CONFLICT_TEXT}{}, ignored from {}",
                    enabled_ids.clone().unwrap_or_default(),
                    ignored_ids.unwrap_or_default()
                ),
            );
            flagged += 1;
        }

        let compulsory = node.metadata().is_compulsory();
        if implied == SettingState::TriggerIgnored {
            if !node.ignored_reason().contains_key(&IgnoreReason::Trigger) {
                let help = ignored_help.unwrap_or_else(|| status::FROM_DEFAULT.to_string());
                if node.ignored_reason().contains_key(&IgnoreReason::User) {
                    // Optional settings may stay user-ignored even though a
                    // trigger would also ignore them.
                    if compulsory {
                        node.warning_mut().insert(
                            DiagnosticKind::UserIgnoredOverride,
                            format!("{USER_IGNORED_OVERRIDE_TEXT}{help}"),
                        );
                        flagged += 1;
                    }
                } else if is_latent {
                    // Latent settings have no live state to contradict.
                    node.ignored_reason_mut().insert(
                        IgnoreReason::Trigger,
                        status::FROM_CONFIGURATION.to_string(),
                    );
                } else {
                    node.error_mut().insert(
                        DiagnosticKind::NotIgnored,
                        format!("{NOT_IGNORED_TEXT}{help}"),
                    );
                    flagged += 1;
                }
            }
        } else if node.ignored_reason().contains_key(&IgnoreReason::Trigger) {
            if in_enabled && !in_ignored {
                node.error_mut().insert(
                    DiagnosticKind::NotEnabled,
                    format!("{NOT_ENABLED_TEXT}{}", enabled_ids.unwrap_or_default()),
                );
                flagged += 1;
            } else if !in_enabled && !in_ignored && compulsory {
                node.error_mut().insert(
                    DiagnosticKind::NotTrigger,
                    NOT_TRIGGER_TEXT.to_string(),
                );
                flagged += 1;
            }
        } else if node.ignored_reason().contains_key(&IgnoreReason::User) && compulsory {
            node.error_mut().insert(
                DiagnosticKind::NotUserIgnorable,
                NOT_USER_IGNORABLE_TEXT.to_string(),
            );
            flagged += 1;
        }
    }
    debug!(flagged, "full reconciliation pass complete");
}

/// Scoped reconciliation over the settings an incremental trigger update
/// visited. Corrects trigger-ignored flags in place and cascades section
/// ignore state onto member options; the directly edited setting keeps its
/// own stored state.
pub(crate) fn reconcile_updated(
    snapshot: &mut Snapshot,
    evaluator: &TriggerEvaluator,
    update_ids: &[SettingId],
    changed_id: &SettingId,
) {
    let mut sections: Vec<String> = Vec::new();
    let mut variables: Vec<SettingId> = Vec::new();
    let mut seen: BTreeSet<&SettingId> = BTreeSet::new();
    for id in update_ids {
        if !seen.insert(id) {
            continue;
        }
        match id.option() {
            None => sections.push(id.section_name().to_string()),
            Some(_) => {
                if snapshot.vars.get(id).is_some() {
                    variables.push(id.clone());
                }
            }
        }
    }

    for section in &sections {
        let sid = SettingId::section(section);
        let in_enabled = evaluator.enabled_parents(&sid).is_some();
        let in_ignored = evaluator.ignored_parents(&sid).is_some();
        let help = evaluator
            .ignored_parents(&sid)
            .map(join_explanations)
            .filter(|help| !help.is_empty())
            .unwrap_or_else(|| status::FROM_DEFAULT.to_string());
        let member_ids = snapshot.vars.ids_in_section(section);

        let mut clear_member_reason = false;
        let mut cascade_member_reason = false;
        {
            let Some(sect) = snapshot.sections.get_mut(section) else {
                continue;
            };
            for kind in DiagnosticKind::ALL {
                sect.error.remove(&kind);
                sect.warning.remove(&kind);
            }
            if in_enabled && !in_ignored {
                if sect.ignored_reason.contains_key(&IgnoreReason::User) {
                    if sect.metadata.is_compulsory() {
                        sect.error.insert(
                            DiagnosticKind::NotUserIgnorable,
                            NOT_USER_IGNORABLE_TEXT.to_string(),
                        );
                    }
                } else if sect.ignored_reason.remove(&IgnoreReason::Trigger).is_some() {
                    clear_member_reason = true;
                }
            } else if in_ignored {
                sect.ignored_reason
                    .insert(IgnoreReason::Trigger, help.clone());
                cascade_member_reason = true;
            }
        }
        if clear_member_reason {
            for member in &member_ids {
                if let Some(var) = snapshot.vars.get_mut(member) {
                    var.ignored_reason.remove(&IgnoreReason::Section);
                }
            }
        }
        if cascade_member_reason {
            for member in &member_ids {
                if let Some(var) = snapshot.vars.get_mut(member) {
                    var.ignored_reason
                        .insert(IgnoreReason::Section, help.clone());
                }
            }
        }
    }

    for var_id in &variables {
        if var_id == changed_id {
            continue;
        }
        let in_enabled = evaluator.enabled_parents(var_id).is_some();
        let in_ignored = evaluator.ignored_parents(var_id).is_some();
        let help = evaluator
            .ignored_parents(var_id)
            .map(join_explanations)
            .filter(|help| !help.is_empty())
            .unwrap_or_else(|| status::FROM_DEFAULT.to_string());
        let Some(var) = snapshot.vars.get_mut(var_id) else {
            continue;
        };
        for kind in DiagnosticKind::ALL {
            var.error.remove(&kind);
            var.warning.remove(&kind);
        }
        if in_enabled && !in_ignored {
            if var.ignored_reason.contains_key(&IgnoreReason::User) {
                if var.metadata.is_compulsory() {
                    var.error.insert(
                        DiagnosticKind::NotUserIgnorable,
                        NOT_USER_IGNORABLE_TEXT.to_string(),
                    );
                }
            } else {
                var.ignored_reason.remove(&IgnoreReason::Trigger);
            }
        } else if in_ignored {
            var.ignored_reason.insert(IgnoreReason::Trigger, help);
        }
    }
}
