//! Annotated-setting reports: the flattened per-setting output handed to the
//! presentation layer after evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::ident::SettingId;
use crate::snapshot::Snapshot;
use crate::types::{DiagnosticKind, IgnoreReason, SettingState};

/// One setting's evaluated state and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingReport {
    pub id: SettingId,
    pub is_section: bool,
    pub is_latent: bool,
    /// The current (or synthesized, for latent settings) value; `None` for
    /// sections.
    pub value: Option<String>,
    pub state: SettingState,
    pub full_namespace: Option<String>,
    pub ignored_reason: BTreeMap<IgnoreReason, String>,
    pub errors: BTreeMap<DiagnosticKind, String>,
    pub warnings: BTreeMap<DiagnosticKind, String>,
}

impl SettingReport {
    pub fn has_problems(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

impl fmt::Display for SettingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.state)?;
        if self.is_latent {
            write!(f, " (latent)")?;
        }
        for (kind, message) in &self.errors {
            write!(f, "\n  error[{kind}]: {message}")?;
        }
        for (kind, message) in &self.warnings {
            write!(f, "\n  warning[{kind}]: {message}")?;
        }
        Ok(())
    }
}

/// Build reports for every setting in the snapshot, in canonical id order.
pub fn reports_for(snapshot: &Snapshot) -> Vec<SettingReport> {
    let mut out = Vec::new();
    for id in snapshot.setting_ids() {
        let is_latent = snapshot.is_latent(&id);
        let report = if id.is_section() {
            let Some(section) = snapshot.sections.get(id.section_name()) else {
                continue;
            };
            SettingReport {
                id: id.clone(),
                is_section: true,
                is_latent,
                value: None,
                state: section.state(),
                full_namespace: section.metadata.full_ns.clone(),
                ignored_reason: section.ignored_reason.clone(),
                errors: section.error.clone(),
                warnings: section.warning.clone(),
            }
        } else {
            let Some(var) = snapshot.vars.get(&id) else {
                continue;
            };
            SettingReport {
                id: id.clone(),
                is_section: false,
                is_latent,
                value: Some(var.value.clone()),
                state: var.state(),
                full_namespace: var.metadata.full_ns.clone(),
                ignored_reason: var.ignored_reason.clone(),
                errors: var.error.clone(),
                warnings: var.warning.clone(),
            }
        };
        out.push(report);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test as fixtures;
    use crate::reconcile;
    use crate::trigger::TriggerEvaluator;

    fn reports(switch_value: &str) -> Vec<SettingReport> {
        let (config, meta) = fixtures::trigger_pair(switch_value);
        let mut evaluator = TriggerEvaluator::new(&meta);
        evaluator.validate(&meta).unwrap();
        evaluator.transform(&config, &meta);
        let mut snapshot = Snapshot::build(&config, &meta, "app");
        reconcile::reconcile_all(&mut snapshot, &evaluator);
        reports_for(&snapshot)
    }

    #[test]
    fn reports_are_in_canonical_order() {
        let all = reports("enabled");
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn sections_carry_no_value() {
        let all = reports("enabled");
        let section = all.iter().find(|r| r.is_section && r.id.as_str() == "namelist:foo");
        assert_eq!(section.unwrap().value, None);
    }

    #[test]
    fn diagnostics_surface_in_reports() {
        let all = reports("disabled");
        let bar = all
            .iter()
            .find(|r| r.id.as_str() == "namelist:foo=bar")
            .unwrap();
        assert!(bar.has_problems());
        assert!(bar.errors.contains_key(&DiagnosticKind::NotIgnored));
        let rendered = bar.to_string();
        assert!(rendered.contains("error[not-ignored]"), "was: {rendered}");
    }

    #[test]
    fn namespaces_are_carried_through() {
        let all = reports("enabled");
        for report in &all {
            if report.id.as_str().is_empty() {
                continue;
            }
            assert!(report.full_namespace.is_some(), "no ns on {}", report.id);
        }
    }
}
