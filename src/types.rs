//! Shared vocabulary for the trigger/ignore engine: stored states, ignore
//! reasons, diagnostic kinds, permitted-value sets, and the metadata property
//! names the engine interprets.

use std::fmt;

use serde::Serialize;

use crate::ident::SettingId;

/// Metadata property names with engine-level meaning. Anything else in a
/// property bag is opaque pass-through data.
pub mod prop {
    pub const COMPULSORY: &str = "compulsory";
    pub const DESCRIPTION: &str = "description";
    pub const DUPLICATE: &str = "duplicate";
    pub const HELP: &str = "help";
    pub const LENGTH: &str = "length";
    pub const NS: &str = "ns";
    pub const TITLE: &str = "title";
    pub const TRIGGER: &str = "trigger";
    pub const TYPE: &str = "type";
    pub const URL: &str = "url";
    pub const VALUES: &str = "values";

    /// The value that switches a boolean-ish property on.
    pub const VALUE_TRUE: &str = "true";
}

/// Provenance text attached to ignore reasons.
pub mod status {
    pub const FROM_CONFIGURATION: &str = "from configuration.";
    pub const FROM_DEFAULT: &str = "from default.";
}

/// Stored activation state of a section or option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingState {
    #[default]
    Enabled,
    UserIgnored,
    TriggerIgnored,
}

impl fmt::Display for SettingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettingState::Enabled => "enabled",
            SettingState::UserIgnored => "user-ignored",
            SettingState::TriggerIgnored => "trigger-ignored",
        })
    }
}

/// Why a setting is currently ignored. A setting may carry several reasons at
/// once (e.g. trigger-ignored inside a user-ignored section); each maps to a
/// human-readable provenance text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IgnoreReason {
    /// The owning section carries an ignore reason (informational only).
    Section,
    /// A trigger rule implies the setting is inactive. Engine-controlled.
    Trigger,
    /// The end user switched the setting off.
    User,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IgnoreReason::Section => "section ignored",
            IgnoreReason::Trigger => "trigger ignored",
            IgnoreReason::User => "user ignored",
        })
    }
}

/// The kinds of diagnostic the reconciler attaches to a setting. Re-running
/// the reconciler replaces entries of these kinds rather than accumulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Stored enabled, but a trigger implies trigger-ignored.
    NotIgnored,
    /// Stored trigger-ignored, but the triggers are all satisfied.
    NotEnabled,
    /// Stored trigger-ignored, but no trigger targets this setting.
    NotTrigger,
    /// User-ignored, but the setting is compulsory.
    NotUserIgnorable,
    /// User-ignored where a trigger would also ignore it (warning only).
    UserIgnoredOverride,
    /// One trigger enables the setting while another ignores it.
    TriggerConflict,
}

impl DiagnosticKind {
    /// Every kind the reconciler owns; cleared before each re-marking pass so
    /// repeated runs are idempotent.
    pub const ALL: [DiagnosticKind; 6] = [
        DiagnosticKind::NotIgnored,
        DiagnosticKind::NotEnabled,
        DiagnosticKind::NotTrigger,
        DiagnosticKind::NotUserIgnorable,
        DiagnosticKind::UserIgnoredOverride,
        DiagnosticKind::TriggerConflict,
    ];
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::NotIgnored => "not-ignored",
            DiagnosticKind::NotEnabled => "not-enabled",
            DiagnosticKind::NotTrigger => "not-trigger",
            DiagnosticKind::NotUserIgnorable => "not-user-ignorable",
            DiagnosticKind::UserIgnoredOverride => "user-ignored-override",
            DiagnosticKind::TriggerConflict => "trigger-conflict",
        })
    }
}

/// The values of a parent setting that keep a dependent setting enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueSet {
    /// Any value enables the dependent, as long as the parent itself is
    /// present and enabled.
    Any,
    /// Only the listed literal values enable the dependent.
    OneOf(Vec<String>),
}

impl ValueSet {
    pub fn permits(&self, value: &str) -> bool {
        match self {
            ValueSet::Any => true,
            ValueSet::OneOf(values) => values.iter().any(|v| v == value),
        }
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSet::Any => f.write_str("any value"),
            ValueSet::OneOf(values) => {
                if let [single] = values.as_slice() {
                    write!(f, "'{single}'")
                } else {
                    let quoted: Vec<String> = values.iter().map(|v| format!("'{v}'")).collect();
                    write!(f, "[{}]", quoted.join(", "))
                }
            }
        }
    }
}

/// One stored-versus-implied state disagreement found by a full evaluator
/// pass, reported in canonical id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub id: SettingId,
    pub from: SettingState,
    pub to: SettingState,
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.id, self.from, self.to)
    }
}
