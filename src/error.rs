use thiserror::Error;

use crate::ident::SettingId;

/// A defect in the metadata's trigger declarations that makes evaluation for
/// the whole configuration unsafe.
///
/// Structural errors are configuration-author problems, not engine faults.
/// They are never thrown across the session API: the loader stores the first
/// one found, clears the trigger tables, and leaves every setting exactly as
/// stored (fail-open). Callers read it back via
/// [`Session::structural_error`](crate::Session::structural_error).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum StructuralError {
    #[error("no metadata entry found for '{0}'")]
    MissingMetadata(SettingId),

    #[error("cyclic dependency detected: {child} to {parent}")]
    CyclicDependency { parent: SettingId, child: SettingId },

    #[error("badly defined trigger: '{0}' is a duplicate section")]
    DuplicateSectionTrigger(String),

    #[error("invalid trigger expression: {0}")]
    BadExpression(String),
}

/// Caller-misuse errors from the session API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum EngineError {
    #[error("unknown setting: {0}")]
    UnknownSetting(SettingId),

    #[error("'{0}' is a section, not an option")]
    NotAnOption(SettingId),
}
