//! Metadata-driven trigger/ignore resolution for structured configuration
//! trees. Hand over a configuration and its metadata schema, and get back
//! every setting annotated with whether it should be active.
//!
//! ```ignore
//! let mut session = Session::builder()
//!     .name("app")
//!     .config(config_tree)
//!     .metadata(meta_tree)
//!     .load();
//!
//! let affected = session.set_value(&"namelist:foo=switch".into(), "disabled")?;
//! ```
//!
//! That single `load` call mirrors the configuration into real and latent
//! setting objects, evaluates every metadata trigger declaration, and marks
//! each section and option as enabled, user-ignored, or trigger-ignored,
//! with error and warning annotations wherever the stored state disagrees
//! with what the metadata implies.
//!
//! # Why trigfig
//!
//! Large structured configurations (scientific suites, simulation codes,
//! anything namelist-shaped) carry dependencies between settings: an option
//! is only meaningful while some other switch holds a particular value.
//! Editors for such configurations need to grey the right settings out,
//! offer the ones that could be added, and complain when a stored file
//! contradicts its own schema. The typical approach wires these rules into
//! the editor ad hoc, and the logic grows subtle edge cases: duplicated
//! sections, section-level versus option-level ignoring, compulsory
//! settings, settings that are absent but still trigger-relevant.
//!
//! Trigfig packages that rule engine on its own, against plain in-memory
//! trees. The metadata schema is the source of truth: `trigger` expressions
//! declare which parent values keep a setting alive, `compulsory` marks
//! settings that may never be user-ignored, and `duplicate` marks sections
//! that can be instantiated repeatedly. Everything the engine decides is
//! written back onto setting objects as data (ignore reasons, errors,
//! warnings), never thrown.
//!
//! # The three ignore states
//!
//! Every setting is in one of three stored states:
//!
//! - **enabled**: live, editable, consumed by the application;
//! - **user-ignored**: switched off by the user, kept in the file;
//! - **trigger-ignored**: switched off by the engine because a trigger's
//!   parent value says so. Exclusively engine-controlled: the presentation
//!   layer must never let a user toggle it directly.
//!
//! The [`TriggerEvaluator`] computes the *implied* state for every setting a
//! trigger targets; the reconciler compares stored against implied and
//! attaches [`DiagnosticKind`] entries where they disagree. Optional settings
//! may stay user-ignored even when a trigger would also ignore them;
//! compulsory settings may not.
//!
//! # Real and latent settings
//!
//! Settings declared by metadata but absent from the configuration are
//! mirrored as *latent* [`Variable`]s and [`Section`]s, with values
//! synthesized from metadata defaults. They participate in trigger
//! evaluation like any other setting (so an editor can say "this setting
//! would be active if you added it") but carry no live state to contradict,
//! so the reconciler corrects them silently instead of flagging errors.
//!
//! # Duplicated sections
//!
//! A section marked `duplicate=true` is a template that may be instantiated
//! repeatedly (`namelist:foo(1)`, `namelist:foo(2)`). Metadata and triggers
//! are declared once against the bare template and fan out to every concrete
//! instance through an explicit duplicate-family index; each instance is
//! evaluated independently against its own option values. Instance matching
//! is exact on the suffix-stripped base name, so `namelist:foo` never
//! captures `namelist:foobar(1)`.
//!
//! # Failure semantics
//!
//! Trigger declarations that reference unknown ids, form cycles, or cross
//! section boundaries from a duplicated section are configuration-author
//! errors. Structural validation runs before any state transformation; on
//! failure the engine clears its tables and suspends trigger handling for
//! the whole configuration: every setting stays exactly as stored, and the
//! problem is reported once as a [`StructuralError`] on the session. This is
//! a deliberate fail-open (trust the file) rather than fail-closed (guess)
//! policy.
//!
//! # Incremental updates
//!
//! Editors change one value at a time; re-evaluating everything on every
//! keystroke would be wasteful. [`Session::set_value`] consults a cache of
//! every trigger-read value: if the edited setting feeds no trigger, or its
//! value did not effectively change, nothing is re-evaluated. Otherwise only
//! the settings transitively reachable from the edit are re-walked and
//! reconciled, and their ids are returned so the caller knows what to
//! redraw.
//!
//! # Determinism
//!
//! For a fixed configuration and metadata, every table, diagnostic, and
//! report is byte-for-byte reproducible across runs: all maps are ordered,
//! and every traversal uses the one canonical [`SettingId`] ordering
//! (section first, then option). Tests assert this by serializing engine
//! output and comparing strings.
//!
//! # What trigfig is not
//!
//! The crate performs no I/O and owns no file format: configuration and
//! metadata arrive as in-memory [`ConfigTree`]/[`MetaTree`] values built by
//! external loaders, and results are read back from the mutated setting
//! objects or as [`SettingReport`]s. Widget construction, file parsing,
//! version control, and process management belong to the embedding
//! application.

pub mod error;
pub mod meta;
pub mod types;

mod expr;
mod ident;
mod namespace;
mod reconcile;
mod report;
mod resolve;
mod session;
mod snapshot;
mod tree;
mod trigger;

#[cfg(test)]
mod fixtures;

pub use error::{EngineError, StructuralError};
pub use expr::parse_trigger_expression;
pub use ident::SettingId;
pub use meta::PropertyBag;
pub use report::SettingReport;
pub use session::{Session, SessionBuilder};
pub use snapshot::{Section, SettingNode, Snapshot, SnapshotView, Variable};
pub use tree::{ConfigTree, ConfigView, MetaNode, MetaProp, MetaTree, OptionNode, SectionNode};
pub use trigger::TriggerEvaluator;
pub use types::{ChangeReport, DiagnosticKind, IgnoreReason, SettingState, ValueSet};
