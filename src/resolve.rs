//! The full resolution pipeline: build the snapshot, validate the trigger
//! declarations, evaluate them, and reconcile stored against implied states.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, making the whole
//! pipeline testable with synthetic inputs. Steps:
//!
//! 1. Expand `file:*=` wildcard metadata onto concrete file sections
//! 2. Build the configuration snapshot (real + latent populations)
//! 3. Structurally validate the trigger declarations; on failure, suspend
//!    trigger handling for the whole configuration (fail-open) and stop
//! 4. Run the full trigger transform and collect change reports
//! 5. Cache the values of every trigger-read id for the update propagator
//! 6. Reconcile stored ignore states against the implied ones

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::StructuralError;
use crate::ident::SettingId;
use crate::meta;
use crate::reconcile;
use crate::snapshot::Snapshot;
use crate::tree::{ConfigTree, MetaTree};
use crate::trigger::TriggerEvaluator;
use crate::types::ChangeReport;

/// All pre-loaded data needed to resolve one configuration. No I/O happens
/// here; the external loaders hand these trees over.
pub struct ResolveInput<'a> {
    pub config: &'a ConfigTree,
    pub meta: &'a MetaTree,
    /// The configuration's display name, used as the namespace root.
    pub config_name: &'a str,
}

/// Everything one resolution pass produces. The session owns one of these
/// per loaded configuration.
pub struct Resolution {
    /// The metadata after wildcard expansion.
    pub meta: MetaTree,
    pub snapshot: Snapshot,
    pub evaluator: TriggerEvaluator,
    /// Current value of every id some trigger reads (`None` when absent).
    pub value_cache: BTreeMap<SettingId, Option<String>>,
    /// Set when structural validation failed and trigger handling is
    /// suspended for this configuration.
    pub structural: Option<StructuralError>,
    /// Stored-versus-implied state disagreements, in canonical id order.
    pub changes: Vec<ChangeReport>,
}

/// Resolve one configuration from pre-loaded inputs.
pub fn resolve(input: ResolveInput<'_>) -> Resolution {
    let mut meta = input.meta.clone();
    meta::expand_file_wildcards(input.config, &mut meta);

    let mut snapshot = Snapshot::build(input.config, &meta, input.config_name);
    let mut evaluator = TriggerEvaluator::new(&meta);

    if let Err(error) = evaluator.validate(&meta) {
        warn!(%error, "trigger evaluation suspended for this configuration");
        evaluator.clear();
        return Resolution {
            meta,
            snapshot,
            evaluator,
            value_cache: BTreeMap::new(),
            structural: Some(error),
            changes: Vec::new(),
        };
    }

    let changes = evaluator.transform(input.config, &meta);
    let value_cache = evaluator.value_cache(&snapshot.view(), &meta);
    reconcile::reconcile_all(&mut snapshot, &evaluator);
    debug!(
        changes = changes.len(),
        cached_values = value_cache.len(),
        "configuration resolved"
    );

    Resolution {
        meta,
        snapshot,
        evaluator,
        value_cache,
        structural: None,
        changes,
    }
}
