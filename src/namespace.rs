//! Display-namespace derivation.
//!
//! Every section and variable carries a `full_namespace`: the hierarchical
//! grouping path the presentation layer files it under, e.g.
//! `/app/namelist/foo/2`. It is derived from the `ns` metadata property when
//! present, otherwise from a deterministic transform of the section name.
//! Orthogonal to trigger logic, but every setting object must carry one.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ident::SettingId;
use crate::meta::PropertyBag;
use crate::tree::MetaTree;
use crate::types::prop;

/// A section name ending in an instance suffix, e.g. `namelist:foo(2)`.
static ELEMENT_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)\((.+)\)$").expect("element-section pattern"));

/// Normalise a configuration name to a leading-slash path root.
pub fn normalize_config_name(name: &str) -> String {
    let trimmed = name.trim_matches('/');
    format!("/{trimmed}")
}

/// The default namespace for a section, before any per-setting override.
pub fn default_namespace_for_section(section: &str, config_name: &str, meta: &MetaTree) -> String {
    let subspace = if let Some(ns) = meta.prop(section, prop::NS) {
        ns.to_string()
    } else if let Some(caps) = ELEMENT_SECTION.captures(section) {
        let base = caps.get(1).map_or("", |m| m.as_str());
        let index = caps.get(2).map_or("", |m| m.as_str());
        match meta.prop(base, prop::NS) {
            Some(ns) => format!("{ns}/{index}"),
            None => section
                .replace('(', "/")
                .replace(')', "")
                .replace(':', "/"),
        }
    } else if section.starts_with("file:") {
        // Keep one path level for the file name itself.
        section.replace('/', ":").replacen(':', "/", 1)
    } else {
        section.replace(':', "/")
    };
    if subspace.is_empty() {
        config_name.to_string()
    } else {
        format!("{config_name}/{subspace}")
    }
}

/// The namespace for one setting: its own `ns` property for options,
/// otherwise the owning section's default namespace.
pub fn namespace_for_setting(
    id: &SettingId,
    bag: &PropertyBag,
    config_name: &str,
    meta: &MetaTree,
) -> String {
    match (bag.get(prop::NS), id.option()) {
        (Some(subspace), Some(_)) => {
            if subspace.is_empty() {
                config_name.to_string()
            } else {
                format!("{config_name}/{subspace}")
            }
        }
        _ => default_namespace_for_section(id.section_name(), config_name, meta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta;

    #[test]
    fn config_name_is_normalized() {
        assert_eq!(normalize_config_name("app"), "/app");
        assert_eq!(normalize_config_name("/app/"), "/app");
    }

    #[test]
    fn plain_section_transforms_colons() {
        let meta = MetaTree::new();
        assert_eq!(
            default_namespace_for_section("namelist:foo", "/app", &meta),
            "/app/namelist/foo"
        );
    }

    #[test]
    fn ns_property_overrides_transform() {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo", "ns", "physics/foo");
        assert_eq!(
            default_namespace_for_section("namelist:foo", "/app", &meta),
            "/app/physics/foo"
        );
    }

    #[test]
    fn instance_section_appends_index_to_base_ns() {
        let mut meta = MetaTree::new();
        meta.set("namelist:foo", "ns", "physics/foo");
        assert_eq!(
            default_namespace_for_section("namelist:foo(2)", "/app", &meta),
            "/app/physics/foo/2"
        );
    }

    #[test]
    fn instance_section_without_base_ns_normalizes_suffix() {
        let meta = MetaTree::new();
        assert_eq!(
            default_namespace_for_section("namelist:foo(2)", "/app", &meta),
            "/app/namelist/foo/2"
        );
    }

    #[test]
    fn root_section_maps_to_config_name() {
        let meta = MetaTree::new();
        assert_eq!(default_namespace_for_section("", "/app", &meta), "/app");
    }

    #[test]
    fn option_ns_property_wins() {
        let mut tree = MetaTree::new();
        tree.set("namelist:foo=bar", "ns", "custom/place");
        let id = SettingId::parse("namelist:foo=bar");
        let bag = meta::lookup(&tree, &id);
        assert_eq!(
            namespace_for_setting(&id, &bag, "/app", &tree),
            "/app/custom/place"
        );
    }

    #[test]
    fn section_ns_property_ignored_for_section_ids() {
        // A section id always uses the section-default derivation, which
        // itself honours the section's ns property.
        let mut tree = MetaTree::new();
        tree.set("namelist:foo", "ns", "physics/foo");
        let id = SettingId::parse("namelist:foo");
        let bag = meta::lookup(&tree, &id);
        assert_eq!(
            namespace_for_setting(&id, &bag, "/app", &tree),
            "/app/physics/foo"
        );
    }

    #[test]
    fn option_without_ns_uses_section_default() {
        let tree = MetaTree::new();
        let id = SettingId::parse("namelist:foo=bar");
        let bag = meta::lookup(&tree, &id);
        assert_eq!(
            namespace_for_setting(&id, &bag, "/app", &tree),
            "/app/namelist/foo"
        );
    }
}
