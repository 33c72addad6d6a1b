//! Immutable field registry.
//!
//! Combines local markers and descriptor knowledge for one analyzed package.
//! Descriptor entries are upgraded to field identities wherever the message
//! type is declared in the package; the raw index is kept for the
//! generated-package fallback in the mutation scanner.

use rustc_hash::FxHashSet;

use super::markers::{package_structs, FieldMarker};
use crate::descriptor::DescriptorIndex;
use crate::types::{FieldId, PackageId, TypeGraph};

/// Convert a descriptor field name to its generated Go name:
/// `team_lead` becomes `TeamLead`.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for segment in name.split('_') {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Whether a Go field name corresponds to a descriptor field name, literally
/// or through [`snake_to_camel`], ignoring case.
pub fn matches_descriptor_name(field_name: &str, descriptor_name: &str) -> bool {
    field_name.eq_ignore_ascii_case(descriptor_name)
        || field_name.eq_ignore_ascii_case(&snake_to_camel(descriptor_name))
}

#[derive(Debug, Default)]
pub struct ImmutableFieldRegistry {
    local: FxHashSet<FieldId>,
    descriptor_index: Option<DescriptorIndex>,
}

impl ImmutableFieldRegistry {
    /// Build the registry for `package`.
    ///
    /// `markers` are the local markers of the package's files; `descriptor`
    /// is `None` in degraded mode.
    pub fn build(
        graph: &TypeGraph,
        package: PackageId,
        markers: Vec<FieldMarker>,
        descriptor: Option<DescriptorIndex>,
    ) -> Self {
        let mut registry = Self {
            local: FxHashSet::default(),
            descriptor_index: descriptor,
        };

        if let Some(ref index) = registry.descriptor_index {
            let mut upgraded = Vec::new();
            for owner in package_structs(graph, package) {
                let Some(names) = index.fields_for(&graph.named(owner).name) else {
                    continue;
                };
                for (i, field) in graph.fields(owner).iter().enumerate() {
                    if names.iter().any(|n| matches_descriptor_name(&field.name, n)) {
                        upgraded.push(FieldId {
                            owner,
                            index: i as u32,
                        });
                    }
                }
            }
            registry.local.extend(upgraded);
        }

        registry.local.extend(markers.into_iter().map(|marker| marker.field));

        tracing::debug!(
            "registry for {}: {} local fields, descriptor {}",
            graph.package(package).name,
            registry.local.len(),
            if registry.descriptor_index.is_some() { "loaded" } else { "absent" }
        );
        registry
    }

    pub fn is_locally_immutable(&self, field: FieldId) -> bool {
        self.local.contains(&field)
    }

    /// Descriptor lookup by receiver type name and Go field name.
    pub fn descriptor_matches(&self, receiver: &str, field_name: &str) -> bool {
        self.descriptor_index
            .as_ref()
            .and_then(|index| index.fields_for(receiver))
            .is_some_and(|names| names.iter().any(|n| matches_descriptor_name(field_name, n)))
    }

    pub fn has_descriptor(&self) -> bool {
        self.descriptor_index.is_some()
    }
}
