//! Local marker scanner: struct tags and field comments.

use serde::Serialize;
use tree_sitter::Node;

use crate::config::AnalyzerConfig;
use crate::lang::go::node_text;
use crate::lang::Go;
use crate::loader::SourceFile;
use crate::types::{FieldId, FieldSymbol, PackageId, TypeGraph, TypeId};

/// Where an immutability marker came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerOrigin {
    DescriptorOption,
    InlineAnnotation,
    Comment,
}

impl MarkerOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerOrigin::DescriptorOption => "descriptor option",
            MarkerOrigin::InlineAnnotation => "struct tag",
            MarkerOrigin::Comment => "comment",
        }
    }
}

/// One field found immutable, with the origin that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMarker {
    pub field: FieldId,
    pub origin: MarkerOrigin,
    pub owner_type_name: String,
    /// Declared Go identifier for local markers, descriptor case otherwise.
    pub field_name: String,
}

/// What counts as a marker, taken from the config.
#[derive(Debug, Clone)]
pub struct MarkerRules {
    tag_key: String,
    truthy_values: Vec<String>,
    /// Lowercased.
    comment_marker: String,
}

impl MarkerRules {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            tag_key: config.tag_key.clone(),
            truthy_values: config.truthy_values.clone(),
            comment_marker: config.comment_marker.to_lowercase(),
        }
    }

    fn comment_matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.comment_marker)
    }

    /// Origin of the first matching check; the checks are an OR.
    fn classify(&self, go: &Go, decl: Node, source: &[u8]) -> Option<MarkerOrigin> {
        let tag_value = go
            .struct_tag(decl, source)
            .and_then(|tag| tag.lookup(&self.tag_key));
        if tag_value.is_some_and(|v| self.truthy_values.iter().any(|t| *t == v)) {
            return Some(MarkerOrigin::InlineAnnotation);
        }
        if go
            .trailing_comment(decl, source)
            .is_some_and(|c| self.comment_matches(&c))
        {
            return Some(MarkerOrigin::Comment);
        }
        if go
            .doc_comment(decl, source)
            .is_some_and(|c| self.comment_matches(&c))
        {
            return Some(MarkerOrigin::Comment);
        }
        None
    }
}

impl Default for MarkerRules {
    fn default() -> Self {
        Self::from_config(&AnalyzerConfig::default())
    }
}

/// Scan every struct type declared in one file, function-local ones included.
pub fn scan_file(
    graph: &TypeGraph,
    package: PackageId,
    file_index: usize,
    file: &SourceFile,
    rules: &MarkerRules,
) -> Vec<FieldMarker> {
    let go = Go;
    let source = file.bytes();
    let mut markers = Vec::new();

    let mut structs = Vec::new();
    crate::types::collect_struct_types(file.tree.root_node(), &mut structs);

    for struct_node in structs {
        let Some(owner) = graph.struct_at(package, file_index, struct_node.start_byte()) else {
            tracing::trace!(
                "{}:{}: struct type without resolved symbol",
                file.path.display(),
                struct_node.start_position().row + 1
            );
            continue;
        };
        let owner_name = graph.named(owner).name.clone();

        for (index, decl) in align_fields(struct_node, graph.fields(owner), source) {
            let Some(origin) = rules.classify(&go, decl, source) else {
                continue;
            };
            let field = FieldId { owner, index };
            let field_name = graph
                .field(field)
                .map_or_else(String::new, |f| f.name.clone());
            tracing::debug!(
                "{}.{} immutable ({})",
                graph.named(owner).display_name(),
                field_name,
                origin.as_str()
            );
            markers.push(FieldMarker {
                field,
                origin,
                owner_type_name: owner_name.clone(),
                field_name,
            });
        }
    }

    markers
}

/// Pair each named field declaration with its resolved symbol.
///
/// Symbols are matched by name moving forward only, so embedded fields,
/// multi-name declarations, and count skew between syntax and symbols all
/// degrade to skipped entries instead of misattributed markers.
pub fn align_fields<'t>(struct_node: Node<'t>, symbols: &[FieldSymbol], source: &[u8]) -> Vec<(u32, Node<'t>)> {
    let mut pairs = Vec::new();
    let mut cursor = struct_node.walk();
    let Some(list) = struct_node
        .named_children(&mut cursor)
        .find(|c| c.kind() == "field_declaration_list")
    else {
        return pairs;
    };

    let mut next = 0usize;
    let mut list_cursor = list.walk();
    for decl in list.named_children(&mut list_cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let mut names_cursor = decl.walk();
        for name in decl.children_by_field_name("name", &mut names_cursor) {
            let name = node_text(source, name);
            let found = symbols
                .iter()
                .enumerate()
                .skip(next)
                .find(|(_, sym)| !sym.embedded && sym.name == name);
            if let Some((index, _)) = found {
                pairs.push((index as u32, decl));
                next = index + 1;
            }
        }
    }
    pairs
}

/// Type ids of struct types declared in `package`, for the registry.
pub fn package_structs(graph: &TypeGraph, package: PackageId) -> impl Iterator<Item = TypeId> + '_ {
    (0..graph.type_count() as u32)
        .map(TypeId)
        .filter(move |id| {
            let named = graph.named(*id);
            named.package == package && !named.name.is_empty() && !graph.fields(*id).is_empty()
        })
}
