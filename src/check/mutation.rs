//! Mutation scanner.
//!
//! Walks a file in syntactic pre-order and matches three statement shapes:
//! assignment to a field selector, indexed write through a field selector,
//! and increment/decrement of a field selector.

use serde::Serialize;
use tree_sitter::Node;

use super::registry::ImmutableFieldRegistry;
use crate::config::AnalyzerConfig;
use crate::loader::SourceFile;
use crate::types::{PackageId, Resolver, Selection, TypeGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Assign,
    IndexMutate,
    IncDec,
}

impl MutationKind {
    /// Diagnostic text for a mutation of `field`.
    pub fn message(self, field: &str) -> String {
        match self {
            MutationKind::Assign => format!("assignment to immutable field {}", field),
            MutationKind::IndexMutate => format!("modifying immutable field {} (map/slice index)", field),
            MutationKind::IncDec => format!("modifying immutable field {} (inc/dec)", field),
        }
    }
}

/// How a mutated field was recognized as immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    /// Field identity is in the registry.
    Local,
    /// Receiver type and field name matched the descriptor in a generated package.
    DescriptorFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed, in bytes.
    pub column: usize,
    pub owner_type_name: String,
    pub field_name: String,
    pub kind: MutationKind,
    pub detection: Detection,
}

impl MutationEvent {
    pub fn message(&self) -> String {
        self.kind.message(&self.field_name)
    }
}

/// Scans the files of one analyzed package against its registry.
pub struct MutationScanner<'a> {
    graph: &'a TypeGraph,
    registry: &'a ImmutableFieldRegistry,
    config: &'a AnalyzerConfig,
    package: PackageId,
}

impl<'a> MutationScanner<'a> {
    pub fn new(
        graph: &'a TypeGraph,
        registry: &'a ImmutableFieldRegistry,
        config: &'a AnalyzerConfig,
        package: PackageId,
    ) -> Self {
        Self {
            graph,
            registry,
            config,
            package,
        }
    }

    pub fn scan_file(&self, file_index: usize, file: &SourceFile) -> Vec<MutationEvent> {
        let mut walk = FileWalk {
            scanner: self,
            resolver: Resolver::new(self.graph, self.package, file_index, file.bytes()),
            events: Vec::new(),
        };
        walk.visit(file.tree.root_node());
        walk.events
    }

    /// Decide whether a resolved selection is immutable, local match first.
    fn detect(&self, selection: &Selection) -> Option<Detection> {
        if self.registry.is_locally_immutable(selection.field) {
            return Some(Detection::Local);
        }
        let receiver = selection.receiver_name.as_deref()?;
        let package = self.graph.package(selection.package);
        if self.config.is_generated_package(&package.name, &package.import_path)
            && self.registry.descriptor_matches(receiver, &selection.field_name)
        {
            return Some(Detection::DescriptorFallback);
        }
        None
    }
}

struct FileWalk<'s, 'a, 'src> {
    scanner: &'s MutationScanner<'a>,
    resolver: Resolver<'a, 'src>,
    events: Vec<MutationEvent>,
}

impl FileWalk<'_, '_, '_> {
    fn visit(&mut self, node: Node) {
        let opened = self.resolver.enter(node);

        match node.kind() {
            "assignment_statement" => self.check_assignment(node),
            "inc_statement" | "dec_statement" => {
                if let Some(target) = first_operand(node) {
                    if target.kind() == "selector_expression" {
                        self.check(target, target, MutationKind::IncDec);
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }

        self.resolver.after(node);
        if opened {
            self.resolver.exit();
        }
    }

    fn check_assignment(&mut self, stmt: Node) {
        let Some(left) = stmt.child_by_field_name("left") else {
            return;
        };
        let targets: Vec<Node> = if left.kind() == "expression_list" {
            let mut cursor = left.walk();
            let items: Vec<Node> = left.named_children(&mut cursor).collect();
            items
        } else {
            vec![left]
        };

        for target in targets.into_iter().map(unparen) {
            match target.kind() {
                "selector_expression" => self.check(target, target, MutationKind::Assign),
                "index_expression" => {
                    let Some(container) = target.child_by_field_name("operand").map(unparen) else {
                        continue;
                    };
                    if container.kind() == "selector_expression" {
                        self.check(container, target, MutationKind::IndexMutate);
                    }
                }
                _ => {}
            }
        }
    }

    /// Resolve `selector` and record an event at `at` if it is immutable.
    fn check(&mut self, selector: Node, at: Node, kind: MutationKind) {
        let Some(selection) = self.resolver.select(selector) else {
            return;
        };
        let Some(detection) = self.scanner.detect(&selection) else {
            return;
        };

        let owner_type_name = selection
            .receiver_name
            .clone()
            .unwrap_or_else(|| self.scanner.graph.named(selection.field.owner).display_name().to_string());
        let pos = at.start_position();
        self.events.push(MutationEvent {
            line: pos.row + 1,
            column: pos.column + 1,
            owner_type_name,
            field_name: selection.field_name,
            kind,
            detection,
        });
    }
}

/// Operand of an inc/dec statement.
fn first_operand(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let operand = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
    operand.map(unparen)
}

fn unparen(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        let mut cursor = node.walk();
        let inner = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
        match inner {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}
