//! Expression typing and selector resolution inside function bodies.
//!
//! The [`Resolver`] is driven by a pre-order walk: call [`Resolver::enter`]
//! before visiting a node's children, [`Resolver::after`] once they are done,
//! and [`Resolver::exit`] if `enter` opened a scope. Declarations are bound
//! after their initializers, so `x := x.Next` sees the outer `x`.

use rustc_hash::FxHashMap;
use tree_sitter::Node;

use super::builder::result_types;
use super::{first_named_child, FieldId, PackageId, Ty, TypeGraph};
use crate::lang::go::node_text;

/// A selector that resolved to a struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub field: FieldId,
    pub field_name: String,
    /// Named type of the operand, through one pointer.
    pub receiver_name: Option<String>,
    /// Package declaring the field.
    pub package: PackageId,
}

pub struct Resolver<'g, 's> {
    graph: &'g TypeGraph,
    package: PackageId,
    file: usize,
    source: &'s [u8],
    scopes: Vec<FxHashMap<String, Ty>>,
}

impl<'g, 's> Resolver<'g, 's> {
    pub fn new(graph: &'g TypeGraph, package: PackageId, file: usize, source: &'s [u8]) -> Self {
        Self {
            graph,
            package,
            file,
            source,
            scopes: Vec::new(),
        }
    }

    /// Open a scope for `node` if it introduces one. Returns whether it did.
    pub fn enter(&mut self, node: Node) -> bool {
        match node.kind() {
            "function_declaration" | "method_declaration" | "func_literal" => {
                self.scopes.push(FxHashMap::default());
                if let Some(receiver) = node.child_by_field_name("receiver") {
                    self.bind_parameters(receiver);
                }
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.bind_parameters(params);
                }
                if let Some(result) = node.child_by_field_name("result") {
                    if result.kind() == "parameter_list" {
                        self.bind_parameters(result);
                    }
                }
                true
            }
            "block" | "if_statement" | "for_statement" | "expression_switch_statement"
            | "type_switch_statement" | "select_statement" | "expression_case" | "default_case"
            | "communication_case" => {
                self.scopes.push(FxHashMap::default());
                if node.kind() == "default_case" {
                    self.bind_type_switch_alias(node, None);
                }
                true
            }
            "type_case" => {
                self.scopes.push(FxHashMap::default());
                let mut cursor = node.walk();
                let types: Vec<Node> = node.children_by_field_name("type", &mut cursor).collect();
                let single = match types.as_slice() {
                    [only] => Some(*only),
                    _ => None,
                };
                self.bind_type_switch_alias(node, single);
                true
            }
            _ => false,
        }
    }

    /// Bind the declarations made by `node` into the innermost scope.
    pub fn after(&mut self, node: Node) {
        if self.scopes.is_empty() {
            return;
        }
        match node.kind() {
            "short_var_declaration" => {
                let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right"))
                else {
                    return;
                };
                let bindings = self.bind_lists(left, Some(right));
                self.bind_all(bindings);
            }
            "var_spec" => {
                let bindings = self.bind_spec(node);
                self.bind_all(bindings);
            }
            "range_clause" => self.bind_range(node),
            _ => {}
        }
    }

    pub fn exit(&mut self) {
        self.scopes.pop();
    }

    /// Resolve a `selector_expression` to a field.
    ///
    /// Package-qualified identifiers (`pb.Default`) and method values are not
    /// fields and yield `None`.
    pub fn select(&self, selector: Node) -> Option<Selection> {
        if selector.kind() != "selector_expression" {
            return None;
        }
        let operand = selector.child_by_field_name("operand")?;
        let field = selector.child_by_field_name("field")?;
        if self.package_of(operand).is_some() {
            return None;
        }

        let operand_ty = self.type_of(operand);
        let field_name = node_text(self.source, field);
        let id = self.graph.lookup_field(&operand_ty, field_name)?;
        Some(Selection {
            field: id,
            field_name: field_name.to_string(),
            receiver_name: self.graph.receiver_name(&operand_ty).map(str::to_string),
            package: self.graph.named(id.owner).package,
        })
    }

    /// Static type of an expression, or [`Ty::Unknown`].
    pub fn type_of(&self, expr: Node) -> Ty {
        match expr.kind() {
            "identifier" => self.lookup_var(node_text(self.source, expr)),
            "parenthesized_expression" => first_named_child(expr).map_or(Ty::Unknown, |e| self.type_of(e)),
            "unary_expression" => {
                let Some(operand) = expr.child_by_field_name("operand") else {
                    return Ty::Unknown;
                };
                match expr.child_by_field_name("operator").map(|op| node_text(self.source, op)) {
                    Some("&") => Ty::pointer(self.type_of(operand)),
                    Some("*") => match self.type_of(operand) {
                        Ty::Pointer(inner) => *inner,
                        _ => Ty::Unknown,
                    },
                    _ => Ty::Unknown,
                }
            }
            "composite_literal" => expr
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |t| self.resolve_type(t)),
            "selector_expression" => self.type_of_selector(expr),
            "index_expression" => expr
                .child_by_field_name("operand")
                .map_or(Ty::Unknown, |operand| self.graph.index_result(&self.type_of(operand))),
            "slice_expression" => expr
                .child_by_field_name("operand")
                .map_or(Ty::Unknown, |operand| match self.type_of(operand) {
                    Ty::Array(elem) => Ty::Slice(elem),
                    Ty::Pointer(inner) => match *inner {
                        Ty::Array(elem) => Ty::Slice(elem),
                        _ => Ty::Unknown,
                    },
                    other => other,
                }),
            "type_assertion_expression" => expr
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |t| self.resolve_type(t)),
            "call_expression" => self.call_results(expr).into_iter().next().unwrap_or(Ty::Unknown),
            _ => Ty::Unknown,
        }
    }

    /// Types bound by a `var_spec`, in declaration order.
    pub fn bind_spec(&self, spec: Node) -> Vec<(String, Ty)> {
        let mut cursor = spec.walk();
        let names: Vec<Node> = spec.children_by_field_name("name", &mut cursor).collect();
        if let Some(type_node) = spec.child_by_field_name("type") {
            let ty = self.resolve_type(type_node);
            return names
                .into_iter()
                .map(|n| (node_text(self.source, n).to_string(), ty.clone()))
                .collect();
        }
        let values = spec.child_by_field_name("value");
        self.zip_names(names, values)
    }

    fn resolve_type(&self, node: Node) -> Ty {
        self.graph.resolve_type_node(node, self.source, self.package, self.file)
    }

    fn lookup_var(&self, name: &str) -> Ty {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return ty.clone();
            }
        }
        if let Some(ty) = self.graph.package(self.package).vars.get(name) {
            return ty.clone();
        }
        self.graph
            .file_context(self.package, self.file)
            .into_iter()
            .flat_map(|ctx| ctx.dot_imports.iter())
            .find_map(|dot| self.graph.package(*dot).vars.get(name).cloned())
            .unwrap_or(Ty::Unknown)
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    /// The imported package an identifier names, unless a local shadows it.
    fn package_of(&self, node: Node) -> Option<PackageId> {
        if node.kind() != "identifier" {
            return None;
        }
        let name = node_text(self.source, node);
        if self.is_local(name) {
            return None;
        }
        self.graph
            .file_context(self.package, self.file)?
            .imports
            .get(name)
            .copied()
    }

    fn type_of_selector(&self, expr: Node) -> Ty {
        let (Some(operand), Some(field)) = (expr.child_by_field_name("operand"), expr.child_by_field_name("field"))
        else {
            return Ty::Unknown;
        };
        let name = node_text(self.source, field);
        if let Some(package) = self.package_of(operand) {
            return self.graph.package(package).vars.get(name).cloned().unwrap_or(Ty::Unknown);
        }
        let operand_ty = self.type_of(operand);
        self.graph
            .lookup_field(&operand_ty, name)
            .and_then(|id| self.graph.field(id))
            .map_or(Ty::Unknown, |f| f.ty.clone())
    }

    /// Result types of a call, conversion, or `new`/`make`.
    fn call_results(&self, call: Node) -> Vec<Ty> {
        let Some(function) = call.child_by_field_name("function") else {
            return Vec::new();
        };
        let first_arg = call.child_by_field_name("arguments").and_then(first_named_child);

        match function.kind() {
            "identifier" => {
                let name = node_text(self.source, function);
                if self.is_local(name) {
                    return Vec::new();
                }
                match name {
                    "new" => return first_arg.map(|t| vec![Ty::pointer(self.resolve_type(t))]).unwrap_or_default(),
                    "make" => return first_arg.map(|t| vec![self.resolve_type(t)]).unwrap_or_default(),
                    _ => {}
                }
                if let Some(results) = self.graph.package(self.package).funcs.get(name) {
                    return results.clone();
                }
                // Conversion `T(x)`, local types first.
                match self.resolve_type(function) {
                    Ty::Unknown => Vec::new(),
                    ty => vec![ty],
                }
            }
            "selector_expression" => {
                let (Some(operand), Some(field)) =
                    (function.child_by_field_name("operand"), function.child_by_field_name("field"))
                else {
                    return Vec::new();
                };
                let name = node_text(self.source, field);
                if let Some(package) = self.package_of(operand) {
                    if let Some(results) = self.graph.package(package).funcs.get(name) {
                        return results.clone();
                    }
                    return self
                        .graph
                        .lookup_type(package, name)
                        .map(|id| vec![Ty::Named(id)])
                        .unwrap_or_default();
                }
                let receiver = self.type_of(operand);
                self.graph
                    .lookup_method(&receiver, name)
                    .map(<[Ty]>::to_vec)
                    .unwrap_or_default()
            }
            "func_literal" => result_types(self.graph, function, self.source, self.package, self.file),
            // Conversions such as `(*T)(x)` or `[]T(x)`.
            "parenthesized_expression" | "slice_type" | "map_type" | "array_type" | "pointer_type"
            | "qualified_type" | "generic_type" => vec![self.resolve_type(function)],
            _ => Vec::new(),
        }
    }

    /// Types for `names` from `values`, handling multi-value right-hand sides.
    fn zip_names(&self, names: Vec<Node>, values: Option<Node>) -> Vec<(String, Ty)> {
        let values: Vec<Node> = values.map_or_else(Vec::new, |list| {
            if list.kind() == "expression_list" {
                let mut cursor = list.walk();
                let items: Vec<Node> = list.named_children(&mut cursor).filter(|c| c.kind() != "comment").collect();
                items
            } else {
                vec![list]
            }
        });

        let types: Vec<Ty> = if values.len() == 1 && names.len() > 1 {
            let value = values[0];
            match value.kind() {
                "call_expression" => self.call_results(value),
                // `v, ok := m[k]` and `v, ok := x.(T)`
                "index_expression" | "type_assertion_expression" => vec![self.type_of(value)],
                _ => Vec::new(),
            }
        } else {
            values.iter().map(|v| self.type_of(*v)).collect()
        };

        names
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                (
                    node_text(self.source, n).to_string(),
                    types.get(i).cloned().unwrap_or(Ty::Unknown),
                )
            })
            .collect()
    }

    fn bind_lists(&self, left: Node, right: Option<Node>) -> Vec<(String, Ty)> {
        let names: Vec<Node> = if left.kind() == "expression_list" {
            let mut cursor = left.walk();
            let items: Vec<Node> = left.named_children(&mut cursor).collect();
            items
        } else {
            vec![left]
        };
        self.zip_names(names, right)
    }

    fn bind_all(&mut self, bindings: Vec<(String, Ty)>) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        for (name, ty) in bindings {
            if name != "_" {
                scope.insert(name, ty);
            }
        }
    }

    fn bind_parameters(&mut self, list: Node) {
        let mut bindings = Vec::new();
        let mut cursor = list.walk();
        for param in list.named_children(&mut cursor) {
            let variadic = match param.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let ty = param
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |t| self.resolve_type(t));
            let ty = if variadic { Ty::Slice(Box::new(ty)) } else { ty };
            let mut names = param.walk();
            for name in param.children_by_field_name("name", &mut names) {
                bindings.push((node_text(self.source, name).to_string(), ty.clone()));
            }
        }
        self.bind_all(bindings);
    }

    fn bind_range(&mut self, clause: Node) {
        let declares = {
            let mut cursor = clause.walk();
            let found = clause.children(&mut cursor).any(|c| c.kind() == ":=");
            found
        };
        let (true, Some(left), Some(right)) =
            (declares, clause.child_by_field_name("left"), clause.child_by_field_name("right"))
        else {
            return;
        };

        let (key, value) = self.graph.range_result(&self.type_of(right));
        let mut cursor = left.walk();
        let names: Vec<Node> = left.named_children(&mut cursor).collect();
        let bindings = names
            .into_iter()
            .zip([key, value])
            .map(|(n, ty)| (node_text(self.source, n).to_string(), ty))
            .collect();
        self.bind_all(bindings);
    }

    /// Bind `v` of `switch v := x.(type)` inside a case clause.
    fn bind_type_switch_alias(&mut self, case: Node, single_type: Option<Node>) {
        let Some(switch) = case.parent() else { return };
        if switch.kind() != "type_switch_statement" {
            return;
        }
        let Some(alias) = switch.child_by_field_name("alias") else {
            return;
        };
        let Some(name) = first_named_child(alias).or(Some(alias)).filter(|n| n.kind() == "identifier") else {
            return;
        };

        let ty = match single_type {
            Some(t) => self.resolve_type(t),
            None => switch
                .child_by_field_name("value")
                .map_or(Ty::Unknown, |v| self.type_of(v)),
        };
        let bindings = vec![(node_text(self.source, name).to_string(), ty)];
        self.bind_all(bindings);
    }
}
