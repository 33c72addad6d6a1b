//! Builds a [`TypeGraph`] from a loaded [`Program`].
//!
//! Three phases:
//! 1. declare every type name and struct type literal, function-local ones
//!    included, and bind each file's imports, so later phases can resolve
//!    forward references;
//! 2. resolve type bodies, typed package variables, and function and method
//!    signatures;
//! 3. infer the types of package variables declared without a type from their
//!    initializers.

use rustc_hash::FxHashSet;
use tree_sitter::Node;

use super::{
    first_named_child, FieldSymbol, FileContext, NamedType, PackageId, PackageScope, Resolver, Ty,
    TypeGraph, TypeId, TypeKind,
};
use crate::lang::go::node_text;
use crate::lang::Go;
use crate::loader::{Program, SourceFile};

/// A type body waiting for phase 2.
struct Pending<'p> {
    id: TypeId,
    package: PackageId,
    file: usize,
    /// `struct_type` node, or the right-hand side of a defined type / alias.
    node: Node<'p>,
    alias: bool,
}

/// An untyped package variable waiting for phase 3.
struct UntypedVar<'p> {
    package: PackageId,
    file: usize,
    spec: Node<'p>,
}

/// Build the type graph of every package in `program`.
pub fn build(program: &Program) -> TypeGraph {
    let mut graph = TypeGraph::default();
    let mut pending = Vec::new();

    for (index, package) in program.packages.iter().enumerate() {
        graph.packages.push(PackageScope {
            name: package.name.clone(),
            import_path: package.import_path.clone(),
            ..PackageScope::default()
        });
        graph.files.push(Vec::with_capacity(package.files.len()));
        let id = PackageId(index as u32);
        for (file_index, file) in package.files.iter().enumerate() {
            declare_file(&mut graph, id, file_index, file, &mut pending);
        }
    }

    for (index, package) in program.packages.iter().enumerate() {
        let id = PackageId(index as u32);
        for file in &package.files {
            let ctx = file_context(program, &graph, file);
            graph.files[index].push(ctx);
        }
        tracing::trace!("declared package {} ({})", package.name, graph.packages[id.index()].types.len());
    }

    // Phase 2
    for item in &pending {
        let source = program.packages[item.package.index()].files[item.file].bytes();
        let kind = if item.alias {
            TypeKind::Alias(graph.resolve_type_node(item.node, source, item.package, item.file))
        } else if item.node.kind() == "struct_type" {
            TypeKind::Struct(struct_fields(&graph, item.node, source, item.package, item.file))
        } else {
            TypeKind::Defined(graph.resolve_type_node(item.node, source, item.package, item.file))
        };
        graph.types[item.id.index()].kind = kind;
    }

    let mut untyped = Vec::new();
    for (index, package) in program.packages.iter().enumerate() {
        let id = PackageId(index as u32);
        for (file_index, file) in package.files.iter().enumerate() {
            declare_values(&mut graph, id, file_index, file, &mut untyped);
        }
    }

    // Phase 3, twice so one level of var-to-var dependency in any order resolves.
    for _ in 0..2 {
        for var in &untyped {
            let file = &program.packages[var.package.index()].files[var.file];
            let bindings = {
                let resolver = Resolver::new(&graph, var.package, var.file, file.bytes());
                resolver.bind_spec(var.spec)
            };
            let scope = &mut graph.packages[var.package.index()];
            for (name, ty) in bindings {
                if !ty.is_unknown() {
                    scope.vars.insert(name, ty);
                }
            }
        }
    }

    tracing::debug!(
        "type graph: {} packages, {} types, {} methods",
        graph.packages.len(),
        graph.types.len(),
        graph.methods.len()
    );
    graph
}

/// Phase 1 for one file: allocate ids for named types and struct literals.
fn declare_file<'p>(
    graph: &mut TypeGraph,
    package: PackageId,
    file_index: usize,
    file: &'p SourceFile,
    pending: &mut Vec<Pending<'p>>,
) {
    let mut decls = FileDecls {
        graph,
        package,
        file: file_index,
        source: file.bytes(),
        pending,
    };
    let root = file.tree.root_node();
    let mut cursor = root.walk();

    for decl in root.children(&mut cursor) {
        match decl.kind() {
            "type_declaration" => {
                let mut inner = decl.walk();
                let specs: Vec<Node> = decl.named_children(&mut inner).collect();
                decls.declare_types(decl, &specs, false);
            }
            "var_declaration" | "function_declaration" | "method_declaration" => {
                let mut specs = Vec::new();
                collect_local_type_specs(decl, &mut specs);
                decls.declare_types(decl, &specs, true);
            }
            _ => {}
        }
    }
}

/// Phase 1 state for one file.
struct FileDecls<'a, 'p> {
    graph: &'a mut TypeGraph,
    package: PackageId,
    file: usize,
    source: &'p [u8],
    pending: &'a mut Vec<Pending<'p>>,
}

impl<'p> FileDecls<'_, 'p> {
    /// Declare the types named by `specs`, then every other struct type
    /// literal under `decl`.
    ///
    /// Local specs are keyed by position instead of entering the package scope.
    fn declare_types(&mut self, decl: Node<'p>, specs: &[Node<'p>], local: bool) {
        let mut named_bodies = FxHashSet::default();
        for spec in specs {
            if let Some(body) = self.declare_spec(*spec, local) {
                named_bodies.insert(body.id());
            }
        }

        let mut structs = Vec::new();
        collect_struct_types(decl, &mut structs);
        for node in structs.into_iter().filter(|n| !named_bodies.contains(&n.id())) {
            let id = alloc_type(self.graph, "", self.package);
            self.graph.struct_decls.insert((self.package, self.file, node.start_byte()), id);
            self.pending.push(Pending {
                id,
                package: self.package,
                file: self.file,
                node,
                alias: false,
            });
        }
    }

    /// Allocate the type of a `type_spec` or `type_alias`. Returns its body
    /// when that body is a struct type.
    fn declare_spec(&mut self, spec: Node<'p>, local: bool) -> Option<Node<'p>> {
        let alias = match spec.kind() {
            "type_spec" => false,
            "type_alias" => true,
            _ => return None,
        };
        let name = spec.child_by_field_name("name")?;
        let body = spec.child_by_field_name("type")?;

        let id = alloc_type(self.graph, node_text(self.source, name), self.package);
        if local {
            self.graph.local_types.insert((self.package, self.file, name.start_byte()), id);
        } else {
            self.graph.packages[self.package.index()]
                .types
                .insert(node_text(self.source, name).to_string(), id);
        }
        self.pending.push(Pending {
            id,
            package: self.package,
            file: self.file,
            node: body,
            alias,
        });

        if alias || body.kind() != "struct_type" {
            return None;
        }
        self.graph.struct_decls.insert((self.package, self.file, body.start_byte()), id);
        Some(body)
    }
}

fn alloc_type(graph: &mut TypeGraph, name: &str, package: PackageId) -> TypeId {
    let id = TypeId(graph.types.len() as u32);
    graph.types.push(NamedType {
        name: name.to_string(),
        package,
        kind: TypeKind::Defined(Ty::Unknown),
    });
    id
}

/// All `struct_type` nodes under `node`, function bodies included.
pub(crate) fn collect_struct_types<'p>(node: Node<'p>, out: &mut Vec<Node<'p>>) {
    if node.kind() == "struct_type" {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_struct_types(child, out);
    }
}

/// `type_spec` and `type_alias` nodes of type declarations nested in `node`.
fn collect_local_type_specs<'p>(node: Node<'p>, out: &mut Vec<Node<'p>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_declaration" {
            let mut inner = child.walk();
            out.extend(child.named_children(&mut inner));
        } else {
            collect_local_type_specs(child, out);
        }
    }
}

/// Bind a file's imports to loaded packages.
fn file_context(program: &Program, graph: &TypeGraph, file: &SourceFile) -> FileContext {
    let mut ctx = FileContext::default();
    for import in Go.imports(&file.tree, file.bytes()) {
        let Some(target) = program.package_by_import_path(&import.path) else {
            continue;
        };
        let id = PackageId(target as u32);
        match import.alias.as_deref() {
            Some("_") => {}
            Some(".") => ctx.dot_imports.push(id),
            Some(alias) => {
                ctx.imports.insert(alias.to_string(), id);
            }
            None => {
                ctx.imports.insert(graph.packages[target].name.clone(), id);
            }
        }
    }
    ctx
}

/// Fields of a `struct_type`, in declaration order, one symbol per name.
fn struct_fields(graph: &TypeGraph, node: Node, source: &[u8], package: PackageId, file: usize) -> Vec<FieldSymbol> {
    let mut fields = Vec::new();
    let Some(list) = first_named_child(node) else {
        return fields;
    };

    let mut cursor = list.walk();
    for decl in list.named_children(&mut cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let Some(type_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let ty = graph.resolve_type_node(type_node, source, package, file);

        let mut names_cursor = decl.walk();
        let names: Vec<Node> = decl.children_by_field_name("name", &mut names_cursor).collect();
        if names.is_empty() {
            // Embedded: `T`, `*T`, `pkg.T`, `T[X]`.
            let star = {
                let mut c = decl.walk();
                let has_star = decl.children(&mut c).any(|ch| ch.kind() == "*");
                has_star
            };
            fields.push(FieldSymbol {
                name: embedded_name(type_node, source).to_string(),
                ty: if star { Ty::pointer(ty) } else { ty },
                embedded: true,
            });
        } else {
            for name in names {
                fields.push(FieldSymbol {
                    name: node_text(source, name).to_string(),
                    ty: ty.clone(),
                    embedded: false,
                });
            }
        }
    }
    fields
}

/// Field name implied by an embedded type.
pub(crate) fn embedded_name<'s>(type_node: Node, source: &'s [u8]) -> &'s str {
    match type_node.kind() {
        "qualified_type" => type_node
            .child_by_field_name("name")
            .map_or("", |n| node_text(source, n)),
        "generic_type" => type_node
            .child_by_field_name("type")
            .map_or("", |n| embedded_name(n, source)),
        "pointer_type" => first_named_child(type_node).map_or("", |n| embedded_name(n, source)),
        _ => node_text(source, type_node),
    }
}

/// Phase 2 values: typed package vars, functions, and methods.
fn declare_values<'p>(
    graph: &mut TypeGraph,
    package: PackageId,
    file_index: usize,
    file: &'p SourceFile,
    untyped: &mut Vec<UntypedVar<'p>>,
) {
    let source = file.bytes();
    let root = file.tree.root_node();
    let mut cursor = root.walk();

    for decl in root.children(&mut cursor) {
        match decl.kind() {
            "var_declaration" => {
                let mut specs = Vec::new();
                collect_var_specs(decl, &mut specs);
                for spec in specs {
                    let Some(type_node) = spec.child_by_field_name("type") else {
                        untyped.push(UntypedVar {
                            package,
                            file: file_index,
                            spec,
                        });
                        continue;
                    };
                    let ty = graph.resolve_type_node(type_node, source, package, file_index);
                    let mut names = spec.walk();
                    let names: Vec<String> = spec
                        .children_by_field_name("name", &mut names)
                        .map(|n| node_text(source, n).to_string())
                        .collect();
                    for name in names {
                        graph.packages[package.index()].vars.insert(name, ty.clone());
                    }
                }
            }
            "function_declaration" => {
                let Some(name) = decl.child_by_field_name("name") else {
                    continue;
                };
                let results = result_types(graph, decl, source, package, file_index);
                graph.packages[package.index()]
                    .funcs
                    .insert(node_text(source, name).to_string(), results);
            }
            "method_declaration" => {
                let (Some(name), Some(receiver)) =
                    (decl.child_by_field_name("name"), decl.child_by_field_name("receiver"))
                else {
                    continue;
                };
                let Some(owner) = receiver_type(graph, receiver, source, package) else {
                    continue;
                };
                let results = result_types(graph, decl, source, package, file_index);
                graph
                    .methods
                    .insert((owner, node_text(source, name).to_string()), results);
            }
            _ => {}
        }
    }
}

/// `var_spec` nodes of a declaration, grouped or not.
pub(crate) fn collect_var_specs<'p>(decl: Node<'p>, out: &mut Vec<Node<'p>>) {
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        match child.kind() {
            "var_spec" => out.push(child),
            "var_spec_list" => collect_var_specs(child, out),
            _ => {}
        }
    }
}

/// Result types of a function, method, or function literal.
pub(crate) fn result_types(graph: &TypeGraph, func: Node, source: &[u8], package: PackageId, file: usize) -> Vec<Ty> {
    let Some(result) = func.child_by_field_name("result") else {
        return Vec::new();
    };
    if result.kind() != "parameter_list" {
        return vec![graph.resolve_type_node(result, source, package, file)];
    }

    let mut results = Vec::new();
    let mut cursor = result.walk();
    for param in result.named_children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        let ty = param
            .child_by_field_name("type")
            .map_or(Ty::Unknown, |t| graph.resolve_type_node(t, source, package, file));
        let mut names = param.walk();
        let count = param.children_by_field_name("name", &mut names).count().max(1);
        results.extend(std::iter::repeat(ty).take(count));
    }
    results
}

/// Named type of a method receiver: `(p *Person)`, `(Person)`, `(b *Box[T])`.
fn receiver_type(graph: &TypeGraph, receiver: Node, source: &[u8], package: PackageId) -> Option<TypeId> {
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let mut type_node = param.child_by_field_name("type")?;
    loop {
        match type_node.kind() {
            "pointer_type" | "parenthesized_type" => type_node = first_named_child(type_node)?,
            "generic_type" => type_node = type_node.child_by_field_name("type")?,
            "type_identifier" => return graph.lookup_type(package, node_text(source, type_node)),
            _ => return None,
        }
    }
}
