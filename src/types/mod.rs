//! Resolved type graph for loaded Go packages.
//!
//! A deliberately small model of `go/types`: enough to turn `x.F` into a
//! field symbol with stable identity. Named types, struct fields (including
//! embedded ones), package-level variables, and function and method result
//! types are recorded. Anything outside that model resolves to
//! [`Ty::Unknown`], and unknown selectors are simply never matched.

mod builder;
mod resolve;

use rustc_hash::{FxHashMap, FxHashSet};
use tree_sitter::Node;

pub use builder::build;
pub(crate) use builder::collect_struct_types;
pub use resolve::{Resolver, Selection};

use crate::lang::go::node_text;

/// Index of a package in [`crate::loader::Program::packages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub u32);

impl PackageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a struct field: its declaring struct type and position.
///
/// Two unrelated types with a field of the same name never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId {
    pub owner: TypeId,
    pub index: u32,
}

/// A Go type, as far as the checker cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    Named(TypeId),
    Pointer(Box<Ty>),
    Slice(Box<Ty>),
    Array(Box<Ty>),
    Map(Box<Ty>, Box<Ty>),
    Unknown,
}

impl Ty {
    pub fn pointer(inner: Ty) -> Ty {
        Ty::Pointer(Box::new(inner))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Unknown)
    }

    fn deref(&self) -> &Ty {
        match self {
            Ty::Pointer(inner) => inner,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSymbol {
    /// Declared name; for embedded fields, the embedded type's name.
    pub name: String,
    pub ty: Ty,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Struct(Vec<FieldSymbol>),
    /// `type T U` for a non-struct `U`.
    Defined(Ty),
    /// `type T = U`.
    Alias(Ty),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    /// Empty for anonymous struct types.
    pub name: String,
    pub package: PackageId,
    pub kind: TypeKind,
}

impl NamedType {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "<anonymous struct>"
        } else {
            &self.name
        }
    }
}

/// Package-level declarations.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    pub name: String,
    pub import_path: String,
    pub types: FxHashMap<String, TypeId>,
    pub vars: FxHashMap<String, Ty>,
    /// Result types of package-level functions.
    pub funcs: FxHashMap<String, Vec<Ty>>,
}

/// Per-file import bindings.
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    /// Local package name to loaded package.
    pub imports: FxHashMap<String, PackageId>,
    pub dot_imports: Vec<PackageId>,
}

/// Maximum embedding depth searched for promoted fields and methods.
const MAX_EMBED_DEPTH: usize = 8;
/// Maximum length of a `type A B` / `type A = B` chain.
const MAX_CHAIN: usize = 16;

#[derive(Debug, Default)]
pub struct TypeGraph {
    packages: Vec<PackageScope>,
    types: Vec<NamedType>,
    methods: FxHashMap<(TypeId, String), Vec<Ty>>,
    /// `files[package][file]`
    files: Vec<Vec<FileContext>>,
    /// Struct type literal at (package, file, start byte).
    struct_decls: FxHashMap<(PackageId, usize, usize), TypeId>,
    /// Function-local type, keyed by the start byte of its name.
    local_types: FxHashMap<(PackageId, usize, usize), TypeId>,
}

impl TypeGraph {
    pub fn named(&self, id: TypeId) -> &NamedType {
        &self.types[id.index()]
    }

    pub fn package(&self, id: PackageId) -> &PackageScope {
        &self.packages[id.index()]
    }

    pub fn file_context(&self, package: PackageId, file: usize) -> Option<&FileContext> {
        self.files.get(package.index())?.get(file)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// The struct type declared by the `struct_type` node at `start_byte`.
    pub fn struct_at(&self, package: PackageId, file: usize, start_byte: usize) -> Option<TypeId> {
        self.struct_decls.get(&(package, file, start_byte)).copied()
    }

    /// Top-level named type of a package.
    pub fn lookup_type(&self, package: PackageId, name: &str) -> Option<TypeId> {
        self.package(package).types.get(name).copied()
    }

    /// Function-local type named `name` in scope at `node`.
    ///
    /// Walks the enclosing statement lists outwards, so an inner declaration
    /// shadows an outer one and both shadow package-level types. A local type
    /// is in scope from its own name onwards, which admits recursive types.
    pub fn local_type_at(&self, node: Node, name: &str, source: &[u8], package: PackageId, file: usize) -> Option<TypeId> {
        let mut current = node;
        while let Some(parent) = current.parent() {
            current = parent;
            if !matches!(
                parent.kind(),
                "block" | "statement_list" | "expression_case" | "default_case" | "type_case" | "communication_case"
            ) {
                continue;
            }
            let mut cursor = parent.walk();
            let found = parent
                .named_children(&mut cursor)
                .take_while(|stmt| stmt.start_byte() <= node.start_byte())
                .filter(|stmt| stmt.kind() == "type_declaration")
                .flat_map(|decl| {
                    let mut inner = decl.walk();
                    let names: Vec<Node> = decl
                        .named_children(&mut inner)
                        .filter_map(|spec| spec.child_by_field_name("name"))
                        .collect();
                    names
                })
                .filter(|spec_name| spec_name.start_byte() <= node.start_byte() && node_text(source, *spec_name) == name)
                .last()
                .and_then(|spec_name| self.local_types.get(&(package, file, spec_name.start_byte())).copied());
            if found.is_some() {
                return found;
            }
        }
        None
    }

    pub fn fields(&self, id: TypeId) -> &[FieldSymbol] {
        match self.named(id).kind {
            TypeKind::Struct(ref fields) => fields,
            _ => &[],
        }
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldSymbol> {
        self.fields(id.owner).get(id.index as usize)
    }

    /// Follow `type A B` and `type A = B` until a struct or a non-named type.
    pub fn underlying<'t>(&'t self, ty: &'t Ty) -> &'t Ty {
        let mut current = ty;
        for _ in 0..MAX_CHAIN {
            match current {
                Ty::Named(id) => match self.named(*id).kind {
                    TypeKind::Struct(_) => return current,
                    TypeKind::Defined(ref next) | TypeKind::Alias(ref next) => current = next,
                },
                _ => return current,
            }
        }
        current
    }

    /// Struct type reachable from `ty` through at most one pointer.
    pub fn struct_of(&self, ty: &Ty) -> Option<TypeId> {
        let base = self.underlying(ty);
        let base = self.underlying(base.deref());
        match base {
            Ty::Named(id) if matches!(self.named(*id).kind, TypeKind::Struct(_)) => Some(*id),
            _ => None,
        }
    }

    /// Name of the named type behind `ty`, seen through one pointer and aliases.
    ///
    /// Mirrors the receiver name of a `go/types` selection.
    pub fn receiver_name(&self, ty: &Ty) -> Option<&str> {
        let mut current = ty.deref();
        for _ in 0..MAX_CHAIN {
            match current {
                Ty::Named(id) => {
                    let named = self.named(*id);
                    match named.kind {
                        TypeKind::Alias(ref next) => current = next.deref(),
                        _ if named.name.is_empty() => return None,
                        _ => return Some(&named.name),
                    }
                }
                _ => return None,
            }
        }
        None
    }

    /// Resolve `name` as a field of `ty`, including promoted fields.
    ///
    /// Shallowest match wins, like Go's selector rules.
    pub fn lookup_field(&self, ty: &Ty, name: &str) -> Option<FieldId> {
        let start = self.struct_of(ty)?;
        let mut level = vec![start];
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();

        for _ in 0..MAX_EMBED_DEPTH {
            let mut next = Vec::new();
            for owner in level {
                if !visited.insert(owner) {
                    continue;
                }
                for (index, field) in self.fields(owner).iter().enumerate() {
                    if field.name == name {
                        return Some(FieldId {
                            owner,
                            index: index as u32,
                        });
                    }
                    if field.embedded {
                        if let Some(inner) = self.struct_of(&field.ty) {
                            next.push(inner);
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }
        None
    }

    /// Result types of method `name` on `ty`, including promoted methods.
    pub fn lookup_method(&self, ty: &Ty, name: &str) -> Option<&[Ty]> {
        let mut level: Vec<Ty> = vec![ty.deref().clone()];
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();

        for _ in 0..MAX_EMBED_DEPTH {
            let mut next = Vec::new();
            for candidate in level {
                let Ty::Named(id) = candidate else { continue };
                if !visited.insert(id) {
                    continue;
                }
                if let Some(results) = self.methods.get(&(id, name.to_string())) {
                    return Some(results);
                }
                // Methods of an alias target belong to the alias too.
                if let TypeKind::Alias(ref target) = self.named(id).kind {
                    next.push(target.deref().clone());
                }
                for field in self.fields(id).iter().filter(|f| f.embedded) {
                    next.push(field.ty.deref().clone());
                }
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }
        None
    }

    /// Element type produced by indexing a value of type `ty`.
    pub fn index_result(&self, ty: &Ty) -> Ty {
        let base = self.underlying(ty);
        let base = match base {
            Ty::Pointer(inner) => self.underlying(inner),
            other => other,
        };
        match base {
            Ty::Map(_, value) => (**value).clone(),
            Ty::Slice(elem) | Ty::Array(elem) => (**elem).clone(),
            _ => Ty::Unknown,
        }
    }

    /// Key and value types produced by ranging over `ty`.
    pub fn range_result(&self, ty: &Ty) -> (Ty, Ty) {
        let base = self.underlying(ty);
        let base = match base {
            Ty::Pointer(inner) => self.underlying(inner),
            other => other,
        };
        match base {
            Ty::Map(key, value) => ((**key).clone(), (**value).clone()),
            Ty::Slice(elem) | Ty::Array(elem) => (Ty::Unknown, (**elem).clone()),
            _ => (Ty::Unknown, Ty::Unknown),
        }
    }

    /// Resolve a syntactic type in the context of a file.
    ///
    /// Also accepts expression nodes that denote types (`new(pb.Person)` is
    /// parsed as a selector expression).
    pub fn resolve_type_node(&self, node: Node, source: &[u8], package: PackageId, file: usize) -> Ty {
        match node.kind() {
            "type_identifier" | "identifier" => {
                let name = node_text(source, node);
                match self.local_type_at(node, name, source, package, file) {
                    Some(id) => Ty::Named(id),
                    None => self.resolve_type_name(name, package, file),
                }
            }
            "qualified_type" | "selector_expression" => {
                let (pkg_field, name_field) = if node.kind() == "qualified_type" {
                    ("package", "name")
                } else {
                    ("operand", "field")
                };
                let (Some(pkg), Some(name)) =
                    (node.child_by_field_name(pkg_field), node.child_by_field_name(name_field))
                else {
                    return Ty::Unknown;
                };
                self.file_context(package, file)
                    .and_then(|ctx| ctx.imports.get(node_text(source, pkg)))
                    .and_then(|target| self.lookup_type(*target, node_text(source, name)))
                    .map_or(Ty::Unknown, Ty::Named)
            }
            "pointer_type" => first_named_child(node)
                .map_or(Ty::Unknown, |inner| Ty::pointer(self.resolve_type_node(inner, source, package, file))),
            "unary_expression" => {
                let is_star = node
                    .child_by_field_name("operator")
                    .is_some_and(|op| node_text(source, op) == "*");
                match node.child_by_field_name("operand") {
                    Some(inner) if is_star => Ty::pointer(self.resolve_type_node(inner, source, package, file)),
                    _ => Ty::Unknown,
                }
            }
            "slice_type" => node
                .child_by_field_name("element")
                .map_or(Ty::Unknown, |e| Ty::Slice(Box::new(self.resolve_type_node(e, source, package, file)))),
            "array_type" | "implicit_length_array_type" => node
                .child_by_field_name("element")
                .map_or(Ty::Unknown, |e| Ty::Array(Box::new(self.resolve_type_node(e, source, package, file)))),
            "map_type" => {
                let key = node
                    .child_by_field_name("key")
                    .map_or(Ty::Unknown, |k| self.resolve_type_node(k, source, package, file));
                let value = node
                    .child_by_field_name("value")
                    .map_or(Ty::Unknown, |v| self.resolve_type_node(v, source, package, file));
                Ty::Map(Box::new(key), Box::new(value))
            }
            "parenthesized_type" | "parenthesized_expression" => first_named_child(node)
                .map_or(Ty::Unknown, |inner| self.resolve_type_node(inner, source, package, file)),
            "generic_type" => node
                .child_by_field_name("type")
                .map_or(Ty::Unknown, |base| self.resolve_type_node(base, source, package, file)),
            "struct_type" => self
                .struct_at(package, file, node.start_byte())
                .map_or(Ty::Unknown, Ty::Named),
            _ => Ty::Unknown,
        }
    }

    fn resolve_type_name(&self, name: &str, package: PackageId, file: usize) -> Ty {
        if let Some(id) = self.lookup_type(package, name) {
            return Ty::Named(id);
        }
        self.file_context(package, file)
            .into_iter()
            .flat_map(|ctx| ctx.dot_imports.iter())
            .find_map(|dot| self.lookup_type(*dot, name))
            .map_or(Ty::Unknown, Ty::Named)
    }
}

/// First named child, without index-based child access.
pub(crate) fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let child = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
    child
}
