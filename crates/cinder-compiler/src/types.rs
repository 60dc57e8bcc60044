//! Type system.
//!
//! Types are interned per module in a [`TypeTable`] and referred to by
//! [`TypeId`]. Identity comparison is by id; [`TypeTable::is_assignable`]
//! implements the language's permissive structural rules: `any`, errors,
//! placeholders and unbound type parameters accept everything, `null` fits
//! any object-like type, and object types are compatible with every type on
//! their prototype chain.

use crate::analyze::generic::TemplateId;
use crate::ast::Expr;
use rustc_hash::FxHashMap;
use std::fmt;

/// Handle to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Sentinel for nodes that failed analysis
    pub const ERROR: TypeId = TypeId(0);
    pub const ANY: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const NULL: TypeId = TypeId(3);
    pub const BOOL: TypeId = TypeId(4);
    pub const NUMBER: TypeId = TypeId(5);
    pub const STRING: TypeId = TypeId(6);
    /// Any callable
    pub const FUNCTION: TypeId = TypeId(7);
    /// Root object type
    pub const OBJECT: TypeId = TypeId(8);
    pub const ARRAY: TypeId = TypeId(9);

    pub fn is_error(self) -> bool {
        self == TypeId::ERROR
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Primitive,
    Object,
    /// Uninstantiated generic function or object type
    Generic,
    Alias,
    /// `T` inside an uninstantiated template
    GenericParameter,
    Function,
    Enum,
    Any,
    /// Declared but not yet defined
    Placeholder,
    Error,
}

/// Data member or method of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub ty: TypeId,
    /// Constant initial value stored on the prototype
    pub default: Option<Expr>,
    pub is_method: bool,
}

/// An interned type.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolType {
    pub name: String,
    pub class: TypeClass,
    pub members: Vec<Member>,
    /// Value a declared-but-uninitialized variable of this type starts with
    pub default_value: Option<Expr>,
    /// Parent object type
    pub prototype: Option<TypeId>,
    /// Number of type parameters (generics)
    pub arity: usize,
    /// Template backing a `Generic` type
    pub template: Option<TemplateId>,
    /// Parameter types (functions)
    pub params: Vec<TypeId>,
    /// Return type (functions)
    pub ret: Option<TypeId>,
    /// Aliased type
    pub target: Option<TypeId>,
    /// Type arguments this type was instantiated with
    pub bindings: Vec<TypeId>,
}

impl SymbolType {
    pub fn new(name: impl Into<String>, class: TypeClass) -> Self {
        Self {
            name: name.into(),
            class,
            members: Vec::new(),
            default_value: None,
            prototype: None,
            arity: 0,
            template: None,
            params: Vec::new(),
            ret: None,
            target: None,
            bindings: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Same name and member list.
    pub fn structurally_equal(&self, other: &SymbolType) -> bool {
        self.name == other.name
            && self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .zip(&other.members)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty)
    }
}

/// Upper bound on alias and prototype chain walks.
const MAX_CHAIN: usize = 64;

/// Per-module type interner.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<SymbolType>,
    by_name: FxHashMap<String, TypeId>,
}

impl TypeTable {
    /// Table pre-populated with the built-in types at their fixed ids.
    pub fn new() -> Self {
        use crate::ast::ExprKind;
        use crate::token::Span;

        let mut table = Self {
            types: Vec::new(),
            by_name: FxHashMap::default(),
        };
        let literal = |kind: ExprKind| Some(Expr::new(kind, Span::default()));

        let builtins = [
            ("<error>", TypeClass::Error, None),
            ("any", TypeClass::Any, None),
            ("void", TypeClass::Primitive, None),
            ("null", TypeClass::Primitive, None),
            ("bool", TypeClass::Primitive, literal(ExprKind::Bool(false))),
            ("number", TypeClass::Primitive, literal(ExprKind::Int(0))),
            ("string", TypeClass::Primitive, literal(ExprKind::String(String::new()))),
            ("function", TypeClass::Function, None),
            ("object", TypeClass::Object, None),
            ("array", TypeClass::Object, None),
        ];
        for (name, class, default_value) in builtins {
            let mut ty = SymbolType::new(name, class);
            ty.default_value = default_value;
            table.add(ty);
        }
        table
    }

    /// Intern a new type. Its name becomes resolvable through [`lookup`].
    ///
    /// [`lookup`]: TypeTable::lookup
    pub fn add(&mut self, ty: SymbolType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(ty.name.clone(), id);
        self.types.push(ty);
        id
    }

    /// Intern a type without making it resolvable by name.
    pub fn add_anonymous(&mut self, ty: SymbolType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Replace the definition behind `id`, typically filling a placeholder.
    pub fn replace(&mut self, id: TypeId, ty: SymbolType) {
        self.types[id.0 as usize] = ty;
    }

    pub fn get(&self, id: TypeId) -> &SymbolType {
        &self.types[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut SymbolType {
        &mut self.types[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    pub fn class(&self, id: TypeId) -> TypeClass {
        self.get(id).class
    }

    /// Function type for a signature, interned by its printed form.
    pub fn function_type(&mut self, params: &[TypeId], ret: TypeId) -> TypeId {
        let names: Vec<&str> = params.iter().map(|p| self.name(*p)).collect();
        let name = format!("function({}): {}", names.join(", "), self.name(ret));
        if let Some(id) = self.lookup(&name) {
            return id;
        }
        let mut ty = SymbolType::new(name, TypeClass::Function);
        ty.params = params.to_vec();
        ty.ret = Some(ret);
        self.add(ty)
    }

    /// Follow alias targets to the underlying type.
    pub fn resolve_alias(&self, mut id: TypeId) -> TypeId {
        for _ in 0..MAX_CHAIN {
            let ty = self.get(id);
            match (ty.class, ty.target) {
                (TypeClass::Alias, Some(target)) => id = target,
                _ => return id,
            }
        }
        TypeId::ERROR
    }

    /// Find a member on `id` or anywhere on its prototype chain.
    pub fn find_member(&self, id: TypeId, name: &str) -> Option<&Member> {
        let mut current = Some(self.resolve_alias(id));
        for _ in 0..MAX_CHAIN {
            let ty = self.get(current?);
            if let Some(member) = ty.member(name) {
                return Some(member);
            }
            current = ty.prototype.map(|p| self.resolve_alias(p));
        }
        None
    }

    /// Whether walking the prototype chain from `start` reaches `target`.
    /// `start` itself counts.
    pub fn prototype_chain_reaches(&self, start: TypeId, target: TypeId) -> bool {
        let mut current = Some(self.resolve_alias(start));
        for _ in 0..self.types.len() {
            match current {
                Some(id) if id == target => return true,
                Some(id) => current = self.get(id).prototype.map(|p| self.resolve_alias(p)),
                None => return false,
            }
        }
        false
    }

    /// Types that accept any value and disable further checks.
    pub fn is_permissive(&self, id: TypeId) -> bool {
        matches!(
            self.class(self.resolve_alias(id)),
            TypeClass::Any | TypeClass::Error | TypeClass::Placeholder | TypeClass::GenericParameter
        )
    }

    /// Types whose values are objects (and so accept `null`).
    pub fn is_object_like(&self, id: TypeId) -> bool {
        let id = self.resolve_alias(id);
        matches!(
            self.class(id),
            TypeClass::Object | TypeClass::Function | TypeClass::Generic
        )
    }

    /// Whether a value of type `source` may be stored where `target` is
    /// expected.
    pub fn is_assignable(&self, target: TypeId, source: TypeId) -> bool {
        let target = self.resolve_alias(target);
        let source = self.resolve_alias(source);
        if target == source || self.is_permissive(target) || self.is_permissive(source) {
            return true;
        }
        if source == TypeId::NULL {
            return self.is_object_like(target);
        }

        let (target_class, source_class) = (self.class(target), self.class(source));
        match (target_class, source_class) {
            (TypeClass::Function, TypeClass::Function) => {
                target == TypeId::FUNCTION || source == TypeId::FUNCTION || {
                    let (t, s) = (self.get(target), self.get(source));
                    t.params.len() == s.params.len()
                        && t.params
                            .iter()
                            .zip(&s.params)
                            .all(|(tp, sp)| self.is_assignable(*sp, *tp))
                        && match (t.ret, s.ret) {
                            (Some(tr), Some(sr)) => {
                                tr == TypeId::VOID || self.is_assignable(tr, sr)
                            }
                            _ => true,
                        }
                }
            }
            (TypeClass::Enum, _) if source == TypeId::NUMBER => true,
            (_, TypeClass::Enum) if target == TypeId::NUMBER => true,
            (TypeClass::Object, TypeClass::Object) => {
                if target == TypeId::OBJECT {
                    return true;
                }
                let mut current = self.get(source).prototype;
                for _ in 0..MAX_CHAIN {
                    match current.map(|p| self.resolve_alias(p)) {
                        Some(p) if p == target => return true,
                        Some(p) => current = self.get(p).prototype,
                        None => return false,
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn display(&self, id: TypeId) -> String {
        self.name(id).to_string()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(table: &mut TypeTable, name: &str, parent: Option<TypeId>) -> TypeId {
        let mut ty = SymbolType::new(name, TypeClass::Object);
        ty.prototype = parent;
        table.add(ty)
    }

    #[test]
    fn test_builtin_ids_are_fixed() {
        let table = TypeTable::new();
        assert_eq!(table.lookup("number"), Some(TypeId::NUMBER));
        assert_eq!(table.lookup("string"), Some(TypeId::STRING));
        assert_eq!(table.lookup("array"), Some(TypeId::ARRAY));
        assert_eq!(table.class(TypeId::ANY), TypeClass::Any);
    }

    #[test]
    fn test_primitive_assignability() {
        let table = TypeTable::new();
        assert!(table.is_assignable(TypeId::NUMBER, TypeId::NUMBER));
        assert!(!table.is_assignable(TypeId::NUMBER, TypeId::STRING));
        assert!(table.is_assignable(TypeId::NUMBER, TypeId::ANY));
        assert!(table.is_assignable(TypeId::STRING, TypeId::ERROR));
        assert!(!table.is_assignable(TypeId::NUMBER, TypeId::NULL));
    }

    #[test]
    fn test_prototype_chain_assignability() {
        let mut table = TypeTable::new();
        let base = object(&mut table, "Base", None);
        let derived = object(&mut table, "Derived", Some(base));
        assert!(table.is_assignable(base, derived));
        assert!(!table.is_assignable(derived, base));
        assert!(table.is_assignable(TypeId::OBJECT, derived));
        assert!(table.is_assignable(derived, TypeId::NULL));
    }

    #[test]
    fn test_alias_resolution() {
        let mut table = TypeTable::new();
        let mut alias = SymbolType::new("Num", TypeClass::Alias);
        alias.target = Some(TypeId::NUMBER);
        let num = table.add(alias);
        assert_eq!(table.resolve_alias(num), TypeId::NUMBER);
        assert!(table.is_assignable(num, TypeId::NUMBER));
    }

    #[test]
    fn test_find_member_walks_prototypes() {
        let mut table = TypeTable::new();
        let base = object(&mut table, "Base", None);
        table.get_mut(base).members.push(Member {
            name: "$construct".into(),
            ty: TypeId::FUNCTION,
            default: None,
            is_method: true,
        });
        let derived = object(&mut table, "Derived", Some(base));
        assert!(table.find_member(derived, "$construct").is_some());
        assert!(table.find_member(derived, "missing").is_none());
    }

    #[test]
    fn test_prototype_chain_reaches() {
        let mut table = TypeTable::new();
        let base = object(&mut table, "Base", None);
        let derived = object(&mut table, "Derived", Some(base));
        let other = object(&mut table, "Other", None);
        assert!(table.prototype_chain_reaches(derived, base));
        assert!(table.prototype_chain_reaches(base, base));
        assert!(!table.prototype_chain_reaches(base, derived));
        assert!(!table.prototype_chain_reaches(derived, other));
    }

    #[test]
    fn test_function_types_are_interned() {
        let mut table = TypeTable::new();
        let a = table.function_type(&[TypeId::NUMBER], TypeId::STRING);
        let b = table.function_type(&[TypeId::NUMBER], TypeId::STRING);
        assert_eq!(a, b);
        assert_eq!(table.name(a), "function(number): string");
        assert!(table.is_assignable(TypeId::FUNCTION, a));
    }
}
