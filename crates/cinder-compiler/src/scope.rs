//! Scopes and the identifier arena.
//!
//! Identifiers live in a per-module [`IdentArena`] and are referenced from
//! the AST by [`IdentId`]. Scopes only map names to ids; they form a strict
//! LIFO stack owned by the module.

use crate::analyze::generic::TemplateId;
use crate::token::Span;
use crate::types::TypeId;
use crate::value::ConstValue;
use rustc_hash::FxHashMap;

/// Handle into the identifier arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Block,
    Loop,
    Function,
    GenericInstantiation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFlags {
    /// Scope of a template signature; type parameters are unbound
    pub uninstantiated_generic: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentFlags {
    pub is_const: bool,
    pub is_generic: bool,
    /// Module-level variable stored in a global slot
    pub is_global: bool,
    /// Compiler-introduced temporary
    pub is_hidden: bool,
    pub is_parameter: bool,
    pub is_function: bool,
    pub is_type: bool,
    pub is_import: bool,
    pub is_enum: bool,
}

/// A declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub symbol_type: TypeId,
    pub flags: IdentFlags,
    pub global_index: Option<u32>,
    pub use_count: u32,
    /// Known constant value, used for propagation
    pub current_value: Option<ConstValue>,
    /// Nesting depth of the declaring function; 0 is module code
    pub function_depth: u32,
    pub span: Span,
    /// `(module, export)` for named imports
    pub import_slot: Option<(u16, u16)>,
    /// Import table index for namespace imports
    pub namespace: Option<u16>,
    /// Template for generic functions and types
    pub template: Option<TemplateId>,
}

impl Identifier {
    pub fn new(name: impl Into<String>, symbol_type: TypeId, span: Span) -> Self {
        Self {
            name: name.into(),
            symbol_type,
            flags: IdentFlags::default(),
            global_index: None,
            use_count: 0,
            current_value: None,
            function_depth: 0,
            span,
            import_slot: None,
            namespace: None,
            template: None,
        }
    }

    /// Whether the identifier occupies a runtime stack slot.
    pub fn is_stack_local(&self) -> bool {
        let f = &self.flags;
        !(f.is_global || f.is_type || f.is_import || f.is_enum || f.is_generic)
    }

    /// Whether culling may drop this identifier: an unused stack local that
    /// is not a parameter, not compiler-generated and not named `_...`.
    pub fn is_cullable(&self) -> bool {
        self.use_count == 0
            && self.is_stack_local()
            && !self.flags.is_parameter
            && !self.flags.is_hidden
            && !self.name.starts_with('_')
    }
}

/// Per-module storage for identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentArena {
    idents: Vec<Identifier>,
}

impl IdentArena {
    pub fn alloc(&mut self, ident: Identifier) -> IdentId {
        let id = IdentId(self.idents.len() as u32);
        self.idents.push(ident);
        id
    }

    pub fn get(&self, id: IdentId) -> &Identifier {
        &self.idents[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: IdentId) -> &mut Identifier {
        &mut self.idents[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdentId, &Identifier)> {
        self.idents
            .iter()
            .enumerate()
            .map(|(i, ident)| (IdentId(i as u32), ident))
    }
}

impl std::ops::Index<IdentId> for IdentArena {
    type Output = Identifier;

    fn index(&self, id: IdentId) -> &Identifier {
        self.get(id)
    }
}

impl std::ops::IndexMut<IdentId> for IdentArena {
    fn index_mut(&mut self, id: IdentId) -> &mut Identifier {
        self.get_mut(id)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub identifiers: FxHashMap<String, IdentId>,
    pub flags: ScopeFlags,
    /// Declaration order
    pub declared: Vec<IdentId>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            identifiers: FxHashMap::default(),
            flags: ScopeFlags::default(),
            declared: Vec::new(),
        }
    }
}

/// Stack of open scopes.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Stack holding only the module scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Module)],
        }
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    pub fn push_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Close the innermost scope. The module scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current(&self) -> &Scope {
        // The module scope is always present.
        &self.scopes[self.scopes.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn module_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn is_module_level(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<IdentId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.identifiers.get(name).copied())
    }

    /// Binding of `name` in the innermost scope only.
    pub fn lookup_local(&self, name: &str) -> Option<IdentId> {
        self.current().identifiers.get(name).copied()
    }

    /// Whether any open scope is a template signature.
    pub fn in_uninstantiated_generic(&self) -> bool {
        self.scopes.iter().any(|s| s.flags.uninstantiated_generic)
    }

    /// Bind `name` in the innermost scope. Fails with the existing binding
    /// when the name is already declared there.
    pub fn declare(&mut self, name: &str, id: IdentId) -> Result<(), IdentId> {
        let scope = self.current_mut();
        if let Some(existing) = scope.identifiers.get(name) {
            return Err(*existing);
        }
        scope.identifiers.insert(name.to_string(), id);
        scope.declared.push(id);
        Ok(())
    }

    /// Detach every scope above the module scope, for visiting a generic
    /// instantiation in a clean environment.
    pub fn split_off_nested(&mut self) -> Vec<Scope> {
        self.scopes.split_off(1)
    }

    /// Reattach scopes removed by [`split_off_nested`].
    ///
    /// [`split_off_nested`]: ScopeStack::split_off_nested
    pub fn restore_nested(&mut self, nested: Vec<Scope>) {
        self.scopes.truncate(1);
        self.scopes.extend(nested);
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_lifo() {
        let mut arena = IdentArena::default();
        let mut scopes = ScopeStack::new();

        let outer = arena.alloc(Identifier::new("x", TypeId::NUMBER, Span::default()));
        scopes.declare("x", outer).unwrap();

        scopes.push(ScopeKind::Block);
        let inner = arena.alloc(Identifier::new("x", TypeId::STRING, Span::default()));
        scopes.declare("x", inner).unwrap();
        assert_eq!(scopes.lookup("x"), Some(inner));

        let closed = scopes.pop().unwrap();
        assert_eq!(closed.declared, vec![inner]);
        assert_eq!(scopes.lookup("x"), Some(outer));
        assert!(scopes.pop().is_none());
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut arena = IdentArena::default();
        let mut scopes = ScopeStack::new();
        let a = arena.alloc(Identifier::new("a", TypeId::ANY, Span::default()));
        let b = arena.alloc(Identifier::new("a", TypeId::ANY, Span::default()));
        scopes.declare("a", a).unwrap();
        assert_eq!(scopes.declare("a", b), Err(a));
    }

    #[test]
    fn test_split_and_restore() {
        let mut arena = IdentArena::default();
        let mut scopes = ScopeStack::new();
        scopes.push(ScopeKind::Function);
        let local = arena.alloc(Identifier::new("local", TypeId::ANY, Span::default()));
        scopes.declare("local", local).unwrap();

        let nested = scopes.split_off_nested();
        assert!(scopes.is_module_level());
        assert_eq!(scopes.lookup("local"), None);

        scopes.restore_nested(nested);
        assert_eq!(scopes.lookup("local"), Some(local));
    }
}
