//! Modules and the import boundary.
//!
//! A [`Module`] owns everything the passes produce for one source file: the
//! statement list, scopes, identifiers, types and generic instances. Other
//! modules only ever see its [`ModuleInterface`], a summary of the exported
//! names with their types and constant values, obtained through a
//! [`ModuleResolver`].

use crate::analyze::generic::GenericRegistry;
use crate::ast::{Binding, Expr, ExprKind, Stmt};
use crate::scope::{IdentArena, IdentId, ScopeStack};
use crate::types::{TypeClass, TypeId, TypeTable};
use crate::value::ConstValue;
use cinder_bytecode::ExportKind;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Interfaces
// ============================================================================

/// Member of an exported object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMember {
    pub name: String,
    pub type_name: String,
    pub default: Option<ConstValue>,
    pub is_method: bool,
}

/// One exported name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub name: String,
    pub kind: ExportKind,
    /// Type of the value (for types, the type's own name)
    pub type_name: String,
    /// Members of an exported type
    pub members: Vec<ExportedMember>,
    /// Value of an exported constant, when known at compile time
    pub value: Option<ConstValue>,
    pub is_enum: bool,
}

/// What importers may know about a compiled module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleInterface {
    pub name: String,
    pub exports: Vec<ExportedSymbol>,
}

impl ModuleInterface {
    pub fn export(&self, name: &str) -> Option<&ExportedSymbol> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Supplies interfaces of modules compiled elsewhere.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<ModuleInterface>>;
}

/// In-memory resolver over registered interfaces.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    modules: FxHashMap<String, Arc<ModuleInterface>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, interface: ModuleInterface) {
        self.modules
            .insert(interface.name.clone(), Arc::new(interface));
    }

    pub fn insert_shared(&mut self, interface: Arc<ModuleInterface>) {
        self.modules.insert(interface.name.clone(), interface);
    }
}

impl ModuleResolver for InterfaceRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<ModuleInterface>> {
        self.modules.get(name).cloned()
    }
}

// ============================================================================
// Module state
// ============================================================================

/// Imported module and the export names this module references.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub module: String,
    pub interface: Arc<ModuleInterface>,
    /// Referenced names; position is the `LoadImport` export operand
    pub names: Vec<String>,
}

impl ImportEntry {
    /// Slot of `name` in this import's name table, adding it if new.
    pub fn slot(&mut self, name: &str) -> u16 {
        match self.names.iter().position(|n| n == name) {
            Some(i) => i as u16,
            None => {
                self.names.push(name.to_string());
                (self.names.len() - 1) as u16
            }
        }
    }
}

/// Declaration listed by an `export` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub name: String,
    pub kind: ExportKind,
    pub ident: IdentId,
}

/// A module and all state produced while compiling it.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub stmts: Vec<Stmt>,
    pub scopes: ScopeStack,
    pub idents: IdentArena,
    pub types: TypeTable,
    pub generics: GenericRegistry,
    pub imports: Vec<ImportEntry>,
    pub exports: Vec<ExportEntry>,
    /// Identifier stored in each global slot
    pub globals: Vec<IdentId>,
    /// `(module, export)` slot holding the prototype of an imported type
    pub type_imports: FxHashMap<TypeId, (u16, u16)>,
    /// Counter for hidden temporaries
    pub hidden_counter: u32,
}

impl Module {
    pub fn new(name: impl Into<String>, stmts: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            stmts,
            scopes: ScopeStack::new(),
            idents: IdentArena::default(),
            types: TypeTable::new(),
            generics: GenericRegistry::default(),
            imports: Vec::new(),
            exports: Vec::new(),
            globals: Vec::new(),
            type_imports: FxHashMap::default(),
            hidden_counter: 0,
        }
    }

    /// Module-level binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<IdentId> {
        self.scopes.module_scope().identifiers.get(name).copied()
    }

    /// Summary of the exported names for importers.
    pub fn interface(&self) -> ModuleInterface {
        let exports = self
            .exports
            .iter()
            .map(|entry| {
                let ident = &self.idents[entry.ident];
                let ty = self.types.resolve_alias(ident.symbol_type);
                let mut symbol = ExportedSymbol {
                    name: entry.name.clone(),
                    kind: entry.kind,
                    type_name: self.types.display(ty),
                    members: Vec::new(),
                    value: None,
                    is_enum: false,
                };
                match entry.kind {
                    ExportKind::Constant => symbol.value = ident.current_value.clone(),
                    ExportKind::Type => {
                        let declared = self.types.get(ty);
                        symbol.is_enum = declared.class == TypeClass::Enum;
                        symbol.members = declared
                            .members
                            .iter()
                            .map(|m| ExportedMember {
                                name: m.name.clone(),
                                type_name: self.member_type_name(ty, m.ty),
                                default: m.default.as_ref().and_then(literal_value),
                                is_method: m.is_method,
                            })
                            .collect();
                    }
                    ExportKind::Variable | ExportKind::Function => {}
                }
                symbol
            })
            .collect();
        ModuleInterface {
            name: self.name.clone(),
            exports,
        }
    }

    /// Value of `Enum.Member` when `expr` names a member of an enum.
    pub fn enum_member_value(&self, expr: &Expr) -> Option<ConstValue> {
        let ExprKind::Member { object, name } = &expr.kind else {
            return None;
        };
        let ExprKind::Ident {
            binding: Some(Binding::Ident(id)),
            ..
        } = &object.kind
        else {
            return None;
        };
        let ident = &self.idents[*id];
        if !ident.flags.is_enum {
            return None;
        }
        self.types
            .find_member(ident.symbol_type, name)?
            .default
            .as_ref()
            .and_then(literal_value)
    }

    fn member_type_name(&self, owner: TypeId, member: TypeId) -> String {
        // Enum members are typed as the enum itself; importers see numbers.
        if member == owner && self.types.class(owner) == TypeClass::Enum {
            "number".to_string()
        } else {
            self.types.display(self.types.resolve_alias(member))
        }
    }
}

/// Constant value of a literal expression.
pub fn literal_value(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Int(v) => Some(ConstValue::Number(*v as f64)),
        ExprKind::Float(v) => Some(ConstValue::Number(*v)),
        ExprKind::String(s) => Some(ConstValue::String(s.clone())),
        ExprKind::Bool(b) => Some(ConstValue::Bool(*b)),
        ExprKind::Null => Some(ConstValue::Null),
        _ => None,
    }
}

/// Literal expression for a constant value.
pub fn literal_expr(value: &ConstValue, span: crate::token::Span) -> Expr {
    let (kind, ty) = match value {
        ConstValue::Null => (ExprKind::Null, TypeId::NULL),
        ConstValue::Bool(b) => (ExprKind::Bool(*b), TypeId::BOOL),
        ConstValue::Number(n) => {
            let kind = if n.fract() == 0.0
                && n.is_finite()
                && n.abs() <= i64::MAX as f64
                && !(*n == 0.0 && n.is_sign_negative())
            {
                ExprKind::Int(*n as i64)
            } else {
                ExprKind::Float(*n)
            };
            (kind, TypeId::NUMBER)
        }
        ConstValue::String(s) => (ExprKind::String(s.clone()), TypeId::STRING),
    };
    Expr::typed(kind, span, ty)
}
