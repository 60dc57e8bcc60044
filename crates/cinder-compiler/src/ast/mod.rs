//! Abstract syntax tree for Cinder.
//!
//! Statements and expressions are closed sum types. Every node is owned by
//! its parent; the statement list of a module is owned by the
//! [`Module`](crate::module::Module). Fields filled in by semantic analysis
//! (`ty`, `ident`, `scope_locals`, loop modes) start out empty.

mod printer;

pub use printer::{print_expr, print_program};

use crate::analyze::generic::InstanceId;
use crate::scope::IdentId;
use crate::token::Span;
use crate::types::TypeId;
pub use cinder_bytecode::{BinaryOp, UnaryOp};

// ============================================================================
// Shared pieces
// ============================================================================

/// Type annotation as written: `number`, `Box<string>`, `function`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub name: String,
    pub args: Vec<TypeAnnotation>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub span: Span,
    pub ident: Option<IdentId>,
}

/// Braced statement list with its own scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
    /// Identifiers declared directly in this scope, recorded when the scope
    /// closes during analysis.
    pub scope_locals: Vec<IdentId>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Self {
            stmts,
            span,
            scope_locals: Vec::new(),
        }
    }
}

/// Function declaration, function expression or arrow function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for anonymous function expressions
    pub name: Option<String>,
    pub generics: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    /// Arrow bodies written as an expression are stored as `{ return e; }`.
    pub body: Block,
    pub is_arrow: bool,
    pub span: Span,
    /// Binding for named declarations
    pub ident: Option<IdentId>,
    /// Declared inside a `type` body
    pub is_method: bool,
    /// Function type, set by analysis
    pub ty: Option<TypeId>,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// `let` / `const` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub name_span: Span,
    pub annotation: Option<TypeAnnotation>,
    pub init: Option<Expr>,
    pub ident: Option<IdentId>,
}

/// Data member of an object type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDecl {
    pub name: String,
    pub annotation: Option<TypeAnnotation>,
    pub default: Option<Expr>,
    pub span: Span,
}

/// `type Name<T> : Proto { members; methods }`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub prototype: Option<TypeAnnotation>,
    pub members: Vec<MemberDecl>,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
    pub ty: Option<TypeId>,
}

/// `type Name<T> = Target;`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub name: String,
    pub generics: Vec<GenericParam>,
    pub target: TypeAnnotation,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub span: Span,
    pub ty: Option<TypeId>,
}

/// How a loop's condition behaves, decided by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Condition evaluated every iteration
    #[default]
    Indeterminate,
    /// Condition is constant true (or absent)
    AlwaysTrue,
    /// Condition is constant false
    AlwaysFalse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Box<Stmt>,
    pub mode: LoopMode,
    /// Locals declared by the initializer
    pub scope_locals: Vec<IdentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub span: Span,
    pub ident: Option<IdentId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportClause {
    /// `import { a, b } from "m";`
    Named(Vec<ImportName>),
    /// `import "m" as ns;`
    Namespace(ImportName),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub param: String,
    pub param_span: Span,
    pub param_ident: Option<IdentId>,
    pub handler: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let(VarDecl),
    Const(VarDecl),
    Function(FunctionDecl),
    TypeDecl(TypeDecl),
    Alias(AliasDecl),
    Enum(EnumDecl),
    Expression(Expr),
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        mode: LoopMode,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        mode: LoopMode,
    },
    For(ForStmt),
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Try(TryStmt),
    Import {
        clause: ImportClause,
        module: String,
    },
    Export(Box<Stmt>),
    Empty,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Resolved type; `None` until visited.
    pub ty: Option<TypeId>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    /// Already-analyzed node, used by rewrites.
    pub fn typed(kind: ExprKind, span: Span, ty: TypeId) -> Self {
        Self {
            kind,
            span,
            ty: Some(ty),
        }
    }
}

/// What an identifier expression refers to after analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Entry in the module's identifier arena
    Ident(IdentId),
    /// Export of an imported module
    Import { module: u16, export: u16 },
    /// Instantiated generic function
    Instance(InstanceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    Ident {
        name: String,
        binding: Option<Binding>,
    },
    This,
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `target = value` or compound `target op= value`
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Member {
        object: Box<Expr>,
        name: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeAnnotation>,
        args: Vec<Expr>,
        /// Result is the receiver rather than the method's return value
        yields_receiver: bool,
    },
    /// `new P`, `new P(args)`; `args` is `None` without parentheses
    New {
        prototype: Box<Expr>,
        args: Option<Vec<Expr>>,
    },
    Has {
        object: Box<Expr>,
        name: String,
    },
    Function(Box<FunctionDecl>),
    /// Explicit generic instantiation in expression position: `Box<number>`
    TypeRef {
        name: String,
        args: Vec<TypeAnnotation>,
        binding: Option<Binding>,
    },
    /// Hidden temporary binding introduced by rewrites:
    /// `value` is bound to `name` while `body` is evaluated.
    Bind {
        name: String,
        ident: Option<IdentId>,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    Typeof(Box<Expr>),
}

impl ExprKind {
    /// Literal node kinds
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ExprKind::Int(_)
                | ExprKind::Float(_)
                | ExprKind::String(_)
                | ExprKind::Bool(_)
                | ExprKind::Null
        )
    }
}

impl Expr {
    /// Whether evaluating this expression can have observable effects.
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident { .. }
            | ExprKind::This
            | ExprKind::Function(_)
            | ExprKind::TypeRef { .. } => false,
            ExprKind::Array(items) => items.iter().any(Expr::has_side_effects),
            ExprKind::Object(props) => props.iter().any(|(_, e)| e.has_side_effects()),
            ExprKind::Unary { operand, .. } | ExprKind::Typeof(operand) => {
                operand.has_side_effects()
            }
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Logical { lhs, rhs, .. } => {
                lhs.has_side_effects() || rhs.has_side_effects()
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => cond.has_side_effects() || then_expr.has_side_effects() || else_expr.has_side_effects(),
            ExprKind::Sequence(items) => items.iter().any(Expr::has_side_effects),
            ExprKind::Member { object, .. } | ExprKind::Has { object, .. } => {
                object.has_side_effects()
            }
            ExprKind::Index { object, index } => {
                object.has_side_effects() || index.has_side_effects()
            }
            ExprKind::Assign { .. }
            | ExprKind::Update { .. }
            | ExprKind::Call { .. }
            | ExprKind::New { .. }
            | ExprKind::Bind { .. } => true,
        }
    }
}
