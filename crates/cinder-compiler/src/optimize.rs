//! The Optimize pass.
//!
//! Runs over analyzed statements and generic instance bodies:
//!
//! - folds operators whose operands are constants, reads of constants with
//!   a known value, and enum members;
//! - removes `if` branches whose condition is constant;
//! - classifies loop conditions so code generation can specialize
//!   constant-condition loops.
//!
//! The pass is idempotent and never changes the type of a node it keeps.

use crate::analyze::generic::InstanceBody;
use crate::ast::{
    Binding, Block, Expr, ExprKind, ForStmt, FunctionDecl, LogicalOp, LoopMode, Stmt, StmtKind,
    UnaryOp,
};
use crate::module::{literal_expr, literal_value, Module};
use crate::value::{eval_binary, eval_unary, ConstValue};

/// Counts of what one run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub folded: u32,
    pub branches_removed: u32,
    pub loops_specialized: u32,
}

/// Optimize a module's statements and instance bodies in place.
pub fn optimize_module(module: &mut Module) -> OptimizeStats {
    let mut stmts = std::mem::take(&mut module.stmts);
    let mut bodies = module.generics.take_bodies();

    let mut optimizer = Optimizer {
        module: &mut *module,
        stats: OptimizeStats::default(),
    };
    optimizer.optimize_stmts(&mut stmts);
    for (_, body) in &mut bodies {
        match body {
            InstanceBody::Function(func) => optimizer.optimize_function(func),
            InstanceBody::Type(decl) => {
                for method in &mut decl.methods {
                    optimizer.optimize_function(method);
                }
            }
            InstanceBody::Pending => {}
        }
    }
    let stats = optimizer.stats;

    module.generics.restore_bodies(bodies);
    module.stmts = stmts;
    tracing::debug!(
        module = %module.name,
        folded = stats.folded,
        branches_removed = stats.branches_removed,
        loops_specialized = stats.loops_specialized,
        "optimize complete"
    );
    stats
}

/// Value of an expression built only from literals and pure operators.
pub(crate) fn constant_value(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::Unary { op, operand } => Some(eval_unary(*op, &constant_value(operand)?)),
        ExprKind::Typeof(operand) => Some(eval_unary(UnaryOp::Typeof, &constant_value(operand)?)),
        ExprKind::Binary { op, lhs, rhs } => Some(eval_binary(
            *op,
            &constant_value(lhs)?,
            &constant_value(rhs)?,
        )),
        ExprKind::Logical { op, lhs, rhs } => {
            let lhs = constant_value(lhs)?;
            let rhs = constant_value(rhs)?;
            Some(match (op, lhs.truthy()) {
                (LogicalOp::And, true) | (LogicalOp::Or, false) => rhs,
                _ => lhs,
            })
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if constant_value(cond)?.truthy() {
                constant_value(then_expr)
            } else {
                constant_value(else_expr)
            }
        }
        _ => literal_value(expr),
    }
}

/// Loop mode for a condition: constant, or a sequence ending in a constant.
fn loop_mode(cond: Option<&Expr>) -> LoopMode {
    let Some(cond) = cond else {
        return LoopMode::AlwaysTrue;
    };
    let decisive = match &cond.kind {
        ExprKind::Sequence(items) => items.last(),
        _ => Some(cond),
    };
    match decisive.and_then(constant_value) {
        Some(value) if value.truthy() => LoopMode::AlwaysTrue,
        Some(_) => LoopMode::AlwaysFalse,
        None => LoopMode::Indeterminate,
    }
}

struct Optimizer<'m> {
    module: &'m mut Module,
    stats: OptimizeStats,
}

impl<'m> Optimizer<'m> {
    fn optimize_stmts(&mut self, stmts: &mut [Stmt]) {
        for stmt in stmts {
            self.optimize_stmt(stmt);
        }
    }

    fn optimize_block(&mut self, block: &mut Block) {
        self.optimize_stmts(&mut block.stmts);
    }

    fn optimize_function(&mut self, func: &mut FunctionDecl) {
        self.optimize_block(&mut func.body);
    }

    fn optimize_stmt(&mut self, stmt: &mut Stmt) {
        match &mut stmt.kind {
            StmtKind::Let(decl) => {
                if let Some(init) = &mut decl.init {
                    self.optimize_expr(init);
                }
            }
            StmtKind::Const(decl) => {
                if let Some(init) = &mut decl.init {
                    self.optimize_expr(init);
                    if let (Some(id), Some(value)) = (decl.ident, literal_value(init)) {
                        self.module.idents[id].current_value.get_or_insert(value);
                    }
                }
            }
            StmtKind::Function(func) => {
                if func.generics.is_empty() {
                    self.optimize_function(func);
                }
            }
            StmtKind::TypeDecl(decl) => {
                if decl.generics.is_empty() {
                    for method in &mut decl.methods {
                        self.optimize_function(method);
                    }
                }
            }
            StmtKind::Expression(expr) | StmtKind::Throw(expr) => self.optimize_expr(expr),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.optimize_expr(value);
                }
            }
            StmtKind::Block(block) => self.optimize_block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.optimize_expr(cond);
                self.optimize_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.optimize_stmt(else_branch);
                }
                if let Some(value) = literal_value(cond) {
                    let span = stmt.span;
                    let kept = if value.truthy() {
                        Some(std::mem::replace(then_branch.as_mut(), Stmt::new(StmtKind::Empty, span)))
                    } else {
                        else_branch.take().map(|b| *b)
                    };
                    *stmt = kept.unwrap_or_else(|| Stmt::new(StmtKind::Empty, span));
                    self.stats.branches_removed += 1;
                }
            }
            StmtKind::While { cond, body, mode } | StmtKind::DoWhile { body, cond, mode } => {
                self.optimize_expr(cond);
                self.optimize_stmt(body);
                self.specialize(mode, Some(cond));
            }
            StmtKind::For(ForStmt {
                init,
                cond,
                step,
                body,
                mode,
                ..
            }) => {
                if let Some(init) = init {
                    self.optimize_stmt(init);
                }
                if let Some(cond) = cond {
                    self.optimize_expr(cond);
                }
                if let Some(step) = step {
                    self.optimize_expr(step);
                }
                self.optimize_stmt(body);
                self.specialize(mode, cond.as_ref());
            }
            StmtKind::Try(try_stmt) => {
                self.optimize_block(&mut try_stmt.body);
                self.optimize_block(&mut try_stmt.handler);
            }
            StmtKind::Export(inner) => self.optimize_stmt(inner),
            StmtKind::Alias(_)
            | StmtKind::Enum(_)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Import { .. }
            | StmtKind::Empty => {}
        }
    }

    fn specialize(&mut self, mode: &mut LoopMode, cond: Option<&Expr>) {
        let specialized = loop_mode(cond);
        if *mode != specialized {
            *mode = specialized;
            if specialized != LoopMode::Indeterminate {
                self.stats.loops_specialized += 1;
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn optimize_expr(&mut self, expr: &mut Expr) {
        self.optimize_children(expr);
        if expr.kind.is_literal() {
            return;
        }
        if let Some(value) = self.fold(expr) {
            *expr = literal_expr(&value, expr.span);
            self.stats.folded += 1;
            return;
        }

        // Pure leading items of a sequence are dead.
        if let ExprKind::Sequence(items) = &mut expr.kind {
            let last = items.len().saturating_sub(1);
            let mut index = 0;
            items.retain(|item| {
                let keep = index == last || item.has_side_effects();
                index += 1;
                keep
            });
            if items.len() == 1 {
                if let Some(only) = items.pop() {
                    *expr = only;
                }
            }
        }
    }

    /// Constant value that replaces `expr`, with operands already folded.
    fn fold(&mut self, expr: &Expr) -> Option<ConstValue> {
        match &expr.kind {
            ExprKind::Ident {
                binding: Some(Binding::Ident(id)),
                ..
            } => {
                let ident = &self.module.idents[*id];
                if !ident.flags.is_const || ident.flags.is_type {
                    return None;
                }
                let value = ident.current_value.clone()?;
                let ident = &mut self.module.idents[*id];
                ident.use_count = ident.use_count.saturating_sub(1);
                Some(value)
            }
            ExprKind::Member { .. } => self.module.enum_member_value(expr),
            ExprKind::Ternary { .. } | ExprKind::Logical { .. } => None,
            _ => constant_value(expr),
        }
    }

    fn optimize_children(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Array(items) | ExprKind::Sequence(items) => {
                for item in items {
                    self.optimize_expr(item);
                }
            }
            ExprKind::Object(props) => {
                for (_, value) in props {
                    self.optimize_expr(value);
                }
            }
            ExprKind::Unary { operand, .. } | ExprKind::Typeof(operand) => {
                self.optimize_expr(operand)
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.optimize_expr(lhs);
                self.optimize_expr(rhs);
            }
            ExprKind::Logical { op, lhs, rhs } => {
                self.optimize_expr(lhs);
                self.optimize_expr(rhs);
                // A constant left side decides which operand is the result.
                if let Some(value) = literal_value(lhs) {
                    let take_rhs = matches!((op, value.truthy()), (LogicalOp::And, true) | (LogicalOp::Or, false));
                    let kept = if take_rhs { rhs } else { lhs };
                    let kept = std::mem::replace(kept.as_mut(), Expr::new(ExprKind::Null, expr.span));
                    *expr = kept;
                    self.stats.folded += 1;
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.optimize_lvalue(target);
                self.optimize_expr(value);
            }
            ExprKind::Update { target, .. } => self.optimize_lvalue(target),
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.optimize_expr(cond);
                self.optimize_expr(then_expr);
                self.optimize_expr(else_expr);
                if let Some(value) = literal_value(cond) {
                    let kept = if value.truthy() { then_expr } else { else_expr };
                    let kept = std::mem::replace(kept.as_mut(), Expr::new(ExprKind::Null, expr.span));
                    *expr = kept;
                    self.stats.branches_removed += 1;
                }
            }
            ExprKind::Member { object, .. } | ExprKind::Has { object, .. } => {
                self.optimize_expr(object)
            }
            ExprKind::Index { object, index } => {
                self.optimize_expr(object);
                self.optimize_expr(index);
            }
            ExprKind::Call { callee, args, .. } => {
                self.optimize_expr(callee);
                for arg in args {
                    self.optimize_expr(arg);
                }
            }
            ExprKind::New { prototype, args } => {
                self.optimize_expr(prototype);
                for arg in args.iter_mut().flatten() {
                    self.optimize_expr(arg);
                }
            }
            ExprKind::Function(func) => self.optimize_function(func),
            ExprKind::Bind { value, body, .. } => {
                self.optimize_expr(value);
                self.optimize_expr(body);
            }
            ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::String(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Ident { .. }
            | ExprKind::This
            | ExprKind::TypeRef { .. } => {}
        }
    }

    /// Subexpressions of an assignment target; the target itself is never
    /// folded.
    fn optimize_lvalue(&mut self, target: &mut Expr) {
        match &mut target.kind {
            ExprKind::Member { object, .. } => self.optimize_expr(object),
            ExprKind::Index { object, index } => {
                self.optimize_expr(object);
                self.optimize_expr(index);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;

    fn lit(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::default())
    }

    #[test]
    fn test_constant_value_of_operators() {
        let expr = lit(ExprKind::Binary {
            op: crate::ast::BinaryOp::Mul,
            lhs: Box::new(lit(ExprKind::Int(6))),
            rhs: Box::new(lit(ExprKind::Int(7))),
        });
        assert_eq!(constant_value(&expr), Some(ConstValue::Number(42.0)));

        let expr = lit(ExprKind::Logical {
            op: LogicalOp::Or,
            lhs: Box::new(lit(ExprKind::Null)),
            rhs: Box::new(lit(ExprKind::String("x".into()))),
        });
        assert_eq!(constant_value(&expr), Some(ConstValue::String("x".into())));
    }

    #[test]
    fn test_loop_modes() {
        assert_eq!(loop_mode(None), LoopMode::AlwaysTrue);
        assert_eq!(loop_mode(Some(&lit(ExprKind::Bool(false)))), LoopMode::AlwaysFalse);
        let seq = lit(ExprKind::Sequence(vec![
            lit(ExprKind::Ident {
                name: "f".into(),
                binding: None,
            }),
            lit(ExprKind::Int(1)),
        ]));
        assert_eq!(loop_mode(Some(&seq)), LoopMode::AlwaysTrue);
        let ident = lit(ExprKind::Ident {
            name: "x".into(),
            binding: None,
        });
        assert_eq!(loop_mode(Some(&ident)), LoopMode::Indeterminate);
    }

    fn optimized(source: &str) -> (Module, OptimizeStats, OptimizeStats) {
        let options = crate::options::CompileOptions {
            optimize: false,
            ..Default::default()
        };
        let mut unit = crate::unit::CompilationUnit::new(options);
        let outcome = unit.compile_module("opt", source);
        assert!(outcome.errors().next().is_none(), "{:?}", outcome.diagnostics);
        let mut module = unit.take_module("opt").expect("module kept");
        let first = optimize_module(&mut module);
        let second = optimize_module(&mut module);
        (module, first, second)
    }

    #[test]
    fn test_folds_constants_and_is_idempotent() {
        let (module, first, second) = optimized("const k = 2 * 3; let x = k + 1; x;");
        assert!(first.folded >= 1);
        assert_eq!(second, OptimizeStats::default());
        let printed = crate::ast::print_program(&module.stmts);
        assert!(printed.contains("let x = 7;"), "{}", printed);
    }

    #[test]
    fn test_enum_members_fold() {
        let (module, _, _) = optimized("enum Color { Red, Green = 5, Blue } let c = Color.Blue; c;");
        let printed = crate::ast::print_program(&module.stmts);
        assert!(printed.contains("let c = 6;"), "{}", printed);
    }

    #[test]
    fn test_dead_branch_removed() {
        let (module, first, _) = optimized("let x = 0; if (false) { x = 1; } else { x = 2; } x;");
        assert_eq!(first.branches_removed, 1);
        let printed = crate::ast::print_program(&module.stmts);
        assert!(!printed.contains("x = 1"), "{}", printed);
        assert!(printed.contains("x = 2"), "{}", printed);
    }

    #[test]
    fn test_loop_specialization() {
        let (module, first, _) = optimized("let i = 0; for (; true; i++) { if (i > 2) break; } while (false) { i = 9; }");
        assert_eq!(first.loops_specialized, 2);
        let modes: Vec<LoopMode> = module
            .stmts
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::For(f) => Some(f.mode),
                StmtKind::While { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![LoopMode::AlwaysTrue, LoopMode::AlwaysFalse]);
    }
}
