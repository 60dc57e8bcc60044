//! Source printer for the AST.
//!
//! Output is canonical: compound expressions are fully parenthesized, so
//! printing a re-parsed program yields the same text again.

use super::*;
use crate::value::format_number;
use std::fmt::Write;

/// Print a statement list as source text.
pub fn print_program(stmts: &[Stmt]) -> String {
    let mut printer = Printer::default();
    for stmt in stmts {
        printer.stmt(stmt);
    }
    printer.out
}

/// Print a single expression.
pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr);
    printer.out
}

/// Property keys that can be written without quotes.
fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        self.stmt_inline(stmt);
        self.out.push('\n');
    }

    /// Statement text without leading indentation or trailing newline.
    fn stmt_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let(decl) => {
                self.var_decl("let", decl);
                self.out.push(';');
            }
            StmtKind::Const(decl) => {
                self.var_decl("const", decl);
                self.out.push(';');
            }
            StmtKind::Function(func) => self.function(func),
            StmtKind::TypeDecl(decl) => self.type_decl(decl),
            StmtKind::Alias(alias) => {
                let _ = write!(self.out, "type {}", alias.name);
                self.generics(&alias.generics);
                self.out.push_str(" = ");
                self.annotation(&alias.target);
                self.out.push(';');
            }
            StmtKind::Enum(decl) => {
                let _ = write!(self.out, "enum {} {{ ", decl.name);
                for (i, member) in decl.members.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.out.push_str(&member.name);
                    if let Some(value) = &member.value {
                        self.out.push_str(" = ");
                        self.expr(value);
                    }
                }
                self.out.push_str(" }");
            }
            StmtKind::Expression(expr) => {
                self.expr(expr);
                self.out.push(';');
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.out.push_str("if (");
                self.expr(cond);
                self.out.push_str(") ");
                self.stmt_inline(then_branch);
                if let Some(else_branch) = else_branch {
                    self.out.push_str(" else ");
                    self.stmt_inline(else_branch);
                }
            }
            StmtKind::While { cond, body, .. } => {
                self.out.push_str("while (");
                self.expr(cond);
                self.out.push_str(") ");
                self.stmt_inline(body);
            }
            StmtKind::DoWhile { body, cond, .. } => {
                self.out.push_str("do ");
                self.stmt_inline(body);
                self.out.push_str(" while (");
                self.expr(cond);
                self.out.push_str(");");
            }
            StmtKind::For(for_stmt) => {
                self.out.push_str("for (");
                match for_stmt.init.as_deref() {
                    Some(Stmt {
                        kind: StmtKind::Let(decl),
                        ..
                    }) => self.var_decl("let", decl),
                    Some(Stmt {
                        kind: StmtKind::Expression(expr),
                        ..
                    }) => self.expr(expr),
                    _ => {}
                }
                self.out.push(';');
                if let Some(cond) = &for_stmt.cond {
                    self.out.push(' ');
                    self.expr(cond);
                }
                self.out.push(';');
                if let Some(step) = &for_stmt.step {
                    self.out.push(' ');
                    self.expr(step);
                }
                self.out.push_str(") ");
                self.stmt_inline(&for_stmt.body);
            }
            StmtKind::Break => self.out.push_str("break;"),
            StmtKind::Continue => self.out.push_str("continue;"),
            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
                self.out.push(';');
            }
            StmtKind::Throw(value) => {
                self.out.push_str("throw ");
                self.expr(value);
                self.out.push(';');
            }
            StmtKind::Try(try_stmt) => {
                self.out.push_str("try ");
                self.block(&try_stmt.body);
                let _ = write!(self.out, " catch ({}) ", try_stmt.param);
                self.block(&try_stmt.handler);
            }
            StmtKind::Import { clause, module } => match clause {
                ImportClause::Named(names) => {
                    let list: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
                    let _ = write!(self.out, "import {{ {} }} from ", list.join(", "));
                    self.string(module);
                    self.out.push(';');
                }
                ImportClause::Namespace(ns) => {
                    self.out.push_str("import ");
                    self.string(module);
                    let _ = write!(self.out, " as {};", ns.name);
                }
            },
            StmtKind::Export(inner) => {
                self.out.push_str("export ");
                self.stmt_inline(inner);
            }
            StmtKind::Empty => self.out.push(';'),
        }
    }

    fn var_decl(&mut self, keyword: &str, decl: &VarDecl) {
        let _ = write!(self.out, "{} {}", keyword, decl.name);
        if let Some(annotation) = &decl.annotation {
            self.out.push_str(": ");
            self.annotation(annotation);
        }
        if let Some(init) = &decl.init {
            self.out.push_str(" = ");
            self.expr(init);
        }
    }

    fn block(&mut self, block: &Block) {
        if block.stmts.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn generics(&mut self, generics: &[GenericParam]) {
        if generics.is_empty() {
            return;
        }
        let names: Vec<&str> = generics.iter().map(|g| g.name.as_str()).collect();
        let _ = write!(self.out, "<{}>", names.join(", "));
    }

    fn annotation(&mut self, annotation: &TypeAnnotation) {
        self.out.push_str(&annotation.name);
        self.type_args(&annotation.args);
    }

    fn type_args(&mut self, args: &[TypeAnnotation]) {
        if args.is_empty() {
            return;
        }
        self.out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.annotation(arg);
        }
        self.out.push('>');
    }

    fn params(&mut self, params: &[Param]) {
        self.out.push('(');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&param.name);
            if let Some(annotation) = &param.annotation {
                self.out.push_str(": ");
                self.annotation(annotation);
            }
        }
        self.out.push(')');
    }

    fn function(&mut self, func: &FunctionDecl) {
        if func.is_arrow {
            self.params(&func.params);
            self.out.push_str(" => ");
            self.block(&func.body);
            return;
        }
        self.out.push_str("function");
        if let Some(name) = &func.name {
            self.out.push(' ');
            self.out.push_str(name);
        }
        self.generics(&func.generics);
        if func.name.is_none() {
            self.out.push(' ');
        }
        self.params(&func.params);
        if let Some(ret) = &func.return_type {
            self.out.push_str(": ");
            self.annotation(ret);
        }
        self.out.push(' ');
        self.block(&func.body);
    }

    fn type_decl(&mut self, decl: &TypeDecl) {
        let _ = write!(self.out, "type {}", decl.name);
        self.generics(&decl.generics);
        if let Some(proto) = &decl.prototype {
            self.out.push_str(" : ");
            self.annotation(proto);
        }
        if decl.members.is_empty() && decl.methods.is_empty() {
            self.out.push_str(" {}");
            return;
        }
        self.out.push_str(" {\n");
        self.indent += 1;
        for member in &decl.members {
            self.line_start();
            self.out.push_str(&member.name);
            if let Some(annotation) = &member.annotation {
                self.out.push_str(": ");
                self.annotation(annotation);
            }
            if let Some(default) = &member.default {
                self.out.push_str(" = ");
                self.expr(default);
            }
            self.out.push_str(";\n");
        }
        for method in &decl.methods {
            self.line_start();
            self.function(method);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                '\0' => self.out.push_str("\\0"),
                '\\' => self.out.push_str("\\\\"),
                '"' => self.out.push_str("\\\""),
                c if (c as u32) < 0x20 => {
                    let _ = write!(self.out, "\\u{:04x}", c as u32);
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }

    fn args(&mut self, args: &[Expr]) {
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg);
        }
        self.out.push(')');
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Int(v) => {
                let _ = write!(self.out, "{}", v);
            }
            ExprKind::Float(v) => self.out.push_str(&format_number(*v)),
            ExprKind::String(s) => self.string(s),
            ExprKind::Bool(b) => {
                let _ = write!(self.out, "{}", b);
            }
            ExprKind::Null => self.out.push_str("null"),
            ExprKind::Ident { name, .. } => self.out.push_str(name),
            ExprKind::This => self.out.push_str("this"),
            ExprKind::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item);
                }
                self.out.push(']');
            }
            ExprKind::Object(props) => {
                if props.is_empty() {
                    self.out.push_str("({})");
                    return;
                }
                self.out.push_str("({ ");
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    if is_plain_key(key) {
                        self.out.push_str(key);
                    } else {
                        self.string(key);
                    }
                    self.out.push_str(": ");
                    self.expr(value);
                }
                self.out.push_str(" })");
            }
            ExprKind::Unary { op, operand } => {
                let _ = write!(self.out, "({}", op.symbol());
                self.expr(operand);
                self.out.push(')');
            }
            ExprKind::Typeof(operand) => {
                self.out.push_str("(typeof ");
                self.expr(operand);
                self.out.push(')');
            }
            ExprKind::Binary { op, lhs, rhs } => self.infix(lhs, op.symbol(), rhs),
            ExprKind::Logical { op, lhs, rhs } => self.infix(lhs, op.symbol(), rhs),
            ExprKind::Assign { op, target, value } => {
                let symbol = match op {
                    Some(op) => format!("{}=", op.symbol()),
                    None => "=".to_string(),
                };
                self.infix(target, &symbol, value);
            }
            ExprKind::Update { op, prefix, target } => {
                let symbol = match op {
                    UpdateOp::Increment => "++",
                    UpdateOp::Decrement => "--",
                };
                self.out.push('(');
                if *prefix {
                    self.out.push_str(symbol);
                    self.expr(target);
                } else {
                    self.expr(target);
                    self.out.push_str(symbol);
                }
                self.out.push(')');
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.out.push('(');
                self.expr(cond);
                self.out.push_str(" ? ");
                self.expr(then_expr);
                self.out.push_str(" : ");
                self.expr(else_expr);
                self.out.push(')');
            }
            ExprKind::Sequence(items) => {
                self.out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item);
                }
                self.out.push(')');
            }
            ExprKind::Member { object, name } => {
                self.postfix_base(object);
                let _ = write!(self.out, ".{}", name);
            }
            ExprKind::Index { object, index } => {
                self.postfix_base(object);
                self.out.push('[');
                self.expr(index);
                self.out.push(']');
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
                ..
            } => {
                self.postfix_base(callee);
                self.type_args(type_args);
                self.args(args);
            }
            ExprKind::New { prototype, args } => {
                self.out.push_str("(new ");
                let simple = matches!(
                    prototype.kind,
                    ExprKind::Ident { .. } | ExprKind::TypeRef { .. } | ExprKind::This
                );
                if simple {
                    self.expr(prototype);
                } else {
                    self.out.push('(');
                    self.expr(prototype);
                    self.out.push(')');
                }
                if let Some(args) = args {
                    self.args(args);
                }
                self.out.push(')');
            }
            ExprKind::Has { object, name } => {
                self.out.push('(');
                self.expr(object);
                let _ = write!(self.out, " has {})", name);
            }
            ExprKind::Function(func) => {
                self.out.push('(');
                self.function(func);
                self.out.push(')');
            }
            ExprKind::TypeRef { name, args, .. } => {
                self.out.push_str(name);
                self.type_args(args);
            }
            ExprKind::Bind {
                name, value, body, ..
            } => {
                let _ = write!(self.out, "(bind {} = ", name);
                self.expr(value);
                self.out.push_str(" in ");
                self.expr(body);
                self.out.push(')');
            }
        }
    }

    /// Operand of `.`, `[]` or a call. Number literals are wrapped so the
    /// dot is not read as a decimal point.
    fn postfix_base(&mut self, expr: &Expr) {
        if matches!(expr.kind, ExprKind::Int(_) | ExprKind::Float(_)) {
            self.out.push('(');
            self.expr(expr);
            self.out.push(')');
        } else {
            self.expr(expr);
        }
    }

    fn infix(&mut self, lhs: &Expr, op: &str, rhs: &Expr) {
        self.out.push('(');
        self.expr(lhs);
        let _ = write!(self.out, " {} ", op);
        self.expr(rhs);
        self.out.push(')');
    }
}
