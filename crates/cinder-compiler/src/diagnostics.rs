//! Compiler diagnostics.
//!
//! Every recoverable problem found while compiling becomes a
//! [`CompilerError`]: a stable [`MessageCode`], a severity, the source
//! location, and the arguments substituted into the code's message
//! template. Diagnostics are collected on the compilation unit and handed to
//! the host after each compile, successful or not.

use crate::parser::{ParseError, ParseErrorKind};
use crate::token::Span;
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::WriteColor;
use serde::Serialize;
use std::fmt;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    Error,
    Warning,
}

/// Stable diagnostic codes.
///
/// `E1xxx` parse, `E2xxx` names, `E3xxx` types, `E4xxx` control flow,
/// `W5xxx` warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageCode {
    // Parse
    UnexpectedToken,
    UnexpectedEof,
    InvalidSyntax,
    InvalidNumber,
    NestingTooDeep,
    InvalidCharacter,
    InvalidString,

    // Names
    UnresolvedIdentifier,
    DuplicateDeclaration,
    AssignToConst,
    CaptureOfLocal,
    UnresolvedModule,
    UnresolvedExport,
    InvalidAssignmentTarget,
    NotAValue,
    GenericExport,

    // Types
    IncompatibleAssignment,
    IncompatibleOperands,
    MissingPrototype,
    GenericArityMismatch,
    NotAType,
    NoConstructor,
    NonConstantDefault,
    CyclicPrototype,

    // Control flow
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnOutsideFunction,
    ThisOutsideMethod,
    DeclarationNotAllowed,

    // Warnings
    UnusedVariable,
}

impl MessageCode {
    /// Code as printed: `E2001`.
    pub fn as_str(self) -> &'static str {
        use MessageCode::*;
        match self {
            UnexpectedToken => "E1001",
            UnexpectedEof => "E1002",
            InvalidSyntax => "E1003",
            InvalidNumber => "E1004",
            NestingTooDeep => "E1005",
            InvalidCharacter => "E1006",
            InvalidString => "E1007",
            UnresolvedIdentifier => "E2001",
            DuplicateDeclaration => "E2002",
            AssignToConst => "E2003",
            CaptureOfLocal => "E2004",
            UnresolvedModule => "E2005",
            UnresolvedExport => "E2006",
            InvalidAssignmentTarget => "E2007",
            NotAValue => "E2008",
            GenericExport => "E2009",
            IncompatibleAssignment => "E3001",
            IncompatibleOperands => "E3002",
            MissingPrototype => "E3003",
            GenericArityMismatch => "E3004",
            NotAType => "E3005",
            NoConstructor => "E3006",
            NonConstantDefault => "E3007",
            CyclicPrototype => "E3008",
            BreakOutsideLoop => "E4001",
            ContinueOutsideLoop => "E4002",
            ReturnOutsideFunction => "E4003",
            ThisOutsideMethod => "E4004",
            DeclarationNotAllowed => "E4005",
            UnusedVariable => "W5001",
        }
    }

    /// Message template; `{n}` is replaced by the n-th argument.
    pub fn template(self) -> &'static str {
        use MessageCode::*;
        match self {
            UnexpectedToken | UnexpectedEof | InvalidSyntax | NestingTooDeep => "{0}",
            InvalidNumber => "invalid number literal `{0}`",
            InvalidCharacter => "unexpected character {0}",
            InvalidString => "invalid string literal",
            UnresolvedIdentifier => "cannot find `{0}` in this scope",
            DuplicateDeclaration => "`{0}` is already declared in this scope",
            AssignToConst => "cannot assign to constant `{0}`",
            CaptureOfLocal => {
                "`{0}` is a local of an enclosing function and cannot be captured"
            }
            UnresolvedModule => "cannot resolve module \"{0}\"",
            UnresolvedExport => "module \"{0}\" has no export named `{1}`",
            InvalidAssignmentTarget => "invalid assignment target",
            NotAValue => "`{0}` is a type and cannot be used as a value",
            GenericExport => "`{0}` cannot be exported",
            IncompatibleAssignment => "type `{1}` is not assignable to type `{0}`",
            IncompatibleOperands => "operator `{0}` cannot be applied to `{1}` and `{2}`",
            MissingPrototype => "type `{0}` has no prototype and cannot be instantiated",
            GenericArityMismatch => "`{0}` expects {1} type argument(s), got {2}",
            NotAType => "`{0}` is not a type",
            NoConstructor => "type `{0}` has no `$construct` and takes no arguments",
            NonConstantDefault => "default value of member `{0}` must be a constant",
            CyclicPrototype => "prototype chain of `{0}` leads back to itself through `{1}`",
            BreakOutsideLoop => "`break` outside of a loop",
            ContinueOutsideLoop => "`continue` outside of a loop",
            ReturnOutsideFunction => "`return` outside of a function",
            ThisOutsideMethod => "`this` outside of a method",
            DeclarationNotAllowed => "{0} declarations are only allowed at module level",
            UnusedVariable => "unused variable `{0}`",
        }
    }

    /// Default severity of the code.
    pub fn level(self) -> ErrorLevel {
        match self {
            MessageCode::UnusedVariable => ErrorLevel::Warning,
            _ => ErrorLevel::Error,
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic produced while compiling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilerError {
    pub level: ErrorLevel,
    pub code: MessageCode,
    pub location: Span,
    pub args: Vec<String>,
}

impl CompilerError {
    pub fn new(code: MessageCode, location: Span, args: Vec<String>) -> Self {
        Self {
            level: code.level(),
            code,
            location,
            args,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == ErrorLevel::Error
    }

    /// Message with arguments substituted.
    pub fn message(&self) -> String {
        let mut message = self.code.template().to_string();
        for (i, arg) in self.args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg);
        }
        message
    }

    /// Convert to a codespan diagnostic for rendering.
    pub fn to_diagnostic(&self) -> Diagnostic<()> {
        let severity = match self.level {
            ErrorLevel::Error => Severity::Error,
            ErrorLevel::Warning => Severity::Warning,
        };
        Diagnostic::new(severity)
            .with_message(self.message())
            .with_code(self.code.as_str())
            .with_labels(vec![Label::primary(
                (),
                self.location.start..self.location.end,
            )])
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            ErrorLevel::Error => "error",
            ErrorLevel::Warning => "warning",
        };
        write!(
            f,
            "{}[{}] {}: {}",
            level,
            self.code,
            self.location,
            self.message()
        )
    }
}

impl From<&ParseError> for CompilerError {
    fn from(error: &ParseError) -> Self {
        use crate::lexer::LexError;

        let (code, args) = match &error.kind {
            ParseErrorKind::UnexpectedToken { .. } => {
                (MessageCode::UnexpectedToken, vec![error.message.clone()])
            }
            ParseErrorKind::UnexpectedEof { .. } => {
                (MessageCode::UnexpectedEof, vec![error.message.clone()])
            }
            ParseErrorKind::InvalidSyntax { .. } => {
                (MessageCode::InvalidSyntax, vec![error.message.clone()])
            }
            ParseErrorKind::InvalidNumber { value } => {
                (MessageCode::InvalidNumber, vec![value.clone()])
            }
            ParseErrorKind::NestingTooDeep => {
                (MessageCode::NestingTooDeep, vec![error.message.clone()])
            }
            ParseErrorKind::Lex(LexError::UnexpectedCharacter { ch, .. }) => {
                (MessageCode::InvalidCharacter, vec![format!("{:?}", ch)])
            }
            ParseErrorKind::Lex(LexError::InvalidString { .. }) => {
                (MessageCode::InvalidString, Vec::new())
            }
        };
        CompilerError::new(code, error.span, args)
    }
}

/// Render diagnostics against their source with codespan-reporting.
pub fn render_diagnostics(
    writer: &mut dyn WriteColor,
    file_name: &str,
    source: &str,
    diagnostics: &[CompilerError],
) -> Result<(), codespan_reporting::files::Error> {
    let file = SimpleFile::new(file_name, source);
    let config = term::Config::default();
    for diagnostic in diagnostics {
        term::emit(writer, &config, &file, &diagnostic.to_diagnostic())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use codespan_reporting::term::termcolor::NoColor;

    #[test]
    fn test_message_substitution() {
        let err = CompilerError::new(
            MessageCode::IncompatibleAssignment,
            Span::new(0, 1, 1, 1),
            vec!["number".into(), "string".into()],
        );
        assert_eq!(err.message(), "type `string` is not assignable to type `number`");
        assert!(err.is_error());
        assert_eq!(err.code.as_str(), "E3001");
    }

    #[test]
    fn test_warning_level() {
        let warn = CompilerError::new(MessageCode::UnusedVariable, Span::default(), vec!["x".into()]);
        assert_eq!(warn.level, ErrorLevel::Warning);
        assert!(warn.to_string().starts_with("warning[W5001]"));
    }

    #[test]
    fn test_parse_errors_convert() {
        let (_, errors) = parse_source("let = 1;");
        let converted = CompilerError::from(&errors[0]);
        assert_eq!(converted.code, MessageCode::UnexpectedToken);
        assert!(converted.message().contains("identifier"));
    }

    #[test]
    fn test_render_includes_code_and_source() {
        let source = "let x = y;";
        let err = CompilerError::new(
            MessageCode::UnresolvedIdentifier,
            Span::new(8, 9, 1, 9),
            vec!["y".into()],
        );
        let mut out = NoColor::new(Vec::new());
        render_diagnostics(&mut out, "main.cn", source, &[err]).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("E2001"));
        assert!(text.contains("cannot find `y`"));
        assert!(text.contains("main.cn"));
    }
}
