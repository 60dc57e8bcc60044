//! Cinder Compiler
//!
//! Compiles Cinder, a small dynamically typed scripting language with
//! prototype objects, into the register/stack bytecode defined by
//! `cinder-bytecode`.
//!
//! # Passes
//!
//! 1. **Parse**: logos lexer → [`stream::TokenStream`] → recursive-descent
//!    [`parser`] producing the [`ast`]. Errors are recorded and the parser
//!    resynchronizes.
//! 2. **Visit** ([`analyze`]): name resolution, typing, generic
//!    instantiation and `new` rewriting. Problems become
//!    [`CompilerError`] diagnostics.
//! 3. **Optimize** ([`optimize`]): constant folding, const propagation,
//!    dead branch removal and loop specialization.
//! 4. **Build** ([`codegen`]): bytecode with register and stack accounting,
//!    labels resolved at finalization.
//!
//! # Usage
//!
//! ```ignore
//! use cinder_compiler::CompilationUnit;
//!
//! let mut unit = CompilationUnit::default();
//! let outcome = unit.compile_module("main", "let x = 1 + 2;");
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! let module = outcome.compiled.expect("compiled");
//! ```

#![warn(rust_2018_idioms)]

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod module;
pub mod optimize;
pub mod options;
pub mod parser;
pub mod scope;
pub mod stream;
pub mod token;
pub mod types;
pub mod unit;
pub mod value;

pub use analyze::generic::InstantiationStats;
pub use diagnostics::{render_diagnostics, CompilerError, ErrorLevel, MessageCode};
pub use error::InternalError;
pub use module::{InterfaceRegistry, Module, ModuleInterface, ModuleResolver};
pub use optimize::OptimizeStats;
pub use options::CompileOptions;
pub use parser::{parse_source, ParseError};
pub use types::TypeId;
pub use unit::{CompilationUnit, ModuleOutcome};
