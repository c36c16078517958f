pub mod ir;
pub mod backend;

use ir::ast::{Ast, NodeId};
use ir::symbol_table::{SymbolKind, SymbolTable, Type};
use thiserror::Error;

pub use backend::llvm::{GeneratorOptions, LlvmGenerator};

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),

    #[error("Codegen error: {0}")]
    Codegen(#[from] CodegenError),
}

/// Failures raised while lowering one compilation unit. Lowering stops at the
/// first one; the partially produced text is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("operator '{op}' is not supported on {ty} operands")]
    UnsupportedOperation { op: String, ty: Type },

    #[error("operator '{op}' applied to mismatched operands ({lhs} and {rhs})")]
    MismatchedOperands { op: String, lhs: Type, rhs: Type },

    #[error("{generator} does not implement a handler for node kind '{kind}' (node {node})")]
    Unhandled {
        generator: &'static str,
        kind: &'static str,
        node: NodeId,
    },

    #[error("node {node} ('{kind}') is used as an expression but produces no value")]
    NotAnExpression { node: NodeId, kind: &'static str },

    #[error("node {node} is not part of the tree being lowered")]
    DanglingNode { node: NodeId },

    #[error("expression node {node} was lowered without recording a register")]
    MissingValue { node: NodeId },

    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of call to '{function}' has type {found}, expected {expected}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: Type,
        found: Type,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("'{name}' is already declared as a {existing}")]
    Redeclared { name: String, existing: SymbolKind },

    #[error("parameter '{name}' defined multiple times in function '{function}'")]
    DuplicateParameter { function: String, name: String },

    #[error("'{name}' clashes with a block label")]
    ReservedName { name: String },
}

/// Lower every top-level node of `ast` to LLVM IR text with the default layout.
pub fn compile_to_llvm(ast: &Ast, symbols: &SymbolTable) -> Result<String, CompileError> {
    compile_with_options(ast, symbols, GeneratorOptions::default())
}

/// Lower every top-level node of `ast` with an explicit output layout.
pub fn compile_with_options(
    ast: &Ast,
    symbols: &SymbolTable,
    options: GeneratorOptions,
) -> Result<String, CompileError> {
    Ok(backend::compile_unit(ast, symbols, options)?)
}
