//! Backends lowering the AST to target text.
//!
//! Module layout:
//! - `llvm`: textual LLVM IR generator (the only target so far)

pub mod llvm;

use crate::ir::ast::Ast;
use crate::ir::symbol_table::SymbolTable;
use crate::CodegenError;
use llvm::{GeneratorOptions, LlvmGenerator};
use log::debug;

/// Lower one compilation unit: every root of `ast`, in order, through a fresh
/// generator.
pub fn compile_unit(
    ast: &Ast,
    symbols: &SymbolTable,
    options: GeneratorOptions,
) -> Result<String, CodegenError> {
    debug!("lowering unit with {} top-level nodes", ast.roots().len());
    let mut generator = LlvmGenerator::new(symbols, options);
    for &root in ast.roots() {
        ast.emit(root, &mut generator)?;
    }
    Ok(generator.finish())
}
