//! Front-end facing data model.
//!
//! This module contains the symbol arena handed over by the parser, the AST
//! node arena, and the code-generation protocol that dispatches nodes into a
//! backend.

pub mod ast;
pub mod symbol_table;
pub mod visitor;

pub use ast::{Ast, Node, NodeId, NodeKind};
pub use symbol_table::{FunctionId, SymbolId, SymbolTable, Type};
pub use visitor::CodeGenerator;
