//! Textual LLVM IR backend.
//!
//! Module layout:
//! - `context`: output sink, indentation, label and register naming, block
//!   termination tracking
//! - `expr`: expression lowering (loads, constants, arithmetic, compares,
//!   assignments, calls)
//! - `stmt`: instruction lowering (declarations, control flow, returns)
//! - `function`: prototypes, definitions, string constants and runtime
//!   declarations
//! - `strings`: string literal decoding/encoding and runtime helper names
//!
//! One [`LlvmGenerator`] lowers exactly one compilation unit. All counters live
//! in the instance, so two fresh generators fed the same AST produce the same
//! text.

mod context;
mod expr;
mod function;
mod stmt;
mod strings;

pub use context::Label;
pub use strings::{STRING_CONCAT, STRING_COPY, STRING_EQUAL, STRING_FREE, STRING_NOT_EQUAL};

use crate::ir::ast::*;
use crate::ir::symbol_table::{SymbolId, SymbolTable};
use crate::ir::visitor::CodeGenerator;
use crate::CodegenError;
use std::collections::HashMap;

/// Output layout knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Text repeated once per nesting level in front of each instruction
    pub indentation: String,
    /// Emit blank lines and `; if` / `; while` / ... banners around
    /// structured control flow
    pub annotate: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            indentation: "  ".to_string(),
            annotate: true,
        }
    }
}

impl GeneratorOptions {
    /// Dense layout: no banners, no blank lines before labels.
    pub fn compact() -> Self {
        Self {
            annotate: false,
            ..Self::default()
        }
    }

    pub fn with_indentation(mut self, indentation: impl Into<String>) -> Self {
        self.indentation = indentation.into();
        self
    }

    pub fn with_annotations(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }
}

/// State local to the function definition being lowered.
#[derive(Debug, Clone, Default)]
struct FunctionCtx {
    /// Parameter symbol -> stack slot it was spilled to
    spilled: HashMap<SymbolId, String>,
}

pub struct LlvmGenerator<'a> {
    symbols: &'a SymbolTable,
    options: GeneratorOptions,
    out: String,
    /// Operand text holding the value of each lowered expression node
    register_of: HashMap<NodeId, String>,
    /// Names issued so far per register base (`x`, `tmp`, `str`, ...)
    access_count: HashMap<String, u32>,
    label_count: u32,
    indent_level: usize,
    /// String constants awaiting their global definition: (id, bytes)
    pending_strings: Vec<(String, Vec<u8>)>,
    /// Registers owning heap strings allocated in the current function, in
    /// allocation order
    strings_to_free: Vec<String>,
    /// Length of `strings_to_free` when each enclosing branch arm or loop
    /// body was entered, innermost last
    owned_scopes: Vec<usize>,
    needs_runtime: bool,
    runtime_declared: bool,
    fn_ctx: Option<FunctionCtx>,
    block_terminated: bool,
}

impl<'a> LlvmGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable, options: GeneratorOptions) -> Self {
        Self {
            symbols,
            options,
            out: String::new(),
            register_of: HashMap::new(),
            access_count: HashMap::new(),
            label_count: 0,
            indent_level: 0,
            pending_strings: Vec::new(),
            strings_to_free: Vec::new(),
            owned_scopes: Vec::new(),
            needs_runtime: false,
            runtime_declared: false,
            fn_ctx: None,
            block_terminated: false,
        }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Text produced so far.
    pub fn output(&self) -> &str {
        &self.out
    }

    /// Operand recorded for an already lowered expression node.
    pub fn register_of(&self, id: NodeId) -> Option<&str> {
        self.register_of.get(&id).map(String::as_str)
    }

    /// Flush string constants and runtime declarations still owed by code
    /// emitted outside any function definition, and return the unit's text.
    pub fn finish(mut self) -> String {
        self.flush_string_constants();
        self.declare_runtime();
        self.out
    }
}

impl CodeGenerator for LlvmGenerator<'_> {
    fn name(&self) -> &'static str {
        "LlvmGenerator"
    }

    fn visit_variable(&mut self, _ast: &Ast, id: NodeId, node: &Variable) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_variable(id, node)
    }

    fn visit_const_integer(
        &mut self,
        _ast: &Ast,
        id: NodeId,
        node: &ConstInteger,
    ) -> Result<(), CodegenError> {
        self.record(id, node.value.to_string());
        Ok(())
    }

    fn visit_const_string(
        &mut self,
        _ast: &Ast,
        id: NodeId,
        node: &ConstString,
    ) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_const_string(id, node)
    }

    fn visit_unary_expression(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &UnaryExpression,
    ) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_unary(ast, id, node)
    }

    fn visit_binary_expression(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &BinaryExpression,
    ) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_binary(ast, id, node)
    }

    fn visit_condition(&mut self, ast: &Ast, id: NodeId, node: &Condition) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_condition(ast, id, node)
    }

    fn visit_assignment(&mut self, ast: &Ast, id: NodeId, node: &Assignment) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_assignment(ast, id, node)
    }

    fn visit_function_call(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &FunctionCall,
    ) -> Result<(), CodegenError> {
        if self.is_lowered(id) {
            return Ok(());
        }
        self.lower_call(ast, id, node)
    }

    fn visit_declaration_list(
        &mut self,
        _ast: &Ast,
        _id: NodeId,
        node: &DeclarationList,
    ) -> Result<(), CodegenError> {
        self.lower_declarations(node);
        Ok(())
    }

    fn visit_expression_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ExpressionInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_expr(ast, node.expression)?;
        Ok(())
    }

    fn visit_cond_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &CondInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_if(ast, node)
    }

    fn visit_while_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &WhileInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_while(ast, node)
    }

    fn visit_do_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &DoInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_do(ast, node)
    }

    fn visit_for_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ForInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_for(ast, node)
    }

    fn visit_return_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &ReturnInstruction,
    ) -> Result<(), CodegenError> {
        self.lower_return(ast, node)
    }

    fn visit_compound_instruction(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &CompoundInstruction,
    ) -> Result<(), CodegenError> {
        for &instruction in &node.instructions {
            ast.emit(instruction, self)?;
        }
        Ok(())
    }

    fn visit_function_declaration(
        &mut self,
        _ast: &Ast,
        _id: NodeId,
        node: &FunctionDeclaration,
    ) -> Result<(), CodegenError> {
        self.lower_function_declaration(node);
        Ok(())
    }

    fn visit_function_definition(
        &mut self,
        ast: &Ast,
        _id: NodeId,
        node: &FunctionDefinition,
    ) -> Result<(), CodegenError> {
        self.lower_function_definition(ast, node)
    }
}
