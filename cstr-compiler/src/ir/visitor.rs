//! Code-generation protocol.
//!
//! A backend implements [`CodeGenerator`]; [`Ast::emit`] routes a node to the
//! visit method of its concrete kind. Every visit method defaults to an
//! `Unhandled` error so a partial backend fails at the offending node instead
//! of silently skipping it.

use crate::ir::ast::*;
use crate::CodegenError;
use log::trace;

pub trait CodeGenerator {
    /// Name reported in protocol-coverage errors.
    fn name(&self) -> &'static str;

    fn visit_variable(&mut self, ast: &Ast, id: NodeId, _node: &Variable) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_const_integer(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &ConstInteger,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_const_string(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &ConstString,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_unary_expression(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &UnaryExpression,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_binary_expression(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &BinaryExpression,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_condition(&mut self, ast: &Ast, id: NodeId, _node: &Condition) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_assignment(&mut self, ast: &Ast, id: NodeId, _node: &Assignment) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_function_call(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &FunctionCall,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_declaration_list(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &DeclarationList,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_expression_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &ExpressionInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_cond_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &CondInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_while_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &WhileInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_do_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &DoInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_for_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &ForInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_return_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &ReturnInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_compound_instruction(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &CompoundInstruction,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_function_declaration(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &FunctionDeclaration,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }

    fn visit_function_definition(
        &mut self,
        ast: &Ast,
        id: NodeId,
        _node: &FunctionDefinition,
    ) -> Result<(), CodegenError> {
        Err(unhandled(self, ast, id))
    }
}

fn unhandled<G: CodeGenerator + ?Sized>(generator: &G, ast: &Ast, id: NodeId) -> CodegenError {
    CodegenError::Unhandled {
        generator: generator.name(),
        kind: ast.node(id).kind.name(),
        node: id,
    }
}

impl Ast {
    /// Emit one node through `generator`, dispatching on its concrete kind.
    pub fn emit<G: CodeGenerator + ?Sized>(
        &self,
        id: NodeId,
        generator: &mut G,
    ) -> Result<(), CodegenError> {
        let node = self.get(id).ok_or(CodegenError::DanglingNode { node: id })?;
        trace!("{}: visit {} {}", generator.name(), node.kind.name(), id);
        match &node.kind {
            NodeKind::Variable(n) => generator.visit_variable(self, id, n),
            NodeKind::ConstInteger(n) => generator.visit_const_integer(self, id, n),
            NodeKind::ConstString(n) => generator.visit_const_string(self, id, n),
            NodeKind::UnaryExpression(n) => generator.visit_unary_expression(self, id, n),
            NodeKind::BinaryExpression(n) => generator.visit_binary_expression(self, id, n),
            NodeKind::Condition(n) => generator.visit_condition(self, id, n),
            NodeKind::Assignment(n) => generator.visit_assignment(self, id, n),
            NodeKind::FunctionCall(n) => generator.visit_function_call(self, id, n),
            NodeKind::DeclarationList(n) => generator.visit_declaration_list(self, id, n),
            NodeKind::ExpressionInstruction(n) => generator.visit_expression_instruction(self, id, n),
            NodeKind::CondInstruction(n) => generator.visit_cond_instruction(self, id, n),
            NodeKind::WhileInstruction(n) => generator.visit_while_instruction(self, id, n),
            NodeKind::DoInstruction(n) => generator.visit_do_instruction(self, id, n),
            NodeKind::ForInstruction(n) => generator.visit_for_instruction(self, id, n),
            NodeKind::ReturnInstruction(n) => generator.visit_return_instruction(self, id, n),
            NodeKind::CompoundInstruction(n) => generator.visit_compound_instruction(self, id, n),
            NodeKind::FunctionDeclaration(n) => generator.visit_function_declaration(self, id, n),
            NodeKind::FunctionDefinition(n) => generator.visit_function_definition(self, id, n),
        }
    }
}
