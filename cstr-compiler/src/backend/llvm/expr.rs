use super::strings::{self, STRING_CONCAT, STRING_EQUAL, STRING_NOT_EQUAL};
use super::LlvmGenerator;
use crate::ir::ast::*;
use crate::ir::symbol_table::Type;
use crate::CodegenError;

impl LlvmGenerator<'_> {
    /// Every read of a variable is a fresh load into `%<name>.<n>`.
    pub(super) fn lower_variable(&mut self, id: NodeId, node: &Variable) -> Result<(), CodegenError> {
        let symbols = self.symbols;
        let symbol = symbols.symbol(node.symbol);
        let ty = symbol.ty.llvm();
        let storage = self.storage(node.symbol);
        let reg = self.fresh_register(&symbol.name);
        self.emit_instr(&format!("{reg} = load {ty}, {ty}* {storage}"));
        self.record(id, reg);
        Ok(())
    }

    pub(super) fn lower_const_string(&mut self, id: NodeId, node: &ConstString) -> Result<(), CodegenError> {
        let bytes = strings::decode_literal(&node.value);
        let len = bytes.len() + 1;
        let name = self.fresh_id("str");
        self.emit_instr(&format!(
            "%{name} = getelementptr inbounds [{len} x i8], [{len} x i8]* @{name}, i32 0, i32 0"
        ));
        self.record(id, format!("%{name}"));
        self.pending_strings.push((name, bytes));
        Ok(())
    }

    pub(super) fn lower_unary(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &UnaryExpression,
    ) -> Result<(), CodegenError> {
        let ty = self.expr_type(ast, node.operand)?;
        if ty == Type::String {
            return Err(CodegenError::UnsupportedOperation {
                op: node.op.to_string(),
                ty,
            });
        }
        let operand = self.value_operand(ast, node.operand)?;
        let reg = self.new_temp();
        match node.op {
            UnaryOp::Neg => self.emit_instr(&format!("{reg} = sub i32 0, {operand}")),
        }
        self.record(id, reg);
        Ok(())
    }

    pub(super) fn lower_binary(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &BinaryExpression,
    ) -> Result<(), CodegenError> {
        let ty = self.operand_type(ast, &node.op, node.lhs, node.rhs)?;
        if ty == Type::String && node.op != BinaryOp::Add {
            return Err(CodegenError::UnsupportedOperation {
                op: node.op.to_string(),
                ty,
            });
        }

        let lhs = self.value_operand(ast, node.lhs)?;
        let rhs = self.value_operand(ast, node.rhs)?;
        let reg = self.new_temp();
        match ty {
            Type::Int => {
                let opcode = arith_opcode(node.op);
                self.emit_instr(&format!("{reg} = {opcode} i32 {lhs}, {rhs}"));
            }
            Type::String => {
                self.emit_instr(&format!(
                    "{reg} = call i8* @{STRING_CONCAT}(i8* {lhs}, i8* {rhs})"
                ));
                self.needs_runtime = true;
                self.strings_to_free.push(reg.clone());
            }
        }
        self.record(id, reg);
        Ok(())
    }

    pub(super) fn lower_condition(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &Condition,
    ) -> Result<(), CodegenError> {
        let ty = self.operand_type(ast, &node.op, node.lhs, node.rhs)?;
        let string_helper = match (ty, node.op) {
            (Type::Int, _) => None,
            (Type::String, CompareOp::Eq) => Some(STRING_EQUAL),
            (Type::String, CompareOp::Ne) => Some(STRING_NOT_EQUAL),
            (Type::String, op) => {
                return Err(CodegenError::UnsupportedOperation {
                    op: op.to_string(),
                    ty,
                })
            }
        };

        let lhs = self.value_operand(ast, node.lhs)?;
        let rhs = self.value_operand(ast, node.rhs)?;
        let reg = self.new_temp();
        match string_helper {
            None => {
                let predicate = icmp_predicate(node.op);
                self.emit_instr(&format!("{reg} = icmp {predicate} i32 {lhs}, {rhs}"));
            }
            Some(helper) => {
                self.emit_instr(&format!("{reg} = call i1 @{helper}(i8* {lhs}, i8* {rhs})"));
                self.needs_runtime = true;
            }
        }
        self.record(id, reg);
        Ok(())
    }

    /// The assignment's value is the stored operand, so `a = b = 1` stores
    /// the same register twice.
    pub(super) fn lower_assignment(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &Assignment,
    ) -> Result<(), CodegenError> {
        let symbols = self.symbols;
        let target = symbols.symbol(node.target);
        let value_ty = self.expr_type(ast, node.value)?;
        if value_ty != target.ty {
            return Err(CodegenError::MismatchedOperands {
                op: "=".to_string(),
                lhs: target.ty,
                rhs: value_ty,
            });
        }

        let value = self.value_operand(ast, node.value)?;
        let storage = self.storage(node.target);
        let ty = target.ty.llvm();
        self.emit_instr(&format!("store {ty} {value}, {ty}* {storage}"));
        self.record(id, value);
        Ok(())
    }

    pub(super) fn lower_call(
        &mut self,
        ast: &Ast,
        id: NodeId,
        node: &FunctionCall,
    ) -> Result<(), CodegenError> {
        let symbols = self.symbols;
        let function = symbols.function(node.function);
        if node.args.len() != function.params.len() {
            return Err(CodegenError::ArgumentCount {
                function: function.name.clone(),
                expected: function.params.len(),
                found: node.args.len(),
            });
        }

        let mut operands = Vec::with_capacity(node.args.len());
        for (index, (&arg, &param)) in node.args.iter().zip(&function.params).enumerate() {
            let expected = symbols.symbol(param).ty;
            let found = self.expr_type(ast, arg)?;
            if found != expected {
                return Err(CodegenError::ArgumentType {
                    function: function.name.clone(),
                    index,
                    expected,
                    found,
                });
            }
            let value = self.value_operand(ast, arg)?;
            operands.push(format!("{} {value}", expected.llvm()));
        }

        let reg = self.new_temp();
        self.emit_instr(&format!(
            "{reg} = call {} @{}({})",
            function.return_type.llvm(),
            function.name,
            operands.join(", ")
        ));
        // Callees hand over ownership of the strings they return
        if function.return_type == Type::String {
            self.strings_to_free.push(reg.clone());
        }
        self.record(id, reg);
        Ok(())
    }
}

fn arith_opcode(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "udiv",
        BinaryOp::Mod => "srem",
        BinaryOp::Shl => "shl",
        BinaryOp::Shr => "ashr",
    }
}

fn icmp_predicate(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "eq",
        CompareOp::Ne => "ne",
        CompareOp::Lt => "slt",
        CompareOp::Gt => "sgt",
        CompareOp::Le => "sle",
        CompareOp::Ge => "sge",
    }
}
