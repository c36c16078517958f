use super::strings::{STRING_COPY, STRING_FREE};
use super::LlvmGenerator;
use crate::ir::ast::*;
use crate::ir::symbol_table::Type;
use crate::CodegenError;

impl LlvmGenerator<'_> {
    /// Globals become module-level definitions, everything else a stack slot
    /// in the current function.
    pub(super) fn lower_declarations(&mut self, node: &DeclarationList) {
        let symbols = self.symbols;
        for &id in &node.symbols {
            let symbol = symbols.symbol(id);
            let ty = symbol.ty.llvm();
            let align = symbol.ty.align();
            if symbol.attributes.external {
                self.write_line(&format!("@{} = external global {ty}", symbol.name));
            } else if symbol.attributes.global {
                self.write_line(&format!(
                    "@{} = global {ty} {}, align {align}",
                    symbol.name,
                    symbol.ty.zero()
                ));
            } else {
                self.emit_instr(&format!("%{} = alloca {ty}, align {align}", symbol.name));
            }
        }
    }

    pub(super) fn lower_if(&mut self, ast: &Ast, node: &CondInstruction) -> Result<(), CodegenError> {
        self.annotate("if");
        let then_label = self.new_label();
        let else_label = self.new_label();
        let end_label = self.new_label();

        let cond = self.scoped_branch_operand(ast, node.condition)?;
        self.cond_branch(&cond, then_label, else_label);

        self.place_label(then_label);
        self.emit_scoped(ast, node.then_branch)?;
        self.branch_to(end_label);

        self.place_label(else_label);
        if let Some(else_branch) = node.else_branch {
            self.emit_scoped(ast, else_branch)?;
        }
        self.branch_to(end_label);

        self.place_label(end_label);
        Ok(())
    }

    pub(super) fn lower_while(&mut self, ast: &Ast, node: &WhileInstruction) -> Result<(), CodegenError> {
        self.annotate("while");
        let cond_label = self.new_label();
        let body_label = self.new_label();
        let end_label = self.new_label();

        self.branch_to(cond_label);
        self.place_label(cond_label);
        let cond = self.scoped_branch_operand(ast, node.condition)?;
        self.cond_branch(&cond, body_label, end_label);

        self.place_label(body_label);
        self.emit_scoped(ast, node.body)?;
        self.branch_to(cond_label);

        self.place_label(end_label);
        Ok(())
    }

    pub(super) fn lower_do(&mut self, ast: &Ast, node: &DoInstruction) -> Result<(), CodegenError> {
        self.annotate("do");
        let body_label = self.new_label();
        let cond_label = self.new_label();
        let end_label = self.new_label();

        self.branch_to(body_label);
        self.place_label(body_label);
        self.emit_scoped(ast, node.body)?;
        self.branch_to(cond_label);

        self.place_label(cond_label);
        let cond = self.scoped_branch_operand(ast, node.condition)?;
        self.cond_branch(&cond, body_label, end_label);

        self.place_label(end_label);
        Ok(())
    }

    pub(super) fn lower_for(&mut self, ast: &Ast, node: &ForInstruction) -> Result<(), CodegenError> {
        self.annotate("for");
        let cond_label = self.new_label();
        let body_label = self.new_label();
        let inc_label = self.new_label();
        let end_label = self.new_label();

        self.lower_expr(ast, node.init)?;
        self.branch_to(cond_label);

        self.place_label(cond_label);
        let cond = self.scoped_branch_operand(ast, node.condition)?;
        self.cond_branch(&cond, body_label, end_label);

        self.place_label(body_label);
        self.emit_scoped(ast, node.body)?;
        self.branch_to(inc_label);

        self.place_label(inc_label);
        self.open_string_scope();
        self.lower_expr(ast, node.increment)?;
        self.close_string_scope();
        self.branch_to(cond_label);

        self.place_label(end_label);
        Ok(())
    }

    /// A returned string must be owned by the caller: a string this function
    /// allocated is handed over as is, anything else is copied first. Every
    /// other owned string is freed before `ret`. Only the innermost scope's
    /// strings stop being tracked.
    pub(super) fn lower_return(&mut self, ast: &Ast, node: &ReturnInstruction) -> Result<(), CodegenError> {
        let ty = self.expr_type(ast, node.value)?;
        let mut value = self.value_operand(ast, node.value)?;

        let mut handed_over = None;
        if ty == Type::String {
            if let Some(pos) = self.strings_to_free.iter().position(|owned| *owned == value) {
                handed_over = Some(pos);
            } else {
                let copy = self.new_temp();
                self.emit_instr(&format!("{copy} = call i8* @{STRING_COPY}(i8* {value})"));
                self.needs_runtime = true;
                value = copy;
            }
        }

        let owned: Vec<String> = self
            .strings_to_free
            .iter()
            .enumerate()
            .filter(|(pos, _)| Some(*pos) != handed_over)
            .map(|(_, owned)| owned.clone())
            .collect();
        self.free_strings(&owned);
        self.emit_terminator(&format!("ret {} {value}", ty.llvm()));

        let mark = self.owned_scopes.last().copied().unwrap_or(0);
        self.strings_to_free.truncate(mark);
        Ok(())
    }

    /// Free every string allocated so far in this function, oldest first.
    pub(super) fn free_owned_strings(&mut self) {
        let owned = std::mem::take(&mut self.strings_to_free);
        self.free_strings(&owned);
    }

    fn free_strings(&mut self, owned: &[String]) {
        for reg in owned {
            self.emit_instr(&format!("call void @{STRING_FREE}(i8* {reg})"));
            self.needs_runtime = true;
        }
    }

    // ── Ownership scopes ─────────────────────────────────────────────────

    /// Strings allocated from here on belong to the block being entered.
    fn open_string_scope(&mut self) {
        self.owned_scopes.push(self.strings_to_free.len());
    }

    /// Free what the innermost scope allocated, unless its last block already
    /// returned, and stop tracking it.
    fn close_string_scope(&mut self) {
        let mark = self.owned_scopes.pop().unwrap_or(0);
        if mark >= self.strings_to_free.len() {
            return;
        }
        let owned = self.strings_to_free.split_off(mark);
        if !self.block_terminated {
            self.free_strings(&owned);
        }
    }

    fn emit_scoped(&mut self, ast: &Ast, id: NodeId) -> Result<(), CodegenError> {
        self.open_string_scope();
        ast.emit(id, self)?;
        self.close_string_scope();
        Ok(())
    }

    /// Strings built only to evaluate a condition are released before the
    /// branch leaves the block.
    fn scoped_branch_operand(&mut self, ast: &Ast, id: NodeId) -> Result<String, CodegenError> {
        self.open_string_scope();
        let cond = self.branch_operand(ast, id)?;
        self.close_string_scope();
        Ok(cond)
    }
}
