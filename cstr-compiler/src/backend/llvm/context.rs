use super::LlvmGenerator;
use crate::ir::ast::{Ast, NodeId, NodeKind};
use crate::ir::symbol_table::{SymbolId, Type};
use crate::CodegenError;
use std::fmt;

/// Basic-block label, printed `Label_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    /// Branch-target form: `label %Label_<n>`
    pub fn operand(self) -> String {
        format!("label %{self}")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label_{}", self.0)
    }
}

impl LlvmGenerator<'_> {
    pub(super) fn new_label(&mut self) -> Label {
        let label = Label(self.label_count);
        self.label_count += 1;
        label
    }

    /// Next name for `base`: `base.1`, `base.2`, ...
    pub(super) fn fresh_id(&mut self, base: &str) -> String {
        let count = self.access_count.entry(base.to_string()).or_insert(0);
        *count += 1;
        format!("{base}.{count}")
    }

    pub(super) fn fresh_register(&mut self, base: &str) -> String {
        format!("%{}", self.fresh_id(base))
    }

    pub(super) fn new_temp(&mut self) -> String {
        self.fresh_register("tmp")
    }

    pub(super) fn is_lowered(&self, id: NodeId) -> bool {
        self.register_of.contains_key(&id)
    }

    pub(super) fn record(&mut self, id: NodeId, operand: String) {
        self.register_of.insert(id, operand);
    }

    /// Address operand of a variable's storage.
    pub(super) fn storage(&self, symbol: SymbolId) -> String {
        if let Some(slot) = self
            .fn_ctx
            .as_ref()
            .and_then(|ctx| ctx.spilled.get(&symbol))
        {
            return slot.clone();
        }
        let symbol = self.symbols.symbol(symbol);
        if symbol.attributes.global || symbol.attributes.external {
            format!("@{}", symbol.name)
        } else {
            format!("%{}", symbol.name)
        }
    }

    // ── Output ───────────────────────────────────────────────────────────

    fn write_indented(&mut self, level: usize, text: &str) {
        for _ in 0..level {
            self.out.push_str(&self.options.indentation);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Write a line at the current nesting level, outside any block rules.
    pub(super) fn write_line(&mut self, text: &str) {
        self.write_indented(self.indent_level, text);
    }

    /// Write an instruction into the current block. Code following a
    /// terminator lands in a fresh (unreachable) block.
    pub(super) fn emit_instr(&mut self, text: &str) {
        if self.block_terminated {
            let label = self.new_label();
            self.place_label(label);
        }
        self.write_line(text);
    }

    pub(super) fn emit_terminator(&mut self, text: &str) {
        self.emit_instr(text);
        self.block_terminated = true;
    }

    /// Fall-through edge into `label`; omitted when the block already ended.
    pub(super) fn branch_to(&mut self, label: Label) {
        if !self.block_terminated {
            self.emit_terminator(&format!("br {}", label.operand()));
        }
    }

    pub(super) fn cond_branch(&mut self, cond: &str, on_true: Label, on_false: Label) {
        self.emit_terminator(&format!(
            "br i1 {cond}, {}, {}",
            on_true.operand(),
            on_false.operand()
        ));
    }

    /// Start a new basic block. Labels sit one nesting level out.
    pub(super) fn place_label(&mut self, label: Label) {
        if self.options.annotate {
            self.out.push('\n');
        }
        let level = self.indent_level.saturating_sub(1);
        self.write_indented(level, &format!("{label}:"));
        self.block_terminated = false;
    }

    pub(super) fn annotate(&mut self, construct: &str) {
        if self.options.annotate {
            self.out.push('\n');
            let level = self.indent_level.saturating_sub(1);
            self.write_indented(level, &format!("; {construct}"));
        }
    }

    // ── Operands ─────────────────────────────────────────────────────────

    pub(super) fn expr_type(&self, ast: &Ast, id: NodeId) -> Result<Type, CodegenError> {
        let node = ast.get(id).ok_or(CodegenError::DanglingNode { node: id })?;
        node.ty.ok_or(CodegenError::NotAnExpression {
            node: id,
            kind: node.kind.name(),
        })
    }

    /// Lower an expression (at most once) and return the operand holding
    /// its value.
    pub(super) fn lower_expr(&mut self, ast: &Ast, id: NodeId) -> Result<String, CodegenError> {
        if let Some(operand) = self.register_of.get(&id) {
            return Ok(operand.clone());
        }
        self.expr_type(ast, id)?;
        ast.emit(id, self)?;
        self.register_of
            .get(&id)
            .cloned()
            .ok_or(CodegenError::MissingValue { node: id })
    }

    /// Operand of an `i32`/`i8*` value; comparison results are widened.
    pub(super) fn value_operand(&mut self, ast: &Ast, id: NodeId) -> Result<String, CodegenError> {
        let operand = self.lower_expr(ast, id)?;
        if !matches!(ast.node(id).kind, NodeKind::Condition(_)) {
            return Ok(operand);
        }
        let wide = self.new_temp();
        self.emit_instr(&format!("{wide} = zext i1 {operand} to i32"));
        Ok(wide)
    }

    /// `i1` operand for a conditional branch; integers are tested against 0.
    pub(super) fn branch_operand(&mut self, ast: &Ast, id: NodeId) -> Result<String, CodegenError> {
        let ty = self.expr_type(ast, id)?;
        if matches!(ast.node(id).kind, NodeKind::Condition(_)) {
            return self.lower_expr(ast, id);
        }
        match ty {
            Type::Int => {
                let value = self.value_operand(ast, id)?;
                let test = self.new_temp();
                self.emit_instr(&format!("{test} = icmp ne i32 {value}, 0"));
                Ok(test)
            }
            ty @ Type::String => Err(CodegenError::UnsupportedOperation {
                op: "truth test".to_string(),
                ty,
            }),
        }
    }

    /// Common type of two operands; they must agree.
    pub(super) fn operand_type(
        &self,
        ast: &Ast,
        op: &dyn fmt::Display,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<Type, CodegenError> {
        let lhs_ty = self.expr_type(ast, lhs)?;
        let rhs_ty = self.expr_type(ast, rhs)?;
        if lhs_ty != rhs_ty {
            return Err(CodegenError::MismatchedOperands {
                op: op.to_string(),
                lhs: lhs_ty,
                rhs: rhs_ty,
            });
        }
        Ok(lhs_ty)
    }
}
