use super::strings::{self, runtime_declarations};
use super::{FunctionCtx, LlvmGenerator};
use crate::ir::ast::*;
use crate::CodegenError;
use log::debug;
use std::collections::HashMap;

impl LlvmGenerator<'_> {
    pub(super) fn lower_function_declaration(&mut self, node: &FunctionDeclaration) {
        let symbols = self.symbols;
        let function = symbols.function(node.function);
        let params: Vec<&str> = function
            .params
            .iter()
            .map(|&param| symbols.symbol(param).ty.llvm())
            .collect();
        self.write_line(&format!(
            "declare {} @{}({})",
            function.return_type.llvm(),
            function.name,
            params.join(", ")
        ));
    }

    /// Parameters arrive as SSA values and are spilled to `%<name>.addr`
    /// slots on entry; reads and writes inside the body go through the slot.
    pub(super) fn lower_function_definition(
        &mut self,
        ast: &Ast,
        node: &FunctionDefinition,
    ) -> Result<(), CodegenError> {
        let symbols = self.symbols;
        let function = symbols.function(node.function);
        debug!(
            "lowering function `{}` ({} params)",
            function.name,
            function.params.len()
        );

        let signature: Vec<String> = function
            .params
            .iter()
            .map(|&param| {
                let symbol = symbols.symbol(param);
                format!("{} %{}", symbol.ty.llvm(), symbol.name)
            })
            .collect();
        let return_type = function.return_type;
        self.write_line(&format!(
            "define {} @{}({}) {{",
            return_type.llvm(),
            function.name,
            signature.join(", ")
        ));
        self.write_line("entry:");
        self.indent_level += 1;
        self.block_terminated = false;
        self.strings_to_free.clear();
        self.owned_scopes.clear();

        let mut spilled = HashMap::new();
        for &param in &function.params {
            let symbol = symbols.symbol(param);
            let ty = symbol.ty.llvm();
            let slot = format!("%{}.addr", symbol.name);
            self.emit_instr(&format!("{slot} = alloca {ty}, align {}", symbol.ty.align()));
            self.emit_instr(&format!("store {ty} %{}, {ty}* {slot}", symbol.name));
            spilled.insert(param, slot);
        }
        let outer = self.fn_ctx.replace(FunctionCtx { spilled });

        ast.emit(node.body, self)?;
        if !self.block_terminated {
            self.free_owned_strings();
            self.emit_terminator(&format!("ret {} {}", return_type.llvm(), return_type.zero()));
        }

        self.fn_ctx = outer;
        self.indent_level -= 1;
        self.block_terminated = false;
        self.write_line("}");
        self.flush_string_constants();
        self.out.push('\n');
        self.declare_runtime();
        Ok(())
    }

    /// Global definitions for every string constant referenced since the
    /// last flush, in first-use order.
    pub(super) fn flush_string_constants(&mut self) {
        for (name, bytes) in std::mem::take(&mut self.pending_strings) {
            self.write_line(&format!(
                "@{name} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                bytes.len() + 1,
                strings::encode_bytes(&bytes)
            ));
        }
    }

    /// Runtime helper prototypes, once per unit and only if some lowered code
    /// calls into the runtime.
    pub(super) fn declare_runtime(&mut self) {
        if !self.needs_runtime || self.runtime_declared {
            return;
        }
        for declaration in runtime_declarations() {
            self.write_line(&declaration);
        }
        self.out.push('\n');
        self.runtime_declared = true;
    }
}
