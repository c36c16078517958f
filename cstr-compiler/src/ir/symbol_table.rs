use crate::SymbolError;
use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Value types of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    Int,
    String,
}

impl Type {
    /// IR spelling of a value of this type.
    pub fn llvm(self) -> &'static str {
        match self {
            Type::Int => "i32",
            Type::String => "i8*",
        }
    }

    /// Storage alignment in bytes.
    pub fn align(self) -> u32 {
        match self {
            Type::Int => 4,
            Type::String => 8,
        }
    }

    /// Zero initializer used for globals and implicit returns.
    pub fn zero(self) -> &'static str {
        match self {
            Type::Int => "0",
            Type::String => "null",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::String => write!(f, "string"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attributes {
    pub global: bool,
    pub external: bool,
    pub param: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Symbol {
    pub name: String,
    pub ty: Type,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    /// Parameter symbols in declaration order
    pub params: Vec<SymbolId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SymbolKind {
    Variable,
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Function => write!(f, "function"),
        }
    }
}

/// What a name is bound to in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Binding {
    Variable(SymbolId),
    Function(FunctionId),
}

impl Binding {
    pub fn kind(&self) -> SymbolKind {
        match self {
            Binding::Variable(_) => SymbolKind::Variable,
            Binding::Function(_) => SymbolKind::Function,
        }
    }
}

/// Owns every symbol and function record of a compilation unit.
///
/// Records live in arenas and are referred to by [`SymbolId`] / [`FunctionId`];
/// the AST only ever stores those ids. Name resolution keeps the two-level
/// layout of a global scope plus one function scope.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    functions: Vec<Function>,
    /// Global scope bindings (variables and functions)
    globals: HashMap<String, Binding>,
    /// Function scope bindings (parameters and locals).
    /// Only active when inside a function
    locals: Option<HashMap<String, Binding>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter function scope
    pub fn enter_function(&mut self) {
        self.locals = Some(HashMap::new());
    }

    /// Exit function scope
    pub fn exit_function(&mut self) {
        self.locals = None;
    }

    /// Check if currently in function scope
    pub fn in_function(&self) -> bool {
        self.locals.is_some()
    }

    /// Declare a variable in the current scope. Variables declared outside a
    /// function are global.
    pub fn declare(&mut self, name: &str, ty: Type) -> Result<SymbolId, SymbolError> {
        let global = !self.in_function();
        self.declare_with(
            name,
            ty,
            Attributes {
                global,
                ..Attributes::default()
            },
        )
    }

    /// Declare a global defined in another unit.
    pub fn declare_extern(&mut self, name: &str, ty: Type) -> Result<SymbolId, SymbolError> {
        self.check_free(&self.globals, name)?;
        let id = self.push_symbol(
            name,
            ty,
            Attributes {
                global: true,
                external: true,
                param: false,
            },
        );
        self.globals.insert(name.to_string(), Binding::Variable(id));
        Ok(id)
    }

    /// Declare a function in global scope (even if inside a function). The
    /// parameter symbols are created here but only become visible by name
    /// after [`SymbolTable::bind_parameters`].
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: Type,
        params: &[(&str, Type)],
    ) -> Result<FunctionId, SymbolError> {
        self.check_free(&self.globals, name)?;
        for (i, (param, _)) in params.iter().enumerate() {
            check_local_name(param)?;
            if params[..i].iter().any(|(earlier, _)| earlier == param) {
                return Err(SymbolError::DuplicateParameter {
                    function: name.to_string(),
                    name: param.to_string(),
                });
            }
        }

        let param_ids = params
            .iter()
            .map(|(param, ty)| {
                self.push_symbol(
                    param,
                    *ty,
                    Attributes {
                        param: true,
                        ..Attributes::default()
                    },
                )
            })
            .collect();

        let id = FunctionId(self.functions.len());
        self.functions.push(Function {
            name: name.to_string(),
            return_type,
            params: param_ids,
        });
        self.globals.insert(name.to_string(), Binding::Function(id));
        Ok(id)
    }

    /// Make a function's parameters resolvable in the current function scope.
    pub fn bind_parameters(&mut self, function: FunctionId) -> Result<(), SymbolError> {
        let params = self.functions[function.0].params.clone();
        for param in params {
            let name = self.symbols[param.0].name.clone();
            let scope = self.current_scope();
            if let Some(existing) = scope.get(&name) {
                return Err(SymbolError::Redeclared {
                    name,
                    existing: existing.kind(),
                });
            }
            scope.insert(name, Binding::Variable(param));
        }
        Ok(())
    }

    /// Lookup a name (checks locals first, then globals)
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(ref locals) = self.locals {
            if let Some(binding) = locals.get(name) {
                return Some(*binding);
            }
        }
        self.globals.get(name).copied()
    }

    pub fn lookup_variable(&self, name: &str) -> Option<SymbolId> {
        match self.lookup(name)? {
            Binding::Variable(id) => Some(id),
            Binding::Function(_) => None,
        }
    }

    /// Lookup only in global scope
    pub fn lookup_function(&self, name: &str) -> Option<FunctionId> {
        match self.globals.get(name)? {
            Binding::Function(id) => Some(*id),
            Binding::Variable(_) => None,
        }
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0]
    }

    fn declare_with(
        &mut self,
        name: &str,
        ty: Type,
        attributes: Attributes,
    ) -> Result<SymbolId, SymbolError> {
        if !attributes.global {
            check_local_name(name)?;
        }
        if let Some(existing) = self.current_scope().get(name) {
            return Err(SymbolError::Redeclared {
                name: name.to_string(),
                existing: existing.kind(),
            });
        }
        let id = self.push_symbol(name, ty, attributes);
        self.current_scope()
            .insert(name.to_string(), Binding::Variable(id));
        Ok(id)
    }

    fn current_scope(&mut self) -> &mut HashMap<String, Binding> {
        match self.locals {
            Some(ref mut locals) => locals,
            None => &mut self.globals,
        }
    }

    fn check_free(&self, scope: &HashMap<String, Binding>, name: &str) -> Result<(), SymbolError> {
        match scope.get(name) {
            Some(existing) => Err(SymbolError::Redeclared {
                name: name.to_string(),
                existing: existing.kind(),
            }),
            None => Ok(()),
        }
    }

    fn push_symbol(&mut self, name: &str, ty: Type, attributes: Attributes) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            attributes,
        });
        id
    }
}

/// Locals and parameters share the `%` namespace with block labels
/// (`entry`, `Label_<n>`).
fn check_local_name(name: &str) -> Result<(), SymbolError> {
    let numbered_label = name
        .strip_prefix("Label_")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    if name == "entry" || numbered_label {
        return Err(SymbolError::ReservedName {
            name: name.to_string(),
        });
    }
    Ok(())
}
