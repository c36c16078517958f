use crate::ir::symbol_table::{FunctionId, SymbolId, SymbolTable, Type};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable identity of a node: its slot in the [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(usize);

impl NodeId {
    /// Slot of this node in its arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
        }
    }
}

// ── Expressions ──────────────────────────────────────────────────────────

/// Read of a variable's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Variable {
    pub symbol: SymbolId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstInteger {
    pub value: i32,
}

/// String literal as written in the source, escape sequences included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstString {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub operand: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// Comparison; its value is a one-bit boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Condition {
    pub op: CompareOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Assignment {
    pub target: SymbolId,
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionCall {
    pub function: FunctionId,
    pub args: Vec<NodeId>,
}

// ── Instructions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeclarationList {
    pub symbols: Vec<SymbolId>,
}

/// Expression evaluated for its side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpressionInstruction {
    pub expression: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CondInstruction {
    pub condition: NodeId,
    pub then_branch: NodeId,
    pub else_branch: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WhileInstruction {
    pub condition: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DoInstruction {
    pub body: NodeId,
    pub condition: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ForInstruction {
    pub init: NodeId,
    pub condition: NodeId,
    pub increment: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReturnInstruction {
    pub value: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompoundInstruction {
    pub instructions: Vec<NodeId>,
}

/// Prototype only: `int foo(int a);`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionDeclaration {
    pub function: FunctionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionDefinition {
    pub function: FunctionId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    Variable(Variable),
    ConstInteger(ConstInteger),
    ConstString(ConstString),
    UnaryExpression(UnaryExpression),
    BinaryExpression(BinaryExpression),
    Condition(Condition),
    Assignment(Assignment),
    FunctionCall(FunctionCall),
    DeclarationList(DeclarationList),
    ExpressionInstruction(ExpressionInstruction),
    CondInstruction(CondInstruction),
    WhileInstruction(WhileInstruction),
    DoInstruction(DoInstruction),
    ForInstruction(ForInstruction),
    ReturnInstruction(ReturnInstruction),
    CompoundInstruction(CompoundInstruction),
    FunctionDeclaration(FunctionDeclaration),
    FunctionDefinition(FunctionDefinition),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Variable(_) => "Variable",
            NodeKind::ConstInteger(_) => "ConstInteger",
            NodeKind::ConstString(_) => "ConstString",
            NodeKind::UnaryExpression(_) => "UnaryExpression",
            NodeKind::BinaryExpression(_) => "BinaryExpression",
            NodeKind::Condition(_) => "Condition",
            NodeKind::Assignment(_) => "Assignment",
            NodeKind::FunctionCall(_) => "FunctionCall",
            NodeKind::DeclarationList(_) => "DeclarationList",
            NodeKind::ExpressionInstruction(_) => "ExpressionInstruction",
            NodeKind::CondInstruction(_) => "CondInstruction",
            NodeKind::WhileInstruction(_) => "WhileInstruction",
            NodeKind::DoInstruction(_) => "DoInstruction",
            NodeKind::ForInstruction(_) => "ForInstruction",
            NodeKind::ReturnInstruction(_) => "ReturnInstruction",
            NodeKind::CompoundInstruction(_) => "CompoundInstruction",
            NodeKind::FunctionDeclaration(_) => "FunctionDeclaration",
            NodeKind::FunctionDefinition(_) => "FunctionDefinition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub kind: NodeKind,
    /// Value type; `None` for instructions. Comparisons are typed `Int`.
    pub ty: Option<Type>,
}

impl Node {
    pub fn is_expression(&self) -> bool {
        self.ty.is_some()
    }
}

/// Arena holding every node of one compilation unit plus the ordered list of
/// top-level declarations and definitions.
///
/// Nodes are appended bottom-up by the constructors below and never change
/// afterwards; expression types are computed at construction from the
/// children (or the symbol table) and trusted by the backend.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ast {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn ty(&self, id: NodeId) -> Option<Type> {
        self.get(id).and_then(|n| n.ty)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes in source order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn push_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    fn push(&mut self, kind: NodeKind, ty: Option<Type>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, ty });
        id
    }

    pub fn variable(&mut self, symbols: &SymbolTable, symbol: SymbolId) -> NodeId {
        let ty = symbols.symbol(symbol).ty;
        self.push(NodeKind::Variable(Variable { symbol }), Some(ty))
    }

    pub fn const_int(&mut self, value: i32) -> NodeId {
        self.push(
            NodeKind::ConstInteger(ConstInteger { value }),
            Some(Type::Int),
        )
    }

    pub fn const_str(&mut self, value: impl Into<String>) -> NodeId {
        self.push(
            NodeKind::ConstString(ConstString {
                value: value.into(),
            }),
            Some(Type::String),
        )
    }

    pub fn negate(&mut self, operand: NodeId) -> NodeId {
        let ty = self.ty(operand);
        self.push(
            NodeKind::UnaryExpression(UnaryExpression {
                op: UnaryOp::Neg,
                operand,
            }),
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = self.ty(lhs);
        self.push(
            NodeKind::BinaryExpression(BinaryExpression { op, lhs, rhs }),
            ty,
        )
    }

    pub fn condition(&mut self, op: CompareOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(
            NodeKind::Condition(Condition { op, lhs, rhs }),
            Some(Type::Int),
        )
    }

    pub fn assign(&mut self, symbols: &SymbolTable, target: SymbolId, value: NodeId) -> NodeId {
        let ty = symbols.symbol(target).ty;
        self.push(
            NodeKind::Assignment(Assignment { target, value }),
            Some(ty),
        )
    }

    pub fn call(&mut self, symbols: &SymbolTable, function: FunctionId, args: Vec<NodeId>) -> NodeId {
        let ty = symbols.function(function).return_type;
        self.push(
            NodeKind::FunctionCall(FunctionCall { function, args }),
            Some(ty),
        )
    }

    pub fn declare(&mut self, symbols: Vec<SymbolId>) -> NodeId {
        self.push(NodeKind::DeclarationList(DeclarationList { symbols }), None)
    }

    pub fn expr_stmt(&mut self, expression: NodeId) -> NodeId {
        self.push(
            NodeKind::ExpressionInstruction(ExpressionInstruction { expression }),
            None,
        )
    }

    pub fn if_else(
        &mut self,
        condition: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    ) -> NodeId {
        self.push(
            NodeKind::CondInstruction(CondInstruction {
                condition,
                then_branch,
                else_branch,
            }),
            None,
        )
    }

    pub fn while_loop(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.push(
            NodeKind::WhileInstruction(WhileInstruction { condition, body }),
            None,
        )
    }

    pub fn do_while(&mut self, body: NodeId, condition: NodeId) -> NodeId {
        self.push(
            NodeKind::DoInstruction(DoInstruction { body, condition }),
            None,
        )
    }

    pub fn for_loop(
        &mut self,
        init: NodeId,
        condition: NodeId,
        increment: NodeId,
        body: NodeId,
    ) -> NodeId {
        self.push(
            NodeKind::ForInstruction(ForInstruction {
                init,
                condition,
                increment,
                body,
            }),
            None,
        )
    }

    pub fn ret(&mut self, value: NodeId) -> NodeId {
        self.push(
            NodeKind::ReturnInstruction(ReturnInstruction { value }),
            None,
        )
    }

    pub fn compound(&mut self, instructions: Vec<NodeId>) -> NodeId {
        self.push(
            NodeKind::CompoundInstruction(CompoundInstruction { instructions }),
            None,
        )
    }

    pub fn declare_function(&mut self, function: FunctionId) -> NodeId {
        self.push(
            NodeKind::FunctionDeclaration(FunctionDeclaration { function }),
            None,
        )
    }

    pub fn define_function(&mut self, function: FunctionId, body: NodeId) -> NodeId {
        self.push(
            NodeKind::FunctionDefinition(FunctionDefinition { function, body }),
            None,
        )
    }
}
