use cstr_compiler::backend::compile_unit;
use cstr_compiler::ir::ast::{BinaryOp, CompareOp};
use cstr_compiler::ir::{Ast, FunctionId, NodeId, SymbolId, SymbolTable, Type};
use cstr_compiler::{compile_with_options, GeneratorOptions};

fn lower(ast: &Ast, symbols: &SymbolTable) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    compile_with_options(ast, symbols, GeneratorOptions::compact()).expect("unit should lower")
}

/// Declares `name(params) -> ret` and returns its id with the parameter
/// symbols plus any extra locals, in that order.
fn function(
    symbols: &mut SymbolTable,
    name: &str,
    ret: Type,
    params: &[(&str, Type)],
    locals: &[(&str, Type)],
) -> (FunctionId, Vec<SymbolId>) {
    let id = symbols.declare_function(name, ret, params).unwrap();
    let mut vars = symbols.function(id).params.clone();
    symbols.enter_function();
    symbols.bind_parameters(id).unwrap();
    for (local, ty) in locals {
        vars.push(symbols.declare(local, *ty).unwrap());
    }
    symbols.exit_function();
    (id, vars)
}

fn define(ast: &mut Ast, function: FunctionId, body: Vec<NodeId>) {
    let body = ast.compound(body);
    let def = ast.define_function(function, body);
    ast.push_root(def);
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

const RUNTIME: &str = "\
declare i1 @__string_equal__(i8*, i8*)
declare i1 @__string_not_equal__(i8*, i8*)
declare i8* @__string_copy__(i8*)
declare i8* @__string_concat__(i8*, i8*)
declare void @__string_free__(i8*)
";

// ── Strings ──────────────────────────────────────────────────────────────

#[test]
fn returned_concatenation_changes_owner() {
    let mut symbols = SymbolTable::new();
    let (greet, vars) = function(&mut symbols, "greet", Type::String, &[("name", Type::String)], &[]);

    let mut ast = Ast::new();
    let prefix = ast.const_str("hi ");
    let name = ast.variable(&symbols, vars[0]);
    let joined = ast.binary(BinaryOp::Add, prefix, name);
    let ret = ast.ret(joined);
    define(&mut ast, greet, vec![ret]);

    let expected = format!(
        "define i8* @greet(i8* %name) {{
entry:
  %name.addr = alloca i8*, align 8
  store i8* %name, i8** %name.addr
  %str.1 = getelementptr inbounds [4 x i8], [4 x i8]* @str.1, i32 0, i32 0
  %name.1 = load i8*, i8** %name.addr
  %tmp.1 = call i8* @__string_concat__(i8* %str.1, i8* %name.1)
  ret i8* %tmp.1
}}
@str.1 = private unnamed_addr constant [4 x i8] c\"hi \\00\"

{RUNTIME}
"
    );
    assert_eq!(lower(&ast, &symbols), expected);
}

#[test]
fn returned_borrowed_string_is_copied() {
    let mut symbols = SymbolTable::new();
    let (id, vars) = function(&mut symbols, "id", Type::String, &[("s", Type::String)], &[]);

    let mut ast = Ast::new();
    let read = ast.variable(&symbols, vars[0]);
    let ret = ast.ret(read);
    define(&mut ast, id, vec![ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  %s.1 = load i8*, i8** %s.addr\n  \
         %tmp.1 = call i8* @__string_copy__(i8* %s.1)\n  \
         ret i8* %tmp.1\n"
    ));
    assert!(!ir.contains("call void @__string_free__"));
}

#[test]
fn other_owned_strings_freed_before_return() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(
        &mut symbols,
        "f",
        Type::String,
        &[("a", Type::String)],
        &[("t", Type::String)],
    );
    let (a, t) = (vars[0], vars[1]);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![t]);
    let lhs = ast.variable(&symbols, a);
    let rhs = ast.variable(&symbols, a);
    let joined = ast.binary(BinaryOp::Add, lhs, rhs);
    let assign = ast.assign(&symbols, t, joined);
    let assign = ast.expr_stmt(assign);
    let read = ast.variable(&symbols, a);
    let ret = ast.ret(read);
    define(&mut ast, f, vec![decl, assign, ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  %a.1 = load i8*, i8** %a.addr\n  \
         %a.2 = load i8*, i8** %a.addr\n  \
         %tmp.1 = call i8* @__string_concat__(i8* %a.1, i8* %a.2)\n  \
         store i8* %tmp.1, i8** %t\n  \
         %a.3 = load i8*, i8** %a.addr\n  \
         %tmp.2 = call i8* @__string_copy__(i8* %a.3)\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         ret i8* %tmp.2\n"
    ));
}

#[test]
fn two_string_returns_copy_into_distinct_registers() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(
        &mut symbols,
        "pick",
        Type::String,
        &[("flag", Type::Int), ("s", Type::String)],
        &[],
    );

    let mut ast = Ast::new();
    let flag = ast.variable(&symbols, vars[0]);
    let first = ast.variable(&symbols, vars[1]);
    let ret_first = ast.ret(first);
    let second = ast.variable(&symbols, vars[1]);
    let ret_second = ast.ret(second);
    let branch = ast.if_else(flag, ret_first, Some(ret_second));
    define(&mut ast, f, vec![branch]);

    let ir = lower(&ast, &symbols);
    assert_eq!(count(&ir, "@__string_copy__(i8* %s."), 2);
    assert!(ir.contains("%tmp.2 = call i8* @__string_copy__(i8* %s.1)"));
    assert!(ir.contains("%tmp.3 = call i8* @__string_copy__(i8* %s.2)"));
}

#[test]
fn implicit_return_frees_owned_strings() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "build", Type::String, &[], &[("t", Type::String)]);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![vars[0]]);
    let lhs = ast.const_str("a");
    let rhs = ast.const_str("b");
    let joined = ast.binary(BinaryOp::Add, lhs, rhs);
    let assign = ast.assign(&symbols, vars[0], joined);
    let assign = ast.expr_stmt(assign);
    define(&mut ast, f, vec![decl, assign]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  store i8* %tmp.1, i8** %t\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         ret i8* null\n}\n"
    ));
    assert!(ir.contains("@str.1 = private unnamed_addr constant [2 x i8] c\"a\\00\"\n"));
    assert!(ir.contains("@str.2 = private unnamed_addr constant [2 x i8] c\"b\\00\"\n"));
}

#[test]
fn string_equality_uses_runtime() {
    let mut symbols = SymbolTable::new();
    symbols.enter_function();
    let s = symbols.declare("s", Type::String).unwrap();

    let mut ast = Ast::new();
    let read = ast.variable(&symbols, s);
    let lit = ast.const_str("x");
    let eq = ast.condition(CompareOp::Eq, read, lit);
    let eq = ast.expr_stmt(eq);
    let read = ast.variable(&symbols, s);
    let lit = ast.const_str("y");
    let ne = ast.condition(CompareOp::Ne, read, lit);
    let ne = ast.expr_stmt(ne);
    ast.push_root(eq);
    ast.push_root(ne);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains("%tmp.1 = call i1 @__string_equal__(i8* %s.1, i8* %str.1)\n"));
    assert!(ir.contains("%tmp.2 = call i1 @__string_not_equal__(i8* %s.2, i8* %str.2)\n"));
    assert!(ir.ends_with(&format!("{RUNTIME}\n")));
}

#[test]
fn runtime_declared_once_per_unit() {
    let mut symbols = SymbolTable::new();
    let (f, f_vars) = function(&mut symbols, "f", Type::String, &[("a", Type::String)], &[]);
    let (g, g_vars) = function(&mut symbols, "g", Type::String, &[("b", Type::String)], &[]);

    let mut ast = Ast::new();
    for (func, param) in [(f, f_vars[0]), (g, g_vars[0])] {
        let read = ast.variable(&symbols, param);
        let ret = ast.ret(read);
        define(&mut ast, func, vec![ret]);
    }

    let ir = lower(&ast, &symbols);
    assert_eq!(count(&ir, "declare void @__string_free__(i8*)"), 1);
    assert_eq!(count(&ir, "declare i8* @__string_copy__(i8*)"), 1);
    // Declared right after the first function that needs them
    let decls = ir.find(RUNTIME).unwrap();
    assert!(decls < ir.find("define i8* @g").unwrap());
}

#[test]
fn no_runtime_for_integer_code() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "f", Type::Int, &[("a", Type::Int)], &[]);
    let mut ast = Ast::new();
    let read = ast.variable(&symbols, vars[0]);
    let ret = ast.ret(read);
    define(&mut ast, f, vec![ret]);

    assert!(!lower(&ast, &symbols).contains("__string"));
}

#[test]
fn literal_escapes_are_decoded_and_reencoded() {
    let symbols = SymbolTable::new();
    let mut ast = Ast::new();
    let lit = ast.const_str(r#"a\n\"b\\"#);
    let stmt = ast.expr_stmt(lit);
    ast.push_root(stmt);

    let ir = lower(&ast, &symbols);
    assert!(ir.starts_with(
        "%str.1 = getelementptr inbounds [6 x i8], [6 x i8]* @str.1, i32 0, i32 0\n"
    ));
    assert!(ir.ends_with("@str.1 = private unnamed_addr constant [6 x i8] c\"a\\0A\\22b\\5C\\00\"\n"));
}

#[test]
fn non_ascii_literal_counts_bytes() {
    let symbols = SymbolTable::new();
    let mut ast = Ast::new();
    let lit = ast.const_str("é\\t");
    let stmt = ast.expr_stmt(lit);
    ast.push_root(stmt);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(r#"@str.1 = private unnamed_addr constant [4 x i8] c"\C3\A9\09\00""#));
}

#[test]
fn empty_literal() {
    let symbols = SymbolTable::new();
    let mut ast = Ast::new();
    let lit = ast.const_str("");
    let stmt = ast.expr_stmt(lit);
    ast.push_root(stmt);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(r#"@str.1 = private unnamed_addr constant [1 x i8] c"\00""#));
}

// ── Ownership across control flow ────────────────────────────────────────

/// `f(a: string, c: int) -> string` with a string local `t`.
fn branching_function(symbols: &mut SymbolTable) -> (FunctionId, SymbolId, SymbolId, SymbolId) {
    let (f, vars) = function(
        symbols,
        "f",
        Type::String,
        &[("a", Type::String), ("c", Type::Int)],
        &[("t", Type::String)],
    );
    (f, vars[0], vars[1], vars[2])
}

fn concat_into(ast: &mut Ast, symbols: &SymbolTable, target: SymbolId, source: SymbolId) -> NodeId {
    let lhs = ast.variable(symbols, source);
    let rhs = ast.variable(symbols, source);
    let joined = ast.binary(BinaryOp::Add, lhs, rhs);
    let assign = ast.assign(symbols, target, joined);
    ast.expr_stmt(assign)
}

#[test]
fn string_built_in_branch_is_freed_before_join() {
    let mut symbols = SymbolTable::new();
    let (f, a, c, t) = branching_function(&mut symbols);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![t]);
    let flag = ast.variable(&symbols, c);
    let then_branch = concat_into(&mut ast, &symbols, t, a);
    let branch = ast.if_else(flag, then_branch, None);
    let read = ast.variable(&symbols, a);
    let ret = ast.ret(read);
    define(&mut ast, f, vec![decl, branch, ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "Label_0:\n  \
         %a.1 = load i8*, i8** %a.addr\n  \
         %a.2 = load i8*, i8** %a.addr\n  \
         %tmp.2 = call i8* @__string_concat__(i8* %a.1, i8* %a.2)\n  \
         store i8* %tmp.2, i8** %t\n  \
         call void @__string_free__(i8* %tmp.2)\n  \
         br label %Label_2\n\
         Label_1:\n  \
         br label %Label_2\n\
         Label_2:\n  \
         %a.3 = load i8*, i8** %a.addr\n  \
         %tmp.3 = call i8* @__string_copy__(i8* %a.3)\n  \
         ret i8* %tmp.3\n}\n"
    ));
    assert_eq!(count(&ir, "@__string_free__(i8* %tmp.2)"), 1);
}

#[test]
fn early_return_keeps_outer_strings_tracked() {
    let mut symbols = SymbolTable::new();
    let (f, a, c, t) = branching_function(&mut symbols);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![t]);
    let assign = concat_into(&mut ast, &symbols, t, a);
    let flag = ast.variable(&symbols, c);
    let early = ast.variable(&symbols, a);
    let early = ast.ret(early);
    let branch = ast.if_else(flag, early, None);
    let late = ast.variable(&symbols, a);
    let late = ast.ret(late);
    define(&mut ast, f, vec![decl, assign, branch, late]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "Label_0:\n  \
         %a.3 = load i8*, i8** %a.addr\n  \
         %tmp.3 = call i8* @__string_copy__(i8* %a.3)\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         ret i8* %tmp.3\n"
    ));
    assert!(ir.contains(
        "Label_2:\n  \
         %a.4 = load i8*, i8** %a.addr\n  \
         %tmp.4 = call i8* @__string_copy__(i8* %a.4)\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         ret i8* %tmp.4\n}\n"
    ));
    assert_eq!(count(&ir, "@__string_free__(i8* %tmp.1)"), 2);
}

#[test]
fn loop_body_frees_its_strings_each_iteration() {
    let mut symbols = SymbolTable::new();
    let (f, a, c, t) = branching_function(&mut symbols);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![t]);
    let flag = ast.variable(&symbols, c);
    let body = concat_into(&mut ast, &symbols, t, a);
    let repeat = ast.while_loop(flag, body);
    define(&mut ast, f, vec![decl, repeat]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  store i8* %tmp.2, i8** %t\n  \
         call void @__string_free__(i8* %tmp.2)\n  \
         br label %Label_0\n\
         Label_2:\n  \
         ret i8* null\n}\n"
    ));
}

#[test]
fn condition_strings_are_freed_before_branching() {
    let mut symbols = SymbolTable::new();
    let (g, vars) = function(&mut symbols, "g", Type::Int, &[("a", Type::String)], &[]);

    let mut ast = Ast::new();
    let lhs = ast.variable(&symbols, vars[0]);
    let rhs = ast.variable(&symbols, vars[0]);
    let joined = ast.binary(BinaryOp::Add, lhs, rhs);
    let other = ast.variable(&symbols, vars[0]);
    let cond = ast.condition(CompareOp::Eq, joined, other);
    let empty = ast.compound(vec![]);
    let branch = ast.if_else(cond, empty, None);
    define(&mut ast, g, vec![branch]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  %tmp.2 = call i1 @__string_equal__(i8* %tmp.1, i8* %a.3)\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         br i1 %tmp.2, label %Label_0, label %Label_1\n"
    ));
    assert_eq!(count(&ir, "call void @__string_free__"), 1);
    assert!(ir.contains("Label_2:\n  ret i32 0\n}\n"));
}

#[test]
fn returned_call_result_is_handed_over() {
    let mut symbols = SymbolTable::new();
    let (h, _) = function(&mut symbols, "h", Type::String, &[], &[]);
    let (k, _) = function(&mut symbols, "k", Type::String, &[], &[]);

    let mut ast = Ast::new();
    let proto = ast.declare_function(h);
    ast.push_root(proto);
    let call = ast.call(&symbols, h, vec![]);
    let ret = ast.ret(call);
    define(&mut ast, k, vec![ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains("entry:\n  %tmp.1 = call i8* @h()\n  ret i8* %tmp.1\n}\n"));
    assert!(!ir.contains("__string"));
}

#[test]
fn discarded_call_result_is_freed() {
    let mut symbols = SymbolTable::new();
    let (h, _) = function(&mut symbols, "h", Type::String, &[], &[]);
    let (m, _) = function(&mut symbols, "m", Type::Int, &[], &[]);

    let mut ast = Ast::new();
    let proto = ast.declare_function(h);
    ast.push_root(proto);
    let call = ast.call(&symbols, h, vec![]);
    let discard = ast.expr_stmt(call);
    define(&mut ast, m, vec![discard]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  %tmp.1 = call i8* @h()\n  \
         call void @__string_free__(i8* %tmp.1)\n  \
         ret i32 0\n}\n"
    ));
    assert!(ir.ends_with(&format!("{RUNTIME}\n")));
}

// ── Parameters ───────────────────────────────────────────────────────────

#[test]
fn parameter_writes_go_to_spill_slot() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "f", Type::Int, &[("a", Type::Int)], &[]);
    let mut ast = Ast::new();
    let five = ast.const_int(5);
    let assign = ast.assign(&symbols, vars[0], five);
    let assign = ast.expr_stmt(assign);
    let read = ast.variable(&symbols, vars[0]);
    let ret = ast.ret(read);
    define(&mut ast, f, vec![assign, ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains("  store i32 5, i32* %a.addr\n  %a.1 = load i32, i32* %a.addr\n"));
}

#[test]
fn spilling_leaves_symbols_untouched() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "f", Type::Int, &[("a", Type::Int)], &[]);
    let before = symbols.symbol(vars[0]).clone();

    let mut ast = Ast::new();
    let read = ast.variable(&symbols, vars[0]);
    let ret = ast.ret(read);
    define(&mut ast, f, vec![ret]);
    let first = lower(&ast, &symbols);

    assert_eq!(symbols.symbol(vars[0]), &before);
    assert!(before.attributes.param);
    // A second pass over the same tree sees the same symbols
    assert_eq!(lower(&ast, &symbols), first);
}

#[test]
fn globals_inside_functions_use_module_symbol() {
    let mut symbols = SymbolTable::new();
    let g = symbols.declare("counter", Type::Int).unwrap();
    let (f, _) = function(&mut symbols, "bump", Type::Int, &[], &[]);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![g]);
    ast.push_root(decl);
    let read = ast.variable(&symbols, g);
    let one = ast.const_int(1);
    let sum = ast.binary(BinaryOp::Add, read, one);
    let assign = ast.assign(&symbols, g, sum);
    let ret = ast.ret(assign);
    define(&mut ast, f, vec![ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.starts_with("@counter = global i32 0, align 4\ndefine i32 @bump() {\n"));
    assert!(ir.contains("  %counter.1 = load i32, i32* @counter\n"));
    assert!(ir.contains("  store i32 %tmp.1, i32* @counter\n  ret i32 %tmp.1\n"));
}

// ── Block termination ────────────────────────────────────────────────────

#[test]
fn returning_branches_skip_fall_through() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "sign", Type::Int, &[("x", Type::Int)], &[]);

    let mut ast = Ast::new();
    let x = ast.variable(&symbols, vars[0]);
    let zero = ast.const_int(0);
    let cond = ast.condition(CompareOp::Lt, x, zero);
    let minus = ast.const_int(-1);
    let ret_neg = ast.ret(minus);
    let plus = ast.const_int(1);
    let ret_pos = ast.ret(plus);
    let branch = ast.if_else(cond, ret_neg, Some(ret_pos));
    define(&mut ast, f, vec![branch]);

    let ir = lower(&ast, &symbols);
    assert_eq!(count(&ir, "br label"), 0);
    assert!(ir.contains(
        "Label_0:\n  ret i32 -1\nLabel_1:\n  ret i32 1\nLabel_2:\n  ret i32 0\n}\n"
    ));
}

#[test]
fn code_after_return_opens_new_block() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "f", Type::Int, &[], &[("x", Type::Int)]);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![vars[0]]);
    let one = ast.const_int(1);
    let ret = ast.ret(one);
    let two = ast.const_int(2);
    let assign = ast.assign(&symbols, vars[0], two);
    let assign = ast.expr_stmt(assign);
    define(&mut ast, f, vec![decl, ret, assign]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  ret i32 1\nLabel_0:\n  store i32 2, i32* %x\n  ret i32 0\n}\n"
    ));
}

#[test]
fn returned_comparison_is_widened() {
    let mut symbols = SymbolTable::new();
    let (f, vars) = function(&mut symbols, "is_zero", Type::Int, &[("x", Type::Int)], &[]);

    let mut ast = Ast::new();
    let x = ast.variable(&symbols, vars[0]);
    let zero = ast.const_int(0);
    let cond = ast.condition(CompareOp::Eq, x, zero);
    let ret = ast.ret(cond);
    define(&mut ast, f, vec![ret]);

    let ir = lower(&ast, &symbols);
    assert!(ir.contains(
        "  %tmp.1 = icmp eq i32 %x.1, 0\n  \
         %tmp.2 = zext i1 %tmp.1 to i32\n  \
         ret i32 %tmp.2\n"
    ));
}

// ── Driver ───────────────────────────────────────────────────────────────

#[test]
fn compile_unit_emits_roots_in_order() {
    let mut symbols = SymbolTable::new();
    let g = symbols.declare("g", Type::Int).unwrap();
    let (ext, _) = function(&mut symbols, "ext", Type::Int, &[("n", Type::Int)], &[]);
    let (main, _) = function(&mut symbols, "main", Type::Int, &[], &[]);

    let mut ast = Ast::new();
    let decl = ast.declare(vec![g]);
    ast.push_root(decl);
    let proto = ast.declare_function(ext);
    ast.push_root(proto);
    let arg = ast.const_int(3);
    let call = ast.call(&symbols, ext, vec![arg]);
    let ret = ast.ret(call);
    define(&mut ast, main, vec![ret]);

    let ir = compile_unit(&ast, &symbols, GeneratorOptions::compact()).unwrap();
    assert_eq!(
        ir,
        "@g = global i32 0, align 4\n\
         declare i32 @ext(i32)\n\
         define i32 @main() {\n\
         entry:\n  \
           %tmp.1 = call i32 @ext(i32 3)\n  \
           ret i32 %tmp.1\n\
         }\n\n"
    );
}
