// Shared AST builders for the analyzer integration tests. The parser is
// a separate collaborator, so tests assemble trees by hand.

#![allow(dead_code)]

use aster_ast::{
    Annotation, Decl, Expr, ExternFnDecl, FunctionDecl, Literal, Node, NodeList, NodeRef,
    ParamDecl, Program, Stmt, TypeExpr, UnaryOp, Visibility,
};
use aster_diagnostics::{DiagnosticKind, Severity, SourceLocation};
use aster_sema::SemanticAnalyzer;

pub fn loc() -> SourceLocation {
    SourceLocation::unknown()
}

pub fn named_type(name: &str) -> NodeRef {
    Node::type_expr(
        TypeExpr::Named {
            name: name.to_string(),
            type_args: vec![],
        },
        loc(),
    )
}

pub fn generic_type(name: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::type_expr(
        TypeExpr::Named {
            name: name.to_string(),
            type_args: args,
        },
        loc(),
    )
}

pub fn slice_type(elem: NodeRef) -> NodeRef {
    Node::type_expr(TypeExpr::Slice { elem }, loc())
}

pub fn pointer_type(pointee: NodeRef, mutable: bool) -> NodeRef {
    Node::type_expr(TypeExpr::Pointer { pointee, mutable }, loc())
}

pub fn int_lit(value: i64) -> NodeRef {
    Node::expr(Expr::Literal(Literal::Integer(value)), loc())
}

pub fn str_lit(value: &str) -> NodeRef {
    Node::expr(Expr::Literal(Literal::Str(value.to_string())), loc())
}

pub fn unit_lit() -> NodeRef {
    Node::expr(Expr::Literal(Literal::Unit), loc())
}

pub fn ident(name: &str) -> NodeRef {
    Node::expr(Expr::Identifier(name.to_string()), loc())
}

pub fn deref(operand: NodeRef) -> NodeRef {
    Node::expr(
        Expr::Unary {
            op: UnaryOp::Deref,
            operand,
        },
        loc(),
    )
}

pub fn call(name: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::expr(
        Expr::Call {
            callee: ident(name),
            args: args.into(),
        },
        loc(),
    )
}

pub fn associated_call(owner: &str, member: &str, args: Vec<NodeRef>) -> NodeRef {
    Node::expr(
        Expr::AssociatedCall {
            owner: owner.to_string(),
            member: member.to_string(),
            args: args.into(),
        },
        loc(),
    )
}

pub fn assign_stmt(target: NodeRef, value: NodeRef) -> NodeRef {
    expr_stmt(Node::expr(Expr::Assign { target, value }, loc()))
}

pub fn expr_stmt(expr: NodeRef) -> NodeRef {
    Node::stmt(Stmt::ExprStmt { expr }, loc())
}

pub fn let_stmt(name: &str, ty: Option<NodeRef>, init: Option<NodeRef>, mutable: bool) -> NodeRef {
    Node::stmt(
        Stmt::Let {
            name: name.to_string(),
            mutable,
            ty,
            init,
            annotations: vec![],
        },
        loc(),
    )
}

pub fn let_with_annotations(
    name: &str,
    ty: NodeRef,
    init: NodeRef,
    annotations: Vec<Annotation>,
) -> NodeRef {
    Node::stmt(
        Stmt::Let {
            name: name.to_string(),
            mutable: false,
            ty: Some(ty),
            init: Some(init),
            annotations,
        },
        loc(),
    )
}

pub fn return_unit() -> NodeRef {
    Node::stmt(
        Stmt::Return {
            value: Some(unit_lit()),
        },
        loc(),
    )
}

pub fn block(stmts: Vec<NodeRef>) -> NodeRef {
    Node::stmt(
        Stmt::Block {
            stmts: stmts.into(),
        },
        loc(),
    )
}

pub fn unsafe_block(stmts: Vec<NodeRef>) -> NodeRef {
    Node::stmt(
        Stmt::Unsafe {
            block: block(stmts),
        },
        loc(),
    )
}

pub fn param(name: &str, ty: NodeRef) -> NodeRef {
    param_with_annotations(name, ty, vec![])
}

pub fn param_with_annotations(name: &str, ty: NodeRef, annotations: Vec<Annotation>) -> NodeRef {
    Node::decl(
        Decl::Parameter(ParamDecl {
            name: name.to_string(),
            ty,
            mutable: false,
            annotations,
        }),
        loc(),
    )
}

pub fn function(name: &str, params: Vec<NodeRef>, ret: NodeRef, body: Vec<NodeRef>) -> NodeRef {
    Node::decl(
        Decl::Function(FunctionDecl {
            name: name.to_string(),
            visibility: Visibility::Public,
            params: params.into(),
            return_type: ret,
            body: Some(block(body)),
            annotations: vec![],
        }),
        loc(),
    )
}

pub fn extern_function(
    name: &str,
    params: Vec<NodeRef>,
    ret: NodeRef,
    annotations: Vec<Annotation>,
) -> NodeRef {
    Node::decl(
        Decl::ExternFunction(ExternFnDecl {
            name: name.to_string(),
            params: params.into(),
            return_type: ret,
            annotations,
        }),
        loc(),
    )
}

pub fn program(decls: Vec<NodeRef>) -> NodeRef {
    Node::program(
        Program {
            package: "main".to_string(),
            imports: NodeList::new(),
            decls: decls.into(),
        },
        loc(),
    )
}

/// Analyze a program built from `decls`; asserts the structural (fatal)
/// outcome was success and returns the analyzer for inspection.
pub fn analyze(decls: Vec<NodeRef>) -> SemanticAnalyzer {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = program(decls);
    let mut analyzer = SemanticAnalyzer::new();
    let structurally_ok = analyzer.analyze(&root);
    assert!(structurally_ok, "analysis must complete structurally");
    analyzer
}

pub fn error_kinds(analyzer: &SemanticAnalyzer) -> Vec<DiagnosticKind> {
    analyzer
        .diagnostics
        .diagnostics()
        .iter()
        .filter(|diag| diag.severity == Severity::Error)
        .map(|diag| diag.kind)
        .collect()
}

pub fn error_messages(analyzer: &SemanticAnalyzer) -> Vec<String> {
    analyzer
        .diagnostics
        .diagnostics()
        .iter()
        .filter(|diag| diag.severity == Severity::Error)
        .map(|diag| diag.message.clone())
        .collect()
}
