// Declarations end to end: constants, structs with literals and field
// access, impl blocks with methods, casts and if-let.

mod common;

use aster_ast::{
    ConstDecl, Decl, Expr, FunctionDecl, ImplDecl, Node, NodeRef, Pattern, Stmt, StructDecl,
    StructField, UnaryOp, Visibility,
};
use aster_diagnostics::DiagnosticKind;
use aster_sema::{ConstValue, SymbolKind};
use common::*;

fn const_decl(name: &str, ty: Option<NodeRef>, value: NodeRef) -> NodeRef {
    Node::decl(
        Decl::Const(ConstDecl {
            name: name.to_string(),
            visibility: Visibility::Public,
            ty,
            value,
        }),
        loc(),
    )
}

fn point_struct() -> NodeRef {
    Node::decl(
        Decl::Struct(StructDecl {
            name: "Point".to_string(),
            visibility: Visibility::Public,
            type_params: vec![],
            fields: vec![
                StructField {
                    name: "x".to_string(),
                    ty: named_type("i32"),
                    visibility: Visibility::Public,
                },
                StructField {
                    name: "y".to_string(),
                    ty: named_type("i32"),
                    visibility: Visibility::Public,
                },
            ],
            annotations: vec![],
        }),
        loc(),
    )
}

fn point_literal(x: i64, y: i64) -> NodeRef {
    Node::expr(
        Expr::StructLiteral {
            name: "Point".to_string(),
            type_args: vec![],
            fields: vec![("x".to_string(), int_lit(x)), ("y".to_string(), int_lit(y))],
        },
        loc(),
    )
}

fn field_access(base: NodeRef, field: &str) -> NodeRef {
    Node::expr(
        Expr::FieldAccess {
            base,
            field: field.to_string(),
        },
        loc(),
    )
}

#[test]
fn const_with_arithmetic_and_sizeof() {
    let analyzer = analyze(vec![
        const_decl(
            "WORD",
            Some(named_type("u64")),
            call("sizeof", vec![ident("i64")]),
        ),
        const_decl(
            "BUFFER",
            Some(named_type("i32")),
            Node::expr(
                Expr::Binary {
                    op: aster_ast::BinaryOp::Mul,
                    left: ident("CHUNK"),
                    right: int_lit(4),
                },
                loc(),
            ),
        ),
        const_decl("CHUNK", Some(named_type("i32")), int_lit(256)),
    ]);

    // BUFFER references CHUNK, declared later in source; constants are
    // processed in source order, so that reference fails.
    assert!(error_kinds(&analyzer).contains(&DiagnosticKind::InvalidOperation));

    let word = analyzer
        .global_scope()
        .lookup_safe("WORD")
        .expect("WORD declared");
    assert_eq!(word.kind, SymbolKind::Const);
    assert_eq!(word.const_value, Some(ConstValue::Int(8)));
}

#[test]
fn const_reference_in_source_order_evaluates() {
    let analyzer = analyze(vec![
        const_decl("CHUNK", Some(named_type("i32")), int_lit(256)),
        const_decl(
            "BUFFER",
            Some(named_type("i32")),
            Node::expr(
                Expr::Binary {
                    op: aster_ast::BinaryOp::Mul,
                    left: ident("CHUNK"),
                    right: int_lit(4),
                },
                loc(),
            ),
        ),
    ]);

    assert!(!analyzer.has_errors());
    let buffer = analyzer
        .global_scope()
        .lookup_safe("BUFFER")
        .expect("BUFFER declared");
    assert_eq!(buffer.const_value, Some(ConstValue::Int(1024)));
}

#[test]
fn const_without_type_annotation_is_rejected() {
    let analyzer = analyze(vec![const_decl("LOOSE", None, int_lit(1))]);
    assert_eq!(error_kinds(&analyzer), vec![DiagnosticKind::InvalidOperation]);
}

#[test]
fn struct_literal_and_field_assignment() {
    let analyzer = analyze(vec![
        point_struct(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("p", Some(named_type("Point")), Some(point_literal(1, 2)), true),
                assign_stmt(field_access(ident("p"), "x"), int_lit(3)),
                return_unit(),
            ],
        ),
    ]);

    assert!(!analyzer.has_errors());
}

#[test]
fn field_assignment_through_immutable_binding_is_rejected() {
    let analyzer = analyze(vec![
        point_struct(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("p", Some(named_type("Point")), Some(point_literal(1, 2)), false),
                assign_stmt(field_access(ident("p"), "x"), int_lit(3)),
                return_unit(),
            ],
        ),
    ]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::ImmutableModification]
    );
}

#[test]
fn struct_literal_missing_field_is_rejected() {
    let literal = Node::expr(
        Expr::StructLiteral {
            name: "Point".to_string(),
            type_args: vec![],
            fields: vec![("x".to_string(), int_lit(1))],
        },
        loc(),
    );
    let analyzer = analyze(vec![
        point_struct(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("p", Some(named_type("Point")), Some(literal), false),
                return_unit(),
            ],
        ),
    ]);

    assert!(error_kinds(&analyzer).contains(&DiagnosticKind::InvalidOperation));
    assert!(error_messages(&analyzer)
        .iter()
        .any(|msg| msg.contains("missing field `y`")));
}

fn point_impl() -> NodeRef {
    // impl Point {
    //     pub fn sum(self: Point) -> i32 { return self.x + self.y; }
    //     pub fn origin(none) -> Point { return Point { x: 0, y: 0 }; }
    // }
    let sum_body = Node::stmt(
        Stmt::Return {
            value: Some(Node::expr(
                Expr::Binary {
                    op: aster_ast::BinaryOp::Add,
                    left: field_access(ident("self"), "x"),
                    right: field_access(ident("self"), "y"),
                },
                loc(),
            )),
        },
        loc(),
    );
    let sum = Node::decl(
        Decl::Function(FunctionDecl {
            name: "sum".to_string(),
            visibility: Visibility::Public,
            params: vec![param("self", named_type("Point"))].into(),
            return_type: named_type("i32"),
            body: Some(block(vec![sum_body])),
            annotations: vec![],
        }),
        loc(),
    );

    let origin_body = Node::stmt(
        Stmt::Return {
            value: Some(point_literal(0, 0)),
        },
        loc(),
    );
    let origin = Node::decl(
        Decl::Function(FunctionDecl {
            name: "origin".to_string(),
            visibility: Visibility::Public,
            params: vec![].into(),
            return_type: named_type("Point"),
            body: Some(block(vec![origin_body])),
            annotations: vec![],
        }),
        loc(),
    );

    Node::decl(
        Decl::Impl(ImplDecl {
            target: "Point".to_string(),
            methods: vec![sum, origin].into(),
        }),
        loc(),
    )
}

#[test]
fn impl_methods_resolve_for_instance_and_associated_calls() {
    let method_call = Node::expr(
        Expr::Call {
            callee: field_access(ident("p"), "sum"),
            args: vec![].into(),
        },
        loc(),
    );

    let analyzer = analyze(vec![
        point_struct(),
        point_impl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt(
                    "p",
                    Some(named_type("Point")),
                    Some(associated_call("Point", "origin", vec![])),
                    false,
                ),
                let_stmt("total", Some(named_type("i32")), Some(method_call), false),
                return_unit(),
            ],
        ),
    ]);

    assert!(!analyzer.has_errors());
}

#[test]
fn cast_rules() {
    let widen = Node::expr(
        Expr::Cast {
            expr: ident("x"),
            ty: named_type("i64"),
        },
        loc(),
    );
    let bad = Node::expr(
        Expr::Cast {
            expr: str_lit("text"),
            ty: named_type("i32"),
        },
        loc(),
    );

    let analyzer = analyze(vec![function(
        "f",
        vec![param("x", named_type("i32"))],
        named_type("void"),
        vec![
            let_stmt("wide", Some(named_type("i64")), Some(widen), false),
            let_stmt("broken", Some(named_type("i32")), Some(bad), false),
            return_unit(),
        ],
    )]);

    let kinds = error_kinds(&analyzer);
    assert_eq!(kinds, vec![DiagnosticKind::TypeMismatch]);
    assert!(error_messages(&analyzer)
        .iter()
        .any(|msg| msg.contains("cannot cast `string` to `i32`")));
}

#[test]
fn address_of_local_yields_const_pointer() {
    let take_addr = Node::expr(
        Expr::Unary {
            op: UnaryOp::AddressOf,
            operand: ident("x"),
        },
        loc(),
    );

    let analyzer = analyze(vec![function(
        "f",
        vec![],
        named_type("void"),
        vec![
            let_stmt("x", Some(named_type("i32")), Some(int_lit(5)), false),
            let_stmt(
                "p",
                Some(pointer_type(named_type("i32"), false)),
                Some(take_addr),
                false,
            ),
            return_unit(),
        ],
    )]);

    assert!(!analyzer.has_errors());
}

#[test]
fn if_let_binds_option_payload() {
    let if_let = Node::stmt(
        Stmt::IfLet {
            pattern: Pattern::Enum {
                enum_name: Some("Option".to_string()),
                variant: "Some".to_string(),
                inner: Some(Box::new(Pattern::Identifier("value".to_string()))),
            },
            value: ident("maybe"),
            then_block: block(vec![expr_stmt(call("log", vec![str_lit("got one")]))]),
            else_block: None,
        },
        loc(),
    );

    let analyzer = analyze(vec![function(
        "f",
        vec![param("maybe", generic_type("Option", vec![named_type("i32")]))],
        named_type("void"),
        vec![if_let, return_unit()],
    )]);

    assert!(!analyzer.has_errors());
}
