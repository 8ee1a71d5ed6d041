// Generic declaration, instantiation caching and builtin Option/Result
// through the full analyzer.

mod common;

use aster_ast::{Decl, Node, StructDecl, StructField, Visibility};
use aster_diagnostics::DiagnosticKind;
use aster_sema::{SymbolKind, TypeKind};
use common::*;
use std::sync::Arc;

fn vec_struct_decl() -> aster_ast::NodeRef {
    // pub struct Vec<T> { data: []T, len: u64 }
    Node::decl(
        Decl::Struct(StructDecl {
            name: "Vec".to_string(),
            visibility: Visibility::Public,
            type_params: vec!["T".to_string()],
            fields: vec![
                StructField {
                    name: "data".to_string(),
                    ty: slice_type(named_type("T")),
                    visibility: Visibility::Public,
                },
                StructField {
                    name: "len".to_string(),
                    ty: named_type("u64"),
                    visibility: Visibility::Public,
                },
            ],
            annotations: vec![],
        }),
        loc(),
    )
}

#[test]
fn result_ok_infers_through_declared_type() {
    // pub fn main(none) -> void {
    //     let result: Result<i32, string> = Result.Ok(42);
    //     return ();
    // }
    let analyzer = analyze(vec![function(
        "main",
        vec![],
        named_type("void"),
        vec![
            let_stmt(
                "result",
                Some(generic_type(
                    "Result",
                    vec![named_type("i32"), named_type("string")],
                )),
                Some(associated_call("Result", "Ok", vec![int_lit(42)])),
                false,
            ),
            return_unit(),
        ],
    )]);

    assert!(!analyzer.has_errors());

    let decl = analyzer.generics().get("Result").expect("Result registered");
    assert_eq!(decl.instantiation_count(), 1);
    let inst = decl.instantiations().remove(0);
    assert_eq!(inst.concrete_name, "Result_i32_string");

    // The substituted Ok payload is i32.
    let ok_variant = inst.members.lookup_local("Ok").expect("Ok variant");
    assert_eq!(ok_variant.kind, SymbolKind::EnumVariant);
    assert_eq!(
        ok_variant.ty.as_ref().map(|ty| ty.type_name()),
        Some("i32".to_string())
    );

    // Qualified variant resolution stays available globally.
    let qualified = analyzer
        .global_scope()
        .lookup_safe("Result.Ok")
        .expect("qualified variant");
    assert_eq!(qualified.kind, SymbolKind::EnumVariant);
}

#[test]
fn repeated_instantiation_is_shared_by_identity() {
    // Two uses of Vec<i32> in the same unit yield one registry entry.
    let analyzer = analyze(vec![
        vec_struct_decl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("a", Some(generic_type("Vec", vec![named_type("i32")])), None, false),
                let_stmt("b", Some(generic_type("Vec", vec![named_type("i32")])), None, false),
                return_unit(),
            ],
        ),
    ]);

    assert!(!analyzer.has_errors());

    let decl = analyzer.generics().get("Vec").expect("Vec registered");
    assert_eq!(decl.instantiation_count(), 1);
    assert_eq!(analyzer.generics().total_instantiations(), 1);

    let cached = decl.instantiations().remove(0);
    assert_eq!(cached.concrete_name, "Vec_i32");

    // A later request by an emitter returns the same instantiation.
    let again = analyzer
        .generics()
        .instantiate("Vec", &cached.args)
        .expect("cache hit");
    assert!(Arc::ptr_eq(&cached, &again));
}

#[test]
fn distinct_arguments_make_distinct_instantiations() {
    let analyzer = analyze(vec![
        vec_struct_decl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("a", Some(generic_type("Vec", vec![named_type("i32")])), None, false),
                let_stmt("b", Some(generic_type("Vec", vec![named_type("bool")])), None, false),
                return_unit(),
            ],
        ),
    ]);

    assert!(!analyzer.has_errors());
    let decl = analyzer.generics().get("Vec").expect("Vec registered");
    assert_eq!(decl.instantiation_count(), 2);
}

#[test]
fn substituted_fields_are_concrete() {
    let analyzer = analyze(vec![
        vec_struct_decl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt("a", Some(generic_type("Vec", vec![named_type("i32")])), None, false),
                return_unit(),
            ],
        ),
    ]);

    let decl = analyzer.generics().get("Vec").expect("Vec registered");
    let inst = decl.instantiations().remove(0);
    let data = inst.members.lookup_local("data").expect("data field");
    assert_eq!(
        data.ty.as_ref().map(|ty| ty.type_name()),
        Some("[]i32".to_string())
    );

    match &inst.concrete.kind {
        TypeKind::Struct { generic, .. } => assert!(!generic),
        other => panic!("expected a concrete struct, got {:?}", other),
    }

    // The generated C text names the mangled type.
    assert!(inst.c_source().contains("Vec_i32"));
}

#[test]
fn wrong_argument_count_is_reported() {
    let analyzer = analyze(vec![
        vec_struct_decl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                let_stmt(
                    "a",
                    Some(generic_type(
                        "Vec",
                        vec![named_type("i32"), named_type("bool")],
                    )),
                    None,
                    false,
                ),
                return_unit(),
            ],
        ),
    ]);

    assert!(error_kinds(&analyzer).contains(&DiagnosticKind::GenericArgMismatch));
}

#[test]
fn generic_constructor_without_context_fails_inference() {
    // Result.Ok(42) with no declared type to infer from.
    let analyzer = analyze(vec![function(
        "f",
        vec![],
        named_type("void"),
        vec![
            expr_stmt(associated_call("Result", "Ok", vec![int_lit(42)])),
            return_unit(),
        ],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::TypeInferenceFailed]
    );
}

#[test]
fn option_type_sugar_instantiates() {
    let inner = Node::type_expr(
        aster_ast::TypeExpr::OptionType {
            inner: named_type("i32"),
        },
        loc(),
    );
    let analyzer = analyze(vec![function(
        "f",
        vec![],
        named_type("void"),
        vec![
            let_stmt(
                "maybe",
                Some(inner),
                Some(associated_call("Option", "Some", vec![int_lit(5)])),
                false,
            ),
            return_unit(),
        ],
    )]);

    assert!(!analyzer.has_errors());
    let decl = analyzer.generics().get("Option").expect("Option registered");
    assert_eq!(decl.instantiation_count(), 1);
    assert_eq!(decl.instantiations().remove(0).concrete_name, "Option_i32");
}

#[test]
fn unit_variant_takes_no_payload() {
    let analyzer = analyze(vec![function(
        "f",
        vec![],
        named_type("void"),
        vec![
            let_stmt(
                "nothing",
                Some(generic_type("Option", vec![named_type("i32")])),
                Some(associated_call("Option", "None", vec![])),
                false,
            ),
            return_unit(),
        ],
    )]);

    assert!(!analyzer.has_errors());
}

#[test]
fn type_info_matches_descriptor_category() {
    let binding = let_stmt(
        "a",
        Some(generic_type("Vec", vec![named_type("i32")])),
        None,
        false,
    );
    let root = program(vec![
        vec_struct_decl(),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![binding.clone(), return_unit()],
        ),
    ]);

    let mut analyzer = aster_sema::SemanticAnalyzer::new();
    assert!(analyzer.analyze(&root));

    // The instance projects to its base category with substituted fields.
    let info = binding.type_info().expect("typed let");
    assert_eq!(info.category(), "struct");
    assert_eq!(info.name, "Vec_i32");
    match &info.kind {
        aster_ast::TypeInfoKind::Struct { fields } => {
            assert_eq!(fields.len(), 2);
            assert!(fields.iter().any(|field| field.name == "data"));
        }
        other => panic!("expected struct projection, got {:?}", other),
    }
}

#[test]
fn used_twice_same_identity_in_registry() {
    // The universal invariant: name-equal argument lists resolve to the
    // same instantiation object.
    let analyzer = analyze(vec![vec_struct_decl()]);
    let i32_ty = aster_sema::TypeDescriptor::primitive(aster_sema::PrimitiveKind::I32);

    let first = analyzer
        .generics()
        .instantiate("Vec", &[i32_ty.clone()])
        .expect("first");
    let second = analyzer
        .generics()
        .instantiate("Vec", &[i32_ty])
        .expect("second");
    assert!(Arc::ptr_eq(&first, &second));
}
