// Ownership and FFI boundary rules: extern tags, transfer annotations,
// const-pointer assignment and unsafe gating.

mod common;

use aster_ast::{Annotation, TransferMode};
use aster_diagnostics::DiagnosticKind;
use common::*;

#[test]
fn assignment_through_const_pointer_is_rejected() {
    // pub fn f(p: *const i32) -> void { unsafe { *p = 1; }; return (); }
    let analyzer = analyze(vec![function(
        "f",
        vec![param("p", pointer_type(named_type("i32"), false))],
        named_type("void"),
        vec![
            unsafe_block(vec![assign_stmt(deref(ident("p")), int_lit(1))]),
            return_unit(),
        ],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::OwnershipTransferViolation]
    );
    assert!(error_messages(&analyzer)[0].contains("cannot assign through const pointer"));
}

#[test]
fn assignment_through_mut_pointer_in_unsafe_succeeds() {
    let analyzer = analyze(vec![function(
        "f",
        vec![param("p", pointer_type(named_type("i32"), true))],
        named_type("void"),
        vec![
            unsafe_block(vec![assign_stmt(deref(ident("p")), int_lit(1))]),
            return_unit(),
        ],
    )]);

    assert!(!analyzer.has_errors());
}

#[test]
fn pointer_dereference_outside_unsafe_is_rejected() {
    let analyzer = analyze(vec![function(
        "f",
        vec![param("p", pointer_type(named_type("i32"), false))],
        named_type("void"),
        vec![
            let_stmt("x", Some(named_type("i32")), Some(deref(ident("p"))), false),
            return_unit(),
        ],
    )]);

    assert!(analyzer.has_errors());
    assert!(error_messages(&analyzer)
        .iter()
        .any(|msg| msg.contains("unsafe")));
}

#[test]
fn extern_with_gc_tag_is_rejected() {
    let analyzer = analyze(vec![extern_function(
        "native_init",
        vec![],
        named_type("void"),
        vec![Annotation::Ownership("gc".to_string())],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::OwnershipFfiBoundary]
    );
}

#[test]
fn extern_pointer_param_requires_transfer_annotation() {
    let analyzer = analyze(vec![extern_function(
        "native_read",
        vec![param("buf", pointer_type(named_type("u8"), true))],
        named_type("void"),
        vec![],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::OwnershipFfiBoundary]
    );
    assert!(error_messages(&analyzer)[0].contains("transfer"));
}

#[test]
fn extern_pointer_param_with_transfer_passes() {
    let analyzer = analyze(vec![extern_function(
        "native_read",
        vec![param_with_annotations(
            "buf",
            pointer_type(named_type("u8"), true),
            vec![Annotation::Transfer(TransferMode::Borrowed)],
        )],
        named_type("void"),
        vec![],
    )]);

    assert!(!analyzer.has_errors());
}

#[test]
fn extern_cannot_return_borrowed_reference() {
    let analyzer = analyze(vec![extern_function(
        "native_name",
        vec![],
        pointer_type(named_type("u8"), false),
        vec![Annotation::Transfer(TransferMode::Borrowed)],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::OwnershipTransferViolation]
    );
}

#[test]
fn borrowed_annotation_on_let_is_rejected() {
    let analyzer = analyze(vec![function(
        "f",
        vec![],
        named_type("void"),
        vec![
            common::let_with_annotations(
                "x",
                named_type("i32"),
                int_lit(1),
                vec![Annotation::Transfer(TransferMode::Borrowed)],
            ),
            return_unit(),
        ],
    )]);

    assert_eq!(
        error_kinds(&analyzer),
        vec![DiagnosticKind::OwnershipTransferViolation]
    );
}

#[test]
fn extern_call_checks_arguments() {
    // extern fn native_log(msg: string) -> void; called correctly.
    let analyzer = analyze(vec![
        extern_function(
            "native_log",
            vec![param("msg", named_type("string"))],
            named_type("void"),
            vec![],
        ),
        function(
            "f",
            vec![],
            named_type("void"),
            vec![
                expr_stmt(call("native_log", vec![str_lit("ready")])),
                return_unit(),
            ],
        ),
    ]);

    assert!(!analyzer.has_errors());
}
