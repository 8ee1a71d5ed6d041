// Predeclared symbols installed at analyzer construction: primitive
// types, aliases, builtin functions and the generic `Option` / `Result`
// enums.

use crate::generics::GenericRegistry;
use crate::symbols::{SymbolEntry, SymbolKind, SymbolTable};
use crate::types::{PrimitiveKind, TypeDescriptor, TypeRef};
use aster_ast::Visibility;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("builtin symbol `{name}` is already defined")]
    Duplicate { name: String },
}

/// Primitive names registered directly. `usize` and `isize` are aliases
/// (below), not direct registrations.
const NAMED_PRIMITIVES: &[PrimitiveKind] = &[
    PrimitiveKind::Void,
    PrimitiveKind::Bool,
    PrimitiveKind::I8,
    PrimitiveKind::I16,
    PrimitiveKind::I32,
    PrimitiveKind::I64,
    PrimitiveKind::I128,
    PrimitiveKind::U8,
    PrimitiveKind::U16,
    PrimitiveKind::U32,
    PrimitiveKind::U64,
    PrimitiveKind::U128,
    PrimitiveKind::F32,
    PrimitiveKind::F64,
    PrimitiveKind::Char,
    PrimitiveKind::Str,
    PrimitiveKind::Never,
];

/// Alias names mapping onto concrete primitive descriptors.
const TYPE_ALIASES: &[(&str, PrimitiveKind)] = &[
    ("int", PrimitiveKind::I32),
    ("float", PrimitiveKind::F32),
    ("usize", PrimitiveKind::U64),
    ("isize", PrimitiveKind::I64),
];

/// Install every predeclared symbol into the global scope and register
/// the builtin generics. Fails only if the global scope is already
/// polluted with a clashing name.
pub fn install(global: &Arc<SymbolTable>, generics: &GenericRegistry) -> Result<(), BuiltinError> {
    install_primitives(global)?;
    install_functions(global)?;
    install_option(global, generics)?;
    install_result(global, generics)?;
    Ok(())
}

fn insert_type(global: &Arc<SymbolTable>, name: &str, ty: TypeRef) -> Result<(), BuiltinError> {
    let entry = SymbolEntry::new(name, SymbolKind::Type, Some(ty))
        .with_visibility(Visibility::Public)
        .with_predeclared();
    if !global.insert_safe(name, entry) {
        return Err(BuiltinError::Duplicate {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn install_primitives(global: &Arc<SymbolTable>) -> Result<(), BuiltinError> {
    for &kind in NAMED_PRIMITIVES {
        insert_type(global, kind.name(), TypeDescriptor::primitive(kind))?;
    }
    for &(alias, kind) in TYPE_ALIASES {
        insert_type(global, alias, TypeDescriptor::primitive(kind))?;
    }

    // Opaque iterator type produced by `infinite()`.
    let fields = SymbolTable::new();
    insert_type(
        global,
        "InfiniteIterator",
        TypeDescriptor::strukt("InfiniteIterator", fields, Vec::new(), false),
    )?;
    Ok(())
}

fn predeclared_fn(
    global: &Arc<SymbolTable>,
    name: &str,
    params: Vec<TypeRef>,
    ret: TypeRef,
) -> Result<(), BuiltinError> {
    let ty = TypeDescriptor::function(params, ret, false, Vec::new());
    let entry = SymbolEntry::new(name, SymbolKind::Function, Some(ty))
        .with_visibility(Visibility::Public)
        .with_predeclared();
    if !global.insert_safe(name, entry) {
        return Err(BuiltinError::Duplicate {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn install_functions(global: &Arc<SymbolTable>) -> Result<(), BuiltinError> {
    let string = TypeDescriptor::primitive(PrimitiveKind::Str);
    let void = TypeDescriptor::primitive(PrimitiveKind::Void);
    let never = TypeDescriptor::primitive(PrimitiveKind::Never);
    let i32_ty = TypeDescriptor::primitive(PrimitiveKind::I32);

    predeclared_fn(global, "log", vec![string.clone()], void)?;
    predeclared_fn(global, "panic", vec![string.clone()], never)?;
    // `range` also accepts a (start, end) pair; the call analyzer admits
    // the binary form for this predeclared entry.
    predeclared_fn(
        global,
        "range",
        vec![i32_ty.clone()],
        TypeDescriptor::slice(i32_ty),
    )?;
    predeclared_fn(global, "args", Vec::new(), TypeDescriptor::slice(string))?;

    let infinite_ret = global
        .lookup_local("InfiniteIterator")
        .and_then(|entry| entry.ty.clone())
        .ok_or_else(|| BuiltinError::Duplicate {
            name: "InfiniteIterator".to_string(),
        })?;
    predeclared_fn(global, "infinite", Vec::new(), infinite_ret)?;
    Ok(())
}

fn variant(name: &str, payload: Option<TypeRef>) -> SymbolEntry {
    SymbolEntry::new(name, SymbolKind::EnumVariant, payload)
        .with_visibility(Visibility::Public)
        .with_predeclared()
}

fn install_option(
    global: &Arc<SymbolTable>,
    generics: &GenericRegistry,
) -> Result<(), BuiltinError> {
    let t = TypeDescriptor::type_parameter("T");

    let variants = SymbolTable::new();
    variants.insert_safe("Some", variant("Some", Some(t)));
    variants.insert_safe("None", variant("None", None));

    let base = TypeDescriptor::enumeration("Option", variants.clone(), 2, true);
    let entry = SymbolEntry::new("Option", SymbolKind::Type, Some(base.clone()))
        .with_visibility(Visibility::Public)
        .with_predeclared()
        .with_type_params(1);
    if !global.insert_safe("Option", entry) {
        return Err(BuiltinError::Duplicate {
            name: "Option".to_string(),
        });
    }

    // Qualified variant names resolve from anywhere.
    for variant_name in ["Some", "None"] {
        if let Some(shared) = variants.lookup_local(variant_name) {
            let qualified = format!("Option.{}", variant_name);
            if !global.insert_shared(&qualified, shared) {
                return Err(BuiltinError::Duplicate { name: qualified });
            }
        }
    }

    generics.register("Option", base, vec!["T".to_string()], None);
    Ok(())
}

fn install_result(
    global: &Arc<SymbolTable>,
    generics: &GenericRegistry,
) -> Result<(), BuiltinError> {
    let t = TypeDescriptor::type_parameter("T");
    let e = TypeDescriptor::type_parameter("E");

    let variants = SymbolTable::new();
    variants.insert_safe("Ok", variant("Ok", Some(t)));
    variants.insert_safe("Err", variant("Err", Some(e)));

    let base = TypeDescriptor::enumeration("Result", variants.clone(), 2, true);
    let entry = SymbolEntry::new("Result", SymbolKind::Type, Some(base.clone()))
        .with_visibility(Visibility::Public)
        .with_predeclared()
        .with_type_params(2);
    if !global.insert_safe("Result", entry) {
        return Err(BuiltinError::Duplicate {
            name: "Result".to_string(),
        });
    }

    for variant_name in ["Ok", "Err"] {
        if let Some(shared) = variants.lookup_local(variant_name) {
            let qualified = format!("Result.{}", variant_name);
            if !global.insert_shared(&qualified, shared) {
                return Err(BuiltinError::Duplicate { name: qualified });
            }
        }
    }

    generics.register("Result", base, vec!["T".to_string(), "E".to_string()], None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeKind;

    fn installed() -> (Arc<SymbolTable>, GenericRegistry) {
        let global = SymbolTable::new();
        let generics = GenericRegistry::new();
        install(&global, &generics).expect("fresh scope installs cleanly");
        (global, generics)
    }

    #[test]
    fn test_primitives_and_aliases() {
        let (global, _) = installed();

        let i32_entry = global.lookup_local("i32").expect("i32 registered");
        assert_eq!(i32_entry.kind, SymbolKind::Type);
        assert!(i32_entry.predeclared);

        // Aliases resolve to the canonical descriptors.
        let int_entry = global.lookup_local("int").expect("int registered");
        let usize_entry = global.lookup_local("usize").expect("usize registered");
        assert_eq!(
            int_entry.ty.as_ref().map(|t| t.type_name()),
            Some("i32".to_string())
        );
        assert_eq!(
            usize_entry.ty.as_ref().map(|t| t.type_name()),
            Some("u64".to_string())
        );
    }

    #[test]
    fn test_predeclared_functions() {
        let (global, _) = installed();

        let log = global.lookup_local("log").expect("log registered");
        assert_eq!(log.kind, SymbolKind::Function);
        match log.ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Function { params, ret, .. }) => {
                assert_eq!(params.len(), 1);
                assert_eq!(params[0].type_name(), "string");
                assert!(ret.is_void());
            }
            other => panic!("unexpected type for log: {:?}", other),
        }

        let panic_fn = global.lookup_local("panic").expect("panic registered");
        match panic_fn.ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Function { ret, .. }) => assert!(ret.is_never()),
            other => panic!("unexpected type for panic: {:?}", other),
        }

        let range = global.lookup_local("range").expect("range registered");
        match range.ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Function { ret, .. }) => assert_eq!(ret.type_name(), "[]i32"),
            other => panic!("unexpected type for range: {:?}", other),
        }
    }

    #[test]
    fn test_builtin_generics() {
        let (global, generics) = installed();

        let option = global.lookup_local("Option").expect("Option registered");
        assert!(option.is_generic());
        assert_eq!(option.type_param_count, 1);

        let result = global.lookup_local("Result").expect("Result registered");
        assert_eq!(result.type_param_count, 2);

        assert!(generics.contains("Option"));
        assert!(generics.contains("Result"));

        // Qualified variant names are globally visible and shared with
        // the enum's own member table.
        let qualified = global.lookup_local("Result.Ok").expect("qualified Ok");
        assert_eq!(qualified.kind, SymbolKind::EnumVariant);
        match result.ty.as_ref().map(|t| &t.kind) {
            Some(TypeKind::Enum { variants, .. }) => {
                let member = variants.lookup_local("Ok").expect("member Ok");
                assert!(Arc::ptr_eq(&member, &qualified));
            }
            other => panic!("unexpected type for Result: {:?}", other),
        }
    }

    #[test]
    fn test_double_install_fails() {
        let global = SymbolTable::new();
        let generics = GenericRegistry::new();
        install(&global, &generics).expect("first install");
        assert!(install(&global, &generics).is_err());
    }
}
