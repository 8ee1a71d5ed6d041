// Type compatibility: may a value of type `actual` be used where
// `expected` is required?

use super::{TypeKind, TypeRef};
use std::sync::Arc;

/// Structural compatibility with name equality for nominal types.
/// `Never` is compatible with every expected type.
pub fn compatible(expected: &TypeRef, actual: &TypeRef) -> bool {
    if Arc::ptr_eq(expected, actual) {
        return true;
    }
    if actual.is_never() {
        return true;
    }

    match (&expected.kind, &actual.kind) {
        (TypeKind::Primitive(want), TypeKind::Primitive(have)) => want == have,
        (
            TypeKind::Struct { name: want, .. },
            TypeKind::Struct { name: have, .. },
        ) => want == have,
        (
            TypeKind::Enum { name: want, .. },
            TypeKind::Enum { name: have, .. },
        ) => want == have,
        (TypeKind::Slice { elem: want }, TypeKind::Slice { elem: have }) => {
            compatible(want, have)
        }
        (
            TypeKind::Array {
                elem: want,
                len: want_len,
            },
            TypeKind::Array {
                elem: have,
                len: have_len,
            },
        ) => want_len == have_len && compatible(want, have),
        (
            TypeKind::Pointer {
                pointee: want,
                mutable: want_mut,
            },
            TypeKind::Pointer {
                pointee: have,
                mutable: have_mut,
            },
        ) => {
            // A *mut pointer may stand in for *const, never the reverse.
            (!want_mut || *have_mut) && compatible(want, have)
        }
        (TypeKind::Tuple { elems: want }, TypeKind::Tuple { elems: have }) => {
            want.len() == have.len()
                && want.iter().zip(have.iter()).all(|(w, h)| compatible(w, h))
        }
        (
            TypeKind::Function {
                params: want_params,
                ret: want_ret,
                ..
            },
            TypeKind::Function {
                params: have_params,
                ret: have_ret,
                ..
            },
        ) => {
            want_params.len() == have_params.len()
                && want_params
                    .iter()
                    .zip(have_params.iter())
                    .all(|(w, h)| compatible(w, h))
                && compatible(want_ret, have_ret)
        }
        (
            TypeKind::GenericInstance {
                base: want_base,
                args: want_args,
                ..
            },
            TypeKind::GenericInstance {
                base: have_base,
                args: have_args,
                ..
            },
        ) => {
            want_base.type_name() == have_base.type_name()
                && want_args.len() == have_args.len()
                && want_args
                    .iter()
                    .zip(have_args.iter())
                    .all(|(w, h)| compatible(w, h))
        }
        // A concrete instance also satisfies its own resolved concrete type.
        (_, TypeKind::GenericInstance { resolved, .. }) => compatible(expected, resolved),
        (TypeKind::GenericInstance { resolved, .. }, _) => compatible(resolved, actual),
        (
            TypeKind::TaskHandle { result: want },
            TypeKind::TaskHandle { result: have },
        ) => compatible(want, have),
        (
            TypeKind::TypeParameter { name: want },
            TypeKind::TypeParameter { name: have },
        ) => want == have,
        _ => false,
    }
}

/// Pairwise name-equality over two argument lists, the ordering used by
/// the instantiation cache.
pub fn args_name_equal(a: &[TypeRef], b: &[TypeRef]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.type_name() == y.type_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeDescriptor};

    #[test]
    fn test_primitive_compat() {
        let i32_ty = TypeDescriptor::primitive(PrimitiveKind::I32);
        let i64_ty = TypeDescriptor::primitive(PrimitiveKind::I64);
        assert!(compatible(&i32_ty, &i32_ty));
        assert!(!compatible(&i32_ty, &i64_ty));
    }

    #[test]
    fn test_never_compatible_with_everything() {
        let never = TypeDescriptor::primitive(PrimitiveKind::Never);
        let target = TypeDescriptor::slice(TypeDescriptor::primitive(PrimitiveKind::Str));
        assert!(compatible(&target, &never));
        assert!(!compatible(&never, &target));
    }

    #[test]
    fn test_pointer_mutability() {
        let i32_ty = TypeDescriptor::primitive(PrimitiveKind::I32);
        let const_ptr = TypeDescriptor::pointer(i32_ty.clone(), false);
        let mut_ptr = TypeDescriptor::pointer(i32_ty, true);
        // *mut decays to *const, not the other way round.
        assert!(compatible(&const_ptr, &mut_ptr));
        assert!(!compatible(&mut_ptr, &const_ptr));
    }

    #[test]
    fn test_args_name_equal() {
        let a = vec![
            TypeDescriptor::primitive(PrimitiveKind::I32),
            TypeDescriptor::primitive(PrimitiveKind::Str),
        ];
        let b = vec![
            TypeDescriptor::primitive(PrimitiveKind::I32),
            TypeDescriptor::primitive(PrimitiveKind::Str),
        ];
        let c = vec![
            TypeDescriptor::primitive(PrimitiveKind::I32),
            TypeDescriptor::primitive(PrimitiveKind::Bool),
        ];
        assert!(args_name_equal(&a, &b));
        assert!(!args_name_equal(&a, &c));
    }
}
