// Projection from analyzer type descriptors to the stable TypeInfo
// representation attached to AST nodes for downstream emitters.

use crate::types::{layout, PrimitiveKind, TypeKind, TypeRef};
use aster_ast::type_info::{FieldInfo, TypeInfo, TypeInfoKind};
use aster_ast::NodeRef;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static PRIMITIVE_INFOS: OnceLock<HashMap<PrimitiveKind, Arc<TypeInfo>>> = OnceLock::new();

fn primitive_info(kind: PrimitiveKind) -> Arc<TypeInfo> {
    let registry = PRIMITIVE_INFOS.get_or_init(|| {
        use PrimitiveKind::*;
        [
            Void, Bool, I8, I16, I32, I64, I128, U8, U16, U32, U64, U128, Usize, Isize, F32,
            F64, Char, Str, Never,
        ]
        .into_iter()
        .map(|kind| (kind, TypeInfo::primitive(kind)))
        .collect()
    });
    registry
        .get(&kind)
        .cloned()
        .unwrap_or_else(|| TypeInfo::primitive(kind))
}

/// Produce the stable projection of a descriptor. Projections mirror the
/// descriptor's sharing: primitives are singletons, aggregates are built
/// per request.
pub fn project(ty: &TypeRef) -> Arc<TypeInfo> {
    match &ty.kind {
        // Classification comes from the discriminant, never the name, so
        // aliases such as `usize` project to their canonical kind.
        TypeKind::Primitive(kind) => primitive_info(*kind),
        TypeKind::Struct {
            name,
            fields,
            field_order,
            ..
        } => {
            let ordered: Vec<(String, TypeRef)> = field_order
                .iter()
                .filter_map(|field| {
                    fields
                        .lookup_local(field)
                        .and_then(|entry| entry.ty.clone().map(|ty| (field.clone(), ty)))
                })
                .collect();
            let offsets =
                layout::member_offsets(ordered.iter().map(|(_, ty)| (ty.size, ty.align)));
            let projected = ordered
                .iter()
                .zip(offsets)
                .map(|((field, field_ty), offset)| FieldInfo {
                    name: field.clone(),
                    info: project(field_ty),
                    offset,
                })
                .collect();
            TypeInfo::new(
                name.clone(),
                ty.size,
                ty.align,
                TypeInfoKind::Struct { fields: projected },
            )
        }
        TypeKind::Enum { name, variants, .. } => {
            let mut names = Vec::new();
            variants.iterate(&mut |variant, _| {
                names.push(variant.to_string());
                true
            });
            names.sort();
            TypeInfo::new(
                name.clone(),
                ty.size,
                ty.align,
                TypeInfoKind::Enum { variants: names },
            )
        }
        TypeKind::Slice { elem } => TypeInfo::new(
            ty.type_name(),
            ty.size,
            ty.align,
            TypeInfoKind::Slice {
                elem: project(elem),
            },
        ),
        // Arrays project slice-shaped; the element count occupies the
        // size field.
        TypeKind::Array { elem, len } => TypeInfo::new(
            ty.type_name(),
            *len,
            ty.align,
            TypeInfoKind::Slice {
                elem: project(elem),
            },
        ),
        TypeKind::Pointer { pointee, mutable } => TypeInfo::new(
            ty.type_name(),
            ty.size,
            ty.align,
            TypeInfoKind::Pointer {
                pointee: project(pointee),
                mutable: *mutable,
            },
        ),
        TypeKind::Function { params, ret, .. } => TypeInfo::new(
            ty.type_name(),
            ty.size,
            ty.align,
            TypeInfoKind::Function {
                params: params.iter().map(project).collect(),
                ret: project(ret),
            },
        ),
        TypeKind::Tuple { elems } => TypeInfo::new(
            ty.type_name(),
            ty.size,
            ty.align,
            TypeInfoKind::Tuple {
                elems: elems.iter().map(project).collect(),
            },
        ),
        // Instances project to the base's category with fully
        // substituted members.
        TypeKind::GenericInstance { resolved, .. } => project(resolved),
        TypeKind::TaskHandle { result } => TypeInfo::new(
            ty.type_name(),
            ty.size,
            ty.align,
            TypeInfoKind::TaskHandle {
                result: project(result),
            },
        ),
        // Placeholders only appear inside un-instantiated generic bodies.
        TypeKind::TypeParameter { name } => TypeInfo::new(
            name.clone(),
            0,
            1,
            TypeInfoKind::Struct { fields: Vec::new() },
        ),
    }
}

/// Attach the projection of `ty` to `node`, replacing a previous one.
pub fn attach(node: &NodeRef, ty: &TypeRef) {
    node.attach_type_info(project(ty));
}
