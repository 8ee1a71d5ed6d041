// Type descriptors: the analyzer's shared representation of types.
// Primitive descriptors are process-wide singletons and are never freed.

pub mod compat;
pub mod layout;

pub use compat::compatible;

use crate::symbols::SymbolTable;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

pub use aster_ast::type_info::PrimitiveKind;
use aster_ast::TransferMode;

/// Shared handle to a type descriptor.
pub type TypeRef = Arc<TypeDescriptor>;

/// Type categories with their structural data.
#[derive(Debug)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Struct {
        name: String,
        /// Member table holding FIELD entries.
        fields: Arc<SymbolTable>,
        /// Declaration order, for layout and projection.
        field_order: Vec<String>,
        generic: bool,
    },
    Enum {
        name: String,
        /// Member table holding ENUM_VARIANT entries.
        variants: Arc<SymbolTable>,
        variant_count: usize,
        generic: bool,
    },
    Slice {
        elem: TypeRef,
    },
    Array {
        elem: TypeRef,
        len: u64,
    },
    Pointer {
        pointee: TypeRef,
        mutable: bool,
    },
    Function {
        params: Vec<TypeRef>,
        ret: TypeRef,
        is_extern: bool,
        /// Per-parameter FFI transfer annotations, extern signatures only.
        transfers: Vec<Option<TransferMode>>,
    },
    Tuple {
        elems: Vec<TypeRef>,
    },
    /// Monomorphized use of a generic type. `resolved` is the concrete
    /// substituted struct or enum descriptor.
    GenericInstance {
        base: TypeRef,
        args: Vec<TypeRef>,
        resolved: TypeRef,
    },
    TaskHandle {
        result: TypeRef,
    },
    /// Placeholder for a declared type parameter inside a generic body.
    TypeParameter {
        name: String,
    },
}

/// A resolved type with its layout and FFI properties.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub size: u64,
    pub align: u64,
    pub ffi_compatible: bool,
    pub constant: bool,
}

static PRIMITIVES: OnceLock<HashMap<PrimitiveKind, TypeRef>> = OnceLock::new();

const ALL_PRIMITIVES: &[PrimitiveKind] = &[
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
    PrimitiveKind::Usize,
    PrimitiveKind::Isize,
    PrimitiveKind::F32,
    PrimitiveKind::F64,
    PrimitiveKind::Char,
    PrimitiveKind::Str,
    PrimitiveKind::Never,
];

fn primitive_registry() -> &'static HashMap<PrimitiveKind, TypeRef> {
    PRIMITIVES.get_or_init(|| {
        ALL_PRIMITIVES
            .iter()
            .map(|&kind| {
                let descriptor = Arc::new(TypeDescriptor {
                    kind: TypeKind::Primitive(kind),
                    size: kind.size(),
                    align: kind.align(),
                    ffi_compatible: kind != PrimitiveKind::Never,
                    constant: false,
                });
                (kind, descriptor)
            })
            .collect()
    })
}

impl TypeDescriptor {
    /// The process-wide singleton descriptor for a primitive.
    pub fn primitive(kind: PrimitiveKind) -> TypeRef {
        primitive_registry()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| {
                // The registry covers every discriminant; this arm is
                // unreachable but keeps the accessor total.
                Arc::new(TypeDescriptor {
                    kind: TypeKind::Primitive(kind),
                    size: kind.size(),
                    align: kind.align(),
                    ffi_compatible: kind != PrimitiveKind::Never,
                    constant: false,
                })
            })
    }

    /// True when the descriptor is one of the primitive singletons.
    pub fn is_builtin(descriptor: &TypeRef) -> bool {
        match &descriptor.kind {
            TypeKind::Primitive(kind) => primitive_registry()
                .get(kind)
                .map(|singleton| Arc::ptr_eq(singleton, descriptor))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn slice(elem: TypeRef) -> TypeRef {
        // {pointer, length}
        Arc::new(TypeDescriptor {
            kind: TypeKind::Slice { elem },
            size: 16,
            align: 8,
            ffi_compatible: false,
            constant: false,
        })
    }

    pub fn array(elem: TypeRef, len: u64) -> TypeRef {
        let size = elem.size.saturating_mul(len);
        let align = elem.align.max(1);
        let ffi = elem.ffi_compatible;
        Arc::new(TypeDescriptor {
            kind: TypeKind::Array { elem, len },
            size,
            align,
            ffi_compatible: ffi,
            constant: false,
        })
    }

    pub fn pointer(pointee: TypeRef, mutable: bool) -> TypeRef {
        let ffi = pointee.ffi_compatible;
        Arc::new(TypeDescriptor {
            kind: TypeKind::Pointer { pointee, mutable },
            size: 8,
            align: 8,
            ffi_compatible: ffi,
            constant: false,
        })
    }

    pub fn tuple(elems: Vec<TypeRef>) -> TypeRef {
        let (size, align) = layout::aggregate_layout(elems.iter().map(|e| (e.size, e.align)));
        let ffi = elems.iter().all(|e| e.ffi_compatible);
        Arc::new(TypeDescriptor {
            kind: TypeKind::Tuple { elems },
            size,
            align,
            ffi_compatible: ffi,
            constant: false,
        })
    }

    /// Struct descriptor over an already-populated member table.
    /// `field_order` lists field names in declaration order; layout is
    /// computed from it.
    pub fn strukt(
        name: impl Into<String>,
        fields: Arc<SymbolTable>,
        field_order: Vec<String>,
        generic: bool,
    ) -> TypeRef {
        let field_types: Vec<TypeRef> = field_order
            .iter()
            .filter_map(|field| fields.lookup_local(field).and_then(|entry| entry.ty.clone()))
            .collect();
        let (size, align) =
            layout::aggregate_layout(field_types.iter().map(|t| (t.size, t.align)));
        let ffi = !generic && field_types.iter().all(|t| t.ffi_compatible);
        Arc::new(TypeDescriptor {
            kind: TypeKind::Struct {
                name: name.into(),
                fields,
                field_order,
                generic,
            },
            size,
            align,
            ffi_compatible: ffi,
            constant: false,
        })
    }

    pub fn enumeration(
        name: impl Into<String>,
        variants: Arc<SymbolTable>,
        variant_count: usize,
        generic: bool,
    ) -> TypeRef {
        let mut payload_size = 0u64;
        let mut payload_align = 1u64;
        variants.iterate(&mut |_, entry| {
            if let Some(ty) = &entry.ty {
                payload_size = payload_size.max(ty.size);
                payload_align = payload_align.max(ty.align);
            }
            true
        });

        // 4-byte tag followed by the widest payload.
        let align = payload_align.max(4);
        let size = layout::align_up(4 + payload_size, align);
        Arc::new(TypeDescriptor {
            kind: TypeKind::Enum {
                name: name.into(),
                variants,
                variant_count,
                generic,
            },
            size,
            align,
            ffi_compatible: false,
            constant: false,
        })
    }

    pub fn function(
        params: Vec<TypeRef>,
        ret: TypeRef,
        is_extern: bool,
        transfers: Vec<Option<TransferMode>>,
    ) -> TypeRef {
        Arc::new(TypeDescriptor {
            kind: TypeKind::Function {
                params,
                ret,
                is_extern,
                transfers,
            },
            size: 8,
            align: 8,
            ffi_compatible: is_extern,
            constant: false,
        })
    }

    pub fn task_handle(result: TypeRef) -> TypeRef {
        Arc::new(TypeDescriptor {
            kind: TypeKind::TaskHandle { result },
            size: 8,
            align: 8,
            ffi_compatible: false,
            constant: false,
        })
    }

    pub fn generic_instance(base: TypeRef, args: Vec<TypeRef>, resolved: TypeRef) -> TypeRef {
        let ffi = args.iter().all(|arg| arg.ffi_compatible);
        Arc::new(TypeDescriptor {
            kind: TypeKind::GenericInstance {
                base,
                args,
                resolved: resolved.clone(),
            },
            size: resolved.size,
            align: resolved.align,
            ffi_compatible: ffi,
            constant: false,
        })
    }

    pub fn type_parameter(name: impl Into<String>) -> TypeRef {
        Arc::new(TypeDescriptor {
            kind: TypeKind::TypeParameter { name: name.into() },
            size: 0,
            align: 1,
            ffi_compatible: false,
            constant: false,
        })
    }

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            TypeKind::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(PrimitiveKind::Never))
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(PrimitiveKind::Void))
    }

    pub fn is_integer(&self) -> bool {
        self.primitive_kind().map(|k| k.is_integer()).unwrap_or(false)
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive_kind().map(|k| k.is_numeric()).unwrap_or(false)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(PrimitiveKind::Bool))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// Canonical source-level name of this type.
    pub fn type_name(&self) -> String {
        self.to_string()
    }

    /// Concrete identifier fragment used when mangling monomorphized
    /// names: `Vec` + `i32` becomes `Vec_i32`.
    pub fn mangle_fragment(&self) -> String {
        match &self.kind {
            TypeKind::GenericInstance { resolved, .. } => resolved.type_name(),
            TypeKind::Slice { elem } => format!("slice_{}", elem.mangle_fragment()),
            TypeKind::Array { elem, len } => format!("arr{}_{}", len, elem.mangle_fragment()),
            TypeKind::Pointer { pointee, mutable } => format!(
                "{}ptr_{}",
                if *mutable { "mut" } else { "const" },
                pointee.mangle_fragment()
            ),
            _ => self.type_name(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Primitive(kind) => write!(f, "{}", kind.name()),
            TypeKind::Struct { name, .. } | TypeKind::Enum { name, .. } => write!(f, "{}", name),
            TypeKind::Slice { elem } => write!(f, "[]{}", elem),
            TypeKind::Array { elem, len } => write!(f, "[{}]{}", len, elem),
            TypeKind::Pointer { pointee, mutable } => {
                write!(f, "*{} {}", if *mutable { "mut" } else { "const" }, pointee)
            }
            TypeKind::Function { params, ret, .. } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
            TypeKind::Tuple { elems } => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            TypeKind::GenericInstance { base, args, .. } => {
                write!(f, "{}<", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeKind::TaskHandle { result } => write!(f, "TaskHandle<{}>", result),
            TypeKind::TypeParameter { name } => write!(f, "{}", name),
        }
    }
}
