// Stable, read-only type projections attached to analyzed AST nodes.
// Downstream emitters consume these without depending on the analyzer.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Primitive type discriminants. Classification of a projected type is
/// always driven by this discriminant, never by name comparison, so alias
/// names resolve to the correct kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    Isize,
    F32,
    F64,
    Char,
    Str,
    Never,
}

impl PrimitiveKind {
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::I128 => "i128",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::U128 => "u128",
            PrimitiveKind::Usize => "usize",
            PrimitiveKind::Isize => "isize",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Str => "string",
            PrimitiveKind::Never => "Never",
        }
    }

    /// Natural size on the 64-bit target, in bytes.
    pub fn size(&self) -> u64 {
        match self {
            PrimitiveKind::Void | PrimitiveKind::Never => 0,
            PrimitiveKind::Bool | PrimitiveKind::I8 | PrimitiveKind::U8 => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 | PrimitiveKind::Char => 4,
            PrimitiveKind::I64
            | PrimitiveKind::U64
            | PrimitiveKind::Usize
            | PrimitiveKind::Isize
            | PrimitiveKind::F64 => 8,
            PrimitiveKind::I128 | PrimitiveKind::U128 => 16,
            // string is {pointer, length}
            PrimitiveKind::Str => 16,
        }
    }

    /// Natural machine alignment, in bytes.
    pub fn align(&self) -> u64 {
        match self {
            PrimitiveKind::Void | PrimitiveKind::Never => 1,
            PrimitiveKind::Str => 8,
            other => other.size().max(1),
        }
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
                | PrimitiveKind::Isize
        )
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
                | PrimitiveKind::Usize
        )
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// A struct field in a projection, with its resolved layout offset.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub info: Arc<TypeInfo>,
    pub offset: u64,
}

/// Projection categories. These mirror the analyzer's type descriptor
/// categories; generic instances are projected to their base category with
/// substituted fields, and arrays project slice-shaped with the element
/// count in the size field.
#[derive(Debug, Clone)]
pub enum TypeInfoKind {
    Primitive(PrimitiveKind),
    Struct { fields: Vec<FieldInfo> },
    Enum { variants: Vec<String> },
    Slice { elem: Arc<TypeInfo> },
    Pointer { pointee: Arc<TypeInfo>, mutable: bool },
    Function { params: Vec<Arc<TypeInfo>>, ret: Arc<TypeInfo> },
    Tuple { elems: Vec<Arc<TypeInfo>> },
    TaskHandle { result: Arc<TypeInfo> },
}

impl TypeInfoKind {
    pub fn category(&self) -> &'static str {
        match self {
            TypeInfoKind::Primitive(_) => "primitive",
            TypeInfoKind::Struct { .. } => "struct",
            TypeInfoKind::Enum { .. } => "enum",
            TypeInfoKind::Slice { .. } => "slice",
            TypeInfoKind::Pointer { .. } => "pointer",
            TypeInfoKind::Function { .. } => "function",
            TypeInfoKind::Tuple { .. } => "tuple",
            TypeInfoKind::TaskHandle { .. } => "task_handle",
        }
    }
}

static NEXT_TYPE_INFO_ID: AtomicU64 = AtomicU64::new(1);

/// Immutable type projection with a globally unique id. Shared via `Arc`;
/// attaching a projection to a node replaces (and thereby releases) any
/// previous one.
#[derive(Debug)]
pub struct TypeInfo {
    pub id: u64,
    pub created_at: SystemTime,
    pub name: String,
    pub size: u64,
    pub align: u64,
    pub kind: TypeInfoKind,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, size: u64, align: u64, kind: TypeInfoKind) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_TYPE_INFO_ID.fetch_add(1, Ordering::Relaxed),
            created_at: SystemTime::now(),
            name: name.into(),
            size,
            align,
            kind,
        })
    }

    pub fn primitive(kind: PrimitiveKind) -> Arc<Self> {
        Self::new(
            kind.name(),
            kind.size(),
            kind.align(),
            TypeInfoKind::Primitive(kind),
        )
    }

    pub fn category(&self) -> &'static str {
        self.kind.category()
    }
}
