// Generic type monomorphization: registry of generic declarations and
// on-demand instantiation with structural caching.

use crate::symbols::{SymbolEntry, SymbolKind, SymbolTable};
use crate::types::compat::args_name_equal;
use crate::types::{TypeDescriptor, TypeKind, TypeRef};
use aster_ast::NodeRef;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstantiateError {
    #[error("unknown generic type `{name}`")]
    UnknownGeneric { name: String },
    #[error("generic `{name}` expects {expected} type arguments, got {found}")]
    ArgCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cyclic instantiation of generic `{name}`")]
    Cyclic { name: String },
}

/// One monomorphized concrete type. Shared for the lifetime of the
/// compilation unit; repeated requests with name-equal arguments return
/// the same instantiation.
#[derive(Debug)]
pub struct GenericInstantiation {
    /// Concrete mangled name, e.g. `Vec_i32`, `Pair_string_bool`.
    pub concrete_name: String,
    pub args: Vec<TypeRef>,
    /// Member table with fully-substituted field or variant types.
    pub members: Arc<SymbolTable>,
    /// The substituted concrete struct or enum descriptor.
    pub concrete: TypeRef,
    /// The `GENERIC_INSTANCE` descriptor handed to call sites.
    pub instance: TypeRef,
    source_text: OnceLock<String>,
}

impl GenericInstantiation {
    /// C struct text for the downstream source emitter, rendered once.
    pub fn c_source(&self) -> &str {
        self.source_text
            .get_or_init(|| render_c_struct(&self.concrete, &self.concrete_name))
    }
}

/// A registered generic declaration and its live instantiations.
#[derive(Debug)]
pub struct GenericDecl {
    pub name: String,
    pub decl: Option<NodeRef>,
    /// The declared base descriptor with type-parameter placeholders.
    pub base: TypeRef,
    /// Ordered type-parameter names; the length is fixed at declaration.
    pub params: Vec<String>,
    instances: RwLock<Vec<Arc<GenericInstantiation>>>,
    /// Guards against a generic instantiating itself through its own
    /// field types.
    generating: AtomicBool,
    generation: AtomicU64,
}

impl GenericDecl {
    pub fn type_param_count(&self) -> usize {
        self.params.len()
    }

    pub fn instantiation_count(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Snapshot of the live instantiations, for emitters.
    pub fn instantiations(&self) -> Vec<Arc<GenericInstantiation>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn find_cached(&self, args: &[TypeRef]) -> Option<Arc<GenericInstantiation>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|inst| args_name_equal(&inst.args, args))
            .cloned()
    }
}

/// Process-wide store of generic declarations, keyed by name.
#[derive(Debug, Default)]
pub struct GenericRegistry {
    decls: DashMap<String, Arc<GenericDecl>>,
    total_instantiations: AtomicU64,
}

impl GenericRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a generic declaration. Returns false when the name is
    /// already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        base: TypeRef,
        params: Vec<String>,
        decl: Option<NodeRef>,
    ) -> bool {
        let name = name.into();
        if self.decls.contains_key(&name) {
            return false;
        }
        self.decls.insert(
            name.clone(),
            Arc::new(GenericDecl {
                name,
                decl,
                base,
                params,
                instances: RwLock::new(Vec::new()),
                generating: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<GenericDecl>> {
        self.decls.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    pub fn total_instantiations(&self) -> u64 {
        self.total_instantiations.load(Ordering::Relaxed)
    }

    /// Monomorphize `name` with `args`. Requests whose argument lists are
    /// pairwise name-equal share a single instantiation.
    pub fn instantiate(
        &self,
        name: &str,
        args: &[TypeRef],
    ) -> Result<Arc<GenericInstantiation>, InstantiateError> {
        let decl = self
            .get(name)
            .ok_or_else(|| InstantiateError::UnknownGeneric {
                name: name.to_string(),
            })?;

        if args.len() != decl.params.len() {
            return Err(InstantiateError::ArgCountMismatch {
                name: decl.name.clone(),
                expected: decl.params.len(),
                found: args.len(),
            });
        }

        if let Some(cached) = decl.find_cached(args) {
            return Ok(cached);
        }

        if decl.generating.swap(true, Ordering::AcqRel) {
            return Err(InstantiateError::Cyclic {
                name: decl.name.clone(),
            });
        }
        let built = self.build_instantiation(&decl, args);
        decl.generating.store(false, Ordering::Release);
        let built = built?;

        let mut instances = decl
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // A racing unit may have inserted the same arguments meanwhile.
        if let Some(existing) = instances
            .iter()
            .find(|inst| args_name_equal(&inst.args, args))
        {
            return Ok(existing.clone());
        }

        let inst = Arc::new(built);
        instances.push(inst.clone());
        drop(instances);

        decl.generation.fetch_add(1, Ordering::Relaxed);
        self.total_instantiations.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "instantiated generic `{}` as `{}`",
            decl.name,
            inst.concrete_name
        );
        Ok(inst)
    }

    fn build_instantiation(
        &self,
        decl: &Arc<GenericDecl>,
        args: &[TypeRef],
    ) -> Result<GenericInstantiation, InstantiateError> {
        let mut concrete_name = decl.name.clone();
        for arg in args {
            concrete_name.push('_');
            concrete_name.push_str(&arg.mangle_fragment());
        }

        let (concrete, members) = match &decl.base.kind {
            TypeKind::Struct {
                fields,
                field_order,
                ..
            } => {
                let member_table = SymbolTable::new();
                for field in field_order {
                    if let Some(entry) = fields.lookup_local(field) {
                        let substituted = match &entry.ty {
                            Some(ty) => Some(self.substitute(ty, &decl.params, args)?),
                            None => None,
                        };
                        let mut new_entry =
                            SymbolEntry::new(field.clone(), SymbolKind::Field, substituted)
                                .with_visibility(entry.visibility);
                        if let Some(origin) = &entry.decl {
                            new_entry = new_entry.with_decl(origin.clone());
                        }
                        member_table.insert_safe(field, new_entry);
                    }
                }
                let concrete = TypeDescriptor::strukt(
                    concrete_name.clone(),
                    member_table.clone(),
                    field_order.clone(),
                    false,
                );
                (concrete, member_table)
            }
            TypeKind::Enum { variants, .. } => {
                let member_table = SymbolTable::new();
                let mut variant_count = 0usize;
                let mut failure = None;
                variants.iterate(&mut |name, entry| {
                    variant_count += 1;
                    let substituted = match &entry.ty {
                        Some(ty) => match self.substitute(ty, &decl.params, args) {
                            Ok(ty) => Some(ty),
                            Err(err) => {
                                failure = Some(err);
                                return false;
                            }
                        },
                        None => None,
                    };
                    let new_entry =
                        SymbolEntry::new(name, SymbolKind::EnumVariant, substituted)
                            .with_visibility(entry.visibility);
                    member_table.insert_safe(name, new_entry);
                    true
                });
                if let Some(err) = failure {
                    return Err(err);
                }
                let concrete = TypeDescriptor::enumeration(
                    concrete_name.clone(),
                    member_table.clone(),
                    variant_count,
                    false,
                );
                (concrete, member_table)
            }
            // A non-aggregate base substitutes directly.
            _ => {
                let concrete = self.substitute(&decl.base, &decl.params, args)?;
                (concrete, SymbolTable::new())
            }
        };

        let instance =
            TypeDescriptor::generic_instance(decl.base.clone(), args.to_vec(), concrete.clone());

        Ok(GenericInstantiation {
            concrete_name,
            args: args.to_vec(),
            members,
            concrete,
            instance,
            source_text: OnceLock::new(),
        })
    }

    /// Replace type parameters by concrete arguments throughout `ty`.
    /// Builds new descriptors; never mutates the input.
    pub fn substitute(
        &self,
        ty: &TypeRef,
        params: &[String],
        args: &[TypeRef],
    ) -> Result<TypeRef, InstantiateError> {
        match &ty.kind {
            TypeKind::TypeParameter { name } => Ok(params
                .iter()
                .position(|param| param == name)
                .and_then(|index| args.get(index).cloned())
                .unwrap_or_else(|| ty.clone())),
            TypeKind::Slice { elem } => {
                Ok(TypeDescriptor::slice(self.substitute(elem, params, args)?))
            }
            TypeKind::Array { elem, len } => Ok(TypeDescriptor::array(
                self.substitute(elem, params, args)?,
                *len,
            )),
            TypeKind::Pointer { pointee, mutable } => Ok(TypeDescriptor::pointer(
                self.substitute(pointee, params, args)?,
                *mutable,
            )),
            TypeKind::Tuple { elems } => {
                let substituted = elems
                    .iter()
                    .map(|elem| self.substitute(elem, params, args))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypeDescriptor::tuple(substituted))
            }
            TypeKind::TaskHandle { result } => Ok(TypeDescriptor::task_handle(
                self.substitute(result, params, args)?,
            )),
            TypeKind::Function {
                params: fn_params,
                ret,
                is_extern,
                transfers,
            } => {
                let substituted = fn_params
                    .iter()
                    .map(|param| self.substitute(param, params, args))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(TypeDescriptor::function(
                    substituted,
                    self.substitute(ret, params, args)?,
                    *is_extern,
                    transfers.clone(),
                ))
            }
            // A nested generic use propagates the substitution into its
            // arguments, then monomorphizes.
            TypeKind::GenericInstance { base, args: inner, .. } => {
                let substituted = inner
                    .iter()
                    .map(|arg| self.substitute(arg, params, args))
                    .collect::<Result<Vec<_>, _>>()?;
                let inst = self.instantiate(&base.type_name(), &substituted)?;
                Ok(inst.instance.clone())
            }
            _ => Ok(ty.clone()),
        }
    }
}

/// Primitive-to-C spelling for the generated struct text.
fn c_type_name(ty: &TypeRef) -> String {
    use crate::types::PrimitiveKind;

    match &ty.kind {
        TypeKind::Primitive(kind) => match kind {
            PrimitiveKind::Void => "void".to_string(),
            PrimitiveKind::Bool => "bool".to_string(),
            PrimitiveKind::I8 => "int8_t".to_string(),
            PrimitiveKind::I16 => "int16_t".to_string(),
            PrimitiveKind::I32 => "int32_t".to_string(),
            PrimitiveKind::I64 => "int64_t".to_string(),
            PrimitiveKind::I128 => "__int128".to_string(),
            PrimitiveKind::U8 => "uint8_t".to_string(),
            PrimitiveKind::U16 => "uint16_t".to_string(),
            PrimitiveKind::U32 => "uint32_t".to_string(),
            PrimitiveKind::U64 => "uint64_t".to_string(),
            PrimitiveKind::U128 => "unsigned __int128".to_string(),
            PrimitiveKind::Usize => "size_t".to_string(),
            PrimitiveKind::Isize => "ptrdiff_t".to_string(),
            PrimitiveKind::F32 => "float".to_string(),
            PrimitiveKind::F64 => "double".to_string(),
            PrimitiveKind::Char => "uint32_t".to_string(),
            PrimitiveKind::Str => "aster_string_t".to_string(),
            PrimitiveKind::Never => "void".to_string(),
        },
        TypeKind::Pointer { pointee, mutable } => {
            if *mutable {
                format!("{}*", c_type_name(pointee))
            } else {
                format!("const {}*", c_type_name(pointee))
            }
        }
        TypeKind::Struct { name, .. } | TypeKind::Enum { name, .. } => name.clone(),
        TypeKind::GenericInstance { resolved, .. } => c_type_name(resolved),
        _ => ty.type_name(),
    }
}

fn render_c_struct(concrete: &TypeRef, concrete_name: &str) -> String {
    let mut out = format!("typedef struct {} {{\n", concrete_name);
    if let TypeKind::Struct {
        fields,
        field_order,
        ..
    } = &concrete.kind
    {
        for field in field_order {
            if let Some(entry) = fields.lookup_local(field) {
                if let Some(ty) = &entry.ty {
                    out.push_str(&format!("    {} {};\n", c_type_name(ty), field));
                }
            }
        }
    }
    out.push_str(&format!("}} {};\n", concrete_name));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;
    use aster_ast::Visibility;

    fn generic_pair() -> (GenericRegistry, TypeRef) {
        let fields = SymbolTable::new();
        fields.insert_safe(
            "first",
            SymbolEntry::new(
                "first",
                SymbolKind::Field,
                Some(TypeDescriptor::type_parameter("A")),
            )
            .with_visibility(Visibility::Public),
        );
        fields.insert_safe(
            "second",
            SymbolEntry::new(
                "second",
                SymbolKind::Field,
                Some(TypeDescriptor::type_parameter("B")),
            )
            .with_visibility(Visibility::Public),
        );
        let base = TypeDescriptor::strukt(
            "Pair",
            fields,
            vec!["first".to_string(), "second".to_string()],
            true,
        );

        let registry = GenericRegistry::new();
        registry.register(
            "Pair",
            base.clone(),
            vec!["A".to_string(), "B".to_string()],
            None,
        );
        (registry, base)
    }

    #[test]
    fn test_concrete_naming() {
        let (registry, _) = generic_pair();
        let inst = registry
            .instantiate(
                "Pair",
                &[
                    TypeDescriptor::primitive(PrimitiveKind::Str),
                    TypeDescriptor::primitive(PrimitiveKind::Bool),
                ],
            )
            .expect("instantiates");
        assert_eq!(inst.concrete_name, "Pair_string_bool");
    }

    #[test]
    fn test_structural_caching() {
        let (registry, _) = generic_pair();
        let args = [
            TypeDescriptor::primitive(PrimitiveKind::I32),
            TypeDescriptor::primitive(PrimitiveKind::I32),
        ];
        let a = registry.instantiate("Pair", &args).expect("first");
        let b = registry.instantiate("Pair", &args).expect("second");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.total_instantiations(), 1);
    }

    #[test]
    fn test_arg_count_mismatch() {
        let (registry, _) = generic_pair();
        let err = registry
            .instantiate("Pair", &[TypeDescriptor::primitive(PrimitiveKind::I32)])
            .expect_err("arity is checked");
        assert!(matches!(err, InstantiateError::ArgCountMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn test_substituted_fields_and_layout() {
        let (registry, _) = generic_pair();
        let inst = registry
            .instantiate(
                "Pair",
                &[
                    TypeDescriptor::primitive(PrimitiveKind::U8),
                    TypeDescriptor::primitive(PrimitiveKind::I64),
                ],
            )
            .expect("instantiates");

        let first = inst.members.lookup_local("first").expect("field");
        assert_eq!(
            first.ty.as_ref().map(|t| t.type_name()),
            Some("u8".to_string())
        );
        // u8 at 0, i64 aligned to 8: total 16, align 8
        assert_eq!((inst.concrete.size, inst.concrete.align), (16, 8));
        assert!(inst.instance.ffi_compatible);
    }

    #[test]
    fn test_c_source_rendering() {
        let (registry, _) = generic_pair();
        let inst = registry
            .instantiate(
                "Pair",
                &[
                    TypeDescriptor::primitive(PrimitiveKind::I32),
                    TypeDescriptor::primitive(PrimitiveKind::F64),
                ],
            )
            .expect("instantiates");

        let source = inst.c_source();
        assert!(source.contains("typedef struct Pair_i32_f64 {"));
        assert!(source.contains("int32_t first;"));
        assert!(source.contains("double second;"));
    }

    #[test]
    fn test_cycle_detection() {
        // A generic whose field type is an instance of itself.
        let fields = SymbolTable::new();
        let registry = GenericRegistry::new();

        let placeholder = TypeDescriptor::type_parameter("T");
        fields.insert_safe(
            "next",
            SymbolEntry::new("next", SymbolKind::Field, None).with_visibility(Visibility::Public),
        );
        let base = TypeDescriptor::strukt("Loop", fields.clone(), vec!["next".to_string()], true);
        registry.register("Loop", base.clone(), vec!["T".to_string()], None);

        // Rebuild the field as Loop<T> now that the base exists.
        let self_instance = TypeDescriptor::generic_instance(
            base.clone(),
            vec![placeholder.clone()],
            base.clone(),
        );
        let looped = SymbolTable::new();
        looped.insert_safe(
            "next",
            SymbolEntry::new("next", SymbolKind::Field, Some(self_instance))
                .with_visibility(Visibility::Public),
        );
        let registry = GenericRegistry::new();
        let base = TypeDescriptor::strukt("Loop", looped, vec!["next".to_string()], true);
        registry.register("Loop", base, vec!["T".to_string()], None);

        let err = registry
            .instantiate("Loop", &[TypeDescriptor::primitive(PrimitiveKind::I32)])
            .expect_err("self-referential instantiation is rejected");
        assert!(matches!(err, InstantiateError::Cyclic { .. }));
    }
}
