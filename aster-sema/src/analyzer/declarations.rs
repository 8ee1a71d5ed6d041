// Top-level declaration analysis: functions, structs, enums, extern
// signatures, impl blocks, constants.

use super::SemanticAnalyzer;
use crate::ownership;
use crate::symbols::{SymbolEntry, SymbolKind, SymbolTable};
use crate::types::{compatible, TypeDescriptor, TypeKind, TypeRef};
use crate::type_info;
use aster_ast::{
    ConstDecl, Decl, EnumDecl, ExternFnDecl, FunctionDecl, ImplDecl, NodeRef, StructDecl,
    TransferMode, Visibility,
};
use aster_diagnostics::DiagnosticKind;
use std::collections::HashSet;
use std::sync::Arc;

impl SemanticAnalyzer {
    /// First pass: register types and signatures in source order.
    pub(crate) fn declare_top_level(&mut self, node: &NodeRef) {
        let Some(decl) = node.as_decl() else {
            return;
        };
        match decl {
            Decl::Function(func) => self.declare_function(node, func),
            Decl::Struct(strukt) => self.declare_struct(node, strukt),
            Decl::Enum(decl) => self.declare_enum(node, decl),
            Decl::ExternFunction(func) => self.declare_extern(node, func),
            Decl::Const(decl) => self.declare_const(node, decl),
            Decl::Impl(block) => self.declare_impl(node, block),
            Decl::Import(import) => self.declare_import(import),
            Decl::Parameter(_) | Decl::EnumVariant(_) => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    "declaration is not valid at the top level".to_string(),
                    node.loc.clone(),
                );
            }
        }
    }

    /// Second pass: analyze bodies.
    pub(crate) fn analyze_top_level(&mut self, node: &NodeRef) {
        match node.as_decl() {
            Some(Decl::Function(func)) => self.analyze_function_body(node, func),
            Some(Decl::Impl(block)) => {
                for method_node in &block.methods {
                    if let Some(Decl::Function(method)) = method_node.as_decl() {
                        self.analyze_function_body(method_node, method);
                    }
                }
            }
            _ => {}
        }
        node.flags().set_validated(true);
    }

    /// Resolve a function signature: parameter types in order plus the
    /// return type. Duplicate parameter names are rejected here.
    fn resolve_signature(
        &mut self,
        name: &str,
        func: &FunctionDecl,
    ) -> Option<(Vec<TypeRef>, TypeRef)> {
        let mut seen = HashSet::new();
        let mut param_types = Vec::with_capacity(func.params.len());
        let mut failed = false;

        for param_node in &func.params {
            let Some(Decl::Parameter(param)) = param_node.as_decl() else {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("function `{}` has a malformed parameter", name),
                    param_node.loc.clone(),
                );
                failed = true;
                continue;
            };
            if !seen.insert(param.name.clone()) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!(
                        "parameter `{}` is declared twice in function `{}`",
                        param.name, name
                    ),
                    param_node.loc.clone(),
                );
                failed = true;
            }
            match self.resolve_type_node(&param.ty) {
                Some(ty) => param_types.push(ty),
                None => failed = true,
            }
        }

        let ret = self.resolve_type_node(&func.return_type)?;
        if failed {
            return None;
        }
        Some((param_types, ret))
    }

    fn declare_function(&mut self, node: &NodeRef, func: &FunctionDecl) {
        let Some((params, ret)) = self.resolve_signature(&func.name, func) else {
            return;
        };

        let fn_ty = TypeDescriptor::function(params, ret, false, Vec::new());
        let entry = SymbolEntry::new(&func.name, SymbolKind::Function, Some(fn_ty))
            .with_visibility(func.visibility)
            .with_decl(node.clone());

        if !self.current_scope().insert_safe(&func.name, entry) {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared", func.name),
                node.loc.clone(),
            );
        }
    }

    /// Bind type parameters in a fresh scope, run `f`, pop the scope.
    fn with_type_params<T>(
        &mut self,
        params: &[String],
        node: &NodeRef,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let scope = self.enter_scope();
        for param in params {
            let entry = SymbolEntry::new(
                param,
                SymbolKind::TypeParameter,
                Some(TypeDescriptor::type_parameter(param)),
            );
            if !scope.insert_safe(param, entry) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!("type parameter `{}` is declared twice", param),
                    node.loc.clone(),
                );
            }
        }
        let result = f(self);
        self.exit_scope();
        result
    }

    fn declare_struct(&mut self, node: &NodeRef, strukt: &StructDecl) {
        let generic = !strukt.type_params.is_empty();

        let members = SymbolTable::new();
        let mut field_order = Vec::with_capacity(strukt.fields.len());

        self.with_type_params(&strukt.type_params, node, |analyzer| {
            for field in &strukt.fields {
                let field_ty = analyzer.resolve_type_node(&field.ty);
                let entry = SymbolEntry::new(&field.name, SymbolKind::Field, field_ty)
                    .with_visibility(field.visibility)
                    .with_decl(node.clone());
                if !members.insert_safe(&field.name, entry) {
                    analyzer.diagnostics.emit_error(
                        DiagnosticKind::DuplicateSymbol,
                        format!(
                            "field `{}` is declared twice in struct `{}`",
                            field.name, strukt.name
                        ),
                        field.ty.loc.clone(),
                    );
                    continue;
                }
                field_order.push(field.name.clone());
            }
        });

        ownership::validate_ownership(&strukt.annotations, true, &mut self.diagnostics, &node.loc);

        let descriptor =
            TypeDescriptor::strukt(&strukt.name, members, field_order, generic);
        if generic {
            self.generics().register(
                &strukt.name,
                descriptor.clone(),
                strukt.type_params.clone(),
                Some(node.clone()),
            );
        }

        let entry = SymbolEntry::new(&strukt.name, SymbolKind::Type, Some(descriptor))
            .with_visibility(strukt.visibility)
            .with_decl(node.clone())
            .with_type_params(strukt.type_params.len());
        if !self.current_scope().insert_safe(&strukt.name, entry) {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared", strukt.name),
                node.loc.clone(),
            );
        }
    }

    fn declare_enum(&mut self, node: &NodeRef, decl: &EnumDecl) {
        let generic = !decl.type_params.is_empty();

        let members = SymbolTable::new();
        let mut variant_count = 0usize;

        self.with_type_params(&decl.type_params, node, |analyzer| {
            for variant_node in &decl.variants {
                let Some(Decl::EnumVariant(variant)) = variant_node.as_decl() else {
                    analyzer.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("enum `{}` contains a malformed variant", decl.name),
                        variant_node.loc.clone(),
                    );
                    continue;
                };
                let payload = variant
                    .payload
                    .as_ref()
                    .and_then(|ty| analyzer.resolve_type_node(ty));
                let entry = SymbolEntry::new(&variant.name, SymbolKind::EnumVariant, payload)
                    .with_visibility(Visibility::Public)
                    .with_decl(variant_node.clone());
                if !members.insert_safe(&variant.name, entry) {
                    analyzer.diagnostics.emit_error(
                        DiagnosticKind::DuplicateSymbol,
                        format!(
                            "variant `{}` is declared twice in enum `{}`",
                            variant.name, decl.name
                        ),
                        variant_node.loc.clone(),
                    );
                    continue;
                }
                variant_count += 1;
                variant_node.flags().set_validated(true);
            }
        });

        let descriptor =
            TypeDescriptor::enumeration(&decl.name, members.clone(), variant_count, generic);
        if generic {
            self.generics().register(
                &decl.name,
                descriptor.clone(),
                decl.type_params.clone(),
                Some(node.clone()),
            );
        }

        let entry = SymbolEntry::new(&decl.name, SymbolKind::Type, Some(descriptor))
            .with_visibility(decl.visibility)
            .with_decl(node.clone())
            .with_type_params(decl.type_params.len());
        if !self.current_scope().insert_safe(&decl.name, entry) {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared", decl.name),
                node.loc.clone(),
            );
            return;
        }

        // Qualified variant names are visible wherever the enum is.
        let mut shared = Vec::new();
        members.iterate(&mut |name, entry| {
            shared.push((format!("{}.{}", decl.name, name), entry.clone()));
            true
        });
        for (qualified, entry) in shared {
            self.current_scope().insert_shared(&qualified, entry);
        }
    }

    fn declare_extern(&mut self, node: &NodeRef, func: &ExternFnDecl) {
        // The ownership validator runs before the signature is recorded.
        ownership::validate_ownership(&func.annotations, false, &mut self.diagnostics, &node.loc);
        if ownership::transfer_annotation(&func.annotations) == Some(TransferMode::Borrowed) {
            self.diagnostics.emit_error(
                DiagnosticKind::OwnershipTransferViolation,
                format!(
                    "extern function `{}` cannot return a borrowed reference",
                    func.name
                ),
                node.loc.clone(),
            );
        }

        let mut params = Vec::with_capacity(func.params.len());
        let mut transfers = Vec::with_capacity(func.params.len());
        let mut failed = false;

        for param_node in &func.params {
            let Some(Decl::Parameter(param)) = param_node.as_decl() else {
                failed = true;
                continue;
            };
            let Some(ty) = self.resolve_type_node(&param.ty) else {
                failed = true;
                continue;
            };
            let transfer = if ty.is_pointer() {
                ownership::require_transfer_on_pointer_param(
                    &func.name,
                    &param.name,
                    &param.annotations,
                    &mut self.diagnostics,
                    &param_node.loc,
                )
            } else {
                ownership::transfer_annotation(&param.annotations)
            };
            transfers.push(transfer);
            params.push(ty);
        }

        let Some(ret) = self.resolve_type_node(&func.return_type) else {
            return;
        };
        if failed {
            return;
        }

        let fn_ty = TypeDescriptor::function(params, ret, true, transfers);
        let entry = SymbolEntry::new(&func.name, SymbolKind::Function, Some(fn_ty))
            .with_visibility(Visibility::Public)
            .with_decl(node.clone());
        if !self.current_scope().insert_safe(&func.name, entry) {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared", func.name),
                node.loc.clone(),
            );
        }
    }

    fn declare_const(&mut self, node: &NodeRef, decl: &ConstDecl) {
        let Some(ty_node) = &decl.ty else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("constant `{}` requires a type annotation", decl.name),
                node.loc.clone(),
            );
            return;
        };
        let Some(declared) = self.resolve_type_node(ty_node) else {
            return;
        };

        let scope = self.current_scope();
        let Some(value) = super::evaluate_const(&decl.value, &scope) else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!(
                    "initializer of constant `{}` is not compile-time evaluable",
                    decl.name
                ),
                decl.value.loc.clone(),
            );
            return;
        };
        decl.value.flags().set_constant_expr(true);

        if let Some(value_ty) = value_type(&value) {
            if !compatible(&declared, &value_ty) && !is_literal_adoption(&declared, &value) {
                self.diagnostics.type_mismatch(
                    &declared.type_name(),
                    &value_ty.type_name(),
                    decl.value.loc.clone(),
                );
            }
        }

        let entry = SymbolEntry::new(&decl.name, SymbolKind::Const, Some(declared.clone()))
            .with_visibility(decl.visibility)
            .with_decl(node.clone())
            .with_const_value(value);
        if !scope.insert_safe(&decl.name, entry) {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared", decl.name),
                node.loc.clone(),
            );
            return;
        }
        type_info::attach(node, &declared);
    }

    fn declare_impl(&mut self, node: &NodeRef, block: &ImplDecl) {
        let scope = self.current_scope();
        let Some(owner) = scope.lookup_safe(&block.target) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(&block.target, node.loc.clone(), &candidates);
            return;
        };
        if owner.kind != SymbolKind::Type {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a type", block.target),
                node.loc.clone(),
            );
            return;
        }
        let Some(member_table) = owner.ty.as_ref().and_then(member_table_of) else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` cannot have an impl block", block.target),
                node.loc.clone(),
            );
            return;
        };

        for method_node in &block.methods {
            let Some(Decl::Function(method)) = method_node.as_decl() else {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    "impl block contains a non-method declaration".to_string(),
                    method_node.loc.clone(),
                );
                continue;
            };
            let Some((params, ret)) = self.resolve_signature(&method.name, method) else {
                continue;
            };
            let fn_ty = TypeDescriptor::function(params, ret, false, Vec::new());
            let entry = SymbolEntry::new(&method.name, SymbolKind::Method, Some(fn_ty))
                .with_visibility(method.visibility)
                .with_decl(method_node.clone())
                .with_instance_method(method.is_instance_method());
            if !member_table.insert_safe(&method.name, entry) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!(
                        "method `{}` is already declared on `{}`",
                        method.name, block.target
                    ),
                    method_node.loc.clone(),
                );
            }
        }
    }

    fn analyze_function_body(&mut self, node: &NodeRef, func: &FunctionDecl) {
        let Some(body) = &func.body else {
            return;
        };

        self.enter_scope();
        let scope = self.current_scope();

        for param_node in &func.params {
            let Some(Decl::Parameter(param)) = param_node.as_decl() else {
                continue;
            };
            ownership::validate_ownership(
                &param.annotations,
                true,
                &mut self.diagnostics,
                &param_node.loc,
            );
            let ty = self.resolve_type_node(&param.ty);
            let entry = SymbolEntry::new(&param.name, SymbolKind::Parameter, ty)
                .with_mutable(param.mutable)
                .with_initialized(true)
                .with_decl(param_node.clone());
            // Duplicates were reported when the signature was declared.
            scope.insert_safe(&param.name, entry);
            param_node.flags().set_validated(true);
        }

        let ret = self.resolve_type_node(&func.return_type);
        let previous_return = std::mem::replace(&mut self.current_return, ret);
        self.analyze_stmt(body);
        self.current_return = previous_return;

        self.exit_scope();
        node.flags().set_validated(true);
    }
}

fn member_table_of(ty: &TypeRef) -> Option<Arc<SymbolTable>> {
    match &ty.kind {
        TypeKind::Struct { fields, .. } => Some(fields.clone()),
        TypeKind::Enum { variants, .. } => Some(variants.clone()),
        _ => None,
    }
}

fn value_type(value: &crate::symbols::ConstValue) -> Option<TypeRef> {
    use crate::symbols::ConstValue;
    use crate::types::PrimitiveKind;
    let kind = match value {
        ConstValue::Int(_) => PrimitiveKind::I32,
        ConstValue::Float(_) => PrimitiveKind::F32,
        ConstValue::Bool(_) => PrimitiveKind::Bool,
        ConstValue::Str(_) => PrimitiveKind::Str,
    };
    Some(TypeDescriptor::primitive(kind))
}

/// An integer or float constant adopts any numeric declared type.
fn is_literal_adoption(declared: &TypeRef, value: &crate::symbols::ConstValue) -> bool {
    use crate::symbols::ConstValue;
    match value {
        ConstValue::Int(_) => declared.is_numeric(),
        ConstValue::Float(_) => declared
            .primitive_kind()
            .map(|k| k.is_float())
            .unwrap_or(false),
        _ => false,
    }
}
