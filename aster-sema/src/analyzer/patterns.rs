// Pattern matching analysis: match statements, arm bindings and the
// exhaustiveness warning.

use super::SemanticAnalyzer;
use crate::symbols::{SymbolEntry, SymbolKind};
use crate::types::{TypeKind, TypeRef};
use aster_ast::{NodeKind, NodeList, NodeRef, Pattern};
use aster_diagnostics::{Diagnostic, DiagnosticKind, SourceLocation};
use std::collections::HashSet;

impl SemanticAnalyzer {
    pub(crate) fn analyze_match(
        &mut self,
        node: &NodeRef,
        scrutinee: &NodeRef,
        arms: &NodeList,
    ) {
        let scrutinee_ty = self.analyze_expr(scrutinee);

        let mut covered: HashSet<String> = HashSet::new();
        let mut has_catch_all = false;

        for arm_node in arms {
            let NodeKind::MatchArm(arm) = &arm_node.kind else {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    "match contains a malformed arm".to_string(),
                    arm_node.loc.clone(),
                );
                continue;
            };

            self.enter_scope();
            if let Some(scrutinee_ty) = &scrutinee_ty {
                self.bind_pattern(&arm.pattern, scrutinee_ty, &arm_node.loc);
            }

            if let Some(guard) = &arm.guard {
                if let Some(guard_ty) = self.analyze_expr(guard) {
                    if !guard_ty.is_bool() {
                        self.diagnostics.type_mismatch(
                            "bool",
                            &guard_ty.type_name(),
                            guard.loc.clone(),
                        );
                    }
                }
            }

            // Coverage bookkeeping: guarded arms never count.
            if arm.guard.is_none() {
                match &arm.pattern {
                    Pattern::Wildcard | Pattern::Identifier(_) => has_catch_all = true,
                    Pattern::Enum { variant, .. } => {
                        covered.insert(variant.clone());
                    }
                    _ => {}
                }
            }

            if arm.body.as_stmt().is_some() {
                self.analyze_stmt(&arm.body);
            } else {
                let _ = self.analyze_expr(&arm.body);
            }
            self.exit_scope();
            arm_node.flags().set_validated(true);
        }

        if let Some(scrutinee_ty) = &scrutinee_ty {
            self.check_exhaustiveness(scrutinee_ty, &covered, has_catch_all, &node.loc);
        }
        node.flags().set_validated(true);
    }

    /// Exhaustiveness over enums is advisory: a warning, never fatal.
    fn check_exhaustiveness(
        &mut self,
        scrutinee_ty: &TypeRef,
        covered: &HashSet<String>,
        has_catch_all: bool,
        loc: &SourceLocation,
    ) {
        if has_catch_all {
            return;
        }
        let concrete = concrete_of(scrutinee_ty);
        let TypeKind::Enum {
            name,
            variants,
            variant_count,
            ..
        } = &concrete.kind
        else {
            return;
        };
        if covered.len() >= *variant_count {
            return;
        }

        let mut missing: Vec<String> = Vec::new();
        variants.iterate(&mut |variant, _| {
            if !covered.contains(variant) {
                missing.push(variant.to_string());
            }
            true
        });
        missing.sort();

        self.diagnostics.emit(
            Diagnostic::warning(
                DiagnosticKind::InvalidOperation,
                format!("match on `{}` does not cover all variants", name),
                loc.clone(),
            )
            .with_note(format!("missing: {}", missing.join(", "))),
        );
    }

    /// Bind a pattern's names against the matched type in the current
    /// (arm) scope.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        matched: &TypeRef,
        loc: &SourceLocation,
    ) {
        match pattern {
            Pattern::Wildcard => {}
            Pattern::Identifier(name) => {
                let entry = SymbolEntry::new(name, SymbolKind::Variable, Some(matched.clone()))
                    .with_initialized(true);
                if !self.current_scope().insert_safe(name, entry) {
                    self.diagnostics.emit_error(
                        DiagnosticKind::DuplicateSymbol,
                        format!("binding `{}` appears twice in this pattern", name),
                        loc.clone(),
                    );
                }
            }
            Pattern::Enum {
                enum_name,
                variant,
                inner,
            } => self.bind_enum_pattern(enum_name.as_deref(), variant, inner.as_deref(), matched, loc),
            Pattern::Struct {
                name,
                fields,
                partial,
            } => self.bind_struct_pattern(name, fields, *partial, matched, loc),
            Pattern::Tuple(elements) => {
                let concrete = concrete_of(matched);
                let TypeKind::Tuple { elems } = &concrete.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidType,
                        format!(
                            "tuple pattern cannot match a value of type `{}`",
                            matched.type_name()
                        ),
                        loc.clone(),
                    );
                    return;
                };
                if elems.len() != elements.len() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "tuple pattern has {} elements but `{}` has {}",
                            elements.len(),
                            matched.type_name(),
                            elems.len()
                        ),
                        loc.clone(),
                    );
                    return;
                }
                for (element, elem_ty) in elements.iter().zip(elems.iter()) {
                    self.bind_pattern(element, elem_ty, loc);
                }
            }
        }
    }

    fn bind_enum_pattern(
        &mut self,
        enum_name: Option<&str>,
        variant: &str,
        inner: Option<&Pattern>,
        matched: &TypeRef,
        loc: &SourceLocation,
    ) {
        let concrete = concrete_of(matched);
        let TypeKind::Enum { name, variants, .. } = &concrete.kind else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!(
                    "enum pattern cannot match a value of type `{}`",
                    matched.type_name()
                ),
                loc.clone(),
            );
            return;
        };

        if let Some(qualifier) = enum_name {
            let base_name = base_name_of(matched);
            if qualifier != base_name && qualifier != name {
                self.diagnostics.emit_error(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "pattern names enum `{}` but the matched value is `{}`",
                        qualifier,
                        matched.type_name()
                    ),
                    loc.clone(),
                );
                return;
            }
        }

        let Some(entry) = variants.lookup_local(variant) else {
            self.diagnostics.emit_error(
                DiagnosticKind::UndefinedSymbol,
                format!("no variant `{}` on enum `{}`", variant, name),
                loc.clone(),
            );
            return;
        };
        entry.mark_used();

        match (&entry.ty, inner) {
            (Some(payload), Some(inner)) => self.bind_pattern(inner, payload, loc),
            (None, Some(_)) => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("variant `{}` has no payload to destructure", variant),
                    loc.clone(),
                );
            }
            // A payload left unbound is permitted; nothing to do.
            _ => {}
        }
    }

    fn bind_struct_pattern(
        &mut self,
        name: &str,
        field_patterns: &[aster_ast::FieldPattern],
        partial: bool,
        matched: &TypeRef,
        loc: &SourceLocation,
    ) {
        let concrete = concrete_of(matched);
        let TypeKind::Struct {
            name: struct_name,
            fields,
            field_order,
            ..
        } = &concrete.kind
        else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!(
                    "struct pattern cannot match a value of type `{}`",
                    matched.type_name()
                ),
                loc.clone(),
            );
            return;
        };

        let base_name = base_name_of(matched);
        if name != base_name && name != struct_name {
            self.diagnostics.emit_error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "pattern names struct `{}` but the matched value is `{}`",
                    name,
                    matched.type_name()
                ),
                loc.clone(),
            );
            return;
        }

        let mut bound: HashSet<String> = HashSet::new();
        for field_pattern in field_patterns {
            if !bound.insert(field_pattern.name.clone()) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!("field `{}` appears twice in this pattern", field_pattern.name),
                    loc.clone(),
                );
                continue;
            }
            let Some(entry) = fields.lookup_local(&field_pattern.name) else {
                self.diagnostics.emit_error(
                    DiagnosticKind::UndefinedSymbol,
                    format!(
                        "no field `{}` on struct `{}`",
                        field_pattern.name, struct_name
                    ),
                    loc.clone(),
                );
                continue;
            };
            if field_pattern.ignored {
                continue;
            }
            let binding = field_pattern
                .binding
                .clone()
                .unwrap_or_else(|| field_pattern.name.clone());
            let bound_entry =
                SymbolEntry::new(&binding, SymbolKind::Variable, entry.ty.clone())
                    .with_initialized(true);
            if !self.current_scope().insert_safe(&binding, bound_entry) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!("binding `{}` appears twice in this pattern", binding),
                    loc.clone(),
                );
            }
        }

        // A non-partial pattern must account for every field.
        if !partial {
            for field in field_order {
                if !bound.contains(field) {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!(
                            "pattern does not bind field `{}` of `{}`; add it or use `..`",
                            field, struct_name
                        ),
                        loc.clone(),
                    );
                }
            }
        }
    }
}

fn concrete_of(ty: &TypeRef) -> TypeRef {
    match &ty.kind {
        TypeKind::GenericInstance { resolved, .. } => resolved.clone(),
        _ => ty.clone(),
    }
}

fn base_name_of(ty: &TypeRef) -> String {
    match &ty.kind {
        TypeKind::GenericInstance { base, .. } => base.type_name(),
        _ => ty.type_name(),
    }
}
