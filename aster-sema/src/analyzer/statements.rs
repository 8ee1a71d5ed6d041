// Statement analysis: let bindings, control flow, concurrency
// statements and unsafe blocks.

use super::SemanticAnalyzer;
use crate::ownership;
use crate::symbols::{SymbolEntry, SymbolKind};
use crate::type_info;
use crate::types::{compatible, PrimitiveKind, TypeDescriptor, TypeKind, TypeRef};
use aster_ast::{Expr, NodeRef, Stmt};
use aster_diagnostics::DiagnosticKind;

impl SemanticAnalyzer {
    pub(crate) fn analyze_stmt(&mut self, node: &NodeRef) {
        let Some(stmt) = node.as_stmt() else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                "expected a statement".to_string(),
                node.loc.clone(),
            );
            return;
        };

        match stmt {
            Stmt::Block { stmts } => {
                self.enter_scope();
                for stmt_node in stmts {
                    self.analyze_stmt(stmt_node);
                }
                self.exit_scope();
            }
            Stmt::ExprStmt { expr } => {
                let _ = self.analyze_expr(expr);
            }
            Stmt::Let { .. } => self.analyze_let(node, stmt),
            Stmt::Return { value } => self.analyze_return(node, value.as_ref()),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_condition(cond);
                self.analyze_stmt(then_block);
                if let Some(else_block) = else_block {
                    self.analyze_stmt(else_block);
                }
            }
            Stmt::ForIn {
                binding,
                iterable,
                body,
            } => self.analyze_for_in(binding, iterable, body),
            Stmt::Match { scrutinee, arms } => self.analyze_match(node, scrutinee, arms),
            Stmt::IfLet {
                pattern,
                value,
                then_block,
                else_block,
            } => {
                let value_ty = self.analyze_expr(value);
                self.enter_scope();
                if let Some(value_ty) = &value_ty {
                    self.bind_pattern(pattern, value_ty, &node.loc);
                }
                self.analyze_stmt(then_block);
                self.exit_scope();
                if let Some(else_block) = else_block {
                    self.analyze_stmt(else_block);
                }
            }
            Stmt::Spawn { call } => {
                self.require_call_expr(call, "spawn");
                let _ = self.analyze_expr(call);
            }
            Stmt::SpawnWithHandle { handle, call } => {
                self.analyze_spawn_with_handle(node, handle, call)
            }
            Stmt::Unsafe { block } => {
                self.unsafe_depth += 1;
                self.analyze_stmt(block);
                self.unsafe_depth -= 1;
            }
            Stmt::Break | Stmt::Continue => {
                if self.loop_depth == 0 {
                    let which = if matches!(stmt, Stmt::Break) {
                        "break"
                    } else {
                        "continue"
                    };
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("`{}` outside of a loop", which),
                        node.loc.clone(),
                    );
                }
            }
        }

        node.flags().set_validated(true);
    }

    /// The `let` contract: duplicate check, mandatory annotation,
    /// table-driven type resolution, context-typed initializer,
    /// compatibility, ownership tags, symbol registration, projection.
    fn analyze_let(&mut self, node: &NodeRef, stmt: &Stmt) {
        let Stmt::Let {
            name,
            mutable,
            ty,
            init,
            annotations,
        } = stmt
        else {
            return;
        };

        let scope = self.current_scope();
        if scope.lookup_local(name).is_some() {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared in this scope", name),
                node.loc.clone(),
            );
            return;
        }

        let Some(ty_node) = ty else {
            self.diagnostics.emit(
                aster_diagnostics::Diagnostic::error(
                    DiagnosticKind::InvalidOperation,
                    format!("missing required type annotation for `let {}`", name),
                    node.loc.clone(),
                )
                .with_help(format!("write the type explicitly: `let {}: T = ...`", name)),
            );
            return;
        };

        let Some(declared) = self.resolve_type_node(ty_node) else {
            return;
        };

        let mut initialized = false;
        if let Some(init_expr) = init {
            initialized = true;
            let init_ty =
                self.with_expected(Some(declared.clone()), |analyzer| analyzer.analyze_expr(init_expr));
            if let Some(init_ty) = init_ty {
                if !compatible(&declared, &init_ty) {
                    self.diagnostics.type_mismatch(
                        &declared.type_name(),
                        &init_ty.type_name(),
                        init_expr.loc.clone(),
                    );
                }
            }
        }

        ownership::validate_ownership(annotations, true, &mut self.diagnostics, &node.loc);
        ownership::reject_borrowed_binding(annotations, &mut self.diagnostics, &node.loc);

        let entry = SymbolEntry::new(name, SymbolKind::Variable, Some(declared.clone()))
            .with_mutable(*mutable)
            .with_initialized(initialized)
            .with_decl(node.clone());
        scope.insert_safe(name, entry);

        node.flags().set_mutable(*mutable);
        type_info::attach(node, &declared);
    }

    fn analyze_return(&mut self, node: &NodeRef, value: Option<&NodeRef>) {
        let Some(expected) = self.current_return.clone() else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                "`return` outside of a function".to_string(),
                node.loc.clone(),
            );
            return;
        };

        let actual = match value {
            Some(value) => {
                self.with_expected(Some(expected.clone()), |analyzer| analyzer.analyze_expr(value))
            }
            None => Some(TypeDescriptor::primitive(PrimitiveKind::Void)),
        };

        if let Some(actual) = actual {
            if !compatible(&expected, &actual) {
                self.diagnostics.type_mismatch(
                    &expected.type_name(),
                    &actual.type_name(),
                    node.loc.clone(),
                );
            }
        }
    }

    fn check_condition(&mut self, cond: &NodeRef) {
        if let Some(cond_ty) = self.analyze_expr(cond) {
            if !cond_ty.is_bool() {
                self.diagnostics.type_mismatch(
                    "bool",
                    &cond_ty.type_name(),
                    cond.loc.clone(),
                );
            }
        }
    }

    fn analyze_for_in(&mut self, binding: &str, iterable: &NodeRef, body: &NodeRef) {
        let elem_ty = self
            .analyze_expr(iterable)
            .and_then(|iter_ty| self.element_type(&iter_ty, iterable));

        self.enter_scope();
        if let Some(elem_ty) = elem_ty {
            let entry = SymbolEntry::new(binding, SymbolKind::Variable, Some(elem_ty))
                .with_initialized(true);
            self.current_scope().insert_safe(binding, entry);
            // Loop bindings are live by construction.
            if let Some(inserted) = self.current_scope().lookup_local(binding) {
                inserted.mark_used();
            }
        }
        self.loop_depth += 1;
        self.analyze_stmt(body);
        self.loop_depth -= 1;
        self.exit_scope();
    }

    fn element_type(&mut self, iter_ty: &TypeRef, iterable: &NodeRef) -> Option<TypeRef> {
        match &iter_ty.kind {
            TypeKind::Slice { elem } | TypeKind::Array { elem, .. } => Some(elem.clone()),
            TypeKind::Struct { name, .. } if name == "InfiniteIterator" => {
                Some(TypeDescriptor::primitive(PrimitiveKind::I32))
            }
            TypeKind::GenericInstance { resolved, .. } => self.element_type(resolved, iterable),
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidType,
                    format!("type `{}` is not iterable", iter_ty.type_name()),
                    iterable.loc.clone(),
                );
                None
            }
        }
    }

    fn require_call_expr(&mut self, expr: &NodeRef, context: &str) {
        let is_call = matches!(
            expr.as_expr(),
            Some(Expr::Call { .. }) | Some(Expr::AssociatedCall { .. })
        );
        if !is_call {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("`{}` requires a call expression", context),
                expr.loc.clone(),
            );
        }
    }

    fn analyze_spawn_with_handle(&mut self, node: &NodeRef, handle: &str, call: &NodeRef) {
        self.require_call_expr(call, "spawn_with_handle");
        let result_ty = self
            .analyze_expr(call)
            .unwrap_or_else(|| TypeDescriptor::primitive(PrimitiveKind::Void));
        let handle_ty = TypeDescriptor::task_handle(result_ty);

        let scope = self.current_scope();
        if scope.lookup_local(handle).is_some() {
            self.diagnostics.emit_error(
                DiagnosticKind::DuplicateSymbol,
                format!("symbol `{}` is already declared in this scope", handle),
                node.loc.clone(),
            );
            return;
        }
        let entry = SymbolEntry::new(handle, SymbolKind::Variable, Some(handle_ty.clone()))
            .with_initialized(true)
            .with_decl(node.clone());
        scope.insert_safe(handle, entry);
        type_info::attach(node, &handle_ty);
    }
}
