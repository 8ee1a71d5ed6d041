// Expression analysis: operators, calls, accesses, literals,
// assignments and casts.

use super::SemanticAnalyzer;
use crate::ownership;
use crate::symbols::{SymbolEntry, SymbolKind};
use crate::type_info;
use crate::types::{compatible, PrimitiveKind, TypeDescriptor, TypeKind, TypeRef};
use aster_ast::{BinaryOp, Expr, Literal, NodeList, NodeRef, UnaryOp};
use aster_diagnostics::DiagnosticKind;
use std::collections::HashSet;
use std::sync::Arc;

impl SemanticAnalyzer {
    pub(crate) fn analyze_expr(&mut self, node: &NodeRef) -> Option<TypeRef> {
        let Some(expr) = node.as_expr() else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                "expected an expression".to_string(),
                node.loc.clone(),
            );
            return None;
        };

        let ty = match expr {
            Expr::Literal(literal) => self.literal_type(node, literal),
            Expr::Identifier(name) => self.analyze_identifier(node, name),
            Expr::Binary { op, left, right } => self.analyze_binary(node, *op, left, right),
            Expr::Unary { op, operand } => self.analyze_unary(node, *op, operand),
            Expr::Call { callee, args } => self.analyze_call(node, callee, args),
            Expr::AssociatedCall {
                owner,
                member,
                args,
            } => self.analyze_associated_call(node, owner, member, args),
            Expr::FieldAccess { base, field } => self.analyze_field_access(node, base, field),
            Expr::IndexAccess { base, index } => self.analyze_index_access(node, base, index),
            Expr::Slice { base, start, end } => {
                self.analyze_slice_expr(node, base, start.as_ref(), end.as_ref())
            }
            Expr::SliceLen { base } => self.analyze_slice_len(node, base),
            Expr::Assign { target, value } => self.analyze_assignment(node, target, value),
            Expr::StructLiteral {
                name,
                type_args,
                fields,
            } => self.analyze_struct_literal(node, name, type_args, fields),
            Expr::ArrayLiteral { elems } => self.analyze_array_literal(node, elems),
            Expr::TupleLiteral { elems } => self.analyze_tuple_literal(elems),
            Expr::Await { task } => self.analyze_await(node, task),
            Expr::Cast { expr, ty } => self.analyze_cast(node, expr, ty),
        };

        if let Some(ty) = &ty {
            type_info::attach(node, ty);
            node.flags().set_validated(true);
        }
        ty
    }

    /// Literal typing. Numeric literals adopt the expected type of the
    /// surrounding context (integer widening).
    fn literal_type(&mut self, node: &NodeRef, literal: &Literal) -> Option<TypeRef> {
        node.flags().set_constant_expr(true);
        let ty = match literal {
            Literal::Integer(_) => match self.expected() {
                Some(expected) if expected.is_numeric() => expected,
                _ => TypeDescriptor::primitive(PrimitiveKind::I32),
            },
            Literal::Float(_) => match self.expected() {
                Some(expected)
                    if expected
                        .primitive_kind()
                        .map(|k| k.is_float())
                        .unwrap_or(false) =>
                {
                    expected
                }
                _ => TypeDescriptor::primitive(PrimitiveKind::F32),
            },
            Literal::Str(_) => TypeDescriptor::primitive(PrimitiveKind::Str),
            Literal::Bool(_) => TypeDescriptor::primitive(PrimitiveKind::Bool),
            Literal::Char(_) => TypeDescriptor::primitive(PrimitiveKind::Char),
            Literal::Unit => TypeDescriptor::primitive(PrimitiveKind::Void),
        };
        Some(ty)
    }

    fn analyze_identifier(&mut self, node: &NodeRef, name: &str) -> Option<TypeRef> {
        let scope = self.current_scope();
        let Some(entry) = scope.lookup_safe(name) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(name, node.loc.clone(), &candidates);
            return None;
        };
        entry.mark_used();

        match entry.kind {
            SymbolKind::Variable | SymbolKind::Parameter | SymbolKind::Field => {
                node.flags().set_lvalue(true);
                node.flags().set_mutable(entry.mutable);
                entry.ty.clone()
            }
            SymbolKind::Const => {
                node.flags().set_constant_expr(true);
                entry.ty.clone()
            }
            SymbolKind::Function | SymbolKind::Method => entry.ty.clone(),
            SymbolKind::EnumVariant => {
                // Unit variants reached through a qualified alias name.
                if entry.ty.is_none() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::TypeInferenceFailed,
                        format!("cannot infer the enum type of variant `{}` here", name),
                        node.loc.clone(),
                    );
                }
                None
            }
            SymbolKind::Type | SymbolKind::TypeParameter => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("`{}` is a type, not a value", name),
                    node.loc.clone(),
                );
                None
            }
        }
    }

    fn analyze_binary(
        &mut self,
        node: &NodeRef,
        op: BinaryOp,
        left: &NodeRef,
        right: &NodeRef,
    ) -> Option<TypeRef> {
        let left_ty = self.analyze_expr(left);
        let right_ty = match &left_ty {
            // The left operand's type anchors literal widening on the right.
            Some(anchor) => {
                self.with_expected(Some(anchor.clone()), |analyzer| analyzer.analyze_expr(right))
            }
            None => self.analyze_expr(right),
        };
        let (left_ty, right_ty) = (left_ty?, right_ty?);

        if op.is_comparison() {
            if !compatible(&left_ty, &right_ty) && !compatible(&right_ty, &left_ty) {
                self.diagnostics.emit_error(
                    DiagnosticKind::IncompatibleTypes,
                    format!(
                        "cannot compare `{}` with `{}`",
                        left_ty.type_name(),
                        right_ty.type_name()
                    ),
                    node.loc.clone(),
                );
                return None;
            }
            return Some(TypeDescriptor::primitive(PrimitiveKind::Bool));
        }

        if op.is_logical() {
            if !left_ty.is_bool() || !right_ty.is_bool() {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("operator `{}` requires boolean operands", op.symbol()),
                    node.loc.clone(),
                );
                return None;
            }
            return Some(TypeDescriptor::primitive(PrimitiveKind::Bool));
        }

        if op.is_arithmetic() {
            if !left_ty.is_numeric() || !right_ty.is_numeric() {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("operator `{}` requires numeric operands", op.symbol()),
                    node.loc.clone(),
                );
                return None;
            }
            if !compatible(&left_ty, &right_ty) {
                self.diagnostics.emit_error(
                    DiagnosticKind::IncompatibleTypes,
                    format!(
                        "mismatched operand types `{}` and `{}` for `{}`",
                        left_ty.type_name(),
                        right_ty.type_name(),
                        op.symbol()
                    ),
                    node.loc.clone(),
                );
                return None;
            }
            return Some(left_ty);
        }

        // Bitwise and shifts.
        if !left_ty.is_integer() || !right_ty.is_integer() {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("operator `{}` requires integer operands", op.symbol()),
                node.loc.clone(),
            );
            return None;
        }
        Some(left_ty)
    }

    fn analyze_unary(
        &mut self,
        node: &NodeRef,
        op: UnaryOp,
        operand: &NodeRef,
    ) -> Option<TypeRef> {
        let operand_ty = self.analyze_expr(operand)?;

        match op {
            UnaryOp::Negate => {
                let signed_ok = operand_ty
                    .primitive_kind()
                    .map(|k| k.is_signed_integer() || k.is_float())
                    .unwrap_or(false);
                if !signed_ok {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("cannot negate a value of type `{}`", operand_ty.type_name()),
                        node.loc.clone(),
                    );
                    return None;
                }
                Some(operand_ty)
            }
            UnaryOp::Not => {
                if !operand_ty.is_bool() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("operator `!` requires `bool`, got `{}`", operand_ty.type_name()),
                        node.loc.clone(),
                    );
                    return None;
                }
                Some(operand_ty)
            }
            UnaryOp::Deref => {
                let TypeKind::Pointer { pointee, mutable } = &operand_ty.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidType,
                        format!("cannot dereference `{}`", operand_ty.type_name()),
                        node.loc.clone(),
                    );
                    return None;
                };
                self.require_unsafe(node, "raw pointer dereference");
                node.flags().set_lvalue(true);
                node.flags().set_mutable(*mutable);
                Some(pointee.clone())
            }
            UnaryOp::AddressOf => {
                if !operand.flags().is_lvalue() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        "cannot take the address of a temporary value".to_string(),
                        node.loc.clone(),
                    );
                    return None;
                }
                Some(TypeDescriptor::pointer(operand_ty, false))
            }
            UnaryOp::AddressOfMut => {
                self.require_unsafe(node, "taking the address of mutable state");
                if !operand.flags().is_lvalue() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        "cannot take the address of a temporary value".to_string(),
                        node.loc.clone(),
                    );
                    return None;
                }
                if !operand.flags().is_mutable() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::ImmutableModification,
                        "cannot take a mutable pointer to an immutable value".to_string(),
                        node.loc.clone(),
                    );
                    return None;
                }
                Some(TypeDescriptor::pointer(operand_ty, true))
            }
        }
    }

    fn require_unsafe(&mut self, node: &NodeRef, what: &str) {
        if !self.in_unsafe() {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("{} requires an unsafe block", what),
                node.loc.clone(),
            );
        }
    }

    fn analyze_call(
        &mut self,
        node: &NodeRef,
        callee: &NodeRef,
        args: &NodeList,
    ) -> Option<TypeRef> {
        node.flags().set_has_side_effects(true);

        match callee.as_expr() {
            Some(Expr::Identifier(name)) => self.analyze_named_call(node, callee, name, args),
            Some(Expr::FieldAccess { base, field }) => {
                self.analyze_method_call(node, base, field, args)
            }
            _ => {
                let callee_ty = self.analyze_expr(callee)?;
                let TypeKind::Function { params, ret, .. } = &callee_ty.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("`{}` is not callable", callee_ty.type_name()),
                        callee.loc.clone(),
                    );
                    return None;
                };
                let params = params.clone();
                let ret = ret.clone();
                self.check_arguments("<expression>", &params, args, node);
                Some(ret)
            }
        }
    }

    fn analyze_named_call(
        &mut self,
        node: &NodeRef,
        callee: &NodeRef,
        name: &str,
        args: &NodeList,
    ) -> Option<TypeRef> {
        // `sizeof(T)` is a compile-time form, usable in any expression.
        if name == "sizeof" {
            return self.analyze_sizeof(node, args);
        }

        let scope = self.current_scope();
        let Some(entry) = scope.lookup_safe(name) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(name, node.loc.clone(), &candidates);
            return None;
        };
        entry.mark_used();

        let Some(fn_ty) = entry.ty.clone() else {
            return None;
        };
        let TypeKind::Function {
            params,
            ret,
            is_extern,
            transfers,
        } = &fn_ty.kind
        else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("`{}` is not a function", name),
                callee.loc.clone(),
            );
            return None;
        };
        type_info::attach(callee, &fn_ty);

        // The ownership validator runs before argument checking on
        // extern calls.
        if *is_extern {
            for (param_ty, transfer) in params.iter().zip(transfers.iter()) {
                if param_ty.is_pointer() && transfer.is_none() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::OwnershipFfiBoundary,
                        format!(
                            "extern function `{}` has a pointer parameter without a \
                             transfer annotation",
                            name
                        ),
                        node.loc.clone(),
                    );
                }
            }
        }

        // Predeclared `range` also admits a (start, end) pair.
        if entry.predeclared && name == "range" && args.len() == 2 {
            let i32_ty = TypeDescriptor::primitive(PrimitiveKind::I32);
            for arg in args {
                let arg_ty = self
                    .with_expected(Some(i32_ty.clone()), |analyzer| analyzer.analyze_expr(arg));
                if let Some(arg_ty) = arg_ty {
                    if !compatible(&i32_ty, &arg_ty) {
                        self.diagnostics.type_mismatch(
                            "i32",
                            &arg_ty.type_name(),
                            arg.loc.clone(),
                        );
                    }
                }
            }
            return Some(TypeDescriptor::slice(i32_ty));
        }

        let params = params.clone();
        let ret = ret.clone();
        self.check_arguments(name, &params, args, node);
        Some(ret)
    }

    fn analyze_sizeof(&mut self, node: &NodeRef, args: &NodeList) -> Option<TypeRef> {
        node.flags().set_constant_expr(true);
        if args.len() != 1 {
            self.diagnostics
                .argument_count_mismatch("sizeof", 1, args.len(), node.loc.clone());
            return None;
        }
        let arg = args.get(0)?;
        let Some(Expr::Identifier(type_name)) = arg.as_expr() else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                "`sizeof` takes a type name".to_string(),
                arg.loc.clone(),
            );
            return None;
        };
        let scope = self.current_scope();
        let Some(entry) = scope.lookup_safe(type_name) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(type_name, arg.loc.clone(), &candidates);
            return None;
        };
        if entry.kind != SymbolKind::Type {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a type", type_name),
                arg.loc.clone(),
            );
            return None;
        }
        entry.mark_used();
        Some(TypeDescriptor::primitive(PrimitiveKind::U64))
    }

    fn check_arguments(
        &mut self,
        name: &str,
        params: &[TypeRef],
        args: &NodeList,
        node: &NodeRef,
    ) {
        if params.len() != args.len() {
            self.diagnostics
                .argument_count_mismatch(name, params.len(), args.len(), node.loc.clone());
            return;
        }
        for (param_ty, arg) in params.iter().zip(args.iter()) {
            let arg_ty =
                self.with_expected(Some(param_ty.clone()), |analyzer| analyzer.analyze_expr(arg));
            if let Some(arg_ty) = arg_ty {
                if !compatible(param_ty, &arg_ty) {
                    self.diagnostics.type_mismatch(
                        &param_ty.type_name(),
                        &arg_ty.type_name(),
                        arg.loc.clone(),
                    );
                }
            }
        }
    }

    fn analyze_method_call(
        &mut self,
        node: &NodeRef,
        base: &NodeRef,
        method: &str,
        args: &NodeList,
    ) -> Option<TypeRef> {
        let base_ty = self.analyze_expr(base)?;
        let concrete = resolve_concrete(&base_ty);

        let Some(member_table) = member_table_of(&concrete) else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("type `{}` has no methods", base_ty.type_name()),
                base.loc.clone(),
            );
            return None;
        };
        let Some(entry) = member_table.lookup_local(method) else {
            self.diagnostics.emit_error(
                DiagnosticKind::UndefinedSymbol,
                format!(
                    "no method `{}` on type `{}`",
                    method,
                    base_ty.type_name()
                ),
                node.loc.clone(),
            );
            return None;
        };
        entry.mark_used();

        let Some(fn_ty) = entry.ty.clone() else {
            return None;
        };
        let TypeKind::Function { params, ret, .. } = &fn_ty.kind else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("member `{}` is not callable", method),
                node.loc.clone(),
            );
            return None;
        };

        // Instance methods receive the base as their leading parameter.
        let explicit = if entry.instance_method {
            params.get(1..).unwrap_or(&[]).to_vec()
        } else {
            params.clone()
        };
        let ret = ret.clone();
        self.check_arguments(method, &explicit, args, node);
        Some(ret)
    }

    fn analyze_associated_call(
        &mut self,
        node: &NodeRef,
        owner: &str,
        member: &str,
        args: &NodeList,
    ) -> Option<TypeRef> {
        node.flags().set_has_side_effects(true);

        let scope = self.current_scope();
        let Some(owner_entry) = scope.lookup_safe(owner) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(owner, node.loc.clone(), &candidates);
            return None;
        };
        owner_entry.mark_used();

        if owner_entry.kind != SymbolKind::Type {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                format!("`{}` is not a type", owner),
                node.loc.clone(),
            );
            return None;
        }
        let owner_ty = owner_entry.ty.clone()?;

        match &owner_ty.kind {
            TypeKind::Enum { variants, .. } => {
                if variants.lookup_local(member).is_none() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::UndefinedSymbol,
                        format!("no variant `{}` on enum `{}`", member, owner),
                        node.loc.clone(),
                    );
                    return None;
                }
                if owner_entry.is_generic() {
                    self.construct_generic_variant(node, owner, member, args)
                } else {
                    self.construct_variant(node, &owner_ty, variants.lookup_local(member), member, args)
                }
            }
            TypeKind::Struct { fields, .. } => {
                // Associated (non-instance) function.
                let Some(entry) = fields.lookup_local(member) else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::UndefinedSymbol,
                        format!("no associated function `{}` on `{}`", member, owner),
                        node.loc.clone(),
                    );
                    return None;
                };
                entry.mark_used();
                let Some(fn_ty) = entry.ty.clone() else {
                    return None;
                };
                let TypeKind::Function { params, ret, .. } = &fn_ty.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("`{}.{}` is not callable", owner, member),
                        node.loc.clone(),
                    );
                    return None;
                };
                if entry.instance_method {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!(
                            "`{}` is an instance method; call it on a value of `{}`",
                            member, owner
                        ),
                        node.loc.clone(),
                    );
                    return None;
                }
                let params = params.clone();
                let ret = ret.clone();
                self.check_arguments(member, &params, args, node);
                Some(ret)
            }
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("`{}` has no associated functions", owner),
                    node.loc.clone(),
                );
                None
            }
        }
    }

    /// Qualified constructor of a generic enum, e.g. `Result.Ok(42)`.
    /// Type arguments come from the expected-type context.
    fn construct_generic_variant(
        &mut self,
        node: &NodeRef,
        owner: &str,
        member: &str,
        args: &NodeList,
    ) -> Option<TypeRef> {
        let expected = self.expected();
        let instance_ty = match expected {
            Some(expected)
                if matches!(
                    &expected.kind,
                    TypeKind::GenericInstance { base, .. } if base.type_name() == owner
                ) =>
            {
                expected
            }
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::TypeInferenceFailed,
                    format!(
                        "cannot infer the type arguments of `{}.{}`; annotate the \
                         surrounding binding",
                        owner, member
                    ),
                    node.loc.clone(),
                );
                return None;
            }
        };

        let TypeKind::GenericInstance { resolved, .. } = &instance_ty.kind else {
            return None;
        };
        let variant = match &resolved.kind {
            TypeKind::Enum { variants, .. } => variants.lookup_local(member),
            _ => None,
        };
        self.construct_variant(node, &instance_ty, variant, member, args)
    }

    fn construct_variant(
        &mut self,
        node: &NodeRef,
        result_ty: &TypeRef,
        variant: Option<Arc<SymbolEntry>>,
        member: &str,
        args: &NodeList,
    ) -> Option<TypeRef> {
        let variant = variant?;
        variant.mark_used();
        match &variant.ty {
            Some(payload) => {
                if args.len() != 1 {
                    self.diagnostics
                        .argument_count_mismatch(member, 1, args.len(), node.loc.clone());
                    return Some(result_ty.clone());
                }
                if let Some(arg) = args.get(0) {
                    let arg_ty = self.with_expected(Some(payload.clone()), |analyzer| {
                        analyzer.analyze_expr(arg)
                    });
                    if let Some(arg_ty) = arg_ty {
                        if !compatible(payload, &arg_ty) {
                            self.diagnostics.type_mismatch(
                                &payload.type_name(),
                                &arg_ty.type_name(),
                                arg.loc.clone(),
                            );
                        }
                    }
                }
                Some(result_ty.clone())
            }
            None => {
                if !args.is_empty() {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("variant `{}` takes no payload", member),
                        node.loc.clone(),
                    );
                }
                Some(result_ty.clone())
            }
        }
    }

    fn analyze_field_access(
        &mut self,
        node: &NodeRef,
        base: &NodeRef,
        field: &str,
    ) -> Option<TypeRef> {
        let base_ty = self.analyze_expr(base)?;
        let concrete = resolve_concrete(&base_ty);

        let TypeKind::Struct { fields, .. } = &concrete.kind else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("type `{}` has no fields", base_ty.type_name()),
                node.loc.clone(),
            );
            return None;
        };
        let Some(entry) = fields.lookup_local(field) else {
            self.diagnostics.emit_error(
                DiagnosticKind::UndefinedSymbol,
                format!("no field `{}` on type `{}`", field, base_ty.type_name()),
                node.loc.clone(),
            );
            return None;
        };
        entry.mark_used();

        node.flags().set_lvalue(base.flags().is_lvalue());
        node.flags().set_mutable(base.flags().is_mutable());
        entry.ty.clone()
    }

    fn analyze_index_access(
        &mut self,
        node: &NodeRef,
        base: &NodeRef,
        index: &NodeRef,
    ) -> Option<TypeRef> {
        let base_ty = self.analyze_expr(base)?;
        if let Some(index_ty) = self.analyze_expr(index) {
            if !index_ty.is_integer() {
                self.diagnostics.type_mismatch(
                    "integer",
                    &index_ty.type_name(),
                    index.loc.clone(),
                );
            }
        }

        let elem = match &base_ty.kind {
            TypeKind::Slice { elem } | TypeKind::Array { elem, .. } => elem.clone(),
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidType,
                    format!("type `{}` cannot be indexed", base_ty.type_name()),
                    node.loc.clone(),
                );
                return None;
            }
        };

        node.flags().set_lvalue(base.flags().is_lvalue());
        node.flags().set_mutable(base.flags().is_mutable());
        Some(elem)
    }

    fn analyze_slice_expr(
        &mut self,
        node: &NodeRef,
        base: &NodeRef,
        start: Option<&NodeRef>,
        end: Option<&NodeRef>,
    ) -> Option<TypeRef> {
        let base_ty = self.analyze_expr(base)?;
        for bound in [start, end].into_iter().flatten() {
            if let Some(bound_ty) = self.analyze_expr(bound) {
                if !bound_ty.is_integer() {
                    self.diagnostics.type_mismatch(
                        "integer",
                        &bound_ty.type_name(),
                        bound.loc.clone(),
                    );
                }
            }
        }

        match &base_ty.kind {
            TypeKind::Slice { elem } | TypeKind::Array { elem, .. } => {
                Some(TypeDescriptor::slice(elem.clone()))
            }
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidType,
                    format!("type `{}` cannot be sliced", base_ty.type_name()),
                    node.loc.clone(),
                );
                None
            }
        }
    }

    fn analyze_slice_len(&mut self, node: &NodeRef, base: &NodeRef) -> Option<TypeRef> {
        let base_ty = self.analyze_expr(base)?;
        let has_len = matches!(
            &base_ty.kind,
            TypeKind::Slice { .. }
                | TypeKind::Array { .. }
                | TypeKind::Primitive(PrimitiveKind::Str)
        );
        if !has_len {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("type `{}` has no length", base_ty.type_name()),
                node.loc.clone(),
            );
            return None;
        }
        Some(TypeDescriptor::primitive(PrimitiveKind::U64))
    }

    /// Assignment: target mutability first, then both sides, then
    /// compatibility. The statement's value is unit.
    fn analyze_assignment(
        &mut self,
        node: &NodeRef,
        target: &NodeRef,
        value: &NodeRef,
    ) -> Option<TypeRef> {
        node.flags().set_has_side_effects(true);

        let target_ty = self.analyze_assign_target(target);
        let value_ty =
            self.with_expected(target_ty.clone(), |analyzer| analyzer.analyze_expr(value));

        if let (Some(target_ty), Some(value_ty)) = (&target_ty, &value_ty) {
            if !compatible(target_ty, value_ty) {
                self.diagnostics.type_mismatch(
                    &target_ty.type_name(),
                    &value_ty.type_name(),
                    value.loc.clone(),
                );
            }
        }
        Some(TypeDescriptor::primitive(PrimitiveKind::Void))
    }

    /// Validate an assignment target and produce its slot type. Errors
    /// are reported but the slot type is still returned when derivable,
    /// so sibling analysis continues.
    fn analyze_assign_target(&mut self, target: &NodeRef) -> Option<TypeRef> {
        let result = match target.as_expr() {
            Some(Expr::Identifier(name)) => {
                let scope = self.current_scope();
                let Some(entry) = scope.lookup_safe(name) else {
                    let candidates = scope.visible_names();
                    self.diagnostics
                        .undefined_symbol(name, target.loc.clone(), &candidates);
                    return None;
                };
                entry.mark_used();
                if !matches!(entry.kind, SymbolKind::Variable | SymbolKind::Parameter) {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        format!("`{}` cannot be assigned to", name),
                        target.loc.clone(),
                    );
                    return None;
                }
                if !entry.mutable {
                    self.diagnostics
                        .immutable_modification(name, target.loc.clone());
                }
                target.flags().set_lvalue(true);
                target.flags().set_mutable(entry.mutable);
                entry.ty.clone()
            }
            Some(Expr::FieldAccess { base, field }) => {
                // Mutability follows the base object.
                let base_ty = self.analyze_assign_target(base)?;
                let concrete = resolve_concrete(&base_ty);
                let TypeKind::Struct { fields, .. } = &concrete.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidType,
                        format!("type `{}` has no fields", base_ty.type_name()),
                        target.loc.clone(),
                    );
                    return None;
                };
                let Some(entry) = fields.lookup_local(field) else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::UndefinedSymbol,
                        format!("no field `{}` on type `{}`", field, base_ty.type_name()),
                        target.loc.clone(),
                    );
                    return None;
                };
                target.flags().set_lvalue(true);
                target.flags().set_mutable(base.flags().is_mutable());
                entry.ty.clone()
            }
            Some(Expr::IndexAccess { base, index }) => {
                // Mutability follows the indexed array.
                let base_ty = self.analyze_assign_target(base)?;
                if let Some(index_ty) = self.analyze_expr(index) {
                    if !index_ty.is_integer() {
                        self.diagnostics.type_mismatch(
                            "integer",
                            &index_ty.type_name(),
                            index.loc.clone(),
                        );
                    }
                }
                match &base_ty.kind {
                    TypeKind::Slice { elem } | TypeKind::Array { elem, .. } => {
                        target.flags().set_lvalue(true);
                        target.flags().set_mutable(base.flags().is_mutable());
                        Some(elem.clone())
                    }
                    _ => {
                        self.diagnostics.emit_error(
                            DiagnosticKind::InvalidType,
                            format!("type `{}` cannot be indexed", base_ty.type_name()),
                            target.loc.clone(),
                        );
                        None
                    }
                }
            }
            Some(Expr::Unary {
                op: UnaryOp::Deref,
                operand,
            }) => {
                let pointer_ty = self.analyze_expr(operand)?;
                let TypeKind::Pointer { pointee, mutable } = &pointer_ty.kind else {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidType,
                        format!("cannot assign through `{}`", pointer_ty.type_name()),
                        target.loc.clone(),
                    );
                    return None;
                };
                self.require_unsafe(target, "raw pointer dereference");
                if !mutable {
                    ownership::report_const_pointer_write(&mut self.diagnostics, &target.loc);
                }
                target.flags().set_lvalue(true);
                target.flags().set_mutable(*mutable);
                Some(pointee.clone())
            }
            _ => {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    "invalid assignment target".to_string(),
                    target.loc.clone(),
                );
                None
            }
        };

        if let Some(ty) = &result {
            type_info::attach(target, ty);
        }
        result
    }

    fn analyze_struct_literal(
        &mut self,
        node: &NodeRef,
        name: &str,
        type_args: &[NodeRef],
        field_values: &[(String, NodeRef)],
    ) -> Option<TypeRef> {
        let scope = self.current_scope();
        let Some(entry) = scope.lookup_safe(name) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(name, node.loc.clone(), &candidates);
            return None;
        };
        entry.mark_used();
        if entry.kind != SymbolKind::Type {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a type", name),
                node.loc.clone(),
            );
            return None;
        }

        let literal_ty = if entry.is_generic() {
            if type_args.is_empty() {
                // Fall back to the expected-type context.
                match self.expected() {
                    Some(expected)
                        if matches!(
                            &expected.kind,
                            TypeKind::GenericInstance { base, .. }
                                if base.type_name() == name
                        ) =>
                    {
                        expected
                    }
                    _ => {
                        self.diagnostics.emit_error(
                            DiagnosticKind::TypeInferenceFailed,
                            format!("cannot infer type arguments for `{}`", name),
                            node.loc.clone(),
                        );
                        return None;
                    }
                }
            } else {
                let args = type_args
                    .iter()
                    .map(|arg| self.resolve_type_node(arg))
                    .collect::<Option<Vec<_>>>()?;
                self.instantiate_named(name, &args, &node.loc)?
            }
        } else {
            entry.ty.clone()?
        };

        let concrete = resolve_concrete(&literal_ty);
        let TypeKind::Struct {
            fields,
            field_order,
            ..
        } = &concrete.kind
        else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a struct", name),
                node.loc.clone(),
            );
            return None;
        };

        let mut provided = HashSet::new();
        for (field_name, value) in field_values {
            if !provided.insert(field_name.clone()) {
                self.diagnostics.emit_error(
                    DiagnosticKind::DuplicateSymbol,
                    format!("field `{}` is given twice", field_name),
                    value.loc.clone(),
                );
                continue;
            }
            match fields
                .lookup_local(field_name)
                .filter(|entry| entry.kind == SymbolKind::Field)
            {
                Some(field_entry) => {
                    let field_ty = field_entry.ty.clone();
                    let value_ty = self
                        .with_expected(field_ty.clone(), |analyzer| analyzer.analyze_expr(value));
                    if let (Some(field_ty), Some(value_ty)) = (field_ty, value_ty) {
                        if !compatible(&field_ty, &value_ty) {
                            self.diagnostics.type_mismatch(
                                &field_ty.type_name(),
                                &value_ty.type_name(),
                                value.loc.clone(),
                            );
                        }
                    }
                }
                None => {
                    self.diagnostics.emit_error(
                        DiagnosticKind::UndefinedSymbol,
                        format!("no field `{}` on struct `{}`", field_name, name),
                        value.loc.clone(),
                    );
                }
            }
        }
        for field_name in field_order {
            if !provided.contains(field_name) {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("missing field `{}` in `{}` literal", field_name, name),
                    node.loc.clone(),
                );
            }
        }

        Some(literal_ty)
    }

    fn analyze_array_literal(&mut self, node: &NodeRef, elems: &NodeList) -> Option<TypeRef> {
        let elem_expected = match self.expected().as_ref().map(|e| &e.kind) {
            Some(TypeKind::Array { elem, .. }) | Some(TypeKind::Slice { elem }) => {
                Some(elem.clone())
            }
            _ => None,
        };

        let mut elem_ty: Option<TypeRef> = elem_expected.clone();
        for elem in elems {
            let found =
                self.with_expected(elem_ty.clone(), |analyzer| analyzer.analyze_expr(elem));
            match (&elem_ty, found) {
                (None, Some(found)) => elem_ty = Some(found),
                (Some(expected), Some(found)) => {
                    if !compatible(expected, &found) {
                        self.diagnostics.type_mismatch(
                            &expected.type_name(),
                            &found.type_name(),
                            elem.loc.clone(),
                        );
                    }
                }
                _ => {}
            }
        }

        match elem_ty {
            Some(elem_ty) => Some(TypeDescriptor::array(elem_ty, elems.len() as u64)),
            None => {
                self.diagnostics.emit_error(
                    DiagnosticKind::TypeInferenceFailed,
                    "cannot infer the element type of an empty array literal".to_string(),
                    node.loc.clone(),
                );
                None
            }
        }
    }

    fn analyze_tuple_literal(&mut self, elems: &NodeList) -> Option<TypeRef> {
        let expected_elems = match self.expected().as_ref().map(|e| &e.kind) {
            Some(TypeKind::Tuple { elems }) => Some(elems.clone()),
            _ => None,
        };

        let mut types = Vec::with_capacity(elems.len());
        for (index, elem) in elems.iter().enumerate() {
            let expected = expected_elems
                .as_ref()
                .and_then(|elems| elems.get(index).cloned());
            types.push(self.with_expected(expected, |analyzer| analyzer.analyze_expr(elem))?);
        }
        Some(TypeDescriptor::tuple(types))
    }

    fn analyze_await(&mut self, node: &NodeRef, task: &NodeRef) -> Option<TypeRef> {
        let task_ty = self.analyze_expr(task)?;
        let TypeKind::TaskHandle { result } = &task_ty.kind else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`await` requires a task handle, got `{}`", task_ty.type_name()),
                node.loc.clone(),
            );
            return None;
        };
        Some(result.clone())
    }

    fn analyze_cast(&mut self, node: &NodeRef, expr: &NodeRef, ty: &NodeRef) -> Option<TypeRef> {
        let source = self.analyze_expr(expr)?;
        let target = self.resolve_type_node(ty)?;

        if !cast_permitted(&source, &target) {
            self.diagnostics.emit_error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "cannot cast `{}` to `{}`",
                    source.type_name(),
                    target.type_name()
                ),
                node.loc.clone(),
            );
            return None;
        }
        Some(target)
    }
}

/// An instance type behaves as its substituted concrete type.
fn resolve_concrete(ty: &TypeRef) -> TypeRef {
    match &ty.kind {
        TypeKind::GenericInstance { resolved, .. } => resolved.clone(),
        _ => ty.clone(),
    }
}

fn member_table_of(ty: &TypeRef) -> Option<Arc<crate::symbols::SymbolTable>> {
    match &ty.kind {
        TypeKind::Struct { fields, .. } => Some(fields.clone()),
        TypeKind::Enum { variants, .. } => Some(variants.clone()),
        _ => None,
    }
}

/// Permitted casts: integer↔integer, integer↔float, pointer↔pointer,
/// pointer↔integer, array→pointer decay, identity.
fn cast_permitted(source: &TypeRef, target: &TypeRef) -> bool {
    if compatible(target, source) {
        return true;
    }
    let src_int = source.is_integer();
    let dst_int = target.is_integer();
    let src_float = source
        .primitive_kind()
        .map(|k| k.is_float())
        .unwrap_or(false);
    let dst_float = target
        .primitive_kind()
        .map(|k| k.is_float())
        .unwrap_or(false);

    if (src_int || src_float) && (dst_int || dst_float) {
        return true;
    }
    if source.is_pointer() && (target.is_pointer() || dst_int) {
        return true;
    }
    if src_int && target.is_pointer() {
        return true;
    }
    if matches!(source.kind, TypeKind::Array { .. }) && target.is_pointer() {
        return true;
    }
    false
}
