// Semantic analyzer: drives declaration, statement and expression
// analysis over a parsed program, accumulating diagnostics.

mod const_eval;
mod declarations;
mod expressions;
mod patterns;
mod statements;

pub use const_eval::evaluate_const;

use crate::builtins;
use crate::generics::{GenericRegistry, InstantiateError};
use crate::symbols::{SymbolKind, SymbolTable};
use crate::type_info;
use crate::types::TypeRef;
use aster_ast::{Decl, ImportDecl, NodeKind, NodeRef, TypeExpr};
use aster_diagnostics::{DiagnosticEngine, DiagnosticKind, SourceLocation};
use std::sync::Arc;

pub struct SemanticAnalyzer {
    pub diagnostics: DiagnosticEngine,
    global: Arc<SymbolTable>,
    /// Innermost scope last; the global scope is never popped.
    scopes: Vec<Arc<SymbolTable>>,
    generics: Arc<GenericRegistry>,
    /// Resolution context for initializers and arguments.
    expected_type: Option<TypeRef>,
    current_return: Option<TypeRef>,
    unsafe_depth: u32,
    loop_depth: u32,
    init_ok: bool,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let global = SymbolTable::new();
        let generics = Arc::new(GenericRegistry::new());
        let mut diagnostics = DiagnosticEngine::new();

        let init_ok = match builtins::install(&global, &generics) {
            Ok(()) => true,
            Err(err) => {
                diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    format!("builtin registry initialization failed: {}", err),
                    SourceLocation::unknown(),
                );
                false
            }
        };

        Self {
            diagnostics,
            scopes: vec![global.clone()],
            global,
            generics,
            expected_type: None,
            current_return: None,
            unsafe_depth: 0,
            loop_depth: 0,
            init_ok,
        }
    }

    pub fn global_scope(&self) -> &Arc<SymbolTable> {
        &self.global
    }

    pub fn generics(&self) -> &Arc<GenericRegistry> {
        &self.generics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    /// Analyze a whole compilation unit. Diagnostics accumulate on the
    /// engine; the return value is false only for fatal conditions (a
    /// non-program root, a non-declaration at top level, or a failed
    /// builtin registry).
    pub fn analyze(&mut self, root: &NodeRef) -> bool {
        if !self.init_ok {
            return false;
        }

        let NodeKind::Program(program) = &root.kind else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidOperation,
                "top-level node is not a program".to_string(),
                root.loc.clone(),
            );
            return false;
        };

        for import_node in &program.imports {
            match import_node.as_decl() {
                Some(Decl::Import(import)) => self.declare_import(import),
                _ => {
                    self.diagnostics.emit_error(
                        DiagnosticKind::InvalidOperation,
                        "import list contains a non-import node".to_string(),
                        import_node.loc.clone(),
                    );
                    return false;
                }
            }
        }

        for decl_node in &program.decls {
            if decl_node.as_decl().is_none() {
                self.diagnostics.emit_error(
                    DiagnosticKind::InvalidOperation,
                    "top-level node is not a declaration".to_string(),
                    decl_node.loc.clone(),
                );
                return false;
            }
        }

        // Signatures and types first, in source order; bodies second, so
        // declarations may refer to later siblings.
        for decl_node in &program.decls {
            self.declare_top_level(decl_node);
        }
        for decl_node in &program.decls {
            self.analyze_top_level(decl_node);
        }

        root.flags().set_validated(true);
        true
    }

    fn declare_import(&mut self, import: &ImportDecl) {
        let alias = import
            .alias
            .clone()
            .unwrap_or_else(|| {
                import
                    .path
                    .rsplit('/')
                    .next()
                    .unwrap_or(import.path.as_str())
                    .to_string()
            });
        // The core records the binding only; the module's symbols are
        // populated by the driver when the unit is linked.
        let module_symbols = SymbolTable::new();
        self.global.add_alias(alias, import.path.clone(), module_symbols);
    }

    pub(crate) fn current_scope(&self) -> Arc<SymbolTable> {
        self.scopes
            .last()
            .cloned()
            .unwrap_or_else(|| self.global.clone())
    }

    pub(crate) fn enter_scope(&mut self) -> Arc<SymbolTable> {
        let scope = SymbolTable::child(&self.current_scope());
        self.scopes.push(scope.clone());
        scope
    }

    pub(crate) fn exit_scope(&mut self) {
        // The global scope stays.
        if self.scopes.len() <= 1 {
            return;
        }
        if let Some(scope) = self.scopes.pop() {
            self.warn_unused(&scope);
        }
    }

    fn warn_unused(&mut self, scope: &Arc<SymbolTable>) {
        let mut unused: Vec<(String, SourceLocation)> = Vec::new();
        scope.iterate(&mut |name, entry| {
            if entry.kind == SymbolKind::Variable && !entry.is_used() && !name.starts_with('_') {
                let loc = entry
                    .decl
                    .as_ref()
                    .map(|decl| decl.loc.clone())
                    .unwrap_or_else(SourceLocation::unknown);
                unused.push((name.to_string(), loc));
            }
            true
        });
        unused.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, loc) in unused {
            self.diagnostics.unused_symbol(&name, loc);
        }
    }

    /// Run `f` with a different expected type, restoring the previous one
    /// on every exit path.
    pub(crate) fn with_expected<T>(
        &mut self,
        expected: Option<TypeRef>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let previous = std::mem::replace(&mut self.expected_type, expected);
        let result = f(self);
        self.expected_type = previous;
        result
    }

    pub(crate) fn expected(&self) -> Option<TypeRef> {
        self.expected_type.clone()
    }

    pub(crate) fn in_unsafe(&self) -> bool {
        self.unsafe_depth > 0
    }

    /// Resolve a type expression against the symbol table. Struct versus
    /// enum is decided by the resolved symbol, never by syntax.
    pub(crate) fn resolve_type_node(&mut self, node: &NodeRef) -> Option<TypeRef> {
        let Some(ty_expr) = node.as_type_expr() else {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                "expected a type expression".to_string(),
                node.loc.clone(),
            );
            return None;
        };

        let resolved = match ty_expr {
            TypeExpr::Named { name, type_args } => self.resolve_named_type(name, type_args, node),
            TypeExpr::Slice { elem } => {
                let elem = self.resolve_type_node(elem)?;
                Some(crate::types::TypeDescriptor::slice(elem))
            }
            TypeExpr::Array { elem, len } => {
                let elem = self.resolve_type_node(elem)?;
                Some(crate::types::TypeDescriptor::array(elem, *len))
            }
            TypeExpr::Pointer { pointee, mutable } => {
                let pointee = self.resolve_type_node(pointee)?;
                Some(crate::types::TypeDescriptor::pointer(pointee, *mutable))
            }
            TypeExpr::OptionType { inner } => {
                let inner = self.resolve_type_node(inner)?;
                self.instantiate_named("Option", &[inner], &node.loc)
            }
            TypeExpr::ResultType { ok, err } => {
                let ok = self.resolve_type_node(ok)?;
                let err = self.resolve_type_node(err)?;
                self.instantiate_named("Result", &[ok, err], &node.loc)
            }
            TypeExpr::Tuple { elems } => {
                let elems = elems
                    .iter()
                    .map(|elem| self.resolve_type_node(elem))
                    .collect::<Option<Vec<_>>>()?;
                Some(crate::types::TypeDescriptor::tuple(elems))
            }
            TypeExpr::TaskHandle { result } => {
                let result = self.resolve_type_node(result)?;
                Some(crate::types::TypeDescriptor::task_handle(result))
            }
        };

        if let Some(ty) = &resolved {
            type_info::attach(node, ty);
            node.flags().set_validated(true);
        }
        resolved
    }

    fn resolve_named_type(
        &mut self,
        name: &str,
        type_args: &[NodeRef],
        node: &NodeRef,
    ) -> Option<TypeRef> {
        let args = type_args
            .iter()
            .map(|arg| self.resolve_type_node(arg))
            .collect::<Option<Vec<_>>>()?;

        let scope = self.current_scope();
        let Some(entry) = scope.lookup_safe(name) else {
            let candidates = scope.visible_names();
            self.diagnostics
                .undefined_symbol(name, node.loc.clone(), &candidates);
            return None;
        };

        if !matches!(entry.kind, SymbolKind::Type | SymbolKind::TypeParameter) {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a type", name),
                node.loc.clone(),
            );
            return None;
        }
        entry.mark_used();

        if entry.is_generic() {
            if args.len() != entry.type_param_count {
                self.diagnostics.emit_error(
                    DiagnosticKind::GenericArgMismatch,
                    format!(
                        "generic `{}` expects {} type arguments, got {}",
                        name,
                        entry.type_param_count,
                        args.len()
                    ),
                    node.loc.clone(),
                );
                return None;
            }
            return self.instantiate_named(name, &args, &node.loc);
        }

        if !args.is_empty() {
            self.diagnostics.emit_error(
                DiagnosticKind::InvalidType,
                format!("type `{}` takes no type arguments", name),
                node.loc.clone(),
            );
            return None;
        }

        entry.ty.clone()
    }

    /// Monomorphize `name` with `args`, mapping engine failures onto
    /// diagnostics.
    pub(crate) fn instantiate_named(
        &mut self,
        name: &str,
        args: &[TypeRef],
        loc: &SourceLocation,
    ) -> Option<TypeRef> {
        match self.generics.instantiate(name, args) {
            Ok(instantiation) => Some(instantiation.instance.clone()),
            Err(err) => {
                let kind = match &err {
                    InstantiateError::UnknownGeneric { .. } => DiagnosticKind::UndefinedSymbol,
                    InstantiateError::ArgCountMismatch { .. } => DiagnosticKind::GenericArgMismatch,
                    InstantiateError::Cyclic { .. } => DiagnosticKind::CyclicInstantiation,
                };
                self.diagnostics.emit_error(kind, err.to_string(), loc.clone());
                None
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
