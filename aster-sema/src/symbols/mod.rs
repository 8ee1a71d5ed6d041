// Scoped symbol tables with thread-safe lookup and module aliases

use crate::types::TypeRef;
use aster_ast::{NodeRef, Visibility};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What a name denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    Parameter,
    Field,
    Method,
    EnumVariant,
    TypeParameter,
    Const,
}

/// Compile-time evaluated constant value, stored on `Const` symbols.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// One named entry. The `mutable` and `initialized` flags are fixed at
/// declaration; only `used` may change afterwards.
#[derive(Debug)]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Option<TypeRef>,
    /// Originating declaration node, when the symbol comes from source.
    pub decl: Option<NodeRef>,
    pub scope_id: u64,
    pub visibility: Visibility,
    pub mutable: bool,
    pub initialized: bool,
    pub exported: bool,
    pub predeclared: bool,
    pub instance_method: bool,
    /// Number of declared type parameters; non-zero marks a generic.
    pub type_param_count: usize,
    pub const_value: Option<ConstValue>,
    used: AtomicBool,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Option<TypeRef>) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            decl: None,
            scope_id: 0,
            visibility: Visibility::Private,
            mutable: false,
            initialized: false,
            exported: false,
            predeclared: false,
            instance_method: false,
            type_param_count: 0,
            const_value: None,
            used: AtomicBool::new(false),
        }
    }

    pub fn with_decl(mut self, decl: NodeRef) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self.exported = visibility.is_public();
        self
    }

    pub fn with_mutable(mut self, mutable: bool) -> Self {
        self.mutable = mutable;
        self
    }

    pub fn with_initialized(mut self, initialized: bool) -> Self {
        self.initialized = initialized;
        self
    }

    pub fn with_predeclared(mut self) -> Self {
        self.predeclared = true;
        self
    }

    pub fn with_instance_method(mut self, instance: bool) -> Self {
        self.instance_method = instance;
        self
    }

    pub fn with_type_params(mut self, count: usize) -> Self {
        self.type_param_count = count;
        self
    }

    pub fn with_const_value(mut self, value: ConstValue) -> Self {
        self.const_value = Some(value);
        self
    }

    pub fn is_generic(&self) -> bool {
        self.type_param_count > 0
    }

    pub fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }

    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }
}

/// An imported module bound to a local alias. The core records the
/// binding; transitive resolution belongs to the driver.
#[derive(Debug, Clone)]
pub struct ModuleAlias {
    pub alias: String,
    pub path: String,
    pub symbols: Arc<SymbolTable>,
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// One lexical scope. Lookup never crosses the parent boundary unless the
/// caller walks it explicitly (`lookup_safe`). Readers may be concurrent;
/// writers are exclusive.
#[derive(Debug)]
pub struct SymbolTable {
    entries: RwLock<HashMap<String, Arc<SymbolEntry>>>,
    entry_count: AtomicUsize,
    scope_id: u64,
    parent: Option<Arc<SymbolTable>>,
    aliases: RwLock<Vec<ModuleAlias>>,
}

impl SymbolTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            entry_count: AtomicUsize::new(0),
            scope_id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            parent: None,
            aliases: RwLock::new(Vec::new()),
        })
    }

    /// A nested scope whose lookups may fall back to `parent`.
    pub fn child(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            entry_count: AtomicUsize::new(0),
            scope_id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            parent: Some(parent.clone()),
            aliases: RwLock::new(Vec::new()),
        })
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    pub fn parent(&self) -> Option<&Arc<SymbolTable>> {
        self.parent.as_ref()
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<SymbolEntry>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<SymbolEntry>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert into this scope unless the name is already present here.
    /// The entry's scope id is stamped with this scope's id.
    pub fn insert_safe(&self, name: &str, mut entry: SymbolEntry) -> bool {
        entry.scope_id = self.scope_id;
        let mut entries = self.write_entries();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), Arc::new(entry));
        self.entry_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Insert a pre-built shared entry (used for qualified re-exports).
    pub fn insert_shared(&self, name: &str, entry: Arc<SymbolEntry>) -> bool {
        let mut entries = self.write_entries();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), entry);
        self.entry_count.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// This scope only; never consults the parent.
    pub fn lookup_local(&self, name: &str) -> Option<Arc<SymbolEntry>> {
        self.read_entries().get(name).cloned()
    }

    /// Walk this scope and its ancestors; after local misses, module
    /// aliases are consulted as a final step.
    pub fn lookup_safe(&self, name: &str) -> Option<Arc<SymbolEntry>> {
        let mut scope = Some(self);
        let mut parents: Vec<&SymbolTable> = Vec::new();
        while let Some(table) = scope {
            if let Some(entry) = table.lookup_local(name) {
                return Some(entry);
            }
            parents.push(table);
            scope = table.parent.as_deref();
        }
        for table in parents {
            if let Some(entry) = table.lookup_through_aliases(name) {
                return Some(entry);
            }
        }
        None
    }

    fn lookup_through_aliases(&self, name: &str) -> Option<Arc<SymbolEntry>> {
        let aliases = self.aliases.read().unwrap_or_else(PoisonError::into_inner);
        // `alias.member` resolves inside the aliased module's symbols.
        // Members the module does not export stay invisible.
        if let Some((alias, member)) = name.split_once('.') {
            for binding in aliases.iter() {
                if binding.alias == alias {
                    return binding
                        .symbols
                        .lookup_local(member)
                        .filter(|entry| entry.exported);
                }
            }
        }
        None
    }

    pub fn add_alias(&self, alias: impl Into<String>, path: impl Into<String>, symbols: Arc<SymbolTable>) {
        let mut aliases = self.aliases.write().unwrap_or_else(PoisonError::into_inner);
        aliases.push(ModuleAlias {
            alias: alias.into(),
            path: path.into(),
            symbols,
        });
    }

    pub fn alias_count(&self) -> usize {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Visit every `(name, entry)` in this scope. The callback returns
    /// `false` to stop. Ordering is unspecified.
    pub fn iterate(&self, cb: &mut dyn FnMut(&str, &Arc<SymbolEntry>) -> bool) {
        let entries = self.read_entries();
        for (name, entry) in entries.iter() {
            if !cb(name, entry) {
                break;
            }
        }
    }

    /// Names in this scope, for suggestion candidates.
    pub fn local_names(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    /// All names visible from this scope, for suggestion candidates.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut scope = Some(self);
        while let Some(table) = scope {
            names.extend(table.local_names());
            scope = table.parent.as_deref();
        }
        names
    }

    pub fn len(&self) -> usize {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
