pub mod analyzer; // Declaration, statement and expression analysis
pub mod builtins; // Predeclared symbols and builtin generics
pub mod generics; // Monomorphization registry
pub mod ownership; // Ownership tags and FFI transfer validation
pub mod symbols; // Scoped symbol tables
pub mod type_info; // Projection onto the stable TypeInfo layer
pub mod types; // Type descriptors and compatibility

// Re-export diagnostics from the aster-diagnostics crate
pub use aster_diagnostics as diagnostics;

pub use analyzer::{evaluate_const, SemanticAnalyzer};
pub use diagnostics::{Diagnostic, DiagnosticEngine, DiagnosticKind, Severity, SourceLocation};
pub use generics::{GenericDecl, GenericInstantiation, GenericRegistry, InstantiateError};
pub use ownership::{MemoryZone, OwnershipTag};
pub use symbols::{ConstValue, ModuleAlias, SymbolEntry, SymbolKind, SymbolTable};
pub use type_info::project;
pub use types::{compatible, PrimitiveKind, TypeDescriptor, TypeKind, TypeRef};
