// Ownership tags and FFI transfer validation.
// Tags select the memory-management regime for a declaration; transfer
// annotations declare pointee ownership across extern calls.

use aster_ast::{Annotation, TransferMode};
use aster_diagnostics::{DiagnosticEngine, DiagnosticKind, SourceLocation};

/// The closed set of ownership tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipTag {
    Gc,
    C,
    Pinned,
}

/// Memory zone a tagged declaration lives in. Stack allocations follow
/// the GC zone for lifetime purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryZone {
    GarbageCollected,
    Manual,
    Pinned,
}

impl OwnershipTag {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gc" => Some(OwnershipTag::Gc),
            "c" => Some(OwnershipTag::C),
            "pinned" => Some(OwnershipTag::Pinned),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OwnershipTag::Gc => "gc",
            OwnershipTag::C => "c",
            OwnershipTag::Pinned => "pinned",
        }
    }

    pub fn zone(&self) -> MemoryZone {
        match self {
            OwnershipTag::Gc => MemoryZone::GarbageCollected,
            OwnershipTag::C => MemoryZone::Manual,
            OwnershipTag::Pinned => MemoryZone::Pinned,
        }
    }
}

/// First transfer annotation in a declaration's annotation list.
pub fn transfer_annotation(annotations: &[Annotation]) -> Option<TransferMode> {
    annotations.iter().find_map(|ann| match ann {
        Annotation::Transfer(mode) => Some(*mode),
        _ => None,
    })
}

/// Validate a declaration's ownership annotations. Unknown tags report
/// `INVALID_ANNOTATION`; when `allow_gc` is false (extern declarations)
/// a `gc` tag reports `OWNERSHIP_FFI_BOUNDARY`. Returns the accepted tag.
pub fn validate_ownership(
    annotations: &[Annotation],
    allow_gc: bool,
    diagnostics: &mut DiagnosticEngine,
    loc: &SourceLocation,
) -> Option<OwnershipTag> {
    let mut accepted = None;
    for annotation in annotations {
        let Annotation::Ownership(raw) = annotation else {
            continue;
        };
        match OwnershipTag::parse(raw) {
            Some(OwnershipTag::Gc) if !allow_gc => {
                diagnostics.emit_error(
                    DiagnosticKind::OwnershipFfiBoundary,
                    "extern declarations cannot be garbage collected; \
                     use `#c` with manual cleanup"
                        .to_string(),
                    loc.clone(),
                );
            }
            Some(tag) => accepted = Some(tag),
            None => {
                diagnostics.emit_error(
                    DiagnosticKind::InvalidAnnotation,
                    format!(
                        "unknown ownership tag `#{}`; expected `#gc`, `#c` or `#pinned`",
                        raw
                    ),
                    loc.clone(),
                );
            }
        }
    }
    accepted
}

/// A borrowed reference may not be bound beyond the lifetime of its
/// source; at declaration level that means a `borrowed` annotation is
/// only meaningful on extern pointer parameters.
pub fn reject_borrowed_binding(
    annotations: &[Annotation],
    diagnostics: &mut DiagnosticEngine,
    loc: &SourceLocation,
) {
    if transfer_annotation(annotations) == Some(TransferMode::Borrowed) {
        diagnostics.emit_error(
            DiagnosticKind::OwnershipTransferViolation,
            "a borrowed reference cannot escape into a local binding".to_string(),
            loc.clone(),
        );
    }
}

/// Extern pointer parameters must state who owns the pointee.
pub fn require_transfer_on_pointer_param(
    fn_name: &str,
    param_name: &str,
    annotations: &[Annotation],
    diagnostics: &mut DiagnosticEngine,
    loc: &SourceLocation,
) -> Option<TransferMode> {
    match transfer_annotation(annotations) {
        Some(mode) => Some(mode),
        None => {
            diagnostics.emit_error(
                DiagnosticKind::OwnershipFfiBoundary,
                format!(
                    "pointer parameter `{}` of extern function `{}` needs a transfer \
                     annotation (`transfer_full`, `transfer_none` or `borrowed`)",
                    param_name, fn_name
                ),
                loc.clone(),
            );
            None
        }
    }
}

/// Assignment through a `*const` pointer.
pub fn report_const_pointer_write(diagnostics: &mut DiagnosticEngine, loc: &SourceLocation) {
    diagnostics.emit_error(
        DiagnosticKind::OwnershipTransferViolation,
        "cannot assign through const pointer".to_string(),
        loc.clone(),
    );
}
