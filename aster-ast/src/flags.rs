// Per-node analysis flags packed into one atomic word

use std::sync::atomic::{AtomicU32, Ordering};

const VALIDATED: u32 = 1 << 0;
const TYPE_CHECKED: u32 = 1 << 1;
const CONSTANT_EXPR: u32 = 1 << 2;
const HAS_SIDE_EFFECTS: u32 = 1 << 3;
const IS_LVALUE: u32 = 1 << 4;
const IS_MUTABLE: u32 = 1 << 5;

/// Compact flag set shared between analysis passes. Nodes are shared via
/// `Arc`, so flag updates go through atomics rather than `&mut`.
#[derive(Debug, Default)]
pub struct NodeFlags(AtomicU32);

impl NodeFlags {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    fn set(&self, bit: u32, value: bool) {
        if value {
            self.0.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.0.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    fn get(&self, bit: u32) -> bool {
        self.0.load(Ordering::Acquire) & bit != 0
    }

    /// Raw word snapshot, for debugging and tests.
    pub fn bits(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_validated(&self) -> bool {
        self.get(VALIDATED)
    }

    pub fn set_validated(&self, value: bool) {
        self.set(VALIDATED, value);
    }

    pub fn is_type_checked(&self) -> bool {
        self.get(TYPE_CHECKED)
    }

    pub fn set_type_checked(&self, value: bool) {
        self.set(TYPE_CHECKED, value);
    }

    pub fn is_constant_expr(&self) -> bool {
        self.get(CONSTANT_EXPR)
    }

    pub fn set_constant_expr(&self, value: bool) {
        self.set(CONSTANT_EXPR, value);
    }

    pub fn has_side_effects(&self) -> bool {
        self.get(HAS_SIDE_EFFECTS)
    }

    pub fn set_has_side_effects(&self, value: bool) {
        self.set(HAS_SIDE_EFFECTS, value);
    }

    pub fn is_lvalue(&self) -> bool {
        self.get(IS_LVALUE)
    }

    pub fn set_lvalue(&self, value: bool) {
        self.set(IS_LVALUE, value);
    }

    pub fn is_mutable(&self) -> bool {
        self.get(IS_MUTABLE)
    }

    pub fn set_mutable(&self, value: bool) {
        self.set(IS_MUTABLE, value);
    }
}
