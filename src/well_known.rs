// src/well_known.rs
//
// Designated classes and members the builder needs to recognize.
// The driver populates these once from its own world; the builder never
// resolves them by name.

use crate::hierarchy::ClassHierarchy;
use crate::identity::{ClassId, MemberId};

/// Member name that is always treated as dynamically callable, so function
/// objects stay invocable through name-only call sites.
pub const CALL_MEMBER_NAME: &str = "call";

/// Designations injected by the driver.
#[derive(Debug, Clone)]
pub struct WellKnown {
    /// The root object class. The synthetic top class dispatches through
    /// this class's members.
    pub object_class: ClassId,
    /// Upper bound for classes from unrelated hierarchies.
    pub top_class: ClassId,
    /// Base class of the machine-primitive types, logically outside the
    /// object hierarchy; its subclasses never appear in dynamic indexes and
    /// it inherits no selectors.
    pub wasm_types_base: Option<ClassId>,
    /// The fallback member invoked on dynamic misses. Its selector is kept
    /// live unconditionally.
    pub no_such_method: Option<MemberId>,
    /// Representation class for tear-off function objects.
    pub function_class: ClassId,
    /// Representation class for reified type parameters.
    pub type_class: ClassId,
    /// Source token of the equality operator.
    pub equality_name: String,
}

impl WellKnown {
    /// Whether a class is a machine-primitive type (the designated base or
    /// any subclass of it).
    pub fn is_wasm_type(&self, hierarchy: &ClassHierarchy, class: ClassId) -> bool {
        self.wasm_types_base
            .is_some_and(|base| hierarchy.descends_from(class, base))
    }

    /// Whether a class is the machine-primitive base itself.
    pub fn is_wasm_base(&self, class: ClassId) -> bool {
        self.wasm_types_base == Some(class)
    }

    pub fn is_equality_name(&self, name: &str) -> bool {
        name == self.equality_name
    }
}
