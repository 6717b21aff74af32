//! First-class identity types for dispatch entities.
//!
//! These types provide type-safe identifiers for classes, members, selectors,
//! and table functions, eliminating raw-integer lookups and preventing
//! mix-ups between different entity kinds.

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name(u32);

        impl $name {
            pub fn new(index: u32) -> Self {
                Self(index)
            }

            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

define_entity_id! {
    /// Identity for a class in the hierarchy. Ids are dense in
    /// `[0, n_classes)` and double as receiver indexes into the dispatch
    /// table.
    pub struct ClassId;
}

define_entity_id! {
    /// Identity for a member declaration (method, field, getter, setter).
    pub struct MemberId;
}

define_entity_id! {
    /// Identity for a selector: an equivalence class of override-related
    /// members, assigned by the driver's attribute metadata.
    pub struct SelectorId;
}

define_entity_id! {
    /// Identity for a compiled function in the driver's function registry.
    pub struct FunctionRef;
}
