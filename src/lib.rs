//! Virtual dispatch table construction for a flat-table bytecode target.
//!
//! The builder groups polymorphic call sites into selectors, synthesizes a
//! unified callable signature per selector, and packs every
//! `(selector, class)` entry into one table indexed by
//! `selector.offset + receiver.class_id` using row displacement.

pub mod builder;
pub mod errors;
pub mod hierarchy;
pub mod identity;
pub mod lattice;
pub mod packer;
pub mod param_info;
pub mod selector;
pub mod signature;
pub mod well_known;

mod registry;
mod walker;

pub use builder::{DispatchOutput, DispatchTableBuilder};
pub use errors::BuildError;
pub use hierarchy::{
    ClassDescriptor, ClassHierarchy, DispatchMetadata, MemberAttrs, MemberDecl, MemberKind,
    MemberRef, MemberRole, NamedParamDecl, ParamDecl, ParamShape, TypeRef,
};
pub use identity::{ClassId, FunctionRef, MemberId, SelectorId};
pub use lattice::{TypeLattice, ValueType};
pub use packer::{DispatchTable, FunctionRegistry, MapFunctionRegistry, PackStats};
pub use param_info::ParameterInfo;
pub use selector::Selector;
pub use signature::CallSignature;
pub use well_known::{CALL_MEMBER_NAME, WellKnown};
