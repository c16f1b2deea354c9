//! Shared resource and block types for resedit.
//!
//! This crate is the leaf of the workspace: block identifiers, the opened
//! resource shape returned by the backend, change entries, and custom-action
//! descriptors. It has **no internal resedit dependencies**.
//!
//! # Key Types
//!
//! |---------------------|----------------------------------------------|
//! | Type                | Purpose                                      |
//! |---------------------|----------------------------------------------|
//! | [`BlockId`]         | Address of a block (file path + child path)  |
//! | [`ReadData`]        | Successfully parsed block tree               |
//! | [`ReadError`]       | Resource that failed to parse                |
//! | [`OpenedResource`]  | Either of the above, as the backend sends it |
//! | [`BlockKind`]       | Editor-selecting tag derived from the class  |
//! | [`BlockChange`]     | One `{id, value}` entry of a change set      |
//! | [`CustomAction`]    | Backend operation with an argument schema    |
//! |---------------------|----------------------------------------------|

pub mod action;
pub mod block;
pub mod ids;
pub mod resource;

pub use action::{ActionArg, ActionArgError, ArgType, CustomAction};
pub use block::{BlockChange, BlockKind};
pub use ids::BlockId;
pub use resource::{BlockValue, OpenedResource, ReadData, ReadError};
