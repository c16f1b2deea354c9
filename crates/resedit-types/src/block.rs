//! Block kinds and change entries.
//!
//! The backend tags every block with its class chain (`block_class_mro`),
//! e.g. `"Nfs1Angle8__IntegerBlock__DataBlock"`. [`BlockKind`] is the small
//! set of editor variants that chain resolves to; the most specific class
//! that names a known kind wins.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::ids::BlockId;
use crate::resource::BlockValue;

/// Which editor variant renders a block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockKind {
    /// Fixed-width integer.
    Integer,
    /// Fixed-point or floating number.
    Decimal,
    Boolean,
    /// Text of any encoding.
    String,
    /// Integer with named values.
    Enum,
    /// Raw byte blob.
    Bytes,
    /// Named fields, each a block.
    Compound,
    /// Homogeneous list of blocks.
    Array,
    #[default]
    Unknown,
}

impl BlockKind {
    /// Resolve a single backend class name.
    pub fn from_class_name(name: &str) -> Option<Self> {
        let kind = match name {
            "IntegerBlock" => Self::Integer,
            "DecimalBlock" | "RationalNumber" => Self::Decimal,
            "BoolBlock" => Self::Boolean,
            "Utf8Block" | "StringBlock" => Self::String,
            "EnumByteBlock" | "EnumLookupDelegateBlock" => Self::Enum,
            "BytesBlock" => Self::Bytes,
            "CompoundBlock" => Self::Compound,
            "ArrayBlock" => Self::Array,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolve a `__`-joined class chain, most specific class first.
    pub fn from_class_chain(mro: &str) -> Self {
        mro.split("__")
            .find_map(Self::from_class_name)
            .unwrap_or_default()
    }

    /// Kinds whose value is a container of nested blocks.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Compound | Self::Array)
    }
}

/// One entry of a change set sent to `save_file` and friends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockChange {
    pub id: BlockId,
    pub value: BlockValue,
}

impl BlockChange {
    pub fn new(id: impl Into<BlockId>, value: BlockValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_most_specific_known_class_wins() {
        assert_eq!(
            BlockKind::from_class_chain("Nfs1Angle8__AngleBlock__IntegerBlock__DataBlock"),
            BlockKind::Integer
        );
        assert_eq!(
            BlockKind::from_class_chain("RationalNumber__IntegerBlock__DataBlock"),
            BlockKind::Decimal
        );
        assert_eq!(
            BlockKind::from_class_chain("ShpiBlock__CompoundBlock__DataBlock"),
            BlockKind::Compound
        );
    }

    #[test]
    fn test_unknown_chain() {
        assert_eq!(BlockKind::from_class_chain("DataBlock"), BlockKind::Unknown);
        assert_eq!(BlockKind::from_class_chain(""), BlockKind::Unknown);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(BlockKind::Compound.as_ref(), "compound");
        assert_eq!("array".parse::<BlockKind>().unwrap(), BlockKind::Array);
        assert!(BlockKind::Array.is_container());
        assert!(!BlockKind::Integer.is_container());
    }

    #[test]
    fn test_change_wire_shape() {
        let change = BlockChange::new("/tmp/a.bin__b1", json!(1));
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"id": "/tmp/a.bin__b1", "value": 1})
        );
    }
}
