//! Identifier newtypes and value primitives shared by the whole layer.

use std::fmt;

use crate::error::{PartError, Result};

/// Dense node identifier. `id - first_node` of the owning part is always a
/// valid array offset.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct NodeId(pub u64);

/// Dense edge identifier, same offset rule as [`NodeId`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct EdgeId(pub u64);

/// Identifier of a single node label.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LabelId(pub u32);

/// Identifier of an edge type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct EdgeTypeId(pub u32);

/// Identifier of a property type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PropTypeId(pub u32);

/// Identifier of an interned label-set.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct LabelSetId(pub u32);

/// Maximum number of distinct labels a graph may declare; bounded by the
/// fixed-width bitset representation of [`LabelSet`].
pub const MAX_LABELS: usize = 64;

/// Immutable fixed-width bitset of label IDs assigned to a node at creation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct LabelSet(u64);

impl LabelSet {
    /// The label-set with no labels.
    pub const EMPTY: LabelSet = LabelSet(0);

    /// Builds a label-set from the given labels.
    pub fn new<I: IntoIterator<Item = LabelId>>(labels: I) -> Self {
        let mut set = LabelSet::EMPTY;
        for label in labels {
            set.insert(label);
        }
        set
    }

    /// Reconstructs the set from its raw bit representation.
    pub fn from_bits(bits: u64) -> Self {
        LabelSet(bits)
    }

    /// Raw bit representation, as stored on disk.
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Adds a label to the set.
    pub fn insert(&mut self, label: LabelId) {
        debug_assert!((label.0 as usize) < MAX_LABELS, "label id out of range");
        self.0 |= 1u64 << label.0;
    }

    /// Whether the set carries the given label.
    pub fn contains(&self, label: LabelId) -> bool {
        (label.0 as usize) < MAX_LABELS && self.0 & (1u64 << label.0) != 0
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the label IDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = LabelId> + '_ {
        let bits = self.0;
        (0..MAX_LABELS as u32).filter_map(move |i| (bits & (1u64 << i) != 0).then_some(LabelId(i)))
    }
}

/// On-disk tag for the value type of a property container.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ValueType {
    /// Single-byte boolean.
    Bool = 1,
    /// 64-bit signed integer.
    Int = 2,
    /// 64-bit IEEE float.
    Double = 3,
    /// Variable-length UTF-8 string, stored in fixed-size buckets.
    String = 4,
}

impl ValueType {
    /// The tag byte written to disk.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Fixed on-disk stride of one value; strings have no fixed stride.
    pub const fn stride(self) -> Option<usize> {
        match self {
            ValueType::Bool => Some(1),
            ValueType::Int | ValueType::Double => Some(8),
            ValueType::String => None,
        }
    }

    /// Decodes a tag byte read from disk.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(ValueType::Bool),
            2 => Ok(ValueType::Int),
            3 => Ok(ValueType::Double),
            4 => Ok(ValueType::String),
            other => Err(PartError::corruption(format!(
                "unknown value type tag: 0x{other:02X}"
            ))),
        }
    }
}

/// A single property value, as handed to and returned by containers.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Double(f64),
    /// String value.
    String(String),
}

impl PropValue {
    /// The container value type this value belongs to.
    pub fn value_type(&self) -> ValueType {
        match self {
            PropValue::Bool(_) => ValueType::Bool,
            PropValue::Int(_) => ValueType::Int,
            PropValue::Double(_) => ValueType::Double,
            PropValue::String(_) => ValueType::String,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LabelSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PropTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_set_insert_and_contains() {
        let mut set = LabelSet::EMPTY;
        assert!(set.is_empty());
        set.insert(LabelId(0));
        set.insert(LabelId(63));
        assert!(set.contains(LabelId(0)));
        assert!(set.contains(LabelId(63)));
        assert!(!set.contains(LabelId(5)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn label_set_iter_ascending() {
        let set = LabelSet::new([LabelId(7), LabelId(2), LabelId(40)]);
        let ids: Vec<u32> = set.iter().map(|l| l.0).collect();
        assert_eq!(ids, vec![2, 7, 40]);
    }

    #[test]
    fn label_set_bits_round_trip() {
        let set = LabelSet::new([LabelId(1), LabelId(33)]);
        assert_eq!(LabelSet::from_bits(set.bits()), set);
    }

    #[test]
    fn value_type_tag_round_trip() {
        for vt in [
            ValueType::Bool,
            ValueType::Int,
            ValueType::Double,
            ValueType::String,
        ] {
            assert_eq!(ValueType::from_u8(vt.as_u8()).unwrap(), vt);
        }
        assert!(ValueType::from_u8(0).is_err());
        assert!(ValueType::from_u8(9).is_err());
    }
}
