//! In-memory model of a data part: a contiguous, immutable partition of the
//! graph holding a range of node and edge IDs plus their properties and
//! adjacency indexes.
//!
//! A part is built once (see [`PartBuilder`]), dumped and loaded by the
//! codecs under [`crate::codec`], and retired by compaction elsewhere.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{PartError, Result};
use crate::types::{EdgeId, EdgeTypeId, LabelSetId, NodeId, PropTypeId, PropValue, ValueType};

mod builder;

pub use builder::PartBuilder;

/// Contiguous run of nodes sharing one label-set, in the node range index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LabelSetRange {
    /// Label-set shared by every node in the run.
    pub label_set: LabelSetId,
    /// First node of the run.
    pub first_node: NodeId,
    /// Number of nodes in the run.
    pub count: u64,
}

/// Per-node label-set records plus the label-set range index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeContainer {
    /// First node ID owned by the part.
    pub first_node: NodeId,
    /// Label-set of each node, indexed by `id - first_node`.
    pub label_sets: Vec<LabelSetId>,
    /// Runs of equal label-sets covering the whole node range in order.
    pub ranges: Vec<LabelSetRange>,
}

impl NodeContainer {
    /// An empty container anchored at `first_node`.
    pub fn empty(first_node: NodeId) -> Self {
        Self {
            first_node,
            label_sets: Vec::new(),
            ranges: Vec::new(),
        }
    }

    /// Number of nodes in the part.
    pub fn len(&self) -> usize {
        self.label_sets.len()
    }

    /// Whether the part has no nodes.
    pub fn is_empty(&self) -> bool {
        self.label_sets.is_empty()
    }

    /// Label-set of a node, or `None` when the ID is outside the part.
    pub fn label_set_of(&self, node: NodeId) -> Option<LabelSetId> {
        let offset = node.0.checked_sub(self.first_node.0)? as usize;
        self.label_sets.get(offset).copied()
    }
}

/// One directed edge occurrence. `source` is the owning endpoint of the
/// array the record sits in (the source node in `outs`, the target node in
/// `ins`); `other` is the far endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Edge ID.
    pub edge: EdgeId,
    /// Owning endpoint.
    pub source: NodeId,
    /// Far endpoint.
    pub other: NodeId,
    /// Edge type.
    pub edge_type: EdgeTypeId,
}

/// Out- and in-edge record arrays, each globally sorted by owning endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeContainer {
    /// First edge ID owned by the part.
    pub first_edge: EdgeId,
    /// First node ID owned by the part.
    pub first_node: NodeId,
    /// Edge records sorted by source node.
    pub outs: Vec<EdgeRecord>,
    /// The same edges sorted by target node.
    pub ins: Vec<EdgeRecord>,
}

impl EdgeContainer {
    /// An empty container anchored at the given first IDs.
    pub fn empty(first_edge: EdgeId, first_node: NodeId) -> Self {
        Self {
            first_edge,
            first_node,
            outs: Vec::new(),
            ins: Vec::new(),
        }
    }

    /// Number of edges in the part.
    pub fn len(&self) -> usize {
        self.outs.len()
    }

    /// Whether the part has no edges.
    pub fn is_empty(&self) -> bool {
        self.outs.is_empty()
    }
}

/// Contiguous `(first, count)` slice of an edge record array.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeRange {
    /// Offset of the first record.
    pub first: u64,
    /// Number of records.
    pub count: u64,
}

impl EdgeRange {
    /// Whether the range holds no records.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// One past the last record.
    pub fn end(&self) -> u64 {
        self.first + self.count
    }
}

/// A node's slices into the out and in edge arrays.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeEdgeData {
    /// Slice of [`EdgeContainer::outs`] owned by the node.
    pub outs: EdgeRange,
    /// Slice of [`EdgeContainer::ins`] owned by the node.
    pub ins: EdgeRange,
}

/// Contiguous `(offset, count)` sub-range of an edge array whose records
/// share one label-set on the far endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    /// Offset into the edge array.
    pub offset: u64,
    /// Number of records in the span.
    pub count: u64,
}

/// All spans of one direction keyed by a single label-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSetIndexer {
    /// Label-set on the far endpoint of every spanned record.
    pub label_set: LabelSetId,
    /// Spans, in array order.
    pub spans: SmallVec<[Span; 4]>,
}

/// Direction selector for adjacency lookups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Outgoing edges.
    Out,
    /// Incoming edges.
    In,
}

/// Per-node adjacency ranges plus label-set-keyed spans over the edge
/// arrays.
///
/// The `nodes` array holds patch nodes first (array order is insertion
/// order, addressed through `patch_positions`), then core nodes (array order
/// is ID order, addressed by offset).
#[derive(Clone, Debug, Default)]
pub struct EdgeIndexer {
    /// First core node ID; core node `id` sits at array position
    /// `patch_count + (id - first_core_node)`.
    pub first_core_node: NodeId,
    /// Number of patch entries at the front of `nodes`.
    pub patch_count: usize,
    /// Adjacency ranges, patch segment first.
    pub nodes: Vec<NodeEdgeData>,
    /// Patch node ID to array position.
    pub patch_positions: FxHashMap<NodeId, usize>,
    /// Label-set spans over the out array, in label-set ID order.
    pub out_indexers: Vec<LabelSetIndexer>,
    /// Label-set spans over the in array, in label-set ID order.
    pub in_indexers: Vec<LabelSetIndexer>,
}

impl EdgeIndexer {
    /// An empty indexer anchored at `first_core_node`.
    pub fn empty(first_core_node: NodeId) -> Self {
        Self {
            first_core_node,
            ..Self::default()
        }
    }

    /// Number of core entries.
    pub fn core_count(&self) -> usize {
        self.nodes.len() - self.patch_count
    }

    /// Array position of a node's adjacency entry.
    pub fn position_of(&self, node: NodeId) -> Option<usize> {
        if let Some(offset) = node.0.checked_sub(self.first_core_node.0) {
            if (offset as usize) < self.core_count() {
                return Some(self.patch_count + offset as usize);
            }
        }
        self.patch_positions.get(&node).copied()
    }

    /// Adjacency ranges of a node, if the node is in the part.
    pub fn edges_of(&self, node: NodeId) -> Option<&NodeEdgeData> {
        self.position_of(node).map(|pos| &self.nodes[pos])
    }

    /// Spans of one direction for a label-set on the far endpoint.
    pub fn spans_for(&self, dir: Direction, label_set: LabelSetId) -> Option<&[Span]> {
        let indexers = match dir {
            Direction::Out => &self.out_indexers,
            Direction::In => &self.in_indexers,
        };
        indexers
            .binary_search_by_key(&label_set, |ix| ix.label_set)
            .ok()
            .map(|i| indexers[i].spans.as_slice())
    }
}

/// Append-only, ID-sorted column of fixed-width values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrivialProps<T> {
    /// Entity IDs, strictly increasing.
    pub ids: Vec<u64>,
    /// One value per ID.
    pub values: Vec<T>,
}

impl<T: Copy> TrivialProps<T> {
    /// An empty column.
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a value; IDs must arrive strictly increasing.
    pub fn push(&mut self, id: u64, value: T) -> Result<()> {
        if let Some(&last) = self.ids.last() {
            if id <= last {
                return Err(PartError::Invalid(format!(
                    "property id {id} not greater than previous {last}"
                )));
            }
        }
        self.ids.push(id);
        self.values.push(value);
        Ok(())
    }

    /// Value for an entity, via binary search over the ID column.
    pub fn get(&self, id: u64) -> Option<T> {
        let pos = self.ids.binary_search(&id).ok()?;
        Some(self.values[pos])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-string `(offset, len)` limit within a bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StrLimit {
    /// Byte offset of the payload within the bucket.
    pub offset: u32,
    /// Payload length in bytes.
    pub len: u32,
}

/// Fixed-size byte block of concatenated string payloads plus the ordered
/// limits naming them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringBucket {
    /// Raw payload block, always exactly the configured bucket size.
    pub bytes: Vec<u8>,
    /// Limits in append order.
    pub limits: Vec<StrLimit>,
}

impl StringBucket {
    fn new(bucket_size: usize) -> Self {
        Self {
            bytes: vec![0; bucket_size],
            limits: Vec::new(),
        }
    }

    fn used(&self) -> usize {
        self.limits
            .last()
            .map(|l| (l.offset + l.len) as usize)
            .unwrap_or(0)
    }
}

/// ID-sorted string column backed by fixed-size buckets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringProps {
    bucket_size: usize,
    /// Entity IDs, strictly increasing.
    pub ids: Vec<u64>,
    /// Buckets, filled in append order.
    pub buckets: Vec<StringBucket>,
    /// Per position: (bucket index, limit index).
    refs: Vec<(u32, u32)>,
}

impl StringProps {
    /// An empty column with the given bucket size.
    pub fn new(bucket_size: usize) -> Self {
        Self {
            bucket_size,
            ids: Vec::new(),
            buckets: Vec::new(),
            refs: Vec::new(),
        }
    }

    /// Bucket size this column was built with.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Appends a string; IDs must arrive strictly increasing and payloads
    /// must fit a single bucket.
    pub fn push(&mut self, id: u64, value: &str) -> Result<()> {
        if let Some(&last) = self.ids.last() {
            if id <= last {
                return Err(PartError::Invalid(format!(
                    "property id {id} not greater than previous {last}"
                )));
            }
        }
        let payload = value.as_bytes();
        if payload.len() > self.bucket_size {
            return Err(PartError::Invalid(format!(
                "string of {} bytes exceeds bucket size {}",
                payload.len(),
                self.bucket_size
            )));
        }
        let needs_new = match self.buckets.last() {
            Some(bucket) => bucket.used() + payload.len() > self.bucket_size,
            None => true,
        };
        if needs_new {
            self.buckets.push(StringBucket::new(self.bucket_size));
        }
        let bucket_index = self.buckets.len() - 1;
        let bucket = &mut self.buckets[bucket_index];
        let offset = bucket.used();
        bucket.bytes[offset..offset + payload.len()].copy_from_slice(payload);
        let limit_index = bucket.limits.len();
        bucket.limits.push(StrLimit {
            offset: offset as u32,
            len: payload.len() as u32,
        });
        self.ids.push(id);
        self.refs.push((bucket_index as u32, limit_index as u32));
        Ok(())
    }

    /// Value for an entity, via binary search over the ID column.
    pub fn get(&self, id: u64) -> Option<&str> {
        let pos = self.ids.binary_search(&id).ok()?;
        self.value_at(pos)
    }

    /// Value at a container position, in ID order.
    pub fn value_at(&self, pos: usize) -> Option<&str> {
        let &(bucket, limit) = self.refs.get(pos)?;
        let bucket = self.buckets.get(bucket as usize)?;
        let limit = bucket.limits.get(limit as usize)?;
        let start = limit.offset as usize;
        let slice = bucket.bytes.get(start..start + limit.len as usize)?;
        std::str::from_utf8(slice).ok()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Rebuilds the column from loaded buckets; limit order across buckets
    /// must match ID order.
    pub(crate) fn from_parts(
        bucket_size: usize,
        ids: Vec<u64>,
        buckets: Vec<StringBucket>,
    ) -> Result<Self> {
        let mut refs = Vec::with_capacity(ids.len());
        for (bi, bucket) in buckets.iter().enumerate() {
            if bucket.bytes.len() != bucket_size {
                return Err(PartError::corruption("bucket byte block has wrong size"));
            }
            for (li, limit) in bucket.limits.iter().enumerate() {
                let start = limit.offset as usize;
                let end = start + limit.len as usize;
                let slice = bucket
                    .bytes
                    .get(start..end)
                    .ok_or_else(|| PartError::corruption("string limit outside bucket"))?;
                std::str::from_utf8(slice)
                    .map_err(|_| PartError::corruption("string payload not valid UTF-8"))?;
                refs.push((bi as u32, li as u32));
            }
        }
        if refs.len() != ids.len() {
            return Err(PartError::corruption(format!(
                "bucket limits name {} strings, id column holds {}",
                refs.len(),
                ids.len()
            )));
        }
        Ok(Self {
            bucket_size,
            ids,
            buckets,
            refs,
        })
    }
}

/// Typed property container for one (property type, value type) pair.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyContainer {
    /// Boolean column.
    Bool(TrivialProps<bool>),
    /// Integer column.
    Int(TrivialProps<i64>),
    /// Floating-point column.
    Double(TrivialProps<f64>),
    /// String column.
    String(StringProps),
}

impl PropertyContainer {
    /// An empty container of the given value type.
    pub fn new(value_type: ValueType, bucket_size: usize) -> Self {
        match value_type {
            ValueType::Bool => PropertyContainer::Bool(TrivialProps::new()),
            ValueType::Int => PropertyContainer::Int(TrivialProps::new()),
            ValueType::Double => PropertyContainer::Double(TrivialProps::new()),
            ValueType::String => PropertyContainer::String(StringProps::new(bucket_size)),
        }
    }

    /// Value type of the container.
    pub fn value_type(&self) -> ValueType {
        match self {
            PropertyContainer::Bool(_) => ValueType::Bool,
            PropertyContainer::Int(_) => ValueType::Int,
            PropertyContainer::Double(_) => ValueType::Double,
            PropertyContainer::String(_) => ValueType::String,
        }
    }

    /// Sorted entity ID column.
    pub fn ids(&self) -> &[u64] {
        match self {
            PropertyContainer::Bool(c) => &c.ids,
            PropertyContainer::Int(c) => &c.ids,
            PropertyContainer::Double(c) => &c.ids,
            PropertyContainer::String(c) => &c.ids,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    /// Appends a value; the value must match the container's type and IDs
    /// must arrive strictly increasing.
    pub fn push(&mut self, id: u64, value: &PropValue) -> Result<()> {
        match (self, value) {
            (PropertyContainer::Bool(c), PropValue::Bool(v)) => c.push(id, *v),
            (PropertyContainer::Int(c), PropValue::Int(v)) => c.push(id, *v),
            (PropertyContainer::Double(c), PropValue::Double(v)) => c.push(id, *v),
            (PropertyContainer::String(c), PropValue::String(v)) => c.push(id, v),
            (container, value) => Err(PartError::Invalid(format!(
                "value type {:?} does not match container type {:?}",
                value.value_type(),
                container.value_type()
            ))),
        }
    }

    /// Value for an entity, if present.
    pub fn get(&self, id: u64) -> Option<PropValue> {
        match self {
            PropertyContainer::Bool(c) => c.get(id).map(PropValue::Bool),
            PropertyContainer::Int(c) => c.get(id).map(PropValue::Int),
            PropertyContainer::Double(c) => c.get(id).map(PropValue::Double),
            PropertyContainer::String(c) => c.get(id).map(|s| PropValue::String(s.to_owned())),
        }
    }
}

/// Sorted position range over a property container, restricted to entities
/// carrying one label-set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PosRange {
    /// First entity ID of the range.
    pub first_id: u64,
    /// Container position of that entity.
    pub first_pos: u64,
    /// Number of consecutive positions.
    pub count: u64,
}

/// Position ranges of one property container keyed by one label-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSetRanges {
    /// Label-set the ranges are restricted to.
    pub label_set: LabelSetId,
    /// Ranges sorted by `first_id`.
    pub ranges: Vec<PosRange>,
}

/// Per-label-set index of one property type's container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropIndex {
    /// Property type being indexed.
    pub prop_type: PropTypeId,
    /// Per-label-set range lists, in label-set ID order.
    pub by_label_set: Vec<LabelSetRanges>,
}

/// Index over all property containers of one entity kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyIndexer {
    /// One entry per indexed property type, in property-type ID order.
    pub entries: Vec<PropIndex>,
}

impl PropertyIndexer {
    /// Whether the indexer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ranges for one (property type, label-set) pair.
    pub fn ranges_for(&self, prop_type: PropTypeId, label_set: LabelSetId) -> Option<&[PosRange]> {
        let entry = self
            .entries
            .binary_search_by_key(&prop_type, |e| e.prop_type)
            .ok()
            .map(|i| &self.entries[i])?;
        entry
            .by_label_set
            .binary_search_by_key(&label_set, |r| r.label_set)
            .ok()
            .map(|i| entry.by_label_set[i].ranges.as_slice())
    }
}

/// A fully materialized graph partition.
#[derive(Clone, Debug, Default)]
pub struct DataPart {
    /// First node ID owned by the part.
    pub first_node: NodeId,
    /// First edge ID owned by the part.
    pub first_edge: EdgeId,
    /// Node records and label-set range index.
    pub nodes: NodeContainer,
    /// Out/in edge record arrays.
    pub edges: EdgeContainer,
    /// Adjacency ranges and label-set spans.
    pub edge_indexer: EdgeIndexer,
    /// Node property containers by property type.
    pub node_props: BTreeMap<PropTypeId, PropertyContainer>,
    /// Edge property containers by property type.
    pub edge_props: BTreeMap<PropTypeId, PropertyContainer>,
    /// Label-set index over node property containers.
    pub node_prop_indexer: PropertyIndexer,
    /// Label-set index over edge property containers.
    pub edge_prop_indexer: PropertyIndexer,
}

impl DataPart {
    /// An empty part anchored at the given first IDs.
    pub fn empty(first_node: NodeId, first_edge: EdgeId) -> Self {
        Self {
            first_node,
            first_edge,
            nodes: NodeContainer::empty(first_node),
            edges: EdgeContainer::empty(first_edge, first_node),
            edge_indexer: EdgeIndexer::empty(first_node),
            ..Self::default()
        }
    }

    /// Number of nodes in the part.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges in the part.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Checks the structural invariants the on-disk format relies on: dense
    /// node ranges, sorted edge arrays, adjacency ranges partitioning the
    /// edge arrays without gaps or overlap, and strictly increasing property
    /// ID columns.
    pub fn validate(&self) -> Result<()> {
        let mut next = self.first_node.0;
        for range in &self.nodes.ranges {
            if range.first_node.0 != next {
                return Err(PartError::corruption("label-set ranges leave a node gap"));
            }
            next += range.count;
        }
        if next - self.first_node.0 != self.nodes.len() as u64 {
            return Err(PartError::corruption(
                "label-set ranges do not cover the node range",
            ));
        }

        for (name, records) in [("outs", &self.edges.outs), ("ins", &self.edges.ins)] {
            if records.len() != self.edges.len() {
                return Err(PartError::corruption(format!(
                    "{name} array length differs from edge count"
                )));
            }
            for pair in records.windows(2) {
                if pair[1].source < pair[0].source {
                    return Err(PartError::corruption(format!("{name} array not sorted")));
                }
            }
        }

        if self.edge_indexer.nodes.len() != self.nodes.len() {
            return Err(PartError::corruption(
                "edge indexer entry count differs from node count",
            ));
        }
        let directions: [(&str, fn(&NodeEdgeData) -> EdgeRange); 2] =
            [("out", |n| n.outs), ("in", |n| n.ins)];
        for (name, range_of) in directions {
            let mut ranges: Vec<EdgeRange> = self
                .edge_indexer
                .nodes
                .iter()
                .map(range_of)
                .filter(|r| !r.is_empty())
                .collect();
            ranges.sort_by_key(|r| r.first);
            let mut cursor = 0u64;
            for range in &ranges {
                if range.first != cursor {
                    return Err(PartError::corruption(format!(
                        "{name} ranges leave a gap or overlap at offset {cursor}"
                    )));
                }
                cursor = range.end();
            }
            if cursor != self.edges.len() as u64 {
                return Err(PartError::corruption(format!(
                    "{name} ranges cover {cursor} records, expected {}",
                    self.edges.len()
                )));
            }
        }

        for props in self.node_props.values().chain(self.edge_props.values()) {
            let ids = props.ids();
            for pair in ids.windows(2) {
                if pair[1] <= pair[0] {
                    return Err(PartError::corruption(
                        "property id column not strictly increasing",
                    ));
                }
            }
        }
        Ok(())
    }
}
