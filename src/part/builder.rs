//! Bulk construction of a [`DataPart`].
//!
//! The builder accepts nodes, edges and property values in any order,
//! then sorts the edge arrays, computes label-set ranges, adjacency ranges,
//! label-set spans and property indexes in one pass at [`PartBuilder::build`].
//! Nodes added after the bulk segment via [`PartBuilder::add_patch_node`]
//! land in the patch segment of the edge indexer.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{
    DataPart, EdgeContainer, EdgeIndexer, EdgeRange, EdgeRecord, LabelSetIndexer, LabelSetRange,
    LabelSetRanges, NodeContainer, NodeEdgeData, PosRange, PropIndex, PropertyContainer,
    PropertyIndexer, Span,
};
use crate::types::{EdgeId, EdgeTypeId, LabelSet, LabelSetId, NodeId, PropTypeId, PropValue};

/// Accumulates a part's contents and materializes a [`DataPart`].
pub struct PartBuilder<'a> {
    metadata: &'a mut GraphMetadata,
    cfg: PartConfig,
    first_node: NodeId,
    first_edge: EdgeId,
    label_sets: Vec<LabelSetId>,
    patch_from: Option<usize>,
    edges: Vec<(EdgeId, NodeId, NodeId, EdgeTypeId)>,
    node_prop_values: BTreeMap<PropTypeId, BTreeMap<u64, PropValue>>,
    edge_prop_values: BTreeMap<PropTypeId, BTreeMap<u64, PropValue>>,
}

impl<'a> PartBuilder<'a> {
    /// Starts a part anchored at the given first IDs.
    pub fn new(
        metadata: &'a mut GraphMetadata,
        first_node: NodeId,
        first_edge: EdgeId,
        cfg: PartConfig,
    ) -> Self {
        Self {
            metadata,
            cfg,
            first_node,
            first_edge,
            label_sets: Vec::new(),
            patch_from: None,
            edges: Vec::new(),
            node_prop_values: BTreeMap::new(),
            edge_prop_values: BTreeMap::new(),
        }
    }

    /// Adds a bulk node, assigning the next dense ID. Bulk nodes must all be
    /// added before the first patch node.
    pub fn add_node(&mut self, labels: LabelSet) -> Result<NodeId> {
        if self.patch_from.is_some() {
            return Err(PartError::Invalid(
                "bulk nodes must precede patch nodes".into(),
            ));
        }
        Ok(self.push_node(labels))
    }

    /// Adds a patch node: a later incremental insertion that lands in the
    /// map-addressed segment of the edge indexer. Every patch node must end
    /// up with at least one edge.
    pub fn add_patch_node(&mut self, labels: LabelSet) -> NodeId {
        if self.patch_from.is_none() {
            self.patch_from = Some(self.label_sets.len());
        }
        self.push_node(labels)
    }

    fn push_node(&mut self, labels: LabelSet) -> NodeId {
        let id = NodeId(self.first_node.0 + self.label_sets.len() as u64);
        let set_id = self.metadata.intern_label_set(labels);
        self.label_sets.push(set_id);
        id
    }

    /// Adds an edge between two nodes of this part.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, edge_type: EdgeTypeId) -> EdgeId {
        let id = EdgeId(self.first_edge.0 + self.edges.len() as u64);
        self.edges.push((id, source, target, edge_type));
        id
    }

    /// Sets a node property value.
    pub fn set_node_prop(
        &mut self,
        node: NodeId,
        prop_type: PropTypeId,
        value: PropValue,
    ) -> Result<()> {
        self.check_prop_type(prop_type, &value)?;
        self.node_prop_values
            .entry(prop_type)
            .or_default()
            .insert(node.0, value);
        Ok(())
    }

    /// Sets an edge property value.
    pub fn set_edge_prop(
        &mut self,
        edge: EdgeId,
        prop_type: PropTypeId,
        value: PropValue,
    ) -> Result<()> {
        self.check_prop_type(prop_type, &value)?;
        self.edge_prop_values
            .entry(prop_type)
            .or_default()
            .insert(edge.0, value);
        Ok(())
    }

    fn check_prop_type(&self, prop_type: PropTypeId, value: &PropValue) -> Result<()> {
        let def = self
            .metadata
            .property_type(prop_type)
            .ok_or(PartError::Unresolved {
                kind: "property type",
                id: prop_type.0 as u64,
            })?;
        if def.value_type != value.value_type() {
            return Err(PartError::Invalid(format!(
                "property `{}` declared as {:?}, got {:?}",
                def.name,
                def.value_type,
                value.value_type()
            )));
        }
        Ok(())
    }

    /// Materializes the part, computing every derived structure.
    pub fn build(self) -> Result<DataPart> {
        let node_count = self.label_sets.len();
        let first_node = self.first_node;
        let in_part = |node: NodeId| {
            node.0 >= first_node.0 && node.0 < first_node.0 + node_count as u64
        };
        for &(id, source, target, _) in &self.edges {
            if !in_part(source) || !in_part(target) {
                return Err(PartError::Invalid(format!(
                    "edge {id} endpoint outside the part's node range"
                )));
            }
        }

        let nodes = NodeContainer {
            first_node,
            ranges: label_set_ranges(first_node, &self.label_sets),
            label_sets: self.label_sets,
        };

        let mut outs: Vec<EdgeRecord> = self
            .edges
            .iter()
            .map(|&(edge, source, target, edge_type)| EdgeRecord {
                edge,
                source,
                other: target,
                edge_type,
            })
            .collect();
        outs.sort_by_key(|r| (r.source, r.edge));
        let mut ins: Vec<EdgeRecord> = self
            .edges
            .iter()
            .map(|&(edge, source, target, edge_type)| EdgeRecord {
                edge,
                source: target,
                other: source,
                edge_type,
            })
            .collect();
        ins.sort_by_key(|r| (r.source, r.edge));
        let edges = EdgeContainer {
            first_edge: self.first_edge,
            first_node,
            outs,
            ins,
        };

        let patch_from = self.patch_from.unwrap_or(node_count);
        let patch_count = node_count - patch_from;
        let by_offset_out = ranges_by_node(&edges.outs, first_node, node_count);
        let by_offset_in = ranges_by_node(&edges.ins, first_node, node_count);
        let mut indexer_nodes = Vec::with_capacity(node_count);
        let mut patch_positions = FxHashMap::default();
        for offset in patch_from..node_count {
            let pos = indexer_nodes.len();
            patch_positions.insert(NodeId(first_node.0 + offset as u64), pos);
            indexer_nodes.push(NodeEdgeData {
                outs: by_offset_out[offset],
                ins: by_offset_in[offset],
            });
        }
        for offset in 0..patch_from {
            indexer_nodes.push(NodeEdgeData {
                outs: by_offset_out[offset],
                ins: by_offset_in[offset],
            });
        }
        for (&id, &pos) in &patch_positions {
            if indexer_nodes[pos].outs.is_empty() && indexer_nodes[pos].ins.is_empty() {
                return Err(PartError::Invalid(format!(
                    "patch node {id} must have at least one edge"
                )));
            }
        }

        let edge_indexer = EdgeIndexer {
            first_core_node: first_node,
            patch_count,
            patch_positions,
            out_indexers: label_set_spans(&edges.outs, &nodes),
            in_indexers: label_set_spans(&edges.ins, &nodes),
            nodes: indexer_nodes,
        };

        let mut node_props = BTreeMap::new();
        for (prop_type, values) in &self.node_prop_values {
            node_props.insert(
                *prop_type,
                build_container(self.metadata, *prop_type, values, &self.cfg)?,
            );
        }
        let mut edge_props = BTreeMap::new();
        for (prop_type, values) in &self.edge_prop_values {
            edge_props.insert(
                *prop_type,
                build_container(self.metadata, *prop_type, values, &self.cfg)?,
            );
        }

        let node_label_set = |id: u64| nodes.label_set_of(NodeId(id));
        let edge_label_set = |id: u64| {
            let offset = id.checked_sub(self.first_edge.0)? as usize;
            let &(_, source, _, _) = self.edges.get(offset)?;
            nodes.label_set_of(source)
        };
        let node_prop_indexer = build_prop_indexer(&node_props, node_label_set)?;
        let edge_prop_indexer = build_prop_indexer(&edge_props, edge_label_set)?;

        let part = DataPart {
            first_node,
            first_edge: self.first_edge,
            nodes,
            edges,
            edge_indexer,
            node_props,
            edge_props,
            node_prop_indexer,
            edge_prop_indexer,
        };
        part.validate()?;
        Ok(part)
    }
}

fn label_set_ranges(first_node: NodeId, label_sets: &[LabelSetId]) -> Vec<LabelSetRange> {
    let mut ranges: Vec<LabelSetRange> = Vec::new();
    for (offset, &set) in label_sets.iter().enumerate() {
        match ranges.last_mut() {
            Some(last) if last.label_set == set => last.count += 1,
            _ => ranges.push(LabelSetRange {
                label_set: set,
                first_node: NodeId(first_node.0 + offset as u64),
                count: 1,
            }),
        }
    }
    ranges
}

fn ranges_by_node(records: &[EdgeRecord], first_node: NodeId, node_count: usize) -> Vec<EdgeRange> {
    let mut ranges = vec![EdgeRange::default(); node_count];
    let mut i = 0;
    while i < records.len() {
        let source = records[i].source;
        let start = i;
        while i < records.len() && records[i].source == source {
            i += 1;
        }
        let offset = (source.0 - first_node.0) as usize;
        ranges[offset] = EdgeRange {
            first: start as u64,
            count: (i - start) as u64,
        };
    }
    ranges
}

fn label_set_spans(records: &[EdgeRecord], nodes: &NodeContainer) -> Vec<LabelSetIndexer> {
    let mut by_set: FxHashMap<LabelSetId, SmallVec<[Span; 4]>> = FxHashMap::default();
    let mut i = 0;
    while i < records.len() {
        let set = nodes
            .label_set_of(records[i].other)
            .expect("endpoints validated against the node range");
        let start = i;
        while i < records.len() && nodes.label_set_of(records[i].other) == Some(set) {
            i += 1;
        }
        by_set.entry(set).or_default().push(Span {
            offset: start as u64,
            count: (i - start) as u64,
        });
    }
    let mut indexers: Vec<LabelSetIndexer> = by_set
        .into_iter()
        .map(|(label_set, spans)| LabelSetIndexer { label_set, spans })
        .collect();
    indexers.sort_by_key(|ix| ix.label_set);
    indexers
}

fn build_container(
    metadata: &GraphMetadata,
    prop_type: PropTypeId,
    values: &BTreeMap<u64, PropValue>,
    cfg: &PartConfig,
) -> Result<PropertyContainer> {
    let def = metadata
        .property_type(prop_type)
        .ok_or(PartError::Unresolved {
            kind: "property type",
            id: prop_type.0 as u64,
        })?;
    let mut container = PropertyContainer::new(def.value_type, cfg.bucket_size);
    for (&id, value) in values {
        container.push(id, value)?;
    }
    Ok(container)
}

fn build_prop_indexer<F>(
    containers: &BTreeMap<PropTypeId, PropertyContainer>,
    label_set_of: F,
) -> Result<PropertyIndexer>
where
    F: Fn(u64) -> Option<LabelSetId>,
{
    let mut entries = Vec::new();
    for (&prop_type, container) in containers {
        let ids = container.ids();
        let mut by_set: BTreeMap<LabelSetId, Vec<PosRange>> = BTreeMap::new();
        let mut pos = 0usize;
        while pos < ids.len() {
            let set = label_set_of(ids[pos]).ok_or_else(|| {
                PartError::Invalid(format!(
                    "property entity {} outside the part's id range",
                    ids[pos]
                ))
            })?;
            let start = pos;
            while pos < ids.len() && label_set_of(ids[pos]) == Some(set) {
                pos += 1;
            }
            by_set.entry(set).or_default().push(PosRange {
                first_id: ids[start],
                first_pos: start as u64,
                count: (pos - start) as u64,
            });
        }
        if by_set.is_empty() {
            continue;
        }
        entries.push(PropIndex {
            prop_type,
            by_label_set: by_set
                .into_iter()
                .map(|(label_set, ranges)| LabelSetRanges { label_set, ranges })
                .collect(),
        });
    }
    Ok(PropertyIndexer { entries })
}
