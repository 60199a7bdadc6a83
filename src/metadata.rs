//! Graph-wide name tables: labels, edge types, property types and interned
//! label-sets.
//!
//! Every ID written into a part file resolves against these tables, so the
//! metadata must be loaded before any part. Loaders treat an ID absent from
//! its table as a metadata/part mismatch and abort.

use rustc_hash::FxHashMap;

use crate::error::{PartError, Result};
use crate::types::{EdgeTypeId, LabelId, LabelSet, LabelSetId, PropTypeId, ValueType, MAX_LABELS};

/// Declared property type: its name and the value type of its containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropTypeDef {
    /// Property name, unique across the graph.
    pub name: String,
    /// Value type every container of this property carries.
    pub value_type: ValueType,
}

/// Read-mostly resolution tables shared by all parts of a graph.
#[derive(Clone, Debug, Default)]
pub struct GraphMetadata {
    labels: Vec<String>,
    label_ids: FxHashMap<String, LabelId>,
    edge_types: Vec<String>,
    edge_type_ids: FxHashMap<String, EdgeTypeId>,
    prop_types: Vec<PropTypeDef>,
    prop_type_ids: FxHashMap<String, PropTypeId>,
    label_sets: Vec<LabelSet>,
    label_set_ids: FxHashMap<LabelSet, LabelSetId>,
}

impl GraphMetadata {
    /// Creates empty metadata tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a label, returning the existing ID if the name is known.
    pub fn add_label(&mut self, name: &str) -> Result<LabelId> {
        if let Some(&id) = self.label_ids.get(name) {
            return Ok(id);
        }
        if self.labels.len() >= MAX_LABELS {
            return Err(PartError::Invalid(format!(
                "label table full ({MAX_LABELS} labels)"
            )));
        }
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(name.to_owned());
        self.label_ids.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Registers an edge type, returning the existing ID if the name is known.
    pub fn add_edge_type(&mut self, name: &str) -> EdgeTypeId {
        if let Some(&id) = self.edge_type_ids.get(name) {
            return id;
        }
        let id = EdgeTypeId(self.edge_types.len() as u32);
        self.edge_types.push(name.to_owned());
        self.edge_type_ids.insert(name.to_owned(), id);
        id
    }

    /// Registers a property type. Re-registering the same name with a
    /// different value type is an error.
    pub fn add_property_type(&mut self, name: &str, value_type: ValueType) -> Result<PropTypeId> {
        if let Some(&id) = self.prop_type_ids.get(name) {
            let existing = &self.prop_types[id.0 as usize];
            if existing.value_type != value_type {
                return Err(PartError::Invalid(format!(
                    "property type `{name}` already declared with a different value type"
                )));
            }
            return Ok(id);
        }
        let id = PropTypeId(self.prop_types.len() as u32);
        self.prop_types.push(PropTypeDef {
            name: name.to_owned(),
            value_type,
        });
        self.prop_type_ids.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Interns a label-set, returning its stable ID.
    pub fn intern_label_set(&mut self, set: LabelSet) -> LabelSetId {
        if let Some(&id) = self.label_set_ids.get(&set) {
            return id;
        }
        let id = LabelSetId(self.label_sets.len() as u32);
        self.label_sets.push(set);
        self.label_set_ids.insert(set, id);
        id
    }

    /// Name of a label, if declared.
    pub fn label_name(&self, id: LabelId) -> Option<&str> {
        self.labels.get(id.0 as usize).map(String::as_str)
    }

    /// ID of a label by name.
    pub fn label_id(&self, name: &str) -> Option<LabelId> {
        self.label_ids.get(name).copied()
    }

    /// Name of an edge type, if declared.
    pub fn edge_type_name(&self, id: EdgeTypeId) -> Option<&str> {
        self.edge_types.get(id.0 as usize).map(String::as_str)
    }

    /// ID of an edge type by name.
    pub fn edge_type_id(&self, name: &str) -> Option<EdgeTypeId> {
        self.edge_type_ids.get(name).copied()
    }

    /// Declared property type, if any.
    pub fn property_type(&self, id: PropTypeId) -> Option<&PropTypeDef> {
        self.prop_types.get(id.0 as usize)
    }

    /// ID of a property type by name.
    pub fn property_type_id(&self, name: &str) -> Option<PropTypeId> {
        self.prop_type_ids.get(name).copied()
    }

    /// The bitset behind an interned label-set ID.
    pub fn label_set(&self, id: LabelSetId) -> Option<LabelSet> {
        self.label_sets.get(id.0 as usize).copied()
    }

    /// The ID of an already-interned label-set.
    pub fn label_set_id(&self, set: LabelSet) -> Option<LabelSetId> {
        self.label_set_ids.get(&set).copied()
    }

    /// Declared labels, in ID order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Declared edge types, in ID order.
    pub fn edge_types(&self) -> &[String] {
        &self.edge_types
    }

    /// Declared property types, in ID order.
    pub fn property_types(&self) -> &[PropTypeDef] {
        &self.prop_types
    }

    /// Interned label-sets, in ID order.
    pub fn label_sets(&self) -> &[LabelSet] {
        &self.label_sets
    }

    /// Validates a raw label-set ID read from disk.
    pub fn resolve_label_set(&self, raw: u32) -> Result<LabelSetId> {
        if (raw as usize) < self.label_sets.len() {
            Ok(LabelSetId(raw))
        } else {
            Err(PartError::Unresolved {
                kind: "label-set",
                id: raw as u64,
            })
        }
    }

    /// Validates a raw edge-type ID read from disk.
    pub fn resolve_edge_type(&self, raw: u32) -> Result<EdgeTypeId> {
        if (raw as usize) < self.edge_types.len() {
            Ok(EdgeTypeId(raw))
        } else {
            Err(PartError::Unresolved {
                kind: "edge type",
                id: raw as u64,
            })
        }
    }

    /// Validates a raw property-type ID read from disk.
    pub fn resolve_property_type(&self, raw: u32) -> Result<PropTypeId> {
        if (raw as usize) < self.prop_types.len() {
            Ok(PropTypeId(raw))
        } else {
            Err(PartError::Unresolved {
                kind: "property type",
                id: raw as u64,
            })
        }
    }

    /// Rebuilds the tables from loaded rows; used by the metadata codec.
    pub(crate) fn from_parts(
        labels: Vec<String>,
        edge_types: Vec<String>,
        prop_types: Vec<PropTypeDef>,
        label_sets: Vec<LabelSet>,
    ) -> Result<Self> {
        if labels.len() > MAX_LABELS {
            return Err(PartError::corruption(format!(
                "label table holds {} entries, maximum is {MAX_LABELS}",
                labels.len()
            )));
        }
        let mut meta = GraphMetadata::default();
        for (i, name) in labels.iter().enumerate() {
            if meta.label_ids.insert(name.clone(), LabelId(i as u32)).is_some() {
                return Err(PartError::corruption(format!("duplicate label `{name}`")));
            }
        }
        for (i, name) in edge_types.iter().enumerate() {
            if meta
                .edge_type_ids
                .insert(name.clone(), EdgeTypeId(i as u32))
                .is_some()
            {
                return Err(PartError::corruption(format!("duplicate edge type `{name}`")));
            }
        }
        for (i, def) in prop_types.iter().enumerate() {
            if meta
                .prop_type_ids
                .insert(def.name.clone(), PropTypeId(i as u32))
                .is_some()
            {
                return Err(PartError::corruption(format!(
                    "duplicate property type `{}`",
                    def.name
                )));
            }
        }
        for (i, set) in label_sets.iter().enumerate() {
            if meta.label_set_ids.insert(*set, LabelSetId(i as u32)).is_some() {
                return Err(PartError::corruption("duplicate label-set entry"));
            }
        }
        meta.labels = labels;
        meta.edge_types = edge_types;
        meta.prop_types = prop_types;
        meta.label_sets = label_sets;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LabelSet;

    #[test]
    fn add_label_is_idempotent() {
        let mut meta = GraphMetadata::new();
        let a = meta.add_label("Person").unwrap();
        let b = meta.add_label("Person").unwrap();
        assert_eq!(a, b);
        assert_eq!(meta.label_name(a), Some("Person"));
    }

    #[test]
    fn property_type_value_type_conflict() {
        let mut meta = GraphMetadata::new();
        meta.add_property_type("age", ValueType::Int).unwrap();
        assert!(meta.add_property_type("age", ValueType::Double).is_err());
        assert!(meta.add_property_type("age", ValueType::Int).is_ok());
    }

    #[test]
    fn label_set_interning() {
        let mut meta = GraphMetadata::new();
        let a = meta.add_label("A").unwrap();
        let b = meta.add_label("B").unwrap();
        let ab = meta.intern_label_set(LabelSet::new([a, b]));
        let ab2 = meta.intern_label_set(LabelSet::new([b, a]));
        assert_eq!(ab, ab2);
        assert!(meta.resolve_label_set(ab.0).is_ok());
        assert!(matches!(
            meta.resolve_label_set(99),
            Err(PartError::Unresolved { kind: "label-set", .. })
        ));
    }
}
