//! Persistence layer for immutable graph partitions.
//!
//! A [`DataPart`] holds a dense range of node and edge IDs together with
//! their label-sets, adjacency indexes and property columns. Parts are
//! assembled once through [`PartBuilder`], dumped to a directory of
//! fixed-page binary files with [`dump_part`], and read back with
//! [`load_part`]. The shared lookup tables (labels, edge types, property
//! types, interned label-sets) live in [`GraphMetadata`] and have their own
//! file, written by [`dump_metadata`] and read by [`load_metadata`].
//!
//! ```no_run
//! use graphpart::{
//!     dump_part, load_part, EdgeId, GraphMetadata, LabelSet, NodeId,
//!     PartBuilder, PartConfig,
//! };
//!
//! # fn main() -> graphpart::Result<()> {
//! let mut metadata = GraphMetadata::default();
//! let person = metadata.add_label("Person")?;
//! let knows = metadata.add_edge_type("KNOWS");
//!
//! let cfg = PartConfig::default();
//! let mut builder = PartBuilder::new(&mut metadata, NodeId(0), EdgeId(0), cfg);
//! let alice = builder.add_node(LabelSet::new([person]))?;
//! let bob = builder.add_node(LabelSet::new([person]))?;
//! builder.add_edge(alice, bob, knows);
//! let part = builder.build()?;
//!
//! dump_part(&part, "graph/part-0".as_ref(), &cfg)?;
//! let reloaded = load_part("graph/part-0".as_ref(), &metadata, &cfg)?;
//! assert_eq!(reloaded.node_count(), 2);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod metadata;
pub mod part;
pub mod types;

pub use codec::{dump_metadata, dump_part, load_metadata, load_part};
pub use config::{PartConfig, DEFAULT_BUCKET_SIZE, DEFAULT_PAGE_SIZE};
pub use error::{PartError, Result};
pub use metadata::{GraphMetadata, PropTypeDef};
pub use part::{
    DataPart, Direction, EdgeContainer, EdgeIndexer, NodeContainer, PartBuilder,
    PropertyContainer, PropertyIndexer,
};
pub use types::{
    EdgeId, EdgeTypeId, LabelId, LabelSet, LabelSetId, NodeId, PropTypeId, PropValue, ValueType,
};
