//! Part directory orchestration.
//!
//! A part dumps to a directory of fixed-page files: `info` always, the
//! structural files (`nodes`, `edges`, `edge-indexer`) when the part has
//! nodes or edges, one `node-props-<id>` / `edge-props-<id>` file per
//! non-empty property container, and the two property indexer files when
//! non-empty. Loading mirrors this: absent files substitute empty
//! structures, and property files are discovered by listing the directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageReader, PageWriter};
use crate::codec::{
    edge_indexer, edges, nodes, prop_indexer, props, EDGES_FILE, EDGE_INDEXER_FILE,
    EDGE_PROPS_PREFIX, EDGE_PROP_INDEXER_FILE, INFO_FILE, NODES_FILE, NODE_PROPS_PREFIX,
    NODE_PROP_INDEXER_FILE,
};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{
    DataPart, EdgeContainer, EdgeIndexer, NodeContainer, PropertyContainer, PropertyIndexer,
};
use crate::types::{EdgeId, NodeId, PropTypeId};

/// Dumps a part to a fresh directory at `dir`.
///
/// The directory must not exist; a part is immutable once written and is
/// never dumped over an existing one.
pub fn dump_part(part: &DataPart, dir: &Path, cfg: &PartConfig) -> Result<()> {
    cfg.validate()?;
    if dir.exists() {
        return Err(PartError::AlreadyExists(dir.to_path_buf()));
    }
    fs::create_dir_all(dir)?;

    dump_info(part, &dir.join(INFO_FILE), cfg).map_err(|e| e.in_file(INFO_FILE))?;
    if !part.nodes.is_empty() {
        nodes::dump(&part.nodes, &dir.join(NODES_FILE), cfg)
            .map_err(|e| e.in_file(NODES_FILE))?;
    }
    if !part.edges.is_empty() {
        edges::dump(&part.edges, &dir.join(EDGES_FILE), cfg)
            .map_err(|e| e.in_file(EDGES_FILE))?;
        edge_indexer::dump(&part.edge_indexer, &dir.join(EDGE_INDEXER_FILE), cfg)
            .map_err(|e| e.in_file(EDGE_INDEXER_FILE))?;
    }

    dump_prop_files(&part.node_props, NODE_PROPS_PREFIX, dir, cfg)?;
    dump_prop_files(&part.edge_props, EDGE_PROPS_PREFIX, dir, cfg)?;
    if !part.node_prop_indexer.is_empty() {
        prop_indexer::dump(&part.node_prop_indexer, &dir.join(NODE_PROP_INDEXER_FILE), cfg)
            .map_err(|e| e.in_file(NODE_PROP_INDEXER_FILE))?;
    }
    if !part.edge_prop_indexer.is_empty() {
        prop_indexer::dump(&part.edge_prop_indexer, &dir.join(EDGE_PROP_INDEXER_FILE), cfg)
            .map_err(|e| e.in_file(EDGE_PROP_INDEXER_FILE))?;
    }

    debug!(
        dir = %dir.display(),
        nodes = part.node_count(),
        edges = part.edge_count(),
        "part.dump"
    );
    Ok(())
}

/// Loads a part from the directory at `dir`.
pub fn load_part(dir: &Path, metadata: &GraphMetadata, cfg: &PartConfig) -> Result<DataPart> {
    cfg.validate()?;
    if !dir.is_dir() {
        return Err(PartError::DoesNotExist(dir.to_path_buf()));
    }

    let (first_node, first_edge, node_count, edge_count) =
        load_info(&dir.join(INFO_FILE), cfg).map_err(|e| e.in_file(INFO_FILE))?;

    let nodes = if node_count > 0 {
        nodes::load(&dir.join(NODES_FILE), metadata, cfg).map_err(|e| e.in_file(NODES_FILE))?
    } else {
        NodeContainer::empty(first_node)
    };
    let (edges, edge_indexer) = if edge_count > 0 {
        let edges =
            edges::load(&dir.join(EDGES_FILE), metadata, cfg).map_err(|e| e.in_file(EDGES_FILE))?;
        let indexer = edge_indexer::load(&dir.join(EDGE_INDEXER_FILE), &edges, metadata, cfg)
            .map_err(|e| e.in_file(EDGE_INDEXER_FILE))?;
        (edges, indexer)
    } else {
        // a part of isolated nodes still indexes one empty entry per node
        let mut indexer = EdgeIndexer::empty(first_node);
        indexer.nodes = vec![Default::default(); nodes.len()];
        (EdgeContainer::empty(first_edge, first_node), indexer)
    };

    let node_props = load_prop_files(dir, NODE_PROPS_PREFIX, metadata, cfg)?;
    let edge_props = load_prop_files(dir, EDGE_PROPS_PREFIX, metadata, cfg)?;
    let node_prop_indexer = load_indexer(&dir.join(NODE_PROP_INDEXER_FILE), metadata, cfg)
        .map_err(|e| e.in_file(NODE_PROP_INDEXER_FILE))?;
    let edge_prop_indexer = load_indexer(&dir.join(EDGE_PROP_INDEXER_FILE), metadata, cfg)
        .map_err(|e| e.in_file(EDGE_PROP_INDEXER_FILE))?;

    let part = DataPart {
        first_node,
        first_edge,
        nodes,
        edges,
        edge_indexer,
        node_props,
        edge_props,
        node_prop_indexer,
        edge_prop_indexer,
    };
    if part.node_count() != node_count || part.edge_count() != edge_count {
        return Err(PartError::corruption(format!(
            "info declares {node_count} nodes and {edge_count} edges, \
             loaded {} and {}",
            part.node_count(),
            part.edge_count()
        )));
    }

    debug!(
        dir = %dir.display(),
        nodes = part.node_count(),
        edges = part.edge_count(),
        "part.load"
    );
    Ok(part)
}

fn dump_info(part: &DataPart, path: &Path, cfg: &PartConfig) -> Result<()> {
    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(part.first_node.0)?;
    w.put_u64(part.first_edge.0)?;
    w.put_u64(part.node_count() as u64)?;
    w.put_u64(part.edge_count() as u64)?;
    w.finish()
}

fn load_info(path: &Path, cfg: &PartConfig) -> Result<(NodeId, EdgeId, usize, usize)> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let first_node = NodeId(c.get_u64()?);
    let first_edge = EdgeId(c.get_u64()?);
    let node_count = c.get_u64()? as usize;
    let edge_count = c.get_u64()? as usize;
    Ok((first_node, first_edge, node_count, edge_count))
}

fn dump_prop_files(
    containers: &BTreeMap<PropTypeId, PropertyContainer>,
    prefix: &str,
    dir: &Path,
    cfg: &PartConfig,
) -> Result<()> {
    for (&prop_type, container) in containers {
        if container.is_empty() {
            continue;
        }
        let name = format!("{prefix}{}", prop_type.0);
        props::dump(container, &dir.join(&name), cfg).map_err(|e| e.in_file(name))?;
    }
    Ok(())
}

fn load_prop_files(
    dir: &Path,
    prefix: &str,
    metadata: &GraphMetadata,
    cfg: &PartConfig,
) -> Result<BTreeMap<PropTypeId, PropertyContainer>> {
    let mut containers = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(raw) = name.strip_prefix(prefix) else {
            continue;
        };
        let Ok(id) = raw.parse::<u32>() else {
            return Err(PartError::corruption(format!(
                "malformed property file name `{name}`"
            )));
        };
        let prop_type = PropTypeId(id);
        let def = metadata
            .property_type(prop_type)
            .ok_or(PartError::Unresolved {
                kind: "property type",
                id: id as u64,
            })?;
        let container = props::load(&entry.path(), def.value_type, cfg)
            .map_err(|e| e.in_file(name.to_owned()))?;
        containers.insert(prop_type, container);
    }
    Ok(containers)
}

fn load_indexer(
    path: &Path,
    metadata: &GraphMetadata,
    cfg: &PartConfig,
) -> Result<PropertyIndexer> {
    if !path.exists() {
        return Ok(PropertyIndexer::default());
    }
    prop_indexer::load(path, metadata, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_part_round_trip() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("part-0");
        let cfg = PartConfig::default();
        let md = GraphMetadata::default();

        let part = DataPart::empty(NodeId(0), EdgeId(0));
        dump_part(&part, &path, &cfg).expect("dump");
        let loaded = load_part(&path, &md, &cfg).expect("load");
        assert_eq!(loaded.node_count(), 0);
        assert_eq!(loaded.edge_count(), 0);
        assert_eq!(loaded.first_node, NodeId(0));
    }

    #[test]
    fn dump_refuses_existing_directory() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("part-0");
        fs::create_dir(&path).expect("mkdir");

        let part = DataPart::empty(NodeId(0), EdgeId(0));
        let err = dump_part(&part, &path, &PartConfig::default()).unwrap_err();
        assert!(matches!(err, PartError::AlreadyExists(_)));
        // the existing directory is left untouched
        assert_eq!(fs::read_dir(&path).expect("read dir").count(), 0);
    }

    #[test]
    fn load_missing_directory_fails() {
        let dir = tempdir().expect("temp dir");
        let err = load_part(
            &dir.path().join("absent"),
            &GraphMetadata::default(),
            &PartConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PartError::DoesNotExist(_)));
    }

    #[test]
    fn errors_carry_the_file_name() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("part-0");
        let cfg = PartConfig::default();

        let part = DataPart::empty(NodeId(0), EdgeId(0));
        dump_part(&part, &path, &cfg).expect("dump");
        fs::write(path.join(INFO_FILE), b"junk").expect("truncate info");

        let err = load_part(&path, &GraphMetadata::default(), &cfg).unwrap_err();
        match err {
            PartError::File { name, .. } => assert_eq!(name, INFO_FILE),
            other => panic!("unexpected error: {other}"),
        }
    }
}
