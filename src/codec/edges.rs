//! Edge container codec: the outs and ins record arrays, paginated
//! independently with the same scheme.
//!
//! Layout: metadata page `{first_edge, first_node, edge_count,
//! pages_per_direction}`, then the outs pages, then the ins pages, both
//! count-prefixed arrays of `{edge, source, other, edge_type}` records.

use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageCursor, PageReader, PageWriter};
use crate::codec::{items_per_page, page_count, COUNT_HDR};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{EdgeContainer, EdgeRecord};
use crate::types::{EdgeId, NodeId};

const EDGE_STRIDE: usize = 8 + 8 + 8 + 4;

/// Dumps the edge container to `path`.
pub fn dump(container: &EdgeContainer, path: &Path, cfg: &PartConfig) -> Result<()> {
    let per_page = items_per_page(cfg.page_size, COUNT_HDR, EDGE_STRIDE);
    let pages_per_direction = page_count(container.outs.len(), per_page);

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(container.first_edge.0)?;
    w.put_u64(container.first_node.0)?;
    w.put_u64(container.outs.len() as u64)?;
    w.put_u64(pages_per_direction as u64)?;
    w.next_page()?;

    for records in [&container.outs, &container.ins] {
        for chunk in records.chunks(per_page) {
            w.put_u32(chunk.len() as u32)?;
            for record in chunk {
                w.put_u64(record.edge.0)?;
                w.put_u64(record.source.0)?;
                w.put_u64(record.other.0)?;
                w.put_u32(record.edge_type.0)?;
            }
            w.next_page()?;
        }
    }

    w.finish()?;
    debug!(
        edges = container.outs.len(),
        pages_per_direction, "edges.dump"
    );
    Ok(())
}

/// Loads an edge container from `path`, resolving every edge-type ID.
pub fn load(path: &Path, metadata: &GraphMetadata, cfg: &PartConfig) -> Result<EdgeContainer> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let first_edge = EdgeId(c.get_u64()?);
    let first_node = NodeId(c.get_u64()?);
    let edge_count = c.get_u64()? as usize;
    let pages_per_direction = c.get_u64()? as usize;

    let per_page = items_per_page(cfg.page_size, COUNT_HDR, EDGE_STRIDE);
    if edge_count > pages_per_direction.saturating_mul(per_page) {
        return Err(PartError::corruption(
            "declared edge count exceeds page capacity",
        ));
    }

    let outs = read_direction(&mut r, metadata, pages_per_direction, edge_count, "outs")?;
    let ins = read_direction(&mut r, metadata, pages_per_direction, edge_count, "ins")?;

    debug!(edges = edge_count, "edges.load");
    Ok(EdgeContainer {
        first_edge,
        first_node,
        outs,
        ins,
    })
}

fn read_direction(
    r: &mut PageReader,
    metadata: &GraphMetadata,
    pages: usize,
    edge_count: usize,
    name: &str,
) -> Result<Vec<EdgeRecord>> {
    let mut records = Vec::with_capacity(edge_count);
    for _ in 0..pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            records.push(read_record(&mut c, metadata)?);
        }
    }
    if records.len() != edge_count {
        return Err(PartError::corruption(format!(
            "{name} pages hold {} records, metadata declares {edge_count}",
            records.len()
        )));
    }
    Ok(records)
}

fn read_record(c: &mut PageCursor<'_>, metadata: &GraphMetadata) -> Result<EdgeRecord> {
    let edge = EdgeId(c.get_u64()?);
    let source = NodeId(c.get_u64()?);
    let other = NodeId(c.get_u64()?);
    let edge_type = metadata.resolve_edge_type(c.get_u32()?)?;
    Ok(EdgeRecord {
        edge,
        source,
        other,
        edge_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EdgeTypeId;
    use tempfile::tempdir;

    fn sample_records(n: u64) -> (Vec<EdgeRecord>, Vec<EdgeRecord>) {
        let outs: Vec<EdgeRecord> = (0..n)
            .map(|i| EdgeRecord {
                edge: EdgeId(i),
                source: NodeId(i / 2),
                other: NodeId(i / 2 + 1),
                edge_type: EdgeTypeId((i % 2) as u32),
            })
            .collect();
        let mut ins: Vec<EdgeRecord> = outs
            .iter()
            .map(|r| EdgeRecord {
                edge: r.edge,
                source: r.other,
                other: r.source,
                edge_type: r.edge_type,
            })
            .collect();
        ins.sort_by_key(|r| (r.source, r.edge));
        (outs, ins)
    }

    #[test]
    fn round_trip_multi_page() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("edges");
        let mut meta = GraphMetadata::new();
        meta.add_edge_type("A");
        meta.add_edge_type("B");
        // small pages so both directions span several pages
        let cfg = PartConfig::default().page_size(128);

        let (outs, ins) = sample_records(50);
        let container = EdgeContainer {
            first_edge: EdgeId(0),
            first_node: NodeId(0),
            outs,
            ins,
        };
        dump(&container, &path, &cfg).expect("dump");
        let loaded = load(&path, &meta, &cfg).expect("load");
        assert_eq!(loaded, container);
    }

    #[test]
    fn unresolved_edge_type_fails_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("edges");
        let cfg = PartConfig::default();
        let (outs, ins) = sample_records(4);
        let container = EdgeContainer {
            first_edge: EdgeId(0),
            first_node: NodeId(0),
            outs,
            ins,
        };
        dump(&container, &path, &cfg).expect("dump");

        let empty_meta = GraphMetadata::new();
        assert!(matches!(
            load(&path, &empty_meta, &cfg),
            Err(PartError::Unresolved {
                kind: "edge type",
                ..
            })
        ));
    }
}
