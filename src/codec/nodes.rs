//! Node container codec: label-set range index plus per-node label-set
//! records.
//!
//! Layout: metadata page `{first_node, node_count, range_count,
//! record_page_count, range_page_count}`, then count-prefixed pages of
//! `{labelset_id, first_node, count}` range entries, then count-prefixed
//! pages of per-node label-set IDs.

use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageReader, PageWriter};
use crate::codec::{items_per_page, page_count, COUNT_HDR};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{LabelSetRange, NodeContainer};
use crate::types::NodeId;

const RANGE_STRIDE: usize = 4 + 8 + 8;
const RECORD_STRIDE: usize = 4;

/// Dumps the node container to `path`.
pub fn dump(container: &NodeContainer, path: &Path, cfg: &PartConfig) -> Result<()> {
    let range_per_page = items_per_page(cfg.page_size, COUNT_HDR, RANGE_STRIDE);
    let record_per_page = items_per_page(cfg.page_size, COUNT_HDR, RECORD_STRIDE);
    let range_pages = page_count(container.ranges.len(), range_per_page);
    let record_pages = page_count(container.label_sets.len(), record_per_page);

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(container.first_node.0)?;
    w.put_u64(container.label_sets.len() as u64)?;
    w.put_u64(container.ranges.len() as u64)?;
    w.put_u64(record_pages as u64)?;
    w.put_u64(range_pages as u64)?;
    w.next_page()?;

    for chunk in container.ranges.chunks(range_per_page) {
        w.put_u32(chunk.len() as u32)?;
        for range in chunk {
            w.put_u32(range.label_set.0)?;
            w.put_u64(range.first_node.0)?;
            w.put_u64(range.count)?;
        }
        w.next_page()?;
    }

    for chunk in container.label_sets.chunks(record_per_page) {
        w.put_u32(chunk.len() as u32)?;
        for set in chunk {
            w.put_u32(set.0)?;
        }
        w.next_page()?;
    }

    w.finish()?;
    debug!(
        nodes = container.label_sets.len(),
        ranges = container.ranges.len(),
        "nodes.dump"
    );
    Ok(())
}

/// Loads a node container from `path`, resolving every label-set ID against
/// the graph metadata.
pub fn load(path: &Path, metadata: &GraphMetadata, cfg: &PartConfig) -> Result<NodeContainer> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let first_node = NodeId(c.get_u64()?);
    let node_count = c.get_u64()? as usize;
    let range_count = c.get_u64()? as usize;
    let record_pages = c.get_u64()? as usize;
    let range_pages = c.get_u64()? as usize;

    // declared counts must fit the declared pages before anything is sized
    let range_per_page = items_per_page(cfg.page_size, COUNT_HDR, RANGE_STRIDE);
    let record_per_page = items_per_page(cfg.page_size, COUNT_HDR, RECORD_STRIDE);
    if range_count > range_pages.saturating_mul(range_per_page)
        || node_count > record_pages.saturating_mul(record_per_page)
    {
        return Err(PartError::corruption(
            "declared counts exceed page capacity",
        ));
    }

    let mut ranges = Vec::with_capacity(range_count);
    for _ in 0..range_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            let label_set = metadata.resolve_label_set(c.get_u32()?)?;
            let first = NodeId(c.get_u64()?);
            let count = c.get_u64()?;
            ranges.push(LabelSetRange {
                label_set,
                first_node: first,
                count,
            });
        }
    }
    if ranges.len() != range_count {
        return Err(PartError::corruption(format!(
            "range pages hold {} entries, metadata declares {range_count}",
            ranges.len()
        )));
    }

    let mut label_sets = Vec::with_capacity(node_count);
    for _ in 0..record_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            label_sets.push(metadata.resolve_label_set(c.get_u32()?)?);
        }
    }
    if label_sets.len() != node_count {
        return Err(PartError::corruption(format!(
            "record pages hold {} entries, metadata declares {node_count}",
            label_sets.len()
        )));
    }

    debug!(nodes = node_count, ranges = range_count, "nodes.load");
    Ok(NodeContainer {
        first_node,
        label_sets,
        ranges,
    })
}
