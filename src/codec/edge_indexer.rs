//! Edge indexer codec: per-node adjacency ranges plus label-set-keyed spans
//! over the edge arrays.
//!
//! Layout: metadata page `{node_count, patch_count, node_data_page_count,
//! out_indexer_page_count, in_indexer_page_count}`; count-prefixed
//! NodeEdgeData pages (patch segment first, then core); then, for each
//! direction, streamed indexer pages whose entry count is backfilled once
//! the page is full. One indexer's span list must fit a single page — a
//! larger one signals inconsistent metadata and aborts the dump.
//!
//! The loader resolves every label-set ID, bounds-checks all ranges and
//! spans against the edge arrays, and rebuilds the patch-node position map
//! by inspecting each patch node's first recorded edge.

use std::path::Path;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::codec::paged::{PageReader, PageWriter};
use crate::codec::{items_per_page, page_count, COUNT_HDR};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{
    EdgeContainer, EdgeIndexer, EdgeRange, LabelSetIndexer, NodeEdgeData, Span,
};

const NODE_DATA_STRIDE: usize = 4 * 8;
const ENTRY_HDR: usize = 4 + 4;
const SPAN_STRIDE: usize = 2 * 8;

/// Dumps the edge indexer to `path`.
pub fn dump(indexer: &EdgeIndexer, path: &Path, cfg: &PartConfig) -> Result<()> {
    let per_page = items_per_page(cfg.page_size, COUNT_HDR, NODE_DATA_STRIDE);
    let node_data_pages = page_count(indexer.nodes.len(), per_page);
    let out_pages = indexer_page_count(&indexer.out_indexers, cfg.page_size)?;
    let in_pages = indexer_page_count(&indexer.in_indexers, cfg.page_size)?;

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(indexer.nodes.len() as u64)?;
    w.put_u64(indexer.patch_count as u64)?;
    w.put_u64(node_data_pages as u64)?;
    w.put_u64(out_pages as u64)?;
    w.put_u64(in_pages as u64)?;
    w.next_page()?;

    for chunk in indexer.nodes.chunks(per_page) {
        w.put_u32(chunk.len() as u32)?;
        for node in chunk {
            w.put_u64(node.outs.first)?;
            w.put_u64(node.outs.count)?;
            w.put_u64(node.ins.first)?;
            w.put_u64(node.ins.count)?;
        }
        w.next_page()?;
    }

    write_indexers(&mut w, &indexer.out_indexers)?;
    write_indexers(&mut w, &indexer.in_indexers)?;

    w.finish()?;
    debug!(
        nodes = indexer.nodes.len(),
        patch = indexer.patch_count,
        out_pages,
        in_pages,
        "edge_indexer.dump"
    );
    Ok(())
}

/// Loads the edge indexer from `path`, rebuilding it against the already
/// loaded edge container.
pub fn load(
    path: &Path,
    edges: &EdgeContainer,
    metadata: &GraphMetadata,
    cfg: &PartConfig,
) -> Result<EdgeIndexer> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let node_count = c.get_u64()? as usize;
    let patch_count = c.get_u64()? as usize;
    let node_data_pages = c.get_u64()? as usize;
    let out_pages = c.get_u64()? as usize;
    let in_pages = c.get_u64()? as usize;

    if patch_count > node_count {
        return Err(PartError::corruption(
            "patch count exceeds node count",
        ));
    }
    let per_page = items_per_page(cfg.page_size, COUNT_HDR, NODE_DATA_STRIDE);
    if node_count > node_data_pages.saturating_mul(per_page) {
        return Err(PartError::corruption(
            "declared node count exceeds node data page capacity",
        ));
    }

    let edge_total = edges.outs.len() as u64;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_data_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            let outs = EdgeRange {
                first: c.get_u64()?,
                count: c.get_u64()?,
            };
            let ins = EdgeRange {
                first: c.get_u64()?,
                count: c.get_u64()?,
            };
            for range in [&outs, &ins] {
                match range.first.checked_add(range.count) {
                    Some(end) if end <= edge_total => {}
                    _ => {
                        return Err(PartError::corruption(
                            "adjacency range outside the edge arrays",
                        ))
                    }
                }
            }
            nodes.push(NodeEdgeData { outs, ins });
        }
    }
    if nodes.len() != node_count {
        return Err(PartError::corruption(format!(
            "node data pages hold {} entries, metadata declares {node_count}",
            nodes.len()
        )));
    }

    let out_indexers = read_indexers(&mut r, metadata, out_pages, edge_total)?;
    let in_indexers = read_indexers(&mut r, metadata, in_pages, edge_total)?;

    let mut patch_positions = FxHashMap::default();
    for (pos, node) in nodes.iter().take(patch_count).enumerate() {
        let id = if !node.outs.is_empty() {
            edges.outs[node.outs.first as usize].source
        } else if !node.ins.is_empty() {
            edges.ins[node.ins.first as usize].source
        } else {
            return Err(PartError::corruption(
                "patch node must have at least one edge",
            ));
        };
        patch_positions.insert(id, pos);
    }

    debug!(
        nodes = node_count,
        patch = patch_count,
        "edge_indexer.load"
    );
    Ok(EdgeIndexer {
        first_core_node: edges.first_node,
        patch_count,
        nodes,
        patch_positions,
        out_indexers,
        in_indexers,
    })
}

fn entry_size(indexer: &LabelSetIndexer) -> usize {
    ENTRY_HDR + SPAN_STRIDE * indexer.spans.len()
}

/// Pages the streamed indexer entries will occupy, without writing them.
fn indexer_page_count(indexers: &[LabelSetIndexer], page_size: usize) -> Result<usize> {
    if indexers.is_empty() {
        return Ok(0);
    }
    let capacity = page_size - COUNT_HDR;
    let mut pages = 1;
    let mut used = 0;
    for indexer in indexers {
        let need = entry_size(indexer);
        if need > capacity {
            return Err(PartError::Oversize("label-set indexer"));
        }
        if used + need > capacity {
            pages += 1;
            used = 0;
        }
        used += need;
    }
    Ok(pages)
}

fn write_indexers(w: &mut PageWriter, indexers: &[LabelSetIndexer]) -> Result<()> {
    if indexers.is_empty() {
        return Ok(());
    }
    let mut count_offset = w.reserve_u32()?;
    let mut on_page = 0u32;
    for indexer in indexers {
        let need = entry_size(indexer);
        if need > w.remaining() {
            // backfill this page's entry count and move on
            w.patch_u32(count_offset, on_page)?;
            w.next_page()?;
            count_offset = w.reserve_u32()?;
            on_page = 0;
            if need > w.remaining() {
                return Err(PartError::Oversize("label-set indexer"));
            }
        }
        w.put_u32(indexer.spans.len() as u32)?;
        w.put_u32(indexer.label_set.0)?;
        for span in &indexer.spans {
            w.put_u64(span.offset)?;
            w.put_u64(span.count)?;
        }
        on_page += 1;
    }
    w.patch_u32(count_offset, on_page)?;
    w.next_page()?;
    Ok(())
}

fn read_indexers(
    r: &mut PageReader,
    metadata: &GraphMetadata,
    pages: usize,
    edge_total: u64,
) -> Result<Vec<LabelSetIndexer>> {
    let mut indexers = Vec::new();
    for _ in 0..pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            let span_count = c.get_u32()? as usize;
            let label_set = metadata.resolve_label_set(c.get_u32()?)?;
            let mut spans = SmallVec::with_capacity(span_count.min(c.remaining() / SPAN_STRIDE));
            for _ in 0..span_count {
                let span = Span {
                    offset: c.get_u64()?,
                    count: c.get_u64()?,
                };
                match span.offset.checked_add(span.count) {
                    Some(end) if end <= edge_total => {}
                    _ => {
                        return Err(PartError::corruption(
                            "label-set span outside the edge arrays",
                        ))
                    }
                }
                spans.push(span);
            }
            indexers.push(LabelSetIndexer { label_set, spans });
        }
    }
    Ok(indexers)
}
