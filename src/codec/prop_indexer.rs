//! Property indexer codec.
//!
//! Layout: metadata page `{prop_type_count, page_count}`, then pages of
//! per-property-type entries with a backfilled `u32` entry count per page.
//! Entry: `{prop_type u32, labelset_count u32}` followed by, per label-set,
//! `{labelset u32, range_count u32}` and `range_count` ranges
//! `{first_id u64, first_pos u64, count u64}`. One property type's entry
//! must fit on a single page.

use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageReader, PageWriter};
use crate::codec::COUNT_HDR;
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::GraphMetadata;
use crate::part::{LabelSetRanges, PosRange, PropIndex, PropertyIndexer};

const ENTRY_HDR: usize = 4 + 4;
const LABELSET_HDR: usize = 4 + 4;
const RANGE_STRIDE: usize = 8 + 8 + 8;

fn entry_len(entry: &PropIndex) -> usize {
    let ranges: usize = entry.by_label_set.iter().map(|r| r.ranges.len()).sum();
    ENTRY_HDR + entry.by_label_set.len() * LABELSET_HDR + ranges * RANGE_STRIDE
}

fn indexer_page_count(indexer: &PropertyIndexer, page_size: usize) -> Result<usize> {
    let capacity = page_size - COUNT_HDR;
    let mut pages = 0;
    let mut used = capacity;
    for entry in &indexer.entries {
        let need = entry_len(entry);
        if need > capacity {
            return Err(PartError::Oversize("property indexer entry"));
        }
        if used + need > capacity {
            pages += 1;
            used = 0;
        }
        used += need;
    }
    Ok(pages)
}

/// Dumps a property indexer to `path`.
pub fn dump(indexer: &PropertyIndexer, path: &Path, cfg: &PartConfig) -> Result<()> {
    let pages = indexer_page_count(indexer, cfg.page_size)?;

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(indexer.entries.len() as u64)?;
    w.put_u64(pages as u64)?;
    w.next_page()?;

    if !indexer.entries.is_empty() {
        let mut count_offset = w.reserve_u32()?;
        let mut on_page = 0u32;
        for entry in &indexer.entries {
            if entry_len(entry) > w.remaining() {
                w.patch_u32(count_offset, on_page)?;
                w.next_page()?;
                count_offset = w.reserve_u32()?;
                on_page = 0;
            }
            w.put_u32(entry.prop_type.0)?;
            w.put_u32(entry.by_label_set.len() as u32)?;
            for per_set in &entry.by_label_set {
                w.put_u32(per_set.label_set.0)?;
                w.put_u32(per_set.ranges.len() as u32)?;
                for range in &per_set.ranges {
                    w.put_u64(range.first_id)?;
                    w.put_u64(range.first_pos)?;
                    w.put_u64(range.count)?;
                }
            }
            on_page += 1;
        }
        w.patch_u32(count_offset, on_page)?;
        w.next_page()?;
    }

    w.finish()?;
    debug!(prop_types = indexer.entries.len(), pages, "prop_indexer.dump");
    Ok(())
}

/// Loads a property indexer from `path`, resolving every property type and
/// label-set against the graph metadata.
pub fn load(path: &Path, metadata: &GraphMetadata, cfg: &PartConfig) -> Result<PropertyIndexer> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let prop_type_count = c.get_u64()? as usize;
    let pages = c.get_u64()? as usize;

    // declared total must fit the declared pages
    let max_per_page = (cfg.page_size - COUNT_HDR) / ENTRY_HDR;
    if prop_type_count > pages.saturating_mul(max_per_page) {
        return Err(PartError::corruption(
            "declared property type count exceeds page capacity",
        ));
    }

    let mut entries = Vec::with_capacity(prop_type_count);
    for _ in 0..pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            let prop_type = metadata.resolve_property_type(c.get_u32()?)?;
            let labelset_count = c.get_u32()? as usize;
            let mut by_label_set =
                Vec::with_capacity(labelset_count.min(c.remaining() / LABELSET_HDR));
            for _ in 0..labelset_count {
                let label_set = metadata.resolve_label_set(c.get_u32()?)?;
                let range_count = c.get_u32()? as usize;
                let mut ranges = Vec::with_capacity(range_count.min(c.remaining() / RANGE_STRIDE));
                for _ in 0..range_count {
                    ranges.push(PosRange {
                        first_id: c.get_u64()?,
                        first_pos: c.get_u64()?,
                        count: c.get_u64()?,
                    });
                }
                by_label_set.push(LabelSetRanges { label_set, ranges });
            }
            entries.push(PropIndex {
                prop_type,
                by_label_set,
            });
        }
    }
    if entries.len() != prop_type_count {
        return Err(PartError::corruption(format!(
            "indexer pages hold {} property types, metadata declares {prop_type_count}",
            entries.len()
        )));
    }
    for pair in entries.windows(2) {
        if pair[1].prop_type <= pair[0].prop_type {
            return Err(PartError::corruption(
                "property indexer entries not sorted by property type",
            ));
        }
    }

    debug!(prop_types = entries.len(), "prop_indexer.load");
    Ok(PropertyIndexer { entries })
}
