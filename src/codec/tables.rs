//! Graph metadata codec.
//!
//! The metadata file holds the four lookup tables every part file refers
//! to by ID: labels, edge types, property types and interned label-sets.
//! Page zero carries the table sizes
//! `{label_count, edge_type_count, prop_type_count, labelset_count}`; each
//! table then streams across pages with a backfilled `u32` per-page entry
//! count. Rows are variable width for the named tables (`len u32` + bytes,
//! plus a `value_type u8` for property types) and fixed `u64` bit words for
//! label-sets.

use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageCursor, PageReader, PageWriter};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::metadata::{GraphMetadata, PropTypeDef};
use crate::types::{LabelSet, ValueType};

/// Dumps the graph metadata tables to `path`.
pub fn dump_metadata(metadata: &GraphMetadata, path: &Path, cfg: &PartConfig) -> Result<()> {
    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u64(metadata.labels().len() as u64)?;
    w.put_u64(metadata.edge_types().len() as u64)?;
    w.put_u64(metadata.property_types().len() as u64)?;
    w.put_u64(metadata.label_sets().len() as u64)?;
    w.next_page()?;

    write_names(&mut w, metadata.labels())?;
    write_names(&mut w, metadata.edge_types())?;
    write_rows(
        &mut w,
        metadata.property_types(),
        |def| 4 + def.name.len() + 1,
        |w, def| {
            put_str(w, &def.name)?;
            w.put_u8(def.value_type.as_u8())
        },
    )?;
    write_rows(&mut w, metadata.label_sets(), |_| 8, |w, set| {
        w.put_u64(set.bits())
    })?;
    w.finish()?;

    debug!(
        labels = metadata.labels().len(),
        edge_types = metadata.edge_types().len(),
        prop_types = metadata.property_types().len(),
        label_sets = metadata.label_sets().len(),
        "metadata.dump"
    );
    Ok(())
}

/// Loads the graph metadata tables from `path`.
pub fn load_metadata(path: &Path, cfg: &PartConfig) -> Result<GraphMetadata> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let label_count = c.get_u64()? as usize;
    let edge_type_count = c.get_u64()? as usize;
    let prop_type_count = c.get_u64()? as usize;
    let labelset_count = c.get_u64()? as usize;

    let labels = read_names(&mut r, label_count)?;
    let edge_types = read_names(&mut r, edge_type_count)?;
    let prop_types = read_rows(&mut r, prop_type_count, |c| {
        let name = get_str(c)?;
        let value_type = ValueType::from_u8(c.get_u8()?)?;
        Ok(PropTypeDef { name, value_type })
    })?;
    let label_sets = read_rows(&mut r, labelset_count, |c| {
        Ok(LabelSet::from_bits(c.get_u64()?))
    })?;

    let metadata = GraphMetadata::from_parts(labels, edge_types, prop_types, label_sets)?;
    debug!(
        labels = label_count,
        edge_types = edge_type_count,
        prop_types = prop_type_count,
        label_sets = labelset_count,
        "metadata.load"
    );
    Ok(metadata)
}

fn put_str(w: &mut PageWriter, s: &str) -> Result<()> {
    w.put_u32(s.len() as u32)?;
    w.put_bytes(s.as_bytes())
}

fn get_str(c: &mut PageCursor<'_>) -> Result<String> {
    let len = c.get_u32()? as usize;
    let bytes = c.get_bytes(len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| PartError::corruption("metadata name is not valid UTF-8"))
}

fn write_names(w: &mut PageWriter, names: &[String]) -> Result<()> {
    write_rows(
        w,
        names,
        |name| 4 + name.len(),
        |w, name| put_str(w, name),
    )
}

fn read_names(r: &mut PageReader, count: usize) -> Result<Vec<String>> {
    read_rows(r, count, get_str)
}

/// Streams one table, starting a fresh page for it and backfilling each
/// page's entry count once the page is full. A single row must fit a page.
fn write_rows<T>(
    w: &mut PageWriter,
    rows: &[T],
    row_len: impl Fn(&T) -> usize,
    mut put: impl FnMut(&mut PageWriter, &T) -> Result<()>,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut count_offset = w.reserve_u32()?;
    let mut on_page = 0u32;
    for row in rows {
        if row_len(row) > w.remaining() {
            w.patch_u32(count_offset, on_page)?;
            w.next_page()?;
            count_offset = w.reserve_u32()?;
            on_page = 0;
        }
        put(w, row).map_err(|e| match e {
            PartError::Oversize(_) => PartError::Oversize("metadata table row"),
            other => other,
        })?;
        on_page += 1;
    }
    w.patch_u32(count_offset, on_page)?;
    w.next_page()?;
    Ok(())
}

/// Reads one table of `count` rows, consuming pages until the count is met.
fn read_rows<T>(
    r: &mut PageReader,
    count: usize,
    mut get: impl FnMut(&mut PageCursor<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    // the count is untrusted; rows grow as pages actually deliver them
    let mut rows = Vec::new();
    while rows.len() < count {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        if on_page == 0 || rows.len() + on_page > count {
            return Err(PartError::corruption(
                "metadata table page count disagrees with table size",
            ));
        }
        for _ in 0..on_page {
            rows.push(get(&mut c)?);
        }
    }
    Ok(rows)
}
