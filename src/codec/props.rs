//! Property container codecs.
//!
//! Trivial (fixed-width) containers are pure append: metadata page
//! `{value_type, prop_count, id_page_count, value_page_count}`, then
//! count-prefixed ID pages and count-prefixed value pages.
//!
//! String containers are the one two-phase codec: a zeroed placeholder page
//! is written first, then the ID pages, the raw bucket pages and the limit
//! block pages; once every page count is known the writer rewinds and
//! rewrites page zero with the real metadata
//! `{value_type, prop_count, bucket_count, id_page_count,
//! bucket_page_count, limits_page_count}`.

use std::path::Path;

use tracing::debug;

use crate::codec::paged::{PageCursor, PageReader, PageWriter};
use crate::codec::{items_per_page, page_count, COUNT_HDR};
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::part::{PropertyContainer, StrLimit, StringBucket, StringProps, TrivialProps};
use crate::types::ValueType;

const ID_STRIDE: usize = 8;
const BLOCK_HDR: usize = 4 + 4;
const LIMIT_STRIDE: usize = 4 + 4;
/// Smallest useful tail of a limits page: a block header plus one limit.
const MIN_BLOCK_STRIDE: usize = BLOCK_HDR + LIMIT_STRIDE;

/// Dumps a property container to `path`.
pub fn dump(container: &PropertyContainer, path: &Path, cfg: &PartConfig) -> Result<()> {
    cfg.validate()?;
    match container {
        PropertyContainer::Bool(c) => dump_trivial(c, ValueType::Bool, path, cfg),
        PropertyContainer::Int(c) => dump_trivial(c, ValueType::Int, path, cfg),
        PropertyContainer::Double(c) => dump_trivial(c, ValueType::Double, path, cfg),
        PropertyContainer::String(c) => dump_string(c, path, cfg),
    }
}

/// Loads a property container of the declared value type from `path`.
pub fn load(path: &Path, value_type: ValueType, cfg: &PartConfig) -> Result<PropertyContainer> {
    cfg.validate()?;
    match value_type {
        ValueType::Bool => Ok(PropertyContainer::Bool(load_trivial(
            path,
            ValueType::Bool,
            cfg,
        )?)),
        ValueType::Int => Ok(PropertyContainer::Int(load_trivial(
            path,
            ValueType::Int,
            cfg,
        )?)),
        ValueType::Double => Ok(PropertyContainer::Double(load_trivial(
            path,
            ValueType::Double,
            cfg,
        )?)),
        ValueType::String => Ok(PropertyContainer::String(load_string(path, cfg)?)),
    }
}

/// Fixed-width value encoding for trivial containers.
trait FixedValue: Copy {
    const STRIDE: usize;
    fn put(w: &mut PageWriter, v: Self) -> Result<()>;
    fn get(c: &mut PageCursor<'_>) -> Result<Self>;
}

impl FixedValue for bool {
    const STRIDE: usize = 1;
    fn put(w: &mut PageWriter, v: Self) -> Result<()> {
        w.put_u8(v as u8)
    }
    fn get(c: &mut PageCursor<'_>) -> Result<Self> {
        match c.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PartError::corruption(format!(
                "invalid boolean encoding: {other}"
            ))),
        }
    }
}

impl FixedValue for i64 {
    const STRIDE: usize = 8;
    fn put(w: &mut PageWriter, v: Self) -> Result<()> {
        w.put_i64(v)
    }
    fn get(c: &mut PageCursor<'_>) -> Result<Self> {
        c.get_i64()
    }
}

impl FixedValue for f64 {
    const STRIDE: usize = 8;
    fn put(w: &mut PageWriter, v: Self) -> Result<()> {
        w.put_f64(v)
    }
    fn get(c: &mut PageCursor<'_>) -> Result<Self> {
        c.get_f64()
    }
}

fn dump_trivial<T: FixedValue>(
    props: &TrivialProps<T>,
    value_type: ValueType,
    path: &Path,
    cfg: &PartConfig,
) -> Result<()> {
    let id_per_page = items_per_page(cfg.page_size, COUNT_HDR, ID_STRIDE);
    let value_per_page = items_per_page(cfg.page_size, COUNT_HDR, T::STRIDE);
    let id_pages = page_count(props.ids.len(), id_per_page);
    let value_pages = page_count(props.values.len(), value_per_page);

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.put_u8(value_type.as_u8())?;
    w.put_u64(props.ids.len() as u64)?;
    w.put_u64(id_pages as u64)?;
    w.put_u64(value_pages as u64)?;
    w.next_page()?;

    for chunk in props.ids.chunks(id_per_page) {
        w.put_u32(chunk.len() as u32)?;
        for &id in chunk {
            w.put_u64(id)?;
        }
        w.next_page()?;
    }
    for chunk in props.values.chunks(value_per_page) {
        w.put_u32(chunk.len() as u32)?;
        for &value in chunk {
            T::put(&mut w, value)?;
        }
        w.next_page()?;
    }

    w.finish()?;
    debug!(count = props.ids.len(), ?value_type, "props.dump");
    Ok(())
}

fn load_trivial<T: FixedValue>(
    path: &Path,
    expected: ValueType,
    cfg: &PartConfig,
) -> Result<TrivialProps<T>> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let value_type = ValueType::from_u8(c.get_u8()?)?;
    if value_type != expected {
        return Err(PartError::corruption(format!(
            "container holds {value_type:?} values, metadata declares {expected:?}"
        )));
    }
    let prop_count = c.get_u64()? as usize;
    let id_pages = c.get_u64()? as usize;
    let value_pages = c.get_u64()? as usize;

    let id_per_page = items_per_page(cfg.page_size, COUNT_HDR, ID_STRIDE);
    let value_per_page = items_per_page(cfg.page_size, COUNT_HDR, T::STRIDE);
    if prop_count > id_pages.saturating_mul(id_per_page)
        || prop_count > value_pages.saturating_mul(value_per_page)
    {
        return Err(PartError::corruption(
            "declared property count exceeds page capacity",
        ));
    }

    let ids = read_ids(&mut r, id_pages, prop_count)?;
    let mut values = Vec::with_capacity(prop_count);
    for _ in 0..value_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            values.push(T::get(&mut c)?);
        }
    }
    if values.len() != prop_count {
        return Err(PartError::corruption(format!(
            "value pages hold {} entries, metadata declares {prop_count}",
            values.len()
        )));
    }

    debug!(count = prop_count, ?value_type, "props.load");
    Ok(TrivialProps { ids, values })
}

fn read_ids(r: &mut PageReader, pages: usize, prop_count: usize) -> Result<Vec<u64>> {
    let mut ids = Vec::with_capacity(prop_count);
    for _ in 0..pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = c.get_u32()? as usize;
        for _ in 0..on_page {
            ids.push(c.get_u64()?);
        }
    }
    if ids.len() != prop_count {
        return Err(PartError::corruption(format!(
            "id pages hold {} entries, metadata declares {prop_count}",
            ids.len()
        )));
    }
    for pair in ids.windows(2) {
        if pair[1] <= pair[0] {
            return Err(PartError::corruption(
                "property id column not strictly increasing",
            ));
        }
    }
    Ok(ids)
}

fn dump_string(props: &StringProps, path: &Path, cfg: &PartConfig) -> Result<()> {
    if props.bucket_size() != cfg.bucket_size {
        return Err(PartError::Invalid(format!(
            "container bucket size {} differs from configured {}",
            props.bucket_size(),
            cfg.bucket_size
        )));
    }
    let id_per_page = items_per_page(cfg.page_size, COUNT_HDR, ID_STRIDE);
    let buckets_per_page = cfg.page_size / cfg.bucket_size;

    let mut w = PageWriter::create(path, cfg.page_size)?;
    w.next_page()?; // placeholder page zero, rewritten at the end

    for chunk in props.ids.chunks(id_per_page) {
        w.put_u32(chunk.len() as u32)?;
        for &id in chunk {
            w.put_u64(id)?;
        }
        w.next_page()?;
    }
    let id_pages = w.pages_written() - 1;

    for chunk in props.buckets.chunks(buckets_per_page) {
        for bucket in chunk {
            w.put_bytes(&bucket.bytes)?;
        }
        w.next_page()?;
    }
    let bucket_pages = w.pages_written() - 1 - id_pages;

    write_limit_blocks(&mut w, &props.buckets)?;
    let limits_pages = w.pages_written() - 1 - id_pages - bucket_pages;

    // body done; counts are final, so page zero can be written for real
    w.rewind_to_first_page()?;
    w.put_u8(ValueType::String.as_u8())?;
    w.put_u64(props.ids.len() as u64)?;
    w.put_u64(props.buckets.len() as u64)?;
    w.put_u64(id_pages as u64)?;
    w.put_u64(bucket_pages as u64)?;
    w.put_u64(limits_pages as u64)?;
    w.next_page()?;
    w.finish()?;

    debug!(
        count = props.ids.len(),
        buckets = props.buckets.len(),
        "props.dump_string"
    );
    Ok(())
}

fn write_limit_blocks(w: &mut PageWriter, buckets: &[StringBucket]) -> Result<()> {
    if buckets.is_empty() {
        return Ok(());
    }
    let mut count_offset = w.reserve_u32()?;
    let mut on_page = 0u32;
    for (bucket_index, bucket) in buckets.iter().enumerate() {
        let mut written = 0;
        while written < bucket.limits.len() {
            if w.remaining() < MIN_BLOCK_STRIDE {
                w.patch_u32(count_offset, on_page)?;
                w.next_page()?;
                count_offset = w.reserve_u32()?;
                on_page = 0;
            }
            // split the bucket's limits across pages when they cannot fit
            let fit = (w.remaining() - BLOCK_HDR) / LIMIT_STRIDE;
            let take = fit.min(bucket.limits.len() - written);
            w.put_u32(bucket_index as u32)?;
            w.put_u32(take as u32)?;
            for limit in &bucket.limits[written..written + take] {
                w.put_u32(limit.offset)?;
                w.put_u32(limit.len)?;
            }
            written += take;
            on_page += 1;
        }
    }
    w.patch_u32(count_offset, on_page)?;
    w.next_page()?;
    Ok(())
}

fn load_string(path: &Path, cfg: &PartConfig) -> Result<StringProps> {
    let mut r = PageReader::open(path, cfg.page_size)?;
    r.next_page()?;
    let mut c = r.cursor();
    let value_type = ValueType::from_u8(c.get_u8()?)?;
    if value_type != ValueType::String {
        return Err(PartError::corruption(format!(
            "container holds {value_type:?} values, metadata declares String"
        )));
    }
    let prop_count = c.get_u64()? as usize;
    let bucket_count = c.get_u64()? as usize;
    let id_pages = c.get_u64()? as usize;
    let bucket_pages = c.get_u64()? as usize;
    let limits_pages = c.get_u64()? as usize;

    let id_per_page = items_per_page(cfg.page_size, COUNT_HDR, ID_STRIDE);
    let buckets_per_page = cfg.page_size / cfg.bucket_size;
    if prop_count > id_pages.saturating_mul(id_per_page)
        || bucket_count > bucket_pages.saturating_mul(buckets_per_page)
    {
        return Err(PartError::corruption(
            "declared counts exceed page capacity",
        ));
    }

    let ids = read_ids(&mut r, id_pages, prop_count)?;

    let mut blocks = Vec::with_capacity(bucket_count);
    let mut remaining = bucket_count;
    for _ in 0..bucket_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let on_page = remaining.min(buckets_per_page);
        if on_page == 0 {
            return Err(PartError::corruption(
                "bucket pages exceed the declared bucket count",
            ));
        }
        for _ in 0..on_page {
            blocks.push(c.get_bytes(cfg.bucket_size)?.to_vec());
        }
        remaining -= on_page;
    }
    if remaining != 0 {
        return Err(PartError::corruption(format!(
            "bucket pages hold {} buckets, metadata declares {bucket_count}",
            blocks.len()
        )));
    }

    let mut limits: Vec<Vec<StrLimit>> = vec![Vec::new(); bucket_count];
    for _ in 0..limits_pages {
        r.next_page()?;
        let mut c = r.cursor();
        let block_count = c.get_u32()? as usize;
        for _ in 0..block_count {
            let bucket_index = c.get_u32()? as usize;
            let in_block = c.get_u32()? as usize;
            let per_bucket = limits.get_mut(bucket_index).ok_or_else(|| {
                PartError::corruption("limit block names an unknown bucket")
            })?;
            for _ in 0..in_block {
                per_bucket.push(StrLimit {
                    offset: c.get_u32()?,
                    len: c.get_u32()?,
                });
            }
        }
    }

    let buckets: Vec<StringBucket> = blocks
        .into_iter()
        .zip(limits)
        .map(|(bytes, limits)| StringBucket { bytes, limits })
        .collect();
    let props = StringProps::from_parts(cfg.bucket_size, ids, buckets)?;
    debug!(
        count = prop_count,
        buckets = bucket_count,
        "props.load_string"
    );
    Ok(props)
}
