//! Binary codecs for the on-disk part format.
//!
//! Every file starts with the magic/version header (see [`header`]) followed
//! by fixed-size pages. Page zero of each file carries the aggregate counts
//! needed to size subsequent reads; body pages are count-prefixed arrays or
//! streamed entries with a backfilled per-page count.

pub mod edge_indexer;
pub mod edges;
pub mod header;
pub mod nodes;
pub mod paged;
pub mod part;
pub mod prop_indexer;
pub mod props;
pub mod tables;

pub use part::{dump_part, load_part};
pub use tables::{dump_metadata, load_metadata};

/// Name of the part info file.
pub const INFO_FILE: &str = "info";
/// Name of the node container file.
pub const NODES_FILE: &str = "nodes";
/// Name of the edge container file.
pub const EDGES_FILE: &str = "edges";
/// Name of the edge indexer file.
pub const EDGE_INDEXER_FILE: &str = "edge-indexer";
/// Name of the node property indexer file.
pub const NODE_PROP_INDEXER_FILE: &str = "node-prop-indexer";
/// Name of the edge property indexer file.
pub const EDGE_PROP_INDEXER_FILE: &str = "edge-prop-indexer";
/// File name prefix of node property containers; the property type ID
/// follows the prefix.
pub const NODE_PROPS_PREFIX: &str = "node-props-";
/// File name prefix of edge property containers.
pub const EDGE_PROPS_PREFIX: &str = "edge-props-";
/// Name of the graph metadata tables file.
pub const METADATA_FILE: &str = "metadata";

/// Stride of the per-page item count prefix.
pub(crate) const COUNT_HDR: usize = 4;

/// Items of `stride` bytes fitting one page after `header` bytes.
pub(crate) fn items_per_page(page_size: usize, header: usize, stride: usize) -> usize {
    (page_size - header) / stride
}

/// Pages needed for `total` items at `per_page` capacity.
pub(crate) fn page_count(total: usize, per_page: usize) -> usize {
    total.div_ceil(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn items_per_page_floors() {
        assert_eq!(items_per_page(64, 4, 20), 3);
        assert_eq!(items_per_page(64, 4, 8), 7);
        assert_eq!(items_per_page(64, 0, 64), 1);
    }

    #[test]
    fn page_count_ceils() {
        assert_eq!(page_count(0, 7), 0);
        assert_eq!(page_count(7, 7), 1);
        assert_eq!(page_count(8, 7), 2);
        assert_eq!(page_count(14, 7), 2);
        assert_eq!(page_count(15, 7), 3);
    }

    #[test]
    fn last_page_holds_the_remainder() {
        let total = 23;
        let per_page = 7;
        let pages = page_count(total, per_page);
        let on_last = total - (pages - 1) * per_page;
        assert_eq!(pages, 4);
        assert_eq!(on_last, 2);

        // evenly divisible: last page is full
        let total = 21;
        let pages = page_count(total, per_page);
        assert_eq!(total - (pages - 1) * per_page, per_page);
    }

    proptest! {
        #[test]
        fn pagination_covers_all_items(
            total in 0usize..100_000,
            stride in 1usize..64,
            page_size in 64usize..16_384,
        ) {
            prop_assume!(page_size - COUNT_HDR >= stride);
            let per_page = items_per_page(page_size, COUNT_HDR, stride);
            let pages = page_count(total, per_page);

            // every page but the last is full; the last holds the remainder
            prop_assert!(per_page * stride + COUNT_HDR <= page_size);
            if total == 0 {
                prop_assert_eq!(pages, 0);
            } else {
                prop_assert!(per_page * (pages - 1) < total);
                prop_assert!(per_page * pages >= total);
                let on_last = total - per_page * (pages - 1);
                prop_assert!(on_last >= 1 && on_last <= per_page);
            }
        }
    }
}
