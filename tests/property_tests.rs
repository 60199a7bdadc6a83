//! Randomized round-trip properties over the codecs.

use graphpart::codec::props;
use graphpart::part::{StringProps, TrivialProps};
use graphpart::{PartConfig, ValueType};
use proptest::collection::vec;
use proptest::prelude::*;
use tempfile::tempdir;

fn id_column(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    // strictly increasing ids built from positive gaps
    vec(1u64..1_000, 0..max_len).prop_map(|gaps| {
        gaps.iter()
            .scan(0u64, |acc, gap| {
                *acc += gap;
                Some(*acc)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn int_props_round_trip(
        ids in id_column(200),
        seed in any::<i64>(),
        page_size in 64usize..512,
    ) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("props");
        let cfg = PartConfig::default().page_size(page_size).bucket_size(64);

        let mut props = TrivialProps::new();
        for (i, &id) in ids.iter().enumerate() {
            props.push(id, seed.wrapping_add(i as i64)).expect("push");
        }
        props::dump(
            &graphpart::PropertyContainer::Int(props.clone()),
            &path,
            &cfg,
        )
        .expect("dump");
        let loaded = props::load(&path, ValueType::Int, &cfg).expect("load");
        prop_assert_eq!(loaded, graphpart::PropertyContainer::Int(props));
    }

    #[test]
    fn string_props_round_trip(
        words in vec("[a-z]{0,24}", 0..120),
        bucket_size in 32usize..128,
    ) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("props");
        let cfg = PartConfig::default()
            .page_size(512)
            .bucket_size(bucket_size);

        let mut props = StringProps::new(bucket_size);
        for (i, word) in words.iter().enumerate() {
            props.push(i as u64, word).expect("push");
        }
        props::dump(
            &graphpart::PropertyContainer::String(props.clone()),
            &path,
            &cfg,
        )
        .expect("dump");
        let loaded = props::load(&path, ValueType::String, &cfg).expect("load");
        prop_assert_eq!(loaded, graphpart::PropertyContainer::String(props));
    }

    #[test]
    fn bool_props_round_trip(ids in id_column(300)) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("props");
        let cfg = PartConfig::default().page_size(64).bucket_size(64);

        let mut props = TrivialProps::new();
        for &id in &ids {
            props.push(id, id % 2 == 0).expect("push");
        }
        props::dump(
            &graphpart::PropertyContainer::Bool(props.clone()),
            &path,
            &cfg,
        )
        .expect("dump");
        let loaded = props::load(&path, ValueType::Bool, &cfg).expect("load");
        prop_assert_eq!(loaded, graphpart::PropertyContainer::Bool(props));
    }
}
