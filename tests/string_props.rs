//! Stress coverage of the string property codec across many buckets.

use graphpart::{
    dump_part, load_part, EdgeId, GraphMetadata, LabelSet, NodeId, PartBuilder, PartConfig,
    PropValue, PropertyContainer, ValueType,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::tempdir;

fn random_word(rng: &mut ChaCha8Rng, max_len: usize) -> String {
    let len = rng.gen_range(0..=max_len);
    (0..len)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

#[test]
fn thousands_of_strings_round_trip() {
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default().bucket_size(256);
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut metadata = GraphMetadata::new();
    let label = metadata.add_label("Doc").expect("label");
    let set = LabelSet::new([label]);
    let title = metadata
        .add_property_type("title", ValueType::String)
        .expect("prop type");

    let count = 10_000u64;
    let mut expected = Vec::with_capacity(count as usize);
    let mut builder = PartBuilder::new(&mut metadata, NodeId(0), EdgeId(0), cfg);
    for _ in 0..count {
        let node = builder.add_node(set).expect("node");
        let word = random_word(&mut rng, 40);
        builder
            .set_node_prop(node, title, PropValue::String(word.clone()))
            .expect("prop");
        expected.push((node, word));
    }
    let part = builder.build().expect("build");

    let path = dir.path().join("part-0");
    dump_part(&part, &path, &cfg).expect("dump");
    let loaded = load_part(&path, &metadata, &cfg).expect("load");

    let PropertyContainer::String(strings) = loaded.node_props.get(&title).expect("container")
    else {
        panic!("title container is not a string container");
    };
    assert_eq!(strings.len(), count as usize);
    // small buckets force the values across many raw pages
    assert!(strings.buckets.len() > 100);
    for (node, word) in &expected {
        assert_eq!(strings.get(node.0), Some(word.as_str()), "node {node:?}");
    }
}

#[test]
fn identical_strings_pack_densely() {
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default().page_size(256).bucket_size(64);

    let mut metadata = GraphMetadata::new();
    let label = metadata.add_label("Doc").expect("label");
    let set = LabelSet::new([label]);
    let tag = metadata
        .add_property_type("tag", ValueType::String)
        .expect("prop type");

    let mut builder = PartBuilder::new(&mut metadata, NodeId(0), EdgeId(0), cfg);
    for _ in 0..100_000 {
        let node = builder.add_node(set).expect("node");
        builder
            .set_node_prop(node, tag, PropValue::String("fixed".into()))
            .expect("prop");
    }
    let part = builder.build().expect("build");

    let path = dir.path().join("part-0");
    dump_part(&part, &path, &cfg).expect("dump");
    let loaded = load_part(&path, &metadata, &cfg).expect("load");

    let PropertyContainer::String(strings) = loaded.node_props.get(&tag).expect("container")
    else {
        panic!("tag container is not a string container");
    };
    assert_eq!(strings.get(0), Some("fixed"));
    assert_eq!(strings.get(99_999), Some("fixed"));
    assert_eq!(strings.get(100_000), None);
}
