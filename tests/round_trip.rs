//! End-to-end dump/load coverage over full parts.

use graphpart::{
    dump_metadata, dump_part, load_metadata, load_part, Direction, EdgeId, GraphMetadata,
    LabelSet, NodeId, PartBuilder, PartConfig, PropValue, ValueType,
};
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn empty_part_round_trips() {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default();
    let mut metadata = GraphMetadata::new();

    let builder = PartBuilder::new(&mut metadata, NodeId(7), EdgeId(3), cfg);
    let part = builder.build().expect("build");
    let path = dir.path().join("part-0");
    dump_part(&part, &path, &cfg).expect("dump");

    let loaded = load_part(&path, &metadata, &cfg).expect("load");
    assert_eq!(loaded.first_node, NodeId(7));
    assert_eq!(loaded.first_edge, EdgeId(3));
    assert_eq!(loaded.node_count(), 0);
    assert_eq!(loaded.edge_count(), 0);
}

#[test]
fn populated_part_round_trips() {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default();

    let mut metadata = GraphMetadata::new();
    let person = metadata.add_label("Person").expect("label");
    let city = metadata.add_label("City").expect("label");
    let person_set = LabelSet::new([person]);
    let city_set = LabelSet::new([city]);
    let knows = metadata.add_edge_type("KNOWS");
    let lives_in = metadata.add_edge_type("LIVES_IN");
    let name = metadata
        .add_property_type("name", ValueType::String)
        .expect("prop type");
    let age = metadata
        .add_property_type("age", ValueType::Int)
        .expect("prop type");
    let weight = metadata
        .add_property_type("weight", ValueType::Double)
        .expect("prop type");

    let mut builder = PartBuilder::new(&mut metadata, NodeId(100), EdgeId(500), cfg);
    let alice = builder.add_node(person_set).expect("node");
    let bob = builder.add_node(person_set).expect("node");
    let berlin = builder.add_node(city_set).expect("node");
    builder.add_edge(alice, bob, knows);
    let e1 = builder.add_edge(alice, berlin, lives_in);
    let e2 = builder.add_edge(bob, berlin, lives_in);
    builder
        .set_node_prop(alice, name, PropValue::String("Alice".into()))
        .expect("prop");
    builder
        .set_node_prop(bob, name, PropValue::String("Bob".into()))
        .expect("prop");
    builder
        .set_node_prop(alice, age, PropValue::Int(30))
        .expect("prop");
    builder
        .set_edge_prop(e1, weight, PropValue::Double(0.5))
        .expect("prop");
    let part = builder.build().expect("build");

    let path = dir.path().join("part-0");
    dump_part(&part, &path, &cfg).expect("dump");
    let loaded = load_part(&path, &metadata, &cfg).expect("load");

    assert_eq!(loaded.nodes, part.nodes);
    assert_eq!(loaded.edges, part.edges);
    assert_eq!(loaded.node_props, part.node_props);
    assert_eq!(loaded.edge_props, part.edge_props);
    assert_eq!(loaded.node_prop_indexer, part.node_prop_indexer);
    assert_eq!(loaded.edge_prop_indexer, part.edge_prop_indexer);
    assert_eq!(loaded.edge_indexer.nodes, part.edge_indexer.nodes);
    assert_eq!(
        loaded.edge_indexer.out_indexers,
        part.edge_indexer.out_indexers
    );
    assert_eq!(
        loaded.edge_indexer.in_indexers,
        part.edge_indexer.in_indexers
    );

    // adjacency survives the trip
    let alice_edges = loaded.edge_indexer.edges_of(alice).expect("alice");
    assert_eq!(alice_edges.outs.count, 2);
    assert_eq!(alice_edges.ins.count, 0);
    let berlin_edges = loaded.edge_indexer.edges_of(berlin).expect("berlin");
    assert_eq!(berlin_edges.outs.count, 0);
    assert_eq!(berlin_edges.ins.count, 2);

    // label-set spans resolve the same slices
    let city_id = metadata.label_set_id(city_set).expect("interned");
    let spans = loaded
        .edge_indexer
        .spans_for(Direction::Out, city_id)
        .expect("spans");
    let targets: Vec<EdgeId> = spans
        .iter()
        .flat_map(|s| {
            loaded.edges.outs[s.offset as usize..(s.offset + s.count) as usize]
                .iter()
                .map(|r| r.edge)
        })
        .collect();
    assert_eq!(targets, vec![e1, e2]);

    // property values resolve by entity id
    match loaded.node_props.get(&name).expect("name container") {
        graphpart::PropertyContainer::String(c) => {
            assert_eq!(c.get(alice.0), Some("Alice"));
            assert_eq!(c.get(bob.0), Some("Bob"));
            assert_eq!(c.get(berlin.0), None);
        }
        other => panic!("unexpected container: {:?}", other.value_type()),
    }
    match loaded.node_props.get(&age).expect("age container") {
        graphpart::PropertyContainer::Int(c) => assert_eq!(c.get(alice.0), Some(30)),
        other => panic!("unexpected container: {:?}", other.value_type()),
    }
}

#[test]
fn patch_nodes_round_trip() {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default();

    let mut metadata = GraphMetadata::new();
    let label = metadata.add_label("Thing").expect("label");
    let set = LabelSet::new([label]);
    let related = metadata.add_edge_type("RELATED");

    let mut builder = PartBuilder::new(&mut metadata, NodeId(0), EdgeId(0), cfg);
    let core_a = builder.add_node(set).expect("node");
    let core_b = builder.add_node(set).expect("node");
    let patch_a = builder.add_patch_node(set);
    let patch_b = builder.add_patch_node(set);
    builder.add_edge(core_a, core_b, related);
    builder.add_edge(patch_a, core_a, related);
    builder.add_edge(core_b, patch_b, related);
    let part = builder.build().expect("build");

    let path = dir.path().join("part-0");
    dump_part(&part, &path, &cfg).expect("dump");
    let loaded = load_part(&path, &metadata, &cfg).expect("load");

    // the patch map is rebuilt from edge records, not stored
    assert_eq!(loaded.edge_indexer.patch_count, 2);
    assert_eq!(
        loaded.edge_indexer.patch_positions,
        part.edge_indexer.patch_positions
    );
    let patch_edges = loaded.edge_indexer.edges_of(patch_a).expect("patch");
    assert_eq!(patch_edges.outs.count, 1);
    let patch_edges = loaded.edge_indexer.edges_of(patch_b).expect("patch");
    assert_eq!(patch_edges.ins.count, 1);
}

#[test]
fn metadata_file_round_trips_with_parts() {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let cfg = PartConfig::default();

    let mut metadata = GraphMetadata::new();
    let label = metadata.add_label("Doc").expect("label");
    let set = LabelSet::new([label]);
    metadata
        .add_property_type("title", ValueType::String)
        .expect("prop type");
    let title = metadata.property_type_id("title").expect("declared");

    let mut builder = PartBuilder::new(&mut metadata, NodeId(0), EdgeId(0), cfg);
    let doc = builder.add_node(set).expect("node");
    builder
        .set_node_prop(doc, title, PropValue::String("On Graphs".into()))
        .expect("prop");
    let part = builder.build().expect("build");

    let md_path = dir.path().join("metadata");
    dump_metadata(&metadata, &md_path, &cfg).expect("dump metadata");
    let part_path = dir.path().join("part-0");
    dump_part(&part, &part_path, &cfg).expect("dump part");

    // a fresh process sees only the files
    let metadata = load_metadata(&md_path, &cfg).expect("load metadata");
    let loaded = load_part(&part_path, &metadata, &cfg).expect("load part");
    assert_eq!(loaded.node_count(), 1);
    let title = metadata.property_type_id("title").expect("declared");
    match loaded.node_props.get(&title).expect("container") {
        graphpart::PropertyContainer::String(c) => {
            assert_eq!(c.get(doc.0), Some("On Graphs"))
        }
        other => panic!("unexpected container: {:?}", other.value_type()),
    }
}
