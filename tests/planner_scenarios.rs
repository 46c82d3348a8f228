//! End-to-end planning sessions against in-memory storage

use factory_planner::catalog::Catalog;
use factory_planner::db;
use factory_planner::factory_types::{FactoryTypeDraft, FactoryTypeRegistry, Side};
use factory_planner::graph::FactoryGraph;
use factory_planner::models::{FactoryType, Position};
use rusqlite::Connection;

fn storage() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn wire_mill(catalog: &Catalog, rate: f64) -> FactoryType {
    let mut draft = FactoryTypeDraft::with_id("custom-1");
    draft.set_name("Wire Mill");
    let i = draft.add_input();
    draft.set_item(Side::Input, i, "copper-wire", catalog).unwrap();
    draft.set_rate(Side::Input, i, rate).unwrap();
    draft.finish().unwrap()
}

fn status(graph: &FactoryGraph, node: &str, input: &str) -> bool {
    graph.node(node).unwrap().data.input_status[input]
}

#[test]
fn steel_factory_without_supply_is_short() {
    let registry = FactoryTypeRegistry::default();
    let mut graph = FactoryGraph::new();
    let steel = graph.add_factory(registry.get("steel").unwrap(), Position::default()).unwrap();

    assert!(!status(&graph, &steel, "iron-ore"));
}

#[test]
fn copper_wire_session_with_persistence() {
    let conn = storage();
    let catalog = Catalog::bundled().unwrap();
    let mut registry = FactoryTypeRegistry::new(db::load_custom_types(&conn).unwrap());
    registry.save_custom(wire_mill(&catalog, 100.0));
    db::save_custom_types(&conn, registry.custom()).unwrap();

    let mut graph = db::load_flow(&conn).unwrap();
    let copper = graph.add_factory(registry.get("copper").unwrap(), Position::default()).unwrap();
    let mill = graph
        .add_factory(registry.get("custom-1").unwrap(), Position { x: 300.0, y: 0.0 })
        .unwrap();

    // 120 >= 100
    let edge = graph.connect(&copper, "copper-wire", &mill, "copper-wire").unwrap();
    assert!(status(&graph, &mill, "copper-wire"));
    db::save_flow(&conn, &graph).unwrap();

    // 120 < 200 once the mill doubles
    let mut graph = db::load_flow(&conn).unwrap();
    graph.set_scale(&mill, 2).unwrap();
    assert!(!status(&graph, &mill, "copper-wire"));
    db::save_flow(&conn, &graph).unwrap();

    // deleting the only feed leaves the mill short at any scale
    let mut graph = db::load_flow(&conn).unwrap();
    graph.set_scale(&mill, 1).unwrap();
    assert!(status(&graph, &mill, "copper-wire"));
    graph.disconnect(&edge).unwrap();
    assert!(!status(&graph, &mill, "copper-wire"));
    db::save_flow(&conn, &graph).unwrap();

    let reloaded = db::load_flow(&conn).unwrap();
    assert!(!status(&reloaded, &mill, "copper-wire"));
    assert_eq!(
        FactoryTypeRegistry::new(db::load_custom_types(&conn).unwrap())
            .get("custom-1")
            .unwrap()
            .name,
        "Wire Mill"
    );
}

#[test]
fn two_half_feeds_meet_exact_demand() {
    let catalog = Catalog::bundled().unwrap();
    let mut half = FactoryTypeDraft::with_id("custom-half");
    half.set_name("Half Wire");
    let o = half.add_output();
    half.set_item(Side::Output, o, "copper-wire", &catalog).unwrap();
    half.set_rate(Side::Output, o, 60.0).unwrap();
    let half = half.finish().unwrap();

    let mut graph = FactoryGraph::new();
    let a = graph.add_factory(&half, Position::default()).unwrap();
    let b = graph.add_factory(&half, Position::default()).unwrap();
    let mill = graph.add_factory(&wire_mill(&catalog, 120.0), Position::default()).unwrap();

    graph.connect(&a, "copper-wire", &mill, "copper-wire").unwrap();
    assert!(!status(&graph, &mill, "copper-wire"));
    graph.connect(&b, "copper-wire", &mill, "copper-wire").unwrap();
    assert!(status(&graph, &mill, "copper-wire"));
}
