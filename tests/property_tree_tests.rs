use chart_sync::core::tree::{
    deep_merge, is_deletion, leaf_paths, remove_overlapping, set_in, values_equal,
};
use chart_sync::core::{PathKey, PropertyPath};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn dotted_and_bracketed_paths_agree() {
    let dotted = PropertyPath::parse("shapes.0.line.color");
    let bracketed = PropertyPath::parse("shapes[0].line.color");
    assert_eq!(dotted, bracketed);
    assert_eq!(dotted.len(), 4);
    assert_eq!(dotted.first(), Some(&PathKey::Key("shapes".into())));
    assert_eq!(dotted.to_string(), "shapes[0].line.color");
}

#[test]
fn prefix_relations() {
    let marker = PropertyPath::parse("marker");
    let color = PropertyPath::parse("marker.color");
    let size = PropertyPath::parse("marker.size");
    assert!(color.starts_with(&marker));
    assert!(!marker.starts_with(&color));
    assert!(marker.overlaps(&color));
    assert!(color.overlaps(&marker));
    assert!(!color.overlaps(&size));
    assert_eq!(color.suffix(1), PropertyPath::parse("color"));
    assert_eq!(
        size.prefixed(&[PathKey::Key("layout".into())]).to_string(),
        "layout.marker.size"
    );
}

#[test]
fn set_in_builds_intermediate_containers() {
    let mut root = Map::new();
    assert!(set_in(&mut root, &PropertyPath::parse("xaxis.range[1]"), Some(json!(5))));
    assert_eq!(Value::Object(root.clone()), json!({"xaxis": {"range": [null, 5]}}));

    assert!(!set_in(&mut root, &PropertyPath::parse("xaxis.range[1]"), Some(json!(5.0))));
    assert!(set_in(&mut root, &PropertyPath::parse("xaxis.range[1]"), None));
    assert_eq!(Value::Object(root.clone()), json!({"xaxis": {"range": [null, null]}}));

    assert!(set_in(&mut root, &PropertyPath::parse("xaxis"), Some(Value::Null)));
    assert!(root.is_empty());
    assert!(!set_in(&mut root, &PropertyPath::parse("yaxis.title"), None));
}

#[test]
fn numeric_equality_ignores_representation() {
    assert!(values_equal(&json!(1), &json!(1.0)));
    assert!(values_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2.0]})));
    assert!(!values_equal(&json!([1]), &json!([1, 2])));
    assert!(!values_equal(&json!("1"), &json!(1)));
}

#[test]
fn deletion_markers() {
    assert!(is_deletion(&json!(null)));
    assert!(is_deletion(&json!("_undefined_")));
    assert!(!is_deletion(&json!("")));
    assert!(!is_deletion(&json!(0)));
}

#[test]
fn deep_merge_recurses_into_mappings_and_mapping_lists() {
    let mut target = object(json!({
        "marker": {"color": "red", "size": 4},
        "shapes": [{"type": "rect"}, {"type": "line"}],
        "range": [0, 1]
    }));
    let delta = object(json!({
        "marker": {"size": 8},
        "shapes": [{"x0": 1}],
        "range": [2, 3]
    }));
    deep_merge(&mut target, &delta);
    assert_eq!(
        Value::Object(target),
        json!({
            "marker": {"color": "red", "size": 8},
            "shapes": [{"type": "rect", "x0": 1}, {"type": "line"}],
            "range": [2, 3]
        })
    );
}

#[test]
fn overlap_removal_strips_surface_owned_values() {
    let mut input = object(json!({
        "uid": "trace-1",
        "marker": {"color": "red", "size": 4},
        "xaxis": {"range": [0, 1]},
        "name": "a"
    }));
    let delta = object(json!({
        "uid": "trace-1",
        "marker": {"color": "blue"},
        "xaxis": {"range": [3, 4]}
    }));
    let removed = remove_overlapping(&mut input, &delta, &PropertyPath::new());
    assert_eq!(
        removed,
        vec![
            PropertyPath::parse("marker.color"),
            PropertyPath::parse("xaxis.range"),
            PropertyPath::parse("xaxis"),
        ]
    );
    assert_eq!(
        Value::Object(input),
        json!({"uid": "trace-1", "marker": {"size": 4}, "name": "a"})
    );
}

#[test]
fn overlap_removal_drops_emptied_compounds() {
    let mut input = object(json!({"xaxis": {"autorange": true}, "width": 400}));
    let delta = object(json!({"xaxis": {"autorange": false}, "width": 500}));
    let removed = remove_overlapping(&mut input, &delta, &PropertyPath::parse("layout"));
    assert_eq!(
        removed,
        vec![
            PropertyPath::parse("layout.xaxis.autorange"),
            PropertyPath::parse("layout.xaxis"),
            PropertyPath::parse("layout.width"),
        ]
    );
    assert!(input.is_empty());
}

#[test]
fn overlap_removal_walks_lists_of_mappings() {
    let mut input = object(json!({"shapes": [{"x0": 1, "type": "rect"}, {"x0": 2}]}));
    let delta = object(json!({"shapes": [{"x0": 9}, {"y0": 3}]}));
    let removed = remove_overlapping(&mut input, &delta, &PropertyPath::new());
    assert_eq!(removed, vec![PropertyPath::parse("shapes[0].x0")]);
    assert_eq!(
        Value::Object(input),
        json!({"shapes": [{"type": "rect"}, {"x0": 2}]})
    );
}

#[test]
fn leaf_paths_descend_compound_values() {
    let delta = object(json!({
        "marker": {"color": "red", "line": {"width": 2}},
        "shapes": [{"x0": 1}],
        "range": [0, 1],
        "title": {}
    }));
    let paths: Vec<String> = leaf_paths(&delta).iter().map(ToString::to_string).collect();
    assert_eq!(
        paths,
        vec!["marker.color", "marker.line.width", "shapes[0].x0", "range", "title"]
    );
}

fn path_strategy() -> impl Strategy<Value = Vec<(String, Option<usize>)>> {
    prop::collection::vec(("[a-z][a-z0-9_]{0,6}", prop::option::of(0usize..50)), 1..5)
}

proptest! {
    #[test]
    fn rendered_paths_parse_back(segments in path_strategy()) {
        let mut path = PropertyPath::new();
        for (key, index) in &segments {
            path.push(key.as_str());
            if let Some(index) = index {
                path.push(*index);
            }
        }
        prop_assert_eq!(PropertyPath::parse(&path.to_string()), path);
    }

    #[test]
    fn set_then_delete_leaves_nothing_behind(key in "[a-z]{1,8}", value in -1_000i64..1_000) {
        let mut root = Map::new();
        let path = PropertyPath::parse(&format!("outer.{key}"));
        prop_assert!(set_in(&mut root, &path, Some(json!(value))));
        prop_assert!(set_in(&mut root, &path, None));
        prop_assert_eq!(Value::Object(root), json!({"outer": {}}));
    }
}
