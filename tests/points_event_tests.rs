mod shared;

use std::rc::Rc;

use chart_sync::interaction::{
    InputDeviceState, PointsCallbackEvent, PointsEvent, PointsEventKind, RawPoints,
    SelectorGeometry,
};
use chart_sync::sync::InboundMessage;
use serde_json::json;

use shared::{call_log, connected_figure};

fn click(point_indexes: Vec<usize>, trace_indexes: Vec<usize>) -> PointsEvent {
    let xs = point_indexes.iter().map(|&index| json!(index)).collect();
    let ys = point_indexes.iter().map(|&index| json!(index * 10)).collect();
    PointsEvent {
        event_kind: PointsEventKind::Click,
        points: RawPoints {
            xs,
            ys,
            point_indexes,
            trace_indexes,
        },
        selector: None,
        device_state: None,
    }
}

#[test]
fn each_trace_receives_only_its_points() {
    let (figure, _transport) = connected_figure(3);
    let seen = call_log::<(usize, Vec<usize>)>();
    for trace in figure.traces() {
        let log = Rc::clone(&seen);
        trace.on_click(move |event: &PointsCallbackEvent| {
            log.borrow_mut()
                .push((event.points.trace_index, event.points.point_indexes.clone()));
        });
    }

    figure.dispatch_points_event(&click(vec![5, 1, 8], vec![2, 0, 2]));

    assert_eq!(*seen.borrow(), vec![(2, vec![5, 8]), (0, vec![1])]);
}

#[test]
fn listeners_only_see_their_event_kind() {
    let (figure, _transport) = connected_figure(1);
    let trace = figure.trace(0).expect("trace");
    let kinds = call_log::<PointsEventKind>();
    let hover_log = Rc::clone(&kinds);
    trace.on_hover(move |event| hover_log.borrow_mut().push(event.kind));
    let unhover_log = Rc::clone(&kinds);
    trace.on_unhover(move |event| unhover_log.borrow_mut().push(event.kind));

    figure.dispatch_points_event(&click(vec![0], vec![0]));
    assert!(kinds.borrow().is_empty());

    let mut hover = click(vec![0], vec![0]);
    hover.event_kind = PointsEventKind::Hover;
    figure.dispatch_points_event(&hover);
    hover.event_kind = PointsEventKind::Unhover;
    figure.dispatch_points_event(&hover);
    assert_eq!(
        *kinds.borrow(),
        vec![PointsEventKind::Hover, PointsEventKind::Unhover]
    );
}

#[test]
fn registration_replaces_unless_appending() {
    let (figure, _transport) = connected_figure(1);
    let trace = figure.trace(0).expect("trace");
    let calls = call_log::<&'static str>();

    let first = Rc::clone(&calls);
    trace.on_click(move |_| first.borrow_mut().push("first"));
    let second = Rc::clone(&calls);
    trace.on_click(move |_| second.borrow_mut().push("second"));
    let third = Rc::clone(&calls);
    trace.on_points_event(
        PointsEventKind::Click,
        move |_| third.borrow_mut().push("third"),
        true,
    );

    figure.dispatch_points_event(&click(vec![3], vec![0]));
    assert_eq!(*calls.borrow(), vec!["second", "third"]);
}

#[test]
fn selection_carries_selector_and_device_state() {
    let (figure, _transport) = connected_figure(2);
    let trace = figure.trace(1).expect("trace");
    let seen = call_log::<PointsCallbackEvent>();
    let log = Rc::clone(&seen);
    trace.on_selection(move |event| log.borrow_mut().push(event.clone()));

    let message: InboundMessage = serde_json::from_value(json!({
        "type": "points_event",
        "event_kind": "selection",
        "points": {
            "xs": [1.5, 2.5],
            "ys": [3, 4],
            "point_indexes": [0, 1],
            "trace_indexes": [1, 1]
        },
        "selector": {"selector_type": "box", "xrange": [1.0, 3.0], "yrange": [2.0, 5.0]},
        "device_state": {"shift": true, "button": 0, "buttons": 1}
    }))
    .expect("points event message");
    figure.handle_inbound(message).expect("dispatch");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    let event = &seen[0];
    assert!(event.trace.ptr_eq(&trace));
    assert_eq!(event.points.xs, vec![json!(1.5), json!(2.5)]);
    assert_eq!(
        event.selector,
        Some(SelectorGeometry::Box {
            xrange: [1.0, 3.0],
            yrange: [2.0, 5.0],
        })
    );
    assert_eq!(
        event.device_state,
        Some(InputDeviceState {
            shift: true,
            buttons: 1,
            ..InputDeviceState::default()
        })
    );
}

#[test]
fn lasso_selectors_deserialize() {
    let event: PointsEvent = serde_json::from_value(json!({
        "event_kind": "selection",
        "points": {"point_indexes": [], "trace_indexes": []},
        "selector": {"selector_type": "lasso", "xs": [0.0, 1.0, 0.5], "ys": [0.0, 0.0, 1.0]}
    }))
    .expect("lasso event");
    assert!(matches!(
        event.selector,
        Some(SelectorGeometry::Lasso { ref xs, .. }) if xs.len() == 3
    ));
    assert!(event.group_by_trace().is_empty());
}

#[test]
fn points_for_unknown_traces_are_skipped() {
    let (figure, _transport) = connected_figure(1);
    let seen = call_log::<usize>();
    let log = Rc::clone(&seen);
    figure
        .trace(0)
        .expect("trace")
        .on_click(move |event| log.borrow_mut().push(event.points.point_indexes.len()));

    figure.dispatch_points_event(&click(vec![1, 2, 3], vec![4, 0, 4]));
    assert_eq!(*seen.borrow(), vec![1]);
}

#[test]
fn mismatched_arrays_are_truncated() {
    let event = PointsEvent {
        event_kind: PointsEventKind::Hover,
        points: RawPoints {
            xs: vec![json!("a"), json!("b"), json!("c")],
            ys: Vec::new(),
            point_indexes: vec![10, 11, 12],
            trace_indexes: vec![0, 1],
        },
        selector: None,
        device_state: None,
    };
    let grouped = event.group_by_trace();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].point_indexes, vec![10]);
    assert_eq!(grouped[0].xs, vec![json!("a")]);
    assert!(grouped[1].ys.is_empty());
}

#[test]
fn traces_without_listeners_are_ignored() {
    let (figure, transport) = connected_figure(2);
    figure.dispatch_points_event(&click(vec![0, 1], vec![0, 1]));
    assert!(transport.is_empty());
}
