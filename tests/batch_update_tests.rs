mod shared;

use std::cell::Cell;
use std::rc::Rc;

use chart_sync::error::FigureError;
use chart_sync::sync::OutboundMessage;
use serde_json::json;

use shared::{connected_figure, map};

#[test]
fn batched_edits_are_grouped_by_changed_paths() {
    let (figure, transport) = connected_figure(3);
    let traces = figure.traces();
    let layout = figure.layout();

    figure
        .batch_update(|_| {
            traces[0].set("opacity", json!(0.5))?;
            traces[1].set("opacity", json!(0.7))?;
            traces[2].set("name", json!("z"))?;
            layout.set("width", json!(600))?;
            Ok(())
        })
        .expect("batch");

    assert_eq!(
        transport.take(),
        vec![
            OutboundMessage::Restyle {
                restyle_data: map(json!({"opacity": [0.5, 0.7]})),
                trace_indexes: vec![0, 1],
                style_edit_id: 1,
                layout_edit_id: 1,
            },
            OutboundMessage::Restyle {
                restyle_data: map(json!({"name": ["z"]})),
                trace_indexes: vec![2],
                style_edit_id: 2,
                layout_edit_id: 2,
            },
            OutboundMessage::Relayout {
                relayout_data: map(json!({"width": 600})),
                layout_edit_id: 3,
            },
        ]
    );
}

#[test]
fn observers_run_once_after_the_batch() {
    let (figure, transport) = connected_figure(1);
    let trace = figure.trace(0).expect("trace");
    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    trace
        .on_change(&["opacity"], move |_| counter.set(counter.get() + 1))
        .expect("observer");

    figure
        .batch_update(|figure| {
            trace.set("opacity", json!(0.5))?;
            trace.set("opacity", json!(0.6))?;
            assert!(figure.in_batch());
            assert_eq!(hits.get(), 0);
            assert!(transport.is_empty());
            Ok(())
        })
        .expect("batch");

    assert_eq!(hits.get(), 1);
    assert!(!figure.in_batch());
    let messages = transport.take();
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        &messages[0],
        OutboundMessage::Restyle { restyle_data, .. } if restyle_data == &map(json!({"opacity": [0.6]}))
    ));
    assert_eq!(trace.value("opacity").expect("opacity"), Some(json!(0.6)));
}

#[test]
fn restyle_and_relayout_join_an_open_batch() {
    let (figure, transport) = connected_figure(2);
    figure
        .batch_update(|figure| {
            figure.restyle(&map(json!({"visible": false})), None)?;
            figure.relayout(&map(json!({"title": "quarterly"})))?;
            assert!(transport.is_empty());
            assert_eq!(
                figure.layout().value("title").expect("title"),
                Some(json!("quarterly"))
            );
            Ok(())
        })
        .expect("batch");

    let kinds: Vec<&str> = transport.take().iter().map(OutboundMessage::kind).collect();
    assert_eq!(kinds, vec!["restyle", "relayout"]);
}

#[test]
fn nested_batches_flush_with_the_outer_one() {
    let (figure, transport) = connected_figure(1);
    let trace = figure.trace(0).expect("trace");
    figure
        .batch_update(|figure| {
            figure.batch_update(|_| trace.set("name", json!("inner")))?;
            assert!(figure.in_batch());
            assert!(transport.is_empty());
            trace.set("opacity", json!(0.4))
        })
        .expect("outer batch");

    let messages = transport.take();
    assert_eq!(messages.len(), 1);
    let OutboundMessage::Restyle { restyle_data, .. } = &messages[0] else {
        panic!("expected a restyle, got {:?}", messages[0]);
    };
    assert_eq!(restyle_data.get("name"), Some(&json!(["inner"])));
    assert_eq!(restyle_data.get("opacity"), Some(&json!([0.4])));
}

#[test]
fn committed_edits_flush_when_the_batch_fails() {
    let (figure, transport) = connected_figure(1);
    let trace = figure.trace(0).expect("trace");
    let err = figure
        .batch_update(|_| {
            trace.set("opacity", json!(0.2))?;
            trace.set("opacity", json!(5))?;
            Ok(())
        })
        .expect_err("second edit is out of range");
    assert!(matches!(err, FigureError::InvalidValue(_)));

    assert!(!figure.in_batch());
    assert_eq!(trace.value("opacity").expect("opacity"), Some(json!(0.2)));
    assert_eq!(transport.take().len(), 1);
}

#[test]
fn empty_batches_send_nothing() {
    let (figure, transport) = connected_figure(2);
    figure.batch_update(|_| Ok(())).expect("empty batch");
    figure
        .batch_update(|figure| figure.restyle(&map(json!({"opacity": 1.0})), None))
        .expect("no-op batch");
    assert!(transport.is_empty());
}
