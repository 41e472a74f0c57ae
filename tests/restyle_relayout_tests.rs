mod shared;

use std::cell::Cell;
use std::rc::Rc;

use chart_sync::error::{FigureError, InvalidValueKind};
use chart_sync::sync::{InboundMessage, OutboundMessage, SyncTransport};
use chart_sync::{ChannelState, Figure, SyncChannel};
use proptest::prelude::*;
use serde_json::{Value, json};

use shared::{config, connected_figure, figure, map, schema};

fn trace_values(figure: &Figure, path: &str) -> Vec<Option<Value>> {
    figure
        .traces()
        .iter()
        .map(|trace| trace.value(path).expect("readable path"))
        .collect()
}

#[test]
fn list_values_broadcast_per_trace() {
    let (figure, transport) = connected_figure(3);
    figure
        .restyle(&map(json!({"opacity": [0.2, 0.5]})), None)
        .expect("restyle");

    assert_eq!(
        trace_values(&figure, "opacity"),
        vec![Some(json!(0.2)), Some(json!(0.5)), Some(json!(0.2))]
    );
    assert_eq!(
        transport.take(),
        vec![OutboundMessage::Restyle {
            restyle_data: map(json!({"opacity": [0.2, 0.5, 0.2]})),
            trace_indexes: vec![0, 1, 2],
            style_edit_id: 1,
            layout_edit_id: 1,
        }]
    );
}

#[test]
fn scalar_values_apply_to_every_target() {
    let (figure, transport) = connected_figure(3);
    figure
        .restyle(&map(json!({"marker.color": "red"})), Some(&[0, 2]))
        .expect("restyle");

    assert_eq!(
        trace_values(&figure, "marker.color"),
        vec![Some(json!("red")), None, Some(json!("red"))]
    );
    let messages = transport.take();
    assert!(matches!(
        &messages[..],
        [OutboundMessage::Restyle { trace_indexes, .. }] if trace_indexes == &vec![0, 2]
    ));
}

#[test]
fn array_properties_are_wrapped_once_per_trace() {
    let (figure, _transport) = connected_figure(2);
    figure
        .restyle(&map(json!({"x": [[1, 2, 3], [4, 5]]})), None)
        .expect("restyle data arrays");
    assert_eq!(
        trace_values(&figure, "x"),
        vec![Some(json!([1, 2, 3])), Some(json!([4, 5]))]
    );
}

#[test]
fn empty_value_lists_are_skipped() {
    let (figure, transport) = connected_figure(2);
    figure
        .restyle(&map(json!({"opacity": []})), None)
        .expect("empty list");
    assert!(transport.is_empty());
}

#[test]
fn restyle_is_rejected_as_a_whole() {
    let (figure, transport) = connected_figure(2);
    let err = figure
        .restyle(&map(json!({"opacity": 0.3, "marker.size": [4, -1]})), None)
        .expect_err("second trace gets a negative size");
    match err {
        FigureError::InvalidValue(err) => {
            assert_eq!(err.kind, InvalidValueKind::OutOfRange);
            assert_eq!(err.property, "size");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(trace_values(&figure, "opacity"), vec![Some(json!(1.0)); 2]);
    assert!(transport.is_empty());
    assert_eq!(figure.channel_state(SyncChannel::Style), ChannelState::Idle);
}

#[test]
fn restyle_paths_must_exist() {
    let (figure, _transport) = connected_figure(1);
    let err = figure
        .restyle(&map(json!({"marker.colour": "red"})), None)
        .expect_err("typo");
    assert!(matches!(err, FigureError::UnknownProperty { .. }));

    let err = figure
        .restyle(&map(json!({"nonsense": null})), None)
        .expect_err("unknown deletion");
    assert!(matches!(err, FigureError::UnknownProperty { .. }));
}

#[test]
fn trace_indexes_are_bounds_checked() {
    let (figure, _transport) = connected_figure(3);
    let err = figure
        .restyle(&map(json!({"opacity": 0.5})), Some(&[1, 3]))
        .expect_err("index past the end");
    assert!(matches!(err, FigureError::TraceIndexOutOfRange { index: 3, len: 3 }));
}

#[test]
fn null_and_undefined_delete() {
    let (figure, transport) = connected_figure(2);
    figure
        .restyle(&map(json!({"name": [null, "_undefined_"]})), None)
        .expect("delete names");
    assert_eq!(trace_values(&figure, "name"), vec![None, None]);
    assert_eq!(
        transport.take(),
        vec![OutboundMessage::Restyle {
            restyle_data: map(json!({"name": [null, null]})),
            trace_indexes: vec![0, 1],
            style_edit_id: 1,
            layout_edit_id: 1,
        }]
    );
}

#[test]
fn unchanged_values_send_nothing() {
    let (figure, transport) = connected_figure(2);
    let hits = Rc::new(Cell::new(0));
    for trace in figure.traces() {
        let counter = Rc::clone(&hits);
        trace
            .on_change(&["opacity"], move |_| counter.set(counter.get() + 1))
            .expect("trace observer");
    }
    let counter = Rc::clone(&hits);
    figure
        .layout()
        .on_change(&["title"], move |_| counter.set(counter.get() + 1))
        .expect("layout observer");

    figure
        .restyle(&map(json!({"opacity": 1})), None)
        .expect("same opacity");
    figure
        .trace(0)
        .expect("first trace")
        .set("opacity", json!(1.0))
        .expect("same opacity through the node");
    figure
        .relayout(&map(json!({"title": null})))
        .expect("deleting an unset key");
    assert!(transport.is_empty());
    assert_eq!(figure.last_edit_id(SyncChannel::Style), 0);
    assert_eq!(hits.get(), 0);

    figure
        .restyle(&map(json!({"opacity": 0.5})), Some(&[1]))
        .expect("real change");
    assert_eq!(hits.get(), 1);
}

#[test]
fn node_edits_send_single_trace_restyles() {
    let (figure, transport) = connected_figure(2);
    let trace = figure.trace(1).expect("second trace");
    trace.set("marker.symbol", json!("circle-3")).expect("symbol");

    assert_eq!(
        transport.take(),
        vec![OutboundMessage::Restyle {
            restyle_data: map(json!({"marker.symbol": ["circle-3"]})),
            trace_indexes: vec![1],
            style_edit_id: 1,
            layout_edit_id: 1,
        }]
    );
    assert_eq!(figure.channel_state(SyncChannel::Style), ChannelState::Pending(1));
    assert_eq!(figure.channel_state(SyncChannel::Layout), ChannelState::Pending(1));
}

#[test]
fn relayout_applies_and_deletes() {
    let (figure, transport) = connected_figure(0);
    figure
        .relayout(&map(json!({"xaxis.range": [0, 10], "width": 500})))
        .expect("relayout");
    let layout = figure.layout();
    assert_eq!(layout.value("xaxis.range").expect("range"), Some(json!([0, 10])));
    assert_eq!(layout.value("width").expect("width"), Some(json!(500)));

    figure
        .relayout(&map(json!({"xaxis.range[1]": 20, "width": null})))
        .expect("element edit and deletion");
    assert_eq!(layout.value("xaxis.range").expect("range"), Some(json!([0, 20])));
    assert_eq!(layout.value("width").expect("width"), None);

    let messages = transport.take();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1],
        OutboundMessage::Relayout {
            relayout_data: map(json!({"xaxis.range[1]": 20, "width": null})),
            layout_edit_id: 2,
        }
    );
    assert_eq!(figure.channel_state(SyncChannel::Style), ChannelState::Idle);
    assert_eq!(figure.channel_state(SyncChannel::Layout), ChannelState::Pending(2));
}

#[test]
fn relayout_validates_before_committing() {
    let (figure, transport) = connected_figure(0);
    let err = figure
        .relayout(&map(json!({"height": 300, "width": 5})))
        .expect_err("width below minimum");
    assert!(matches!(err, FigureError::InvalidValue(_)));
    assert_eq!(figure.layout().value("height").expect("height"), None);
    assert!(transport.is_empty());
}

#[test]
fn relayout_reaches_subplot_family_members() {
    let (figure, _transport) = connected_figure(0);
    figure
        .relayout(&map(json!({"xaxis2.title": "second", "yaxis3.type": "log"})))
        .expect("family members");
    assert_eq!(
        figure.layout().value("xaxis2.title").expect("title"),
        Some(json!("second"))
    );

    for rejected in ["xaxis1.title", "xaxis0.title"] {
        let mut request = serde_json::Map::new();
        request.insert(rejected.to_owned(), json!("t"));
        let err = figure.relayout(&request).expect_err("not a family member");
        assert!(matches!(err, FigureError::UnknownProperty { .. }), "{rejected}");
    }
}

#[test]
fn trace_subplot_references_skip_index_one() {
    let (figure, _transport) = connected_figure(1);
    figure
        .restyle(&map(json!({"xaxis": "x2", "yaxis": "y"})), None)
        .expect("valid references");
    for rejected in ["x1", "x0", "y2"] {
        let err = figure
            .restyle(&map(json!({"xaxis": rejected})), None)
            .expect_err("invalid reference");
        assert!(matches!(err, FigureError::InvalidValue(_)), "{rejected}");
    }
}

#[test]
fn edits_without_transport_complete_immediately() {
    let figure = figure();
    figure
        .add_trace_from_value(json!({"type": "scatter"}))
        .expect("trace");
    figure
        .restyle(&map(json!({"opacity": 0.4})), None)
        .expect("restyle");
    assert_eq!(figure.channel_state(SyncChannel::Style), ChannelState::Idle);
    assert_eq!(figure.last_edit_id(SyncChannel::Style), 1);
}

#[test]
fn surface_edits_are_validated_by_default() {
    let (figure, transport) = connected_figure(2);
    figure
        .handle_inbound(InboundMessage::RestyleFromSurface {
            restyle_data: map(json!({"visible": [false]})),
            trace_indexes: None,
        })
        .expect("legend toggle");
    assert_eq!(
        trace_values(&figure, "visible"),
        vec![Some(json!(false)), Some(json!(false))]
    );
    assert_eq!(transport.take().len(), 1);

    let err = figure
        .handle_inbound(InboundMessage::RelayoutFromSurface {
            relayout_data: map(json!({"xaxis.tickangle": "steep"})),
        })
        .expect_err("tick angle must be a number");
    assert!(matches!(err, FigureError::InvalidValue(_)));
}

#[test]
fn surface_edit_validation_can_be_disabled() {
    let figure = Figure::with_config(schema(), config().with_surface_edit_validation(false))
        .expect("figure");
    figure
        .handle_inbound(InboundMessage::RelayoutFromSurface {
            relayout_data: map(json!({"xaxis.autorange": "reversed"})),
        })
        .expect("taken as sent");
    assert_eq!(
        figure.layout().value("xaxis.autorange").expect("autorange"),
        Some(json!("reversed"))
    );
}

struct ClosedTransport;

impl SyncTransport for ClosedTransport {
    fn send(&mut self, _message: &OutboundMessage) -> Result<(), FigureError> {
        Err(FigureError::Transport("surface closed".to_owned()))
    }
}

#[test]
fn failed_sends_leave_channels_idle() {
    let (figure, _transport) = connected_figure(1);
    figure.set_transport(ClosedTransport);
    figure
        .relayout(&map(json!({"width": 300})))
        .expect("the edit itself is committed");
    assert_eq!(figure.layout().value("width").expect("width"), Some(json!(300)));
    assert_eq!(figure.last_edit_id(SyncChannel::Layout), 1);
    assert_eq!(figure.channel_state(SyncChannel::Layout), ChannelState::Idle);
}

proptest! {
    #[test]
    fn broadcast_law_holds(
        values in prop::collection::vec(0.0f64..=1.0, 1..6),
        trace_count in 1usize..7,
    ) {
        let (figure, _transport) = connected_figure(trace_count);
        let request = map(json!({"opacity": values.clone()}));
        figure.restyle(&request, None).expect("restyle");
        for (index, trace) in figure.traces().iter().enumerate() {
            let stored = trace.value("opacity").expect("opacity").expect("opacity is set");
            prop_assert_eq!(stored, json!(values[index % values.len()]));
        }
    }
}
