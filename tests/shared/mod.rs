#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use chart_sync::api::{Figure, FigureConfig, FigureSchema, UidStrategy};
use chart_sync::node::NodeClass;
use chart_sync::sync::RecordingTransport;
use chart_sync::validators::{
    AngleValidator, BooleanValidator, ColorValidator, CompoundArrayValidator, CompoundValidator,
    DataArrayValidator, EnumeratedValidator, FlaglistValidator, InfoArrayValidator,
    IntegerValidator, NumberValidator, StringValidator, SubplotidValidator, Validator,
};
use serde_json::{Map, Value, json};

pub fn line_class(parent: &str) -> Rc<NodeClass> {
    let type_name = format!("{parent}.line");
    NodeClass::builder(type_name.as_str())
        .property(ColorValidator::new("color", type_name.as_str()))
        .property(NumberValidator::new("width", type_name.as_str()).with_range(Some(0.0), None))
        .property(EnumeratedValidator::new(
            "dash",
            type_name.as_str(),
            ["solid", "dot", "dash", "/[0-9]+px,[0-9]+px/"],
        ))
        .build()
}

pub fn marker_class(parent: &str) -> Rc<NodeClass> {
    let type_name = format!("{parent}.marker");
    NodeClass::builder(type_name.as_str())
        .property(ColorValidator::new("color", type_name.as_str()).array_ok())
        .property(
            NumberValidator::new("size", type_name.as_str())
                .with_range(Some(0.0), None)
                .with_default(6)
                .array_ok(),
        )
        .property(
            NumberValidator::new("opacity", type_name.as_str())
                .with_range(Some(0.0), Some(1.0))
                .array_ok(),
        )
        .property(
            EnumeratedValidator::new(
                "symbol",
                type_name.as_str(),
                ["circle", "square", "diamond", "/circle-[0-9]+/"],
            )
            .array_ok(),
        )
        .property(CompoundValidator::new("line", type_name.as_str(), line_class(&type_name)))
        .build()
}

pub fn scatter_class() -> Rc<NodeClass> {
    NodeClass::builder("scatter")
        .trace("scatter")
        .property(DataArrayValidator::new("x", "scatter"))
        .property(DataArrayValidator::new("y", "scatter"))
        .property(StringValidator::new("name", "scatter"))
        .property(
            NumberValidator::new("opacity", "scatter")
                .with_range(Some(0.0), Some(1.0))
                .with_default(1.0),
        )
        .property(BooleanValidator::new("visible", "scatter"))
        .property(
            FlaglistValidator::new("mode", "scatter", ["lines", "markers", "text"], ["none"])
                .with_default("markers"),
        )
        .property(SubplotidValidator::new("xaxis", "scatter", "x"))
        .property(SubplotidValidator::new("yaxis", "scatter", "y"))
        .property(CompoundValidator::new("marker", "scatter", marker_class("scatter")))
        .property(CompoundValidator::new("line", "scatter", line_class("scatter")))
        .build()
}

pub fn bar_class() -> Rc<NodeClass> {
    NodeClass::builder("bar")
        .trace("bar")
        .property(DataArrayValidator::new("x", "bar"))
        .property(DataArrayValidator::new("y", "bar"))
        .property(EnumeratedValidator::new("orientation", "bar", ["v", "h"]))
        .property(IntegerValidator::new("offsetgroup", "bar").with_range(Some(0), None))
        .property(CompoundValidator::new("marker", "bar", marker_class("bar")))
        .build()
}

pub fn axis_class() -> Rc<NodeClass> {
    let range = InfoArrayValidator::new(
        "range",
        "layout.xaxis",
        &[json!({"valType": "any"}), json!({"valType": "any"})],
    )
    .expect("range items are valid schema fragments");
    NodeClass::builder("layout.xaxis")
        .property(range)
        .property(BooleanValidator::new("autorange", "layout.xaxis"))
        .property(StringValidator::new("title", "layout.xaxis"))
        .property(EnumeratedValidator::new(
            "type",
            "layout.xaxis",
            ["-", "linear", "log", "date", "category"],
        ))
        .property(AngleValidator::new("tickangle", "layout.xaxis"))
        .property(ColorValidator::new("gridcolor", "layout.xaxis"))
        .build()
}

pub fn shape_class() -> Rc<NodeClass> {
    NodeClass::builder("layout.shape")
        .property(EnumeratedValidator::new("type", "layout.shape", ["rect", "circle", "line"]))
        .property(chart_sync::validators::AnyValidator::new("x0", "layout.shape"))
        .property(chart_sync::validators::AnyValidator::new("x1", "layout.shape"))
        .property(chart_sync::validators::AnyValidator::new("y0", "layout.shape"))
        .property(chart_sync::validators::AnyValidator::new("y1", "layout.shape"))
        .property(CompoundValidator::new("line", "layout.shape", line_class("layout.shape")))
        .build()
}

pub fn layout_class() -> Rc<NodeClass> {
    let axis = axis_class();
    let x_family = Rc::clone(&axis);
    let y_family = Rc::clone(&axis);
    NodeClass::builder("layout")
        .property(StringValidator::new("title", "layout"))
        .property(NumberValidator::new("width", "layout").with_range(Some(10.0), None))
        .property(NumberValidator::new("height", "layout").with_range(Some(10.0), None))
        .property(ColorValidator::new("paper_bgcolor", "layout"))
        .property(BooleanValidator::new("showlegend", "layout"))
        .property(CompoundValidator::new("xaxis", "layout", Rc::clone(&axis)))
        .property(CompoundValidator::new("yaxis", "layout", Rc::clone(&axis)))
        .property(CompoundArrayValidator::new("shapes", "layout", shape_class()))
        .subplot_family("xaxis", move |name| {
            Validator::from(CompoundValidator::new(name, "layout", Rc::clone(&x_family)))
        })
        .subplot_family("yaxis", move |name| {
            Validator::from(CompoundValidator::new(name, "layout", Rc::clone(&y_family)))
        })
        .build()
}

pub fn schema() -> FigureSchema {
    FigureSchema::new(layout_class())
        .with_trace_class(scatter_class())
        .expect("scatter registers")
        .with_trace_class(bar_class())
        .expect("bar registers")
}

pub fn config() -> FigureConfig {
    FigureConfig::new().with_uid_strategy(UidStrategy::Sequential)
}

pub fn figure() -> Figure {
    Figure::with_config(schema(), config()).expect("figure init")
}

/// Figure with `traces` scatter traces and a recording transport whose log
/// starts empty.
pub fn connected_figure(traces: usize) -> (Figure, RecordingTransport) {
    let figure = figure();
    for index in 0..traces {
        figure
            .add_trace_from_value(json!({"type": "scatter", "name": format!("trace {index}")}))
            .expect("add scatter trace");
    }
    let transport = RecordingTransport::new();
    figure.set_transport(transport.clone());
    (figure, transport)
}

pub fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Shared log of observer invocations.
pub fn call_log<T: 'static>() -> Rc<RefCell<Vec<T>>> {
    Rc::new(RefCell::new(Vec::new()))
}
