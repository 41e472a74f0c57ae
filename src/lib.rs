//! chart-sync: a strongly-typed chart figure tree kept in sync with a
//! remote rendering surface.
//!
//! A [`Figure`] owns an ordered list of trace [`Node`]s and one layout node.
//! Every property assignment goes through a [`Validator`]; committed changes
//! are reported to observers and sent to the surface as restyle/relayout
//! messages over a [`SyncTransport`]. Values the surface recomputes come back
//! as deltas and are kept in a separate overlay.

pub mod api;
pub mod core;
pub mod error;
pub mod interaction;
pub mod node;
pub mod sync;
pub mod telemetry;
pub mod validators;

pub use api::{ChannelState, Figure, FigureConfig, FigureSchema, SyncChannel, UidStrategy};
pub use crate::core::{PathKey, PropertyPath};
pub use error::{
    FigureError, FigureResult, InvalidValueError, InvalidValueKind, TraceAssignmentError,
};
pub use interaction::{Points, PointsCallbackEvent, PointsEvent, PointsEventKind};
pub use node::{ChangeEvent, Node, NodeClass, Property, PropertyValue};
pub use sync::{InboundMessage, OutboundMessage, RecordingTransport, SyncTransport};
pub use validators::Validator;
