//! Message boundary with the rendering surface.

mod messages;
mod recording;

pub use messages::{InboundMessage, OutboundMessage};
pub use recording::RecordingTransport;

use crate::error::FigureResult;

/// Contract implemented by anything that carries messages to the surface.
///
/// The figure calls `send` synchronously after committing a change; replies
/// come back through [`crate::api::Figure::handle_inbound`], possibly from
/// inside `send` itself.
pub trait SyncTransport {
    fn send(&mut self, message: &OutboundMessage) -> FigureResult<()>;
}
