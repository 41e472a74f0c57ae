//! Figure root: trace and layout ownership, the restyle/relayout protocol,
//! delta application and change dispatch.

mod batch;
mod config;
mod deltas;
mod dispatch;
mod figure;
mod inbound;
mod relayout;
mod restyle;
mod schema;
mod sync_state;
mod traces;

pub use config::{FigureConfig, UidStrategy};
pub use figure::Figure;
pub use schema::FigureSchema;
pub use sync_state::{ChannelState, CompletionCallback, SyncChannel};

pub(crate) use figure::FigureState;
