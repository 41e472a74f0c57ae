use std::cell::RefCell;
use std::rc::Rc;

use crate::error::FigureResult;

use super::{OutboundMessage, SyncTransport};

/// Transport that keeps every message it is given.
///
/// Clones share the same log, so a test can keep one handle while the figure
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Rc<RefCell<Vec<OutboundMessage>>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.borrow().clone()
    }

    /// Returns and clears the log.
    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.borrow().is_empty()
    }
}

impl SyncTransport for RecordingTransport {
    fn send(&mut self, message: &OutboundMessage) -> FigureResult<()> {
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}
