use serde::{Deserialize, Serialize};
use tracing::debug;

/// The two synchronization channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncChannel {
    /// Restyle messages, scoped to traces.
    Style,
    /// Relayout messages, scoped to the whole layout.
    Layout,
}

impl SyncChannel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Layout => "layout",
        }
    }
}

/// `Idle → Pending(id) → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    /// Waiting for the surface to echo message `id`.
    Pending(u64),
}

pub type CompletionCallback = Box<dyn FnOnce()>;

#[derive(Default)]
pub(crate) struct ChannelSync {
    last_sent: u64,
    state: Option<u64>,
    waiting: Vec<CompletionCallback>,
}

impl ChannelSync {
    /// Next message id for this channel.
    pub(crate) fn mint(&mut self) -> u64 {
        self.last_sent += 1;
        self.last_sent
    }

    pub(crate) fn last_sent(&self) -> u64 {
        self.last_sent
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state.map_or(ChannelState::Idle, ChannelState::Pending)
    }

    pub(crate) fn mark_pending(&mut self, id: u64) {
        self.state = Some(id);
    }

    /// Puts back `previous` if the channel is still waiting on `id`.
    pub(crate) fn restore(&mut self, id: u64, previous: ChannelState) {
        if self.state == Some(id) {
            self.state = match previous {
                ChannelState::Idle => None,
                ChannelState::Pending(earlier) => Some(earlier),
            };
        }
    }

    pub(crate) fn enqueue(&mut self, callback: CompletionCallback) {
        self.waiting.push(callback);
    }

    /// Returns to idle and hands back the queued callbacks, oldest first.
    pub(crate) fn resolve(&mut self) -> Vec<CompletionCallback> {
        self.state = None;
        std::mem::take(&mut self.waiting)
    }
}

#[derive(Default)]
pub(crate) struct SyncState {
    style: ChannelSync,
    layout: ChannelSync,
}

impl SyncState {
    pub(crate) fn channel(&self, channel: SyncChannel) -> &ChannelSync {
        match channel {
            SyncChannel::Style => &self.style,
            SyncChannel::Layout => &self.layout,
        }
    }

    pub(crate) fn channel_mut(&mut self, channel: SyncChannel) -> &mut ChannelSync {
        match channel {
            SyncChannel::Style => &mut self.style,
            SyncChannel::Layout => &mut self.layout,
        }
    }

    /// Marks every channel in `sent` pending on its freshly minted id and
    /// returns the states it replaced.
    pub(crate) fn enter_pending(&mut self, sent: &[(SyncChannel, u64)]) -> Vec<ChannelState> {
        sent.iter()
            .map(|&(channel, id)| {
                debug!(channel = channel.as_str(), id, "sync channel pending");
                let channel = self.channel_mut(channel);
                let previous = channel.state();
                channel.mark_pending(id);
                previous
            })
            .collect()
    }

    /// Reverts [`SyncState::enter_pending`] after a failed send.
    pub(crate) fn leave_pending(&mut self, sent: &[(SyncChannel, u64)], previous: &[ChannelState]) {
        for (&(channel, id), &state) in sent.iter().zip(previous) {
            self.channel_mut(channel).restore(id, state);
        }
    }
}
