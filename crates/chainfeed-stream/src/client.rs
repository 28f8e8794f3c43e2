//! Public handle to the feed task.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use chainfeed_core::{ConnectionState, FeedConfig, FeedError, FeedEvent, Transport};

use crate::stats::FeedStats;
use crate::worker::FeedTask;

/// Requests from handles to the task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Reconnect,
    Disconnect,
    Subscribe(String),
}

/// Handle to a running feed.
///
/// Clones share the same task. When the last handle is dropped the task
/// closes its socket and exits.
#[derive(Clone)]
pub struct ChainStreamClient {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<FeedEvent>,
    stats: watch::Receiver<FeedStats>,
    state: watch::Receiver<ConnectionState>,
}

impl ChainStreamClient {
    /// Validate `config` and start the feed task in `Disconnected` state.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(config: FeedConfig, transport: Arc<dyn Transport>) -> Result<Self, FeedError> {
        config.validate()?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.tuning.event_capacity);
        let (stats_tx, stats) = watch::channel(FeedStats::initial(config.block_time_ms));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

        let task = FeedTask::new(config, transport, command_rx, events.clone(), stats_tx, state_tx);
        tokio::spawn(task.run());

        Ok(Self {
            commands,
            events,
            stats,
            state,
        })
    }

    /// Start connecting. Only honoured from `Disconnected`; after a failure
    /// use [`reconnect`](Self::reconnect).
    pub fn connect(&self) -> Result<(), FeedError> {
        self.send(Command::Connect)
    }

    /// Explicit reconnect request: restores the full attempt budget.
    ///
    /// Leaves `Failed`/`Disconnected` for `Connecting`, and cuts short a
    /// pending backoff wait. While a socket is open it only resets the budget.
    pub fn reconnect(&self) -> Result<(), FeedError> {
        self.send(Command::Reconnect)
    }

    /// Close the socket, cancel in-flight fetches and go to `Disconnected`.
    pub fn disconnect(&self) -> Result<(), FeedError> {
        self.send(Command::Disconnect)
    }

    /// Add an `eth_subscribe` kind (e.g. `"newPendingTransactions"`).
    ///
    /// Issued immediately when a socket is open, otherwise queued for the
    /// next open. Like the configured kinds, it is re-issued on every reconnect.
    pub fn subscribe_kind(&self, kind: impl Into<String>) -> Result<(), FeedError> {
        self.send(Command::Subscribe(kind.into()))
    }

    /// New receiver for feed events. Subscribe before [`connect`](Self::connect)
    /// to see every event.
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Latest published statistics.
    pub fn stats(&self) -> FeedStats {
        self.stats.borrow().clone()
    }

    pub fn watch_stats(&self) -> watch::Receiver<FeedStats> {
        self.stats.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn send(&self, command: Command) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .map_err(|_| FeedError::ClientClosed)
    }
}

impl std::fmt::Debug for ChainStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainStreamClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
