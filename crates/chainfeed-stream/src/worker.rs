//! The feed task: connection state machine and event loop.
//!
//! One task owns everything. Socket frames, fetch completions and handle
//! commands are multiplexed with `tokio::select!`; nothing here is shared or
//! locked. A fetch that is cancelled (dropped) can never touch state again.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;

use chainfeed_analytics::{CategoryWeightEngine, ThroughputEstimator, TransactionClassifier};
use chainfeed_core::error::{FeedError, TransportError};
use chainfeed_core::policy::{AdaptiveDelay, DelaySignal, ReconnectBackoff};
use chainfeed_core::request::{JsonRpcRequest, RpcId};
use chainfeed_core::{
    BlockRecord, BlockSource, ConnectionState, FeedConfig, FeedEvent, FeedSocket, TransactionRecord,
    Transport,
};

use crate::client::Command;
use crate::dispatch::{parse_frame, Frame};
use crate::fetch::{self, FetchJob, FetchKind, FetchOutcome};
use crate::probe::probe;
use crate::stats::{BlockTimeAverage, FeedStats};

/// Why an active phase stopped early.
enum Interrupt {
    Disconnect,
    Shutdown,
}

/// How one probe-and-open attempt ended.
enum Attempt {
    /// Probe failed: terminal for this connect request.
    ProbeFailed(String),
    /// Socket failed to open, or opened and later closed.
    Ended,
}

/// What the idle loop does after a session.
enum Flow {
    Idle,
    Shutdown,
}

pub(crate) struct FeedTask {
    config: FeedConfig,
    transport: Arc<dyn Transport>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<FeedEvent>,
    stats_tx: watch::Sender<FeedStats>,
    state_tx: watch::Sender<ConnectionState>,

    state: ConnectionState,
    backoff: ReconnectBackoff,
    block_delay: AdaptiveDelay,
    tx_delay: AdaptiveDelay,

    classifier: TransactionClassifier,
    weights: CategoryWeightEngine,
    throughput: ThroughputEstimator,
    block_times: BlockTimeAverage,

    /// Kinds issued on every socket open, in request order.
    subscriptions: Vec<String>,
    /// Request id → kind, for subscribe requests awaiting an ack.
    pending_acks: HashMap<u64, String>,
    /// Subscription id → kind.
    active: HashMap<String, String>,
    next_request_id: u64,

    fetches: FuturesUnordered<BoxFuture<'static, FetchOutcome>>,

    last_block_at: Option<Instant>,
    last_block_number: Option<u64>,
    blocks_received: u64,
    transactions_received: u64,
    dropped_notifications: u64,
}

impl FeedTask {
    pub(crate) fn new(
        config: FeedConfig,
        transport: Arc<dyn Transport>,
        commands: mpsc::UnboundedReceiver<Command>,
        events: broadcast::Sender<FeedEvent>,
        stats_tx: watch::Sender<FeedStats>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let tuning = &config.tuning;
        let mut subscriptions: Vec<String> = Vec::with_capacity(tuning.subscriptions.len());
        for kind in &tuning.subscriptions {
            if !subscriptions.contains(kind) {
                subscriptions.push(kind.clone());
            }
        }

        Self {
            backoff: ReconnectBackoff::new(tuning.reconnect.clone()),
            block_delay: AdaptiveDelay::new(tuning.block_delay.clone()),
            tx_delay: AdaptiveDelay::new(tuning.tx_delay.clone()),
            classifier: TransactionClassifier::new(),
            weights: CategoryWeightEngine::new_at(Instant::now().into_std()),
            throughput: ThroughputEstimator::new(config.max_tps as usize),
            block_times: BlockTimeAverage::new(config.block_time_ms),
            subscriptions,
            pending_acks: HashMap::new(),
            active: HashMap::new(),
            next_request_id: 1,
            fetches: FuturesUnordered::new(),
            last_block_at: None,
            last_block_number: None,
            blocks_received: 0,
            transactions_received: 0,
            dropped_notifications: 0,
            state: ConnectionState::Disconnected,
            config,
            transport,
            commands,
            events,
            stats_tx,
            state_tx,
        }
    }

    /// Idle loop: wait in `Disconnected`/`Failed` for a command.
    pub(crate) async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            let flow = match command {
                Command::Connect if self.state == ConnectionState::Disconnected => {
                    self.run_session().await
                }
                Command::Connect => {
                    tracing::warn!(state = %self.state, "connect ignored; call reconnect to leave this state");
                    Flow::Idle
                }
                Command::Reconnect => self.run_session().await,
                Command::Disconnect => {
                    self.transition(ConnectionState::Disconnected);
                    Flow::Idle
                }
                Command::Subscribe(kind) => {
                    self.add_subscription(kind);
                    Flow::Idle
                }
            };
            if let Flow::Shutdown = flow {
                break;
            }
        }
        tracing::debug!("feed task stopped");
    }

    /// Connect, then keep reconnecting until the budget runs out or a
    /// command stops us.
    async fn run_session(&mut self) -> Flow {
        self.backoff.reset();
        self.transition(ConnectionState::Connecting);

        loop {
            match self.connect_once().await {
                Err(interrupt) => return self.interrupted(interrupt),
                Ok(Attempt::ProbeFailed(reason)) => {
                    self.fail(reason);
                    return Flow::Idle;
                }
                Ok(Attempt::Ended) => {}
            }

            let Some(delay) = self.backoff.next_delay() else {
                let reason = format!("reconnect attempts exhausted after {}", self.backoff.attempts());
                self.fail(reason);
                return Flow::Idle;
            };
            self.transition(ConnectionState::Reconnecting);
            tracing::warn!(
                attempt = self.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                url = %self.config.ws_url,
                "reconnecting"
            );

            if let Err(interrupt) = self.wait_backoff(delay).await {
                return self.interrupted(interrupt);
            }
            self.transition(ConnectionState::Connecting);
        }
    }

    /// Probe, open the socket, subscribe and pump frames until it closes.
    async fn connect_once(&mut self) -> Result<Attempt, Interrupt> {
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let probing = async move { probe(transport.as_ref(), &config).await };
        tokio::pin!(probing);
        match self.guarded(probing).await? {
            Ok(report) => tracing::info!(
                head = report.head_block,
                chain_id = ?report.chain_id,
                latency_ms = report.latency_ms,
                "rpc probe passed"
            ),
            Err(e) => {
                tracing::error!(error = %e, url = %self.config.rpc_url, "rpc probe failed");
                let reason = format!("rpc check against {} failed: {e}", self.config.rpc_url);
                return Ok(Attempt::ProbeFailed(reason));
            }
        }

        let transport = Arc::clone(&self.transport);
        let url = self.config.ws_url.clone();
        let opening = async move { transport.open_socket(&url).await };
        tokio::pin!(opening);
        let mut socket = match self.guarded(opening).await? {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.config.ws_url, "socket open failed");
                return Ok(Attempt::Ended);
            }
        };

        self.backoff.reset();
        self.pending_acks.clear();
        self.active.clear();
        self.last_block_at = None;
        self.transition(ConnectionState::Connected);

        let outcome = match self.send_subscriptions(socket.as_mut()).await {
            Ok(()) => self.pump(socket.as_mut()).await,
            Err(e) => {
                tracing::warn!(error = %e, "subscribe request failed");
                Ok(())
            }
        };
        socket.close().await;
        self.cancel_fetches();
        outcome.map(|()| Attempt::Ended)
    }

    /// Drive `fut` to completion while still answering commands.
    async fn guarded<F: Future>(&mut self, mut fut: Pin<&mut F>) -> Result<F::Output, Interrupt> {
        loop {
            tokio::select! {
                out = &mut fut => return Ok(out),
                command = self.commands.recv() => self.on_active_command(command)?,
            }
        }
    }

    /// Sleep out a reconnect delay. An explicit reconnect ends the wait early.
    async fn wait_backoff(&mut self, delay: Duration) -> Result<(), Interrupt> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return Ok(()),
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => {
                        self.backoff.reset();
                        tracing::info!("explicit reconnect; skipping backoff wait");
                        return Ok(());
                    }
                    other => self.on_active_command(other)?,
                },
            }
        }
    }

    /// Connected phase. Returns `Ok` when the socket closes or errors.
    async fn pump(&mut self, socket: &mut dyn FeedSocket) -> Result<(), Interrupt> {
        loop {
            tokio::select! {
                frame = socket.next_text() => match frame {
                    None => {
                        tracing::warn!(url = %self.config.ws_url, "socket closed");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        tracing::warn!(
                            error = %e,
                            retryable = e.is_retryable(),
                            url = %self.config.ws_url,
                            "socket error"
                        );
                        return Ok(());
                    }
                    Some(Ok(text)) => self.on_frame(&text),
                },
                Some(outcome) = self.fetches.next(), if !self.fetches.is_empty() => {
                    self.on_fetch(outcome);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Subscribe(kind)) => {
                        if self.add_subscription(kind.clone()) {
                            if let Err(e) = self.send_subscribe(socket, &kind).await {
                                tracing::warn!(error = %e, %kind, "subscribe request failed");
                                return Ok(());
                            }
                        }
                    }
                    other => self.on_active_command(other)?,
                },
            }
        }
    }

    /// Commands that mean the same thing in every active phase.
    fn on_active_command(&mut self, command: Option<Command>) -> Result<(), Interrupt> {
        match command {
            None => Err(Interrupt::Shutdown),
            Some(Command::Disconnect) => Err(Interrupt::Disconnect),
            Some(Command::Reconnect) => {
                self.backoff.reset();
                tracing::debug!(state = %self.state, "reconnect while active; attempt budget reset");
                Ok(())
            }
            Some(Command::Connect) => {
                tracing::debug!(state = %self.state, "connect ignored while active");
                Ok(())
            }
            Some(Command::Subscribe(kind)) => {
                self.add_subscription(kind);
                Ok(())
            }
        }
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> Flow {
        self.cancel_fetches();
        match interrupt {
            Interrupt::Shutdown => Flow::Shutdown,
            Interrupt::Disconnect => {
                tracing::info!(url = %self.config.ws_url, "disconnected on request");
                self.transition(ConnectionState::Disconnected);
                Flow::Idle
            }
        }
    }

    fn fail(&mut self, reason: String) {
        tracing::error!(
            attempts = self.backoff.attempts(),
            url = %self.config.ws_url,
            %reason,
            "connection failed; waiting for an explicit reconnect"
        );
        self.transition(ConnectionState::Failed);
        self.emit(FeedEvent::ConnectionFailed { reason });
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            tracing::warn!(%from, %to, "ignoring invalid state transition");
            return;
        }
        self.state = to;
        self.state_tx.send_replace(to);
        tracing::info!(%from, %to, "connection state changed");
        self.emit(FeedEvent::StateChanged { from, to });
        self.publish_stats();
    }

    // ─── Subscriptions ──────────────────────────────────────────────────────

    /// Returns `true` if `kind` was not already requested.
    fn add_subscription(&mut self, kind: String) -> bool {
        if self.subscriptions.contains(&kind) {
            return false;
        }
        tracing::info!(%kind, "subscription kind added");
        self.subscriptions.push(kind);
        true
    }

    async fn send_subscriptions(&mut self, socket: &mut dyn FeedSocket) -> Result<(), TransportError> {
        for kind in self.subscriptions.clone() {
            self.send_subscribe(socket, &kind).await?;
        }
        Ok(())
    }

    async fn send_subscribe(
        &mut self,
        socket: &mut dyn FeedSocket,
        kind: &str,
    ) -> Result<(), TransportError> {
        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending_acks.insert(id, kind.to_string());
        tracing::debug!(id, kind, "eth_subscribe");
        socket.send_text(JsonRpcRequest::subscribe(id, kind).to_text()).await
    }

    // ─── Frames ─────────────────────────────────────────────────────────────

    fn on_frame(&mut self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "dropping unparseable frame");
                return;
            }
        };

        match frame {
            Frame::Ack { id, subscription } => match self.take_pending(&id) {
                Some(kind) => {
                    tracing::info!(%kind, %subscription, "subscription acknowledged");
                    self.active.insert(subscription, kind);
                }
                None => tracing::debug!(%id, "response to unknown request"),
            },
            Frame::RpcError { id, error } => {
                let kind = self.take_pending(&id);
                tracing::warn!(
                    %id,
                    kind = kind.as_deref().unwrap_or("-"),
                    code = error.code,
                    message = %error.message,
                    "rpc error frame"
                );
            }
            Frame::NewHead {
                subscription,
                header,
            } => {
                self.note_subscription(&subscription);
                self.on_new_head(header);
            }
            Frame::TransactionHash { subscription, hash } => {
                self.note_subscription(&subscription);
                self.enqueue(FetchJob::Transaction { hash });
            }
            Frame::Transaction { subscription, tx } => {
                self.note_subscription(&subscription);
                match TransactionRecord::from_json(&tx, &self.config.native_token) {
                    Ok(record) => {
                        self.process_transaction(record);
                        self.publish_stats();
                    }
                    Err(e) => tracing::debug!(error = %e, "dropping pending transaction"),
                }
            }
            Frame::Ignored(reason) => tracing::debug!(reason, "frame ignored"),
        }
    }

    fn take_pending(&mut self, id: &RpcId) -> Option<String> {
        match id {
            RpcId::Number(n) => self.pending_acks.remove(n),
            _ => None,
        }
    }

    fn note_subscription(&self, subscription: &str) {
        if !self.active.contains_key(subscription) {
            tracing::debug!(%subscription, "notification for unacknowledged subscription");
        }
    }

    fn on_new_head(&mut self, header: Value) {
        let now = Instant::now();
        let block_time = match self.last_block_at {
            Some(prev) => {
                let elapsed = now.duration_since(prev).as_millis() as u64;
                self.block_times.push(elapsed);
                elapsed
            }
            None => self.config.block_time_ms,
        };
        self.last_block_at = Some(now);
        self.enqueue(FetchJob::Block { header, block_time });
    }

    // ─── Fetches ────────────────────────────────────────────────────────────

    fn enqueue(&mut self, job: FetchJob) {
        let limit = self.config.tuning.max_in_flight_fetches;
        if self.fetches.len() >= limit {
            self.dropped_notifications += 1;
            tracing::warn!(kind = ?job.kind(), limit, "in-flight fetch limit reached; notification dropped");
            return;
        }

        let tuning = &self.config.tuning;
        let (delay, deadline) = match job.kind() {
            FetchKind::Block => (
                self.block_delay.current(),
                Duration::from_millis(tuning.block_fetch_timeout_ms),
            ),
            FetchKind::Transaction => (
                self.tx_delay.current(),
                Duration::from_millis(tuning.tx_fetch_timeout_ms),
            ),
        };
        self.fetches.push(fetch::start(
            Arc::clone(&self.transport),
            self.config.rpc_url.clone(),
            job,
            delay,
            deadline,
        ));
    }

    fn on_fetch(&mut self, outcome: FetchOutcome) {
        let FetchOutcome {
            job,
            result,
            signal,
        } = outcome;

        let kind = job.kind();
        let delay = match kind {
            FetchKind::Block => &mut self.block_delay,
            FetchKind::Transaction => &mut self.tx_delay,
        };
        delay.observe(signal);
        if signal == DelaySignal::RateLimited {
            tracing::warn!(?kind, delay_ms = delay.current_ms(), "rpc endpoint rate limited; delay increased");
        }

        match job {
            FetchJob::Block { header, block_time } => self.on_block_fetched(header, block_time, result),
            FetchJob::Transaction { hash } => {
                let record = result
                    .and_then(|tx| TransactionRecord::from_json(&tx, &self.config.native_token));
                match record {
                    Ok(record) => self.process_transaction(record),
                    Err(e) => tracing::debug!(%hash, error = %e, "transaction fetch dropped"),
                }
            }
        }
        self.publish_stats();
    }

    fn on_block_fetched(&mut self, header: Value, block_time: u64, result: Result<Value, FeedError>) {
        let full = result.and_then(|body| {
            BlockRecord::from_json(&body, BlockSource::FullBody, block_time).map(|record| (record, body))
        });

        match full {
            Ok((record, body)) => {
                self.emit_block(record);
                let Some(txs) = body.get("transactions").and_then(Value::as_array) else {
                    return;
                };
                for tx in txs.iter().filter(|tx| tx.is_object()) {
                    match TransactionRecord::from_json(tx, &self.config.native_token) {
                        Ok(record) => self.process_transaction(record),
                        Err(e) => tracing::debug!(error = %e, "skipping block transaction"),
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    number = header.get("number").and_then(serde_json::Value::as_str).unwrap_or("?"),
                    "block fetch failed; emitting header fields only"
                );
                match BlockRecord::from_json(&header, BlockSource::HeaderOnly, block_time) {
                    Ok(record) => self.emit_block(record),
                    Err(e) => tracing::warn!(error = %e, "unusable block header dropped"),
                }
            }
        }
    }

    fn cancel_fetches(&mut self) {
        if !self.fetches.is_empty() {
            tracing::debug!(count = self.fetches.len(), "cancelling in-flight fetches");
            self.fetches = FuturesUnordered::new();
        }
    }

    // ─── Output ─────────────────────────────────────────────────────────────

    fn emit_block(&mut self, record: BlockRecord) {
        self.blocks_received += 1;
        self.last_block_number = Some(record.number);
        tracing::debug!(
            number = record.number,
            txs = record.transaction_count,
            source = ?record.source,
            "block"
        );
        self.emit(FeedEvent::NewBlock(record));
    }

    fn process_transaction(&mut self, tx: TransactionRecord) {
        let classified = self.classifier.analyze(tx);
        let now = Instant::now().into_std();
        self.weights.add_transaction_at(classified.category(), now);
        self.throughput.record_event_at(now);
        self.transactions_received += 1;
        self.emit(FeedEvent::NewTransaction(classified));
    }

    fn emit(&self, event: FeedEvent) {
        tracing::trace!(event = event.name(), receivers = self.events.receiver_count(), "emit");
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn publish_stats(&mut self) {
        let current_tps = self.throughput.current_rate_at(Instant::now().into_std());
        let stats = FeedStats {
            state: self.state,
            blocks_received: self.blocks_received,
            transactions_received: self.transactions_received,
            last_block_number: self.last_block_number,
            average_block_time_ms: self.block_times.average(),
            current_tps,
            reconnect_attempts: self.backoff.attempts(),
            category_counts: self.classifier.stats(),
            category_percentages: self.classifier.percentages(),
            weights: self.weights.all_weights(),
            most_active: self.classifier.most_active().0,
            block_delay_ms: self.block_delay.current_ms(),
            tx_delay_ms: self.tx_delay.current_ms(),
            in_flight_fetches: self.fetches.len(),
            dropped_notifications: self.dropped_notifications,
        };
        self.stats_tx.send_replace(stats);
    }
}
