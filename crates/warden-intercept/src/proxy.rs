//! Capture point 3: background request proxy
//!
//! A worker task sits between the page and the network and sees every
//! request on the transport, including ones issued through a fetch captured
//! before the page-level override. It keeps its own copy of the patterns,
//! pushed to it with [`ProxyCommand::ConfigureBlocker`], and reports each
//! block back to the page as a [`ProxyEvent::BlockedScript`].

use crate::context::InterceptionContext;
use crate::error::{FetchError, InstallError, ProxyError};
use crate::fetch::{Fetch, FetchInput, Response};
use crate::protocol::{ProxyCommand, ProxyEvent};
use crate::stub::StubModule;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use warden_classifier::PatternSet;
use warden_store::InterceptionPoint;

/// Maximum blocked URLs the worker remembers
const WORKER_BLOCKED_CAP: usize = 100;

/// Messages the worker consumes, in send order
#[derive(Debug)]
enum WorkerMessage {
    Command(ProxyCommand),
    Request {
        input: FetchInput,
        reply: oneshot::Sender<Result<Response, FetchError>>,
    },
    Shutdown,
}

type PendingLists = Arc<Mutex<VecDeque<oneshot::Sender<Vec<String>>>>>;

/// Page-side handle to the background proxy
#[derive(Debug, Clone)]
pub struct ProxyClient {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    pending: PendingLists,
}

impl ProxyClient {
    /// Start the worker in front of `network`
    ///
    /// # Errors
    /// - `InstallError::NoRuntime` when called outside a tokio runtime
    pub fn spawn(
        network: Arc<dyn Fetch>,
        context: Arc<InterceptionContext>,
    ) -> Result<Self, InstallError> {
        let handle = Handle::try_current().map_err(|_| InstallError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending: PendingLists = Arc::default();

        let worker = ProxyWorker {
            network,
            stub: context.stub().clone(),
            patterns: PatternSet::empty(),
            bypass_enabled: false,
            blocked: VecDeque::new(),
            events: events_tx,
        };
        handle.spawn(worker.run(rx));
        handle.spawn(event_pump(events_rx, context, pending.clone()));

        tracing::debug!("background proxy started");
        Ok(Self { tx, pending })
    }

    /// Send a command to the worker
    ///
    /// # Errors
    /// - `ProxyError::Disconnected` if the worker has stopped
    pub fn send(&self, command: ProxyCommand) -> Result<(), ProxyError> {
        self.tx
            .send(WorkerMessage::Command(command))
            .map_err(|_| ProxyError::Disconnected)
    }

    /// Transport routing requests through the worker
    #[must_use]
    pub fn fetcher(&self) -> Arc<dyn Fetch> {
        Arc::new(ProxyFetch {
            tx: self.tx.clone(),
        })
    }

    /// URLs the worker has blocked
    ///
    /// Every [`ProxyEvent::BlockedScript`] emitted before the answer has been
    /// recorded in the diagnostic store by the time this returns.
    ///
    /// # Errors
    /// - `ProxyError::Disconnected` if the worker has stopped
    pub async fn blocked_scripts(&self) -> Result<Vec<String>, ProxyError> {
        let (reply, answer) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            self.tx
                .send(WorkerMessage::Command(ProxyCommand::GetBlockedScripts))
                .map_err(|_| ProxyError::Disconnected)?;
            pending.push_back(reply);
        }
        answer.await.map_err(|_| ProxyError::Disconnected)
    }

    /// Stop the worker; in-flight forwards still complete
    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerMessage::Shutdown);
    }

    /// Whether the worker is still accepting messages
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Fetch that goes through the background proxy
#[derive(Debug, Clone)]
pub struct ProxyFetch {
    tx: mpsc::UnboundedSender<WorkerMessage>,
}

#[async_trait::async_trait]
impl Fetch for ProxyFetch {
    async fn fetch(&self, input: FetchInput) -> Result<Response, FetchError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(WorkerMessage::Request { input, reply })
            .map_err(|_| FetchError::ProxyUnavailable)?;
        response.await.map_err(|_| FetchError::ProxyUnavailable)?
    }
}

struct ProxyWorker {
    network: Arc<dyn Fetch>,
    stub: StubModule,
    patterns: PatternSet,
    bypass_enabled: bool,
    blocked: VecDeque<String>,
    events: mpsc::UnboundedSender<ProxyEvent>,
}

impl ProxyWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                WorkerMessage::Command(command) => self.handle_command(command),
                WorkerMessage::Request { input, reply } => self.handle_request(input, reply),
                WorkerMessage::Shutdown => break,
            }
        }
        tracing::debug!("background proxy stopped");
    }

    fn handle_command(&mut self, command: ProxyCommand) {
        match command {
            ProxyCommand::ConfigureBlocker {
                blocked_scripts,
                bypass_enabled,
            } => {
                self.patterns = PatternSet::new(blocked_scripts);
                self.bypass_enabled = bypass_enabled;
                tracing::debug!(
                    patterns = self.patterns.len(),
                    bypass_enabled,
                    "background proxy configured"
                );
            }
            ProxyCommand::EnableBypassMode => self.bypass_enabled = true,
            ProxyCommand::DisableBypassMode => self.bypass_enabled = false,
            ProxyCommand::GetBlockedScripts => {
                let _ = self.events.send(ProxyEvent::BlockedScriptsList {
                    blocked_scripts: self.blocked.iter().cloned().collect(),
                });
            }
        }
    }

    fn handle_request(
        &mut self,
        input: FetchInput,
        reply: oneshot::Sender<Result<Response, FetchError>>,
    ) {
        let url = input.url().to_string();
        if self.stub.serves(&url) {
            let _ = reply.send(Ok(self.stub.response(&url)));
            return;
        }
        if !self.bypass_enabled && self.patterns.is_blocked(&url) {
            self.blocked.push_back(url.clone());
            if self.blocked.len() > WORKER_BLOCKED_CAP {
                self.blocked.pop_front();
            }
            let _ = reply.send(Ok(self.stub.response(&url)));
            let _ = self.events.send(ProxyEvent::BlockedScript { url });
            return;
        }

        let network = self.network.clone();
        tokio::spawn(async move {
            let _ = reply.send(network.fetch(input).await);
        });
    }
}

async fn event_pump(
    mut events: mpsc::UnboundedReceiver<ProxyEvent>,
    context: Arc<InterceptionContext>,
    pending: PendingLists,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProxyEvent::BlockedScript { url } => {
                context.record_external(&url, InterceptionPoint::BackgroundProxy);
            }
            ProxyEvent::BlockedScriptsList { blocked_scripts } => {
                if let Some(reply) = pending.lock().pop_front() {
                    let _ = reply.send(blocked_scripts);
                }
            }
        }
    }
}
