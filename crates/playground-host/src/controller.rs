//! Host controller: the side of the channel that owns the user's fragments.
//!
//! The controller never inspects the context beyond the two message kinds it
//! sends back. Handshake requests are answered from the published copies;
//! console messages go to the [`LogStore`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    oneshot, watch,
};

use playground_core::{
    ContextMessage, DeclarationFetcher, FragmentKind, Fragments, HandshakeRequest, HostMessage,
    LogEvent, LogStore, PlaygroundConfig, Transpiler, TypeDeclaration,
};
use playground_runtime::{ContextHandle, DocumentSnapshot, RuntimeError, spawn_context};
use playground_transpile::Luax;

use crate::declarations::{HttpFetcher, fetch_declarations};

/// Host controller error.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Execution context error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Host controller stopped")]
    Closed,
}

/// Editor-facing state of the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostState {
    pub fragments: Fragments,
    pub autorun: bool,
}

/// Commands accepted by a running controller.
#[derive(Debug)]
pub enum HostCommand {
    /// Replace one fragment's text.
    Edit { kind: FragmentKind, text: String },
    /// Publish every fragment that differs from its published copy.
    Run,
    SetAutorun(bool),
    /// Discard the context session and start a fresh one.
    Reload,
    Snapshot(oneshot::Sender<Result<DocumentSnapshot, HostError>>),
    State(oneshot::Sender<HostState>),
}

/// Owns the fragments and drives one execution context.
pub struct HostController {
    /// What the editor currently holds.
    fragments: Fragments,
    /// What the context was last sent; handshake answers come from here.
    published: Fragments,
    autorun: bool,
    log: Arc<LogStore>,
    context: ContextHandle,
}

impl HostController {
    /// Create a controller for `context`. The initial fragments count as
    /// already published, so the first handshake receives them.
    #[must_use]
    pub fn new(
        config: &PlaygroundConfig,
        initial: Fragments,
        context: ContextHandle,
        log: Arc<LogStore>,
    ) -> Self {
        Self {
            published: initial.clone(),
            fragments: initial,
            autorun: config.autorun,
            log,
            context,
        }
    }

    #[must_use]
    pub const fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    #[must_use]
    pub const fn published(&self) -> &Fragments {
        &self.published
    }

    #[must_use]
    pub const fn autorun(&self) -> bool {
        self.autorun
    }

    #[must_use]
    pub fn state(&self) -> HostState {
        HostState {
            fragments: self.fragments.clone(),
            autorun: self.autorun,
        }
    }

    /// Record an edit, publishing it immediately when autorun is on.
    pub fn edit(&mut self, kind: FragmentKind, text: impl Into<String>) {
        self.fragments.set(kind, text);
        if self.autorun {
            self.publish(kind);
        }
    }

    /// Stash the current fragments as the published copies and send the
    /// ones that changed.
    pub fn run(&mut self) {
        for kind in FragmentKind::ALL {
            self.publish(kind);
        }
    }

    /// Toggle autorun. Either way the current fragments are stashed.
    pub fn set_autorun(&mut self, enabled: bool) {
        tracing::debug!(enabled, "Setting autorun");
        self.autorun = enabled;
        self.run();
    }

    /// Restart the execution context. The new session repeats the handshake.
    ///
    /// # Errors
    /// Returns error if the context has stopped.
    pub fn reload(&self) -> Result<(), HostError> {
        tracing::debug!("Reloading execution context");
        Ok(self.context.reload()?)
    }

    /// Route one message from the context. Returns the recorded log event,
    /// if the message was console output.
    pub fn handle_context_message(&self, msg: ContextMessage) -> Option<LogEvent> {
        match msg {
            ContextMessage::Request(req) => {
                self.answer(req);
                None
            }
            ContextMessage::Console(console) => Some(self.log.record(&console)),
        }
    }

    /// Re-send the published copies that answer `req`, changed or not.
    fn answer(&self, req: HandshakeRequest) {
        tracing::debug!(?req, "Answering handshake request");
        for &kind in req.answered_by() {
            self.post(self.published.fragment(kind).to_message());
        }
    }

    fn publish(&mut self, kind: FragmentKind) {
        let text = self.fragments.get(kind).to_string();
        if self.published.set(kind, text) {
            self.post(self.published.fragment(kind).to_message());
        }
    }

    fn post(&self, msg: HostMessage) {
        if let Err(e) = self.context.post(msg) {
            tracing::warn!("Dropping fragment: {e}");
        }
    }

    fn handle_command(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::Edit { kind, text } => self.edit(kind, text),
            HostCommand::Run => self.run(),
            HostCommand::SetAutorun(enabled) => self.set_autorun(enabled),
            HostCommand::Reload => {
                if let Err(e) = self.reload() {
                    tracing::warn!("Reload failed: {e}");
                }
            }
            HostCommand::Snapshot(reply) => match self.context.request_snapshot() {
                // Queued now so it lands after every fragment posted so far.
                Ok(pending) => {
                    tokio::spawn(async move {
                        let result = pending.await.map_err(|_| RuntimeError::ContextClosed);
                        let _ = reply.send(result.map_err(HostError::from));
                    });
                }
                Err(e) => {
                    let _ = reply.send(Err(e.into()));
                }
            },
            HostCommand::State(reply) => {
                let _ = reply.send(self.state());
            }
        }
    }

    /// Serve commands and context messages until every [`HostHandle`] is
    /// dropped or the context goes away.
    pub async fn serve(
        mut self,
        mut commands: UnboundedReceiver<HostCommand>,
        mut inbound: UnboundedReceiver<ContextMessage>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                msg = inbound.recv() => match msg {
                    Some(msg) => {
                        self.handle_context_message(msg);
                    }
                    None => {
                        tracing::warn!("Execution context closed its channel");
                        break;
                    }
                },
            }
        }
        self.context.shutdown();
    }
}

/// Cloneable handle to a running [`HostController`].
#[derive(Clone)]
pub struct HostHandle {
    commands: UnboundedSender<HostCommand>,
    log: Arc<LogStore>,
    declarations: watch::Receiver<Vec<TypeDeclaration>>,
}

impl HostHandle {
    /// Replace one fragment's text.
    ///
    /// # Errors
    /// Returns error if the controller has stopped.
    pub fn edit(&self, kind: FragmentKind, text: impl Into<String>) -> Result<(), HostError> {
        self.send(HostCommand::Edit {
            kind,
            text: text.into(),
        })
    }

    /// Publish the current fragments.
    ///
    /// # Errors
    /// Returns error if the controller has stopped.
    pub fn run(&self) -> Result<(), HostError> {
        self.send(HostCommand::Run)
    }

    /// # Errors
    /// Returns error if the controller has stopped.
    pub fn set_autorun(&self, enabled: bool) -> Result<(), HostError> {
        self.send(HostCommand::SetAutorun(enabled))
    }

    /// # Errors
    /// Returns error if the controller has stopped.
    pub fn reload(&self) -> Result<(), HostError> {
        self.send(HostCommand::Reload)
    }

    /// Rendered state of the context once every earlier command has been
    /// applied.
    ///
    /// # Errors
    /// Returns error if the controller or the context has stopped.
    pub async fn snapshot(&self) -> Result<DocumentSnapshot, HostError> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCommand::Snapshot(tx))?;
        rx.await.map_err(|_| HostError::Closed)?
    }

    /// # Errors
    /// Returns error if the controller has stopped.
    pub async fn state(&self) -> Result<HostState, HostError> {
        let (tx, rx) = oneshot::channel();
        self.send(HostCommand::State(tx))?;
        rx.await.map_err(|_| HostError::Closed)
    }

    /// The visible log history and its live feed.
    #[must_use]
    pub fn log_store(&self) -> Arc<LogStore> {
        Arc::clone(&self.log)
    }

    /// Declarations fetched at start; empty until the fetch completes.
    #[must_use]
    pub fn declarations(&self) -> watch::Receiver<Vec<TypeDeclaration>> {
        self.declarations.clone()
    }

    fn send(&self, cmd: HostCommand) -> Result<(), HostError> {
        self.commands.send(cmd).map_err(|_| HostError::Closed)
    }
}

/// Start a host with the standard transpiler and an HTTP declaration fetcher.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Returns error if the execution context cannot be spawned.
pub fn start_host(config: PlaygroundConfig, initial: Fragments) -> Result<HostHandle, HostError> {
    start_host_with(
        config,
        initial,
        Arc::new(Luax::standard()),
        Arc::new(HttpFetcher::new()),
    )
}

/// Start a host: spawn the execution context, the controller task and the
/// one-shot declaration fetch.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Returns error if the execution context cannot be spawned.
pub fn start_host_with(
    config: PlaygroundConfig,
    initial: Fragments,
    transpiler: Arc<dyn Transpiler>,
    fetcher: Arc<dyn DeclarationFetcher>,
) -> Result<HostHandle, HostError> {
    let (outbound, inbound) = mpsc::unbounded_channel();
    let (context, join) = spawn_context(config.clone(), transpiler, outbound)?;

    let log = Arc::new(LogStore::with_limit(config.max_history_bytes));
    let controller = HostController::new(&config, initial, context, Arc::clone(&log));
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        controller.serve(commands_rx, inbound).await;
        let _ = tokio::task::spawn_blocking(move || join.join()).await;
        tracing::debug!("Host controller stopped");
    });

    let (declarations_tx, declarations_rx) = watch::channel(Vec::new());
    let sources = config.declarations;
    if !sources.is_empty() {
        tokio::spawn(async move {
            let fetched = fetch_declarations(fetcher.as_ref(), &sources).await;
            let _ = declarations_tx.send(fetched);
        });
    }

    Ok(HostHandle {
        commands: commands_tx,
        log,
        declarations: declarations_rx,
    })
}
