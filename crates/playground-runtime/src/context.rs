//! The execution context thread.
//!
//! The Lua state is not `Send`, so each context runs on a dedicated OS
//! thread with a single-threaded tokio runtime. The host talks to it only
//! through [`ContextHandle`]; the context talks back through the outbound
//! queue handed to [`spawn_context`].

use std::{sync::Arc, thread::JoinHandle};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    time::Instant,
};

use playground_core::{ContextMessage, HostMessage, PlaygroundConfig, Transpiler};

use crate::{RuntimeError, document::DocumentSnapshot, session::Session};

/// Commands accepted by a running context.
#[derive(Debug)]
pub enum ContextCommand {
    /// Apply a fragment to the current session.
    Apply(HostMessage),
    /// Destroy the current session and start a new one.
    Reload,
    /// Report the rendered state of the current session.
    Snapshot(oneshot::Sender<DocumentSnapshot>),
    Shutdown,
}

/// Cloneable sender for a running execution context.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    tx: UnboundedSender<ContextCommand>,
}

impl ContextHandle {
    /// A handle plus the receiving end of its command queue, for driving a
    /// context loop other than [`spawn_context`].
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<ContextCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Post a fragment. Never waits for it to be applied.
    ///
    /// # Errors
    /// Returns error if the context has stopped.
    pub fn post(&self, msg: HostMessage) -> Result<(), RuntimeError> {
        self.send(ContextCommand::Apply(msg))
    }

    /// Start a fresh session, which repeats the handshake.
    ///
    /// # Errors
    /// Returns error if the context has stopped.
    pub fn reload(&self) -> Result<(), RuntimeError> {
        self.send(ContextCommand::Reload)
    }

    /// Rendered state after every previously posted command has been applied.
    ///
    /// # Errors
    /// Returns error if the context has stopped.
    pub async fn snapshot(&self) -> Result<DocumentSnapshot, RuntimeError> {
        self.request_snapshot()?
            .await
            .map_err(|_| RuntimeError::ContextClosed)
    }

    /// Queue a snapshot request now and return the pending reply.
    ///
    /// # Errors
    /// Returns error if the context has stopped.
    pub fn request_snapshot(&self) -> Result<oneshot::Receiver<DocumentSnapshot>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(ContextCommand::Snapshot(tx))?;
        Ok(rx)
    }

    /// Ask the context thread to exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ContextCommand::Shutdown);
    }

    fn send(&self, cmd: ContextCommand) -> Result<(), RuntimeError> {
        self.tx.send(cmd).map_err(|_| RuntimeError::ContextClosed)
    }
}

/// Spawn an execution context thread. Its first session activates immediately.
///
/// # Errors
/// Returns error if the thread cannot be spawned.
pub fn spawn_context(
    config: PlaygroundConfig,
    transpiler: Arc<dyn Transpiler>,
    outbound: UnboundedSender<ContextMessage>,
) -> Result<(ContextHandle, JoinHandle<()>), RuntimeError> {
    let (handle, rx) = ContextHandle::channel();
    let join = std::thread::Builder::new()
        .name("playground-context".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("Failed to build context runtime: {e}");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(run_context(config, transpiler, outbound, rx)) {
                tracing::error!("Execution context stopped: {e}");
            }
        })?;
    Ok((handle, join))
}

async fn run_context(
    config: PlaygroundConfig,
    transpiler: Arc<dyn Transpiler>,
    outbound: UnboundedSender<ContextMessage>,
    mut commands: UnboundedReceiver<ContextCommand>,
) -> Result<(), RuntimeError> {
    let mut session = Session::new(config.clone(), Arc::clone(&transpiler), outbound.clone())?;
    session.activate();

    loop {
        let deadline = session.next_deadline();
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(ContextCommand::Apply(msg)) => session.apply(msg),
                Some(ContextCommand::Reload) => {
                    tracing::debug!(session = %session.id(), "Reloading execution context");
                    session = Session::new(config.clone(), Arc::clone(&transpiler), outbound.clone())?;
                    session.activate();
                }
                Some(ContextCommand::Snapshot(reply)) => {
                    let _ = reply.send(session.snapshot());
                }
                Some(ContextCommand::Shutdown) | None => break,
            },
            () = timer => {
                session.run_due_timers(Instant::now());
            }
        }
    }

    tracing::debug!(session = %session.id(), "Execution context shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use playground_core::{ConsoleMessage, HandshakeRequest};
    use playground_transpile::Luax;

    use super::*;

    async fn next(rx: &mut UnboundedReceiver<ContextMessage>) -> ContextMessage {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for context")
            .expect("context closed")
    }

    async fn expect_handshake(rx: &mut UnboundedReceiver<ContextMessage>) {
        assert_eq!(next(rx).await, ContextMessage::Console(ConsoleMessage::Clear));
        assert_eq!(next(rx).await, HandshakeRequest::RequestDefaultStatic.into());
        assert_eq!(next(rx).await, HandshakeRequest::RequestDefaultCode.into());
    }

    #[tokio::test]
    async fn applies_fragments_and_reloads() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, join) =
            spawn_context(PlaygroundConfig::default(), Arc::new(Luax::standard()), out_tx)
                .unwrap();
        expect_handshake(&mut out_rx).await;

        handle
            .post(HostMessage::Html("<div id=\"root\"></div>".into()))
            .unwrap();
        handle.post(HostMessage::Css("p { margin: 0 }".into())).unwrap();
        handle
            .post(HostMessage::Code("UIDom.render(<p>hello</p>, 'root')".into()))
            .unwrap();
        let first = handle.snapshot().await.unwrap();
        assert_eq!(first.body_html, "<div id=\"root\"><p>hello</p></div>");
        assert_eq!(first.stylesheet, "p { margin: 0 }");

        tokio_test::assert_ok!(handle.reload());
        expect_handshake(&mut out_rx).await;
        let second = handle.snapshot().await.unwrap();
        assert_ne!(second.session, first.session);
        assert_eq!(second.body_html, "");

        handle.shutdown();
        tokio::task::spawn_blocking(move || join.join().unwrap())
            .await
            .unwrap();
        assert!(matches!(
            handle.post(HostMessage::Css(String::new())),
            Err(RuntimeError::ContextClosed)
        ));
    }

    #[tokio::test]
    async fn timers_fire_on_the_context_loop() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, _join) =
            spawn_context(PlaygroundConfig::default(), Arc::new(Luax::standard()), out_tx)
                .unwrap();
        expect_handshake(&mut out_rx).await;

        handle
            .post(HostMessage::Code(
                "setTimeout(function() console.warn('tick') end, 20)".into(),
            ))
            .unwrap();
        assert_eq!(
            next(&mut out_rx).await,
            ConsoleMessage::new(
                playground_core::LogChannel::Warn,
                &[serde_json::Value::String("tick".into())]
            )
            .into()
        );
        handle.shutdown();
    }
}
