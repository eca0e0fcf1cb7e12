//! One load of the execution context.
//!
//! A session owns the Lua state, the document and the timers. It is built
//! once per (re)load and thrown away wholesale on the next reload.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use mlua::Lua;
use serde_json::Value;
use tokio::{sync::mpsc::UnboundedSender, time::Instant};

use playground_core::{
    ConsoleMessage, ContextMessage, FragmentKind, Fragments, HandshakeRequest, HostMessage,
    LogChannel, PlaygroundConfig, SessionId, Transpiler,
};

use crate::{
    RuntimeError,
    console::{Outbound, install_console},
    document::DocumentSnapshot,
    sandbox::sandbox_globals,
    timers::{TimerQueue, install_timers},
    ui::{Dom, install_ui},
};

pub struct Session {
    id: SessionId,
    lua: Lua,
    dom: Rc<Dom>,
    timers: Rc<RefCell<TimerQueue>>,
    outbound: Outbound,
    transpiler: Arc<dyn Transpiler>,
    config: PlaygroundConfig,
    /// Output of the most recent successful transpile.
    last_good: Option<String>,
    applied: Fragments,
}

impl Session {
    /// Build a session: console shim first, then the rendering globals and
    /// timers, then the sandbox. Nothing is posted until [`Session::activate`].
    ///
    /// # Errors
    /// Returns error if the Lua globals cannot be installed.
    pub fn new(
        config: PlaygroundConfig,
        transpiler: Arc<dyn Transpiler>,
        outbound: UnboundedSender<ContextMessage>,
    ) -> Result<Self, RuntimeError> {
        let id = SessionId::new_v4();
        let lua = Lua::new();
        let outbound = Outbound::new(outbound, id);
        let dom = Rc::new(Dom::new(config.max_render_depth));
        let timers = Rc::new(RefCell::new(TimerQueue::default()));

        install_console(&lua, &outbound)?;
        install_ui(&lua, &dom)?;
        install_timers(&lua, &timers)?;
        if config.sandbox {
            sandbox_globals(&lua)?;
        }

        tracing::debug!(session = %id, "Created execution context session");
        Ok(Self {
            id,
            lua,
            dom,
            timers,
            outbound,
            transpiler,
            config,
            last_good: None,
            applied: Fragments::default(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Restart the visible log and ask the host for the current fragments.
    pub fn activate(&self) {
        self.outbound.post(ConsoleMessage::Clear);
        self.outbound.post(HandshakeRequest::RequestDefaultStatic);
        self.outbound.post(HandshakeRequest::RequestDefaultCode);
    }

    /// Apply one fragment. Failures are reported to the host, never returned.
    pub fn apply(&mut self, msg: HostMessage) {
        tracing::debug!(
            session = %self.id,
            kind = ?msg.kind(),
            len = msg.text().len(),
            "Applying fragment"
        );
        match msg {
            HostMessage::Code(text) => self.apply_script(text),
            HostMessage::Css(text) => {
                self.dom.document.borrow_mut().set_style(&text);
                self.applied.set(FragmentKind::Style, text);
            }
            HostMessage::Html(text) => {
                self.dom.document.borrow_mut().set_markup(&text, &self.dom.keys);
                self.applied.set(FragmentKind::Markup, text);
            }
        }
    }

    fn apply_script(&mut self, text: String) {
        let filename = self.config.filename.clone();
        match self.transpiler.transpile(&text, &filename) {
            Ok(code) => self.last_good = Some(code),
            Err(err) => {
                tracing::debug!(session = %self.id, error = %err, "Keeping last good script");
                if self.config.surface_compile_errors {
                    let message = Value::String(format!("{filename}:{err}"));
                    self.outbound
                        .post(ConsoleMessage::new(LogChannel::Compile, &[message]));
                }
            }
        }
        self.applied.set(FragmentKind::Script, text);

        if let Some(code) = self.last_good.clone() {
            self.evaluate(&code, &filename);
        }
    }

    fn evaluate(&self, code: &str, filename: &str) {
        let result = self
            .lua
            .load(code)
            .set_name(format!("={filename}"))
            .exec();
        if let Err(err) = result {
            self.outbound.report_error(&err);
        }
    }

    /// Earliest pending timer deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.borrow().next_deadline()
    }

    /// Run every timer due at `now`, returning how many ran.
    pub fn run_due_timers(&self, now: Instant) -> usize {
        let due = self.timers.borrow_mut().take_due(now);
        let count = due.len();
        for callback in due {
            if let Err(err) = callback.call::<()>(()) {
                self.outbound.report_error(&err);
            }
        }
        count
    }

    /// Fragments as most recently applied in this session.
    #[must_use]
    pub const fn applied(&self) -> &Fragments {
        &self.applied
    }

    #[must_use]
    pub fn snapshot(&self) -> DocumentSnapshot {
        let document = self.dom.document.borrow();
        DocumentSnapshot {
            session: self.id,
            stylesheet: document.stylesheet().to_string(),
            body_html: document.body_html(),
            styled_css: self.dom.styled.borrow().css(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Timer callbacks reference the Lua state.
        self.timers.borrow_mut().clear();
        tracing::debug!(session = %self.id, "Dropped execution context session");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use playground_transpile::Luax;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;

    fn session_with(config: PlaygroundConfig) -> (Session, UnboundedReceiver<ContextMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(config, Arc::new(Luax::standard()), tx).unwrap();
        (session, rx)
    }

    fn session() -> (Session, UnboundedReceiver<ContextMessage>) {
        session_with(PlaygroundConfig::default())
    }

    fn drain(rx: &mut UnboundedReceiver<ContextMessage>) -> Vec<ContextMessage> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn console(channel: LogChannel, payload: &str) -> ContextMessage {
        let args: Vec<Value> = serde_json::from_str(payload).unwrap();
        ConsoleMessage::new(channel, &args).into()
    }

    #[test]
    fn activation_clears_then_requests_both() {
        let (session, mut rx) = session();
        session.activate();
        assert_eq!(
            drain(&mut rx),
            vec![
                ContextMessage::Console(ConsoleMessage::Clear),
                HandshakeRequest::RequestDefaultStatic.into(),
                HandshakeRequest::RequestDefaultCode.into(),
            ]
        );
    }

    #[test]
    fn script_renders_into_markup() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Html("<div id=\"root\"></div>".into()));
        session.apply(HostMessage::Code(
            "local name: string = 'hi'\nUIDom.render(<p class=\"x\">{name}</p>, \"root\")".into(),
        ));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            session.snapshot().body_html,
            "<div id=\"root\"><p class=\"x\">hi</p></div>"
        );
    }

    #[test]
    fn failed_transpile_reruns_last_good_silently() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Html("<div id=\"root\"></div>".into()));
        session.apply(HostMessage::Code(
            "runs = (runs or 0) + 1\nUIDom.render(<p>one</p>, \"root\")".into(),
        ));
        let before = session.snapshot().body_html;

        session.apply(HostMessage::Code("UIDom.render(<p>two</p, \"root\")".into()));
        assert_eq!(session.snapshot().body_html, before);
        let runs: i64 = session.lua.globals().get("runs").unwrap();
        assert_eq!(runs, 2);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(
            session.applied().get(FragmentKind::Script),
            "UIDom.render(<p>two</p, \"root\")"
        );
    }

    #[test]
    fn failed_transpile_without_history_runs_nothing() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Code("local x: = 1".into()));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn compile_errors_surface_when_enabled() {
        let (mut session, mut rx) =
            session_with(PlaygroundConfig::default().with_compile_errors(true));
        session.apply(HostMessage::Code("local s = 'open".into()));
        assert_eq!(
            drain(&mut rx),
            vec![console(
                LogChannel::Compile,
                r#"["index.luax:1:11: unfinished string"]"#
            )]
        );
    }

    #[test]
    fn throwing_script_reports_once_and_recovers() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Code("console.log('before')\nerror('boom')".into()));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], console(LogChannel::Log, r#"["before"]"#));
        match &messages[1] {
            ContextMessage::Console(ConsoleMessage::Error { payload }) => {
                assert!(payload.contains("index.luax:2: boom"), "got {payload}");
            }
            other => panic!("expected error event, got {other:?}"),
        }

        session.apply(HostMessage::Code("console.log('fixed')".into()));
        assert_eq!(drain(&mut rx), vec![console(LogChannel::Log, r#"["fixed"]"#)]);
    }

    #[test]
    fn markup_after_style_keeps_stylesheet() {
        let (mut session, _rx) = session();
        session.apply(HostMessage::Css("p { color: red }".into()));
        session.apply(HostMessage::Html("<p>a</p>".into()));
        session.apply(HostMessage::Html("<p>b</p>".into()));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.stylesheet, "p { color: red }");
        assert_eq!(snapshot.body_html, "<p>b</p>");
    }

    #[test]
    fn timers_run_and_report_errors() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Code(
            "setTimeout(function() print('later') end, 10)\nsetTimeout(function() error('late boom') end, 20)"
                .into(),
        ));
        assert!(session.next_deadline().is_some());
        assert_eq!(session.run_due_timers(Instant::now() + Duration::from_secs(1)), 2);
        let messages = drain(&mut rx);
        assert_eq!(messages[0], console(LogChannel::Log, r#"["later"]"#));
        assert!(matches!(
            &messages[1],
            ContextMessage::Console(ConsoleMessage::Error { payload }) if payload.contains("late boom")
        ));
        assert!(session.next_deadline().is_none());
    }

    #[test]
    fn sandbox_hides_os() {
        let (mut session, mut rx) = session();
        session.apply(HostMessage::Code("os.exit(1)".into()));
        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            ContextMessage::Console(ConsoleMessage::Error { payload }) if payload.contains("os")
        ));
    }

    #[test]
    fn styled_rules_show_in_snapshot() {
        let (mut session, _rx) = session();
        session.apply(HostMessage::Html("<div id=\"app\"></div>".into()));
        session.apply(HostMessage::Code(
            "local Box = styled('section')('padding: 4px;')\nUIDom.render(<Box>x</Box>, document.getElementById('app'))"
                .into(),
        ));
        let snapshot = session.snapshot();
        assert!(snapshot.styled_css.contains("{ padding: 4px; }"));
        assert!(snapshot.body_html.starts_with("<div id=\"app\"><section class=\"sc-"));
    }
}
