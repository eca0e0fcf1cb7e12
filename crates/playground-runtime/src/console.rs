//! Console interception shim.
//!
//! Replaces `console.*` and `print` with functions that serialize their
//! arguments and post them to the host. Uncaught errors are reported through
//! [`Outbound::report_error`].

use mlua::{Function, Lua, MultiValue};
use tokio::sync::mpsc::UnboundedSender;

use playground_core::{ConsoleMessage, ContextMessage, LogChannel, SessionId};

use crate::{lua_error_message, serialize::lua_to_json};

/// Sending half of the context → host channel, tagged with the session for logging.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: UnboundedSender<ContextMessage>,
    session: SessionId,
}

impl Outbound {
    pub const fn new(tx: UnboundedSender<ContextMessage>, session: SessionId) -> Self {
        Self { tx, session }
    }

    /// Post a message. Delivery failure means the host is gone and is not an error.
    pub fn post(&self, msg: impl Into<ContextMessage>) {
        if self.tx.send(msg.into()).is_err() {
            tracing::debug!(session = %self.session, "Host receiver dropped, discarding message");
        }
    }

    /// Route an uncaught error to the `error` channel.
    pub fn report_error(&self, err: &mlua::Error) {
        let message = lua_error_message(err);
        tracing::debug!(session = %self.session, %message, "Uncaught error in user script");
        self.post(ConsoleMessage::error(message));
    }
}

/// Install `console` and redirect `print` to `console.log`.
///
/// # Errors
/// Returns error if the Lua functions cannot be created.
pub fn install_console(lua: &Lua, outbound: &Outbound) -> mlua::Result<()> {
    let console = lua.create_table()?;

    for channel in [LogChannel::Log, LogChannel::Warn, LogChannel::Error] {
        let out = outbound.clone();
        let f = lua.create_function(move |_, args: MultiValue| {
            let payload = args
                .iter()
                .map(lua_to_json)
                .collect::<mlua::Result<Vec<_>>>()?;
            out.post(ConsoleMessage::new(channel, &payload));
            Ok(())
        })?;
        console.set(channel.as_str(), f)?;
    }

    let out = outbound.clone();
    let clear = lua.create_function(move |_, _: MultiValue| {
        out.post(ConsoleMessage::Clear);
        Ok(())
    })?;
    console.set("clear", clear)?;

    let log: Function = console.get("log")?;
    console.set("info", log.clone())?;
    console.set("debug", log.clone())?;
    lua.globals().set("print", log)?;
    lua.globals().set("console", console)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn setup() -> (Lua, mpsc::UnboundedReceiver<ContextMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let lua = Lua::new();
        install_console(&lua, &Outbound::new(tx, SessionId::new_v4())).unwrap();
        (lua, rx)
    }

    fn payload(msg: ContextMessage) -> (LogChannel, String) {
        match msg {
            ContextMessage::Console(c) => (c.channel(), c.payload().unwrap_or("").to_string()),
            ContextMessage::Request(r) => panic!("unexpected request {r:?}"),
        }
    }

    #[test]
    fn arguments_serialize_independently_in_order() {
        let (lua, mut rx) = setup();
        lua.load("console.log({a = 1}, {1, 2, 3}, 'x', nil)").exec().unwrap();
        let (channel, text) = payload(rx.try_recv().unwrap());
        assert_eq!(channel, LogChannel::Log);
        assert_eq!(text, r#"[{"a":1},[1,2,3],"x",null]"#);
    }

    #[test]
    fn print_maps_to_log_and_clear_has_no_payload() {
        let (lua, mut rx) = setup();
        lua.load("print('hi') console.warn('w') console.clear('ignored')")
            .exec()
            .unwrap();
        assert_eq!(payload(rx.try_recv().unwrap()), (LogChannel::Log, r#"["hi"]"#.into()));
        assert_eq!(payload(rx.try_recv().unwrap()), (LogChannel::Warn, r#"["w"]"#.into()));
        let clear = rx.try_recv().unwrap();
        assert_eq!(clear, ContextMessage::Console(ConsoleMessage::Clear));
    }

    #[test]
    fn cyclic_argument_raises_in_caller() {
        let (lua, mut rx) = setup();
        let err = lua
            .load("local t = {} t.t = t console.log(t)")
            .exec()
            .unwrap_err();
        assert!(lua_error_message(&err).contains("cyclic"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn report_error_posts_one_error_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let out = Outbound::new(tx, SessionId::new_v4());
        out.report_error(&mlua::Error::RuntimeError("index.luax:2: boom".into()));
        assert_eq!(
            payload(rx.try_recv().unwrap()),
            (LogChannel::Error, r#"["index.luax:2: boom"]"#.into())
        );
        assert!(rx.try_recv().is_err());
    }
}
