//! `setTimeout` / `clearTimeout`.
//!
//! Timers live in the session and are driven by the context event loop via
//! [`TimerQueue::next_deadline`] and [`TimerQueue::take_due`]. They survive
//! re-evaluation of the script.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc, time::Duration};

use mlua::{Function, Lua, Value};
use tokio::time::Instant;

struct Timer {
    due: Instant,
    callback: Function,
}

#[derive(Default)]
pub struct TimerQueue {
    next_id: i64,
    timers: BTreeMap<i64, Timer>,
}

impl TimerQueue {
    pub fn schedule(&mut self, callback: Function, delay: Duration) -> i64 {
        self.next_id += 1;
        self.timers.insert(
            self.next_id,
            Timer {
                due: Instant::now() + delay,
                callback,
            },
        );
        self.next_id
    }

    pub fn cancel(&mut self, id: i64) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Remove and return callbacks due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<Function> {
        let mut due: Vec<(Instant, i64)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .map(|(id, t)| (t.due, *id))
            .collect();
        due.sort_unstable();
        due.into_iter()
            .filter_map(|(_, id)| self.timers.remove(&id))
            .map(|t| t.callback)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

/// Install `setTimeout(fn, ms)` and `clearTimeout(id)`.
///
/// # Errors
/// Returns error if the Lua functions cannot be created.
pub fn install_timers(lua: &Lua, queue: &Rc<RefCell<TimerQueue>>) -> mlua::Result<()> {
    let q = Rc::clone(queue);
    let set_timeout = lua.create_function(move |_, (callback, ms): (Function, Option<f64>)| {
        let ms = ms.filter(|ms| ms.is_finite() && *ms > 0.0).unwrap_or(0.0);
        Ok(q.borrow_mut()
            .schedule(callback, Duration::from_secs_f64(ms / 1000.0)))
    })?;

    let q = Rc::clone(queue);
    let clear_timeout = lua.create_function(move |_, id: Value| {
        if let Value::Integer(id) = id {
            q.borrow_mut().cancel(id);
        }
        Ok(())
    })?;

    lua.globals().set("setTimeout", set_timeout)?;
    lua.globals().set("clearTimeout", clear_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_timers_are_taken_once() {
        let lua = Lua::new();
        let queue = Rc::new(RefCell::new(TimerQueue::default()));
        install_timers(&lua, &queue).unwrap();
        lua.load(
            r"
            setTimeout(function() end, 1000)
            setTimeout(function() end, 100)
            local id = setTimeout(function() end, 5)
            clearTimeout(id)
            ",
        )
        .exec()
        .unwrap();
        assert_eq!(queue.borrow().len(), 2);
        assert!(queue.borrow().next_deadline().unwrap() > Instant::now());

        let now = Instant::now();
        assert_eq!(
            queue.borrow_mut().take_due(now + Duration::from_millis(500)).len(),
            1
        );
        assert!(queue.borrow_mut().take_due(now + Duration::from_millis(500)).is_empty());
        assert_eq!(
            queue.borrow_mut().take_due(now + Duration::from_secs(5)).len(),
            1
        );
        assert!(queue.borrow().is_empty());
        assert!(queue.borrow().next_deadline().is_none());
    }

    #[test]
    fn callbacks_come_back_in_order() {
        let lua = Lua::new();
        let queue = Rc::new(RefCell::new(TimerQueue::default()));
        install_timers(&lua, &queue).unwrap();
        lua.load(
            r"
            order = {}
            setTimeout(function() table.insert(order, 'second') end)
            setTimeout(function() table.insert(order, 'third') end, 0)
            ",
        )
        .exec()
        .unwrap();
        let due = queue
            .borrow_mut()
            .take_due(Instant::now() + Duration::from_millis(1));
        for f in due {
            f.call::<()>(()).unwrap();
        }
        let order: Vec<String> = lua.load("return order").eval().unwrap();
        assert_eq!(order, vec!["second", "third"]);
    }
}
