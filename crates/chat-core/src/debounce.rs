//! Debounced task: one pending timer at a time.
//!
//! Scheduling replaces whatever was pending, so a burst of triggers inside
//! the quiet period collapses into a single run of the last task.
//! Cancellation is explicit and also happens on drop.

use std::cell::Cell;
use std::rc::Rc;
use futures::future::{FutureExt, LocalBoxFuture};
use crate::ports::{PendingTimer, TimerPort};

struct Pending {
    handle: Box<dyn PendingTimer>,
    /// Cleared when the timer fires
    armed: Rc<Cell<bool>>,
}

pub struct DebouncedTask {
    timer: Rc<dyn TimerPort>,
    delay_ms: u32,
    pending: Option<Pending>,
}

impl DebouncedTask {
    pub fn new(timer: Rc<dyn TimerPort>, delay_ms: u32) -> Self {
        Self {
            timer,
            delay_ms,
            pending: None,
        }
    }

    /// Cancel any pending run and restart the quiet period with `task`.
    pub fn schedule(&mut self, task: LocalBoxFuture<'static, ()>) {
        self.cancel();
        let armed = Rc::new(Cell::new(true));
        let fired = armed.clone();
        let wrapped = async move {
            fired.set(false);
            task.await;
        }
        .boxed_local();
        let handle = self.timer.schedule(self.delay_ms, wrapped);
        self.pending = Some(Pending { handle, armed });
    }

    /// Returns true if a task was still waiting to fire.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                let was_armed = pending.armed.get();
                pending.handle.cancel();
                was_armed
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| p.armed.get())
    }
}

impl Drop for DebouncedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
