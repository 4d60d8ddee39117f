//! Event-loop timers for the debounced save.

use futures::future::LocalBoxFuture;
use gloo_timers::callback::Timeout;
use wasm_bindgen_futures::spawn_local;
use chat_core::ports::{PendingTimer, TimerPort};

#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserTimer;

impl BrowserTimer {
    pub fn new() -> Self {
        Self
    }
}

/// Dropping a `Timeout` without `cancel` still clears it, so the handle
/// only has to be kept alive until then.
struct BrowserPendingTimer(Timeout);

impl PendingTimer for BrowserPendingTimer {
    fn cancel(self: Box<Self>) {
        let BrowserPendingTimer(timeout) = *self;
        let _ = timeout.cancel();
    }
}

impl TimerPort for BrowserTimer {
    fn schedule(&self, delay_ms: u32, task: LocalBoxFuture<'static, ()>) -> Box<dyn PendingTimer> {
        let timeout = Timeout::new(delay_ms, move || spawn_local(task));
        Box::new(BrowserPendingTimer(timeout))
    }
}
