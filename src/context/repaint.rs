use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    stopping: bool,
}

/// Why the render thread woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Repaint,
    Timeout,
    Stop,
}

/// Coalescing wake-up between callers of `trigger_repaint` and the render
/// thread. Any number of triggers before the next wait collapse into one.
#[derive(Debug, Default)]
pub(crate) struct RepaintSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl RepaintSignal {
    /// Requests one more frame. Ignored once stopping. Never blocks on the
    /// render thread.
    pub(crate) fn trigger(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.stopping {
            return false;
        }
        state.pending = true;
        self.cond.notify_one();
        true
    }

    pub(crate) fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopping = true;
        state.pending = false;
        self.cond.notify_all();
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.state.lock().unwrap().stopping
    }

    /// Blocks until a repaint is pending, `timeout` elapses, or a stop is
    /// requested. `None` waits without a timeout.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Wake {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();

        loop {
            if state.stopping {
                return Wake::Stop;
            }
            if state.pending {
                state.pending = false;
                return Wake::Repaint;
            }

            match deadline {
                None => state = self.cond.wait(state).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Timeout;
                    }
                    state = self.cond.wait_timeout(state, deadline - now).unwrap().0;
                }
            }
        }
    }
}
