use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{Component, ComponentEvent, ComponentListener, ListenerId, PaintTarget};
use crate::geometry::Bounds;

#[derive(Debug, Default)]
struct SimpleState {
    bounds: Bounds,
    showing: bool,
    destroyed: bool,
}

/// In-process component driven directly by its owner.
///
/// Useful for hosts that manage their own windows and just want to tell a
/// context where it lives, and for tests. Every setter notifies listeners
/// synchronously on the calling thread, after internal locks are released.
#[derive(Default)]
pub struct SimpleComponent {
    state: Mutex<SimpleState>,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn ComponentListener>)>>,
    paints: AtomicUsize,
    last_paint: Mutex<Option<PaintTarget>>,
}

impl SimpleComponent {
    pub fn new(bounds: Bounds, showing: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SimpleState { bounds, showing, destroyed: false }),
            ..Default::default()
        })
    }

    pub fn set_visible(&self, showing: bool) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            if state.destroyed || state.showing == showing {
                false
            } else {
                state.showing = showing;
                true
            }
        };
        if changed {
            self.notify(ComponentEvent::VisibilityChanged);
        }
    }

    /// Sends `Resized` when the size changed, otherwise `Moved` when only the
    /// position did.
    pub fn set_bounds(&self, bounds: Bounds) {
        let event = {
            let mut state = self.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            let old = std::mem::replace(&mut state.bounds, bounds);
            if old == bounds {
                None
            } else if (old.width, old.height) != (bounds.width, bounds.height) {
                Some(ComponentEvent::Resized)
            } else {
                Some(ComponentEvent::Moved)
            }
        };
        if let Some(event) = event {
            self.notify(event);
        }
    }

    pub fn reparent(&self) {
        self.notify(ComponentEvent::ParentChanged);
    }

    /// Asks for the 2D paint pass to run again.
    pub fn repaint(&self) {
        self.notify(ComponentEvent::Invalidated);
    }

    pub fn destroy(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.showing = false;
        }
        self.notify(ComponentEvent::Destroyed);
        self.listeners.lock().unwrap().clear();
    }

    /// Live listener registrations.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, l)| l.strong_count() > 0)
            .count()
    }

    /// How often the 2D paint pass ran.
    pub fn paint_count(&self) -> usize {
        self.paints.load(Ordering::SeqCst)
    }

    pub fn last_paint(&self) -> Option<PaintTarget> {
        *self.last_paint.lock().unwrap()
    }

    fn notify(&self, event: ComponentEvent) {
        let targets: Vec<Arc<dyn ComponentListener>> = {
            let mut listeners = self.listeners.lock().unwrap();
            listeners.retain(|(_, l)| l.strong_count() > 0);
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };

        for listener in targets {
            listener.component_event(event);
        }
    }
}

impl Component for SimpleComponent {
    fn bounds(&self) -> Bounds {
        self.state.lock().unwrap().bounds
    }

    fn is_showing(&self) -> bool {
        self.state.lock().unwrap().showing
    }

    fn add_listener(&self, id: ListenerId, listener: Weak<dyn ComponentListener>) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.push((id, listener));
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|(existing, _)| *existing != id);
    }

    fn paint_gl(&self, target: &PaintTarget) {
        self.paints.fetch_add(1, Ordering::SeqCst);
        *self.last_paint.lock().unwrap() = Some(*target);
    }
}
