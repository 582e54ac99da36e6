use std::any::Any;
use std::sync::{Arc, Mutex};

/// Shared object cached alongside a context, e.g. a compiled shader program.
pub type AssociatedObject = Arc<dyn Any + Send + Sync>;

/// Name-keyed objects released together when the native context goes away.
///
/// Only the render thread touches the table, so the lock is never contended.
/// Values are dropped after the lock is released: a value's `Drop` may look
/// other entries up.
#[derive(Default)]
pub(crate) struct AssociatedObjects {
    entries: Mutex<Vec<(String, AssociatedObject)>>,
}

impl AssociatedObjects {
    pub(crate) fn get(&self, name: &str) -> Option<AssociatedObject> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, obj)| obj.clone())
    }

    /// Stores `object` under `name`, releasing whatever was there. `None`
    /// removes the entry.
    pub(crate) fn set(&self, name: &str, object: Option<AssociatedObject>) {
        let released = {
            let mut entries = self.entries.lock().unwrap();
            let existing = entries.iter().position(|(key, _)| key == name);

            match (existing, object) {
                (Some(idx), Some(obj)) => Some(std::mem::replace(&mut entries[idx].1, obj)),
                (Some(idx), None) => Some(entries.remove(idx).1),
                (None, Some(obj)) => {
                    entries.push((name.to_string(), obj));
                    None
                }
                (None, None) => None,
            }
        };
        drop(released);
    }

    /// Releases every entry, newest first. Returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let mut released = 0;
        loop {
            let Some(entry) = self.entries.lock().unwrap().pop() else {
                break;
            };
            drop(entry);
            released += 1;
        }
        released
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
