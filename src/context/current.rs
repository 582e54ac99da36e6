//! Per-thread "active context" registration.
//!
//! Each thread remembers at most one context, set by `make_active` and cleared
//! when that context's native context shuts down or is explicitly released.
//! Only weak references are stored, so a registration never keeps a context
//! alive.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::shared::{ContextShared, ImageShared};

type Registration = (Weak<ContextShared>, Weak<ImageShared>);

thread_local! {
    static ACTIVE: RefCell<Option<Registration>> = const { RefCell::new(None) };
}

pub(crate) fn set(shared: &Arc<ContextShared>, image: &Arc<ImageShared>) {
    ACTIVE.with(|active| *active.borrow_mut() = Some((Arc::downgrade(shared), Arc::downgrade(image))));
}

pub(crate) fn get() -> Option<(Arc<ContextShared>, Arc<ImageShared>)> {
    ACTIVE.with(|active| {
        let active = active.borrow();
        let (shared, image) = active.as_ref()?;
        Some((shared.upgrade()?, image.upgrade()?))
    })
}

/// True when `shared` is registered here. With `image`, that exact native
/// context must be the registered one too.
pub(crate) fn is(shared: &ContextShared, image: Option<&ImageShared>) -> bool {
    ACTIVE.with(|active| {
        active.borrow().as_ref().map_or(false, |(s, i)| {
            std::ptr::eq(s.as_ptr(), shared) && image.map_or(true, |image| std::ptr::eq(i.as_ptr(), image))
        })
    })
}

pub(crate) fn clear() {
    let _ = ACTIVE.try_with(|active| active.borrow_mut().take());
}

/// Clears the registration only if it points at `shared`.
pub(crate) fn clear_if(shared: &ContextShared) {
    let _ = ACTIVE.try_with(|active| {
        let mut active = active.borrow_mut();
        if active.as_ref().map_or(false, |(s, _)| std::ptr::eq(s.as_ptr(), shared)) {
            *active = None;
        }
    });
}

/// Clears the registration only if it points at `image`.
pub(crate) fn clear_if_image(image: &ImageShared) {
    let _ = ACTIVE.try_with(|active| {
        let mut active = active.borrow_mut();
        if active.as_ref().map_or(false, |(_, i)| std::ptr::eq(i.as_ptr(), image)) {
            *active = None;
        }
    });
}
