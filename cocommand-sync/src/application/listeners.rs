use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Slots<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

impl<T> Slots<T> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

trait Detach {
    fn detach(&mut self, id: u64) -> bool;
    fn is_attached(&self, id: u64) -> bool;
}

impl<T> Detach for Slots<T> {
    fn detach(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    fn is_attached(&self, id: u64) -> bool {
        self.contains(id)
    }
}

/// Ordered set of callbacks invoked synchronously on [`emit`](Self::emit)
///
/// Callbacks run in subscription order. A callback may subscribe or
/// unsubscribe (itself or others) while being invoked; removals take effect
/// immediately, additions on the next emit.
pub struct Listeners<T: 'static> {
    slots: Rc<RefCell<Slots<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let mut slots = self.slots.borrow_mut();
        let id = slots.next_id;
        slots.next_id += 1;

        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        slots.entries.push((id, callback));

        let detach: Rc<RefCell<dyn Detach>> = self.slots.clone();
        Subscription {
            slots: Rc::downgrade(&detach),
            id,
        }
    }

    /// Invoke every callback with `value`, returning how many ran
    pub fn emit(&self, value: &T) -> usize {
        let entries: Vec<(u64, Callback<T>)> = self.slots.borrow().entries.clone();

        let mut invoked = 0;
        for (id, callback) in entries {
            // Unsubscribed by an earlier callback in this round
            if !self.slots.borrow().contains(id) {
                continue;
            }

            match callback.try_borrow_mut() {
                Ok(mut callback) => {
                    (&mut *callback)(value);
                    invoked += 1;
                }
                Err(_) => {
                    tracing::warn!("Listener {} re-entered during emit, skipped", id);
                }
            }
        }

        invoked
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.borrow_mut().entries.clear();
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle returned by every `register_*`/`subscribe` call
///
/// Dropping the handle keeps the callback registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription {
    slots: Weak<RefCell<dyn Detach>>,
    id: u64,
}

impl Subscription {
    /// Remove the callback. Safe to call repeatedly and from inside the
    /// callback itself. Returns true only on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        let Some(slots) = self.slots.upgrade() else {
            return false;
        };

        let mut slots = match slots.try_borrow_mut() {
            Ok(slots) => slots,
            Err(_) => return false,
        };
        slots.detach(self.id)
    }

    pub fn is_active(&self) -> bool {
        self.slots
            .upgrade()
            .and_then(|slots| slots.try_borrow().ok().map(|s| s.is_attached(self.id)))
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
