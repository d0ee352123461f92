//! Change notification for item property stores.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// One observed property change. Carries the observable values before and
/// after the mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub shape: String,
    pub property: String,
    pub old: Value,
    pub new: Value,
}

/// Callback invoked synchronously on a property change. Dispatch itself is
/// single-threaded-cooperative; the bounds keep items embeddable in the
/// process-wide descriptor state.
pub type ListenerFn = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Registration handle for listener removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerHandle(u64);

struct Registration {
    handle: ListenerHandle,
    /// Property slot this listener observes; `None` observes the whole item.
    scope: Option<usize>,
    callback: ListenerFn,
}

/// Listener registrations of one item. Not carried along on copies.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl Listeners {
    pub(crate) fn register(&mut self, scope: Option<usize>, callback: ListenerFn) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            handle,
            scope,
            callback,
        });
        handle
    }

    pub(crate) fn remove(&mut self, handle: ListenerHandle) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.handle != handle);
        self.registrations.len() != before
    }

    /// Dispatch synchronously, in registration order. The callback list is
    /// snapshotted first so dispatch observes a consistent registration
    /// state.
    pub(crate) fn notify(&self, slot: usize, event: &ChangeEvent) {
        let callbacks: Vec<ListenerFn> = self
            .registrations
            .iter()
            .filter(|r| r.scope.is_none() || r.scope == Some(slot))
            .map(|r| r.callback.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listeners({})", self.registrations.len())
    }
}
