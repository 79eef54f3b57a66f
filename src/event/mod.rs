//! Observer lists with subscription tokens
//!
//! Each event is a list of `(token, callback)` pairs. `subscribe` returns a
//! token the holder must use to unsubscribe. Callbacks must not mutate the
//! list they are dispatched from; removals requested while a dispatch is in
//! flight are deferred until it finishes.

/// Opaque handle identifying one subscription on one event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberToken(u64);

type Callback<E> = Box<dyn FnMut(&E)>;

pub struct EventList<E> {
    entries: Vec<(u64, Callback<E>)>,
    next_token: u64,
    dispatching: bool,
    deferred_removals: Vec<u64>,
}

impl<E> EventList<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 1,
            dispatching: false,
            deferred_removals: Vec::new(),
        }
    }

    /// Register a callback; returns the token needed to unsubscribe.
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) -> SubscriberToken {
        let token = self.next_token;
        self.next_token += 1;
        self.entries.push((token, Box::new(callback)));
        SubscriberToken(token)
    }

    /// Remove a subscription. Removal during a dispatch is deferred; the
    /// callback will not be invoked again after the current pass.
    pub fn unsubscribe(&mut self, token: SubscriberToken) {
        if self.dispatching {
            self.deferred_removals.push(token.0);
        } else {
            self.entries.retain(|(t, _)| *t != token.0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke every live callback with `payload`.
    pub fn dispatch(&mut self, payload: &E) {
        self.dispatching = true;
        // Only entries present at dispatch start are invoked.
        let count = self.entries.len();
        for i in 0..count {
            let token = self.entries[i].0;
            if self.deferred_removals.contains(&token) {
                continue;
            }
            (self.entries[i].1)(payload);
        }
        self.dispatching = false;
        if !self.deferred_removals.is_empty() {
            let dead = std::mem::take(&mut self.deferred_removals);
            self.entries.retain(|(t, _)| !dead.contains(t));
        }
    }
}

impl<E> Default for EventList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventList<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventList")
            .field("subscribers", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
