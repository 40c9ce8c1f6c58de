/*++

Licensed under the Apache-2.0 license.

File Name:

    line.rs

Abstract:

    File contains boolean signal lines (interrupt requests, fault outputs)
    and the listener registry they notify.

--*/

/// Handle returned by `subscribe`, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Ordered list of listener closures.
pub struct Listeners<T> {
    next: u64,
    entries: Vec<(ListenerHandle, Box<dyn FnMut(T) + Send>)>,
}

impl<T: Copy> Listeners<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            entries: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(T) + Send + 'static) -> ListenerHandle {
        let handle = ListenerHandle(self.next);
        self.next += 1;
        self.entries.push((handle, Box::new(listener)));
        handle
    }

    /// Returns `false` if `handle` was not subscribed
    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        let len = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != len
    }

    /// Invoke every listener in registration order
    pub fn notify(&mut self, value: T) {
        for (_, listener) in self.entries.iter_mut() {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Named boolean output signal.
///
/// Listeners are notified synchronously on every level change.
pub struct Line {
    name: &'static str,
    level: bool,
    listeners: Listeners<bool>,
}

impl Line {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: false,
            listeners: Listeners::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_set(&self) -> bool {
        self.level
    }

    pub fn set(&mut self, level: bool) {
        if self.level != level {
            self.level = level;
            self.listeners.notify(level);
        }
    }

    pub fn unset(&mut self) {
        self.set(false);
    }

    /// Pulse the line: listeners see a rising then a falling edge and the
    /// line ends low.
    pub fn blink(&mut self) {
        self.level = true;
        self.listeners.notify(true);
        self.level = false;
        self.listeners.notify(false);
    }

    pub fn subscribe(&mut self, listener: impl FnMut(bool) + Send + 'static) -> ListenerHandle {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }
}

/// Component accepting input line stimuli (buttons, reset pins, event
/// inputs).
pub trait LineReceiver {
    fn on_line(&mut self, line: usize, value: bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(line: &mut Line) -> (Arc<Mutex<Vec<bool>>>, ListenerHandle) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handle = line.subscribe(move |v| sink.lock().unwrap().push(v));
        (seen, handle)
    }

    #[test]
    fn test_set_notifies_on_change_only() {
        let mut line = Line::new("IRQ");
        let (seen, _) = recorder(&mut line);
        line.set(true);
        line.set(true);
        line.unset();
        line.unset();
        assert_eq!(*seen.lock().unwrap(), [true, false]);
        assert!(!line.is_set());
    }

    #[test]
    fn test_blink() {
        let mut line = Line::new("ALERT");
        let (seen, _) = recorder(&mut line);
        line.blink();
        assert_eq!(*seen.lock().unwrap(), [true, false]);
        assert!(!line.is_set());
    }

    #[test]
    fn test_listener_order_and_unsubscribe() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        let first = order.clone();
        let a = listeners.subscribe(move |v: u32| first.lock().unwrap().push(("a", v)));
        let second = order.clone();
        listeners.subscribe(move |v: u32| second.lock().unwrap().push(("b", v)));
        listeners.notify(1);
        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));
        listeners.notify(2);
        assert_eq!(*order.lock().unwrap(), [("a", 1), ("b", 1), ("b", 2)]);
        assert_eq!(listeners.len(), 1);
    }
}
