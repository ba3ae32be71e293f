use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Topic::subscribe`].
pub type SubId = u64;

type Callback<T> = Rc<dyn Fn(&T)>;

/// A typed publish/subscribe channel.
///
/// Delivery is synchronous and in subscription order. `publish` works on a
/// snapshot of the subscriber list: a subscriber removed while a value is
/// being delivered is skipped, one added meanwhile only sees later values.
pub struct Topic<T> {
    path: String,
    next_id: Cell<SubId>,
    subscribers: RefCell<Vec<(SubId, Callback<T>)>>,
    latest: RefCell<T>,
}

impl<T: Clone + Default> Topic<T> {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_value(path, T::default())
    }
}

impl<T: Clone> Topic<T> {
    /// A topic whose value reads as `initial` until the first publish.
    pub fn with_value(path: impl Into<String>, initial: T) -> Self {
        Self {
            path: path.into(),
            next_id: Cell::new(1),
            subscribers: RefCell::new(Vec::new()),
            latest: RefCell::new(initial),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> SubId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubId) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn publish(&self, value: T) {
        *self.latest.borrow_mut() = value.clone();
        let snapshot: Vec<(SubId, Callback<T>)> = self.subscribers.borrow().clone();
        for (id, callback) in snapshot {
            if self.is_subscribed(id) {
                callback(&value);
            }
        }
    }

    /// The last published value, or the default before the first publish.
    pub fn value(&self) -> T {
        self.latest.borrow().clone()
    }

    pub fn is_subscribed(&self, id: SubId) -> bool {
        self.subscribers.borrow().iter().any(|(sid, _)| *sid == id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("path", &self.path)
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}

/// Run-to-completion queue for one node's local mode.
///
/// The state starts empty. A change requested while another is being
/// applied is queued and applied afterwards, in request order. Requesting
/// the state the node is already in does nothing.
#[derive(Debug, Default)]
pub struct ModeQueue {
    current: RefCell<String>,
    pending: RefCell<VecDeque<String>>,
    busy: Cell<bool>,
}

impl ModeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn is(&self, state: &str) -> bool {
        *self.current.borrow() == state
    }

    /// Queue `state` and, unless a change is already running, apply queued
    /// states one at a time through `apply`.
    pub fn request(&self, state: &str, apply: impl Fn(&str)) {
        self.pending.borrow_mut().push_back(state.to_string());
        if self.busy.get() {
            return;
        }
        self.busy.set(true);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else { break };
            if self.is(&next) {
                continue;
            }
            *self.current.borrow_mut() = next.clone();
            apply(&next);
        }
        self.busy.set(false);
    }
}

/// The two steps of a system mode broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePhase {
    /// Retire subscriptions of the old mode and arm those of the new one.
    Enter,
    /// Run the bodies bound to the new mode.
    Run,
}

type ModeListener = Rc<dyn Fn(ModePhase, &str)>;

/// Process-wide system mode broadcaster.
///
/// Every change goes to all listeners twice: first with
/// [`ModePhase::Enter`], then with [`ModePhase::Run`]. Changes requested
/// during a broadcast are queued and broadcast after it.
pub struct ModeBus {
    current: RefCell<String>,
    listeners: RefCell<Vec<ModeListener>>,
    pending: RefCell<VecDeque<String>>,
    busy: Cell<bool>,
    announce: Box<dyn Fn(&str)>,
}

/// The system mode a network starts in.
pub const INIT_MODE: &str = "Init";

impl ModeBus {
    /// A bus that prints every transition.
    pub fn new() -> Self {
        Self::with_announcer(|mode| println!("[SYS] Transitioning to: {}", mode))
    }

    pub fn with_announcer(announce: impl Fn(&str) + 'static) -> Self {
        Self {
            current: RefCell::new(INIT_MODE.to_string()),
            listeners: RefCell::new(Vec::new()),
            pending: RefCell::new(VecDeque::new()),
            busy: Cell::new(false),
            announce: Box::new(announce),
        }
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn listen(&self, listener: impl Fn(ModePhase, &str) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn request(&self, mode: &str) {
        self.pending.borrow_mut().push_back(mode.to_string());
        if !self.busy.get() {
            self.drain();
        }
    }

    /// Run `start` with the bus held busy, then broadcast whatever it
    /// requested.
    pub fn boot(&self, start: impl FnOnce()) {
        self.busy.set(true);
        start();
        self.drain();
    }

    fn drain(&self) {
        self.busy.set(true);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else { break };
            if *self.current.borrow() == next {
                continue;
            }
            *self.current.borrow_mut() = next.clone();
            (self.announce)(&next);
            let listeners: Vec<ModeListener> = self.listeners.borrow().clone();
            for listener in &listeners {
                listener(ModePhase::Enter, &next);
            }
            for listener in &listeners {
                listener(ModePhase::Run, &next);
            }
        }
        self.busy.set(false);
    }
}

impl Default for ModeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeBus")
            .field("current", &self.current.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

/// `[node] [LEVEL] message`
pub fn format_log(node: &str, level: &str, message: &str) -> String {
    format!("[{}] [{}] {}", node, level, message)
}

pub fn log_line(node: &str, level: &str, message: &str) {
    println!("{}", format_log(node, level, message));
}

// rivet:runtime-end

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_in_subscription_order() {
        let topic: Topic<i64> = Topic::new("/a/x");
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            topic.subscribe(move |v| seen.borrow_mut().push(format!("{}:{}", tag, v)));
        }
        topic.publish(7);
        assert_eq!(*seen.borrow(), vec!["first:7", "second:7"]);
        assert_eq!(topic.value(), 7);
    }

    #[test]
    fn test_value_defaults_before_publish() {
        let topic: Topic<String> = Topic::new("/a/s");
        assert_eq!(topic.value(), "");
    }

    #[test]
    fn test_unsubscribed_during_delivery_is_skipped() {
        let topic: Rc<Topic<i64>> = Rc::new(Topic::new("/a/x"));
        let hits = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        {
            let t = topic.clone();
            let second = second.clone();
            topic.subscribe(move |_| {
                t.unsubscribe(second.get());
            });
        }
        let h = hits.clone();
        second.set(topic.subscribe(move |_| h.set(h.get() + 1)));
        topic.publish(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_subscribed_during_delivery_waits() {
        let topic: Rc<Topic<i64>> = Rc::new(Topic::new("/a/x"));
        let hits = Rc::new(Cell::new(0));
        let t = topic.clone();
        let h = hits.clone();
        topic.subscribe(move |_| {
            let h = h.clone();
            t.subscribe(move |_| h.set(h.get() + 1));
        });
        topic.publish(1);
        assert_eq!(hits.get(), 0);
        topic.publish(2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown() {
        let topic: Topic<bool> = Topic::new("/a/b");
        let id = topic.subscribe(|_| {});
        assert!(topic.unsubscribe(id));
        assert!(!topic.unsubscribe(id));
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_mode_queue_runs_to_completion() {
        let queue = Rc::new(ModeQueue::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let apply = {
            let queue = queue.clone();
            let log = log.clone();
            move |state: &str| {
                log.borrow_mut().push(format!("enter {}", state));
                if state == "A" {
                    queue.request("B", |_| {});
                    log.borrow_mut().push("A done".to_string());
                }
            }
        };
        queue.request("A", &apply);
        assert_eq!(*log.borrow(), vec!["enter A", "A done", "enter B"]);
        assert_eq!(queue.current(), "B");
    }

    #[test]
    fn test_mode_queue_skips_same_state() {
        let queue = ModeQueue::new();
        let count = Cell::new(0);
        queue.request("Idle", |_| count.set(count.get() + 1));
        queue.request("Idle", |_| count.set(count.get() + 1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_bus_two_phase_broadcast() {
        let bus = Rc::new(ModeBus::with_announcer(|_| {}));
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let log = log.clone();
            bus.listen(move |phase, mode| log.borrow_mut().push(format!("{} {:?} {}", name, phase, mode)));
        }
        bus.request("Active");
        assert_eq!(
            *log.borrow(),
            vec!["a Enter Active", "b Enter Active", "a Run Active", "b Run Active"]
        );
    }

    #[test]
    fn test_bus_queues_nested_requests() {
        let bus = Rc::new(ModeBus::with_announcer(|_| {}));
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let b = bus.clone();
            let log = log.clone();
            bus.listen(move |phase, mode| {
                log.borrow_mut().push(format!("{:?} {}", phase, mode));
                if phase == ModePhase::Run && mode == "Startup" {
                    b.request("Active");
                    log.borrow_mut().push("requested".to_string());
                }
            });
        }
        bus.request("Startup");
        assert_eq!(
            *log.borrow(),
            vec!["Enter Startup", "Run Startup", "requested", "Enter Active", "Run Active"]
        );
        assert_eq!(bus.current(), "Active");
    }

    #[test]
    fn test_bus_ignores_current_mode() {
        let bus = ModeBus::with_announcer(|_| {});
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        bus.listen(move |_, _| c.set(c.get() + 1));
        bus.request(INIT_MODE);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_format_log() {
        assert_eq!(format_log("A", "INFO", "hi"), "[A] [INFO] hi");
    }
}
