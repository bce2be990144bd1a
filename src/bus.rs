//! Event bus — multi-subscriber broadcast of newly produced gaze samples.
//!
//! Decouples provider threads from the consuming service: vendor drivers
//! publish from their own callback thread, the simulated provider from the
//! host tick, and every subscriber sees the same synchronous, in-order
//! delivery either way. Subscriber callbacks therefore run on whatever
//! thread published and must only touch state that is safe there.
//!
//! One bus is constructed per process and shared by `Arc`; there is no
//! ambient global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::sample::GazeSample;

/// Handle returned by `subscribe`, used to remove the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

type Callback = Arc<dyn Fn(&GazeSample) + Send + Sync>;

/// Multi-subscriber broadcast point for gaze samples.
pub struct GazeBus {
    subscribers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_id: AtomicU64,
}

impl GazeBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback, invoked for every published sample until
    /// unsubscribed. Callbacks may run off the host thread.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&GazeSample) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        debug!("bus: subscriber {:?} registered", id);
        id
    }

    /// Remove a subscription. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock().unwrap();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        before != subs.len()
    }

    /// Deliver a sample to every subscriber, synchronously and in
    /// registration order. A bus with zero subscribers is a no-op.
    ///
    /// Callbacks are invoked outside the subscriber lock, so a callback
    /// may itself subscribe or unsubscribe without deadlocking; such
    /// changes take effect from the next publish.
    pub fn publish(&self, sample: &GazeSample) {
        let callbacks: Vec<Callback> = {
            let subs = self.subscribers.lock().unwrap();
            subs.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for cb in callbacks {
            cb(sample);
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl Default for GazeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, Vec3};
    use crate::sample::EyeState;
    use std::sync::atomic::AtomicUsize;

    fn sample(ts: i64) -> GazeSample {
        let fwd = Vec3::new(0.0, 0.0, 1.0);
        GazeSample {
            device_timestamp: ts,
            host_timestamp: 0.0,
            left_ray: Ray::new(Vec3::ZERO, fwd),
            right_ray: Ray::new(Vec3::ZERO, fwd),
            combined_ray: Ray::new(Vec3::ZERO, fwd),
            gaze_distance: 1.0,
            left_eye: EyeState::invalid(),
            right_eye: EyeState::invalid(),
        }
    }

    #[test]
    fn test_publish_with_zero_subscribers_is_noop() {
        let bus = GazeBus::new();
        bus.publish(&sample(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = GazeBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = order.clone();
            bus.subscribe(move |_| order.lock().unwrap().push(tag));
        }

        bus.publish(&sample(1));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = GazeBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::Relaxed);
        });

        bus.publish(&sample(1));
        assert!(bus.unsubscribe(id));
        bus.publish(&sample(2));

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(!bus.unsubscribe(id), "double unsubscribe reports false");
    }

    #[test]
    fn test_publish_from_other_thread() {
        let bus = Arc::new(GazeBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        bus.subscribe(move |g| {
            assert_eq!(g.device_timestamp, 7);
            s.fetch_add(1, Ordering::Relaxed);
        });

        let bus2 = bus.clone();
        let handle = std::thread::spawn(move || bus2.publish(&sample(7)));
        handle.join().unwrap();

        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_subscribe_inside_callback_does_not_deadlock() {
        let bus = Arc::new(GazeBus::new());
        let bus2 = bus.clone();
        bus.subscribe(move |_| {
            bus2.subscribe(|_| {});
        });
        bus.publish(&sample(1));
        assert_eq!(bus.subscriber_count(), 2);
    }
}
