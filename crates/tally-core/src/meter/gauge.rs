//! Gauges sample a supplier at publish time
//!
//! A gauge holds no aggregation state. [`Gauge::weak`] observes an `Arc`
//! without keeping it alive; once the target is dropped the gauge reads NaN,
//! which publishers then drop as an invalid value.

use std::sync::{Arc, Weak};

use tally_common::MeterId;

type Supplier = dyn Fn() -> f64 + Send + Sync;

struct GaugeInner {
    id: MeterId,
    supplier: Box<Supplier>,
}

impl std::fmt::Debug for GaugeInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeInner").field("id", &self.id).finish()
    }
}

/// Gauge handle
#[derive(Debug, Clone)]
pub struct Gauge {
    inner: Arc<GaugeInner>,
}

impl Gauge {
    pub fn new<F>(id: MeterId, supplier: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(GaugeInner {
                id,
                supplier: Box::new(supplier),
            }),
        }
    }

    /// Gauge over a weakly held object
    pub fn weak<T, F>(id: MeterId, target: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let target: Weak<T> = Arc::downgrade(target);
        Self::new(id, move || match target.upgrade() {
            Some(t) => f(&t),
            None => f64::NAN,
        })
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    pub fn value(&self) -> f64 {
        (self.inner.supplier)()
    }

    pub(crate) fn ptr_eq(&self, other: &Gauge) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tally_common::{MeterKind, Tags};

    fn id() -> MeterId {
        MeterId::new("queue.size", Tags::empty(), MeterKind::Gauge)
    }

    #[test]
    fn test_supplier_is_read_on_every_call() {
        let depth = Arc::new(AtomicUsize::new(3));
        let source = depth.clone();
        let gauge = Gauge::new(id(), move || source.load(Ordering::Relaxed) as f64);

        assert_eq!(gauge.value(), 3.0);
        depth.store(9, Ordering::Relaxed);
        assert_eq!(gauge.value(), 9.0);
    }

    #[test]
    fn test_weak_gauge_reads_nan_after_drop() {
        let queue = Arc::new(vec![1, 2, 3]);
        let gauge = Gauge::weak(id(), &queue, |q| q.len() as f64);

        assert_eq!(gauge.value(), 3.0);
        drop(queue);
        assert!(gauge.value().is_nan());
    }
}
