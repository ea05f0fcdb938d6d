//! Meters whose measurements come from caller code

use std::sync::Arc;

use tally_common::MeterId;

use super::snapshot::Measurement;

type Measure = dyn Fn() -> Vec<Measurement> + Send + Sync;

struct CustomInner {
    id: MeterId,
    measure: Box<Measure>,
}

impl std::fmt::Debug for CustomInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomInner").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone)]
pub struct CustomMeter {
    inner: Arc<CustomInner>,
}

impl CustomMeter {
    pub fn new<F>(id: MeterId, measure: F) -> Self
    where
        F: Fn() -> Vec<Measurement> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CustomInner {
                id,
                measure: Box::new(measure),
            }),
        }
    }

    pub fn id(&self) -> &MeterId {
        &self.inner.id
    }

    pub fn measure(&self) -> Vec<Measurement> {
        (self.inner.measure)()
    }

    pub(crate) fn ptr_eq(&self, other: &CustomMeter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
