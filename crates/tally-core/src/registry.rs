//! Meter registry
//!
//! Deduplicates meters by [`MeterId`] and hands out shared handles.
//!
//! ## Concurrency
//!
//! - Lookups of an existing meter are a single DashMap read.
//! - Creation holds the name's entry in the kind index while it inserts into
//!   the meter map, so the kind check and the insert are one step and the
//!   factory runs at most once per identity. Losers of a creation race get
//!   the winner's handle.
//! - Lock order is always kind index, then meter map.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tally_common::{
    Clock, MeterId, MeterKind, PushRegistryConfig, Result, SystemClock, TallyError, Tags,
    TimeUnit, DEFAULT_STEP,
};
use tracing::{debug, trace};

use crate::filter::{is_accepted, map_id, MeterFilter};
use crate::meter::{
    Counter, CustomMeter, DistributionSummary, FunctionCounter, FunctionTimer, Gauge,
    LongTaskTimer, Measurement, Meter, TimeGauge, Timer,
};

/// Builder for [`MeterRegistry`]
#[derive(Debug)]
pub struct MeterRegistryBuilder {
    step: Duration,
    clock: Option<Arc<dyn Clock>>,
    filters: Vec<MeterFilter>,
}

impl Default for MeterRegistryBuilder {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            clock: None,
            filters: Vec::new(),
        }
    }
}

impl MeterRegistryBuilder {
    pub fn step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Take the step from a push configuration
    pub fn config(self, config: &PushRegistryConfig) -> Self {
        self.step(config.step)
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Tags added to every meter; a meter's own tags take precedence
    pub fn common_tags(self, tags: Tags) -> Self {
        self.filter(MeterFilter::CommonTags(tags))
    }

    pub fn filter(mut self, filter: MeterFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> Result<MeterRegistry> {
        if self.step.as_millis() == 0 {
            return Err(TallyError::InvalidConfiguration(format!(
                "step must be at least 1ms, got {:?}",
                self.step
            )));
        }

        Ok(MeterRegistry {
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            step: self.step,
            filters: self.filters,
            meters: DashMap::new(),
            kinds: DashMap::new(),
        })
    }
}

/// Registry of meters, keyed by identity
#[derive(Debug)]
pub struct MeterRegistry {
    clock: Arc<dyn Clock>,
    step: Duration,
    filters: Vec<MeterFilter>,
    meters: DashMap<MeterId, Meter>,
    /// meter name -> (kind, number of registered meters with that name)
    kinds: DashMap<String, (MeterKind, usize)>,
}

impl MeterRegistry {
    pub fn builder() -> MeterRegistryBuilder {
        MeterRegistryBuilder::default()
    }

    /// Registry with the default step and the system clock
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            step: DEFAULT_STEP,
            filters: Vec::new(),
            meters: DashMap::new(),
            kinds: DashMap::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Return the meter registered under `id`, creating it with `factory` on
    /// first use.
    ///
    /// The factory receives the id after filters have been applied and must
    /// build a meter of `id.kind`. Denied ids get a detached meter that is
    /// never registered, so recording on it is a no-op.
    ///
    /// # Errors
    ///
    /// [`TallyError::ConflictingMeterType`] when the name is already
    /// registered with a different kind.
    pub fn get_or_create<F>(&self, id: MeterId, factory: F) -> Result<Meter>
    where
        F: FnOnce(MeterId) -> Meter,
    {
        let id = map_id(&self.filters, id);

        if let Some(existing) = self.meters.get(&id) {
            return Ok(existing.value().clone());
        }

        if !is_accepted(&self.filters, &id) {
            trace!(meter = %id, "Meter denied by filter");
            let meter = factory(id);
            meter.detach();
            return Ok(meter);
        }

        let mut kind = self
            .kinds
            .entry(id.name.clone())
            .or_insert((id.kind, 0));
        if kind.1 == 0 {
            kind.0 = id.kind;
        } else if kind.0 != id.kind {
            return Err(TallyError::ConflictingMeterType {
                name: id.name.clone(),
                existing: kind.0,
                requested: id.kind,
            });
        }

        let meter = match self.meters.entry(id) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let meter = factory(slot.key().clone());
                debug!(meter = %slot.key(), "Registered meter");
                kind.1 += 1;
                slot.insert(meter).value().clone()
            }
        };
        Ok(meter)
    }

    /// Remove a meter and detach it. Later recordings on handles that are
    /// still held are ignored. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &MeterId) -> Option<Meter> {
        if let Some(meter) = self.remove_registered(id) {
            return Some(meter);
        }
        // the caller may hold the id as it was before filters
        let mapped = map_id(&self.filters, id.clone());
        if &mapped == id {
            return None;
        }
        self.remove_registered(&mapped)
    }

    fn remove_registered(&self, id: &MeterId) -> Option<Meter> {
        let mut kind = self.kinds.get_mut(&id.name)?;
        let (_, meter) = self.meters.remove(id)?;
        kind.1 = kind.1.saturating_sub(1);
        drop(kind);
        self.kinds.remove_if(&id.name, |_, (_, count)| *count == 0);

        meter.detach();
        debug!(meter = %id, "Removed meter");
        Some(meter)
    }

    /// Visit every registered meter. Meters added or removed while the
    /// visit is running may or may not be seen.
    ///
    /// The visitor must not register or remove meters on this registry.
    pub fn for_each_meter<F>(&self, mut visitor: F)
    where
        F: FnMut(&Meter),
    {
        for entry in self.meters.iter() {
            visitor(entry.value());
        }
    }

    /// Handles of every registered meter
    pub fn meters(&self) -> Vec<Meter> {
        self.meters.iter().map(|e| e.value().clone()).collect()
    }

    /// Registered meters with the given name, any tags
    pub fn find(&self, name: &str) -> Vec<Meter> {
        self.meters
            .iter()
            .filter(|e| e.key().name == name)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Registered meters with the given name carrying every tag in `tags`.
    /// Extra tags on the meter are allowed.
    pub fn find_tagged(&self, name: &str, tags: &Tags) -> Vec<Meter> {
        self.meters
            .iter()
            .filter(|e| {
                let id = e.key();
                id.name == name
                    && tags
                        .iter()
                        .all(|tag| id.tags.get(&tag.key) == Some(tag.value.as_str()))
            })
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Flush the live step of every meter into its published slot and
    /// stop rolling. Used once, when the registry shuts down.
    pub fn closing_rollover(&self) {
        for entry in self.meters.iter() {
            entry.value().closing_rollover();
        }
    }

    pub fn counter(&self, name: &str, tags: Tags) -> Result<Counter> {
        self.register_counter(MeterId::new(name, tags, MeterKind::Counter))
    }

    pub fn register_counter(&self, id: MeterId) -> Result<Counter> {
        let (clock, step) = (self.clock.clone(), self.step);
        match self.get_or_create(id, |id| Meter::Counter(Counter::new(id, clock, step)))? {
            Meter::Counter(c) => Ok(c),
            other => Err(kind_mismatch(&other, MeterKind::Counter)),
        }
    }

    /// Gauge over a supplier. When the gauge already exists the existing
    /// supplier is kept and `supplier` is dropped.
    pub fn gauge<F>(&self, name: &str, tags: Tags, supplier: F) -> Result<Gauge>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        self.register_gauge(MeterId::new(name, tags, MeterKind::Gauge), supplier)
    }

    pub fn register_gauge<F>(&self, id: MeterId, supplier: F) -> Result<Gauge>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        match self.get_or_create(id, |id| Meter::Gauge(Gauge::new(id, supplier)))? {
            Meter::Gauge(g) => Ok(g),
            other => Err(kind_mismatch(&other, MeterKind::Gauge)),
        }
    }

    /// Gauge that observes `target` without keeping it alive
    pub fn gauge_weak<T, F>(&self, name: &str, tags: Tags, target: &Arc<T>, f: F) -> Result<Gauge>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let id = MeterId::new(name, tags, MeterKind::Gauge);
        match self.get_or_create(id, |id| Meter::Gauge(Gauge::weak(id, target, f)))? {
            Meter::Gauge(g) => Ok(g),
            other => Err(kind_mismatch(&other, MeterKind::Gauge)),
        }
    }

    /// Gauge over a duration held by `target`, reported in `unit` by `f`
    pub fn time_gauge<T, F>(
        &self,
        name: &str,
        tags: Tags,
        target: &Arc<T>,
        unit: TimeUnit,
        f: F,
    ) -> Result<TimeGauge>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let id = MeterId::new(name, tags, MeterKind::Gauge);
        let meter = self.get_or_create(id, |id| {
            Meter::TimeGauge(TimeGauge::weak(id, target, unit, f))
        })?;
        match meter {
            Meter::TimeGauge(g) => Ok(g),
            other => Err(kind_mismatch(&other, MeterKind::Gauge)),
        }
    }

    /// Counter reporting the growth of a cumulative total held by `target`
    pub fn function_counter<T, F>(
        &self,
        name: &str,
        tags: Tags,
        target: &Arc<T>,
        f: F,
    ) -> Result<FunctionCounter>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let id = MeterId::new(name, tags, MeterKind::Counter);
        let (clock, step) = (self.clock.clone(), self.step);
        let meter = self.get_or_create(id, |id| {
            Meter::FunctionCounter(FunctionCounter::new(id, target, f, clock, step))
        })?;
        match meter {
            Meter::FunctionCounter(c) => Ok(c),
            other => Err(kind_mismatch(&other, MeterKind::Counter)),
        }
    }

    /// Timer reporting the growth of a cumulative count and total time held
    /// by `target`. `total_time` reports in `total_unit`.
    pub fn function_timer<T, C, F>(
        &self,
        name: &str,
        tags: Tags,
        target: &Arc<T>,
        count: C,
        total_time: F,
        total_unit: TimeUnit,
    ) -> Result<FunctionTimer>
    where
        T: Send + Sync + 'static,
        C: Fn(&T) -> u64 + Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let id = MeterId::new(name, tags, MeterKind::Timer);
        let (clock, step) = (self.clock.clone(), self.step);
        let meter = self.get_or_create(id, |id| {
            Meter::FunctionTimer(FunctionTimer::new(
                id, target, count, total_time, total_unit, clock, step,
            ))
        })?;
        match meter {
            Meter::FunctionTimer(t) => Ok(t),
            other => Err(kind_mismatch(&other, MeterKind::Timer)),
        }
    }

    pub fn timer(&self, name: &str, tags: Tags) -> Result<Timer> {
        self.register_timer(MeterId::new(name, tags, MeterKind::Timer))
    }

    pub fn register_timer(&self, id: MeterId) -> Result<Timer> {
        let (clock, step) = (self.clock.clone(), self.step);
        match self.get_or_create(id, |id| Meter::Timer(Timer::new(id, clock, step)))? {
            Meter::Timer(t) => Ok(t),
            other => Err(kind_mismatch(&other, MeterKind::Timer)),
        }
    }

    pub fn summary(&self, name: &str, tags: Tags) -> Result<DistributionSummary> {
        self.register_summary(MeterId::new(
            name,
            tags,
            MeterKind::DistributionSummary,
        ))
    }

    pub fn register_summary(&self, id: MeterId) -> Result<DistributionSummary> {
        let (clock, step) = (self.clock.clone(), self.step);
        let meter = self.get_or_create(id, |id| {
            Meter::DistributionSummary(DistributionSummary::new(id, clock, step))
        })?;
        match meter {
            Meter::DistributionSummary(s) => Ok(s),
            other => Err(kind_mismatch(&other, MeterKind::DistributionSummary)),
        }
    }

    pub fn long_task_timer(&self, name: &str, tags: Tags) -> Result<LongTaskTimer> {
        let id = MeterId::new(name, tags, MeterKind::LongTaskTimer);
        let clock = self.clock.clone();
        match self.get_or_create(id, |id| Meter::LongTaskTimer(LongTaskTimer::new(id, clock)))? {
            Meter::LongTaskTimer(l) => Ok(l),
            other => Err(kind_mismatch(&other, MeterKind::LongTaskTimer)),
        }
    }

    /// Meter with caller-supplied measurements, registered as [`MeterKind::Other`]
    pub fn custom<F>(&self, name: &str, tags: Tags, measure: F) -> Result<CustomMeter>
    where
        F: Fn() -> Vec<Measurement> + Send + Sync + 'static,
    {
        let id = MeterId::new(name, tags, MeterKind::Other);
        match self.get_or_create(id, |id| Meter::Other(CustomMeter::new(id, measure)))? {
            Meter::Other(c) => Ok(c),
            other => Err(kind_mismatch(&other, MeterKind::Other)),
        }
    }
}

impl Default for MeterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_mismatch(meter: &Meter, requested: MeterKind) -> TallyError {
    TallyError::ConflictingMeterType {
        name: meter.id().name.clone(),
        existing: meter.kind(),
        requested,
    }
}
