//! Refresh cycles: three concurrent dataset fetches merged into one published state.
//!
//! Every cycle gets a sequence number and a child of the aggregator's root
//! cancellation token. Starting a cycle cancels the previous one, and a cycle
//! only writes to the published state while it is still the latest. After
//! [`WeatherAggregator::shutdown`] nothing is written at all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::WeatherCache;
use crate::clock::Clock;
use crate::location::{resolve_or_default, LocationIdentifiers};
use crate::provider::WeatherProvider;
use crate::types::{WeatherError, WeatherState, WeatherViewModel};

/// Owns the published [`WeatherState`] and drives refresh cycles.
///
/// Cheap to clone; clones share the same state and cycles.
#[derive(Clone)]
pub struct WeatherAggregator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: WeatherProvider,
    clock: Arc<dyn Clock>,
    location: RwLock<&'static LocationIdentifiers>,
    cache: Option<Mutex<WeatherCache>>,
    state: watch::Sender<WeatherState>,
    latest: AtomicU64,
    root: CancellationToken,
    /// Token of the newest cycle. Also serializes cycle start, publish and shutdown.
    in_flight: Mutex<Option<CancellationToken>>,
}

/// Everything a cycle needs, captured when it starts.
struct Cycle {
    seq: u64,
    token: CancellationToken,
    location: &'static LocationIdentifiers,
    date: NaiveDate,
}

impl WeatherAggregator {
    pub fn new(
        provider: WeatherProvider,
        location: &'static LocationIdentifiers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(provider, location, clock, None)
    }

    /// Like [`new`](Self::new), persisting every successful cycle to `cache`.
    pub fn with_cache(
        provider: WeatherProvider,
        location: &'static LocationIdentifiers,
        clock: Arc<dyn Clock>,
        cache: WeatherCache,
    ) -> Self {
        Self::build(provider, location, clock, Some(cache))
    }

    fn build(
        provider: WeatherProvider,
        location: &'static LocationIdentifiers,
        clock: Arc<dyn Clock>,
        cache: Option<WeatherCache>,
    ) -> Self {
        let (state, _) = watch::channel(WeatherState::default());
        Self {
            inner: Arc::new(Inner {
                provider,
                clock,
                location: RwLock::new(location),
                cache: cache.map(Mutex::new),
                state,
                latest: AtomicU64::new(0),
                root: CancellationToken::new(),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the published state.
    pub fn current(&self) -> WeatherState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every published transition.
    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.inner.state.subscribe()
    }

    pub fn location(&self) -> &'static LocationIdentifiers {
        *self.inner.location.read()
    }

    /// Seed the view from a fresh-enough cache entry, then run the first cycle.
    pub fn start(&self) -> JoinHandle<Result<WeatherViewModel, WeatherError>> {
        self.seed_from_cache();
        self.refresh()
    }

    /// Start a cycle in the background.
    ///
    /// The loading state is published before this returns, so cycles are
    /// ordered by call order.
    pub fn refresh(&self) -> JoinHandle<Result<WeatherViewModel, WeatherError>> {
        match self.inner.begin_cycle() {
            Some(cycle) => {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.execute(cycle).await })
            }
            None => tokio::spawn(async { Err(WeatherError::Cancelled) }),
        }
    }

    /// Run one cycle to completion.
    pub async fn refresh_now(&self) -> Result<WeatherViewModel, WeatherError> {
        let cycle = self.inner.begin_cycle().ok_or(WeatherError::Cancelled)?;
        self.inner.execute(cycle).await
    }

    /// Switch to `city_name` (unknown names fall back to the default city).
    /// A refresh starts only when the effective location changes.
    pub fn set_location(&self, city_name: &str) -> &'static LocationIdentifiers {
        let next = resolve_or_default(city_name);
        let changed = {
            let mut location = self.inner.location.write();
            let changed = *location != next;
            *location = next;
            changed
        };

        if changed {
            tracing::info!("Location changed to {}", next.city_name);
            drop(self.refresh());
        }
        next
    }

    /// Refresh every `interval` until shutdown.
    pub fn spawn_auto_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        let root = self.inner.root.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = root.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        tracing::debug!("Auto refresh tick");
                        // Failures are already published; keep ticking.
                        let _ = this.refresh_now().await;
                    }
                }
            }
            tracing::debug!("Auto refresh stopped");
        })
    }

    /// Cancel every in-flight cycle. No state is published afterwards.
    pub fn shutdown(&self) {
        let mut in_flight = self.inner.in_flight.lock();
        self.inner.root.cancel();
        in_flight.take();
        tracing::info!("Weather aggregator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    fn seed_from_cache(&self) {
        let Some(cache) = &self.inner.cache else {
            return;
        };

        let city = self.location().city_name;
        let now = self.inner.clock.now();
        let seeded = {
            let mut cache = cache.lock();
            if let Err(e) = cache.load() {
                tracing::warn!("Failed to load weather cache: {:#}", e);
            }
            cache.get_for(city, now).map(|entry| entry.view.clone())
        };

        if let Some(mut view) = seeded {
            tracing::info!("Showing cached weather for {} while refreshing", city);
            view.is_loading = true;
            let _in_flight = self.inner.in_flight.lock();
            if !self.inner.root.is_cancelled() {
                self.inner.state.send_modify(|state| state.view = view);
            }
        }
    }
}

impl Inner {
    /// Allocate the next sequence number, cancel the previous cycle and
    /// publish the loading state. `None` once shut down.
    fn begin_cycle(&self) -> Option<Cycle> {
        let mut in_flight = self.in_flight.lock();
        if self.root.is_cancelled() {
            return None;
        }

        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = in_flight.take() {
            previous.cancel();
        }
        let token = self.root.child_token();
        *in_flight = Some(token.clone());

        let location = *self.location.read();
        self.state.send_modify(|state| {
            state.view.is_loading = true;
            state.failure = None;
            state.cycle = seq;
        });
        tracing::info!("Refresh cycle {} started for {}", seq, location.city_name);

        Some(Cycle {
            seq,
            token,
            location,
            date: self.clock.today(),
        })
    }

    async fn execute(&self, cycle: Cycle) -> Result<WeatherViewModel, WeatherError> {
        let location = cycle.location;
        let fetch_all = async {
            tokio::try_join!(
                self.provider.fetch_observation(location.observation_station_name),
                self.provider.fetch_forecast(location.forecast_city_name),
                self.provider.fetch_sun_times(location.sunrise_county_name, cycle.date),
            )
        };

        let result = tokio::select! {
            biased;
            _ = cycle.token.cancelled() => Err(WeatherError::Cancelled),
            fragments = fetch_all => fragments.map(|(observation, forecast, sun)| {
                WeatherViewModel::from_fragments(observation, forecast, sun)
            }),
        };

        self.finish(&cycle, result)
    }

    /// Publish the outcome if `cycle` is still the latest and live.
    fn finish(
        &self,
        cycle: &Cycle,
        result: Result<WeatherViewModel, WeatherError>,
    ) -> Result<WeatherViewModel, WeatherError> {
        let in_flight = self.in_flight.lock();

        if self.root.is_cancelled() {
            tracing::debug!("Cycle {} discarded after shutdown", cycle.seq);
            return Err(WeatherError::Cancelled);
        }
        if self.latest.load(Ordering::SeqCst) != cycle.seq || cycle.token.is_cancelled() {
            tracing::debug!("Cycle {} superseded, result discarded", cycle.seq);
            return Err(WeatherError::Superseded);
        }

        match result {
            Ok(view) => {
                self.state.send_modify(|state| {
                    state.view = view.clone();
                    state.failure = None;
                    state.cycle = cycle.seq;
                });
                drop(in_flight);
                tracing::info!(
                    "Refresh cycle {} finished: {} {:.1}°C",
                    cycle.seq,
                    cycle.location.city_name,
                    view.temperature
                );
                self.persist(cycle, &view);
                Ok(view)
            }
            Err(e) => {
                let failure = e.to_failure();
                self.state.send_modify(|state| {
                    state.view.is_loading = false;
                    state.failure = failure;
                    state.cycle = cycle.seq;
                });
                drop(in_flight);
                tracing::error!("Refresh cycle {} failed: {}", cycle.seq, e);
                Err(e)
            }
        }
    }

    fn persist(&self, cycle: &Cycle, view: &WeatherViewModel) {
        let Some(cache) = &self.cache else {
            return;
        };
        let mut cache = cache.lock();
        cache.update(cycle.location.city_name, view, self.clock.now());
        if let Err(e) = cache.save() {
            tracing::warn!("Failed to save weather cache: {:#}", e);
        }
    }
}
