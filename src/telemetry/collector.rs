use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    HelmsmanError,
    dashboard::{CycleStatus, DashboardFrame, LogRow, position_readout},
    map_overlay::{MapComposer, MapComposerConfig, format_geotag},
    session::{DEFAULT_LOG_ROWS, SessionTracker, TrajectoryBuffer},
    surface::RenderSurface,
};

use super::{
    ClassifiedSnapshot, StoreInfo, TelemetrySample, TelemetryStore, classify_snapshot,
    store::folder_id,
};

pub const REFRESH_RATE_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;
// granularity at which the wait between cycles checks the stop signal
const STOP_CHECK_SLICE_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollLoopConfig {
    /// Wait between two cycles
    pub interval_ms: u64,
    /// Rows kept in the position log table
    pub log_rows: usize,
    /// Cap on the points drawn on the map, `None` draws the whole session
    pub map_path_limit: Option<usize>,
    pub composer: MapComposerConfig,
    /// Back off exponentially while the store keeps failing at the network level
    pub backoff: bool,
    pub max_backoff_ms: u64,
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: REFRESH_RATE_MS,
            log_rows: DEFAULT_LOG_ROWS,
            map_path_limit: None,
            composer: MapComposerConfig::default(),
            backoff: false,
            max_backoff_ms: MAX_BACKOFF_MS,
        }
    }
}

/// Everything the poll loop remembers between cycles.
#[derive(Clone, Debug, Default)]
pub struct TrackerState {
    pub session: SessionTracker,
    pub trajectory: TrajectoryBuffer,
    pub info: Option<StoreInfo>,
    /// Latest `posisi` reading, kept even when it cannot be mapped
    pub vessel: Option<TelemetrySample>,
    pub underwater: Option<TelemetrySample>,
    pub surface: Option<TelemetrySample>,
    pub floating_markers: Vec<TelemetrySample>,
    /// Number of cycles run so far, fresh or skipped
    pub cycles: u64,
}

impl TrackerState {
    /// Forget everything that belongs to the previous session.
    fn reset_session(&mut self) {
        self.trajectory.clear();
        self.vessel = None;
        self.underwater = None;
        self.surface = None;
        self.floating_markers.clear();
    }

    /// Fold a classified snapshot into the state. A snapshot that starts a session
    /// (first one seen, or first after a rollover) seeds the trajectory with the
    /// recorded track before the current position. Returns whether the vessel
    /// position was added to the trajectory.
    fn admit(&mut self, snapshot: ClassifiedSnapshot, starts_session: bool) -> bool {
        if starts_session && !snapshot.history.is_empty() {
            let seeded = snapshot
                .history
                .into_iter()
                .map(|fix| self.push_fix(fix))
                .filter(|&pushed| pushed)
                .count();
            info!("Seeded trajectory with {} recorded fixes", seeded);
        }

        let mut admitted = false;
        if let Some(position) = snapshot.position {
            admitted = self.push_fix(position.clone());
            self.vessel = Some(position);
        }

        self.floating_markers = snapshot.floating_markers;
        if snapshot.underwater.is_some() {
            self.underwater = snapshot.underwater;
        }
        if snapshot.surface.is_some() {
            self.surface = snapshot.surface;
        }
        admitted
    }

    // Appends unless the fix repeats the last one in the trajectory.
    fn push_fix(&mut self, sample: TelemetrySample) -> bool {
        let repeated = self
            .trajectory
            .last()
            .is_some_and(|last| last.same_fix(&sample));
        if repeated {
            debug!("Position '{}' unchanged since last fix", sample.id);
            return false;
        }
        self.trajectory.append(sample)
    }
}

/// Drives the fetch, classify, accumulate and publish cycle against a store.
pub struct PollLoop<S: TelemetryStore> {
    store: S,
    config: PollLoopConfig,
    composer: MapComposer,
    state: TrackerState,
    latest_frame: Option<DashboardFrame>,
    network_failures: u32,
}

impl<S: TelemetryStore> PollLoop<S> {
    pub fn new(store: S, config: PollLoopConfig) -> Self {
        Self {
            composer: MapComposer::with_config(config.composer.clone()),
            store,
            config,
            state: TrackerState::default(),
            latest_frame: None,
            network_failures: 0,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn config(&self) -> &PollLoopConfig {
        &self.config
    }

    /// The frame published by the most recent cycle.
    pub fn latest_frame(&self) -> Option<&DashboardFrame> {
        self.latest_frame.as_ref()
    }

    /// Run one cycle and return the frame it produced.
    ///
    /// Soft failures never surface as errors: the cycle is marked as skipped and the
    /// frame shows the state as it was before the cycle. Only `StoreExhausted` and
    /// other hard errors are returned.
    pub fn run_cycle(&mut self) -> Result<DashboardFrame, HelmsmanError> {
        let status = match self.fetch_and_admit() {
            Ok(()) => {
                self.network_failures = 0;
                CycleStatus::Fresh
            }
            Err(e) if e.is_soft() => {
                warn!("Cycle {} skipped: {}", self.state.cycles + 1, e);
                if e.is_network() {
                    self.network_failures = self.network_failures.saturating_add(1);
                } else {
                    self.network_failures = 0;
                }
                CycleStatus::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        self.state.cycles += 1;

        let frame = self.compose_frame(status);
        self.latest_frame = Some(frame.clone());
        Ok(frame)
    }

    // Both reads happen before any state is touched, so a failed fetch leaves the
    // session exactly as it was.
    fn fetch_and_admit(&mut self) -> Result<(), HelmsmanError> {
        let info = self.store.info()?;
        let folder = self.store.folder(&folder_id(info.counter))?;

        let baseline = self.state.session.folder_id().is_none();
        let observation = self.state.session.observe(info.counter);
        if observation.did_rollover {
            self.state.reset_session();
        }
        self.state.info = Some(info);

        let snapshot = classify_snapshot(&folder);
        debug!(
            "{}: position {}, {} floating markers, {} recorded fixes, {} malformed records",
            observation.folder_id,
            snapshot.position.is_some(),
            snapshot.floating_markers.len(),
            snapshot.history.len(),
            snapshot.malformed
        );
        self.state.admit(snapshot, baseline || observation.did_rollover);
        Ok(())
    }

    fn compose_frame(&self, status: CycleStatus) -> DashboardFrame {
        let state = &self.state;

        let log = state.trajectory.snapshot_for_log(self.config.log_rows);
        let first_seq = state.trajectory.len() - log.len() + 1;
        let log_table = log
            .iter()
            .enumerate()
            .map(|(idx, sample)| LogRow::from_sample(first_seq + idx, sample))
            .collect();

        let map_overlay = self.composer.compose_with_waypoints(
            state
                .trajectory
                .snapshot_for_map_capped(self.config.map_path_limit),
            &state.floating_markers,
        );

        DashboardFrame {
            cycle: state.cycles,
            status,
            info: state.info.clone(),
            folder_id: state.session.folder_id().map(str::to_string),
            position_readout: state
                .vessel
                .as_ref()
                .map(position_readout)
                .unwrap_or_default(),
            log_table,
            map_overlay,
            vessel_geotag: state.vessel.as_ref().map(format_geotag),
            underwater_geotag: state.underwater.as_ref().map(format_geotag),
            surface_geotag: state.surface.as_ref().map(format_geotag),
            floating_markers: state
                .floating_markers
                .iter()
                .enumerate()
                .map(|(idx, marker)| LogRow::from_sample(idx + 1, marker))
                .collect(),
        }
    }

    /// Wait before the next cycle, stretched while the store keeps failing when
    /// backoff is enabled.
    pub fn next_delay(&self) -> Duration {
        let interval = self.config.interval_ms;
        if !self.config.backoff || self.network_failures == 0 {
            return Duration::from_millis(interval);
        }
        let factor = 2u64.saturating_pow(self.network_failures.min(32));
        let capped = interval
            .saturating_mul(factor)
            .min(self.config.max_backoff_ms.max(interval));
        Duration::from_millis(capped)
    }

    /// Poll until `stop` is raised or the store runs out of data.
    ///
    /// # Errors
    ///
    /// Returns `StoreConnectionFailed` if the store cannot be reached on startup.
    /// Publishing failures are logged and do not stop the loop.
    pub fn run<R>(&mut self, surface: &mut R, stop: &AtomicBool) -> Result<(), HelmsmanError>
    where
        R: RenderSurface + ?Sized,
    {
        self.store.start()?;
        info!(
            "Polling {} every {} ms",
            self.store.describe(),
            self.config.interval_ms
        );

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("Stop requested after {} cycles", self.state.cycles);
                return Ok(());
            }

            let frame = match self.run_cycle() {
                Ok(frame) => frame,
                Err(HelmsmanError::StoreExhausted) => {
                    info!("Store exhausted after {} cycles", self.state.cycles);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if let Err(e) = surface.publish(&frame) {
                warn!("Could not publish frame {}: {}", frame.cycle, e);
            }

            wait(self.next_delay(), stop);
        }
    }
}

fn wait(delay: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(STOP_CHECK_SLICE_MS)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ChannelSurface;
    use crate::telemetry::MockStore;
    use serde_json::{Value, json};
    use std::sync::mpsc;

    fn dump(counter: i64, lat: f64, lon: f64, ts: &str) -> Value {
        let mut root = json!({"info": {"counter": counter, "link": "abc", "arena": "Lintasan A"}});
        root[folder_id(counter)] = json!({
            "posisi": {"timestamp": ts, "lat": lat, "lon": lon, "speed_knots": 5, "cog": 90}
        });
        root
    }

    fn poll_loop(dumps: Vec<Value>) -> PollLoop<MockStore> {
        PollLoop::new(
            MockStore::from_dumps(dumps),
            PollLoopConfig {
                interval_ms: 0,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_fresh_cycle_builds_frame() {
        let mut poll = poll_loop(vec![dump(3, -7.8, 110.3, "2024-03-10 14:05:30")]);
        let frame = poll.run_cycle().unwrap();

        assert!(frame.is_fresh());
        assert_eq!(frame.cycle, 1);
        assert_eq!(frame.folder_id.as_deref(), Some("gps-points03"));
        assert_eq!(frame.info.as_ref().unwrap().arena, "Lintasan A");
        assert_eq!(frame.log_table.len(), 1);
        assert_eq!(frame.log_table[0].seq, 1);
        assert_eq!(frame.position_readout.len(), 6);
        assert_eq!(frame.map_overlay.as_ref().unwrap().markers.len(), 1);
        assert_eq!(frame.vessel_geotag.as_ref().unwrap().day_of_week, "Sun");
        assert_eq!(poll.latest_frame(), Some(&frame));
    }

    #[test]
    fn test_rollover_clears_before_admitting() {
        let mut poll = poll_loop(vec![
            dump(3, -7.8, 110.3, "2024-03-10 14:05:30"),
            dump(3, -7.801, 110.301, "2024-03-10 14:05:32"),
            dump(4, -7.9, 110.4, "2024-03-10 14:10:00"),
            dump(4, -7.901, 110.401, "2024-03-10 14:10:02"),
        ]);

        poll.run_cycle().unwrap();
        poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 2);

        let frame = poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 1);
        assert_eq!(frame.folder_id.as_deref(), Some("gps-points04"));
        assert_eq!(poll.state().session.previous_folder_id(), Some("gps-points03"));
        assert_eq!(
            poll.state().trajectory.last().unwrap().coordinates(),
            Some((-7.9, 110.4))
        );

        poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 2);
    }

    #[test]
    fn test_soft_failure_skips_without_mutating() {
        let mut poll = poll_loop(vec![
            dump(3, -7.8, 110.3, "2024-03-10 14:05:30"),
            Value::Null,
            json!({"info": {"link": "abc"}}),
            json!({"info": {"counter": 5}}),
        ]);
        let fresh = poll.run_cycle().unwrap();

        for _ in 0..3 {
            let frame = poll.run_cycle().unwrap();
            assert!(matches!(frame.status, CycleStatus::Skipped { .. }));
            assert_eq!(frame.log_table, fresh.log_table);
            assert_eq!(frame.map_overlay, fresh.map_overlay);
            assert_eq!(frame.folder_id.as_deref(), Some("gps-points03"));
        }
        assert_eq!(poll.state().trajectory.len(), 1);
        assert_eq!(poll.state().cycles, 4);
    }

    fn dump_with_history(counter: i64, history: Value, lat: f64, lon: f64) -> Value {
        let mut root = json!({"info": {"counter": counter}});
        root[folder_id(counter)] = json!({
            "posisi": {"lat": lat, "lon": lon, "speed_knots": 5, "cog": 90},
            "gps_data": history
        });
        root
    }

    #[test]
    fn test_recorded_track_seeds_first_cycle() {
        let history = json!([{"lat": -7.8, "lon": 110.3}, {"lat": -7.801, "lon": 110.301}]);
        let mut poll = poll_loop(vec![dump_with_history(3, history, -7.802, 110.302)]);
        let frame = poll.run_cycle().unwrap();

        assert_eq!(poll.state().trajectory.len(), 3);
        let overlay = frame.map_overlay.unwrap();
        assert_eq!(overlay.markers.len(), 3);
        assert_eq!(overlay.segment_count(), 2);
        assert_eq!(overlay.center, (-7.802, 110.302));
        assert_eq!(frame.log_table.len(), 3);
    }

    #[test]
    fn test_recorded_track_ending_at_current_position() {
        let history = json!([{"lat": -7.8, "lon": 110.3}, {"lat": -7.801, "lon": 110.301}]);
        let mut poll = poll_loop(vec![dump_with_history(3, history, -7.801, 110.301)]);
        poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 2);
    }

    #[test]
    fn test_recorded_track_only_seeds_new_sessions() {
        let first = json!([{"lat": -7.8, "lon": 110.3}]);
        let longer = json!([{"lat": -7.8, "lon": 110.3}, {"lat": -7.85, "lon": 110.35}]);
        let next_session = json!([{"lat": -7.9, "lon": 110.4}, {"lat": -7.901, "lon": 110.401}]);
        let mut poll = poll_loop(vec![
            dump_with_history(3, first, -7.801, 110.301),
            dump_with_history(3, longer, -7.802, 110.302),
            dump_with_history(4, next_session, -7.902, 110.402),
        ]);

        poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 2);

        // mid-session the recorded track is not replayed again
        poll.run_cycle().unwrap();
        assert_eq!(poll.state().trajectory.len(), 3);

        poll.run_cycle().unwrap();
        let coords = poll
            .state()
            .trajectory
            .snapshot_for_map()
            .iter()
            .filter_map(|s| s.coordinates())
            .collect::<Vec<_>>();
        assert_eq!(coords, vec![(-7.9, 110.4), (-7.901, 110.401), (-7.902, 110.402)]);
    }

    #[test]
    fn test_out_of_range_epoch_does_not_stop_the_loop() {
        let (tx, rx) = mpsc::channel();
        let mut surface = ChannelSurface::new(tx);
        let stop = AtomicBool::new(false);

        let mut poll = poll_loop(vec![json!({
            "info": {"counter": 1},
            "gps-points01": {"posisi": {"lat": -7.8, "lon": 110.3, "timestamp": i64::MIN}}
        })]);
        poll.run(&mut surface, &stop).unwrap();

        let frame = rx.try_recv().unwrap();
        assert!(frame.is_fresh());
        assert_eq!(frame.vessel_geotag.unwrap().date, "-");
        assert_eq!(frame.log_table.len(), 1);
    }

    #[test]
    fn test_unchanged_position_is_not_readmitted() {
        let same = dump(3, -7.8, 110.3, "2024-03-10 14:05:30");
        let mut poll = poll_loop(vec![same.clone(), same.clone(), same]);
        for _ in 0..3 {
            poll.run_cycle().unwrap();
        }
        assert_eq!(poll.state().trajectory.len(), 1);
    }

    #[test]
    fn test_malformed_position_is_shown_but_not_mapped() {
        let mut poll = poll_loop(vec![json!({
            "info": {"counter": 1},
            "gps-points01": {"posisi": {"lat": "abc", "lon": 110.3, "speed_knots": 5}}
        })]);
        let frame = poll.run_cycle().unwrap();

        assert!(frame.is_fresh());
        assert!(poll.state().trajectory.is_empty());
        assert!(frame.map_overlay.is_none());
        let geotag = frame.vessel_geotag.unwrap();
        assert_eq!(geotag.coordinate_text, "-");
        assert_eq!(geotag.speed_text, "5 knots / 9 km/h");
    }

    #[test]
    fn test_log_table_sequence_after_cap() {
        let dumps = (0..12)
            .map(|n| dump(1, -7.8 - n as f64 * 0.0001, 110.3, "2024-03-10 14:05:30"))
            .collect();
        let mut poll = poll_loop(dumps);
        let mut frame = None;
        for _ in 0..12 {
            frame = Some(poll.run_cycle().unwrap());
        }
        let frame = frame.unwrap();
        assert_eq!(frame.log_table.len(), DEFAULT_LOG_ROWS);
        assert_eq!(frame.log_table[0].seq, 3);
        assert_eq!(frame.log_table[9].seq, 12);
        assert_eq!(frame.map_overlay.unwrap().path.len(), 12);
    }

    #[test]
    fn test_map_path_limit() {
        let dumps = (0..5)
            .map(|n| dump(1, -7.8 - n as f64 * 0.0001, 110.3, "2024-03-10 14:05:30"))
            .collect();
        let mut poll = PollLoop::new(
            MockStore::from_dumps(dumps),
            PollLoopConfig {
                interval_ms: 0,
                map_path_limit: Some(3),
                ..Default::default()
            },
        );
        let mut last = None;
        for _ in 0..5 {
            last = Some(poll.run_cycle().unwrap());
        }
        assert_eq!(last.unwrap().map_overlay.unwrap().path.len(), 3);
        assert_eq!(poll.state().trajectory.len(), 5);
    }

    #[test]
    fn test_run_until_exhausted() {
        let (tx, rx) = mpsc::channel();
        let mut surface = ChannelSurface::new(tx);
        let stop = AtomicBool::new(false);

        let mut poll = poll_loop(vec![
            dump(3, -7.8, 110.3, "2024-03-10 14:05:30"),
            Value::Null,
            dump(3, -7.801, 110.301, "2024-03-10 14:05:32"),
        ]);
        poll.run(&mut surface, &stop).unwrap();

        let frames = rx.try_iter().collect::<Vec<_>>();
        assert_eq!(frames.len(), 3);
        assert!(!frames[1].is_fresh());
        assert_eq!(frames[2].log_table.len(), 2);
    }

    #[test]
    fn test_run_honours_stop_signal() {
        let (tx, rx) = mpsc::channel();
        let mut surface = ChannelSurface::new(tx);
        let stop = AtomicBool::new(true);

        let mut poll = poll_loop(vec![dump(3, -7.8, 110.3, "2024-03-10 14:05:30")]);
        poll.run(&mut surface, &stop).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(poll.latest_frame().is_none());
    }

    #[test]
    fn test_backoff_delay() {
        let mut poll = PollLoop::new(
            MockStore::from_dumps(vec![Value::Null, Value::Null, Value::Null, Value::Null]),
            PollLoopConfig {
                interval_ms: 1_000,
                backoff: true,
                max_backoff_ms: 5_000,
                ..Default::default()
            },
        );
        assert_eq!(poll.next_delay(), Duration::from_millis(1_000));
        poll.run_cycle().unwrap();
        assert_eq!(poll.next_delay(), Duration::from_millis(2_000));
        poll.run_cycle().unwrap();
        assert_eq!(poll.next_delay(), Duration::from_millis(4_000));
        poll.run_cycle().unwrap();
        assert_eq!(poll.next_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_backoff_disabled_by_default() {
        let mut poll = PollLoop::new(
            MockStore::from_dumps(vec![Value::Null]),
            PollLoopConfig::default(),
        );
        poll.run_cycle().unwrap();
        assert_eq!(poll.next_delay(), Duration::from_millis(REFRESH_RATE_MS));
    }
}
