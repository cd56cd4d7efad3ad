use crate::config::SessionConfig;
use crate::core::audio::{SilentTransport, Transport};
use crate::core::clock::TimeSource;
use crate::core::input::{InputEvent, Keymap};
use crate::game::gameplay::{self, Phase, State};
use crate::screens::gameplay::{Frame, build_frame};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;

pub const CLICK_TO_START: &str = "Click to start";
pub const CLICK_TO_RESUME: &str = "Playback blocked: click to resume";
pub const PAUSED_MESSAGE: &str = "Paused";

/// Host-facing events queued by the app and drained by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    AutoplayBlocked,
    PlaybackResumed,
}

/// Owns the current session and drives it from a time source.
pub struct App<C: TimeSource> {
    config: SessionConfig,
    time: C,
    transport: Box<dyn Transport>,
    rng: StdRng,
    session: Option<State>,
    awaiting_gesture: bool,
    pending_input: VecDeque<InputEvent>,
    notifications: VecDeque<Notification>,
    last_tick: f64,
    sessions_started: u32,
}

impl<C: TimeSource> App<C> {
    pub fn new(config: SessionConfig, time: C) -> Self {
        let transport = SilentTransport::new(config.audio.clone(), config.autoplay_policy);
        Self::with_transport(config, time, Box::new(transport))
    }

    pub fn with_transport(config: SessionConfig, time: C, transport: Box<dyn Transport>) -> Self {
        // One generator per app so a fixed seed reproduces every restart in order.
        let rng = match config.seed {
            Some(seed) => {
                info!("Chart seed: {seed}");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };
        let last_tick = time.now();
        Self {
            config,
            time,
            transport,
            rng,
            session: None,
            awaiting_gesture: false,
            pending_input: VecDeque::new(),
            notifications: VecDeque::new(),
            last_tick,
            sessions_started: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.as_ref().map_or(Phase::Idle, State::phase)
    }

    pub fn session(&self) -> Option<&State> {
        self.session.as_ref()
    }

    pub fn keymap(&self) -> &Keymap {
        &self.config.keymap
    }

    pub fn now(&self) -> f64 {
        self.time.now()
    }

    pub const fn awaiting_gesture(&self) -> bool {
        self.awaiting_gesture
    }

    pub const fn sessions_started(&self) -> u32 {
        self.sessions_started
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Current song time, or None while idle.
    pub fn song_time(&self) -> Option<f64> {
        let now = self.time.now();
        self.session.as_ref().map(|s| s.song_time(now))
    }

    pub fn center_message(&self) -> Option<&'static str> {
        if self.awaiting_gesture {
            return Some(CLICK_TO_RESUME);
        }
        match self.phase() {
            Phase::Idle => Some(CLICK_TO_START),
            Phase::Paused => Some(PAUSED_MESSAGE),
            Phase::Running => None,
        }
    }

    /// Start or restart from any phase with a fresh chart and zeroed score.
    pub fn start(&mut self, user_gesture: bool) {
        if let Some(previous) = self.session.take() {
            info!("Stage summary: {}", previous.summary().describe());
        }
        let now = self.time.now();
        let cfg = &self.config;
        self.session = Some(gameplay::init(
            cfg.tempo,
            cfg.difficulty,
            cfg.columns,
            cfg.auto_miss_stale_notes,
            now,
            &mut self.rng,
        ));
        self.sessions_started = self.sessions_started.saturating_add(1);
        self.pending_input.clear();
        self.last_tick = now;

        self.transport.pause();
        self.transport.seek_to_start();
        self.transport.tick(now);
        self.try_play(user_gesture);
    }

    /// Running -> Paused. Key events queued before the pause are judged first.
    pub fn pause(&mut self) -> bool {
        self.apply_pending_input();
        let now = self.time.now();
        let Some(state) = self.session.as_mut() else {
            return false;
        };
        if !state.pause(now) {
            return false;
        }
        self.transport.tick(now);
        self.transport.pause();
        true
    }

    /// Paused -> Running. Key events queued while paused are dropped.
    pub fn resume(&mut self, user_gesture: bool) -> bool {
        self.apply_pending_input();
        let now = self.time.now();
        let Some(state) = self.session.as_mut() else {
            return false;
        };
        if !state.resume(now) {
            return false;
        }
        self.transport.tick(now);
        self.try_play(user_gesture);
        true
    }

    /// Pointer gesture on the playfield: starts when idle, retries blocked
    /// playback, otherwise toggles pause.
    pub fn click(&mut self) {
        self.apply_pending_input();
        match self.phase() {
            Phase::Idle => self.start(true),
            Phase::Running if self.awaiting_gesture => self.try_play(true),
            Phase::Running => {
                self.pause();
            }
            Phase::Paused => {
                self.resume(true);
            }
        }
    }

    pub fn queue_input(&mut self, ev: InputEvent) {
        self.pending_input.push_back(ev);
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    fn try_play(&mut self, user_gesture: bool) {
        match self.transport.play(user_gesture) {
            Ok(()) => {
                if self.awaiting_gesture {
                    self.awaiting_gesture = false;
                    info!("Playback resumed after user gesture.");
                    self.notifications.push_back(Notification::PlaybackResumed);
                }
            }
            Err(e) => {
                if !self.awaiting_gesture {
                    warn!("{e}");
                    self.awaiting_gesture = true;
                    self.notifications.push_back(Notification::AutoplayBlocked);
                }
            }
        }
    }

    /// Feeds queued key events to the session in delivery order, against the
    /// phase they were made in.
    fn apply_pending_input(&mut self) {
        while let Some(ev) = self.pending_input.pop_front() {
            if self.session.is_none() {
                continue;
            }
            let recognised = ev.pressed && !ev.repeat && self.config.keymap.lane_for_key(&ev.key).is_some();
            if recognised && self.awaiting_gesture && self.phase() == Phase::Running {
                self.try_play(true);
            }
            if let Some(state) = self.session.as_mut()
                && let Some(outcome) = gameplay::handle_input(state, &self.config.keymap, &ev)
            {
                debug!(
                    "Key '{}' -> {} (note {:?}, {:+.1}ms)",
                    ev.key,
                    outcome.grade.label(),
                    outcome.note_index,
                    outcome.delta_s * 1000.0
                );
            }
        }
    }

    /// One cooperative step: applies queued key events in delivery order,
    /// advances the session and returns the frame to draw.
    pub fn tick(&mut self) -> Frame {
        let now = self.time.now();
        let delta_time = (now - self.last_tick).max(0.0) as f32;
        self.last_tick = now;
        self.transport.tick(now);
        self.apply_pending_input();

        if let Some(state) = self.session.as_mut() {
            gameplay::update(state, now, delta_time);
        }

        build_frame(
            self.session.as_ref(),
            &self.config.keymap,
            self.config.columns,
            now,
            self.center_message(),
        )
    }

    /// Fixed-cadence loop for `duration_s` seconds of wall time. `wait` blocks
    /// or advances the time source by one frame interval; `on_frame` sees each
    /// frame and may queue input or issue commands.
    pub fn run<W, F>(&mut self, duration_s: f64, frame_rate: u32, mut wait: W, mut on_frame: F)
    where
        W: FnMut(f64),
        F: FnMut(&mut Self, &Frame),
    {
        let interval = 1.0 / f64::from(frame_rate.max(1));
        let end = self.time.now() + duration_s.max(0.0);
        info!("Running for {duration_s:.1}s at {frame_rate} Hz");
        while self.time.now() < end {
            let frame = self.tick();
            on_frame(self, &frame);
            wait(interval);
        }
    }

    /// Ends the current session, logging its summary.
    pub fn shutdown(&mut self) {
        self.transport.pause();
        if let Some(state) = self.session.take() {
            info!("Stage summary: {}", state.summary().describe());
        }
    }
}
