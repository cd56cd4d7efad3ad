use crate::core::clock::SongClock;
use crate::core::input::{InputEvent, Keymap};
use crate::game::chart::{self, Chart, Difficulty};
use crate::game::judgment::{self, JudgeGrade, Outcome};
use crate::game::scores::ScoreStats;
use crate::game::stage_stats::StageSummary;
use log::{debug, info, trace};
use rand::Rng;

// How long the Perfect/Great/Good/Miss label stays up after a press.
pub const JUDGMENT_DISPLAY_DURATION: f64 = 0.4;
// Lane highlight after a recognised key press.
pub const LANE_FLASH_DURATION: f32 = 0.2;

const LOG_INTERVAL_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Paused => "Paused",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct JudgmentRenderInfo {
    pub grade: JudgeGrade,
    // Wall time of the press.
    pub judged_at: f64,
}

/// One play session: the chart, its clock and the running score.
/// Restarting builds a new `State`; nothing here is shared.
pub struct State {
    pub chart: Chart,
    pub stats: ScoreStats,
    pub clock: SongClock,
    pub auto_miss_stale_notes: bool,
    pub last_judgment: Option<JudgmentRenderInfo>,
    pub lane_flash_timers: Vec<f32>,
    pub current_song_time: f64,
    presses: u32,
    log_timer: f32,
}

/// Builds a running session whose song time reaches zero one pre-roll after `now`.
pub fn init<R: Rng + ?Sized>(
    tempo: f64,
    difficulty: Difficulty,
    columns: usize,
    auto_miss_stale_notes: bool,
    now: f64,
    rng: &mut R,
) -> State {
    let chart = chart::generate(tempo, difficulty, columns, rng);
    let clock = SongClock::starting_at(now);
    info!(
        "Session started: {} notes over {:.2}s (tempo={tempo:.1}, {}, {columns} lanes)",
        chart.notes.len(),
        chart.last_note_time(),
        difficulty.as_str(),
    );
    State {
        current_song_time: clock.song_time(now),
        chart,
        stats: ScoreStats::default(),
        clock,
        auto_miss_stale_notes,
        last_judgment: None,
        lane_flash_timers: vec![0.0; columns],
        presses: 0,
        log_timer: 0.0,
    }
}

impl State {
    #[inline(always)]
    pub const fn phase(&self) -> Phase {
        if self.clock.is_paused() {
            Phase::Paused
        } else {
            Phase::Running
        }
    }

    #[inline(always)]
    pub fn song_time(&self, now: f64) -> f64 {
        self.clock.song_time(now)
    }

    /// Running -> Paused. Song time freezes at `now`.
    pub fn pause(&mut self, now: f64) -> bool {
        if self.phase() != Phase::Running {
            return false;
        }
        self.clock.pause(now);
        self.current_song_time = self.clock.song_time(now);
        info!("Session paused at song time {:.3}s", self.current_song_time);
        true
    }

    /// Paused -> Running without a jump in song time.
    pub fn resume(&mut self, now: f64) -> bool {
        if self.phase() != Phase::Paused {
            return false;
        }
        self.clock.resume(now);
        self.current_song_time = self.clock.song_time(now);
        info!(
            "Session resumed at song time {:.3}s (paused {:.3}s in total)",
            self.current_song_time,
            self.clock.paused_total()
        );
        true
    }

    /// The label to show at wall time `now`, if it has not expired.
    pub fn visible_judgment(&self, now: f64) -> Option<JudgeGrade> {
        self.last_judgment
            .filter(|j| now - j.judged_at < JUDGMENT_DISPLAY_DURATION)
            .map(|j| j.grade)
    }

    pub fn summary(&self) -> StageSummary {
        StageSummary::from_state(self)
    }

    pub const fn presses(&self) -> u32 {
        self.presses
    }
}

/// Judges a press in `lane` made at wall time `now`.
/// Returns None when the session is paused or the lane does not exist.
pub fn judge_a_tap(state: &mut State, lane: usize, now: f64) -> Option<Outcome> {
    if state.phase() != Phase::Running || lane >= state.chart.columns {
        return None;
    }
    let press_time = state.song_time(now);
    let outcome = judgment::judge(&mut state.chart.notes, &mut state.stats, lane, press_time);
    state.presses = state.presses.saturating_add(1);
    state.last_judgment = Some(JudgmentRenderInfo {
        grade: outcome.grade,
        judged_at: now,
    });
    if let Some(timer) = state.lane_flash_timers.get_mut(lane) {
        *timer = LANE_FLASH_DURATION;
    }
    Some(outcome)
}

/// Routes a raw key event through the keymap. Releases, auto-repeats and
/// unbound keys are not judgment events.
pub fn handle_input(state: &mut State, keymap: &Keymap, ev: &InputEvent) -> Option<Outcome> {
    if !ev.pressed || ev.repeat {
        return None;
    }
    let Some(lane) = keymap.lane_for_key(&ev.key) else {
        trace!("Ignoring unbound key '{}'", ev.key);
        return None;
    };
    judge_a_tap(state, lane, ev.timestamp)
}

fn tick_visual_effects(state: &mut State, delta_time: f32) {
    for timer in &mut state.lane_flash_timers {
        *timer = (*timer - delta_time).max(0.0);
    }
}

/// Per-frame bookkeeping. Song time does not advance while paused.
pub fn update(state: &mut State, now: f64, delta_time: f32) {
    tick_visual_effects(state, delta_time);
    if state.phase() != Phase::Running {
        return;
    }

    let song_time = state.song_time(now);
    state.current_song_time = song_time;

    if state.auto_miss_stale_notes {
        let swept = judgment::sweep_stale_notes(&mut state.chart.notes, &mut state.stats, song_time);
        if swept > 0 {
            state.last_judgment = Some(JudgmentRenderInfo {
                grade: JudgeGrade::Miss,
                judged_at: now,
            });
        }
    }

    state.log_timer += delta_time;
    if state.log_timer >= LOG_INTERVAL_SECONDS {
        debug!(
            "Time: {:.2}, Score: {}, Combo: {}, Unjudged: {}",
            song_time,
            state.stats.score,
            state.stats.combo,
            state.chart.unjudged_count()
        );
        state.log_timer -= LOG_INTERVAL_SECONDS;
    }
}
