use std::cmp::Ordering;

use log::debug;
use serde::Serialize;

use crate::game::note::Note;
use crate::game::scores::ScoreStats;
use crate::game::timing_windows::{GOOD_WINDOW_S, GREAT_WINDOW_S, MISS_WINDOW_S, PERFECT_WINDOW_S};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum JudgeGrade {
    Perfect,
    Great,
    Good,
    Miss,
}

impl JudgeGrade {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect",
            Self::Great => "Great",
            Self::Good => "Good",
            Self::Miss => "Miss",
        }
    }

    pub const fn points(self) -> u64 {
        match self {
            Self::Perfect => 300,
            Self::Great => 100,
            Self::Good => 50,
            Self::Miss => 0,
        }
    }

    /// Perfect and Great extend the combo; Good and Miss break it.
    pub const fn keeps_combo(self) -> bool {
        matches!(self, Self::Perfect | Self::Great)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Judgment {
    pub grade: JudgeGrade,
    // press_time - note_time; negative means early.
    pub time_error_s: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    pub grade: JudgeGrade,
    // Index into the chart of the note that was resolved, None for a miss.
    pub note_index: Option<usize>,
    // Distance to the nearest unjudged note in the lane; infinite when empty.
    pub delta_s: f64,
}

/// Classifies an offset that already lies inside the miss window.
#[inline(always)]
pub fn classify_offset_s(offset_s: f64) -> JudgeGrade {
    let abs = offset_s.abs();
    if abs < PERFECT_WINDOW_S {
        JudgeGrade::Perfect
    } else if abs < GREAT_WINDOW_S {
        JudgeGrade::Great
    } else if abs < GOOD_WINDOW_S {
        JudgeGrade::Good
    } else {
        JudgeGrade::Miss
    }
}

/// Finds the unjudged note in `lane` closest to `press_time`.
/// Ties go to the earliest note. Returns the chart index and the distance.
pub fn find_candidate(notes: &[Note], lane: usize, press_time: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, note) in notes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.lane == lane && !n.is_judged())
    {
        let delta = (note.time - press_time).abs();
        match best {
            None => best = Some((idx, delta)),
            Some((best_idx, best_delta)) => match delta.total_cmp(&best_delta) {
                Ordering::Less => best = Some((idx, delta)),
                Ordering::Equal if note.time < notes[best_idx].time => {
                    best = Some((idx, delta));
                }
                _ => {}
            },
        }
    }
    best
}

/// Judges one press. On a hit, exactly one note is resolved; on a miss no
/// note is touched. Score, combo and max combo are updated through `stats`.
pub fn judge(notes: &mut [Note], stats: &mut ScoreStats, lane: usize, press_time: f64) -> Outcome {
    let candidate = find_candidate(notes, lane, press_time);
    let delta_s = candidate.map_or(f64::INFINITY, |(_, d)| d);

    let Some((note_index, _)) = candidate.filter(|_| delta_s < MISS_WINDOW_S) else {
        stats.record(JudgeGrade::Miss);
        debug!("MISS: lane={lane}, press_s={press_time:.4}, nearest_delta_s={delta_s:.4}");
        return Outcome {
            grade: JudgeGrade::Miss,
            note_index: None,
            delta_s,
        };
    };

    let note = &mut notes[note_index];
    let time_error_s = press_time - note.time;
    let grade = classify_offset_s(time_error_s);
    note.result = Some(Judgment { grade, time_error_s });
    stats.record(grade);

    debug!(
        "HIT: grade={grade:?}, lane={lane}, note_s={:.4}, press_s={press_time:.4}, offset_ms={:.2}, combo={}",
        note.time,
        time_error_s * 1000.0,
        stats.combo
    );

    Outcome {
        grade,
        note_index: Some(note_index),
        delta_s,
    }
}

/// Resolves every unjudged note that fell out of the miss window before
/// `song_time`. Only used when the stale-note sweep is enabled.
/// Returns how many notes were marked.
pub fn sweep_stale_notes(notes: &mut [Note], stats: &mut ScoreStats, song_time: f64) -> usize {
    let cutoff = song_time - MISS_WINDOW_S;
    let mut swept = 0;
    for note in notes.iter_mut() {
        if note.time >= cutoff {
            break;
        }
        if note.is_judged() {
            continue;
        }
        note.result = Some(Judgment {
            grade: JudgeGrade::Miss,
            time_error_s: song_time - note.time,
        });
        stats.record(JudgeGrade::Miss);
        swept += 1;
    }
    if swept > 0 {
        debug!("MISSED (time-based): {swept} note(s) before {cutoff:.3}s");
    }
    swept
}
