use serde::Serialize;

use crate::game::chart::Difficulty;
use crate::game::gameplay::State;
use crate::game::judgment::JudgeGrade;
use crate::game::scores::JudgmentCounts;

/// End-of-session snapshot, logged when a session is replaced or torn down.
#[derive(Clone, Debug, Serialize)]
pub struct StageSummary {
    pub tempo: f64,
    pub difficulty: Difficulty,
    pub columns: usize,
    pub total_notes: usize,
    pub unjudged_notes: usize,
    pub counts: JudgmentCounts,
    pub score: u64,
    pub max_combo: u32,
    // 0.0..=1.0 of the all-Perfect score.
    pub score_percent: f64,
    // Mean signed offset of hit notes in milliseconds; negative is early.
    pub mean_offset_ms: Option<f64>,
}

impl StageSummary {
    pub fn from_state(state: &State) -> Self {
        let chart = &state.chart;
        let max_score = JudgeGrade::Perfect.points() * chart.notes.len() as u64;
        let score_percent = if max_score == 0 {
            0.0
        } else {
            (state.stats.score as f64 / max_score as f64).clamp(0.0, 1.0)
        };

        let mut offset_sum = 0.0;
        let mut offset_count = 0u32;
        for j in chart.notes.iter().filter_map(|n| n.result.as_ref()) {
            if j.grade != JudgeGrade::Miss {
                offset_sum += j.time_error_s;
                offset_count += 1;
            }
        }
        let mean_offset_ms = (offset_count > 0).then(|| offset_sum / f64::from(offset_count) * 1000.0);

        Self {
            tempo: chart.tempo,
            difficulty: chart.difficulty,
            columns: chart.columns,
            total_notes: chart.notes.len(),
            unjudged_notes: chart.unjudged_count(),
            counts: state.stats.counts,
            score: state.stats.score,
            max_combo: state.stats.max_combo,
            score_percent,
            mean_offset_ms,
        }
    }

    pub fn describe(&self) -> String {
        let offset = self
            .mean_offset_ms
            .map_or_else(|| "n/a".to_string(), |ms| format!("{ms:+.1}ms"));
        format!(
            "{} @ {:.0} bpm: score {} ({:.2}%), max combo {}, hit {}/{}, P/G/G/M {}/{}/{}/{}, unjudged {}/{}, mean offset {}",
            self.difficulty.as_str(),
            self.tempo,
            self.score,
            self.score_percent * 100.0,
            self.max_combo,
            self.counts.hits(),
            self.total_notes,
            self.counts.perfect,
            self.counts.great,
            self.counts.good,
            self.counts.miss,
            self.unjudged_notes,
            self.total_notes,
            offset,
        )
    }
}
