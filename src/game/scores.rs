use serde::Serialize;

use crate::game::judgment::JudgeGrade;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JudgmentCounts {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl JudgmentCounts {
    #[inline(always)]
    pub fn add(&mut self, grade: JudgeGrade) {
        let slot = match grade {
            JudgeGrade::Perfect => &mut self.perfect,
            JudgeGrade::Great => &mut self.great,
            JudgeGrade::Good => &mut self.good,
            JudgeGrade::Miss => &mut self.miss,
        };
        *slot = slot.saturating_add(1);
    }

    /// Notes actually hit (every grade except Miss).
    pub const fn hits(&self) -> u32 {
        self.perfect + self.great + self.good
    }
}

/// Score, combo and per-grade tallies for one session.
/// Score only ever grows; `max_combo` is the running high-water mark.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScoreStats {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub counts: JudgmentCounts,
}

impl ScoreStats {
    pub fn record(&mut self, grade: JudgeGrade) {
        self.score = self.score.saturating_add(grade.points());
        if grade.keeps_combo() {
            self.combo = self.combo.saturating_add(1);
        } else {
            self.combo = 0;
        }
        if grade != JudgeGrade::Miss {
            self.max_combo = self.max_combo.max(self.combo);
        }
        self.counts.add(grade);
    }

    pub fn hud_text(&self) -> String {
        format!(
            "Score: {} | Combo: {} | Max Combo: {}",
            self.score, self.combo, self.max_combo
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreStats;
    use crate::game::judgment::JudgeGrade;

    #[test]
    fn combo_survives_perfect_and_great_only() {
        let mut s = ScoreStats::default();
        s.record(JudgeGrade::Perfect);
        s.record(JudgeGrade::Great);
        assert_eq!((s.combo, s.max_combo, s.score), (2, 2, 400));
        s.record(JudgeGrade::Good);
        assert_eq!((s.combo, s.max_combo, s.score), (0, 2, 450));
        s.record(JudgeGrade::Perfect);
        s.record(JudgeGrade::Miss);
        assert_eq!((s.combo, s.max_combo, s.score), (0, 2, 750));
        assert_eq!(s.counts.hits(), 4);
        assert_eq!(s.counts.miss, 1);
    }

    #[test]
    fn hud_text_lists_all_counters() {
        let mut s = ScoreStats::default();
        s.record(JudgeGrade::Perfect);
        assert_eq!(s.hud_text(), "Score: 300 | Combo: 1 | Max Combo: 1");
    }
}
