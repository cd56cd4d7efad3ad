use serde::Serialize;

use crate::game::judgment::{JudgeGrade, Judgment};

#[derive(Clone, Debug, Serialize)]
pub struct Note {
    pub lane: usize,
    // Seconds from the session's logical start. Fixed at creation.
    pub time: f64,
    // None until the judgment engine (or the stale-note sweep) resolves it.
    pub result: Option<Judgment>,
}

impl Note {
    #[inline(always)]
    pub const fn new(lane: usize, time: f64) -> Self {
        Self { lane, time, result: None }
    }

    #[inline(always)]
    pub const fn is_judged(&self) -> bool {
        self.result.is_some()
    }

    #[inline(always)]
    pub fn grade(&self) -> Option<JudgeGrade> {
        self.result.as_ref().map(|j| j.grade)
    }
}
