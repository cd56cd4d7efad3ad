//! Scripted player that presses lanes around note times.

use crate::game::chart::Chart;
use rand::Rng;
use smallvec::SmallVec;

// Far past the miss window; larger errors would only ever miss.
pub const MAX_JITTER_S: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct AutoplayEvent {
    // Song time of the press.
    time: f64,
    lane: usize,
}

/// Pre-computes one press per note, offset by a random timing error, and
/// hands them out as song time passes.
pub struct AutoplayProcessor {
    events: Vec<AutoplayEvent>,
    current_index: usize,
}

impl AutoplayProcessor {
    /// `jitter_s` bounds the uniform timing error; `skip_rate` is the chance a
    /// note is never pressed at all. Jitter is capped at `MAX_JITTER_S`;
    /// non-finite values are treated as zero.
    pub fn new<R: Rng + ?Sized>(chart: &Chart, jitter_s: f64, skip_rate: f64, rng: &mut R) -> Self {
        let jitter_s = if jitter_s.is_finite() {
            jitter_s.abs().min(MAX_JITTER_S)
        } else {
            0.0
        };
        let skip_rate = if skip_rate.is_finite() {
            skip_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut events: Vec<AutoplayEvent> = chart
            .notes
            .iter()
            .filter_map(|note| {
                if rng.gen_range(0.0..1.0) < skip_rate {
                    return None;
                }
                let error = if jitter_s > 0.0 {
                    rng.gen_range(-jitter_s..=jitter_s)
                } else {
                    0.0
                };
                Some(AutoplayEvent {
                    time: note.time + error,
                    lane: note.lane,
                })
            })
            .collect();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            events,
            current_index: 0,
        }
    }

    /// `(lane, scheduled song time)` of every press due at or before `song_time`.
    pub fn poll(&mut self, song_time: f64) -> SmallVec<[(usize, f64); 4]> {
        let mut out = SmallVec::new();
        while let Some(ev) = self.events.get(self.current_index) {
            if ev.time > song_time {
                break;
            }
            out.push((ev.lane, ev.time));
            self.current_index += 1;
        }
        out
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.current_index
    }
}

#[cfg(test)]
mod tests {
    use super::{AutoplayProcessor, MAX_JITTER_S};
    use crate::game::chart::{Chart, Difficulty};
    use crate::game::note::Note;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn lanes(due: &[(usize, f64)]) -> Vec<usize> {
        due.iter().map(|(lane, _)| *lane).collect()
    }

    fn chart() -> Chart {
        Chart {
            tempo: 120.0,
            difficulty: Difficulty::Normal,
            columns: 4,
            notes: vec![Note::new(0, 2.0), Note::new(3, 2.5), Note::new(1, 3.0)],
        }
    }

    #[test]
    fn exact_autoplay_presses_on_note_times() {
        let mut bot = AutoplayProcessor::new(&chart(), 0.0, 0.0, &mut StdRng::seed_from_u64(1));
        assert!(bot.poll(1.99).is_empty());
        let due = bot.poll(2.5);
        assert_eq!(lanes(&due), vec![0, 3]);
        assert!((due[1].1 - 2.5).abs() < 1e-12);
        assert_eq!(bot.remaining(), 1);
        assert_eq!(lanes(&bot.poll(10.0)), vec![1]);
        assert!(bot.poll(11.0).is_empty());
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let mut bot = AutoplayProcessor::new(&chart(), 0.05, 0.0, &mut StdRng::seed_from_u64(8));
        assert!(bot.poll(1.949).is_empty());
        let due = bot.poll(3.05);
        assert_eq!(due.len(), 3);
        for (lane, time) in due {
            let target = chart().notes.iter().find(|n| n.lane == lane).map_or(0.0, |n| n.time);
            assert!((time - target).abs() <= 0.05 + 1e-12);
        }
    }

    #[test]
    fn non_finite_settings_fall_back_to_exact_presses() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut bot = AutoplayProcessor::new(&chart(), f64::INFINITY, f64::NAN, &mut rng);
        assert_eq!(bot.remaining(), 3);
        let due = bot.poll(2.0);
        assert_eq!(lanes(&due), vec![0]);
        assert!((due[0].1 - 2.0).abs() < 1e-12);

        let bot = AutoplayProcessor::new(&chart(), f64::NAN, 0.0, &mut rng);
        assert_eq!(bot.remaining(), 3);

        let mut bot = AutoplayProcessor::new(&chart(), f64::MAX, 0.0, &mut rng);
        assert!(bot.poll(2.0 - MAX_JITTER_S - 1e-9).is_empty());
        assert_eq!(bot.poll(3.0 + MAX_JITTER_S).len(), 3);
    }

    #[test]
    fn full_skip_rate_presses_nothing() {
        let mut bot = AutoplayProcessor::new(&chart(), 0.0, 1.0, &mut StdRng::seed_from_u64(1));
        assert_eq!(bot.remaining(), 0);
        assert!(bot.poll(100.0).is_empty());
    }
}
