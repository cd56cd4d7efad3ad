use crate::game::note::Note;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// Beats 0..4 are a lead-in; candidates run through beat 63 inclusive.
pub const FIRST_BEAT: u32 = 4;
pub const LAST_BEAT: u32 = 63;

pub const MIN_COLUMNS: usize = 2;
pub const MAX_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Self; 3] = [Self::Easy, Self::Normal, Self::Hard];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Normal => "Normal",
            Self::Hard => "Hard",
        }
    }

    /// Probability that any candidate beat carries a note.
    pub const fn density(&self) -> f64 {
        match self {
            Self::Easy => 0.35,
            Self::Normal => 0.50,
            Self::Hard => 0.85,
        }
    }

    /// Multiplier applied to the base scroll speed.
    pub const fn scroll_multiplier(&self) -> f64 {
        match self {
            Self::Easy => 0.8,
            Self::Normal => 1.0,
            Self::Hard => 1.2,
        }
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "normal" => Ok(Self::Normal),
            "hard" => Ok(Self::Hard),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Chart {
    pub tempo: f64,
    pub difficulty: Difficulty,
    pub columns: usize,
    pub notes: Vec<Note>,
}

impl Chart {
    /// Time of the last note, or 0 for an empty chart.
    pub fn last_note_time(&self) -> f64 {
        self.notes.last().map_or(0.0, |n| n.time)
    }

    pub fn unjudged_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_judged()).count()
    }
}

/// Builds a fresh chart: one candidate per beat in `FIRST_BEAT..=LAST_BEAT`,
/// kept with probability `difficulty.density()` on a uniformly random lane.
///
/// `tempo` must be finite and positive and `columns` within
/// `MIN_COLUMNS..=MAX_COLUMNS`; `SessionConfig` guarantees both.
pub fn generate<R: Rng + ?Sized>(
    tempo: f64,
    difficulty: Difficulty,
    columns: usize,
    rng: &mut R,
) -> Chart {
    debug_assert!(tempo.is_finite() && tempo > 0.0, "tempo must be positive");
    debug_assert!(
        (MIN_COLUMNS..=MAX_COLUMNS).contains(&columns),
        "columns out of range"
    );
    let columns = columns.max(1);
    let seconds_per_beat = 60.0 / tempo;
    let density = difficulty.density();

    let mut notes = Vec::with_capacity((LAST_BEAT - FIRST_BEAT + 1) as usize);
    for beat in FIRST_BEAT..=LAST_BEAT {
        let beat_time = f64::from(beat) * seconds_per_beat;
        if rng.gen_range(0.0..1.0) < density {
            let lane = rng.gen_range(0..columns);
            notes.push(Note::new(lane, beat_time));
        }
    }
    // Ascending by time; judgment and rendering rely on it.
    notes.sort_by(|a, b| a.time.total_cmp(&b.time));

    debug!(
        "Generated chart: {} notes, tempo={tempo:.1}, difficulty={}, columns={columns}",
        notes.len(),
        difficulty.as_str()
    );

    Chart {
        tempo,
        difficulty,
        columns,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::{Difficulty, FIRST_BEAT, LAST_BEAT, MAX_COLUMNS, MIN_COLUMNS, generate};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn same_seed_produces_same_chart() {
        let a = generate(120.0, Difficulty::Normal, 4, &mut StdRng::seed_from_u64(7));
        let b = generate(120.0, Difficulty::Normal, 4, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.notes.len(), b.notes.len());
        for (x, y) in a.notes.iter().zip(&b.notes) {
            assert_eq!(x.lane, y.lane);
            assert!((x.time - y.time).abs() <= f64::EPSILON);
        }
    }

    #[test]
    fn notes_land_on_beats_and_start_unjudged() {
        let chart = generate(150.0, Difficulty::Hard, 5, &mut StdRng::seed_from_u64(3));
        let spb = 60.0 / chart.tempo;
        for n in &chart.notes {
            let beat = n.time / spb;
            assert!(
                (beat - beat.round()).abs() < 1e-9,
                "note time {} is not on a beat",
                n.time
            );
            assert!(beat.round() as u32 >= FIRST_BEAT && beat.round() as u32 <= LAST_BEAT);
            assert!(!n.is_judged());
        }
    }

    #[test]
    fn notes_are_time_ordered() {
        let chart = generate(200.0, Difficulty::Hard, 6, &mut StdRng::seed_from_u64(11));
        assert!(chart.notes.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn expected_density_orders_by_difficulty() {
        // 400 charts x 60 candidates per difficulty keeps the means far apart.
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut totals = [0usize; 3];
        for (slot, difficulty) in Difficulty::ALL.iter().enumerate() {
            for _ in 0..400 {
                totals[slot] += generate(120.0, *difficulty, 4, &mut rng).notes.len();
            }
        }
        assert!(
            totals[2] >= totals[1] && totals[1] >= totals[0],
            "expected Hard >= Normal >= Easy, got {totals:?}"
        );
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!(" hard ".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("EASY".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("expert".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::default(), Difficulty::Normal);
    }

    proptest! {
        #[test]
        fn generated_notes_stay_in_bounds(
            seed in any::<u64>(),
            tempo in 60.0f64..220.0,
            columns in MIN_COLUMNS..=MAX_COLUMNS,
            difficulty_idx in 0usize..3,
        ) {
            let difficulty = Difficulty::ALL[difficulty_idx];
            let chart = generate(tempo, difficulty, columns, &mut StdRng::seed_from_u64(seed));
            let earliest = f64::from(FIRST_BEAT) * 60.0 / tempo;
            prop_assert!(chart.notes.len() <= (LAST_BEAT - FIRST_BEAT + 1) as usize);
            for n in &chart.notes {
                prop_assert!(n.lane < columns);
                prop_assert!(n.time >= earliest - 1e-12);
            }
        }
    }
}
