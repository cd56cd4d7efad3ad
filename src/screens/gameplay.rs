use crate::core::input::Keymap;
use crate::game::chart::Difficulty;
use crate::game::gameplay::{LANE_FLASH_DURATION, Phase, State};
use crate::game::scores::ScoreStats;
use serde::Serialize;

// Playfield geometry in pixels.
pub const FIELD_WIDTH: f32 = 900.0;
pub const FIELD_HEIGHT: f32 = 600.0;
pub const HIT_LINE_OFFSET_FROM_BOTTOM: f32 = 120.0;
pub const HIT_LINE_THICKNESS: f32 = 6.0;
pub const KEY_LABEL_OFFSET_FROM_BOTTOM: f32 = 60.0;
pub const NOTE_RADIUS: f32 = 18.0;

// Pixels per second of song time at Normal difficulty.
pub const BASE_SCROLL_SPEED: f64 = 250.0;

#[derive(Clone, Debug, Serialize)]
pub struct LaneView {
    pub index: usize,
    pub x: f32,
    pub width: f32,
    pub key_label: String,
    // 0.0 = idle, 1.0 = just pressed.
    pub flash: f32,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct NoteSprite {
    pub lane: usize,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Everything the host needs to draw one tick.
#[derive(Clone, Debug, Serialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub phase: &'static str,
    pub song_time: f64,
    pub hit_line_y: f32,
    pub hit_line_thickness: f32,
    pub key_label_y: f32,
    pub lanes: Vec<LaneView>,
    pub notes: Vec<NoteSprite>,
    pub hud: String,
    pub judgment_label: Option<&'static str>,
    pub center_message: Option<String>,
}

#[inline(always)]
pub const fn hit_line_y() -> f32 {
    FIELD_HEIGHT - HIT_LINE_OFFSET_FROM_BOTTOM
}

#[inline(always)]
pub fn scroll_speed(difficulty: Difficulty) -> f64 {
    BASE_SCROLL_SPEED * difficulty.scroll_multiplier()
}

#[inline(always)]
pub fn lane_width(columns: usize) -> f32 {
    (FIELD_WIDTH / columns.max(1) as f32).floor()
}

/// Vertical position of a note `note_time - song_time` seconds from the hit-line.
#[inline(always)]
pub fn note_y(note_time: f64, song_time: f64, speed: f64) -> f32 {
    (f64::from(hit_line_y()) - (note_time - song_time) * speed) as f32
}

fn lane_views(keymap: &Keymap, columns: usize, flash_timers: &[f32]) -> Vec<LaneView> {
    let width = lane_width(columns);
    (0..columns)
        .map(|index| LaneView {
            index,
            x: index as f32 * width,
            width,
            key_label: keymap.key_for_lane(index).unwrap_or_default().to_uppercase(),
            flash: flash_timers
                .get(index)
                .map_or(0.0, |t| (t / LANE_FLASH_DURATION).clamp(0.0, 1.0)),
        })
        .collect()
}

/// Builds the frame for wall time `now`. `state` is None before the first start.
pub fn build_frame(
    state: Option<&State>,
    keymap: &Keymap,
    columns: usize,
    now: f64,
    center_message: Option<&str>,
) -> Frame {
    let Some(state) = state else {
        return Frame {
            width: FIELD_WIDTH,
            height: FIELD_HEIGHT,
            phase: Phase::Idle.as_str(),
            song_time: 0.0,
            hit_line_y: hit_line_y(),
            hit_line_thickness: HIT_LINE_THICKNESS,
            key_label_y: FIELD_HEIGHT - KEY_LABEL_OFFSET_FROM_BOTTOM,
            lanes: lane_views(keymap, columns, &[]),
            notes: Vec::new(),
            hud: ScoreStats::default().hud_text(),
            judgment_label: None,
            center_message: center_message.map(str::to_string),
        };
    };

    let columns = state.chart.columns;
    let song_time = state.song_time(now);
    let speed = scroll_speed(state.chart.difficulty);
    let width = lane_width(columns);

    // Cull sprites that are entirely off the field.
    let min_y = -NOTE_RADIUS;
    let max_y = FIELD_HEIGHT + NOTE_RADIUS;
    let notes = state
        .chart
        .notes
        .iter()
        .filter(|n| !n.is_judged())
        .filter_map(|n| {
            let y = note_y(n.time, song_time, speed);
            (min_y..=max_y).contains(&y).then(|| NoteSprite {
                lane: n.lane,
                x: (n.lane as f32).mul_add(width, width / 2.0),
                y,
                radius: NOTE_RADIUS,
            })
        })
        .collect();

    Frame {
        width: FIELD_WIDTH,
        height: FIELD_HEIGHT,
        phase: state.phase().as_str(),
        song_time,
        hit_line_y: hit_line_y(),
        hit_line_thickness: HIT_LINE_THICKNESS,
        key_label_y: FIELD_HEIGHT - KEY_LABEL_OFFSET_FROM_BOTTOM,
        lanes: lane_views(keymap, columns, &state.lane_flash_timers),
        notes,
        hud: state.stats.hud_text(),
        judgment_label: state.visible_judgment(now).map(|g| g.label()),
        center_message: center_message.map(str::to_string),
    }
}

/// Coarse text rendering of a frame, `rows` lines tall, for terminals and logs.
pub fn to_ascii(frame: &Frame, rows: usize) -> String {
    let rows = rows.max(2);
    let cols = frame.lanes.len();
    let row_height = frame.height / rows as f32;
    let hit_row = ((frame.hit_line_y / row_height) as usize).min(rows - 1);

    let mut grid = vec![vec!['.'; cols]; rows];
    grid[hit_row].fill('=');
    for lane in &frame.lanes {
        if lane.flash > 0.0 {
            grid[hit_row][lane.index] = '#';
        }
    }
    for note in &frame.notes {
        if note.lane >= cols || note.y < 0.0 {
            continue;
        }
        let row = ((note.y / row_height) as usize).min(rows - 1);
        grid[row][note.lane] = 'o';
    }

    let mut out = String::with_capacity(rows * (cols * 2 + 1) + frame.hud.len() + 32);
    for row in grid {
        for (i, c) in row.into_iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push(c);
        }
        out.push('\n');
    }
    let labels: Vec<&str> = frame.lanes.iter().map(|l| l.key_label.as_str()).collect();
    out.push_str(&labels.join(" "));
    out.push('\n');
    out.push_str(&frame.hud);
    if let Some(label) = frame.judgment_label {
        out.push_str("  ");
        out.push_str(label);
    }
    if let Some(msg) = frame.center_message.as_deref() {
        out.push('\n');
        out.push_str(msg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{NOTE_RADIUS, build_frame, hit_line_y, lane_width, note_y, scroll_speed, to_ascii};
    use crate::core::clock::PRE_ROLL_SECONDS;
    use crate::core::input::Keymap;
    use crate::game::chart::Difficulty;
    use crate::game::gameplay::{init, judge_a_tap};
    use crate::game::note::Note;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn scroll_speed_scales_with_difficulty() {
        assert!((scroll_speed(Difficulty::Easy) - 200.0).abs() < 1e-9);
        assert!((scroll_speed(Difficulty::Normal) - 250.0).abs() < 1e-9);
        assert!((scroll_speed(Difficulty::Hard) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn note_reaches_hit_line_at_its_time() {
        assert!((note_y(2.0, 2.0, 250.0) - hit_line_y()).abs() < 1e-4);
        // One second early: 250px above the line.
        assert!((note_y(3.0, 2.0, 250.0) - (hit_line_y() - 250.0)).abs() < 1e-4);
    }

    #[test]
    fn lane_width_is_floored() {
        assert!((lane_width(4) - 225.0).abs() < f32::EPSILON);
        assert!((lane_width(6) - 150.0).abs() < f32::EPSILON);
        assert!((lane_width(7) - 128.0).abs() < f32::EPSILON);
    }

    #[test]
    fn idle_frame_shows_lanes_and_zero_hud() {
        let keymap = Keymap::default_for(4);
        let frame = build_frame(None, &keymap, 4, 0.0, Some("Click to start"));
        assert_eq!(frame.phase, "Idle");
        assert_eq!(frame.lanes.len(), 4);
        assert_eq!(frame.lanes[2].key_label, "J");
        assert!(frame.notes.is_empty());
        assert_eq!(frame.hud, "Score: 0 | Combo: 0 | Max Combo: 0");
    }

    #[test]
    fn judged_and_offscreen_notes_are_not_drawn() {
        let keymap = Keymap::default_for(4);
        let mut state = init(120.0, Difficulty::Normal, 4, false, 0.0, &mut StdRng::seed_from_u64(2));
        state.chart.notes = vec![Note::new(0, 1.0), Note::new(1, 1.5), Note::new(2, 30.0)];
        let now = 1.0 + PRE_ROLL_SECONDS;
        let _ = judge_a_tap(&mut state, 0, now);

        let frame = build_frame(Some(&state), &keymap, 4, now, None);
        assert_eq!(frame.notes.len(), 1, "only the lane-1 note is visible");
        let sprite = frame.notes[0];
        assert_eq!(sprite.lane, 1);
        assert!((sprite.x - (225.0 + 112.5)).abs() < 1e-3);
        assert!((sprite.y - (hit_line_y() - 125.0)).abs() < 1e-3);
        assert!((sprite.radius - NOTE_RADIUS).abs() < f32::EPSILON);
        assert_eq!(frame.judgment_label, Some("Perfect"));
        assert!(frame.lanes[0].flash > 0.99);
    }

    #[test]
    fn frame_serialises_to_json() {
        let keymap = Keymap::default_for(3);
        let state = init(100.0, Difficulty::Easy, 3, false, 0.0, &mut StdRng::seed_from_u64(4));
        let frame = build_frame(Some(&state), &keymap, 3, 0.25, None);
        let json = serde_json::to_value(&frame).expect("serialisable");
        assert_eq!(json["phase"], "Running");
        assert_eq!(json["lanes"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn ascii_view_marks_hit_line_and_labels() {
        let keymap = Keymap::default_for(2);
        let frame = build_frame(None, &keymap, 2, 0.0, None);
        let text = to_ascii(&frame, 10);
        assert!(text.contains("= ="));
        assert!(text.contains("D F"));
        assert!(text.ends_with("Score: 0 | Combo: 0 | Max Combo: 0"));
    }
}
