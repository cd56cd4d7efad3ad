use clap::Parser;
use hitline::app::{App, Notification};
use hitline::config::{self, CONFIG_PATH, SessionConfig};
use hitline::core::clock::{ManualTimeSource, PRE_ROLL_SECONDS, SystemTimeSource, TimeSource};
use hitline::core::input::InputEvent;
use hitline::game::autoplay::AutoplayProcessor;
use hitline::game::chart::Difficulty;
use hitline::game::timing_windows;
use hitline::screens::gameplay::to_ascii;
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hitline", about = "Headless rhythm-game session played by an autoplay bot")]
struct Args {
    /// Path to the ini configuration file.
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Chart seed; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    bpm: Option<f64>,

    #[arg(long, value_parser = parse_difficulty)]
    difficulty: Option<Difficulty>,

    #[arg(long)]
    columns: Option<usize>,

    /// Seconds to play. Defaults to the chart length plus two seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Print frames and the final summary as JSON lines.
    #[arg(long)]
    json: bool,

    /// Follow the wall clock instead of stepping a simulated one.
    #[arg(long)]
    realtime: bool,

    /// Maximum timing error of the autoplay bot in milliseconds.
    #[arg(long, default_value_t = 30.0)]
    jitter_ms: f64,

    /// Chance that the bot ignores a note entirely.
    #[arg(long, default_value_t = 0.05)]
    skip_rate: f64,

    /// Height of the ASCII playfield.
    #[arg(long, default_value_t = 16)]
    rows: usize,
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::from_str(s).map_err(|()| {
        let known: Vec<&str> = Difficulty::ALL.iter().map(Difficulty::as_str).collect();
        format!("unknown difficulty '{s}' (expected one of {})", known.join(", "))
    })
}

fn play<C, W>(app: &mut App<C>, args: &Args, frame_rate: u32, seed: Option<u64>, wait: W) -> Result<(), Box<dyn std::error::Error>>
where
    C: TimeSource,
    W: FnMut(f64),
{
    // No gesture: a RequireGesture policy stays blocked until the bot's first key press.
    app.start(false);
    let Some(state) = app.session() else {
        return Ok(());
    };
    let duration = args
        .duration
        .unwrap_or_else(|| state.chart.last_note_time() + PRE_ROLL_SECONDS + 2.0);
    let mut bot_rng = seed.map_or_else(StdRng::from_entropy, |s| StdRng::seed_from_u64(s.wrapping_add(1)));
    let mut bot = AutoplayProcessor::new(&state.chart, args.jitter_ms / 1000.0, args.skip_rate, &mut bot_rng);

    let print_every = u64::from(frame_rate.max(1));
    let mut frame_index: u64 = 0;
    app.run(duration, frame_rate, wait, |app, frame| {
        for n in app.drain_notifications() {
            match n {
                Notification::AutoplayBlocked => eprintln!("[audio] playback blocked, waiting for a gesture"),
                Notification::PlaybackResumed => eprintln!("[audio] playback resumed"),
            }
        }

        let presses: Vec<InputEvent> = match app.session() {
            Some(state) => {
                let song_time = state.song_time(app.now());
                bot.poll(song_time)
                    .into_iter()
                    .filter_map(|(lane, time)| {
                        let key = app.keymap().key_for_lane(lane)?;
                        Some(InputEvent::press(key, state.clock.wall_time(time)))
                    })
                    .collect()
            }
            None => Vec::new(),
        };
        for ev in presses {
            app.queue_input(ev);
        }

        if frame_index % print_every == 0 {
            if args.json {
                match serde_json::to_string(frame) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("Failed to serialise frame: {e}"),
                }
            } else {
                println!("{}\n", to_ascii(frame, args.rows));
            }
        }
        frame_index += 1;
    });

    if let Some(state) = app.session() {
        let summary = state.summary();
        if args.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!("{}", summary.describe());
        }
        info!("Autoplay left {} presses unsent", bot.remaining());
    }
    app.shutdown();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load(&args.config);
    config::update(|cfg| {
        if let Some(bpm) = args.bpm {
            cfg.bpm = bpm;
        }
        if let Some(difficulty) = args.difficulty {
            cfg.difficulty = difficulty;
        }
        if let Some(columns) = args.columns {
            cfg.columns = columns;
        }
        if args.seed.is_some() {
            cfg.seed = args.seed;
        }
    });
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let [perfect, great, good] = timing_windows::windows_ms();
    info!("Judgment windows: Perfect <{perfect:.0}ms, Great <{great:.0}ms, Good <{good:.0}ms");

    let session_config = SessionConfig::from_config(&cfg)?;
    info!("Keymap: {}", session_config.keymap.to_ini_value());
    if args.realtime {
        let mut app = App::new(session_config, SystemTimeSource::new());
        play(&mut app, &args, cfg.frame_rate, cfg.seed, |dt| {
            std::thread::sleep(Duration::from_secs_f64(dt));
        })
    } else {
        let clock = ManualTimeSource::new(0.0);
        let mut app = App::new(session_config, &clock);
        play(&mut app, &args, cfg.frame_rate, cfg.seed, |dt| clock.advance(dt))
    }
}
