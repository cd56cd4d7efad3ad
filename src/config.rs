use crate::core::audio::{AudioError, AudioSource, AutoplayPolicy};
use crate::core::input::{Keymap, KeymapError};
use crate::game::chart::{Difficulty, MAX_COLUMNS, MIN_COLUMNS};
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

pub const CONFIG_PATH: &str = "hitline.ini";

// Range offered by the tempo slider; other positive tempos still play.
pub const MIN_SUGGESTED_BPM: f64 = 60.0;
pub const MAX_SUGGESTED_BPM: f64 = 220.0;

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content);
        Ok(())
    }

    pub fn load_str(&mut self, content: &str) {
        self.sections.clear();

        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let section = line[1..line.len() - 1].trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            // Key/value pair: key=value, with an optional trailing "; comment".
            if let Some((key_raw, value_raw)) = line.split_once('=') {
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                let value = value_raw
                    .split_once(';')
                    .map_or(value_raw, |(v, _)| v)
                    .trim()
                    .to_string();
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bpm: f64,
    pub difficulty: Difficulty,
    pub columns: usize,
    // Comma-separated key identifiers, one per lane.
    pub keymap: String,
    // None = built-in silent clip.
    pub audio_file: Option<PathBuf>,
    pub autoplay_policy: AutoplayPolicy,
    // Resolve notes that scroll past the miss window without a press.
    pub auto_miss_stale_notes: bool,
    pub frame_rate: u32,
    pub log_level: LogLevel,
    // None = seed from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            difficulty: Difficulty::Normal,
            columns: 4,
            keymap: "d,f,j,k".to_string(),
            audio_file: None,
            autoplay_policy: AutoplayPolicy::Allow,
            auto_miss_stale_notes: false,
            frame_rate: 60,
            log_level: LogLevel::Warn,
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),
    #[error("column count must be between 2 and 6, got {0}")]
    InvalidColumns(usize),
    #[error("invalid keymap: {0}")]
    Keymap(#[from] KeymapError),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Validated, immutable settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tempo: f64,
    pub difficulty: Difficulty,
    pub columns: usize,
    pub keymap: Keymap,
    pub audio: AudioSource,
    pub autoplay_policy: AutoplayPolicy,
    pub auto_miss_stale_notes: bool,
    pub seed: Option<u64>,
}

impl SessionConfig {
    /// Checks tempo, lane count and keymap, and loads the audio file.
    /// No session can be built from an invalid configuration.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        if !cfg.bpm.is_finite() || cfg.bpm <= 0.0 {
            return Err(ConfigError::InvalidTempo(cfg.bpm));
        }
        if !(MIN_COLUMNS..=MAX_COLUMNS).contains(&cfg.columns) {
            return Err(ConfigError::InvalidColumns(cfg.columns));
        }
        if !(MIN_SUGGESTED_BPM..=MAX_SUGGESTED_BPM).contains(&cfg.bpm) {
            warn!(
                "Tempo {:.1} is outside the usual {MIN_SUGGESTED_BPM}-{MAX_SUGGESTED_BPM} bpm range.",
                cfg.bpm
            );
        }
        let keymap = Keymap::parse(&cfg.keymap, cfg.columns)?;
        let audio = match cfg.audio_file.as_deref() {
            Some(path) => AudioSource::from_file(path)?,
            None => AudioSource::silent(),
        };
        Ok(Self {
            tempo: cfg.bpm,
            difficulty: cfg.difficulty,
            columns: cfg.columns,
            keymap,
            audio,
            autoplay_policy: cfg.autoplay_policy,
            auto_miss_stale_notes: cfg.auto_miss_stale_notes,
            seed: cfg.seed,
        })
    }
}

// Global, mutable application configuration.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn default_config_contents() -> String {
    let default = Config::default();
    let mut content = String::new();

    // [Options] section - keys in alphabetical order
    content.push_str("[Options]\n");
    content.push_str("AudioFile=\n");
    content.push_str(&format!(
        "AutoMissStaleNotes={}\n",
        if default.auto_miss_stale_notes { "1" } else { "0" }
    ));
    content.push_str(&format!(
        "AutoplayPolicy={}\n",
        default.autoplay_policy.as_str()
    ));
    content.push_str(&format!("BPM={}\n", default.bpm));
    content.push_str(&format!("Columns={}\n", default.columns));
    content.push_str(&format!("Difficulty={}\n", default.difficulty.as_str()));
    content.push_str(&format!("FrameRate={}\n", default.frame_rate));
    content.push_str(&format!("Keymap={}\n", default.keymap));
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push_str("Seed=\n");
    content
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    std::fs::write(path, default_config_contents())
}

/// Populates a `Config` from parsed ini data, using defaults for any missing
/// or malformed keys.
pub fn from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    let mut cfg = Config::default();

    cfg.bpm = conf
        .get("Options", "BPM")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default.bpm);
    cfg.difficulty = conf
        .get("Options", "Difficulty")
        .and_then(|v| Difficulty::from_str(&v).ok())
        .unwrap_or(default.difficulty);
    cfg.columns = conf
        .get("Options", "Columns")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default.columns);
    cfg.keymap = conf
        .get("Options", "Keymap")
        .filter(|v| !v.is_empty())
        .unwrap_or(default.keymap);
    cfg.audio_file = conf
        .get("Options", "AudioFile")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    cfg.autoplay_policy = conf
        .get("Options", "AutoplayPolicy")
        .and_then(|v| AutoplayPolicy::from_str(&v).ok())
        .unwrap_or(default.autoplay_policy);
    cfg.auto_miss_stale_notes = conf
        .get("Options", "AutoMissStaleNotes")
        .and_then(|v| v.parse::<u8>().ok())
        .map_or(default.auto_miss_stale_notes, |v| v != 0);
    cfg.frame_rate = conf
        .get("Options", "FrameRate")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default.frame_rate);
    cfg.log_level = conf
        .get("Options", "LogLevel")
        .and_then(|v| LogLevel::from_str(&v).ok())
        .unwrap_or(default.log_level);
    cfg.seed = conf
        .get("Options", "Seed")
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(raw) = conf.get("Options", "Difficulty")
        && Difficulty::from_str(&raw).is_err()
    {
        warn!("Unknown Difficulty '{raw}', using {}.", default.difficulty.as_str());
    }
    cfg
}

/// Reads `path` into the global configuration, creating the file with
/// defaults when it does not exist.
pub fn load(path: &Path) {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    let mut conf = SimpleIni::new();
    match conf.load(path) {
        Ok(()) => {
            let cfg = from_ini(&conf);
            info!(
                "Config loaded: bpm={}, difficulty={}, columns={}, keymap={}",
                cfg.bpm,
                cfg.difficulty.as_str(),
                cfg.columns,
                cfg.keymap
            );
            *lock_config() = cfg;
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using defaults.", path.display());
        }
    }
}

fn lock_config() -> std::sync::MutexGuard<'static, Config> {
    // A poisoned lock still holds a complete Config.
    CONFIG.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub fn get() -> Config {
    lock_config().clone()
}

pub fn update(f: impl FnOnce(&mut Config)) {
    f(&mut lock_config());
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError, LogLevel, SessionConfig, SimpleIni, from_ini};
    use crate::core::audio::{AudioFormat, AutoplayPolicy};
    use crate::game::chart::Difficulty;
    use std::io::Write;

    fn parse(text: &str) -> Config {
        let mut ini = SimpleIni::new();
        ini.load_str(text);
        from_ini(&ini)
    }

    #[test]
    fn default_file_round_trips_to_defaults() {
        let cfg = parse(&super::default_config_contents());
        let default = Config::default();
        assert!((cfg.bpm - default.bpm).abs() < f64::EPSILON);
        assert_eq!(cfg.difficulty, default.difficulty);
        assert_eq!(cfg.columns, default.columns);
        assert_eq!(cfg.keymap, default.keymap);
        assert_eq!(cfg.audio_file, None);
        assert_eq!(cfg.seed, None);
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn values_and_comments_are_read() {
        let cfg = parse(
            "[Options]\nBPM=174 ; fast\nDifficulty=hard\nColumns=6\nKeymap=s,d,f,j,k,l\n\
             AutoplayPolicy=RequireGesture\nAutoMissStaleNotes=1\nSeed=42\nLogLevel=debug\n",
        );
        assert!((cfg.bpm - 174.0).abs() < f64::EPSILON);
        assert_eq!(cfg.difficulty, Difficulty::Hard);
        assert_eq!(cfg.columns, 6);
        assert_eq!(cfg.autoplay_policy, AutoplayPolicy::RequireGesture);
        assert!(cfg.auto_miss_stale_notes);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.log_level, LogLevel::Debug);
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let cfg = parse("[Options]\nBPM=fast\nColumns=many\nDifficulty=Expert\nFrameRate=0\n");
        let default = Config::default();
        assert!((cfg.bpm - default.bpm).abs() < f64::EPSILON);
        assert_eq!(cfg.columns, default.columns);
        assert_eq!(cfg.difficulty, default.difficulty);
        assert_eq!(cfg.frame_rate, default.frame_rate);
    }

    #[test]
    fn session_config_rejects_bad_tempo_and_columns() {
        let mut cfg = Config::default();
        cfg.bpm = 0.0;
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::InvalidTempo(_))
        ));
        cfg.bpm = f64::NAN;
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::InvalidTempo(_))
        ));
        cfg.bpm = 120.0;
        cfg.columns = 7;
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::InvalidColumns(7))
        ));
        cfg.columns = 1;
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::InvalidColumns(1))
        ));
    }

    #[test]
    fn session_config_rejects_duplicate_keys() {
        let mut cfg = Config::default();
        cfg.keymap = "d,d,j,k".to_string();
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::Keymap(_))
        ));
    }

    #[test]
    fn session_config_loads_audio_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"ID3\x04\x00\x00\x00\x00\x00\x00").expect("write");
        let mut cfg = Config::default();
        cfg.audio_file = Some(file.path().to_path_buf());
        let session = SessionConfig::from_config(&cfg).expect("valid config");
        assert_eq!(session.audio.format, AudioFormat::Mp3);

        cfg.audio_file = Some(file.path().with_extension("missing"));
        assert!(matches!(
            SessionConfig::from_config(&cfg),
            Err(ConfigError::Audio(_))
        ));
    }

    #[test]
    fn load_creates_missing_file_with_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("hitline.ini");
        super::load(&path);
        assert!(path.exists());
        let text = std::fs::read_to_string(&path).expect("read back");
        assert!(text.contains("Keymap=d,f,j,k"));
        assert_eq!(super::get().columns, 4);
    }
}
