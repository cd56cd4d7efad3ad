use log::{debug, info, warn};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/* ============================== Public API ============================== */

// 44-byte mono 16-bit PCM WAV at 11025 Hz with an empty data chunk.
pub const SILENT_WAV: [u8; 44] = [
    b'R', b'I', b'F', b'F', 0x24, 0x00, 0x00, 0x00, b'W', b'A', b'V', b'E', b'f', b'm', b't', b' ',
    0x10, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x11, 0x2B, 0x00, 0x00, 0x22, 0x56, 0x00, 0x00,
    0x02, 0x00, 0x10, 0x00, b'd', b'a', b't', b'a', 0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read audio file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognised audio data (expected WAV or MP3)")]
    UnknownFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback is blocked until a user gesture")]
    AutoplayBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub const fn mime(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Sniffs the container from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Self::Wav);
        }
        if bytes.starts_with(b"ID3") {
            return Some(Self::Mp3);
        }
        // Bare MPEG audio frame sync.
        if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return Some(Self::Mp3);
        }
        None
    }
}

/// Audio handed to the transport for one session.
#[derive(Clone, Debug)]
pub struct AudioSource {
    pub name: String,
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
}

impl AudioSource {
    /// The built-in silent clip used when no track is supplied.
    pub fn silent() -> Self {
        Self {
            name: "silence".to_string(),
            format: AudioFormat::Wav,
            bytes: SILENT_WAV.to_vec(),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AudioError> {
        let format = AudioFormat::detect(&bytes).ok_or(AudioError::UnknownFormat)?;
        Ok(Self {
            name: name.into(),
            format,
            bytes,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, AudioError> {
        let bytes = std::fs::read(path).map_err(|source| AudioError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self::from_bytes(name, bytes)
    }

    /// Playback length for PCM WAV data; None for other formats or a
    /// malformed header.
    pub fn duration_seconds(&self) -> Option<f64> {
        if self.format != AudioFormat::Wav {
            return None;
        }
        wav_duration_seconds(&self.bytes)
    }
}

impl Default for AudioSource {
    fn default() -> Self {
        Self::silent()
    }
}

fn read_u32_le(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn wav_duration_seconds(bytes: &[u8]) -> Option<f64> {
    let mut byte_rate: Option<u32> = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let len = read_u32_le(bytes, pos + 4)? as usize;
        let body = pos + 8;
        match id {
            b"fmt " => byte_rate = read_u32_le(bytes, body + 8),
            b"data" => {
                let rate = byte_rate.filter(|r| *r > 0)?;
                return Some(len as f64 / f64::from(rate));
            }
            _ => {}
        }
        // Chunks are padded to even sizes.
        pos = body.checked_add(len)?.checked_add(len & 1)?;
    }
    None
}

/// Whether the host lets playback begin without a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayPolicy {
    #[default]
    Allow,
    RequireGesture,
}

impl AutoplayPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::RequireGesture => "RequireGesture",
        }
    }
}

impl FromStr for AutoplayPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "requiregesture" | "require_gesture" | "gesture" => Ok(Self::RequireGesture),
            _ => Err(()),
        }
    }
}

/// Playback transport the session drives. Position is in seconds of audio.
pub trait Transport {
    /// Starts or resumes playback. `user_gesture` marks calls made directly
    /// from a click or key press.
    fn play(&mut self, user_gesture: bool) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    fn seek_to_start(&mut self);
    fn is_playing(&self) -> bool;
    /// Audio position at wall time `now`.
    fn position(&self, now: f64) -> f64;
    /// Advances internal bookkeeping to wall time `now`.
    fn tick(&mut self, now: f64);
}

/// Transport that plays nothing audible but keeps a faithful position,
/// honouring the host's autoplay policy.
pub struct SilentTransport {
    source: AudioSource,
    policy: AutoplayPolicy,
    unlocked: bool,
    playing: bool,
    position: f64,
    last_tick: f64,
}

impl SilentTransport {
    pub fn new(source: AudioSource, policy: AutoplayPolicy) -> Self {
        info!(
            "Audio transport ready: '{}' ({}, {} bytes, {}, policy={})",
            source.name,
            source.format.mime(),
            source.bytes.len(),
            source
                .duration_seconds()
                .map_or_else(|| "unknown length".to_string(), |d| format!("{d:.2}s")),
            policy.as_str()
        );
        Self {
            source,
            policy,
            unlocked: policy == AutoplayPolicy::Allow,
            playing: false,
            position: 0.0,
            last_tick: 0.0,
        }
    }
}

impl Transport for SilentTransport {
    fn play(&mut self, user_gesture: bool) -> Result<(), PlaybackError> {
        if user_gesture {
            self.unlocked = true;
        }
        if !self.unlocked {
            warn!(
                "Playback of '{}' blocked: policy {} needs a user gesture.",
                self.source.name,
                self.policy.as_str()
            );
            return Err(PlaybackError::AutoplayBlocked);
        }
        if !self.playing {
            debug!("Transport play at {:.3}s", self.position);
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        if self.playing {
            debug!("Transport pause at {:.3}s", self.position);
        }
        self.playing = false;
    }

    fn seek_to_start(&mut self) {
        self.position = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn position(&self, now: f64) -> f64 {
        if self.playing {
            self.position + (now - self.last_tick).max(0.0)
        } else {
            self.position
        }
    }

    fn tick(&mut self, now: f64) {
        if self.playing {
            self.position += (now - self.last_tick).max(0.0);
        }
        self.last_tick = now;
    }
}
