use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use thiserror::Error;

use crate::game::chart::MAX_COLUMNS;

pub const DEFAULT_KEYS: [&str; MAX_COLUMNS] = ["d", "f", "j", "k", "s", "l"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeymapError {
    #[error("keymap needs {expected} keys, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("key '{0}' is bound to more than one lane")]
    DuplicateKey(String),
}

/// Raw key event as delivered by the host, stamped with wall time.
#[derive(Clone, Debug)]
pub struct InputEvent {
    pub key: String,
    pub pressed: bool,
    // OS auto-repeat; never a judgment event.
    pub repeat: bool,
    pub timestamp: f64,
}

impl InputEvent {
    pub fn press(key: impl Into<String>, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            pressed: true,
            repeat: false,
            timestamp,
        }
    }
}

/// One key identifier per lane. Identifiers are compared case-insensitively.
#[derive(Clone, Debug)]
pub struct Keymap {
    keys: SmallVec<[String; MAX_COLUMNS]>,
    lanes: FxHashMap<String, usize>,
}

#[inline(always)]
fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

impl Keymap {
    /// Binds `keys[i]` to lane `i`. Keys must be distinct.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, KeymapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self {
            keys: SmallVec::new(),
            lanes: FxHashMap::default(),
        };
        for key in keys {
            let key = normalize_key(key.as_ref());
            if out.lanes.insert(key.clone(), out.keys.len()).is_some() {
                return Err(KeymapError::DuplicateKey(key));
            }
            out.keys.push(key);
        }
        Ok(out)
    }

    /// The first `columns` default keys.
    pub fn default_for(columns: usize) -> Self {
        let mut out = Self {
            keys: SmallVec::new(),
            lanes: FxHashMap::default(),
        };
        for (lane, key) in DEFAULT_KEYS.iter().take(columns).enumerate() {
            out.lanes.insert((*key).to_string(), lane);
            out.keys.push((*key).to_string());
        }
        out
    }

    /// Parses a comma-separated key list for `columns` lanes.
    ///
    /// Extra keys are dropped. A list with fewer than `columns` keys is
    /// replaced by the default bindings as a whole.
    pub fn parse(text: &str, columns: usize) -> Result<Self, KeymapError> {
        let keys: SmallVec<[&str; MAX_COLUMNS]> = text
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .take(columns)
            .collect();
        if keys.len() < columns {
            if columns > DEFAULT_KEYS.len() {
                return Err(KeymapError::WrongLength {
                    expected: columns,
                    actual: keys.len(),
                });
            }
            return Ok(Self::default_for(columns));
        }
        Self::from_keys(keys)
    }

    #[inline(always)]
    pub fn lane_for_key(&self, key: &str) -> Option<usize> {
        self.lanes.get(&normalize_key(key)).copied()
    }

    #[inline(always)]
    pub fn key_for_lane(&self, lane: usize) -> Option<&str> {
        self.keys.get(lane).map(String::as_str)
    }

    pub fn to_ini_value(&self) -> String {
        self.keys.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::{Keymap, KeymapError};

    #[test]
    fn parse_truncates_extra_keys() {
        let km = Keymap::parse("a, s ,d,f,g", 3).expect("valid keymap");
        assert_eq!(km.to_ini_value(), "a,s,d");
        assert_eq!(km.key_for_lane(3), None);
        assert_eq!(km.lane_for_key("S"), Some(1));
        assert_eq!(km.lane_for_key("f"), None);
    }

    #[test]
    fn short_list_falls_back_to_defaults() {
        let km = Keymap::parse("q,w", 4).expect("defaults apply");
        assert_eq!(km.to_ini_value(), "d,f,j,k");
        assert_eq!(km.lane_for_key("q"), None);
        assert_eq!(km.lane_for_key("k"), Some(3));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = Keymap::parse("d,f,D", 3).expect_err("duplicate key");
        assert_eq!(err, KeymapError::DuplicateKey("d".to_string()));
    }

    #[test]
    fn six_default_keys_cover_max_columns() {
        let km = Keymap::default_for(6);
        assert_eq!(km.key_for_lane(4), Some("s"));
        assert_eq!(km.key_for_lane(5), Some("l"));
        assert_eq!(km.key_for_lane(6), None);
    }
}
