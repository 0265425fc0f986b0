//! Server-reported session information.
//!
//! Every MSG frame carries `key=value` parameters: telemetry, configuration
//! echoes and, occasionally, the reason the server is about to drop the
//! session. [`Info`] accumulates them for the life of a session and detects
//! the terminal conditions.

use std::collections::BTreeMap;

use kiwisdr_core::Error;

use crate::codec::{self, LOAD_CFG_KEY};

/// Present when every receiver channel is in use.
pub const TOO_BUSY_KEY: &str = "too_busy";

/// Set to `1` when the password was rejected.
pub const BAD_PASSWORD_KEY: &str = "badp";

/// Present when the server is down for maintenance.
pub const SERVER_DOWN_KEY: &str = "down";

/// Cumulative string-to-string table built from MSG frames.
///
/// Entries are only ever added or overwritten (last write wins); nothing is
/// removed during a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    entries: BTreeMap<String, String>,
}

impl Info {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the parameters of one MSG frame.
    ///
    /// `load_cfg` values are expanded into their JSON members; a value that
    /// fails to decode is skipped and leaves the table unchanged.
    pub fn apply(&mut self, params: &[(String, String)]) {
        for (key, value) in params {
            if key == LOAD_CFG_KEY {
                match codec::decode_load_cfg(value) {
                    Ok(entries) => self.entries.extend(entries),
                    Err(e) => tracing::trace!(error = %e, "Ignoring undecodable load_cfg"),
                }
            } else {
                self.entries.insert(key.clone(), value.clone());
            }
        }
    }

    /// The terminal condition reported by the server, if any.
    ///
    /// Checked in order: too busy, bad password, server down.
    pub fn terminal_error(&self) -> Option<Error> {
        if self.entries.contains_key(TOO_BUSY_KEY) {
            return Some(Error::ServerTooBusy);
        }
        if self.get(BAD_PASSWORD_KEY) == Some("1") {
            return Some(Error::BadPassword);
        }
        if self.entries.contains_key(SERVER_DOWN_KEY) {
            return Some(Error::ServerDown);
        }
        None
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_msg;

    fn applied(payloads: &[&[u8]]) -> Info {
        let mut info = Info::new();
        for payload in payloads {
            info.apply(&parse_msg(payload));
        }
        info
    }

    #[test]
    fn plain_pairs_are_stored() {
        let info = applied(&[b"audio_rate=12000 center_freq=15000000"]);
        assert_eq!(info.get("audio_rate"), Some("12000"));
        assert_eq!(info.get("center_freq"), Some("15000000"));
        assert_eq!(info.len(), 2);
        assert!(info.terminal_error().is_none());
    }

    #[test]
    fn bare_key_stores_empty_value() {
        let info = applied(&[b"client_public_ip"]);
        assert_eq!(info.get("client_public_ip"), Some(""));
    }

    #[test]
    fn last_write_wins() {
        let info = applied(&[b"rx_chans=4", b"rx_chans=8"]);
        assert_eq!(info.get("rx_chans"), Some("8"));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let payload: &[u8] = b"a=1 b=2 a=3 load_cfg=%7B%22s%22%3A%7B%22k%22%3A%22v%22%7D%7D";
        let once = applied(&[payload]);
        let twice = applied(&[payload, payload]);
        assert_eq!(once, twice);
        assert_eq!(once.get("a"), Some("3"));
        assert_eq!(once.get("load_cfg.s.k"), Some("v"));
    }

    #[test]
    fn load_cfg_scalar_goes_to_top_level() {
        let info = applied(&[b"load_cfg=%7B%22a%22%3A1%7D"]);
        assert_eq!(info.get("a"), Some("1"));
        assert_eq!(info.get("load_cfg"), None);
    }

    #[test]
    fn bad_load_cfg_is_ignored() {
        let info = applied(&[b"load_cfg=%7Bbroken x=1"]);
        assert_eq!(info.get("x"), Some("1"));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn too_busy_is_terminal() {
        let info = applied(&[b"too_busy=1"]);
        assert!(matches!(info.terminal_error(), Some(Error::ServerTooBusy)));

        let info = applied(&[b"too_busy"]);
        assert!(matches!(info.terminal_error(), Some(Error::ServerTooBusy)));
    }

    #[test]
    fn bad_password_needs_value_one() {
        let info = applied(&[b"badp=0"]);
        assert!(info.terminal_error().is_none());

        let info = applied(&[b"badp=1"]);
        assert!(matches!(info.terminal_error(), Some(Error::BadPassword)));
    }

    #[test]
    fn server_down_is_terminal() {
        let info = applied(&[b"down"]);
        assert!(matches!(info.terminal_error(), Some(Error::ServerDown)));
    }

    #[test]
    fn too_busy_takes_precedence() {
        let info = applied(&[b"down=1 badp=1 too_busy=1"]);
        assert!(matches!(info.terminal_error(), Some(Error::ServerTooBusy)));
    }

    #[test]
    fn iteration_is_key_ordered() {
        let info = applied(&[b"z=1 a=2 m=3"]);
        let keys: Vec<&str> = info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "m", "z"]);
    }
}
