//! KiwiSDR frame routing and command encoding.
//!
//! The KiwiSDR speaks a tagged message protocol over a WebSocket. Commands
//! flow from client to server as text messages; the server answers with
//! frames whose first three bytes name their type.
//!
//! # Formats
//!
//! ```text
//! Command:  SET <key>=<value> <key>=<value> ...
//! Frame:    <tag:3><payload>
//! MSG:      MSG<key>=<value> <key>=<value> ...
//! SND:      SND<flag:1><sequence:4 LE><smeter:2 BE><samples>
//! ```
//!
//! All functions in this module are pure -- no I/O is performed.

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;
use url::form_urlencoded;

use kiwisdr_core::{ConnectionKind, Error, Frame, Result, SessionConfig, TAG_LEN, Tag, Tuning};

/// Reserved MSG key whose value is percent-encoded JSON.
pub const LOAD_CFG_KEY: &str = "load_cfg";

/// Default KiwiSDR HTTP/WebSocket port.
pub const DEFAULT_PORT: u16 = 8073;

// ---------------------------------------------------------------------------
// Connection addressing
// ---------------------------------------------------------------------------

/// Path of the WebSocket endpoint for one session: `/<session-id>/<kind>`.
pub fn connection_path(session_id: i64, kind: ConnectionKind) -> String {
    format!("/{}/{}", session_id, kind.path_segment())
}

/// Append the default port to a server address that does not carry one.
pub fn normalize_server_host(host: &str) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, DEFAULT_PORT)
    }
}

/// Full WebSocket URL for one session.
pub fn session_url(server_host: &str, session_id: i64, kind: ConnectionKind) -> Result<Url> {
    let raw = format!("ws://{}{}", server_host, connection_path(session_id, kind));
    Url::parse(&raw)
        .map_err(|e| Error::InvalidParameter(format!("bad server address {server_host:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Frame routing
// ---------------------------------------------------------------------------

/// Split a raw inbound message into its tag and payload.
///
/// Fails with [`Error::FrameTooShort`] when fewer than three bytes are
/// present. The payload shares the raw buffer.
pub fn split_frame(raw: Bytes) -> Result<Frame> {
    if raw.len() < TAG_LEN {
        return Err(Error::FrameTooShort { len: raw.len() });
    }
    let tag = Tag::new([raw[0], raw[1], raw[2]]);
    Ok(Frame::new(tag, raw.slice(TAG_LEN..)))
}

/// Parse an MSG payload into `(key, value)` pairs, in order.
///
/// Tokens are separated by single spaces; empty tokens are skipped. Each
/// token is split once on `=`. A token without `=` yields the whole token as
/// key with an empty value.
pub fn parse_msg(payload: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(payload);
    text.split(' ')
        .filter(|token| !token.is_empty())
        .map(|token| match token.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (token.to_string(), String::new()),
        })
        .collect()
}

/// Decode a `load_cfg` value into Info entries.
///
/// The value is percent-encoded JSON holding an object. Scalar members map
/// to `<key> = <text>`; object members are flattened one level as
/// `load_cfg.<outer>.<inner> = <text>`.
pub fn decode_load_cfg(encoded: &str) -> Result<Vec<(String, String)>> {
    let json = query_unescape(encoded)?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| Error::Decode(format!("load_cfg is not valid JSON: {e}")))?;
    let Value::Object(members) = value else {
        return Err(Error::Decode("load_cfg is not a JSON object".into()));
    };

    let mut entries = Vec::new();
    for (key, member) in members {
        match member {
            Value::Object(section) => {
                for (inner, v) in section {
                    entries.push((format!("{LOAD_CFG_KEY}.{key}.{inner}"), value_text(&v)));
                }
            }
            other => entries.push((key, value_text(&other))),
        }
    }
    Ok(entries)
}

/// Text form of a JSON value as stored in the Info table.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Percent encoding
// ---------------------------------------------------------------------------

/// Escape a value for use inside a `SET` command (query-string rules, space
/// becomes `+`).
pub fn query_escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse [`query_escape`]: `+` becomes space, `%XX` sequences are decoded.
pub fn query_unescape(value: &str) -> Result<String> {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| Error::Decode(format!("percent-decoded value is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Command builders
//
// Each builder returns one complete text command.
// ---------------------------------------------------------------------------

/// Audio rate negotiation.
pub const CMD_AUDIO_RATE: &str = "SET AR OK in=12000 out=44100";

/// Squelch off.
pub const CMD_SQUELCH_OFF: &str = "SET squelch=0 max=0";

/// Automatic notch filter off.
pub const CMD_AUTONOTCH_OFF: &str = "SET lms_autonotch=0";

/// Signal generator attenuation off.
pub const CMD_GEN_ATTN_OFF: &str = "SET genattn=0";

/// Signal generator off.
pub const CMD_GEN_OFF: &str = "SET gen=0 mix=-1";

/// Disable the server's idle-user timeout.
pub const CMD_INACTIVITY_OVERRIDE: &str = "SET OVERRIDE inactivity_timeout=0";

/// Keepalive sent once per second while streaming.
pub const CMD_KEEPALIVE: &str = "SET keepalive";

/// Authentication: `SET auth t=kiwi p=<password>`.
pub fn cmd_auth(password: &str) -> String {
    format!("SET auth t=kiwi p={}", query_escape(password))
}

/// Identity shown in the server's user list: `SET ident_user=<identity>`.
pub fn cmd_ident(identity: &str) -> String {
    format!("SET ident_user={}", query_escape(identity))
}

/// Tune the receiver.
///
/// Example output: `"SET mod=cw low_cut=300 high_cut=700 freq=7029.500"`
pub fn cmd_tune(tuning: &Tuning) -> String {
    format!(
        "SET mod={} low_cut={} high_cut={} freq={:.3}",
        tuning.mode.name,
        tuning.mode.low_cut,
        tuning.mode.high_cut,
        tuning.tuned_khz()
    )
}

/// AGC and manual gain.
pub fn cmd_agc(agc: bool, manual_gain: u32) -> String {
    format!(
        "SET agc={} hang=0 thresh=-100 slope=6 decay=1000 manGain={}",
        u8::from(agc),
        manual_gain
    )
}

/// Request compressed (ADPCM) or uncompressed audio.
pub fn cmd_compression(enabled: bool) -> String {
    format!("SET compression={}", u8::from(enabled))
}

/// Every command of the login handshake, in the order they are sent.
///
/// Authentication is always first. The tuning command is only present when
/// the tuning carries a positive frequency.
pub fn handshake_commands(config: &SessionConfig, tuning: &Tuning) -> Vec<String> {
    let mut commands = vec![
        cmd_auth(&config.password),
        CMD_AUDIO_RATE.to_string(),
        CMD_SQUELCH_OFF.to_string(),
        CMD_AUTONOTCH_OFF.to_string(),
        CMD_GEN_ATTN_OFF.to_string(),
        CMD_GEN_OFF.to_string(),
        cmd_ident(&config.identity),
    ];
    if tuning.is_tuned() {
        commands.push(cmd_tune(tuning));
    }
    commands.push(cmd_agc(config.agc, config.effective_manual_gain()));
    commands.push(cmd_compression(config.compression));
    commands.push(CMD_INACTIVITY_OVERRIDE.to_string());
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiwisdr_core::Mode;

    // -- Addressing --

    #[test]
    fn test_connection_path() {
        assert_eq!(connection_path(1700000000, ConnectionKind::Sound), "/1700000000/SND");
        assert_eq!(connection_path(42, ConnectionKind::Waterfall), "/42/W_F");
    }

    #[test]
    fn test_normalize_server_host() {
        assert_eq!(normalize_server_host("sybil.yak.net"), "sybil.yak.net:8073");
        assert_eq!(normalize_server_host("10.0.0.5:8074"), "10.0.0.5:8074");
    }

    #[test]
    fn test_session_url() {
        let url = session_url("127.0.0.1:8073", 7, ConnectionKind::Sound).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8073/7/SND");
    }

    #[test]
    fn test_session_url_rejects_garbage() {
        let result = session_url("bad host:xx", 7, ConnectionKind::Sound);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    // -- Frame splitting --

    #[test]
    fn test_split_frame() {
        let frame = split_frame(Bytes::from_static(b"MSGfoo=1")).unwrap();
        assert_eq!(frame.tag, Tag::MSG);
        assert_eq!(&frame.payload[..], b"foo=1");
    }

    #[test]
    fn test_split_frame_tag_only() {
        let frame = split_frame(Bytes::from_static(b"SND")).unwrap();
        assert_eq!(frame.tag, Tag::SND);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_split_frame_too_short() {
        for raw in [&b""[..], &b"M"[..], &b"MS"[..]] {
            let result = split_frame(Bytes::copy_from_slice(raw));
            match result {
                Err(Error::FrameTooShort { len }) => assert_eq!(len, raw.len()),
                other => panic!("expected FrameTooShort, got {:?}", other),
            }
        }
    }

    // -- MSG parsing --

    #[test]
    fn test_parse_msg_pairs() {
        let params = parse_msg(b"audio_rate=12000 sample_rate=12001.135");
        assert_eq!(
            params,
            vec![
                ("audio_rate".to_string(), "12000".to_string()),
                ("sample_rate".to_string(), "12001.135".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_msg_skips_empty_tokens() {
        let params = parse_msg(b"  a=1   b=2 ");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], ("a".to_string(), "1".to_string()));
        assert_eq!(params[1], ("b".to_string(), "2".to_string()));
    }

    #[test]
    fn test_parse_msg_bare_key() {
        let params = parse_msg(b"too_busy");
        assert_eq!(params, vec![("too_busy".to_string(), String::new())]);
    }

    #[test]
    fn test_parse_msg_splits_once() {
        let params = parse_msg(b"expr=a=b");
        assert_eq!(params, vec![("expr".to_string(), "a=b".to_string())]);
    }

    #[test]
    fn test_parse_msg_empty_value() {
        let params = parse_msg(b"down=");
        assert_eq!(params, vec![("down".to_string(), String::new())]);
    }

    #[test]
    fn test_parse_msg_empty_payload() {
        assert!(parse_msg(b"").is_empty());
    }

    // -- load_cfg --

    #[test]
    fn test_decode_load_cfg_scalar() {
        let entries = decode_load_cfg("%7B%22a%22%3A1%7D").unwrap();
        assert_eq!(entries, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_decode_load_cfg_nested() {
        let json = r#"{"rx_name":"Sybil","init":{"freq":7020,"mode":"cw"},"ok":true}"#;
        let encoded = query_escape(json);
        let mut entries = decode_load_cfg(&encoded).unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                ("load_cfg.init.freq".to_string(), "7020".to_string()),
                ("load_cfg.init.mode".to_string(), "cw".to_string()),
                ("ok".to_string(), "true".to_string()),
                ("rx_name".to_string(), "Sybil".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_load_cfg_plus_is_space() {
        let entries = decode_load_cfg("%7B%22name%22%3A%22my+kiwi%22%7D").unwrap();
        assert_eq!(entries, vec![("name".to_string(), "my kiwi".to_string())]);
    }

    #[test]
    fn test_decode_load_cfg_invalid_json() {
        assert!(decode_load_cfg("%7Bnot-json").is_err());
    }

    #[test]
    fn test_decode_load_cfg_not_object() {
        assert!(decode_load_cfg("%5B1%2C2%5D").is_err());
    }

    // -- Escaping --

    #[test]
    fn test_query_escape() {
        assert_eq!(query_escape("AudioClient(rust)"), "AudioClient%28rust%29");
        assert_eq!(query_escape("a b&c"), "a+b%26c");
        assert_eq!(query_escape(""), "");
    }

    #[test]
    fn test_query_unescape() {
        assert_eq!(query_unescape("a+b%26c").unwrap(), "a b&c");
    }

    // -- Commands --

    #[test]
    fn test_cmd_auth() {
        assert_eq!(cmd_auth(""), "SET auth t=kiwi p=");
        assert_eq!(cmd_auth("s3cret pw"), "SET auth t=kiwi p=s3cret+pw");
    }

    #[test]
    fn test_cmd_tune() {
        let tuning = Tuning::new(740_000, Mode::AM);
        assert_eq!(
            cmd_tune(&tuning),
            "SET mod=am low_cut=-4900 high_cut=4900 freq=740.000"
        );

        let tuning = Tuning::new(7_030_000, Mode::CW);
        assert_eq!(
            cmd_tune(&tuning),
            "SET mod=cw low_cut=300 high_cut=700 freq=7029.500"
        );
    }

    #[test]
    fn test_cmd_agc() {
        assert_eq!(
            cmd_agc(true, 50),
            "SET agc=1 hang=0 thresh=-100 slope=6 decay=1000 manGain=50"
        );
        assert_eq!(
            cmd_agc(false, 80),
            "SET agc=0 hang=0 thresh=-100 slope=6 decay=1000 manGain=80"
        );
    }

    #[test]
    fn test_cmd_compression() {
        assert_eq!(cmd_compression(true), "SET compression=1");
        assert_eq!(cmd_compression(false), "SET compression=0");
    }

    #[test]
    fn test_handshake_order() {
        let config = SessionConfig {
            password: "pw".into(),
            identity: "tester".into(),
            ..SessionConfig::default()
        };
        let tuning = Tuning::new(14_074_000, Mode::USB);
        let commands = handshake_commands(&config, &tuning);
        assert_eq!(
            commands,
            vec![
                "SET auth t=kiwi p=pw",
                "SET AR OK in=12000 out=44100",
                "SET squelch=0 max=0",
                "SET lms_autonotch=0",
                "SET genattn=0",
                "SET gen=0 mix=-1",
                "SET ident_user=tester",
                "SET mod=usb low_cut=300 high_cut=2700 freq=14074.000",
                "SET agc=1 hang=0 thresh=-100 slope=6 decay=1000 manGain=50",
                "SET compression=0",
                "SET OVERRIDE inactivity_timeout=0",
            ]
        );
    }

    #[test]
    fn test_handshake_untuned_skips_tune() {
        let commands = handshake_commands(&SessionConfig::default(), &Tuning::default());
        assert_eq!(commands.len(), 10);
        assert!(commands.iter().all(|c| !c.starts_with("SET mod=")));
        assert!(commands[0].starts_with("SET auth"));
    }
}
