// src/watch/protocol.rs

//! Text codec for the long-poll listener endpoint.
//!
//! Request payload (before percent-encoding), one record per watched entry:
//!
//! ```text
//! data_id 0x02 group 0x02 fingerprint [0x02 tenant] 0x01
//! ```
//!
//! The tenant field is omitted when empty and an absent fingerprint is sent
//! as the empty string. The response uses the same delimiters but carries no
//! fingerprint: `data_id 0x02 group [0x02 ... 0x02 tenant] 0x01`.

use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use crate::errors::{Result, SkillwatchError};
use crate::watch::fingerprint::wire_form;
use crate::watch::resolver::ChangeNotification;
use crate::watch::watch_set::WatchSet;

/// Separates the fields of one entry.
pub const FIELD_SEPARATOR: char = '\u{2}';

/// Separates entries from each other.
pub const ENTRY_SEPARATOR: char = '\u{1}';

/// Serialize the watch set into the delimiter format, without encoding.
pub fn serialize_watch_set(watch_set: &WatchSet) -> String {
    let mut out = String::new();
    for (key, fp) in watch_set.iter() {
        out.push_str(&key.data_id);
        out.push(FIELD_SEPARATOR);
        out.push_str(&key.group);
        out.push(FIELD_SEPARATOR);
        out.push_str(wire_form(fp));
        if !key.tenant.is_empty() {
            out.push(FIELD_SEPARATOR);
            out.push_str(&key.tenant);
        }
        out.push(ENTRY_SEPARATOR);
    }
    out
}

/// Serialize and percent-encode the watch set (query-string rules, space as
/// `+`). This is the value of the `Listening-Configs` form field.
pub fn encode_listening_configs(watch_set: &WatchSet) -> String {
    let raw = serialize_watch_set(watch_set);
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Decode a non-empty listener response into change notifications.
///
/// Lines with fewer than two fields are discarded. The tenant is only read
/// from a fourth field.
pub fn decode_changed_configs(body: &str) -> Result<Vec<ChangeNotification>> {
    let trimmed = body.trim();
    check_escapes(trimmed)?;
    let plus_as_space = trimmed.replace('+', " ");
    let decoded = percent_decode_str(&plus_as_space)
        .decode_utf8()
        .map_err(|e| SkillwatchError::MalformedResponse(format!("listener body: {e}")))?;

    Ok(parse_changed_lines(&decoded))
}

/// Every `%` must introduce two hex digits.
fn check_escapes(encoded: &str) -> Result<()> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(SkillwatchError::MalformedResponse(format!(
                    "invalid escape at byte {i} of listener body"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Split already-decoded response text on the entry and field delimiters.
pub fn parse_changed_lines(decoded: &str) -> Vec<ChangeNotification> {
    decoded
        .split(ENTRY_SEPARATOR)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            if fields.len() < 2 {
                return None;
            }
            let tenant = fields.get(3).copied().unwrap_or_default();
            Some(ChangeNotification::new(fields[0], fields[1], tenant))
        })
        .collect()
}
