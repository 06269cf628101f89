//! Persistent session keys
//!
//! A persistent session key names the backend-side session of one pane
//! independently of any live process handle: `ad.<workspace>.<tab>.<pane>`.
//! Each component keeps `[A-Za-z0-9-]` as is and writes every other UTF-8
//! byte as `_XX` (uppercase hex), so the key only contains `[A-Za-z0-9._-]`
//! and decodes back to the exact ids.

use crate::pane::PaneAddress;

/// Prefix of every persistent session key
pub const KEY_PREFIX: &str = "ad";

fn escape_component(component: &str, out: &mut String) {
    for byte in component.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
}

fn unescape_component(component: &str) -> Option<String> {
    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                let hex = component.get(i + 1..i + 3)?;
                if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
                    return None;
                }
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                decoded.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(decoded).ok()
}

/// Deterministic key for the pane at `address`
pub fn persistent_session_key(address: &PaneAddress) -> String {
    let mut key = String::from(KEY_PREFIX);
    for component in [&address.workspace_id, &address.terminal_tab_id, &address.pane_id] {
        key.push('.');
        escape_component(component, &mut key);
    }
    key
}

/// Decode a key produced by [`persistent_session_key`]
pub fn parse_persistent_session_key(key: &str) -> Option<PaneAddress> {
    let mut parts = key.split('.');
    if parts.next()? != KEY_PREFIX {
        return None;
    }
    let workspace_id = unescape_component(parts.next()?)?;
    let terminal_tab_id = unescape_component(parts.next()?)?;
    let pane_id = unescape_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(PaneAddress::new(workspace_id, terminal_tab_id, pane_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ids_kept_verbatim() {
        let address = PaneAddress::new("ws-1", "tab-2", "pane-3");
        assert_eq!(persistent_session_key(&address), "ad.ws-1.tab-2.pane-3");
    }

    #[test]
    fn test_special_characters_escaped() {
        let address = PaneAddress::new("my.ws", "a_b", "é/x");
        let key = persistent_session_key(&address);
        assert_eq!(key, "ad.my_2Ews.a_5Fb._C3_A9_2Fx");
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c)));
        assert_eq!(parse_persistent_session_key(&key), Some(address));
    }

    #[test]
    fn test_distinct_addresses_never_collide() {
        let a = PaneAddress::new("a.b", "c", "d");
        let b = PaneAddress::new("a", "b.c", "d");
        assert_ne!(persistent_session_key(&a), persistent_session_key(&b));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_persistent_session_key("xx.a.b.c"), None);
        assert_eq!(parse_persistent_session_key("ad.a.b"), None);
        assert_eq!(parse_persistent_session_key("ad.a.b.c.d"), None);
        assert_eq!(parse_persistent_session_key("ad.a_2.b.c"), None);
        assert_eq!(parse_persistent_session_key("ad.a_zz.b.c"), None);
        assert_eq!(parse_persistent_session_key("ad.a b.c.d"), None);
        // Lowercase hex is never produced
        assert_eq!(parse_persistent_session_key("ad.a_2e.b.c"), None);
        // Invalid UTF-8
        assert_eq!(parse_persistent_session_key("ad._FF.b.c"), None);
    }

    #[test]
    fn test_uuid_ids_round_trip() {
        let address = PaneAddress::new(
            uuid::Uuid::new_v4().to_string(),
            uuid::Uuid::new_v4().to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        let key = persistent_session_key(&address);
        assert_eq!(parse_persistent_session_key(&key), Some(address));
    }
}
