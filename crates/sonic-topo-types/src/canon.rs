//! String canonicalization for identity keys.

use crate::mac::MacAddress;

/// Lowercased, trimmed hostname without a trailing root dot.
pub fn canonical_hostname(raw: &str) -> String {
    raw.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Separator-free lowercase hex, e.g. IS-IS system IDs reported as
/// `0000.0000.0001`, `00:00:00:00:00:01` or `0x000000000001`.
///
/// Returns `None` when anything other than hex digits and separators remains.
pub fn canonical_hex_token(raw: &str) -> Option<String> {
    let lower = raw.trim().to_ascii_lowercase();
    let body = lower.strip_prefix("0x").unwrap_or(&lower);
    let token: String = body
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
        .collect();
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(token)
}

/// Canonical chassis token: a MAC when the value decodes to one, otherwise a
/// hex token, otherwise the lowercased text.
pub fn canonical_chassis(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Ok(mac) = trimmed.parse::<MacAddress>() {
        return mac.to_string();
    }
    canonical_hex_token(trimmed).unwrap_or_else(|| trimmed.to_ascii_lowercase())
}

/// Length-prefixed join (`3:abc|0:|2:xy`) so that no two part lists collide
/// after concatenation.
pub fn composite_key(parts: &[&str]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push('|');
        }
        key.push_str(&part.len().to_string());
        key.push(':');
        key.push_str(part);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonical_hostname() {
        assert_eq!(canonical_hostname(" Leaf-01.Example.NET. "), "leaf-01.example.net");
        assert_eq!(canonical_hostname(""), "");
    }

    #[test]
    fn test_canonical_hex_token() {
        assert_eq!(canonical_hex_token("0000.0000.00AB").as_deref(), Some("0000000000ab"));
        assert_eq!(canonical_hex_token("0x0102").as_deref(), Some("0102"));
        assert_eq!(canonical_hex_token("01-02 03").as_deref(), Some("010203"));
        assert_eq!(canonical_hex_token("leaf01"), None);
        assert_eq!(canonical_hex_token(" "), None);
    }

    #[test]
    fn test_canonical_chassis() {
        assert_eq!(canonical_chassis("00-11-22-33-44-55"), "00:11:22:33:44:55");
        assert_eq!(canonical_chassis("0011.2233.4455"), "00:11:22:33:44:55");
        assert_eq!(canonical_chassis("ABCDEF01"), "abcdef01");
        assert_eq!(canonical_chassis("FOC1234X0AB"), "foc1234x0ab");
        assert_eq!(canonical_chassis("  "), "");
    }

    #[test]
    fn test_composite_key_is_unambiguous() {
        assert_eq!(composite_key(&["ab", "", "c"]), "2:ab|0:|1:c");
        assert_ne!(composite_key(&["a|1:b", "c"]), composite_key(&["a", "b|1:c"]));
    }
}
