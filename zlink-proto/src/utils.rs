//! Helpers for building and parsing ZMP handshake control-frame bodies
//! (HELLO/READY/ERROR) — `spec.md` §4.5 and Part C of `SPEC_FULL.md`.
//!
//! Property dictionaries use the same flat `(1-byte name length, name
//! bytes, 4-byte BE value length, value bytes)` tuple encoding for both
//! HELLO and READY bodies.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::ZmpError;

/// Build a command body: `1-byte name length, name, then property tuples`.
fn build_command(name: &str, properties: &[(&str, &[u8])]) -> Bytes {
    let mut body = BytesMut::new();
    body.put_u8(name.len() as u8);
    body.extend_from_slice(name.as_bytes());
    for (key, value) in properties {
        put_property(&mut body, key, value);
    }
    body.freeze()
}

/// Build a HELLO command body.
///
/// Mandatory: `Socket-Type`. `Identity` is present only for DEALER/ROUTER
/// (spec.md §4.5). `extra` carries any additional user/mechanism metadata
/// (e.g. PLAIN `Username`/`Password`).
pub fn build_hello(socket_type: &str, identity: Option<&[u8]>, extra: &[(&str, &[u8])]) -> Bytes {
    let mut properties: Vec<(&str, &[u8])> = vec![("Socket-Type", socket_type.as_bytes())];
    if let Some(id) = identity {
        properties.push(("Identity", id));
    }
    properties.extend_from_slice(extra);
    build_command("HELLO", &properties)
}

/// Build a READY command body, echoing final negotiated metadata.
pub fn build_ready(socket_type: &str, identity: Option<&[u8]>, extra: &[(&str, &[u8])]) -> Bytes {
    let mut properties: Vec<(&str, &[u8])> = vec![("Socket-Type", socket_type.as_bytes())];
    if let Some(id) = identity {
        properties.push(("Identity", id));
    }
    properties.extend_from_slice(extra);
    build_command("READY", &properties)
}

/// Build an ERROR command body.
///
/// Framed as a named command like HELLO/READY (`Code`/`Reason` properties)
/// rather than the bare `uint8 code ∥ utf8 reason` spec.md §4.5 describes
/// for the logical payload, so a receiver can tell HELLO/READY/ERROR apart
/// by command name alone — the three share the same `CONTROL` flag and
/// spec.md does not allocate a separate discriminant bit for them. See
/// `DESIGN.md` for the resolution.
pub fn build_error(code: u8, reason: &str) -> Bytes {
    build_command("ERROR", &[("Code", &[code]), ("Reason", reason.as_bytes())])
}

/// Parse an ERROR command body built by [`build_error`].
pub fn parse_error_command(parsed: &ParsedCommand) -> Result<(u8, String), ZmpError> {
    let code = parsed
        .get("Code")
        .and_then(|b| b.first().copied())
        .ok_or(ZmpError::MalformedMetadata)?;
    let reason = parsed
        .get("Reason")
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    Ok((code, reason))
}

/// A parsed HELLO/READY command: the command name plus its property dict.
pub struct ParsedCommand {
    pub name: String,
    pub properties: Vec<(String, Bytes)>,
}

impl ParsedCommand {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// Parse a HELLO/READY command body into its name and property dictionary.
pub fn parse_command(body: &Bytes) -> Result<ParsedCommand, ZmpError> {
    if body.is_empty() {
        return Err(ZmpError::MalformedMetadata);
    }

    let name_len = body[0] as usize;
    if 1 + name_len > body.len() {
        return Err(ZmpError::MalformedMetadata);
    }
    let name = std::str::from_utf8(&body[1..1 + name_len])
        .map_err(|_| ZmpError::MalformedMetadata)?
        .to_string();

    let mut offset = 1 + name_len;
    let mut properties = Vec::new();

    while offset < body.len() {
        if offset + 1 > body.len() {
            return Err(ZmpError::MalformedMetadata);
        }
        let key_len = body[offset] as usize;
        offset += 1;
        if offset + key_len > body.len() {
            return Err(ZmpError::MalformedMetadata);
        }
        let key = std::str::from_utf8(&body[offset..offset + key_len])
            .map_err(|_| ZmpError::MalformedMetadata)?
            .to_string();
        offset += key_len;

        if offset + 4 > body.len() {
            return Err(ZmpError::MalformedMetadata);
        }
        let value_len = u32::from_be_bytes([
            body[offset],
            body[offset + 1],
            body[offset + 2],
            body[offset + 3],
        ]) as usize;
        offset += 4;
        if offset + value_len > body.len() {
            return Err(ZmpError::MalformedMetadata);
        }
        let value = body.slice(offset..offset + value_len);
        offset += value_len;

        properties.push((key, value));
    }

    Ok(ParsedCommand { name, properties })
}

#[inline]
fn put_property(dst: &mut BytesMut, name: &str, value: &[u8]) {
    let name_bytes = name.as_bytes();
    dst.put_u8(name_bytes.len() as u8);
    dst.extend_from_slice(name_bytes);
    dst.put_u32(value.len() as u32);
    dst.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrip() {
        let body = build_hello("DEALER", Some(b"peer-1"), &[]);
        let parsed = parse_command(&body).unwrap();
        assert_eq!(parsed.name, "HELLO");
        assert_eq!(parsed.get("Socket-Type").unwrap(), &Bytes::from_static(b"DEALER"));
        assert_eq!(parsed.get("Identity").unwrap(), &Bytes::from_static(b"peer-1"));
    }

    #[test]
    fn error_roundtrip() {
        let body = build_error(2, "mechanism mismatch");
        let parsed = parse_command(&body).unwrap();
        assert_eq!(parsed.name, "ERROR");
        let (code, reason) = parse_error_command(&parsed).unwrap();
        assert_eq!(code, 2);
        assert_eq!(reason, "mechanism mismatch");
    }
}
