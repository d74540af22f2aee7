//! Generic Protobuf-as-map decoding.
//!
//! No concrete `.proto` schema ships with this system — only a method name
//! to request/response *type name* table (see [`crate::descriptor`]). Message
//! bodies are therefore decoded structurally: walk the wire format and
//! collect `(field_id, value)` pairs into a [`LiqiValue`], the same way the
//! reference implementation's `_from_protobuf`/`_to_protobuf` do. Only
//! wire types 0 (varint) and 2 (length-delimited) are understood; every
//! real Liqi message is built from these two.

use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::varint::{read_varint, write_varint};

/// One decoded field value. Length-delimited fields are kept as raw bytes;
/// callers that know a field holds a string or a nested message convert on
/// demand with [`LiqiField::as_str`] / [`parse_fields`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiqiField {
    Varint(u64),
    Bytes(Vec<u8>),
}

impl LiqiField {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiqiField::Bytes(b) => std::str::from_utf8(b).ok(),
            LiqiField::Varint(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            LiqiField::Bytes(b) => Some(b),
            LiqiField::Varint(_) => None,
        }
    }

    pub fn as_varint(&self) -> Option<u64> {
        match self {
            LiqiField::Varint(v) => Some(*v),
            LiqiField::Bytes(_) => None,
        }
    }
}

/// A decoded message body: field id -> repeated occurrences (Protobuf
/// allows the same field id to repeat).
pub type LiqiValue = BTreeMap<u32, Vec<LiqiField>>;

/// Walks a length-delimited Protobuf message and collects every field.
/// Unknown wire types (other than 0 and 2) are rejected, matching the
/// reference decoder's behavior — this system never emits them.
pub fn decode_fields(buf: &[u8]) -> Result<LiqiValue, CodecError> {
    let mut fields: LiqiValue = BTreeMap::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        let tag = read_varint(buf, &mut pos)?;
        let field_id = (tag >> 3) as u32;
        let wire_type = tag & 0x7;
        let value = match wire_type {
            0 => LiqiField::Varint(read_varint(buf, &mut pos)?),
            2 => {
                let len = read_varint(buf, &mut pos)? as usize;
                let end = pos
                    .checked_add(len)
                    .filter(|&e| e <= buf.len())
                    .ok_or(CodecError::Truncated)?;
                let bytes = buf[pos..end].to_vec();
                pos = end;
                LiqiField::Bytes(bytes)
            }
            other => return Err(CodecError::UnsupportedWireType(other)),
        };
        fields.entry(field_id).or_default().push(value);
    }
    Ok(fields)
}

/// Inverse of [`decode_fields`]: serializes fields back to wire bytes in
/// ascending field-id order. Round-tripping `decode_fields` then
/// `encode_fields` is semantics-preserving, not necessarily byte-identical
/// to an arbitrary third-party encoder's output (field order / varint
/// minimal-length ambiguity aside, this implementation always emits the
/// canonical minimal form).
pub fn encode_fields(fields: &LiqiValue) -> Vec<u8> {
    let mut out = Vec::new();
    for (&field_id, values) in fields {
        for value in values {
            match value {
                LiqiField::Varint(v) => {
                    write_varint(((field_id as u64) << 3) | 0, &mut out);
                    write_varint(*v, &mut out);
                }
                LiqiField::Bytes(b) => {
                    write_varint(((field_id as u64) << 3) | 2, &mut out);
                    write_varint(b.len() as u64, &mut out);
                    out.extend_from_slice(b);
                }
            }
        }
    }
    out
}

pub fn single_str(fields: &LiqiValue, field_id: u32) -> Option<String> {
    fields
        .get(&field_id)
        .and_then(|v| v.first())
        .and_then(LiqiField::as_str)
        .map(str::to_owned)
}

pub fn single_bytes(fields: &LiqiValue, field_id: u32) -> Option<Vec<u8>> {
    fields
        .get(&field_id)
        .and_then(|v| v.first())
        .and_then(LiqiField::as_bytes)
        .map(|b| b.to_vec())
}

pub fn set_str(fields: &mut LiqiValue, field_id: u32, value: &str) {
    fields.insert(field_id, vec![LiqiField::Bytes(value.as_bytes().to_vec())]);
}

pub fn set_bytes(fields: &mut LiqiValue, field_id: u32, value: Vec<u8>) {
    fields.insert(field_id, vec![LiqiField::Bytes(value)]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_method_and_payload_envelope() {
        let mut fields: LiqiValue = BTreeMap::new();
        set_str(&mut fields, 1, ".lq.Lobby.oauth2Login");
        set_bytes(&mut fields, 2, vec![1, 2, 3]);

        let bytes = encode_fields(&fields);
        let decoded = decode_fields(&bytes).unwrap();

        assert_eq!(
            single_str(&decoded, 1).as_deref(),
            Some(".lq.Lobby.oauth2Login")
        );
        assert_eq!(single_bytes(&decoded, 2), Some(vec![1, 2, 3]));
    }

    #[test]
    fn rejects_unsupported_wire_type() {
        // field 1, wire type 5 (32-bit fixed) is never emitted by this system.
        let tag = (1u64 << 3) | 5;
        let mut buf = Vec::new();
        write_varint(tag, &mut buf);
        assert!(matches!(
            decode_fields(&buf),
            Err(CodecError::UnsupportedWireType(5))
        ));
    }
}
