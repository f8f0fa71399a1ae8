//! Minimal DER plumbing for OCSP structures.
//!
//! Decoding goes through `asn1-rs` so every TLV keeps a borrowed view of its
//! exact source bytes; offsets into the outer buffer are derived from those
//! views. Encoding covers only the handful of types OCSP requests and
//! responses are built from.

use std::ops::Range;

use asn1_rs::{Any, Class, FromDer, Oid, Tag};
use chrono::{DateTime, NaiveDateTime, Utc};

use super::errors::{OcspError, OcspResult};

/// A decoded TLV together with the bytes it was decoded from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tlv<'a> {
    pub tag: Tag,
    pub class: Class,
    pub constructed: bool,
    /// Contents octets.
    pub contents: &'a [u8],
    /// Full encoding: identifier, length and contents.
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    pub fn is_universal(&self, tag: Tag) -> bool {
        self.class == Class::Universal && self.tag == tag
    }

    pub fn is_context(&self, number: u32) -> bool {
        self.class == Class::ContextSpecific && self.tag == Tag(number)
    }

    /// Fails unless this is the expected universal type.
    pub fn expect(self, tag: Tag, what: &str) -> OcspResult<Self> {
        if self.is_universal(tag) {
            Ok(self)
        } else {
            Err(OcspError::Malformed(format!(
                "{what}: expected {tag:?}, found {:?} ({:?})",
                self.tag, self.class
            )))
        }
    }

    /// Children of a constructed value.
    pub fn children(&self) -> OcspResult<Vec<Tlv<'a>>> {
        read_all(self.contents)
    }

    /// The single value wrapped by an EXPLICIT tag.
    pub fn explicit_inner(&self) -> OcspResult<Tlv<'a>> {
        let (inner, rest) = read_tlv(self.contents)?;
        if !rest.is_empty() {
            return Err(OcspError::Malformed(
                "trailing data inside explicit tag".to_string(),
            ));
        }
        Ok(inner)
    }

    pub fn oid(&self) -> OcspResult<Oid<'a>> {
        self.expect(Tag::Oid, "object identifier")?;
        Ok(Oid::new(self.contents.into()))
    }

    /// Position of this TLV inside `base`, which must contain it.
    pub fn range_in(&self, base: &[u8]) -> Range<usize> {
        subslice_range(base, self.raw)
    }
}

/// Decodes one TLV from the front of `input`.
pub(crate) fn read_tlv(input: &[u8]) -> OcspResult<(Tlv<'_>, &[u8])> {
    let (rest, any) = Any::from_der(input)
        .map_err(|e| OcspError::Malformed(format!("DER decoding failed: {e:?}")))?;
    let raw = &input[..input.len() - rest.len()];
    let tlv = Tlv {
        tag: any.header.tag(),
        class: any.header.class(),
        constructed: any.header.is_constructed(),
        contents: any.data,
        raw,
    };
    Ok((tlv, rest))
}

/// Decodes consecutive TLVs until `input` is exhausted.
pub(crate) fn read_all(mut input: &[u8]) -> OcspResult<Vec<Tlv<'_>>> {
    let mut items = Vec::new();
    while !input.is_empty() {
        let (tlv, rest) = read_tlv(input)?;
        items.push(tlv);
        input = rest;
    }
    Ok(items)
}

/// Byte range of `part` inside `base`. `part` must be a subslice of `base`.
pub(crate) fn subslice_range(base: &[u8], part: &[u8]) -> Range<usize> {
    let start = part.as_ptr() as usize - base.as_ptr() as usize;
    debug_assert!(start + part.len() <= base.len());
    start..start + part.len()
}

/// Parses GeneralizedTime contents (`YYYYMMDDHHMMSS[.f]Z`).
pub(crate) fn generalized_time(tlv: &Tlv<'_>) -> OcspResult<DateTime<Utc>> {
    tlv.expect(Tag::GeneralizedTime, "time")?;
    let text = std::str::from_utf8(tlv.contents)
        .map_err(|_| OcspError::Malformed("GeneralizedTime is not ASCII".to_string()))?;
    NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|e| OcspError::Malformed(format!("invalid GeneralizedTime {text:?}: {e}")))
}

/// Unsigned value of a small INTEGER or ENUMERATED.
pub(crate) fn small_unsigned(tlv: &Tlv<'_>) -> OcspResult<u32> {
    if tlv.contents.is_empty() || tlv.contents.len() > 4 {
        return Err(OcspError::Malformed(format!(
            "integer of {} bytes out of range",
            tlv.contents.len()
        )));
    }
    Ok(tlv
        .contents
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)))
}

// ============================================================================
// Encoding
// ============================================================================

pub(crate) fn tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(contents.len() + 6);
    out.push(tag);
    out.extend_from_slice(&length(contents.len()));
    out.extend_from_slice(contents);
    out
}

fn length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .into_iter()
        .skip_while(|byte| *byte == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend_from_slice(&bytes);
    out
}

pub(crate) fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

pub(crate) fn octet_string(contents: &[u8]) -> Vec<u8> {
    tlv(0x04, contents)
}

/// INTEGER from contents octets that are already minimally encoded.
pub(crate) fn integer_raw(contents: &[u8]) -> Vec<u8> {
    tlv(0x02, contents)
}

pub(crate) fn enumerated(value: u8) -> Vec<u8> {
    tlv(0x0A, &[value])
}

pub(crate) fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

pub(crate) fn oid(oid: &Oid<'_>) -> Vec<u8> {
    tlv(0x06, oid.as_bytes())
}

pub(crate) fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut contents = Vec::with_capacity(bytes.len() + 1);
    contents.push(0);
    contents.extend_from_slice(bytes);
    tlv(0x03, &contents)
}

pub(crate) fn generalized_time_value(time: &DateTime<Utc>) -> Vec<u8> {
    tlv(0x18, time.format("%Y%m%d%H%M%SZ").to_string().as_bytes())
}

/// `[number]` EXPLICIT, constructed.
pub(crate) fn explicit(number: u8, contents: &[u8]) -> Vec<u8> {
    tlv(0xA0 | number, contents)
}

/// `[number]` IMPLICIT over a primitive type.
pub(crate) fn implicit_primitive(number: u8, contents: &[u8]) -> Vec<u8> {
    tlv(0x80 | number, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use asn1_rs::oid;

    #[test]
    fn long_form_lengths() {
        assert_eq!(length(0x7F), vec![0x7F]);
        assert_eq!(length(0x80), vec![0x81, 0x80]);
        assert_eq!(length(0x1234), vec![0x82, 0x12, 0x34]);
    }

    #[test]
    fn reports_exact_ranges_of_nested_values() {
        let inner = octet_string(&[0xAA; 200]);
        let outer = sequence(&[&null(), &inner]);

        let (seq, rest) = read_tlv(&outer).unwrap();
        assert!(rest.is_empty());
        let children = seq.children().unwrap();
        assert_eq!(children.len(), 2);

        let range = children[1].range_in(&outer);
        assert_eq!(&outer[range.clone()], inner.as_slice());
        assert_eq!(range.end, outer.len());
        assert_eq!(children[1].contents, &[0xAA; 200][..]);
    }

    #[test]
    fn parses_generalized_time_with_and_without_fraction() {
        let plain = tlv(0x18, b"20240102030405Z");
        let fraction = tlv(0x18, b"20240102030405.5Z");
        let (plain, _) = read_tlv(&plain).unwrap();
        let (fraction, _) = read_tlv(&fraction).unwrap();

        let plain = generalized_time(&plain).unwrap();
        assert_eq!(plain.to_rfc3339(), "2024-01-02T03:04:05+00:00");
        let fraction = generalized_time(&fraction).unwrap();
        assert_eq!(fraction.timestamp(), plain.timestamp());
        assert_eq!(fraction.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn explicit_tag_unwraps_to_inner_value() {
        let encoded = explicit(2, &oid(&oid!(1.3.6.1.5.5.7.48.1.2)));
        let (tagged, _) = read_tlv(&encoded).unwrap();
        assert!(tagged.is_context(2));
        let inner = tagged.explicit_inner().unwrap();
        assert_eq!(inner.oid().unwrap(), oid!(1.3.6.1.5.5.7.48.1.2));
    }
}
