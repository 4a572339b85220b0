//! ECDSA signature conversion between raw `r‖s` and ASN.1 DER.
//!
//! JOSE carries P-256 signatures as 64 raw bytes (RFC 7518 §3.4). ECDSA
//! primitives exchange `SEQUENCE { INTEGER r, INTEGER s }`. These are pure byte
//! transforms; nothing here signs or verifies.
//!
//! ```text
//! 30 len
//!    02 len_r [00] r...
//!    02 len_s [00] s...
//! ```

use crate::error::{Result, TrustError};

/// Width of one P-256 signature half in bytes.
pub const COMPONENT_LEN: usize = 32;

/// Length of an ES256 raw signature.
pub const RAW_SIGNATURE_LEN: usize = 2 * COMPONENT_LEN;

const TAG_SEQUENCE: u8 = 0x30;
const TAG_INTEGER: u8 = 0x02;

/// Converts a DER signature to the fixed 64-byte `r‖s` form.
///
/// Each INTEGER loses its sign-avoidance zero and is left-padded to 32 bytes.
///
/// # Errors
///
/// Returns [`TrustError::MalformedDer`] on any tag or length mismatch, trailing
/// bytes, or an integer wider than 32 bytes.
///
/// # Examples
///
/// ```
/// use ucp_trust::jose::{der_to_raw, raw_to_der};
///
/// let mut raw = [0u8; 64];
/// raw[0] = 0x80;
/// raw[63] = 0x01;
/// let der = raw_to_der(&raw);
/// assert_eq!(der_to_raw(&der).unwrap(), raw);
/// ```
pub fn der_to_raw(der: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN]> {
    let mut reader = DerReader::new(der);
    let sequence = reader.read_tlv(TAG_SEQUENCE)?;
    if !reader.is_empty() {
        return Err(malformed("trailing bytes after SEQUENCE"));
    }

    let mut inner = DerReader::new(sequence);
    let r = inner.read_tlv(TAG_INTEGER)?;
    let s = inner.read_tlv(TAG_INTEGER)?;
    if !inner.is_empty() {
        return Err(malformed("trailing bytes inside SEQUENCE"));
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    copy_padded(r, &mut raw[..COMPONENT_LEN])?;
    copy_padded(s, &mut raw[COMPONENT_LEN..])?;
    Ok(raw)
}

/// Converts a raw `r‖s` signature to DER.
///
/// The input is split at its midpoint, so any even length is accepted; the
/// canonical case is 64 bytes. Leading zero bytes are stripped (keeping at
/// least one) and a `0x00` is prepended when the high bit is set.
#[must_use]
pub fn raw_to_der(raw: &[u8]) -> Vec<u8> {
    let (r, s) = raw.split_at(raw.len() / 2);
    let r = encode_integer(r);
    let s = encode_integer(s);

    let mut der = Vec::with_capacity(r.len() + s.len() + 4);
    der.push(TAG_SEQUENCE);
    push_length(&mut der, r.len() + s.len());
    der.extend_from_slice(&r);
    der.extend_from_slice(&s);
    der
}

fn encode_integer(bytes: &[u8]) -> Vec<u8> {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    let mut value = &bytes[first_nonzero..];
    if value.is_empty() {
        value = &[0];
    }

    let needs_pad = value[0] & 0x80 != 0;
    let len = value.len() + usize::from(needs_pad);

    let mut out = Vec::with_capacity(len + 3);
    out.push(TAG_INTEGER);
    push_length(&mut out, len);
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(value);
    out
}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        // short form
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        let significant = &bytes[skip..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn copy_padded(integer: &[u8], out: &mut [u8]) -> Result<()> {
    if integer.is_empty() {
        return Err(malformed("empty INTEGER"));
    }
    if integer[0] & 0x80 != 0 {
        return Err(malformed("negative INTEGER"));
    }

    let first_nonzero = integer.iter().position(|&b| b != 0).unwrap_or(integer.len());
    let value = &integer[first_nonzero..];
    if value.len() > out.len() {
        return Err(malformed(format!(
            "INTEGER is {} bytes, expected at most {}",
            value.len(),
            out.len()
        )));
    }

    let offset = out.len() - value.len();
    out[offset..].copy_from_slice(value);
    Ok(())
}

fn malformed(reason: impl Into<String>) -> TrustError {
    TrustError::MalformedDer(reason.into())
}

/// Minimal TLV reader. Every read is bounds-checked.
struct DerReader<'a> {
    input: &'a [u8],
}

impl<'a> DerReader<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    const fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn read_byte(&mut self) -> Result<u8> {
        let (&byte, rest) =
            self.input.split_first().ok_or_else(|| malformed("unexpected end of input"))?;
        self.input = rest;
        Ok(byte)
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }

        // Long form. Signatures never need more than two length octets.
        let octets = usize::from(first & 0x7f);
        if octets == 0 || octets > 2 {
            return Err(malformed(format!("unsupported length encoding 0x{first:02x}")));
        }
        let mut len = 0usize;
        for _ in 0..octets {
            len = (len << 8) | usize::from(self.read_byte()?);
        }
        if len < 0x80 {
            return Err(malformed("non-minimal length encoding"));
        }
        Ok(len)
    }

    fn read_tlv(&mut self, expected_tag: u8) -> Result<&'a [u8]> {
        let tag = self.read_byte()?;
        if tag != expected_tag {
            return Err(malformed(format!(
                "expected tag 0x{expected_tag:02x}, found 0x{tag:02x}"
            )));
        }
        let len = self.read_length()?;
        if len > self.input.len() {
            return Err(malformed(format!(
                "length {len} exceeds remaining {} bytes",
                self.input.len()
            )));
        }
        let (value, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(value)
    }
}
