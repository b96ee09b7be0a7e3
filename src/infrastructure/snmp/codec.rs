//! BER encoding and decoding for SNMP v2c messages.
//!
//! Only the subset the poller needs is implemented: GetRequest and
//! GetNextRequest on the way out, GetResponse on the way in, with the
//! value types printer agents actually return.

use thiserror::Error;

use crate::domain::ports::protocol::ProtocolValue;

pub const VERSION_2C: i64 = 1;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;
const TAG_GET_REQUEST: u8 = 0xA0;
const TAG_GET_NEXT_REQUEST: u8 = 0xA1;
const TAG_GET_RESPONSE: u8 = 0xA2;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("truncated message at offset {0}")]
    Truncated(usize),
    #[error("unexpected tag 0x{got:02x} at offset {offset}, wanted 0x{want:02x}")]
    UnexpectedTag { offset: usize, got: u8, want: u8 },
    #[error("length overflows message at offset {0}")]
    BadLength(usize),
    #[error("integer wider than 8 bytes at offset {0}")]
    IntegerTooWide(usize),
    #[error("invalid object identifier encoding at offset {0}")]
    BadOid(usize),
    #[error("unsupported value tag 0x{0:02x}")]
    UnsupportedTag(u8),
    #[error("unsupported protocol version {0}")]
    BadVersion(i64),
    #[error("response is not a GetResponse (tag 0x{0:02x})")]
    NotAResponse(u8),
}

/// A varbind value before protocol-level exceptions are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Value(ProtocolValue),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

/// Decoded GetResponse PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: i64,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<(Vec<u32>, RawValue)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
}

/// Encodes a single-varbind request message.
#[must_use]
pub fn encode_request(kind: PduKind, community: &str, request_id: i32, oid: &[u32]) -> Vec<u8> {
    let varbind = tlv(
        TAG_SEQUENCE,
        &[encode_oid(oid), tlv(TAG_NULL, &[])].concat(),
    );
    let varbind_list = tlv(TAG_SEQUENCE, &varbind);

    let pdu_tag = match kind {
        PduKind::Get => TAG_GET_REQUEST,
        PduKind::GetNext => TAG_GET_NEXT_REQUEST,
    };
    let pdu = tlv(
        pdu_tag,
        &[
            encode_integer(i64::from(request_id)),
            encode_integer(0),
            encode_integer(0),
            varbind_list,
        ]
        .concat(),
    );

    tlv(
        TAG_SEQUENCE,
        &[
            encode_integer(VERSION_2C),
            tlv(TAG_OCTET_STRING, community.as_bytes()),
            pdu,
        ]
        .concat(),
    )
}

/// Decodes a GetResponse message.
///
/// # Errors
///
/// Returns `CodecError` if the buffer is not a well-formed v2c
/// GetResponse.
pub fn decode_response(buf: &[u8]) -> Result<Response, CodecError> {
    let mut r = Reader::new(buf);
    let mut msg = r.read_constructed(TAG_SEQUENCE)?;

    let version = msg.read_integer()?;
    if version != VERSION_2C {
        return Err(CodecError::BadVersion(version));
    }
    // Community string is not checked on responses.
    let _ = msg.read_octet_string()?;

    let (pdu_tag, mut pdu) = msg.read_any_constructed()?;
    if pdu_tag != TAG_GET_RESPONSE {
        return Err(CodecError::NotAResponse(pdu_tag));
    }

    let request_id = pdu.read_integer()?;
    let error_status = pdu.read_integer()?;
    let error_index = pdu.read_integer()?;

    let mut list = pdu.read_constructed(TAG_SEQUENCE)?;
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = list.read_constructed(TAG_SEQUENCE)?;
        let oid = vb.read_oid()?;
        let value = vb.read_value()?;
        varbinds.push((oid, value));
    }

    Ok(Response {
        request_id,
        error_status,
        error_index,
        varbinds,
    })
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    write_length(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn encode_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Strip redundant leading bytes while the sign bit stays intact.
    while start < 7 {
        let lead = bytes[start];
        let next_msb = bytes[start + 1] & 0x80;
        if (lead == 0x00 && next_msb == 0) || (lead == 0xFF && next_msb != 0) {
            start += 1;
        } else {
            break;
        }
    }
    tlv(TAG_INTEGER, &bytes[start..])
}

fn encode_oid(oid: &[u32]) -> Vec<u8> {
    let mut content = Vec::new();
    match oid {
        [] => {}
        [first] => content.push((first * 40) as u8),
        [first, second, rest @ ..] => {
            content.push((first * 40 + second) as u8);
            for arc in rest {
                write_base128(&mut content, *arc);
            }
        }
    }
    tlv(TAG_OID, &content)
}

fn write_base128(out: &mut Vec<u8>, mut arc: u32) {
    let mut stack = [0u8; 5];
    let mut n = 0;
    loop {
        stack[n] = (arc & 0x7F) as u8;
        arc >>= 7;
        n += 1;
        if arc == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let cont = if i == 0 { 0 } else { 0x80 };
        out.push(stack[i] | cont);
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(CodecError::Truncated(self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_tag(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_length(&mut self) -> Result<usize, CodecError> {
        let at = self.pos;
        let first = self.take(1)?[0];
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 || count > std::mem::size_of::<usize>() {
            return Err(CodecError::BadLength(at));
        }
        let mut len = 0usize;
        for byte in self.take(count)? {
            len = len
                .checked_mul(256)
                .ok_or(CodecError::BadLength(at))?
                + usize::from(*byte);
        }
        Ok(len)
    }

    fn read_constructed(&mut self, want: u8) -> Result<Reader<'a>, CodecError> {
        let offset = self.pos;
        let got = self.read_tag()?;
        if got != want {
            return Err(CodecError::UnexpectedTag { offset, got, want });
        }
        let len = self.read_length()?;
        Ok(Reader::new(self.take(len)?))
    }

    fn read_any_constructed(&mut self) -> Result<(u8, Reader<'a>), CodecError> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        Ok((tag, Reader::new(self.take(len)?)))
    }

    fn read_integer(&mut self) -> Result<i64, CodecError> {
        let offset = self.pos;
        let got = self.read_tag()?;
        if got != TAG_INTEGER {
            return Err(CodecError::UnexpectedTag {
                offset,
                got,
                want: TAG_INTEGER,
            });
        }
        let len = self.read_length()?;
        self.decode_signed(len, offset)
    }

    fn decode_signed(&mut self, len: usize, offset: usize) -> Result<i64, CodecError> {
        if len == 0 || len > 8 {
            return Err(CodecError::IntegerTooWide(offset));
        }
        let bytes = self.take(len)?;
        let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for byte in bytes {
            value = (value << 8) | i64::from(*byte);
        }
        Ok(value)
    }

    fn decode_unsigned(&mut self, len: usize, offset: usize) -> Result<u64, CodecError> {
        if len == 0 || len > 9 {
            return Err(CodecError::IntegerTooWide(offset));
        }
        let bytes = self.take(len)?;
        let mut value: u64 = 0;
        for byte in bytes {
            value = value
                .checked_mul(256)
                .ok_or(CodecError::IntegerTooWide(offset))?
                + u64::from(*byte);
        }
        Ok(value)
    }

    fn read_octet_string(&mut self) -> Result<&'a [u8], CodecError> {
        let offset = self.pos;
        let got = self.read_tag()?;
        if got != TAG_OCTET_STRING {
            return Err(CodecError::UnexpectedTag {
                offset,
                got,
                want: TAG_OCTET_STRING,
            });
        }
        let len = self.read_length()?;
        self.take(len)
    }

    fn read_oid(&mut self) -> Result<Vec<u32>, CodecError> {
        let offset = self.pos;
        let got = self.read_tag()?;
        if got != TAG_OID {
            return Err(CodecError::UnexpectedTag {
                offset,
                got,
                want: TAG_OID,
            });
        }
        let len = self.read_length()?;
        let bytes = self.take(len)?;
        if bytes.is_empty() {
            return Err(CodecError::BadOid(offset));
        }
        let mut oid = vec![u32::from(bytes[0]) / 40, u32::from(bytes[0]) % 40];
        let mut arc: u32 = 0;
        let mut mid = false;
        for byte in &bytes[1..] {
            arc = arc.checked_shl(7).ok_or(CodecError::BadOid(offset))? | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                oid.push(arc);
                arc = 0;
                mid = false;
            } else {
                mid = true;
            }
        }
        if mid {
            return Err(CodecError::BadOid(offset));
        }
        Ok(oid)
    }

    fn read_value(&mut self) -> Result<RawValue, CodecError> {
        let offset = self.pos;
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        let value = match tag {
            TAG_INTEGER => RawValue::Value(ProtocolValue::Integer(
                self.decode_signed(len, offset)?,
            )),
            TAG_COUNTER32 | TAG_GAUGE32 | TAG_TIMETICKS | TAG_COUNTER64 => {
                RawValue::Value(ProtocolValue::Counter(self.decode_unsigned(len, offset)?))
            }
            TAG_OCTET_STRING | TAG_IP_ADDRESS | TAG_OPAQUE => {
                RawValue::Value(ProtocolValue::OctetString(self.take(len)?.to_vec()))
            }
            TAG_OID => {
                // Rewind so read_oid sees the whole TLV.
                self.pos = offset;
                RawValue::Value(ProtocolValue::Oid(self.read_oid()?))
            }
            TAG_NULL => {
                let _ = self.take(len)?;
                RawValue::Value(ProtocolValue::Null)
            }
            TAG_NO_SUCH_OBJECT => {
                let _ = self.take(len)?;
                RawValue::NoSuchObject
            }
            TAG_NO_SUCH_INSTANCE => {
                let _ = self.take(len)?;
                RawValue::NoSuchInstance
            }
            TAG_END_OF_MIB_VIEW => {
                let _ = self.take(len)?;
                RawValue::EndOfMibView
            }
            other => return Err(CodecError::UnsupportedTag(other)),
        };
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    const SYS_DESCR: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 1, 0];

    /// Builds a GetResponse the way an agent would, reusing the
    /// encoder's primitives for the envelope.
    fn fake_response(request_id: i32, varbind_content: Vec<u8>) -> Vec<u8> {
        let varbind_list = tlv(TAG_SEQUENCE, &varbind_content);
        let pdu = tlv(
            TAG_GET_RESPONSE,
            &[
                encode_integer(i64::from(request_id)),
                encode_integer(0),
                encode_integer(0),
                varbind_list,
            ]
            .concat(),
        );
        tlv(
            TAG_SEQUENCE,
            &[
                encode_integer(VERSION_2C),
                tlv(TAG_OCTET_STRING, b"public"),
                pdu,
            ]
            .concat(),
        )
    }

    #[test]
    fn get_request_wire_shape() {
        let msg = encode_request(PduKind::Get, "public", 0x1234, SYS_DESCR);
        // Message sequence, version INTEGER 1, community "public".
        assert_eq!(msg[0], TAG_SEQUENCE);
        assert_eq!(&msg[2..5], &[TAG_INTEGER, 1, 1]);
        assert_eq!(&msg[5..7], &[TAG_OCTET_STRING, 6]);
        assert_eq!(&msg[7..13], b"public");
        assert_eq!(msg[13], TAG_GET_REQUEST);
    }

    #[test]
    fn response_round_trip_integer() {
        let varbind = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), encode_integer(-42)].concat(),
        );
        let msg = fake_response(7, varbind);
        let resp = decode_response(&msg).expect("decode");
        assert_eq!(resp.request_id, 7);
        assert_eq!(resp.error_status, 0);
        assert_eq!(resp.varbinds.len(), 1);
        assert_eq!(resp.varbinds[0].0, SYS_DESCR);
        assert_eq!(
            resp.varbinds[0].1,
            RawValue::Value(ProtocolValue::Integer(-42))
        );
    }

    #[test]
    fn response_with_counter_and_string() {
        let vb1 = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), tlv(TAG_COUNTER32, &[0x01, 0x00])].concat(),
        );
        let vb2 = tlv(
            TAG_SEQUENCE,
            &[
                encode_oid(&[1, 3, 6, 1, 2, 1, 1, 5, 0]),
                tlv(TAG_OCTET_STRING, b"printer-3f"),
            ]
            .concat(),
        );
        let msg = fake_response(1, [vb1, vb2].concat());
        let resp = decode_response(&msg).expect("decode");
        assert_eq!(
            resp.varbinds[0].1,
            RawValue::Value(ProtocolValue::Counter(256))
        );
        assert_eq!(
            resp.varbinds[1].1,
            RawValue::Value(ProtocolValue::OctetString(b"printer-3f".to_vec()))
        );
    }

    #[test]
    fn end_of_mib_view_marker() {
        let varbind = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), tlv(TAG_END_OF_MIB_VIEW, &[])].concat(),
        );
        let msg = fake_response(2, varbind);
        let resp = decode_response(&msg).expect("decode");
        assert_eq!(resp.varbinds[0].1, RawValue::EndOfMibView);
    }

    #[test]
    fn long_form_length_round_trips() {
        let big = vec![0x61u8; 300];
        let varbind = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), tlv(TAG_OCTET_STRING, &big)].concat(),
        );
        let msg = fake_response(3, varbind);
        let resp = decode_response(&msg).expect("decode");
        assert_eq!(
            resp.varbinds[0].1,
            RawValue::Value(ProtocolValue::OctetString(big))
        );
    }

    #[test]
    fn multi_byte_oid_arcs() {
        let oid = &[1, 3, 6, 1, 4, 1, 11, 2, 3, 9, 4, 2, 1, 1, 16_000];
        let encoded = encode_oid(oid);
        let mut r = Reader::new(&encoded);
        assert_eq!(r.read_oid().expect("oid"), oid);
    }

    #[test]
    fn truncated_message_is_rejected() {
        let varbind = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), encode_integer(5)].concat(),
        );
        let msg = fake_response(4, varbind);
        assert!(decode_response(&msg[..msg.len() - 3]).is_err());
    }

    #[test]
    fn v1_response_is_rejected() {
        let varbind = tlv(
            TAG_SEQUENCE,
            &[encode_oid(SYS_DESCR), encode_integer(5)].concat(),
        );
        let mut msg = fake_response(5, varbind);
        // Version INTEGER sits right after the outer header.
        msg[4] = 0;
        assert!(matches!(
            decode_response(&msg),
            Err(CodecError::BadVersion(0))
        ));
    }
}
