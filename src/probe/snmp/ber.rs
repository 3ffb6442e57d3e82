// Minimal BER codec for SNMPv2c GET / GETNEXT requests and their responses.
// Only the subset of ASN.1 an SNMP manager needs: definite lengths, universal
// INTEGER / OCTET STRING / NULL / OID / SEQUENCE, and the SNMP application types.

use std::fmt;
use std::str::FromStr;

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

/// SNMP version field value for v2c.
const VERSION_2C: i64 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BerError {
    #[error("unexpected end of input")]
    Truncated,
    #[error("expected tag {expected:#04x}, found {found:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },
    #[error("unsupported length encoding")]
    BadLength,
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,
    #[error("invalid object identifier: {0}")]
    BadOid(String),
    #[error("unsupported value tag {0:#04x}")]
    UnsupportedValue(u8),
    #[error("not an SNMPv2c response")]
    NotAResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest = 0xa0,
    GetNextRequest = 0xa1,
    Response = 0xa2,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid(arcs.to_vec())
    }
}

impl FromStr for Oid {
    type Err = BerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arcs = s
            .trim_start_matches('.')
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| BerError::BadOid(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(BerError::BadOid(s.to_string()));
        }
        Ok(Oid(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Numeric value for integer-like types; None for everything else (and negative integers).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            Value::Counter64(v) => Some(*v),
            Value::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// True for the v2c exception values that stand in for a missing variable.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<(Oid, Value)>,
}

/// Encodes a v2c request message with one NULL-valued varbind per OID.
pub fn encode_request(community: &str, pdu: PduType, request_id: i32, oids: &[Oid]) -> Vec<u8> {
    let mut varbinds = Vec::new();
    for oid in oids {
        let mut vb = Vec::new();
        write_oid(&mut vb, oid);
        write_tlv(&mut vb, TAG_NULL, &[]);
        write_tlv(&mut varbinds, TAG_SEQUENCE, &vb);
    }

    write_message(community, pdu, request_id, 0, &varbinds)
}

fn write_message(
    community: &str,
    pdu: PduType,
    request_id: i32,
    error_status: i64,
    varbinds: &[u8],
) -> Vec<u8> {
    let mut pdu_body = Vec::new();
    write_integer(&mut pdu_body, request_id as i64);
    write_integer(&mut pdu_body, error_status);
    write_integer(&mut pdu_body, 0);
    write_tlv(&mut pdu_body, TAG_SEQUENCE, varbinds);

    let mut message = Vec::new();
    write_integer(&mut message, VERSION_2C);
    write_tlv(&mut message, TAG_OCTET_STRING, community.as_bytes());
    write_tlv(&mut message, pdu as u8, &pdu_body);

    let mut out = Vec::with_capacity(message.len() + 4);
    write_tlv(&mut out, TAG_SEQUENCE, &message);
    out
}

/// Decodes a v2c Response-PDU message. The community is not checked.
pub fn decode_response(bytes: &[u8]) -> Result<Response, BerError> {
    let mut outer = Reader::new(bytes);
    let mut message = outer.expect(TAG_SEQUENCE)?;
    let version = message.read_integer()?;
    if version != VERSION_2C {
        return Err(BerError::NotAResponse);
    }
    message.expect(TAG_OCTET_STRING)?;
    let mut pdu = match message.expect(PduType::Response as u8) {
        Ok(pdu) => pdu,
        Err(BerError::UnexpectedTag { .. }) => return Err(BerError::NotAResponse),
        Err(e) => return Err(e),
    };

    let request_id =
        i32::try_from(pdu.read_integer()?).map_err(|_| BerError::IntegerOverflow)?;
    let error_status = pdu.read_integer()?;
    let error_index = pdu.read_integer()?;

    let mut list = pdu.expect(TAG_SEQUENCE)?;
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = list.expect(TAG_SEQUENCE)?;
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

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_integer(out: &mut Vec<u8>, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Drop redundant sign octets, keeping the sign bit of the first remaining byte correct.
    while start < 7 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xff && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    write_tlv(out, TAG_INTEGER, &bytes[start..]);
}

fn write_oid(out: &mut Vec<u8>, oid: &Oid) {
    let arcs = oid.arcs();
    let first = arcs.first().copied().unwrap_or(0);
    let second = arcs.get(1).copied().unwrap_or(0);
    let mut content = Vec::new();
    push_base128(&mut content, first * 40 + second);
    for &arc in arcs.iter().skip(2) {
        push_base128(&mut content, arc);
    }
    write_tlv(out, TAG_OID, &content);
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (j, b) in tmp.iter().enumerate().skip(i) {
        out.push(if j == last { *b } else { b | 0x80 });
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), BerError> {
        let (&tag, rest) = self.buf.split_first().ok_or(BerError::Truncated)?;
        let (&first, mut rest) = rest.split_first().ok_or(BerError::Truncated)?;
        let len = if first & 0x80 == 0 {
            first as usize
        } else {
            let n = (first & 0x7f) as usize;
            if n == 0 || n > std::mem::size_of::<usize>() {
                return Err(BerError::BadLength);
            }
            if rest.len() < n {
                return Err(BerError::Truncated);
            }
            let len = rest[..n].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
            rest = &rest[n..];
            len
        };
        if rest.len() < len {
            return Err(BerError::Truncated);
        }
        let (content, remaining) = rest.split_at(len);
        self.buf = remaining;
        Ok((tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<Reader<'a>, BerError> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(BerError::UnexpectedTag {
                expected,
                found: tag,
            });
        }
        Ok(Reader::new(content))
    }

    fn read_integer(&mut self) -> Result<i64, BerError> {
        let content = self.expect(TAG_INTEGER)?.buf;
        decode_signed(content)
    }

    fn read_oid(&mut self) -> Result<Oid, BerError> {
        let content = self.expect(TAG_OID)?.buf;
        decode_oid(content)
    }

    fn read_value(&mut self) -> Result<Value, BerError> {
        let (tag, content) = self.read_tlv()?;
        let value = match tag {
            TAG_INTEGER => Value::Integer(decode_signed(content)?),
            TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
            TAG_NULL => Value::Null,
            TAG_OID => Value::ObjectId(decode_oid(content)?),
            TAG_IP_ADDRESS => {
                let addr: [u8; 4] = content.try_into().map_err(|_| BerError::BadLength)?;
                Value::IpAddress(addr)
            }
            TAG_COUNTER32 => Value::Counter32(decode_unsigned32(content)?),
            TAG_GAUGE32 => Value::Gauge32(decode_unsigned32(content)?),
            TAG_TIMETICKS => Value::TimeTicks(decode_unsigned32(content)?),
            TAG_OPAQUE => Value::Opaque(content.to_vec()),
            TAG_COUNTER64 => Value::Counter64(decode_unsigned(content)?),
            TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
            TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
            TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
            other => return Err(BerError::UnsupportedValue(other)),
        };
        Ok(value)
    }
}

fn decode_signed(content: &[u8]) -> Result<i64, BerError> {
    if content.is_empty() {
        return Err(BerError::Truncated);
    }
    if content.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    let init: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(init, |acc, &b| (acc << 8) | b as i64))
}

/// Unsigned application types may carry a leading 0x00 pad octet.
fn decode_unsigned(content: &[u8]) -> Result<u64, BerError> {
    if content.is_empty() {
        return Err(BerError::Truncated);
    }
    let trimmed = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => content,
    };
    if trimmed.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    Ok(trimmed.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

fn decode_unsigned32(content: &[u8]) -> Result<u32, BerError> {
    u32::try_from(decode_unsigned(content)?).map_err(|_| BerError::IntegerOverflow)
}

fn decode_oid(content: &[u8]) -> Result<Oid, BerError> {
    let mut values = Vec::new();
    let mut acc: u32 = 0;
    for (i, &b) in content.iter().enumerate() {
        if acc > (u32::MAX >> 7) {
            return Err(BerError::BadOid(format!("arc overflow at byte {}", i)));
        }
        acc = (acc << 7) | (b & 0x7f) as u32;
        if b & 0x80 == 0 {
            values.push(acc);
            acc = 0;
        } else if i == content.len() - 1 {
            return Err(BerError::Truncated);
        }
    }
    let Some((&first, rest)) = values.split_first() else {
        return Err(BerError::BadOid("empty".into()));
    };
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(values.len() + 1);
    arcs.push(a);
    arcs.push(b);
    arcs.extend_from_slice(rest);
    Ok(Oid(arcs))
}

/// Agent side of the exchange, for loopback agents in tests: the request PDU type,
/// request-id and requested OIDs.
#[cfg(test)]
pub(crate) fn decode_request(bytes: &[u8]) -> Result<(PduType, i32, Vec<Oid>), BerError> {
    let mut outer = Reader::new(bytes);
    let mut message = outer.expect(TAG_SEQUENCE)?;
    message.read_integer()?;
    message.expect(TAG_OCTET_STRING)?;
    let (tag, content) = message.read_tlv()?;
    let pdu_type = match tag {
        0xa0 => PduType::GetRequest,
        0xa1 => PduType::GetNextRequest,
        other => return Err(BerError::UnsupportedValue(other)),
    };
    let mut pdu = Reader::new(content);
    let request_id =
        i32::try_from(pdu.read_integer()?).map_err(|_| BerError::IntegerOverflow)?;
    pdu.read_integer()?;
    pdu.read_integer()?;
    let mut list = pdu.expect(TAG_SEQUENCE)?;
    let mut oids = Vec::new();
    while !list.is_empty() {
        let mut vb = list.expect(TAG_SEQUENCE)?;
        oids.push(vb.read_oid()?);
    }
    Ok((pdu_type, request_id, oids))
}

#[cfg(test)]
pub(crate) fn encode_response(
    community: &str,
    request_id: i32,
    error_status: i64,
    varbinds: &[(Oid, Value)],
) -> Vec<u8> {
    let mut list = Vec::new();
    for (oid, value) in varbinds {
        let mut vb = Vec::new();
        write_oid(&mut vb, oid);
        write_value(&mut vb, value);
        write_tlv(&mut list, TAG_SEQUENCE, &vb);
    }
    write_message(community, PduType::Response, request_id, error_status, &list)
}

#[cfg(test)]
fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => write_integer(out, *i),
        Value::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
        Value::Null => write_tlv(out, TAG_NULL, &[]),
        Value::ObjectId(oid) => write_oid(out, oid),
        Value::IpAddress(addr) => write_tlv(out, TAG_IP_ADDRESS, addr),
        Value::Counter32(v) => write_unsigned(out, TAG_COUNTER32, u64::from(*v)),
        Value::Gauge32(v) => write_unsigned(out, TAG_GAUGE32, u64::from(*v)),
        Value::TimeTicks(v) => write_unsigned(out, TAG_TIMETICKS, u64::from(*v)),
        Value::Opaque(bytes) => write_tlv(out, TAG_OPAQUE, bytes),
        Value::Counter64(v) => write_unsigned(out, TAG_COUNTER64, *v),
        Value::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
        Value::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
        Value::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
    }
}

#[cfg(test)]
fn write_unsigned(out: &mut Vec<u8>, tag: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    let mut content = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    write_tlv(out, tag, &content);
}
