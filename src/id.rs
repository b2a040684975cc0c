/*!
Trace and span identifiers.

Both identifiers are non-zero by construction; the all-zero value the W3C
trace-context spec treats as invalid is unrepresentable, so an unset
identifier is `Option::None` and the encoder omits the field instead of
testing a sentinel.

The text format is lowercase base16, 32 digits for a trace id and 16 for a
span id.
*/

use std::{
    error, fmt,
    num::{NonZeroU128, NonZeroU64},
    str,
    str::FromStr,
};

const HEX: [u8; 16] = [
    b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'a', b'b', b'c', b'd', b'e', b'f',
];

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(NonZeroU128);

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(str::from_utf8(&self.to_hex()).unwrap())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(str::from_utf8(&self.to_hex()).unwrap())
    }
}

impl TraceId {
    pub fn new(v: NonZeroU128) -> Self {
        TraceId(v)
    }

    pub fn from_u128(v: u128) -> Option<Self> {
        Some(TraceId(NonZeroU128::new(v)?))
    }

    pub fn from_bytes(v: [u8; 16]) -> Option<Self> {
        Self::from_u128(u128::from_be_bytes(v))
    }

    pub fn to_u128(&self) -> u128 {
        self.0.get()
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.get().to_be_bytes()
    }

    pub fn to_hex(&self) -> [u8; 32] {
        let mut dst = [0; 32];
        let src: [u8; 16] = self.to_bytes();

        for i in 0..src.len() {
            let b = src[i];

            dst[i * 2] = HEX[(b >> 4) as usize];
            dst[i * 2 + 1] = HEX[(b & 0x0f) as usize];
        }

        dst
    }
}

impl FromStr for TraceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = parse_hex(s, 32)?;

        TraceId::from_u128(v).ok_or(ParseIdError { kind: ParseIdErrorKind::Zero })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(NonZeroU64);

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(str::from_utf8(&self.to_hex()).unwrap())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(str::from_utf8(&self.to_hex()).unwrap())
    }
}

impl SpanId {
    pub fn new(v: NonZeroU64) -> Self {
        SpanId(v)
    }

    pub fn from_u64(v: u64) -> Option<Self> {
        Some(SpanId(NonZeroU64::new(v)?))
    }

    pub fn from_bytes(v: [u8; 8]) -> Option<Self> {
        Self::from_u64(u64::from_be_bytes(v))
    }

    pub fn to_u64(&self) -> u64 {
        self.0.get()
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.get().to_be_bytes()
    }

    pub fn to_hex(&self) -> [u8; 16] {
        let mut dst = [0; 16];
        let src: [u8; 8] = self.to_bytes();

        for i in 0..src.len() {
            let b = src[i];

            dst[i * 2] = HEX[(b >> 4) as usize];
            dst[i * 2 + 1] = HEX[(b & 0x0f) as usize];
        }

        dst
    }
}

impl FromStr for SpanId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = parse_hex(s, 16)?;

        SpanId::from_u64(v as u64).ok_or(ParseIdError { kind: ParseIdErrorKind::Zero })
    }
}

fn parse_hex(s: &str, digits: usize) -> Result<u128, ParseIdError> {
    if s.len() != digits {
        return Err(ParseIdError {
            kind: ParseIdErrorKind::Length {
                got: s.len(),
                expected: digits,
            },
        });
    }

    let mut v = 0u128;
    for b in s.bytes() {
        // The trace-context text format only permits the lowercase alphabet.
        let nibble = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            _ => return Err(ParseIdError { kind: ParseIdErrorKind::Digit { got: b } }),
        };

        v = (v << 4) | nibble as u128;
    }

    Ok(v)
}

#[derive(Debug)]
pub struct ParseIdError {
    kind: ParseIdErrorKind,
}

#[derive(Debug)]
enum ParseIdErrorKind {
    Length { got: usize, expected: usize },
    Digit { got: u8 },
    Zero,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ParseIdErrorKind::Length { got, expected } => {
                write!(f, "expected {} hex digits, got {}", expected, got)
            }
            ParseIdErrorKind::Digit { got } => {
                write!(f, "invalid hex digit {:?}", got as char)
            }
            ParseIdErrorKind::Zero => f.write_str("the all-zero id is invalid"),
        }
    }
}

impl error::Error for ParseIdError {}
