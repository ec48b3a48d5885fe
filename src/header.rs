//! FCS HEADER segment parsing.
//!
//! The first 58 bytes of an FCS file are a fixed-width ASCII header: a
//! six-byte version token, four spaces, and six right-justified eight-byte
//! decimal fields giving the inclusive byte ranges of the TEXT, DATA, and
//! ANALYSIS segments. An offset past [`MAX_HEADER_OFFSET`] cannot be encoded
//! in an eight-byte field and is written as `0`; the true range must then be
//! re-resolved from TEXT keywords once that segment has been parsed.

use log::{debug, trace};

use crate::error::FormatError;

/// Total length of the fixed ASCII header.
pub const HEADER_LEN: usize = 58;

/// Largest offset representable in an eight-byte decimal header field.
pub const MAX_HEADER_OFFSET: u64 = 99_999_999;

/// Inclusive byte range of one container segment.
///
/// `begin == 0 && end == 0` is the out-of-range sentinel: the real range
/// lives in TEXT keywords instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    /// Offset of the first byte of the segment
    pub begin: u64,
    /// Offset of the last byte of the segment
    pub end: u64,
}

impl SegmentRange {
    /// Whether the header carried the sentinel instead of a real range.
    pub fn is_sentinel(&self) -> bool {
        self.begin == 0 && self.end == 0
    }

    /// Segment length in bytes. Offsets are inclusive, so a one-byte segment
    /// has `begin == end`.
    pub fn len(&self) -> u64 {
        if self.end >= self.begin {
            self.end - self.begin + 1
        } else {
            0
        }
    }

    /// True when the range holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate the range against the total stream length.
    pub fn check_bounds(&self, segment: &'static str, stream_len: u64) -> Result<(), FormatError> {
        if self.begin > self.end || self.end >= stream_len {
            return Err(FormatError::OffsetOutOfBounds {
                segment,
                begin: self.begin,
                end: self.end,
                len: stream_len,
            });
        }
        Ok(())
    }
}

/// Parsed HEADER: format version token plus the three segment ranges.
#[derive(Debug, Clone)]
pub struct FcsHeader {
    /// Version token, e.g. `FCS3.1`
    pub version: String,
    /// Primary TEXT segment range
    pub text: SegmentRange,
    /// DATA segment range (may be the sentinel)
    pub data: SegmentRange,
    /// ANALYSIS segment range; parsed but not consumed by this crate
    pub analysis: SegmentRange,
}

impl FcsHeader {
    /// Parse the fixed header from the start of a stream.
    ///
    /// The TEXT range must be real: primary TEXT always fits below the
    /// eight-byte field limit, so a sentinel there is a malformed file.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::InvalidHeader(format!(
                "stream is {} bytes; the fixed header needs {}",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let version = std::str::from_utf8(&bytes[0..6])
            .map_err(|_| FormatError::InvalidHeader("version token is not ASCII".into()))?
            .trim_end()
            .to_string();
        if !version.starts_with("FCS") {
            return Err(FormatError::InvalidHeader(format!(
                "version token {version:?} does not start with FCS"
            )));
        }
        trace!("header version token: {version}");

        let text = SegmentRange {
            begin: read_offset(bytes, 10)?,
            end: read_offset(bytes, 18)?,
        };
        let data = SegmentRange {
            begin: read_offset(bytes, 26)?,
            end: read_offset(bytes, 34)?,
        };
        let analysis = SegmentRange {
            begin: read_offset(bytes, 42)?,
            end: read_offset(bytes, 50)?,
        };

        if text.is_sentinel() {
            return Err(FormatError::UnresolvedOffsets { segment: "TEXT" });
        }
        if !analysis.is_sentinel() {
            debug!(
                "ANALYSIS segment present at [{}, {}]; not consumed",
                analysis.begin, analysis.end
            );
        }
        debug!(
            "header: version={version} TEXT=[{}, {}] DATA=[{}, {}]",
            text.begin, text.end, data.begin, data.end
        );

        Ok(Self {
            version,
            text,
            data,
            analysis,
        })
    }
}

/// Read one right-justified eight-byte ASCII decimal field.
///
/// A blank field (all spaces) decodes as 0, which callers treat the same as
/// the explicit `0` sentinel.
fn read_offset(bytes: &[u8], at: usize) -> Result<u64, FormatError> {
    let field = &bytes[at..at + 8];
    let text = std::str::from_utf8(field)
        .map_err(|_| FormatError::InvalidHeader(format!("offset field at byte {at} is not ASCII")))?
        .trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<u64>().map_err(|_| {
        FormatError::InvalidHeader(format!("offset field at byte {at} is not decimal: {text:?}"))
    })
}
