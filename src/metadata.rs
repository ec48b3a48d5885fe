//! TEXT segment parsing and keyword access.
//!
//! The TEXT segment is a flat run of key/value tokens separated by a
//! single-byte delimiter whose value is the first byte of the segment. A
//! doubled delimiter inside a token is an escaped literal delimiter; a single
//! one ends the token. Standardized keywords begin with `$` (`$PAR`, `$TOT`,
//! `$DATATYPE`, `$BYTEORD`, `$PnN`, ...); vendor keywords are preserved
//! verbatim and left opaque.
//!
//! Typed accessors coerce keyword values on demand, so a file with a broken
//! vendor keyword still opens as long as the standardized ones it needs are
//! intact.

use std::collections::HashMap;

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::header::SegmentRange;

/// One detector dimension of an event table.
///
/// The short name comes from `$PnN`; the stain name from `$PnS` when the
/// file carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    /// Short name from `$PnN`
    pub short_name: String,
    /// Stain/long name from `$PnS`, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stain_name: Option<String>,
}

/// Numeric representation declared by `$DATATYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Unsigned integers of per-channel `$PnB` width
    Int,
    /// IEEE 754 single precision
    Float,
    /// IEEE 754 double precision
    Double,
}

impl DataType {
    /// Single-letter keyword code for this representation.
    pub fn code(&self) -> char {
        match self {
            DataType::Int => 'I',
            DataType::Float => 'F',
            DataType::Double => 'D',
        }
    }

    fn from_keyword(value: &str) -> Result<Self, FormatError> {
        match value.trim() {
            "I" => Ok(DataType::Int),
            "F" => Ok(DataType::Float),
            "D" => Ok(DataType::Double),
            other => Err(FormatError::UnsupportedDataType(
                other.chars().next().unwrap_or('?'),
            )),
        }
    }
}

/// Byte order declared by `$BYTEORD`.
///
/// The two-token forms are the 16-bit orders some older instruments write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `1,2,3,4` (or `1,2`)
    LittleEndian,
    /// `4,3,2,1` (or `2,1`)
    BigEndian,
}

impl ByteOrder {
    fn from_keyword(value: &str) -> Result<Self, FormatError> {
        match value.trim() {
            "1,2,3,4" | "1,2" => Ok(ByteOrder::LittleEndian),
            "4,3,2,1" | "2,1" => Ok(ByteOrder::BigEndian),
            other => Err(FormatError::UnsupportedByteOrder(other.to_string())),
        }
    }
}

/// Keyword map decoded from the TEXT segment(s).
///
/// All keys are preserved as raw strings, standardized and vendor-specific
/// alike. Lookups are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    keywords: HashMap<String, String>,
}

impl Metadata {
    /// Parse a primary TEXT segment into a keyword map.
    pub fn parse(segment: &[u8]) -> Result<Self, FormatError> {
        let mut metadata = Self::default();
        metadata.merge_segment(segment, true)?;
        Ok(metadata)
    }

    /// Parse a supplemental TEXT segment into this map.
    ///
    /// Keys already present keep their primary-segment values.
    pub fn merge_supplemental(&mut self, segment: &[u8]) -> Result<(), FormatError> {
        self.merge_segment(segment, false)
    }

    fn merge_segment(&mut self, segment: &[u8], overwrite: bool) -> Result<(), FormatError> {
        let tokens = split_delimited(segment)?;
        if tokens.len() % 2 != 0 {
            return Err(FormatError::OddTokenCount {
                count: tokens.len(),
            });
        }
        for pair in tokens.chunks_exact(2) {
            trace!("keyword {} = {:?}", pair[0], pair[1]);
            if overwrite || !self.keywords.contains_key(&pair[0]) {
                self.keywords.insert(pair[0].clone(), pair[1].clone());
            }
        }
        Ok(())
    }

    /// Raw value for a keyword, if present.
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.keywords.get(keyword).map(String::as_str)
    }

    /// Number of keywords in the map.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// True when no keywords were decoded.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Iterate over all keyword/value pairs, vendor keys included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.keywords.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn required(&self, keyword: &str) -> Result<&str, FormatError> {
        self.get(keyword)
            .ok_or_else(|| FormatError::MissingKeyword(keyword.to_string()))
    }

    fn required_u64(&self, keyword: &str) -> Result<u64, FormatError> {
        let value = self.required(keyword)?;
        value.trim().parse().map_err(|_| FormatError::BadKeyword {
            keyword: keyword.to_string(),
            value: value.to_string(),
        })
    }

    fn optional_u64(&self, keyword: &str) -> Result<Option<u64>, FormatError> {
        match self.get(keyword) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| FormatError::BadKeyword {
                    keyword: keyword.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    /// Channel count (`$PAR`).
    pub fn channel_count(&self) -> Result<usize, FormatError> {
        Ok(self.required_u64("$PAR")? as usize)
    }

    /// Total event count (`$TOT`).
    pub fn event_count(&self) -> Result<usize, FormatError> {
        Ok(self.required_u64("$TOT")? as usize)
    }

    /// Numeric representation (`$DATATYPE`).
    pub fn data_type(&self) -> Result<DataType, FormatError> {
        DataType::from_keyword(self.required("$DATATYPE")?)
    }

    /// Byte order (`$BYTEORD`).
    pub fn byte_order(&self) -> Result<ByteOrder, FormatError> {
        ByteOrder::from_keyword(self.required("$BYTEORD")?)
    }

    /// Acquisition mode (`$MODE`). Only list mode (`L`) is decodable.
    pub fn mode(&self) -> Result<&str, FormatError> {
        self.required("$MODE")
    }

    /// Bit width for channel `k` (1-based, `$PnB`).
    pub fn channel_bits(&self, k: usize) -> Result<u32, FormatError> {
        Ok(self.required_u64(&format!("$P{k}B"))? as u32)
    }

    /// Short name for channel `k` (1-based, `$PnN`).
    pub fn channel_short_name(&self, k: usize) -> Result<&str, FormatError> {
        self.required(&format!("$P{k}N"))
    }

    /// Stain name for channel `k` (1-based, `$PnS`), if present.
    pub fn channel_stain_name(&self, k: usize) -> Option<&str> {
        self.get(&format!("$P{k}S"))
    }

    /// Declared value range for channel `k` (1-based, `$PnR`), if present.
    pub fn channel_range(&self, k: usize) -> Result<Option<u64>, FormatError> {
        self.optional_u64(&format!("$P{k}R"))
    }

    /// All channel descriptors, ordered by ascending channel index.
    ///
    /// The order of `$PnN` keywords in the TEXT segment is irrelevant; only
    /// the index `n` decides column order.
    pub fn channels(&self) -> Result<Vec<ChannelDescriptor>, FormatError> {
        let n = self.channel_count()?;
        (1..=n)
            .map(|k| {
                Ok(ChannelDescriptor {
                    short_name: self.channel_short_name(k)?.to_string(),
                    stain_name: self.channel_stain_name(k).map(str::to_string),
                })
            })
            .collect()
    }

    /// DATA range declared in TEXT (`$BEGINDATA`/`$ENDDATA`), if present and
    /// non-zero.
    pub fn data_range(&self) -> Result<Option<SegmentRange>, FormatError> {
        self.keyword_range("$BEGINDATA", "$ENDDATA")
    }

    /// Supplemental TEXT range (`$BEGINSTEXT`/`$ENDSTEXT`), if present and
    /// non-zero.
    pub fn supplemental_text_range(&self) -> Result<Option<SegmentRange>, FormatError> {
        self.keyword_range("$BEGINSTEXT", "$ENDSTEXT")
    }

    fn keyword_range(
        &self,
        begin_keyword: &str,
        end_keyword: &str,
    ) -> Result<Option<SegmentRange>, FormatError> {
        match (
            self.optional_u64(begin_keyword)?,
            self.optional_u64(end_keyword)?,
        ) {
            (Some(begin), Some(end)) if begin != 0 || end != 0 => {
                Ok(Some(SegmentRange { begin, end }))
            }
            _ => Ok(None),
        }
    }

    /// Offset of the next data set (`$NEXTDATA`), if present.
    pub fn next_data(&self) -> Result<Option<u64>, FormatError> {
        self.optional_u64("$NEXTDATA")
    }

    /// File-internal spill string, if the file carries one.
    ///
    /// Checks `$SPILLOVER` (FCS 3.1), then the legacy `SPILL` and `$COMP`
    /// keys.
    pub fn spill_string(&self) -> Option<&str> {
        ["$SPILLOVER", "SPILL", "$COMP"]
            .iter()
            .find_map(|k| self.get(k))
    }
}

/// Split a TEXT segment into raw tokens.
///
/// The first byte is the delimiter. Empty values are impossible in the
/// format, which is what keeps the doubled-delimiter escape unambiguous.
fn split_delimited(segment: &[u8]) -> Result<Vec<String>, FormatError> {
    let (&delimiter, rest) = segment.split_first().ok_or(FormatError::EmptyText)?;

    let mut tokens = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        let byte = rest[i];
        if byte == delimiter {
            if i + 1 < rest.len() && rest[i + 1] == delimiter {
                // escaped literal delimiter
                current.push(delimiter);
                i += 2;
            } else {
                tokens.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
                i += 1;
            }
        } else {
            current.push(byte);
            i += 1;
        }
    }
    if !current.is_empty() {
        warn!("TEXT segment is missing its trailing delimiter");
        tokens.push(String::from_utf8_lossy(&current).into_owned());
    }
    Ok(tokens)
}
