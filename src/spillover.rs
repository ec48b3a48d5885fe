//! Spillover matrix construction.
//!
//! A spillover matrix records the fractional signal bleed from each channel
//! into every other channel. It can be built from an explicit channel list
//! plus flattened row-major values, from the delimited spill string embedded
//! in file metadata, or from a pre-assembled table. Exactly one of those
//! forms may be supplied per construction; [`SpilloverBuilder`] enforces the
//! rule before any parsing happens.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, SpilloverError};

/// Delimiter used by serialized spill strings.
const SPILL_DELIMITER: char = ',';

/// Square spillover matrix with its channel labels.
///
/// Entry `(i, j)` is the fractional spillover from channel `j` into channel
/// `i`. Values are row-major `f64`. Channel names are kept exactly as
/// supplied; duplicates are not rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpilloverTable", into = "SpilloverTable")]
pub struct SpilloverMatrix {
    channels: Vec<String>,
    values: Vec<f64>,
}

impl SpilloverMatrix {
    /// Build from an explicit channel list and flattened row-major values.
    pub fn from_parts<S: Into<String>>(
        channels: Vec<S>,
        values: Vec<f64>,
    ) -> Result<Self, SpilloverError> {
        let channels: Vec<String> = channels.into_iter().map(Into::into).collect();
        let n = channels.len();
        if values.len() != n * n {
            return Err(SpilloverError::NotSquare {
                channels: n,
                expected: n * n,
                values: values.len(),
            });
        }
        Ok(Self { channels, values })
    }

    /// Parse a serialized spill string.
    ///
    /// The format is `n,name1,..,namen,v11,v12,..,vnn`: a leading channel
    /// count, `n` channel names, then `n * n` row-major matrix values, all
    /// comma-separated.
    pub fn from_spill_string(spill: &str) -> Result<Self, SpilloverError> {
        let tokens: Vec<&str> = spill.trim().split(SPILL_DELIMITER).collect();

        let first = tokens.first().copied().unwrap_or_default();
        let n: usize = first.trim().parse().map_err(|_| FormatError::SpillBadNumber {
            value: first.to_string(),
        })?;
        let expected = n.saturating_mul(n).saturating_add(n).saturating_add(1);
        if tokens.len() != expected {
            return Err(FormatError::SpillTokenCount {
                n,
                count: tokens.len(),
                expected,
            }
            .into());
        }

        let channels: Vec<String> = tokens[1..1 + n].iter().map(|t| t.trim().to_string()).collect();
        let mut values = Vec::with_capacity(n * n);
        for token in &tokens[1 + n..] {
            let value: f64 = token.trim().parse().map_err(|_| FormatError::SpillBadNumber {
                value: token.to_string(),
            })?;
            values.push(value);
        }

        debug!("parsed spill string: {n} channels");
        Ok(Self { channels, values })
    }

    /// Build from a pre-assembled table.
    pub fn from_table(table: SpilloverTable) -> Result<Self, SpilloverError> {
        Self::from_parts(table.channels, table.values)
    }

    /// Channel labels, in matrix order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Matrix dimension.
    pub fn dimension(&self) -> usize {
        self.channels.len()
    }

    /// Row-major matrix values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at (`row`, `col`).
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.channels.len() + col]
    }
}

impl TryFrom<SpilloverTable> for SpilloverMatrix {
    type Error = SpilloverError;

    fn try_from(table: SpilloverTable) -> Result<Self, Self::Error> {
        Self::from_table(table)
    }
}

impl From<SpilloverMatrix> for SpilloverTable {
    fn from(matrix: SpilloverMatrix) -> Self {
        Self {
            channels: matrix.channels,
            values: matrix.values,
        }
    }
}

/// Pre-assembled tabular form of a spillover matrix.
///
/// The interchange equivalent of a labeled data frame: channel labels plus
/// row-major values, not yet validated for squareness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpilloverTable {
    /// Channel labels in matrix order
    pub channels: Vec<String>,
    /// Row-major matrix values
    pub values: Vec<f64>,
}

/// One legal construction input, resolved by [`SpilloverBuilder::build`].
enum SpilloverSource {
    Explicit {
        channels: Vec<String>,
        values: Vec<f64>,
    },
    SpillString(String),
    Table(SpilloverTable),
}

/// Builder over the three legal construction forms.
///
/// Mirrors a call surface where every input is optional: supply either a
/// channel list plus values, a spill string, or a table, and call
/// [`build`](Self::build). Ambiguous or incomplete combinations are rejected
/// before any parsing work begins.
#[derive(Debug, Clone, Default)]
pub struct SpilloverBuilder {
    channels: Option<Vec<String>>,
    values: Option<Vec<f64>>,
    spill_string: Option<String>,
    table: Option<SpilloverTable>,
}

impl SpilloverBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the channel list of the explicit form.
    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    /// Supply the flattened row-major values of the explicit form.
    pub fn values<I: IntoIterator<Item = f64>>(mut self, values: I) -> Self {
        self.values = Some(values.into_iter().collect());
        self
    }

    /// Supply a serialized spill string.
    pub fn spill_string<S: Into<String>>(mut self, spill: S) -> Self {
        self.spill_string = Some(spill.into());
        self
    }

    /// Supply a pre-assembled table.
    pub fn table(mut self, table: SpilloverTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Resolve the supplied inputs into a matrix.
    pub fn build(self) -> Result<SpilloverMatrix, SpilloverError> {
        match self.resolve()? {
            SpilloverSource::Explicit { channels, values } => {
                SpilloverMatrix::from_parts(channels, values)
            }
            SpilloverSource::SpillString(spill) => SpilloverMatrix::from_spill_string(&spill),
            SpilloverSource::Table(table) => SpilloverMatrix::from_table(table),
        }
    }

    fn resolve(self) -> Result<SpilloverSource, SpilloverError> {
        match (self.channels, self.values, self.spill_string, self.table) {
            (None, None, None, None) => Err(SpilloverError::EmptyInput),
            (Some(_), None, None, None) | (None, Some(_), None, None) => {
                Err(SpilloverError::MissingCounterpart)
            }
            (Some(channels), Some(values), None, None) => {
                Ok(SpilloverSource::Explicit { channels, values })
            }
            (None, None, Some(spill), None) => Ok(SpilloverSource::SpillString(spill)),
            (None, None, None, Some(table)) => Ok(SpilloverSource::Table(table)),
            _ => Err(SpilloverError::ConflictingInputs),
        }
    }
}
