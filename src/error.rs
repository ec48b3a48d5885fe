//! Error types for FCS decoding and compensation.
//!
//! Each concern gets its own enum: [`FormatError`] for anything structurally
//! wrong with an FCS byte stream, [`SpilloverError`] for invalid
//! spillover-matrix construction inputs, and [`CompensationError`] for
//! failures while applying a matrix to an event table. Every error is fatal
//! to the call that produced it; malformed input is never silently repaired.

/// Errors raised while decoding the HEADER, TEXT, or DATA segments of an FCS
/// byte stream.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// I/O error reading the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with a recognizable FCS header
    #[error("invalid FCS header: {0}")]
    InvalidHeader(String),

    /// A segment offset could not be resolved from the header or from TEXT
    /// keywords
    #[error("unresolvable {segment} segment offsets")]
    UnresolvedOffsets {
        /// Segment whose range is missing
        segment: &'static str,
    },

    /// A segment range points outside the stream
    #[error("{segment} segment [{begin}, {end}] exceeds stream length {len}")]
    OffsetOutOfBounds {
        /// Segment whose range is invalid
        segment: &'static str,
        /// First byte offset
        begin: u64,
        /// Last byte offset
        end: u64,
        /// Total stream length
        len: u64,
    },

    /// The TEXT segment holds no bytes
    #[error("TEXT segment is empty")]
    EmptyText,

    /// The TEXT segment split into an odd number of tokens
    #[error("TEXT segment has {count} delimited tokens; keys and values must pair up")]
    OddTokenCount {
        /// Number of tokens after delimiter splitting
        count: usize,
    },

    /// A required standardized keyword is absent
    #[error("missing required keyword {0}")]
    MissingKeyword(String),

    /// A keyword value failed to parse as the required type
    #[error("keyword {keyword} has unparseable value {value:?}")]
    BadKeyword {
        /// Keyword name
        keyword: String,
        /// Raw value as read from TEXT
        value: String,
    },

    /// Declared data size disagrees with `$PAR`/`$TOT`/`$PnB`
    #[error("DATA segment is {actual} bytes but keywords declare {expected}")]
    DataSizeMismatch {
        /// Byte count implied by the keywords
        expected: u64,
        /// Actual DATA segment length
        actual: u64,
    },

    /// `$DATATYPE` names a representation this reader does not decode
    #[error("unsupported $DATATYPE {0:?}")]
    UnsupportedDataType(char),

    /// `$BYTEORD` is not one of the standard byte orders
    #[error("unsupported $BYTEORD {0:?}")]
    UnsupportedByteOrder(String),

    /// `$MODE` other than list mode
    #[error("unsupported $MODE {0:?}; only list mode (L) is decodable")]
    UnsupportedMode(String),

    /// `$PnB` width invalid for the declared datatype
    #[error("channel {channel}: {bits}-bit values are not valid for $DATATYPE {datatype}")]
    UnsupportedBitWidth {
        /// 1-based channel index
        channel: usize,
        /// Declared bit width
        bits: u32,
        /// Declared datatype code
        datatype: char,
    },

    /// Spill string token count does not match its declared channel count
    #[error("spill string declares {n} channels but carries {count} tokens (expected {expected})")]
    SpillTokenCount {
        /// Declared channel count
        n: usize,
        /// Tokens actually present
        count: usize,
        /// `1 + n + n*n`
        expected: usize,
    },

    /// A spill string token failed to parse as a number
    #[error("spill string value {value:?} is not numeric")]
    SpillBadNumber {
        /// Offending token
        value: String,
    },

    /// A requested channel name is absent from the file
    #[error("channel {0:?} not present in file")]
    ChannelNotFound(String),
}

/// Errors raised while constructing a
/// [`SpilloverMatrix`](crate::spillover::SpilloverMatrix).
#[derive(Debug, thiserror::Error)]
pub enum SpilloverError {
    /// `channels` and `values` must be supplied together
    #[error("both `channels` and `values` are required")]
    MissingCounterpart,

    /// More than one construction path was supplied at once
    #[error("only one of (channels + values), a spill string, or a table may be supplied")]
    ConflictingInputs,

    /// No construction input was supplied at all
    #[error("no spillover input supplied")]
    EmptyInput,

    /// Flattened values do not form a square matrix over the channel list
    #[error("{channels} channels require {expected} spill values, got {values}")]
    NotSquare {
        /// Number of channel labels supplied
        channels: usize,
        /// `channels * channels`
        expected: usize,
        /// Number of values supplied
        values: usize,
    },

    /// The spill string failed to parse
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors raised while applying compensation to an event table.
#[derive(Debug, thiserror::Error)]
pub enum CompensationError {
    /// The matrix channel set does not align with the table's columns
    #[error("spillover channels not present in event table: {missing:?}")]
    ChannelMismatch {
        /// Spillover channel names with no matching column
        missing: Vec<String>,
    },

    /// The spillover matrix has no inverse
    #[error("spillover matrix ({dimension}x{dimension}) is singular")]
    SingularMatrix {
        /// Matrix dimension
        dimension: usize,
    },

    /// The event-source collaborator failed to produce a table
    #[error(transparent)]
    Fetch(#[from] anyhow::Error),
}
