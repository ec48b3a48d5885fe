//! FCS file reader.
//!
//! Ties the segment layers together: parses the HEADER, decodes the TEXT
//! segment(s) into a keyword map, resolves the DATA range (honoring the
//! extended-offset sentinel), and decodes events on demand. Opening a file
//! only reads the HEADER and TEXT segments; the DATA segment is not touched
//! until events are requested.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cytofcs::reader::FcsReader;
//!
//! let reader = FcsReader::open("specimen.fcs")?;
//! println!("{}", reader.summary()?);
//!
//! let events = reader.events()?;
//! for row in 0..events.n_events().min(5) {
//!     println!("{:?}", events.row(row));
//! }
//! # Ok::<(), cytofcs::FormatError>(())
//! ```

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use log::{debug, info, warn};

use crate::compensation::{EventSource, FetchOptions};
use crate::error::{FormatError, SpilloverError};
use crate::events::{decode_events, EventTable};
use crate::header::{FcsHeader, SegmentRange, HEADER_LEN};
use crate::metadata::{ChannelDescriptor, Metadata};
use crate::spillover::SpilloverMatrix;

/// Source the reader decodes from.
#[derive(Debug)]
enum ReaderSource {
    /// File path, re-read for the DATA segment on demand
    FilePath(PathBuf),
    /// In-memory buffer
    Bytes(Bytes),
}

/// Reader for FCS files.
#[derive(Debug)]
pub struct FcsReader {
    source: ReaderSource,
    header: FcsHeader,
    metadata: Metadata,
    data: SegmentRange,
}

impl FcsReader {
    /// Open an FCS file from a path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let path = path.as_ref();
        info!("opening FCS file {}", path.display());
        let mut file = File::open(path)?;
        let stream_len = file.metadata()?.len();
        Self::build(
            ReaderSource::FilePath(path.to_path_buf()),
            stream_len,
            &mut file,
        )
    }

    /// Read an FCS file already held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self, FormatError> {
        let bytes = bytes.into();
        let stream_len = bytes.len() as u64;
        let mut cursor = std::io::Cursor::new(bytes.clone());
        Self::build(ReaderSource::Bytes(bytes), stream_len, &mut cursor)
    }

    fn build<R: Read + Seek>(
        source: ReaderSource,
        stream_len: u64,
        stream: &mut R,
    ) -> Result<Self, FormatError> {
        let mut head = vec![0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = stream.read(&mut head[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let header = FcsHeader::parse(&head[..filled])?;

        header.text.check_bounds("TEXT", stream_len)?;
        let text = read_range(stream, header.text)?;
        let mut metadata = Metadata::parse(&text)?;

        // supplemental TEXT, when present and distinct from the primary range
        if let Some(stext) = metadata.supplemental_text_range()? {
            if stext != header.text {
                stext.check_bounds("STEXT", stream_len)?;
                let bytes = read_range(stream, stext)?;
                metadata.merge_supplemental(&bytes)?;
                debug!(
                    "merged supplemental TEXT segment [{}, {}]",
                    stext.begin, stext.end
                );
            }
        }

        if let Some(next) = metadata.next_data()? {
            if next != 0 {
                warn!("$NEXTDATA={next}: file holds multiple data sets; only the first is decoded");
            }
        }

        let data = Self::resolve_data_range(&header, &metadata, stream_len)?;
        Ok(Self {
            source,
            header,
            metadata,
            data,
        })
    }

    /// Resolve the DATA range, honoring the extended-offset sentinel.
    ///
    /// A real range in the header wins; the sentinel defers to
    /// `$BEGINDATA`/`$ENDDATA`.
    fn resolve_data_range(
        header: &FcsHeader,
        metadata: &Metadata,
        stream_len: u64,
    ) -> Result<SegmentRange, FormatError> {
        let range = if header.data.is_sentinel() {
            match metadata.data_range()? {
                Some(range) => {
                    debug!(
                        "DATA offsets resolved from TEXT keywords: [{}, {}]",
                        range.begin, range.end
                    );
                    range
                }
                None => return Err(FormatError::UnresolvedOffsets { segment: "DATA" }),
            }
        } else {
            header.data
        };
        range.check_bounds("DATA", stream_len)?;
        Ok(range)
    }

    /// Format version token from the header.
    pub fn version(&self) -> &str {
        &self.header.version
    }

    /// Keyword map from the TEXT segment(s).
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Channel descriptors in ascending channel-index order.
    pub fn channels(&self) -> Result<Vec<ChannelDescriptor>, FormatError> {
        self.metadata.channels()
    }

    /// Decode the full event table.
    pub fn events(&self) -> Result<EventTable, FormatError> {
        let data = self.read_data()?;
        decode_events(&self.metadata, &data, None)
    }

    /// Decode only the named channels.
    ///
    /// Column order follows `names`; the other channels are skipped without
    /// being materialized.
    pub fn events_for(&self, names: &[&str]) -> Result<EventTable, FormatError> {
        let data = self.read_data()?;
        decode_events(&self.metadata, &data, Some(names))
    }

    /// Build the file-internal compensation, when the file carries a spill
    /// string in its metadata.
    pub fn file_internal_compensation(&self) -> Result<Option<SpilloverMatrix>, SpilloverError> {
        match self.metadata.spill_string() {
            Some(spill) => Ok(Some(SpilloverMatrix::from_spill_string(spill)?)),
            None => Ok(None),
        }
    }

    /// Summary of the opened file.
    pub fn summary(&self) -> Result<FcsSummary, FormatError> {
        Ok(FcsSummary {
            version: self.header.version.clone(),
            n_channels: self.metadata.channel_count()?,
            n_events: self.metadata.event_count()?,
            data_bytes: self.data.len(),
            keywords: self.metadata.len(),
        })
    }

    fn read_data(&self) -> Result<Vec<u8>, FormatError> {
        match &self.source {
            ReaderSource::FilePath(path) => {
                let mut file = File::open(path)?;
                read_range(&mut file, self.data)
            }
            ReaderSource::Bytes(bytes) => {
                Ok(bytes[self.data.begin as usize..=self.data.end as usize].to_vec())
            }
        }
    }

    fn raw_bytes(&self) -> Result<Vec<u8>, FormatError> {
        match &self.source {
            ReaderSource::FilePath(path) => Ok(std::fs::read(path)?),
            ReaderSource::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }
}

impl EventSource for FcsReader {
    /// Decode this file's events.
    ///
    /// Honors `options.destination` by persisting the raw file bytes there.
    /// The query pairs are meaningful only to remote sources and are ignored
    /// here.
    fn fetch(&mut self, options: &FetchOptions) -> anyhow::Result<EventTable> {
        if let Some(destination) = &options.destination {
            std::fs::write(destination, self.raw_bytes()?)?;
            debug!("persisted raw bytes to {}", destination.display());
        }
        Ok(self.events()?)
    }
}

fn read_range<R: Read + Seek>(stream: &mut R, range: SegmentRange) -> Result<Vec<u8>, FormatError> {
    stream.seek(SeekFrom::Start(range.begin))?;
    let mut buffer = vec![0u8; range.len() as usize];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Summary of an opened FCS file.
#[derive(Debug, Clone)]
pub struct FcsSummary {
    /// Format version token
    pub version: String,
    /// Number of channels (`$PAR`)
    pub n_channels: usize,
    /// Number of events (`$TOT`)
    pub n_events: usize,
    /// DATA segment length in bytes
    pub data_bytes: u64,
    /// Number of TEXT keywords
    pub keywords: usize,
}

impl fmt::Display for FcsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FCS File Summary")?;
        writeln!(f, "================")?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Channels: {}", self.n_channels)?;
        writeln!(f, "Events: {}", self.n_events)?;
        writeln!(f, "Data bytes: {}", self.data_bytes)?;
        writeln!(f, "Keywords: {}", self.keywords)?;
        Ok(())
    }
}
