//! # cytofcs - FCS Decoding and Compensation
//!
//! `cytofcs` decodes flow-cytometry instrument output (the FCS binary
//! container format) into labeled event tables and corrects the recorded
//! fluorescence values for spectral overlap between detection channels.
//!
//! ## Key Features
//!
//! - **Three-segment container parsing**: fixed-width ASCII HEADER,
//!   delimited TEXT keyword segment (escaped delimiters, supplemental TEXT,
//!   extended-offset sentinel), and binary DATA segment.
//!
//! - **Event decoding**: integer data with per-channel `$PnB` bit widths,
//!   single and double precision floats, both standard byte orders, with
//!   every value normalized to `f32`.
//!
//! - **Spillover matrices**: built from an explicit channel list plus
//!   flattened values, from the spill string embedded in file metadata, or
//!   from a pre-assembled table - exactly one form per construction.
//!
//! - **Compensation**: right-multiplies each event row by the true inverse
//!   of the spillover matrix, touching only the matching columns and failing
//!   loudly on channel misalignment or a singular matrix.
//!
//! - **Vendor keyword preservation**: non-standard TEXT keys survive
//!   decoding untouched for downstream layers to interpret.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cytofcs::prelude::*;
//!
//! // Decode a file into a labeled event table
//! let reader = FcsReader::open("specimen.fcs")?;
//! println!("{}", reader.summary()?);
//! let events = reader.events()?;
//!
//! // Compensate with the file-internal spillover matrix, if there is one
//! if let Some(spill) = reader.file_internal_compensation()? {
//!     let corrected = spill.apply(&events)?;
//!     println!("corrected {} events", corrected.n_events());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Spillover matrices also build without a file in hand:
//!
//! ```rust
//! use cytofcs::prelude::*;
//!
//! let spill = SpilloverMatrix::from_spill_string("2,FL1-A,FL2-A,1,0.1,0.05,1")?;
//! assert_eq!(spill.channels(), ["FL1-A", "FL2-A"]);
//! assert_eq!(spill.value(0, 1), 0.1);
//! # Ok::<(), cytofcs::SpilloverError>(())
//! ```
//!
//! ## Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`header`]: fixed ASCII HEADER parsing and segment ranges
//! - [`metadata`]: TEXT keyword map with typed accessors
//! - [`events`]: DATA segment decoding into [`events::EventTable`]
//! - [`reader`]: [`reader::FcsReader`], tying the segments together
//! - [`spillover`]: [`spillover::SpilloverMatrix`] construction
//! - [`compensation`]: the compensation engine and the
//!   [`compensation::EventSource`] collaborator seam
//!
//! ## Scope
//!
//! The crate is a pure decode/compute core: no network transport, no retry
//! or auth logic, and no persistence of resource metadata. Remote resource
//! layers hand it bytes through [`compensation::EventSource`] and get tables
//! back; nothing in here holds state between calls.

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod compensation;
pub mod error;
pub mod events;
pub mod header;
pub mod metadata;
pub mod reader;
pub mod spillover;

pub use error::{CompensationError, FormatError, SpilloverError};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::compensation::{EventSource, FetchOptions};
    pub use crate::error::{CompensationError, FormatError, SpilloverError};
    pub use crate::events::{decode_events, EventTable};
    pub use crate::header::{FcsHeader, SegmentRange};
    pub use crate::metadata::{ByteOrder, ChannelDescriptor, DataType, Metadata};
    pub use crate::reader::{FcsReader, FcsSummary};
    pub use crate::spillover::{SpilloverBuilder, SpilloverMatrix, SpilloverTable};
}
