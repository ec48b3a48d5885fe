//! Spectral-overlap compensation.
//!
//! Applies the true inverse of a spillover matrix to the matching columns of
//! an event table: `C = E * inv(M)`, with `E` the selected
//! events-by-channels sub-matrix in the spillover matrix's channel order.
//! Non-matching columns are left untouched, and compensation is
//! all-or-nothing: any channel misalignment aborts before a single value
//! changes.
//!
//! Arithmetic runs in `f64` and is written back as `f32`, matching the
//! table's storage precision.

use std::path::PathBuf;

use log::debug;
use nalgebra::DMatrix;

use crate::error::CompensationError;
use crate::events::EventTable;
use crate::spillover::SpilloverMatrix;

/// Pass-through retrieval options for an [`EventSource`].
///
/// The compensation engine forwards these unchanged and never interprets
/// them; only the source does.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Where the source should persist the raw bytes it fetched, if anywhere
    pub destination: Option<PathBuf>,
    /// Opaque query-style key/value pairs
    pub query: Vec<(String, String)>,
}

/// Collaborator that produces a decoded event table on demand.
///
/// Implemented by [`FcsReader`](crate::reader::FcsReader) for local files;
/// remote resource layers implement it over their own transport and honor
/// whatever [`FetchOptions`] fields they understand.
pub trait EventSource {
    /// Produce the decoded event table.
    fn fetch(&mut self, options: &FetchOptions) -> anyhow::Result<EventTable>;
}

impl SpilloverMatrix {
    /// Compensate a copy of `table`, leaving the original untouched.
    pub fn apply(&self, table: &EventTable) -> Result<EventTable, CompensationError> {
        let mut copy = table.clone();
        self.apply_in_place(&mut copy)?;
        Ok(copy)
    }

    /// Compensate `table`'s matching columns in place.
    pub fn apply_in_place(&self, table: &mut EventTable) -> Result<(), CompensationError> {
        let selection = self.select_columns(table)?;
        let inverse = self.inverse()?;

        let n = self.dimension();
        let n_events = table.n_events();
        let mut sub = DMatrix::<f64>::zeros(n_events, n);
        for (j, &column) in selection.iter().enumerate() {
            for event in 0..n_events {
                sub[(event, j)] = f64::from(table.value(event, column));
            }
        }

        let corrected = sub * inverse;
        for (j, &column) in selection.iter().enumerate() {
            for event in 0..n_events {
                table.set(event, column, corrected[(event, j)] as f32);
            }
        }

        debug!("compensated {n} channels across {n_events} events");
        Ok(())
    }

    /// Fetch events from `source` and compensate them.
    ///
    /// `options` passes through to the source unchanged.
    pub fn apply_to_source<S: EventSource + ?Sized>(
        &self,
        source: &mut S,
        options: &FetchOptions,
    ) -> Result<EventTable, CompensationError> {
        let mut table = source.fetch(options)?;
        self.apply_in_place(&mut table)?;
        Ok(table)
    }

    /// Map every spillover channel to its event-table column.
    ///
    /// Each name resolves to exactly one column or the whole call fails, so
    /// the selection length always equals the matrix dimension.
    fn select_columns(&self, table: &EventTable) -> Result<Vec<usize>, CompensationError> {
        let mut indices = Vec::with_capacity(self.dimension());
        let mut missing = Vec::new();
        for name in self.channels() {
            match table.column_index(name) {
                Some(index) => indices.push(index),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(CompensationError::ChannelMismatch { missing });
        }
        debug_assert_eq!(indices.len(), self.dimension());
        Ok(indices)
    }

    fn inverse(&self) -> Result<DMatrix<f64>, CompensationError> {
        let n = self.dimension();
        DMatrix::from_row_slice(n, n, self.values())
            .try_inverse()
            .ok_or(CompensationError::SingularMatrix { dimension: n })
    }
}
