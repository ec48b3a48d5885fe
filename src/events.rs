//! DATA segment decoding into labeled event tables.
//!
//! Events are stored events-major: all channel values for event *i* precede
//! event *i + 1*. Integer data honors per-channel `$PnB` widths; float and
//! double data are fixed-width. Every decoded value is normalized to `f32`
//! regardless of the source representation.

use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::debug;

use crate::error::FormatError;
use crate::metadata::{ByteOrder, ChannelDescriptor, DataType, Metadata};

/// Labeled table of decoded events.
///
/// Rows are events in arrival order; columns follow ascending channel index.
/// Values are stored row-major as `f32`. The table is a plain value: decoding
/// always produces a fresh one, and only the compensation engine's explicit
/// in-place path mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTable {
    columns: Vec<ChannelDescriptor>,
    values: Vec<f32>,
    n_events: usize,
}

impl EventTable {
    /// Assemble a table from channel descriptors and flat row-major values.
    ///
    /// The value count must be a whole number of rows.
    pub fn new(columns: Vec<ChannelDescriptor>, values: Vec<f32>) -> Result<Self, FormatError> {
        if columns.is_empty() || values.len() % columns.len() != 0 {
            return Err(FormatError::DataSizeMismatch {
                expected: (values.len() / columns.len().max(1) * columns.len()) as u64,
                actual: values.len() as u64,
            });
        }
        let n_events = values.len() / columns.len();
        Ok(Self {
            columns,
            values,
            n_events,
        })
    }

    /// Number of events (rows).
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Number of channels (columns).
    pub fn n_channels(&self) -> usize {
        self.columns.len()
    }

    /// Channel descriptors in column order.
    pub fn columns(&self) -> &[ChannelDescriptor] {
        &self.columns
    }

    /// Short names in column order.
    pub fn short_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.short_name.as_str())
    }

    /// Index of the column whose short name is `name`, if any.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.short_name == name)
    }

    /// One event's values, in column order.
    pub fn row(&self, event: usize) -> &[f32] {
        let start = event * self.columns.len();
        &self.values[start..start + self.columns.len()]
    }

    /// Value at (`event`, `channel`).
    pub fn value(&self, event: usize, channel: usize) -> f32 {
        self.values[event * self.columns.len() + channel]
    }

    /// Flat row-major values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// All values of the named column, in event order.
    pub fn column_values(&self, name: &str) -> Option<Vec<f32>> {
        let index = self.column_index(name)?;
        Some(
            (0..self.n_events)
                .map(|event| self.value(event, index))
                .collect(),
        )
    }

    pub(crate) fn set(&mut self, event: usize, channel: usize, value: f32) {
        let width = self.columns.len();
        self.values[event * width + channel] = value;
    }
}

/// Decode a DATA segment into an [`EventTable`].
///
/// `filter` optionally restricts decoding to the named channels, in the
/// order given, without materializing the other columns. Byte-count
/// validation always covers the full segment.
pub fn decode_events(
    metadata: &Metadata,
    data: &[u8],
    filter: Option<&[&str]>,
) -> Result<EventTable, FormatError> {
    let mode = metadata.mode()?.trim();
    if mode != "L" {
        return Err(FormatError::UnsupportedMode(mode.to_string()));
    }

    let n_channels = metadata.channel_count()?;
    let n_events = metadata.event_count()?;
    let data_type = metadata.data_type()?;
    let byte_order = metadata.byte_order()?;

    let mut widths = Vec::with_capacity(n_channels);
    for k in 1..=n_channels {
        let bits = metadata.channel_bits(k)?;
        let valid = match data_type {
            DataType::Int => matches!(bits, 8 | 16 | 24 | 32 | 64),
            DataType::Float => bits == 32,
            DataType::Double => bits == 64,
        };
        if !valid {
            return Err(FormatError::UnsupportedBitWidth {
                channel: k,
                bits,
                datatype: data_type.code(),
            });
        }
        widths.push((bits / 8) as usize);
    }

    let event_stride: usize = widths.iter().sum();
    let expected = event_stride as u64 * n_events as u64;
    if data.len() as u64 != expected {
        return Err(FormatError::DataSizeMismatch {
            expected,
            actual: data.len() as u64,
        });
    }

    let all_columns = metadata.channels()?;
    let selected: Vec<usize> = match filter {
        None => (0..n_channels).collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                all_columns
                    .iter()
                    .position(|c| c.short_name == *name)
                    .ok_or_else(|| FormatError::ChannelNotFound(name.to_string()))
            })
            .collect::<Result<_, _>>()?,
    };

    let mut offsets = Vec::with_capacity(n_channels);
    let mut acc = 0usize;
    for width in &widths {
        offsets.push(acc);
        acc += width;
    }

    debug!(
        "decoding {n_events} events x {} of {n_channels} channels ({:?}, {:?})",
        selected.len(),
        data_type,
        byte_order
    );

    let mut values = Vec::with_capacity(n_events * selected.len());
    let mut cursor = Cursor::new(data);
    for event in 0..n_events {
        let base = (event * event_stride) as u64;
        for &channel in &selected {
            cursor.set_position(base + offsets[channel] as u64);
            values.push(read_value(&mut cursor, data_type, byte_order, widths[channel])?);
        }
    }

    let columns = selected
        .iter()
        .map(|&i| all_columns[i].clone())
        .collect::<Vec<_>>();
    EventTable::new(columns, values)
}

fn read_value(
    cursor: &mut Cursor<&[u8]>,
    data_type: DataType,
    byte_order: ByteOrder,
    width: usize,
) -> Result<f32, FormatError> {
    let value = match (data_type, byte_order) {
        (DataType::Float, ByteOrder::LittleEndian) => cursor.read_f32::<LittleEndian>()? as f64,
        (DataType::Float, ByteOrder::BigEndian) => cursor.read_f32::<BigEndian>()? as f64,
        (DataType::Double, ByteOrder::LittleEndian) => cursor.read_f64::<LittleEndian>()?,
        (DataType::Double, ByteOrder::BigEndian) => cursor.read_f64::<BigEndian>()?,
        (DataType::Int, order) => read_uint(cursor, order, width)? as f64,
    };
    Ok(value as f32)
}

fn read_uint(
    cursor: &mut Cursor<&[u8]>,
    order: ByteOrder,
    width: usize,
) -> Result<u64, FormatError> {
    let value = match (width, order) {
        (1, _) => u64::from(cursor.read_u8()?),
        (2, ByteOrder::LittleEndian) => u64::from(cursor.read_u16::<LittleEndian>()?),
        (2, ByteOrder::BigEndian) => u64::from(cursor.read_u16::<BigEndian>()?),
        (3, ByteOrder::LittleEndian) => u64::from(cursor.read_u24::<LittleEndian>()?),
        (3, ByteOrder::BigEndian) => u64::from(cursor.read_u24::<BigEndian>()?),
        (4, ByteOrder::LittleEndian) => u64::from(cursor.read_u32::<LittleEndian>()?),
        (4, ByteOrder::BigEndian) => u64::from(cursor.read_u32::<BigEndian>()?),
        (8, ByteOrder::LittleEndian) => cursor.read_u64::<LittleEndian>()?,
        (8, ByteOrder::BigEndian) => cursor.read_u64::<BigEndian>()?,
        // widths were validated against $DATATYPE before decoding started
        _ => unreachable!("invalid integer width {width}"),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_from(pairs: &[(&str, &str)]) -> Metadata {
        let mut text = String::from("/");
        for (k, v) in pairs {
            text.push_str(k);
            text.push('/');
            text.push_str(v);
            text.push('/');
        }
        Metadata::parse(text.as_bytes()).unwrap()
    }

    fn descriptor(name: &str) -> ChannelDescriptor {
        ChannelDescriptor {
            short_name: name.to_string(),
            stain_name: None,
        }
    }

    #[test]
    fn decodes_u16_little_endian() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "2"),
            ("$TOT", "3"),
            ("$DATATYPE", "I"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "16"),
            ("$P1N", "FSC-A"),
            ("$P2B", "16"),
            ("$P2N", "SSC-A"),
        ]);
        let mut data = Vec::new();
        for v in [10u16, 20, 30, 40, 50, 60] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let table = decode_events(&metadata, &data, None).unwrap();
        assert_eq!(table.n_events(), 3);
        assert_eq!(table.n_channels(), 2);
        assert_eq!(table.row(0), [10.0, 20.0]);
        assert_eq!(table.row(2), [50.0, 60.0]);
    }

    #[test]
    fn decodes_mixed_integer_widths_big_endian() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "2"),
            ("$TOT", "2"),
            ("$DATATYPE", "I"),
            ("$BYTEORD", "4,3,2,1"),
            ("$P1B", "8"),
            ("$P1N", "TIME"),
            ("$P2B", "32"),
            ("$P2N", "FL1-A"),
        ]);
        let mut data = Vec::new();
        data.push(7u8);
        data.extend_from_slice(&1_000_000u32.to_be_bytes());
        data.push(9u8);
        data.extend_from_slice(&2_000_000u32.to_be_bytes());

        let table = decode_events(&metadata, &data, None).unwrap();
        assert_eq!(table.row(0), [7.0, 1_000_000.0]);
        assert_eq!(table.row(1), [9.0, 2_000_000.0]);
    }

    #[test]
    fn normalizes_double_precision_to_f32() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "1"),
            ("$TOT", "2"),
            ("$DATATYPE", "D"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "64"),
            ("$P1N", "FL2-A"),
        ]);
        let mut data = Vec::new();
        // a value with more precision than f32 holds
        data.extend_from_slice(&123.456_789_012_345f64.to_le_bytes());
        data.extend_from_slice(&(-1.5f64).to_le_bytes());

        let table = decode_events(&metadata, &data, None).unwrap();
        assert_eq!(table.value(0, 0), 123.456_789_012_345f64 as f32);
        assert_eq!(table.value(1, 0), -1.5);
    }

    #[test]
    fn rejects_byte_count_mismatch() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "1"),
            ("$TOT", "4"),
            ("$DATATYPE", "I"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "16"),
            ("$P1N", "FSC-A"),
        ]);
        let data = vec![0u8; 6]; // keywords declare 8

        let err = decode_events(&metadata, &data, None).unwrap_err();
        assert!(matches!(
            err,
            FormatError::DataSizeMismatch { expected: 8, actual: 6 }
        ));
    }

    #[test]
    fn rejects_non_list_mode() {
        let metadata = metadata_from(&[("$MODE", "C"), ("$PAR", "1"), ("$TOT", "1")]);
        let err = decode_events(&metadata, &[], None).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedMode(m) if m == "C"));
    }

    #[test]
    fn rejects_float_with_wrong_width() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "1"),
            ("$TOT", "1"),
            ("$DATATYPE", "F"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "16"),
            ("$P1N", "FSC-A"),
        ]);
        let err = decode_events(&metadata, &[0, 0], None).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedBitWidth { channel: 1, bits: 16, datatype: 'F' }
        ));
    }

    #[test]
    fn rejects_ascii_data_type() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "1"),
            ("$TOT", "1"),
            ("$DATATYPE", "A"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "8"),
            ("$P1N", "FSC-A"),
        ]);
        let err = decode_events(&metadata, &[0], None).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedDataType('A')));
    }

    #[test]
    fn column_filter_skips_unselected_channels() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "3"),
            ("$TOT", "2"),
            ("$DATATYPE", "I"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "16"),
            ("$P1N", "FSC-A"),
            ("$P2B", "16"),
            ("$P2N", "SSC-A"),
            ("$P3B", "16"),
            ("$P3N", "FL1-A"),
        ]);
        let mut data = Vec::new();
        for v in [1u16, 2, 3, 4, 5, 6] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let table = decode_events(&metadata, &data, Some(&["FL1-A", "FSC-A"])).unwrap();
        assert_eq!(table.n_channels(), 2);
        assert_eq!(
            table.short_names().collect::<Vec<_>>(),
            ["FL1-A", "FSC-A"]
        );
        assert_eq!(table.row(0), [3.0, 1.0]);
        assert_eq!(table.row(1), [6.0, 4.0]);
    }

    #[test]
    fn column_filter_rejects_unknown_channel() {
        let metadata = metadata_from(&[
            ("$MODE", "L"),
            ("$PAR", "1"),
            ("$TOT", "1"),
            ("$DATATYPE", "I"),
            ("$BYTEORD", "1,2,3,4"),
            ("$P1B", "8"),
            ("$P1N", "FSC-A"),
        ]);
        let err = decode_events(&metadata, &[0], Some(&["PE-A"])).unwrap_err();
        assert!(matches!(err, FormatError::ChannelNotFound(name) if name == "PE-A"));
    }

    #[test]
    fn table_lookup_helpers() {
        let table = EventTable::new(
            vec![descriptor("a"), descriptor("b")],
            vec![1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        assert_eq!(table.column_index("b"), Some(1));
        assert_eq!(table.column_index("c"), None);
        assert_eq!(table.column_values("b"), Some(vec![2.0, 4.0]));
        assert_eq!(table.value(1, 0), 3.0);
    }

    #[test]
    fn table_rejects_ragged_values() {
        let err = EventTable::new(
            vec![descriptor("a"), descriptor("b")],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::DataSizeMismatch { .. }));
    }
}
