//! Shared helper for assembling synthetic FCS byte streams.

/// Builder for complete, well-formed FCS 3.1 byte streams.
///
/// Keeps the three-segment bookkeeping (offsets, delimiter escaping, keyword
/// boilerplate) out of the individual tests.
pub struct FcsBuilder {
    data_type: char,
    byte_order: &'static str,
    channels: Vec<(String, Option<String>, u32)>,
    events: Vec<Vec<f64>>,
    keywords: Vec<(String, String)>,
    sentinel_data_offsets: bool,
}

impl FcsBuilder {
    pub fn new() -> Self {
        Self {
            data_type: 'I',
            byte_order: "1,2,3,4",
            channels: Vec::new(),
            events: Vec::new(),
            keywords: Vec::new(),
            sentinel_data_offsets: false,
        }
    }

    pub fn data_type(mut self, code: char) -> Self {
        self.data_type = code;
        self
    }

    pub fn byte_order(mut self, order: &'static str) -> Self {
        self.byte_order = order;
        self
    }

    pub fn channel(mut self, name: &str, stain: Option<&str>, bits: u32) -> Self {
        self.channels
            .push((name.to_string(), stain.map(str::to_string), bits));
        self
    }

    pub fn keyword(mut self, key: &str, value: &str) -> Self {
        self.keywords.push((key.to_string(), value.to_string()));
        self
    }

    pub fn event(mut self, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.channels.len(), "one value per channel");
        self.events.push(values.to_vec());
        self
    }

    /// Write `0`s into the header's DATA fields and carry the real range in
    /// `$BEGINDATA`/`$ENDDATA` instead.
    pub fn sentinel_data_offsets(mut self) -> Self {
        self.sentinel_data_offsets = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        const HEADER_LEN: u64 = 58;
        let big = self.byte_order == "4,3,2,1";

        let mut data = Vec::new();
        for event in &self.events {
            for (value, (_, _, bits)) in event.iter().zip(&self.channels) {
                encode_value(&mut data, *value, self.data_type, *bits, big);
            }
        }

        let mut pairs: Vec<(String, String)> = vec![
            ("$MODE".into(), "L".into()),
            ("$DATATYPE".into(), self.data_type.to_string()),
            ("$BYTEORD".into(), self.byte_order.into()),
            ("$PAR".into(), self.channels.len().to_string()),
            ("$TOT".into(), self.events.len().to_string()),
        ];
        for (k, (name, stain, bits)) in self.channels.iter().enumerate() {
            let n = k + 1;
            pairs.push((format!("$P{n}N"), name.clone()));
            pairs.push((format!("$P{n}B"), bits.to_string()));
            if let Some(stain) = stain {
                pairs.push((format!("$P{n}S"), stain.clone()));
            }
        }
        pairs.extend(self.keywords.iter().cloned());
        if self.sentinel_data_offsets {
            // fixed-width placeholders keep the TEXT length stable when the
            // real offsets are patched in below
            pairs.push(("$BEGINDATA".into(), "00000000".into()));
            pairs.push(("$ENDDATA".into(), "00000000".into()));
        }

        let mut text = String::from("/");
        for (key, value) in &pairs {
            text.push_str(&escape(key));
            text.push('/');
            text.push_str(&escape(value));
            text.push('/');
        }

        let text_begin = HEADER_LEN;
        let text_end = text_begin + text.len() as u64 - 1;
        let data_begin = text_end + 1;
        let data_end = data_begin + data.len() as u64 - 1;

        if self.sentinel_data_offsets {
            text = text.replace(
                "$BEGINDATA/00000000",
                &format!("$BEGINDATA/{data_begin:08}"),
            );
            text = text.replace("$ENDDATA/00000000", &format!("$ENDDATA/{data_end:08}"));
        }

        let (header_data_begin, header_data_end) = if self.sentinel_data_offsets {
            (0, 0)
        } else {
            (data_begin, data_end)
        };

        let mut out = format!("{:<10}", "FCS3.1").into_bytes();
        for field in [
            text_begin,
            text_end,
            header_data_begin,
            header_data_end,
            0,
            0,
        ] {
            out.extend_from_slice(format!("{field:>8}").as_bytes());
        }
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(&data);
        out
    }
}

fn escape(token: &str) -> String {
    token.replace('/', "//")
}

fn encode_value(out: &mut Vec<u8>, value: f64, data_type: char, bits: u32, big: bool) {
    match data_type {
        'I' => {
            let v = value as u64;
            let width = (bits / 8) as usize;
            if big {
                out.extend_from_slice(&v.to_be_bytes()[8 - width..]);
            } else {
                out.extend_from_slice(&v.to_le_bytes()[..width]);
            }
        }
        'F' => {
            let v = value as f32;
            let bytes = if big { v.to_be_bytes() } else { v.to_le_bytes() };
            out.extend_from_slice(&bytes);
        }
        'D' => {
            let bytes = if big {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            out.extend_from_slice(&bytes);
        }
        other => panic!("unsupported datatype {other}"),
    }
}
