use serde::Serialize;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A size as shown to clients: raw bytes, or megabytes rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplaySize {
    Bytes(i64),
    Megabytes(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFormatter {
    in_mb: bool,
}

impl SizeFormatter {
    pub fn new(display_in_mb: bool) -> Self {
        Self { in_mb: display_in_mb }
    }

    pub fn format(&self, bytes: i64) -> DisplaySize {
        if self.in_mb {
            let mb = bytes as f64 / BYTES_PER_MB;
            DisplaySize::Megabytes((mb * 100.0).round() / 100.0)
        } else {
            DisplaySize::Bytes(bytes)
        }
    }

    pub fn unit(&self) -> &'static str {
        if self.in_mb {
            "MB"
        } else {
            "bytes"
        }
    }

    /// File responses only carry a unit when sizes are not raw bytes.
    pub fn file_unit(&self) -> Option<String> {
        self.in_mb.then(|| "MB".to_string())
    }
}
