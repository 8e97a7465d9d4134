//! Minimal EXIF handling for JPEG files.
//!
//! EXIF is treated as an opaque byte buffer. We only ever look inside it for
//! the orientation tag; everything else is carried through untouched.
//!
//! Three procedures, all on plain buffers:
//! - **Extraction**: find the APP1 segment in a JPEG and return its payload.
//! - **Orientation**: scan the payload for IFD tag `0x0112`.
//! - **Re-embedding**: [`ExifWriter`] writes SOI + APP1 itself, then forwards
//!   the encoder's output minus the encoder's own SOI.
//!
//! JPEG segment layout:
//!   Bytes 0-1: marker (`FF E1` for APP1)
//!   Bytes 2-3: big-endian length, counting these two bytes but not the marker
//!   Bytes 4+:  payload (`length - 2` bytes)

use std::io::{self, Write};
use tracing::{debug, warn};

/// JPEG Start-Of-Image marker.
pub const SOI_MARKER: [u8; 2] = [0xFF, 0xD8];

/// JPEG APP1 marker, where EXIF lives.
pub const APP1_MARKER: [u8; 2] = [0xFF, 0xE1];

/// IFD tag for orientation.
const ORIENTATION_TAG: [u8; 2] = [0x01, 0x12];

/// Offset from the start of an IFD entry to its value byte:
/// tag (2) + format (2) + component count (4) + high byte of the u16 value (1).
const ORIENTATION_VALUE_OFFSET: usize = 9;

/// Largest payload whose segment length still fits the u16 length field.
const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 2;

/// How the stored pixels must be turned for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Horizontal = 1,
    Rotate180 = 3,
    RotateCW = 6,
    RotateCCW = 8,
}

impl Orientation {
    /// Map a raw tag value. Anything outside 3/6/8 is treated as upright.
    pub fn from_tag_value(value: u8) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::RotateCW,
            8 => Orientation::RotateCCW,
            _ => Orientation::Horizontal,
        }
    }

    /// True when width and height swap on display.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Orientation::RotateCW | Orientation::RotateCCW)
    }
}

/// Raw EXIF bytes as found in (or destined for) an APP1 segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifPayload {
    data: Vec<u8>,
}

impl ExifPayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether the payload fits in a single APP1 segment.
    pub fn fits_in_segment(&self) -> bool {
        self.data.len() <= MAX_PAYLOAD_LEN
    }

    /// APP1 marker followed by the big-endian segment length (`2 + payload`).
    pub fn marker_header(&self) -> [u8; 4] {
        let [hi, lo] = ((2 + self.data.len()) as u16).to_be_bytes();
        [APP1_MARKER[0], APP1_MARKER[1], hi, lo]
    }

    /// The complete APP1 segment: header then payload.
    pub fn to_segment(&self) -> Vec<u8> {
        let mut segment = Vec::with_capacity(4 + self.data.len());
        segment.extend_from_slice(&self.marker_header());
        segment.extend_from_slice(&self.data);
        segment
    }

    /// Decode the orientation tag.
    ///
    /// Finds the first `01 12` pair whose value byte is still inside the
    /// buffer. A missing tag means [`Orientation::Horizontal`].
    pub fn orientation(&self) -> Orientation {
        let data = &self.data;
        data.windows(2)
            .enumerate()
            .find(|(i, pair)| *pair == ORIENTATION_TAG && i + ORIENTATION_VALUE_OFFSET < data.len())
            .map(|(i, _)| Orientation::from_tag_value(data[i + ORIENTATION_VALUE_OFFSET]))
            .unwrap_or_default()
    }
}

/// Extract the EXIF payload from a JPEG byte buffer.
///
/// Returns an empty payload (never an error) when the buffer is not a JPEG,
/// has no APP1 marker, or the declared segment runs past the end.
pub fn extract_jpeg_exif(bytes: &[u8]) -> ExifPayload {
    if !bytes.starts_with(&SOI_MARKER) {
        return ExifPayload::empty();
    }

    let Some(marker_pos) = bytes.windows(2).position(|pair| pair == APP1_MARKER) else {
        return ExifPayload::empty();
    };

    let start = marker_pos + 2;
    if start + 2 > bytes.len() {
        return ExifPayload::empty();
    }

    let length = u16::from_be_bytes([bytes[start], bytes[start + 1]]) as usize;
    let end = start + length;
    if length < 2 || end > bytes.len() {
        debug!(length, available = bytes.len(), "APP1 segment truncated, ignoring");
        return ExifPayload::empty();
    }

    debug!(bytes = length - 2, "Found EXIF payload in JPEG");
    ExifPayload::new(bytes[start + 2..end].to_vec())
}

/// Write sink that places an EXIF segment at the head of a JPEG stream.
///
/// On construction it writes SOI and, when there is data, the APP1 segment.
/// It then swallows the first two bytes the JPEG encoder writes (the encoder's
/// own SOI) and passes everything after that straight through.
pub struct ExifWriter<W: Write> {
    inner: W,
    bytes_to_skip: usize,
}

impl<W: Write> ExifWriter<W> {
    pub fn new(mut inner: W, exif: &ExifPayload) -> io::Result<Self> {
        inner.write_all(&SOI_MARKER)?;

        if exif.has_data() {
            if exif.fits_in_segment() {
                inner.write_all(&exif.to_segment())?;
            } else {
                warn!(bytes = exif.as_bytes().len(), "EXIF payload too large for APP1, dropping");
            }
        }

        Ok(Self {
            inner,
            bytes_to_skip: SOI_MARKER.len(),
        })
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ExifWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.bytes_to_skip == 0 {
            return self.inner.write(buf);
        }

        if buf.len() <= self.bytes_to_skip {
            self.bytes_to_skip -= buf.len();
            return Ok(buf.len());
        }

        let skipped = self.bytes_to_skip;
        let written = self.inner.write(&buf[skipped..])?;
        self.bytes_to_skip = 0;
        Ok(skipped + written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
