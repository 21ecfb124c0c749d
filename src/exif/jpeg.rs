//! JPEG marker segment splitting, enough to find and replace the EXIF APP1 block.

use anyhow::{bail, Result};

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const TEM: u8 = 0x01;

/// Identifier that opens an EXIF APP1 payload.
pub const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest payload a segment length field can describe.
const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    marker: u8,
    /// Bytes after the length field. Empty for standalone markers.
    payload: Vec<u8>,
    standalone: bool,
}

/// Header segments of a JPEG file plus the untouched scan data.
#[derive(Debug, Clone)]
pub struct JpegFile {
    segments: Vec<Segment>,
    /// Everything from the first SOS (or EOI) marker to the end of the file.
    scan: Vec<u8>,
}

impl JpegFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 || bytes[0] != MARKER_PREFIX || bytes[1] != SOI {
            bail!("not a JPEG stream: missing SOI marker");
        }

        let mut segments = Vec::new();
        let mut pos = 2;

        loop {
            if pos >= bytes.len() {
                bail!("JPEG stream ends before image data");
            }
            if bytes[pos] != MARKER_PREFIX {
                bail!("expected marker at offset {pos}, found 0x{:02X}", bytes[pos]);
            }
            // Any number of 0xFF fill bytes may precede a marker code.
            while pos + 1 < bytes.len() && bytes[pos + 1] == MARKER_PREFIX {
                pos += 1;
            }
            if pos + 1 >= bytes.len() {
                bail!("truncated marker at offset {pos}");
            }

            let marker = bytes[pos + 1];
            match marker {
                SOS | EOI => {
                    let scan = bytes[pos..].to_vec();
                    return Ok(Self { segments, scan });
                }
                TEM | 0xD0..=0xD7 => {
                    segments.push(Segment {
                        marker,
                        payload: Vec::new(),
                        standalone: true,
                    });
                    pos += 2;
                }
                _ => {
                    if pos + 4 > bytes.len() {
                        bail!("truncated length for marker 0x{marker:02X}");
                    }
                    let length = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
                    if length < 2 {
                        bail!("invalid length {length} for marker 0x{marker:02X}");
                    }
                    let start = pos + 4;
                    let end = pos + 2 + length;
                    if end > bytes.len() {
                        bail!("segment 0x{marker:02X} runs past the end of the file");
                    }
                    segments.push(Segment {
                        marker,
                        payload: bytes[start..end].to_vec(),
                        standalone: false,
                    });
                    pos = end;
                }
            }
        }
    }

    /// TIFF block of the first EXIF APP1 segment, without the `Exif\0\0` header.
    pub fn exif_payload(&self) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|segment| is_exif_segment(segment))
            .map(|segment| &segment.payload[EXIF_HEADER.len()..])
    }

    /// Replaces the EXIF APP1 segment, or inserts one after any leading APP0
    /// (JFIF) segments.
    pub fn set_exif_payload(&mut self, tiff: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
        payload.extend_from_slice(EXIF_HEADER);
        payload.extend_from_slice(tiff);
        if payload.len() > MAX_SEGMENT_PAYLOAD {
            bail!("EXIF block of {} bytes does not fit in one APP1 segment", payload.len());
        }

        let segment = Segment {
            marker: APP1,
            payload,
            standalone: false,
        };

        if let Some(existing) = self.segments.iter_mut().find(|segment| is_exif_segment(segment)) {
            *existing = segment;
        } else {
            let index = self
                .segments
                .iter()
                .position(|segment| segment.marker != APP0)
                .unwrap_or(self.segments.len());
            self.segments.insert(index, segment);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len: usize = self
            .segments
            .iter()
            .map(|segment| segment.payload.len() + 4)
            .sum();
        let mut out = Vec::with_capacity(2 + header_len + self.scan.len());
        out.extend_from_slice(&[MARKER_PREFIX, SOI]);
        for segment in &self.segments {
            out.extend_from_slice(&[MARKER_PREFIX, segment.marker]);
            if !segment.standalone {
                // Payload size is bounded by parse and set_exif_payload.
                let length = (segment.payload.len() + 2) as u16;
                out.extend_from_slice(&length.to_be_bytes());
                out.extend_from_slice(&segment.payload);
            }
        }
        out.extend_from_slice(&self.scan);
        out
    }
}

fn is_exif_segment(segment: &Segment) -> bool {
    segment.marker == APP1 && segment.payload.starts_with(EXIF_HEADER)
}
