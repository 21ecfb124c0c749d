use anyhow::{anyhow, bail, Context, Result};
use image::ImageFormat;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::jpeg::JpegFile;
use super::rational::DirectionRational;
use super::tiff::{ByteOrder, IfdEntry, TiffDocument};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub const TAG_GPS_VERSION_ID: u16 = 0x0000;
pub const TAG_GPS_IMG_DIRECTION_REF: u16 = 0x0010;
pub const TAG_GPS_IMG_DIRECTION: u16 = 0x0011;

const GPS_VERSION: [u8; 4] = [2, 2, 0, 0];

/// What the direction is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionRef {
    True,
    Magnetic,
}

impl DirectionRef {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectionRef::True => "T",
            DirectionRef::Magnetic => "M",
        }
    }
}

/// Sets `GPSImgDirection` (and optionally `GPSImgDirectionRef`) on the JPEG at
/// `path` and rewrites the file in place.
///
/// Every other metadata entry is carried over. No retry on failure.
pub fn write_direction(
    path: &Path,
    direction: &DirectionRational,
    reference: Option<DirectionRef>,
) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut jpeg = parse_jpeg(&bytes, path)?;

    let mut document = match jpeg.exif_payload() {
        Some(payload) => TiffDocument::parse(payload)
            .with_context(|| format!("Failed to decode EXIF block of {}", path.display()))?,
        None => TiffDocument::new(ByteOrder::BigEndian),
    };

    let order = document.order;
    let gps = document.gps_mut();
    if gps.get(TAG_GPS_VERSION_ID).is_none() {
        gps.set(IfdEntry::byte(TAG_GPS_VERSION_ID, &GPS_VERSION));
    }
    gps.set(IfdEntry::rational(
        order,
        TAG_GPS_IMG_DIRECTION,
        direction.numerator,
        direction.denominator,
    ));
    if let Some(reference) = reference {
        gps.set(IfdEntry::ascii(TAG_GPS_IMG_DIRECTION_REF, reference.as_str()));
    }

    let tiff = document.encode()?;
    jpeg.set_exif_payload(&tiff)?;

    replace_file(path, &jpeg.to_bytes())?;
    log_debug!("wrote GPSImgDirection {direction} to {}", path.display());
    Ok(())
}

/// Reads `GPSImgDirection` back. `Ok(None)` when the file carries no such entry.
pub fn read_direction(path: &Path) -> Result<Option<DirectionRational>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let jpeg = parse_jpeg(&bytes, path)?;

    let Some(payload) = jpeg.exif_payload() else {
        return Ok(None);
    };
    let document = TiffDocument::parse(payload)
        .with_context(|| format!("Failed to decode EXIF block of {}", path.display()))?;

    let entry = document
        .gps
        .as_ref()
        .and_then(|gps| gps.get(TAG_GPS_IMG_DIRECTION));
    match entry {
        Some(entry) => {
            let (numerator, denominator) = entry
                .as_rational(document.order)
                .ok_or_else(|| anyhow!("GPSImgDirection is not a RATIONAL"))?;
            DirectionRational::new(numerator, denominator).map(Some)
        }
        None => Ok(None),
    }
}

/// Reads `GPSImgDirectionRef` back, if present.
pub fn read_direction_ref(path: &Path) -> Result<Option<String>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let jpeg = parse_jpeg(&bytes, path)?;
    let Some(payload) = jpeg.exif_payload() else {
        return Ok(None);
    };
    let document = TiffDocument::parse(payload)?;
    Ok(document
        .gps
        .as_ref()
        .and_then(|gps| gps.get(TAG_GPS_IMG_DIRECTION_REF))
        .and_then(IfdEntry::as_ascii)
        .map(str::to_string))
}

fn parse_jpeg(bytes: &[u8], path: &Path) -> Result<JpegFile> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => {}
        Ok(other) => bail!("{} is {:?}, only JPEG metadata can be written", path.display(), other),
        Err(err) => bail!("{} is not a recognised image: {err}", path.display()),
    }
    JpegFile::parse(bytes).with_context(|| format!("Failed to parse JPEG {}", path.display()))
}

/// Writes next to the target and renames over it, so a failed write never
/// leaves a half-written photo behind.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let staging = StagingFile::for_target(path);
    staging.write(contents)?;
    staging.commit(path)
}

/// Sibling file holding the rewritten photo. Removed on drop unless it was
/// renamed into place.
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn for_target(target: &Path) -> Self {
        let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".exif-tmp");
        Self {
            path: target.with_file_name(name),
            committed: false,
        }
    }

    fn write(&self, contents: &[u8]) -> Result<()> {
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn commit(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target)
            .with_context(|| format!("Failed to replace {}", target.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
