//! TIFF/IFD codec for the EXIF block.
//!
//! The block is decoded into one entry list per directory and re-encoded with
//! freshly computed offsets, so entries can be added or replaced without
//! patching the existing layout. Directory pointers (Exif, GPS, Interop) and
//! the thumbnail location are regenerated on every encode.

use anyhow::{anyhow, bail, Context, Result};

pub const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
pub const TAG_GPS_IFD_POINTER: u16 = 0x8825;
pub const TAG_INTEROP_IFD_POINTER: u16 = 0xA005;
pub const TAG_THUMBNAIL_OFFSET: u16 = 0x0201;
pub const TAG_THUMBNAIL_LENGTH: u16 = 0x0202;

const TIFF_MAGIC: u16 = 42;
const HEADER_LEN: u32 = 8;
const ENTRY_LEN: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn marker(&self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    pub fn read_u16(&self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    pub fn read_u32(&self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    pub fn u16_bytes(&self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    /// Offset of a sub-directory, used by some writers for pointer tags.
    Ifd,
    /// Exif 3.0 UTF-8 string.
    Utf8,
}

impl FieldType {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            13 => FieldType::Ifd,
            129 => FieldType::Utf8,
            _ => return None,
        })
    }

    pub fn code(&self) -> u16 {
        match self {
            FieldType::Byte => 1,
            FieldType::Ascii => 2,
            FieldType::Short => 3,
            FieldType::Long => 4,
            FieldType::Rational => 5,
            FieldType::SByte => 6,
            FieldType::Undefined => 7,
            FieldType::SShort => 8,
            FieldType::SLong => 9,
            FieldType::SRational => 10,
            FieldType::Float => 11,
            FieldType::Double => 12,
            FieldType::Ifd => 13,
            FieldType::Utf8 => 129,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            FieldType::Byte
            | FieldType::Ascii
            | FieldType::SByte
            | FieldType::Undefined
            | FieldType::Utf8 => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }
}

/// One directory entry. `data` holds `count` values in the document's byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub data: Vec<u8>,
}

impl IfdEntry {
    pub fn byte(tag: u16, values: &[u8]) -> Self {
        Self {
            tag,
            field_type: FieldType::Byte,
            count: values.len() as u32,
            data: values.to_vec(),
        }
    }

    /// NUL-terminated ASCII; the terminator counts towards `count`.
    pub fn ascii(tag: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            field_type: FieldType::Ascii,
            count: data.len() as u32,
            data,
        }
    }

    pub fn long(order: ByteOrder, tag: u16, value: u32) -> Self {
        Self {
            tag,
            field_type: FieldType::Long,
            count: 1,
            data: order.u32_bytes(value).to_vec(),
        }
    }

    pub fn rational(order: ByteOrder, tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&order.u32_bytes(numerator));
        data.extend_from_slice(&order.u32_bytes(denominator));
        Self {
            tag,
            field_type: FieldType::Rational,
            count: 1,
            data,
        }
    }

    /// First value of a `RATIONAL` entry.
    pub fn as_rational(&self, order: ByteOrder) -> Option<(u32, u32)> {
        if self.field_type != FieldType::Rational || self.data.len() < 8 {
            return None;
        }
        Some((order.read_u32(&self.data[0..4]), order.read_u32(&self.data[4..8])))
    }

    pub fn as_ascii(&self) -> Option<&str> {
        if self.field_type != FieldType::Ascii {
            return None;
        }
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        std::str::from_utf8(&self.data[..end]).ok()
    }

    fn as_offset(&self, order: ByteOrder) -> Option<u32> {
        match self.field_type {
            FieldType::Long | FieldType::Ifd if self.data.len() >= 4 => Some(order.read_u32(&self.data)),
            FieldType::Short if self.data.len() >= 2 => Some(u32::from(order.read_u16(&self.data))),
            _ => None,
        }
    }

    /// Bytes taken outside the entry itself, padded to an even length.
    fn overflow_len(&self) -> u32 {
        let len = self.data.len() as u32;
        if len > 4 {
            len + (len % 2)
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ifd {
    entries: Vec<IfdEntry>,
}

impl Ifd {
    pub fn get(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    /// Inserts `entry`, replacing any entry with the same tag.
    pub fn set(&mut self, entry: IfdEntry) {
        match self.entries.iter_mut().find(|existing| existing.tag == entry.tag) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, tag: u16) -> Option<IfdEntry> {
        let index = self.entries.iter().position(|entry| entry.tag == tag)?;
        Some(self.entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decoded EXIF block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiffDocument {
    pub order: ByteOrder,
    pub ifd0: Ifd,
    pub exif: Option<Ifd>,
    pub gps: Option<Ifd>,
    pub interop: Option<Ifd>,
    pub ifd1: Option<Ifd>,
    pub thumbnail: Option<Vec<u8>>,
}

impl TiffDocument {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            ifd0: Ifd::default(),
            exif: None,
            gps: None,
            interop: None,
            ifd1: None,
            thumbnail: None,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN as usize {
            bail!("EXIF block too short for a TIFF header");
        }
        let order = match &bytes[0..2] {
            b"II" => ByteOrder::LittleEndian,
            b"MM" => ByteOrder::BigEndian,
            other => bail!("unknown TIFF byte order {:?}", other),
        };
        if order.read_u16(&bytes[2..4]) != TIFF_MAGIC {
            bail!("TIFF magic number missing");
        }

        let ifd0_offset = order.read_u32(&bytes[4..8]);
        let (mut ifd0, ifd1_offset) = read_ifd(bytes, order, ifd0_offset).context("reading IFD0")?;

        let exif = take_sub_ifd(bytes, order, &mut ifd0, TAG_EXIF_IFD_POINTER)
            .context("reading Exif IFD")?;
        let gps = take_sub_ifd(bytes, order, &mut ifd0, TAG_GPS_IFD_POINTER)
            .context("reading GPS IFD")?;

        let (exif, interop) = match exif {
            Some(mut exif) => {
                let interop = take_sub_ifd(bytes, order, &mut exif, TAG_INTEROP_IFD_POINTER)
                    .context("reading Interop IFD")?;
                (Some(exif), interop)
            }
            None => (None, None),
        };

        let (ifd1, thumbnail) = if ifd1_offset != 0 && ifd1_offset != ifd0_offset {
            let (mut ifd1, _) = read_ifd(bytes, order, ifd1_offset).context("reading IFD1")?;
            let thumbnail = take_thumbnail(bytes, order, &mut ifd1)?;
            (Some(ifd1), thumbnail)
        } else {
            (None, None)
        };

        Ok(Self {
            order,
            ifd0,
            exif,
            gps,
            interop,
            ifd1,
            thumbnail,
        })
    }

    pub fn gps_mut(&mut self) -> &mut Ifd {
        self.gps.get_or_insert_with(Ifd::default)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let order = self.order;

        let mut ifd0 = self.ifd0.entries.clone();
        if self.exif.is_some() || self.interop.is_some() {
            ifd0.push(IfdEntry::long(order, TAG_EXIF_IFD_POINTER, 0));
        }
        if self.gps.is_some() {
            ifd0.push(IfdEntry::long(order, TAG_GPS_IFD_POINTER, 0));
        }

        let mut exif = match (&self.exif, &self.interop) {
            (Some(exif), _) => Some(exif.entries.clone()),
            (None, Some(_)) => Some(Vec::new()),
            (None, None) => None,
        };
        if let (Some(exif), Some(_)) = (exif.as_mut(), &self.interop) {
            exif.push(IfdEntry::long(order, TAG_INTEROP_IFD_POINTER, 0));
        }

        let interop = self.interop.as_ref().map(|ifd| ifd.entries.clone());
        let gps = self.gps.as_ref().map(|ifd| ifd.entries.clone());

        let mut ifd1 = self.ifd1.as_ref().map(|ifd| ifd.entries.clone());
        if let Some(thumbnail) = &self.thumbnail {
            let entries = ifd1.get_or_insert_with(Vec::new);
            entries.push(IfdEntry::long(order, TAG_THUMBNAIL_OFFSET, 0));
            entries.push(IfdEntry::long(order, TAG_THUMBNAIL_LENGTH, thumbnail.len() as u32));
        }

        // Layout: header, IFD0, Exif, Interop, GPS, IFD1, thumbnail.
        let ifd0_offset = HEADER_LEN;
        let exif_offset = ifd0_offset + block_len(&ifd0);
        let interop_offset = exif_offset + exif.as_deref().map_or(0, block_len);
        let gps_offset = interop_offset + interop.as_deref().map_or(0, block_len);
        let ifd1_offset = gps_offset + gps.as_deref().map_or(0, block_len);
        let thumbnail_offset = ifd1_offset + ifd1.as_deref().map_or(0, block_len);

        set_long(&mut ifd0, order, TAG_EXIF_IFD_POINTER, exif_offset);
        set_long(&mut ifd0, order, TAG_GPS_IFD_POINTER, gps_offset);
        if let Some(exif) = exif.as_mut() {
            set_long(exif, order, TAG_INTEROP_IFD_POINTER, interop_offset);
        }
        if let Some(ifd1) = ifd1.as_mut() {
            set_long(ifd1, order, TAG_THUMBNAIL_OFFSET, thumbnail_offset);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&order.marker());
        out.extend_from_slice(&order.u16_bytes(TIFF_MAGIC));
        out.extend_from_slice(&order.u32_bytes(ifd0_offset));

        let next_after_ifd0 = if ifd1.is_some() { ifd1_offset } else { 0 };
        write_ifd(&mut out, order, &mut ifd0, ifd0_offset, next_after_ifd0)?;
        if let Some(mut exif) = exif {
            write_ifd(&mut out, order, &mut exif, exif_offset, 0)?;
        }
        if let Some(mut interop) = interop {
            write_ifd(&mut out, order, &mut interop, interop_offset, 0)?;
        }
        if let Some(mut gps) = gps {
            write_ifd(&mut out, order, &mut gps, gps_offset, 0)?;
        }
        if let Some(mut ifd1) = ifd1 {
            write_ifd(&mut out, order, &mut ifd1, ifd1_offset, 0)?;
        }
        if let Some(thumbnail) = &self.thumbnail {
            out.extend_from_slice(thumbnail);
        }

        Ok(out)
    }
}

fn read_ifd(bytes: &[u8], order: ByteOrder, offset: u32) -> Result<(Ifd, u32)> {
    let start = offset as usize;
    let count_end = start
        .checked_add(2)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| anyhow!("directory offset {offset} out of range"))?;
    let count = usize::from(order.read_u16(&bytes[start..count_end]));

    let entries_end = count_end + count * ENTRY_LEN as usize;
    if entries_end + 4 > bytes.len() {
        bail!("directory at {offset} with {count} entries is truncated");
    }

    let mut ifd = Ifd::default();
    for index in 0..count {
        let at = count_end + index * ENTRY_LEN as usize;
        let raw = &bytes[at..at + ENTRY_LEN as usize];
        let tag = order.read_u16(&raw[0..2]);
        let type_code = order.read_u16(&raw[2..4]);
        // Unknown types cannot be sized, so they cannot be relocated either.
        let field_type = FieldType::from_code(type_code)
            .ok_or_else(|| anyhow!("tag 0x{tag:04X} has unsupported field type {type_code}"))?;
        let value_count = order.read_u32(&raw[4..8]);
        let size = field_type
            .size()
            .checked_mul(value_count)
            .ok_or_else(|| anyhow!("tag 0x{tag:04X} value size overflows"))? as usize;

        let data = if size <= 4 {
            raw[8..8 + size].to_vec()
        } else {
            let value_offset = order.read_u32(&raw[8..12]) as usize;
            let value_end = value_offset
                .checked_add(size)
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| anyhow!("tag 0x{tag:04X} value runs past the EXIF block"))?;
            bytes[value_offset..value_end].to_vec()
        };

        ifd.entries.push(IfdEntry {
            tag,
            field_type,
            count: value_count,
            data,
        });
    }

    let next = order.read_u32(&bytes[entries_end..entries_end + 4]);
    Ok((ifd, next))
}

fn take_sub_ifd(bytes: &[u8], order: ByteOrder, parent: &mut Ifd, pointer_tag: u16) -> Result<Option<Ifd>> {
    let Some(pointer) = parent.remove(pointer_tag) else {
        return Ok(None);
    };
    let offset = pointer
        .as_offset(order)
        .ok_or_else(|| anyhow!("pointer tag 0x{pointer_tag:04X} has no offset value"))?;
    let (ifd, _) = read_ifd(bytes, order, offset)?;
    Ok(Some(ifd))
}

fn take_thumbnail(bytes: &[u8], order: ByteOrder, ifd1: &mut Ifd) -> Result<Option<Vec<u8>>> {
    let offset = ifd1.remove(TAG_THUMBNAIL_OFFSET);
    let length = ifd1.remove(TAG_THUMBNAIL_LENGTH);
    let (Some(offset), Some(length)) = (offset, length) else {
        return Ok(None);
    };
    let (Some(offset), Some(length)) = (offset.as_offset(order), length.as_offset(order)) else {
        bail!("thumbnail location tags have unexpected types");
    };
    let start = offset as usize;
    let end = start
        .checked_add(length as usize)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| anyhow!("thumbnail runs past the EXIF block"))?;
    Ok(Some(bytes[start..end].to_vec()))
}

fn block_len(entries: &[IfdEntry]) -> u32 {
    let table = 2 + ENTRY_LEN * entries.len() as u32 + 4;
    table + entries.iter().map(IfdEntry::overflow_len).sum::<u32>()
}

fn set_long(entries: &mut [IfdEntry], order: ByteOrder, tag: u16, value: u32) {
    if let Some(entry) = entries.iter_mut().find(|entry| entry.tag == tag) {
        entry.data = order.u32_bytes(value).to_vec();
    }
}

fn write_ifd(out: &mut Vec<u8>, order: ByteOrder, entries: &mut [IfdEntry], offset: u32, next: u32) -> Result<()> {
    if out.len() != offset as usize {
        bail!("directory layout mismatch: expected offset {offset}, at {}", out.len());
    }
    let count = u16::try_from(entries.len()).map_err(|_| anyhow!("too many entries in one directory"))?;
    entries.sort_by_key(|entry| entry.tag);

    let mut overflow_offset = offset + 2 + ENTRY_LEN * entries.len() as u32 + 4;
    let mut overflow = Vec::new();

    out.extend_from_slice(&order.u16_bytes(count));
    for entry in entries.iter() {
        out.extend_from_slice(&order.u16_bytes(entry.tag));
        out.extend_from_slice(&order.u16_bytes(entry.field_type.code()));
        out.extend_from_slice(&order.u32_bytes(entry.count));
        if entry.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&order.u32_bytes(overflow_offset));
            overflow.extend_from_slice(&entry.data);
            if entry.data.len() % 2 == 1 {
                overflow.push(0);
            }
            overflow_offset += entry.overflow_len();
        }
    }
    out.extend_from_slice(&order.u32_bytes(next));
    out.extend_from_slice(&overflow);
    Ok(())
}
