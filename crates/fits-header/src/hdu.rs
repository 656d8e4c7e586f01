//! Header Data Units: splitting a FITS file into its HDUs, classifying
//! them from their headers and locating HDUs by index, name and version.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use log::warn;

use crate::block::{pad_to_block, padded_byte_len, BLOCK_SIZE, DATA_PAD_BYTE, HEADER_PAD_BYTE};
use crate::card::Card;
use crate::error::{Error, Result};
use crate::header::{header_byte_len, Header};
use crate::image::bytes_per_pixel;
use crate::value::Value;

/// Describes the kind and shape of data in a single HDU.
#[derive(Debug, Clone, PartialEq)]
pub enum HduKind {
    /// Primary HDU containing image data (possibly empty).
    Primary {
        bitpix: i64,
        /// Axis lengths NAXIS1, NAXIS2, ...
        naxes: Vec<usize>,
    },
    /// Random groups structure (primary HDU with GROUPS=T, NAXIS1=0).
    RandomGroups {
        bitpix: i64,
        /// Group dimensions (NAXIS2..NAXISm).
        naxes: Vec<usize>,
        /// Number of parameters per group.
        pcount: usize,
        /// Number of groups.
        gcount: usize,
    },
    /// Image extension (XTENSION = 'IMAGE').
    Image { bitpix: i64, naxes: Vec<usize> },
    /// ASCII table extension (XTENSION = 'TABLE').
    AsciiTable {
        /// Row width in bytes.
        naxis1: usize,
        /// Number of rows.
        naxis2: usize,
        tfields: usize,
    },
    /// Binary table extension (XTENSION = 'BINTABLE').
    BinaryTable {
        naxis1: usize,
        naxis2: usize,
        /// Size of the heap in bytes.
        pcount: usize,
        tfields: usize,
    },
    /// Tile-compressed image stored as a binary table (ZIMAGE=T).
    CompressedImage {
        zbitpix: i64,
        znaxes: Vec<usize>,
        zcmptype: String,
        naxis1: usize,
        naxis2: usize,
        pcount: usize,
        tfields: usize,
    },
    /// Any other extension. Kept so that the rest of the file stays
    /// readable.
    Unknown {
        xtension: String,
        bitpix: i64,
        naxes: Vec<usize>,
    },
}

/// A single Header Data Unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hdu {
    pub kind: HduKind,
    pub header: Header,
    /// The data segment without block padding.
    pub data: Vec<u8>,
    /// Byte offset of the header in the file it was read from.
    pub header_start: usize,
    /// Byte offset of the data segment in the file it was read from.
    pub data_start: usize,
}

fn int_value(header: &Header, keyword: &str) -> Option<i64> {
    header.get(keyword).and_then(Value::as_i64)
}

fn required_int(header: &Header, keyword: &'static str) -> Result<i64> {
    int_value(header, keyword).ok_or(Error::MissingKeyword(keyword))
}

fn to_count(n: i64) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::InvalidHeader("negative size keyword"))
}

fn string_value<'a>(header: &'a Header, keyword: &str) -> Option<&'a str> {
    header.get(keyword).and_then(Value::as_str).map(str::trim_end)
}

fn logical_value(header: &Header, keyword: &str) -> Option<bool> {
    header.get(keyword).and_then(Value::as_bool)
}

/// Axis lengths from `NAXIS`/`NAXISn` (or `ZNAXIS`/`ZNAXISn`).
fn axes(header: &Header, naxis_keyword: &'static str, axis_name: &'static str) -> Result<Vec<usize>> {
    let naxis = to_count(required_int(header, naxis_keyword)?)?;
    let mut naxes = Vec::with_capacity(naxis);
    for i in 1..=naxis {
        let kw = format!("{naxis_keyword}{i}");
        let dim = int_value(header, &kw).ok_or(Error::MissingKeyword(axis_name))?;
        naxes.push(to_count(dim)?);
    }
    Ok(naxes)
}

fn checked_product(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

fn classify(header: &Header, is_primary: bool) -> Result<HduKind> {
    if is_primary {
        let bitpix = required_int(header, "BITPIX")?;
        bytes_per_pixel(bitpix)?;
        let naxes = axes(header, "NAXIS", "NAXISn")?;
        if naxes.first() == Some(&0) && logical_value(header, "GROUPS") == Some(true) {
            let pcount = to_count(required_int(header, "PCOUNT")?)?;
            let gcount = to_count(required_int(header, "GCOUNT")?)?;
            return Ok(HduKind::RandomGroups {
                bitpix,
                naxes: naxes[1..].to_vec(),
                pcount,
                gcount,
            });
        }
        return Ok(HduKind::Primary { bitpix, naxes });
    }

    let xtension = string_value(header, "XTENSION").ok_or(Error::MissingKeyword("XTENSION"))?;
    match xtension {
        "IMAGE" => {
            let bitpix = required_int(header, "BITPIX")?;
            bytes_per_pixel(bitpix)?;
            let naxes = axes(header, "NAXIS", "NAXISn")?;
            Ok(HduKind::Image { bitpix, naxes })
        }
        "TABLE" => Ok(HduKind::AsciiTable {
            naxis1: to_count(required_int(header, "NAXIS1")?)?,
            naxis2: to_count(required_int(header, "NAXIS2")?)?,
            tfields: to_count(required_int(header, "TFIELDS")?)?,
        }),
        "BINTABLE" | "A3DTABLE" => {
            let naxis1 = to_count(required_int(header, "NAXIS1")?)?;
            let naxis2 = to_count(required_int(header, "NAXIS2")?)?;
            let pcount = to_count(int_value(header, "PCOUNT").unwrap_or(0))?;
            let tfields = to_count(required_int(header, "TFIELDS")?)?;
            if logical_value(header, "ZIMAGE") == Some(true) {
                return Ok(HduKind::CompressedImage {
                    zbitpix: required_int(header, "ZBITPIX")?,
                    znaxes: axes(header, "ZNAXIS", "ZNAXISn")?,
                    zcmptype: string_value(header, "ZCMPTYPE").unwrap_or("").to_string(),
                    naxis1,
                    naxis2,
                    pcount,
                    tfields,
                });
            }
            Ok(HduKind::BinaryTable {
                naxis1,
                naxis2,
                pcount,
                tfields,
            })
        }
        other => {
            warn!("non-standard extension type {other:?}");
            Ok(HduKind::Unknown {
                xtension: other.to_string(),
                bitpix: required_int(header, "BITPIX")?,
                naxes: axes(header, "NAXIS", "NAXISn")?,
            })
        }
    }
}

/// Size of the data segment in bytes:
/// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`, with NAXIS1
/// skipped for random groups and PCOUNT/GCOUNT fixed at 0/1 for a plain
/// primary array.
fn data_byte_len(header: &Header, kind: &HduKind) -> Result<usize> {
    let bitpix = required_int(header, "BITPIX")?;
    let bytes_per_value = (bitpix.unsigned_abs() / 8) as usize;
    let naxes = axes(header, "NAXIS", "NAXISn")?;
    if naxes.is_empty() {
        return Ok(0);
    }

    let (pcount, gcount, product) = match kind {
        HduKind::Primary { .. } => (0, 1, checked_product(&naxes)?),
        HduKind::RandomGroups { pcount, gcount, .. } => {
            (*pcount, *gcount, checked_product(&naxes[1..])?)
        }
        _ => {
            let pcount = to_count(int_value(header, "PCOUNT").unwrap_or(0))?;
            let gcount = to_count(int_value(header, "GCOUNT").unwrap_or(1))?.max(1);
            (pcount, gcount, checked_product(&naxes)?)
        }
    };

    pcount
        .checked_add(product)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(bytes_per_value))
        .ok_or(Error::InvalidHeader("data size overflow"))
}

/// Keywords that only describe the table storage of a compressed image.
const COMPRESSION_KEYWORDS: &[&str] = &[
    "XTENSION", "BITPIX", "NAXIS", "PCOUNT", "GCOUNT", "TFIELDS", "THEAP", "ZIMAGE", "ZCMPTYPE",
    "ZBITPIX", "ZNAXIS", "ZSIMPLE", "ZTENSION", "ZPCOUNT", "ZGCOUNT", "ZQUANTIZ", "ZDITHER0",
    "ZMASKCMP",
];

/// Indexed (`<prefix>n`) keywords of the same kind.
const COMPRESSION_INDEXED: &[&str] = &[
    "NAXIS", "ZNAXIS", "ZTILE", "ZNAME", "ZVAL", "TTYPE", "TFORM", "TUNIT", "TDIM", "TNULL",
    "TSCAL", "TZERO", "TDISP",
];

/// Compressed-image keywords that carry an image keyword under a `Z` name.
const RENAMED: &[(&str, &str)] = &[
    ("ZEXTEND", "EXTEND"),
    ("ZBLOCKED", "BLOCKED"),
    ("ZHECKSUM", "CHECKSUM"),
    ("ZDATASUM", "DATASUM"),
];

fn is_indexed(keyword: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        keyword
            .strip_prefix(prefix)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn carried(header: &Header, from: &str, to: &str, default: Option<Value>) -> Result<Option<Card>> {
    match header.card(from) {
        Some(card) => Card::build(to, card.value().cloned(), card.comment()).map(Some),
        None => default.map(|v| Card::build(to, Some(v), None)).transpose(),
    }
}

/// The header of the image stored in a tile-compressed HDU: the `Z*`
/// structural keywords become their image counterparts and the binary
/// table bookkeeping is dropped. Other cards keep their order.
pub fn compressed_image_header(header: &Header) -> Result<Header> {
    let primary = header.contains("ZSIMPLE");
    let mut cards = Vec::new();
    if primary {
        cards.extend(carried(header, "ZSIMPLE", "SIMPLE", None)?);
    } else {
        cards.extend(carried(header, "ZTENSION", "XTENSION", Some(Value::from("IMAGE")))?);
    }
    cards.push(carried(header, "ZBITPIX", "BITPIX", None)?.ok_or(Error::MissingKeyword("ZBITPIX"))?);
    cards.push(carried(header, "ZNAXIS", "NAXIS", None)?.ok_or(Error::MissingKeyword("ZNAXIS"))?);
    for n in 1..=axes(header, "ZNAXIS", "ZNAXISn")?.len() {
        cards.extend(carried(header, &format!("ZNAXIS{n}"), &format!("NAXIS{n}"), None)?);
    }
    if !primary {
        cards.extend(carried(header, "ZPCOUNT", "PCOUNT", Some(Value::Integer(0)))?);
        cards.extend(carried(header, "ZGCOUNT", "GCOUNT", Some(Value::Integer(1)))?);
    }

    for card in header.cards() {
        let keyword = card.keyword();
        if COMPRESSION_KEYWORDS.contains(&keyword) || is_indexed(keyword, COMPRESSION_INDEXED) {
            continue;
        }
        match RENAMED.iter().find(|(from, _)| *from == keyword) {
            Some((_, to)) => cards.push(Card::build(to, card.value().cloned(), card.comment())?),
            None => cards.push(card.clone()),
        }
    }
    Ok(Header::from_cards(cards))
}

impl Hdu {
    /// Build an HDU from a header and its unpadded data. The data length
    /// must match what the header describes.
    pub fn new(header: Header, data: Vec<u8>, is_primary: bool) -> Result<Self> {
        let kind = classify(&header, is_primary)?;
        if data_byte_len(&header, &kind)? != data.len() {
            return Err(Error::InvalidHeader("data size does not match the header"));
        }
        Ok(Hdu {
            kind,
            header,
            data,
            header_start: 0,
            data_start: 0,
        })
    }

    /// `EXTNAME`, or `PRIMARY` for a primary HDU without one.
    pub fn name(&self) -> &str {
        match string_value(&self.header, "EXTNAME") {
            Some(name) => name,
            None if self.is_primary() => "PRIMARY",
            None => "",
        }
    }

    /// `EXTVER`, defaulting to 1.
    pub fn version(&self) -> i64 {
        int_value(&self.header, "EXTVER").unwrap_or(1)
    }

    pub fn is_primary(&self) -> bool {
        matches!(
            self.kind,
            HduKind::Primary { .. } | HduKind::RandomGroups { .. }
        )
    }

    /// Returns `true` for HDUs whose data is a plain pixel array.
    pub fn is_image(&self) -> bool {
        matches!(self.kind, HduKind::Primary { .. } | HduKind::Image { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            HduKind::Primary { .. } => "PrimaryHDU",
            HduKind::RandomGroups { .. } => "GroupsHDU",
            HduKind::Image { .. } => "ImageHDU",
            HduKind::AsciiTable { .. } => "TableHDU",
            HduKind::BinaryTable { .. } => "BinTableHDU",
            HduKind::CompressedImage { .. } => "CompImageHDU",
            HduKind::Unknown { .. } => "NonstandardExtHDU",
        }
    }

    /// BITPIX of the pixel data, for image-like HDUs.
    pub fn bitpix(&self) -> Option<i64> {
        match &self.kind {
            HduKind::Primary { bitpix, .. }
            | HduKind::RandomGroups { bitpix, .. }
            | HduKind::Image { bitpix, .. }
            | HduKind::Unknown { bitpix, .. } => Some(*bitpix),
            HduKind::CompressedImage { zbitpix, .. } => Some(*zbitpix),
            HduKind::AsciiTable { .. } | HduKind::BinaryTable { .. } => None,
        }
    }

    /// Axis lengths of the (possibly compressed) image, or `NAXIS2` rows
    /// and `TFIELDS` columns for tables.
    pub fn dimensions(&self) -> Vec<usize> {
        match &self.kind {
            HduKind::Primary { naxes, .. }
            | HduKind::RandomGroups { naxes, .. }
            | HduKind::Image { naxes, .. }
            | HduKind::Unknown { naxes, .. } => naxes.clone(),
            HduKind::CompressedImage { znaxes, .. } => znaxes.clone(),
            HduKind::AsciiTable {
                naxis2, tfields, ..
            }
            | HduKind::BinaryTable {
                naxis2, tfields, ..
            } => vec![*naxis2, *tfields],
        }
    }

    /// Names of the random-groups parameters (`PTYPEn`).
    pub fn group_parameter_names(&self) -> Vec<String> {
        let HduKind::RandomGroups { pcount, .. } = self.kind else {
            return Vec::new();
        };
        (1..=pcount)
            .map(|i| {
                string_value(&self.header, &format!("PTYPE{i}"))
                    .unwrap_or("")
                    .to_string()
            })
            .collect()
    }

    fn dimensions_text(&self) -> String {
        match &self.kind {
            HduKind::AsciiTable {
                naxis2, tfields, ..
            }
            | HduKind::BinaryTable {
                naxis2, tfields, ..
            } => format!("{naxis2}R x {tfields}C"),
            _ => {
                let dims: Vec<String> = self.dimensions().iter().map(|d| d.to_string()).collect();
                format!("({})", dims.join(", "))
            }
        }
    }

    fn format_text(&self) -> String {
        match &self.kind {
            HduKind::AsciiTable { tfields, .. } | HduKind::BinaryTable { tfields, .. } => {
                let forms: Vec<&str> = (1..=*tfields)
                    .map(|i| string_value(&self.header, &format!("TFORM{i}")).unwrap_or("?"))
                    .collect();
                format!("[{}]", forms.join(", "))
            }
            _ => match self.bitpix() {
                Some(8) => "uint8".into(),
                Some(16) => "int16".into(),
                Some(32) => "int32".into(),
                Some(64) => "int64".into(),
                Some(-32) => "float32".into(),
                Some(-64) => "float64".into(),
                _ => String::new(),
            },
        }
    }

    /// The HDU as FITS blocks: header, then data padded to a whole block
    /// (with blanks for ASCII tables, zeros otherwise).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header.to_bytes();
        let mut data = self.data.clone();
        let pad = if matches!(self.kind, HduKind::AsciiTable { .. }) {
            HEADER_PAD_BYTE
        } else {
            DATA_PAD_BYTE
        };
        pad_to_block(&mut data, pad);
        out.extend_from_slice(&data);
        out
    }
}

/// Identifies an HDU on the command line: `3`, `SCI` or `SCI,2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduSelector {
    Index(usize),
    Name(String),
    NameVersion(String, i64),
}

impl core::str::FromStr for HduSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidValue("empty HDU selector"));
        }
        if let Ok(index) = s.parse::<usize>() {
            return Ok(HduSelector::Index(index));
        }
        match s.rsplit_once(',') {
            Some((name, version)) => {
                let version = version
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidValue("EXTVER must be an integer"))?;
                Ok(HduSelector::NameVersion(name.trim().to_string(), version))
            }
            None => Ok(HduSelector::Name(s.to_string())),
        }
    }
}

impl core::fmt::Display for HduSelector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HduSelector::Index(i) => write!(f, "{i}"),
            HduSelector::Name(name) => write!(f, "{name}"),
            HduSelector::NameVersion(name, version) => write!(f, "{name},{version}"),
        }
    }
}

/// All HDUs of a FITS file, the primary HDU first.
#[derive(Debug, Clone, PartialEq)]
pub struct FitsData {
    pub hdus: Vec<Hdu>,
}

impl FitsData {
    pub fn primary(&self) -> &Hdu {
        &self.hdus[0]
    }

    pub fn get(&self, index: usize) -> Option<&Hdu> {
        self.hdus.get(index)
    }

    pub fn len(&self) -> usize {
        self.hdus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hdus.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hdu> {
        self.hdus.iter()
    }

    /// First HDU whose EXTNAME matches `name` (case-insensitive) and, when
    /// given, whose EXTVER equals `version`.
    pub fn find(&self, name: &str, version: Option<i64>) -> Option<(usize, &Hdu)> {
        let name = name.trim();
        self.hdus.iter().enumerate().find(|(_, hdu)| {
            hdu.name().eq_ignore_ascii_case(name) && version.map_or(true, |v| hdu.version() == v)
        })
    }

    pub fn select(&self, selector: &HduSelector) -> Result<(usize, &Hdu)> {
        let found = match selector {
            HduSelector::Index(i) => self.hdus.get(*i).map(|hdu| (*i, hdu)),
            HduSelector::Name(name) => self.find(name, None),
            HduSelector::NameVersion(name, version) => self.find(name, Some(*version)),
        };
        found.ok_or_else(|| Error::HduNotFound(selector.to_string()))
    }

    /// One line per HDU: index, name, type, card count, dimensions and
    /// data format, below a title line.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{:<4} {:<12} {:<18} {:>5}   {:<16} {}",
            "No.", "Name", "Type", "Cards", "Dimensions", "Format"
        )];
        for (i, hdu) in self.hdus.iter().enumerate() {
            lines.push(format!(
                "{:<4} {:<12} {:<18} {:>5}   {:<16} {}",
                i,
                hdu.name(),
                hdu.type_name(),
                hdu.header.len(),
                hdu.dimensions_text(),
                hdu.format_text()
            ));
        }
        lines
    }

    /// The whole file as FITS blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.hdus.iter().flat_map(Hdu::to_bytes).collect()
    }
}

/// Parse a complete FITS byte stream into its HDUs.
///
/// The first HDU must be primary. Missing padding after the last data
/// segment is tolerated; unreadable bytes after a valid HDU are ignored
/// with a warning.
pub fn parse_fits(data: &[u8]) -> Result<FitsData> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }

    let mut hdus: Vec<Hdu> = Vec::new();
    let mut offset: usize = 0;

    while offset < data.len() {
        let remaining = &data[offset..];
        if remaining.len() < BLOCK_SIZE {
            if remaining.iter().any(|&b| b != 0) {
                warn!("ignoring {} trailing bytes", remaining.len());
            }
            break;
        }

        let parsed = header_byte_len(remaining).and_then(|header_len| {
            let header = Header::from_bytes(&remaining[..header_len])?;
            Ok((header_len, header))
        });
        let (header_len, header) = match parsed {
            Ok(parsed) => parsed,
            Err(e) if !hdus.is_empty() => {
                warn!("ignoring data after HDU {}: {e}", hdus.len() - 1);
                break;
            }
            Err(e) => return Err(e),
        };

        let is_primary = hdus.is_empty();
        if is_primary && header.cards().first().map(|c| c.keyword()) != Some("SIMPLE") {
            return Err(Error::InvalidHeader("first HDU must be primary"));
        }

        let kind = classify(&header, is_primary)?;
        let data_len = data_byte_len(&header, &kind)?;
        let data_start = offset + header_len;
        let data_end = data_start
            .checked_add(data_len)
            .filter(|&end| end <= data.len())
            .ok_or(Error::UnexpectedEof)?;

        hdus.push(Hdu {
            kind,
            header,
            data: data[data_start..data_end].to_vec(),
            header_start: offset,
            data_start,
        });
        offset = data_start + padded_byte_len(data_len);
    }

    Ok(FitsData { hdus })
}

/// Read and parse a FITS file.
#[cfg(feature = "std")]
pub fn read_fits_file<P: AsRef<std::path::Path>>(path: P) -> Result<FitsData> {
    let bytes = std::fs::read(path)?;
    parse_fits(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;

    fn card(keyword: &str, value: impl Into<Value>) -> Card {
        Card::new(keyword, value, None).unwrap()
    }

    fn primary_header(bitpix: i64, dims: &[usize]) -> Header {
        let mut cards = vec![
            card("SIMPLE", true),
            card("BITPIX", bitpix),
            card("NAXIS", dims.len()),
        ];
        for (i, d) in dims.iter().enumerate() {
            cards.push(card(&format!("NAXIS{}", i + 1), *d));
        }
        Header::from_cards(cards)
    }

    fn image_header(bitpix: i64, dims: &[usize], extname: Option<&str>) -> Header {
        let mut cards = vec![
            card("XTENSION", "IMAGE"),
            card("BITPIX", bitpix),
            card("NAXIS", dims.len()),
        ];
        for (i, d) in dims.iter().enumerate() {
            cards.push(card(&format!("NAXIS{}", i + 1), *d));
        }
        cards.push(card("PCOUNT", 0i64));
        cards.push(card("GCOUNT", 1i64));
        if let Some(name) = extname {
            cards.push(card("EXTNAME", name));
        }
        Header::from_cards(cards)
    }

    fn bintable_header(naxis1: usize, naxis2: usize, pcount: usize) -> Header {
        Header::from_cards(vec![
            card("XTENSION", "BINTABLE"),
            card("BITPIX", 8i64),
            card("NAXIS", 2i64),
            card("NAXIS1", naxis1),
            card("NAXIS2", naxis2),
            card("PCOUNT", pcount),
            card("GCOUNT", 1i64),
            card("TFIELDS", 1i64),
            card("TFORM1", "1J"),
            card("EXTNAME", "EVENTS"),
        ])
    }

    fn file(hdus: &[(Header, usize)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (header, data_len) in hdus {
            out.extend_from_slice(&header.to_bytes());
            let mut data = vec![1u8; *data_len];
            pad_to_block(&mut data, 0);
            out.extend_from_slice(&data);
        }
        out
    }

    #[test]
    fn parse_minimal_primary() {
        let fits = parse_fits(&file(&[(primary_header(8, &[]), 0)])).unwrap();
        assert_eq!(fits.len(), 1);
        assert_eq!(
            fits.primary().kind,
            HduKind::Primary {
                bitpix: 8,
                naxes: vec![]
            }
        );
        assert_eq!(fits.primary().name(), "PRIMARY");
        assert!(fits.primary().data.is_empty());
    }

    #[test]
    fn parse_multi_extension_offsets() {
        let bytes = file(&[
            (primary_header(16, &[10, 10]), 200),
            (image_header(-32, &[4, 3], Some("SCI")), 48),
            (bintable_header(4, 5, 0), 20),
        ]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.len(), 3);
        assert_eq!(fits.hdus[1].header_start, 2 * BLOCK_SIZE);
        assert_eq!(fits.hdus[1].data_start, 3 * BLOCK_SIZE);
        assert_eq!(fits.hdus[1].data.len(), 48);
        assert_eq!(fits.hdus[2].type_name(), "BinTableHDU");
        assert_eq!(fits.hdus[2].dimensions(), vec![5, 1]);
    }

    #[test]
    fn data_length_includes_heap() {
        let header = bintable_header(8, 10, 100);
        let kind = classify(&header, false).unwrap();
        assert_eq!(data_byte_len(&header, &kind).unwrap(), 180);
    }

    #[test]
    fn random_groups_size_and_parameters() {
        let header = Header::from_cards(vec![
            card("SIMPLE", true),
            card("BITPIX", -32i64),
            card("NAXIS", 3i64),
            card("NAXIS1", 0i64),
            card("NAXIS2", 3i64),
            card("NAXIS3", 2i64),
            card("GROUPS", true),
            card("PCOUNT", 2i64),
            card("GCOUNT", 4i64),
            card("PTYPE1", "UU"),
            card("PTYPE2", "VV"),
        ]);
        let kind = classify(&header, true).unwrap();
        assert_eq!(data_byte_len(&header, &kind).unwrap(), 4 * 4 * (2 + 6));
        let hdu = Hdu::new(header, vec![0; 128], true).unwrap();
        assert_eq!(hdu.type_name(), "GroupsHDU");
        assert_eq!(hdu.group_parameter_names(), vec!["UU", "VV"]);
    }

    #[test]
    fn unknown_extension_is_kept() {
        let header = Header::from_cards(vec![
            card("XTENSION", "FOREIGN"),
            card("BITPIX", 8i64),
            card("NAXIS", 1i64),
            card("NAXIS1", 10i64),
            card("PCOUNT", 0i64),
            card("GCOUNT", 1i64),
        ]);
        let bytes = file(&[(primary_header(8, &[]), 0), (header, 10)]);
        let fits = parse_fits(&bytes).unwrap();
        assert!(matches!(&fits.hdus[1].kind, HduKind::Unknown { xtension, .. } if xtension == "FOREIGN"));
        assert_eq!(fits.hdus[1].type_name(), "NonstandardExtHDU");
    }

    #[test]
    fn find_and_select() {
        let mut second = image_header(8, &[2], Some("SCI"));
        second.set("EXTVER", 2i64, None).unwrap();
        let bytes = file(&[
            (primary_header(8, &[]), 0),
            (image_header(8, &[2], Some("SCI")), 2),
            (second, 2),
        ]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.find("sci", None).unwrap().0, 1);
        assert_eq!(fits.find("SCI", Some(2)).unwrap().0, 2);
        assert!(fits.find("SCI", Some(3)).is_none());

        let sel: HduSelector = "SCI,2".parse().unwrap();
        assert_eq!(fits.select(&sel).unwrap().0, 2);
        let sel: HduSelector = "0".parse().unwrap();
        assert_eq!(fits.select(&sel).unwrap().1.name(), "PRIMARY");
        let sel: HduSelector = "DQ".parse().unwrap();
        assert!(matches!(fits.select(&sel), Err(Error::HduNotFound(k)) if k == "DQ"));
        assert!("SCI,x".parse::<HduSelector>().is_err());
    }

    #[test]
    fn missing_padding_is_tolerated() {
        let mut bytes = primary_header(8, &[100]).to_bytes();
        bytes.extend_from_slice(&[7u8; 100]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.primary().data, vec![7u8; 100]);
    }

    #[test]
    fn errors() {
        assert!(matches!(parse_fits(&[]), Err(Error::UnexpectedEof)));

        let ext_first = file(&[(image_header(8, &[], None), 0)]);
        assert!(matches!(parse_fits(&ext_first), Err(Error::InvalidHeader(_))));

        let mut truncated = primary_header(16, &[100, 100]).to_bytes();
        truncated.extend_from_slice(&[0u8; 100]);
        assert!(matches!(parse_fits(&truncated), Err(Error::UnexpectedEof)));

        let bad_bitpix = file(&[(primary_header(12, &[]), 0)]);
        assert!(matches!(parse_fits(&bad_bitpix), Err(Error::InvalidBitpix(12))));
    }

    #[test]
    fn oversized_axis_is_an_error() {
        let huge = file(&[(primary_header(16, &[i64::MAX as usize]), 0)]);
        assert!(matches!(parse_fits(&huge), Err(Error::UnexpectedEof)));

        let overflow = file(&[(primary_header(16, &[usize::MAX]), 0)]);
        assert!(parse_fits(&overflow).is_err());
    }

    #[test]
    fn selector_splits_version_at_last_comma() {
        let sel: HduSelector = "A,B,3".parse().unwrap();
        assert_eq!(sel, HduSelector::NameVersion("A,B".to_string(), 3));
    }

    #[test]
    fn trailing_garbage_after_valid_hdu_is_ignored() {
        let mut bytes = file(&[(primary_header(8, &[]), 0)]);
        bytes.extend_from_slice(&vec![b'x'; BLOCK_SIZE]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.len(), 1);
    }

    #[test]
    fn to_bytes_round_trip() {
        let bytes = file(&[
            (primary_header(16, &[3]), 6),
            (bintable_header(4, 2, 0), 8),
        ]);
        let fits = parse_fits(&bytes).unwrap();
        assert_eq!(fits.to_bytes(), bytes);
    }

    fn compressed_header() -> Header {
        Header::from_cards(vec![
            card("XTENSION", "BINTABLE"),
            card("BITPIX", 8i64),
            card("NAXIS", 2i64),
            card("NAXIS1", 8i64),
            card("NAXIS2", 4i64),
            card("PCOUNT", 64i64),
            card("GCOUNT", 1i64),
            card("TFIELDS", 1i64),
            card("TTYPE1", "COMPRESSED_DATA"),
            card("TFORM1", "1PB(16)"),
            card("ZIMAGE", true),
            card("ZTILE1", 10i64),
            card("ZCMPTYPE", "RICE_1"),
            Card::new("ZBITPIX", 16i64, Some("data type of original image")).unwrap(),
            card("ZNAXIS", 2i64),
            card("ZNAXIS1", 10i64),
            card("ZNAXIS2", 4i64),
            card("EXTNAME", "SCI"),
            card("ZDATASUM", "12345"),
            card("OBJECT", "M87"),
        ])
    }

    #[test]
    fn compressed_image_header_restores_image_keywords() {
        let image = compressed_image_header(&compressed_header()).unwrap();
        let keys: Vec<&str> = image.keywords().collect();
        assert_eq!(
            keys,
            vec![
                "XTENSION", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "PCOUNT", "GCOUNT", "EXTNAME",
                "DATASUM", "OBJECT"
            ]
        );
        assert_eq!(image.get("XTENSION"), Some(&Value::from("IMAGE")));
        assert_eq!(image.get("BITPIX"), Some(&Value::Integer(16)));
        assert_eq!(image.comment("BITPIX"), Some("data type of original image"));
        assert_eq!(image.get("NAXIS1"), Some(&Value::Integer(10)));
        assert_eq!(image.get("PCOUNT"), Some(&Value::Integer(0)));
        assert_eq!(image.get("DATASUM"), Some(&Value::from("12345")));

        let kind = classify(&image, false).unwrap();
        assert_eq!(
            kind,
            HduKind::Image {
                bitpix: 16,
                naxes: vec![10, 4]
            }
        );
    }

    #[test]
    fn compressed_primary_image_header() {
        let mut header = compressed_header();
        header.set("ZSIMPLE", true, None).unwrap();
        header.set("ZEXTEND", true, None).unwrap();
        let image = compressed_image_header(&header).unwrap();
        assert_eq!(image.cards()[0].keyword(), "SIMPLE");
        assert!(!image.contains("XTENSION"));
        assert!(!image.contains("PCOUNT"));
        assert_eq!(image.get("EXTEND"), Some(&Value::Logical(true)));

        header.remove("ZBITPIX").unwrap();
        assert!(matches!(
            compressed_image_header(&header),
            Err(Error::MissingKeyword("ZBITPIX"))
        ));
    }

    #[test]
    fn summary_lines() {
        let bytes = file(&[
            (primary_header(16, &[10, 20]), 400),
            (bintable_header(4, 5, 0), 20),
        ]);
        let summary = parse_fits(&bytes).unwrap().summary();
        assert_eq!(summary.len(), 3);
        assert!(summary[0].starts_with("No."));
        assert!(summary[1].contains("PrimaryHDU"));
        assert!(summary[1].contains("(10, 20)"));
        assert!(summary[1].ends_with("int16"));
        assert!(summary[2].contains("EVENTS"));
        assert!(summary[2].contains("5R x 1C"));
        assert!(summary[2].ends_with("[1J]"));
    }

    #[test]
    fn hdu_new_checks_data_size() {
        assert!(Hdu::new(primary_header(8, &[4]), vec![0; 3], true).is_err());
        assert!(Hdu::new(primary_header(8, &[4]), vec![0; 4], true).is_ok());
    }
}
