//! Table column definitions read from and written to header keywords
//! (`TTYPEn`, `TFORMn`, `TUNITn`, ...).

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::card::Card;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::value::Value;

/// Element type of a binary table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryType {
    /// L -- logical, one byte.
    Logical,
    /// X -- bit array.
    Bit,
    /// B -- unsigned byte.
    Byte,
    /// I -- 16-bit integer.
    Short,
    /// J -- 32-bit integer.
    Int,
    /// K -- 64-bit integer.
    Long,
    /// A -- character.
    Char,
    /// E -- 32-bit float.
    Float,
    /// D -- 64-bit float.
    Double,
    /// C -- pair of 32-bit floats.
    ComplexFloat,
    /// M -- pair of 64-bit floats.
    ComplexDouble,
}

impl BinaryType {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'L' => BinaryType::Logical,
            b'X' => BinaryType::Bit,
            b'B' => BinaryType::Byte,
            b'I' => BinaryType::Short,
            b'J' => BinaryType::Int,
            b'K' => BinaryType::Long,
            b'A' => BinaryType::Char,
            b'E' => BinaryType::Float,
            b'D' => BinaryType::Double,
            b'C' => BinaryType::ComplexFloat,
            b'M' => BinaryType::ComplexDouble,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            BinaryType::Logical => 'L',
            BinaryType::Bit => 'X',
            BinaryType::Byte => 'B',
            BinaryType::Short => 'I',
            BinaryType::Int => 'J',
            BinaryType::Long => 'K',
            BinaryType::Char => 'A',
            BinaryType::Float => 'E',
            BinaryType::Double => 'D',
            BinaryType::ComplexFloat => 'C',
            BinaryType::ComplexDouble => 'M',
        }
    }

    /// Bytes per element; 0 for bits, which are packed.
    pub fn element_size(self) -> usize {
        match self {
            BinaryType::Bit => 0,
            BinaryType::Logical | BinaryType::Byte | BinaryType::Char => 1,
            BinaryType::Short => 2,
            BinaryType::Int | BinaryType::Float => 4,
            BinaryType::Long | BinaryType::Double | BinaryType::ComplexFloat => 8,
            BinaryType::ComplexDouble => 16,
        }
    }
}

/// Field type of an ASCII table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiType {
    /// Aw
    Char,
    /// Iw
    Integer,
    /// Fw.d
    Fixed,
    /// Ew.d
    Exponent,
    /// Dw.d
    Double,
}

impl AsciiType {
    pub fn code(self) -> char {
        match self {
            AsciiType::Char => 'A',
            AsciiType::Integer => 'I',
            AsciiType::Fixed => 'F',
            AsciiType::Exponent => 'E',
            AsciiType::Double => 'D',
        }
    }
}

/// A parsed `TFORMn` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// `rT` in a binary table.
    Binary { repeat: usize, kind: BinaryType },
    /// `rPt(max)` / `rQt(max)` variable-length array descriptor.
    VarArray {
        /// `Q` (64-bit) descriptor rather than `P`.
        long: bool,
        kind: BinaryType,
        max_len: Option<usize>,
    },
    /// `Tw` or `Tw.d` in an ASCII table.
    Ascii {
        kind: AsciiType,
        width: usize,
        precision: Option<usize>,
    },
}

fn parse_count(s: &str, tform: &str) -> Result<usize> {
    s.parse::<usize>()
        .map_err(|_| Error::InvalidColumnFormat(tform.to_string()))
}

impl ColumnFormat {
    /// Parse a binary table TFORM such as `1J`, `10E`, `20A`, `1024X` or
    /// `1PB(200)`.
    pub fn parse_binary(tform: &str) -> Result<Self> {
        let invalid = || Error::InvalidColumnFormat(tform.to_string());
        let s = tform.trim().to_ascii_uppercase();
        if s.is_empty() {
            return Err(invalid());
        }

        let (body, max_len) = match s.find('(') {
            Some(open) => {
                let inner = s[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
                let max = if inner.trim().is_empty() {
                    None
                } else {
                    Some(parse_count(inner.trim(), tform)?)
                };
                (&s[..open], max)
            }
            None => (&s[..], None),
        };

        let digits = body.bytes().take_while(u8::is_ascii_digit).count();
        let repeat = if digits == 0 {
            1
        } else {
            parse_count(&body[..digits], tform)?
        };
        let code = &body.as_bytes()[digits..];

        match code {
            [d @ (b'P' | b'Q'), t] => {
                if repeat > 1 {
                    return Err(invalid());
                }
                let kind = BinaryType::from_code(*t).ok_or_else(invalid)?;
                Ok(ColumnFormat::VarArray {
                    long: *d == b'Q',
                    kind,
                    max_len,
                })
            }
            [t] if max_len.is_none() => {
                let kind = BinaryType::from_code(*t).ok_or_else(invalid)?;
                repeat.checked_mul(kind.element_size()).ok_or_else(invalid)?;
                Ok(ColumnFormat::Binary { repeat, kind })
            }
            _ => Err(invalid()),
        }
    }

    /// Parse an ASCII table TFORM: `Aw`, `Iw`, `Fw.d`, `Ew.d` or `Dw.d`.
    pub fn parse_ascii(tform: &str) -> Result<Self> {
        let invalid = || Error::InvalidColumnFormat(tform.to_string());
        let s = tform.trim().to_ascii_uppercase();
        let code = *s.as_bytes().first().ok_or_else(invalid)?;
        let rest = &s[1..];

        let kind = match code {
            b'A' => AsciiType::Char,
            b'I' => AsciiType::Integer,
            b'F' => AsciiType::Fixed,
            b'E' => AsciiType::Exponent,
            b'D' => AsciiType::Double,
            _ => return Err(invalid()),
        };

        let (width, precision) = match (kind, rest.split_once('.')) {
            (AsciiType::Char | AsciiType::Integer, None) => (parse_count(rest, tform)?, None),
            (AsciiType::Fixed | AsciiType::Exponent | AsciiType::Double, Some((w, d))) => {
                (parse_count(w, tform)?, Some(parse_count(d, tform)?))
            }
            _ => return Err(invalid()),
        };
        if width == 0 {
            return Err(invalid());
        }
        Ok(ColumnFormat::Ascii {
            kind,
            width,
            precision,
        })
    }

    /// Bytes the column occupies in one row.
    pub fn byte_width(&self) -> usize {
        match *self {
            ColumnFormat::Binary {
                repeat,
                kind: BinaryType::Bit,
            } => repeat.div_ceil(8),
            ColumnFormat::Binary { repeat, kind } => repeat.saturating_mul(kind.element_size()),
            ColumnFormat::VarArray { long: false, .. } => 8,
            ColumnFormat::VarArray { long: true, .. } => 16,
            ColumnFormat::Ascii { width, .. } => width,
        }
    }

    pub fn is_ascii(&self) -> bool {
        matches!(self, ColumnFormat::Ascii { .. })
    }
}

impl core::fmt::Display for ColumnFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            ColumnFormat::Binary { repeat, kind } => write!(f, "{repeat}{}", kind.code()),
            ColumnFormat::VarArray {
                long,
                kind,
                max_len,
            } => {
                write!(f, "1{}{}", if long { 'Q' } else { 'P' }, kind.code())?;
                if let Some(max) = max_len {
                    write!(f, "({max})")?;
                }
                Ok(())
            }
            ColumnFormat::Ascii {
                kind,
                width,
                precision,
            } => {
                write!(f, "{}{width}", kind.code())?;
                if let Some(d) = precision {
                    write!(f, ".{d}")?;
                }
                Ok(())
            }
        }
    }
}

/// Which table extension the columns belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Ascii,
    Binary,
}

/// One column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// TTYPEn
    pub name: Option<String>,
    /// TFORMn
    pub format: ColumnFormat,
    /// TUNITn
    pub unit: Option<String>,
    /// TNULLn: an integer in binary tables, a string in ASCII tables.
    pub null: Option<Value>,
    /// TSCALn
    pub scale: Option<f64>,
    /// TZEROn
    pub zero: Option<f64>,
    /// TDISPn
    pub display: Option<String>,
    /// TDIMn, as written (e.g. `(3,4)`).
    pub dim: Option<String>,
    /// TBCOLn, 1-based start column of an ASCII table field.
    pub start: Option<usize>,
}

impl Column {
    pub fn new(name: &str, format: ColumnFormat) -> Self {
        Column {
            name: Some(name.to_string()),
            format,
            unit: None,
            null: None,
            scale: None,
            zero: None,
            display: None,
            dim: None,
            start: None,
        }
    }

    /// Axis lengths from TDIMn.
    pub fn dims(&self) -> Option<Vec<usize>> {
        let inner = self.dim.as_deref()?.trim().strip_prefix('(')?.strip_suffix(')')?;
        inner
            .split(',')
            .map(|d| d.trim().parse::<usize>().ok())
            .collect()
    }
}

/// The column definitions of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColDefs {
    kind: TableKind,
    columns: Vec<Column>,
}

fn string_value(header: &Header, keyword: &str) -> Option<String> {
    header
        .get(keyword)
        .and_then(Value::as_str)
        .map(|s| s.trim_end().to_string())
}

impl ColDefs {
    /// Column definitions for a new table. ASCII columns without a start
    /// column are placed one after another.
    pub fn new(kind: TableKind, mut columns: Vec<Column>) -> Result<Self> {
        let mut next_start = 1;
        for column in &mut columns {
            if column.format.is_ascii() != (kind == TableKind::Ascii) {
                return Err(Error::InvalidColumnFormat(column.format.to_string()));
            }
            if kind == TableKind::Ascii {
                let start = *column.start.get_or_insert(next_start);
                if start == 0 {
                    return Err(Error::InvalidHeader("TBCOL must be at least 1"));
                }
                next_start = start
                    .checked_add(column.format.byte_width())
                    .ok_or(Error::InvalidHeader("table row too wide"))?;
            }
        }
        Ok(ColDefs { kind, columns })
    }

    /// Read the `TFIELDS` columns described by a table header.
    pub fn from_header(header: &Header) -> Result<Self> {
        let kind = match header.get("XTENSION").and_then(Value::as_str).map(str::trim_end) {
            Some("TABLE") => TableKind::Ascii,
            Some("BINTABLE") | Some("A3DTABLE") => TableKind::Binary,
            Some(other) => return Err(Error::UnsupportedExtension(other.to_string())),
            None => return Err(Error::MissingKeyword("XTENSION")),
        };
        let tfields = header
            .get("TFIELDS")
            .and_then(Value::as_i64)
            .ok_or(Error::MissingKeyword("TFIELDS"))?;

        let mut columns = Vec::new();
        for i in 1..=tfields {
            let tform = string_value(header, &format!("TFORM{i}")).ok_or(Error::MissingKeyword("TFORMn"))?;
            let format = match kind {
                TableKind::Ascii => ColumnFormat::parse_ascii(&tform)?,
                TableKind::Binary => ColumnFormat::parse_binary(&tform)?,
            };
            let float = |name: &str| header.get(&format!("{name}{i}")).and_then(Value::as_f64);
            let start = match header.get(&format!("TBCOL{i}")).and_then(Value::as_i64) {
                Some(n) if n < 1 => return Err(Error::InvalidHeader("TBCOL must be at least 1")),
                Some(n) => usize::try_from(n).ok(),
                None => None,
            };
            columns.push(Column {
                name: string_value(header, &format!("TTYPE{i}")),
                format,
                unit: string_value(header, &format!("TUNIT{i}")),
                null: header.get(&format!("TNULL{i}")).cloned(),
                scale: float("TSCAL"),
                zero: float("TZERO"),
                display: string_value(header, &format!("TDISP{i}")),
                dim: string_value(header, &format!("TDIM{i}")),
                start,
            });
        }
        Ok(ColDefs { kind, columns })
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Column names in order; unnamed columns give an empty string.
    pub fn names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_deref().unwrap_or(""))
            .collect()
    }

    /// Case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| {
            c.name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name.trim()))
        })
    }

    /// Bytes per row (NAXIS1).
    pub fn row_width(&self) -> usize {
        match self.kind {
            TableKind::Binary => self
                .columns
                .iter()
                .fold(0usize, |acc, c| acc.saturating_add(c.format.byte_width())),
            TableKind::Ascii => {
                let mut next = 1;
                let mut width = 0;
                for c in &self.columns {
                    let start = c.start.unwrap_or(next);
                    let end = start.saturating_sub(1).saturating_add(c.format.byte_width());
                    width = width.max(end);
                    next = end.saturating_add(1);
                }
                width
            }
        }
    }

    /// Byte offset of each column within a row.
    pub fn offsets(&self) -> Vec<usize> {
        let mut next = 0;
        self.columns
            .iter()
            .map(|c| {
                let offset = match (self.kind, c.start) {
                    (TableKind::Ascii, Some(start)) => start.saturating_sub(1),
                    _ => next,
                };
                next = offset.saturating_add(c.format.byte_width());
                offset
            })
            .collect()
    }

    /// The column keywords, column by column.
    pub fn to_cards(&self) -> Result<Vec<Card>> {
        let mut cards = Vec::new();
        for (i, c) in self.columns.iter().enumerate() {
            let n = i + 1;
            if let Some(name) = &c.name {
                cards.push(Card::new(&format!("TTYPE{n}"), name.as_str(), None)?);
            }
            cards.push(Card::new(&format!("TFORM{n}"), c.format.to_string(), None)?);
            if let Some(start) = c.start.filter(|_| self.kind == TableKind::Ascii) {
                cards.push(Card::new(&format!("TBCOL{n}"), start, None)?);
            }
            if let Some(unit) = &c.unit {
                cards.push(Card::new(&format!("TUNIT{n}"), unit.as_str(), None)?);
            }
            if let Some(null) = &c.null {
                cards.push(Card::new(&format!("TNULL{n}"), null.clone(), None)?);
            }
            if let Some(scale) = c.scale {
                cards.push(Card::new(&format!("TSCAL{n}"), scale, None)?);
            }
            if let Some(zero) = c.zero {
                cards.push(Card::new(&format!("TZERO{n}"), zero, None)?);
            }
            if let Some(display) = &c.display {
                cards.push(Card::new(&format!("TDISP{n}"), display.as_str(), None)?);
            }
            if let Some(dim) = &c.dim {
                cards.push(Card::new(&format!("TDIM{n}"), dim.as_str(), None)?);
            }
        }
        Ok(cards)
    }

    /// A complete extension header for a table of `rows` rows with these
    /// columns.
    pub fn table_header(&self, rows: usize) -> Result<Header> {
        let xtension = match self.kind {
            TableKind::Ascii => "TABLE",
            TableKind::Binary => "BINTABLE",
        };
        let mut cards = vec![
            Card::new("XTENSION", xtension, Some("table extension"))?,
            Card::new("BITPIX", 8i64, Some("8-bit bytes"))?,
            Card::new("NAXIS", 2i64, Some("2-dimensional table"))?,
            Card::new("NAXIS1", self.row_width(), Some("width of table in bytes"))?,
            Card::new("NAXIS2", rows, Some("number of rows in table"))?,
            Card::new("PCOUNT", 0i64, Some("size of special data area"))?,
            Card::new("GCOUNT", 1i64, Some("one data group"))?,
            Card::new("TFIELDS", self.columns.len(), Some("number of fields in each row"))?,
        ];
        cards.extend(self.to_cards()?);
        Ok(Header::from_cards(cards))
    }
}
