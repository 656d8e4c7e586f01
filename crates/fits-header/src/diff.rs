//! Structural comparison of headers, HDUs and whole FITS files.
//!
//! Each diff type is built eagerly by its constructor and exposes its
//! findings as public fields, plus [`identical`](FitsDiff::identical) and a
//! human-readable `report()`.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use libm::fabs;

use crate::card::Card;
use crate::columns::{ColDefs, Column};
use crate::error::Result;
use crate::hdu::{FitsData, Hdu, HduKind};
use crate::header::{keyword_matches, Header};
use crate::image::{image_dimensions, read_image, ImageData};
use crate::value::{format_value, Value};

/// Per keyword, one entry per pairwise-compared occurrence: `None` when the
/// occurrences agree, `Some((a, b))` when they differ.
pub type KeywordDiffs<T> = BTreeMap<String, Vec<Option<(T, T)>>>;

/// Knobs shared by all comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffOptions {
    /// Keywords (wildcards allowed) left out of header comparison. `*`
    /// ignores headers entirely.
    pub ignore_keywords: Vec<String>,
    /// Keywords (wildcards allowed) whose comments are not compared.
    pub ignore_comments: Vec<String>,
    /// Table columns left out of comparison, case-insensitive. `*` ignores
    /// every column.
    pub ignore_fields: Vec<String>,
    /// Relative tolerance for floating-point values: `|a - b| <= tol * |b|`.
    pub tolerance: f64,
    /// Ignore trailing blanks in string values.
    pub ignore_blanks: bool,
    /// Leave fully blank cards out of header comparison.
    pub ignore_blank_cards: bool,
    /// Maximum number of individual differences recorded per data unit.
    /// `None` records all of them.
    pub numdiffs: Option<usize>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        DiffOptions {
            ignore_keywords: Vec::new(),
            ignore_comments: Vec::new(),
            ignore_fields: Vec::new(),
            tolerance: 0.0,
            ignore_blanks: true,
            ignore_blank_cards: true,
            numdiffs: Some(10),
        }
    }
}

impl DiffOptions {
    fn ignores_keyword(&self, keyword: &str) -> bool {
        self.ignore_keywords.iter().any(|p| keyword_matches(p, keyword))
    }

    fn ignores_comment(&self, keyword: &str) -> bool {
        self.ignore_comments.iter().any(|p| keyword_matches(p, keyword))
    }

    fn ignores_field(&self, name: &str) -> bool {
        self.ignore_fields
            .iter()
            .any(|f| f.trim() == "*" || f.trim().eq_ignore_ascii_case(name))
    }

    fn records_more(&self, recorded: usize) -> bool {
        self.numdiffs.map_or(true, |n| recorded < n)
    }
}

fn floats_differ(a: f64, b: f64, tolerance: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return false;
    }
    if tolerance == 0.0 {
        return a != b;
    }
    fabs(a - b) > tolerance * fabs(b)
}

fn values_differ(a: Option<&Value>, b: Option<&Value>, options: &DiffOptions) -> bool {
    let tol = options.tolerance;
    match (a, b) {
        (Some(Value::String(x)), Some(Value::String(y))) if options.ignore_blanks => {
            x.trim_end() != y.trim_end()
        }
        (Some(Value::Integer(x)), Some(Value::Integer(y))) => x != y,
        (Some(Value::ComplexFloat(ar, ai)), Some(Value::ComplexFloat(br, bi))) => {
            floats_differ(*ar, *br, tol) || floats_differ(*ai, *bi, tol)
        }
        (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => floats_differ(x, y, tol),
            _ => x != y,
        },
        _ => a != b,
    }
}

fn ratio(diffs: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        diffs as f64 / total as f64
    }
}

fn indented(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::new();
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn value_text(value: &Option<Value>) -> String {
    match value {
        Some(v) => format_value(v),
        None => "(undefined)".to_string(),
    }
}

fn shape_text(dims: &[usize]) -> String {
    if dims.is_empty() {
        return "(empty)".to_string();
    }
    dims.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" x ")
}

fn summary_line(out: &mut String, total: usize, shown: usize, ratio: f64, what: &str) {
    if total > shown {
        out.push_str(&format!(" ...{} additional difference(s) found.\n", total - shown));
    }
    out.push_str(&format!(
        " {total} different {what} found ({:.2}% different).\n",
        ratio * 100.0
    ));
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Differences between two headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderDiff {
    /// Card counts, when they differ.
    pub diff_keyword_count: Option<(usize, usize)>,
    /// Keywords present in both headers, sorted.
    pub common_keywords: Vec<String>,
    /// Keywords only in `a` and only in `b`, each sorted.
    pub diff_keywords: Option<(Vec<String>, Vec<String>)>,
    /// Keywords occurring a different number of times.
    pub diff_duplicate_keywords: BTreeMap<String, (usize, usize)>,
    pub diff_keyword_values: KeywordDiffs<Option<Value>>,
    pub diff_keyword_comments: KeywordDiffs<Option<String>>,
}

fn group_by_keyword<'h>(header: &'h Header, options: &DiffOptions) -> (usize, BTreeMap<String, Vec<&'h Card>>) {
    let mut count = 0;
    let mut groups: BTreeMap<String, Vec<&Card>> = BTreeMap::new();
    for card in header {
        if options.ignore_blank_cards && card.is_blank() {
            continue;
        }
        if options.ignores_keyword(card.keyword()) {
            continue;
        }
        count += 1;
        groups.entry(card.keyword().to_string()).or_default().push(card);
    }
    (count, groups)
}

impl HeaderDiff {
    pub fn new(a: &Header, b: &Header, options: &DiffOptions) -> Self {
        let mut diff = HeaderDiff::default();
        if options.ignore_keywords.iter().any(|p| p.trim() == "*") {
            return diff;
        }

        let (count_a, cards_a) = group_by_keyword(a, options);
        let (count_b, cards_b) = group_by_keyword(b, options);
        if count_a != count_b {
            diff.diff_keyword_count = Some((count_a, count_b));
        }

        diff.common_keywords = cards_a
            .keys()
            .filter(|k| cards_b.contains_key(*k))
            .cloned()
            .collect();
        let left: Vec<String> = cards_a
            .keys()
            .filter(|k| !cards_b.contains_key(*k))
            .cloned()
            .collect();
        let right: Vec<String> = cards_b
            .keys()
            .filter(|k| !cards_a.contains_key(*k))
            .cloned()
            .collect();
        if !left.is_empty() || !right.is_empty() {
            diff.diff_keywords = Some((left, right));
        }

        for keyword in &diff.common_keywords {
            let (occ_a, occ_b) = (&cards_a[keyword], &cards_b[keyword]);
            if occ_a.len() != occ_b.len() {
                diff.diff_duplicate_keywords
                    .insert(keyword.clone(), (occ_a.len(), occ_b.len()));
            }

            let values: Vec<_> = occ_a
                .iter()
                .zip(occ_b)
                .map(|(x, y)| {
                    values_differ(x.value(), y.value(), options)
                        .then(|| (x.value().cloned(), y.value().cloned()))
                })
                .collect();
            if values.iter().any(Option::is_some) {
                diff.diff_keyword_values.insert(keyword.clone(), values);
            }

            if options.ignores_comment(keyword) {
                continue;
            }
            let comments: Vec<_> = occ_a
                .iter()
                .zip(occ_b)
                .map(|(x, y)| {
                    (x.comment() != y.comment()).then(|| {
                        (x.comment().map(str::to_string), y.comment().map(str::to_string))
                    })
                })
                .collect();
            if comments.iter().any(Option::is_some) {
                diff.diff_keyword_comments.insert(keyword.clone(), comments);
            }
        }
        diff
    }

    pub fn identical(&self) -> bool {
        self.diff_keyword_count.is_none()
            && self.diff_keywords.is_none()
            && self.diff_duplicate_keywords.is_empty()
            && self.diff_keyword_values.is_empty()
            && self.diff_keyword_comments.is_empty()
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some((a, b)) = self.diff_keyword_count {
            out.push_str("Headers have different number of cards:\n");
            out.push_str(&format!(" a: {a}\n b: {b}\n"));
        }
        if let Some((left, right)) = &self.diff_keywords {
            for keyword in left {
                out.push_str(&format!("Extra keyword {keyword:<8} in a\n"));
            }
            for keyword in right {
                out.push_str(&format!("Extra keyword {keyword:<8} in b\n"));
            }
        }
        for (keyword, (a, b)) in &self.diff_duplicate_keywords {
            out.push_str(&format!("Inconsistent duplicates of keyword {keyword:<8}:\n"));
            out.push_str(&format!(" Occurs {a} time(s) in a, {b} time(s) in b\n"));
        }
        for (keyword, pairs) in &self.diff_keyword_values {
            for (n, pair) in pairs.iter().enumerate() {
                let Some((a, b)) = pair else { continue };
                let label = occurrence_label(keyword, n, pairs.len());
                out.push_str(&format!("Keyword {label:<11} has different values:\n"));
                out.push_str(&format!("   a> {}\n   b> {}\n", value_text(a), value_text(b)));
            }
        }
        for (keyword, pairs) in &self.diff_keyword_comments {
            for (n, pair) in pairs.iter().enumerate() {
                let Some((a, b)) = pair else { continue };
                let label = occurrence_label(keyword, n, pairs.len());
                out.push_str(&format!("Keyword {label:<11} has different comments:\n"));
                out.push_str(&format!(
                    "   a> {}\n   b> {}\n",
                    a.as_deref().unwrap_or(""),
                    b.as_deref().unwrap_or("")
                ));
            }
        }
        out
    }
}

fn occurrence_label(keyword: &str, n: usize, total: usize) -> String {
    if total > 1 {
        format!("{keyword}[{}]", n + 1)
    } else {
        keyword.to_string()
    }
}

// ---------------------------------------------------------------------------
// Data
// ---------------------------------------------------------------------------

/// One differing pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDiff {
    /// Zero-based coordinates, NAXIS1 first.
    pub index: Vec<usize>,
    pub a: f64,
    pub b: f64,
}

/// Pixel-by-pixel comparison of two images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageDataDiff {
    /// Image shapes, when they differ. No pixels are compared then.
    pub diff_dimensions: Option<(Vec<usize>, Vec<usize>)>,
    /// The first `numdiffs` differing pixels.
    pub diff_pixels: Vec<PixelDiff>,
    pub total_diffs: usize,
    /// `total_diffs` over the number of pixels.
    pub diff_ratio: f64,
}

fn unravel(mut flat: usize, dims: &[usize]) -> Vec<usize> {
    dims.iter()
        .map(|&d| {
            if d == 0 {
                return 0;
            }
            let coord = flat % d;
            flat /= d;
            coord
        })
        .collect()
}

fn pixels_differ(a: &ImageData, b: &ImageData, i: usize, tolerance: f64) -> bool {
    match (a.pixel_as_i64(i), b.pixel_as_i64(i)) {
        (Some(x), Some(y)) => x != y,
        _ => match (a.pixel_as_f64(i), b.pixel_as_f64(i)) {
            (Some(x), Some(y)) => floats_differ(x, y, tolerance),
            (x, y) => x.is_some() != y.is_some(),
        },
    }
}

impl ImageDataDiff {
    pub fn new(
        a: &ImageData,
        dims_a: &[usize],
        b: &ImageData,
        dims_b: &[usize],
        options: &DiffOptions,
    ) -> Self {
        let mut diff = ImageDataDiff::default();
        if dims_a != dims_b {
            diff.diff_dimensions = Some((dims_a.to_vec(), dims_b.to_vec()));
            return diff;
        }

        let len = a.len().min(b.len());
        for i in 0..len {
            if !pixels_differ(a, b, i, options.tolerance) {
                continue;
            }
            diff.total_diffs += 1;
            if options.records_more(diff.diff_pixels.len()) {
                diff.diff_pixels.push(PixelDiff {
                    index: unravel(i, dims_a),
                    a: a.pixel_as_f64(i).unwrap_or(f64::NAN),
                    b: b.pixel_as_f64(i).unwrap_or(f64::NAN),
                });
            }
        }
        diff.diff_ratio = ratio(diff.total_diffs, len);
        diff
    }

    /// Decode and compare the pixels of two image HDUs.
    pub fn from_hdus(a: &Hdu, b: &Hdu, options: &DiffOptions) -> Result<Self> {
        let dims_a = image_dimensions(a)?;
        let dims_b = image_dimensions(b)?;
        let pixels_a = read_image(a)?;
        let pixels_b = read_image(b)?;
        Ok(Self::new(&pixels_a, &dims_a, &pixels_b, &dims_b, options))
    }

    pub fn identical(&self) -> bool {
        self.diff_dimensions.is_none() && self.total_diffs == 0
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some((a, b)) = &self.diff_dimensions {
            out.push_str("Data dimensions differ:\n");
            out.push_str(&format!(" a: {}\n b: {}\n", shape_text(a), shape_text(b)));
            return out;
        }
        for pixel in &self.diff_pixels {
            let coords: Vec<String> = pixel.index.iter().map(usize::to_string).collect();
            out.push_str(&format!("Data differs at [{}]:\n", coords.join(", ")));
            out.push_str(&format!("   a> {}\n   b> {}\n", pixel.a, pixel.b));
        }
        if self.total_diffs > 0 {
            summary_line(&mut out, self.total_diffs, self.diff_pixels.len(), self.diff_ratio, "pixels");
        }
        out
    }
}

/// Byte-by-byte comparison of data segments that have no richer diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataDiff {
    /// Byte lengths, when they differ. No bytes are compared then.
    pub diff_dimensions: Option<(usize, usize)>,
    /// The first `numdiffs` differing bytes as `(offset, (a, b))`.
    pub diff_bytes: Vec<(usize, (u8, u8))>,
    pub total_diffs: usize,
    pub diff_ratio: f64,
}

impl RawDataDiff {
    pub fn new(a: &[u8], b: &[u8], options: &DiffOptions) -> Self {
        let mut diff = RawDataDiff::default();
        if a.len() != b.len() {
            diff.diff_dimensions = Some((a.len(), b.len()));
            return diff;
        }
        for (offset, (&x, &y)) in a.iter().zip(b).enumerate() {
            if x == y {
                continue;
            }
            diff.total_diffs += 1;
            if options.records_more(diff.diff_bytes.len()) {
                diff.diff_bytes.push((offset, (x, y)));
            }
        }
        diff.diff_ratio = ratio(diff.total_diffs, a.len());
        diff
    }

    pub fn identical(&self) -> bool {
        self.diff_dimensions.is_none() && self.total_diffs == 0
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some((a, b)) = self.diff_dimensions {
            out.push_str("Data sizes differ:\n");
            out.push_str(&format!(" a: {a} bytes\n b: {b} bytes\n"));
            return out;
        }
        for (offset, (a, b)) in &self.diff_bytes {
            out.push_str(&format!("Data differs at byte {offset}:\n"));
            out.push_str(&format!("   a> {a:#04x}\n   b> {b:#04x}\n"));
        }
        if self.total_diffs > 0 {
            summary_line(&mut out, self.total_diffs, self.diff_bytes.len(), self.diff_ratio, "bytes");
        }
        out
    }
}

/// A column attribute (`TFORM`, `TUNIT`, ...) that differs between tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAttributeDiff {
    pub column: String,
    pub attribute: &'static str,
    pub a: String,
    pub b: String,
}

/// A differing table cell as `(column, row)`, row zero-based.
pub type CellDiff = (String, usize);

/// Comparison of two tables: column definitions first, then the bytes of
/// each common column row by row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDiff {
    /// Column counts, when they differ.
    pub diff_column_count: Option<(usize, usize)>,
    /// Lower-cased names of the columns both tables share, sorted.
    pub common_column_names: Vec<String>,
    /// Columns only in `a` and only in `b`, each sorted.
    pub diff_column_names: Option<(Vec<String>, Vec<String>)>,
    pub diff_column_attributes: Vec<ColumnAttributeDiff>,
    /// Row counts, when they differ. Cells are not compared then.
    pub diff_row_count: Option<(usize, usize)>,
    /// The first `numdiffs` differing cells.
    pub diff_values: Vec<CellDiff>,
    pub total_diffs: usize,
    pub diff_ratio: f64,
}

/// The pieces of a table HDU a [`TableDiff`] needs.
struct TableView<'a> {
    columns: &'a ColDefs,
    offsets: Vec<usize>,
    row_width: usize,
    rows: usize,
    data: &'a [u8],
}

impl TableView<'_> {
    fn named(&self, options: &DiffOptions) -> BTreeMap<String, usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone().unwrap_or_default(), i))
            .filter(|(name, _)| !options.ignores_field(name))
            .map(|(name, i)| (name.to_ascii_lowercase(), i))
            .collect()
    }

    fn cell(&self, column: usize, row: usize) -> &[u8] {
        let width = self.columns.columns()[column].format.byte_width();
        row.checked_mul(self.row_width)
            .and_then(|s| s.checked_add(self.offsets[column]))
            .and_then(|start| Some(start..start.checked_add(width)?))
            .and_then(|range| self.data.get(range))
            .unwrap_or(&[])
    }
}

fn attribute_text<T: core::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}

fn column_attributes(c: &Column) -> [(&'static str, String); 8] {
    [
        ("TFORM", c.format.to_string()),
        ("TUNIT", attribute_text(&c.unit)),
        ("TNULL", attribute_text(&c.null)),
        ("TSCAL", attribute_text(&c.scale)),
        ("TZERO", attribute_text(&c.zero)),
        ("TDISP", attribute_text(&c.display)),
        ("TDIM", attribute_text(&c.dim)),
        ("TBCOL", attribute_text(&c.start)),
    ]
}

fn table_view(hdu: &Hdu, columns: &ColDefs) -> (usize, usize) {
    match hdu.kind {
        HduKind::AsciiTable { naxis1, naxis2, .. }
        | HduKind::BinaryTable { naxis1, naxis2, .. }
        | HduKind::CompressedImage { naxis1, naxis2, .. } => (naxis1, naxis2),
        _ => (columns.row_width(), 0),
    }
}

impl TableDiff {
    /// Compare column definitions only.
    pub fn from_columns(a: &ColDefs, b: &ColDefs, options: &DiffOptions) -> Self {
        Self::compare(
            &TableView {
                columns: a,
                offsets: a.offsets(),
                row_width: a.row_width(),
                rows: 0,
                data: &[],
            },
            &TableView {
                columns: b,
                offsets: b.offsets(),
                row_width: b.row_width(),
                rows: 0,
                data: &[],
            },
            options,
        )
    }

    /// Compare the column definitions and row bytes of two table HDUs.
    pub fn from_hdus(a: &Hdu, b: &Hdu, options: &DiffOptions) -> Result<Self> {
        let cols_a = ColDefs::from_header(&a.header)?;
        let cols_b = ColDefs::from_header(&b.header)?;
        let (width_a, rows_a) = table_view(a, &cols_a);
        let (width_b, rows_b) = table_view(b, &cols_b);
        Ok(Self::compare(
            &TableView {
                columns: &cols_a,
                offsets: cols_a.offsets(),
                row_width: width_a,
                rows: rows_a,
                data: &a.data,
            },
            &TableView {
                columns: &cols_b,
                offsets: cols_b.offsets(),
                row_width: width_b,
                rows: rows_b,
                data: &b.data,
            },
            options,
        ))
    }

    fn compare(a: &TableView<'_>, b: &TableView<'_>, options: &DiffOptions) -> Self {
        let mut diff = TableDiff::default();
        let named_a = a.named(options);
        let named_b = b.named(options);

        if named_a.len() != named_b.len() {
            diff.diff_column_count = Some((named_a.len(), named_b.len()));
        }
        diff.common_column_names = named_a
            .keys()
            .filter(|k| named_b.contains_key(*k))
            .cloned()
            .collect();

        let only_in = |x: &BTreeMap<String, usize>, y: &BTreeMap<String, usize>, view: &TableView<'_>| {
            let names: BTreeSet<String> = x
                .iter()
                .filter(|(k, _)| !y.contains_key(*k))
                .map(|(_, &i)| view.columns.columns()[i].name.clone().unwrap_or_default())
                .collect();
            names.into_iter().collect::<Vec<_>>()
        };
        let left = only_in(&named_a, &named_b, a);
        let right = only_in(&named_b, &named_a, b);
        if !left.is_empty() || !right.is_empty() {
            diff.diff_column_names = Some((left, right));
        }

        let mut comparable = Vec::new();
        for name in &diff.common_column_names {
            let (ia, ib) = (named_a[name], named_b[name]);
            let col_a = &a.columns.columns()[ia];
            let col_b = &b.columns.columns()[ib];
            let label = col_a.name.clone().unwrap_or_default();
            let mut same_format = true;
            for ((attribute, va), (_, vb)) in column_attributes(col_a)
                .into_iter()
                .zip(column_attributes(col_b))
            {
                if va == vb {
                    continue;
                }
                if attribute == "TFORM" {
                    same_format = false;
                }
                diff.diff_column_attributes.push(ColumnAttributeDiff {
                    column: label.clone(),
                    attribute,
                    a: va,
                    b: vb,
                });
            }
            if same_format {
                comparable.push((label, ia, ib));
            }
        }

        if a.rows != b.rows {
            diff.diff_row_count = Some((a.rows, b.rows));
            return diff;
        }

        for row in 0..a.rows {
            for (name, ia, ib) in &comparable {
                if a.cell(*ia, row) == b.cell(*ib, row) {
                    continue;
                }
                diff.total_diffs += 1;
                if options.records_more(diff.diff_values.len()) {
                    diff.diff_values.push((name.clone(), row));
                }
            }
        }
        diff.diff_ratio = ratio(diff.total_diffs, a.rows.saturating_mul(comparable.len()));
        diff
    }

    pub fn identical(&self) -> bool {
        self.diff_column_count.is_none()
            && self.diff_column_names.is_none()
            && self.diff_column_attributes.is_empty()
            && self.diff_row_count.is_none()
            && self.total_diffs == 0
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some((a, b)) = self.diff_column_count {
            out.push_str("Tables have different number of columns:\n");
            out.push_str(&format!(" a: {a}\n b: {b}\n"));
        }
        if let Some((left, right)) = &self.diff_column_names {
            for name in left {
                out.push_str(&format!("Extra column {name} in a\n"));
            }
            for name in right {
                out.push_str(&format!("Extra column {name} in b\n"));
            }
        }
        for attr in &self.diff_column_attributes {
            out.push_str(&format!(
                "Column {} has different {}:\n   a> {}\n   b> {}\n",
                attr.column, attr.attribute, attr.a, attr.b
            ));
        }
        if let Some((a, b)) = self.diff_row_count {
            out.push_str("Table rows differ:\n");
            out.push_str(&format!(" a: {a}\n b: {b}\n"));
        }
        for (column, row) in &self.diff_values {
            out.push_str(&format!("Column {column} data differs in row {row}\n"));
        }
        if self.total_diffs > 0 {
            summary_line(&mut out, self.total_diffs, self.diff_values.len(), self.diff_ratio, "table data element(s)");
        }
        out
    }
}

/// The data comparison chosen for a pair of HDUs.
#[derive(Debug, Clone, PartialEq)]
pub enum DataDiff {
    Image(ImageDataDiff),
    Table(TableDiff),
    Raw(RawDataDiff),
}

impl DataDiff {
    pub fn identical(&self) -> bool {
        match self {
            DataDiff::Image(d) => d.identical(),
            DataDiff::Table(d) => d.identical(),
            DataDiff::Raw(d) => d.identical(),
        }
    }

    pub fn report(&self) -> String {
        match self {
            DataDiff::Image(d) => d.report(),
            DataDiff::Table(d) => d.report(),
            DataDiff::Raw(d) => d.report(),
        }
    }
}

// ---------------------------------------------------------------------------
// HDUs and files
// ---------------------------------------------------------------------------

fn is_table(hdu: &Hdu) -> bool {
    matches!(
        hdu.kind,
        HduKind::AsciiTable { .. } | HduKind::BinaryTable { .. } | HduKind::CompressedImage { .. }
    )
}

/// Differences between two HDUs.
#[derive(Debug, Clone, PartialEq)]
pub struct HduDiff {
    pub diff_extnames: Option<(String, String)>,
    pub diff_extvers: Option<(i64, i64)>,
    /// HDU type names, when they differ. Data is not compared then.
    pub diff_extension_types: Option<(String, String)>,
    pub diff_headers: HeaderDiff,
    /// `None` when the types differ or neither HDU has data.
    pub diff_data: Option<DataDiff>,
}

impl HduDiff {
    pub fn new(a: &Hdu, b: &Hdu, options: &DiffOptions) -> Self {
        let diff_extnames = (!a.name().eq_ignore_ascii_case(b.name()))
            .then(|| (a.name().to_string(), b.name().to_string()));
        let diff_extvers = (a.version() != b.version()).then(|| (a.version(), b.version()));
        let diff_extension_types = (a.type_name() != b.type_name())
            .then(|| (a.type_name().to_string(), b.type_name().to_string()));
        let diff_headers = HeaderDiff::new(&a.header, &b.header, options);

        let diff_data = if diff_extension_types.is_some() {
            None
        } else if a.is_image() && b.is_image() {
            Some(
                ImageDataDiff::from_hdus(a, b, options)
                    .map(DataDiff::Image)
                    .unwrap_or_else(|_| DataDiff::Raw(RawDataDiff::new(&a.data, &b.data, options))),
            )
        } else if is_table(a) && is_table(b) {
            Some(
                TableDiff::from_hdus(a, b, options)
                    .map(DataDiff::Table)
                    .unwrap_or_else(|_| DataDiff::Raw(RawDataDiff::new(&a.data, &b.data, options))),
            )
        } else if a.data.is_empty() && b.data.is_empty() {
            None
        } else {
            Some(DataDiff::Raw(RawDataDiff::new(&a.data, &b.data, options)))
        };

        HduDiff {
            diff_extnames,
            diff_extvers,
            diff_extension_types,
            diff_headers,
            diff_data,
        }
    }

    pub fn identical(&self) -> bool {
        self.diff_extnames.is_none()
            && self.diff_extvers.is_none()
            && self.diff_extension_types.is_none()
            && self.diff_headers.identical()
            && self.diff_data.as_ref().map_or(true, DataDiff::identical)
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        if let Some((a, b)) = &self.diff_extnames {
            out.push_str(&format!("Extension HDU names differ:\n a: {a}\n b: {b}\n"));
        }
        if let Some((a, b)) = self.diff_extvers {
            out.push_str(&format!("Extension HDU versions differ:\n a: {a}\n b: {b}\n"));
        }
        if let Some((a, b)) = &self.diff_extension_types {
            out.push_str(&format!("Extension types differ:\n a: {a}\n b: {b}\n"));
        }
        if !self.diff_headers.identical() {
            out.push_str("Headers contain differences:\n");
            out.push_str(&indented(&self.diff_headers.report(), 2));
        }
        if let Some(data) = self.diff_data.as_ref().filter(|d| !d.identical()) {
            out.push_str("Data contains differences:\n");
            out.push_str(&indented(&data.report(), 2));
        }
        out
    }
}

/// Differences between two FITS files, HDU by HDU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsDiff {
    /// HDU counts, when they differ.
    pub diff_extension_count: Option<(usize, usize)>,
    /// Non-identical HDU pairs with their index.
    pub diff_extensions: Vec<(usize, HduDiff)>,
}

impl FitsDiff {
    pub fn new(a: &FitsData, b: &FitsData, options: &DiffOptions) -> Self {
        let diff_extension_count = (a.len() != b.len()).then(|| (a.len(), b.len()));
        let diff_extensions = a
            .iter()
            .zip(b.iter())
            .enumerate()
            .map(|(i, (x, y))| (i, HduDiff::new(x, y, options)))
            .filter(|(_, d)| !d.identical())
            .collect();
        FitsDiff {
            diff_extension_count,
            diff_extensions,
        }
    }

    /// Read and compare two FITS files.
    #[cfg(feature = "std")]
    pub fn from_files<P: AsRef<std::path::Path>, Q: AsRef<std::path::Path>>(
        a: P,
        b: Q,
        options: &DiffOptions,
    ) -> Result<Self> {
        let a = crate::hdu::read_fits_file(a)?;
        let b = crate::hdu::read_fits_file(b)?;
        Ok(Self::new(&a, &b, options))
    }

    pub fn identical(&self) -> bool {
        self.diff_extension_count.is_none() && self.diff_extensions.is_empty()
    }

    pub fn report(&self) -> String {
        if self.identical() {
            return "No differences found.\n".to_string();
        }
        let mut out = String::new();
        if let Some((a, b)) = self.diff_extension_count {
            out.push_str(&format!("Files contain different numbers of HDUs:\n a: {a}\n b: {b}\n"));
        }
        for (i, hdu) in &self.diff_extensions {
            if *i == 0 {
                out.push_str("\nPrimary HDU:\n\n");
            } else {
                out.push_str(&format!("\nExtension HDU {i}:\n\n"));
            }
            out.push_str(&indented(&hdu.report(), 1));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{ColumnFormat, TableKind};
    use alloc::vec;

    fn header(cards: &[(&str, Value)]) -> Header {
        Header::from_cards(
            cards
                .iter()
                .map(|(k, v)| Card::new(k, v.clone(), None).unwrap()),
        )
    }

    fn abc() -> Header {
        header(&[
            ("A", Value::Integer(1)),
            ("B", Value::Integer(2)),
            ("C", Value::Integer(3)),
        ])
    }

    fn int_pair(a: i64, b: i64) -> Option<(Option<Value>, Option<Value>)> {
        Some((Some(Value::Integer(a)), Some(Value::Integer(b))))
    }

    #[test]
    fn identical_headers() {
        let diff = HeaderDiff::new(&abc(), &abc(), &DiffOptions::default());
        assert!(diff.identical());
        assert_eq!(diff.report(), "");
    }

    #[test]
    fn slightly_different_headers() {
        let a = abc();
        let mut b = abc();
        b.set("C", 4, None).unwrap();
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(diff.common_keywords, vec!["A", "B", "C"]);
        assert_eq!(diff.diff_keyword_values["C"], vec![int_pair(3, 4)]);
        assert!(diff.report().contains("has different values"));
    }

    #[test]
    fn common_keywords() {
        let a = abc();
        let mut b = abc();
        b.set("C", 4, None).unwrap();
        b.set("D", 5, None).unwrap();
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert_eq!(diff.common_keywords, vec!["A", "B", "C"]);
    }

    #[test]
    fn different_keyword_count() {
        let a = abc();
        let mut b = abc();
        b.remove("B").unwrap();
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(diff.diff_keyword_count, Some((3, 2)));
        assert_eq!(diff.common_keywords, vec!["A", "C"]);
        assert_eq!(diff.diff_keywords, Some((vec!["B".to_string()], vec![])));
        assert!(diff.diff_keyword_values.is_empty());
    }

    #[test]
    fn different_keywords() {
        let mut a = abc();
        let mut b = abc();
        b.set("C", 4, None).unwrap();
        b.set("D", 5, None).unwrap();
        a.set("E", 6, None).unwrap();
        a.set("F", 7, None).unwrap();
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_keyword_count, Some((5, 4)));
        assert_eq!(
            diff.diff_keywords,
            Some((
                vec!["E".to_string(), "F".to_string()],
                vec!["D".to_string()]
            ))
        );
        assert_eq!(diff.diff_keyword_values["C"], vec![int_pair(3, 4)]);
    }

    #[test]
    fn different_keyword_values_with_duplicates() {
        let mut a = abc();
        let mut b = abc();
        a.append(Card::new("C", 4, None).unwrap());
        b.append(Card::new("C", 5, None).unwrap());
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_keyword_values["C"], vec![None, int_pair(4, 5)]);
        assert!(diff.report().contains("Keyword C[2]"));
    }

    #[test]
    fn different_keyword_comments() {
        let a = header(&[("A", Value::Integer(1)), ("B", Value::Integer(2))]);
        let mut a = a;
        a.set("C", 3, Some("comment 1")).unwrap();
        let mut b = a.clone();
        b.set_comment("C", "comment 2").unwrap();
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(
            diff.diff_keyword_comments["C"],
            vec![Some((
                Some("comment 1".to_string()),
                Some("comment 2".to_string())
            ))]
        );

        let options = DiffOptions {
            ignore_comments: vec!["C".to_string()],
            ..DiffOptions::default()
        };
        assert!(HeaderDiff::new(&a, &b, &options).identical());
    }

    #[test]
    fn asymmetric_duplicate_keywords() {
        let mut a = abc();
        let mut b = abc();
        a.append(Card::new("A", 2, Some("comment 1")).unwrap());
        a.append(Card::new("A", 3, Some("comment 2")).unwrap());
        b.append(Card::new("B", 4, Some("comment 3")).unwrap());
        b.append(Card::new("C", 5, Some("comment 4")).unwrap());
        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert!(diff.diff_keyword_values.is_empty());
        assert!(diff.diff_keyword_count.is_none());
        let mut expected = BTreeMap::new();
        expected.insert("A".to_string(), (3, 1));
        expected.insert("B".to_string(), (1, 2));
        expected.insert("C".to_string(), (1, 2));
        assert_eq!(diff.diff_duplicate_keywords, expected);
        assert!(diff.report().contains("Inconsistent duplicates of keyword A"));
    }

    #[test]
    fn floating_point_tolerance() {
        let a = header(&[
            ("A", Value::Integer(1)),
            ("B", Value::Float(2.00001)),
            ("C", Value::Float(3.000001)),
        ]);
        let mut b = a.clone();
        b.set("B", 2.00002, None).unwrap();
        b.set("C", 3.000002, None).unwrap();

        let diff = HeaderDiff::new(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_keyword_values.len(), 2);

        let options = DiffOptions {
            tolerance: 1e-6,
            ..DiffOptions::default()
        };
        let diff = HeaderDiff::new(&a, &b, &options);
        assert_eq!(
            diff.diff_keyword_values["B"],
            vec![Some((Some(Value::Float(2.00001)), Some(Value::Float(2.00002))))]
        );
        assert!(!diff.diff_keyword_values.contains_key("C"));
    }

    #[test]
    fn integer_and_float_compare_numerically() {
        let a = header(&[("A", Value::Integer(1))]);
        let b = header(&[("A", Value::Float(1.0))]);
        assert!(HeaderDiff::new(&a, &b, &DiffOptions::default()).identical());
    }

    #[test]
    fn ignore_blanks_in_strings() {
        let a = header(&[
            ("A", Value::Integer(1)),
            ("B", Value::Integer(2)),
            ("C", Value::String("A       ".to_string())),
        ]);
        let mut b = a.clone();
        b.set("C", "A", None).unwrap();

        assert!(HeaderDiff::new(&a, &b, &DiffOptions::default()).identical());

        let options = DiffOptions {
            ignore_blanks: false,
            ..DiffOptions::default()
        };
        let diff = HeaderDiff::new(&a, &b, &options);
        assert_eq!(
            diff.diff_keyword_values["C"],
            vec![Some((
                Some(Value::String("A       ".to_string())),
                Some(Value::String("A".to_string()))
            ))]
        );
    }

    #[test]
    fn ignore_blank_cards() {
        let a = abc();
        let mut b = abc();
        b.insert(1, Card::blank());
        assert!(HeaderDiff::new(&a, &b, &DiffOptions::default()).identical());

        let options = DiffOptions {
            ignore_blank_cards: false,
            ..DiffOptions::default()
        };
        let diff = HeaderDiff::new(&a, &b, &options);
        assert_eq!(diff.diff_keyword_count, Some((3, 4)));
    }

    #[test]
    fn ignore_keywords() {
        let a = abc();
        let mut b = abc();
        b.set("B", 4, None).unwrap();
        b.set("C", 5, None).unwrap();

        let options = DiffOptions {
            ignore_keywords: vec!["*".to_string()],
            ..DiffOptions::default()
        };
        assert!(HeaderDiff::new(&a, &b, &options).identical());

        let options = DiffOptions {
            ignore_keywords: vec!["B".to_string()],
            ..DiffOptions::default()
        };
        let diff = HeaderDiff::new(&a, &b, &options);
        assert_eq!(diff.diff_keyword_values.len(), 1);
        assert_eq!(diff.diff_keyword_values["C"], vec![int_pair(3, 5)]);
    }

    #[test]
    fn ignore_keywords_with_wildcards() {
        let a = header(&[("DATE-OBS", Value::from("2001")), ("A", Value::Integer(1))]);
        let b = header(&[("DATE-END", Value::from("2002")), ("A", Value::Integer(1))]);
        let options = DiffOptions {
            ignore_keywords: vec!["date-*".to_string()],
            ..DiffOptions::default()
        };
        assert!(HeaderDiff::new(&a, &b, &options).identical());
    }

    fn arange(n: i64) -> ImageData {
        ImageData::I64((0..n).collect())
    }

    #[test]
    fn identical_images() {
        let diff = ImageDataDiff::new(&arange(100), &[10, 10], &arange(100), &[10, 10], &DiffOptions::default());
        assert!(diff.identical());
        assert_eq!(diff.total_diffs, 0);
        assert_eq!(diff.diff_ratio, 0.0);
    }

    #[test]
    fn images_within_tolerance() {
        let a = ImageData::F64(vec![1.0; 100]);
        let b = ImageData::F64(vec![0.99999; 100]);
        let options = DiffOptions {
            tolerance: 1e-4,
            ..DiffOptions::default()
        };
        assert!(ImageDataDiff::new(&a, &[10, 10], &b, &[10, 10], &options).identical());
        assert!(!ImageDataDiff::new(&a, &[10, 10], &b, &[10, 10], &DiffOptions::default()).identical());
    }

    #[test]
    fn different_image_dimensions() {
        let diff = ImageDataDiff::new(&arange(100), &[10, 10], &arange(100), &[100], &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(diff.diff_dimensions, Some((vec![10, 10], vec![100])));
        assert_eq!(diff.total_diffs, 0);
        assert!(diff.report().contains("10 x 10"));
    }

    #[test]
    fn different_pixels() {
        let a = arange(100);
        let mut pixels: Vec<i64> = (0..100).collect();
        pixels[0] = 10;
        pixels[55] = 20;
        let b = ImageData::I64(pixels);
        let diff = ImageDataDiff::new(&a, &[10, 10], &b, &[10, 10], &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(diff.total_diffs, 2);
        assert_eq!(diff.diff_ratio, 0.02);
        assert_eq!(
            diff.diff_pixels,
            vec![
                PixelDiff { index: vec![0, 0], a: 0.0, b: 10.0 },
                PixelDiff { index: vec![5, 5], a: 55.0, b: 20.0 },
            ]
        );
        assert!(diff.report().contains("2 different pixels found (2.00% different)"));
    }

    #[test]
    fn numdiffs_limits_recorded_pixels() {
        let a = arange(100);
        let b = ImageData::I64((1..101).collect());
        let diff = ImageDataDiff::new(&a, &[10, 10], &b, &[10, 10], &DiffOptions::default());
        assert_eq!(diff.total_diffs, 100);
        assert_eq!(diff.diff_pixels.len(), 10);
        assert_eq!(diff.diff_ratio, 1.0);
        assert_eq!(diff.diff_pixels[3].index, vec![3, 0]);
        assert!(diff.report().contains("...90 additional difference(s) found."));

        let options = DiffOptions {
            numdiffs: None,
            ..DiffOptions::default()
        };
        let diff = ImageDataDiff::new(&a, &[10, 10], &b, &[10, 10], &options);
        assert_eq!(diff.diff_pixels.len(), 100);
    }

    #[test]
    fn nan_pixels_compare_equal() {
        let a = ImageData::F32(vec![f32::NAN, 1.0]);
        let b = ImageData::F32(vec![f32::NAN, 1.0]);
        assert!(ImageDataDiff::new(&a, &[2], &b, &[2], &DiffOptions::default()).identical());
    }

    #[test]
    fn raw_data() {
        let diff = RawDataDiff::new(&[1, 2, 3, 4], &[1, 9, 3, 4], &DiffOptions::default());
        assert_eq!(diff.diff_bytes, vec![(1, (2, 9))]);
        assert_eq!(diff.diff_ratio, 0.25);
        let diff = RawDataDiff::new(&[1, 2], &[1, 2, 3], &DiffOptions::default());
        assert_eq!(diff.diff_dimensions, Some((2, 3)));
        assert!(!diff.identical());
    }

    fn coldefs(names: &[(&str, &str)]) -> ColDefs {
        ColDefs::new(
            TableKind::Binary,
            names
                .iter()
                .map(|(n, f)| Column::new(n, ColumnFormat::parse_binary(f).unwrap()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn identical_columns() {
        let a = coldefs(&[("A", "L"), ("B", "X"), ("C", "4I")]);
        let diff = TableDiff::from_columns(&a, &a.clone(), &DiffOptions::default());
        assert!(diff.identical());
        assert_eq!(diff.common_column_names, vec!["a", "b", "c"]);
    }

    #[test]
    fn different_table_field_names() {
        let a = coldefs(&[("A", "L"), ("B", "L")]);
        let b = coldefs(&[("A", "L"), ("C", "L")]);
        let diff = TableDiff::from_columns(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert!(diff.diff_column_count.is_none());
        assert_eq!(diff.common_column_names, vec!["a"]);
        assert_eq!(
            diff.diff_column_names,
            Some((vec!["B".to_string()], vec!["C".to_string()]))
        );
    }

    #[test]
    fn different_table_field_counts() {
        let a = coldefs(&[("B", "L")]);
        let b = coldefs(&[("A", "L"), ("B", "L"), ("C", "L")]);
        let diff = TableDiff::from_columns(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_column_count, Some((1, 3)));
        assert_eq!(diff.common_column_names, vec!["b"]);
        assert_eq!(
            diff.diff_column_names,
            Some((vec![], vec!["A".to_string(), "C".to_string()]))
        );
    }

    #[test]
    fn different_column_formats() {
        let a = coldefs(&[("A", "J")]);
        let b = coldefs(&[("A", "E")]);
        let diff = TableDiff::from_columns(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_column_attributes.len(), 1);
        assert_eq!(diff.diff_column_attributes[0].attribute, "TFORM");
        assert_eq!(diff.diff_column_attributes[0].a, "1J");
        assert_eq!(diff.diff_column_attributes[0].b, "1E");
    }

    #[test]
    fn ignore_table_fields() {
        let a = coldefs(&[("A", "L"), ("B", "L"), ("C", "L")]);
        let b = coldefs(&[("A", "L"), ("D", "L")]);
        let options = DiffOptions {
            ignore_fields: vec!["b".to_string(), "C".to_string(), "D".to_string()],
            ..DiffOptions::default()
        };
        assert!(TableDiff::from_columns(&a, &b, &options).identical());

        let options = DiffOptions {
            ignore_fields: vec!["*".to_string()],
            ..DiffOptions::default()
        };
        assert!(TableDiff::from_columns(&a, &b, &options).identical());
    }

    fn image_hdu(pixels: &[i64], is_primary: bool, extname: Option<&str>) -> Hdu {
        let mut h = Header::new();
        if is_primary {
            h.set("SIMPLE", true, None).unwrap();
        } else {
            h.set("XTENSION", "IMAGE", None).unwrap();
        }
        h.set("BITPIX", 64, None).unwrap();
        h.set("NAXIS", 2, None).unwrap();
        h.set("NAXIS1", 10, None).unwrap();
        h.set("NAXIS2", 10, None).unwrap();
        if !is_primary {
            h.set("PCOUNT", 0, None).unwrap();
            h.set("GCOUNT", 1, None).unwrap();
        }
        if let Some(name) = extname {
            h.set("EXTNAME", name, None).unwrap();
        }
        let data = pixels.iter().flat_map(|p| p.to_be_bytes()).collect();
        Hdu::new(h, data, is_primary).unwrap()
    }

    fn table_hdu(rows: &[[u8; 4]], extname: &str) -> Hdu {
        let defs = coldefs(&[("FLUX", "E")]);
        let mut h = defs.table_header(rows.len()).unwrap();
        h.set("EXTNAME", extname, None).unwrap();
        let data = rows.iter().flatten().copied().collect();
        Hdu::new(h, data, false).unwrap()
    }

    #[test]
    fn identical_files() {
        let pixels: Vec<i64> = (0..100).collect();
        let fits = FitsData {
            hdus: vec![image_hdu(&pixels, true, None), image_hdu(&pixels, false, Some("SCI"))],
        };
        let diff = FitsDiff::new(&fits, &fits.clone(), &DiffOptions::default());
        assert!(diff.identical());
        assert_eq!(diff.report(), "No differences found.\n");
    }

    #[test]
    fn partially_identical_files() {
        let pixels: Vec<i64> = (0..100).collect();
        let shifted: Vec<i64> = (1..101).collect();
        let a = FitsData {
            hdus: vec![
                image_hdu(&pixels, true, None),
                image_hdu(&pixels, false, None),
                image_hdu(&pixels, false, None),
            ],
        };
        let b = FitsData {
            hdus: vec![image_hdu(&pixels, true, None), image_hdu(&pixels, false, None)],
        };
        let diff = FitsDiff::new(&a, &b, &DiffOptions::default());
        assert!(!diff.identical());
        assert_eq!(diff.diff_extension_count, Some((3, 2)));
        assert!(diff.diff_extensions.is_empty());

        let b = FitsData {
            hdus: vec![
                image_hdu(&pixels, true, None),
                image_hdu(&shifted, false, None),
                image_hdu(&pixels, false, None),
            ],
        };
        let diff = FitsDiff::new(&a, &b, &DiffOptions::default());
        assert!(diff.diff_extension_count.is_none());
        assert_eq!(diff.diff_extensions.len(), 1);
        let (index, hdu) = &diff.diff_extensions[0];
        assert_eq!(*index, 1);
        assert!(hdu.diff_headers.identical());
        let Some(DataDiff::Image(data)) = &hdu.diff_data else {
            panic!("expected an image diff");
        };
        assert_eq!(data.total_diffs, 100);
        assert_eq!(data.diff_ratio, 1.0);
        assert_eq!(data.diff_pixels.len(), 10);
        assert!(diff.report().contains("Extension HDU 1:"));
    }

    #[test]
    fn different_extension_names_and_types() {
        let pixels: Vec<i64> = (0..100).collect();
        let row = 1.5f32.to_be_bytes();
        let a = image_hdu(&pixels, false, Some("SCI"));
        let b = table_hdu(&[row], "CAT");
        let diff = HduDiff::new(&a, &b, &DiffOptions::default());
        assert_eq!(diff.diff_extnames, Some(("SCI".to_string(), "CAT".to_string())));
        assert_eq!(
            diff.diff_extension_types,
            Some(("ImageHDU".to_string(), "BinTableHDU".to_string()))
        );
        assert!(diff.diff_data.is_none());
        assert!(diff.report().contains("Extension types differ"));
    }

    #[test]
    fn table_rows_compared_by_column() {
        let one = 1.0f32.to_be_bytes();
        let two = 2.0f32.to_be_bytes();
        let a = table_hdu(&[one, one, one], "CAT");
        let b = table_hdu(&[one, two, one], "CAT");
        let diff = HduDiff::new(&a, &b, &DiffOptions::default());
        assert!(diff.diff_headers.identical());
        let Some(DataDiff::Table(table)) = &diff.diff_data else {
            panic!("expected a table diff");
        };
        assert_eq!(table.diff_values, vec![("FLUX".to_string(), 1)]);
        assert_eq!(table.total_diffs, 1);

        let c = table_hdu(&[one, one], "CAT");
        let diff = HduDiff::new(&a, &c, &DiffOptions::default());
        let Some(DataDiff::Table(table)) = &diff.diff_data else {
            panic!("expected a table diff");
        };
        assert_eq!(table.diff_row_count, Some((3, 2)));
    }

    #[test]
    fn unreadable_column_format_falls_back_to_raw() {
        let one = 1.0f32.to_be_bytes();
        let two = 2.0f32.to_be_bytes();
        let mut a = table_hdu(&[one], "CAT");
        let mut b = table_hdu(&[two], "CAT");
        for hdu in [&mut a, &mut b] {
            hdu.header.set("TFORM1", "4611686018427387904J", None).unwrap();
        }
        let diff = HduDiff::new(&a, &b, &DiffOptions::default());
        let Some(DataDiff::Raw(raw)) = &diff.diff_data else {
            panic!("expected a raw diff");
        };
        assert!(!raw.identical());
    }
}
