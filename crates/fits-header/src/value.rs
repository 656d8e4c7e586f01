use alloc::format;
use alloc::string::String;
use alloc::string::ToString;

/// A parsed FITS header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string (content between single quotes, unescaped).
    String(String),
    /// FITS complex integer `(real, imaginary)`.
    ComplexInt(i64, i64),
    /// FITS complex float `(real, imaginary)`.
    ComplexFloat(f64, f64),
}

impl Value {
    /// Returns the string content for [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer for [`Value::Integer`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a float for integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean for [`Value::Logical`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the FITS type, used in reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Logical(_) => "logical",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::ComplexInt(_, _) => "complex integer",
            Value::ComplexFloat(_, _) => "complex float",
        }
    }

    /// Returns `true` if every float component is finite. FITS has no
    /// representation for NaN or infinities in header values.
    pub fn is_representable(&self) -> bool {
        match self {
            Value::Float(f) => f.is_finite(),
            Value::ComplexFloat(re, im) => re.is_finite() && im.is_finite(),
            _ => true,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<(f64, f64)> for Value {
    fn from((re, im): (f64, f64)) -> Self {
        Value::ComplexFloat(re, im)
    }
}

impl From<(i64, i64)> for Value {
    fn from((re, im): (i64, i64)) -> Self {
        Value::ComplexInt(re, im)
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            // Commentary text and plain display show strings without quotes.
            Value::String(s) => f.write_str(s),
            other => f.write_str(&format_value(other)),
        }
    }
}

// ── Parsing ──

/// Split a non-string value field at the comment separator.
///
/// Returns `(value_part, optional_comment)`. The FITS standard uses ` / `
/// but many writers omit the trailing space (`BITPIX = -32 /No. of bits`),
/// so ` /` is accepted on its own. A field that starts with `/` has no
/// value at all.
pub(crate) fn split_comment(field: &str) -> (&str, Option<&str>) {
    let trimmed = field.trim_start();
    if let Some(rest) = trimmed.strip_prefix('/') {
        return ("", non_empty_comment(rest));
    }
    match field.find(" /") {
        Some(i) => (&field[..i], non_empty_comment(&field[i + 2..])),
        None => (field, None),
    }
}

fn non_empty_comment(after_slash: &str) -> Option<&str> {
    let comment = after_slash.strip_prefix(' ').unwrap_or(after_slash).trim_end();
    if comment.is_empty() {
        None
    } else {
        Some(comment)
    }
}

/// Parse a quoted string at the start of `field` (leading blanks allowed).
///
/// Returns the unescaped content exactly as written between the quotes,
/// including trailing blanks, plus the comment after the closing quote.
/// An unterminated string is accepted up to the end of the field.
pub fn parse_string_fragment(field: &str) -> Option<(String, Option<&str>)> {
    let field = field.trim_start();
    let bytes = field.as_bytes();
    if bytes.first() != Some(&b'\'') {
        return None;
    }

    let mut value = String::new();
    let mut i = 1;
    let len = bytes.len();
    loop {
        if i >= len {
            break;
        }
        if bytes[i] == b'\'' {
            if i + 1 < len && bytes[i + 1] == b'\'' {
                value.push('\'');
                i += 2;
            } else {
                i += 1;
                break;
            }
        } else {
            value.push(bytes[i] as char);
            i += 1;
        }
    }

    let (_, comment) = split_comment(&field[i..]);
    Some((value, comment))
}

/// Try to parse a complex value `(real, imag)`.
fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (left, right) = inner.split_once(',')?;
    let left = left.trim();
    let right = right.trim();

    if let (Ok(re), Ok(im)) = (left.parse::<i64>(), right.parse::<i64>()) {
        return Some(Value::ComplexInt(re, im));
    }

    let re = parse_float_str(left)?;
    let im = parse_float_str(right)?;
    Some(Value::ComplexFloat(re, im))
}

/// Parse a float string, handling FITS `D` exponent notation.
fn parse_float_str(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    let normalized = s.replace(['D', 'd'], "E");
    normalized.parse::<f64>().ok()
}

/// Parse a FITS header value from the value field of a card (everything
/// after the `= ` value indicator).
///
/// Returns the parsed [`Value`] and an optional comment. Trailing blanks of
/// string values are not significant and are removed. Returns `None` when
/// the field holds no value (an undefined value) or cannot be parsed.
pub fn parse_value(field: &str) -> Option<(Value, Option<&str>)> {
    if field.trim_start().starts_with('\'') {
        let (s, comment) = parse_string_fragment(field)?;
        return Some((Value::String(s.trim_end().to_string()), comment));
    }

    let (val_part, comment) = split_comment(field);
    let val_text = val_part.trim();
    if val_text.is_empty() {
        return None;
    }

    match val_text {
        "T" => return Some((Value::Logical(true), comment)),
        "F" => return Some((Value::Logical(false), comment)),
        _ => {}
    }

    if val_text.starts_with('(') {
        return parse_complex(val_text).map(|v| (v, comment));
    }

    if !val_text.contains(['.', 'E', 'e', 'D', 'd']) {
        if let Ok(n) = val_text.parse::<i64>() {
            return Some((Value::Integer(n), comment));
        }
    }

    parse_float_str(val_text).map(|f| (Value::Float(f), comment))
}

/// Extract the comment of a value field that holds no parseable value.
pub(crate) fn comment_of_undefined(field: &str) -> Option<&str> {
    split_comment(field).1
}

// ── Formatting ──

/// Width of the fixed-format value field (columns 11 through 30).
pub const FIXED_VALUE_WIDTH: usize = 20;

/// Escape single quotes in a string value by doubling them.
pub fn escape_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Format a string as a quoted FITS literal, padding the content to the
/// 8-character minimum.
pub fn format_string_literal(s: &str) -> String {
    format!("'{:<8}'", escape_string(s))
}

/// Format a float so that it always reads back as a float: a decimal point
/// or exponent is always present, exponents are upper case with an explicit
/// sign and at least two digits, and the result is at most 20 characters.
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return String::from(if f.is_sign_negative() { "-0.0" } else { "0.0" });
    }

    let plain = format!("{f}");
    if plain.len() <= FIXED_VALUE_WIDTH {
        return if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        };
    }

    let sci = normalize_exponent(&format!("{f:E}"));
    if sci.len() <= FIXED_VALUE_WIDTH {
        return sci;
    }

    // Shortest round-trip form does not fit; drop digits until it does.
    let mut precision = 15usize;
    loop {
        let s = normalize_exponent(&format!("{:.prec$E}", f, prec = precision));
        if s.len() <= FIXED_VALUE_WIDTH || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

/// Rewrite Rust's `1.5E-7` style into FITS's `1.5E-07`.
fn normalize_exponent(s: &str) -> String {
    let Some((mantissa, exponent)) = s.split_once('E') else {
        return s.to_string();
    };
    let mantissa = if mantissa.contains('.') {
        mantissa.to_string()
    } else {
        format!("{mantissa}.0")
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exponent.strip_prefix('+').unwrap_or(exponent)),
    };
    format!("{mantissa}E{sign}{digits:0>2}")
}

/// Canonical text of a value, without fixed-format padding.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Logical(b) => String::from(if *b { "T" } else { "F" }),
        Value::Integer(n) => format!("{n}"),
        Value::Float(f) => format_float(*f),
        Value::String(s) => format_string_literal(s),
        Value::ComplexInt(re, im) => format!("({re}, {im})"),
        Value::ComplexFloat(re, im) => format!("({}, {})", format_float(*re), format_float(*im)),
    }
}

/// Fixed-format value field: strings are left-justified and padded to 20
/// characters, every other type is right-justified so that it ends in
/// column 30 of the card.
pub fn fixed_format(value: &Value) -> String {
    let text = format_value(value);
    match value {
        Value::String(_) => format!("{text:<width$}", width = FIXED_VALUE_WIDTH),
        _ => format!("{text:>width$}", width = FIXED_VALUE_WIDTH),
    }
}
