//! Single header cards: keyword rules, parsing and formatting of card
//! images, including the HIERARCH and CONTINUE conventions.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::warn;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::value::{
    comment_of_undefined, escape_string, fixed_format, format_string_literal, format_value,
    parse_string_fragment, parse_value, Value,
};

/// Width of the keyword field (columns 1-8).
pub const KEYWORD_LENGTH: usize = 8;

/// Keywords whose cards carry free text instead of a value.
pub const COMMENTARY_KEYWORDS: [&str; 3] = ["", "COMMENT", "HISTORY"];

/// Keyword of the records that continue a long string value.
pub const CONTINUE_KEYWORD: &str = "CONTINUE";

const HIERARCH_PREFIX: &str = "HIERARCH ";
const VALUE_INDICATOR: &str = "= ";
const COMMENTARY_TEXT_LENGTH: usize = CARD_SIZE - KEYWORD_LENGTH;
const LONG_VALUE_CHUNK: usize = 67;
const LONG_COMMENT_CHUNK: usize = 64;

/// Returns `true` for `COMMENT`, `HISTORY` and the blank keyword.
pub fn is_commentary_keyword(keyword: &str) -> bool {
    COMMENTARY_KEYWORDS.contains(&keyword)
}

fn is_standard_keyword_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_')
}

fn is_printable(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

fn strip_hierarch_prefix(s: &str) -> Option<&str> {
    s.get(..HIERARCH_PREFIX.len())
        .filter(|p| p.eq_ignore_ascii_case(HIERARCH_PREFIX))
        .map(|_| &s[HIERARCH_PREFIX.len()..])
}

/// Normalise a keyword for lookups: surrounding blanks and an explicit
/// `HIERARCH ` prefix are removed, and the result is upper-cased.
pub fn normalize_keyword(keyword: &str) -> String {
    let trimmed = keyword.trim();
    let bare = strip_hierarch_prefix(trimmed).unwrap_or(trimmed).trim();
    bare.to_ascii_uppercase()
}

/// Validate a user-supplied keyword. Returns the normalised keyword and
/// whether it has to be written with the HIERARCH convention.
fn classify_keyword(raw: &str) -> Result<(String, bool)> {
    let trimmed = raw.trim();
    if !is_printable(trimmed) || trimmed.contains('=') {
        return Err(Error::InvalidKeyword(raw.to_string()));
    }

    if let Some(rest) = strip_hierarch_prefix(trimmed) {
        let keyword = rest.trim().to_ascii_uppercase();
        if keyword.is_empty() {
            return Err(Error::InvalidKeyword(raw.to_string()));
        }
        return Ok((keyword, true));
    }

    let upper = trimmed.to_ascii_uppercase();
    if upper.len() <= KEYWORD_LENGTH && upper.bytes().all(is_standard_keyword_byte) {
        return Ok((upper, false));
    }
    if upper.len() > KEYWORD_LENGTH || upper.contains(' ') {
        warn!("keyword {upper:?} is not a standard FITS keyword; a HIERARCH card will be created");
        return Ok((upper, true));
    }
    Err(Error::InvalidKeyword(raw.to_string()))
}

fn check_text(text: &str) -> Result<()> {
    if is_printable(text) {
        Ok(())
    } else {
        Err(Error::InvalidValue("card text must be printable ASCII"))
    }
}

fn check_value(value: &Value) -> Result<()> {
    if !value.is_representable() {
        return Err(Error::InvalidValue("NaN and infinite floats cannot be stored"));
    }
    match value {
        Value::String(s) => check_text(s),
        _ => Ok(()),
    }
}

/// Pad `s` with blanks to a multiple of 80 columns.
fn pad_record(s: &str) -> String {
    let target = s.len().div_ceil(CARD_SIZE).max(1) * CARD_SIZE;
    format!("{s:<target$}")
}

/// Split `s` into pieces of at most `width` bytes, preferring to break just
/// after a blank and never between the two quotes of an escaped `''`.
fn split_words(s: &str, width: usize) -> Vec<&str> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut words = Vec::new();
    let mut start = 0;

    while start < len {
        let limit = (start + width).min(len);
        let mut end = if limit == len {
            len
        } else {
            match bytes[start..limit].iter().rposition(|&b| b == b' ') {
                Some(p) => start + p + 1,
                None => limit,
            }
        };

        if end < len {
            let run = bytes[start..end]
                .iter()
                .rev()
                .take_while(|&&b| b == b'\'')
                .count();
            if run % 2 == 1 && bytes[end] == b'\'' {
                end = if end - 1 > start { end - 1 } else { end + 1 };
            }
        }

        words.push(&s[start..end]);
        start = end;
    }

    if words.is_empty() {
        words.push("");
    }
    words
}

/// One logical FITS header card.
///
/// A card is usually one 80-column record, but a long string value spans
/// several records (the first one plus `CONTINUE` records) and a long
/// commentary text spans several records with the same keyword.
///
/// The card image is kept in sync with the keyword, value and comment.
/// Cards parsed from a file keep their original image until modified.
#[derive(Debug, Clone)]
pub struct Card {
    keyword: String,
    value: Option<Value>,
    comment: Option<String>,
    hierarch: bool,
    /// `false` for non-commentary cards that were read without `= `.
    value_indicator: bool,
    image: String,
    modified: bool,
}

impl PartialEq for Card {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword && self.value == other.value && self.comment == other.comment
    }
}

impl Card {
    /// Create a card. Commentary keywords take the value as their text.
    ///
    /// Keywords longer than 8 characters or containing blanks become
    /// HIERARCH keywords. `CONTINUE` and `END` are reserved.
    pub fn new(keyword: &str, value: impl Into<Value>, comment: Option<&str>) -> Result<Self> {
        Self::build(keyword, Some(value.into()), comment)
    }

    /// Create a card whose value is undefined (`KEYWORD =` with a blank field).
    pub fn undefined(keyword: &str, comment: Option<&str>) -> Result<Self> {
        Self::build(keyword, None, comment)
    }

    /// Create a `COMMENT`, `HISTORY` or blank commentary card.
    pub fn commentary(keyword: &str, text: &str) -> Result<Self> {
        let normalized = normalize_keyword(keyword);
        if !is_commentary_keyword(&normalized) {
            return Err(Error::InvalidKeyword(keyword.to_string()));
        }
        Self::build(&normalized, Some(Value::String(text.to_string())), None)
    }

    /// A completely blank card.
    pub fn blank() -> Self {
        Card {
            keyword: String::new(),
            value: Some(Value::String(String::new())),
            comment: None,
            hierarch: false,
            value_indicator: false,
            image: " ".repeat(CARD_SIZE),
            modified: false,
        }
    }

    pub(crate) fn build(keyword: &str, value: Option<Value>, comment: Option<&str>) -> Result<Self> {
        let (keyword, hierarch) = classify_keyword(keyword)?;
        if keyword == CONTINUE_KEYWORD || keyword == "END" {
            return Err(Error::InvalidKeyword(keyword));
        }

        let commentary = !hierarch && is_commentary_keyword(&keyword);
        let (value, comment) = if commentary {
            if comment.is_some_and(|c| !c.is_empty()) {
                return Err(Error::InvalidValue("commentary cards cannot have a comment"));
            }
            let text = value.map(|v| v.to_string()).unwrap_or_default();
            (Some(Value::String(text)), None)
        } else {
            (value, comment.map(String::from))
        };

        if let Some(v) = &value {
            check_value(v)?;
        }
        if let Some(c) = &comment {
            check_text(c)?;
        }

        let mut card = Card {
            keyword,
            value,
            comment,
            hierarch,
            value_indicator: !commentary,
            image: String::new(),
            modified: true,
        };
        card.image = card.format_image()?;
        Ok(card)
    }

    // ── Accessors ──

    /// The normalised keyword (empty for blank cards).
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// The value, or the text of a commentary card. `None` for an
    /// undefined value.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns `true` for `COMMENT`, `HISTORY` and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        !self.hierarch && is_commentary_keyword(&self.keyword)
    }

    /// Returns `true` if the card image is entirely blank.
    pub fn is_blank(&self) -> bool {
        self.image.bytes().all(|b| b == b' ')
    }

    /// Returns `true` if the keyword uses the HIERARCH convention.
    pub fn is_hierarch(&self) -> bool {
        self.hierarch
    }

    /// Returns `true` if the card changed since it was parsed.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// The full card image; its length is a multiple of 80.
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Number of 80-column records the card occupies.
    pub fn physical_len(&self) -> usize {
        self.image.len() / CARD_SIZE
    }

    /// The 80-column records that make up the card image.
    pub fn records(&self) -> impl Iterator<Item = &str> {
        (0..self.physical_len()).map(move |i| &self.image[i * CARD_SIZE..(i + 1) * CARD_SIZE])
    }

    // ── Mutation ──

    /// Replace the value; `None` makes it undefined. For commentary cards
    /// the value becomes the text.
    pub fn set_value(&mut self, value: Option<Value>) -> Result<()> {
        let commentary = self.is_commentary();
        let value = if commentary {
            Some(Value::String(value.map(|v| v.to_string()).unwrap_or_default()))
        } else {
            value
        };
        if let Some(v) = &value {
            check_value(v)?;
        }
        if value == self.value && (commentary || self.value_indicator) {
            return Ok(());
        }
        let previous_value = core::mem::replace(&mut self.value, value);
        let previous_indicator = core::mem::replace(&mut self.value_indicator, !commentary);
        if let Err(e) = self.refresh() {
            self.value = previous_value;
            self.value_indicator = previous_indicator;
            return Err(e);
        }
        Ok(())
    }

    /// Replace the comment; `None` or an empty string removes it.
    pub fn set_comment(&mut self, comment: Option<&str>) -> Result<()> {
        let comment = comment.filter(|c| !c.is_empty()).map(String::from);
        if comment == self.comment {
            return Ok(());
        }
        if comment.is_some() && self.is_commentary() {
            return Err(Error::InvalidValue("commentary cards cannot have a comment"));
        }
        if let Some(c) = &comment {
            check_text(c)?;
        }
        let previous = core::mem::replace(&mut self.comment, comment);
        if let Err(e) = self.refresh() {
            self.comment = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Change the keyword, keeping value and comment.
    pub fn rename(&mut self, keyword: &str) -> Result<()> {
        let value = self.value.clone();
        let comment = self.comment.clone();
        *self = Card::build(keyword, value, comment.as_deref())?;
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.image = self.format_image()?;
        self.modified = true;
        Ok(())
    }

    // ── Formatting ──

    fn format_image(&self) -> Result<String> {
        if self.is_commentary() {
            let text = self.value.as_ref().map(|v| v.to_string()).unwrap_or_default();
            return Ok(format_commentary(&self.keyword, &text));
        }
        if self.hierarch {
            return format_hierarch(&self.keyword, self.value.as_ref(), self.comment());
        }
        if !self.value_indicator {
            let mut out = format!("{:<8} {}", self.keyword, self.comment().unwrap_or(""));
            out.truncate(CARD_SIZE);
            return Ok(pad_record(&out));
        }

        let value_field = match &self.value {
            Some(v) => fixed_format(v),
            None => " ".repeat(crate::value::FIXED_VALUE_WIDTH),
        };
        let mut out = format!("{:<8}{VALUE_INDICATOR}{value_field}", self.keyword);
        if let Some(c) = self.comment() {
            out.push_str(" / ");
            out.push_str(c);
        }
        if out.len() <= CARD_SIZE {
            return Ok(pad_record(&out));
        }

        if let Some(Value::String(s)) = &self.value {
            if format_string_literal(s).len() > CARD_SIZE - 10 {
                return Ok(format_long_string(&self.keyword, s, self.comment()));
            }
        }

        warn!("card {:?} is too long; its comment will be truncated", self.keyword);
        out.truncate(CARD_SIZE);
        Ok(out)
    }

    // ── Parsing ──

    /// Parse a card image of one or more 80-column records. Shorter input
    /// is padded with blanks. Follow-on `CONTINUE` records are joined into
    /// a single string value.
    pub fn parse(image: &str) -> Result<Self> {
        if !image.is_ascii() {
            return Err(Error::InvalidHeader("card image is not ASCII"));
        }
        let image = pad_record(image.trim_end_matches(['\n', '\r']));
        let first = &image[..CARD_SIZE];

        if let Some(rest) = strip_hierarch_prefix(first) {
            if let Some(eq) = rest.find('=') {
                let keyword = rest[..eq].trim().to_ascii_uppercase();
                return Ok(Self::parsed_value_card(
                    keyword,
                    true,
                    &rest[eq + 1..],
                    &image,
                ));
            }
        }

        let raw_keyword = first[..KEYWORD_LENGTH].trim_end();
        if !is_printable(raw_keyword) {
            return Err(Error::InvalidKeyword(raw_keyword.to_string()));
        }
        if !raw_keyword.bytes().all(|b| is_standard_keyword_byte(b) || b == b' ') {
            warn!("card has non-standard keyword {raw_keyword:?}");
        }
        let keyword = raw_keyword.to_ascii_uppercase();

        if is_commentary_keyword(&keyword) {
            let mut text = String::new();
            for i in 0..image.len() / CARD_SIZE {
                text.push_str(&image[i * CARD_SIZE + KEYWORD_LENGTH..(i + 1) * CARD_SIZE]);
            }
            let text = text.trim_end().to_string();
            return Ok(Card {
                keyword,
                value: Some(Value::String(text)),
                comment: None,
                hierarch: false,
                value_indicator: false,
                image,
                modified: false,
            });
        }

        if &first[KEYWORD_LENGTH..KEYWORD_LENGTH + 2] == VALUE_INDICATOR {
            return Ok(Self::parsed_value_card(keyword, false, &first[10..], &image));
        }

        let text = first[KEYWORD_LENGTH..].trim();
        Ok(Card {
            keyword,
            value: None,
            comment: (!text.is_empty()).then(|| text.to_string()),
            hierarch: false,
            value_indicator: false,
            image,
            modified: false,
        })
    }

    fn parsed_value_card(keyword: String, hierarch: bool, field: &str, image: &str) -> Card {
        let records = image.len() / CARD_SIZE;
        let (value, comment) = if records > 1 && field.trim_start().starts_with('\'') {
            let (value, comment) = join_continued(field, image);
            (Some(value), comment)
        } else {
            match parse_value(field) {
                Some((v, c)) => (Some(v), c.map(String::from)),
                None => (None, comment_of_undefined(field).map(String::from)),
            }
        };

        Card {
            keyword,
            value,
            comment,
            hierarch,
            value_indicator: true,
            image: image.to_string(),
            modified: false,
        }
    }

    /// Parse a single 80-byte record.
    pub fn from_record(record: &[u8; CARD_SIZE]) -> Result<Self> {
        let text = core::str::from_utf8(record)
            .map_err(|_| Error::InvalidHeader("card image is not ASCII"))?;
        Card::parse(text)
    }
}

/// Join the fragments of a long string value: the first field plus every
/// `CONTINUE` record of `image`.
fn join_continued(first_field: &str, image: &str) -> (Value, Option<String>) {
    let mut value = String::new();
    let mut comments: Vec<&str> = Vec::new();

    let mut fields = Vec::with_capacity(image.len() / CARD_SIZE);
    fields.push(first_field);
    for i in 1..image.len() / CARD_SIZE {
        let record = &image[i * CARD_SIZE..(i + 1) * CARD_SIZE];
        if record.starts_with(CONTINUE_KEYWORD) {
            fields.push(&record[KEYWORD_LENGTH..]);
        }
    }

    for field in fields {
        let Some((fragment, comment)) = parse_string_fragment(field) else {
            continue;
        };
        let fragment = fragment.trim_end();
        value.push_str(fragment.strip_suffix('&').unwrap_or(fragment));
        if let Some(c) = comment {
            comments.push(c);
        }
    }

    let comment = (!comments.is_empty()).then(|| comments.join(" "));
    (Value::String(value), comment)
}

fn format_commentary(keyword: &str, text: &str) -> String {
    if text.len() <= COMMENTARY_TEXT_LENGTH {
        return pad_record(&format!("{keyword:<8}{text}"));
    }
    let mut out = String::with_capacity(text.len().div_ceil(COMMENTARY_TEXT_LENGTH) * CARD_SIZE);
    for chunk in text.as_bytes().chunks(COMMENTARY_TEXT_LENGTH) {
        // Text was validated as ASCII, so every chunk is valid UTF-8.
        let chunk = core::str::from_utf8(chunk).unwrap_or_default();
        out.push_str(&pad_record(&format!("{keyword:<8}{chunk}")));
    }
    out
}

fn format_hierarch(keyword: &str, value: Option<&Value>, comment: Option<&str>) -> Result<String> {
    let value_text = value.map(format_value).unwrap_or_default();
    let spaced = format!("{HIERARCH_PREFIX}{keyword} = {value_text}");
    let compact = format!("{HIERARCH_PREFIX}{keyword}= {value_text}");

    for head in [&spaced, &compact] {
        let full = match comment {
            Some(c) => format!("{head} / {c}"),
            None => head.clone(),
        };
        if full.len() <= CARD_SIZE {
            return Ok(pad_record(&full));
        }
    }

    for head in [spaced, compact] {
        if head.len() <= CARD_SIZE {
            warn!("HIERARCH card {keyword:?} is too long; its comment will be truncated");
            let mut full = format!("{head} / {}", comment.unwrap_or(""));
            full.truncate(CARD_SIZE);
            return Ok(pad_record(&full));
        }
    }

    Err(Error::ValueTooLong(keyword.to_string()))
}

fn format_long_string(keyword: &str, value: &str, comment: Option<&str>) -> String {
    let escaped = escape_string(value);
    let words = split_words(&escaped, LONG_VALUE_CHUNK);
    let mut out = String::new();

    for (i, word) in words.iter().enumerate() {
        let head = if i == 0 {
            format!("{keyword:<8}{VALUE_INDICATOR}")
        } else {
            format!("{CONTINUE_KEYWORD:<8}  ")
        };
        let last = i == words.len() - 1;
        let fragment = if comment.is_none() && last {
            format!("'{word}'")
        } else {
            format!("'{word}&'")
        };
        out.push_str(&pad_record(&format!("{head}{fragment}")));
    }

    if let Some(comment) = comment {
        let words = split_words(comment, LONG_COMMENT_CHUNK);
        for (i, word) in words.iter().enumerate() {
            let head = if i == words.len() - 1 {
                "CONTINUE  '' / "
            } else {
                "CONTINUE  '&' / "
            };
            out.push_str(&pad_record(&format!("{head}{word}")));
        }
    }

    out
}

impl core::fmt::Display for Card {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.image)
    }
}
