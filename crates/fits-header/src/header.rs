//! The header: an ordered, dictionary-like collection of cards.
//!
//! Cards are addressed by position, by keyword (first occurrence) or by
//! `(keyword, n)` for the n-th occurrence of a duplicated keyword. The
//! placement rules for new cards follow the usual FITS conventions: new
//! cards go before the trailing blank cards (which they consume) and before
//! the trailing block of commentary cards, commentary cards are grouped
//! with earlier cards of the same keyword.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use log::warn;

use crate::block::{block_size_with_sep, BLOCK_SIZE, CARD_SIZE};
use crate::card::{is_commentary_keyword, normalize_keyword, Card, CONTINUE_KEYWORD, KEYWORD_LENGTH};
use crate::error::{Error, Result};
use crate::value::{parse_string_fragment, Value};

// ── Addressing ──

/// Addresses a single card of a [`Header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKey<'a> {
    /// Zero-based card position.
    Index(usize),
    /// First card with the keyword.
    Keyword(&'a str),
    /// The n-th (zero-based) card with the keyword.
    Nth(&'a str, usize),
}

impl From<usize> for CardKey<'_> {
    fn from(index: usize) -> Self {
        CardKey::Index(index)
    }
}

impl<'a> From<&'a str> for CardKey<'a> {
    fn from(keyword: &'a str) -> Self {
        CardKey::Keyword(keyword)
    }
}

impl<'a> From<&'a String> for CardKey<'a> {
    fn from(keyword: &'a String) -> Self {
        CardKey::Keyword(keyword.as_str())
    }
}

impl<'a> From<(&'a str, usize)> for CardKey<'a> {
    fn from((keyword, n): (&'a str, usize)) -> Self {
        CardKey::Nth(keyword, n)
    }
}

/// Where to place a card relative to another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    Before(CardKey<'a>),
    After(CardKey<'a>),
}

impl<'a> Position<'a> {
    pub fn before(key: impl Into<CardKey<'a>>) -> Self {
        Position::Before(key.into())
    }

    pub fn after(key: impl Into<CardKey<'a>>) -> Self {
        Position::After(key.into())
    }
}

// ── Options ──

/// Placement options for [`Header::append_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOptions {
    /// Consume one trailing blank card per record of the new card.
    pub use_blanks: bool,
    /// Place commentary cards after the trailing commentary block instead
    /// of before it.
    pub bottom: bool,
    /// Append at the very end, ignoring trailing blank and commentary cards.
    pub end: bool,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            use_blanks: true,
            bottom: false,
            end: false,
        }
    }
}

/// Serialisation options for [`Header::to_string_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions<'a> {
    /// Separator written between records.
    pub sep: &'a str,
    /// Write the `END` record.
    pub end_card: bool,
    /// Pad with blanks to a whole number of blocks.
    pub padding: bool,
}

impl Default for FormatOptions<'_> {
    fn default() -> Self {
        Self {
            sep: "",
            end_card: true,
            padding: true,
        }
    }
}

// ── Wildcards ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(u8),
    /// `*`
    AnyWord,
    /// `?`
    OneWord,
    /// trailing `...`
    AnyNonBlank,
}

/// Returns `true` if `pattern` contains `*`, `?` or ends in `...`.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.ends_with("...") || pattern.contains(['*', '?'])
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let (body, any_tail) = match pattern.strip_suffix("...") {
        Some(body) => (body, true),
        None => (pattern, false),
    };
    let mut tokens: Vec<Token> = body
        .bytes()
        .map(|b| match b {
            b'*' => Token::AnyWord,
            b'?' => Token::OneWord,
            other => Token::Literal(other.to_ascii_uppercase()),
        })
        .collect();
    if any_tail {
        tokens.push(Token::AnyNonBlank);
    }
    tokens
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn match_tokens(tokens: &[Token], text: &[u8]) -> bool {
    let Some((&first, rest)) = tokens.split_first() else {
        return text.is_empty();
    };
    match first {
        Token::Literal(c) => {
            text.first().is_some_and(|t| t.to_ascii_uppercase() == c) && match_tokens(rest, &text[1..])
        }
        Token::OneWord => text.first().is_some_and(|&t| is_word_byte(t)) && match_tokens(rest, &text[1..]),
        Token::AnyWord | Token::AnyNonBlank => {
            let accepts = |b: u8| {
                if first == Token::AnyWord {
                    is_word_byte(b)
                } else {
                    !b.is_ascii_whitespace()
                }
            };
            let run = text.iter().take_while(|&&b| accepts(b)).count();
            (0..=run).any(|i| match_tokens(rest, &text[i..]))
        }
    }
}

/// Case-insensitive match of a keyword against a wildcard pattern.
///
/// `*` matches any run of word characters, `?` a single word character and
/// a trailing `...` any run of non-blank characters. The whole keyword must
/// match.
pub fn keyword_matches(pattern: &str, keyword: &str) -> bool {
    match_tokens(&tokenize(pattern.trim()), keyword.as_bytes())
}

// ── Records ──

fn is_end_record(record: &str) -> bool {
    record.get(..KEYWORD_LENGTH).unwrap_or(record).trim_end() == "END"
}

fn is_end_record_bytes(record: &[u8]) -> bool {
    record.len() >= KEYWORD_LENGTH && &record[..KEYWORD_LENGTH] == b"END     "
}

fn is_continue_record(record: &str) -> bool {
    record.get(..KEYWORD_LENGTH) == Some("CONTINUE")
}

/// Returns `true` if the string fragment on `record` ends with `&`.
fn ends_with_ampersand(record: &str) -> bool {
    let field = if is_continue_record(record) {
        &record[KEYWORD_LENGTH..]
    } else if record.get(KEYWORD_LENGTH..KEYWORD_LENGTH + 2) == Some("= ") {
        &record[KEYWORD_LENGTH + 2..]
    } else {
        return false;
    };
    parse_string_fragment(field).is_some_and(|(s, _)| s.trim_end().ends_with('&'))
}

/// Group raw records into cards, joining `CONTINUE` records to the string
/// card they continue.
fn cards_from_records<'a>(records: impl IntoIterator<Item = &'a str>) -> Result<Vec<Card>> {
    let mut cards = Vec::new();
    let mut pending: Option<String> = None;
    let mut last_record = String::new();

    for record in records {
        if is_continue_record(record) {
            if let Some(image) = pending.as_mut() {
                if ends_with_ampersand(&last_record) {
                    image.push_str(&format!("{record:<width$}", width = CARD_SIZE));
                    last_record = record.to_string();
                    continue;
                }
            }
            warn!("CONTINUE card without a preceding long string: {:?}", record.trim_end());
        }
        if let Some(image) = pending.take() {
            cards.push(Card::parse(&image)?);
        }
        pending = Some(format!("{record:<width$}", width = CARD_SIZE));
        last_record = record.to_string();
    }
    if let Some(image) = pending {
        cards.push(Card::parse(&image)?);
    }
    Ok(cards)
}

/// Returns the byte length of the header at the start of `data`: the number
/// of whole blocks up to and including the one holding the `END` card.
pub fn header_byte_len(data: &[u8]) -> Result<usize> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::UnexpectedEof);
    }
    let mut offset = 0;
    while offset + BLOCK_SIZE <= data.len() {
        let block = &data[offset..offset + BLOCK_SIZE];
        offset += BLOCK_SIZE;
        if block.chunks_exact(CARD_SIZE).any(is_end_record_bytes) {
            return Ok(offset);
        }
    }
    Err(Error::MissingEnd)
}

const STRUCTURAL_KEYWORDS: [&str; 10] = [
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "GROUPS", "BSCALE",
    "TFIELDS",
];

const COLUMN_KEYWORDS: [&str; 10] = [
    "TFORM", "TSCAL", "TZERO", "TNULL", "TTYPE", "TUNIT", "TDISP", "TDIM", "THEAP", "TBCOL",
];

// ── Header ──

/// An ordered collection of header cards with a keyword index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
    /// Normalised keyword to ascending card positions.
    index: BTreeMap<String, Vec<usize>>,
}

impl Header {
    /// An empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header from cards, keeping them in order.
    pub fn from_cards<I: IntoIterator<Item = Card>>(cards: I) -> Self {
        let mut header = Header {
            cards: cards.into_iter().collect(),
            index: BTreeMap::new(),
        };
        header.reindex();
        header
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, card) in self.cards.iter().enumerate() {
            self.index
                .entry(card.keyword().to_string())
                .or_default()
                .push(i);
        }
    }

    // ── Queries ──

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Card> {
        self.cards.iter()
    }

    /// Every card's keyword, in order, duplicates included.
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(Card::keyword)
    }

    /// Distinct non-blank keywords in order of first appearance.
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.keywords()
            .filter(|kw| !kw.is_empty() && seen.insert(*kw))
            .collect()
    }

    /// Every card's value, in order.
    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.cards.iter().map(Card::value)
    }

    /// Resolve a key to a card position.
    pub fn index_of<'a>(&self, key: impl Into<CardKey<'a>>) -> Result<usize> {
        match key.into() {
            CardKey::Index(i) if i < self.cards.len() => Ok(i),
            CardKey::Index(i) => Err(Error::IndexOutOfRange {
                index: i,
                len: self.cards.len(),
            }),
            CardKey::Keyword(keyword) => self.nth_index(keyword, 0),
            CardKey::Nth(keyword, n) => self.nth_index(keyword, n),
        }
    }

    fn nth_index(&self, keyword: &str, n: usize) -> Result<usize> {
        let keyword = normalize_keyword(keyword);
        let positions = self
            .index
            .get(&keyword)
            .ok_or_else(|| Error::KeywordNotFound(keyword.clone()))?;
        positions.get(n).copied().ok_or(Error::IndexOutOfRange {
            index: n,
            len: positions.len(),
        })
    }

    pub fn contains<'a>(&self, key: impl Into<CardKey<'a>>) -> bool {
        self.index_of(key).is_ok()
    }

    /// Number of cards with the keyword.
    pub fn count(&self, keyword: &str) -> usize {
        self.index
            .get(&normalize_keyword(keyword))
            .map_or(0, Vec::len)
    }

    /// Position of the first card with the keyword.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.index
            .get(&normalize_keyword(keyword))
            .and_then(|p| p.first().copied())
    }

    /// Position of the first card with the keyword in `start..stop`. When
    /// `stop < start` the search runs backwards from `start` down to, but
    /// excluding, `stop`.
    pub fn position_in(&self, keyword: &str, start: usize, stop: usize) -> Option<usize> {
        let keyword = normalize_keyword(keyword);
        let positions = self.index.get(&keyword)?;
        if stop >= start {
            positions.iter().copied().find(|&i| i >= start && i < stop)
        } else {
            positions.iter().rev().copied().find(|&i| i <= start && i > stop)
        }
    }

    pub fn card<'a>(&self, key: impl Into<CardKey<'a>>) -> Option<&Card> {
        self.index_of(key).ok().map(|i| &self.cards[i])
    }

    /// The value of a card. `None` when the card is missing or its value is
    /// undefined.
    pub fn get<'a>(&self, key: impl Into<CardKey<'a>>) -> Option<&Value> {
        self.card(key).and_then(Card::value)
    }

    pub fn comment<'a>(&self, key: impl Into<CardKey<'a>>) -> Option<&str> {
        self.card(key).and_then(Card::comment)
    }

    /// Texts of all commentary cards with the keyword, in order.
    pub fn commentary(&self, keyword: &str) -> Vec<&str> {
        let keyword = normalize_keyword(keyword);
        self.index
            .get(&keyword)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&i| self.cards[i].value().and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn history(&self) -> Vec<&str> {
        self.commentary("HISTORY")
    }

    pub fn comment_lines(&self) -> Vec<&str> {
        self.commentary("COMMENT")
    }

    pub fn blank_lines(&self) -> Vec<&str> {
        self.commentary("")
    }

    /// Positions of the cards whose keyword matches a wildcard pattern.
    pub fn matching_indices(&self, pattern: &str) -> Vec<usize> {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| keyword_matches(pattern, c.keyword()))
            .map(|(i, _)| i)
            .collect()
    }

    /// A new header holding copies of the cards matching the pattern.
    pub fn matching(&self, pattern: &str) -> Header {
        Header::from_cards(
            self.matching_indices(pattern)
                .into_iter()
                .map(|i| self.cards[i].clone()),
        )
    }

    // ── Updates ──

    /// Set a keyword's value: the first existing card is updated in place,
    /// commentary keywords gain a new card after their last card, anything
    /// else is appended. The comment is left alone when `None`.
    pub fn set(&mut self, keyword: &str, value: impl Into<Value>, comment: Option<&str>) -> Result<()> {
        self.update_or_insert(keyword, Some(value.into()), comment)
    }

    /// Like [`Header::set`] but leaves the value undefined.
    pub fn set_undefined(&mut self, keyword: &str, comment: Option<&str>) -> Result<()> {
        self.update_or_insert(keyword, None, comment)
    }

    fn update_or_insert(&mut self, keyword: &str, value: Option<Value>, comment: Option<&str>) -> Result<()> {
        let card = Card::build(keyword, value.clone(), comment)?;
        if card.is_commentary() {
            self.insert_commentary(card);
            return Ok(());
        }
        match self.index.get(card.keyword()).map(|p| p[0]) {
            Some(idx) => {
                let existing = &mut self.cards[idx];
                existing.set_value(value)?;
                if comment.is_some() {
                    existing.set_comment(comment)?;
                }
            }
            None => self.append(card),
        }
        Ok(())
    }

    fn insert_commentary(&mut self, card: Card) {
        match self.index.get(card.keyword()).and_then(|p| p.last().copied()) {
            Some(last) if last + 1 >= self.cards.len() => {
                self.cards.push(card);
                self.reindex();
            }
            Some(last) => {
                let use_blanks = !card.is_blank();
                self.insert_with(last + 1, card, use_blanks);
            }
            None => self.append(card),
        }
    }

    /// Set a keyword and place its card before or after another card. An
    /// existing card is updated and moved; a `None` value or comment keeps
    /// the existing one.
    pub fn set_at(
        &mut self,
        keyword: &str,
        value: Option<Value>,
        comment: Option<&str>,
        position: Position<'_>,
    ) -> Result<()> {
        let card = Card::build(keyword, value.clone(), comment)?;
        let existing = if card.is_commentary() {
            None
        } else {
            self.index.get(card.keyword()).map(|p| p[0])
        };
        let Some(existing) = existing else {
            return self.relative_insert(card, &position);
        };
        {
            let target = &mut self.cards[existing];
            if value.is_some() {
                target.set_value(value)?;
            }
            if comment.is_some() {
                target.set_comment(comment)?;
            }
        }
        self.move_card(existing, &position)
    }

    /// Replace the value of an addressed card.
    pub fn set_value<'a>(&mut self, key: impl Into<CardKey<'a>>, value: Option<Value>) -> Result<()> {
        let idx = self.index_of(key)?;
        self.cards[idx].set_value(value)
    }

    /// Replace the comment of an addressed card; an empty comment removes it.
    pub fn set_comment<'a>(&mut self, key: impl Into<CardKey<'a>>, comment: &str) -> Result<()> {
        let idx = self.index_of(key)?;
        self.cards[idx].set_comment(Some(comment))
    }

    /// Return the value of `keyword`, setting it to `default` first when the
    /// keyword is missing.
    pub fn get_or_insert(&mut self, keyword: &str, default: impl Into<Value>) -> Result<Option<&Value>> {
        if !self.contains(keyword) {
            self.set(keyword, default, None)?;
        }
        Ok(self.get(keyword))
    }

    /// Dictionary-style update: every card is [`set`](Header::set).
    pub fn update<I: IntoIterator<Item = Card>>(&mut self, cards: I) -> Result<()> {
        for card in cards {
            if card.is_commentary() {
                self.insert_commentary(card);
            } else {
                self.update_or_insert(card.keyword(), card.value().cloned(), card.comment())?;
            }
        }
        Ok(())
    }

    // ── Placement ──

    pub fn append(&mut self, card: Card) {
        self.append_with(card, AppendOptions::default());
    }

    /// Append a card following the placement rules of [`AppendOptions`].
    /// Blank cards always go to the very end.
    pub fn append_with(&mut self, card: Card, options: AppendOptions) {
        if options.end || card.is_blank() {
            self.cards.push(card);
            self.reindex();
            return;
        }

        let records = card.physical_len();
        let mut idx = self.cards.len();
        while idx > 0 && self.cards[idx - 1].is_blank() {
            idx -= 1;
        }
        if !options.bottom {
            while idx > 0 && self.cards[idx - 1].is_commentary() {
                idx -= 1;
            }
        }
        self.cards.insert(idx, card);
        if options.use_blanks {
            self.consume_blanks(records);
        }
        self.reindex();
    }

    pub fn insert(&mut self, index: usize, card: Card) {
        self.insert_with(index, card, true);
    }

    /// Insert a card at `index`; past the end this is an append.
    pub fn insert_with(&mut self, index: usize, card: Card, use_blanks: bool) {
        if index >= self.cards.len() {
            self.append_with(
                card,
                AppendOptions {
                    use_blanks,
                    ..AppendOptions::default()
                },
            );
            return;
        }
        let records = card.physical_len();
        self.cards.insert(index, card);
        if use_blanks {
            self.consume_blanks(records);
        }
        self.reindex();
    }

    fn consume_blanks(&mut self, count: usize) {
        for _ in 0..count {
            if self.cards.last().is_some_and(Card::is_blank) {
                self.cards.pop();
            } else {
                break;
            }
        }
    }

    fn insertion_index(&self, position: &Position<'_>) -> Result<usize> {
        let (key, after) = match *position {
            Position::Before(key) => (key, false),
            Position::After(key) => (key, true),
        };
        if let CardKey::Index(i) = key {
            if i >= self.cards.len() {
                return Ok(self.cards.len());
            }
        }
        let idx = self.index_of(key)?;
        Ok(if after { idx + 1 } else { idx })
    }

    fn relative_insert(&mut self, card: Card, position: &Position<'_>) -> Result<()> {
        let target = self.insertion_index(position)?;
        self.insert(target, card);
        Ok(())
    }

    fn move_card(&mut self, from: usize, position: &Position<'_>) -> Result<()> {
        let card = self.cards.remove(from);
        self.reindex();
        match self.insertion_index(position) {
            Ok(target) => {
                self.insert_with(target, card, false);
                Ok(())
            }
            Err(e) => {
                self.cards.insert(from, card);
                self.reindex();
                Err(e)
            }
        }
    }

    /// Extend with copies of another header's cards, optionally without
    /// its structural keywords.
    pub fn extend(&mut self, other: &Header, strip: bool) {
        let source = if strip { other.stripped() } else { other.clone() };
        for card in source.cards {
            self.append(card);
        }
    }

    // ── Commentary ──

    fn add_commentary(&mut self, keyword: &str, text: &str, position: Option<Position<'_>>) -> Result<()> {
        let card = Card::commentary(keyword, text)?;
        match position {
            Some(position) => self.relative_insert(card, &position),
            None => {
                self.insert_commentary(card);
                Ok(())
            }
        }
    }

    pub fn add_history(&mut self, text: &str) -> Result<()> {
        self.add_commentary("HISTORY", text, None)
    }

    pub fn add_comment(&mut self, text: &str) -> Result<()> {
        self.add_commentary("COMMENT", text, None)
    }

    pub fn add_blank(&mut self, text: &str) -> Result<()> {
        self.add_commentary("", text, None)
    }

    pub fn add_history_at(&mut self, text: &str, position: Position<'_>) -> Result<()> {
        self.add_commentary("HISTORY", text, Some(position))
    }

    pub fn add_comment_at(&mut self, text: &str, position: Position<'_>) -> Result<()> {
        self.add_commentary("COMMENT", text, Some(position))
    }

    pub fn add_blank_at(&mut self, text: &str, position: Position<'_>) -> Result<()> {
        self.add_commentary("", text, Some(position))
    }

    // ── Removal ──

    /// Delete every card with the keyword (or matching a wildcard pattern).
    /// Returns the number of cards removed.
    pub fn remove(&mut self, keyword: &str) -> Result<usize> {
        if has_wildcard(keyword) {
            return Ok(self.remove_matching(keyword));
        }
        let keyword = normalize_keyword(keyword);
        let Some(positions) = self.index.get(&keyword) else {
            return Err(Error::KeywordNotFound(keyword));
        };
        let removed = positions.len();
        for i in positions.clone().into_iter().rev() {
            self.cards.remove(i);
        }
        self.reindex();
        Ok(removed)
    }

    /// Delete one card and return it.
    pub fn remove_card<'a>(&mut self, key: impl Into<CardKey<'a>>) -> Result<Card> {
        let idx = self.index_of(key)?;
        let card = self.cards.remove(idx);
        self.reindex();
        Ok(card)
    }

    /// Remove and return the last card.
    pub fn pop(&mut self) -> Option<Card> {
        let card = self.cards.pop();
        self.reindex();
        card
    }

    /// Delete the cards matching a wildcard pattern; returns how many.
    pub fn remove_matching(&mut self, pattern: &str) -> usize {
        let indices = self.matching_indices(pattern);
        for &i in indices.iter().rev() {
            self.cards.remove(i);
        }
        self.reindex();
        indices.len()
    }

    pub fn clear(&mut self) {
        self.cards.clear();
        self.index.clear();
    }

    fn discard(&mut self, keyword: &str) {
        if self.contains(keyword) {
            let _ = self.remove(keyword);
        }
    }

    /// Rename the first card with `old`.
    ///
    /// Renaming to `CONTINUE` and renaming between commentary and regular
    /// keywords are refused, as is renaming to a keyword already present
    /// unless `force` is set.
    pub fn rename_keyword(&mut self, old: &str, new: &str, force: bool) -> Result<()> {
        let old_kw = normalize_keyword(old);
        let new_kw = normalize_keyword(new);
        if new_kw == CONTINUE_KEYWORD {
            return Err(Error::InvalidRename("cannot rename to CONTINUE"));
        }
        let old_commentary = is_commentary_keyword(&old_kw);
        let new_commentary = is_commentary_keyword(&new_kw);
        if old_commentary || new_commentary {
            if !(old_commentary && new_commentary) {
                return Err(Error::InvalidRename(
                    "regular and commentary keys can not be renamed to each other",
                ));
            }
        } else if !force && self.index.contains_key(&new_kw) {
            return Err(Error::InvalidRename("intended keyword already exists in header"));
        }

        let idx = self.index_of(old_kw.as_str())?;
        self.cards[idx].rename(new)?;
        self.reindex();
        Ok(())
    }

    // ── Stripping ──

    /// Remove the structural keywords that describe the data layout.
    pub fn strip(&mut self) {
        let naxis = self.get("NAXIS").and_then(Value::as_i64).unwrap_or(0);
        for i in 1..=naxis {
            self.discard(&format!("NAXIS{i}"));
        }
        let tfields = self.get("TFIELDS").and_then(Value::as_i64).unwrap_or(0);
        for name in COLUMN_KEYWORDS {
            for i in 1..=tfields {
                self.discard(&format!("{name}{i}"));
            }
        }
        for name in STRUCTURAL_KEYWORDS {
            self.discard(name);
        }
    }

    /// A copy of the header with [`strip`](Header::strip) applied.
    pub fn stripped(&self) -> Header {
        let mut header = self.clone();
        header.strip();
        header
    }

    // ── Serialisation ──

    /// Serialise the records joined by `sep`, with the `END` record and
    /// blank padding to whole (separator-aware) blocks as requested.
    pub fn to_string_with(&self, options: &FormatOptions<'_>) -> String {
        let end_record = format!("{:<width$}", "END", width = CARD_SIZE);
        let mut records: Vec<&str> = self.cards.iter().flat_map(|c| c.records()).collect();
        if options.end_card {
            records.push(end_record.as_str());
        }
        let mut out = records.join(options.sep);
        if options.padding {
            let block = block_size_with_sep(options.sep.len());
            let rem = out.len() % block;
            if rem != 0 {
                out.extend(core::iter::repeat(' ').take(block - rem));
            }
        }
        out
    }

    /// The header as FITS blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string_with(&FormatOptions::default()).into_bytes()
    }

    /// One record per line, without `END` or padding.
    pub fn to_text(&self) -> String {
        let mut text = self.to_string_with(&FormatOptions {
            sep: "\n",
            end_card: false,
            padding: false,
        });
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }

    // ── Parsing ──

    /// Parse serialised records joined by `sep`. The data must be a whole
    /// number of blocks; parsing stops at the `END` record.
    pub fn from_str_with_sep(data: &str, sep: &str) -> Result<Self> {
        if data.len() % block_size_with_sep(sep.len()) != 0 {
            return Err(Error::InvalidHeader(
                "header size is not a multiple of the block size",
            ));
        }
        if !data.is_ascii() {
            return Err(Error::InvalidHeader("header is not ASCII"));
        }

        let stride = CARD_SIZE + sep.len();
        let mut records = Vec::with_capacity(data.len() / stride + 1);
        let mut offset = 0;
        while offset + CARD_SIZE <= data.len() {
            let record = &data[offset..offset + CARD_SIZE];
            if is_end_record(record) {
                break;
            }
            records.push(record);
            offset += stride;
        }
        Ok(Header::from_cards(cards_from_records(records)?))
    }

    /// Parse the header at the start of block-structured FITS data.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let len = header_byte_len(data)?;
        let text = core::str::from_utf8(&data[..len])
            .map_err(|_| Error::InvalidHeader("header is not ASCII"))?;
        Self::from_str_with_sep(text, "")
    }

    /// Parse the text form: one record per line, stopping at an `END` line.
    /// Lines longer than a card are truncated.
    pub fn from_text(text: &str) -> Result<Self> {
        if !text.is_ascii() {
            return Err(Error::InvalidHeader("header text is not ASCII"));
        }
        let records = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .take_while(|line| !is_end_record(line))
            .map(|line| &line[..line.len().min(CARD_SIZE)]);
        Ok(Header::from_cards(cards_from_records(records)?))
    }

    /// Merge a text dump into this header.
    ///
    /// `SIMPLE` and `XTENSION` replace each other as the first card.
    /// Commentary lines already present are skipped unless `replace`, which
    /// also clears the header first. Other keywords are set after the
    /// previously merged card.
    pub fn merge_text(&mut self, text: &str, replace: bool) -> Result<()> {
        let incoming = Header::from_text(text)?;
        if replace {
            self.clear();
        }

        let mut previous = 0usize;
        for card in incoming.cards {
            let keyword = card.keyword().to_string();
            match keyword.as_str() {
                "SIMPLE" | "XTENSION" => {
                    let other = if keyword == "SIMPLE" { "XTENSION" } else { "SIMPLE" };
                    self.discard(other);
                    self.place(card, Position::Before(CardKey::Index(0)))?;
                    previous = 0;
                }
                kw if card.is_commentary() => {
                    let text = card.value().and_then(Value::as_str).unwrap_or("");
                    let present = self.index.get(kw).is_some_and(|positions| {
                        positions
                            .iter()
                            .any(|&i| self.cards[i].value().and_then(Value::as_str) == Some(text))
                    });
                    if replace || !present {
                        self.relative_insert(card, &Position::After(CardKey::Index(previous)))?;
                        previous += 1;
                    }
                }
                _ => {
                    self.place(card, Position::After(CardKey::Index(previous)))?;
                    previous += 1;
                }
            }
        }
        Ok(())
    }

    /// Insert a parsed card, or update and move the existing card with the
    /// same keyword.
    fn place(&mut self, card: Card, position: Position<'_>) -> Result<()> {
        if self.index.contains_key(card.keyword()) {
            let keyword = card.keyword().to_string();
            self.set_at(&keyword, card.value().cloned(), card.comment(), position)
        } else {
            self.relative_insert(card, &position)
        }
    }
}

#[cfg(feature = "std")]
impl Header {
    /// Read header blocks from `reader` up to the block holding `END`.
    pub fn read_from<R: std::io::Read>(reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        let mut block = [0u8; BLOCK_SIZE];
        loop {
            match reader.read_exact(&mut block) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(if data.is_empty() {
                        Error::UnexpectedEof
                    } else {
                        Error::MissingEnd
                    });
                }
                Err(e) => return Err(e.into()),
            }
            data.extend_from_slice(&block);
            if block.chunks_exact(CARD_SIZE).any(is_end_record_bytes) {
                return Self::from_bytes(&data);
            }
        }
    }

    /// Write the header as FITS blocks.
    pub fn write_to<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read a header from a text file (one card per line).
    pub fn read_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(&text)
    }

    /// Write the text form to a file. Without `overwrite` an existing file
    /// is an error.
    pub fn write_file<P: AsRef<std::path::Path>>(&self, path: P, overwrite: bool) -> Result<()> {
        use std::io::Write;

        let mut file = if overwrite {
            std::fs::File::create(path)?
        } else {
            std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)?
        };
        file.write_all(self.to_text().as_bytes())?;
        Ok(())
    }
}

impl core::fmt::Display for Header {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_string_with(&FormatOptions::default()))
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = &'a Card;
    type IntoIter = core::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}

impl FromIterator<Card> for Header {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        Header::from_cards(iter)
    }
}
