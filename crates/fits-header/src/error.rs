use alloc::string::String;

/// All errors that can occur while reading, editing or writing FITS headers.
#[derive(Debug)]
pub enum Error {
    /// Malformed FITS header block.
    InvalidHeader(&'static str),
    /// Premature end of data while reading.
    UnexpectedEof,
    /// The header data ended without an END card.
    MissingEnd,
    /// Unrecognized BITPIX value.
    InvalidBitpix(i64),
    /// Malformed keyword name.
    InvalidKeyword(String),
    /// A header value could not be parsed or represented.
    InvalidValue(&'static str),
    /// A card image cannot hold the keyword and value.
    ValueTooLong(String),
    /// No card with the given keyword exists.
    KeywordNotFound(String),
    /// A card index is outside the header.
    IndexOutOfRange { index: usize, len: usize },
    /// A required keyword was not found in the header.
    MissingKeyword(&'static str),
    /// Unknown or unsupported XTENSION type for the requested operation.
    UnsupportedExtension(String),
    /// A TFORMn value could not be parsed.
    InvalidColumnFormat(String),
    /// A keyword rename was refused.
    InvalidRename(&'static str),
    /// The requested HDU does not exist.
    HduNotFound(String),
    /// An I/O error from the standard library.
    #[cfg(feature = "std")]
    Io(std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidHeader(msg) => write!(f, "invalid FITS header: {msg}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::MissingEnd => write!(f, "header missing END card"),
            Error::InvalidBitpix(v) => write!(f, "invalid BITPIX value: {v}"),
            Error::InvalidKeyword(kw) => write!(f, "illegal keyword name: {kw:?}"),
            Error::InvalidValue(msg) => write!(f, "invalid header value: {msg}"),
            Error::ValueTooLong(kw) => {
                write!(f, "the value of keyword {kw:?} is too long to fit in a card")
            }
            Error::KeywordNotFound(kw) => write!(f, "keyword {kw:?} not found"),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "card index {index} out of range for header of {len} cards")
            }
            Error::MissingKeyword(kw) => write!(f, "missing required keyword: {kw}"),
            Error::UnsupportedExtension(x) => write!(f, "unsupported XTENSION type: {x}"),
            Error::InvalidColumnFormat(tform) => write!(f, "invalid column format: {tform:?}"),
            Error::InvalidRename(msg) => write!(f, "cannot rename keyword: {msg}"),
            Error::HduNotFound(key) => write!(f, "extension {key} not found"),
            #[cfg(feature = "std")]
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
