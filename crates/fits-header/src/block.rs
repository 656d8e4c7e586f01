//! FITS block geometry: headers and data are stored in 2880-byte blocks of
//! 80-column records.

use alloc::vec::Vec;

pub const BLOCK_SIZE: usize = 2880;

/// Length of one header record.
pub const CARD_SIZE: usize = 80;

pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Header blocks are padded with ASCII blanks.
pub const HEADER_PAD_BYTE: u8 = b' ';

/// Data blocks are padded with zeros (ASCII tables use blanks instead).
pub const DATA_PAD_BYTE: u8 = 0;

/// Whole blocks needed for `len` bytes. Zero bytes take zero blocks.
pub const fn blocks_needed(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}

/// `len` rounded up to a whole number of blocks.
pub const fn padded_byte_len(len: usize) -> usize {
    blocks_needed(len) * BLOCK_SIZE
}

/// Bytes missing from `len` to the next block boundary; 0 when aligned.
pub const fn pad_length(len: usize) -> usize {
    padded_byte_len(len) - len
}

/// Size of one header block when its records are joined by a separator of
/// `sep_len` bytes, as in a text dump with one card per line.
pub const fn block_size_with_sep(sep_len: usize) -> usize {
    BLOCK_SIZE + sep_len * (CARDS_PER_BLOCK - 1)
}

/// Grow `buf` with `pad_byte` to the next block boundary.
pub fn pad_to_block(buf: &mut Vec<u8>, pad_byte: u8) {
    buf.resize(padded_byte_len(buf.len()), pad_byte);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn block_counts() {
        assert_eq!(CARDS_PER_BLOCK, 36);
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(80), 1);
        assert_eq!(blocks_needed(2880), 1);
        assert_eq!(blocks_needed(2881), 2);
        assert_eq!(padded_byte_len(36 * 80 + 80), 5760);
    }

    #[test]
    fn pad_lengths() {
        assert_eq!(pad_length(0), 0);
        assert_eq!(pad_length(5760), 0);
        assert_eq!(pad_length(3 * CARD_SIZE), BLOCK_SIZE - 240);
    }

    #[test]
    fn separator_block_size() {
        assert_eq!(block_size_with_sep(0), BLOCK_SIZE);
        assert_eq!(block_size_with_sep(1), BLOCK_SIZE + 35);
        assert_eq!(block_size_with_sep(2), BLOCK_SIZE + 70);
    }

    #[test]
    fn pad_to_block_uses_pad_byte() {
        let mut data = vec![7u8; 10];
        pad_to_block(&mut data, DATA_PAD_BYTE);
        assert_eq!(data.len(), BLOCK_SIZE);
        assert!(data[10..].iter().all(|&b| b == 0));

        let mut header = b"END".to_vec();
        pad_to_block(&mut header, HEADER_PAD_BYTE);
        assert_eq!(header.len(), BLOCK_SIZE);
        assert_eq!(header[3], b' ');

        let mut empty = Vec::new();
        pad_to_block(&mut empty, HEADER_PAD_BYTE);
        assert!(empty.is_empty());
    }
}
