#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod card;
pub mod columns;
pub mod diff;
pub mod error;
pub mod hdu;
pub mod header;
pub mod image;
pub mod value;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use card::Card;
pub use error::{Error, Result};
pub use header::{CardKey, Header, Position};
pub use value::Value;
