//! Image pixel decoding, used when comparing image HDUs.

use alloc::vec::Vec;

use bytemuck::pod_collect_to_vec;

use crate::error::{Error, Result};
use crate::hdu::{Hdu, HduKind};

/// Image pixel data extracted from a FITS HDU, typed by BITPIX.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ImageData {
    pub fn len(&self) -> usize {
        match self {
            ImageData::U8(v) => v.len(),
            ImageData::I16(v) => v.len(),
            ImageData::I32(v) => v.len(),
            ImageData::I64(v) => v.len(),
            ImageData::F32(v) => v.len(),
            ImageData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for floating-point pixels.
    pub fn is_float(&self) -> bool {
        matches!(self, ImageData::F32(_) | ImageData::F64(_))
    }

    /// The pixel at flat index `i` widened to `f64`.
    pub fn pixel_as_f64(&self, i: usize) -> Option<f64> {
        match self {
            ImageData::U8(v) => v.get(i).map(|&p| f64::from(p)),
            ImageData::I16(v) => v.get(i).map(|&p| f64::from(p)),
            ImageData::I32(v) => v.get(i).map(|&p| f64::from(p)),
            ImageData::I64(v) => v.get(i).map(|&p| p as f64),
            ImageData::F32(v) => v.get(i).map(|&p| f64::from(p)),
            ImageData::F64(v) => v.get(i).copied(),
        }
    }

    /// The pixel at flat index `i` as an exact integer, for integer images.
    pub fn pixel_as_i64(&self, i: usize) -> Option<i64> {
        match self {
            ImageData::U8(v) => v.get(i).map(|&p| i64::from(p)),
            ImageData::I16(v) => v.get(i).map(|&p| i64::from(p)),
            ImageData::I32(v) => v.get(i).map(|&p| i64::from(p)),
            ImageData::I64(v) => v.get(i).copied(),
            ImageData::F32(_) | ImageData::F64(_) => None,
        }
    }
}

/// Returns the number of bytes per pixel for a given BITPIX value.
pub fn bytes_per_pixel(bitpix: i64) -> Result<usize> {
    match bitpix {
        8 | 16 | 32 | 64 | -32 | -64 => Ok((bitpix.unsigned_abs() / 8) as usize),
        _ => Err(Error::InvalidBitpix(bitpix)),
    }
}

/// Returns the image dimensions (NAXISn values) of an image HDU.
pub fn image_dimensions(hdu: &Hdu) -> Result<Vec<usize>> {
    match &hdu.kind {
        HduKind::Primary { naxes, .. } | HduKind::Image { naxes, .. } => Ok(naxes.clone()),
        _ => Err(Error::InvalidHeader("not an image HDU")),
    }
}

/// Decode big-endian pixel bytes into native values.
pub fn decode_pixels(raw: &[u8], bitpix: i64) -> Result<ImageData> {
    let bpp = bytes_per_pixel(bitpix)?;
    if raw.len() % bpp != 0 {
        return Err(Error::UnexpectedEof);
    }
    match bitpix {
        8 => Ok(ImageData::U8(raw.to_vec())),
        16 => {
            let mut pixels: Vec<i16> = pod_collect_to_vec(raw);
            for v in &mut pixels {
                *v = i16::from_be(*v);
            }
            Ok(ImageData::I16(pixels))
        }
        32 => {
            let mut pixels: Vec<i32> = pod_collect_to_vec(raw);
            for v in &mut pixels {
                *v = i32::from_be(*v);
            }
            Ok(ImageData::I32(pixels))
        }
        64 => {
            let mut pixels: Vec<i64> = pod_collect_to_vec(raw);
            for v in &mut pixels {
                *v = i64::from_be(*v);
            }
            Ok(ImageData::I64(pixels))
        }
        -32 => {
            let mut pixels: Vec<f32> = pod_collect_to_vec(raw);
            for v in &mut pixels {
                *v = f32::from_bits(u32::from_be(v.to_bits()));
            }
            Ok(ImageData::F32(pixels))
        }
        -64 => {
            let mut pixels: Vec<f64> = pod_collect_to_vec(raw);
            for v in &mut pixels {
                *v = f64::from_bits(u64::from_be(v.to_bits()));
            }
            Ok(ImageData::F64(pixels))
        }
        other => Err(Error::InvalidBitpix(other)),
    }
}

/// Decode the pixels of a primary or image extension HDU.
pub fn read_image(hdu: &Hdu) -> Result<ImageData> {
    match &hdu.kind {
        HduKind::Primary { bitpix, .. } | HduKind::Image { bitpix, .. } => {
            decode_pixels(&hdu.data, *bitpix)
        }
        _ => Err(Error::InvalidHeader("not an image HDU")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn bytes_per_pixel_values() {
        assert_eq!(bytes_per_pixel(8).unwrap(), 1);
        assert_eq!(bytes_per_pixel(16).unwrap(), 2);
        assert_eq!(bytes_per_pixel(-32).unwrap(), 4);
        assert_eq!(bytes_per_pixel(-64).unwrap(), 8);
        assert!(matches!(bytes_per_pixel(24), Err(Error::InvalidBitpix(24))));
    }

    #[test]
    fn decode_i16_big_endian() {
        let raw = [0x00, 0x01, 0xff, 0xfe];
        assert_eq!(decode_pixels(&raw, 16).unwrap(), ImageData::I16(vec![1, -2]));
    }

    #[test]
    fn decode_f32_big_endian() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1.5f32.to_be_bytes());
        raw.extend_from_slice(&(-2.0f32).to_be_bytes());
        let data = decode_pixels(&raw, -32).unwrap();
        assert_eq!(data, ImageData::F32(vec![1.5, -2.0]));
        assert!(data.is_float());
        assert_eq!(data.pixel_as_f64(1), Some(-2.0));
        assert_eq!(data.pixel_as_i64(0), None);
    }

    #[test]
    fn decode_f64_and_i64() {
        let raw = 3.25f64.to_be_bytes();
        assert_eq!(decode_pixels(&raw, -64).unwrap(), ImageData::F64(vec![3.25]));
        let raw = (-7i64).to_be_bytes();
        let data = decode_pixels(&raw, 64).unwrap();
        assert_eq!(data.pixel_as_i64(0), Some(-7));
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn decode_rejects_partial_pixels() {
        assert!(matches!(decode_pixels(&[0, 1, 2], 16), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn decode_empty() {
        let data = decode_pixels(&[], 32).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.pixel_as_f64(0), None);
    }
}
