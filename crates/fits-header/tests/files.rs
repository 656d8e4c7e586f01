//! Filesystem integration tests: header text files and FITS files on disk.

use fits_header::diff::{DiffOptions, FitsDiff};
use fits_header::hdu::{read_fits_file, FitsData, Hdu};
use fits_header::{Error, Header, Value};

fn primary_with_pixels(pixels: &[u8]) -> Hdu {
    let mut h = Header::new();
    h.set("SIMPLE", true, None).unwrap();
    h.set("BITPIX", 8, None).unwrap();
    h.set("NAXIS", 1, None).unwrap();
    h.set("NAXIS1", pixels.len(), None).unwrap();
    h.set("TELESCOP", "Hale", None).unwrap();
    Hdu::new(h, pixels.to_vec(), true).unwrap()
}

#[test]
fn header_text_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.txt");

    let mut h = Header::new();
    h.set("SIMPLE", true, None).unwrap();
    h.set("EXPTIME", 60.0, Some("seconds")).unwrap();
    h.add_history("calibrated").unwrap();
    h.write_file(&path, false).unwrap();

    let back = Header::read_file(&path).unwrap();
    assert_eq!(back.get("EXPTIME"), Some(&Value::Float(60.0)));
    assert_eq!(back.history(), vec!["calibrated"]);
    assert_eq!(back.len(), h.len());
}

#[test]
fn write_file_refuses_to_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.txt");

    let mut h = Header::new();
    h.set("A", 1, None).unwrap();
    h.write_file(&path, false).unwrap();

    h.set("A", 2, None).unwrap();
    assert!(matches!(h.write_file(&path, false), Err(Error::Io(_))));
    assert_eq!(Header::read_file(&path).unwrap().get("A"), Some(&Value::Integer(1)));

    h.write_file(&path, true).unwrap();
    assert_eq!(Header::read_file(&path).unwrap().get("A"), Some(&Value::Integer(2)));
}

#[test]
fn header_read_from_fits_stream() {
    let fits = FitsData {
        hdus: vec![primary_with_pixels(&[1, 2, 3])],
    };
    let bytes = fits.to_bytes();
    let mut reader = std::io::Cursor::new(bytes);
    let h = Header::read_from(&mut reader).unwrap();
    assert_eq!(h.get("TELESCOP"), Some(&Value::from("Hale")));
    assert_eq!(reader.position(), 2880);
}

#[test]
fn read_and_diff_fits_files() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a.fits");
    let b_path = dir.path().join("b.fits");

    let a = FitsData {
        hdus: vec![primary_with_pixels(&[1, 2, 3, 4])],
    };
    let b = FitsData {
        hdus: vec![primary_with_pixels(&[1, 2, 3, 5])],
    };
    std::fs::write(&a_path, a.to_bytes()).unwrap();
    std::fs::write(&b_path, b.to_bytes()).unwrap();

    let parsed = read_fits_file(&a_path).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed.primary().data, vec![1, 2, 3, 4]);
    assert_eq!(parsed.primary().data_start, 2880);
    assert_eq!(parsed.primary().header.keys(), a.primary().header.keys());

    let diff = FitsDiff::from_files(&a_path, &b_path, &DiffOptions::default()).unwrap();
    assert!(!diff.identical());
    assert_eq!(diff.diff_extensions.len(), 1);
    assert!(diff.report().contains("Data differs at [3]:"));

    assert!(FitsDiff::from_files(&a_path, &a_path, &DiffOptions::default())
        .unwrap()
        .identical());
}

#[test]
fn missing_fits_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.fits");
    assert!(matches!(read_fits_file(&missing), Err(Error::Io(_))));
}
