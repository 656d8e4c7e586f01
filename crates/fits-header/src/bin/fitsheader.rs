use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use fits_header::hdu::{compressed_image_header, read_fits_file, FitsData, Hdu, HduKind, HduSelector};
use fits_header::header::{FormatOptions, Header};
use log::{error, warn};

/// Print the header(s) of FITS file(s).
#[derive(Debug, Parser)]
#[command(name = "fitsheader", version)]
struct Cli {
    /// HDU to show, by index, EXTNAME or EXTNAME,EXTVER. May be repeated;
    /// all HDUs are shown by default.
    #[arg(short = 'e', long = "extension", value_name = "HDU")]
    extensions: Vec<HduSelector>,

    /// Only show cards matching this keyword (wildcards allowed). May be
    /// repeated.
    #[arg(short = 'k', long = "keyword", value_name = "KEYWORD")]
    keywords: Vec<String>,

    /// Show the stored binary table header of compressed images instead of
    /// the image header they describe.
    #[arg(short = 'c', long)]
    compressed: bool,

    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

fn selected<'a>(fits: &'a FitsData, cli: &Cli) -> fits_header::Result<Vec<(String, &'a Hdu)>> {
    if cli.extensions.is_empty() {
        return Ok(fits.iter().enumerate().map(|(i, hdu)| (i.to_string(), hdu)).collect());
    }
    cli.extensions
        .iter()
        .map(|selector| {
            let (_, hdu) = fits.select(selector)?;
            Ok((selector.to_string(), hdu))
        })
        .collect()
}

/// The header to print: compressed images show their image header unless
/// the stored table header is asked for.
fn shown_header(hdu: &Hdu, compressed: bool) -> fits_header::Result<Cow<'_, Header>> {
    match hdu.kind {
        HduKind::CompressedImage { .. } if !compressed => {
            Ok(Cow::Owned(compressed_image_header(&hdu.header)?))
        }
        _ => Ok(Cow::Borrowed(&hdu.header)),
    }
}

fn format_cards(header: &Header, key: &str, path: &Path, keywords: &[String]) -> String {
    if keywords.is_empty() {
        let mut text = header.to_string_with(&FormatOptions {
            sep: "\n",
            end_card: true,
            padding: false,
        });
        text.push('\n');
        return text;
    }

    let mut out = String::new();
    for keyword in keywords {
        let matches = header.matching_indices(keyword);
        if matches.is_empty() {
            warn!(
                "{}: keyword {} not found in HDU {}",
                path.display(),
                keyword,
                key
            );
            continue;
        }
        for index in matches {
            for record in header.cards()[index].records() {
                out.push_str(record);
                out.push('\n');
            }
        }
    }
    out
}

fn format_file(path: &Path, cli: &Cli) -> fits_header::Result<String> {
    let fits = read_fits_file(path)?;
    let mut out = String::new();
    for (n, (key, hdu)) in selected(&fits, cli)?.into_iter().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        let header = shown_header(hdu, cli.compressed)?;
        out.push_str(&format!("# HDU {} in {}:\n", key, path.display()));
        out.push_str(&format_cards(&header, &key, path, &cli.keywords));
    }
    Ok(out)
}

fn run(cli: &Cli) -> bool {
    let mut ok = true;
    for (n, path) in cli.files.iter().enumerate() {
        match format_file(path, cli) {
            Ok(text) => {
                if n > 0 {
                    println!();
                }
                print!("{}", text);
            }
            Err(e) => {
                error!("{}: {}", path.display(), e);
                ok = false;
            }
        }
    }
    ok
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if !run(&cli) {
        process::exit(1);
    }
}
