use std::path::PathBuf;
use std::process;

use clap::Parser;
use fits_header::diff::{DiffOptions, FitsDiff};
use log::error;

/// Compare two FITS files and report the differences.
#[derive(Debug, Parser)]
#[command(name = "fitsdiff", version)]
struct Cli {
    /// Keywords to leave out of header comparison (comma-separated,
    /// wildcards allowed). `*` skips headers entirely.
    #[arg(short = 'k', long = "ignore-keywords", value_delimiter = ',', value_name = "KEYWORDS")]
    ignore_keywords: Vec<String>,

    /// Keywords whose comments are not compared (comma-separated).
    #[arg(short = 'c', long = "ignore-comments", value_delimiter = ',', value_name = "KEYWORDS")]
    ignore_comments: Vec<String>,

    /// Table columns to leave out of comparison (comma-separated).
    #[arg(short = 'f', long = "ignore-fields", value_delimiter = ',', value_name = "COLUMNS")]
    ignore_fields: Vec<String>,

    /// Relative tolerance for floating-point values.
    #[arg(short = 'r', long = "rel-tolerance", default_value_t = 0.0, value_name = "TOL")]
    tolerance: f64,

    /// Differences to report per data unit; negative reports all of them.
    #[arg(
        short = 'n',
        long = "num-diffs",
        default_value_t = 10,
        allow_negative_numbers = true,
        value_name = "NUM"
    )]
    numdiffs: i64,

    /// Compare trailing blanks in string values.
    #[arg(long)]
    no_ignore_blanks: bool,

    /// Compare blank cards as well.
    #[arg(long)]
    keep_blank_cards: bool,

    a: PathBuf,
    b: PathBuf,
}

impl Cli {
    fn options(&self) -> DiffOptions {
        DiffOptions {
            ignore_keywords: self.ignore_keywords.clone(),
            ignore_comments: self.ignore_comments.clone(),
            ignore_fields: self.ignore_fields.clone(),
            tolerance: self.tolerance,
            ignore_blanks: !self.no_ignore_blanks,
            ignore_blank_cards: !self.keep_blank_cards,
            numdiffs: usize::try_from(self.numdiffs).ok(),
        }
    }
}

fn format_preamble(cli: &Cli, options: &DiffOptions) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n fitsdiff: {}\n", env!("CARGO_PKG_VERSION")));
    out.push_str(&format!(" a: {}\n b: {}\n", cli.a.display(), cli.b.display()));
    if !options.ignore_keywords.is_empty() {
        out.push_str(&format!(
            " Keyword(s) not to be compared:\n  {}\n",
            options.ignore_keywords.join(" ")
        ));
    }
    if !options.ignore_comments.is_empty() {
        out.push_str(&format!(
            " Keyword(s) whose comments are not to be compared:\n  {}\n",
            options.ignore_comments.join(" ")
        ));
    }
    if !options.ignore_fields.is_empty() {
        out.push_str(&format!(
            " Table column(s) not to be compared:\n  {}\n",
            options.ignore_fields.join(" ")
        ));
    }
    match options.numdiffs {
        Some(n) => out.push_str(&format!(
            " Maximum number of different data values to be reported: {n}\n"
        )),
        None => out.push_str(" Reporting all different data values\n"),
    }
    out.push_str(&format!(
        " Relative tolerance: {}\n\n",
        options.tolerance
    ));
    out
}

/// Returns whether the files are identical, and the report.
fn run(cli: &Cli) -> fits_header::Result<(bool, String)> {
    let options = cli.options();
    let diff = FitsDiff::from_files(&cli.a, &cli.b, &options)?;
    let mut out = format_preamble(cli, &options);
    out.push_str(&diff.report());
    Ok((diff.identical(), out))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok((identical, report)) => {
            print!("{}", report);
            process::exit(if identical { 0 } else { 1 });
        }
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    }
}
