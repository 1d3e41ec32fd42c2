//! Command-line argument parsing for `aclc`.
//!
//! Options use the `-option=value` form:
//!
//! ```text
//! aclc -acl=<clip file> [-config=<file>] [-stats[=<file>]] [-out=<file>]
//!      [-level=lowest|low|medium|high|highest] [-test] [-decomp] [-exhaustive]
//! ```
//!
//! Bad or unrecognised options return an `Err` with a human-readable
//! message.

use acl::CompressionLevel;
use anyhow::{anyhow, bail, Result};

/// Complete set of options produced by the argument parsing loop.
#[derive(Debug, Default)]
pub struct Options {
    /// Input clip file (`.acl.sjson` document or `.acl.bin` compressed
    /// buffer).
    pub input_filename: String,
    /// Optional compression settings file.
    pub config_filename: Option<String>,
    /// Emit the stats document.
    pub output_stats: bool,
    /// Stats destination; `None` prints to stdout.
    pub stats_filename: Option<String>,
    /// Where to write the compressed buffer.
    pub output_filename: Option<String>,
    /// Compression level preset override.
    pub level: Option<CompressionLevel>,
    /// Verify the round-trip error after compressing.
    pub regression_test: bool,
    /// Profile pose decompression.
    pub profile_decompression: bool,
    /// Compress under every supported configuration.
    pub exhaustive: bool,
}

const ACL_INPUT_OPTION: &str = "-acl=";
const CONFIG_OPTION: &str = "-config=";
const STATS_OPTION: &str = "-stats";
const OUT_OPTION: &str = "-out=";
const LEVEL_OPTION: &str = "-level=";

/// Parse the process arguments (without the program name).
pub fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options::default();

    for argument in args {
        if let Some(value) = argument.strip_prefix(ACL_INPUT_OPTION) {
            options.input_filename = value.to_owned();
        } else if let Some(value) = argument.strip_prefix(CONFIG_OPTION) {
            options.config_filename = Some(value.to_owned());
        } else if let Some(rest) = argument.strip_prefix(STATS_OPTION) {
            options.output_stats = true;
            match rest.strip_prefix('=') {
                Some(path) if !path.is_empty() => options.stats_filename = Some(path.to_owned()),
                Some(_) => bail!("bad usage: -stats= requires a file path"),
                None if rest.is_empty() => {}
                None => bail!("bad usage: unknown option '{argument}'"),
            }
        } else if let Some(value) = argument.strip_prefix(OUT_OPTION) {
            options.output_filename = Some(value.to_owned());
        } else if let Some(value) = argument.strip_prefix(LEVEL_OPTION) {
            options.level = Some(
                CompressionLevel::from_name(value)
                    .ok_or_else(|| anyhow!("bad usage: unknown level '{value}'"))?,
            );
        } else if argument == "-test" {
            options.regression_test = true;
        } else if argument == "-decomp" {
            options.profile_decompression = true;
        } else if argument == "-exhaustive" {
            options.exhaustive = true;
        } else {
            bail!("bad usage: unknown option '{argument}'");
        }
    }

    if options.input_filename.is_empty() {
        bail!("bad usage: an input file is required (-acl=<path>)");
    }
    if !options.input_filename.ends_with(".acl.sjson")
        && !options.input_filename.ends_with(".acl.bin")
    {
        bail!(
            "bad usage: input file must end in .acl.sjson or .acl.bin: '{}'",
            options.input_filename
        );
    }
    if let Some(output) = &options.output_filename {
        if !output.ends_with(".acl.bin") {
            bail!("bad usage: output file must end in .acl.bin: '{output}'");
        }
    }

    Ok(options)
}

pub fn print_usage() {
    eprintln!("usage: aclc -acl=<clip file> [options]");
    eprintln!("  -acl=<file>      input clip (.acl.sjson) or compressed buffer (.acl.bin)");
    eprintln!("  -config=<file>   compression settings (JSON)");
    eprintln!("  -stats[=<file>]  emit compression diagnostics (stdout by default)");
    eprintln!("  -out=<file>      write the compressed buffer (.acl.bin)");
    eprintln!("  -level=<level>   lowest | low | medium | high | highest");
    eprintln!("  -test            verify the round-trip error against the clip threshold");
    eprintln!("  -decomp          profile pose decompression");
    eprintln!("  -exhaustive      compress under every supported configuration");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        let owned: Vec<String> = args.iter().map(|s| (*s).to_owned()).collect();
        parse_options(&owned)
    }

    #[test]
    fn parses_the_full_surface() {
        let options = parse(&[
            "-acl=clips/walk.acl.sjson",
            "-config=settings.json",
            "-stats=out.json",
            "-out=walk.acl.bin",
            "-level=highest",
            "-test",
            "-decomp",
            "-exhaustive",
        ])
        .unwrap();

        assert_eq!(options.input_filename, "clips/walk.acl.sjson");
        assert_eq!(options.config_filename.as_deref(), Some("settings.json"));
        assert!(options.output_stats);
        assert_eq!(options.stats_filename.as_deref(), Some("out.json"));
        assert_eq!(options.output_filename.as_deref(), Some("walk.acl.bin"));
        assert_eq!(options.level, Some(CompressionLevel::Highest));
        assert!(options.regression_test);
        assert!(options.profile_decompression);
        assert!(options.exhaustive);
    }

    #[test]
    fn stats_without_a_path_goes_to_stdout() {
        let options = parse(&["-acl=a.acl.sjson", "-stats"]).unwrap();
        assert!(options.output_stats);
        assert!(options.stats_filename.is_none());
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["-acl=a.txt"]).is_err());
        assert!(parse(&["-acl=a.acl.sjson", "-level=extreme"]).is_err());
        assert!(parse(&["-acl=a.acl.sjson", "-frobnicate"]).is_err());
        assert!(parse(&["-acl=a.acl.sjson", "-out=a.bin"]).is_err());
    }
}
