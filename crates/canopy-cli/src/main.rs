use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use canopy::{BuiltinProvider, Config, Highlighter, HtmlFormat, Theme, builtin};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Canopy syntax highlighter - terminal-friendly code highlighting
#[derive(Debug, Parser)]
#[command(name = "canopy", version)]
struct Args {
    /// Language to highlight (e.g., javascript, json, html)
    ///
    /// If omitted, language is auto-detected from filename or content
    #[arg(short, long)]
    lang: Option<String>,

    /// Output HTML instead of ANSI escape sequences
    #[arg(long)]
    html: bool,

    /// Emit HTML custom elements (`<a-k>`) instead of class names
    #[arg(long, requires = "html")]
    custom_elements: bool,

    /// Theme for ANSI output (ignored with --html)
    #[arg(short, long, default_value = "dark")]
    theme: String,

    /// Load the ANSI theme from a Helix-style TOML file instead
    #[arg(long, conflicts_with = "theme")]
    theme_file: Option<PathBuf>,

    /// Fail on unknown languages instead of printing plain text
    #[arg(long)]
    strict: bool,

    /// Log engine decisions to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// List the builtin languages and themes, then exit
    #[arg(long)]
    list: bool,

    /// Input: code string, filename, or '-' for stdin
    ///
    /// If a file path is provided, reads from that file.
    /// If '-' is provided, reads from stdin.
    /// Otherwise, treats the argument as raw code to highlight.
    input: Option<String>,
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "canopy_highlight=debug,canopy=debug",
            _ => "canopy_highlight=trace,canopy=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.list {
        return list();
    }

    let (content, filename) = read_input(args.input.as_deref())?;

    let lang = match (&args.lang, &filename) {
        (Some(lang), _) => lang.clone(),
        (None, Some(filename)) => canopy::detect_language(filename)
            .or_else(|| canopy::detect_from_content(&content))
            .map(str::to_string)
            .ok_or_else(|| {
                anyhow!("Could not detect language from filename: {filename}. Use --lang to specify.")
            })?,
        (None, None) => canopy::detect_from_content(&content)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Could not detect language. Use --lang to specify."))?,
    };
    tracing::debug!(language = %lang, bytes = content.len(), "highlighting");

    let config = Config {
        strict: args.strict,
        theme: args.theme.clone(),
        html_format: if args.custom_elements {
            HtmlFormat::CustomElements
        } else {
            HtmlFormat::ClassNames
        },
        ..Config::default()
    };
    let highlighter = Highlighter::with_config(config);

    let output = if args.html {
        highlighter
            .highlight(&lang, &content)
            .with_context(|| format!("Highlighting {lang} failed"))?
    } else {
        let theme = match &args.theme_file {
            Some(path) => load_theme(path)?,
            None => (*highlighter.theme()?).clone(),
        };
        highlighter
            .highlight_to_ansi_with(&lang, &content, &theme)
            .with_context(|| format!("Highlighting {lang} failed"))?
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}

/// Read the input, returning its content and, for files, the file name.
fn read_input(input: Option<&str>) -> Result<(String, Option<String>)> {
    match input {
        None | Some("-") => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok((buffer, None))
        }
        Some(input) => {
            let path = Path::new(input);
            if path.is_file() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read file '{input}'"))?;
                Ok((content, Some(input.to_string())))
            } else {
                Ok((input.to_string(), None))
            }
        }
    }
}

fn load_theme(path: &Path) -> Result<Theme> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read theme '{}'", path.display()))?;
    Theme::from_toml(&source).with_context(|| format!("Invalid theme '{}'", path.display()))
}

fn list() -> Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Languages:")?;
    for language in BuiltinProvider::languages() {
        writeln!(stdout, "  {language}")?;
    }
    writeln!(stdout, "Themes:")?;
    for theme in builtin::NAMES {
        writeln!(stdout, "  {theme}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["canopy", "-l", "js", "--html", "let x;"]).unwrap();
        assert_eq!(args.lang.as_deref(), Some("js"));
        assert!(args.html);
        assert_eq!(args.theme, "dark");
        assert_eq!(args.input.as_deref(), Some("let x;"));

        let args = Args::try_parse_from(["canopy", "-vv", "--strict"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(args.strict);
        assert!(args.input.is_none());
    }

    #[test]
    fn test_custom_elements_requires_html() {
        assert!(Args::try_parse_from(["canopy", "--custom-elements", "x"]).is_err());
    }

    #[test]
    fn test_literal_input_is_not_a_file() {
        let (content, filename) = read_input(Some("not/a/real/file.js")).unwrap();
        assert_eq!(content, "not/a/real/file.js");
        assert!(filename.is_none());
    }

    #[test]
    fn test_file_input_keeps_its_name() {
        let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
        let (content, filename) = read_input(Some(manifest)).unwrap();
        assert!(content.contains("canopy-cli"));
        assert_eq!(filename.as_deref(), Some(manifest));
    }
}
