use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use perlego_core::{
    Document, DomSerializationParams, FetchConfig, HttpFetcher, NodeId, ReadabilityConfig, ReadabilityTranscoder,
    ReadabilityWebTranscoder, ReadingMargin, ReadingSize, ReadingStyle, StitchConfig, TranscodeRequest,
    TranscodeResult, WebTranscodeRequest, constants::INNER_DIV_ID, fetch_file, fetch_stdin, fetch_url,
};
use tracing::debug;
use url::Url;

mod echo;
mod logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for the transcoded article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Html,
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" | "htm" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: html, text, json", s)),
        }
    }
}

/// Extract the readable article from a web page
#[derive(Parser, Debug)]
#[command(name = "perlego")]
#[command(author = "Perlego Contributors")]
#[command(version)]
#[command(about = "Turn web pages into clean, readable articles", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (html, text, json)
    #[arg(short, long, default_value = "html", value_name = "FORMAT")]
    format: OutputFormat,

    /// Base URL for resolving links when reading a file or stdin
    #[arg(long, value_name = "BASE")]
    url: Option<String>,

    /// Follow next-page links and merge the pages (URL input only)
    #[arg(long)]
    paginate: bool,

    /// Maximum number of pages merged with --paginate
    #[arg(long, default_value = "30", value_name = "N")]
    max_pages: usize,

    /// Indent the HTML output
    #[arg(long)]
    pretty: bool,

    /// Do not embed the reading stylesheet
    #[arg(long)]
    no_stylesheet: bool,

    /// Reading style (newspaper, novel, ebook, terminal, apertura, athelas)
    #[arg(long, default_value = "newspaper", value_name = "STYLE")]
    style: ReadingStyle,

    /// Reading margin (extra-narrow, narrow, medium, wide, extra-wide)
    #[arg(long, default_value = "wide", value_name = "MARGIN")]
    margin: ReadingMargin,

    /// Font size (extra-small, small, medium, large, extra-large)
    #[arg(long, default_value = "medium", value_name = "SIZE")]
    size: ReadingSize,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn is_url_input(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    fn fetch_config(&self) -> FetchConfig {
        let mut config = FetchConfig { timeout: self.timeout, ..Default::default() };
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        config
    }

    fn transcoder(&self) -> ReadabilityTranscoder {
        let config = ReadabilityConfig::builder()
            .include_stylesheet(!self.no_stylesheet)
            .reading_style(self.style)
            .reading_margin(self.margin)
            .reading_size(self.size)
            .build();
        ReadabilityTranscoder::with_config(config)
    }

    fn serialization_params(&self) -> DomSerializationParams {
        DomSerializationParams { pretty_print: self.pretty, ..Default::default() }
    }
}

/// Reads the input markup, returning it with the base URL to resolve links against
async fn read_input(args: &Args) -> anyhow::Result<(String, Option<String>)> {
    if args.input == "-" {
        if args.verbose {
            echo::print_step(1, 3, "Reading from stdin");
        }
        let html = fetch_stdin().context("Failed to read from stdin")?;
        Ok((html, args.url.clone()))
    } else if args.is_url_input() {
        if args.verbose {
            echo::print_step(1, 3, &format!("Fetching from {}", args.input.bright_white().underline()));
        }
        let html = fetch_url(&args.input, &args.fetch_config()).await.context("Failed to fetch URL")?;
        Ok((html, Some(args.url.clone().unwrap_or_else(|| args.input.clone()))))
    } else {
        if args.verbose {
            echo::print_step(1, 3, &format!("Reading from file {}", args.input.bright_white()));
        }
        let html = fetch_file(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?;
        Ok((html, args.url.clone()))
    }
}

const TEXT_BLOCKS: &[&str] =
    &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "pre", "blockquote", "td", "th", "dt", "dd", "figcaption"];

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the reading view, one line per innermost text block
fn reading_text(content: &str) -> anyhow::Result<String> {
    let doc = Document::parse(content).context("Failed to parse transcoded HTML")?;
    let Some(inner) = doc.element_by_id(INNER_DIV_ID) else { return Ok(String::new()) };

    let is_block = |node: NodeId| doc.tag_name(node).is_some_and(|tag| TEXT_BLOCKS.contains(&tag));
    let lines: Vec<String> = doc
        .descendant_elements(inner)
        .into_iter()
        .filter(|&node| is_block(node) && !doc.descendant_elements(node).into_iter().any(|d| is_block(d)))
        .map(|node| collapse_whitespace(&doc.inner_text(node)))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return Ok(collapse_whitespace(&doc.inner_text(inner)));
    }
    Ok(lines.join("\n"))
}

fn render(result: &TranscodeResult, format: OutputFormat) -> anyhow::Result<String> {
    let content = result.content.as_deref().unwrap_or_default();
    Ok(match format {
        OutputFormat::Html => content.to_string(),
        OutputFormat::Text => reading_text(content)?,
        OutputFormat::Json => serde_json::to_string_pretty(result).context("Failed to serialize result")?,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    if args.paginate && !args.is_url_input() {
        bail!("--paginate needs an http:// or https:// URL as input");
    }
    if let Some(base) = &args.url {
        Url::parse(base).with_context(|| format!("Invalid --url: {base}"))?;
    }
    debug!(input = %args.input, format = ?args.format, paginate = args.paginate, "starting");

    let started = Instant::now();
    let mut timings: Vec<(&str, Duration)> = Vec::new();

    let result = if args.paginate {
        if args.verbose {
            echo::print_step(1, 3, &format!("Fetching pages from {}", args.input.bright_white().underline()));
        }
        let web = ReadabilityWebTranscoder::new(HttpFetcher::new(args.fetch_config()))
            .with_transcoder(args.transcoder())
            .with_config(StitchConfig::default().with_max_pages(args.max_pages));
        let request = WebTranscodeRequest::new(args.input.clone()).with_params(args.serialization_params());
        let result = web.transcode(&request).await.context("Failed to transcode pages")?;
        timings.push(("Fetch + transcode", started.elapsed()));
        result
    } else {
        let (html, base_url) = read_input(&args).await?;
        timings.push(("Read", started.elapsed()));
        if args.verbose {
            eprintln!("  {} {}\n", "Size:".dimmed(), echo::format_size(html.len()).bright_white());
            echo::print_step(2, 3, "Extracting article");
        }

        let mut request = TranscodeRequest::new(html).with_params(args.serialization_params());
        if let Some(url) = base_url {
            request = request.with_url(url);
        }
        let transcode_started = Instant::now();
        let result = args.transcoder().transcode(&request).context("Failed to transcode HTML")?;
        timings.push(("Transcode", transcode_started.elapsed()));
        result
    };

    if args.verbose {
        echo::print_result_details(&result);
    }
    if !result.content_extracted {
        echo::print_warning("No readable article content was found");
    }

    let output = render(&result, args.format)?;

    if args.verbose {
        echo::print_step(3, 3, "Writing output");
        eprintln!("  {} {}\n", "Format:".dimmed(), format!("{:?}", args.format).bright_white());
        echo::print_timing_summary(started.elapsed(), &timings);
    }

    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            println!("{}", output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("HTML".parse::<OutputFormat>(), Ok(OutputFormat::Html));
        assert_eq!("txt".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_args_map_onto_configs() {
        let args = Args::parse_from([
            "perlego",
            "page.html",
            "--style",
            "terminal",
            "--margin",
            "extra-narrow",
            "--no-stylesheet",
            "--timeout",
            "5",
            "--user-agent",
            "test-agent",
        ]);
        let config = args.transcoder().config().clone();
        assert_eq!(config.reading_style, ReadingStyle::Terminal);
        assert_eq!(config.reading_margin, ReadingMargin::ExtraNarrow);
        assert!(!config.include_stylesheet);

        let fetch = args.fetch_config();
        assert_eq!(fetch.timeout, 5);
        assert_eq!(fetch.user_agent, "test-agent");
        assert!(!args.is_url_input());
    }

    #[test]
    fn test_reading_text_keeps_only_reading_view() {
        let html = r#"<html><body><div id="readOverlay"><div id="readInner"><h1>Title</h1>
            <div><p>  First   paragraph </p><p>Second</p></div></div></div><p>outside</p></body></html>"#;
        assert_eq!(reading_text(html).unwrap(), "Title\nFirst paragraph\nSecond");
    }

    #[test]
    fn test_reading_text_without_reading_view() {
        assert_eq!(reading_text("<p>plain</p>").unwrap(), "");
    }
}
