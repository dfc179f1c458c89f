use std::io::Write;

use anyhow::Result;
use gleaner_common::progress::TracingProgress;
use gleaner_common::{GleanerConfig, ProgressEvent, ProgressSink};
use gleaner_web::{CleanedText, Gleaner};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const PROMPT: &str = "Describe what you want to parse (blank line to quit): ";

fn print_progress(event: ProgressEvent) {
    eprintln!("{event}");
}

/// Status lines on stderr, or into the log file only when `quiet`.
fn progress_sink(quiet: bool) -> &'static dyn ProgressSink {
    if quiet { &TracingProgress } else { &print_progress }
}

pub async fn scrape(cfg: &GleanerConfig, url: &str, quiet: bool) -> Result<()> {
    let gleaner = Gleaner::from_config(cfg)?;
    let text = gleaner.scrape(url, progress_sink(quiet)).await?;
    println!("{text}");
    Ok(())
}

pub async fn parse(
    cfg: &GleanerConfig,
    url: &str,
    descriptions: Vec<String>,
    quiet: bool,
) -> Result<()> {
    let progress = progress_sink(quiet);
    let gleaner = Gleaner::from_config(cfg)?;
    let text = gleaner.scrape(url, progress).await?;
    tracing::info!(url, chars = text.char_count(), "page ready for extraction");

    let mut out = std::io::stdout();
    let mut errs = std::io::stderr();
    if descriptions.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin());
        run_interactive(&gleaner, &text, &mut lines, progress, &mut out, &mut errs).await
    } else {
        run_batch(&gleaner, &text, &descriptions, progress, &mut out, &mut errs).await
    }
}

/// Extract every description in turn. A failed extraction is reported on
/// `errs` and the next description still runs.
async fn run_batch(
    gleaner: &Gleaner,
    text: &CleanedText,
    descriptions: &[String],
    progress: &dyn ProgressSink,
    out: &mut impl Write,
    errs: &mut impl Write,
) -> Result<()> {
    for description in descriptions {
        extract_one(gleaner, text, description, progress, out, errs).await?;
    }
    Ok(())
}

/// Prompt on `errs` and extract each line read until EOF or a blank line.
async fn run_interactive<R>(
    gleaner: &Gleaner,
    text: &CleanedText,
    reader: &mut R,
    progress: &dyn ProgressSink,
    out: &mut impl Write,
    errs: &mut impl Write,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        errs.write_all(PROMPT.as_bytes())?;
        errs.flush()?;
        let Some(description) = next_description(reader).await? else {
            break;
        };
        extract_one(gleaner, text, &description, progress, out, errs).await?;
    }
    Ok(())
}

/// Only I/O failures on the output streams propagate.
async fn extract_one(
    gleaner: &Gleaner,
    text: &CleanedText,
    description: &str,
    progress: &dyn ProgressSink,
    out: &mut impl Write,
    errs: &mut impl Write,
) -> Result<()> {
    match gleaner.parse(text, description, progress).await {
        Ok(result) => writeln!(out, "{result}")?,
        Err(e) => {
            tracing::warn!(description, error = %e, "extraction failed");
            writeln!(errs, "error: {e}")?;
        }
    }
    Ok(())
}

/// Next non-blank line, trimmed. `None` on EOF or a blank line.
async fn next_description<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}
