//! `ember inspect`: header dump and build check.
//!
//! Runs only the source-independent check, so an entry can be inspected
//! without the script it was produced from.

use ember_config::EmberConfig;
use ember_snapshot::bytecode;
use ember_snapshot::sanity::check_without_source;
use ember_snapshot::{RuntimeTags, SanityCheckResult, SerializedCodeHeader, HEADER_SIZE};
use serde::Serialize;

use crate::pipeline::{read_file, resolve_config};
use crate::{GlobalArgs, InspectArgs, ReportFormat};

/// What `ember inspect` reports about one entry.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    /// Entry size in bytes.
    pub size: usize,
    /// Header fields, if the entry is large enough to hold them.
    pub header: Option<SerializedCodeHeader>,
    /// Padding bytes after the payload.
    pub padding: Option<usize>,
    /// Name of the token the payload starts with.
    pub first_token: Option<&'static str>,
    /// Result of checking the entry against the configured build.
    pub verdict: SanityCheckResult,
    /// Numeric code of `verdict`.
    pub code: u32,
}

/// Builds the report for `bytes` checked against `tags`.
pub fn inspect_bytes(bytes: &[u8], tags: &RuntimeTags) -> InspectReport {
    let header = SerializedCodeHeader::read(bytes);
    let padding = header.and_then(|h| {
        bytes
            .len()
            .checked_sub(HEADER_SIZE)?
            .checked_sub(h.payload_length as usize)
    });
    let first_token = header
        .filter(|h| h.payload_length > 0)
        .and_then(|_| bytes.get(HEADER_SIZE))
        .map(|&byte| bytecode::name(byte));
    let verdict = check_without_source(bytes, tags);
    InspectReport {
        size: bytes.len(),
        header,
        padding,
        first_token,
        verdict,
        code: verdict.code(),
    }
}

/// Runs the `ember inspect` command.
///
/// Returns exit code 0 if the entry matches the configured build, 1 otherwise.
pub fn run(args: &InspectArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config: EmberConfig = resolve_config(global)?;
    let bytes = read_file(&args.file)?;
    let report = inspect_bytes(&bytes, &RuntimeTags::from_config(&config));

    match args.format {
        ReportFormat::Text => {
            if !global.quiet {
                print_text(&args.file, &report);
            }
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.verdict.is_success() { 0 } else { 1 })
}

fn print_text(file: &str, report: &InspectReport) {
    println!("{file}: {} bytes", report.size);
    if let Some(header) = report.header {
        println!("  magic           {:#010x}", header.magic);
        println!("  version tag     {:#010x}", header.version_tag);
        println!("  flags tag       {:#010x}", header.flags_tag);
        println!(
            "  source hash     {:#010x} ({} chars{})",
            header.source_hash,
            header.source_hash & 0x7fff_ffff,
            if header.source_hash >> 31 == 1 { ", module" } else { "" }
        );
        println!("  payload length  {}", header.payload_length);
        println!("  checksum        {:#010x}", header.checksum);
    }
    if let Some(padding) = report.padding {
        println!("  padding         {padding}");
    }
    if let Some(token) = report.first_token {
        println!("  first token     {token}");
    }
    println!("  verdict         {}", report.verdict);
}
