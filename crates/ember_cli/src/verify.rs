//! `ember verify`: full check and restore of an entry against its source.
//!
//! The entry is decoded into a freshly bootstrapped runtime, either on the
//! calling thread or through the background path, exactly as an embedder
//! would consume it.

use std::sync::{Arc, Mutex};

use ember_config::EmberConfig;
use ember_heap::fields;
use ember_snapshot::{
    bootstrap_runtime, CachedData, CodeCache, CompletionHook, DeserializeEvent, OriginOptions,
    SanityCheckResult,
};
use serde::Serialize;

use crate::pipeline::{read_file, resolve_config};
use crate::{GlobalArgs, ReportFormat, VerifyArgs};

/// Keeps the last decode event.
#[derive(Default)]
struct CaptureHook {
    event: Mutex<Option<DeserializeEvent>>,
}

impl CompletionHook for CaptureHook {
    fn on_deserialized(&self, event: &DeserializeEvent) {
        if let Ok(mut slot) = self.event.lock() {
            *slot = Some(event.clone());
        }
    }
}

/// A restored function and where it starts in the source.
#[derive(Debug, Serialize)]
pub struct FunctionReport {
    /// Function name, if it has one.
    pub name: Option<String>,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// What `ember verify` reports about one entry.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    /// Whether the entry was restored.
    pub accepted: bool,
    /// Check result, when the entry was rejected by a check.
    pub verdict: Option<SanityCheckResult>,
    /// Failure message, when the entry was not restored.
    pub error: Option<String>,
    /// Id assigned to the restored script.
    pub script_id: Option<u32>,
    /// Records in the runtime heap after restoring.
    pub records: usize,
    /// Restored functions, innermost first.
    pub functions: Vec<FunctionReport>,
}

/// Decodes `bytes` against `source` in a runtime built from `config`.
pub fn verify_entry(
    config: &EmberConfig,
    bytes: Vec<u8>,
    source: &str,
    origin: OriginOptions,
    background: bool,
) -> Result<VerifyReport, Box<dyn std::error::Error>> {
    let mut runtime = bootstrap_runtime(config)?;
    let mut cache = CodeCache::from_config(config);
    let hook = Arc::new(CaptureHook::default());
    cache.add_hook(hook.clone());

    let cached = Arc::new(CachedData::from_vec(bytes));
    let outcome = if background {
        let pending = cache.start_background_deserialize(&runtime, Arc::clone(&cached))?;
        cache.finish_background_deserialize(&mut runtime, pending, &cached, source, origin)
    } else {
        cache.deserialize(&mut runtime, &cached, source, origin)
    };

    let report = match outcome {
        Ok(_) => {
            let event = hook.event.lock().ok().and_then(|mut slot| slot.take());
            let view = runtime.view();
            let functions = event
                .as_ref()
                .map(|event| {
                    event
                        .functions
                        .iter()
                        .map(|position| FunctionReport {
                            name: view
                                .record(position.function)
                                .and_then(|record| record.edge(fields::NAME))
                                .and_then(|name| view.string(name))
                                .map(str::to_string),
                            line: position.line,
                            column: position.column,
                        })
                        .collect()
                })
                .unwrap_or_default();
            VerifyReport {
                accepted: true,
                verdict: None,
                error: None,
                script_id: event.map(|event| event.script_id.as_raw()),
                records: runtime.heap.len(),
                functions,
            }
        }
        Err(err) => VerifyReport {
            accepted: false,
            verdict: err.sanity_check_result(),
            error: Some(err.to_string()),
            script_id: None,
            records: runtime.heap.len(),
            functions: Vec::new(),
        },
    };
    Ok(report)
}

/// Runs the `ember verify` command.
///
/// Returns exit code 0 if the entry was restored, 1 otherwise.
pub fn run(args: &VerifyArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = resolve_config(global)?;
    let bytes = read_file(&args.file)?;
    let source = String::from_utf8(read_file(&args.source)?)
        .map_err(|e| format!("{} is not valid UTF-8: {e}", args.source))?;
    let origin = if args.module {
        OriginOptions::module()
    } else {
        OriginOptions::script()
    };

    let report = verify_entry(&config, bytes, &source, origin, args.background)?;

    match args.format {
        ReportFormat::Text => {
            if report.accepted {
                if !global.quiet {
                    println!(
                        "{}: restored script {} ({} records)",
                        args.file,
                        report.script_id.unwrap_or_default(),
                        report.records
                    );
                    for function in &report.functions {
                        println!(
                            "  {:<24} {}:{}",
                            function.name.as_deref().unwrap_or("<anonymous>"),
                            function.line,
                            function.column
                        );
                    }
                }
            } else {
                eprintln!(
                    "{}: rejected: {}",
                    args.file,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(if report.accepted { 0 } else { 1 })
}
