use anyhow::{Context, Result};
use extractors::postprocess::issue_summary;
use extractors::{BillPostProcessor, ProviderRegistry};
use serde_json::{json, Value};
use shared_types::{BatchEntry, BatchSummary, CheckStatus, NormalizedBill, ValidationReport};
use std::fs;
use std::path::{Path, PathBuf};

pub struct ValidateOptions<'a> {
    pub provider: Option<&'a str>,
    pub output: Option<&'a Path>,
    pub json: bool,
}

/// Validates every record in `files`. Returns whether all of them passed.
///
/// A file that cannot be read or parsed is reported and the run moves on.
/// With `json` set, one array holding an entry per file is printed at the end.
pub fn validate(
    processor: &BillPostProcessor,
    files: &[PathBuf],
    options: &ValidateOptions<'_>,
) -> Result<bool> {
    let mut all_passed = true;
    let mut documents = Vec::with_capacity(files.len());

    for file in files {
        let (summary, records, single) = match validate_file(processor, file, options.provider) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("{:#}", e);
                all_passed = false;
                if options.json {
                    documents.push(json!({"file": file, "error": format!("{:#}", e)}));
                } else {
                    println!("ERROR {}: {:#}", file.display(), e);
                }
                continue;
            }
        };
        all_passed &= summary.all_passed();

        if let Some(dir) = options.output {
            let written = write_normalized(dir, file, &records, single)?;
            tracing::info!("Wrote normalized records to {:?}", written);
        }

        if options.json {
            documents.push(json!({"file": file, "summary": summary}));
        } else {
            for (index, (entry, record)) in summary.entries.iter().zip(&records).enumerate() {
                let label = if single {
                    file.display().to_string()
                } else {
                    format!("{}[{}]", file.display(), index)
                };
                println!("{}", render_entry(&label, entry, record));
            }
        }
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
    }

    Ok(all_passed)
}

/// Reads a file holding one record or an array of records and processes it
pub fn validate_file(
    processor: &BillPostProcessor,
    file: &Path,
    provider: Option<&str>,
) -> Result<(BatchSummary, Vec<Value>, bool)> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read extraction file at {:?}", file))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {:?}", file))?;

    let (mut records, single) = match parsed {
        Value::Array(items) => (items, false),
        other => (vec![other], true),
    };

    tracing::debug!("Processing {} record(s) from {:?}", records.len(), file);
    let summary = processor.process_batch(provider, &mut records);
    Ok((summary, records, single))
}

fn write_normalized(dir: &Path, source: &Path, records: &[Value], single: bool) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "bill".to_string());
    let target = dir.join(format!("{}.normalized.json", stem));

    let body = if single {
        serde_json::to_string_pretty(&records[0])?
    } else {
        serde_json::to_string_pretty(records)?
    };
    fs::write(&target, body).with_context(|| format!("Failed to write {:?}", target))?;
    Ok(target)
}

pub fn render_entry(label: &str, entry: &BatchEntry, record: &Value) -> String {
    match entry {
        BatchEntry::Report(report) => render_report(label, report, record),
        BatchEntry::Error(message) => format!("ERROR {}: {}", label, message),
    }
}

fn render_report(label: &str, report: &ValidationReport, record: &Value) -> String {
    let bill = NormalizedBill::from_record(record);
    let mut lines = vec![format!(
        "{} {} [{}] account={} due={}",
        if report.passed { "PASS" } else { "FAIL" },
        label,
        report.provider,
        bill.account_number.as_deref().unwrap_or("-"),
        bill.total_amount_due
            .map(|t| format!("{:.2}", t))
            .unwrap_or_else(|| "-".to_string()),
    )];

    for check in &report.checks {
        match check.status {
            CheckStatus::Failed => lines.push(format!(
                "  mismatch {}: computed {} vs {} {} (difference {})",
                check.rule,
                fmt_amount(check.computed),
                check.expected_field,
                fmt_amount(check.extracted),
                fmt_amount(check.difference),
            )),
            CheckStatus::Skipped => lines.push(format!(
                "  skipped {}: {}",
                check.rule,
                check.note.as_deref().unwrap_or("no value")
            )),
            CheckStatus::Passed => {}
        }
    }

    if !report.issues.is_empty() {
        lines.push(format!("  issues: {}", issue_summary(&report.issues)));
    }

    lines.join("\n")
}

fn fmt_amount(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

pub fn list_providers(registry: &ProviderRegistry) {
    for line in provider_lines(registry) {
        println!("{}", line);
    }
}

/// One `id kind name` row per provider
pub fn provider_lines(registry: &ProviderRegistry) -> Vec<String> {
    if registry.is_empty() {
        return vec!["No providers registered".to_string()];
    }

    registry
        .iter()
        .map(|provider| {
            format!(
                "{:<32} {:<22} {}",
                provider.id,
                serde_json::to_value(provider.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default(),
                provider.name
            )
        })
        .collect()
}

pub fn show_provider(registry: &ProviderRegistry, id: &str) -> Result<()> {
    println!("{}", provider_json(registry, id)?);
    Ok(())
}

/// Provider schema as pretty JSON, looked up by id, name or alias
pub fn provider_json(registry: &ProviderRegistry, id: &str) -> Result<String> {
    let provider = registry
        .find(id)
        .ok_or_else(|| anyhow::anyhow!("Unknown provider: {}", id))?;
    Ok(serde_json::to_string_pretty(provider)?)
}
