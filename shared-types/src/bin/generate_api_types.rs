use shared_types::*;
use std::fs;
use std::path::PathBuf;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for the report types consumed by review tools
    let mut types = Vec::new();

    // Provider types
    types.push(clean_type(ProviderKind::export_to_string()?));
    types.push(clean_type(FieldKind::export_to_string()?));
    types.push(clean_type(AmountUnit::export_to_string()?));

    // Report types
    types.push(clean_type(CheckStatus::export_to_string()?));
    types.push(clean_type(ReconciliationCheck::export_to_string()?));
    types.push(clean_type(IssueSeverity::export_to_string()?));
    types.push(clean_type(ReportIssue::export_to_string()?));
    types.push(clean_type(ValidationReport::export_to_string()?));
    types.push(clean_type(BatchEntry::export_to_string()?));
    types.push(clean_type(BatchSummary::export_to_string()?));

    // Bill types
    types.push(clean_type(ServicePeriod::export_to_string()?));
    types.push(clean_type(LineItem::export_to_string()?));
    types.push(clean_type(MeterReading::export_to_string()?));
    types.push(clean_type(NormalizedBill::export_to_string()?));

    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("api-types/types.ts"));
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // Types are concatenated into one file, so cross-type imports are dropped
    let filtered: Vec<&str> = type_def
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("import type")
                && !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
