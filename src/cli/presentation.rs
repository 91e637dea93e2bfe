//! CLI presentation: run reports and plan tiers as text or JSON.

use crate::error::ApiError;
use crate::orchestrator::RunReport;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;

pub fn format_run_report(report: &RunReport, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return serde_json::to_string_pretty(report)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render report: {}", e)));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Chapter", "Title", "State", "Score", "Critical", "Warnings", "Placeholders", "Path",
    ]);
    for chapter in &report.chapters {
        let state = if chapter.quality_passed {
            chapter.state.to_string()
        } else {
            format!("{} (below gate)", chapter.state)
        };
        table.add_row(vec![
            chapter.number.to_string(),
            chapter.title.clone(),
            state,
            format!("{:.1}", chapter.score),
            chapter.critical_issues.to_string(),
            chapter.warnings.to_string(),
            if chapter.placeholders.is_empty() {
                "-".to_string()
            } else {
                chapter.placeholders.join(", ")
            },
            chapter
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "\n{} of {} chapter(s) accepted",
        report.accepted(),
        report.chapters.len()
    ));
    let below = report.below_gate();
    if !below.is_empty() {
        out.push_str(&format!(", below quality gate: {:?}", below));
    }
    Ok(out)
}

pub fn format_tiers(topic: &str, tiers: &[Vec<u32>]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Tier", "Chapters"]);
    for (index, tier) in tiers.iter().enumerate() {
        let chapters: Vec<String> = tier.iter().map(u32::to_string).collect();
        table.add_row(vec![index.to_string(), chapters.join(", ")]);
    }
    format!("Plan '{}' is valid\n{}", topic, table)
}
