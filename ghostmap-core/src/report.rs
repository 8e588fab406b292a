// Report rendering for audit results

use crate::audit::{ClassificationRecord, HostAudit};
use crate::classify::Liveness;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}' (expected text or json)", other)),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => f.write_str("text"),
            ReportFormat::Json => f.write_str("json"),
        }
    }
}

pub fn generate_audit_report(
    audits: &[HostAudit],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(audits)),
        ReportFormat::Json => generate_json_report(audits),
    }
}

/// Live records, highest risk first, then by path.
pub fn ranked_live_records(audit: &HostAudit) -> Vec<&ClassificationRecord> {
    let mut live: Vec<&ClassificationRecord> = audit
        .records
        .iter()
        .filter(|r| r.liveness.is_live())
        .collect();
    live.sort_by(|a, b| {
        b.risk_score
            .cmp(&a.risk_score)
            .then_with(|| a.candidate.path.cmp(&b.candidate.path))
    });
    live
}

pub fn generate_text_report(audits: &[HostAudit]) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("                          GHOSTMAP AUDIT REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\n\n");
    report.push_str(&format!(
        "Generated:    {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Hosts:        {}\n", audits.len()));
    report.push_str(&format!(
        "Ghosts:       {}\n\n",
        audits.iter().map(|a| a.summary.ghosts).sum::<usize>()
    ));

    for audit in audits {
        let summary = &audit.summary;

        report.push_str(HEAVY_RULE);
        report.push('\n');
        report.push_str(&format!("HOST {}\n", summary.host));
        report.push_str(HEAVY_RULE);
        report.push_str("\n\n");

        report.push_str(&format!("Base URL:     {}\n", summary.base_url));
        report.push_str(&format!(
            "Baseline:     {}{}\n",
            summary.baseline,
            summary
                .baseline_status
                .map(|s| format!(" (status {})", s))
                .unwrap_or_default()
        ));
        let protection = match (summary.waf_protected, summary.waf_vendor) {
            (true, Some(vendor)) => format!("  [WAF-PROTECTED: {}]", vendor),
            (true, None) => "  [WAF-PROTECTED]".to_string(),
            (false, _) => String::new(),
        };
        report.push_str(&format!(
            "Throttle:     {}{}\n",
            summary.throttle_mode, protection
        ));
        if let Some(vendor) = summary.waf_vendor {
            report.push_str(&format!("WAF:          {}\n", vendor));
        }
        if !summary.tags.is_empty() {
            let tags: Vec<&str> = summary.tags.iter().map(String::as_str).collect();
            report.push_str(&format!("Tech:         {}\n", tags.join(", ")));
        }
        if summary.fuzz_waves > 0 {
            report.push_str(&format!("Fuzz waves:   {}\n", summary.fuzz_waves));
        }
        if summary.cancelled {
            report.push_str("Status:       cancelled, results are partial\n");
        }
        report.push_str(&format!(
            "Endpoints:    {} probed, {} live, {} documented, {} ghost, {} ambiguous, {} skipped\n\n",
            summary.candidates,
            summary.live,
            summary.documented,
            summary.ghosts,
            summary.ambiguous,
            summary.skipped
        ));

        let live = ranked_live_records(audit);
        if live.is_empty() {
            report.push_str("  (no live endpoints)\n\n");
        } else {
            report.push_str("LIVE ENDPOINTS\n");
            report.push_str(LIGHT_RULE);
            report.push('\n');
            for record in live {
                report.push_str(&format_record_line(record));
                report.push('\n');
            }
            report.push('\n');
        }

        let not_live = |liveness: Liveness| {
            audit
                .records
                .iter()
                .filter(|r| r.liveness == liveness)
                .count()
        };
        report.push_str(&format!(
            "Not live:     {} soft-404, {} dead, {} error, {} skipped\n\n",
            not_live(Liveness::Soft404),
            not_live(Liveness::Dead),
            not_live(Liveness::Error),
            not_live(Liveness::Skipped)
        ));
    }

    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("                              End of Report\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str("\nGenerated by Ghostmap - find the API endpoints your documentation forgot\n");
    report.push_str("For authorized security testing only.\n\n");

    report
}

/// `[RED     75] GHOST       200  /debug/info  (debug)`
pub fn format_record_line(record: &ClassificationRecord) -> String {
    let status = record
        .status_code()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "---".to_string());

    let mut line = format!(
        "  [{:<6} {:>3}] {:<10} {}  {}",
        record.risk_band.as_str(),
        record.risk_score,
        record.documentation.as_str(),
        status,
        record.candidate.path
    );

    if let Some(template) = &record.matched_template {
        line.push_str(&format!("  -> {}", template));
    }
    if !record.sensitive_keywords.is_empty() {
        line.push_str(&format!("  ({})", record.sensitive_keywords.join(", ")));
    }
    line
}

pub fn generate_json_report(audits: &[HostAudit]) -> Result<String, serde_json::Error> {
    let hosts: Vec<serde_json::Value> = audits
        .iter()
        .map(|audit| {
            serde_json::json!({
                "summary": audit.summary,
                "records": audit.records,
            })
        })
        .collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Ghostmap",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "disclaimer": "For authorized security testing only"
            },
            "summary": {
                "hosts": audits.len(),
                "endpoints": audits.iter().map(|a| a.summary.candidates).sum::<usize>(),
                "live": audits.iter().map(|a| a.summary.live).sum::<usize>(),
                "ghosts": audits.iter().map(|a| a.summary.ghosts).sum::<usize>(),
                "ambiguous": audits.iter().map(|a| a.summary.ambiguous).sum::<usize>(),
                "waf_protected": audits
                    .iter()
                    .filter(|a| a.summary.waf_protected)
                    .map(|a| a.summary.host.clone())
                    .collect::<Vec<_>>(),
            },
            "hosts": hosts,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
