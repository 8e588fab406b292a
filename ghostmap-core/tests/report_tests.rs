// Tests for report generation

use ghostmap_core::report::{
    ReportFormat, format_record_line, generate_audit_report, ranked_live_records, save_report,
};
use ghostmap_core::{
    ClassificationRecord, GhostClassifier, HostAudit, HostSummary, RiskScorer, RiskWeights,
    WafVendor,
};
use ghostmap_scanner::{
    Baseline, BaselineReliability, DiscoverySource, EndpointCandidate, ProbeHistory, ProbeResult,
    ThrottleMode,
};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn record(path: &str, status: u16) -> ClassificationRecord {
    let mut result = ProbeResult::new(
        path.to_string(),
        format!("https://api.example.com{}", path),
        "GET".to_string(),
    );
    result.status_code = Some(status);

    let mut history = ProbeHistory::new(EndpointCandidate::new(path, DiscoverySource::Archive));
    history.results.push(result);

    let classifier = GhostClassifier::new(["/users/{id}"]);
    let scorer = RiskScorer::new(RiskWeights::default(), ["admin", "debug"]);
    ClassificationRecord::from_history(
        "api.example.com",
        history,
        &Baseline::from_samples(Vec::new()),
        BTreeSet::new(),
    )
    .classified(&classifier, &scorer)
}

fn sample_audit() -> HostAudit {
    let records = vec![
        record("/users/7", 200),
        record("/admin", 200),
        record("/missing", 404),
        record("/reports", 401),
    ];

    HostAudit {
        summary: HostSummary {
            host: "api.example.com".to_string(),
            base_url: "https://api.example.com/".to_string(),
            waf_protected: false,
            waf_vendor: None,
            baseline: BaselineReliability::Reliable,
            baseline_status: Some(404),
            tags: ["nginx".to_string()].into_iter().collect(),
            throttle_mode: ThrottleMode::Normal,
            fuzz_waves: 0,
            cancelled: false,
            candidates: 4,
            live: 3,
            documented: 1,
            ghosts: 2,
            ambiguous: 0,
            skipped: 0,
        },
        records,
    }
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_parsing() {
    assert_eq!("text".parse::<ReportFormat>(), Ok(ReportFormat::Text));
    assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
    assert!("html".parse::<ReportFormat>().is_err());
}

// ============================================================================
// Text Report Tests
// ============================================================================

#[test]
fn test_live_records_are_ranked_by_risk() {
    let audit = sample_audit();
    let ranked: Vec<&str> = ranked_live_records(&audit)
        .iter()
        .map(|r| r.candidate.path.as_str())
        .collect();
    assert_eq!(ranked, vec!["/admin", "/reports", "/users/7"]);
}

#[test]
fn test_text_report_contents() {
    let report = generate_audit_report(&[sample_audit()], ReportFormat::Text).unwrap();

    assert!(report.contains("GHOSTMAP AUDIT REPORT"));
    assert!(report.contains("HOST api.example.com"));
    assert!(report.contains("Tech:         nginx"));
    assert!(report.contains("/admin"));
    assert!(report.contains("-> /users/{id}"));
    assert!(report.contains("1 dead"));
    assert!(!report.contains("WAF-PROTECTED"));
    assert!(!report.contains("WAF:"));

    let admin = report.find("/admin").unwrap();
    let users = report.find("/users/7").unwrap();
    assert!(admin < users);
}

#[test]
fn test_protected_host_names_its_vendor() {
    let mut audit = sample_audit();
    audit.summary.waf_protected = true;
    audit.summary.waf_vendor = Some(WafVendor::Cloudflare);
    audit.summary.throttle_mode = ThrottleMode::Stalled;

    let report = generate_audit_report(&[audit.clone()], ReportFormat::Text).unwrap();
    assert!(report.contains("[WAF-PROTECTED: Cloudflare]"));
    assert!(report.contains("WAF:          Cloudflare"));

    audit.summary.waf_vendor = None;
    let report = generate_audit_report(&[audit], ReportFormat::Text).unwrap();
    assert!(report.contains("[WAF-PROTECTED]\n"));
}

#[test]
fn test_vendor_without_blocking_is_still_reported() {
    let mut audit = sample_audit();
    audit.summary.waf_vendor = Some(WafVendor::AwsCloudFront);

    let report = generate_audit_report(&[audit.clone()], ReportFormat::Text).unwrap();
    assert!(report.contains("WAF:          AWS CloudFront"));
    assert!(!report.contains("WAF-PROTECTED"));

    let json = generate_audit_report(&[audit], ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["report"]["hosts"][0]["summary"]["waf_vendor"], "AWS CloudFront");
}

#[test]
fn test_record_line() {
    let line = format_record_line(&record("/admin", 200));
    assert!(line.contains("RED"));
    assert!(line.contains("75"));
    assert!(line.contains("GHOST"));
    assert!(line.contains("(admin)"));
}

// ============================================================================
// JSON Report Tests
// ============================================================================

#[test]
fn test_json_report_structure() {
    let report = generate_audit_report(&[sample_audit()], ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&report).unwrap();

    let root = &value["report"];
    assert_eq!(root["metadata"]["generator"], "Ghostmap");
    assert_eq!(root["summary"]["hosts"], 1);
    assert_eq!(root["summary"]["ghosts"], 2);

    let host = &root["hosts"][0];
    assert_eq!(host["summary"]["baseline"], "reliable");
    assert_eq!(host["summary"]["throttle_mode"], "NORMAL");
    assert!(host["summary"]["waf_vendor"].is_null());
    assert_eq!(host["records"].as_array().unwrap().len(), 4);
    assert_eq!(host["records"][1]["documentation"], "GHOST");
    assert_eq!(host["records"][1]["risk_band"], "RED");
    assert_eq!(host["records"][2]["liveness"], "DEAD");
}

#[test]
fn test_save_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");
    save_report("{\"ok\":true}", &path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"ok\":true}");
}
