// Tests for risk scoring

use ghostmap_core::config::DEFAULT_SENSITIVE_KEYWORDS;
use ghostmap_core::{Documentation, RiskBand, RiskScorer, RiskWeights};
use std::collections::BTreeSet;

fn scorer() -> RiskScorer {
    RiskScorer::new(
        RiskWeights {
            undocumented: 30,
            active: 25,
            sensitive: 20,
            ambiguous: 15,
        },
        DEFAULT_SENSITIVE_KEYWORDS,
    )
}

fn no_tags() -> BTreeSet<String> {
    BTreeSet::new()
}

// ============================================================================
// Scoring Tests
// ============================================================================

#[test]
fn test_active_sensitive_ghost_is_red() {
    let risk = scorer().score(Documentation::Ghost, Some(200), "/admin", &no_tags());
    assert_eq!(risk.score, 75);
    assert_eq!(risk.band, RiskBand::Red);
    assert_eq!(risk.keywords, vec!["admin"]);

    let names: Vec<&str> = risk.factors.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["undocumented", "active", "sensitive"]);
}

#[test]
fn test_documented_active_endpoint_is_green() {
    let risk = scorer().score(Documentation::Documented, Some(200), "/users/7", &no_tags());
    assert_eq!(risk.score, 25);
    assert_eq!(risk.band, RiskBand::Green);
}

#[test]
fn test_ghost_behind_auth_is_yellow() {
    let risk = scorer().score(Documentation::Ghost, Some(401), "/reports", &no_tags());
    assert_eq!(risk.score, 30);
    assert_eq!(risk.band, RiskBand::Yellow);
}

#[test]
fn test_ambiguous_uses_its_own_weight() {
    let risk = scorer().score(Documentation::Ambiguous, Some(200), "/Orders", &no_tags());
    assert_eq!(risk.score, 40);
    assert_eq!(risk.band, RiskBand::Yellow);
    assert_eq!(risk.factors[0].name, "ambiguous");
}

#[test]
fn test_not_live_scores_zero() {
    let risk = scorer().score(Documentation::NotLive, Some(200), "/admin", &no_tags());
    assert_eq!(risk.score, 0);
    assert_eq!(risk.band, RiskBand::Green);
    assert!(risk.factors.is_empty());
    assert!(risk.keywords.is_empty());
}

#[test]
fn test_tag_counts_as_sensitive() {
    let tags: BTreeSet<String> = ["swagger".to_string()].into_iter().collect();
    let risk = scorer().score(Documentation::Documented, Some(200), "/v1/spec", &tags);
    assert_eq!(risk.score, 45);
    assert_eq!(risk.keywords, vec!["swagger"]);
}

#[test]
fn test_score_is_clamped() {
    let scorer = RiskScorer::new(
        RiskWeights {
            undocumented: 100,
            active: 100,
            sensitive: 100,
            ambiguous: 100,
        },
        ["debug"],
    );
    let risk = scorer.score(Documentation::Ghost, Some(200), "/debug", &no_tags());
    assert_eq!(risk.score, 100);
    assert_eq!(risk.band, RiskBand::Red);
}

#[test]
fn test_keywords_need_a_boundary() {
    let scorer = scorer();
    assert!(
        scorer
            .sensitive_keywords("/developers/portal", &no_tags())
            .is_empty()
    );
    assert_eq!(
        scorer.sensitive_keywords("/api/v1/dev/status", &no_tags()),
        vec!["dev"]
    );
}

#[test]
fn test_scoring_is_deterministic() {
    let scorer = scorer();
    let a = scorer.score(Documentation::Ghost, Some(204), "/internal/backup.sql", &no_tags());
    let b = scorer.score(Documentation::Ghost, Some(204), "/internal/backup.sql", &no_tags());
    assert_eq!(a, b);
    assert_eq!(a.keywords, vec!["backup", "internal"]);
}
