// Tests for liveness assessment and ghost classification

use ghostmap_core::{Documentation, GhostClassifier, Liveness};
use ghostmap_scanner::{
    Baseline, DiscoverySource, EndpointCandidate, ProbeErrorKind, ProbeFailure, ProbeHistory,
    ProbeResult, ResponseSignature, SkipReason,
};

fn result(path: &str, status: u16, body: &str) -> ProbeResult {
    let mut result = ProbeResult::new(
        path.to_string(),
        format!("http://target.test{}", path),
        "GET".to_string(),
    );
    result.status_code = Some(status);
    result.signature = Some(ResponseSignature::from_response(
        status,
        Some(body.as_bytes()),
        None,
        None,
        path,
    ));
    result
}

fn history(path: &str, results: Vec<ProbeResult>) -> ProbeHistory {
    let mut history = ProbeHistory::new(EndpointCandidate::new(path, DiscoverySource::Archive));
    history.results = results;
    history
}

fn catch_all_baseline() -> Baseline {
    Baseline::from_samples(vec![
        result("/a1b2c3d4e5", 200, "<h1>Welcome to the shop</h1>"),
        result("/f6e5d4c3b2", 200, "<h1>Welcome to the shop</h1>"),
    ])
}

// ============================================================================
// Classification Tests
// ============================================================================

#[test]
fn test_numeric_segment_matches_documented_template() {
    let classifier = GhostClassifier::new(["/users/{id}", "/orders"]);
    let matched = classifier.classify("/users/123", Liveness::Live);
    assert_eq!(matched.documentation, Documentation::Documented);
    assert_eq!(matched.template.as_deref(), Some("/users/{id}"));
}

#[test]
fn test_unmatched_live_path_is_ghost() {
    let classifier = GhostClassifier::new(["/users/{id}", "/orders"]);
    let matched = classifier.classify("/debug/info", Liveness::Live);
    assert_eq!(matched.documentation, Documentation::Ghost);
    assert_eq!(matched.template, None);
}

#[test]
fn test_uuid_segment_is_a_parameter() {
    let classifier = GhostClassifier::new(["/files/{fileId}/download"]);
    let matched = classifier.classify(
        "/files/550e8400-e29b-41d4-a716-446655440000/download",
        Liveness::Live,
    );
    assert_eq!(matched.documentation, Documentation::Documented);
}

#[test]
fn test_trailing_slash_difference_is_ambiguous() {
    let classifier = GhostClassifier::new(["/orders"]);
    let matched = classifier.classify("/orders/", Liveness::Live);
    assert_eq!(matched.documentation, Documentation::Ambiguous);
    assert_eq!(matched.template.as_deref(), Some("/orders"));
}

#[test]
fn test_case_difference_is_ambiguous() {
    let classifier = GhostClassifier::new(["/api/Orders"]);
    assert_eq!(
        classifier.classify("/api/orders", Liveness::Live).documentation,
        Documentation::Ambiguous
    );
}

#[test]
fn test_named_segment_in_parameter_slot_is_ambiguous() {
    let classifier = GhostClassifier::new(["/users/{id}"]);
    assert_eq!(
        classifier.classify("/users/alice", Liveness::Live).documentation,
        Documentation::Ambiguous
    );
}

#[test]
fn test_most_specific_template_wins() {
    let classifier = GhostClassifier::new(["/users/{id}", "/users/me", "/{resource}/me"]);
    let matched = classifier.classify("/users/me", Liveness::Live);
    assert_eq!(matched.documentation, Documentation::Documented);
    assert_eq!(matched.template.as_deref(), Some("/users/me"));
}

#[test]
fn test_template_order_does_not_matter() {
    let forward = GhostClassifier::new(["/{a}/{b}", "/x/{b}", "/{a}/y"]);
    let backward = GhostClassifier::new(["/{a}/y", "/x/{b}", "/{a}/{b}"]);

    for path in ["/x/y", "/X/Y", "/q/y", "/x/1", "/7/8"] {
        assert_eq!(
            forward.classify(path, Liveness::Live),
            backward.classify(path, Liveness::Live),
            "{}",
            path
        );
    }
}

#[test]
fn test_template_query_is_ignored() {
    let classifier = GhostClassifier::new(["search?q={q}"]);
    assert_eq!(classifier.template_count(), 1);
    assert_eq!(
        classifier.classify("/search", Liveness::Live).documentation,
        Documentation::Documented
    );
}

#[test]
fn test_not_live_is_never_compared() {
    let classifier = GhostClassifier::new(["/users/{id}"]);
    for liveness in [
        Liveness::Soft404,
        Liveness::Dead,
        Liveness::Error,
        Liveness::Skipped,
    ] {
        let matched = classifier.classify("/users/1", liveness);
        assert_eq!(matched.documentation, Documentation::NotLive);
        assert_eq!(matched.template, None);
    }
}

// ============================================================================
// Liveness Tests
// ============================================================================

#[test]
fn test_soft_404_overrides_200() {
    let baseline = catch_all_baseline();
    let history = history(
        "/old/thing",
        vec![result("/old/thing", 200, "<h1>Welcome to the shop</h1>")],
    );
    assert_eq!(Liveness::assess(&history, &baseline), Liveness::Soft404);
}

#[test]
fn test_real_content_is_live() {
    let baseline = catch_all_baseline();
    let history = history("/api/orders", vec![result("/api/orders", 200, r#"{"orders":[]}"#)]);
    assert_eq!(Liveness::assess(&history, &baseline), Liveness::Live);
}

#[test]
fn test_protected_and_redirect_statuses_are_live() {
    let baseline = Baseline::from_samples(Vec::new());
    for status in [301, 401, 403, 405] {
        let history = history("/admin", vec![result("/admin", status, "")]);
        assert_eq!(Liveness::assess(&history, &baseline), Liveness::Live, "{}", status);
    }
}

#[test]
fn test_not_found_is_dead() {
    let baseline = Baseline::from_samples(Vec::new());
    let history = history("/gone", vec![result("/gone", 404, "not found")]);
    assert_eq!(Liveness::assess(&history, &baseline), Liveness::Dead);
}

#[test]
fn test_latest_result_decides() {
    let baseline = Baseline::from_samples(Vec::new());
    let mut failed = ProbeResult::with_error(
        "/flaky".to_string(),
        "http://target.test/flaky".to_string(),
        "GET".to_string(),
        ProbeFailure::new(ProbeErrorKind::Timeout, "timed out"),
    );
    failed.attempt = 2;

    let history = history("/flaky", vec![result("/flaky", 200, "ok"), failed]);
    assert_eq!(Liveness::assess(&history, &baseline), Liveness::Error);
}

#[test]
fn test_skipped_history() {
    let baseline = Baseline::from_samples(Vec::new());
    let mut skipped = history("/wp-admin/", Vec::new());
    skipped.skipped = Some(SkipReason::WafProtected);
    assert_eq!(Liveness::assess(&skipped, &baseline), Liveness::Skipped);
}
