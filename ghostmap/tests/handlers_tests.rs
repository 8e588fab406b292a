use ghostmap::handlers::*;
use ghostmap_core::AuditConfig;
use ghostmap_scanner::DiscoverySource;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};
use url::Url;

// ============================================================================
// Host Loading Tests
// ============================================================================

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("http://api.example.com");
    assert_eq!(result, Some("http://api.example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    assert_eq!(
        parse_url_line("api.example.com"),
        Some("https://api.example.com".to_string())
    );
    assert_eq!(
        parse_url_line("localhost:8080"),
        Some("https://localhost:8080".to_string())
    );
}

#[test]
fn test_parse_url_line_invalid() {
    assert_eq!(parse_url_line("not a valid url!!!"), None);
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://api.example.com")?;
    writeln!(temp_file, "# staging")?;
    writeln!(temp_file, "staging.example.com")?;
    writeln!(temp_file)?;
    writeln!(temp_file, "https://api.example.com")?;

    let path = PathBuf::from(temp_file.path());
    let urls = load_urls_from_file(&path)?;

    assert_eq!(
        urls,
        vec!["https://api.example.com", "https://staging.example.com"]
    );
    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let err = load_urls_from_file(&path).unwrap_err();
    assert!(err.contains("No valid hosts found"));
}

#[test]
fn test_load_urls_from_missing_file() {
    let err = load_urls_from_file(&PathBuf::from("/nonexistent/hosts.txt")).unwrap_err();
    assert!(err.contains("Failed to read hosts file"));
}

#[test]
fn test_load_urls_from_source() {
    let url = Url::parse("https://api.example.com").unwrap();
    let urls = load_urls_from_source(Some(&url), None).unwrap();
    assert_eq!(urls, vec!["https://api.example.com/"]);

    assert!(load_urls_from_source(None, None).is_err());
}

// ============================================================================
// Footprint Loading Tests
// ============================================================================

#[test]
fn test_footprint_line_forms() {
    let full = parse_footprint_line("https://api.example.com/v1/users?id=1").unwrap();
    assert_eq!(full.path, "/v1/users");
    assert_eq!(full.query_template.as_deref(), Some("id=1"));
    assert_eq!(full.source, DiscoverySource::Archive);

    let bare = parse_footprint_line("admin/panel").unwrap();
    assert_eq!(bare.path, "/admin/panel");
    assert_eq!(bare.query_template, None);

    assert!(parse_footprint_line("   ").is_none());
}

#[test]
fn test_load_footprint_from_line_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "# wayback export")?;
    writeln!(temp_file, "https://api.example.com/users/1")?;
    writeln!(temp_file, "/debug/info")?;
    writeln!(temp_file, "/users/1?expand=all")?;

    let footprint = load_footprint(temp_file.path())?;
    let paths: Vec<&str> = footprint.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["/users/1", "/debug/info"]);
    Ok(())
}

#[test]
fn test_load_footprint_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("footprint.json");
    fs::write(
        &path,
        r#"[
            {"path": "/api/v1/orders", "source": "js-mining"},
            {"path": "/export", "query_template": "fmt=csv", "source": "wayback"},
            "/health"
        ]"#,
    )?;

    let footprint = load_footprint(&path)?;
    assert_eq!(footprint.len(), 3);
    assert_eq!(footprint[0].source, DiscoverySource::JsMining);
    assert_eq!(footprint[1].source, DiscoverySource::Archive);
    assert_eq!(footprint[1].query_template.as_deref(), Some("fmt=csv"));
    assert_eq!(footprint[2].path, "/health");
    Ok(())
}

#[test]
fn test_json_record_with_full_url() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("footprint.json");
    fs::write(
        &path,
        r#"[
            {"path": "https://api.example.com/a?x=1", "source": "js-mining"},
            {"path": "https://api.example.com/b?x=1", "query_template": "y=2"},
            {"path": "/c?z=3#frag"}
        ]"#,
    )?;

    let footprint = load_footprint(&path)?;
    assert_eq!(footprint.len(), 3);
    assert_eq!(footprint[0].path, "/a");
    assert_eq!(footprint[0].query_template.as_deref(), Some("x=1"));
    assert_eq!(footprint[0].source, DiscoverySource::JsMining);
    assert_eq!(footprint[1].path, "/b");
    assert_eq!(footprint[1].query_template.as_deref(), Some("y=2"));
    assert_eq!(footprint[1].source, DiscoverySource::Archive);
    assert_eq!(footprint[2].path, "/c");
    assert_eq!(footprint[2].query_template.as_deref(), Some("z=3"));
    Ok(())
}

#[test]
fn test_empty_footprint_is_an_error() {
    let temp_file = NamedTempFile::new().unwrap();
    assert!(load_footprint(temp_file.path()).is_err());
}

// ============================================================================
// Documentation Loading Tests
// ============================================================================

#[test]
fn test_openapi_json_with_server_prefix() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("openapi.json");
    fs::write(
        &path,
        r#"{
            "openapi": "3.0.0",
            "servers": [{"url": "https://api.example.com/v2/"}],
            "paths": {"/users/{id}": {}, "/orders": {}}
        }"#,
    )?;

    let mut templates = load_doc_templates(&path)?;
    templates.sort();
    assert_eq!(templates, vec!["/v2/orders", "/v2/users/{id}"]);
    Ok(())
}

#[test]
fn test_swagger_yaml_with_base_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("swagger.yaml");
    fs::write(
        &path,
        "swagger: \"2.0\"\nbasePath: /api\npaths:\n  /pets:\n    get: {}\n  /pets/{petId}:\n    get: {}\n",
    )?;

    let mut templates = load_doc_templates(&path)?;
    templates.sort();
    assert_eq!(templates, vec!["/api/pets", "/api/pets/{petId}"]);
    Ok(())
}

#[test]
fn test_plain_template_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "/users/{{id}}")?;
    writeln!(temp_file, "# internal")?;
    writeln!(temp_file, "/orders")?;

    let templates = load_doc_templates(temp_file.path())?;
    assert_eq!(templates, vec!["/users/{id}", "/orders"]);
    Ok(())
}

#[test]
fn test_json_without_paths_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.json");
    fs::write(&path, r#"{"title": "not an api"}"#).unwrap();
    assert!(load_doc_templates(&path).is_err());
}

#[test]
fn test_document_without_prefix() {
    let document = serde_json::json!({"paths": {"/health": {}}});
    assert_eq!(
        templates_from_document(&document),
        Some(vec!["/health".to_string()])
    );
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_cli_overrides_win_over_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("ghostmap.yaml");
    fs::write(&path, "rate_limit: 2.0\nprobe_concurrency: 3\nfuzz: false\n")?;

    let overrides = CliOverrides {
        threads: Some(8),
        methods: Some(vec!["GET".to_string()]),
        fuzz: true,
        ..CliOverrides::default()
    };
    let config = build_config(Some(&path.to_string_lossy().into_owned()), &overrides)?;

    assert_eq!(config.probe_concurrency, 8);
    assert_eq!(config.rate_limit, 2.0);
    assert_eq!(config.probe_methods, vec!["GET"]);
    assert!(config.fuzz);
    Ok(())
}

#[test]
fn test_invalid_override_is_rejected() {
    let overrides = CliOverrides {
        methods: Some(Vec::new()),
        ..CliOverrides::default()
    };
    assert!(build_config(None, &overrides).is_err());
}

#[test]
fn test_defaults_without_config_file() {
    let config = build_config(None, &CliOverrides::default()).unwrap();
    assert_eq!(config.probe_concurrency, AuditConfig::default().probe_concurrency);
    assert!(!config.fuzz);
}
