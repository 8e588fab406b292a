use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use ghostmap_core::report::{ReportFormat, generate_audit_report, ranked_live_records, save_report};
use ghostmap_core::{AuditConfig, AuditEngine, AuditTarget, HostAudit, RiskBand};
use ghostmap_scanner::{DiscoverySource, EndpointCandidate, ProbeResult, cancel_pair};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

// Host loading

/// Load hosts from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load hosts from a newline-delimited file. `#` starts a comment; duplicates are dropped.
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let mut seen = HashSet::new();
    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .filter(|url| seen.insert(url.clone()))
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid hosts found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a host URL, adding https:// when no scheme is given
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line) {
        if matches!(url.scheme(), "http" | "https") {
            return Some(line.to_string());
        }
    }

    let with_scheme = format!("https://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some() && !line.contains(' ') => return Some(with_scheme),
        _ => {}
    }

    eprintln!("{} Skipping invalid host '{}'", "⚠".yellow(), line);
    None
}

// Footprint loading

#[derive(Deserialize)]
#[serde(untagged)]
enum FootprintEntry {
    Record {
        path: String,
        #[serde(default)]
        query_template: Option<String>,
        #[serde(default)]
        source: Option<String>,
    },
    Path(String),
}

impl FootprintEntry {
    fn into_candidate(self) -> Option<EndpointCandidate> {
        match self {
            FootprintEntry::Path(line) => parse_footprint_line(&line),
            FootprintEntry::Record {
                path,
                query_template,
                source,
            } => {
                let source = match source.as_deref().map(str::parse::<DiscoverySource>) {
                    Some(Ok(source)) => source,
                    Some(Err(e)) => {
                        warn!("{}, treating {} as archive", e, path);
                        DiscoverySource::Archive
                    }
                    None => DiscoverySource::Archive,
                };
                // record paths may be full URLs too; an explicit template wins
                let mut candidate = parse_footprint_line(&path)?;
                candidate.source = source;
                if let Some(query) = query_template.filter(|q| !q.is_empty()) {
                    candidate = candidate.with_query_template(query);
                }
                Some(candidate)
            }
        }
    }
}

/// Load the historical footprint: a JSON array (candidate objects or plain
/// strings) or a newline-delimited list of URLs or paths. Query strings are
/// kept as the query template. Paths are deduplicated, first one wins.
pub fn load_footprint(path: &Path) -> anyhow::Result<Vec<EndpointCandidate>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read footprint {}", path.display()))?;

    let candidates: Vec<EndpointCandidate> = if content.trim_start().starts_with('[') {
        let entries: Vec<FootprintEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse footprint {}", path.display()))?;
        entries
            .into_iter()
            .filter_map(FootprintEntry::into_candidate)
            .collect()
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_footprint_line)
            .collect()
    };

    let mut seen = HashSet::new();
    let candidates: Vec<EndpointCandidate> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.path.clone()))
        .collect();

    if candidates.is_empty() {
        bail!("No endpoints found in footprint {}", path.display());
    }
    Ok(candidates)
}

/// `https://host/a/b?x=1` and `/a/b?x=1` both give path `/a/b`, query `x=1`.
pub fn parse_footprint_line(line: &str) -> Option<EndpointCandidate> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (path, query) = match Url::parse(line) {
        Ok(url) if url.has_host() => (url.path().to_string(), url.query().unwrap_or("").to_string()),
        _ => {
            let without_fragment = line.split('#').next().unwrap_or_default();
            match without_fragment.split_once('?') {
                Some((path, query)) => (path.to_string(), query.to_string()),
                None => (without_fragment.to_string(), String::new()),
            }
        }
    };

    if path.contains(char::is_whitespace) {
        warn!("Skipping footprint entry with whitespace: {}", line);
        return None;
    }

    Some(EndpointCandidate::new(path, DiscoverySource::Archive).with_query_template(query))
}

// Documentation loading

/// Documented path templates from an OpenAPI 3 / Swagger 2 document (JSON or
/// YAML) or from a plain newline-delimited list.
pub fn load_doc_templates(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read documentation {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let document: Option<serde_json::Value> = match extension.as_deref() {
        Some("json") => Some(
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        ),
        Some("yaml") | Some("yml") => Some(
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        ),
        _ => None,
    };

    let templates = match document {
        Some(document) => templates_from_document(&document).with_context(|| {
            format!("{} is not an OpenAPI or Swagger document", path.display())
        })?,
        None => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
    };

    info!("Loaded {} documented paths", templates.len());
    Ok(templates)
}

/// `paths` keys prefixed with the Swagger `basePath` or the path of the first OpenAPI server.
pub fn templates_from_document(document: &serde_json::Value) -> Option<Vec<String>> {
    let paths = document.get("paths")?.as_object()?;

    let prefix = document
        .get("basePath")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| {
            let server = document.get("servers")?.get(0)?.get("url")?.as_str()?;
            match Url::parse(server) {
                Ok(url) => Some(url.path().to_string()),
                Err(_) => Some(server.to_string()),
            }
        })
        .unwrap_or_default();
    let prefix = prefix.trim_end_matches('/');

    Some(
        paths
            .keys()
            .map(|key| {
                let key = if key.starts_with('/') {
                    key.clone()
                } else {
                    format!("/{}", key)
                };
                format!("{}{}", prefix, key)
            })
            .collect(),
    )
}

// Configuration

/// Values given on the command line; each one overrides the config file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub threads: Option<usize>,
    pub rate_limit: Option<f64>,
    pub timeout: Option<f64>,
    pub methods: Option<Vec<String>>,
    pub fuzz: bool,
}

impl CliOverrides {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            threads: matches.get_one::<usize>("threads").copied(),
            rate_limit: matches.get_one::<f64>("rate-limit").copied(),
            timeout: matches.get_one::<f64>("timeout").copied(),
            methods: matches.get_one::<String>("methods").map(|m| {
                m.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            fuzz: matches.get_flag("fuzz"),
        }
    }

    pub fn apply(&self, config: &mut AuditConfig) {
        if let Some(threads) = self.threads {
            config.probe_concurrency = threads;
        }
        if let Some(rate) = self.rate_limit {
            config.rate_limit = rate;
        }
        if let Some(timeout) = self.timeout {
            config.probe_timeout = timeout;
        }
        if let Some(methods) = &self.methods {
            config.probe_methods = methods.clone();
        }
        if self.fuzz {
            config.fuzz = true;
        }
    }
}

pub fn build_config(config_path: Option<&String>, overrides: &CliOverrides) -> anyhow::Result<AuditConfig> {
    let mut config = match config_path {
        Some(path) => AuditConfig::from_file(path)?,
        None => AuditConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// Logging

pub fn init_tracing(verbose: bool, quiet: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "ghostmap=debug,ghostmap_core=debug,ghostmap_scanner=debug"
    } else {
        "ghostmap=info,ghostmap_core=info,ghostmap_scanner=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// Output

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn print_banner() {
    print_divider();
    println!(
        "{}  {}",
        "  GHOSTMAP".bright_white().bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
    println!("  {}", "find the API endpoints your documentation forgot".bright_black());
    print_divider();
    println!();
}

fn colored_band(band: RiskBand, text: String) -> colored::ColoredString {
    match band {
        RiskBand::Red => text.red().bold(),
        RiskBand::Yellow => text.yellow(),
        RiskBand::Green => text.green(),
    }
}

pub fn print_summary(audits: &[HostAudit]) {
    for audit in audits {
        let summary = &audit.summary;
        println!();
        print_divider();
        println!("  {}", summary.host.bright_white().bold());
        print_divider();

        println!(
            "{} Baseline: {}",
            "→".blue(),
            summary.baseline.to_string().bright_white()
        );
        if let Some(vendor) = summary.waf_vendor {
            println!("{} WAF: {}", "→".blue(), vendor.name().magenta());
        }
        if summary.waf_protected {
            println!(
                "{} {}",
                "⚠".yellow().bold(),
                "WAF-protected: remaining candidates were skipped".yellow()
            );
        }
        if !summary.tags.is_empty() {
            let tags: Vec<&str> = summary.tags.iter().map(String::as_str).collect();
            println!("{} Tech: {}", "→".blue(), tags.join(", ").cyan());
        }
        println!(
            "{} {} probed, {} live, {} ghost, {} ambiguous, {} skipped",
            "✓".green().bold(),
            summary.candidates,
            summary.live.to_string().bright_white(),
            summary.ghosts.to_string().red().bold(),
            summary.ambiguous.to_string().yellow(),
            summary.skipped
        );

        let live = ranked_live_records(audit);
        if !live.is_empty() {
            println!();
        }
        for record in live {
            let status = record
                .status_code()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string());
            println!(
                "  {} {:<10} {} {}",
                colored_band(
                    record.risk_band,
                    format!("[{:<6} {:>3}]", record.risk_band.as_str(), record.risk_score)
                ),
                record.documentation.as_str(),
                status.bright_black(),
                record.candidate.path
            );
        }
    }
    println!();
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

// Commands

pub async fn handle_audit(sub_matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let url = sub_matches.get_one::<Url>("url");
    let hosts_file = sub_matches.get_one::<PathBuf>("hosts-file");
    let hosts = load_urls_from_source(url, hosts_file).map_err(anyhow::Error::msg)?;

    let overrides = CliOverrides::from_matches(sub_matches);
    let config = build_config(sub_matches.get_one::<String>("config"), &overrides)?;

    let footprint = match sub_matches.get_one::<PathBuf>("footprint") {
        Some(path) => load_footprint(path)?,
        None => vec![EndpointCandidate::new("/", DiscoverySource::Archive)],
    };
    let templates = match sub_matches.get_one::<PathBuf>("docs") {
        Some(path) => load_doc_templates(path)?,
        None => Vec::new(),
    };

    let format: ReportFormat = sub_matches
        .get_one::<String>("format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches.get_one::<PathBuf>("output");

    if !quiet {
        println!(
            "{} Auditing {} host(s), {} footprint endpoints, {} documented paths",
            "→".blue(),
            hosts.len().to_string().bright_white(),
            footprint.len().to_string().bright_white(),
            templates.len().to_string().bright_white()
        );
        println!(
            "{} {} req/s, {} workers, fuzzing {}",
            "→".blue(),
            config.rate_limit,
            config.probe_concurrency,
            if config.fuzz { "on".green() } else { "off".bright_black() }
        );
    }

    let (cancel_handle, cancel_signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let progress = spinner(quiet);
    let probed = Arc::new(AtomicUsize::new(0));
    let progress_bar = progress.clone();
    let counter = probed.clone();
    let callback = Arc::new(move |result: &ProbeResult| {
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        progress_bar.set_message(format!("{} probes  {}", n, result.path));
    });

    let engine = AuditEngine::new(config, templates)?
        .with_cancel_signal(cancel_signal.clone())
        .with_progress_callback(callback);

    let targets: Vec<AuditTarget> = hosts
        .into_iter()
        .map(|host| AuditTarget::new(host, footprint.clone()))
        .collect();

    let audits = engine.audit(targets).await;
    progress.finish_and_clear();
    let audits = audits?;

    if cancel_signal.is_cancelled() {
        eprintln!("{} Audit cancelled, results are partial", "⚠".yellow().bold());
    }

    if !quiet {
        print_summary(&audits);
    }

    let report = generate_audit_report(&audits, format)?;
    match output {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            save_report(&report, Path::new(&expanded))
                .with_context(|| format!("Failed to write report to {}", expanded))?;
            println!(
                "{} Report saved: {}",
                "✓".green().bold(),
                expanded.bright_white()
            );
        }
        None if format == ReportFormat::Json || quiet => print!("{}", report),
        None => {}
    }

    Ok(())
}
