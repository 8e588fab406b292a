use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("ghostmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("ghostmap")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("audit")
                .about(
                    "Probe a host's historical footprint, find live endpoints missing from its \
                documentation and rank them by risk.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Base URL of the host to audit")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of hosts to audit")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-F --"footprint" <PATH>)
                        .required(false)
                        .help(
                            "Historical endpoints: a JSON array or a newline-delimited list of \
                        URLs or paths",
                        )
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-d --"docs" <PATH>)
                        .required(false)
                        .help("OpenAPI/Swagger document (JSON or YAML) or a list of documented paths")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Audit configuration file (JSON or YAML)"),
                )
                .arg(
                    arg!(--"fuzz")
                        .help("Fuzz for tech-specific paths once the stack is fingerprinted")
                        .required(false),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent probes per host")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-r --"rate-limit" <RPS>)
                        .required(false)
                        .help("Requests per second per host (0 disables pacing)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-probe timeout in seconds")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-m --"methods" <METHODS>)
                        .required(false)
                        .help("Comma-separated HTTP methods to probe, e.g. HEAD,GET"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the report to this file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_audit_arguments_parse() {
        let matches = command_argument_builder()
            .try_get_matches_from([
                "ghostmap",
                "audit",
                "-u",
                "https://api.example.com",
                "--fuzz",
                "-t",
                "4",
                "--methods",
                "GET,POST",
                "-f",
                "json",
            ])
            .unwrap();

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "audit");
        assert!(sub.get_flag("fuzz"));
        assert_eq!(sub.get_one::<usize>("threads"), Some(&4));
        assert_eq!(sub.get_one::<String>("format").map(String::as_str), Some("json"));
    }

    #[test]
    fn test_url_conflicts_with_hosts_file() {
        let result = command_argument_builder().try_get_matches_from([
            "ghostmap",
            "audit",
            "-u",
            "https://api.example.com",
            "-H",
            "hosts.txt",
        ]);
        assert!(result.is_err());
    }
}
