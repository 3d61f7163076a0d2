// tests/config.rs

use std::error::Error;
use std::io::Write;
use std::time::Duration;

use clap::Parser;

use skillwatch::cli::{CliArgs, LogLevel};
use skillwatch::config::{load_and_validate, load_from_path, load_or_default, ConfigFile, RawConfigFile};
use skillwatch::errors::SkillwatchError;
use skillwatch::logging::resolve_level;
use skillwatch::mirror::skill_key;
use skillwatch::watch::protocol::serialize_watch_set;
use skillwatch::watch::WatchSet;
use skillwatch::resolve_config;

type TestResult = Result<(), Box<dyn Error>>;

fn raw_from(toml_src: &str) -> RawConfigFile {
    toml::from_str(toml_src).expect("valid TOML")
}

fn validate(toml_src: &str) -> Result<ConfigFile, SkillwatchError> {
    ConfigFile::try_from(raw_from(toml_src))
}

#[test]
fn defaults_apply_to_missing_sections() -> TestResult {
    let cfg = validate("[server]\nhost = \"nacos.local\"\n")?;

    assert_eq!(cfg.server_addr(), "nacos.local:8848");
    assert_eq!(cfg.server.namespace, "");
    assert_eq!(cfg.long_poll_timeout(), Duration::from_secs(30));
    assert_eq!(cfg.request_timeout(), Duration::from_secs(35));
    assert_eq!(cfg.watch_options().retry_backoff, Duration::from_secs(5));
    assert_eq!(cfg.retry_policy().attempts, 3);
    assert_eq!(cfg.retry_policy().delay, Duration::from_secs(3));
    assert!(cfg.output_dir().ends_with(".skills"));
    Ok(())
}

#[test]
fn server_addr_port_rules() -> TestResult {
    let cfg = validate("[server]\nhost = \"10.0.0.1:9000\"\n")?;
    assert_eq!(cfg.server_addr(), "10.0.0.1:9000");

    let cfg = validate("[server]\nhost = \"10.0.0.1:9000\"\nport = 8850\n")?;
    assert_eq!(cfg.server_addr(), "10.0.0.1:8850");

    let cfg = validate("[server]\nhost = \"10.0.0.1\"\nport = 8850\n")?;
    assert_eq!(cfg.server_addr(), "10.0.0.1:8850");
    Ok(())
}

#[test]
fn settings_carry_credentials_and_namespace() -> TestResult {
    let cfg = validate(
        r#"
        [server]
        host = "nacos.local"
        namespace = "team-a"
        username = "nacos"
        password = "secret"
        "#,
    )?;
    let settings = cfg.server_settings();
    assert_eq!(settings.namespace, "team-a");
    assert_eq!(settings.username.as_deref(), Some("nacos"));
    assert_eq!(settings.password.as_deref(), Some("secret"));
    Ok(())
}

#[test]
fn empty_config_falls_back_to_local_server_and_default_login() -> TestResult {
    let cfg = validate("")?;
    assert_eq!(cfg.server_addr(), "127.0.0.1:8848");

    let settings = cfg.server_settings();
    assert_eq!(settings.namespace, "");
    assert_eq!(settings.username.as_deref(), Some("nacos"));
    assert_eq!(settings.password.as_deref(), Some("nacos"));

    let cfg = validate(r#"[server]
host = "  "
port = 9000
"#)?;
    assert_eq!(cfg.server_addr(), "127.0.0.1:9000");
    Ok(())
}

#[test]
fn default_namespace_is_left_off_the_wire() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("skillwatch.toml");
    std::fs::write(&config, "")?;
    let config = config.to_string_lossy().to_string();

    let args = CliArgs::try_parse_from([
        "skillwatch",
        "--config",
        config.as_str(),
        "--host",
        "127.0.0.1",
        "demo",
    ])?;
    let settings = resolve_config(&args)?.server_settings();
    assert_eq!(settings.namespace, "");

    let mut set = WatchSet::new();
    set.insert(skill_key("demo", &settings.namespace), None);
    assert_eq!(serialize_watch_set(&set), "skill.json\u{2}skill_demo\u{2}\u{1}");
    Ok(())
}

#[test]
fn host_with_scheme_is_rejected() {
    assert!(validate("[server]\nhost = \"http://nacos.local\"\n").is_err());
}

#[test]
fn zero_port_is_rejected() {
    assert!(validate("[server]\nhost = \"h\"\nport = 0\n").is_err());
}

#[test]
fn request_timeout_must_outlast_long_poll_window() {
    let err = validate(
        "[server]\nhost = \"h\"\n[watch]\nlong_poll_timeout_ms = 30000\nrequest_timeout_ms = 30000\n",
    )
    .unwrap_err();
    assert!(matches!(err, SkillwatchError::ConfigError(msg) if msg.contains("request_timeout_ms")));
}

#[test]
fn zero_retries_is_rejected() {
    assert!(validate("[server]\nhost = \"h\"\n[watch]\nmaterialize_retries = 0\n").is_err());
}

#[test]
fn load_from_file_and_validate() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[server]\nhost = \"nacos.local\"\n[sync]\noutput_dir = \"/tmp/skills\"")?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.output_dir(), std::path::PathBuf::from("/tmp/skills"));
    Ok(())
}

#[test]
fn explicit_missing_file_is_an_error_but_default_is_optional() -> TestResult {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("nope.toml");

    assert!(matches!(
        load_from_path(&missing),
        Err(SkillwatchError::ConfigError(_))
    ));
    let raw = load_or_default(&missing)?;
    assert!(raw.server.host.is_none());
    Ok(())
}

#[test]
fn invalid_toml_is_reported() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[server\nhost = ")?;
    assert!(matches!(
        load_from_path(file.path()),
        Err(SkillwatchError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn cli_flags_override_the_file() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[server]\nhost = \"from-file\"\nnamespace = \"file-ns\"")?;
    let path = file.path().to_string_lossy().to_string();

    let args = CliArgs::try_parse_from([
        "skillwatch",
        "--config",
        path.as_str(),
        "--host",
        "from-cli",
        "--port",
        "9848",
        "-o",
        "/srv/skills",
        "alpha",
        "beta",
    ])?;
    assert_eq!(args.skills, vec!["alpha", "beta"]);

    let cfg = resolve_config(&args)?;
    assert_eq!(cfg.server_addr(), "from-cli:9848");
    assert_eq!(cfg.server.namespace, "file-ns");
    assert_eq!(cfg.output_dir(), std::path::PathBuf::from("/srv/skills"));
    Ok(())
}

#[test]
fn cli_requires_skills_or_all() {
    assert!(CliArgs::try_parse_from(["skillwatch", "--host", "h"]).is_err());
    assert!(CliArgs::try_parse_from(["skillwatch", "--host", "h", "--all"]).is_ok());
    assert!(CliArgs::try_parse_from(["skillwatch", "--all", "alpha"]).is_err());
}

#[test]
fn log_level_precedence() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some("WARN")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("nonsense")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
