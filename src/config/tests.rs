use super::*;

fn minimal_raw() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.server.server_url = Some("https://notes.example.com/".to_string());
    raw.security.secret_api_key = Some("secret".to_string());
    raw
}

#[test]
fn defaults_apply_when_only_required_keys_are_set() {
    let settings = Settings::from_raw(minimal_raw()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.server.server_url, "https://notes.example.com");
    assert_eq!(settings.storage.root, PathBuf::from("static"));
    assert_eq!(settings.security.max_upload_bytes, 16 * 1024 * 1024);
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.sweep_interval, Duration::from_secs(60));
    assert!(
        settings
            .storage
            .allowed_filetypes
            .iter()
            .any(|value| value == "png")
    );
}

#[test]
fn missing_server_url_is_rejected() {
    let mut raw = minimal_raw();
    raw.server.server_url = None;

    let err = Settings::from_raw(raw).expect_err("must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "server.server_url",
            ..
        }
    ));
}

#[test]
fn missing_secret_is_rejected() {
    let mut raw = minimal_raw();
    raw.security.secret_api_key = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "security.secret_api_key",
            ..
        }
    ));
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = minimal_raw();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        storage_root: Some(PathBuf::from("/srv/notes")),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.storage.root, PathBuf::from("/srv/notes"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = minimal_raw();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn allowed_filetypes_are_normalized() {
    let mut raw = minimal_raw();
    raw.storage.allowed_filetypes = Some(vec![".PNG".to_string(), " jpg ".to_string()]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.storage.allowed_filetypes, vec!["png", "jpg"]);
}

#[test]
fn filetype_with_path_characters_is_rejected() {
    let mut raw = minimal_raw();
    raw.storage.allowed_filetypes = Some(vec!["png/../x".to_string()]);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_durations_are_rejected() {
    let mut raw = minimal_raw();
    raw.cache.sweep_interval_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.sweep_interval_seconds",
            ..
        }
    ));
}

#[test]
fn secret_is_redacted_from_debug_output() {
    let settings = Settings::from_raw(minimal_raw()).expect("valid settings");
    let rendered = format!("{:?}", settings.security);
    assert!(!rendered.contains("secret\""));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sharenote"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "sharenote",
        "serve",
        "--server-host",
        "127.0.0.1",
        "--server-url",
        "http://localhost:8086",
        "--log-json",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("127.0.0.1"));
            assert_eq!(
                serve.overrides.server_url.as_deref(),
                Some("http://localhost:8086")
            );
            assert_eq!(serve.overrides.log_json, Some(true));
        }
    }
}
