use ocr_prep::{config::Config, version::Platform};

#[test]
fn parse_example_config() {
    let raw = include_str!("../ocr-prep.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.threads(), 4);
    assert_eq!(cfg.engine.required_version, "3.02.02");
    assert_eq!(cfg.filter.binary, "convert");
    assert!(!cfg.paths.out_dir.is_empty());
}

#[test]
fn empty_config_uses_defaults() {
    let cfg: Config = toml::from_str("").expect("parse TOML");
    assert_eq!(cfg.global.threads, 4);
    assert_eq!(cfg.global.platform, None);
    assert_eq!(cfg.filter.split_marker, "_split");
}

#[test]
fn platform_override_and_binary_defaults() {
    let cfg: Config = toml::from_str("[global]\nthreads = 0\nplatform = \"windows\"\nprint_summary = false\n")
        .expect("parse TOML");
    assert_eq!(cfg.platform(), Platform::Windows);
    assert_eq!(cfg.threads(), 1);
    assert!(cfg.engine.resolve_binary(Platform::Windows).ends_with("tesseract.exe"));
    assert_eq!(cfg.engine.resolve_binary(Platform::Unix), "tesseract");

    let mut cfg = cfg;
    cfg.engine.binary = " /opt/tess/bin/tesseract ".into();
    assert_eq!(cfg.engine.resolve_binary(Platform::Windows), "/opt/tess/bin/tesseract");
}
