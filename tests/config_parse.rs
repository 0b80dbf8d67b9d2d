use speed_sweep::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../speed-sweep.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(cfg.batch.batch_size >= 1);
    assert!(!cfg.paths.state_file.is_empty());
    assert!(!cfg.notify.enabled());
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let raw = "[input]\nurl_row = 4\nurl_col = 2\n";
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.input.url_row, 4);
    assert_eq!(cfg.batch.batch_size, 5);
    assert_eq!(cfg.report.date_format, "[day]/[month]/[year]");
    assert!(!cfg.report.legacy_inp_rows);
    assert!(!cfg.api.accept_invalid_certs);
}
