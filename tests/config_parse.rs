use runtests::{
    config::{Config, ConsentDefault},
    consent::Consent,
    submit::Endpoint,
};
use std::io::Write;

#[test]
fn parse_example_config() {
    let raw = include_str!("../runtests.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(!cfg.package.test_requires.is_empty());
    assert_eq!(cfg.report.path, "/post/v2/");
    assert_eq!(
        Endpoint::from_config(&cfg).url(),
        "https://tests.obspy.org/post/v2/"
    );
}

#[test]
fn partial_config_keeps_defaults() {
    let cfg: Config = toml::from_str("[report]\nhost = \"reports.example\"\n").expect("parse TOML");
    assert_eq!(cfg.report.host, "reports.example");
    assert_eq!(cfg.report.scheme, "https");
    assert_eq!(cfg.runner.traceback, "native");
    assert_eq!(cfg.package.name, "obspy");
}

#[test]
fn consent_config_values() {
    let cfg: Config = toml::from_str("[report]\nconsent = \"never\"\n").expect("parse TOML");
    assert_eq!(cfg.report.consent, ConsentDefault::Never);
    assert_eq!(Consent::from(ConsentDefault::Always), Consent::Yes);
    assert_eq!(Consent::from(ConsentDefault::Never), Consent::No);
    assert_eq!(Consent::from(ConsentDefault::Ask), Consent::Unresolved);
}

#[test]
fn unknown_consent_is_rejected_at_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[report]\nconsent = \"sometimes\"").unwrap();
    assert!(Config::load(file.path()).is_err());
}
