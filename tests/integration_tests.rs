// Integration tests for mergereportpdf.
//
// These tests cover configuration, the recipient directory, the error type and
// atomic storage through the public API. PDF fixtures are synthesised in
// `tests/common` rather than read from disk.

use mergereportpdf::storage::write_atomic;
use mergereportpdf::{
    DistributorConfig, PageNumberStyle, RecipientDirectory, ReportError, TomlRecipientDirectory,
};
use std::io::Write;
use std::path::PathBuf;

// ── DistributorConfig ─────────────────────────────────────────────────────────

#[test]
fn default_config_is_usable() {
    let cfg = DistributorConfig::default();
    assert_eq!(cfg.output_directory, PathBuf::from("merged"));
    assert_eq!(cfg.page_numbers, PageNumberStyle::default());
    assert_eq!(cfg.page_numbers.font, "Helvetica");
    assert_eq!(cfg.page_numbers.font_size, 10.0);
    assert_eq!(cfg.sender, "reports@example.com");
    assert!(cfg.subject_template.contains("{frequency}"));
    assert!(cfg.body_template.contains("{addressee}"));
}

#[test]
fn custom_config_from_toml() {
    let cfg = DistributorConfig::from_toml_str(
        r#"
        output_directory = "./out"
        subject_template = "{region}: {frequency}"

        [page_numbers]
        font = "Times-Roman"
        font_size = 9.0
        bottom_margin = 30.0
        "#,
    )
    .unwrap();
    assert_eq!(cfg.output_directory, PathBuf::from("./out"));
    assert_eq!(cfg.subject_template, "{region}: {frequency}");
    assert_eq!(cfg.body_template, DistributorConfig::default().body_template);
    assert_eq!(
        cfg.page_numbers,
        PageNumberStyle {
            font: "Times-Roman".into(),
            font_size: 9.0,
            bottom_margin: 30.0,
        }
    );
}

#[test]
fn empty_config_is_the_default() {
    assert_eq!(DistributorConfig::from_toml_str("").unwrap(), DistributorConfig::default());
}

#[test]
fn unknown_config_keys_are_rejected() {
    let result = DistributorConfig::from_toml_str("output_dir = \"typo\"");
    assert!(matches!(result, Err(ReportError::ConfigError(_))));

    let result = DistributorConfig::from_toml_str("[page_numbers]\ncolour = \"red\"");
    assert!(matches!(result, Err(ReportError::ConfigError(_))));
}

#[test]
fn config_loads_from_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("distributor.toml");
    std::fs::write(&path, "output_directory = \"reports\"\n").unwrap();

    let cfg = DistributorConfig::from_path(&path).unwrap();
    assert_eq!(cfg.output_directory, PathBuf::from("reports"));
    assert!(matches!(
        DistributorConfig::from_path(dir.path().join("missing.toml")),
        Err(ReportError::IoError(_))
    ));
}

// ── TomlRecipientDirectory ────────────────────────────────────────────────────

const LISTS: &str = r#"
[[list]]
report = "Monthly"
team = "EMEA"
to = ["emea@example.com", "ops@example.com"]
bcc = ["audit@example.com"]
addressee = "EMEA leads"

[[list]]
report = "monthly"
team = "emea"
to = ["shadowed@example.com"]
"#;

#[test]
fn first_matching_list_wins() {
    let dir = TomlRecipientDirectory::from_toml_str(LISTS).unwrap();
    assert_eq!(dir.len(), 2);

    let found = dir.lookup("MONTHLY", "Emea").unwrap().unwrap();
    assert_eq!(found.to, vec!["emea@example.com", "ops@example.com"]);
    assert!(found.cc.is_empty());
    assert_eq!(found.bcc, vec!["audit@example.com"]);
    assert_eq!(found.addressee_name, "EMEA leads");
}

#[test]
fn no_match_is_not_an_error() {
    let dir = TomlRecipientDirectory::from_toml_str(LISTS).unwrap();
    assert_eq!(dir.lookup("Weekly", "EMEA").unwrap(), None);

    let empty = TomlRecipientDirectory::from_toml_str("").unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.lookup("Monthly", "EMEA").unwrap(), None);
}

#[test]
fn malformed_directory_is_a_config_error() {
    let result = TomlRecipientDirectory::from_toml_str("[[list]]\nteam = \"EMEA\"");
    assert!(matches!(result, Err(ReportError::ConfigError(_))));
}

// ── ReportError display ───────────────────────────────────────────────────────

#[test]
fn error_display_is_non_empty() {
    let errors: &[ReportError] = &[
        ReportError::InvalidPdf("test".into()),
        ReportError::MalformedFilename {
            filename: "Monthly Sec".into(),
            reason: "missing part".into(),
        },
        ReportError::SourceUnavailable {
            item: "Monthly Sec 1 EMEA.pdf".into(),
            reason: "gone".into(),
        },
        ReportError::PageCountMismatch { base: 4, overlay: 5 },
        ReportError::StorageError {
            path: "out/Monthly EMEA.pdf".into(),
            reason: "disk full".into(),
        },
        ReportError::ConfigError("bad".into()),
        ReportError::MailError("invalid address".into()),
    ];
    for e in errors {
        assert!(!e.to_string().is_empty(), "empty display for {e:?}");
    }
}

// ── Atomic storage ────────────────────────────────────────────────────────────

fn dir_listing(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn atomic_write_replaces_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Monthly EMEA.pdf");
    std::fs::write(&path, b"old").unwrap();

    write_atomic(&path, |out| {
        out.write_all(b"new")?;
        Ok(())
    })
    .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"new");
    assert_eq!(dir_listing(dir.path()), vec!["Monthly EMEA.pdf"]);
}

#[test]
fn failed_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Weekly APAC.pdf");

    let result = write_atomic(&path, |out| {
        out.write_all(b"half a document")?;
        Err(ReportError::InvalidPdf("interrupted".into()))
    });

    assert!(result.is_err());
    assert!(dir_listing(dir.path()).is_empty());
}

#[test]
fn failed_write_keeps_the_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Weekly APAC.pdf");
    std::fs::write(&path, b"previous").unwrap();

    let _ = write_atomic(&path, |_| Err(ReportError::InvalidPdf("interrupted".into())));

    assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    assert_eq!(dir_listing(dir.path()), vec!["Weekly APAC.pdf"]);
}

#[test]
fn writing_into_a_missing_directory_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.pdf");
    let result = write_atomic(&path, |_| Ok(()));
    assert!(matches!(result, Err(ReportError::StorageError { .. })));
}
