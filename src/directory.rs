use crate::{ReportError, Result};
use serde::Deserialize;
use std::path::Path;

// ── Recipients ───────────────────────────────────────────────────────────────

/// The people a report for one team is sent to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,

    /// Name used in the salutation of the draft.
    pub addressee_name: String,
}

// ── RecipientDirectory ───────────────────────────────────────────────────────

/// Maps a `(report, team)` pair to the recipients of that report.
pub trait RecipientDirectory {
    /// Zero matches is a normal outcome and returns `Ok(None)`.
    fn lookup(&self, report_name: &str, team_name: &str) -> Result<Option<Recipients>>;
}

// ── TomlRecipientDirectory ───────────────────────────────────────────────────

/// Mailing lists read from a TOML file:
///
/// ```toml
/// [[list]]
/// report = "Monthly"
/// team = "EMEA"
/// to = ["emea-leads@example.com"]
/// cc = ["finance@example.com"]
/// addressee = "EMEA leads"
/// ```
///
/// Report and team names match case-insensitively; when several lists match,
/// the first one in the file wins.
#[derive(Debug, Clone, Default)]
pub struct TomlRecipientDirectory {
    lists: Vec<MailingList>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct MailingList {
    report: String,
    team: String,
    #[serde(default)]
    to: Vec<String>,
    #[serde(default)]
    cc: Vec<String>,
    #[serde(default)]
    bcc: Vec<String>,
    #[serde(default)]
    addressee: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DirectoryFile {
    #[serde(default)]
    list: Vec<MailingList>,
}

impl TomlRecipientDirectory {
    /// ```
    /// use mergereportpdf::{RecipientDirectory, TomlRecipientDirectory};
    ///
    /// let dir = TomlRecipientDirectory::from_toml_str(r#"
    ///     [[list]]
    ///     report = "Weekly"
    ///     team = "APAC"
    ///     to = ["apac@example.com"]
    /// "#).unwrap();
    /// let found = dir.lookup("weekly", "apac").unwrap().unwrap();
    /// assert_eq!(found.to, vec!["apac@example.com"]);
    /// assert_eq!(found.addressee_name, "APAC");
    /// assert!(dir.lookup("Weekly", "EMEA").unwrap().is_none());
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: DirectoryFile =
            toml::from_str(text).map_err(|e| ReportError::ConfigError(e.to_string()))?;
        Ok(Self { lists: file.list })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl RecipientDirectory for TomlRecipientDirectory {
    fn lookup(&self, report_name: &str, team_name: &str) -> Result<Option<Recipients>> {
        let found = self.lists.iter().find(|list| {
            list.report.trim().eq_ignore_ascii_case(report_name.trim())
                && list.team.trim().eq_ignore_ascii_case(team_name.trim())
        });

        Ok(found.map(|list| Recipients {
            to: list.to.clone(),
            cc: list.cc.clone(),
            bcc: list.bcc.clone(),
            addressee_name: list.addressee.clone().unwrap_or_else(|| list.team.clone()),
        }))
    }
}
