//! Settings document discovery and parsing.
//!
//! Three YAML documents may live in the configuration directory. A
//! `config-devel.yml` always wins; otherwise `config.yml` is used. When
//! neither exists the template is copied to `config.yml`, handed to a
//! [`ConfigEditor`], and the caller is told to stop so the operator can fill
//! in the credentials.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{info, warn};

use crate::identimetrics::downloader::error::{DownloaderError, Result};
use crate::identimetrics::downloader::model::RecordKind;

/// Development override, never committed.
pub const DEVEL_CONFIG: &str = "config-devel.yml";
/// Operator-maintained settings document.
pub const PRIMARY_CONFIG: &str = "config.yml";
/// Template copied into place on first run.
pub const TEMPLATE_CONFIG: &str = "config-example.yml";

/// Staff label used when `staff_level_2` is not configured.
pub const DEFAULT_STAFF_LEVEL: &str = "Staff";
/// Request timeout used when `request_timeout_secs` is not configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const BUNDLED_TEMPLATE: &str = include_str!("../../../config-example.yml");

/// Fully-resolved downloader settings. Immutable once loaded.
#[derive(Debug)]
pub struct Settings {
    /// PowerSchool base URL without a trailing slash.
    pub api_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Upper-cased school abbreviations excluded from `students.csv`.
    pub student_skip_schools: BTreeSet<String>,
    /// Upper-cased school abbreviations excluded from `staff.csv`.
    pub staff_skip_schools: BTreeSet<String>,
    /// Sixth column of every staff row.
    pub staff_level_2: String,
    pub request_timeout: Duration,
}

impl Settings {
    /// Reads and parses the settings document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text, path)
    }

    /// Parses a settings document; `path` is only used for error reporting.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self> {
        let raw: RawSettings =
            serde_yaml::from_str(text).map_err(|source| DownloaderError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        raw.resolve()
    }

    /// Skip-set that applies to the given record kind.
    pub fn skip_schools(&self, kind: RecordKind) -> &BTreeSet<String> {
        match kind {
            RecordKind::Student => &self.student_skip_schools,
            RecordKind::Staff => &self.staff_skip_schools,
        }
    }
}

/// Raw YAML shape, the `serde` target before resolution.
#[derive(Deserialize)]
struct RawSettings {
    ps_api_url: String,
    ps_client_id: String,
    ps_client_secret: String,
    #[serde(default)]
    student_skip_schools: Option<Vec<String>>,
    #[serde(default)]
    staff_skip_schools: Option<Vec<String>>,
    #[serde(default)]
    staff_level_2: Option<String>,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

impl RawSettings {
    fn resolve(self) -> Result<Settings> {
        let api_url = self.ps_api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(DownloaderError::InvalidConfig(
                "ps_api_url must not be empty".into(),
            ));
        }

        let timeout_secs = self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(DownloaderError::InvalidConfig(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(Settings {
            api_url,
            client_id: self.ps_client_id,
            client_secret: SecretString::from(self.ps_client_secret),
            student_skip_schools: normalize_schools(self.student_skip_schools),
            staff_skip_schools: normalize_schools(self.staff_skip_schools),
            staff_level_2: self
                .staff_level_2
                .unwrap_or_else(|| DEFAULT_STAFF_LEVEL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn normalize_schools(schools: Option<Vec<String>>) -> BTreeSet<String> {
    schools
        .unwrap_or_default()
        .into_iter()
        .map(|school| school.trim().to_uppercase())
        .filter(|school| !school.is_empty())
        .collect()
}

/// Opens a freshly bootstrapped settings document for the operator.
pub trait ConfigEditor {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Hands the document to the platform's default application.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEditor;

impl ConfigEditor for SystemEditor {
    fn open(&self, path: &Path) -> io::Result<()> {
        open::that(path)
    }
}

/// Outcome of [`resolve`].
#[derive(Debug)]
pub enum Resolution {
    /// Settings were loaded from `path`.
    Ready { settings: Settings, path: PathBuf },
    /// A template was written to the contained path; the run must stop here.
    Bootstrapped(PathBuf),
}

/// Picks the settings document in `dir` and loads it, bootstrapping
/// `config.yml` from the template on first run.
pub fn resolve(dir: &Path, editor: &dyn ConfigEditor) -> Result<Resolution> {
    let devel = dir.join(DEVEL_CONFIG);
    let primary = dir.join(PRIMARY_CONFIG);

    let path = if devel.is_file() {
        info!(path = %devel.display(), "using development configuration");
        devel
    } else if !primary.exists() {
        bootstrap(dir, &primary)?;
        info!(path = %primary.display(), "opening configuration file for editing");
        if let Err(err) = editor.open(&primary) {
            warn!(path = %primary.display(), error = %err, "could not open configuration file");
        }
        return Ok(Resolution::Bootstrapped(primary));
    } else {
        primary
    };

    let settings = Settings::load(&path)?;
    info!("PowerSchool server: {}", settings.api_url);
    Ok(Resolution::Ready { settings, path })
}

fn bootstrap(dir: &Path, primary: &Path) -> Result<()> {
    let template = dir.join(TEMPLATE_CONFIG);
    fs::create_dir_all(dir)?;
    if template.is_file() {
        info!(
            from = %template.display(),
            to = %primary.display(),
            "configuration file does not exist, copying template"
        );
        fs::copy(&template, primary)?;
    } else {
        info!(
            to = %primary.display(),
            "configuration file does not exist, writing bundled template"
        );
        fs::write(primary, BUNDLED_TEMPLATE)?;
    }
    Ok(())
}
