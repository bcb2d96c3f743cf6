//! The five-stage download run: settings → token → students → staff → files.
//!
//! Each stage catches its own failure, appends it to the [`ErrorLog`], and
//! hands degraded data (no token, an empty collection) to the next stage.
//! Nothing here aborts a run once the settings are loaded.

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use tracing::{info, instrument};

use crate::identimetrics::downloader::auth::{self, AccessToken};
use crate::identimetrics::downloader::client::ApiTransport;
use crate::identimetrics::downloader::config::Settings;
use crate::identimetrics::downloader::errlog::ErrorLog;
use crate::identimetrics::downloader::error::DownloaderError;
use crate::identimetrics::downloader::export::{self, ExportJob, ExportSummary};
use crate::identimetrics::downloader::fetch;
use crate::identimetrics::downloader::model::{Record, RecordKind};
use crate::identimetrics::downloader::sanitize;

/// State threaded from one stage to the next.
#[derive(Debug, Default)]
pub struct PipelineState {
    pub token: Option<AccessToken>,
    pub students: Vec<Record>,
    pub staff: Vec<Record>,
    pub errors: ErrorLog,
}

impl PipelineState {
    pub fn records(&self, kind: RecordKind) -> &[Record] {
        match kind {
            RecordKind::Student => &self.students,
            RecordKind::Staff => &self.staff,
        }
    }

    fn records_mut(&mut self, kind: RecordKind) -> &mut Vec<Record> {
        match kind {
            RecordKind::Student => &mut self.students,
            RecordKind::Staff => &mut self.staff,
        }
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub students: Option<ExportSummary>,
    pub staff: Option<ExportSummary>,
    pub errors: ErrorLog,
}

impl RunReport {
    pub fn summary(&self, kind: RecordKind) -> Option<&ExportSummary> {
        match kind {
            RecordKind::Student => self.students.as_ref(),
            RecordKind::Staff => self.staff.as_ref(),
        }
    }
}

/// Runs authentication, both downloads, and both exports into `export_dir`.
pub fn run<T: ApiTransport + ?Sized>(
    settings: &Settings,
    transport: &T,
    export_dir: &Path,
) -> RunReport {
    run_with_clock(settings, transport, export_dir, &|| Local::now().naive_local())
}

/// Same as [`run`], reading backup timestamps from `clock`.
///
/// `clock` is read once per export, immediately before the previous file is
/// renamed.
#[instrument(level = "info", skip_all, fields(export_dir = %export_dir.display()))]
pub fn run_with_clock<T: ApiTransport + ?Sized>(
    settings: &Settings,
    transport: &T,
    export_dir: &Path,
    clock: &dyn Fn() -> NaiveDateTime,
) -> RunReport {
    info!("running Identimetrics downloader");
    let mut state = PipelineState::default();

    authenticate_stage(&mut state, settings, transport);
    for kind in RecordKind::ALL {
        fetch_stage(&mut state, settings, transport, kind);
    }
    for kind in RecordKind::ALL {
        sanitize::strip_commas(state.records_mut(kind));
    }

    let students = export_stage(&mut state, settings, export_dir, RecordKind::Student, clock());
    let staff = export_stage(&mut state, settings, export_dir, RecordKind::Staff, clock());

    RunReport {
        students,
        staff,
        errors: state.errors,
    }
}

/// Obtains the access token, leaving it unset on failure.
pub fn authenticate_stage<T: ApiTransport + ?Sized>(
    state: &mut PipelineState,
    settings: &Settings,
    transport: &T,
) {
    match auth::authenticate(transport, settings) {
        Ok(token) => state.token = Some(token),
        Err(err) => state
            .errors
            .record(format!("Error authenticating with PowerSchool: {err}")),
    }
}

/// Downloads one record kind, leaving its collection empty on failure.
pub fn fetch_stage<T: ApiTransport + ?Sized>(
    state: &mut PipelineState,
    settings: &Settings,
    transport: &T,
    kind: RecordKind,
) {
    let result = match &state.token {
        Some(token) => fetch::fetch_records(transport, &settings.api_url, token, kind),
        None => Err(DownloaderError::NotAuthenticated),
    };

    match result {
        Ok(records) => *state.records_mut(kind) = records,
        Err(DownloaderError::MissingRecords) => state.errors.record(format!(
            "{} download error: no 'record' key in JSON",
            kind.title()
        )),
        Err(err) => state
            .errors
            .record(format!("Error downloading {kind}: {err}")),
    }
}

/// Writes one record kind, logging per-record rejections and I/O failures.
pub fn export_stage(
    state: &mut PipelineState,
    settings: &Settings,
    export_dir: &Path,
    kind: RecordKind,
    stamp: NaiveDateTime,
) -> Option<ExportSummary> {
    let job = ExportJob::new(kind, state.records(kind), settings);
    match export::export_records(export_dir, &job, stamp) {
        Ok(summary) => {
            for rejection in &summary.rejected {
                state
                    .errors
                    .record(format!("Error writing {kind}: {rejection}"));
            }
            info!(
                path = %summary.path.display(),
                written = summary.written,
                skipped = summary.skipped,
                "wrote {kind}"
            );
            Some(summary)
        }
        Err(err) => {
            state.errors.record(format!("Error writing {kind}: {err}"));
            None
        }
    }
}
