//! Core library for the identimetrics-downloader command line application.
//!
//! The downloader authenticates against a PowerSchool server, runs the two
//! Identimetrics PowerQueries (students and staff), strips commas from the
//! returned fields, and writes one headerless CSV file per record kind. The
//! stages live under [`identimetrics::downloader`]: settings discovery in
//! [`config`], HTTP in [`client`], the OAuth exchange in [`auth`], queries in
//! [`fetch`], cleanup in [`sanitize`], file output in [`export`], and the
//! orchestration with its error log in [`pipeline`].

pub mod identimetrics;

pub use identimetrics::downloader::{
    DownloaderError, Result, auth, client, config, errlog, error, export, fetch, logging, model,
    pipeline, sanitize,
};
