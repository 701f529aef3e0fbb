//! JSON record of a successful run.
//!
//! Records are grouped by local date and edition, so a schedule running
//! several times a day keeps one file per edition:
//! `{json_output_dir}/{date}/{edition}.json`. A later run in the same
//! edition overwrites the earlier record.

use crate::pipeline::RunReport;
use crate::utils::edition_for;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Serialize)]
pub struct RunRecord<'a> {
    pub local_date: String,
    pub edition: &'static str,
    pub local_time: String,
    pub story_title: &'a str,
    pub title: &'a str,
    pub post_url: &'a str,
    pub backend: &'a str,
    pub image_url: &'a str,
    pub image_directive: &'a str,
    pub category: Option<&'a str>,
    pub location: Option<&'a str>,
    pub mirrored: bool,
}

impl<'a> RunRecord<'a> {
    pub fn new(report: &'a RunReport, now: DateTime<Local>) -> Self {
        Self {
            local_date: now.date_naive().to_string(),
            edition: edition_for(now.time()),
            local_time: now.format("%H:%M:%S").to_string(),
            story_title: &report.story_title,
            title: &report.article.title,
            post_url: &report.outcome.post_url,
            backend: &report.backend_id,
            image_url: &report.image_url,
            image_directive: &report.article.image_directive,
            category: report.article.category.as_deref(),
            location: report.article.location.as_deref(),
            mirrored: report.outcome.mirrored,
        }
    }

    pub fn path_in(&self, json_output_dir: &str) -> PathBuf {
        PathBuf::from(json_output_dir)
            .join(&self.local_date)
            .join(format!("{}.json", self.edition))
    }
}

/// Write the record for `report`, returning the file written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_run_record(report: &RunReport, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let record = RunRecord::new(report, Local::now());
    let json = serde_json::to_string_pretty(&record)?;
    let path = record.path_in(json_output_dir);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote run record");
    Ok(path)
}
