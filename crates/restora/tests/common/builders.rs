//! Builders for raw API records.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use restora::remote::{HistoryPage, RawGroup, RawJob};

/// Fixed "now" every test clock starts at.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 10, 15, 30, 0).unwrap()
}

/// Builder for `RawJob`, relative to [`start_time`].
pub struct RawJobBuilder {
    job: RawJob,
}

impl RawJobBuilder {
    /// A completed job that ended one hour before `start_time`.
    pub fn new(id: &str, group_id: &str) -> Self {
        let ended = start_time() - Duration::hours(1);
        Self {
            job: RawJob {
                id: id.to_string(),
                group: RawGroup {
                    id: group_id.to_string(),
                    model_id: "restore-v2".to_string(),
                    model_name: Some("Restore v2".to_string()),
                    content_type: Some("image".to_string()),
                    count: Some(1),
                    width: Some(1024),
                    height: Some(768),
                },
                status: "completed".to_string(),
                create_time: Some((ended - Duration::minutes(2)).timestamp()),
                end_time: Some(ended.timestamp_millis()),
                nsfw_triggered: false,
                cancel_reason: None,
                output_url: Some(format!("https://cdn.example.com/{}.png?sig=abc", id)),
            },
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.job.status = status.to_string();
        self
    }

    /// Moves both timestamps so the job ended `hours` before `start_time`.
    pub fn ended_hours_ago(mut self, hours: i64) -> Self {
        let ended = start_time() - Duration::hours(hours);
        self.job.create_time = Some((ended - Duration::minutes(2)).timestamp());
        self.job.end_time = Some(ended.timestamp_millis());
        self
    }

    pub fn ended_minutes_ago(mut self, minutes: i64) -> Self {
        let ended = start_time() - Duration::minutes(minutes);
        self.job.create_time = Some((ended - Duration::minutes(2)).timestamp());
        self.job.end_time = Some(ended.timestamp_millis());
        self
    }

    /// Still running: created `minutes` ago, no end time.
    pub fn running_since_minutes(mut self, minutes: i64) -> Self {
        self.job.status = "processing".to_string();
        self.job.create_time = Some((start_time() - Duration::minutes(minutes)).timestamp());
        self.job.end_time = None;
        self
    }

    pub fn model(mut self, model_id: &str) -> Self {
        self.job.group.model_id = model_id.to_string();
        self
    }

    pub fn nsfw(mut self) -> Self {
        self.job.nsfw_triggered = true;
        self
    }

    pub fn output_url(mut self, url: &str) -> Self {
        self.job.output_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> RawJob {
        self.job
    }
}

pub fn job(id: &str, group_id: &str) -> RawJobBuilder {
    RawJobBuilder::new(id, group_id)
}

pub fn page(jobs: Vec<RawJob>, next_cursor: Option<u64>) -> HistoryPage {
    HistoryPage { jobs, next_cursor }
}

/// A small valid PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}
