//! Occupancy statistics built from the activity log.
//!
//! Samples are bucketed by the local weekday and hour they were taken in, so
//! the summary answers "how often is the studio open on Tuesdays at 3pm".

use super::activity_log::ActivityRecord;
use super::publish::PublishError;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub weekday: Weekday,
    pub hour: u32,
    pub samples: u64,
    pub open_samples: u64,
    pub motion_samples: u64,
}

impl HourBucket {
    pub fn open_ratio(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.open_samples as f64 / self.samples as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub generated_at: DateTime<FixedOffset>,
    pub total_samples: u64,
    pub first_sample: Option<DateTime<FixedOffset>>,
    pub last_sample: Option<DateTime<FixedOffset>>,
    /// Monday first, then by hour. Only hours with samples appear.
    pub buckets: Vec<HourBucket>,
}

pub fn aggregate(records: &[ActivityRecord], generated_at: DateTime<FixedOffset>) -> StatsSummary {
    let mut buckets: BTreeMap<(u32, u32), HourBucket> = BTreeMap::new();
    for record in records {
        let weekday = record.timestamp.weekday();
        let hour = record.timestamp.hour();
        let bucket = buckets
            .entry((weekday.num_days_from_monday(), hour))
            .or_insert(HourBucket {
                weekday,
                hour,
                samples: 0,
                open_samples: 0,
                motion_samples: 0,
            });
        bucket.samples += 1;
        bucket.open_samples += u64::from(record.is_open);
        bucket.motion_samples += u64::from(record.motion);
    }
    StatsSummary {
        generated_at,
        total_samples: records.len() as u64,
        first_sample: records.iter().map(|r| r.timestamp).min(),
        last_sample: records.iter().map(|r| r.timestamp).max(),
        buckets: buckets.into_values().collect(),
    }
}

/// Uploads summaries to the statistics endpoint.
pub struct StatsUploader {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl StatsUploader {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn upload(&self, summary: &StatsSummary) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(summary)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublishError::Status(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SwitchPosition;

    fn record(ts: &str, is_open: bool, motion: bool) -> ActivityRecord {
        ActivityRecord {
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap(),
            is_open,
            switch_position: SwitchPosition::Scheduled,
            motion,
        }
    }

    #[test]
    fn test_buckets_by_local_weekday_and_hour() {
        let records = [
            // Tuesday 15:xx local
            record("2024-01-02T15:00:00-06:00", true, false),
            record("2024-01-02T15:59:59-06:00", false, true),
            // the following Tuesday, same hour
            record("2024-01-09T15:30:00-06:00", true, false),
            // Monday 09:xx local
            record("2024-01-01T09:10:00-06:00", false, false),
        ];
        let now = DateTime::parse_from_rfc3339("2024-01-10T00:00:00-06:00").unwrap();

        let summary = aggregate(&records, now);

        assert_eq!(summary.total_samples, 4);
        assert_eq!(summary.first_sample, Some(records[3].timestamp));
        assert_eq!(summary.last_sample, Some(records[2].timestamp));
        assert_eq!(summary.buckets.len(), 2);

        let monday = summary.buckets[0];
        assert_eq!((monday.weekday, monday.hour, monday.samples), (Weekday::Mon, 9, 1));

        let tuesday = summary.buckets[1];
        assert_eq!((tuesday.weekday, tuesday.hour), (Weekday::Tue, 15));
        assert_eq!(tuesday.samples, 3);
        assert_eq!(tuesday.open_samples, 2);
        assert_eq!(tuesday.motion_samples, 1);
        assert!((tuesday.open_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_log() {
        let now = DateTime::parse_from_rfc3339("2024-01-10T00:00:00Z").unwrap();
        let summary = aggregate(&[], now);
        assert_eq!(summary.total_samples, 0);
        assert!(summary.buckets.is_empty());
        assert_eq!(summary.first_sample, None);
    }
}
