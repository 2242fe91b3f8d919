//! Date-keyed versions.
//!
//! A `VersionSelector` turns a date into a [`VersionedFileAccess`] whose tag
//! is the date formatted as `YYYY.MM.DD` and whose fallback searches for any
//! older date-tagged copy.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, TimeZone};

use crate::access::VersionedFileAccess;
use crate::config::SelectorConfig;
use crate::error::UsageError;
use crate::rewrite::LayoutMode;
use crate::vfs::Filesystem;

/// `strftime` format of date tags.
pub const DATE_TAG_FORMAT: &str = "%Y.%m.%d";

/// Glob matching one date tag.
pub const DATE_GLOB: &str = "[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]";

/// Anything that can be formatted as a date tag.
pub trait VersionStamp {
    fn version_tag(&self) -> String;
}

impl VersionStamp for NaiveDate {
    fn version_tag(&self) -> String {
        self.format(DATE_TAG_FORMAT).to_string()
    }
}

impl VersionStamp for NaiveDateTime {
    fn version_tag(&self) -> String {
        self.date().version_tag()
    }
}

/// Uses the calendar date in the value's own time zone.
impl<Tz: TimeZone> VersionStamp for DateTime<Tz> {
    fn version_tag(&self) -> String {
        self.date_naive().version_tag()
    }
}

/// The fallback pattern for date tags in `layout`.
pub fn date_fallback_glob(layout: LayoutMode) -> String {
    match layout {
        LayoutMode::Flat => format!("{DATE_GLOB}-"),
        LayoutMode::Nested => format!("{DATE_GLOB}/"),
    }
}

/// Hands out date-versioned accessors over one filesystem.
#[derive(Clone)]
pub struct VersionSelector {
    fs: Arc<dyn Filesystem>,
    layout: LayoutMode,
}

impl VersionSelector {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            fs,
            layout: LayoutMode::default(),
        }
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn from_config(fs: Arc<dyn Filesystem>, config: &SelectorConfig) -> Self {
        Self::new(fs).with_layout(config.layout)
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// Accessor for the version tagged with `stamp`'s date.
    pub fn for_date(&self, stamp: impl VersionStamp) -> Result<VersionedFileAccess, UsageError> {
        let tag = stamp.version_tag();
        tracing::debug!(tag = %tag, layout = %self.layout, "selecting version");
        VersionedFileAccess::builder(Arc::clone(&self.fs))
            .tag(tag)
            .layout(self.layout)
            .fallback_glob(date_fallback_glob(self.layout))
            .build()
    }

    /// Accessor for a date given as text.
    ///
    /// Accepts `YYYY-MM-DD`, `YYYY.MM.DD` and RFC 3339 timestamps.
    pub fn parse(&self, value: &str) -> Result<VersionedFileAccess, UsageError> {
        self.for_date(parse_date(value)?)
    }

    pub fn today(&self) -> Result<VersionedFileAccess, UsageError> {
        self.for_date(Local::now().date_naive())
    }

    /// Accessor for the local date `days` days before today.
    pub fn days_ago(&self, days: u32) -> Result<VersionedFileAccess, UsageError> {
        let date = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(days.into()))
            .ok_or_else(|| UsageError::NotADate(format!("{days} days ago")))?;
        self.for_date(date)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, UsageError> {
    let value = value.trim();
    for format in ["%Y-%m-%d", DATE_TAG_FORMAT] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .map_err(|_| UsageError::NotADate(value.to_string()))
}
