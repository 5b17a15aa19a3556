//! Reader for the client's `unitinfo.txt` companion file
//!
//! The file describes the unit currently in progress:
//!
//! ```text
//! Current Work Unit
//! -----------------
//! Name: Gromacs
//! Tag: P2669R13C28G71
//! Download time: August 1 21:17:04
//! Due time: August 4 21:17:04
//! Progress: 1%  [__________]
//! ```
//!
//! Dates carry no year; the caller supplies one (or the current UTC year is
//! used). Fields that fail to parse are left as `None`.

use crate::error::{Error, Result};
use crate::types::ProjectInfo;
use chrono::{Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

const NAME_PREFIX: &str = "Name: ";
const TAG_PREFIX: &str = "Tag: ";
const DOWNLOAD_TIME_PREFIX: &str = "Download time: ";
const DUE_TIME_PREFIX: &str = "Due time: ";
const PROGRESS_PREFIX: &str = "Progress: ";

const DATE_FORMAT: &str = "%Y %B %e %H:%M:%S";

/// Contents of a unitinfo file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub name: Option<String>,
    pub tag: Option<String>,
    /// Project parsed from `tag`, when it has the `P..R..C..G..` shape
    pub project: Option<ProjectInfo>,
    pub download_time: Option<NaiveDateTime>,
    pub due_time: Option<NaiveDateTime>,
    /// Percent complete
    pub progress: Option<u32>,
}

impl UnitInfo {
    /// Parse unitinfo text, resolving dates against `year`.
    pub fn parse(text: &str, year: i32) -> Self {
        let mut info = UnitInfo::default();

        for line in text.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix(NAME_PREFIX) {
                info.name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(TAG_PREFIX) {
                let tag = value.trim();
                info.project = ProjectInfo::from_tag(tag);
                if info.project.is_none() {
                    tracing::debug!(tag, "unitinfo tag is not a project tag");
                }
                info.tag = Some(tag.to_string());
            } else if let Some(value) = line.strip_prefix(DOWNLOAD_TIME_PREFIX) {
                info.download_time = parse_date(value, year);
            } else if let Some(value) = line.strip_prefix(DUE_TIME_PREFIX) {
                info.due_time = parse_date(value, year);
            } else if let Some(value) = line.strip_prefix(PROGRESS_PREFIX) {
                info.progress = parse_progress(value);
            }
        }

        // a unit downloaded in December can be due in January
        if let (Some(download), Some(due)) = (info.download_time, info.due_time) {
            if due < download {
                info.due_time = due.with_year(year + 1).or(Some(due));
            }
        }

        info
    }

    /// Read and parse a unitinfo file.
    ///
    /// `year` defaults to the current UTC year.
    pub fn from_file(path: impl AsRef<Path>, year: Option<i32>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::MissingPath);
        }
        if !path.exists() {
            return Err(Error::UnitInfo {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let year = year.unwrap_or_else(|| Utc::now().year());
        Ok(Self::parse(&text, year))
    }
}

fn parse_date(value: &str, year: i32) -> Option<NaiveDateTime> {
    let value = value.trim();
    match NaiveDateTime::parse_from_str(&format!("{} {}", year, value), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::debug!(value, error = %e, "unparseable unitinfo date");
            None
        }
    }
}

fn parse_progress(value: &str) -> Option<u32> {
    let digits = value.trim().split('%').next()?.trim();
    match digits.parse() {
        Ok(percent) => Some(percent),
        Err(_) => {
            tracing::debug!(value, "unparseable unitinfo progress");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const SAMPLE: &str = "Current Work Unit\n\
                          -----------------\n\
                          Name: Gromacs\n\
                          Tag: P2669R13C28G71\n\
                          Download time: August 1 21:17:04\n\
                          Due time: August 4 21:17:04\n\
                          Progress: 1%  [__________]\n";

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let info = UnitInfo::parse(SAMPLE, 2009);
        assert_eq!(info.name.as_deref(), Some("Gromacs"));
        assert_eq!(info.tag.as_deref(), Some("P2669R13C28G71"));
        assert_eq!(info.project, Some(ProjectInfo::new(2669, 13, 28, 71)));
        assert_eq!(info.download_time, Some(date(2009, 8, 1, 21, 17, 4)));
        assert_eq!(info.due_time, Some(date(2009, 8, 4, 21, 17, 4)));
        assert_eq!(info.progress, Some(1));
    }

    #[test]
    fn test_due_time_rolls_into_next_year() {
        let text = "Download time: December 30 18:00:00\nDue time: January 2 18:00:00";
        let info = UnitInfo::parse(text, 2009);
        assert_eq!(info.download_time, Some(date(2009, 12, 30, 18, 0, 0)));
        assert_eq!(info.due_time, Some(date(2010, 1, 2, 18, 0, 0)));
    }

    #[test]
    fn test_malformed_fields_are_none() {
        let text = "Name: ProtoMol\nTag: not-a-tag\nDownload time: Smarch 40 99:00:00\nProgress: lots";
        let info = UnitInfo::parse(text, 2010);
        assert_eq!(info.name.as_deref(), Some("ProtoMol"));
        assert_eq!(info.tag.as_deref(), Some("not-a-tag"));
        assert_eq!(info.project, None);
        assert_eq!(info.download_time, None);
        assert_eq!(info.due_time, None);
        assert_eq!(info.progress, None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let info = UnitInfo::from_file(file.path(), Some(2011)).unwrap();
        assert_eq!(info.progress, Some(1));
        assert_eq!(info.due_time, Some(date(2011, 8, 4, 21, 17, 4)));
    }

    #[test]
    fn test_from_file_errors() {
        assert!(matches!(UnitInfo::from_file("", None), Err(Error::MissingPath)));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("unitinfo.txt");
        assert!(matches!(
            UnitInfo::from_file(&missing, None),
            Err(Error::UnitInfo { .. })
        ));
    }
}
