// Job descriptors and the naming of their archive files.

use chrono::{DateTime, FixedOffset, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One remote job as listed by the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobDescriptor {
    pub job_id: String,
    pub patient_id: String,
}

/// Whether archive names get a download-time timestamp suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TimestampPolicy {
    /// `{job}_{patient}.zip`
    None,
    /// `{job}_{patient}_{YYYYMMDDHHMMSS}.zip`, stamped when the download starts
    Download,
}

/// Patient id used by the sessions API: `{uid}_{YYYYMMDD_HHMMSS}`.
///
/// The timestamp is rendered in the offset the server sent it with.
pub fn patient_id_from(
    imaging_session_uid: &str,
    updated_at: &DateTime<FixedOffset>,
) -> String {
    format!(
        "{}_{}",
        imaging_session_uid,
        updated_at.format("%Y%m%d_%H%M%S")
    )
}

/// 14-digit local timestamp used as archive name suffix.
pub fn download_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Build the archive file name for a job.
///
/// Separators inside server ids are replaced so the file always lands
/// directly in the output directory.
pub fn archive_file_name(job: &JobDescriptor, stamp: Option<&str>) -> String {
    let mut name = format!("{}_{}", clean(&job.job_id), clean(&job.patient_id));
    if let Some(stamp) = stamp {
        name.push('_');
        name.push_str(stamp);
    }
    name.push_str(".zip");
    name
}

fn clean(part: &str) -> String {
    match part {
        "." | ".." => "_".to_string(),
        _ => part
            .chars()
            .map(|c| match c {
                '/' | '\\' => '_',
                c => c,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job(id: &str, patient: &str) -> JobDescriptor {
        JobDescriptor {
            job_id: id.into(),
            patient_id: patient.into(),
        }
    }

    #[test]
    fn plain_name() {
        assert_eq!(archive_file_name(&job("J1", "P1"), None), "J1_P1.zip");
    }

    #[test]
    fn stamped_name_has_fourteen_digits() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let stamp = download_stamp(now);
        assert_eq!(stamp, "20240309070501");
        assert_eq!(
            archive_file_name(&job("J1", "P1"), Some(&stamp)),
            "J1_P1_20240309070501.zip"
        );
    }

    #[test]
    fn patient_id_keeps_server_offset() {
        let ts = DateTime::parse_from_rfc3339("2024-05-17T13:04:59+08:00").unwrap();
        assert_eq!(patient_id_from("1.2.840.99", &ts), "1.2.840.99_20240517_130459");
    }

    #[test]
    fn ids_cannot_escape_output_dir() {
        let name = archive_file_name(&job("../etc", "a/b\\c"), None);
        assert_eq!(name, ".._etc_a_b_c.zip");
        assert_eq!(archive_file_name(&job("..", "."), None), "___.zip");
    }

    #[test]
    fn dotted_ids_are_kept_verbatim() {
        assert_eq!(
            archive_file_name(&job("1.2..3", "UID..9"), None),
            "1.2..3_UID..9.zip"
        );
    }
}
