//! Object key scheme for jobs.
//!
//! Key format:
//! - job folder: `jobs/{reg}-{yyyyMMdd}/`
//! - metadata: `jobs/{folder}/init.json`, `jobs/{folder}/jobDescriptions.json`,
//!   `jobs/{folder}/complete.json`
//! - images: `jobs/{folder}/{position}/{preImage|postImage}{ext}`
//! - invoices: `jobs/{folder}/invoices/{invoiceNumber}{ext}`
//!
//! Everything here is pure. Only [`parse_folder_id`] and [`validate_segment`] can fail.

use chrono::NaiveDate;
use std::fmt::{Display, Formatter, Result as FmtResult};
use thiserror::Error;
use tyrelog_core::{ImageRole, TyrePosition};

pub const JOBS_ROOT: &str = "jobs/";
pub const FOLDER_SEPARATOR: char = '-';
const DATE_FORMAT: &str = "%Y%m%d";
const DATE_LEN: usize = 8;
const INVOICES_SEGMENT: &str = "invoices";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Malformed job folder name: {0}")]
    MalformedFolder(String),

    #[error("Invalid key segment: {0:?}")]
    InvalidSegment(String),
}

/// Check a caller-supplied value (registration, invoice number) can be used as
/// part of a single key segment.
pub fn validate_segment(value: &str) -> Result<(), KeyError> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed != value
        || value.contains(['/', '\\'])
        || value == "."
        || value == ".."
    {
        return Err(KeyError::InvalidSegment(value.to_string()));
    }
    Ok(())
}

/// Folder identifier grouping every object of one job: `{reg}-{yyyyMMdd}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FolderId(String);

impl FolderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FolderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

pub fn folder_id(reg_number: &str, date: NaiveDate) -> FolderId {
    FolderId(format!(
        "{}{}{}",
        reg_number,
        FOLDER_SEPARATOR,
        date.format(DATE_FORMAT)
    ))
}

/// Split a folder name on its first separator into registration and date.
///
/// A registration containing the separator cannot be recovered: the date
/// token is then not 8 digits and the name is rejected.
pub fn parse_folder_id(id: &str) -> Result<(String, NaiveDate), KeyError> {
    let malformed = || KeyError::MalformedFolder(id.to_string());

    let (reg_number, date) = id.split_once(FOLDER_SEPARATOR).ok_or_else(malformed)?;
    if reg_number.is_empty()
        || date.len() != DATE_LEN
        || !date.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| malformed())?;
    Ok((reg_number.to_string(), date))
}

/// Prefix of every object in the job, with trailing slash.
pub fn job_prefix(folder: &FolderId) -> String {
    format!("{}{}/", JOBS_ROOT, folder)
}

/// `extension` includes its leading dot, or is empty.
pub fn image_object_key(
    folder: &FolderId,
    position: TyrePosition,
    role: ImageRole,
    extension: &str,
) -> String {
    format!(
        "{}{}/{}{}",
        job_prefix(folder),
        position.as_str(),
        role.object_stem(),
        extension
    )
}

/// Metadata documents stored at the root of a job folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Init,
    Descriptions,
    Completion,
}

impl MetadataKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            MetadataKind::Init => "init.json",
            MetadataKind::Descriptions => "jobDescriptions.json",
            MetadataKind::Completion => "complete.json",
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        [
            MetadataKind::Init,
            MetadataKind::Descriptions,
            MetadataKind::Completion,
        ]
        .into_iter()
        .find(|kind| kind.file_name() == name)
    }
}

pub fn metadata_object_key(folder: &FolderId, kind: MetadataKind) -> String {
    format!("{}{}", job_prefix(folder), kind.file_name())
}

pub fn invoice_name(invoice_number: &str, extension: &str) -> String {
    format!("{}{}", invoice_number, extension)
}

pub fn invoice_object_key(folder: &FolderId, invoice_name: &str) -> String {
    format!("{}{}/{}", job_prefix(folder), INVOICES_SEGMENT, invoice_name)
}

/// Extension of an uploaded file name including the dot, e.g. `.jpg`.
///
/// Empty when the name has none. Anything up to the last path separator is ignored.
pub fn extension_of(file_name: &str) -> &str {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[idx..],
        _ => "",
    }
}

/// What an object under a job folder is, judged by its key alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectClass {
    Metadata(MetadataKind),
    Image {
        position: TyrePosition,
        role: ImageRole,
    },
    Invoice(String),
    Unrecognized,
}

/// Classify `key` relative to the job folder `folder`.
pub fn classify_object_key(folder: &FolderId, key: &str) -> ObjectClass {
    let prefix = job_prefix(folder);
    let Some(relative) = key.strip_prefix(prefix.as_str()) else {
        return ObjectClass::Unrecognized;
    };

    match relative.split_once('/') {
        None => MetadataKind::from_file_name(relative)
            .map(ObjectClass::Metadata)
            .unwrap_or(ObjectClass::Unrecognized),
        Some((INVOICES_SEGMENT, name)) if !name.is_empty() && !name.contains('/') => {
            ObjectClass::Invoice(name.to_string())
        }
        Some((segment, name)) => {
            let Ok(position) = segment.parse::<TyrePosition>() else {
                return ObjectClass::Unrecognized;
            };
            if position.as_str() != segment || name.contains('/') {
                return ObjectClass::Unrecognized;
            }
            [ImageRole::Pre, ImageRole::Post]
                .into_iter()
                .find(|role| name.starts_with(role.object_stem()))
                .map(|role| ObjectClass::Image { position, role })
                .unwrap_or(ObjectClass::Unrecognized)
        }
    }
}

/// Folder name of a virtual folder entry directly under [`JOBS_ROOT`].
pub fn folder_name_of(listing_key: &str) -> Option<&str> {
    listing_key
        .strip_prefix(JOBS_ROOT)?
        .strip_suffix('/')
        .filter(|name| !name.is_empty() && !name.contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_folder_id_format() {
        assert_eq!(
            folder_id("AB12CDE", date(2024, 3, 7)).as_str(),
            "AB12CDE-20240307"
        );
    }

    #[test]
    fn test_folder_id_round_trip() {
        for (reg, d) in [
            ("AB12CDE", date(2024, 1, 1)),
            ("X", date(1999, 12, 31)),
            ("LONGREG123", date(2030, 2, 28)),
        ] {
            let id = folder_id(reg, d);
            assert_eq!(parse_folder_id(id.as_str()).unwrap(), (reg.to_string(), d));
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "AB12CDE",
            "AB12CDE-2024011",
            "AB12CDE-202401011",
            "AB12CDE-20241301",
            "AB12CDE-2024O101",
            "-20240101",
            "AB-12-20240101",
        ] {
            assert!(parse_folder_id(bad).is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_image_key() {
        let folder = folder_id("AB12CDE", date(2024, 1, 1));
        assert_eq!(
            image_object_key(&folder, TyrePosition::FrontLeft, ImageRole::Pre, ".jpg"),
            "jobs/AB12CDE-20240101/front-left/preImage.jpg"
        );
        assert_eq!(
            image_object_key(&folder, TyrePosition::Spare, ImageRole::Post, ""),
            "jobs/AB12CDE-20240101/spare/postImage"
        );
    }

    #[test]
    fn test_metadata_and_invoice_keys() {
        let folder = folder_id("AB12CDE", date(2024, 1, 1));
        assert_eq!(
            metadata_object_key(&folder, MetadataKind::Init),
            "jobs/AB12CDE-20240101/init.json"
        );
        assert_eq!(
            metadata_object_key(&folder, MetadataKind::Descriptions),
            "jobs/AB12CDE-20240101/jobDescriptions.json"
        );
        assert_eq!(
            invoice_object_key(&folder, &invoice_name("INV-7", ".pdf")),
            "jobs/AB12CDE-20240101/invoices/INV-7.pdf"
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), ".JPG");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
        assert_eq!(extension_of("C:\\cam\\img.png"), ".png");
        assert_eq!(extension_of("dir.d/file"), "");
    }

    #[test]
    fn test_classify() {
        let folder = folder_id("AB12CDE", date(2024, 1, 1));
        assert_eq!(
            classify_object_key(&folder, "jobs/AB12CDE-20240101/init.json"),
            ObjectClass::Metadata(MetadataKind::Init)
        );
        assert_eq!(
            classify_object_key(&folder, "jobs/AB12CDE-20240101/rear-right/postImage.png"),
            ObjectClass::Image {
                position: TyrePosition::RearRight,
                role: ImageRole::Post
            }
        );
        assert_eq!(
            classify_object_key(&folder, "jobs/AB12CDE-20240101/invoices/INV-1.pdf"),
            ObjectClass::Invoice("INV-1.pdf".to_string())
        );
        for ignored in [
            "jobs/AB12CDE-20240101/notes.txt",
            "jobs/AB12CDE-20240101/middle/preImage.jpg",
            "jobs/AB12CDE-20240101/spare/thumbnail.jpg",
            "jobs/AB12CDE-20240101/spare/deep/preImage.jpg",
            "jobs/OTHER-20240101/init.json",
        ] {
            assert_eq!(
                classify_object_key(&folder, ignored),
                ObjectClass::Unrecognized,
                "{}",
                ignored
            );
        }
    }

    #[test]
    fn test_validate_segment() {
        assert!(validate_segment("AB12CDE").is_ok());
        assert!(validate_segment("AB-12").is_ok());
        for bad in ["", " ", "AB/12", " AB12", "..", "a\\b"] {
            assert!(validate_segment(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_folder_name_of() {
        assert_eq!(folder_name_of("jobs/AB12CDE-20240101/"), Some("AB12CDE-20240101"));
        assert_eq!(folder_name_of("jobs/stray.json"), None);
        assert_eq!(folder_name_of("other/AB12CDE-20240101/"), None);
    }
}
