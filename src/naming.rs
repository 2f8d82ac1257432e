//! Output directory naming: `<base>/<YYMMDD_HHMMSS>_<stem>`.
//!
//! The name is only unique to the second. Two sources with the same stem
//! processed within one second share a directory.

use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};

/// `strftime` pattern for the directory timestamp.
pub const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// Output directory for `source` under `base`, stamped with the current local time.
pub fn output_directory(source: &Path, base: &Path) -> PathBuf {
    output_directory_at(source, base, &Local::now())
}

/// Output directory for `source` under `base`, stamped with `at`.
pub fn output_directory_at<Tz>(source: &Path, base: &Path, at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let timestamp = at.format(TIMESTAMP_FORMAT);
    base.join(format!("{}_{}", timestamp, file_stem(source)))
}

/// File name without its extension, or `output` when the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fixed() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn test_name_has_timestamp_and_stem() {
        let dir = output_directory_at(Path::new("./assets/invoice.pdf"), Path::new("test_result"), &fixed());
        assert_eq!(dir, PathBuf::from("test_result/250307_090502_invoice"));
    }

    #[test]
    fn test_different_stems_differ_within_same_second() {
        let at = fixed();
        let a = output_directory_at(Path::new("a/invoice.pdf"), Path::new("out"), &at);
        let b = output_directory_at(Path::new("a/car_numberpad.png"), Path::new("out"), &at);
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_file_one_second_apart_differs() {
        let at = fixed();
        let later = at + Duration::seconds(1);
        let a = output_directory_at(Path::new("scan.pdf"), Path::new("out"), &at);
        let b = output_directory_at(Path::new("scan.pdf"), Path::new("out"), &later);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stem_strips_only_last_extension() {
        assert_eq!(file_stem(Path::new("report.v2.tiff")), "report.v2");
        assert_eq!(file_stem(Path::new("/tmp/인보이스.pdf")), "인보이스");
    }

    #[test]
    fn test_live_name_lives_under_base() {
        let dir = output_directory(Path::new("x.png"), Path::new("base"));
        assert!(dir.starts_with("base"));
        assert!(dir.to_string_lossy().ends_with("_x"));
    }
}
