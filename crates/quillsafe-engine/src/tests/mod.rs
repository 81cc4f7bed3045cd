use chrono::{NaiveDate, NaiveDateTime};
use quillsafe_config::Config;
use tempfile::TempDir;

/// Create a temporary storage directory
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// Config rooted in a temporary directory
pub fn test_config(dir: &TempDir) -> Config {
    Config::with_storage_root(dir.path().join("data"))
}

pub fn minute(year: i32, month: u32, day: u32, hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}
