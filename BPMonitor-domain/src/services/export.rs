use chrono::{DateTime, TimeZone};
use thiserror::Error;

use crate::entities::blood_pressure::BloodPressureReading;

/// Column headers of the CSV export
pub const CSV_HEADER: [&str; 9] = [
    "Date",
    "Time",
    "Systolic",
    "Diastolic",
    "Heart Rate",
    "Category",
    "Name",
    "Gender",
    "Age",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export produced invalid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Export buffer error: {0}")]
    Buffer(String),
}

/// Render readings as CSV, in the order given
pub fn export_csv(readings: &[BloodPressureReading]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for reading in readings {
        writer.write_record([
            reading.date.format("%Y-%m-%d").to_string(),
            reading.time.format("%H:%M").to_string(),
            reading.systolic.to_string(),
            reading.diastolic.to_string(),
            reading.heart_rate.map(|hr| hr.to_string()).unwrap_or_default(),
            reading.category.to_string(),
            reading.profile_name.clone(),
            reading.gender.to_string(),
            reading.age.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Download name for an export made at `now`
pub fn export_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("blood_pressure_export_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::blood_pressure::{BloodPressureCategory, Gender};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn reading(name: &str, heart_rate: Option<u32>) -> BloodPressureReading {
        BloodPressureReading {
            id: 1,
            profile_id: 1,
            profile_name: name.to_string(),
            gender: Gender::Male,
            age: 61,
            date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            time: NaiveTime::from_hms_opt(7, 5, 0).unwrap(),
            systolic: 142,
            diastolic: 91,
            heart_rate,
            category: BloodPressureCategory::Hypertension1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_csv_layout() {
        let csv = export_csv(&[reading("Sam", Some(64)), reading("Doe, Jane", None)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Date,Time,Systolic,Diastolic,Heart Rate,Category,Name,Gender,Age");
        assert_eq!(lines[1], "2024-02-29,07:05,142,91,64,Hypertension Stage 1,Sam,Male,61");
        assert_eq!(lines[2], "2024-02-29,07:05,142,91,,Hypertension Stage 1,\"Doe, Jane\",Male,61");
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(export_filename(&now), "blood_pressure_export_20240309_140507.csv");
    }
}
