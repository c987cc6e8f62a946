use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Color used for readings whose category cannot be recognised
pub const UNKNOWN_CATEGORY_COLOR: &str = "#757575";

/// Blood pressure category based on measurements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
pub enum BloodPressureCategory {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Elevated")]
    Elevated,
    #[serde(rename = "Hypertension Stage 1")]
    Hypertension1,
    #[serde(rename = "Hypertension Stage 2")]
    Hypertension2,
    #[serde(rename = "Hypertensive Crisis")]
    HypertensiveCrisis,
}

impl BloodPressureCategory {
    /// Every category, mildest first
    pub const ALL: [BloodPressureCategory; 5] = [
        BloodPressureCategory::Normal,
        BloodPressureCategory::Elevated,
        BloodPressureCategory::Hypertension1,
        BloodPressureCategory::Hypertension2,
        BloodPressureCategory::HypertensiveCrisis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodPressureCategory::Normal => "Normal",
            BloodPressureCategory::Elevated => "Elevated",
            BloodPressureCategory::Hypertension1 => "Hypertension Stage 1",
            BloodPressureCategory::Hypertension2 => "Hypertension Stage 2",
            BloodPressureCategory::HypertensiveCrisis => "Hypertensive Crisis",
        }
    }

    /// Display color for charts and badges
    pub fn color(&self) -> &'static str {
        match self {
            BloodPressureCategory::Normal => "#4CAF50",
            BloodPressureCategory::Elevated => "#FFEB3B",
            BloodPressureCategory::Hypertension1 => "#FF9800",
            BloodPressureCategory::Hypertension2 => "#F44336",
            BloodPressureCategory::HypertensiveCrisis => "#B71C1C",
        }
    }

    /// Short explanation shown next to a reading
    pub fn description(&self) -> &'static str {
        match self {
            BloodPressureCategory::Normal => {
                "Your blood pressure is in the healthy range. Keep up the habits that got you here."
            }
            BloodPressureCategory::Elevated => {
                "Your blood pressure is slightly above normal. Lifestyle changes now can keep it from progressing to hypertension."
            }
            BloodPressureCategory::Hypertension1 => {
                "Your blood pressure is elevated. Talk to your doctor about lifestyle changes and whether medication is needed."
            }
            BloodPressureCategory::Hypertension2 => {
                "Your blood pressure is significantly elevated. Consult your doctor promptly about treatment."
            }
            BloodPressureCategory::HypertensiveCrisis => {
                "This is a medical emergency. Contact your doctor immediately or go to the emergency room."
            }
        }
    }

    /// Practical advice for the category
    pub fn advice(&self) -> &'static [&'static str] {
        match self {
            BloodPressureCategory::Normal => &[
                "Regular physical activity",
                "Balanced diet low in sodium",
                "Maintaining a healthy weight",
                "Limited alcohol consumption",
            ],
            BloodPressureCategory::Elevated => &[
                "Reduce sodium intake",
                "Regular physical activity",
                "Limit alcohol",
                "Manage stress",
            ],
            BloodPressureCategory::Hypertension1 => &[
                "Lifestyle modifications",
                "Potential medication",
                "Regular monitoring",
                "Heart-healthy diet",
            ],
            BloodPressureCategory::Hypertension2 => &[
                "Medication options",
                "Strict dietary changes",
                "Regular exercise regimen",
                "Frequent blood pressure monitoring",
            ],
            BloodPressureCategory::HypertensiveCrisis => &[
                "Seek care at once if you also have chest pain",
                "Shortness of breath or back pain",
                "Numbness or weakness",
                "Change in vision or difficulty speaking",
            ],
        }
    }

    /// Whether a reading in this category should trigger an alert
    pub fn is_alarming(&self) -> bool {
        matches!(
            self,
            BloodPressureCategory::Hypertension2 | BloodPressureCategory::HypertensiveCrisis
        )
    }
}

impl fmt::Display for BloodPressureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodPressureCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BloodPressureCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown blood pressure category: {}", s))
    }
}

/// Color for a stored category name, falling back to grey for unknown names
pub fn category_color(name: &str) -> &'static str {
    name.parse::<BloodPressureCategory>()
        .map(|category| category.color())
        .unwrap_or(UNKNOWN_CATEGORY_COLOR)
}

/// Gender of a profile, used to adjust the category thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("Unknown gender: {}", other)),
        }
    }
}

/// A stored blood pressure reading with the profile it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BloodPressureReading {
    pub id: i64,
    pub profile_id: i64,
    /// Name of the profile owner
    pub profile_name: String,
    pub gender: Gender,
    pub age: u32,
    /// Day the reading was taken
    pub date: NaiveDate,
    /// Time of day, `HH:MM`
    #[serde(with = "hour_minute")]
    #[schema(value_type = String, example = "08:30")]
    pub time: NaiveTime,
    /// Systolic blood pressure (the higher number)
    pub systolic: u32,
    /// Diastolic blood pressure (the lower number)
    pub diastolic: u32,
    /// Optional heart rate in beats per minute
    pub heart_rate: Option<u32>,
    pub category: BloodPressureCategory,
    pub created_at: DateTime<Utc>,
}

impl BloodPressureReading {
    /// Date and time combined, used for ordering chart points
    pub fn taken_at(&self) -> chrono::NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Request payload for recording a reading
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReadingRequest {
    /// Systolic blood pressure in mmHg
    #[validate(range(min = 70, max = 250, message = "Systolic must be between 70 and 250"))]
    pub systolic: u32,

    /// Diastolic blood pressure in mmHg
    #[validate(range(min = 40, max = 150, message = "Diastolic must be between 40 and 150"))]
    pub diastolic: u32,

    /// Heart rate in beats per minute
    #[validate(range(min = 30, max = 220, message = "Heart rate must be between 30 and 220"))]
    pub heart_rate: Option<u32>,

    /// Day of the reading, today when omitted
    pub date: Option<NaiveDate>,

    /// Time of the reading as `HH:MM`, now when omitted
    #[schema(example = "08:30")]
    pub time: Option<String>,
}

/// Count of readings in one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CategoryCount {
    pub category: BloodPressureCategory,
    pub count: usize,
    pub color: String,
}

/// Summary statistics over a set of readings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReadingStatistics {
    pub count: usize,
    pub avg_systolic: f64,
    pub min_systolic: u32,
    pub max_systolic: u32,
    pub avg_diastolic: f64,
    pub min_diastolic: u32,
    pub max_diastolic: u32,
    /// Zero when no reading carries a heart rate
    pub avg_heart_rate: f64,
    pub min_heart_rate: u32,
    pub max_heart_rate: u32,
    /// Category of the average reading
    pub average_category: BloodPressureCategory,
    pub category_counts: Vec<CategoryCount>,
}

/// Window of history used by analytics
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl TimeRange {
    pub fn days(&self) -> Option<i64> {
        match self {
            TimeRange::All => None,
            TimeRange::Last7Days => Some(7),
            TimeRange::Last30Days => Some(30),
            TimeRange::Last90Days => Some(90),
        }
    }

    /// First date included in the range
    pub fn since(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.days().map(|days| today - Duration::days(days))
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "all time" => Ok(TimeRange::All),
            "7d" | "last 7 days" => Ok(TimeRange::Last7Days),
            "30d" | "last 30 days" => Ok(TimeRange::Last30Days),
            "90d" | "last 90 days" => Ok(TimeRange::Last90Days),
            other => Err(format!("Unknown time range: {}", other)),
        }
    }
}

/// Analytics query parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsQuery {
    /// Restrict to one profile; all profiles when omitted
    pub profile_id: Option<i64>,
    /// `all`, `7d`, `30d` or `90d`
    #[serde(default)]
    pub range: TimeRange,
}

mod hour_minute {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}
