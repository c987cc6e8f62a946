use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::blood_pressure::{
    BloodPressureCategory, BloodPressureReading, CategoryCount, Gender, ReadingStatistics,
};

/// Offsets subtracted from a reading before it is compared with the thresholds.
///
/// Older people get some headroom; the female offset is negative, which
/// raises the adjusted values instead.
fn threshold_adjustment(gender: Gender, age: u32) -> (i64, i64) {
    let (age_systolic, age_diastolic) = if age > 60 {
        (5, 3)
    } else if age > 50 {
        (3, 2)
    } else {
        (0, 0)
    };

    let (gender_systolic, gender_diastolic) = match gender {
        Gender::Female => (-3, -2),
        Gender::Male => (0, 0),
    };

    (age_systolic + gender_systolic, age_diastolic + gender_diastolic)
}

/// Categorize blood pressure based on measurements, gender and age
pub fn categorize_blood_pressure(
    systolic: u32,
    diastolic: u32,
    gender: Gender,
    age: u32,
) -> BloodPressureCategory {
    let (systolic_offset, diastolic_offset) = threshold_adjustment(gender, age);
    let systolic = i64::from(systolic) - systolic_offset;
    let diastolic = i64::from(diastolic) - diastolic_offset;

    if systolic >= 180 || diastolic >= 120 {
        BloodPressureCategory::HypertensiveCrisis
    } else if systolic >= 140 || diastolic >= 90 {
        BloodPressureCategory::Hypertension2
    } else if (130..140).contains(&systolic) || (80..90).contains(&diastolic) {
        BloodPressureCategory::Hypertension1
    } else if (120..130).contains(&systolic) && diastolic < 80 {
        BloodPressureCategory::Elevated
    } else {
        BloodPressureCategory::Normal
    }
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Summary statistics for a set of readings; `None` when there are none
pub fn calculate_statistics(readings: &[BloodPressureReading]) -> Option<ReadingStatistics> {
    let first = readings.first()?;

    let count = readings.len();
    let systolic_sum: u64 = readings.iter().map(|r| u64::from(r.systolic)).sum();
    let diastolic_sum: u64 = readings.iter().map(|r| u64::from(r.diastolic)).sum();
    let heart_rates: Vec<u32> = readings.iter().filter_map(|r| r.heart_rate).collect();

    let avg_systolic = systolic_sum as f64 / count as f64;
    let avg_diastolic = diastolic_sum as f64 / count as f64;
    let avg_heart_rate = if heart_rates.is_empty() {
        0.0
    } else {
        heart_rates.iter().map(|&hr| f64::from(hr)).sum::<f64>() / heart_rates.len() as f64
    };

    // Demographic adjustment only makes sense when every reading belongs to one person.
    let single_profile = readings.iter().all(|r| r.profile_id == first.profile_id);
    let (gender, age) = if single_profile {
        (first.gender, first.age)
    } else {
        (Gender::Male, 0)
    };
    let average_category = categorize_blood_pressure(
        avg_systolic.round() as u32,
        avg_diastolic.round() as u32,
        gender,
        age,
    );

    Some(ReadingStatistics {
        count,
        avg_systolic: round_one(avg_systolic),
        min_systolic: readings.iter().map(|r| r.systolic).min().unwrap_or(0),
        max_systolic: readings.iter().map(|r| r.systolic).max().unwrap_or(0),
        avg_diastolic: round_one(avg_diastolic),
        min_diastolic: readings.iter().map(|r| r.diastolic).min().unwrap_or(0),
        max_diastolic: readings.iter().map(|r| r.diastolic).max().unwrap_or(0),
        avg_heart_rate: round_one(avg_heart_rate),
        min_heart_rate: heart_rates.iter().copied().min().unwrap_or(0),
        max_heart_rate: heart_rates.iter().copied().max().unwrap_or(0),
        average_category,
        category_counts: category_distribution(readings),
    })
}

/// Number of readings per category, in category order, skipping empty ones
pub fn category_distribution(readings: &[BloodPressureReading]) -> Vec<CategoryCount> {
    BloodPressureCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let count = readings.iter().filter(|r| r.category == category).count();
            (count > 0).then(|| CategoryCount {
                category,
                count,
                color: category.color().to_string(),
            })
        })
        .collect()
}

/// One row of the category reference table
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryGuide {
    pub category: BloodPressureCategory,
    pub systolic: String,
    pub diastolic: String,
    pub color: String,
    pub description: String,
    pub advice: Vec<String>,
}

/// A management tip with its supporting points
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tip {
    pub title: String,
    pub points: Vec<String>,
}

/// Educational content about blood pressure
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EducationalInfo {
    pub understanding: Vec<String>,
    pub categories: Vec<CategoryGuide>,
    pub categories_note: String,
    pub tips: Vec<Tip>,
}

/// Reference table of every category
pub fn category_guides() -> Vec<CategoryGuide> {
    let ranges = [
        ("Less than 120", "Less than 80"),
        ("120-129", "Less than 80"),
        ("130-139", "80-89"),
        ("140 or higher", "90 or higher"),
        ("Higher than 180", "Higher than 120"),
    ];

    BloodPressureCategory::ALL
        .into_iter()
        .zip(ranges)
        .map(|(category, (systolic, diastolic))| CategoryGuide {
            category,
            systolic: systolic.to_string(),
            diastolic: diastolic.to_string(),
            color: category.color().to_string(),
            description: category.description().to_string(),
            advice: category.advice().iter().map(|a| a.to_string()).collect(),
        })
        .collect()
}

fn tip(title: &str, points: &[&str]) -> Tip {
    Tip {
        title: title.to_string(),
        points: points.iter().map(|p| p.to_string()).collect(),
    }
}

/// Content for the education page
pub fn educational_info() -> EducationalInfo {
    EducationalInfo {
        understanding: vec![
            "Blood pressure is the force of blood pushing against the walls of your arteries as your heart pumps.".to_string(),
            "Systolic pressure (upper number) is the pressure when your heart beats and pushes blood through the arteries.".to_string(),
            "Diastolic pressure (lower number) is the pressure when your heart rests between beats.".to_string(),
            "It is written as systolic over diastolic, for example 120/80 mmHg.".to_string(),
            "High blood pressure strains the heart and blood vessels and can lead to heart attack and stroke if left untreated.".to_string(),
        ],
        categories: category_guides(),
        categories_note: "These categories apply to most adults. Children, pregnant women and people with certain medical conditions may have different guidelines.".to_string(),
        tips: vec![
            tip("Maintain a healthy diet", &[
                "Reduce sodium (salt) intake",
                "Eat plenty of fruits, vegetables and whole grains",
                "Limit saturated and trans fats",
                "Consider the DASH eating plan",
            ]),
            tip("Stay physically active", &[
                "Aim for at least 150 minutes of moderate exercise per week",
                "Include both cardio and strength training",
            ]),
            tip("Maintain a healthy weight", &[
                "Even small amounts of weight loss can help lower blood pressure",
            ]),
            tip("Limit alcohol consumption", &[
                "No more than one drink per day for women",
                "No more than two drinks per day for men",
            ]),
            tip("Don't smoke", &["Smoking raises blood pressure and heart rate"]),
            tip("Manage stress", &[
                "Practice relaxation techniques like deep breathing or meditation",
                "Get enough sleep (7-8 hours per night)",
            ]),
            tip("Take medications as prescribed", &[
                "Never skip doses or stop medication without consulting your doctor",
            ]),
            tip("Monitor your blood pressure regularly", &[
                "Keep a log to share with your healthcare provider",
            ]),
        ],
    }
}
