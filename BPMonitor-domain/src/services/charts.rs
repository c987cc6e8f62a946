use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::blood_pressure::{BloodPressureReading, CategoryCount};
use crate::services::insights::category_distribution;

pub const SYSTOLIC_COLOR: &str = "red";
pub const DIASTOLIC_COLOR: &str = "blue";
pub const HEART_RATE_COLOR: &str = "green";

/// Fixed range of the heart rate axis
pub const HEART_RATE_AXIS: (u32, u32) = (30, 180);

/// Which y axis a series is plotted against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartAxis {
    /// Blood pressure in mmHg
    Primary,
    /// Heart rate in bpm
    Secondary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ChartPoint {
    /// `YYYY-MM-DD HH:MM`
    pub timestamp: String,
    pub value: u32,
}

/// One plotted line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    pub axis: ChartAxis,
    pub points: Vec<ChartPoint>,
}

/// Horizontal dashed line marking a threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReferenceLine {
    pub label: String,
    pub value: u32,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AxisRange {
    pub label: String,
    pub min: u32,
    pub max: u32,
}

/// Readings over time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TrendChart {
    pub title: String,
    pub series: Vec<ChartSeries>,
    pub reference_lines: Vec<ReferenceLine>,
    pub primary_axis: AxisRange,
    /// Present only when at least one reading has a heart rate
    pub secondary_axis: Option<AxisRange>,
}

/// Bar chart of readings per category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DistributionChart {
    pub title: String,
    pub bars: Vec<CategoryCount>,
}

/// Everything the analytics page draws
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ChartBundle {
    pub trend: TrendChart,
    pub distribution: DistributionChart,
}

fn series(name: &str, color: &str, axis: ChartAxis, points: Vec<ChartPoint>) -> ChartSeries {
    ChartSeries {
        name: name.to_string(),
        color: color.to_string(),
        axis,
        points,
    }
}

/// Build the trend chart, oldest reading first
pub fn trend_chart(readings: &[BloodPressureReading]) -> TrendChart {
    let mut sorted: Vec<&BloodPressureReading> = readings.iter().collect();
    sorted.sort_by_key(|r| (r.taken_at(), r.id));

    let stamp = |r: &BloodPressureReading| r.taken_at().format("%Y-%m-%d %H:%M").to_string();

    let systolic: Vec<ChartPoint> = sorted
        .iter()
        .map(|&r| ChartPoint { timestamp: stamp(r), value: r.systolic })
        .collect();
    let diastolic: Vec<ChartPoint> = sorted
        .iter()
        .map(|&r| ChartPoint { timestamp: stamp(r), value: r.diastolic })
        .collect();
    let heart_rate: Vec<ChartPoint> = sorted
        .iter()
        .filter_map(|&r| r.heart_rate.map(|value| ChartPoint { timestamp: stamp(r), value }))
        .collect();

    let mut all_series = vec![
        series("Systolic", SYSTOLIC_COLOR, ChartAxis::Primary, systolic),
        series("Diastolic", DIASTOLIC_COLOR, ChartAxis::Primary, diastolic),
    ];

    let secondary_axis = if heart_rate.is_empty() {
        None
    } else {
        all_series.push(series("Heart Rate", HEART_RATE_COLOR, ChartAxis::Secondary, heart_rate));
        Some(AxisRange {
            label: "Heart Rate (bpm)".to_string(),
            min: HEART_RATE_AXIS.0,
            max: HEART_RATE_AXIS.1,
        })
    };

    let title = match sorted.first() {
        Some(first) if sorted.iter().all(|r| r.profile_id == first.profile_id) => {
            format!("Blood Pressure Trends - {}", first.profile_name)
        }
        _ => "Blood Pressure Trends".to_string(),
    };

    TrendChart {
        title,
        series: all_series,
        reference_lines: vec![
            ReferenceLine {
                label: "Systolic Threshold (120)".to_string(),
                value: 120,
                color: SYSTOLIC_COLOR.to_string(),
            },
            ReferenceLine {
                label: "Diastolic Threshold (80)".to_string(),
                value: 80,
                color: DIASTOLIC_COLOR.to_string(),
            },
        ],
        primary_axis: pressure_axis(readings),
        secondary_axis,
    }
}

// Padded to the nearest ten and always wide enough to show both reference lines.
fn pressure_axis(readings: &[BloodPressureReading]) -> AxisRange {
    let low = readings.iter().map(|r| r.diastolic).min().unwrap_or(80).min(80);
    let high = readings.iter().map(|r| r.systolic).max().unwrap_or(120).max(120);

    AxisRange {
        label: "Blood Pressure (mmHg)".to_string(),
        min: (low.saturating_sub(10) / 10) * 10,
        max: ((high + 10 + 9) / 10) * 10,
    }
}

/// Build the category bar chart
pub fn distribution_chart(readings: &[BloodPressureReading]) -> DistributionChart {
    DistributionChart {
        title: "Blood Pressure Category Distribution".to_string(),
        bars: category_distribution(readings),
    }
}

pub fn chart_bundle(readings: &[BloodPressureReading]) -> ChartBundle {
    ChartBundle {
        trend: trend_chart(readings),
        distribution: distribution_chart(readings),
    }
}
