use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use bp_monitor_domain::entities::{ReadingStatistics, TimeRange};
use bp_monitor_domain::sms::SmsReceipt;

/// Filter for the reading list
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ReadingListParams {
    /// Only readings of this profile
    pub profile_id: Option<i64>,
}

/// Statistics for a profile (or every profile) over a time range
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    pub profile_id: Option<i64>,
    pub range: TimeRange,
    /// Null when the selection holds no readings
    pub statistics: Option<ReadingStatistics>,
}

/// Where to send a reading alert; defaults to the caller's mobile number
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AlertRequest {
    pub mobile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    pub success: bool,
    pub message: String,
    pub receipt: SmsReceipt,
}
