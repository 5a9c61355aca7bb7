//! Request and response types for Audi Connect endpoints

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Vehicle Types
// =============================================================================

/// Vehicle registered for the current account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vin: String,
    #[serde(default)]
    pub csid: Option<String>,
    #[serde(default, alias = "shortName")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_year: Option<serde_json::Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Vehicle management listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclesResponse {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

// =============================================================================
// Status Report Types
// =============================================================================

/// State of an asynchronous vehicle request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    #[serde(rename = "request_in_progress")]
    InProgress,
    #[serde(rename = "request_successful")]
    Successful,
    #[serde(rename = "request_fail", alias = "request_failed")]
    Failed,
    #[serde(other)]
    Unknown,
}

impl RequestState {
    /// Check if the request is still being processed by the vehicle
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if the request completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Successful)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InProgress => "in progress",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Status of a vehicle request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatus {
    pub status: RequestState,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Envelope of a job status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatusResponse {
    pub request_status_response: RequestStatus,
}

/// Reply to a request for fresh vehicle data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentVehicleDataResponse {
    #[serde(rename = "CurrentVehicleDataResponse")]
    pub response: CurrentVehicleData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVehicleData {
    pub request_id: String,
    #[serde(default)]
    pub vin: Option<String>,
}

impl CurrentVehicleDataResponse {
    pub fn request_id(&self) -> &str {
        &self.response.request_id
    }
}

/// Vehicle status report (stored or requested)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDataResponse {
    #[serde(
        rename = "StoredVehicleDataResponse",
        alias = "CurrentVehicleDataByRequestResponse"
    )]
    pub response: VehicleData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleData {
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub vehicle_data: VehicleDataSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleDataSet {
    #[serde(default)]
    pub data: Vec<DataGroup>,
}

/// Group of related status fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataGroup {
    pub id: String,
    #[serde(default)]
    pub field: Vec<DataField>,
}

/// Single status field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataField {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub text_id: Option<String>,
    #[serde(default)]
    pub ts_car_sent_utc: Option<String>,
}

impl VehicleDataResponse {
    /// All fields across every group
    pub fn fields(&self) -> impl Iterator<Item = &DataField> {
        self.response
            .vehicle_data
            .data
            .iter()
            .flat_map(|group| group.field.iter())
    }

    /// Look up a field by its ID (e.g. `0x0101010002` for mileage)
    pub fn field(&self, id: &str) -> Option<&DataField> {
        self.fields().find(|f| f.id.eq_ignore_ascii_case(id))
    }
}

// =============================================================================
// Lock/Unlock Types
// =============================================================================

/// Remote lock/unlock action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    Unlock,
}

impl LockAction {
    /// Operation name, as used in the action body and S-PIN request
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }

    /// XML body accepted by the lock/unlock service
    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rluAction xmlns=\"http://audi.de/connect/rlu\"><action>{}</action></rluAction>",
            self.as_str()
        )
    }
}

/// Reply to a lock/unlock action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RluActionResponse {
    pub rlu_action_response: RluAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RluAction {
    pub request_id: String,
    #[serde(default)]
    pub vin: Option<String>,
}

// =============================================================================
// Climate Types
// =============================================================================

/// Heater source for pre-trip climatisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaterSource {
    Auxiliary,
    Automatic,
    Electric,
}

/// Climatisation action request
#[derive(Debug, Clone, Serialize)]
pub struct ClimaRequest {
    pub action: ClimaAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClimaAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ClimaSettings>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimaSettings {
    pub heater_source: HeaterSource,
}

impl ClimaRequest {
    /// Start climatisation with the given heater source
    pub fn start(source: HeaterSource) -> Self {
        Self {
            action: ClimaAction {
                action_type: "startClimatisation".to_string(),
                settings: Some(ClimaSettings {
                    heater_source: source,
                }),
            },
        }
    }

    /// Stop climatisation
    pub fn stop() -> Self {
        Self {
            action: ClimaAction {
                action_type: "stopClimatisation".to_string(),
                settings: None,
            },
        }
    }
}

// =============================================================================
// Honk & Flash Types
// =============================================================================

/// Honk and flash operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HonkFlashMode {
    FlashOnly,
    HonkAndFlash,
    HonkOnly,
}

/// Position of the user issuing the request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UserPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Honk/flash request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HonkFlashRequest {
    pub honk_and_flash_request: HonkFlashAction,
}

/// Honk/flash action as sent and as echoed by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HonkFlashAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    pub service_duration: u32,
    pub service_operation_code: HonkFlashMode,
    #[serde(default)]
    pub user_position: UserPosition,
}

impl HonkFlashRequest {
    pub fn new(mode: HonkFlashMode, seconds: u32) -> Self {
        Self {
            honk_and_flash_request: HonkFlashAction {
                id: None,
                last_updated: None,
                service_duration: seconds,
                service_operation_code: mode,
                user_position: UserPosition::default(),
            },
        }
    }
}

/// Status of a honk/flash action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HonkFlashStatusResponse {
    pub status: HonkFlashStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HonkFlashStatus {
    pub status_code: String,
    #[serde(default)]
    pub status_reason: Option<String>,
}

// =============================================================================
// Trip Statistics Types
// =============================================================================

/// Trip statistics period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripType {
    ShortTerm,
    LongTerm,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "shortTerm",
            Self::LongTerm => "longTerm",
        }
    }
}

// =============================================================================
// Battery Types
// =============================================================================

/// Battery charge status (EV only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryChargeResponse {
    #[serde(default)]
    pub charger: serde_json::Value,
}

// =============================================================================
// Push Notification Types
// =============================================================================

/// Platform of a push notification subscription
pub const PUSH_PLATFORM_GOOGLE: &str = "google";

/// App ID used for push notification subscriptions
pub const PUSH_APP_ID: &str = "de.audi.mmiapp";
