use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Decoded JSON object returned by every endpoint.
pub type Payload = Map<String, Value>;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

/// Decode the `result` member of a payload into a typed model.
pub fn parse_result<T: DeserializeOwned>(payload: &Payload) -> serde_json::Result<T> {
    let envelope: Envelope<T> = serde_json::from_value(Value::Object(payload.clone()))?;
    Ok(envelope.result)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunPosition {
    pub azimuth: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunInfo {
    /// Named solar events (`sunrise`, `solarNoon`, `goldenHour`, ...).
    pub sun_times: BTreeMap<String, DateTime<Utc>>,
    pub sun_position: SunPosition,
}

/// Minutes to skin damage per Fitzpatrick skin type; `null` when UV is negligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeExposureTime {
    pub st1: Option<u32>,
    pub st2: Option<u32>,
    pub st3: Option<u32>,
    pub st4: Option<u32>,
    pub st5: Option<u32>,
    pub st6: Option<u32>,
}

/// `result` of the `uv` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvIndex {
    pub uv: f64,
    pub uv_time: DateTime<Utc>,
    pub uv_max: f64,
    pub uv_max_time: DateTime<Utc>,
    pub ozone: f64,
    pub ozone_time: DateTime<Utc>,
    pub safe_exposure_time: SafeExposureTime,
    pub sun_info: SunInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvForecastEntry {
    pub uv: f64,
    pub uv_time: DateTime<Utc>,
    pub sun_position: SunPosition,
}

/// `result` of the `forecast` endpoint.
pub type UvForecast = Vec<UvForecastEntry>;

/// `result` of the `protection` endpoint. All fields are null when no
/// protection is needed during the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionWindow {
    pub from_time: Option<DateTime<Utc>>,
    pub from_uv: Option<f64>,
    pub to_time: Option<DateTime<Utc>>,
    pub to_uv: Option<f64>,
}

/// `result` of the `stat` endpoint: request counters keyed by period name.
pub type ApiStatistics = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture must be an object"),
        }
    }

    #[test]
    fn parses_protection_window() {
        let p = payload(json!({
            "result": {
                "from_time": "2018-07-30T15:17:49.750Z",
                "from_uv": 3.2509,
                "to_time": "2018-07-30T22:47:49.750Z",
                "to_uv": 3.6483
            }
        }));

        let window: ProtectionWindow = parse_result(&p).unwrap();
        assert_eq!(window.from_uv, Some(3.2509));
        assert_eq!(
            window.to_time.unwrap().to_rfc3339(),
            "2018-07-30T22:47:49.750+00:00"
        );
    }

    #[test]
    fn empty_protection_window_is_all_none() {
        let p = payload(json!({
            "result": { "from_time": null, "from_uv": null, "to_time": null, "to_uv": null }
        }));

        let window: ProtectionWindow = parse_result(&p).unwrap();
        assert!(window.from_time.is_none());
        assert!(window.to_uv.is_none());
    }

    #[test]
    fn parses_forecast_entries() {
        let p = payload(json!({
            "result": [
                {
                    "uv": 0,
                    "uv_time": "2018-07-30T11:57:49.750Z",
                    "sun_position": { "azimuth": -2.0081567900835937, "altitude": -0.011856950133816461 }
                },
                {
                    "uv": 0.2446,
                    "uv_time": "2018-07-30T12:57:49.750Z",
                    "sun_position": { "azimuth": -1.845666592871966, "altitude": 0.1764062658258758 }
                }
            ]
        }));

        let forecast: UvForecast = parse_result(&p).unwrap();
        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast[1].uv, 0.2446);
    }

    #[test]
    fn missing_result_is_an_error() {
        let p = payload(json!({ "error": "nope" }));
        assert!(parse_result::<ProtectionWindow>(&p).is_err());
    }
}
