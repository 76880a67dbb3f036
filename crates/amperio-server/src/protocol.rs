//! Wire protocol for the WebSocket control link.
//!
//! JSON object messages keyed on `type`, camelCase throughout. The front
//! end sends [`Request`]s; every request produces exactly one [`Response`]
//! on the same connection, and telemetry is additionally pushed to all
//! connections while audio runs.

use serde::{Deserialize, Serialize};

/// Incoming control message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Start the audio engine.
    Start,
    /// Stop the audio engine.
    Stop,
    /// Snapshot telemetry.
    GetStats,
    /// Insert an effect into the chain.
    #[serde(rename_all = "camelCase")]
    AddEffect {
        /// Factory type tag.
        effect_type: String,
        /// Client-side pedal identity (logged, not interpreted).
        #[serde(default)]
        pedal_id: String,
        /// Insertion position; negative or missing appends.
        #[serde(default)]
        position: Option<i64>,
        /// Requested effect id; honored when unique. Ids beginning with
        /// `preview-` switch the test tone on.
        #[serde(default)]
        effect_id: Option<String>,
    },
    /// Remove an effect by id.
    #[serde(rename_all = "camelCase")]
    RemoveEffect {
        /// Target effect id.
        effect_id: String,
    },
    /// Clamp and apply a parameter value.
    #[serde(rename_all = "camelCase")]
    SetParameter {
        /// Target effect id.
        effect_id: String,
        /// Parameter wire name.
        parameter: String,
        /// New value (clamped server-side).
        value: f64,
    },
    /// Reorder an effect.
    #[serde(rename_all = "camelCase")]
    MoveEffect {
        /// Target effect id.
        effect_id: String,
        /// Destination index (clamped to the chain end).
        to_position: i64,
    },
    /// Engage or release an effect's bypass.
    #[serde(rename_all = "camelCase")]
    ToggleBypass {
        /// Target effect id.
        effect_id: String,
        /// New bypass state.
        bypassed: bool,
    },
}

/// Outgoing control message.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// Engine lifecycle state.
    Status {
        /// Whether audio is streaming.
        running: bool,
    },
    /// Telemetry snapshot (also pushed every ~100 ms while running).
    #[serde(rename_all = "camelCase")]
    Stats {
        /// Smoothed DSP load percentage.
        cpu: f64,
        /// One buffer of latency in milliseconds.
        latency: f64,
        /// Peak input level in dBFS.
        peak_input: f32,
        /// Peak output level in dBFS.
        peak_output: f32,
    },
    /// Success, optionally carrying the id assigned to a new effect.
    #[serde(rename_all = "camelCase")]
    Ack {
        /// Assigned effect id (only for `addEffect`).
        #[serde(skip_serializing_if = "Option::is_none")]
        effect_id: Option<String>,
    },
    /// Request failed; other in-flight operations are unaffected.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl Response {
    /// Plain `ack` without payload.
    pub fn ack() -> Self {
        Response::Ack { effect_id: None }
    }

    /// `ack` carrying an assigned effect id.
    pub fn ack_with_id(effect_id: impl Into<String>) -> Self {
        Response::Ack {
            effect_id: Some(effect_id.into()),
        }
    }

    /// `error` with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Serialize for the wire. Serialization of these enums cannot fail;
    /// a (theoretical) failure degrades to an error message.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"serialization failure"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tags_are_camel_case() {
        let req: Request = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert!(matches!(req, Request::Start));

        let req: Request = serde_json::from_str(r#"{"type":"getStats"}"#).unwrap();
        assert!(matches!(req, Request::GetStats));
    }

    #[test]
    fn test_add_effect_fields() {
        let req: Request = serde_json::from_str(
            r#"{"type":"addEffect","effectType":"distortion","pedalId":"pedal-3","position":1,"effectId":"preview-1"}"#,
        )
        .unwrap();
        match req {
            Request::AddEffect {
                effect_type,
                pedal_id,
                position,
                effect_id,
            } => {
                assert_eq!(effect_type, "distortion");
                assert_eq!(pedal_id, "pedal-3");
                assert_eq!(position, Some(1));
                assert_eq!(effect_id.as_deref(), Some("preview-1"));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_add_effect_defaults() {
        let req: Request =
            serde_json::from_str(r#"{"type":"addEffect","effectType":"reverb"}"#).unwrap();
        match req {
            Request::AddEffect {
                pedal_id,
                position,
                effect_id,
                ..
            } => {
                assert!(pedal_id.is_empty());
                assert_eq!(position, None);
                assert_eq!(effect_id, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_set_parameter_round_trip() {
        let req: Request = serde_json::from_str(
            r#"{"type":"setParameter","effectId":"fx-1","parameter":"gain","value":42.5}"#,
        )
        .unwrap();
        match req {
            Request::SetParameter {
                effect_id,
                parameter,
                value,
            } => {
                assert_eq!(effect_id, "fx-1");
                assert_eq!(parameter, "gain");
                assert!((value - 42.5).abs() < 1e-12);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_fails_to_parse() {
        assert!(serde_json::from_str::<Request>(r#"{"type":"fooBar"}"#).is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = Response::Status { running: true }.to_json();
        assert_eq!(json, r#"{"type":"status","running":true}"#);
    }

    #[test]
    fn test_stats_wire_format() {
        let json = Response::Stats {
            cpu: 1.5,
            latency: 1.333,
            peak_input: -12.0,
            peak_output: -6.0,
        }
        .to_json();
        assert!(json.starts_with(r#"{"type":"stats","cpu":1.5"#));
        assert!(json.contains("\"peakInput\":-12.0"));
        assert!(json.contains("\"peakOutput\":-6.0"));
    }

    #[test]
    fn test_ack_wire_format() {
        assert_eq!(Response::ack().to_json(), r#"{"type":"ack"}"#);
        assert_eq!(
            Response::ack_with_id("effect-7").to_json(),
            r#"{"type":"ack","effectId":"effect-7"}"#
        );
    }

    #[test]
    fn test_error_wire_format() {
        assert_eq!(
            Response::error("nope").to_json(),
            r#"{"type":"error","message":"nope"}"#
        );
    }
}
