//! # Topic framing
//!
//! Messages on publish-subscribe sockets are sent as a single frame of the form
//! `"<topic> <json payload>"`. Subscribers filter on the topic prefix using
//! `Socket::set_subscribe()`, then [`decode`] the payload once received.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::fmu::FmuMessage;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while decoding a topic frame.
#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("Frame does not contain a topic separator")]
    MissingSeparator,

    #[error("Expected a message on topic {expected}, found one on {found}")]
    WrongTopic {
        expected: &'static str,
        found: String
    },

    #[error("Could not deserialize the message payload: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode a message into a topic frame.
pub fn encode<M: FmuMessage>(msg: &M) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(msg)?;

    Ok(format!("{} {}", M::TOPIC, payload))
}

/// Split a frame into its topic and payload parts.
pub fn split(frame: &str) -> Result<(&str, &str), TopicError> {
    let mut parts = frame.splitn(2, ' ');

    match (parts.next(), parts.next()) {
        (Some(topic), Some(payload)) if !topic.is_empty() => Ok((topic, payload)),
        _ => Err(TopicError::MissingSeparator)
    }
}

/// Decode a frame into a message, checking that it was sent on the message's topic.
pub fn decode<M: FmuMessage>(frame: &str) -> Result<M, TopicError> {
    let (topic, payload) = split(frame)?;

    if topic != M::TOPIC {
        return Err(TopicError::WrongTopic {
            expected: M::TOPIC,
            found: topic.to_string()
        })
    }

    serde_json::from_str(payload).map_err(TopicError::DeserializeError)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fmu::{OffboardControlMode, TrajectorySetpoint, VehicleControlMode};

    #[test]
    fn test_encode_prefix() {
        let frame = encode(&OffboardControlMode::position_only(42)).unwrap();

        assert!(frame.starts_with("/fmu/in/offboard_control_mode {"));
    }

    #[test]
    fn test_decode() {
        let sp = TrajectorySetpoint {
            timestamp: 7,
            position: [1.0, -2.0, -5.0],
            yaw: 3.0,
            ..Default::default()
        };

        let frame = encode(&sp).unwrap();
        let decoded: TrajectorySetpoint = decode(&frame).unwrap();

        assert_eq!(decoded, sp);
    }

    #[test]
    fn test_decode_wrong_topic() {
        let frame = encode(&OffboardControlMode::position_only(0)).unwrap();

        match decode::<VehicleControlMode>(&frame) {
            Err(TopicError::WrongTopic { expected, found }) => {
                assert_eq!(expected, "/fmu/out/vehicle_control_mode");
                assert_eq!(found, "/fmu/in/offboard_control_mode");
            },
            r => panic!("Expected WrongTopic, got {:?}", r)
        }
    }

    #[test]
    fn test_split_errors() {
        assert!(matches!(split("no_separator"), Err(TopicError::MissingSeparator)));
        assert!(matches!(split(" {}"), Err(TopicError::MissingSeparator)));
        assert!(matches!(
            decode::<VehicleControlMode>("/fmu/out/vehicle_control_mode {not json"),
            Err(TopicError::DeserializeError(_))
        ));
    }
}
