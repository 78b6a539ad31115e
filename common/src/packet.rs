use serde::{Deserialize, Serialize};

use crate::physical::ServoAngle;

/// Used to communicate with the servo firmware.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    SetAngle(SetAnglePacket),
}

/// Instructs the firmware to drive one servo channel to an angle. The host
/// waits `settle_ms` before issuing the next command so the horn can catch up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SetAnglePacket {
    /// PWM channel the servo is wired to.
    pub channel: u8,

    /// Target position.
    pub angle: ServoAngle,

    /// Time the host will wait for the servo to arrive, for firmware-side
    /// rate limiting.
    pub settle_ms: u16,
}

impl SetAnglePacket {
    /// Used to create a new instance of this struct wrapped in a packet.
    /// Typically what will be used.
    pub fn new_packet(channel: u8, angle: ServoAngle, settle_ms: u16) -> Packet {
        Packet::SetAngle(Self {
            channel,
            angle,
            settle_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_angle_packet_survives_postcard() {
        let angle = ServoAngle::try_from(135).expect("Failed to create angle");
        let packet = SetAnglePacket::new_packet(1, angle, 250);

        let mut buffer = [0u8; 16];
        let used = postcard::to_slice(&packet, &mut buffer).expect("Failed to encode packet");
        let (decoded, rest) =
            postcard::take_from_bytes::<Packet>(used).expect("Failed to decode packet");

        assert_eq!(decoded, packet);
        assert!(rest.is_empty());
    }
}
