use std::{io::Write, thread, time::Duration};

use common::{packet::SetAnglePacket, physical::ServoAngle};
use serialport::SerialPort;
use tracing::{debug, error, info, instrument, warn};

use crate::internals::core::ports::{ActuatorError, AngleActuator};

/// Drives one servo channel on the firmware board by writing
/// postcard-encoded `SetAngle` packets to a serial port. Hobby servos
/// cannot report their position, so the last commanded angle is tracked
/// here, starting from `home_angle`.
pub struct SerialServoActuator<W: Write + Send = Box<dyn SerialPort>> {
    port: W,
    channel: u8,
    angle: i32,
}

impl SerialServoActuator<Box<dyn SerialPort>> {
    /// Open `path` and drive `channel`.
    #[instrument(skip_all, fields(path = %path, channel = channel))]
    pub fn open(
        path: &str,
        baud_rate: u32,
        channel: u8,
        home_angle: i32,
    ) -> Result<Self, ActuatorError> {
        let port = match serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(1000))
            .open()
        {
            Err(e) => {
                error!("Failed to open servo port. Error: {}", e);
                return Err(e.into());
            }
            Ok(port) => port,
        };
        info!("Opened servo port.");
        Ok(Self::new(port, channel, home_angle))
    }
}

impl<W: Write + Send> SerialServoActuator<W> {
    pub fn new(port: W, channel: u8, home_angle: i32) -> Self {
        Self {
            port,
            channel,
            angle: home_angle,
        }
    }

    fn write_packet(&mut self, angle: ServoAngle, pause: Duration) -> Result<usize, ActuatorError> {
        let settle_ms = pause.as_millis().min(u16::MAX as u128) as u16;
        let packet = SetAnglePacket::new_packet(self.channel, angle, settle_ms);
        let buffer = match postcard::to_stdvec(&packet) {
            Err(e) => {
                warn!("Failed to encode packet to byte array. Error: {}", e);
                return Err(e.into());
            }
            Ok(buffer) => buffer,
        };
        match self.port.write_all(&buffer).and_then(|_| self.port.flush()) {
            Err(e) => {
                error!("Failed to write byte buffer to port. Error: {}", e);
                Err(e.into())
            }
            Ok(_) => {
                debug!("Successfully wrote {} bytes to port.", buffer.len());
                Ok(buffer.len())
            }
        }
    }
}

impl<W: Write + Send> AngleActuator for SerialServoActuator<W> {
    fn current_angle(&mut self) -> Result<i32, ActuatorError> {
        Ok(self.angle)
    }

    fn set_angle(&mut self, angle: i32, pause: Duration) -> Result<(), ActuatorError> {
        let servo_angle =
            ServoAngle::try_from(angle).map_err(|_| ActuatorError::OutOfRange(angle))?;
        self.write_packet(servo_angle, pause)?;
        self.angle = angle;
        thread::sleep(pause);
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use common::packet::Packet;

    use super::*;

    #[test]
    fn test_writes_set_angle_packet() {
        let mut actuator = SerialServoActuator::new(Vec::new(), 2, 90);
        actuator
            .set_angle(100, Duration::from_millis(3))
            .expect("Failed to set angle");

        let (packet, rest) =
            postcard::take_from_bytes::<Packet>(&actuator.port).expect("Failed to decode packet");
        assert!(rest.is_empty());
        assert_eq!(
            packet,
            SetAnglePacket::new_packet(2, ServoAngle::try_from(100).expect("Bad angle"), 3)
        );
        assert_eq!(actuator.current_angle().expect("No angle"), 100);
    }

    #[test]
    fn test_rejects_angle_the_servo_cannot_reach() {
        let mut actuator = SerialServoActuator::new(Vec::new(), 0, 180);
        let result = actuator.set_angle(181, Duration::ZERO);

        assert!(matches!(result, Err(ActuatorError::OutOfRange(181))));
        assert!(actuator.port.is_empty());
        assert_eq!(actuator.current_angle().expect("No angle"), 180);
    }
}
