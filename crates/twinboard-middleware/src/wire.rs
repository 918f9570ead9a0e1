//! Explicit byte layout of the cross-board link payloads.
//!
//! Frames are packed field by field in declaration order with no padding,
//! little-endian, using `bytes` rather than any in-memory struct layout, so
//! the two boards may differ in compiler, word size or alignment rules.
//!
//! Mode enums occupy four bytes (`u32` LE), which is how the firmware on the
//! other end lays out a C enum inside a packed struct.
//!
//! | Payload | Layout | Bytes |
//! |---|---|---|
//! | [`GimbalYawCommand`] | `yaw f32, up_yaw f32, up_speed f32, is_init u8, gimbal_mode u32` | 17 |
//! | [`GimbalPitchCommand`] | `pitch f32, gimbal_mode u32` | 8 |
//! | [`UplinkFrame`] | `yaw_cmd, yaw f32, yaw_speed f32` | 25 |
//! | [`DownlinkFrame`] | `pitch_cmd` | 8 |
//!
//! Start markers, length and checksum belong to the transport.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use twinboard_types::{
    DownlinkFrame, GimbalMode, GimbalPitchCommand, GimbalYawCommand, LinkError, UplinkFrame,
};

/// A payload with a fixed, explicit wire layout.
pub trait WireFrame: Sized {
    /// Exact encoded length in bytes.
    const SIZE: usize;

    /// Append the encoded payload to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Read one payload from the front of `buf`. The caller guarantees at
    /// least [`SIZE`](Self::SIZE) bytes remain.
    fn decode_from(buf: &mut &[u8]) -> Result<Self, LinkError>;

    /// Encode into a fresh buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a complete frame payload.
    ///
    /// # Errors
    ///
    /// [`LinkError::FrameLength`] unless `data` is exactly
    /// [`SIZE`](Self::SIZE) bytes; [`LinkError::InvalidDiscriminant`] or
    /// [`LinkError::NonFinite`] for field values the sender cannot have meant.
    fn decode(data: &[u8]) -> Result<Self, LinkError> {
        if data.len() != Self::SIZE {
            return Err(LinkError::FrameLength {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut buf = data;
        Self::decode_from(&mut buf)
    }
}

fn put_gimbal_mode(buf: &mut BytesMut, mode: GimbalMode) {
    buf.put_u32_le(u32::from(u8::from(mode)));
}

fn get_gimbal_mode(buf: &mut &[u8]) -> Result<GimbalMode, LinkError> {
    let raw = buf.get_u32_le();
    u8::try_from(raw)
        .ok()
        .and_then(|byte| GimbalMode::try_from(byte).ok())
        .ok_or(LinkError::InvalidDiscriminant {
            field: "gimbal_mode",
            value: raw,
        })
}

fn get_finite(buf: &mut &[u8], field: &'static str) -> Result<f32, LinkError> {
    let value = buf.get_f32_le();
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LinkError::NonFinite { field })
    }
}

impl WireFrame for GimbalYawCommand {
    const SIZE: usize = 4 + 4 + 4 + 1 + 4;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_f32_le(self.yaw);
        buf.put_f32_le(self.up_yaw);
        buf.put_f32_le(self.up_speed);
        buf.put_u8(self.is_init);
        put_gimbal_mode(buf, self.gimbal_mode);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, LinkError> {
        Ok(Self {
            yaw: get_finite(buf, "yaw")?,
            up_yaw: get_finite(buf, "up_yaw")?,
            up_speed: get_finite(buf, "up_speed")?,
            is_init: buf.get_u8(),
            gimbal_mode: get_gimbal_mode(buf)?,
        })
    }
}

impl WireFrame for GimbalPitchCommand {
    const SIZE: usize = 4 + 4;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_f32_le(self.pitch);
        put_gimbal_mode(buf, self.gimbal_mode);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, LinkError> {
        Ok(Self {
            pitch: get_finite(buf, "pitch")?,
            gimbal_mode: get_gimbal_mode(buf)?,
        })
    }
}

impl WireFrame for UplinkFrame {
    const SIZE: usize = GimbalYawCommand::SIZE + 4 + 4;

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        self.yaw_cmd.encode(buf);
        buf.put_f32_le(self.yaw);
        buf.put_f32_le(self.yaw_speed);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, LinkError> {
        Ok(Self {
            yaw_cmd: GimbalYawCommand::decode_from(buf)?,
            yaw: get_finite(buf, "yaw")?,
            yaw_speed: get_finite(buf, "yaw_speed")?,
        })
    }
}

impl WireFrame for DownlinkFrame {
    const SIZE: usize = GimbalPitchCommand::SIZE;

    fn encode(&self, buf: &mut BytesMut) {
        self.pitch_cmd.encode(buf);
    }

    fn decode_from(buf: &mut &[u8]) -> Result<Self, LinkError> {
        Ok(Self {
            pitch_cmd: GimbalPitchCommand::decode_from(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_uplink() -> UplinkFrame {
        UplinkFrame {
            yaw_cmd: GimbalYawCommand {
                yaw: 12.5,
                up_yaw: -3.25,
                up_speed: 0.75,
                is_init: 1,
                gimbal_mode: GimbalMode::Gyro,
            },
            yaw: 181.0,
            yaw_speed: -42.0,
        }
    }

    #[test]
    fn frame_sizes_match_packed_layout() {
        assert_eq!(GimbalYawCommand::SIZE, 17);
        assert_eq!(UplinkFrame::SIZE, 25);
        assert_eq!(DownlinkFrame::SIZE, 8);
        assert_eq!(sample_uplink().to_bytes().len(), UplinkFrame::SIZE);
    }

    #[test]
    fn uplink_roundtrip_is_field_for_field_identical() {
        let frame = sample_uplink();
        let bytes = frame.to_bytes();
        let back = UplinkFrame::decode(&bytes).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn uplink_layout_is_little_endian_in_field_order() {
        let bytes = sample_uplink().to_bytes();
        assert_eq!(&bytes[0..4], &12.5f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-3.25f32).to_le_bytes());
        assert_eq!(&bytes[8..12], &0.75f32.to_le_bytes());
        assert_eq!(bytes[12], 1);
        assert_eq!(&bytes[13..17], &2u32.to_le_bytes());
        assert_eq!(&bytes[17..21], &181.0f32.to_le_bytes());
        assert_eq!(&bytes[21..25], &(-42.0f32).to_le_bytes());
    }

    /// Bytes assembled by hand, as a board with different alignment rules
    /// would produce them, decode to the intended values.
    #[test]
    fn downlink_decodes_hand_built_bytes() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(-7.5f32).to_le_bytes());
        raw.extend_from_slice(&1u32.to_le_bytes());
        let frame = DownlinkFrame::decode(&raw).unwrap();
        assert_eq!(frame.pitch_cmd.pitch, -7.5);
        assert_eq!(frame.pitch_cmd.gimbal_mode, GimbalMode::Free);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = UplinkFrame::decode(&[0u8; 24]).unwrap_err();
        assert_eq!(
            err,
            LinkError::FrameLength {
                expected: 25,
                actual: 24
            }
        );
    }

    #[test]
    fn invalid_mode_is_rejected() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0.0f32.to_le_bytes());
        raw.extend_from_slice(&9u32.to_le_bytes());
        assert_eq!(
            DownlinkFrame::decode(&raw).unwrap_err(),
            LinkError::InvalidDiscriminant {
                field: "gimbal_mode",
                value: 9
            }
        );
    }

    #[test]
    fn nan_angle_is_rejected() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&f32::NAN.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            DownlinkFrame::decode(&raw),
            Err(LinkError::NonFinite { field: "pitch" })
        ));
    }
}
