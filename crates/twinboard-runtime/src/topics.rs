//! Topic names shared by the dispatcher, the controllers and the bridge.
//!
//! Outbound link topics (`*_TX`) are written by the local dispatcher and
//! read by the bridge; remote-origin topics (`*_RX`) are written only by
//! the bridge.

pub const CHASSIS_CMD: &str = "chassis_cmd";
pub const GIMBAL_CMD: &str = "gimbal_cmd";
pub const GIMBAL_YAW_CMD: &str = "gimbal_yaw_cmd";
pub const GIMBAL_PITCH_CMD: &str = "gimbal_pitch_cmd";
pub const SHOOT_CMD: &str = "shoot_cmd";

pub const CHASSIS_FEED: &str = "chassis_feed";
pub const GIMBAL_FEED: &str = "gimbal_feed";
pub const SHOOT_FEED: &str = "shoot_feed";

pub const UPLINK_TX: &str = "uplink_tx";
pub const UPLINK_RX: &str = "uplink_rx";
pub const DOWNLINK_TX: &str = "downlink_tx";
pub const DOWNLINK_RX: &str = "downlink_rx";
