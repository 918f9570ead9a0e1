//! Scripted transmitter for the simulated robot.
//!
//! Loops through a fixed drill: drive forward in follow mode, spin up the
//! friction wheels, fire single rounds, burst, then spin in rotate mode.
//! The drill is played on the handheld transmitter or, when the operator is
//! on the video link, as keyboard and mouse. Frames are produced at the
//! transmitter's own rate, independent of the board cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use twinboard_hal::Attitude;
use twinboard_hal::sim::{SimAttitude, SimInput};
use twinboard_types::{KeyMask, OperatorInput, SwitchPosition, VideoLinkInput};

/// Transmitter frame period (about 70 Hz).
pub const FRAME_PERIOD: Duration = Duration::from_millis(14);

const FRAMES_PER_PHASE: u64 = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drive,
    SpinUp,
    SingleShots,
    Burst,
    Rotate,
}

impl Phase {
    const ALL: [Phase; 5] = [
        Phase::Drive,
        Phase::SpinUp,
        Phase::SingleShots,
        Phase::Burst,
        Phase::Rotate,
    ];

    pub fn at(frame: u64) -> Self {
        let index = (frame / FRAMES_PER_PHASE) % Self::ALL.len() as u64;
        Self::ALL[index as usize]
    }
}

/// Transmitter frame number `frame` of the drill.
pub fn scripted_input(frame: u64) -> OperatorInput {
    let mut input = OperatorInput {
        switch_left: SwitchPosition::Mid,
        switch_right: SwitchPosition::Down,
        ..Default::default()
    };
    let in_phase = frame % FRAMES_PER_PHASE;
    match Phase::at(frame) {
        Phase::Drive => {
            input.right_stick_y = 300;
            input.left_stick_x = 50;
        }
        Phase::SpinUp => input.dial = -150,
        Phase::SingleShots => {
            // Dial flicks past the single-shot threshold every 20 frames.
            input.dial = if in_phase % 20 < 5 { -350 } else { -150 };
        }
        Phase::Burst => input.dial = -600,
        Phase::Rotate => input.switch_right = SwitchPosition::Up,
    }
    input
}

/// Video-link frame number `frame` of the same drill.
///
/// `F` toggles the friction wheels, so it is tapped once when spin-up starts
/// and once when the rotate phase starts.
pub fn scripted_keys(frame: u64) -> VideoLinkInput {
    let mut input = VideoLinkInput::default();
    let in_phase = frame % FRAMES_PER_PHASE;
    let tap = in_phase < 3;
    let mut keys = 0;
    match Phase::at(frame) {
        Phase::Drive => {
            keys |= KeyMask::W | KeyMask::E;
            input.mouse_x = 2;
        }
        Phase::SpinUp => {
            if tap {
                keys |= KeyMask::F;
            }
        }
        Phase::SingleShots => input.mouse_left = in_phase % 20 < 5,
        Phase::Burst => input.mouse_right = true,
        Phase::Rotate => {
            keys |= KeyMask::Q;
            if tap {
                keys |= KeyMask::F;
            }
        }
    }
    input.keys = KeyMask(keys);
    input
}

/// Receiver the drill is played into.
#[derive(Debug, Clone)]
pub enum Operator {
    Remote(SimInput<OperatorInput>),
    VideoLink(SimInput<VideoLinkInput>),
}

impl Operator {
    fn push_frame(&self, frame: u64) {
        match self {
            Operator::Remote(rx) => rx.push(scripted_input(frame)),
            Operator::VideoLink(rx) => rx.push(scripted_keys(frame)),
        }
    }
}

/// Feed the drill into `operator` until `shutdown` is set. Also turns the
/// simulated IMU so the yaw feedback moves.
pub async fn drive(operator: Operator, imu: Option<SimAttitude>, shutdown: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(FRAME_PERIOD);
    let mut frame = 0u64;
    while !shutdown.load(Ordering::Acquire) {
        interval.tick().await;
        operator.push_frame(frame);
        if let Some(imu) = &imu {
            let t = frame as f32 * FRAME_PERIOD.as_secs_f32();
            imu.set(Attitude {
                yaw: 10.0 * t.sin(),
                yaw_speed: 10.0 * t.cos(),
                pitch: 2.0 * (0.5 * t).sin(),
                pitch_speed: (0.5 * t).cos(),
            });
        }
        frame = frame.wrapping_add(1);
    }
}
