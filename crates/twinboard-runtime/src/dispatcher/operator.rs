//! Operator transmitter → intent mapping.
//!
//! Stateless input snapshots in, a board-agnostic [`OperatorIntent`] out. The
//! mapper owns everything that must persist between cycles: the emergency
//! stop latch, the yaw/pitch integrators, edge detectors for the dial, the
//! mouse and the keyboard, and the single-shot [`PulseCounter`].
//!
//! | Left switch | Control source |
//! |---|---|
//! | Up | keyboard and mouse |
//! | Mid | vision target when locked, otherwise sticks |
//! | Down | sticks |

use twinboard_middleware::pulse::PulseCounter;
use twinboard_types::{
    ChassisMode, FrictionMode, GimbalMode, KeyMask, LidMode, LoaderMode, OperatorInput,
    RobotStatus, ShootCommand, ShootMode, SwitchPosition,
};

use super::DispatcherConfig;

/// Dial beyond this spins the friction wheels up.
pub const DIAL_FRICTION: i16 = -100;
/// Crossing this arms a single shot.
pub const DIAL_SINGLE: i16 = -300;
/// Beyond this the loader runs continuously.
pub const DIAL_BURST: i16 = -500;
/// Pulled back past this the loader runs in reverse to clear a jam.
pub const DIAL_REVERSE: i16 = 500;

/// Aiming target supplied by vision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aim {
    pub yaw: f32,
    pub pitch: f32,
}

/// What the operator asked for this cycle, before any role-specific routing
/// or safety override.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OperatorIntent {
    pub robot_status: RobotStatus,
    pub chassis_mode: ChassisMode,
    pub gimbal_mode: GimbalMode,
    pub vx: f32,
    pub vy: f32,
    pub speed_buff_level: i32,
    pub yaw: f32,
    pub pitch: f32,
    /// Left switch asks for vision aiming.
    pub auto_aim: bool,
    /// `rest_heat` is left at zero; the rules fill it in.
    pub shoot: ShootCommand,
}

#[derive(Debug, Clone, Copy)]
struct Gains {
    yaw_stick: f32,
    pitch_stick: f32,
    velocity: f32,
    mouse_yaw: f32,
    mouse_pitch: f32,
    key_speed: f32,
    shift_buff_level: i32,
    pitch_min: f32,
    pitch_max: f32,
    shoot_rate: f32,
}

/// Stateful operator mapping shared by every role that has a transmitter.
#[derive(Debug, Clone)]
pub struct OperatorMapper {
    gains: Gains,
    robot_status: RobotStatus,
    yaw: f32,
    pitch: f32,
    trigger: PulseCounter,
    last_dial: i16,
    last_mouse_left: bool,
    last_keys: KeyMask,
    key_chassis_mode: ChassisMode,
    key_lid_open: bool,
    key_friction_on: bool,
}

impl OperatorMapper {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            gains: Gains {
                yaw_stick: config.yaw_stick_gain,
                pitch_stick: config.pitch_stick_gain,
                velocity: config.velocity_gain,
                mouse_yaw: config.mouse_yaw_gain,
                mouse_pitch: config.mouse_pitch_gain,
                key_speed: config.key_speed,
                shift_buff_level: config.shift_buff_level,
                pitch_min: config.pitch_min,
                pitch_max: config.pitch_max,
                shoot_rate: config.shoot_rate,
            },
            robot_status: RobotStatus::Ready,
            yaw: 0.0,
            pitch: 0.0,
            trigger: PulseCounter::new(),
            last_dial: 0,
            last_mouse_left: false,
            last_keys: KeyMask::default(),
            key_chassis_mode: ChassisMode::FollowGimbalYaw,
            key_lid_open: false,
            key_friction_on: false,
        }
    }

    pub fn robot_status(&self) -> RobotStatus {
        self.robot_status
    }

    /// Current single-shot sequence, for safe-default commands that must
    /// not invent or drop pulses.
    pub fn trigger_seq(&self) -> u16 {
        self.trigger.sequence()
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Re-seat the integrators on the measured attitude so that regaining
    /// control does not snap the gimbal to a stale target.
    pub fn hold(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = self.clamp_pitch(pitch);
    }

    /// Forget edge history. Called when the transmitter drops out so that a
    /// switch or dial already held on reconnect is not read as a new press.
    pub fn reset_edges(&mut self, input: &OperatorInput) {
        self.last_dial = input.dial;
        self.last_mouse_left = input.mouse_left;
        self.last_keys = input.keys;
    }

    pub fn map(&mut self, input: &OperatorInput, aim: Option<Aim>) -> OperatorIntent {
        self.update_latch(input);
        let intent = if input.switch_left == SwitchPosition::Up {
            self.map_keyboard(input)
        } else {
            self.map_remote(input, aim)
        };
        self.reset_edges(input);
        intent
    }

    fn update_latch(&mut self, input: &OperatorInput) {
        match (input.switch_left, input.switch_right) {
            (SwitchPosition::Down, SwitchPosition::Down) => {
                if self.robot_status != RobotStatus::Stop {
                    tracing::warn!("emergency stop engaged from transmitter");
                }
                self.robot_status = RobotStatus::Stop;
            }
            (SwitchPosition::Up, SwitchPosition::Up) => {
                if self.robot_status != RobotStatus::Ready {
                    tracing::info!("emergency stop released");
                }
                self.robot_status = RobotStatus::Ready;
            }
            _ => {}
        }
    }

    fn map_remote(&mut self, input: &OperatorInput, aim: Option<Aim>) -> OperatorIntent {
        let (chassis_mode, gimbal_mode) = match input.switch_right {
            SwitchPosition::Down => (ChassisMode::FollowGimbalYaw, GimbalMode::Gyro),
            SwitchPosition::Mid => (ChassisMode::NoFollow, GimbalMode::Free),
            SwitchPosition::Up => (ChassisMode::Rotate, GimbalMode::Gyro),
        };
        let lid_mode = if input.switch_right == SwitchPosition::Up {
            LidMode::Open
        } else {
            LidMode::Close
        };

        let auto_aim = input.switch_left == SwitchPosition::Mid;
        match aim.filter(|_| auto_aim) {
            Some(target) => {
                self.yaw = target.yaw;
                self.pitch = self.clamp_pitch(target.pitch);
            }
            None => {
                self.yaw += self.gains.yaw_stick * f32::from(input.left_stick_x);
                self.pitch =
                    self.clamp_pitch(self.pitch + self.gains.pitch_stick * f32::from(input.left_stick_y));
            }
        }

        let armed = input.dial < DIAL_FRICTION;
        let bursting = input.dial < DIAL_BURST;
        let loader_mode = if bursting {
            LoaderMode::Burst
        } else if input.dial < DIAL_SINGLE {
            LoaderMode::OneRound
        } else if input.dial > DIAL_REVERSE {
            LoaderMode::Reverse
        } else {
            LoaderMode::Stop
        };
        if self.last_dial >= DIAL_SINGLE && input.dial < DIAL_SINGLE && !bursting {
            self.trigger.fire();
        }

        OperatorIntent {
            robot_status: self.robot_status,
            chassis_mode,
            gimbal_mode,
            vx: self.gains.velocity * f32::from(input.right_stick_x),
            vy: self.gains.velocity * f32::from(input.right_stick_y),
            speed_buff_level: 0,
            yaw: self.yaw,
            pitch: self.pitch,
            auto_aim,
            shoot: ShootCommand {
                shoot_mode: if armed { ShootMode::On } else { ShootMode::Off },
                loader_mode,
                lid_mode,
                friction_mode: if armed { FrictionMode::On } else { FrictionMode::Off },
                rest_heat: 0,
                shoot_rate: self.gains.shoot_rate,
                trigger_seq: self.trigger.sequence(),
            },
        }
    }

    fn map_keyboard(&mut self, input: &OperatorInput) -> OperatorIntent {
        let keys = input.keys;
        let rising = |key: u16| keys.pressed(key) && !self.last_keys.pressed(key);

        if keys.pressed(KeyMask::Q) {
            self.key_chassis_mode = ChassisMode::Rotate;
        } else if keys.pressed(KeyMask::E) {
            self.key_chassis_mode = ChassisMode::FollowGimbalYaw;
        } else if keys.pressed(KeyMask::C) {
            self.key_chassis_mode = ChassisMode::NoFollow;
        }
        if rising(KeyMask::R) {
            self.key_lid_open = !self.key_lid_open;
        }
        if rising(KeyMask::F) {
            self.key_friction_on = !self.key_friction_on;
        }

        let axis = |positive: u16, negative: u16| -> f32 {
            f32::from(i8::from(keys.pressed(positive)) - i8::from(keys.pressed(negative)))
        };
        let vx = axis(KeyMask::D, KeyMask::A) * self.gains.key_speed;
        let vy = axis(KeyMask::W, KeyMask::S) * self.gains.key_speed;

        self.yaw += self.gains.mouse_yaw * f32::from(input.mouse_x);
        self.pitch =
            self.clamp_pitch(self.pitch - self.gains.mouse_pitch * f32::from(input.mouse_y));

        let loader_mode = if input.mouse_right {
            LoaderMode::Burst
        } else if input.mouse_left {
            LoaderMode::OneRound
        } else {
            LoaderMode::Stop
        };
        if input.mouse_left && !self.last_mouse_left && !input.mouse_right {
            self.trigger.fire();
        }

        let armed = self.key_friction_on;
        OperatorIntent {
            robot_status: self.robot_status,
            chassis_mode: self.key_chassis_mode,
            gimbal_mode: GimbalMode::Gyro,
            vx,
            vy,
            speed_buff_level: if keys.pressed(KeyMask::SHIFT) {
                self.gains.shift_buff_level
            } else {
                0
            },
            yaw: self.yaw,
            pitch: self.pitch,
            auto_aim: false,
            shoot: ShootCommand {
                shoot_mode: if armed { ShootMode::On } else { ShootMode::Off },
                loader_mode,
                lid_mode: if self.key_lid_open {
                    LidMode::Open
                } else {
                    LidMode::Close
                },
                friction_mode: if armed { FrictionMode::On } else { FrictionMode::Off },
                rest_heat: 0,
                shoot_rate: self.gains.shoot_rate,
                trigger_seq: self.trigger.sequence(),
            },
        }
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(self.gains.pitch_min, self.gains.pitch_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> OperatorMapper {
        OperatorMapper::new(&DispatcherConfig::default())
    }

    fn remote(left: SwitchPosition, right: SwitchPosition) -> OperatorInput {
        OperatorInput {
            switch_left: left,
            switch_right: right,
            ..Default::default()
        }
    }

    #[test]
    fn right_switch_selects_chassis_and_gimbal_modes() {
        let mut m = mapper();
        let down = m.map(&remote(SwitchPosition::Mid, SwitchPosition::Down), None);
        assert_eq!(down.chassis_mode, ChassisMode::FollowGimbalYaw);
        assert_eq!(down.gimbal_mode, GimbalMode::Gyro);
        assert_eq!(down.shoot.lid_mode, LidMode::Close);

        let mid = m.map(&remote(SwitchPosition::Mid, SwitchPosition::Mid), None);
        assert_eq!(mid.chassis_mode, ChassisMode::NoFollow);
        assert_eq!(mid.gimbal_mode, GimbalMode::Free);

        let up = m.map(&remote(SwitchPosition::Mid, SwitchPosition::Up), None);
        assert_eq!(up.chassis_mode, ChassisMode::Rotate);
        assert_eq!(up.shoot.lid_mode, LidMode::Open);
    }

    #[test]
    fn both_switches_down_latches_stop_until_both_up() {
        let mut m = mapper();
        assert_eq!(m.robot_status(), RobotStatus::Ready);
        m.map(&remote(SwitchPosition::Down, SwitchPosition::Down), None);
        assert_eq!(m.robot_status(), RobotStatus::Stop);

        let still = m.map(&remote(SwitchPosition::Mid, SwitchPosition::Mid), None);
        assert_eq!(still.robot_status, RobotStatus::Stop, "stop is latched");

        let released = m.map(&remote(SwitchPosition::Up, SwitchPosition::Up), None);
        assert_eq!(released.robot_status, RobotStatus::Ready);
    }

    #[test]
    fn sticks_scale_and_integrate() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Down, SwitchPosition::Mid);
        input.right_stick_x = 100;
        input.right_stick_y = -50;
        input.left_stick_x = 200;
        input.left_stick_y = 1000 / 2;
        let first = m.map(&input, None);
        assert_eq!(first.vx, 1000.0);
        assert_eq!(first.vy, -500.0);
        assert!((first.yaw - 1.0).abs() < 1e-5);
        assert!((first.pitch - 0.5).abs() < 1e-5);

        let second = m.map(&input, None);
        assert!((second.yaw - 2.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let config = DispatcherConfig::default();
        let mut m = OperatorMapper::new(&config);
        let mut input = remote(SwitchPosition::Down, SwitchPosition::Mid);
        input.left_stick_y = STICK_MAX;
        for _ in 0..100_000 {
            m.map(&input, None);
        }
        assert_eq!(m.map(&input, None).pitch, config.pitch_max);
    }

    const STICK_MAX: i16 = twinboard_types::STICK_RANGE;

    #[test]
    fn vision_overrides_sticks_only_with_left_switch_mid() {
        let mut m = mapper();
        let aim = Some(Aim {
            yaw: 42.0,
            pitch: 3.0,
        });
        let aimed = m.map(&remote(SwitchPosition::Mid, SwitchPosition::Down), aim);
        assert!(aimed.auto_aim);
        assert_eq!(aimed.yaw, 42.0);
        assert_eq!(aimed.pitch, 3.0);

        let manual = m.map(&remote(SwitchPosition::Down, SwitchPosition::Mid), aim);
        assert!(!manual.auto_aim);
        assert_eq!(manual.yaw, 42.0, "integrator continues from the last target");
    }

    #[test]
    fn dial_thresholds() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Down, SwitchPosition::Mid);

        input.dial = -150;
        let armed = m.map(&input, None);
        assert_eq!(armed.shoot.friction_mode, FrictionMode::On);
        assert_eq!(armed.shoot.shoot_mode, ShootMode::On);
        assert_eq!(armed.shoot.loader_mode, LoaderMode::Stop);

        input.dial = -600;
        assert_eq!(m.map(&input, None).shoot.loader_mode, LoaderMode::Burst);

        input.dial = 600;
        let reverse = m.map(&input, None);
        assert_eq!(reverse.shoot.loader_mode, LoaderMode::Reverse);
        assert_eq!(reverse.shoot.friction_mode, FrictionMode::Off);
    }

    #[test]
    fn dial_edge_fires_exactly_one_pulse() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Down, SwitchPosition::Mid);
        input.dial = -200;
        let before = m.map(&input, None).shoot.trigger_seq;

        input.dial = -350;
        let fired = m.map(&input, None);
        assert_eq!(fired.shoot.trigger_seq, before.wrapping_add(1));
        assert_eq!(fired.shoot.loader_mode, LoaderMode::OneRound);

        let held = m.map(&input, None);
        assert_eq!(held.shoot.trigger_seq, fired.shoot.trigger_seq, "holding does not re-fire");
    }

    #[test]
    fn jumping_straight_to_burst_fires_no_single_shot() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Down, SwitchPosition::Mid);
        input.dial = -650;
        let burst = m.map(&input, None);
        assert_eq!(burst.shoot.loader_mode, LoaderMode::Burst);
        assert_eq!(burst.shoot.trigger_seq, 0);
    }

    #[test]
    fn keyboard_mode_translation_and_toggles() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Up, SwitchPosition::Mid);
        input.keys = KeyMask(KeyMask::W | KeyMask::A | KeyMask::SHIFT | KeyMask::F | KeyMask::Q);
        let intent = m.map(&input, None);
        let key_speed = DispatcherConfig::default().key_speed;
        assert_eq!(intent.vy, key_speed);
        assert_eq!(intent.vx, -key_speed);
        assert_eq!(intent.speed_buff_level, DispatcherConfig::default().shift_buff_level);
        assert_eq!(intent.chassis_mode, ChassisMode::Rotate);
        assert_eq!(intent.shoot.friction_mode, FrictionMode::On);

        // Holding F does not toggle again; releasing and pressing does.
        let held = m.map(&input, None);
        assert_eq!(held.shoot.friction_mode, FrictionMode::On);
        input.keys = KeyMask::default();
        m.map(&input, None);
        input.keys = KeyMask(KeyMask::F);
        assert_eq!(m.map(&input, None).shoot.friction_mode, FrictionMode::Off);
        assert_eq!(m.map(&input, None).chassis_mode, ChassisMode::Rotate, "Q latches");
    }

    #[test]
    fn mouse_left_click_is_one_pulse() {
        let mut m = mapper();
        let mut input = remote(SwitchPosition::Up, SwitchPosition::Mid);
        input.mouse_left = true;
        let click = m.map(&input, None);
        assert_eq!(click.shoot.trigger_seq, 1);
        assert_eq!(click.shoot.loader_mode, LoaderMode::OneRound);
        assert_eq!(m.map(&input, None).shoot.trigger_seq, 1);
        input.mouse_left = false;
        m.map(&input, None);
        input.mouse_left = true;
        assert_eq!(m.map(&input, None).shoot.trigger_seq, 2);
    }

    #[test]
    fn hold_reseats_integrators() {
        let mut m = mapper();
        m.hold(90.0, 1000.0);
        let intent = m.map(&remote(SwitchPosition::Down, SwitchPosition::Mid), None);
        assert_eq!(intent.yaw, 90.0);
        assert_eq!(intent.pitch, DispatcherConfig::default().pitch_max);
    }
}
