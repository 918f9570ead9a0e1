//! Barrel heat bookkeeping.
//!
//! Every shot adds a fixed amount of heat; the barrel cools at a constant
//! rate. The remaining budget (`limit - heat`) is what the dispatcher puts in
//! [`ShootCommand::rest_heat`][twinboard_types::ShootCommand] for the
//! shooter's interlock to gate on. Shots are counted from the shooter's own
//! feedback, so the model only charges for projectiles actually fed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    /// Heat at which the barrel must stop firing.
    pub limit: u16,
    /// Heat shed per second.
    pub cooling_per_second: f32,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            limit: 200,
            cooling_per_second: 40.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeatModel {
    limit: f32,
    cooling_per_cycle: f32,
    heat_per_shot: f32,
    heat: f32,
    last_shots: u32,
}

impl HeatModel {
    pub fn new(config: &HeatConfig, heat_per_shot: u16, rate_hz: u32) -> Self {
        Self {
            limit: f32::from(config.limit),
            cooling_per_cycle: config.cooling_per_second / rate_hz.max(1) as f32,
            heat_per_shot: f32::from(heat_per_shot),
            heat: 0.0,
            last_shots: 0,
        }
    }

    /// Advance one cycle given the shooter's running shot count and return
    /// the remaining budget.
    pub fn update(&mut self, shots_fired: u32) -> u16 {
        let new_shots = shots_fired.wrapping_sub(self.last_shots);
        self.last_shots = shots_fired;
        self.heat += new_shots as f32 * self.heat_per_shot;
        self.heat = (self.heat - self.cooling_per_cycle).max(0.0);
        self.rest_heat()
    }

    pub fn heat(&self) -> f32 {
        self.heat
    }

    pub fn rest_heat(&self) -> u16 {
        (self.limit - self.heat).clamp(0.0, f32::from(u16::MAX)) as u16
    }
}
