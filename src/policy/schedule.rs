use serde::{Deserialize, Serialize};

use crate::error::{AdmissionError, invalid_config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayCurve {
    Linear,
    Exponential,
}

fn default_initial_tolerance() -> f64 {
    0.20
}

fn default_final_tolerance() -> f64 {
    0.02
}

fn default_strictness_start() -> f64 {
    0.10
}

fn default_endgame_progress() -> f64 {
    0.95
}

fn default_curve() -> DecayCurve {
    DecayCurve::Linear
}

/// How much slack a short constraint gets, as a function of venue fill.
///
/// Lenient until `strictness_start`, then decays toward `final_tolerance`
/// along `curve`. From `endgame_progress` onward no slack is left at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceSchedule {
    #[serde(default = "default_initial_tolerance")]
    pub initial_tolerance: f64,
    #[serde(default = "default_final_tolerance")]
    pub final_tolerance: f64,
    #[serde(default = "default_strictness_start")]
    pub strictness_start: f64,
    #[serde(default = "default_endgame_progress")]
    pub endgame_progress: f64,
    #[serde(default = "default_curve")]
    pub curve: DecayCurve,
}

impl Default for ToleranceSchedule {
    fn default() -> Self {
        Self {
            initial_tolerance: default_initial_tolerance(),
            final_tolerance: default_final_tolerance(),
            strictness_start: default_strictness_start(),
            endgame_progress: default_endgame_progress(),
            curve: default_curve(),
        }
    }
}

impl ToleranceSchedule {
    pub fn new(initial_tolerance: f64, final_tolerance: f64, strictness_start: f64) -> Self {
        Self {
            initial_tolerance,
            final_tolerance,
            strictness_start,
            ..Self::default()
        }
    }

    pub fn with_curve(mut self, curve: DecayCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_endgame_progress(mut self, endgame_progress: f64) -> Self {
        self.endgame_progress = endgame_progress;
        self
    }

    pub fn validate(&self) -> Result<(), AdmissionError> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.initial_tolerance) || !unit.contains(&self.final_tolerance) {
            return Err(invalid_config(format!(
                "tolerances must lie in [0, 1], got {} -> {}",
                self.initial_tolerance, self.final_tolerance
            )));
        }
        if self.final_tolerance > self.initial_tolerance {
            return Err(invalid_config(
                "final_tolerance must not exceed initial_tolerance",
            ));
        }
        if !(0.0..1.0).contains(&self.strictness_start) {
            return Err(invalid_config(format!(
                "strictness_start must lie in [0, 1), got {}",
                self.strictness_start
            )));
        }
        if !(self.endgame_progress > 0.0 && self.endgame_progress <= 1.0) {
            return Err(invalid_config(format!(
                "endgame_progress must lie in (0, 1], got {}",
                self.endgame_progress
            )));
        }
        Ok(())
    }

    pub fn tolerance(&self, progress: f64) -> f64 {
        if progress >= self.endgame_progress {
            return 0.0;
        }
        if progress <= self.strictness_start {
            return self.initial_tolerance;
        }

        let span = 1.0 - self.strictness_start;
        let t = ((progress - self.strictness_start) / span).clamp(0.0, 1.0);
        let (initial, last) = (self.initial_tolerance, self.final_tolerance);

        match self.curve {
            DecayCurve::Exponential if initial > 0.0 && last > 0.0 => {
                initial * (last / initial).powf(t)
            }
            // a zero endpoint has no geometric path; fall back to linear
            DecayCurve::Linear | DecayCurve::Exponential => initial - (initial - last) * t,
        }
    }

    /// Distinct for every schedule that decides differently, since it
    /// prefixes result file names.
    pub fn label(&self) -> String {
        let curve = match self.curve {
            DecayCurve::Linear => "linear",
            DecayCurve::Exponential => "exp",
        };
        format!(
            "tol:{:.0}%->{:.0}%@{:.0}%,{curve},end:{:.0}%",
            self.initial_tolerance * 100.0,
            self.final_tolerance * 100.0,
            self.strictness_start * 100.0,
            self.endgame_progress * 100.0
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulePreset {
    Standard,
    Aggressive,
    Conservative,
}

impl SchedulePreset {
    pub fn schedule(self) -> ToleranceSchedule {
        match self {
            SchedulePreset::Standard => ToleranceSchedule::new(0.20, 0.02, 0.10),
            SchedulePreset::Aggressive => ToleranceSchedule::new(0.15, 0.01, 0.05),
            SchedulePreset::Conservative => ToleranceSchedule::new(0.30, 0.05, 0.20),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleConfig {
    Preset { preset: SchedulePreset },
    Custom(ToleranceSchedule),
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig::Custom(ToleranceSchedule::default())
    }
}

impl ScheduleConfig {
    pub fn resolve(&self) -> Result<ToleranceSchedule, AdmissionError> {
        let schedule = match self {
            ScheduleConfig::Preset { preset } => preset.schedule(),
            ScheduleConfig::Custom(schedule) => *schedule,
        };
        schedule.validate()?;
        Ok(schedule)
    }
}
