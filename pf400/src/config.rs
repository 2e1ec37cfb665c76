use std::{fmt, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Pf400Error, Result},
    locations::LocationTable,
};

/// Root of the robot data file. Only the first robot entry is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotData {
    #[serde(rename = "Robot_Data")]
    pub robots: Vec<RobotConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RobotId {
    Number(u64),
    Name(String),
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotId::Number(n) => write!(f, "{n}"),
            RobotId::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(rename = "ID")]
    pub id: RobotId,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    /// Profiles 1 (slow) and 2 (fast), sent by `set_default_profiles`.
    #[serde(rename = "motion_profile")]
    pub motion_profiles: Vec<MotionProfile>,
    #[serde(with = "location_list")]
    pub locations: LocationTable,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub routine_policy: RoutinePolicy,
}

impl RobotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<RobotConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| config_error(path, e))?;
        let data: RobotData = serde_json::from_str(&text).map_err(|e| config_error(path, e))?;
        let config = data
            .robots
            .into_iter()
            .next()
            .ok_or_else(|| config_error(path, "no entry in Robot_Data"))?;

        if config.motion_profiles.len() < 2 {
            return Err(config_error(
                path,
                format!(
                    "expected 2 default motion profiles, found {}",
                    config.motion_profiles.len()
                ),
            ));
        }

        log::debug!(
            "Loaded robot data from {} ({} locations)",
            path.display(),
            config.locations.len()
        );
        Ok(config)
    }

    /// Writes the config back in the same file shape `load` reads.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = RobotData {
            robots: vec![self.clone()],
        };
        let text = serde_json::to_string_pretty(&data).map_err(|e| config_error(path, e))?;
        fs::write(path, text).map_err(|e| config_error(path, e))?;

        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn config_error(path: &Path, e: impl fmt::Display) -> Pf400Error {
    Pf400Error::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Parameters of the firmware `Profile` command, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    #[serde(rename = "Speed")]
    pub speed: f64,
    #[serde(rename = "Speed2")]
    pub speed2: f64,
    #[serde(rename = "Accel")]
    pub acceleration: f64,
    #[serde(rename = "Decel")]
    pub deceleration: f64,
    #[serde(rename = "AccelRamp")]
    pub acceleration_ramp: f64,
    #[serde(rename = "DecelRamp")]
    pub deceleration_ramp: f64,
    /// Blend tolerance, -1 to 100.
    #[serde(rename = "InRange")]
    pub in_range: f64,
    #[serde(rename = "Straight")]
    pub straight: f64,
}

impl MotionProfile {
    pub const ARITY: usize = 8;

    pub fn values(&self) -> [f64; MotionProfile::ARITY] {
        [
            self.speed,
            self.speed2,
            self.acceleration,
            self.deceleration,
            self.acceleration_ramp,
            self.deceleration_ramp,
            self.in_range,
            self.straight,
        ]
    }

    pub fn from_values(values: &[f64]) -> Result<MotionProfile> {
        let [speed, speed2, acceleration, deceleration, acceleration_ramp, deceleration_ramp, in_range, straight] =
            <[f64; MotionProfile::ARITY]>::try_from(values)
                .map_err(|_| Pf400Error::ProfileArity(values.len()))?;

        Ok(MotionProfile {
            speed,
            speed2,
            acceleration,
            deceleration,
            acceleration_ramp,
            deceleration_ramp,
            in_range,
            straight,
        })
    }
}

/// Delays between steps. The firmware has no readiness signal, so these are
/// empirical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub power_delay_secs: f64,
    pub attach_delay_secs: f64,
    pub home_delay_secs: f64,
    pub profile_delay_secs: f64,
    /// Wait between stations in the full transfer job.
    pub transfer_dwell_secs: f64,
    /// Motion replies only arrive once the move is complete.
    pub read_timeout_secs: f64,
    pub connect_timeout_secs: f64,
}

impl Default for Timing {
    fn default() -> Timing {
        Timing {
            power_delay_secs: 5.0,
            attach_delay_secs: 5.0,
            home_delay_secs: 15.0,
            profile_delay_secs: 5.0,
            transfer_dwell_secs: 50.0,
            read_timeout_secs: 60.0,
            connect_timeout_secs: 5.0,
        }
    }
}

impl Timing {
    /// No waiting at all. Useful against the simulator.
    pub fn immediate() -> Timing {
        Timing {
            power_delay_secs: 0.0,
            attach_delay_secs: 0.0,
            home_delay_secs: 0.0,
            profile_delay_secs: 0.0,
            transfer_dwell_secs: 0.0,
            ..Timing::default()
        }
    }
}

pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// What a routine does after one of its moves fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutinePolicy {
    /// Log the failure and send the remaining moves.
    #[default]
    Continue,
    Abort,
}

mod location_list {
    use std::collections::BTreeMap;

    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    use crate::locations::LocationTable;

    // The data file stores the table as a list holding one map.
    pub fn serialize<S: Serializer>(table: &LocationTable, s: S) -> Result<S::Ok, S::Error> {
        [table.as_map()].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<LocationTable, D::Error> {
        let maps = Vec::<BTreeMap<String, Vec<f64>>>::deserialize(d)?;
        if maps.is_empty() {
            return Err(D::Error::custom("empty locations list"));
        }

        Ok(maps.into_iter().flatten().collect())
    }
}
