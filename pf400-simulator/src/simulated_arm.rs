use pf400::{commands::Command, config::MotionProfile};

pub const ERR_UNKNOWN_COMMAND: i32 = -1000;
pub const ERR_NOT_ATTACHED: i32 = -1009;
pub const ERR_INVALID_ARGUMENT: i32 = -1012;
pub const ERR_NOT_HOMED: i32 = -1021;
pub const ERR_POWER_OFF: i32 = -1046;
pub const ERR_SIMULATED_FAULT: i32 = -1600;

const JOINT_COUNT: usize = 6;

pub struct SimArm {
    pub joints: Vec<f64>,
    pub powered: bool,
    pub attached: bool,
    pub homed: bool,
    pub speed: f64,
    pub profiles: [Option<[f64; MotionProfile::ARITY]>; 3],
}

impl SimArm {
    pub fn initial() -> Self {
        Self {
            joints: vec![0.0; JOINT_COUNT],
            powered: false,
            attached: false,
            homed: false,
            speed: 100.0,
            profiles: [None; 3],
        }
    }

    /// Reply line for one received command line.
    pub fn handle(&mut self, line: &str) -> String {
        let cmd = match line.parse::<Command>() {
            Ok(cmd) => cmd,
            Err(e) => {
                log::warn!("{e}");
                return error(ERR_UNKNOWN_COMMAND, "Unknown command");
            }
        };

        match self.apply(cmd) {
            Ok(Some(payload)) => format!("{payload}\n"),
            Ok(None) => "0\n".to_string(),
            Err((code, message)) => error(code, message),
        }
    }

    fn apply(&mut self, cmd: Command) -> Result<Option<String>, (i32, &'static str)> {
        match cmd {
            Command::HighPower => self.powered = true,
            Command::Nop => {}
            Command::Speed(speed) => {
                self.speed = speed;
                log::info!("Speed set to {}%", self.speed);
            }
            Command::WhereJ => {
                let pose = self.joints.iter().map(f64::to_string).collect::<Vec<_>>().join(" ");
                return Ok(Some(pose));
            }
            Command::Halt => log::info!("Halted"),
            Command::Attach => {
                self.require_power()?;
                self.attached = true;
            }
            Command::Home => {
                self.require_attached()?;
                self.homed = true;
                self.joints = vec![0.0; JOINT_COUNT];
            }
            Command::Profile { index, params } => {
                let slot = self
                    .profiles
                    .get_mut(usize::from(index).wrapping_sub(1))
                    .ok_or((ERR_INVALID_ARGUMENT, "Invalid profile index"))?;
                *slot = Some(params);
                log::info!("Profile {index} set to {:?}", self.profiles);
            }
            Command::MoveJ { profile, joints } => {
                self.require_attached()?;
                if !self.homed {
                    return Err((ERR_NOT_HOMED, "Robot not homed"));
                }
                if joints.len() != JOINT_COUNT || !(1..=3).contains(&profile) {
                    return Err((ERR_INVALID_ARGUMENT, "Invalid argument"));
                }
                self.joints = joints;
            }
        }

        Ok(None)
    }

    fn require_power(&self) -> Result<(), (i32, &'static str)> {
        if self.powered {
            Ok(())
        } else {
            Err((ERR_POWER_OFF, "Power not enabled"))
        }
    }

    fn require_attached(&self) -> Result<(), (i32, &'static str)> {
        self.require_power()?;
        if self.attached {
            Ok(())
        } else {
            Err((ERR_NOT_ATTACHED, "No robot attached"))
        }
    }
}

pub fn error(code: i32, message: &str) -> String {
    format!("{code} *{message}*\n")
}
