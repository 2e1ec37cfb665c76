use std::{fmt, str::FromStr};

use crate::{
    config::MotionProfile,
    error::{Pf400Error, Result},
    locations::{LocationTable, GRIPPER_JOINT, GRIP_VALUE, RELEASE_VALUE},
};

/// The firmware command vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Enable high power
    HighPower,
    // Attach the arm to this thread of the controller
    Attach,
    Home,
    Profile { index: u8, params: [f64; MotionProfile::ARITY] },
    // Heartbeat, does nothing
    Nop,
    // Stop immediately, power stays on
    Halt,
    Speed(f64),
    // Report current joint angles
    WhereJ,
    MoveJ { profile: u8, joints: Vec<f64> },
}

impl Command {
    /// The command as sent on the wire, newline included.
    pub fn line(&self) -> String {
        format!("{self}\n")
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &[f64]) -> fmt::Result {
    values.iter().try_for_each(|v| write!(f, " {v}"))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::HighPower => f.write_str("hp 1"),
            Command::Attach => f.write_str("attach 1"),
            Command::Home => f.write_str("home"),
            Command::Profile { index, params } => {
                write!(f, "Profile {index}")?;
                write_values(f, params)
            }
            Command::Nop => f.write_str("nop"),
            Command::Halt => f.write_str("halt"),
            Command::Speed(speed) => write!(f, "mspeed{speed}"),
            Command::WhereJ => f.write_str("wherej"),
            Command::MoveJ { profile, joints } => {
                write!(f, "MoveJ {profile}")?;
                write_values(f, joints)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse command: {}", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> std::result::Result<Command, ParseCommandError> {
        let err = || ParseCommandError(line.trim().to_string());
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or_else(err)?.to_ascii_lowercase();
        let numbers = |tokens: std::str::SplitWhitespace<'_>| {
            tokens.map(str::parse::<f64>).collect::<std::result::Result<Vec<_>, _>>()
        };

        let cmd = match verb.as_str() {
            "hp" => Command::HighPower,
            "attach" => Command::Attach,
            "home" => Command::Home,
            "nop" => Command::Nop,
            "halt" => Command::Halt,
            "wherej" => Command::WhereJ,
            "profile" => {
                let index = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                let values = numbers(tokens).map_err(|_| err())?;
                let params = <[f64; MotionProfile::ARITY]>::try_from(values.as_slice()).map_err(|_| err())?;
                Command::Profile { index, params }
            }
            "movej" => {
                let profile = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(err)?;
                let joints = numbers(tokens).map_err(|_| err())?;
                Command::MoveJ { profile, joints }
            }
            _ => {
                // `mspeed50`, tolerate `mspeed 50` too
                let rest = verb.strip_prefix("mspeed").ok_or_else(err)?;
                let value = if rest.is_empty() { tokens.next().ok_or_else(err)? } else { rest };
                Command::Speed(value.parse().map_err(|_| err())?)
            }
        };

        Ok(cmd)
    }
}

pub fn check_profile(profile: u8) -> Result<u8> {
    match profile {
        1..=3 => Ok(profile),
        other => Err(Pf400Error::InvalidProfile(other)),
    }
}

/// Builds the `MoveJ` for a stored location, overriding the gripper joint
/// when gripping or releasing. Grip wins when both are set.
pub fn move_to_location(
    table: &LocationTable,
    location: &str,
    profile: u8,
    grip: bool,
    release: bool,
) -> Result<Command> {
    let profile = check_profile(profile)?;
    let stored = table
        .get(location)
        .ok_or_else(|| Pf400Error::UnknownLocation(location.to_string()))?;

    let joints = stored
        .iter()
        .enumerate()
        .map(|(i, &value)| match i {
            GRIPPER_JOINT if grip => GRIP_VALUE,
            GRIPPER_JOINT if release => RELEASE_VALUE,
            _ => value,
        })
        .collect();

    Ok(Command::MoveJ { profile, joints })
}
