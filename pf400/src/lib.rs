use std::{path::Path, thread::sleep};

use commands::Command;
use config::{secs, MotionProfile, RobotConfig};
use locations::LocationTable;
use reply::Reply;
use transport::{TcpTransport, Transport};

pub mod commands;
pub mod config;
pub mod error;
pub mod locations;
pub mod reply;
pub mod routines;
pub mod transport;

pub use error::{Pf400Error, Result};

/// Remote control of a PF400 arm. Every command is its own
/// connect-send-receive-disconnect cycle.
pub struct Pf400<T: Transport = TcpTransport> {
    config: RobotConfig,
    transport: T,
    last_located: Option<Vec<f64>>,
}

impl Pf400<TcpTransport> {
    pub fn new(config: RobotConfig) -> Pf400<TcpTransport> {
        let transport = TcpTransport::from_config(&config);
        Pf400::with_transport(config, transport)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Pf400<TcpTransport>> {
        Ok(Pf400::new(RobotConfig::load(path)?))
    }
}

impl<T: Transport> Pf400<T> {
    pub fn with_transport(config: RobotConfig, transport: T) -> Pf400<T> {
        log::info!(
            "Robot created. Robot ID: {} ~ Host: {} ~ Port: {}",
            config.id,
            config.host,
            config.port
        );

        Pf400 {
            config,
            transport,
            last_located: None,
        }
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn locations(&self) -> &LocationTable {
        &self.config.locations
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Pose from the most recent successful `locate`.
    pub fn last_located(&self) -> Option<&[f64]> {
        self.last_located.as_deref()
    }

    /// Sends one command and returns the raw reply text.
    pub fn send(&mut self, command: &Command) -> Result<String> {
        let line = command.line();
        log::debug!("Sending command to the robot: {}", line.trim_end());

        let reply = self.transport.exchange(&line).inspect_err(|e| {
            log::error!("Failed to send the command [{}]: {e}", line.trim_end());
        })?;
        log::debug!("Robot replied: {}", reply.trim_end());

        Ok(reply)
    }

    pub fn send_reply(&mut self, command: &Command) -> Result<Reply> {
        let raw = self.send(command)?;
        Reply::parse(&command.line(), &raw)
    }

    fn ack(&mut self, command: &Command) -> Result<()> {
        let raw = self.send(command)?;
        reply::expect_ack(&command.line(), &raw).inspect_err(|e| log::error!("{e}"))
    }

    pub fn enable_power(&mut self) -> Result<()> {
        self.ack(&Command::HighPower)?;
        log::info!("Power enabled");
        Ok(())
    }

    pub fn attach(&mut self) -> Result<()> {
        log::info!("Attaching the robot");
        self.ack(&Command::Attach)
    }

    pub fn home(&mut self) -> Result<()> {
        log::info!("Homing the robot");
        self.ack(&Command::Home)
    }

    /// One value sends the default profiles 1 and 2 from config, eight values
    /// are sent as custom profile 3.
    pub fn set_profile(&mut self, values: &[f64]) -> Result<()> {
        match values.len() {
            1 => self.set_default_profiles(),
            MotionProfile::ARITY => self.set_custom_profile(&MotionProfile::from_values(values)?),
            n => Err(Pf400Error::ProfileArity(n)),
        }
    }

    pub fn set_default_profiles(&mut self) -> Result<()> {
        log::info!("Setting default values to motion profiles 1 and 2");
        let defaults: Vec<MotionProfile> = self.config.motion_profiles.iter().take(2).copied().collect();
        for (index, profile) in (1..).zip(defaults) {
            self.ack(&Command::Profile {
                index,
                params: profile.values(),
            })?;
        }

        Ok(())
    }

    pub fn set_custom_profile(&mut self, profile: &MotionProfile) -> Result<()> {
        log::info!("Setting new values to motion profile 3");
        self.ack(&Command::Profile {
            index: 3,
            params: profile.values(),
        })
    }

    pub fn check_heartbeat(&mut self) -> Result<()> {
        match self.ack(&Command::Nop) {
            Ok(()) => {
                log::info!("Robot is alive");
                Ok(())
            }
            Err(e) => {
                log::warn!("Lost robot heartbeat");
                Err(e)
            }
        }
    }

    /// Stops the robot immediately but leaves power on.
    pub fn stop(&mut self) -> Result<()> {
        self.ack(&Command::Halt)
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.ack(&Command::Speed(speed))
    }

    /// Power, attach, home, default profiles, heartbeat. Stops at the first
    /// failing step.
    pub fn initialize(&mut self) -> Result<()> {
        let timing = self.config.timing.clone();

        self.enable_power()?;
        sleep(secs(timing.power_delay_secs));
        self.attach()?;
        sleep(secs(timing.attach_delay_secs));
        self.home()?;
        sleep(secs(timing.home_delay_secs));
        self.set_default_profiles()?;
        sleep(secs(timing.profile_delay_secs));
        self.check_heartbeat()?;

        log::info!("Robot initialization is successfully completed");
        Ok(())
    }

    /// The `MoveJ` line for a stored location.
    pub fn set_move_command(&self, location: &str, profile: u8, grip: bool, release: bool) -> Result<String> {
        commands::move_to_location(&self.config.locations, location, profile, grip, release)
            .map(|cmd| cmd.line())
    }

    pub fn locate(&mut self) -> Result<Vec<f64>> {
        let command = Command::WhereJ;
        let raw = self.send(&command)?;
        reply::reject_robot_error(&command.line(), &raw).inspect_err(|e| log::error!("{e}"))?;
        let joints = reply::parse_joints(&command.line(), &raw)?;
        log::info!("Robot located at {joints:?}");

        self.last_located = Some(joints.clone());
        Ok(joints)
    }

    /// Locates the robot and stores the pose as `location`, either a global
    /// location or, with `station`, a point of that OT2 station.
    pub fn teach(&mut self, location: &str, station: Option<u32>) -> Result<()> {
        // Fail on a bad name before touching the robot
        let key = locations::teach_key(&self.config.locations, location, station)?;
        let joints = self.locate()?;
        self.config.locations.overwrite(&key, &joints)?;

        log::info!("Taught location {key}");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        config::{MotionProfile, RobotConfig, RobotId, RoutinePolicy, Timing},
        locations::LocationTable,
    };

    pub fn profile(speed: f64) -> MotionProfile {
        MotionProfile::from_values(&[speed, 0.0, 100.0, 100.0, 0.1, 0.1, 0.0, 0.0]).unwrap()
    }

    pub fn config() -> RobotConfig {
        let mut locations = LocationTable::new();
        locations.insert("HomeALL", vec![400.0, 1.5, 177.0, 537.0, 127.0, 995.0]);
        for id in 1..=3 {
            for (n, suffix) in [
                "front",
                "above_plate",
                "pick_plate",
                "approach_plate_rack",
                "front_plate_rack",
                "plate_rack",
            ]
            .into_iter()
            .enumerate()
            {
                let base = f64::from(id * 100) + n as f64;
                locations.insert(format!("OT2_{id}_{suffix}"), vec![base, 2.0, 3.0, 4.0, 126.0, 6.0]);
            }
        }
        locations.insert("Completed_plate", vec![10.0, 20.0, 30.0, 40.0, 126.0, 60.0]);
        locations.insert("Completed_plate_above", vec![11.0, 21.0, 31.0, 41.0, 126.0, 61.0]);

        RobotConfig {
            id: RobotId::Number(1),
            host: "127.0.0.1".to_string(),
            port: 10100,
            motion_profiles: vec![profile(30.0), profile(80.0)],
            locations,
            timing: Timing::immediate(),
            routine_policy: RoutinePolicy::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_support::config, transport::mock::ScriptedTransport};

    fn robot(transport: ScriptedTransport) -> Pf400<ScriptedTransport> {
        Pf400::with_transport(config(), transport)
    }

    #[test]
    fn lifecycle_commands_use_fixed_verbs() {
        let mut robot = robot(ScriptedTransport::new());
        robot.enable_power().unwrap();
        robot.attach().unwrap();
        robot.home().unwrap();
        robot.check_heartbeat().unwrap();
        robot.stop().unwrap();
        robot.set_speed(40.0).unwrap();

        assert_eq!(
            robot.transport().sent,
            ["hp 1\n", "attach 1\n", "home\n", "nop\n", "halt\n", "mspeed40\n"]
        );
    }

    #[test]
    fn robot_error_code_is_protocol_error() {
        let mut robot = robot(ScriptedTransport::new().reply("-1009 *No robot attached*\n"));
        let err = robot.home().unwrap_err();
        assert!(matches!(err, Pf400Error::Protocol { code: -1009, .. }));
    }

    #[test]
    fn send_reply_keeps_error_text() {
        let mut robot = robot(ScriptedTransport::new().reply("-1046 *Power not enabled*\n"));
        let reply = robot.send_reply(&Command::Attach).unwrap();

        assert_eq!(
            reply,
            Reply::RobotError {
                code: -1046,
                message: "*Power not enabled*".to_string()
            }
        );
    }

    #[test]
    fn single_value_sets_both_default_profiles() {
        let mut robot = robot(ScriptedTransport::new());
        robot.set_profile(&[0.0]).unwrap();

        assert_eq!(
            robot.transport().sent,
            [
                "Profile 1 30 0 100 100 0.1 0.1 0 0\n",
                "Profile 2 80 0 100 100 0.1 0.1 0 0\n"
            ]
        );
    }

    #[test]
    fn eight_values_set_profile_three() {
        let mut robot = robot(ScriptedTransport::new());
        robot.set_profile(&[50.0, 0.0, 90.0, 90.0, 0.2, 0.2, -1.0, 1.0]).unwrap();

        assert_eq!(robot.transport().sent, ["Profile 3 50 0 90 90 0.2 0.2 -1 1\n"]);
    }

    #[test]
    fn other_profile_lengths_send_nothing() {
        for values in [&[][..], &[1.0, 2.0][..], &[1.0; 9][..]] {
            let mut robot = robot(ScriptedTransport::new());
            let err = robot.set_profile(values).unwrap_err();

            assert!(matches!(err, Pf400Error::ProfileArity(n) if n == values.len()));
            assert!(robot.transport().sent.is_empty());
        }
    }

    #[test]
    fn initialize_runs_steps_in_order() {
        let mut robot = robot(ScriptedTransport::new());
        robot.initialize().unwrap();

        let verbs: Vec<&str> = robot
            .transport()
            .sent
            .iter()
            .map(|l| l.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(verbs, ["hp", "attach", "home", "Profile", "Profile", "nop"]);
    }

    #[test]
    fn initialize_stops_at_first_failure() {
        let mut robot = robot(ScriptedTransport::new().reply("0").fail());
        let err = robot.initialize().unwrap_err();

        assert!(err.is_transport());
        assert_eq!(robot.transport().sent, ["hp 1\n", "attach 1\n"]);
    }

    #[test]
    fn move_command_has_one_argument_per_joint() {
        let robot = robot(ScriptedTransport::new());
        for profile in 1..=3 {
            let line = robot.set_move_command("HomeALL", profile, false, false).unwrap();
            let args: Vec<&str> = line.split_whitespace().skip(2).collect();

            assert!(line.starts_with(&format!("MoveJ {profile} ")));
            assert_eq!(args.len(), robot.locations().get("HomeALL").unwrap().len());
        }
    }

    #[test]
    fn locate_parses_and_remembers_pose() {
        let mut robot = robot(ScriptedTransport::new().reply("5 6 7 8 9 10"));
        let joints = robot.locate().unwrap();

        assert_eq!(joints, [5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(robot.last_located(), Some(&joints[..]));
        assert_eq!(robot.transport().sent, ["wherej\n"]);
    }

    #[test]
    fn locate_error_reply_is_not_a_pose() {
        for reply in ["-1046\n", "-1009 *No robot attached*\n"] {
            let mut robot = robot(ScriptedTransport::new().reply(reply));
            let err = robot.locate().unwrap_err();

            assert!(matches!(err, Pf400Error::Protocol { .. }), "{reply:?} gave {err:?}");
            assert_eq!(robot.last_located(), None);
        }
    }

    #[test]
    fn teach_overwrites_home_with_located_pose() {
        let mut robot = robot(ScriptedTransport::new().reply("5 6 7 8 9 10\n"));
        robot.teach("HomeALL", None).unwrap();

        assert_eq!(
            robot.locations().get("HomeALL").unwrap(),
            robot.last_located().unwrap()
        );
    }

    #[test]
    fn teach_station_point() {
        let mut robot = robot(ScriptedTransport::new().reply("1 2 3 4 5 6"));
        robot.teach("above_plate", Some(2)).unwrap();

        assert_eq!(
            robot.locations().get("OT2_2_above_plate").unwrap(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn transport_failure_leaves_table_untouched() {
        let mut robot = robot(ScriptedTransport::new().fail());
        let before = robot.locations().clone();

        let err = robot.teach("HomeALL", None).unwrap_err();

        assert!(err.is_transport());
        assert_eq!(robot.locations(), &before);
        assert_eq!(robot.last_located(), None);
    }

    #[test]
    fn teach_unknown_name_does_not_contact_robot() {
        let mut robot = robot(ScriptedTransport::new());
        let err = robot.teach("somewhere", None).unwrap_err();

        assert!(matches!(err, Pf400Error::UnknownLocation(_)));
        assert!(robot.transport().sent.is_empty());
    }
}
