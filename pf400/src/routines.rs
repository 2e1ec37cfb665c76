//! Canned plate handling sequences built from stored locations.

use std::thread::sleep;

use crate::{
    commands::{self, Command},
    config::{secs, RoutinePolicy},
    error::{Pf400Error, Result},
    locations::{station_location, COMPLETED_PLATE, COMPLETED_PLATE_ABOVE},
    reply,
    transport::Transport,
    Pf400,
};

pub const HOME_ALL: &str = "HomeALL";

/// Slow and fast profile indices for a requested profile. Custom profile 3
/// is used for both, anything else uses the defaults 1 and 2.
pub fn speeds(profile: u8) -> (u8, u8) {
    match profile {
        3 => (3, 3),
        _ => (1, 2),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub location: String,
    pub profile: u8,
    pub grip: bool,
    pub release: bool,
}

impl Step {
    fn moving(location: impl Into<String>, profile: u8) -> Step {
        Step {
            location: location.into(),
            profile,
            grip: false,
            release: false,
        }
    }

    fn gripping(location: impl Into<String>, profile: u8) -> Step {
        Step {
            grip: true,
            ..Step::moving(location, profile)
        }
    }

    fn releasing(location: impl Into<String>, profile: u8) -> Step {
        Step {
            release: true,
            ..Step::moving(location, profile)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Routine {
    pub fn pick_plate_ot2(station: u32, profile: u8) -> Routine {
        let (slow, fast) = speeds(profile);
        let at = |suffix| station_location(station, suffix);

        Routine {
            name: format!("pick_plate_ot2 ID:{station}"),
            steps: vec![
                Step::moving(at("front"), fast),
                Step::moving(at("above_plate"), fast),
                Step::moving(at("pick_plate"), fast),
                Step::gripping(at("pick_plate"), slow),
                Step::gripping(at("above_plate"), slow),
                Step::gripping(at("front"), slow),
            ],
        }
    }

    pub fn drop_plate_ot2(station: u32, profile: u8) -> Routine {
        let (slow, fast) = speeds(profile);
        let at = |suffix| station_location(station, suffix);

        Routine {
            name: format!("drop_plate_ot2 ID:{station}"),
            steps: vec![
                Step::gripping(at("front"), slow),
                Step::gripping(at("above_plate"), slow),
                Step::gripping(at("pick_plate"), slow),
                Step::releasing(at("pick_plate"), slow),
                Step::moving(at("above_plate"), fast),
                Step::moving(at("front"), fast),
            ],
        }
    }

    pub fn pick_plate_from_rack(station: u32, profile: u8) -> Routine {
        let (slow, fast) = speeds(profile);
        let at = |suffix| station_location(station, suffix);

        Routine {
            name: format!("pick_plate_from_rack ID:{station}"),
            steps: vec![
                Step::moving(at("approach_plate_rack"), fast),
                Step::moving(at("front_plate_rack"), slow),
                Step::moving(at("plate_rack"), slow),
                Step::gripping(at("plate_rack"), slow),
                Step::gripping(at("front_plate_rack"), slow),
                Step::gripping(at("approach_plate_rack"), slow),
            ],
        }
    }

    pub fn drop_complete_plate(profile: u8) -> Routine {
        let (slow, _) = speeds(profile);

        Routine {
            name: "drop_complete_plate".to_string(),
            steps: vec![
                Step::gripping(COMPLETED_PLATE_ABOVE, slow),
                Step::gripping(COMPLETED_PLATE, slow),
                Step::releasing(COMPLETED_PLATE, slow),
                Step::moving(COMPLETED_PLATE_ABOVE, slow),
            ],
        }
    }

    pub fn single(location: &str, profile: u8, grip: bool, release: bool) -> Routine {
        Routine {
            name: format!("move_single {location}"),
            steps: vec![Step {
                location: location.to_string(),
                profile,
                grip,
                release,
            }],
        }
    }
}

#[derive(Debug)]
pub struct StepOutcome {
    pub location: String,
    pub command: String,
    pub error: Option<Pf400Error>,
}

#[derive(Debug)]
pub struct RoutineReport {
    pub name: String,
    pub steps: Vec<StepOutcome>,
    /// Moves never sent because an earlier one failed under `Abort`.
    pub skipped: usize,
}

impl RoutineReport {
    pub fn is_success(&self) -> bool {
        self.skipped == 0 && self.steps.iter().all(|s| s.error.is_none())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    /// The first failure, if any.
    pub fn into_result(self) -> Result<()> {
        match self.steps.into_iter().find_map(|s| s.error) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A multi-routine job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Move a plate from one OT2 station to another.
    Transfer { from: u32, to: u32 },
    /// Rack, through stations 1 to 3, into the completed bin.
    FullTransfer,
}

impl Job {
    pub fn parse(name: &str, stations: [u32; 2]) -> Result<Job> {
        match name.to_ascii_uppercase().as_str() {
            "TRANSFER" => Ok(Job::Transfer {
                from: stations[0],
                to: stations[1],
            }),
            "FULL_TRANSFER" => Ok(Job::FullTransfer),
            _ => Err(Pf400Error::UnknownJob(name.to_string())),
        }
    }
}

impl<T: Transport> Pf400<T> {
    /// Sends every step of a routine in order. All commands are built first, so
    /// an unknown location fails before the robot moves.
    pub fn run_routine(&mut self, routine: &Routine) -> Result<RoutineReport> {
        let commands = self.build_commands(routine)?;

        let policy = self.config().routine_policy;
        let total = commands.len();
        let mut report = RoutineReport {
            name: routine.name.clone(),
            steps: Vec::with_capacity(total),
            skipped: 0,
        };

        for (n, (step, command)) in routine.steps.iter().zip(&commands).enumerate() {
            let result = self
                .send(command)
                .and_then(|raw| reply::expect_ack(&command.line(), &raw));

            let failed = result.is_err();
            match &result {
                Ok(()) => log::info!(
                    "[{}] Robot is moved to {} ({}/{total})",
                    routine.name,
                    step.location,
                    n + 1
                ),
                Err(e) => log::error!(
                    "[{}] Failed to move the robot to {} ({}/{total}): {e}",
                    routine.name,
                    step.location,
                    n + 1
                ),
            }
            report.steps.push(StepOutcome {
                location: step.location.clone(),
                command: command.to_string(),
                error: result.err(),
            });

            if failed && policy == RoutinePolicy::Abort {
                report.skipped = total - (n + 1);
                log::warn!("[{}] Aborting, {} moves not sent", routine.name, report.skipped);
                break;
            }
        }

        Ok(report)
    }

    fn build_commands(&self, routine: &Routine) -> Result<Vec<Command>> {
        routine
            .steps
            .iter()
            .map(|step| {
                commands::move_to_location(self.locations(), &step.location, step.profile, step.grip, step.release)
            })
            .collect()
    }

    pub fn pick_plate_ot2(&mut self, station: u32, profile: u8) -> Result<RoutineReport> {
        self.run_routine(&Routine::pick_plate_ot2(station, profile))
    }

    pub fn drop_plate_ot2(&mut self, station: u32, profile: u8) -> Result<RoutineReport> {
        self.run_routine(&Routine::drop_plate_ot2(station, profile))
    }

    pub fn pick_plate_from_rack(&mut self, station: u32, profile: u8) -> Result<RoutineReport> {
        self.run_routine(&Routine::pick_plate_from_rack(station, profile))
    }

    pub fn drop_complete_plate(&mut self, profile: u8) -> Result<RoutineReport> {
        self.run_routine(&Routine::drop_complete_plate(profile))
    }

    /// Executes one movement to a stored location.
    pub fn move_single(&mut self, location: &str, profile: u8, grip: bool, release: bool) -> Result<()> {
        self.run_routine(&Routine::single(location, profile, grip, release))?
            .into_result()
    }

    /// Runs a named job from its home position. Under `Abort` the job stops
    /// after the first routine with a failed move.
    pub fn program_robot_target(&mut self, job: &str, stations: [u32; 2]) -> Result<Vec<RoutineReport>> {
        let job = Job::parse(job, stations)?;
        let dwell = secs(self.config().timing.transfer_dwell_secs);

        let plan: Vec<(Routine, bool)> = match job {
            Job::Transfer { from, to } => {
                log::info!("Executing plate transfer between OT2 ID: {from} and OT2 ID: {to}");
                vec![
                    (Routine::single(HOME_ALL, 2, false, false), false),
                    (Routine::pick_plate_ot2(from, 0), false),
                    (Routine::drop_plate_ot2(to, 0), false),
                ]
            }
            Job::FullTransfer => {
                log::info!("Executing full transfer");
                vec![
                    (Routine::single(HOME_ALL, 2, false, false), false),
                    (Routine::pick_plate_from_rack(1, 0), false),
                    (Routine::drop_plate_ot2(1, 0), true),
                    (Routine::pick_plate_ot2(1, 0), false),
                    (Routine::drop_plate_ot2(2, 0), true),
                    (Routine::pick_plate_ot2(2, 0), false),
                    (Routine::drop_plate_ot2(3, 0), true),
                    (Routine::pick_plate_ot2(3, 0), false),
                    (Routine::drop_complete_plate(0), false),
                ]
            }
        };

        // Every routine must resolve before the arm picks anything up
        for (routine, _) in &plan {
            self.build_commands(routine)?;
        }

        let abort = self.config().routine_policy == RoutinePolicy::Abort;
        let mut reports = Vec::with_capacity(plan.len());
        for (routine, dwell_after) in plan {
            let report = self.run_routine(&routine)?;
            let ok = report.is_success();
            reports.push(report);

            if !ok && abort {
                log::warn!("Stopping job after failed routine {}", routine.name);
                break;
            }
            if dwell_after {
                sleep(dwell);
            }
        }

        Ok(reports)
    }
}
