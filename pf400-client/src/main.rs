use std::{env, path::PathBuf};

use anyhow::{bail, Context};
use pf400::{routines::RoutineReport, Pf400};

const DEFAULT_CONFIG: &str = "utils/robot_data.json";

fn main() -> anyhow::Result<()> {
    setup_logging();

    let mut args = env::args().skip(1);
    let config_path = args
        .next()
        .map(PathBuf::from)
        .or_else(|| env::var_os("PF400_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let operation = args.next().unwrap_or_else(|| "power".to_string());
    let rest: Vec<String> = args.collect();

    log::info!("Loading robot data from {}", config_path.display());
    let mut robot = Pf400::from_path(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    match operation.as_str() {
        "power" => robot.enable_power()?,
        "init" => robot.initialize()?,
        "home" => robot.home()?,
        "stop" => robot.stop()?,
        "heartbeat" => robot.check_heartbeat()?,
        "locate" => {
            let joints = robot.locate()?;
            println!("{}", joints.iter().map(f64::to_string).collect::<Vec<_>>().join(" "));
        }
        "move" => {
            let location = rest.first().context("move needs a location")?;
            let profile = rest.get(1).map(|p| p.parse()).transpose()?.unwrap_or(2);
            robot.move_single(location, profile, false, false)?;
        }
        "job" => {
            let name = rest.first().context("job needs a name")?;
            let from = rest.get(1).map(|s| s.parse()).transpose()?.unwrap_or(1);
            let to = rest.get(2).map(|s| s.parse()).transpose()?.unwrap_or(2);
            let reports = robot.program_robot_target(name, [from, to])?;
            log_reports(&reports);
        }
        "teach" => {
            let location = rest.first().context("teach needs a location")?;
            let station = rest.get(1).map(|s| s.parse()).transpose()?;
            robot.teach(location, station)?;
            robot.config().save(&config_path)?;
            log::info!("Saved taught location to {}", config_path.display());
        }
        other => bail!("Unknown operation {other}"),
    }

    Ok(())
}

fn log_reports(reports: &[RoutineReport]) {
    for report in reports {
        for failure in report.failures() {
            if let Some(e) = &failure.error {
                log::error!("[{}] {} failed: {e}", report.name, failure.location);
            }
        }
        if report.skipped > 0 {
            log::warn!("[{}] {} moves skipped", report.name, report.skipped);
        }
    }
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    log::info!("Job finished, {failed} of {} routines had failures", reports.len());
}

fn setup_logging() {
    simple_log::quick!();
}
