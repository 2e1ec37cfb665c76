use std::{
    env,
    io::{BufRead, BufReader, Write},
    net::{TcpListener, TcpStream},
    time::Duration,
};

use anyhow::{bail, Context};
use rand::{thread_rng, Rng};
use simulated_arm::{SimArm, ERR_SIMULATED_FAULT};

mod simulated_arm;

const DEFAULT_PORT: u16 = 10100;
// A client that connects and never sends a line is dropped after this
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    setup_logging();

    let port = match env::args().nth(1) {
        Some(port) => port.parse().context("Invalid port")?,
        None => DEFAULT_PORT,
    };
    let fault_rate = match env::var("PF400_SIM_FAULT_RATE") {
        Ok(rate) => rate.parse::<f64>().context("Invalid PF400_SIM_FAULT_RATE")?,
        Err(_) => 0.0,
    };
    if !(0.0..=1.0).contains(&fault_rate) {
        bail!("PF400_SIM_FAULT_RATE must be between 0.0 and 1.0, got {fault_rate}");
    }

    let listener = TcpListener::bind(("0.0.0.0", port))?;
    log::info!("Simulated PF400 listening on port {port} (fault rate {fault_rate})");

    let mut arm = SimArm::initial();
    let mut rng = thread_rng();

    // The controller serializes commands, so one connection at a time
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Error accepting connection {e:?}");
                continue;
            }
        };

        let inject_fault = rng.gen_bool(fault_rate);
        if let Err(e) = serve_command(stream, &mut arm, inject_fault, CLIENT_READ_TIMEOUT) {
            log::error!("Error serving command: {e}");
        }
    }

    Ok(())
}

fn serve_command(
    stream: TcpStream,
    arm: &mut SimArm,
    inject_fault: bool,
    read_timeout: Duration,
) -> anyhow::Result<()> {
    stream.set_read_timeout(Some(read_timeout))?;

    let mut line = String::new();
    BufReader::new(&stream)
        .read_line(&mut line)
        .context("No command from client")?;
    if line.is_empty() {
        return Ok(());
    }

    let reply = if inject_fault {
        log::warn!("Injecting fault for {}", line.trim_end());
        simulated_arm::error(ERR_SIMULATED_FAULT, "Simulated fault")
    } else {
        arm.handle(&line)
    };
    log::debug!("{} -> {}", line.trim_end(), reply.trim_end());

    (&stream).write_all(reply.as_bytes())?;

    Ok(())
}

fn setup_logging() {
    simple_log::quick!();
}
