use crate::error::{Pf400Error, Result};

/// A single reply line from the robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Leading `0`, with whatever followed it.
    Success(String),
    RobotError { code: i32, message: String },
}

impl Reply {
    pub fn parse(command: &str, raw: &str) -> Result<Reply> {
        let text = raw.trim();
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim_start()),
            None => (text, ""),
        };

        let code = head.parse::<i32>().map_err(|_| Pf400Error::MalformedReply {
            command: command.trim_end().to_string(),
            reply: raw.to_string(),
        })?;

        Ok(match code {
            0 => Reply::Success(rest.to_string()),
            code => Reply::RobotError {
                code,
                message: rest.to_string(),
            },
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }
}

/// Accepts only a bare `0`.
pub(crate) fn expect_ack(command: &str, raw: &str) -> Result<()> {
    match Reply::parse(command, raw)? {
        Reply::Success(rest) if rest.is_empty() => Ok(()),
        Reply::Success(_) => Err(Pf400Error::UnexpectedReply {
            command: command.trim_end().to_string(),
            reply: raw.to_string(),
        }),
        Reply::RobotError { code, .. } => Err(Pf400Error::Protocol {
            command: command.trim_end().to_string(),
            code,
            reply: raw.trim().to_string(),
        }),
    }
}

/// `wherej` answers with bare joint values, so only a reply carrying a
/// `*message*` or a lone negative code is read as a robot error.
pub(crate) fn reject_robot_error(command: &str, raw: &str) -> Result<()> {
    let text = raw.trim();
    let lone_code = text.parse::<i32>().is_ok_and(|code| code < 0);
    if !text.contains('*') && !lone_code {
        return Ok(());
    }

    match Reply::parse(command, raw)? {
        Reply::RobotError { code, .. } => Err(Pf400Error::Protocol {
            command: command.trim_end().to_string(),
            code,
            reply: text.to_string(),
        }),
        Reply::Success(_) => Ok(()),
    }
}

/// Parses a `wherej` reply into joint values.
pub(crate) fn parse_joints(command: &str, raw: &str) -> Result<Vec<f64>> {
    let joints = raw
        .split_whitespace()
        .map(str::parse::<f64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .ok()
        .filter(|joints| !joints.is_empty());

    joints.ok_or_else(|| Pf400Error::MalformedReply {
        command: command.trim_end().to_string(),
        reply: raw.to_string(),
    })
}
