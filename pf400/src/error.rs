use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Pf400Error {
    #[error("transport failure while sending `{command}`: {source}")]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("robot rejected `{command}` with error code {code} ({reply})")]
    Protocol {
        command: String,
        code: i32,
        reply: String,
    },

    #[error("malformed reply to `{command}`: {reply:?}")]
    MalformedReply { command: String, reply: String },

    #[error("unexpected reply to `{command}`: {reply:?}")]
    UnexpectedReply { command: String, reply: String },

    #[error("invalid motion profile {0}, expected 1 (slow), 2 (fast) or 3 (custom)")]
    InvalidProfile(u8),

    #[error("motion profile takes 8 arguments, {0} were given")]
    ProfileArity(usize),

    #[error("unknown location `{0}`")]
    UnknownLocation(String),

    #[error("unknown job `{0}`")]
    UnknownJob(String),

    #[error("location `{location}` has {expected} joints but the robot reported {actual}")]
    JointCountMismatch {
        location: String,
        expected: usize,
        actual: usize,
    },

    #[error("config error in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl Pf400Error {
    pub(crate) fn transport(command: &str, source: std::io::Error) -> Pf400Error {
        Pf400Error::Transport {
            command: command.trim_end().to_string(),
            source,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Pf400Error::Transport { .. })
    }
}

pub type Result<T> = std::result::Result<T, Pf400Error>;
