use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::{
    config::{secs, RobotConfig},
    error::{Pf400Error, Result},
};

/// Largest reply the robot is expected to send.
pub const MAX_REPLY_LEN: usize = 4096;

/// Sends one command line and returns the robot's reply.
pub trait Transport {
    fn exchange(&mut self, line: &str) -> Result<String>;
}

/// Opens a fresh connection for every command. The stream is dropped, and so
/// closed, on every exit path.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> TcpTransport {
        TcpTransport {
            address: address.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &RobotConfig) -> TcpTransport {
        TcpTransport {
            address: config.address(),
            connect_timeout: secs(config.timing.connect_timeout_secs),
            read_timeout: secs(config.timing.read_timeout_secs),
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> TcpTransport {
        self.read_timeout = timeout;
        self
    }

    /// Zero waits for the OS connect timeout instead.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> TcpTransport {
        self.connect_timeout = timeout;
        self
    }

    fn connect(&self) -> io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> = self
            .address
            .to_socket_addrs()?
            .filter(SocketAddr::is_ipv4)
            .collect();

        let mut last_err = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no IPv4 address for {}", self.address),
        );
        for addr in addrs {
            let stream = if self.connect_timeout.is_zero() {
                TcpStream::connect(addr)
            } else {
                TcpStream::connect_timeout(&addr, self.connect_timeout)
            };
            match stream {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }

    fn round_trip(&self, line: &str) -> io::Result<String> {
        let mut stream = self.connect()?;
        // Zero would mean "block forever" to the OS
        let timeout = Some(self.read_timeout).filter(|t| !t.is_zero());
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        stream.write_all(line.as_bytes())?;
        stream.flush()?;

        let mut buffer = vec![0u8; MAX_REPLY_LEN];
        let mut len = 0;
        while len < MAX_REPLY_LEN {
            let read = match stream.read(&mut buffer[len..]) {
                Ok(read) => read,
                // Some replies come without a newline on a socket left open
                Err(e) if len > 0 && matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    break;
                }
                Err(e) => return Err(e),
            };
            if read == 0 {
                break;
            }
            len += read;
            if buffer[..len].contains(&b'\n') {
                break;
            }
        }

        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed without a reply",
            ));
        }

        Ok(String::from_utf8_lossy(&buffer[..len]).into_owned())
    }
}

impl Transport for TcpTransport {
    fn exchange(&mut self, line: &str) -> Result<String> {
        self.round_trip(line)
            .map_err(|e| Pf400Error::transport(line, e))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{collections::VecDeque, io};

    use super::Transport;
    use crate::error::{Pf400Error, Result};

    /// Records every line and answers from a script. Once the script runs out
    /// every command is acknowledged with `0`.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        pub sent: Vec<String>,
        replies: VecDeque<Option<String>>,
    }

    impl ScriptedTransport {
        pub fn new() -> ScriptedTransport {
            ScriptedTransport::default()
        }

        pub fn reply(mut self, reply: &str) -> ScriptedTransport {
            self.replies.push_back(Some(reply.to_string()));
            self
        }

        /// The next exchange fails as if the connection was refused.
        pub fn fail(mut self) -> ScriptedTransport {
            self.replies.push_back(None);
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn exchange(&mut self, line: &str) -> Result<String> {
            self.sent.push(line.to_string());
            match self.replies.pop_front() {
                Some(Some(reply)) => Ok(reply),
                Some(None) => Err(Pf400Error::transport(
                    line,
                    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
                )),
                None => Ok("0\n".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader},
        net::TcpListener,
        thread,
    };

    use super::*;

    #[test]
    fn round_trip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            (&stream).write_all(b"0\n").unwrap();
            line
        });

        let mut transport = TcpTransport::new(addr.to_string());
        assert_eq!(transport.exchange("nop\n").unwrap(), "0\n");
        assert_eq!(server.join().unwrap(), "nop\n");
    }

    #[test]
    fn reply_without_newline_on_open_socket() {
        for (command, reply) in [("nop\n", "0"), ("wherej\n", "5 6 7 8 9 10")] {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let server = thread::spawn(move || {
                let (stream, _) = listener.accept().unwrap();
                let mut line = String::new();
                BufReader::new(stream.try_clone().unwrap()).read_line(&mut line).unwrap();
                (&stream).write_all(reply.as_bytes()).unwrap();
                thread::sleep(Duration::from_millis(800));
            });

            let mut transport = TcpTransport::new(addr.to_string()).with_read_timeout(Duration::from_millis(300));
            assert_eq!(transport.exchange(command).unwrap(), reply);
            server.join().unwrap();
        }
    }

    #[test]
    fn zero_connect_timeout_still_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(stream.try_clone().unwrap()).read_line(&mut line).unwrap();
            (&stream).write_all(b"0\n").unwrap();
        });

        let mut transport = TcpTransport::new(addr.to_string()).with_connect_timeout(Duration::ZERO);
        assert_eq!(transport.exchange("nop\n").unwrap(), "0\n");
        server.join().unwrap();
    }

    #[test]
    fn refused_connection_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

        let err = TcpTransport::new(addr.to_string()).exchange("nop\n").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn silent_robot_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let mut transport = TcpTransport::new(addr.to_string()).with_read_timeout(Duration::from_millis(50));
        let err = transport.exchange("home\n").unwrap_err();

        assert!(err.is_transport());
        server.join().unwrap();
    }
}
