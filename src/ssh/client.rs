// SSH客户端封装
use crate::connection::Credential;
use crate::ssh::sftp::SftpClient;
use crate::ssh::transport::{CommandTransport, Connector, RemoteSession};
use crate::utils::error::Result;
use ssh2::{ExtendedData, Session};
use std::io::{self, BufRead, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Opens ssh2-backed sessions.
#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    chunk_size: usize,
    show_progress: bool,
}

impl Default for Ssh2Connector {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: false,
        }
    }
}

impl Ssh2Connector {
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }
}

impl Connector for Ssh2Connector {
    type Command = SshClient;
    type Transfer = SftpClient;

    fn open_command(&self, host: &str, port: u16, timeout: Duration) -> Result<SshClient> {
        Ok(SshClient {
            session: handshake(host, port, timeout)?,
            last_exit: None,
        })
    }

    fn open_transfer(&self, host: &str, port: u16, timeout: Duration) -> Result<SftpClient> {
        Ok(SftpClient::new(
            handshake(host, port, timeout)?,
            self.chunk_size,
            self.show_progress,
        ))
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    if timeout.is_zero() {
        return Ok(TcpStream::connect((host, port))?);
    }

    let mut last_error = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no address for {}", host)))
        .into())
}

/// Connects and runs the SSH handshake, each step bounded by `timeout`.
pub(crate) fn handshake(host: &str, port: u16, timeout: Duration) -> Result<Session> {
    log::debug!("Connecting to {}:{}...", host, port);
    let tcp = connect_tcp(host, port, timeout)?;

    let mut session = Session::new()?;
    session.set_timeout(timeout_millis(timeout));
    session.set_tcp_stream(tcp);
    session.handshake()?;
    log::debug!("SSH handshake with {}:{} completed", host, port);
    Ok(session)
}

pub(crate) fn authenticate(session: &Session, username: &str, credential: &Credential) -> Result<bool> {
    let attempt = match credential {
        Credential::Password(password) => session.userauth_password(username, password),
        Credential::PrivateKey(key) => {
            session.userauth_pubkey_memory(username, None, &key.text, key.passphrase.as_deref())
        }
    };

    // 认证被拒绝时 libssh2 返回错误，这里统一以 authenticated() 为准
    if let Err(e) = attempt {
        log::debug!("Authentication for {} rejected: {}", username, e);
    }
    Ok(session.authenticated())
}

pub(crate) fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

pub(crate) fn close(session: &Session) -> Result<()> {
    session.disconnect(None, "Closing session", None)?;
    Ok(())
}

/// Command-execution session over ssh2.
pub struct SshClient {
    session: Session,
    last_exit: Option<i32>,
}

impl SshClient {
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl RemoteSession for SshClient {
    fn login(&mut self, username: &str, credential: &Credential) -> Result<bool> {
        authenticate(&self.session, username, credential)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(timeout_millis(timeout));
    }

    fn exit_status(&self) -> Option<i32> {
        self.last_exit
    }

    fn disconnect(&mut self) -> Result<()> {
        close(&self.session)
    }
}

impl CommandTransport for SshClient {
    fn exec(&mut self, command: &str) -> Result<String> {
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(command)?;

        let mut output = Vec::new();
        channel.read_to_end(&mut output)?;
        channel.wait_close()?;
        self.last_exit = Some(channel.exit_status()?);

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn exec_streaming(&mut self, command: &str, on_line: &mut dyn FnMut(&str)) -> Result<()> {
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(command)?;

        {
            let mut reader = BufReader::new(&mut channel);
            let mut line = Vec::new();
            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                let text = String::from_utf8_lossy(&line);
                on_line(text.trim_end_matches(['\n', '\r']));
            }
        }

        channel.wait_close()?;
        self.last_exit = Some(channel.exit_status()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::SessionError;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_timeout_millis() {
        assert_eq!(timeout_millis(Duration::from_secs(10)), 10_000);
        assert_eq!(timeout_millis(Duration::ZERO), 0);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX / 1000)), u32::MAX);
    }

    #[test]
    fn test_connector_chunk_size_never_zero() {
        let connector = Ssh2Connector::default().with_chunk_size(0).with_progress(true);
        assert_eq!(connector.chunk_size(), 1);
        assert!(connector.show_progress());
        assert_eq!(Ssh2Connector::default().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_handshake_gives_up_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // 接受连接但从不发送 SSH banner
        thread::spawn(move || {
            let held: Vec<_> = listener.incoming().take(1).collect();
            thread::sleep(Duration::from_secs(10));
            drop(held);
        });

        let started = Instant::now();
        let result = Ssh2Connector::default().open_command("127.0.0.1", port, Duration::from_secs(1));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[test]
    fn test_connect_refused_is_reported() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = Ssh2Connector::default().open_transfer("127.0.0.1", port, Duration::from_secs(1));
        assert!(matches!(result, Err(SessionError::Io(_))));
    }
}
