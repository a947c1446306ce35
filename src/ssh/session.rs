// SSH会话管理
use crate::connection::{ConfigSource, ConnectionConfig};
use crate::ssh::client::Ssh2Connector;
use crate::ssh::transport::{CommandTransport, Connector, RemoteSession, TransferTransport, UploadSource};
use crate::utils::error::{Result, SessionError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Command,
    Transfer,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Command => f.write_str("command"),
            SessionKind::Transfer => f.write_str("transfer"),
        }
    }
}

impl FromStr for SessionKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "command" | "ssh" => Ok(SessionKind::Command),
            "transfer" | "sftp" => Ok(SessionKind::Transfer),
            other => Err(SessionError::InvalidKind { kind: other.to_string() }),
        }
    }
}

/// Borrowed session of either kind, as returned by [`SessionManager::acquire_session`].
pub enum SessionHandle<'a, C: Connector> {
    Command(&'a mut C::Command),
    Transfer(&'a mut C::Transfer),
}

impl<C: Connector> SessionHandle<'_, C> {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionHandle::Command(_) => SessionKind::Command,
            SessionHandle::Transfer(_) => SessionKind::Transfer,
        }
    }
}

/// An ordered batch of shell commands. Built from one command or a list of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commands(Vec<String>);

impl Commands {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Commands {
    fn from(command: &str) -> Self {
        Commands(vec![command.to_string()])
    }
}

impl From<String> for Commands {
    fn from(command: String) -> Self {
        Commands(vec![command])
    }
}

impl<S: Into<String>> From<Vec<S>> for Commands {
    fn from(commands: Vec<S>) -> Self {
        Commands(commands.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Commands {
    fn from(commands: [S; N]) -> Self {
        Commands(commands.into_iter().map(Into::into).collect())
    }
}

impl<S: AsRef<str>> From<&[S]> for Commands {
    fn from(commands: &[S]) -> Self {
        Commands(commands.iter().map(|c| c.as_ref().to_string()).collect())
    }
}

/// Lazily opened, cached command and transfer sessions to one host.
///
/// Each kind of session is connected and authenticated the first time it is needed and
/// then reused for the life of the manager. Both are disconnected when the manager is
/// dropped.
pub struct SessionManager<C: Connector = Ssh2Connector> {
    config: ConnectionConfig,
    connector: C,
    command: Option<C::Command>,
    transfer: Option<C::Transfer>,
    last_used: Option<SessionKind>,
}

impl SessionManager<Ssh2Connector> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(config, Ssh2Connector::default())
    }

    pub fn from_named_connection<S: ConfigSource + ?Sized>(id: &str, source: &S) -> Result<Self> {
        Self::named_with_connector(id, source, Ssh2Connector::default())
    }
}

impl<C: Connector> SessionManager<C> {
    pub fn with_connector(config: ConnectionConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            command: None,
            transfer: None,
            last_used: None,
        }
    }

    pub fn named_with_connector<S: ConfigSource + ?Sized>(
        id: &str,
        source: &S,
        connector: C,
    ) -> Result<Self> {
        let config = source
            .lookup(id)
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        Ok(Self::with_connector(config, connector))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn has_session(&self, kind: SessionKind) -> bool {
        match kind {
            SessionKind::Command => self.command.is_some(),
            SessionKind::Transfer => self.transfer.is_some(),
        }
    }

    pub fn acquire_command_session(&mut self) -> Result<&mut C::Command> {
        let session = match self.command.take() {
            Some(session) => session,
            None => {
                let session = self
                    .connector
                    .open_command(&self.config.host, self.config.port, self.config.timeout)?;
                establish(session, &self.config, SessionKind::Command)?
            }
        };
        self.last_used = Some(SessionKind::Command);
        Ok(self.command.insert(session))
    }

    pub fn acquire_transfer_session(&mut self) -> Result<&mut C::Transfer> {
        let session = match self.transfer.take() {
            Some(session) => session,
            None => {
                let session = self
                    .connector
                    .open_transfer(&self.config.host, self.config.port, self.config.timeout)?;
                establish(session, &self.config, SessionKind::Transfer)?
            }
        };
        self.last_used = Some(SessionKind::Transfer);
        Ok(self.transfer.insert(session))
    }

    pub fn acquire_session(&mut self, kind: SessionKind) -> Result<SessionHandle<'_, C>> {
        match kind {
            SessionKind::Command => self.acquire_command_session().map(SessionHandle::Command),
            SessionKind::Transfer => self.acquire_transfer_session().map(SessionHandle::Transfer),
        }
    }

    /// Runs each command in order and returns its captured output.
    ///
    /// A transport error stops the batch. A non-zero exit status does not; check
    /// [`last_exit_code`](Self::last_exit_code) afterwards.
    pub fn run(&mut self, commands: impl Into<Commands>) -> Result<Vec<String>> {
        let commands = commands.into();
        let address = self.config.address();
        let session = self.acquire_command_session()?;

        let mut output = Vec::with_capacity(commands.len());
        for command in commands.iter() {
            log::debug!("[{}] $ {}", address, command);
            output.push(session.exec(command)?);
        }
        Ok(output)
    }

    /// Streams each command, mapping every output line through `on_line` as it arrives.
    ///
    /// Returns one entry per command holding the callback's results in arrival order.
    pub fn run_with<T, F>(&mut self, commands: impl Into<Commands>, mut on_line: F) -> Result<Vec<Vec<T>>>
    where
        F: FnMut(&str) -> T,
    {
        let commands = commands.into();
        let address = self.config.address();
        let session = self.acquire_command_session()?;

        let mut output = Vec::with_capacity(commands.len());
        for command in commands.iter() {
            log::debug!("[{}] $ {} (streaming)", address, command);
            let mut lines = Vec::new();
            session.exec_streaming(command, &mut |line| lines.push(on_line(line)))?;
            output.push(lines);
        }
        Ok(output)
    }

    pub fn upload_content(&mut self, remote_path: &str, content: impl AsRef<[u8]>) -> Result<&mut Self> {
        let content = content.as_ref();
        log::debug!("[{}] put {} bytes -> {}", self.config.address(), content.len(), remote_path);
        self.acquire_transfer_session()?
            .put(remote_path, UploadSource::Bytes(content))?;
        Ok(self)
    }

    pub fn upload_file(&mut self, remote_path: &str, local_path: impl AsRef<Path>) -> Result<&mut Self> {
        let local_path = local_path.as_ref();
        log::debug!(
            "[{}] upload {} -> {}",
            self.config.address(),
            local_path.display(),
            remote_path
        );
        self.acquire_transfer_session()?
            .put(remote_path, UploadSource::LocalFile(local_path))?;
        Ok(self)
    }

    /// Exit status of the last command run on the most recently acquired session.
    ///
    /// `Ok(None)` means that session has not run a command.
    pub fn last_exit_code(&self) -> Result<Option<i32>> {
        match self.last_used {
            None => Err(SessionError::NoActiveSession),
            Some(SessionKind::Command) => Ok(self.command.as_ref().and_then(|s| s.exit_status())),
            Some(SessionKind::Transfer) => Ok(self.transfer.as_ref().and_then(|s| s.exit_status())),
        }
    }

    /// Ends the manager's lifetime now, disconnecting whatever is open.
    pub fn close(self) {}
}

fn establish<S: RemoteSession>(mut session: S, config: &ConnectionConfig, kind: SessionKind) -> Result<S> {
    let credential = config.credential()?;
    if !session.login(&config.username, &credential)? {
        return Err(SessionError::Authentication { kind });
    }
    session.set_timeout(config.timeout);

    log::info!("{} session established: {}@{}", kind, config.username, config.address());
    Ok(session)
}

impl<C: Connector> Drop for SessionManager<C> {
    fn drop(&mut self) {
        if let Some(mut session) = self.command.take() {
            if let Err(e) = session.disconnect() {
                log::warn!("Failed to disconnect command session to {}: {}", self.config.address(), e);
            }
        }
        if let Some(mut session) = self.transfer.take() {
            if let Err(e) = session.disconnect() {
                log::warn!("Failed to disconnect transfer session to {}: {}", self.config.address(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_kind_parsing() {
        assert_eq!("command".parse::<SessionKind>().unwrap(), SessionKind::Command);
        assert_eq!("ssh".parse::<SessionKind>().unwrap(), SessionKind::Command);
        assert_eq!("sftp".parse::<SessionKind>().unwrap(), SessionKind::Transfer);
        assert!(matches!(
            "bogus".parse::<SessionKind>(),
            Err(SessionError::InvalidKind { kind }) if kind == "bogus"
        ));
    }

    #[test]
    fn test_commands_conversions() {
        assert_eq!(Commands::from("ls").len(), 1);
        assert_eq!(Commands::from(["a", "b"]).iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(Commands::from(vec![String::from("x")]).len(), 1);
        let slice: &[&str] = &["1", "2", "3"];
        assert_eq!(Commands::from(slice).len(), 3);
        assert!(Commands::from(Vec::<String>::new()).is_empty());
    }
}
