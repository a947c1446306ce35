// 传输层抽象：由 ssh2 实现，测试中可替换
use crate::connection::Credential;
use crate::utils::error::Result;
use std::path::Path;
use std::time::Duration;

/// Capabilities shared by every kind of remote session.
pub trait RemoteSession {
    /// Returns `Ok(false)` when the server rejects the credential.
    fn login(&mut self, username: &str, credential: &Credential) -> Result<bool>;

    fn set_timeout(&mut self, timeout: Duration);

    /// Exit status of the last command run on this session, if any.
    fn exit_status(&self) -> Option<i32>;

    fn disconnect(&mut self) -> Result<()>;
}

pub trait CommandTransport: RemoteSession {
    fn exec(&mut self, command: &str) -> Result<String>;

    /// Runs `command`, handing each output line (without its terminator) to `on_line`
    /// as soon as it is read.
    fn exec_streaming(&mut self, command: &str, on_line: &mut dyn FnMut(&str)) -> Result<()>;
}

pub trait TransferTransport: RemoteSession {
    /// Writes `source` to `remote_path`, replacing whatever is there.
    fn put(&mut self, remote_path: &str, source: UploadSource<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub enum UploadSource<'a> {
    Bytes(&'a [u8]),
    LocalFile(&'a Path),
}

/// Opens unauthenticated sessions of either kind.
///
/// `timeout` bounds the TCP connect and the protocol handshake; zero means unbounded.
pub trait Connector {
    type Command: CommandTransport;
    type Transfer: TransferTransport;

    fn open_command(&self, host: &str, port: u16, timeout: Duration) -> Result<Self::Command>;
    fn open_transfer(&self, host: &str, port: u16, timeout: Duration) -> Result<Self::Transfer>;
}
