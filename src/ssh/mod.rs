// SSH模块入口
pub mod client;
pub mod session;
pub mod sftp;
pub mod transport;

pub use client::{Ssh2Connector, SshClient};
pub use session::{Commands, SessionHandle, SessionKind, SessionManager};
pub use sftp::SftpClient;
pub use transport::{CommandTransport, Connector, RemoteSession, TransferTransport, UploadSource};
