// 命令行参数解析
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ssh-remote")]
#[command(about = "Run commands and upload files over reusable SSH sessions")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Connections file (JSON); defaults to $SSH_REMOTE_CONFIG or ~/.ssh-remote/connections.json
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Named connection from the connections file (repeat for several hosts)
    #[arg(short = 'c', long = "connection", conflicts_with = "host")]
    pub connections: Vec<String>,

    /// SSH server, optionally with a port: HOST[:PORT]
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// SSH username (with --host)
    #[arg(short, long, requires = "host")]
    pub username: Option<String>,

    /// SSH password (if neither this nor a key is given, will prompt)
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Private key file; its contents are used for authentication
    #[arg(short, long)]
    pub key_file: Option<PathBuf>,

    /// Passphrase for the private key
    #[arg(long, requires = "key_file")]
    pub passphrase: Option<String>,

    /// Session timeout in seconds (with --host; 0 disables)
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Number of hosts handled in parallel
    #[arg(short, long, default_value = "4")]
    pub threads: usize,

    /// Show a progress bar for file uploads
    #[arg(long)]
    pub progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Action,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run shell commands in order on every target
    Exec {
        /// Commands, executed one after another on the same session
        #[arg(required = true)]
        commands: Vec<String>,
        /// Print output lines as they arrive
        #[arg(short, long)]
        stream: bool,
    },
    /// Write literal content to a remote file
    Put {
        /// Remote destination path
        remote_path: String,
        /// Content to write
        content: String,
    },
    /// Upload a local file
    Upload {
        /// Local file path
        local_path: PathBuf,
        /// Remote destination path
        remote_path: String,
        /// Compare MD5 digests after the upload
        #[arg(long)]
        verify: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec_on_named_connections() {
        let cli = Cli::try_parse_from([
            "ssh-remote", "-c", "web", "-c", "db", "exec", "uptime", "df -h", "--stream",
        ])
        .unwrap();
        assert_eq!(cli.connections, vec!["web", "db"]);
        assert_eq!(
            cli.command,
            Action::Exec {
                commands: vec!["uptime".to_string(), "df -h".to_string()],
                stream: true,
            }
        );
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.threads, 4);
    }

    #[test]
    fn test_parse_upload_on_adhoc_host() {
        let cli = Cli::try_parse_from([
            "ssh-remote", "-H", "10.0.0.1:2222", "-u", "root", "-P", "pw",
            "upload", "./app.tar.gz", "/tmp/app.tar.gz", "--verify",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("10.0.0.1:2222"));
        assert!(matches!(cli.command, Action::Upload { verify: true, .. }));
    }

    #[test]
    fn test_connection_and_host_conflict() {
        let result = Cli::try_parse_from([
            "ssh-remote", "-c", "web", "-H", "h", "put", "/tmp/x", "y",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exec_requires_a_command() {
        assert!(Cli::try_parse_from(["ssh-remote", "-c", "web", "exec"]).is_err());
    }
}
