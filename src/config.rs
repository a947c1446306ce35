// 配置管理
use crate::cli::{Action, Cli};
use crate::connection::{ConnectionConfig, ConnectionRegistry};
use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Password};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// A job for the command-line front end: one operation over one or more hosts.
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Target>,
    pub threads: usize,
    pub show_progress: bool,
    pub operation: Operation,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Exec {
        commands: Vec<String>,
        stream: bool,
    },
    Put {
        remote_path: String,
        content: String,
    },
    Upload {
        local_path: PathBuf,
        remote_path: String,
        verify: bool,
    },
}

impl From<&Action> for Operation {
    fn from(action: &Action) -> Self {
        match action {
            Action::Exec { commands, stream } => Operation::Exec {
                commands: commands.clone(),
                stream: *stream,
            },
            Action::Put { remote_path, content } => Operation::Put {
                remote_path: remote_path.clone(),
                content: content.clone(),
            },
            Action::Upload { local_path, remote_path, verify } => Operation::Upload {
                local_path: local_path.clone(),
                remote_path: remote_path.clone(),
                verify: *verify,
            },
        }
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let targets = if !cli.connections.is_empty() {
            Self::named_targets(cli)?
        } else if cli.host.is_some() {
            vec![Self::adhoc_target(cli)?]
        } else {
            bail!("No target given: use --connection <ID> or --host <HOST>");
        };

        Ok(Config {
            targets,
            threads: cli.threads,
            show_progress: cli.progress,
            operation: Operation::from(&cli.command),
        })
    }

    fn named_targets(cli: &Cli) -> Result<Vec<Target>> {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => ConnectionRegistry::default_path()
                .context("Cannot determine connections file location")?,
        };
        let registry = ConnectionRegistry::load(&path)
            .with_context(|| format!("Failed to load connections file {}", path.display()))?;

        cli.connections
            .iter()
            .map(|id| {
                let connection = registry
                    .resolve(id)
                    .with_context(|| format!("Connection '{}' is not usable", id))?;
                Ok(Target {
                    name: id.clone(),
                    connection,
                })
            })
            .collect()
    }

    fn adhoc_target(cli: &Cli) -> Result<Target> {
        let host = cli.host.as_deref().context("--host is required")?;
        let username = cli.username.as_deref().context("--username is required with --host")?;

        let mut connection = ConnectionConfig::new(host, username)?
            .timeout(Duration::from_secs(cli.timeout));

        match Self::determine_credential(cli, &connection)? {
            AdhocCredential::Password(password) => connection = connection.password(password),
            AdhocCredential::KeyFile(path) => {
                let key_text = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read key file {}", path.display()))?;
                connection = connection.private_key(key_text);
                if let Some(passphrase) = &cli.passphrase {
                    connection = connection.key_passphrase(passphrase.clone());
                }
            }
        }

        Ok(Target {
            name: connection.address(),
            connection,
        })
    }

    fn determine_credential(cli: &Cli, connection: &ConnectionConfig) -> Result<AdhocCredential> {
        // 显式给出的私钥优先
        if let Some(key_file) = &cli.key_file {
            return Ok(AdhocCredential::KeyFile(key_file.clone()));
        }

        if let Some(password) = &cli.password {
            return Ok(AdhocCredential::Password(password.clone()));
        }

        // 尝试查找默认的SSH密钥
        if let Some(home) = home::home_dir() {
            let ssh_dir = home.join(".ssh");
            for key_name in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                let key_path = ssh_dir.join(key_name);
                if key_path.exists() {
                    let use_key = Confirm::new()
                        .with_prompt(format!("Use SSH key {} for authentication?", key_path.display()))
                        .default(true)
                        .interact()?;
                    if use_key {
                        return Ok(AdhocCredential::KeyFile(key_path));
                    }
                }
            }
        }

        let password = Password::new()
            .with_prompt(format!("Enter password for {}@{}", connection.username, connection.host))
            .interact()?;
        Ok(AdhocCredential::Password(password))
    }
}

enum AdhocCredential {
    Password(String),
    KeyFile(PathBuf),
}
