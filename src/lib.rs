// 库文件，导出模块
pub mod cli;
pub mod config;
pub mod connection;
pub mod ssh;
pub mod threadpool;
pub mod transfer;
pub mod utils;

use anyhow::{anyhow, bail, Context, Result};
use config::{Config, Operation};
use ssh::{Connector, Ssh2Connector, SessionManager};
use threadpool::ThreadPool;
use utils::file::{calculate_md5, parse_md5sum_output, shell_quote};

pub use connection::{ConfigSource, ConnectionConfig, ConnectionRegistry};
pub use ssh::{Commands, SessionKind};
pub use utils::error::{Result as SessionResult, SessionError};

/// What one host produced for an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Exec {
        outputs: Vec<String>,
        exit_code: Option<i32>,
    },
    Put {
        bytes: usize,
    },
    Upload {
        verified: bool,
    },
}

#[derive(Debug)]
pub struct HostReport {
    pub target: String,
    pub result: Result<Outcome>,
}

/// Runs `operation` through `manager`, reusing whatever sessions it already holds.
///
/// Streaming output is echoed as `[target] line` while it arrives.
pub fn execute_operation<C: Connector>(
    manager: &mut SessionManager<C>,
    target: &str,
    operation: &Operation,
) -> Result<Outcome> {
    match operation {
        Operation::Exec { commands, stream } => {
            let commands = Commands::from(commands.as_slice());
            let outputs = if *stream {
                manager
                    .run_with(commands, |line| {
                        println!("[{}] {}", target, line);
                        line.to_string()
                    })?
                    .into_iter()
                    .map(|lines| lines.join("\n"))
                    .collect()
            } else {
                manager.run(commands)?
            };
            let exit_code = manager.last_exit_code()?;
            Ok(Outcome::Exec { outputs, exit_code })
        }
        Operation::Put { remote_path, content } => {
            manager.upload_content(remote_path, content)?;
            Ok(Outcome::Put { bytes: content.len() })
        }
        Operation::Upload { local_path, remote_path, verify } => {
            if !local_path.is_file() {
                bail!("Local file does not exist: {}", local_path.display());
            }
            manager.upload_file(remote_path, local_path)?;
            if *verify {
                verify_upload(manager, local_path, remote_path)?;
            }
            Ok(Outcome::Upload { verified: *verify })
        }
    }
}

fn verify_upload<C: Connector>(
    manager: &mut SessionManager<C>,
    local_path: &std::path::Path,
    remote_path: &str,
) -> Result<()> {
    let local_digest = calculate_md5(local_path)
        .with_context(|| format!("Failed to hash {}", local_path.display()))?;

    let output = manager.run(format!("md5sum {}", shell_quote(remote_path)))?;
    let remote_digest = output
        .first()
        .and_then(|out| parse_md5sum_output(out))
        .ok_or_else(|| anyhow!("Could not read remote checksum of {}", remote_path))?;

    if manager.last_exit_code()? != Some(0) {
        bail!("md5sum failed on remote file {}", remote_path);
    }
    if remote_digest != local_digest {
        bail!(
            "Checksum mismatch for {}: local {} remote {}",
            remote_path,
            local_digest,
            remote_digest
        );
    }
    log::info!("Verified {} ({})", remote_path, local_digest);
    Ok(())
}

/// Runs the job on every target over ssh2, several hosts at a time.
pub fn run_job(config: Config) -> Vec<HostReport> {
    let connector = Ssh2Connector::default().with_progress(config.show_progress);
    run_job_with(config, connector)
}

/// Runs the job on every target using clones of `connector`.
///
/// Each host gets its own [`SessionManager`]; reports come back in target order.
pub fn run_job_with<C>(config: Config, connector: C) -> Vec<HostReport>
where
    C: Connector + Clone + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let total = config.targets.len();

    {
        let pool = ThreadPool::new(config.threads.min(total.max(1)));
        for (index, target) in config.targets.into_iter().enumerate() {
            let job_tx = tx.clone();
            let operation = config.operation.clone();
            let connector = connector.clone();

            let name = target.name.clone();
            let submitted = pool.execute(move || {
                let mut manager = SessionManager::with_connector(target.connection, connector);
                let result = execute_operation(&mut manager, &target.name, &operation);
                manager.close();
                // 接收端在收集完成前一直存在
                let _ = job_tx.send((index, HostReport { target: target.name, result }));
            });
            if let Err(e) = submitted {
                let _ = tx.send((index, HostReport { target: name, result: Err(e) }));
            }
        }
    }
    drop(tx);

    let mut reports: Vec<(usize, HostReport)> = rx.iter().collect();
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}
