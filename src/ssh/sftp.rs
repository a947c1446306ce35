// SFTP 上传会话
use crate::connection::Credential;
use crate::ssh::client::{authenticate, close, timeout_millis};
use crate::ssh::transport::{RemoteSession, TransferTransport, UploadSource};
use crate::transfer::progress::ProgressTracker;
use crate::utils::error::Result;
use ssh2::{Session, Sftp};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

/// File-transfer session over ssh2. The SFTP subsystem is started on first use.
pub struct SftpClient {
    session: Session,
    sftp: Option<Sftp>,
    chunk_size: usize,
    show_progress: bool,
}

impl SftpClient {
    pub(crate) fn new(session: Session, chunk_size: usize, show_progress: bool) -> Self {
        Self {
            session,
            sftp: None,
            chunk_size,
            show_progress,
        }
    }

    fn sftp(&mut self) -> Result<&Sftp> {
        let sftp = match self.sftp.take() {
            Some(sftp) => sftp,
            None => self.session.sftp()?,
        };
        let sftp: &Sftp = self.sftp.insert(sftp);
        Ok(sftp)
    }
}

impl RemoteSession for SftpClient {
    fn login(&mut self, username: &str, credential: &Credential) -> Result<bool> {
        authenticate(&self.session, username, credential)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(timeout_millis(timeout));
    }

    // SFTP 会话不执行命令
    fn exit_status(&self) -> Option<i32> {
        None
    }

    fn disconnect(&mut self) -> Result<()> {
        self.sftp = None;
        close(&self.session)
    }
}

/// Upload source opened and sized before anything on the remote side is touched.
enum PreparedSource<'a> {
    Bytes(&'a [u8]),
    File { file: File, size: u64, path: &'a Path },
}

fn prepare_source(source: UploadSource<'_>) -> Result<PreparedSource<'_>> {
    match source {
        UploadSource::Bytes(bytes) => Ok(PreparedSource::Bytes(bytes)),
        UploadSource::LocalFile(path) => {
            let file = File::open(path)?;
            let metadata = file.metadata()?;
            if !metadata.is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} is not a regular file", path.display()),
                )
                .into());
            }
            Ok(PreparedSource::File {
                file,
                size: metadata.len(),
                path,
            })
        }
    }
}

/// Copies `reader` into `writer` one chunk at a time, reporting the running total.
fn copy_in_chunks<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    mut on_progress: impl FnMut(u64),
) -> io::Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total_transferred = 0u64;
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total_transferred),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..bytes_read])?;
        total_transferred += bytes_read as u64;
        on_progress(total_transferred);
    }
}

impl TransferTransport for SftpClient {
    fn put(&mut self, remote_path: &str, source: UploadSource<'_>) -> Result<()> {
        // 本地文件必须先打开成功，再截断远程文件
        let source = prepare_source(source)?;

        let chunk_size = self.chunk_size;
        let show_progress = self.show_progress;
        let sftp = self.sftp()?;
        let mut remote_file = sftp.create(Path::new(remote_path))?;

        match source {
            PreparedSource::Bytes(bytes) => {
                remote_file.write_all(bytes)?;
            }
            PreparedSource::File { mut file, size, path } => {
                let progress = show_progress
                    .then(|| ProgressTracker::new(size, &format!("Uploading {}", path.display())));

                let copied = copy_in_chunks(&mut file, &mut remote_file, chunk_size, |total| {
                    if let Some(progress) = &progress {
                        progress.update(total);
                    }
                });

                match (copied, &progress) {
                    (Ok(_), Some(progress)) => progress.finish(),
                    (Err(e), Some(progress)) => {
                        progress.finish_with_error(&e.to_string());
                        return Err(e.into());
                    }
                    (Err(e), None) => return Err(e.into()),
                    (Ok(_), None) => {}
                }
            }
        }

        // 某些服务器不支持 fsync
        remote_file.fsync().ok();
        Ok(())
    }
}
