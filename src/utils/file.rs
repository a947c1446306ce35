use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub fn calculate_md5<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = md5::Context::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.consume(&buffer[..bytes_read]);
    }

    let digest = hasher.compute();
    Ok(format!("{:x}", digest))
}

/// Pulls the digest out of `md5sum` output (`<digest>  <path>`).
pub fn parse_md5sum_output(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .next()
        .filter(|digest| digest.len() == 32 && digest.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|digest| digest.to_ascii_lowercase())
}

/// Single-quotes `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_calculate_md5() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let digest = calculate_md5(file.path()).unwrap();
        assert_eq!(digest, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_parse_md5sum_output() {
        let out = "5EB63BBBE01EEED093CB22BB8F5ACDC3  /tmp/hello.txt\n";
        assert_eq!(
            parse_md5sum_output(out).as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert_eq!(parse_md5sum_output("md5sum: /tmp/x: No such file"), None);
        assert_eq!(parse_md5sum_output(""), None);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
