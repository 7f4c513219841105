use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;

use crate::error::{Result, UpdateError};

/// Mounts a disk image and returns the directory it was mounted at.
pub fn attach(image: &Path) -> Result<PathBuf> {
    tracing::debug!("hdiutil attach {}", image.display());

    let output = Command::new("hdiutil")
        .arg("attach")
        .arg(image)
        .output()
        .map_err(|e| UpdateError::Spawn {
            program: "hdiutil".to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!("hdiutil attach failed: {}", stderr.trim());
        return Err(match output.status.code() {
            Some(code) => UpdateError::ExitCode {
                program: "hdiutil attach".to_string(),
                code,
            },
            None => UpdateError::Terminated("hdiutil attach".to_string()),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().unwrap_or_default();
    let mount_dir = parse_mount_dir(first)?;

    tracing::debug!("mounted at {mount_dir}");
    Ok(PathBuf::from(mount_dir))
}

/// Unmounts a volume. Failures are logged, not returned.
pub fn detach(mount_dir: &Path) {
    tracing::debug!("hdiutil detach {}", mount_dir.display());

    match Command::new("hdiutil").arg("detach").arg(mount_dir).output() {
        Ok(output) if output.status.success() => {}
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(
                "hdiutil detach {} failed: {}",
                mount_dir.display(),
                stderr.trim()
            );
        }
        Err(e) => tracing::warn!("failed to run hdiutil detach: {e}"),
    }
}

// hdiutil prints `/dev/disk4s1<spaces/tabs>Apple_HFS<spaces/tabs>/Volumes/Name`.
// The line is split once on the first run of ten or more whitespace
// characters and the remainder is taken as the mount point. This is a
// heuristic: `hdiutil attach -plist` would give structured output.
fn parse_mount_dir(line: &str) -> Result<&str> {
    let separator = Regex::new(r"\s{10,}")?;

    separator
        .splitn(line, 2)
        .nth(1)
        .map(str::trim_end)
        .filter(|dir| !dir.is_empty())
        .ok_or_else(|| UpdateError::MountOutput(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_field_mount_line() {
        let line = "/dev/disk4                \t/Volumes/Burp Suite Professional";
        assert_eq!(
            parse_mount_dir(line).unwrap(),
            "/Volumes/Burp Suite Professional"
        );
    }

    #[test]
    fn keeps_everything_after_first_separator() {
        let line = "/dev/disk4s1            Apple_HFS                      /Volumes/Burp";
        assert_eq!(
            parse_mount_dir(line).unwrap(),
            "Apple_HFS                      /Volumes/Burp"
        );
    }

    #[test]
    fn short_whitespace_runs_do_not_split() {
        let line = "/dev/disk4  GUID_partition_scheme";
        assert!(matches!(
            parse_mount_dir(line),
            Err(UpdateError::MountOutput(_))
        ));
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(parse_mount_dir("").is_err());
    }

    #[test]
    fn trailing_whitespace_only_is_an_error() {
        assert!(parse_mount_dir("/dev/disk4            ").is_err());
    }

    #[test]
    #[cfg(target_os = "macos")]
    fn attach_nonexistent_image_fails() {
        let result = attach(Path::new("/nonexistent/image/that/does/not/exist.dmg"));
        assert!(result.is_err());
    }
}
