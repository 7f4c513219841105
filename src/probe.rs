use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use crate::error::{Result, UpdateError};
use crate::platform::Profile;

/// Asks the installed application for its version.
///
/// Runs the bundled runtime with `-jar <app> --version` in headless mode
/// and reads the first line it prints.
pub fn installed_version(profile: &Profile) -> Result<String> {
    let runtime = profile.runtime_path();
    let program = runtime.display().to_string();
    tracing::debug!("probing version with {program}");

    let mut child = Command::new(&runtime)
        .arg("-Djava.awt.headless=true")
        .arg("-jar")
        .arg(profile.jar_path())
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| UpdateError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    let mut line = String::new();
    let read = match child.stdout.take() {
        Some(stdout) => BufReader::new(stdout).read_line(&mut line),
        None => Ok(0),
    };
    // Only the output matters; the status is reaped and logged.
    match child.wait() {
        Ok(status) => tracing::debug!("{program} exited with {status}"),
        Err(e) => tracing::debug!("failed to wait for {program}: {e}"),
    }
    read?;

    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(UpdateError::NoOutput(program));
    }

    Ok(parse_version(line).to_string())
}

/// Drops build metadata: everything from the first `-` on.
pub fn parse_version(reported: &str) -> &str {
    reported
        .split_once('-')
        .map_or(reported, |(version, _)| version)
}
