use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, UpdateError};
use crate::hdiutil;

const MAC_INSTALLER_STUB: &str =
    "Burp Suite Professional Installer.app/Contents/MacOS/JavaApplicationStub";

/// Installation types the vendor publishes builds for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Win32,
    Win64,
    MacOs,
    Linux,
}

impl Platform {
    /// Maps an OS name and data-model width to a platform.
    ///
    /// The names follow the JVM's `os.name` values, so `"Windows 10"`,
    /// `"Mac OS X"` and `"Linux"` are all recognised.
    pub fn detect(os_name: &str, data_model: &str) -> Result<Self> {
        if os_name.starts_with("Windows") {
            if data_model == "64" {
                Ok(Self::Win64)
            } else {
                Ok(Self::Win32)
            }
        } else if os_name == "Mac OS X" {
            Ok(Self::MacOs)
        } else if os_name.starts_with("Linux") {
            Ok(Self::Linux)
        } else {
            Err(UpdateError::UnknownOs(os_name.to_string()))
        }
    }

    /// Detects the platform this binary was built for.
    pub fn current() -> Result<Self> {
        let os_name = match std::env::consts::OS {
            "windows" => "Windows",
            "macos" => "Mac OS X",
            "linux" => "Linux",
            other => other,
        };
        let data_model = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };

        Self::detect(os_name, data_model)
    }

    /// Tag sent to the vendor and matched against `installationType`.
    pub const fn installation_type(self) -> &'static str {
        match self {
            Self::Win32 => "win32",
            Self::Win64 => "win64",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }

    pub const fn default_base_path(self) -> &'static str {
        match self {
            Self::Win32 | Self::Win64 => r"C:\Program Files\BurpSuitePro\",
            Self::MacOs => "/Applications/Burp Suite Professional.app/Contents/",
            Self::Linux => "/opt/BurpSuitePro/",
        }
    }

    pub const fn relative_jar_path(self) -> &'static str {
        match self {
            Self::MacOs => "java/app/burpsuite_pro.jar",
            Self::Win32 | Self::Win64 | Self::Linux => "burpsuite_pro.jar",
        }
    }

    pub const fn relative_runtime_path(self) -> &'static str {
        match self {
            Self::Win32 | Self::Win64 => r"jre\bin\java.exe",
            Self::MacOs => "PlugIns/jre.bundle/Contents/Home/jre/bin/java",
            Self::Linux => "jre/bin/java",
        }
    }

    /// Runs the downloaded installer silently.
    pub fn install(self, artifact: &Path) -> Result<()> {
        match self {
            Self::MacOs => install_disk_image(artifact),
            Self::Win32 | Self::Win64 => run_and_check(artifact, ["-q"]),
            Self::Linux => run_and_check(
                Path::new("/bin/sh"),
                [artifact.as_os_str(), OsStr::new("-q")],
            ),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.installation_type())
    }
}

/// Where the application is installed on this machine.
#[derive(Debug, Clone)]
pub struct Profile {
    platform: Platform,
    base_path: PathBuf,
}

impl Profile {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            base_path: PathBuf::from(platform.default_base_path()),
        }
    }

    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn jar_path(&self) -> PathBuf {
        self.base_path.join(self.platform.relative_jar_path())
    }

    pub fn runtime_path(&self) -> PathBuf {
        self.base_path.join(self.platform.relative_runtime_path())
    }

    pub fn install(&self, artifact: &Path) -> Result<()> {
        self.platform.install(artifact)
    }
}

fn install_disk_image(image: &Path) -> Result<()> {
    let mount_dir = hdiutil::attach(image)?;
    let result = run_and_check(&mount_dir.join(MAC_INSTALLER_STUB), ["-q"]);
    hdiutil::detach(&mount_dir);
    result
}

fn run_and_check<I, S>(program: &Path, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    tracing::debug!("running installer {name}");

    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| UpdateError::Spawn {
            program: name.clone(),
            reason: e.to_string(),
        })?;

    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(UpdateError::ExitCode {
            program: name,
            code,
        }),
        None => Err(UpdateError::Terminated(name)),
    }
}
