use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

#[derive(Debug, Parser)]
#[command(name = "burp-update", disable_version_flag = true)]
#[command(about = "Download and silently install the latest Burp Suite Professional release")]
pub struct Cli {
    /// Burp installation directory (overrides the platform default)
    #[arg(value_name = "PATH", conflicts_with = "path")]
    pub install_dir: Option<PathBuf>,

    /// Burp installation directory (same as the positional argument)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,

    /// Install this version instead of asking the update service
    #[arg(long = "version", value_name = "VERSION", value_parser = NonEmptyStringValueParser::new())]
    pub target_version: Option<String>,

    /// Print debug diagnostics to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The install directory given on the command line, in either form.
    pub fn install_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| self.install_dir.clone())
    }
}
