use std::path::Path;

use console::style;

use crate::cli::Cli;
use crate::error::{Result, UpdateError};
use crate::platform::{Platform, Profile};
use crate::updater::{ProductDescriptor, UpdateService, VendorClient};
use crate::{config, license, probe};

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    UpToDate,
    Installed(ProductDescriptor),
}

pub fn execute(cli: &Cli) -> Result<()> {
    let config = config::load()?;
    let license = license::load()?;

    let mut profile = Profile::new(Platform::current()?);
    if let Some(path) = cli.install_path().or_else(|| config.install_path()) {
        profile = profile.with_base_path(path);
    }
    tracing::debug!(
        "platform {} installed at {}",
        profile.platform(),
        profile.base_path().display()
    );

    let client = VendorClient::new(&config.base_url);
    let download_dir = config.download_dir()?;

    run(
        &client,
        &profile,
        &license,
        &config.product,
        cli.target_version.as_deref(),
        &download_dir,
    )?;

    Ok(())
}

/// Resolves the target version, then downloads and installs it.
///
/// With `explicit_version` the installed version is neither probed nor
/// checked: that version is downloaded as is.
pub fn run(
    service: &impl UpdateService,
    profile: &Profile,
    license: &str,
    product: &str,
    explicit_version: Option<&str>,
    download_dir: &Path,
) -> Result<Outcome> {
    let target = match explicit_version {
        Some(version) => ProductDescriptor::new(product, version, profile.platform()),
        None => {
            let current = probe::installed_version(profile)?;
            println!("{} {current}", style("Current version:").bold());

            let installed = ProductDescriptor::new(product, current, profile.platform());
            let Some(offer) = service.check_for_update(&installed, license)? else {
                println!("{}", style("Already up to date").dim());
                return Ok(Outcome::UpToDate);
            };

            match offer.filename {
                Some(filename) => tracing::debug!("update offers {filename}"),
                None => {
                    return Err(UpdateError::NoBuildForPlatform(
                        profile.platform().to_string(),
                    ));
                }
            }
            offer.target
        }
    };

    if target.version.trim().is_empty() {
        return Err(UpdateError::InvalidVersion(target.version));
    }

    println!("{} {}", style("Downloading version:").bold(), target.version);
    let artifact = service.download_update(&target, license, download_dir)?;

    println!("{}", style("Installing update").blue().bold());
    profile.install(&artifact)?;

    println!("{}", style("Installation completed").green().bold());
    Ok(Outcome::Installed(target))
}
