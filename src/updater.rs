use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::error::{Result, UpdateError};
use crate::platform::Platform;

pub const DEFAULT_BASE_URL: &str = "https://portswigger.net";

const USER_AGENT: &str = concat!("burp-update/", env!("CARGO_PKG_VERSION"));

// Same characters `application/x-www-form-urlencoded` leaves alone.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'*')
    .remove(b'_');

/// A product at a given version for a given platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDescriptor {
    pub product: String,
    pub version: String,
    pub platform: Platform,
}

impl ProductDescriptor {
    pub fn new(product: impl Into<String>, version: impl Into<String>, platform: Platform) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            platform,
        }
    }
}

/// What the update check offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOffer {
    pub target: ProductDescriptor,
    /// File name announced by the matching build, if any build matched.
    pub filename: Option<String>,
}

/// The two vendor interactions the update workflow needs.
pub trait UpdateService {
    /// Asks whether a newer version than `installed` exists.
    fn check_for_update(
        &self,
        installed: &ProductDescriptor,
        license: &str,
    ) -> Result<Option<UpdateOffer>>;

    /// Downloads the installer for `target` into `dest_dir` and returns
    /// the path it was written to.
    fn download_update(
        &self,
        target: &ProductDescriptor,
        license: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    updates: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    version: String,
    #[serde(default)]
    builds: Vec<Build>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Build {
    installation_type: Option<String>,
    filename: Option<String>,
}

/// HTTP client for the vendor's release service.
pub struct VendorClient {
    base_url: String,
}

impl VendorClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn check_url(&self, installed: &ProductDescriptor, license: &str) -> String {
        format!(
            "{}/Burp/Releases/CheckForUpdates?{}",
            self.base_url,
            query(&[
                ("product", installed.product.as_str()),
                ("version", installed.version.as_str()),
                ("license", license),
            ])
        )
    }

    fn download_url(&self, target: &ProductDescriptor, license: &str) -> String {
        format!(
            "{}/burp/releases/intooldownload?{}",
            self.base_url,
            query(&[
                ("product", target.product.as_str()),
                ("version", target.version.as_str()),
                ("installationType", target.platform.installation_type()),
                ("license", license),
            ])
        )
    }
}

impl UpdateService for VendorClient {
    fn check_for_update(
        &self,
        installed: &ProductDescriptor,
        license: &str,
    ) -> Result<Option<UpdateOffer>> {
        tracing::debug!(
            "checking for updates to {} {} ({})",
            installed.product,
            installed.version,
            installed.platform
        );

        let body = ureq::get(&self.check_url(installed, license))
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| UpdateError::Network(format!("failed to check for updates: {e}")))?
            .body_mut()
            .read_to_string()
            .map_err(|e| UpdateError::Network(format!("failed to read update response: {e}")))?;

        let response: UpdateResponse = serde_json::from_str(&body)?;
        select_update(response, installed)
    }

    fn download_update(
        &self,
        target: &ProductDescriptor,
        license: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        tracing::debug!(
            "downloading {} {} ({})",
            target.product,
            target.version,
            target.platform
        );

        let response = ureq::get(&self.download_url(target, license))
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| UpdateError::Network(format!("failed to download update: {e}")))?;

        let disposition = response
            .headers()
            .get("content-disposition")
            .ok_or_else(|| UpdateError::ContentDisposition("header absent".to_string()))?
            .to_str()
            .map_err(|e| UpdateError::ContentDisposition(e.to_string()))?;
        let filename = parse_content_disposition(disposition)?.to_string();

        let length = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let path = dest_dir.join(&filename);
        tracing::debug!("writing {}", path.display());

        let reader = response.into_body().into_reader();
        let file = File::create(&path)?;
        let progress = download_progress(length, &filename);
        let mut writer = progress.wrap_write(BufWriter::new(file));

        copy_download(reader, &mut writer)?;
        writer.flush()?;
        progress.finish_and_clear();

        Ok(path)
    }
}

// Read failures come from the connection, write failures from local disk.
fn copy_download(mut reader: impl Read, writer: &mut impl Write) -> Result<u64> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(UpdateError::Network(format!("failed to read download: {e}")));
            }
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

fn query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", utf8_percent_encode(value, QUERY_VALUE)))
        .collect::<Vec<_>>()
        .join("&")
}

// Only the first update counts, and its builds are scanned from index 1:
// the entry at index 0 is never a candidate.
fn select_update(
    response: UpdateResponse,
    installed: &ProductDescriptor,
) -> Result<Option<UpdateOffer>> {
    let Some(update) = response.updates.into_iter().next() else {
        return Ok(None);
    };
    if update.version.trim().is_empty() {
        return Err(UpdateError::MalformedResponse(
            "update has an empty version".to_string(),
        ));
    }
    let wanted = installed.platform.installation_type();

    let filename = update
        .builds
        .into_iter()
        .skip(1)
        .filter(|build| build.installation_type.as_deref() == Some(wanted))
        .last()
        .and_then(|build| build.filename);

    Ok(Some(UpdateOffer {
        target: ProductDescriptor::new(
            installed.product.clone(),
            update.version,
            installed.platform,
        ),
        filename,
    }))
}

/// Extracts the file name from a `Content-Disposition` value.
///
/// Takes what follows `filename=`: a quoted string up to its closing quote,
/// otherwise everything up to the next `;`. The result becomes a local file
/// name, so anything that could escape the download directory is rejected.
pub fn parse_content_disposition(value: &str) -> Result<&str> {
    let (_, rest) = value
        .split_once("filename=")
        .ok_or_else(|| UpdateError::ContentDisposition(value.to_string()))?;

    let rest = rest.trim_start();
    let name = match rest.strip_prefix('"') {
        Some(quoted) => quoted
            .split_once('"')
            .map(|(name, _)| name)
            .ok_or_else(|| UpdateError::ContentDisposition(value.to_string()))?,
        None => rest.split(';').next().unwrap_or_default().trim(),
    };

    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(UpdateError::ContentDisposition(value.to_string()));
    }

    Ok(name)
}

fn download_progress(length: Option<u64>, filename: &str) -> ProgressBar {
    let bar = match length {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) =
                ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes} ({eta})")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        }
    };
    bar.set_message(filename.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn installed(platform: Platform) -> ProductDescriptor {
        ProductDescriptor::new("pro", "2024.1.3", platform)
    }

    fn parse(json: &str) -> UpdateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_updates_means_no_update() {
        let response = parse(r#"{ "updates": [] }"#);
        assert_eq!(select_update(response, &installed(Platform::Linux)).unwrap(), None);
    }

    #[test]
    fn selects_matching_build_of_first_update() {
        let response = parse(
            r#"{
                "updates": [
                    {
                        "version": "2024.2",
                        "builds": [
                            { "installationType": "jar", "filename": "burpsuite_pro_v2024.2.jar" },
                            { "installationType": "win64", "filename": "burpsuite_pro_windows-x64_v2024_2.exe" },
                            { "installationType": "linux", "filename": "burpsuite_pro_linux_v2024_2.sh" }
                        ]
                    },
                    {
                        "version": "2024.1.5",
                        "builds": [
                            { "installationType": "linux", "filename": "old.sh" }
                        ]
                    }
                ]
            }"#,
        );

        let offer = select_update(response, &installed(Platform::Linux)).unwrap().unwrap();
        assert_eq!(offer.target.version, "2024.2");
        assert_eq!(offer.target.product, "pro");
        assert_eq!(offer.target.platform, Platform::Linux);
        assert_eq!(
            offer.filename.as_deref(),
            Some("burpsuite_pro_linux_v2024_2.sh")
        );
    }

    #[test]
    fn first_build_is_never_selected() {
        let response = parse(
            r#"{
                "updates": [{
                    "version": "2024.2",
                    "builds": [
                        { "installationType": "macos", "filename": "first.dmg" },
                        { "installationType": "linux", "filename": "second.sh" }
                    ]
                }]
            }"#,
        );

        let offer = select_update(response, &installed(Platform::MacOs)).unwrap().unwrap();
        assert_eq!(offer.target.version, "2024.2");
        assert_eq!(offer.filename, None);
    }

    #[test]
    fn last_matching_build_wins() {
        let response = parse(
            r#"{
                "updates": [{
                    "version": "2024.2",
                    "builds": [
                        { "installationType": "win64", "filename": "skipped.exe" },
                        { "installationType": "win64", "filename": "a.exe" },
                        { "installationType": "win32", "filename": "b.exe" },
                        { "installationType": "win64", "filename": "c.exe" }
                    ]
                }]
            }"#,
        );

        let offer = select_update(response, &installed(Platform::Win64)).unwrap().unwrap();
        assert_eq!(offer.filename.as_deref(), Some("c.exe"));
    }

    #[test]
    fn first_build_may_have_a_different_shape() {
        let response = parse(
            r#"{
                "updates": [{
                    "version": "2024.2",
                    "builds": [
                        { "releaseNotes": "https://portswigger.net/burp/releases" },
                        { "installationType": "linux", "filename": "x.sh" }
                    ]
                }]
            }"#,
        );

        let offer = select_update(response, &installed(Platform::Linux)).unwrap().unwrap();
        assert_eq!(offer.filename.as_deref(), Some("x.sh"));
    }

    #[test]
    fn empty_update_version_is_malformed() {
        let response = parse(
            r#"{
                "updates": [{
                    "version": " ",
                    "builds": [
                        { "installationType": "jar", "filename": "a.jar" },
                        { "installationType": "linux", "filename": "b.sh" }
                    ]
                }]
            }"#,
        );

        let result = select_update(response, &installed(Platform::Linux));
        assert!(matches!(result, Err(UpdateError::MalformedResponse(_))));
    }

    #[test]
    fn missing_updates_field_is_malformed() {
        assert!(serde_json::from_str::<UpdateResponse>(r#"{ "builds": [] }"#).is_err());
    }

    #[test]
    fn check_url_encodes_license() {
        let client = VendorClient::new("https://portswigger.net/");
        let url = client.check_url(&installed(Platform::Linux), "ab+c/d==");
        assert_eq!(
            url,
            "https://portswigger.net/Burp/Releases/CheckForUpdates?product=pro&version=2024.1.3&license=ab%2Bc%2Fd%3D%3D"
        );
    }

    #[test]
    fn download_url_carries_installation_type() {
        let client = VendorClient::new(DEFAULT_BASE_URL);
        let target = ProductDescriptor::new("pro", "2024.2", Platform::Win64);
        let url = client.download_url(&target, "k=");
        assert_eq!(
            url,
            "https://portswigger.net/burp/releases/intooldownload?product=pro&version=2024.2&installationType=win64&license=k%3D"
        );
    }

    #[test]
    fn content_disposition_plain_filename() {
        assert_eq!(
            parse_content_disposition("attachment; filename=burpsuite_pro_v2024.jar").unwrap(),
            "burpsuite_pro_v2024.jar"
        );
    }

    #[test]
    fn content_disposition_quoted_filename() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="burp.sh"; size=12"#).unwrap(),
            "burp.sh"
        );
    }

    #[test]
    fn content_disposition_quoted_filename_keeps_semicolon() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="a;b.sh""#).unwrap(),
            "a;b.sh"
        );
    }

    #[test]
    fn content_disposition_unterminated_quote_is_rejected() {
        assert!(parse_content_disposition(r#"attachment; filename="burp.sh"#).is_err());
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copy_download_writes_everything() {
        let mut out = Vec::new();
        let copied = copy_download(&b"#!/bin/sh\nexit 0\n"[..], &mut out).unwrap();
        assert_eq!(copied, 17);
        assert_eq!(out, b"#!/bin/sh\nexit 0\n");
    }

    #[test]
    fn copy_download_read_failure_is_network_error() {
        let mut out = Vec::new();
        let err = copy_download(BrokenReader, &mut out).unwrap_err();
        assert!(matches!(err, UpdateError::Network(_)));
    }

    #[test]
    fn copy_download_write_failure_is_io_error() {
        let err = copy_download(&b"data"[..], &mut FullDisk).unwrap_err();
        assert!(matches!(err, UpdateError::Io(_)));
    }

    #[test]
    fn content_disposition_without_filename_is_rejected() {
        assert!(matches!(
            parse_content_disposition("attachment"),
            Err(UpdateError::ContentDisposition(_))
        ));
        assert!(parse_content_disposition("attachment; filename=").is_err());
    }

    #[test]
    fn content_disposition_path_traversal_is_rejected() {
        assert!(parse_content_disposition("attachment; filename=../../etc/passwd").is_err());
        assert!(parse_content_disposition(r"attachment; filename=..\evil.exe").is_err());
        assert!(parse_content_disposition("attachment; filename=..").is_err());
    }
}
