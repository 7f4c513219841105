use std::path::PathBuf;

use crate::error::{Result, UpdateError};

/// The `burp` Java preferences node, whatever backs it on this OS.
pub trait LicenseStore {
    fn entries(&self) -> Result<Vec<(String, String)>>;
}

// The license sits under the first key ending in `==`.
pub fn find_license(store: &impl LicenseStore) -> Result<String> {
    store
        .entries()?
        .into_iter()
        .find(|(key, _)| key.ends_with("=="))
        .map(|(_, value)| value)
        .ok_or(UpdateError::LicenseNotFound)
}

pub fn load() -> Result<String> {
    #[cfg(windows)]
    let store = RegistryPrefs;
    #[cfg(target_os = "macos")]
    let store = DefaultsPrefs;
    #[cfg(all(unix, not(target_os = "macos")))]
    let store = FilePrefs::user()?;

    find_license(&store)
}

/// Java's file-backed store, used on Linux and other Unixes.
#[cfg_attr(any(windows, target_os = "macos"), allow(dead_code))]
pub struct FilePrefs {
    path: PathBuf,
}

#[cfg_attr(any(windows, target_os = "macos"), allow(dead_code))]
impl FilePrefs {
    pub fn user() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| UpdateError::LicenseStore("no home directory".to_string()))?;
        Ok(Self::at(home.join(".java/.userPrefs/burp/prefs.xml")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LicenseStore for FilePrefs {
    fn entries(&self) -> Result<Vec<(String, String)>> {
        tracing::debug!("reading preferences from {}", self.path.display());

        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = std::fs::read_to_string(&self.path)?;
        parse_prefs_xml(&content)
    }
}

// <map MAP_XML_VERSION="1.0"><entry key="..." value="..."/></map>
fn parse_prefs_xml(content: &str) -> Result<Vec<(String, String)>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(content);
    let mut entries = Vec::new();

    loop {
        match reader.read_event().map_err(store_error)? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"entry" => {
                let mut key = None;
                let mut value = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(store_error)?;
                    let text = attr.unescape_value().map_err(store_error)?.into_owned();
                    match attr.key.as_ref() {
                        b"key" => key = Some(text),
                        b"value" => value = Some(text),
                        _ => {}
                    }
                }
                if let (Some(key), Some(value)) = (key, value) {
                    entries.push((key, value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// The macOS store, a plist read back through `defaults`.
#[cfg(target_os = "macos")]
pub struct DefaultsPrefs;

#[cfg(target_os = "macos")]
impl LicenseStore for DefaultsPrefs {
    fn entries(&self) -> Result<Vec<(String, String)>> {
        let output = std::process::Command::new("defaults")
            .args(["export", "com.apple.java.util.prefs", "-"])
            .output()
            .map_err(|e| UpdateError::Spawn {
                program: "defaults".to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            // No preferences domain at all.
            return Ok(vec![]);
        }

        parse_prefs_plist(&String::from_utf8_lossy(&output.stdout))
    }
}

// Java nests nodes as dictionaries keyed `/` then `burp/`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_prefs_plist(content: &str) -> Result<Vec<(String, String)>> {
    use quick_xml::Reader;
    use quick_xml::escape::unescape;
    use quick_xml::events::Event;

    const NODE: [&str; 3] = ["", "/", "burp/"];

    let mut reader = Reader::from_str(content);
    let mut path: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event().map_err(store_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"dict" => path.push(pending.take().unwrap_or_default()),
                b"key" => {
                    let raw = reader.read_text(e.name()).map_err(store_error)?;
                    pending = Some(unescape(&raw).map_err(store_error)?.into_owned());
                }
                b"string" => {
                    let raw = reader.read_text(e.name()).map_err(store_error)?;
                    if let Some(key) = pending.take()
                        && path == NODE
                    {
                        entries.push((key, unescape(&raw).map_err(store_error)?.into_owned()));
                    }
                }
                b"plist" => {}
                _ => pending = None,
            },
            Event::Empty(_) => pending = None,
            Event::End(e) if e.name().as_ref() == b"dict" => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// The Windows store under `HKCU\Software\JavaSoft\Prefs\burp`.
#[cfg(windows)]
pub struct RegistryPrefs;

#[cfg(windows)]
impl LicenseStore for RegistryPrefs {
    fn entries(&self) -> Result<Vec<(String, String)>> {
        use winreg::RegKey;
        use winreg::enums::HKEY_CURRENT_USER;

        let Ok(node) =
            RegKey::predef(HKEY_CURRENT_USER).open_subkey(r"Software\JavaSoft\Prefs\burp")
        else {
            return Ok(vec![]);
        };

        let mut entries = Vec::new();
        for value in node.enum_values() {
            let (name, _) = value.map_err(store_error)?;
            let data: String = node.get_value(&name).map_err(store_error)?;
            entries.push((decode_registry_name(&name), decode_registry_name(&data)));
        }
        Ok(entries)
    }
}

// Java escapes upper-case letters as `/X` and `\` as `//`, and stores `/`
// as `\`. The base64 form (`/!` prefix) is never used for license keys.
#[cfg_attr(not(windows), allow(dead_code))]
fn decode_registry_name(encoded: &str) -> String {
    let mut decoded = String::with_capacity(encoded.len());
    let mut chars = encoded.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' => match chars.peek() {
                Some(&next) if next.is_ascii_uppercase() => {
                    decoded.push(next);
                    chars.next();
                }
                Some('/') => {
                    decoded.push('\\');
                    chars.next();
                }
                _ => decoded.push('/'),
            },
            '\\' => decoded.push('/'),
            other => decoded.push(other),
        }
    }

    decoded
}

fn store_error(err: impl std::fmt::Display) -> UpdateError {
    UpdateError::LicenseStore(err.to_string())
}
