//! Converter settings: which converter, which way, which normalization.

use std::fmt;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The three values that identify an active converter.
///
/// Two settings are equal when all three fields match; the engine keeps a
/// single entry per name, so changing direction or normalization means
/// re-initializing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConverterSettings {
    /// Converter name as registered with EncConverters.
    pub name: String,
    /// `true` converts left to right.
    #[serde(default = "default_forward")]
    pub forward: bool,
    /// Output normalization form (0 = none).
    #[serde(default)]
    pub norm_form: i32,
}

fn default_forward() -> bool {
    true
}

impl ConverterSettings {
    pub fn new(name: impl Into<String>, forward: bool, norm_form: i32) -> Self {
        Self {
            name: name.into(),
            forward,
            norm_form,
        }
    }

    /// Replace direction and normalization where a value is given.
    pub fn with_overrides(mut self, forward: Option<bool>, norm_form: Option<i32>) -> Self {
        if let Some(forward) = forward {
            self.forward = forward;
        }
        if let Some(norm_form) = norm_form {
            self.norm_form = norm_form;
        }
        self
    }

    /// Read settings saved by [`ConverterSettings::save`].
    ///
    /// Returns `Ok(None)` when the file does not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing converter settings in {}", path.display()))?;
        debug!(path = %path.display(), %settings, "loaded converter settings");
        Ok(Some(settings))
    }

    /// Write settings as JSON, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let parent = path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;

        let json = serde_json::to_vec_pretty(self)?;
        let temp_path = parent.join(format!(".ecconv-tmp-{}", std::process::id()));
        let written = (|| -> std::io::Result<()> {
            let mut file = std::fs::File::create(&temp_path)?;
            file.write_all(&json)?;
            file.write_all(b"\n")?;
            file.sync_all()
        })();
        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e).with_context(|| format!("writing {}", temp_path.display()));
        }
        if let Err(e) = std::fs::rename(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e).with_context(|| format!("replacing {}", path.display()));
        }
        debug!(path = %path.display(), settings = %self, "saved converter settings");
        Ok(())
    }
}

impl fmt::Display for ConverterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Converter '{}' (forward={}, normalize={})",
            self.name, self.forward, self.norm_form
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_log_format() {
        let s = ConverterSettings::new("Annapurna<>UNICODE", false, 2);
        assert_eq!(
            s.to_string(),
            "Converter 'Annapurna<>UNICODE' (forward=false, normalize=2)"
        );
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let saved = ConverterSettings::new("Converter1", true, 1);
        assert_eq!(saved.clone().with_overrides(None, None), saved);
        assert_eq!(
            saved.clone().with_overrides(Some(false), None),
            ConverterSettings::new("Converter1", false, 1)
        );
        assert_eq!(
            saved.with_overrides(None, Some(3)),
            ConverterSettings::new("Converter1", true, 3)
        );
    }

    #[test]
    fn save_then_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/converter.json");
        let s = ConverterSettings::new("Converter1", true, 1);
        s.save(&path).unwrap();
        assert_eq!(ConverterSettings::load(&path).unwrap(), Some(s));
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".ecconv-tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn load_missing_file_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(
            ConverterSettings::load(&tmp.path().join("absent.json")).unwrap(),
            None
        );
    }

    #[test]
    fn load_fills_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        std::fs::write(&path, r#"{"name":"X"}"#).unwrap();
        let s = ConverterSettings::load(&path).unwrap().unwrap();
        assert!(s.forward);
        assert_eq!(s.norm_form, 0);
    }

    #[test]
    fn load_rejects_garbage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        std::fs::write(&path, "not json").unwrap();
        let err = ConverterSettings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing converter settings"));
    }
}
