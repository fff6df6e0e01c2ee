//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + user templates):
//!   Windows: %APPDATA%\talknotes\
//!   macOS:   ~/Library/Application Support/talknotes/
//!   Linux:   ~/.config/talknotes/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\talknotes\
//!   macOS:   ~/Library/Application Support/talknotes/
//!   Linux:   ~/.local/share/talknotes/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and user templates.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for user-provided session templates (`*.toml`).
    pub templates_dir: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "talknotes";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let templates_dir = config_dir.join("templates");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            templates_dir,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
