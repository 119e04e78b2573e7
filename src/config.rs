//! Runtime settings resolved from flags, environment, and host defaults.

use std::borrow::Cow;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::sources::analysis::{API_URL_ENV, DEFAULT_API_URL};

pub const EXPORT_DIR_ENV: &str = "PHARMAGUARD_EXPORT_DIR";
const NO_COLOR_ENV: &str = "NO_COLOR";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: Cow<'static, str>,
    pub export_dir: PathBuf,
    /// ANSI colors on terminal output. Exported artifacts are never colored.
    pub color: bool,
}

impl Settings {
    /// Flag values win over the environment, which wins over defaults.
    pub fn resolve(api_url: Option<&str>, export_dir: Option<&Path>, no_color: bool) -> Self {
        let env_dir = std::env::var_os(EXPORT_DIR_ENV).map(PathBuf::from);
        let no_color_env = std::env::var_os(NO_COLOR_ENV).is_some_and(|v| !v.is_empty());
        Self {
            api_url: pick_api_url(
                api_url,
                crate::sources::env_base(DEFAULT_API_URL, API_URL_ENV),
            ),
            export_dir: pick_export_dir(export_dir, env_dir, dirs::download_dir()),
            color: !no_color && !no_color_env && std::io::stdout().is_terminal(),
        }
    }
}

fn pick_api_url(flag: Option<&str>, fallback: Cow<'static, str>) -> Cow<'static, str> {
    match flag.map(str::trim).filter(|v| !v.is_empty()) {
        Some(url) => Cow::Owned(url.to_string()),
        None => fallback,
    }
}

fn pick_export_dir(
    flag: Option<&Path>,
    env: Option<PathBuf>,
    downloads: Option<PathBuf>,
) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| env.filter(|p| !p.as_os_str().is_empty()))
        .or(downloads)
        .unwrap_or_else(|| PathBuf::from("."))
}
