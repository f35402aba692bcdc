use std::env;
use std::path::PathBuf;

/// Service configuration, read once at startup. All paths used by the upload
/// flow derive from `upload_root`; nothing else in the crate hard-codes a
/// directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Root directory all staged uploads and group files live under.
    pub upload_root: PathBuf,
    /// Subdirectory used for plain uploads that carry no branch context.
    pub base_folder: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(3000);
        let upload_root = env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let base_folder = env::var("UPLOAD_BASE_FOLDER").unwrap_or_else(|_| "Cs".to_string());
        Self {
            port,
            upload_root,
            base_folder,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            upload_root: PathBuf::from("uploads"),
            base_folder: "Cs".to_string(),
        }
    }
}
