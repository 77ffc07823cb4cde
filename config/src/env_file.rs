//! Project `.env` read into a map; nothing is applied to the environment here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

/// `.env` in `override_dir`, else in the current directory.
fn env_file_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Parses `.env` with the `dotenv` grammar (quotes, comments, `export` prefix).
/// A missing file yields an empty map.
pub(crate) fn load_env_map(
    override_dir: Option<&Path>,
) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = env_file_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let mut out = HashMap::new();
    for item in dotenv::from_path_iter(&path)? {
        let (key, value) = item?;
        out.insert(key, value);
    }
    Ok(out)
}
