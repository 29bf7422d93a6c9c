use std::path::PathBuf;

/// Accept a path that names an existing regular file.
pub fn is_file_exist(file_path: &str) -> Result<PathBuf, String> {
    let file_path = PathBuf::from(file_path);

    if file_path.is_file() {
        Ok(file_path)
    } else {
        Err(format!("file not found: {}", file_path.display()))
    }
}
