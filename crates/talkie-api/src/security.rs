//! Input validation for uploads and result downloads.

/// Accepted portrait image extensions.
pub const PHOTO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Accepted driving audio extensions.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Lowercased extension after the last dot, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Extension of `file_name` if it is in `allowed`.
pub fn allowed_extension(file_name: &str, allowed: &[&str]) -> Option<String> {
    file_extension(file_name).filter(|ext| allowed.contains(&ext.as_str()))
}

/// Validate a result file name (prevents path traversal).
pub fn is_valid_result_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 256 {
        return false;
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Content type for a result file.
pub fn result_content_type(name: &str) -> &'static str {
    match file_extension(name).as_deref() {
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions() {
        assert_eq!(
            allowed_extension("face.PNG", PHOTO_EXTENSIONS).as_deref(),
            Some("png")
        );
        assert_eq!(
            allowed_extension("voice.final.wav", AUDIO_EXTENSIONS).as_deref(),
            Some("wav")
        );
        assert!(allowed_extension("voice.wav", PHOTO_EXTENSIONS).is_none());
        assert!(allowed_extension("face.bmp", PHOTO_EXTENSIONS).is_none());
        assert!(allowed_extension("noext", PHOTO_EXTENSIONS).is_none());
        assert!(allowed_extension("trailing.", PHOTO_EXTENSIONS).is_none());
    }

    #[test]
    fn test_result_name_validation() {
        assert!(is_valid_result_name("2024_01_01_12.30.00.mp4"));
        assert!(!is_valid_result_name("../tasks.db"));
        assert!(!is_valid_result_name(".."));
        assert!(!is_valid_result_name("a/b.mp4"));
        assert!(!is_valid_result_name("a\\b.mp4"));
        assert!(!is_valid_result_name(""));
    }

    #[test]
    fn test_result_content_type() {
        assert_eq!(result_content_type("x.mp4"), "video/mp4");
        assert_eq!(result_content_type("x.MP4"), "video/mp4");
        assert_eq!(result_content_type("x.txt"), "application/octet-stream");
    }
}
