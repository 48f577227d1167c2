//! Audio directory scanner
//!
//! Layout expected under the audio root:
//!
//! ```text
//! audio/
//!   waltz/        <- style label (directory name)
//!     song1.mp3
//!   cha-cha, cha cha/
//!     song2.ogg
//! ```
//!
//! Only immediate sub-directories are styles and only their immediate files
//! are songs. Loose files at the root and non-audio files are skipped.

use super::Catalog;
use crate::{Error, Result};
use reqwest::Url;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Recognized audio file extensions (compared case-insensitively)
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub catalog: Catalog,
    /// Entries ignored because they are not style directories or audio files
    pub skipped: Vec<PathBuf>,
    /// Style directories without any audio file (omitted from the catalog)
    pub empty_styles: Vec<String>,
}

/// Scan `root` and build a catalog whose URLs are `{base_url}/audio/{style}/{file}`
///
/// Path segments are percent-encoded. Entries are visited in file-name order so
/// repeated scans of the same tree produce identical catalogs.
pub fn scan_audio_dir(root: &Path, base_url: &str) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(Error::NotFound(format!(
            "audio directory {}",
            root.display()
        )));
    }

    let base = Url::parse(base_url)
        .map_err(|e| Error::Config(format!("invalid base_url '{}': {}", base_url, e)))?;
    if base.cannot_be_a_base() {
        return Err(Error::Config(format!("base_url '{}' cannot be a base", base_url)));
    }

    let mut report = ScanReport::default();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;

        if !entry.file_type().is_dir() {
            debug!("Skipping non-directory item: {}", entry.path().display());
            report.skipped.push(entry.into_path());
            continue;
        }

        let style = entry.file_name().to_string_lossy().into_owned();
        let mut urls = Vec::new();

        for file in WalkDir::new(entry.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let file = file.map_err(|e| Error::Io(e.into()))?;
            if file.file_type().is_file() && is_audio_file(file.path()) {
                let file_name = file.file_name().to_string_lossy();
                urls.push(song_url(&base, &style, &file_name));
            } else {
                report.skipped.push(file.into_path());
            }
        }

        if urls.is_empty() {
            debug!("No audio files found in style '{}'", style);
            report.empty_styles.push(style);
        } else {
            info!("Style '{}': {} songs", style, urls.len());
            report.catalog.insert(style, urls);
        }
    }

    Ok(report)
}

/// Check the file extension against [`AUDIO_EXTENSIONS`]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn song_url(base: &Url, style: &str, file_name: &str) -> String {
    format!(
        "{}/audio/{}/{}",
        base.as_str().trim_end_matches('/'),
        encode_component(style),
        encode_component(file_name)
    )
}

/// Percent-encode one path segment, leaving the same characters unescaped as
/// the manifests generated for the browser client: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
fn encode_component(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(char::from(byte)),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_builds_encoded_urls() {
        let dir = TempDir::new().unwrap();
        let waltz = dir.path().join("waltz");
        fs::create_dir(&waltz).unwrap();
        touch(&waltz.join("Moon River.mp3"));
        touch(&waltz.join("cover.jpg"));

        let report = scan_audio_dir(dir.path(), "https://songs.example.com").unwrap();
        let urls: Vec<_> = report.catalog.flatten().into_iter().map(|s| s.url).collect();
        assert_eq!(
            urls,
            vec!["https://songs.example.com/audio/waltz/Moon%20River.mp3"]
        );
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_scan_omits_empty_styles_and_loose_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("tango")).unwrap();
        let jive = dir.path().join("jive");
        fs::create_dir(&jive).unwrap();
        touch(&jive.join("a.OGG"));
        touch(&dir.path().join("music-files.json"));

        let report = scan_audio_dir(dir.path(), "http://localhost:5780/").unwrap();
        assert_eq!(report.catalog.style_count(), 1);
        assert_eq!(report.empty_styles, vec!["tango".to_string()]);
        assert_eq!(
            report.catalog.flatten()[0].url,
            "http://localhost:5780/audio/jive/a.OGG"
        );
    }

    #[test]
    fn test_synonym_style_segments_are_fully_encoded() {
        let dir = TempDir::new().unwrap();
        let cha = dir.path().join("cha-cha, cha cha");
        fs::create_dir(&cha).unwrap();
        touch(&cha.join("Oye Como Va (Live).mp3"));

        let report = scan_audio_dir(dir.path(), "https://songs.example.com/").unwrap();
        assert_eq!(
            report.catalog.flatten()[0].url,
            "https://songs.example.com/audio/cha-cha%2C%20cha%20cha/Oye%20Como%20Va%20(Live).mp3"
        );
    }

    #[test]
    fn test_encode_component_multibyte() {
        assert_eq!(encode_component("Besame Mucho"), "Besame%20Mucho");
        assert_eq!(encode_component("Bésame"), "B%C3%A9same");
        assert_eq!(encode_component("a/b?c#d"), "a%2Fb%3Fc%23d");
    }

    #[test]
    fn test_scan_missing_dir_is_not_found() {
        let result = scan_audio_dir(Path::new("/nonexistent/bmq-audio"), "http://x");
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("x.mp3")));
        assert!(is_audio_file(Path::new("x.WAV")));
        assert!(!is_audio_file(Path::new("x.flac")));
        assert!(!is_audio_file(Path::new("mp3")));
    }
}
