//! Sound cue discovery
//!
//! Cues live on disk under the sounds directory:
//! - `impostor/*` and `crewmate/*`: one is picked at random per round
//! - `countdown.mp3`: played while preparing
//! - `round-end.mp3`: played when the round ends
//!
//! Files are exposed to clients as `/sounds/...` URLs.

use rand::seq::IndexedRandom;
use std::path::Path;

/// Source of the audio cues a round needs
pub trait SoundProvider: Send + Sync {
    /// Whether a round can be played at all
    fn has_sounds(&self) -> bool;

    fn random_impostor_sound(&self) -> Option<String>;

    fn random_crewmate_sound(&self) -> Option<String>;

    fn countdown_sound(&self) -> Option<String>;

    fn round_end_sound(&self) -> Option<String>;
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg"];
const URL_PREFIX: &str = "/sounds";

#[derive(Debug, Clone, Default)]
pub struct SoundLibrary {
    pub impostor: Vec<String>,
    pub crewmate: Vec<String>,
    pub countdown: Option<String>,
    pub round_end: Option<String>,
}

impl SoundLibrary {
    /// Scan a sounds directory.
    ///
    /// Never fails: unreadable folders are logged and treated as empty, which
    /// later blocks room creation instead of crashing the process.
    pub fn scan(dir: &Path) -> Self {
        let library = Self {
            impostor: scan_folder(dir, "impostor"),
            crewmate: scan_folder(dir, "crewmate"),
            countdown: single_file(dir, "countdown.mp3"),
            round_end: single_file(dir, "round-end.mp3"),
        };

        tracing::info!(
            impostor = library.impostor.len(),
            crewmate = library.crewmate.len(),
            countdown = library.countdown.is_some(),
            round_end = library.round_end.is_some(),
            "Scanned sounds in {}",
            dir.display()
        );

        library
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

fn scan_folder(dir: &Path, folder: &str) -> Vec<String> {
    let path = dir.join(folder);
    if !path.is_dir() {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(&path) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to scan sounds in {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_audio_file(p))
        .filter_map(|p| {
            p.file_name()
                .and_then(|name| name.to_str())
                .map(|name| format!("{}/{}/{}", URL_PREFIX, folder, name))
        })
        .collect();
    // read_dir order is platform dependent
    files.sort();
    files
}

fn single_file(dir: &Path, name: &str) -> Option<String> {
    dir.join(name)
        .is_file()
        .then(|| format!("{}/{}", URL_PREFIX, name))
}

impl SoundProvider for SoundLibrary {
    fn has_sounds(&self) -> bool {
        !self.impostor.is_empty() && !self.crewmate.is_empty()
    }

    fn random_impostor_sound(&self) -> Option<String> {
        self.impostor.choose(&mut rand::rng()).cloned()
    }

    fn random_crewmate_sound(&self) -> Option<String> {
        self.crewmate.choose(&mut rand::rng()).cloned()
    }

    fn countdown_sound(&self) -> Option<String> {
        self.countdown.clone()
    }

    fn round_end_sound(&self) -> Option<String> {
        self.round_end.clone()
    }
}
