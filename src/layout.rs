use crate::error::MediaError;
use crate::{logi, logw};
use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct AudioLayout {
    root: PathBuf,
}

impl AudioLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn tts_input_dir(&self) -> PathBuf {
        self.root.join("tts-input")
    }

    pub fn downloaded_dir(&self) -> PathBuf {
        self.root.join("downloaded")
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.root.join("converted")
    }

    pub fn songs_dir(&self) -> PathBuf {
        self.root.join("songs")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.root.join("final-audio")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("scratch")
    }

    pub fn scenario_clips_dir(&self, n: u32) -> PathBuf {
        self.downloaded_dir().join(n.to_string())
    }

    pub fn scenario_voice(&self, n: u32) -> PathBuf {
        self.converted_dir()
            .join(n.to_string())
            .join(format!("{}.mp3", n))
    }

    pub fn scenario_final_dir(&self, n: u32) -> PathBuf {
        self.final_dir().join(n.to_string())
    }

    pub fn scenario_output(&self, n: u32) -> PathBuf {
        self.scenario_final_dir(n).join(format!("audio{}.mp3", n))
    }

    pub fn required_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.tts_input_dir(),
            self.downloaded_dir(),
            self.converted_dir(),
            self.songs_dir(),
            self.final_dir(),
            self.scratch_dir(),
        ]
    }

    pub async fn prepare(&self) -> Result<()> {
        for dir in [self.converted_dir(), self.final_dir(), self.scratch_dir()] {
            clear_directory_contents(&dir).await?;
        }
        for dir in self.required_dirs() {
            ensure_dir(&dir).await?;
        }
        Ok(())
    }
}

pub async fn file_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

pub async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

pub async fn clear_directory_contents(dir_path: &Path) -> Result<()> {
    if !dir_exists(dir_path).await {
        return Ok(());
    }

    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            fs::remove_dir(path).await?;
        } else {
            fs::remove_file(path).await?;
        }
    }

    Ok(())
}

pub async fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub async fn list_scenario_numbers(dir: &Path) -> std::io::Result<Vec<u32>> {
    let mut out = Vec::new();
    if !dir_exists(dir).await {
        return Ok(out);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_str().unwrap_or_default();
        match name.parse::<u32>() {
            // `01` would resolve to the paths of `1`
            Ok(n) if n.to_string() == name => out.push(n),
            _ => logw(format!(
                "Ignoring scenario directory without a plain number: {}",
                entry.path().display()
            )),
        }
    }

    out.sort_unstable();
    Ok(out)
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let lower = ext.to_ascii_lowercase();
            exts.iter().any(|e| e.trim_start_matches('.') == lower)
        })
        .unwrap_or(false)
}

/// Files in `dir` whose extension is one of `exts`, ordered by numeric stem
/// where the stem is a number and by name otherwise.
pub async fn list_files_with_ext(dir: &Path, exts: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir_exists(dir).await {
        return Ok(out);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && has_ext(&path, exts) {
            out.push(path);
        }
    }

    out.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    Ok(out)
}

fn sort_key(path: &Path) -> (bool, u64, String) {
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_string();
    // numbered first
    match stem.parse::<u64>() {
        Ok(n) => (false, n, name),
        Err(_) => (true, 0, name),
    }
}

pub async fn pick_random_song<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf, MediaError> {
    let songs = list_files_with_ext(dir, &["mp3"]).await?;
    let song = songs
        .choose(rng)
        .cloned()
        .ok_or_else(|| MediaError::NoSongs(dir.to_path_buf()))?;
    logi(format!("Selected song: {}", song.display()));
    Ok(song)
}
