use crate::logw;
use crate::mixer::CoverageStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root_dir: PathBuf,
    /// String-encoded float in [0, 1]; the voice always plays at full volume.
    pub song_volume: String,
    pub coverage: CoverageStrategy,
    pub stage_timeout_secs: u64,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,

    pub ai_base_url: String,
    pub ai_timeout_secs: u64,
    pub ai_temperature: f64,
    pub ai_system_prompt: String,
    pub messages_path: PathBuf,
    pub message_marker: String,
    pub text_output_path: PathBuf,
    pub min_words: usize,
    pub tts_max_chars: usize,

    pub video_raw_dir: PathBuf,
    pub video_cut_seconds: u32,
    pub video_output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("audio"),
            song_volume: "0.2".to_string(),
            coverage: CoverageStrategy::default(),
            stage_timeout_secs: 600,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            ai_base_url: "http://localhost:1234/v1/chat/completions".to_string(),
            ai_timeout_secs: 14_400,
            ai_temperature: 0.7,
            ai_system_prompt: default_system_prompt(),
            messages_path: PathBuf::from("precondition/messages.txt"),
            message_marker: "Message:".to_string(),
            text_output_path: PathBuf::from("audio/text-for-speech.txt"),
            min_words: 0,
            tts_max_chars: 990,
            video_raw_dir: PathBuf::from("videos"),
            video_cut_seconds: 6,
            video_output_dir: PathBuf::from("final-video"),
        }
    }
}

fn default_system_prompt() -> String {
    "You are narrating a short video about the theme:\n{theme}\nWrite flowing spoken text for the point you are given. Do not number or count anything.".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_err() {
            logw(format!(
                "{} not found; using default settings.",
                path.as_ref().display()
            ));
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.song_volume_factor()?;
        if config.stage_timeout_secs == 0 {
            anyhow::bail!("config.json: stage_timeout_secs must be positive");
        }
        if config.tts_max_chars == 0 {
            anyhow::bail!("config.json: tts_max_chars must be positive");
        }
        Ok(config)
    }

    pub fn song_volume_factor(&self) -> Result<f64> {
        let value = self
            .song_volume
            .trim()
            .parse::<f64>()
            .with_context(|| format!("config.json: song_volume '{}' is not a number", self.song_volume))?;
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("config.json: song_volume {} must be between 0 and 1", value);
        }
        Ok(value)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}
