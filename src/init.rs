use crate::layout::{AudioLayout, dir_exists};
use crate::logi;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::fs;

pub async fn ensure_directories(layout: &AudioLayout) -> Result<()> {
    for dir in layout.required_dirs() {
        if !dir_exists(&dir).await {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg(ffmpeg_bin: &Path) -> bool {
    match tokio::process::Command::new(ffmpeg_bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}
