use crate::api::chat::ChatClient;
use crate::config::Config;
use crate::content::generate_text_content;
use crate::ffmpeg::{FfmpegEngine, MediaEngine, with_timeout};
use crate::init::{check_ffmpeg, ensure_directories};
use crate::layout::{AudioLayout, ensure_dir, list_scenario_numbers, pick_random_song};
use crate::mixer::{AudioAssembler, MixReport, MixSpec};
use crate::scenario::{read_scenarios, stage_tts_chunks};
use crate::video::{assemble_videos, standardize_videos, trim_videos};
use crate::voice::merge_scenario_voice;
use crate::{logi, logok, logw};
use anyhow::Result;
use chrono::{DateTime, Local};
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const CONFIG_PATH: &str = "config.json";

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub scenario: u32,
    pub report: MixReport,
}

#[derive(Debug, Clone)]
pub struct ScenarioFailure {
    pub scenario: u32,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub succeeded: Vec<ScenarioOutcome>,
    pub failed: Vec<ScenarioFailure>,
}

impl BatchSummary {
    fn start() -> Self {
        let now = Local::now();
        Self {
            started_at: now,
            finished_at: now,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() { 0 } else { 1 }
    }

    fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        logi(format!(
            "Batch finished in {}s: {} of {} scenario(s) mixed.",
            elapsed.num_seconds(),
            self.succeeded.len(),
            self.total()
        ));
        for failure in &self.failed {
            logw(format!("Scenario {} failed: {}", failure.scenario, failure.message));
        }
    }
}

async fn process_scenario<R: Rng + ?Sized>(
    cfg: &Config,
    layout: &AudioLayout,
    engine: &dyn MediaEngine,
    assembler: &AudioAssembler,
    song_volume: f64,
    n: u32,
    rng: &mut R,
) -> Result<MixReport> {
    let clips = with_timeout(
        "concat-voice",
        cfg.stage_timeout(),
        merge_scenario_voice(engine, layout, n),
    )
    .await?;
    logi(format!("Scenario {}: voice merged from {} clip(s)", n, clips));

    let song = pick_random_song(&layout.songs_dir(), rng).await?;
    ensure_dir(&layout.scenario_final_dir(n)).await?;

    let spec = MixSpec::new(layout.scenario_voice(n), song, song_volume, layout.scenario_output(n))
        .with_temp_root(layout.scratch_dir());
    Ok(assembler.mix(&spec).await?)
}

pub async fn run_audio_batch<R: Rng + ?Sized>(
    cfg: &Config,
    layout: &AudioLayout,
    engine: Arc<dyn MediaEngine>,
    rng: &mut R,
) -> Result<BatchSummary> {
    let song_volume = cfg.song_volume_factor()?;
    let assembler = AudioAssembler::new(engine.clone())
        .with_coverage(cfg.coverage)
        .with_stage_timeout(cfg.stage_timeout());

    let mut summary = BatchSummary::start();
    let scenarios = list_scenario_numbers(&layout.downloaded_dir()).await?;
    if scenarios.is_empty() {
        logw(format!(
            "No scenario directories in {}",
            layout.downloaded_dir().display()
        ));
    }

    for n in scenarios {
        logi(format!("=== Scenario {} ===", n));
        match process_scenario(cfg, layout, engine.as_ref(), &assembler, song_volume, n, rng).await {
            Ok(report) => {
                logok(format!("DONE: scenario {} ({:.2}s)", n, report.total_duration));
                summary.succeeded.push(ScenarioOutcome { scenario: n, report });
            }
            Err(err) => {
                logw(format!("FAILED: scenario {}: {:#}", n, err));
                summary.failed.push(ScenarioFailure {
                    scenario: n,
                    message: format!("{:#}", err),
                });
            }
        }
    }

    summary.finished_at = Local::now();
    summary.log();
    Ok(summary)
}

fn engine_for(cfg: &Config) -> Arc<dyn MediaEngine> {
    Arc::new(FfmpegEngine::new(&cfg.ffmpeg_bin, &cfg.ffprobe_bin))
}

pub async fn run_generation() -> Result<i32> {
    let cfg = Config::load_or_default(CONFIG_PATH).await?;
    let layout = AudioLayout::new(&cfg.root_dir);

    ensure_directories(&layout).await?;
    if !check_ffmpeg(&cfg.ffmpeg_bin).await {
        anyhow::bail!(
            "{} not found or not runnable; install ffmpeg or set ffmpeg_bin in {}",
            cfg.ffmpeg_bin.display(),
            CONFIG_PATH
        );
    }

    logi("Clearing previous outputs...");
    layout.prepare().await?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    let summary = run_audio_batch(&cfg, &layout, engine_for(&cfg), &mut rng).await?;
    Ok(summary.exit_code())
}

pub async fn run_text_generation() -> Result<()> {
    let cfg = Config::load_or_default(CONFIG_PATH).await?;
    let layout = AudioLayout::new(&cfg.root_dir);
    ensure_directories(&layout).await?;

    let chat = ChatClient::from_config(&cfg)?;
    generate_text_content(&cfg, &chat).await?;

    let scenarios = read_scenarios(&cfg.text_output_path).await?;
    let counts = stage_tts_chunks(&layout, &scenarios, cfg.tts_max_chars).await?;
    logok(format!(
        "Staged {} scenario(s), {} chunk(s) for TTS",
        counts.len(),
        counts.iter().sum::<usize>()
    ));
    Ok(())
}

pub async fn run_video_generation() -> Result<()> {
    let cfg = Config::load_or_default(CONFIG_PATH).await?;
    let layout = AudioLayout::new(&cfg.root_dir);
    let engine = engine_for(&cfg);
    if !check_ffmpeg(&cfg.ffmpeg_bin).await {
        anyhow::bail!("{} not found or not runnable", cfg.ffmpeg_bin.display());
    }

    let raw: &Path = &cfg.video_raw_dir;
    let converted = standardize_videos(engine.as_ref(), raw).await?;
    logi(format!("{} clip(s) standardized", converted));

    let standardized = raw.join("converted");
    let trimmed = trim_videos(engine.as_ref(), &standardized, cfg.video_cut_seconds).await?;
    logi(format!("{} clip(s) trimmed to {}s", trimmed, cfg.video_cut_seconds));

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    let built = assemble_videos(
        engine.as_ref(),
        &layout,
        &standardized.join("cut"),
        &cfg.video_output_dir,
        &mut rng,
    )
    .await?;
    logok(format!("Built {} video(s) in {}", built.len(), cfg.video_output_dir.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MixReport {
        MixReport {
            padded_voice_duration: 17.0,
            song_duration: 8.0,
            song_extended: true,
            total_duration: 22.0,
        }
    }

    #[test]
    fn exit_code_reflects_failures() {
        let mut summary = BatchSummary::start();
        assert_eq!(summary.exit_code(), 0);
        summary.succeeded.push(ScenarioOutcome { scenario: 1, report: report() });
        assert_eq!(summary.exit_code(), 0);
        summary.failed.push(ScenarioFailure {
            scenario: 2,
            message: "no songs".to_string(),
        });
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.total(), 2);
    }
}
