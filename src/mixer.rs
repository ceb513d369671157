use crate::error::MediaError;
use crate::ffmpeg::{secs, with_timeout, FfmpegJob, MediaEngine, AUDIO_CODEC};
use crate::{logi, logok, logw};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

pub const SILENCE_PAD_SECS: f64 = 5.0;
pub const LEAD_IN_MS: u64 = 5000;
pub const FADE_OUT_SECS: f64 = 5.0;

const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(600);

fn lead_in_secs() -> f64 {
    LEAD_IN_MS as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStrategy {
    #[default]
    DoubleOnce,
    LoopToCover,
}

#[derive(Debug, Clone)]
pub struct MixSpec {
    pub voice_path: PathBuf,
    pub song_path: PathBuf,
    pub song_volume: f64,
    pub output_path: PathBuf,
    pub temp_root: PathBuf,
}

impl MixSpec {
    pub fn new(
        voice_path: impl Into<PathBuf>,
        song_path: impl Into<PathBuf>,
        song_volume: f64,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            voice_path: voice_path.into(),
            song_path: song_path.into(),
            song_volume,
            output_path: output_path.into(),
            temp_root: std::env::temp_dir(),
        }
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixReport {
    pub padded_voice_duration: f64,
    pub song_duration: f64,
    pub song_extended: bool,
    pub total_duration: f64,
}

pub(crate) fn pad_filter(pad_secs: f64) -> String {
    format!("apad=pad_dur={}", secs(pad_secs))
}

pub(crate) fn concat_graph(inputs: usize) -> String {
    let labels: String = (0..inputs).map(|i| format!("[{}:a]", i)).collect();
    format!("{}concat=n={}:v=0:a=1[out]", labels, inputs)
}

pub(crate) fn mix_graph(lead_in_ms: u64, total_duration: f64, song_volume: f64) -> String {
    [
        format!("[0:a]adelay={0}|{0}[voiceDelayed]", lead_in_ms),
        format!(
            "[1:a]atrim=0:{},asetpts=PTS-STARTPTS[songTrimmed]",
            secs(total_duration)
        ),
        format!("[songTrimmed]volume={}[songAdjusted]", song_volume),
        "[voiceDelayed][songAdjusted]amix=inputs=2:duration=longest:normalize=0[mixed]"
            .to_string(),
    ]
    .join(";")
}

pub(crate) fn fade_filter(total_duration: f64, fade_secs: f64) -> String {
    let start = (total_duration - fade_secs).max(0.0);
    format!("afade=t=out:st={}:d={}", secs(start), secs(fade_secs))
}

pub fn repeat_count(target: f64, song: f64) -> u32 {
    if target <= song {
        return 1;
    }
    (target / song).ceil() as u32
}

pub fn covered_duration(voice: f64, song: f64) -> f64 {
    if voice <= song {
        return song;
    }
    voice.min(repeat_count(voice, song) as f64 * song)
}

pub struct AudioAssembler {
    engine: Arc<dyn MediaEngine>,
    coverage: CoverageStrategy,
    stage_timeout: Duration,
}

impl AudioAssembler {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            coverage: CoverageStrategy::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    pub fn with_coverage(mut self, coverage: CoverageStrategy) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    async fn stage<T, F>(&self, stage: &str, fut: F) -> Result<T, MediaError>
    where
        F: Future<Output = Result<T, MediaError>>,
    {
        with_timeout(stage, self.stage_timeout, fut).await
    }

    async fn probe(&self, stage: &str, path: &Path) -> Result<f64, MediaError> {
        self.stage(stage, self.engine.probe_duration(path)).await
    }

    async fn run(&self, job: FfmpegJob) -> Result<(), MediaError> {
        let stage = job.stage.clone();
        self.stage(&stage, self.engine.run(&job)).await
    }

    /// Pads the voice, stretches the song if needed, mixes them with a
    /// lead-in delay and fades the tail out into `spec.output_path`.
    ///
    /// Intermediate files live in a scratch directory unique to this call and
    /// are removed when it returns, whether it succeeded or not.
    pub async fn mix(&self, spec: &MixSpec) -> Result<MixReport, MediaError> {
        if !spec.song_volume.is_finite() || !(0.0..=1.0).contains(&spec.song_volume) {
            return Err(MediaError::InvalidVolume(spec.song_volume));
        }

        fs::create_dir_all(&spec.temp_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("mix-")
            .tempdir_in(&spec.temp_root)?;

        let padded = scratch.path().join("voice_with_silence.mp3");
        self.run(
            FfmpegJob::new("pad-voice", &padded)
                .input(&spec.voice_path)
                .audio_filter(pad_filter(SILENCE_PAD_SECS))
                .audio_codec(AUDIO_CODEC),
        )
        .await?;
        let padded_duration = self.probe("probe-padded-voice", &padded).await?;
        logi(format!(
            "Voice padded with {}s of silence: {:.2}s",
            secs(SILENCE_PAD_SECS),
            padded_duration
        ));

        let song_duration = self.probe("probe-song", &spec.song_path).await?;
        let total_duration = padded_duration + lead_in_secs();

        let (song_used, song_used_duration, song_extended) = match self.coverage {
            CoverageStrategy::DoubleOnce if song_duration < padded_duration => {
                let doubled = scratch.path().join("song_doubled.mp3");
                self.run(
                    FfmpegJob::new("double-song", &doubled)
                        .input(&spec.song_path)
                        .input(&spec.song_path)
                        .complex_filter(concat_graph(2), Some("[out]"))
                        .audio_codec(AUDIO_CODEC),
                )
                .await?;
                let doubled_duration = self.probe("probe-doubled-song", &doubled).await?;
                if doubled_duration < padded_duration {
                    logw(format!(
                        "Song still shorter than voice after doubling ({:.2}s < {:.2}s); mixing anyway.",
                        doubled_duration, padded_duration
                    ));
                }
                (doubled, doubled_duration, true)
            }
            CoverageStrategy::LoopToCover if song_duration < total_duration => {
                let looped = scratch.path().join("song_looped.mp3");
                self.run(loop_job(
                    &spec.song_path,
                    song_duration,
                    total_duration,
                    &looped,
                ))
                .await?;
                let looped_duration = self.probe("probe-looped-song", &looped).await?;
                (looped, looped_duration, true)
            }
            _ => (spec.song_path.clone(), song_duration, false),
        };
        if !song_extended {
            logi("Song is long enough; using it unmodified.");
        }

        let premix = scratch.path().join("premix.mp3");
        self.run(
            FfmpegJob::new("mix", &premix)
                .input(&padded)
                .input(&song_used)
                .complex_filter(
                    mix_graph(LEAD_IN_MS, total_duration, spec.song_volume),
                    Some("[mixed]"),
                )
                .audio_codec(AUDIO_CODEC),
        )
        .await?;

        if let Some(parent) = spec.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        self.run(
            FfmpegJob::new("fade-out", &spec.output_path)
                .input(&premix)
                .audio_filter(fade_filter(total_duration, FADE_OUT_SECS))
                .audio_codec(AUDIO_CODEC),
        )
        .await?;

        logok(format!(
            "Mixed {} + {} -> {} ({:.2}s)",
            spec.voice_path.display(),
            spec.song_path.display(),
            spec.output_path.display(),
            total_duration
        ));

        Ok(MixReport {
            padded_voice_duration: padded_duration,
            song_duration: song_used_duration,
            song_extended,
            total_duration,
        })
    }

    pub async fn repeat_audio_to_match_duration(
        &self,
        voice: &Path,
        song: &Path,
        out: &Path,
    ) -> Result<f64, MediaError> {
        let voice_duration = self.probe("probe-voice", voice).await?;
        let song_duration = self.probe("probe-song", song).await?;

        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if voice_duration <= song_duration {
            fs::copy(song, out).await?;
            logi(format!(
                "Song already covers the voice ({:.2}s >= {:.2}s); copied.",
                song_duration, voice_duration
            ));
            return Ok(song_duration);
        }

        self.run(loop_job(song, song_duration, voice_duration, out))
            .await?;
        let covered = covered_duration(voice_duration, song_duration);
        logok(format!(
            "Looped {} x{} -> {} ({:.2}s)",
            song.display(),
            repeat_count(voice_duration, song_duration),
            out.display(),
            covered
        ));
        Ok(covered)
    }
}

fn loop_job(song: &Path, song_duration: f64, target: f64, out: &Path) -> FfmpegJob {
    let extra_loops = repeat_count(target, song_duration).saturating_sub(1);
    FfmpegJob::new("loop-song", out)
        .input_with(["-stream_loop".to_string(), extra_loops.to_string()], song)
        .output_options(["-t".to_string(), secs(target)])
        .audio_codec(AUDIO_CODEC)
}
