#![allow(dead_code)]

use async_trait::async_trait;
use faceless_shorts::MediaError;
use faceless_shorts::ffmpeg::{FfmpegJob, Filter, MediaEngine};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory stand-in for ffmpeg/ffprobe. Known files carry a duration; each
/// job computes its output duration the way the real filters would and writes
/// an empty output file.
#[derive(Default)]
pub struct FakeEngine {
    durations: Mutex<HashMap<PathBuf, f64>>,
    jobs: Mutex<Vec<FfmpegJob>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `path` with `secs` of audio and writes a placeholder file.
    pub fn add_media(&self, path: &Path, secs: f64) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"media").unwrap();
        self.durations
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), secs);
    }

    pub fn fail_stage(&self, stage: &str) {
        self.failing.lock().unwrap().insert(stage.to_string());
    }

    pub fn hang_stage(&self, stage: &str) {
        self.hanging.lock().unwrap().insert(stage.to_string());
    }

    pub fn duration_of(&self, path: &Path) -> Option<f64> {
        self.durations.lock().unwrap().get(path).copied()
    }

    pub fn jobs(&self) -> Vec<FfmpegJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<String> {
        self.jobs().into_iter().map(|j| j.stage).collect()
    }

    fn simulate(&self, job: &FfmpegJob) -> f64 {
        let known = self.durations.lock().unwrap();
        let inputs: Vec<Option<f64>> = job
            .inputs
            .iter()
            .map(|input| {
                let base = known.get(&input.path).copied()?;
                let loops = option_value(&input.options, "-stream_loop").unwrap_or(0.0);
                Some(base * (loops + 1.0))
            })
            .collect();
        let first = inputs.first().copied().flatten().unwrap_or(0.0);

        let mut out = match &job.filter {
            Some(Filter::Audio(chain)) => match param(chain, "apad=pad_dur=") {
                Some(pad) => first + pad,
                None => first,
            },
            Some(Filter::Complex { graph, .. }) if graph.contains("amix") => {
                let delay = param(graph, "adelay=").unwrap_or(0.0) / 1000.0;
                let song = inputs.get(1).copied().flatten().unwrap_or(0.0);
                let song = match param(graph, "atrim=0:") {
                    Some(end) => song.min(end),
                    None => song,
                };
                (first + delay).max(song)
            }
            Some(Filter::Complex { graph, .. }) if graph.contains("concat=") => {
                inputs.iter().map(|d| d.unwrap_or(0.0)).sum()
            }
            _ if job.output_options.iter().any(|o| o == "-shortest") => inputs
                .iter()
                .flatten()
                .copied()
                .fold(f64::INFINITY, f64::min),
            _ => first,
        };

        if let Some(limit) = option_value(&job.output_options, "-t") {
            out = out.min(limit);
        }
        out
    }
}

fn option_value(options: &[String], flag: &str) -> Option<f64> {
    let i = options.iter().position(|o| o == flag)?;
    options.get(i + 1)?.parse().ok()
}

fn param(text: &str, key: &str) -> Option<f64> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        self.duration_of(path)
            .ok_or_else(|| MediaError::DurationUndefined {
                path: path.to_path_buf(),
            })
    }

    async fn run(&self, job: &FfmpegJob) -> Result<(), MediaError> {
        self.jobs.lock().unwrap().push(job.clone());

        let hang = self.hanging.lock().unwrap().contains(&job.stage);
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let fail = self.failing.lock().unwrap().contains(&job.stage);
        if fail {
            return Err(MediaError::FilterGraph {
                stage: job.stage.clone(),
                message: "simulated failure".to_string(),
            });
        }

        let duration = self.simulate(job);
        if let Some(parent) = job.output.parent() {
            if !parent.is_dir() {
                return Err(MediaError::MissingOutput {
                    stage: job.stage.clone(),
                    path: job.output.clone(),
                });
            }
        }
        std::fs::write(&job.output, b"media")?;
        self.durations
            .lock()
            .unwrap()
            .insert(job.output.clone(), duration);
        Ok(())
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}
