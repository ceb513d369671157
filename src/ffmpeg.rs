use crate::error::MediaError;
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const AUDIO_CODEC: &str = "libmp3lame";

const STDERR_TAIL_CHARS: usize = 800;

#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    async fn run(&self, job: &FfmpegJob) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobInput {
    pub path: PathBuf,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Audio(String),
    Complex { graph: String, map: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegJob {
    pub stage: String,
    pub inputs: Vec<JobInput>,
    pub filter: Option<Filter>,
    pub output_options: Vec<String>,
    pub output: PathBuf,
}

impl FfmpegJob {
    pub fn new(stage: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            inputs: Vec::new(),
            filter: None,
            output_options: Vec::new(),
            output: output.into(),
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(JobInput {
            path: path.into(),
            options: Vec::new(),
        });
        self
    }

    pub fn input_with<I, S>(mut self, options: I, path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(JobInput {
            path: path.into(),
            options: options.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn audio_filter(mut self, chain: impl Into<String>) -> Self {
        self.filter = Some(Filter::Audio(chain.into()));
        self
    }

    pub fn complex_filter(mut self, graph: impl Into<String>, map: Option<&str>) -> Self {
        self.filter = Some(Filter::Complex {
            graph: graph.into(),
            map: map.map(str::to_string),
        });
        self
    }

    pub fn output_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_options
            .extend(options.into_iter().map(Into::into));
        self
    }

    pub fn audio_codec(self, codec: &str) -> Self {
        self.output_options(["-c:a", codec])
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.display().to_string());
        }

        match &self.filter {
            Some(Filter::Audio(chain)) => {
                args.push("-af".to_string());
                args.push(chain.clone());
            }
            Some(Filter::Complex { graph, map }) => {
                args.push("-filter_complex".to_string());
                args.push(graph.clone());
                if let Some(label) = map {
                    args.push("-map".to_string());
                    args.push(label.clone());
                }
            }
            None => {}
        }

        args.extend(self.output_options.iter().cloned());
        args.push(self.output.display().to_string());
        args
    }

    pub fn input_path(&self, index: usize) -> Option<&Path> {
        self.inputs.get(index).map(|i| i.path.as_path())
    }
}

pub fn parse_probe_duration(text: &str) -> Option<f64> {
    let value = text.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value)
}

/// Seconds rendered the way every filter expression expects them.
pub fn secs(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

pub(crate) async fn with_timeout<T, F>(stage: &str, limit: Duration, fut: F) -> Result<T, MediaError>
where
    F: Future<Output = Result<T, MediaError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout {
            stage: stage.to_string(),
            after: limit,
        }),
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim().to_string();
    }
    text.chars().skip(count - max_chars).collect::<String>().trim().to_string()
}

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffprobe_bin.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Probe {
                path: path.to_path_buf(),
                message: tail(&stderr, STDERR_TAIL_CHARS),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration(&text).ok_or_else(|| MediaError::DurationUndefined {
            path: path.to_path_buf(),
        })
    }

    async fn run(&self, job: &FfmpegJob) -> Result<(), MediaError> {
        let output = Command::new(&self.ffmpeg_bin)
            .args(job.to_args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: self.ffmpeg_bin.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::FilterGraph {
                stage: job.stage.clone(),
                message: tail(&stderr, STDERR_TAIL_CHARS),
            });
        }

        if !job.output.exists() {
            return Err(MediaError::MissingOutput {
                stage: job.stage.clone(),
                path: job.output.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_in(dir: &Path) -> FfmpegJob {
        FfmpegJob::new("pad-voice", dir.join("out.mp3"))
            .input(dir.join("in.mp3"))
            .audio_codec(AUDIO_CODEC)
    }

    #[tokio::test]
    async fn missing_binaries_fail_to_spawn() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");

        let err = engine.probe_duration(&tmp.path().join("in.mp3")).await.unwrap_err();
        assert!(matches!(err, MediaError::Spawn { ref program, .. } if program == "/nonexistent/ffprobe"));
        let err = engine.run(&job_in(tmp.path())).await.unwrap_err();
        assert!(matches!(err, MediaError::Spawn { ref program, .. } if program == "/nonexistent/ffmpeg"));
    }

    #[tokio::test]
    async fn failing_probe_is_a_probe_error() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new("true", "false");
        let err = engine.probe_duration(&tmp.path().join("in.mp3")).await.unwrap_err();
        assert!(matches!(err, MediaError::Probe { .. }));
    }

    #[tokio::test]
    async fn silent_probe_has_no_duration() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new("true", "true");
        let err = engine.probe_duration(&tmp.path().join("in.mp3")).await.unwrap_err();
        assert!(matches!(err, MediaError::DurationUndefined { .. }));
    }

    #[tokio::test]
    async fn failing_ffmpeg_names_the_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new("false", "false");
        let err = engine.run(&job_in(tmp.path())).await.unwrap_err();
        assert!(matches!(err, MediaError::FilterGraph { .. }));
        assert_eq!(err.stage(), Some("pad-voice"));
    }

    #[tokio::test]
    async fn success_without_output_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FfmpegEngine::new("true", "true");
        let err = engine.run(&job_in(tmp.path())).await.unwrap_err();
        match err {
            MediaError::MissingOutput { stage, path } => {
                assert_eq!(stage, "pad-voice");
                assert_eq!(path, tmp.path().join("out.mp3"));
            }
            other => panic!("expected missing output, got {other}"),
        }
    }

    #[tokio::test]
    async fn expired_stage_becomes_a_timeout() {
        let err = with_timeout("concat-voice", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, MediaError>(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.stage(), Some("concat-voice"));

        let value = with_timeout("probe", Duration::from_secs(1), async { Ok::<_, MediaError>(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn args_keep_input_options_before_their_input() {
        let job = FfmpegJob::new("loop", "out.mp3")
            .input_with(["-stream_loop", "2"], "song.mp3")
            .output_options(["-t", "12"])
            .audio_codec(AUDIO_CODEC);

        assert_eq!(
            job.to_args(),
            vec![
                "-y",
                "-hide_banner",
                "-loglevel",
                "error",
                "-stream_loop",
                "2",
                "-i",
                "song.mp3",
                "-t",
                "12",
                "-c:a",
                "libmp3lame",
                "out.mp3",
            ]
        );
    }

    #[test]
    fn complex_filter_is_mapped_when_labelled() {
        let job = FfmpegJob::new("double", "doubled.mp3")
            .input("a.mp3")
            .input("a.mp3")
            .complex_filter("[0:a][1:a]concat=n=2:v=0:a=1[out]", Some("[out]"));
        let args = job.to_args();
        let pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[pos + 2], "-map");
        assert_eq!(args[pos + 3], "[out]");
        assert_eq!(args.last().unwrap(), "doubled.mp3");
    }

    #[test]
    fn probe_output_parsing() {
        assert_eq!(parse_probe_duration("12.345000\n"), Some(12.345));
        assert_eq!(parse_probe_duration("N/A"), None);
        assert_eq!(parse_probe_duration(""), None);
        assert_eq!(parse_probe_duration("0"), None);
    }

    #[test]
    fn secs_drops_trailing_zeros() {
        assert_eq!(secs(5.0), "5");
        assert_eq!(secs(17.25), "17.25");
        assert_eq!(secs(12.3456), "12.346");
        assert_eq!(secs(0.0), "0");
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "x".repeat(10) + "END";
        assert_eq!(tail(&long, 3), "END");
    }
}
