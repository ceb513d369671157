use crate::error::MediaError;
use crate::ffmpeg::{FfmpegJob, MediaEngine, AUDIO_CODEC};
use crate::layout::{list_files_with_ext, AudioLayout};
use crate::mixer::concat_graph;
use crate::logok;
use std::path::Path;
use tokio::fs;

pub(crate) fn concat_clips_job(clips: &[impl AsRef<Path>], out: &Path) -> FfmpegJob {
    let mut job = FfmpegJob::new("concat-voice", out);
    for clip in clips {
        job = job.input(clip.as_ref());
    }
    job.complex_filter(concat_graph(clips.len()), Some("[out]"))
        .audio_codec(AUDIO_CODEC)
}

pub async fn concatenate_clips(
    engine: &dyn MediaEngine,
    clips_dir: &Path,
    out: &Path,
) -> Result<usize, MediaError> {
    let clips = list_files_with_ext(clips_dir, &["mp3"]).await?;
    if clips.is_empty() {
        return Err(MediaError::NoClips(clips_dir.to_path_buf()));
    }

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).await?;
    }
    engine.run(&concat_clips_job(&clips, out)).await?;
    logok(format!(
        "Merged {} clips from {} -> {}",
        clips.len(),
        clips_dir.display(),
        out.display()
    ));
    Ok(clips.len())
}

pub async fn merge_scenario_voice(
    engine: &dyn MediaEngine,
    layout: &AudioLayout,
    n: u32,
) -> Result<usize, MediaError> {
    concatenate_clips(engine, &layout.scenario_clips_dir(n), &layout.scenario_voice(n)).await
}
