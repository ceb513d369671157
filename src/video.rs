use crate::error::MediaError;
use crate::ffmpeg::{FfmpegJob, MediaEngine};
use crate::layout::{AudioLayout, ensure_dir, file_exists, list_files_with_ext, list_scenario_numbers};
use crate::{logi, logok, logw};
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::fs;

const MAX_PICKS: usize = 500;

pub fn standardize_job(input: &Path, output: &Path) -> FfmpegJob {
    FfmpegJob::new("standardize-video", output)
        .input(input)
        .output_options([
            "-vf",
            "scale=1920:1080",
            "-r",
            "30",
            "-b:v",
            "4000k",
            "-preset",
            "veryfast",
            "-crf",
            "18",
            "-pix_fmt",
            "yuv420p",
            "-colorspace",
            "bt709",
        ])
}

pub fn trim_job(input: &Path, output: &Path, seconds: u32) -> FfmpegJob {
    FfmpegJob::new("trim-video", output)
        .input(input)
        .output_options(["-t".to_string(), seconds.to_string()])
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub async fn standardize_videos(engine: &dyn MediaEngine, dir: &Path) -> anyhow::Result<usize> {
    let videos = list_files_with_ext(dir, &["mp4"]).await?;
    if videos.is_empty() {
        anyhow::bail!(
            "No .mp4 files found in {}. Provide a folder containing video files.",
            dir.display()
        );
    }

    let out_dir = dir.join("converted");
    ensure_dir(&out_dir).await?;

    let mut done = 0;
    for video in &videos {
        let out = out_dir.join(format!("converted_{}", file_name(video)));
        match engine.run(&standardize_job(video, &out)).await {
            Ok(()) => {
                done += 1;
                logok(format!("Converted {}", file_name(video)));
            }
            Err(err) => logw(format!("Converting {} failed: {}", file_name(video), err)),
        }
    }
    Ok(done)
}

pub async fn trim_videos(engine: &dyn MediaEngine, dir: &Path, seconds: u32) -> anyhow::Result<usize> {
    let videos = list_files_with_ext(dir, &["mp4"]).await?;
    let out_dir = dir.join("cut");
    ensure_dir(&out_dir).await?;

    let mut done = 0;
    for video in &videos {
        let out = out_dir.join(file_name(video));
        match engine.run(&trim_job(video, &out, seconds)).await {
            Ok(()) => {
                done += 1;
                logok(format!("Trimmed {} to {}s", file_name(video), seconds));
            }
            Err(err) => logw(format!("Trimming {} failed: {}", file_name(video), err)),
        }
    }
    Ok(done)
}

fn escape_concat_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

pub fn concat_list(list_dir: &Path, clips: &[PathBuf]) -> String {
    let mut out = String::new();
    for clip in clips {
        let entry = pathdiff::diff_paths(clip, list_dir).unwrap_or_else(|| clip.clone());
        out.push_str(&format!(
            "file '{}'\n",
            escape_concat_path(&entry.to_string_lossy())
        ));
    }
    out
}

pub fn mux_job(list: &Path, audio: &Path, out: &Path) -> FfmpegJob {
    FfmpegJob::new("assemble-video", out)
        .input_with(["-f", "concat", "-safe", "0"], list)
        .input(audio)
        .output_options([
            "-map",
            "0:v",
            "-map",
            "1:a",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-shortest",
            "-movflags",
            "+faststart",
        ])
}

pub fn pick_clips<R: Rng + ?Sized>(
    clips: &[(PathBuf, f64)],
    target: f64,
    rng: &mut R,
) -> Vec<PathBuf> {
    let mut picked = Vec::new();
    let mut covered = 0.0;
    while covered < target && picked.len() < MAX_PICKS {
        let Some((path, dur)) = clips.choose(rng) else {
            break;
        };
        picked.push(path.clone());
        covered += dur;
    }
    picked
}

pub async fn assemble_scenario_video<R: Rng + ?Sized>(
    engine: &dyn MediaEngine,
    audio: &Path,
    clips_dir: &Path,
    out: &Path,
    rng: &mut R,
) -> Result<usize, MediaError> {
    let audio_duration = engine.probe_duration(audio).await?;

    let mut clips = Vec::new();
    for clip in list_files_with_ext(clips_dir, &["mp4"]).await? {
        match engine.probe_duration(&clip).await {
            Ok(d) => clips.push((clip, d)),
            Err(err) => logw(format!("Skipping clip {}: {}", clip.display(), err)),
        }
    }
    if clips.is_empty() {
        return Err(MediaError::NoClips(clips_dir.to_path_buf()));
    }

    let picked = pick_clips(&clips, audio_duration, rng);
    let out_dir = out.parent().map(Path::to_path_buf).unwrap_or_default();
    fs::create_dir_all(&out_dir).await?;
    let list = out.with_extension("concat.txt");
    fs::write(&list, concat_list(&out_dir, &picked)).await?;

    let result = engine.run(&mux_job(&list, audio, out)).await;
    let _ = fs::remove_file(&list).await;
    result?;

    logok(format!(
        "Assembled {} clip(s) under {:.2}s of audio -> {}",
        picked.len(),
        audio_duration,
        out.display()
    ));
    Ok(picked.len())
}

pub async fn assemble_videos<R: Rng + ?Sized>(
    engine: &dyn MediaEngine,
    layout: &AudioLayout,
    clips_dir: &Path,
    out_root: &Path,
    rng: &mut R,
) -> anyhow::Result<Vec<u32>> {
    let mut built = Vec::new();
    for n in list_scenario_numbers(&layout.final_dir()).await? {
        let audio = layout.scenario_output(n);
        if !file_exists(&audio).await {
            logw(format!("Scenario {} has no mixed audio; skipping", n));
            continue;
        }
        let out = out_root.join(n.to_string()).join(format!("video{}.mp4", n));
        logi(format!("Assembling video for scenario {}", n));
        match assemble_scenario_video(engine, &audio, clips_dir, &out, rng).await {
            Ok(_) => built.push(n),
            Err(err) => logw(format!("Scenario {} video failed: {}", n, err)),
        }
    }
    Ok(built)
}
