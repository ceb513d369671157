mod common;

use common::{FakeEngine, approx};
use faceless_shorts::MediaError;
use faceless_shorts::layout::AudioLayout;
use faceless_shorts::video::{assemble_scenario_video, assemble_videos, standardize_videos, trim_videos};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[tokio::test]
async fn clips_cover_the_audio_and_list_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeEngine::new();
    let clips = tmp.path().join("videos/converted/cut");
    fake.add_media(&clips.join("a.mp4"), 6.0);
    fake.add_media(&clips.join("b.mp4"), 6.0);
    let audio = tmp.path().join("audio/final-audio/1/audio1.mp3");
    fake.add_media(&audio, 22.0);

    let out = tmp.path().join("final-video/1/video1.mp4");
    let mut rng = StdRng::seed_from_u64(3);
    let picked = assemble_scenario_video(fake.as_ref(), &audio, &clips, &out, &mut rng)
        .await
        .unwrap();

    assert_eq!(picked, 4);
    assert!(out.exists());
    assert!(approx(fake.duration_of(&out).unwrap(), 22.0));

    let job = fake.jobs().pop().unwrap();
    let list = job.input_path(0).unwrap().to_path_buf();
    assert!(list.to_string_lossy().ends_with(".concat.txt"));
    assert!(!list.exists());
}

#[tokio::test]
async fn no_clips_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeEngine::new();
    let audio = tmp.path().join("audio1.mp3");
    fake.add_media(&audio, 10.0);

    let mut rng = StdRng::seed_from_u64(3);
    let err = assemble_scenario_video(
        fake.as_ref(),
        &audio,
        &tmp.path().join("empty"),
        &tmp.path().join("out/video1.mp4"),
        &mut rng,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, MediaError::NoClips(_)));
}

#[tokio::test]
async fn standardize_then_trim_skips_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let raw = tmp.path().join("videos");
    let fake = FakeEngine::new();
    fake.add_media(&raw.join("one.mp4"), 40.0);
    fake.add_media(&raw.join("two.mp4"), 50.0);

    let converted = standardize_videos(fake.as_ref(), &raw).await.unwrap();
    assert_eq!(converted, 2);
    assert!(raw.join("converted/converted_one.mp4").exists());

    fake.fail_stage("trim-video");
    let trimmed = trim_videos(fake.as_ref(), &raw.join("converted"), 6).await.unwrap();
    assert_eq!(trimmed, 0);
}

#[tokio::test]
async fn trimmed_clips_are_cut_to_length() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("videos/converted");
    let fake = FakeEngine::new();
    fake.add_media(&dir.join("converted_one.mp4"), 40.0);

    assert_eq!(trim_videos(fake.as_ref(), &dir, 6).await.unwrap(), 1);
    let cut = dir.join("cut/converted_one.mp4");
    assert!(approx(fake.duration_of(&cut).unwrap(), 6.0));
}

#[tokio::test]
async fn standardize_requires_videos() {
    let tmp = tempfile::tempdir().unwrap();
    let fake = FakeEngine::new();
    assert!(standardize_videos(fake.as_ref(), tmp.path()).await.is_err());
}

#[tokio::test]
async fn one_video_per_mixed_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = AudioLayout::new(tmp.path().join("audio"));
    let fake = FakeEngine::new();
    fake.add_media(&layout.scenario_output(1), 12.0);
    fake.add_media(&layout.scenario_output(2), 8.0);
    std::fs::create_dir_all(layout.scenario_final_dir(3)).unwrap();
    let clips = tmp.path().join("clips");
    fake.add_media(&clips.join("a.mp4"), 6.0);

    let out_root = tmp.path().join("final-video");
    let mut rng = StdRng::seed_from_u64(9);
    let built = assemble_videos(fake.as_ref(), &layout, &clips, &out_root, &mut rng)
        .await
        .unwrap();

    assert_eq!(built, vec![1, 2]);
    assert!(out_root.join("2/video2.mp4").exists());
}
