mod common;

use common::{MockRunner, test_config};
use mirage::config::Config;
use mirage::planner::StoryPlanner;
use mirage::story::{self, CharacterSource, ScriptSource, StoryOptions};
use std::path::Path;

const SCRIPT: &str = "The lighthouse keeper climbed the spiral stairs one final time tonight. \
                      Far below, the sea rolled black and restless against the jagged rocks. \
                      He lit the lamp and whispered goodbye to the only home he ever knew.";

fn add_portrait(cfg: &Config, name: &str) {
    std::fs::create_dir_all(&cfg.library_dir).unwrap();
    std::fs::write(cfg.library_dir.join(format!("{}.png", name)), b"portrait").unwrap();
}

fn opts(script: ScriptSource) -> StoryOptions {
    StoryOptions {
        topic: "The Last Light".to_string(),
        character: CharacterSource::Library("keeper".to_string()),
        script,
        silent: true,
    }
}

#[tokio::test]
async fn three_segments_chain_frames_and_crossfade() {
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    add_portrait(&cfg, "keeper");
    let runner = MockRunner::new();

    let outcome = story::run_story(&cfg, &runner, opts(ScriptSource::Text(SCRIPT.to_string())))
        .await
        .unwrap();

    let dir = &outcome.job.output_dir;
    assert!(dir.starts_with(&cfg.output_base_dir));
    assert_eq!(outcome.segments.len(), 3);
    assert!(outcome.segments.iter().all(|s| s.duration == Some(5.0)));

    let renders = runner.calls_to("vidius");
    assert_eq!(renders.len(), 3);
    assert_eq!(
        renders[0].arg_after("-i").map(Path::new),
        Some(dir.join("character.png").as_path())
    );
    assert_eq!(
        renders[1].arg_after("-i").map(Path::new),
        Some(dir.join("frame1.png").as_path())
    );
    assert_eq!(
        renders[2].arg_after("-i").map(Path::new),
        Some(dir.join("frame2.png").as_path())
    );
    assert!(renders.iter().all(|c| !c.has_arg("-na")));
    assert!(renders.iter().all(|c| !c.args[0].contains('"')));

    let ffmpeg = runner.calls_to("ffmpeg");
    let extractions: Vec<_> = ffmpeg.iter().filter(|c| c.has_arg("-sseof")).collect();
    assert_eq!(extractions.len(), 2);

    assert_eq!(outcome.stitched.offsets, vec![0.0, 4.5, 9.0]);
    let stitch = ffmpeg.last().unwrap();
    let filter = stitch.arg_after("-filter_complex").unwrap();
    assert!(filter.contains("offset=4.500"));
    assert!(filter.contains("offset=9.000"));
    assert!(filter.ends_with("[aout]"));
    assert!(dir.join("story.mp4").exists());

    assert_eq!(std::fs::read_to_string(dir.join("script.txt")).unwrap(), SCRIPT);
    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(html.contains("story.mp4"));
}

#[tokio::test]
async fn unknown_library_character_fails_before_any_tool() {
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let runner = MockRunner::new();

    let err = story::run_story(&cfg, &runner, opts(ScriptSource::Text(SCRIPT.to_string())))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("keeper"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn render_failure_aborts_without_stitching() {
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    add_portrait(&cfg, "keeper");
    let runner = MockRunner::new().failing("vidius");

    let err = story::run_story(&cfg, &runner, opts(ScriptSource::Text(SCRIPT.to_string())))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("Rendering segment 1 failed"));
    assert_eq!(runner.calls_to("vidius").len(), 1);
    assert!(runner.calls_to("ffmpeg").is_empty());
}

#[tokio::test]
async fn unreachable_planner_still_produces_a_story() {
    let root = tempfile::tempdir().unwrap();
    let cfg = Config {
        planner_endpoint: "http://127.0.0.1:9/v1beta".to_string(),
        ..test_config(root.path())
    };
    add_portrait(&cfg, "keeper");
    let runner = MockRunner::new();
    let planner = StoryPlanner::new(&cfg, "test-key".to_string()).unwrap();

    let outcome = story::run_story(&cfg, &runner, opts(ScriptSource::Planner(planner)))
        .await
        .unwrap();

    let plan = outcome.plan.unwrap();
    assert!(plan.is_fallback);
    assert_eq!(plan.items[0].voice_direction, "Apologetic robot");
    assert!(outcome.job.path("plan.json").exists());

    // One narration padded out to three segments.
    assert_eq!(outcome.segments.len(), 3);
    assert_eq!(outcome.segments[1].narration, "...");
    assert_eq!(runner.calls_to("vidius").len(), 3);
}

#[tokio::test]
async fn described_character_falls_back_to_placeholder_portrait() {
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());
    let runner = MockRunner::new().without_output("lumina");

    let outcome = story::run_story(
        &cfg,
        &runner,
        StoryOptions {
            character: CharacterSource::Describe("a weary sailor".to_string()),
            ..opts(ScriptSource::Text(SCRIPT.to_string()))
        },
    )
    .await
    .unwrap();

    let convert = runner.calls_to("convert");
    assert_eq!(convert.len(), 1);
    assert!(convert[0].has_arg("xc:black"));
    assert!(outcome.job.path("character.png").exists());
    let prompt = std::fs::read_to_string(outcome.job.path("character_prompt.txt")).unwrap();
    assert!(prompt.contains("a weary sailor"));
}
