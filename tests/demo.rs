use std::fs;
use std::path::Path;

use deck_presenter::converter::{self, AssetPlacement, Converter};
use deck_presenter::descriptor::{Resolver, resolve_playlist};
use deck_presenter::playback::{Engine, Input, NavigationNoOp, Outcome, State};
use deck_presenter::types::SlideMode;
use deck_presenter::DeckError;

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// The "Demo" deck: once, loop-until-advanced (reversible), once.
fn demo_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for clip in ["0.mp4", "1.mp4", "1_rev.mp4", "2.mp4", "unused.mp4"] {
        write(dir.path(), &format!("files/Demo/{clip}"), clip);
    }
    write(dir.path(), "files/Demo/thumb.png", "png");
    write(
        dir.path(),
        "Demo.json",
        r#"{
            "version": 1,
            "name": "Demo",
            "resolution": [1280, 720],
            "slides": [
                {"segments": [{"file": "files/Demo/0.mp4", "duration": 1.5}], "title": "Intro",
                 "thumbnail": "files/Demo/thumb.png"},
                {"segments": ["files/Demo/1.mp4"], "mode": "loop-until-advanced",
                 "reverse": "files/Demo/1_rev.mp4"},
                {"segments": ["files/Demo/2.mp4"], "notes": "questions?"}
            ]
        }"#,
    );
    dir
}

fn slide(engine: &Engine) -> Option<usize> {
    engine.slide_index()
}

#[test]
fn three_advances_release_the_loop_before_moving_on() {
    let dir = demo_folder();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();
    let mut engine = Engine::new(p.rules());

    let mut seen = Vec::new();
    for _ in 0..3 {
        engine.handle(Input::Advance);
        seen.push(slide(&engine).unwrap());
    }
    assert_eq!(seen, vec![1, 1, 2]);
}

#[test]
fn releasing_waits_for_the_running_iteration() {
    let dir = demo_folder();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();
    let mut engine = Engine::with_start(p.rules(), 1);

    assert_eq!(engine.handle(Input::Advance), Outcome::Stayed);
    assert_eq!(slide(&engine), Some(1));
    assert_eq!(
        engine.handle(Input::MediaFinished),
        Outcome::Moved { from: Some(1), to: 2 }
    );
}

#[test]
fn navigation_at_the_edges_is_a_no_op() {
    let dir = demo_folder();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();
    let mut engine = Engine::new(p.rules());

    assert_eq!(
        engine.handle(Input::Retreat),
        Outcome::NoOp(NavigationNoOp::StartOfPresentation)
    );
    engine.handle(Input::Jump(2));
    assert_eq!(
        engine.handle(Input::Advance),
        Outcome::NoOp(NavigationNoOp::EndOfPresentation)
    );
    assert!(matches!(engine.state(), State::AtSlide { slide: 2, .. }));
}

#[test]
fn retreating_out_of_a_reversible_slide_plays_its_reverse_clip() {
    let dir = demo_folder();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();
    let mut engine = Engine::with_start(p.rules(), 1);

    engine.handle(Input::Retreat);
    let cue = engine.current_cue().unwrap();
    let asset = cue.asset(&p).unwrap();
    assert!(asset.relative.ends_with("1_rev.mp4"));

    engine.handle(Input::MediaFinished);
    assert_eq!(slide(&engine), Some(0));
}

#[test]
fn missing_media_fails_resolution() {
    let dir = demo_folder();
    fs::remove_file(dir.path().join("files/Demo/1_rev.mp4")).unwrap();

    let err = Resolver::new(dir.path()).resolve("Demo").unwrap_err();
    assert!(matches!(err, DeckError::BrokenAsset { .. }));
    assert!(err.is_resolution_error());
}

#[test]
fn converting_demo_copies_exactly_the_referenced_media() {
    let dir = demo_folder();
    let out = tempfile::tempdir().unwrap();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();

    let output = out.path().join("out.html");
    Converter::new(AssetPlacement::CoLocated)
        .convert(&p, &output)
        .unwrap();

    let mut files: Vec<String> = fs::read_dir(out.path().join("out_assets"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["0.mp4", "1.mp4", "1_rev.mp4", "2.mp4", "thumb.png"]);

    let deck = converter::load(&output).unwrap();
    assert_eq!(deck.slides.len(), p.len());
    assert_eq!(deck.settings.resolution, (1280, 720));
    assert_eq!(deck.slides[1].mode, SlideMode::LoopUntilAdvanced);
    assert_eq!(deck.slides[2].notes, "questions?");
}

#[test]
fn converted_demo_follows_the_same_transitions() {
    let dir = demo_folder();
    let out = tempfile::tempdir().unwrap();
    let p = Resolver::new(dir.path()).resolve("Demo").unwrap();
    let output = out.path().join("out.html");
    Converter::new(AssetPlacement::Embedded)
        .convert(&p, &output)
        .unwrap();

    let deck = converter::load(&output).unwrap();
    let mut direct = Engine::new(p.rules());
    let mut converted = Engine::new(deck.rules());
    for input in [
        Input::Advance,
        Input::MediaFinished,
        Input::Advance,
        Input::Retreat,
        Input::MediaFinished,
        Input::Advance,
        Input::Advance,
        Input::MediaFinished,
        Input::Advance,
    ] {
        assert_eq!(direct.handle(input), converted.handle(input));
        assert_eq!(direct.current_cue(), converted.current_cue());
    }
}

#[test]
fn playlists_join_scenes_in_order() {
    let dir = demo_folder();
    write(dir.path(), "files/Outro/end.png", "png");
    write(
        dir.path(),
        "Outro.json",
        r#"{"slides": [{"segments": ["files/Outro/end.png"], "mode": "loop"}]}"#,
    );
    write(
        dir.path(),
        "talk.json",
        r#"{"root": ".", "sequence": ["Demo", "Outro"], "name": "Talk"}"#,
    );

    let p = resolve_playlist(&dir.path().join("talk.json")).unwrap();
    assert_eq!(p.name, "Talk");
    assert_eq!(p.len(), 4);
    assert_eq!(p.slides[3].mode, SlideMode::Loop);

    let names = Resolver::new(dir.path()).list().unwrap();
    assert_eq!(names, vec!["Demo", "Outro"]);
}
