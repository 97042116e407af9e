use vidloom::{
    AnimationSpec, Fps, FrameIndex, InMemorySink, TextEffect, VideoFormat, frame_state,
    render_text_frames,
};

/// 2.0s clip at 24 fps split 0.5/1.0/0.5 across the three phases.
fn two_second_word_reveal() -> AnimationSpec {
    AnimationSpec {
        effect: TextEffect::RevealByWord,
        effect_duration_s: 0.5,
        hold_duration_s: 1.0,
        fadeout_duration_s: 0.5,
        fps: Fps::whole(24).unwrap(),
        font_size: Some(120),
        ..AnimationSpec::default()
    }
}

#[test]
fn two_second_clip_streams_exactly_48_frames() {
    let spec = two_second_word_reveal();
    let mut sink = InMemorySink::new();
    let pushed = match render_text_frames("made with care", &spec, VideoFormat::Landscape, &mut sink)
    {
        Ok(n) => n,
        // Hosts without a readable system font cannot rasterize text.
        Err(_) => return,
    };

    assert_eq!(pushed, 48);
    assert_eq!(sink.frames().len(), 48);

    let cfg = sink.config().unwrap();
    assert_eq!((cfg.width, cfg.height), (1920, 1080));
    assert_eq!(cfg.fps.as_f64(), 24.0);
    assert!(cfg.audio.is_none());

    for (i, (idx, frame)) in sink.frames().iter().enumerate() {
        assert_eq!(*idx, FrameIndex(i as u64));
        assert_eq!((frame.width, frame.height), (1920, 1080));
        assert_eq!(frame.data.len(), 1920 * 1080 * 4);
    }
}

#[test]
fn portrait_frames_use_the_portrait_canvas() {
    let spec = AnimationSpec {
        effect: TextEffect::Static,
        effect_duration_s: 0.25,
        hold_duration_s: 0.25,
        fadeout_duration_s: 0.0,
        fps: Fps::whole(12).unwrap(),
        font_size: Some(90),
        ..AnimationSpec::default()
    };
    let mut sink = InMemorySink::new();
    if render_text_frames("upright", &spec, VideoFormat::Portrait, &mut sink).is_err() {
        return;
    }

    let cfg = sink.config().unwrap();
    assert_eq!((cfg.width, cfg.height), (1080, 1920));
    assert_eq!(sink.frames().len(), 6);
}

#[test]
fn alpha_holds_until_fadeout_then_strictly_decreases() {
    let spec = two_second_word_reveal();
    let text = "one two three four five";

    for frame in 6..36 {
        assert_eq!(frame_state(&spec, text, frame).alpha, 255, "frame {frame}");
    }

    let mut prev = 256i32;
    for frame in 36..48 {
        let alpha = i32::from(frame_state(&spec, text, frame).alpha);
        assert!(alpha < prev, "frame {frame}: alpha {alpha} did not drop below {prev}");
        prev = alpha;
    }
}

#[test]
fn word_reveal_is_monotone_and_complete_by_the_hold_phase() {
    let spec = two_second_word_reveal();
    let text = "one two three four five";

    let mut prev = 0usize;
    for frame in 0..48 {
        let state = frame_state(&spec, text, frame);
        let shown = state.visible_text.split_whitespace().count();
        assert!(shown >= prev, "frame {frame}: {shown} words after {prev}");
        assert!(shown <= 5);
        prev = shown;
    }

    // First hold frame: t = 0.5s at 24 fps.
    assert_eq!(frame_state(&spec, text, 12).visible_text, text);
}

#[test]
fn every_effect_shows_the_full_text_mid_hold() {
    for effect in [
        TextEffect::RevealByLetter,
        TextEffect::RevealByWord,
        TextEffect::Zoom,
        TextEffect::Static,
    ] {
        let spec = AnimationSpec {
            effect,
            ..two_second_word_reveal()
        };
        // t = 1.0s, the middle of the hold phase.
        let state = frame_state(&spec, "steady on", 24);
        assert_eq!(state.visible_text, "steady on", "{effect:?}");
        assert_eq!(state.alpha, 255, "{effect:?}");
    }
}
