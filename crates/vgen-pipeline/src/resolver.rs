//! Derivation of render parameters from a job record.
//!
//! The duration rules are applied in a fixed order and later rules overwrite
//! earlier ones:
//!
//! 1. `sequential_mode` when the layout alignment is `serial`
//! 2. `split_screen` when not sequential and a demo reference exists
//! 3. `split_position` for split screen: `side` is right-left, `top` is bottom-top
//! 4. defaults: first video 6 s, total 30 s
//! 5. main known, no demo: total = main
//! 6. sequential, main known: first = main
//! 7. split position set, demo known: total = demo
//! 8. sequential, both known: total = main + demo

use vgen_models::{
    JobRecord, RenderParameters, SplitPosition, TextAlignment, TextPosition, VideoAlignment,
    DEFAULT_DURATION_IN_SECONDS, DEFAULT_FIRST_VIDEO_DURATION,
};

use crate::error::{PipelineError, PipelineResult};

/// Resolve parameters for `record`.
///
/// `main_duration` and `demo_duration` are probed durations in seconds;
/// non-positive or non-finite values count as unknown. Media URLs are taken
/// from the record; callers substitute normalized paths with
/// [`RenderParameters::with_media`].
pub fn resolve(
    record: &JobRecord,
    main_duration: Option<f64>,
    demo_duration: Option<f64>,
) -> PipelineResult<RenderParameters> {
    let video_url = record
        .template()
        .ok_or_else(|| PipelineError::validation("record has no template media reference"))?;
    let demo_url = record.demo();

    let main = known(main_duration);
    let demo = known(demo_duration);
    let alignment = record.video_alignment();

    let sequential_mode = *alignment == VideoAlignment::Serial;
    let split_screen = !sequential_mode && demo_url.is_some();
    let split_position = if split_screen {
        split_position_for(alignment)
    } else {
        None
    };

    let mut first_video_duration = DEFAULT_FIRST_VIDEO_DURATION;
    let mut duration_in_seconds = DEFAULT_DURATION_IN_SECONDS;

    if let (Some(m), None) = (main, demo_url) {
        duration_in_seconds = m;
    }
    if let (true, Some(m)) = (sequential_mode, main) {
        first_video_duration = m;
    }
    if let (Some(_), Some(d)) = (split_position, demo) {
        duration_in_seconds = d;
    }
    if let (true, Some(m), Some(d)) = (sequential_mode, main, demo) {
        duration_in_seconds = m + d;
    }

    if split_screen && split_position.is_none() {
        return Err(PipelineError::invalid_layout(format!(
            "split screen needs alignment 'side' or 'top', got '{}'",
            alignment.as_str()
        )));
    }

    let audio_url = record.audio().map(str::to_string);

    Ok(RenderParameters {
        text: record.text().unwrap_or_default().to_string(),
        text_position: text_position_for(record.text_alignment()),
        video_url: video_url.to_string(),
        demo_url: demo_url.map(str::to_string),
        has_audio: audio_url.is_some(),
        audio_url,
        audio_offset: record.audio_offset().filter(|o| o.is_finite()).unwrap_or(0.0),
        split_screen,
        split_position,
        sequential_mode,
        first_video_duration,
        duration_in_seconds,
    })
}

fn known(duration: Option<f64>) -> Option<f64> {
    duration.filter(|d| d.is_finite() && *d > 0.0)
}

fn split_position_for(alignment: &VideoAlignment) -> Option<SplitPosition> {
    match alignment {
        VideoAlignment::Side => Some(SplitPosition::RightLeft),
        VideoAlignment::Top => Some(SplitPosition::BottomTop),
        _ => None,
    }
}

/// Unknown or missing caption alignment centers the caption.
fn text_position_for(alignment: &TextAlignment) -> TextPosition {
    match alignment {
        TextAlignment::Top => TextPosition::Top,
        TextAlignment::Bottom => TextPosition::Bottom,
        _ => TextPosition::Center,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "https://cdn.example.com/a.mp4";
    const B: &str = "https://cdn.example.com/b.mp4";

    fn record() -> JobRecord {
        JobRecord::new("job-1").with_template(A)
    }

    #[test]
    fn test_serial_sums_durations() {
        let record = record()
            .with_demo(B)
            .with_video_alignment(VideoAlignment::Serial);

        let params = resolve(&record, Some(6.0), Some(10.0)).unwrap();
        assert!(params.sequential_mode);
        assert!(!params.split_screen);
        assert_eq!(params.split_position, None);
        assert_eq!(params.first_video_duration, 6.0);
        assert_eq!(params.duration_in_seconds, 16.0);
    }

    #[test]
    fn test_no_demo_total_is_main_duration() {
        for d in [0.5, 1.0, 6.0, 12.25, 59.9, 3600.0] {
            let params = resolve(&record(), Some(d), None).unwrap();
            assert_eq!(params.duration_in_seconds, d);
            assert_eq!(params.first_video_duration, DEFAULT_FIRST_VIDEO_DURATION);
            assert!(!params.split_screen);
        }
    }

    #[test]
    fn test_unknown_durations_use_defaults() {
        let params = resolve(&record(), None, None).unwrap();
        assert_eq!(params.first_video_duration, 6.0);
        assert_eq!(params.duration_in_seconds, 30.0);

        let params = resolve(&record(), Some(0.0), None).unwrap();
        assert_eq!(params.duration_in_seconds, 30.0);

        let params = resolve(&record(), Some(f64::NAN), None).unwrap();
        assert_eq!(params.duration_in_seconds, 30.0);
    }

    #[test]
    fn test_side_split_uses_demo_duration() {
        let record = record().with_demo(B).with_video_alignment(VideoAlignment::Side);
        let params = resolve(&record, Some(6.0), Some(10.0)).unwrap();
        assert!(params.split_screen);
        assert_eq!(params.split_position, Some(SplitPosition::RightLeft));
        assert_eq!(params.duration_in_seconds, 10.0);
    }

    #[test]
    fn test_top_split_is_bottom_top() {
        let record = record().with_demo(B).with_video_alignment(VideoAlignment::Top);
        let params = resolve(&record, None, None).unwrap();
        assert_eq!(params.split_position, Some(SplitPosition::BottomTop));
        assert_eq!(params.duration_in_seconds, 30.0);
    }

    #[test]
    fn test_split_without_valid_alignment_is_invalid_layout() {
        for alignment in [
            VideoAlignment::Unset,
            VideoAlignment::Other("diagonal".to_string()),
        ] {
            let record = record().with_demo(B).with_video_alignment(alignment);
            let err = resolve(&record, Some(5.0), Some(5.0)).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidLayout(_)));
        }
    }

    #[test]
    fn test_serial_with_only_main_known() {
        let record = record()
            .with_demo(B)
            .with_video_alignment(VideoAlignment::Serial);
        let params = resolve(&record, Some(8.0), None).unwrap();
        assert_eq!(params.first_video_duration, 8.0);
        assert_eq!(params.duration_in_seconds, 30.0);
    }

    #[test]
    fn test_serial_without_demo_uses_main_for_both() {
        let record = record().with_video_alignment(VideoAlignment::Serial);
        let params = resolve(&record, Some(9.0), None).unwrap();
        assert!(params.sequential_mode);
        assert_eq!(params.first_video_duration, 9.0);
        assert_eq!(params.duration_in_seconds, 9.0);
    }

    #[test]
    fn test_text_and_audio() {
        let record = record()
            .with_text("Hello", TextAlignment::Bottom)
            .with_audio("https://cdn.example.com/a.mp3", Some(2.5));
        let params = resolve(&record, None, None).unwrap();
        assert_eq!(params.text, "Hello");
        assert_eq!(params.text_position, TextPosition::Bottom);
        assert!(params.has_audio);
        assert_eq!(params.audio_offset, 2.5);
    }

    #[test]
    fn test_unknown_text_alignment_centers() {
        let record = record().with_text("Hi", TextAlignment::Other("left".into()));
        let params = resolve(&record, None, None).unwrap();
        assert_eq!(params.text_position, TextPosition::Center);
        assert!(!params.has_audio);
        assert_eq!(params.audio_offset, 0.0);
    }

    #[test]
    fn test_missing_template_is_validation_error() {
        let record = JobRecord::new("job-2");
        assert!(resolve(&record, None, None).unwrap_err().is_validation());
    }
}
