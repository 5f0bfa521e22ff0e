//! End-to-end tests of the execution engine over synthetic frames.

use super::engine::Pipeline;
use super::error::{IoError, PipelineError};
use super::io::{FrameFn, FrameSource, InputSink, NullInput};
use crate::vision::types::Rect;
use image::{Rgb, RgbImage};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 10x10 checkerboard patch that normalized cross-correlation cannot
/// confuse with a flat background.
fn checker_patch() -> RgbImage {
    RgbImage::from_fn(10, 10, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// A flat gray frame with the checker patch blitted at `(px, py)`.
fn frame_with_patch(px: u32, py: u32) -> RgbImage {
    let mut frame = RgbImage::from_pixel(60, 60, Rgb([128, 128, 128]));
    image::imageops::overlay(&mut frame, &checker_patch(), px as i64, py as i64);
    frame
}

/// Input sink recording every click for later inspection.
#[derive(Clone, Default)]
struct RecordingInput {
    clicks: Rc<RefCell<Vec<(i32, i32)>>>,
}

impl InputSink for RecordingInput {
    fn move_to(&mut self, _x: i32, _y: i32) -> Result<(), IoError> {
        Ok(())
    }

    fn click(&mut self, x: i32, y: i32) -> Result<(), IoError> {
        self.clicks.borrow_mut().push((x, y));
        Ok(())
    }

    fn drag_to(&mut self, _x: i32, _y: i32) -> Result<(), IoError> {
        Ok(())
    }
}

fn patch_pipeline<F: FrameSource, I: InputSink>(
    frames: F,
    input: I,
    definition: serde_json::Value,
) -> Pipeline<F, I> {
    let mut pipeline = Pipeline::new(frames, input);
    pipeline.library_mut().insert("button", &checker_patch());
    pipeline
        .load_from_value(&definition)
        .unwrap_or_else(|err| panic!("pipeline definition rejected: {err}"));
    pipeline
}

#[test]
fn two_node_run_succeeds_with_full_trace() {
    init_logs();
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let definition = json!({
        "start": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "next": ["finish"]
        },
        "finish": {}
    });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let report = pipeline.run("start").unwrap();
    assert!(report.success);
    assert_eq!(report.entry, "start");
    assert_eq!(report.trace.len(), 2);
    assert_eq!(report.trace[0].node, "start");
    assert_eq!(report.last_node(), Some("finish"));
    assert_eq!(
        report.trace[0].recognition.best_box(),
        Some(Rect::new(10, 10, 10, 10))
    );
}

#[test]
fn unrecognized_entry_node_fails_the_run() {
    // Flat frame, nothing to match.
    let frames = FrameFn(|| Ok(RgbImage::from_pixel(60, 60, Rgb([128, 128, 128]))));
    let definition = json!({
        "start": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99]
        }
    });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let report = pipeline.run("start").unwrap();
    assert!(!report.success);
    assert_eq!(report.trace.len(), 1);
    assert!(!report.trace[0].action_ok);
}

#[test]
fn dead_end_after_action_fails_the_run() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let definition = json!({
        "start": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "next": ["never"]
        },
        "never": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            // The patch is never inside this region.
            "roi": [40, 40, 20, 20]
        }
    });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let report = pipeline.run("start").unwrap();
    assert!(!report.success);
    assert_eq!(report.trace.len(), 1);
    assert!(report.trace[0].action_ok, "the entry action still ran");
}

#[test]
fn click_action_hits_the_match_center() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let input = RecordingInput::default();
    let clicks = input.clicks.clone();
    let definition = json!({
        "start": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "action": "Click"
        }
    });
    let mut pipeline = patch_pipeline(frames, input, definition);

    let report = pipeline.run("start").unwrap();
    assert!(report.success);
    // Patch box is (10, 10, 10, 10), so its center is (15, 15).
    assert_eq!(clicks.borrow().as_slice(), &[(15, 15)]);
}

#[test]
fn click_offset_shifts_the_click_point() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let input = RecordingInput::default();
    let clicks = input.clicks.clone();
    let definition = json!({
        "start": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "action": "Click",
            "action_offset": [20, 0, 0, 0]
        }
    });
    let mut pipeline = patch_pipeline(frames, input, definition);

    pipeline.run("start").unwrap();
    assert_eq!(clicks.borrow().as_slice(), &[(35, 15)]);
}

#[test]
fn pre_task_target_reuses_an_earlier_match_box() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let input = RecordingInput::default();
    let clicks = input.clicks.clone();
    let definition = json!({
        "anchor": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "next": ["relative"]
        },
        "relative": {
            "action": "Click",
            "action_target": "anchor"
        }
    });
    let mut pipeline = patch_pipeline(frames, input, definition);

    let report = pipeline.run("anchor").unwrap();
    assert!(report.success);
    // The DirectHit node clicks the anchor's recorded box center.
    assert_eq!(clicks.borrow().as_slice(), &[(15, 15)]);
}

#[test]
fn region_target_restricts_recognition() {
    let frames = FrameFn(|| Ok(frame_with_patch(30, 30)));
    let definition = json!({
        "inside": {
            "recognition": "TemplateMatch",
            "template": ["button"],
            "threshold": [0.99],
            "roi": [25, 25, 30, 30]
        }
    });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let report = pipeline.run("inside").unwrap();
    assert!(report.success);
    // Box is reported in frame coordinates, not ROI-local ones.
    assert_eq!(
        report.trace[0].recognition.best_box(),
        Some(Rect::new(30, 30, 10, 10))
    );
}

#[test]
fn off_frame_roi_fails_direct_hit_without_clicking() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let input = RecordingInput::default();
    let clicks = input.clicks.clone();
    let definition = json!({
        "ghost": {
            // Entirely outside the 60x60 frame; clips to zero area.
            "roi": [200, 200, 10, 10],
            "action": "Click"
        }
    });
    let mut pipeline = patch_pipeline(frames, input, definition);

    let report = pipeline.run("ghost").unwrap();
    assert!(!report.success);
    assert_eq!(report.trace.len(), 1);
    assert!(report.trace[0].recognition.best_box().is_none());
    assert!(clicks.borrow().is_empty());
}

#[test]
fn cyclic_graph_hits_the_step_limit() {
    init_logs();
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let definition = json!({
        "a": { "next": ["b"] },
        "b": { "next": ["a"] }
    });
    let mut pipeline = patch_pipeline(frames, NullInput, definition).with_step_limit(5);

    let err = pipeline.run("a").unwrap_err();
    assert!(matches!(err, PipelineError::StepLimitExceeded { limit: 5 }));
}

#[test]
fn capture_failure_aborts_the_run() {
    let frames = FrameFn(|| Err(IoError::capture("device disconnected")));
    let definition = json!({ "start": {} });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let err = pipeline.run("start").unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

#[test]
fn unknown_entry_is_rejected_before_capturing() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let definition = json!({ "start": {} });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let err = pipeline.run("missing").unwrap_err();
    assert!(matches!(err, PipelineError::UnknownEntry { .. }));
}

#[test]
fn run_report_serializes_to_json() {
    let frames = FrameFn(|| Ok(frame_with_patch(10, 10)));
    let definition = json!({ "start": {} });
    let mut pipeline = patch_pipeline(frames, NullInput, definition);

    let report = pipeline.run("start").unwrap();
    let value = report.to_value();
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["trace"][0]["node"], json!("start"));
}
