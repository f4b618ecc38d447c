//! Integration tests for the markup → primitives pipeline.
//!
//! These tests exercise the full path from a markup string to a
//! `Synthesis`. They verify:
//! - Normalized lines match the documented examples
//! - Layout always progresses and respects the content width
//! - Primitives never overlap across rows and stay inside the card
//! - Nodes can be found, soft-deleted and rebuilt from their background
//! - Image probing and embedding, including every fallback path

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use richcard::error::ImageError;
use richcard::image_loader::{to_data_url, ImageResolver, ImageSize};
use richcard::layout::{CancelToken, CardConfig, Resources, FALLBACK_IMAGE_SIZE};
use richcard::model::StyledRun;
use richcard::scene::{self, Role, Shape};
use richcard::text::{layout_runs, FontSpec, LayoutOptions};
use richcard::{parse, render, render_node_json, resynthesize, Synthesis};

// ─── Helpers ────────────────────────────────────────────────────

/// Every character is half the font size wide.
fn half_em(text: &str, font: &FontSpec) -> f64 {
    text.chars().count() as f64 * font.size * 0.5
}

fn config() -> CardConfig {
    CardConfig {
        x: 500.0,
        y: 300.0,
        max_width: 200.0,
        font_size: 10.0,
        line_height: 1.5,
        padding: 10.0,
        ..Default::default()
    }
}

fn line_texts(markup: &str) -> Vec<String> {
    parse(markup)
        .lines
        .iter()
        .map(|line| line.iter().map(|r| r.text.as_str()).collect())
        .collect()
}

fn png_data_url(w: u32, h: u32) -> String {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([0, 128, 255, 255]));
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(encoder, img.as_raw(), w, h, image::ColorType::Rgba8).unwrap();
    to_data_url("image/png", &buf)
}

fn background(s: &Synthesis) -> scene::Rect {
    *s.primitives
        .iter()
        .find(|p| scene::is_background(p))
        .expect("every synthesis has a background")
        .shape
        .rect()
}

fn geometry(s: &Synthesis) -> Vec<(Role, [f64; 4], Option<String>)> {
    s.primitives
        .iter()
        .map(|p| {
            let r = p.shape.rect();
            let text = match &p.shape {
                Shape::Text { text, .. } => Some(text.clone()),
                _ => None,
            };
            (p.role(), [r.x, r.y, r.width, r.height], text)
        })
        .collect()
}

/// Resolver that counts calls and never fails.
struct CountingResolver {
    size: ImageSize,
    probes: AtomicUsize,
    materialized: AtomicUsize,
}

impl CountingResolver {
    fn new(w: f64, h: f64) -> Self {
        Self {
            size: ImageSize::new(w, h),
            probes: AtomicUsize::new(0),
            materialized: AtomicUsize::new(0),
        }
    }
}

impl ImageResolver for CountingResolver {
    fn probe_size(&self, _src: &str) -> Result<ImageSize, ImageError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.size)
    }

    fn materialize(&self, src: &str) -> Result<String, ImageError> {
        self.materialized.fetch_add(1, Ordering::SeqCst);
        Ok(format!("data:image/png;base64,{}", src))
    }
}

/// Resolver whose second image fails both operations.
struct FlakyResolver;

impl ImageResolver for FlakyResolver {
    fn probe_size(&self, src: &str) -> Result<ImageSize, ImageError> {
        if src == "bad" {
            Err(ImageError::Decode("corrupt header".to_string()))
        } else {
            Ok(ImageSize::new(60.0, 30.0))
        }
    }

    fn materialize(&self, src: &str) -> Result<String, ImageError> {
        if src == "bad" {
            Err(ImageError::Decode("corrupt body".to_string()))
        } else {
            Ok("data:image/png;base64,AAAA".to_string())
        }
    }
}

/// Cancels after the first check.
struct CancelAfterFirst(AtomicUsize);

impl CancelToken for CancelAfterFirst {
    fn is_cancelled(&self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst) >= 1
    }
}

// ─── Markup Normalization ───────────────────────────────────────

#[test]
fn test_documented_inline_example() {
    let doc = parse("<b>Hi</b> <i>there</i>");
    assert_eq!(doc.plain_text, "Hi there");
    assert_eq!(doc.lines.len(), 1);
    let line = &doc.lines[0];
    assert_eq!(line.len(), 3);
    assert!(line[0].style.bold);
    assert_eq!(line[1], StyledRun::plain(" "));
    assert!(line[2].style.italic);
}

#[test]
fn test_documented_list_example() {
    assert_eq!(line_texts("<ul><li>a</li><li>b</li></ul>"), vec!["• a", "• b"]);
}

#[test]
fn test_empty_markup() {
    let doc = parse("");
    assert!(doc.is_empty());
    assert_eq!(doc.plain_text, "");
    assert!(doc.lines.is_empty());
    assert!(doc.images.is_empty());
}

#[test]
fn test_newlines_and_rules_split_lines() {
    assert_eq!(line_texts("first\nsecond"), vec!["first", "second"]);
    assert_eq!(line_texts("a<hr>b"), vec!["a", "b"]);
}

#[test]
fn test_malformed_markup_is_tolerated() {
    let doc = parse("<b>bold <i>both</b> tail</i> <p>open");
    assert!(doc.plain_text.contains("bold"));
    assert!(doc.plain_text.contains("open"));
}

#[test]
fn test_plain_text_round_trip() {
    for markup in [
        "<p>one</p><p>two <b>three</b></p>",
        "a<br>b<br><br>c",
        "<h1>Title</h1><ol><li>x</li><li>y</li></ol>",
        "<pre>keep   this</pre>",
    ] {
        let doc = parse(markup);
        let joined: Vec<String> = doc
            .lines
            .iter()
            .map(|l| l.iter().map(|r| r.text.as_str()).collect())
            .filter(|t: &String| !t.is_empty())
            .collect();
        assert_eq!(doc.plain_text, joined.join("\n").trim(), "markup: {}", markup);
    }
}

#[test]
fn test_adjacent_runs_never_share_style() {
    let doc = parse("<b>a</b><b>b</b><span>c</span>d<i>e</i><i><u>f</u></i>");
    for line in &doc.lines {
        for pair in line.windows(2) {
            assert_ne!(pair[0].style, pair[1].style, "{:?}", line);
        }
    }
}

// ─── Line Layout ────────────────────────────────────────────────

#[test]
fn test_documented_wrap_example() {
    let runs = vec![StyledRun::plain("abcdefghij")];
    let unit = |t: &str, _: &FontSpec| t.chars().count() as f64;
    let out = layout_runs(
        &runs,
        &LayoutOptions {
            start_line_index: 0,
            start_offset_x: 0.0,
            max_width: 4.0,
            font_size: 16.0,
            font_family: "sans-serif",
            measurer: Some(&unit),
        },
    );
    let texts: Vec<&str> = out.items.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    assert_eq!(out.lines_used, 3);
}

#[test]
fn test_layout_progress_keeps_every_character() {
    let text = "The quick brown fox jumps over the lazy dog, twice over.";
    let runs = vec![
        StyledRun::plain(&text[..20]),
        StyledRun::new(&text[20..], parse("<b>x</b>").lines[0][0].style.clone()),
    ];
    for width in [1.0, 7.0, 33.0, 1000.0] {
        let out = layout_runs(
            &runs,
            &LayoutOptions {
                start_line_index: 5,
                start_offset_x: 0.0,
                max_width: width,
                font_size: 10.0,
                font_family: "sans-serif",
                measurer: Some(&half_em),
            },
        );
        let rebuilt: String = out.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(rebuilt, text);
        assert!(out.items.iter().all(|i| i.line_index >= 5));
        for item in &out.items {
            let single = item.text.chars().count() == 1;
            assert!(single || item.offset_x + item.width <= width + 1e-9);
        }
    }
}

// ─── Synthesis ──────────────────────────────────────────────────

#[test]
fn test_card_is_centered_and_background_first() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render("<p>hello</p><p>world</p>", &config(), &res);
    assert_eq!(out.primitives[0].role(), Role::Background);
    let bg = background(&out);
    assert!((bg.x + bg.width / 2.0 - 500.0).abs() < 1e-9);
    assert!((bg.y + bg.height / 2.0 - 300.0).abs() < 1e-9);
    assert_eq!(bg.width, 200.0);
}

#[test]
fn test_primitives_stay_inside_card_and_rows_do_not_overlap() {
    let res = Resources::default().with_measurer(&half_em);
    let markup = "<h2>Notes</h2><p>Some <mark>highlighted</mark> and <u>underlined</u> text \
                  that is long enough to wrap across several rows of the card.</p>\
                  <ul><li><s>done</s></li><li>open</li></ul>";
    let out = render(markup, &config(), &res);
    let bg = background(&out);

    let mut texts: Vec<scene::Rect> = Vec::new();
    for p in out.primitives.iter().skip(1) {
        let r = p.shape.rect();
        assert!(r.x >= bg.x - 1e-9 && r.right() <= bg.right() + 1e-9, "{:?}", p);
        assert!(r.y >= bg.y - 1e-9 && r.bottom() <= bg.bottom() + 1e-9, "{:?}", p);
        if scene::is_text(p) {
            texts.push(*r);
        }
    }

    for (i, a) in texts.iter().enumerate() {
        for b in texts.iter().skip(i + 1) {
            let same_row = (a.y - b.y).abs() < 1e-9;
            if same_row {
                assert!(a.right() <= b.x + 1e-9 || b.right() <= a.x + 1e-9);
            } else {
                assert!(a.bottom() <= b.y + 1e-9 || b.bottom() <= a.y + 1e-9);
            }
        }
    }
}

#[test]
fn test_row_heights_never_below_line_height() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render("<p>a</p><p>b</p><p>c</p>", &config(), &res);
    let line_height = config().row_height();
    let tops: Vec<f64> = out
        .primitives
        .iter()
        .filter(|p| scene::is_text(p))
        .map(|p| p.shape.rect().y)
        .collect();
    for pair in tops.windows(2) {
        assert!(pair[1] - pair[0] >= line_height - 1e-9);
    }
}

#[test]
fn test_blank_paragraph_adds_no_height() {
    let res = Resources::default().with_measurer(&half_em);
    let with_blank = render("<p>a</p><p><br></p><p>b</p>", &config(), &res);
    let without = render("<p>a</p><p>b</p>", &config(), &res);
    assert_eq!(geometry(&with_blank), geometry(&without));
    assert_eq!(background(&with_blank).height, 2.0 * config().row_height() + 20.0);
}

#[test]
fn test_embedded_newline_renders_two_rows() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render("first\nsecond", &config(), &res);
    let tops: Vec<f64> = out
        .primitives
        .iter()
        .filter(|p| scene::is_text(p))
        .map(|p| p.shape.rect().y)
        .collect();
    assert_eq!(tops.len(), 2);
    assert!((tops[1] - tops[0] - config().row_height()).abs() < 1e-9);
}

#[test]
fn test_decorations_follow_paint_order() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render(
        r#"<span style="background-color: #ffec99; text-decoration: underline line-through">x</span>"#,
        &config(),
        &res,
    );
    let roles: Vec<Role> = out.primitives.iter().map(|p| p.role()).collect();
    assert_eq!(
        roles,
        vec![Role::Background, Role::TextBg, Role::Underline, Role::Strike, Role::Text]
    );
}

#[test]
fn test_synthesis_is_idempotent_in_geometry() {
    let res = Resources::default().with_measurer(&half_em);
    let markup = "<b>Hi</b> <i>there</i><br><u>again</u>";
    let a = render(markup, &config(), &res);
    let b = render(markup, &config(), &res);
    assert_eq!(geometry(&a), geometry(&b));
    assert_ne!(a.primitives[0].group_id, b.primitives[0].group_id);
}

#[test]
fn test_identity_is_shared_and_ids_are_unique() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render("<p>one</p><p><u>two</u></p>", &config(), &res);
    let node_id = out.node_id().unwrap().to_string();
    let group_id = out.primitives[0].group_id.clone();
    let mut ids = HashSet::new();
    for p in &out.primitives {
        assert_eq!(p.node_id, node_id);
        assert_eq!(p.group_id, group_id);
        assert!(!p.is_deleted);
        assert!(ids.insert(p.id.clone()));
    }
}

// ─── Node Identity ──────────────────────────────────────────────

#[test]
fn test_edit_cycle_rebuilds_node_in_place() {
    let res = Resources::default().with_measurer(&half_em);
    let first = render("<p>draft</p>", &config(), &res);
    let node_id = first.node_id().unwrap().to_string();
    let mut scene_prims = first.primitives;

    let mut node = scene::node_config(&scene_prims, &node_id).unwrap().clone();
    assert_eq!(node.markup, "<p>draft</p>");
    node.markup = "<p>final <b>copy</b></p>".to_string();

    let rebuilt = resynthesize(&node, &config(), &res);
    assert_eq!(rebuilt.node_id(), Some(node_id.as_str()));
    let retired = scene::replace_node(&mut scene_prims, rebuilt);
    assert_eq!(retired, 2);

    let live: Vec<_> = scene::primitives_for_node(&scene_prims, &node_id).collect();
    let texts: Vec<&str> = live
        .iter()
        .filter_map(|p| match &p.shape {
            Shape::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["final ", "copy"]);
    assert_eq!(scene::node_ids(&scene_prims), vec![node_id.as_str()]);
    assert_eq!(scene_prims.iter().filter(|p| p.is_deleted).count(), 2);
}

#[test]
fn test_render_node_json() {
    let json = r#"{"nodeId":"n-7","markup":"<i>x</i>","fontSize":12,"maxWidth":240,"padding":8}"#;
    let out = render_node_json(json, &Resources::default()).unwrap();
    assert_eq!(out.node_id(), Some("n-7"));
    assert_eq!(background(&out).width, 240.0);

    assert!(render_node_json("{not json", &Resources::default()).is_err());
}

#[test]
fn test_synthesis_json_shape() {
    let res = Resources::default().with_measurer(&half_em);
    let out = render("<u>x</u>", &config(), &res);
    let value: serde_json::Value = serde_json::from_str(&out.to_json().unwrap()).unwrap();
    let prims = value["primitives"].as_array().unwrap();
    assert_eq!(prims[0]["role"], "background");
    assert_eq!(prims[0]["node"]["markup"], "<u>x</u>");
    assert_eq!(prims[1]["role"], "underline");
    assert_eq!(prims[2]["text"], "x");
    assert_eq!(prims[2]["isDeleted"], false);
}

// ─── Images ─────────────────────────────────────────────────────

#[test]
fn test_data_url_image_is_probed_and_embedded() {
    let src = png_data_url(40, 20);
    let markup = format!(r#"<p>pic</p><img src="{}">"#, src);
    let out = render(&markup, &config(), &Resources::default());

    let image = out.primitives.iter().find(|p| scene::is_image(p)).unwrap();
    let (rect, file_id) = match &image.shape {
        Shape::Image { rect, file_id } => (*rect, file_id.clone()),
        other => panic!("expected image, got {:?}", other),
    };
    assert_eq!((rect.width, rect.height), (40.0, 20.0));
    let asset = &out.assets[&file_id];
    assert_eq!(asset.mime_type, "image/png");
    assert_eq!(asset.data_url, src);
}

#[test]
fn test_identical_images_share_one_asset() {
    let src = png_data_url(8, 8);
    let markup = format!(r#"<img src="{0}"><img src="{0}">"#, src);
    let out = render(&markup, &config(), &Resources::default());
    assert_eq!(out.primitives.iter().filter(|p| scene::is_image(p)).count(), 2);
    assert_eq!(out.assets.len(), 1);
}

#[test]
fn test_every_image_is_probed_once() {
    let resolver = CountingResolver::new(10.0, 10.0);
    let res = Resources::default()
        .with_measurer(&half_em)
        .with_images(&resolver);
    render(r#"<img src="a"><img src="b"><img src="c">"#, &config(), &res);
    assert_eq!(resolver.probes.load(Ordering::SeqCst), 3);
    assert_eq!(resolver.materialized.load(Ordering::SeqCst), 3);
}

#[test]
fn test_failed_image_gets_fallback_and_placeholder() {
    let res = Resources::default()
        .with_measurer(&half_em)
        .with_images(&FlakyResolver);
    let out = render(r#"<img src="good"><img src="bad">"#, &config(), &res);

    let rects: Vec<scene::Rect> = out
        .primitives
        .iter()
        .filter(|p| scene::is_image(p))
        .map(|p| *p.shape.rect())
        .collect();
    assert_eq!(rects.len(), 2);
    assert_eq!((rects[0].width, rects[0].height), (60.0, 30.0));

    // Fallback 200x150 scaled into the 180px content width.
    let scale = 180.0 / FALLBACK_IMAGE_SIZE.width;
    assert!((rects[1].width - 180.0).abs() < 1e-9);
    assert!((rects[1].height - FALLBACK_IMAGE_SIZE.height * scale).abs() < 1e-9);
    assert!(rects[1].y >= rects[0].bottom());

    let mimes: HashSet<&str> = out.assets.values().map(|a| a.mime_type.as_str()).collect();
    assert!(mimes.contains("image/png") && mimes.contains("image/svg+xml"));
}

#[test]
fn test_cancellation_skips_remaining_images() {
    let resolver = CountingResolver::new(10.0, 10.0);
    let cancel = CancelAfterFirst(AtomicUsize::new(0));
    let res = Resources::default()
        .with_images(&resolver)
        .with_cancel(&cancel);
    let out = render(r#"<img src="a"><img src="b"><img src="c">"#, &config(), &res);

    assert_eq!(resolver.materialized.load(Ordering::SeqCst), 1);
    assert_eq!(out.primitives.iter().filter(|p| scene::is_image(p)).count(), 3);
    let placeholders = out
        .assets
        .values()
        .filter(|a| a.mime_type == "image/svg+xml")
        .count();
    assert!(placeholders >= 1);
}
