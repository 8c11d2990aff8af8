use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use handlebars_views::test_utils::fixture_path;
use handlebars_views::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn text_context() -> serde_json::Value {
    json!({"text": "test text"})
}

#[tokio::test]
async fn test_engine_renders_html() {
    let render_view = engine(EngineConfig::default().without_default_layout());
    let html = render_view
        .render_view(&fixture_path("render-text.handlebars"), ViewOptions::new(text_context()))
        .await
        .unwrap();
    assert_eq!(html, "<p>test text</p>");
}

#[tokio::test]
async fn test_render_view_uses_views_setting() {
    let engine = create(EngineConfig::default());
    let html = engine
        .render_view(
            fixture_path("render-partial.handlebars"),
            ViewOptions::new(text_context()).with_views(ViewsSetting::Single(fixture_path(""))),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<h1>partial test text</h1>\n<p>test text</p>\n</body>");
}

#[tokio::test]
async fn test_render_view_uses_views_setting_list() {
    let engine = create(EngineConfig::default());
    let html = engine
        .render_view(
            fixture_path("render-partial.handlebars"),
            ViewOptions::new(text_context()).with_views(ViewsSetting::Many(vec![fixture_path("")])),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<h1>partial test text</h1>\n<p>test text</p>\n</body>");
}

#[tokio::test]
async fn test_render_view_uses_first_matching_views_entry() {
    let tests_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests");
    let engine = create(EngineConfig::default().with_helper(
        "help",
        Helper::new(|call| Ok(json!(call.data().view.clone()))),
    ));

    let html = engine
        .render_view(
            fixture_path("render-helper.handlebars"),
            ViewOptions::new(text_context())
                .with_views(ViewsSetting::Many(vec![tests_dir.clone(), fixture_path("")]))
                .without_layout(),
        )
        .await
        .unwrap();
    assert_eq!(html, "<p>fixtures/render-helper</p>");
    assert_eq!(engine.layouts_dir(), Some(tests_dir.join("layouts/")));
}

#[tokio::test]
async fn test_render_view_ignores_empty_views_path() {
    let engine = create(EngineConfig::default().without_default_layout());
    let html = engine
        .render_view(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context()).with_views(ViewsSetting::Single(PathBuf::new())),
        )
        .await
        .unwrap();
    assert_eq!(html, "<p>test text</p>");
    assert!(engine.layouts_dir().is_none());
    assert!(engine.partials_dir().is_none());
}

#[tokio::test]
async fn test_render_view_ignores_views_list_without_parent() {
    let engine = create(EngineConfig::default().without_default_layout());
    let html = engine
        .render_view(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context())
                .with_views(ViewsSetting::Many(vec![PathBuf::from("does-not-exist")])),
        )
        .await
        .unwrap();
    assert_eq!(html, "<p>test text</p>");
    assert!(engine.layouts_dir().is_none());
    assert!(engine.partials_dir().is_none());
}

#[tokio::test]
async fn test_render_view_follows_views_setting_changes() {
    let engine = create(EngineConfig::default());
    let view = fixture_path("render-partial.handlebars");

    let html = engine
        .render_view(
            &view,
            ViewOptions::new(text_context()).with_views(ViewsSetting::Single(fixture_path(""))),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<h1>partial test text</h1>\n<p>test text</p>\n</body>");

    let other = engine
        .render_view(
            &view,
            ViewOptions::new(text_context())
                .with_views(ViewsSetting::Single(fixture_path("other-views"))),
        )
        .await
        .unwrap();
    assert_html_eq!(
        other,
        "<body>\nother layout\n<h1>other partial test text</h1>\n<p>test text</p>\n</body>"
    );
}

#[tokio::test]
async fn test_render_view_keeps_configured_dirs() {
    let engine = create(
        EngineConfig::default()
            .with_layouts_dir(fixture_path("layouts"))
            .with_partials_dir(fixture_path("partials")),
    );
    let html = engine
        .render_view(
            fixture_path("render-partial.handlebars"),
            ViewOptions::new(text_context())
                .with_views(ViewsSetting::Single(fixture_path("other-views"))),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<h1>partial test text</h1>\n<p>test text</p>\n</body>");
}

#[tokio::test]
async fn test_render_view_merges_helpers() {
    let engine = create(
        EngineConfig::default()
            .without_default_layout()
            .with_helper("help", Helper::new(|_| Ok(json!("help")))),
    );
    let mut helpers = HelperMap::new();
    helpers.insert(
        "help".to_string(),
        Helper::new(|call| Ok(call.param(0).cloned().unwrap_or_default())),
    );

    let html = engine
        .render_view(
            fixture_path("render-helper.handlebars"),
            ViewOptions::new(text_context()).with_helpers(helpers),
        )
        .await
        .unwrap();
    assert_eq!(html, "<p>test text</p>");
}

#[tokio::test]
async fn test_render_view_merges_partials() {
    let engine = create(
        EngineConfig::default()
            .without_default_layout()
            .with_partials_dir(fixture_path("partials")),
    );
    let mut partials = PartialMap::new();
    partials.insert(
        "partial".to_string(),
        CompiledTemplate::from_source("override", "override {{text}}", &CompilerOptions::default()).unwrap(),
    );

    let html = engine
        .render_view(
            fixture_path("render-partial.handlebars"),
            ViewOptions::new(text_context()).with_partials(partials),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<h1>override test text</h1>\n<p>test text</p>");
}

#[tokio::test]
async fn test_render_view_with_layout_option() {
    let engine = create(EngineConfig::default().without_default_layout());
    let layout = fixture_path("layouts/main.handlebars");
    let html = engine
        .render_view(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context()).with_layout(layout.to_string_lossy()),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<p>test text</p>\n</body>");
}

#[tokio::test]
async fn test_render_view_layout_disabled() {
    let engine = create(EngineConfig::default().with_layouts_dir(fixture_path("layouts")));
    let html = engine
        .render_view(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context()).without_layout(),
        )
        .await
        .unwrap();
    assert_eq!(html, "<p>test text</p>");
}

#[tokio::test]
async fn test_render_view_default_layout_is_not_applied_twice() {
    let engine = create(EngineConfig::default().with_layouts_dir(fixture_path("layouts")));
    let html = engine
        .render_view(fixture_path("render-text.handlebars"), ViewOptions::new(text_context()))
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<p>test text</p>\n</body>");
    assert_eq!(html.matches("<body>").count(), 1);
}

#[tokio::test]
async fn test_render_view_with_encoding() {
    let engine = create(
        EngineConfig::default()
            .with_default_layout("main-latin1")
            .with_partials_dir(fixture_path("partials"))
            .with_layouts_dir(fixture_path("layouts")),
    );
    let html = engine
        .render_view(
            fixture_path("render-latin1.handlebars"),
            ViewOptions::default().with_encoding(Encoding::Latin1),
        )
        .await
        .unwrap();
    assert!(html.contains("layout ñáéíóú"));
    assert!(html.contains("partial ñáéíóú"));
    assert!(html.contains("render ñáéíóú"));
}

#[tokio::test]
async fn test_render_view_with_default_encoding() {
    let engine = create(
        EngineConfig::default()
            .with_encoding(Encoding::Latin1)
            .with_default_layout("main-latin1")
            .with_partials_dir(fixture_path("partials"))
            .with_layouts_dir(fixture_path("layouts")),
    );
    let html = engine
        .render_view(fixture_path("render-latin1.handlebars"), ViewOptions::default())
        .await
        .unwrap();
    assert!(html.contains("layout ñáéíóú"));
    assert!(html.contains("partial ñáéíóú"));
    assert!(html.contains("render ñáéíóú"));
}

#[tokio::test]
async fn test_render_view_exposes_view_and_layout() {
    let engine = create(EngineConfig::default().with_helper(
        "help",
        Helper::new(|call| {
            let data = call.data();
            Ok(json!(format!(
                "{}:{}",
                data.view.as_deref().unwrap_or("none"),
                data.layout.as_deref().unwrap_or("none")
            )))
        }),
    ));

    let html = engine
        .render_view(
            fixture_path("render-helper.handlebars"),
            ViewOptions::new(text_context())
                .with_views(ViewsSetting::Single(fixture_path("")))
                .with_layout("main"),
        )
        .await
        .unwrap();
    assert_html_eq!(html, "<body>\n<p>render-helper:main</p>\n</body>");
}

#[tokio::test]
async fn test_templates_see_view_and_layout() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("layouts")).unwrap();
    std::fs::write(dir.path().join("page.handlebars"), "{{@view}}|{{@layout}}|{{@tenant}}").unwrap();
    std::fs::write(
        dir.path().join("layouts/main.handlebars"),
        "<main>{{{body}}}</main><footer>{{@layout}}</footer>",
    )
    .unwrap();

    let engine = create(EngineConfig::default());
    let html = engine
        .render_view(
            dir.path().join("page.handlebars"),
            ViewOptions::new(json!({}))
                .with_views(ViewsSetting::Single(dir.path().to_path_buf()))
                .with_data("tenant", json!("acme")),
        )
        .await
        .unwrap();
    assert_eq!(html, "<main>page|main|acme</main><footer></footer>");
}

#[tokio::test]
async fn test_render_view_missing_view() {
    let engine = create(EngineConfig::default());
    let err = engine
        .render_view("does-not-exist.handlebars", ViewOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no such file or directory"));
}

#[tokio::test]
async fn test_render_view_missing_layout() {
    let engine = create(EngineConfig::default().with_layouts_dir(fixture_path("layouts")));
    let err = engine
        .render_view(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context()).with_layout("missing"),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("missing.handlebars"));
}

#[tokio::test]
async fn test_render_view_calls_callback_with_html() {
    let engine = create(EngineConfig::default().without_default_layout());
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();

    let html = engine
        .render_view_with_callback(
            fixture_path("render-text.handlebars"),
            ViewOptions::new(text_context()),
            move |err, html| {
                assert!(err.is_none());
                *sink.lock().unwrap() = html.map(str::to_string);
            },
        )
        .await
        .unwrap();

    assert_eq!(html, "<p>test text</p>");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("<p>test text</p>"));
}

#[tokio::test]
async fn test_render_view_calls_callback_with_error() {
    let engine = create(EngineConfig::default());
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();

    let result = engine
        .render_view_with_callback("does-not-exist.handlebars", ViewOptions::default(), move |err, html| {
            assert!(html.is_none());
            *sink.lock().unwrap() = err.map(|e| e.to_string());
        })
        .await;

    assert!(result.is_err());
    let message = seen.lock().unwrap().clone().unwrap();
    assert!(message.contains("no such file or directory"));
}
