// tests/graph_build.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use assetpipe::config::load_and_validate;
use assetpipe::context::AppContext;
use assetpipe::errors::PipelineError;
use assetpipe::fs::RealFileSystem;
use assetpipe::types::ReloadKind;
use assetpipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder, write_file};
use assetpipe_test_utils::init_tracing;
use tempfile::TempDir;
use tokio::sync::broadcast::error::TryRecvError;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const SITE_CONFIG: &str = r#"
[config]
dest_root = "build"

[tools]
stylesheet-compile = "cat"

[[group]]
name = "libs"
tasks = ["css-libs", "fonts"]

[[group]]
name = "app"
tasks = ["css-main", "html"]

[task.css-libs]
src = ["app/scss/libs/*.scss"]
dest = "build/css/libs"
transforms = ["stylesheet-compile", "stylesheet-minify"]

[task.fonts]
src = ["app/fonts/*"]
dest = "build/fonts"

[task.css-main]
src = ["app/scss/*.scss"]
dest = "build/css"
transforms = ["stylesheet-compile", "stylesheet-minify"]

[task.html]
src = ["app/*.html"]
dest = "build"
transforms = ["partial-include"]
"#;

fn site() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write_file(root, "Assetpipe.toml", SITE_CONFIG);
    write_file(root, "app/scss/libs/grid.scss", ".grid {  display: grid ; }\n");
    write_file(root, "app/scss/main.scss", "/* main */\nbody {\n  color: red;\n}\n");
    write_file(root, "app/scss/_vars.scss", "$x: 1;\n");
    write_file(root, "app/fonts/icons.woff2", [0u8, 1, 2, 3]);
    write_file(root, "app/partials/nav.html", "<nav>\n  <a href=\"/\">home</a>\n</nav>\n");
    write_file(
        root,
        "app/index.html",
        "<body>\n  @@include('partials/nav.html')\n</body>\n",
    );
    dir
}

fn context(root: &Path) -> Result<AppContext, PipelineError> {
    let cfg = load_and_validate(root.join("Assetpipe.toml"))?;
    AppContext::new(cfg, root, Arc::new(RealFileSystem))
}

fn read(root: &Path, rel: &str) -> Vec<u8> {
    fs::read(root.join(rel)).unwrap_or_else(|e| panic!("reading {rel}: {e}"))
}

#[tokio::test]
async fn full_build_writes_every_output() -> TestResult {
    init_tracing();
    let dir = site();
    let root = dir.path();
    let ctx = context(root)?;
    ctx.preflight()?;

    let report = ctx.build_all().await;
    assert!(report.succeeded(), "{:?}", report.first_failure());

    assert_eq!(read(root, "build/css/libs/grid.min.css"), b".grid{display:grid}");
    assert_eq!(read(root, "build/css/main.min.css"), b"body{color:red}");
    assert!(!root.join("build/css/_vars.min.css").exists());
    assert_eq!(read(root, "build/fonts/icons.woff2"), [0u8, 1, 2, 3]);
    assert_eq!(
        String::from_utf8(read(root, "build/index.html"))?,
        "<body>\n  <nav>\n    <a href=\"/\">home</a>\n  </nav>\n</body>\n"
    );
    Ok(())
}

#[tokio::test]
async fn rebuilding_unchanged_sources_is_byte_identical() -> TestResult {
    init_tracing();
    let dir = site();
    let root = dir.path();
    let ctx = context(root)?;

    ctx.build_all().await.into_result()?;
    let first: Vec<Vec<u8>> = ["build/css/main.min.css", "build/index.html", "build/fonts/icons.woff2"]
        .iter()
        .map(|p| read(root, p))
        .collect();

    ctx.build_all().await.into_result()?;
    let second: Vec<Vec<u8>> = ["build/css/main.min.css", "build/index.html", "build/fonts/icons.woff2"]
        .iter()
        .map(|p| read(root, p))
        .collect();

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn later_group_sees_earlier_group_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/css/a.css", "a {  color: blue ; }");

    let cfg = ConfigFileBuilder::new()
        .with_group("stage", &["stage"])
        .with_group("minify", &["minify"])
        .with_task("stage", TaskConfigBuilder::new("app/css/*.css", "tmp/css").build())
        .with_task(
            "minify",
            TaskConfigBuilder::new("tmp/css/*.css", "build/css")
                .transform("stylesheet-minify")
                .build(),
        )
        .build();
    let ctx = AppContext::new(cfg, root, Arc::new(RealFileSystem))?;

    let report = ctx.build_all().await;
    assert!(report.succeeded());
    let names: Vec<&str> = report.reports.iter().map(|r| r.task.as_str()).collect();
    assert_eq!(names, vec!["stage", "minify"]);
    assert_eq!(read(root, "build/css/a.min.css"), b"a{color:blue}");
    Ok(())
}

#[tokio::test]
async fn failing_task_does_not_stop_siblings_or_later_groups() -> TestResult {
    init_tracing();
    let dir = site();
    let root = dir.path();
    write_file(root, "app/broken.html", "@@include('partials/missing.html')\n");

    let ctx = context(root)?;
    let mut signals = ctx.notifier().subscribe();
    let report = ctx.build_all().await;

    let failed = report.first_failure().expect("html should fail");
    assert_eq!(failed.task, "html");
    // The good page of the failing task is still written.
    assert!(root.join("build/index.html").exists());
    assert!(!root.join("build/broken.html").exists());
    assert!(report.report("css-main").is_some_and(|r| r.succeeded()));

    // css-libs, fonts and css-main notify; the failed html run does not.
    let mut kinds = Vec::new();
    loop {
        match signals.try_recv() {
            Ok(kind) => kinds.push(kind),
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("unexpected receive error: {e}"),
        }
    }
    kinds.sort_by_key(|k| k.event_name());
    assert_eq!(
        kinds,
        vec![ReloadKind::Stylesheet, ReloadKind::Stylesheet, ReloadKind::Other]
    );

    match report.into_result() {
        Err(PipelineError::TaskFailed { task, .. }) => assert_eq!(task, "html"),
        other => panic!("expected TaskFailed, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn build_group_runs_only_that_group() -> TestResult {
    init_tracing();
    let dir = site();
    let root = dir.path();
    let ctx = context(root)?;

    ctx.build_group("libs").await?.into_result()?;
    assert!(root.join("build/css/libs/grid.min.css").exists());
    assert!(!root.join("build/css/main.min.css").exists());

    assert!(matches!(
        ctx.build_group("nope").await,
        Err(PipelineError::ConfigError(_))
    ));
    Ok(())
}

#[tokio::test]
async fn image_cache_skips_unchanged_images() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();
    write_file(root, "app/img/logo.png", [0x89u8, b'P', b'N', b'G']);

    let cfg = ConfigFileBuilder::new()
        .with_group("app", &["images"])
        .with_task(
            "images",
            TaskConfigBuilder::new("app/img/*.png", "build/img")
                .transform("image-optimize")
                .build(),
        )
        .build();
    let ctx = AppContext::new(cfg, root, Arc::new(RealFileSystem))?;
    let mut signals = ctx.notifier().subscribe();

    let cold = ctx.build_all().await;
    assert_eq!(cold.report("images").map(|r| r.written.len()), Some(1));
    assert_eq!(signals.try_recv()?, ReloadKind::Other);

    let warm = ctx.build_all().await;
    assert!(warm.succeeded());
    assert_eq!(warm.report("images").map(|r| r.written.len()), Some(0));
    assert!(matches!(signals.try_recv(), Err(TryRecvError::Empty)));

    // Removing the output invalidates the cached entry.
    fs::remove_file(root.join("build/img/logo.png"))?;
    let rebuilt = ctx.build_all().await;
    assert_eq!(rebuilt.report("images").map(|r| r.written.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn mandatory_source_matching_nothing_fails_preflight() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    let cfg = ConfigFileBuilder::new()
        .with_group("app", &["js", "vendor"])
        .with_task("js", TaskConfigBuilder::new("app/js/*.js", "build/js").build())
        .with_task(
            "vendor",
            TaskConfigBuilder::new("vendor/*.js", "build/vendor")
                .allow_empty(true)
                .build(),
        )
        .build();
    let ctx = AppContext::new(cfg, root, Arc::new(RealFileSystem))?;
    match ctx.preflight() {
        Err(PipelineError::ConfigError(msg)) => assert!(msg.contains("'js'"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }

    write_file(root, "app/js/main.js", "let a = 1;");
    ctx.preflight()?;
    let report = ctx.build_all().await;
    assert!(report.succeeded());
    assert_eq!(report.report("vendor").map(|r| r.written.len()), Some(0));
    Ok(())
}
