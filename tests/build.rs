// End-to-end tests for full builds over a scratch project
use assetpipe::build::build_all;
use assetpipe::config::{BuildConfig, Settings, Stage};
use assetpipe::error::BuildError;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder, Rgb, RgbImage};
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn logo_png() -> Vec<u8> {
    let img = RgbImage::from_fn(48, 48, |x, _| {
        if x < 24 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
        .write_image(img.as_raw(), 48, 48, ColorType::Rgb8)
        .unwrap();
    out
}

/// The conventional layout: sources, a vendor bundle and one of each asset
fn project(root: &Path) {
    write(
        root,
        "src/scss/style.scss",
        "@import \"partials/grid\";\n.main {\n  user-select: none;\n}\n",
    );
    write(root, "src/scss/partials/_grid.scss", ".row { display: flex; }\n");
    write(
        root,
        "vendor/assets/javascripts/bootstrap.js",
        "var bootstrap = { version: 3 };\n",
    );
    write(root, "src/js/a.js", "function alpha() {\n  return 1;\n}\n");
    write(root, "src/js/b.js", "function beta() {\n  return 2;\n}\n");
    write(root, "src/img/logo.png", logo_png());
    write(root, "src/fonts/icons.woff", "wOFF-font-bytes");
    write(
        root,
        "src/index.html",
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Home</title>\n  </head>\n  <body>\n    <!-- banner -->\n    <p>Hello    there</p>\n  </body>\n</html>\n",
    );
}

fn config(root: &Path) -> BuildConfig {
    Settings {
        source: root.join("src"),
        dist: root.join("dist"),
        vendor: root.join("vendor"),
        ..Settings::default()
    }
    .resolve()
    .unwrap()
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

#[tokio::test]
async fn test_full_build_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);

    let summary = build_all(&config(root)).await.unwrap();
    assert_eq!(summary.failures(), 0);

    let css = read(root, "dist/css/style.css");
    assert!(css.contains(".row"));
    assert!(css.contains(".main"));
    assert!(css.contains("-webkit-user-select: none"));
    assert!(!root.join("dist/css/_grid.css").exists());
    assert!(!root.join("dist/css/partials").exists());

    let min_css = read(root, "dist/css/style.min.css");
    assert!(!min_css.contains('\n'));
    assert!(min_css.contains(".row{"));

    for script in [
        "dist/js/bootstrap.js",
        "dist/js/a.js",
        "dist/js/b.js",
        "dist/js/script.min.js",
    ] {
        assert!(root.join(script).is_file(), "{script} missing");
    }

    let logo = image::open(root.join("dist/img/logo.png")).unwrap().to_rgb8();
    assert_eq!(logo.get_pixel(0, 0), &Rgb([255, 0, 0]));
    assert_eq!(logo.get_pixel(47, 0), &Rgb([0, 0, 255]));

    assert_eq!(fs::read(root.join("dist/fonts/icons.woff")).unwrap(), b"wOFF-font-bytes");

    let html = read(root, "dist/index.html");
    assert!(!html.contains("banner"));
    assert!(html.contains("Hello there"));
}

#[tokio::test]
async fn test_script_bundle_keeps_vendor_first() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);

    build_all(&config(root)).await.unwrap();

    let bundle = read(root, "dist/js/script.min.js");
    let bootstrap = bundle.find("bootstrap").unwrap();
    let alpha = bundle.find("alpha").unwrap();
    let beta = bundle.find("beta").unwrap();
    assert!(bootstrap < alpha && alpha < beta);
}

#[tokio::test]
async fn test_second_build_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);
    let config = config(root);

    build_all(&config).await.unwrap();
    let outputs = [
        "dist/css/style.css",
        "dist/css/style.min.css",
        "dist/js/script.min.js",
        "dist/img/logo.png",
        "dist/fonts/icons.woff",
        "dist/index.html",
    ];
    let snapshot = || -> Vec<Vec<u8>> {
        outputs
            .iter()
            .map(|p| fs::read(root.join(p)).unwrap())
            .collect()
    };
    let first = snapshot();
    let mtime = |p: &str| fs::metadata(root.join(p)).unwrap().modified().unwrap();
    let logo_time = mtime("dist/img/logo.png");

    let summary = build_all(&config).await.unwrap();
    assert_eq!(mtime("dist/img/logo.png"), logo_time);
    assert_eq!(first, snapshot());

    for stage in [Stage::Image, Stage::Font, Stage::Markup] {
        let report = summary.report(stage).unwrap();
        assert!(report.written.is_empty(), "{stage} rewrote fresh files");
        assert_eq!(report.skipped.len(), 1);
    }
}

#[tokio::test]
async fn test_touched_source_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);
    let config = config(root);
    build_all(&config).await.unwrap();

    write(root, "src/index.html", "<p>Changed</p>");
    File::options()
        .write(true)
        .open(root.join("src/index.html"))
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let summary = build_all(&config).await.unwrap();
    let markup = summary.report(Stage::Markup).unwrap();
    assert_eq!(markup.written, vec![root.join("dist/index.html")]);
    assert!(read(root, "dist/index.html").contains("Changed"));
}

#[tokio::test]
async fn test_broken_partial_only_loses_itself() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);
    write(root, "src/scss/partials/_broken.scss", ".broken { color: \n");
    write(
        root,
        "src/scss/style.scss",
        "@import \"partials/grid\";\n@import \"partials/broken\";\n.main {\n  margin: 0;\n}\n",
    );

    let summary = build_all(&config(root)).await.unwrap();

    let style = summary.report(Stage::Style).unwrap();
    assert_eq!(style.failures.len(), 1);
    assert!(style.failures[0].message.contains("partials/broken"));

    let css = read(root, "dist/css/style.css");
    assert!(css.contains(".row"));
    assert!(css.contains(".main"));
    assert!(!css.contains(".broken"));

    assert!(summary.report(Stage::Script).unwrap().is_clean());
    assert!(root.join("dist/index.html").exists());
}

#[tokio::test]
async fn test_missing_vendor_bundle_fails_only_its_stage() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    project(root);
    fs::remove_file(root.join("vendor/assets/javascripts/bootstrap.js")).unwrap();

    let result = build_all(&config(root)).await;
    let Err(BuildError::StagesFailed(failures)) = result else {
        panic!("expected a failed stage, got {result:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Script);
    assert!(failures[0].1.to_string().contains("bootstrap.js"));

    // Stages before and after the failing one still ran
    assert!(root.join("dist/css/style.css").exists());
    assert!(root.join("dist/img/logo.png").exists());
    assert!(root.join("dist/fonts/icons.woff").exists());
    assert!(root.join("dist/index.html").exists());
    assert!(!root.join("dist/js/script.min.js").exists());
}

#[tokio::test]
async fn test_style_and_image_only_tree() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/scss/style.scss", ".hero {\n  user-select: none;\n}\n");
    write(root, "src/img/logo.png", logo_png());
    let config = Settings {
        source: root.join("src"),
        dist: root.join("dist"),
        vendor: root.join("vendor"),
        ..Settings::default()
    }
    .resolve()
    .unwrap();

    // Without a vendor directory the script stage fails, the rest completes
    let err = build_all(&config).await.unwrap_err();
    assert!(matches!(&err, BuildError::StagesFailed(failures)
        if failures.iter().map(|(stage, _)| *stage).collect::<Vec<_>>() == [Stage::Script]));

    let css = read(root, "dist/css/style.css");
    assert!(css.contains(".hero"));
    assert!(css.contains("-webkit-user-select: none"));
    assert!(read(root, "dist/css/style.min.css").contains(".hero{"));

    let logo = image::open(root.join("dist/img/logo.png")).unwrap().to_rgb8();
    assert_eq!(logo.get_pixel(0, 0), &Rgb([255, 0, 0]));
    assert_eq!(logo.get_pixel(47, 47), &Rgb([0, 0, 255]));

    let modified = fs::metadata(root.join("dist/img/logo.png"))
        .unwrap()
        .modified()
        .unwrap();
    assert!(build_all(&config).await.is_err());
    let remodified = fs::metadata(root.join("dist/img/logo.png"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified, remodified);
}
