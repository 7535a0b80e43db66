//! Release packaging for the browser extension.
//!
//! Copies the `addon/` tree into `target/<browser>/dist`, swaps development
//! React builds for minified ones, optionally marks the build as BETA, and
//! zips the result.
//!
//! # Example
//!
//! ```no_run
//! use flowscan::release::{ReleaseBuild, ReleaseOptions};
//!
//! let zip = ReleaseBuild::new(ReleaseOptions::new("chrome")).run()?;
//! println!("Wrote {}", zip.display());
//! # Ok::<(), flowscan::release::ReleaseError>(())
//! ```

use serde::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST: &str = "manifest.json";
const MANIFEST_TEMPLATE: &str = "manifest-template.json";

/// Development script tags and their release replacements.
const SCRIPT_REPLACEMENTS: [(&str, &str); 2] = [
    (
        r#"<script src="react.js"></script>"#,
        r#"<script src="react.min.js"></script>"#,
    ),
    (
        r#"<script src="react-dom.js"></script>"#,
        r#"<script src="react-dom.min.js"></script>"#,
    ),
];

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("invalid browser name {0:?}: must be a single path component")]
    InvalidBrowser(String),

    #[error("source directory not found: {0:?}")]
    MissingSource(PathBuf),

    #[error("invalid manifest {path:?}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("failed to write zip {path:?}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to walk {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    pub browser: String,
    /// Extension sources. Default: `addon`
    pub source_dir: PathBuf,
    /// Build output root. Default: `target`
    pub target_root: PathBuf,
    /// `BETA` marks the manifest name.
    pub environment: Option<String>,
    /// Overrides `target/<browser>/<browser>-release-build.zip`.
    pub zip_file: Option<PathBuf>,
}

impl ReleaseOptions {
    pub fn new(browser: impl Into<String>) -> Self {
        Self {
            browser: browser.into(),
            source_dir: PathBuf::from("addon"),
            target_root: PathBuf::from("target"),
            environment: None,
            zip_file: None,
        }
    }

    pub fn is_beta(&self) -> bool {
        self.environment.as_deref() == Some("BETA")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.target_root.join(&self.browser)
    }

    /// Directory that gets zipped.
    pub fn zip_root(&self) -> PathBuf {
        self.build_dir().join("dist")
    }

    /// Where the addon files land. Chrome packages keep them under `addon/`.
    pub fn dist_dir(&self) -> PathBuf {
        if self.browser == "chrome" {
            self.zip_root().join("addon")
        } else {
            self.zip_root()
        }
    }

    pub fn zip_path(&self) -> PathBuf {
        self.zip_file.clone().unwrap_or_else(|| {
            self.build_dir()
                .join(format!("{}-release-build.zip", self.browser))
        })
    }
}

pub struct ReleaseBuild {
    options: ReleaseOptions,
}

impl ReleaseBuild {
    pub fn new(options: ReleaseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReleaseOptions {
        &self.options
    }

    /// Runs every release step and returns the path of the zip.
    pub fn run(&self) -> Result<PathBuf, ReleaseError> {
        let opts = &self.options;
        validate_browser(&opts.browser)?;
        if !opts.source_dir.is_dir() {
            return Err(ReleaseError::MissingSource(opts.source_dir.clone()));
        }

        empty_dir(&opts.build_dir())?;
        let dist = opts.dist_dir();

        let copied = copy_sources(&opts.source_dir, &dist)?;
        debug!(files = copied, dist = %dist.display(), "Copied extension sources");

        write_manifest(&opts.source_dir, &dist)?;
        use_minified_scripts(&dist)?;

        if opts.is_beta() {
            mark_beta(&dist.join(MANIFEST))?;
        }

        let zip_path = opts.zip_path();
        zip_dir(&opts.zip_root(), &zip_path)?;

        info!(browser = %opts.browser, zip = %zip_path.display(), "Completed release build");
        Ok(zip_path)
    }
}

/// The browser name becomes a directory under the target root, so it must be
/// exactly one normal path component.
fn validate_browser(browser: &str) -> Result<(), ReleaseError> {
    let mut components = Path::new(browser).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ReleaseError::InvalidBrowser(browser.to_string())),
    }
}

fn empty_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Whether a path (relative to the source root) belongs in a release.
pub fn should_copy(relative: &Path) -> bool {
    let top_level = relative.components().count() == 1;
    let first = relative
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Test framework
    if first.starts_with("test-") {
        return false;
    }
    if file_name.ends_with("-test.js") || file_name.ends_with(".zip") || file_name.ends_with(".xpi") {
        return false;
    }
    // Replaced by the generated manifest and the minified React builds
    !(top_level && matches!(file_name.as_str(), MANIFEST_TEMPLATE | "react.js" | "react-dom.js"))
}

fn copy_sources(source: &Path, dest: &Path) -> Result<usize, ReleaseError> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.path()
                .strip_prefix(source)
                .map(should_copy)
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(source) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Writes `manifest.json` from the template, if the sources carry one.
fn write_manifest(source: &Path, dist: &Path) -> Result<(), ReleaseError> {
    let template = source.join(MANIFEST_TEMPLATE);
    if !template.exists() {
        return Ok(());
    }

    let content = fs::read_to_string(&template)?;
    serde_json::from_str::<serde_json::Value>(&content).map_err(|e| ReleaseError::Manifest {
        path: template.clone(),
        message: e.to_string(),
    })?;

    fs::write(dist.join(MANIFEST), content)?;
    Ok(())
}

/// Rewrites React script tags in the top-level HTML files of `dist`.
fn use_minified_scripts(dist: &Path) -> io::Result<()> {
    for entry in fs::read_dir(dist)?.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().map(|e| e != "html").unwrap_or(true) {
            continue;
        }

        let original = fs::read_to_string(&path)?;
        let updated = SCRIPT_REPLACEMENTS
            .iter()
            .fold(original.clone(), |html, (from, to)| html.replace(from, to));

        if updated != original {
            fs::write(&path, updated)?;
        }
    }
    Ok(())
}

/// Appends ` BETA` to the manifest's extension name, keeping the rest of the
/// file byte-for-byte.
fn mark_beta(manifest: &Path) -> Result<(), ReleaseError> {
    #[derive(Deserialize)]
    struct ManifestName {
        name: String,
    }

    let content = fs::read_to_string(manifest)?;
    let parsed: ManifestName =
        serde_json::from_str(&content).map_err(|e| ReleaseError::Manifest {
            path: manifest.to_path_buf(),
            message: e.to_string(),
        })?;

    let from = format!("\"name\": {}", serde_json::Value::String(parsed.name.clone()));
    let to = format!(
        "\"name\": {}",
        serde_json::Value::String(format!("{} BETA", parsed.name))
    );
    if !content.contains(&from) {
        return Err(ReleaseError::Manifest {
            path: manifest.to_path_buf(),
            message: "could not locate the \"name\" entry".to_string(),
        });
    }

    fs::write(manifest, content.replacen(&from, &to, 1))?;
    Ok(())
}

fn zip_dir(root: &Path, zip_path: &Path) -> Result<(), ReleaseError> {
    let zip_err = |source| ReleaseError::Zip {
        path: zip_path.to_path_buf(),
        source,
    };

    if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(zip_path).map_err(|e| zip_err(e.into()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options).map_err(zip_err)?;
        } else {
            zip.start_file(name, options).map_err(zip_err)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut zip).map_err(|e| zip_err(e.into()))?;
        }
    }

    zip.finish().map_err(zip_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn addon_fixture(root: &Path) -> PathBuf {
        let addon = root.join("addon");
        write(
            &addon.join("manifest-template.json"),
            "{\n  \"name\": \"Flow Inspector\",\n  \"version\": \"1.2.0\"\n}\n",
        );
        write(
            &addon.join("flow-scanner.html"),
            "<script src=\"react.js\"></script>\n<script src=\"react-dom.js\"></script>\n<script src=\"flow-scanner.js\"></script>\n",
        );
        write(&addon.join("flow-scanner.js"), "// scanner");
        write(&addon.join("react.js"), "dev");
        write(&addon.join("react.min.js"), "min");
        write(&addon.join("react-dom.js"), "dev");
        write(&addon.join("react-dom.min.js"), "min");
        write(&addon.join("test-framework.js"), "test");
        write(&addon.join("test-lib/helpers.js"), "test");
        write(&addon.join("flow-scanner-test.js"), "test");
        write(&addon.join("old.zip"), "zip");
        write(&addon.join("old.xpi"), "xpi");
        write(&addon.join("images/icon.png"), "png");
        addon
    }

    fn options(root: &Path, browser: &str) -> ReleaseOptions {
        let mut options = ReleaseOptions::new(browser);
        options.source_dir = root.join("addon");
        options.target_root = root.join("target");
        options
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_should_copy() {
        assert!(should_copy(Path::new("flow-scanner.js")));
        assert!(should_copy(Path::new("images/icon.png")));
        assert!(should_copy(Path::new("lib/react.js")));
        assert!(!should_copy(Path::new("test-framework.js")));
        assert!(!should_copy(Path::new("test-lib/helpers.js")));
        assert!(!should_copy(Path::new("lib/data-test.js")));
        assert!(!should_copy(Path::new("build.zip")));
        assert!(!should_copy(Path::new("build.xpi")));
        assert!(!should_copy(Path::new("manifest-template.json")));
        assert!(!should_copy(Path::new("react.js")));
        assert!(!should_copy(Path::new("react-dom.js")));
    }

    #[test]
    fn test_paths_per_browser() {
        let chrome = ReleaseOptions::new("chrome");
        assert_eq!(chrome.dist_dir(), PathBuf::from("target/chrome/dist/addon"));
        assert_eq!(
            chrome.zip_path(),
            PathBuf::from("target/chrome/chrome-release-build.zip")
        );

        let firefox = ReleaseOptions::new("firefox");
        assert_eq!(firefox.dist_dir(), PathBuf::from("target/firefox/dist"));
    }

    #[test]
    fn test_chrome_release_build() {
        let dir = tempfile::tempdir().unwrap();
        addon_fixture(dir.path());
        let opts = options(dir.path(), "chrome");

        let zip_path = ReleaseBuild::new(opts.clone()).run().unwrap();
        assert_eq!(zip_path, dir.path().join("target/chrome/chrome-release-build.zip"));

        let dist = opts.dist_dir();
        let html = fs::read_to_string(dist.join("flow-scanner.html")).unwrap();
        assert!(html.contains("<script src=\"react.min.js\"></script>"));
        assert!(html.contains("<script src=\"react-dom.min.js\"></script>"));
        assert!(!html.contains("<script src=\"react.js\"></script>"));

        let manifest = fs::read_to_string(dist.join("manifest.json")).unwrap();
        assert!(manifest.contains("\"name\": \"Flow Inspector\""));

        let entries = zip_entries(&zip_path);
        assert!(entries.contains(&"addon/flow-scanner.js".to_string()));
        assert!(entries.contains(&"addon/manifest.json".to_string()));
        assert!(entries.contains(&"addon/images/icon.png".to_string()));
        assert!(!entries.iter().any(|e| e.contains("test")));
        assert!(!entries.iter().any(|e| e.ends_with("/react.js") || e.ends_with(".zip")));
    }

    #[test]
    fn test_beta_build_renames_extension() {
        let dir = tempfile::tempdir().unwrap();
        addon_fixture(dir.path());
        let mut opts = options(dir.path(), "firefox");
        opts.environment = Some("BETA".to_string());
        opts.zip_file = Some(dir.path().join("out/beta.zip"));

        let zip_path = ReleaseBuild::new(opts.clone()).run().unwrap();
        assert_eq!(zip_path, dir.path().join("out/beta.zip"));

        let manifest = fs::read_to_string(opts.dist_dir().join("manifest.json")).unwrap();
        assert_eq!(
            manifest,
            "{\n  \"name\": \"Flow Inspector BETA\",\n  \"version\": \"1.2.0\"\n}\n"
        );

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("manifest.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("Flow Inspector BETA"));
    }

    #[test]
    fn test_previous_build_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        addon_fixture(dir.path());
        let opts = options(dir.path(), "firefox");
        write(&opts.dist_dir().join("stale.js"), "old");

        ReleaseBuild::new(opts.clone()).run().unwrap();
        assert!(!opts.dist_dir().join("stale.js").exists());
    }

    #[test]
    fn test_browser_must_be_single_component() {
        let dir = tempfile::tempdir().unwrap();
        let addon = addon_fixture(dir.path());
        fs::create_dir_all(dir.path().join("target")).unwrap();

        for browser in ["..", "a/b", ".", "", "/tmp"] {
            let err = ReleaseBuild::new(options(dir.path(), browser)).run().unwrap_err();
            assert!(
                matches!(err, ReleaseError::InvalidBrowser(ref b) if b == browser),
                "{browser:?} was accepted"
            );
        }

        assert!(addon.join("flow-scanner.js").is_file());
        assert!(dir.path().join("target").is_dir());
        assert_eq!(fs::read_dir(dir.path().join("target")).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_source_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReleaseBuild::new(options(dir.path(), "chrome")).run().unwrap_err();
        assert!(matches!(err, ReleaseError::MissingSource(_)));
    }
}
