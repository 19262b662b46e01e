//! # pyvet-registry
//!
//! The engine's external collaborators, implemented against the public
//! package registry's JSON API: release-list and metadata lookups, wheel
//! artifact inspection, sdist download and extraction, and on-disk JSON
//! caching of registry responses.
//!
//! Every fetch runs a bounded retry (the registry is flaky enough to
//! warrant it); persistent failures degrade to `None` at the collaborator
//! trait surface, which the engine reads as "unknown, assume compatible".

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use url::Url;

use pyvet_engine::registry::{PackageMetadata, Registry, SourceProvider};
use pyvet_engine::version::{self, VersionTag};
use pyvet_engine::KnowledgeBase;

const METADATA_CACHE_FILE: &str = "metadata_cache.json";
const RELEASE_CACHE_FILE: &str = "release_cache.json";

/// Filenames inside a release artifact that carry dependency
/// declarations when the registry metadata omits them.
const REQUIRES_FILES: [&str; 2] = ["requires.txt", "requirements.txt"];

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// JSON API root; must end with a slash.
    pub base_url: String,
    /// Directory for downloaded artifacts and response caches.
    pub cache_dir: PathBuf,
    /// Fetch attempts per URL.
    pub retries: usize,
    /// Pause between attempts.
    pub retry_pause: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            base_url: "https://pypi.org/pypi/".to_string(),
            cache_dir: std::env::temp_dir().join("pyvet-cache"),
            retries: 3,
            retry_pause: Duration::from_millis(500),
        }
    }
}

/// Cached shape of one release's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredMetadata {
    #[serde(default)]
    requires_dist: Vec<String>,
    #[serde(default)]
    requires_python: String,
}

impl From<StoredMetadata> for PackageMetadata {
    fn from(stored: StoredMetadata) -> Self {
        PackageMetadata {
            dependency_exprs: stored.requires_dist,
            compatibility_expr: stored.requires_python,
        }
    }
}

/// The registry's JSON document for a project or a single release.
#[derive(Debug, Deserialize)]
struct ProjectDocument {
    info: ReleaseInfo,
    #[serde(default)]
    releases: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    urls: Vec<ArtifactRef>,
}

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
    #[serde(default)]
    requires_python: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ArtifactRef {
    url: String,
    #[serde(default)]
    filename: String,
}

/// Blocking registry client with write-through caches.
///
/// Interior mutability is `RefCell`: the engine is single-threaded by
/// design and the client is not `Sync`.
pub struct PyPiClient {
    config: RegistryConfig,
    universe: Vec<VersionTag>,
    metadata_cache: RefCell<FxHashMap<String, FxHashMap<String, StoredMetadata>>>,
    release_cache: RefCell<FxHashMap<String, Vec<String>>>,
}

impl PyPiClient {
    pub fn new(config: RegistryConfig, universe: Vec<VersionTag>) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir).with_context(|| {
            format!("create cache dir: {}", config.cache_dir.display())
        })?;
        let metadata_cache =
            load_cache(&config.cache_dir.join(METADATA_CACHE_FILE)).unwrap_or_default();
        let release_cache =
            load_cache(&config.cache_dir.join(RELEASE_CACHE_FILE)).unwrap_or_default();
        Ok(PyPiClient {
            config,
            universe,
            metadata_cache: RefCell::new(metadata_cache),
            release_cache: RefCell::new(release_cache),
        })
    }

    /// Client over the default registry with the built-in version universe.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            RegistryConfig::default(),
            KnowledgeBase::builtin().versions().to_vec(),
        )
    }

    // ---- lookups ----

    /// Ascending published versions of a package.
    pub fn release_versions(&self, name: &str) -> Result<Vec<VersionTag>> {
        if let Some(cached) = self.release_cache.borrow().get(name) {
            return Ok(cached.iter().map(|v| VersionTag::from(v.as_str())).collect());
        }
        let document = self.fetch_document(&self.project_url(name)?)?;
        let mut versions: Vec<VersionTag> = document
            .releases
            .keys()
            .map(|v| VersionTag::from(v.as_str()))
            .collect();
        version::sort_ascending(&mut versions);

        self.release_cache.borrow_mut().insert(
            name.to_string(),
            versions.iter().map(|v| v.as_str().to_string()).collect(),
        );
        self.persist_release_cache();
        Ok(versions)
    }

    /// Declared dependencies and compatibility expression of one release.
    ///
    /// When the registry document omits dependency declarations (common
    /// for source-only releases), the first release artifact is downloaded
    /// and its requirements file read instead.
    pub fn release_metadata(&self, name: &str, release: &str) -> Result<PackageMetadata> {
        if let Some(stored) = self
            .metadata_cache
            .borrow()
            .get(name)
            .and_then(|versions| versions.get(release))
        {
            return Ok(stored.clone().into());
        }

        let document = self.fetch_document(&self.release_url(name, release)?)?;
        let mut requires_dist = document.info.requires_dist.clone().unwrap_or_default();
        if requires_dist.is_empty() {
            if let Some(artifact) = document.urls.first() {
                match self.archive_dependency_exprs(artifact) {
                    Ok(extracted) => requires_dist = extracted,
                    Err(error) => {
                        tracing::debug!(package = name, release, %error, "no dependency declarations recoverable from artifact");
                    }
                }
            }
        }
        let stored = StoredMetadata {
            requires_dist,
            requires_python: document.info.requires_python.clone().unwrap_or_default(),
        };

        self.metadata_cache
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .insert(release.to_string(), stored.clone());
        self.persist_metadata_cache();
        Ok(stored.into())
    }

    /// Language versions covered by binary artifacts of one release,
    /// judged from `cpXY`/`pyXY` tags in artifact URLs; bare major tags
    /// cover the whole corresponding line.
    pub fn wheel_tag_versions(&self, name: &str, release: &str) -> Result<FxHashSet<VersionTag>> {
        let document = self.fetch_document(&self.release_url(name, release)?)?;
        Ok(wheel_versions_from_urls(
            &document.urls,
            release,
            &self.universe,
        ))
    }

    /// Download and extract the source release, returning the extracted
    /// project directory.
    pub fn source_tree(&self, name: &str, release: &str) -> Result<PathBuf> {
        let hyphenated = self.config.cache_dir.join(format!("{name}-{release}"));
        let underscored = self
            .config
            .cache_dir
            .join(format!("{}-{release}", name.replace('-', "_")));
        if hyphenated.is_dir() {
            return Ok(hyphenated);
        }
        if underscored.is_dir() {
            return Ok(underscored);
        }

        let document = self.fetch_document(&self.release_url(name, release)?)?;
        let artifact = document
            .urls
            .iter()
            .find(|artifact| is_sdist(&artifact.url))
            .ok_or_else(|| anyhow!("no source-form release for {name}@{release}"))?;
        let bytes = self.fetch_bytes(&Url::parse(&artifact.url)?)?;

        let filename = artifact_filename(artifact);
        let archive_path = self.config.cache_dir.join(&filename);
        fs::write(&archive_path, &bytes)
            .with_context(|| format!("write {}", archive_path.display()))?;

        if filename.ends_with(".zip") {
            extract_zip(&bytes, &self.config.cache_dir)?;
        } else {
            extract_tar_gz(&bytes, &self.config.cache_dir)?;
        }

        if hyphenated.is_dir() {
            Ok(hyphenated)
        } else if underscored.is_dir() {
            Ok(underscored)
        } else {
            Err(anyhow!(
                "extracted archive did not produce {name}-{release}"
            ))
        }
    }

    // ---- plumbing ----

    fn project_url(&self, name: &str) -> Result<Url> {
        let base = Url::parse(&self.config.base_url)
            .with_context(|| format!("invalid registry url: {:?}", self.config.base_url))?;
        base.join(&format!("{name}/json"))
            .with_context(|| format!("registry url join for {name}"))
    }

    fn release_url(&self, name: &str, release: &str) -> Result<Url> {
        let base = Url::parse(&self.config.base_url)
            .with_context(|| format!("invalid registry url: {:?}", self.config.base_url))?;
        base.join(&format!("{name}/{release}/json"))
            .with_context(|| format!("registry url join for {name}@{release}"))
    }

    fn fetch_document(&self, url: &Url) -> Result<ProjectDocument> {
        let bytes = self.fetch_bytes(url)?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parse registry document: {}", url.as_str()))
    }

    /// GET with bounded retry; every attempt's failure is logged, only the
    /// last one is returned.
    fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let mut last_error = anyhow!("no fetch attempts configured");
        for attempt in 0..self.config.retries.max(1) {
            if attempt > 0 {
                thread::sleep(self.config.retry_pause);
            }
            match ureq::get(url.as_str()).call() {
                Ok(response) => {
                    let mut reader = response.into_body().into_reader();
                    let mut buf = Vec::new();
                    reader
                        .read_to_end(&mut buf)
                        .context("read http response")?;
                    return Ok(buf);
                }
                Err(error) => {
                    tracing::debug!(url = url.as_str(), attempt, %error, "fetch failed");
                    last_error = anyhow!("http GET {}: {error}", url);
                }
            }
        }
        Err(last_error)
    }

    /// Dependency expressions from a release artifact's requirements file.
    fn archive_dependency_exprs(&self, artifact: &ArtifactRef) -> Result<Vec<String>> {
        let filename = artifact_filename(artifact);
        let bytes = self.fetch_bytes(&Url::parse(&artifact.url)?)?;
        let content = if filename.ends_with(".whl") || filename.ends_with(".zip") {
            requires_from_zip(&bytes)?
        } else if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            requires_from_tar_gz(&bytes)?
        } else {
            return Err(anyhow!("unsupported artifact format: {filename}"));
        };
        let content = content.ok_or_else(|| anyhow!("no requirements file in {filename}"))?;
        Ok(preprocess_requirements(&content))
    }

    fn persist_metadata_cache(&self) {
        persist_cache(
            &self.config.cache_dir.join(METADATA_CACHE_FILE),
            &*self.metadata_cache.borrow(),
        );
    }

    fn persist_release_cache(&self) {
        persist_cache(
            &self.config.cache_dir.join(RELEASE_CACHE_FILE),
            &*self.release_cache.borrow(),
        );
    }
}

impl Registry for PyPiClient {
    fn metadata(&self, name: &str, release: &str) -> Option<PackageMetadata> {
        match self.release_metadata(name, release) {
            Ok(metadata) => Some(metadata),
            Err(error) => {
                tracing::warn!(package = name, release, %error, "metadata lookup miss");
                None
            }
        }
    }

    fn release_list(&self, name: &str) -> Option<Vec<VersionTag>> {
        match self.release_versions(name) {
            Ok(versions) => Some(versions),
            Err(error) => {
                tracing::warn!(package = name, %error, "release list lookup miss");
                None
            }
        }
    }
}

impl SourceProvider for PyPiClient {
    fn wheel_versions(&self, name: &str, release: &str) -> Option<FxHashSet<VersionTag>> {
        match self.wheel_tag_versions(name, release) {
            Ok(versions) => Some(versions),
            Err(error) => {
                tracing::warn!(package = name, release, %error, "wheel inspection miss");
                None
            }
        }
    }

    fn fetch_source(&self, name: &str, release: &str) -> Option<PathBuf> {
        match self.source_tree(name, release) {
            Ok(path) => Some(path),
            Err(error) => {
                tracing::warn!(package = name, release, %error, "source retrieval miss");
                None
            }
        }
    }
}

fn load_cache<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "ignoring unreadable cache");
            None
        }
    }
}

fn persist_cache<T: Serialize>(path: &Path, value: &T) {
    match serde_json::to_vec_pretty(value) {
        Ok(bytes) => {
            if let Err(error) = fs::write(path, bytes) {
                tracing::warn!(path = %path.display(), %error, "cache write failed");
            }
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "cache serialization failed");
        }
    }
}

fn artifact_filename(artifact: &ArtifactRef) -> String {
    if !artifact.filename.is_empty() {
        return artifact.filename.clone();
    }
    artifact
        .url
        .rsplit('/')
        .next()
        .unwrap_or(&artifact.url)
        .to_string()
}

fn is_sdist(url: &str) -> bool {
    url.ends_with(".tar.gz") || url.ends_with(".zip")
}

/// Map artifact URLs to the language versions their wheel tags cover.
fn wheel_versions_from_urls(
    urls: &[ArtifactRef],
    release: &str,
    universe: &[VersionTag],
) -> FxHashSet<VersionTag> {
    let mut covered = FxHashSet::default();
    for artifact in urls {
        if !artifact.url.contains(release) {
            continue;
        }
        if is_sdist(&artifact.url) || artifact.url.ends_with(".tar.bz2") {
            continue;
        }
        for tag in universe {
            let squashed = tag.as_str().replace('.', "");
            if artifact.url.contains(&format!("cp{squashed}"))
                || artifact.url.contains(&format!("py{squashed}"))
            {
                covered.insert(tag.clone());
            }
        }
        if covered.is_empty() {
            let legacy = |tag: &VersionTag| {
                version::compare(tag.as_str(), "3") == Some(std::cmp::Ordering::Less)
            };
            if artifact.url.contains("cp2") || artifact.url.contains("py2") {
                covered.extend(universe.iter().filter(|tag| legacy(tag)).cloned());
            }
            if artifact.url.contains("cp3") || artifact.url.contains("py3") {
                covered.extend(universe.iter().filter(|tag| !legacy(tag)).cloned());
            }
        }
    }
    covered
}

/// Normalize a requirements file: one lowercase dependency expression per
/// line, stopping at the first extras section header.
fn preprocess_requirements(content: &str) -> Vec<String> {
    let mut requires = Vec::new();
    for line in content.lines() {
        let mut line = line.trim().to_lowercase();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            // Everything below an extras header is optional.
            break;
        }
        if let Some(bracket) = line.find('[') {
            line.truncate(bracket);
        }
        if let Some(stripped) = line.strip_suffix('\\') {
            line = stripped.to_string();
        }
        if let Some(comment) = line.find('#') {
            line.truncate(comment);
        }
        let line = line.trim();
        if !line.is_empty() {
            requires.push(line.to_string());
        }
    }
    requires
}

/// The requirements file inside a zip/wheel artifact, if any.
fn requires_from_zip(bytes: &[u8]) -> Result<Option<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open zip archive")?;
    let target = archive
        .file_names()
        .find(|name| is_requires_path(name))
        .map(str::to_string);
    let Some(target) = target else {
        return Ok(None);
    };
    let mut file = archive.by_name(&target).context("read zip entry")?;
    let mut content = String::new();
    file.read_to_string(&mut content).context("decode requirements file")?;
    Ok(Some(content))
}

/// The requirements file inside a gzipped tar artifact, if any.
fn requires_from_tar_gz(bytes: &[u8]) -> Result<Option<String>> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let path = entry.path().context("read tar entry path")?;
        let Some(path) = path.to_str().map(str::to_string) else {
            continue;
        };
        if !is_requires_path(&path) {
            continue;
        }
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .context("decode requirements file")?;
        return Ok(Some(content));
    }
    Ok(None)
}

fn is_requires_path(path: &str) -> bool {
    REQUIRES_FILES
        .iter()
        .any(|name| path.ends_with(&format!("/{name}")))
}

fn extract_zip(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open zip archive")?;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index).context("read zip entry")?;
        let Some(relative) = file.enclosed_name() else {
            // Entries escaping the destination are dropped, not fatal.
            tracing::warn!(entry = file.name(), "skipping unsafe zip entry");
            continue;
        };
        let out_path = dest.join(relative);
        if file.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("create dir: {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).context("read zip entry bytes")?;
        fs::write(&out_path, &buf)
            .with_context(|| format!("write file: {}", out_path.display()))?;
    }
    Ok(())
}

fn extract_tar_gz(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive
        .unpack(dest)
        .with_context(|| format!("extract archive into {}", dest.display()))
}
