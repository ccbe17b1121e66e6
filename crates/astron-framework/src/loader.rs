//! Directory-driven handler discovery.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   general/          <- category "General"
//!     ping.toml
//!     help.toml
//!   moderation/       <- category "Moderation"
//!     kick.toml
//! ```
//!
//! Only immediate subdirectories of the root are categories, and only files
//! with the configured extension are manifests. A broken manifest is logged,
//! recorded in the [`LoadReport`] and skipped; its siblings still load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use astron_core::util::capitalize;
use astron_core::{HandlerDefinition, Registry};
use tracing::{debug, info, warn};

use crate::catalog::ExecutorCatalog;
use crate::error::{LoadError, LoadResult};
use crate::manifest::HandlerManifest;

/// One manifest that failed to load.
#[derive(Debug)]
pub struct LoadFailure {
    /// Category the file belongs to.
    pub category: String,
    /// What went wrong.
    pub error: LoadError,
}

/// Summary of a load pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded handler count per category.
    pub categories: BTreeMap<String, usize>,
    /// Manifests that were skipped.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Total number of handlers loaded.
    pub fn loaded(&self) -> usize {
        self.categories.values().sum()
    }

    /// Returns `true` if no manifest failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reads manifests from a directory tree into a [`Registry`].
#[derive(Debug, Clone)]
pub struct Loader {
    root: PathBuf,
    extension: String,
    catalog: Arc<ExecutorCatalog>,
}

impl Loader {
    /// Creates a loader for `root`, reading files ending in `extension`.
    pub fn new(
        root: impl Into<PathBuf>,
        extension: impl AsRef<str>,
        catalog: Arc<ExecutorCatalog>,
    ) -> Self {
        Self {
            root: root.into(),
            extension: extension
                .as_ref()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
            catalog,
        }
    }

    /// The directory categories are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The manifest extension, without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The executor catalog manifests are bound against.
    pub fn catalog(&self) -> &ExecutorCatalog {
        &self.catalog
    }

    /// Builds a fresh registry from the whole tree.
    pub fn load_all(&self) -> (Registry, LoadReport) {
        let mut registry = Registry::new();
        let report = self.load_into(&mut registry);
        (registry, report)
    }

    /// Loads every category under the root into `registry`.
    pub fn load_into(&self, registry: &mut Registry) -> LoadReport {
        let mut report = LoadReport::default();

        let categories = match sorted_entries(&self.root) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(root = %self.root.display(), error = %error, "Handler directory is not readable, nothing loaded");
                return report;
            }
        };

        for dir in categories.into_iter().filter(|path| path.is_dir()) {
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %dir.display(), "Skipping category with a non UTF-8 name");
                continue;
            };
            let category = capitalize(name);
            let loaded = self.load_category(&dir, &category, registry, &mut report);

            if loaded == 0 {
                warn!(category = %category, "Category has no valid handlers");
            } else {
                info!(category = %category, count = loaded, "Loaded category");
            }
            report.categories.insert(category, loaded);
        }

        info!(
            loaded = report.loaded(),
            failed = report.failures.len(),
            "Handler loading finished"
        );
        report
    }

    fn load_category(
        &self,
        dir: &Path,
        category: &str,
        registry: &mut Registry,
        report: &mut LoadReport,
    ) -> usize {
        let files = match sorted_entries(dir) {
            Ok(files) => files,
            Err(source) => {
                let error = LoadError::Io {
                    path: dir.to_path_buf(),
                    source,
                };
                warn!(category = %category, error = %error, "Failed to read category");
                report.failures.push(LoadFailure {
                    category: category.to_string(),
                    error,
                });
                return 0;
            }
        };

        let mut loaded = 0;
        for path in files
            .into_iter()
            .filter(|path| path.is_file() && self.matches_extension(path))
        {
            let result = self.load_file(&path, category).and_then(|definition| {
                registry
                    .register(definition)
                    .map_err(|source| LoadError::Duplicate {
                        path: path.clone(),
                        source,
                    })
            });

            match result {
                Ok(()) => loaded += 1,
                Err(error) => {
                    warn!(category = %category, error = %error, "Skipping handler");
                    report.failures.push(LoadFailure {
                        category: category.to_string(),
                        error,
                    });
                }
            }
        }
        loaded
    }

    /// Reads one manifest and builds its definition.
    pub fn load_file(&self, path: &Path, category: &str) -> LoadResult<HandlerDefinition> {
        debug!(path = %path.display(), "Reading handler manifest");
        HandlerManifest::read(path)?.into_definition(category, path, &self.catalog)
    }

    /// Re-reads the manifest a definition was loaded from.
    ///
    /// The category is taken from the manifest's parent directory, so moving
    /// a file between categories is picked up too. Returns `None` for
    /// definitions that were not loaded from a file.
    pub fn reread(&self, definition: &HandlerDefinition) -> Option<LoadResult<HandlerDefinition>> {
        let source = definition.source()?;
        let category = source
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .map(capitalize)
            .unwrap_or_else(|| definition.category().to_string());
        Some(self.load_file(source, &category))
    }

    fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        ext == self.extension
            || (matches!(self.extension.as_str(), "yaml" | "yml")
                && matches!(ext.as_str(), "yaml" | "yml"))
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fixture(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn loader(dir: &tempfile::TempDir) -> Loader {
        Loader::new(dir.path(), "toml", Arc::new(ExecutorCatalog::new()))
    }

    #[test]
    fn test_load_categories() {
        let dir = fixture(&[
            ("general/ping.toml", "id = \"ping\"\naliases = [\"p\"]"),
            ("general/help.toml", "id = \"help\""),
            ("moderation/kick.toml", "id = \"kick\"\nscope = \"guild\""),
            ("general/notes.txt", "not a manifest"),
        ]);

        let (registry, report) = loader(&dir).load_all();

        assert!(report.is_clean());
        assert_eq!(report.loaded(), 3);
        assert_eq!(report.categories.get("General"), Some(&2));
        assert_eq!(report.categories.get("Moderation"), Some(&1));
        assert_eq!(registry.resolve("p").unwrap().category(), "General");
    }

    #[test]
    fn test_broken_sibling_skipped() {
        let dir = fixture(&[
            ("general/ping.toml", "id = \"ping\""),
            ("general/broken.toml", "id = ["),
            ("general/bad.toml", "id = \"two words\""),
        ]);

        let (registry, report) = loader(&dir).load_all();

        assert_eq!(registry.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert!(registry.resolve("ping").is_some());
    }

    #[test]
    fn test_oversized_cooldown_skipped() {
        let dir = fixture(&[
            ("general/ok.toml", "id = \"ok\""),
            ("general/slow.toml", "id = \"slow\"\ncooldown = 1e30"),
        ]);

        let (registry, report) = loader(&dir).load_all();

        assert!(registry.resolve("ok").is_some());
        assert!(registry.resolve("slow").is_none());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            LoadError::Validation { .. }
        ));
    }

    #[test]
    fn test_demo_manifests_load_cleanly() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/ping_bot/commands");
        let loader = Loader::new(root, "toml", Arc::new(ExecutorCatalog::new()));

        let (registry, report) = loader.load_all();

        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(registry.resolve("reload").unwrap().owner_only());
        assert!(registry.resolve("say").is_some());
    }

    #[test]
    fn test_duplicate_across_files() {
        let dir = fixture(&[
            ("general/a.toml", "id = \"ping\""),
            ("fun/b.toml", "id = \"pong\"\naliases = [\"ping\"]"),
        ]);

        let (registry, report) = loader(&dir).load_all();

        assert_eq!(registry.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            LoadError::Duplicate { .. }
        ));
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new(
            dir.path().join("missing"),
            "toml",
            Arc::new(ExecutorCatalog::new()),
        );

        let (registry, report) = loader.load_all();
        assert!(registry.is_empty());
        assert!(report.is_clean());
    }

    #[test]
    fn test_empty_category_reported() {
        let dir = fixture(&[("general/ping.toml", "id = \"ping\"")]);
        fs::create_dir(dir.path().join("empty")).unwrap();

        let (_, report) = loader(&dir).load_all();
        assert_eq!(report.categories.get("Empty"), Some(&0));
    }

    #[test]
    fn test_yaml_extension() {
        let dir = fixture(&[
            ("general/ping.yml", "id: ping"),
            ("general/pong.yaml", "id: pong"),
            ("general/skip.toml", "id = \"skip\""),
        ]);
        let loader = Loader::new(dir.path(), ".YAML", Arc::new(ExecutorCatalog::new()));

        let (registry, _) = loader.load_all();
        assert_eq!(registry.len(), 2);
        assert!(registry.resolve("skip").is_none());
    }

    #[test]
    fn test_reread_picks_up_changes() {
        let dir = fixture(&[("general/ping.toml", "id = \"ping\"\ncooldown = 1.0")]);
        let loader = loader(&dir);
        let (registry, _) = loader.load_all();
        let old = registry.resolve("ping").unwrap().clone();

        fs::write(
            dir.path().join("general/ping.toml"),
            "id = \"ping\"\ncooldown = 9.0",
        )
        .unwrap();

        let new = loader.reread(&old).unwrap().unwrap();
        assert_eq!(new.cooldown().as_secs(), 9);
        assert_eq!(new.category(), "General");
    }
}
