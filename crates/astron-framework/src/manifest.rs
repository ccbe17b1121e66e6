//! On-disk handler manifests.
//!
//! Each manifest describes one command or listener. The category is not part
//! of the file; it comes from the directory the file sits in.
//!
//! ```toml
//! id = "ping"
//! aliases = ["p"]
//! scope = "guild"
//! cooldown = 5.0
//! description = "Checks that the bot is alive"
//! executor_permissions = ["EMBED_LINKS"]
//! ```
//!
//! ```yaml
//! kind: listener
//! id: ready-log
//! event: ready
//! once: true
//! ```

use std::path::Path;

use astron_core::{HandlerDefinition, Scope};
use figment::Figment;
use figment::providers::{Format, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::catalog::ExecutorCatalog;
use crate::error::{LoadError, LoadResult};

/// What a manifest declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    /// A prefixed-message command.
    #[default]
    Command,
    /// A transport event listener.
    Listener,
}

/// Deserialized manifest contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerManifest {
    /// Command or listener.
    pub kind: ManifestKind,
    /// Unique handler id.
    pub id: String,
    /// Executor key in the catalog; defaults to the id.
    pub executor: Option<String>,
    /// Extra lookup keys (commands).
    pub aliases: Vec<String>,
    /// Channel restriction (commands).
    pub scope: Scope,
    /// Restrict to owners.
    pub owner_only: bool,
    /// Cooldown in seconds.
    pub cooldown: Option<f64>,
    /// Help description.
    pub description: String,
    /// Help usage line.
    pub usage: String,
    /// Example invocations.
    pub examples: Vec<String>,
    /// Permissions the invoker must hold.
    pub caller_permissions: Vec<String>,
    /// Permissions the bot must hold.
    pub executor_permissions: Vec<String>,
    /// Invokers that skip the cooldown.
    pub exempt_from_cooldown: Vec<String>,
    /// Invokers that skip permission checks.
    pub exempt_from_permissions: Vec<String>,
    /// Event name (listeners).
    pub event: Option<String>,
    /// Emitter name (listeners).
    pub emitter: Option<String>,
    /// Fire only once (listeners).
    pub once: bool,
}

impl HandlerManifest {
    /// Reads and parses a manifest. YAML is used for `.yaml`/`.yml` files,
    /// TOML for everything else.
    pub fn read(path: &Path) -> LoadResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let figment = if is_yaml(path) {
            Figment::from(Yaml::string(&content))
        } else {
            Figment::from(Toml::string(&content))
        };

        figment.extract().map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Key used to look the executor up in the catalog.
    pub fn executor_key(&self) -> &str {
        self.executor.as_deref().unwrap_or(&self.id)
    }

    /// Validates the manifest and binds its executor.
    ///
    /// An explicit `executor` that the catalog does not know is an error. A
    /// handler relying on its id gets the not-implemented executor instead.
    pub fn into_definition(
        self,
        category: &str,
        source: &Path,
        catalog: &ExecutorCatalog,
    ) -> LoadResult<HandlerDefinition> {
        let key = self.executor_key().to_string();
        let explicit = self.executor.is_some();
        let unknown = || LoadError::UnknownExecutor {
            path: source.to_path_buf(),
            executor: key.clone(),
        };

        macro_rules! finish {
            ($builder:expr) => {{
                let mut builder = $builder
                    .category(category)
                    .owner_only(self.owner_only)
                    .caller_permissions(self.caller_permissions)
                    .executor_permissions(self.executor_permissions)
                    .exempt_from_cooldown(self.exempt_from_cooldown)
                    .exempt_from_permissions(self.exempt_from_permissions)
                    .source(source);
                if let Some(seconds) = self.cooldown {
                    builder = builder.cooldown_secs(seconds);
                }
                builder.build()
            }};
        }

        let built = match self.kind {
            ManifestKind::Command => {
                let mut builder = HandlerDefinition::command(self.id)
                    .aliases(self.aliases)
                    .scope(self.scope)
                    .description(self.description)
                    .usage(self.usage)
                    .examples(self.examples);
                match catalog.command_executor(&key) {
                    Some(executor) => builder = builder.executor(executor.clone()),
                    None if explicit => return Err(unknown()),
                    None => {}
                }
                finish!(builder)
            }
            ManifestKind::Listener => {
                let mut builder =
                    HandlerDefinition::listener(self.id, self.event.unwrap_or_default())
                        .once(self.once);
                if let Some(emitter) = self.emitter {
                    builder = builder.emitter(emitter);
                }
                match catalog.listener_executor(&key) {
                    Some(executor) => builder = builder.executor(executor.clone()),
                    None if explicit => return Err(unknown()),
                    None => {}
                }
                finish!(builder)
            }
        };

        built.map_err(|source_err| LoadError::Validation {
            path: source.to_path_buf(),
            source: source_err,
        })
    }
}

/// Returns `true` for `.yaml` and `.yml` files.
pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use astron_core::command_fn;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_toml_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "ping.toml",
            r#"
id = "ping"
aliases = ["p"]
scope = "guild"
cooldown = 5.0
executor_permissions = ["embed_links"]
"#,
        );

        let manifest = HandlerManifest::read(&path).unwrap();
        assert_eq!(manifest.kind, ManifestKind::Command);
        assert_eq!(manifest.scope, Scope::GuildOnly);

        let def = manifest
            .into_definition("general", &path, &ExecutorCatalog::new())
            .unwrap();
        assert_eq!(def.id(), "ping");
        assert_eq!(def.category(), "General");
        assert_eq!(def.cooldown(), Duration::from_secs(5));
        assert_eq!(def.executor_permissions()[0].as_str(), "EMBED_LINKS");
        assert_eq!(def.source(), Some(path.as_path()));
    }

    #[test]
    fn test_read_yaml_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "ready.yml",
            "kind: listener\nid: ready-log\nevent: ready\nonce: true\n",
        );

        let def = HandlerManifest::read(&path)
            .unwrap()
            .into_definition("events", &path, &ExecutorCatalog::new())
            .unwrap();
        let spec = def.as_listener().unwrap();
        assert_eq!(spec.event(), "ready");
        assert!(spec.once());
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "broken.toml", "id = [");

        let err = HandlerManifest::read(&path).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_unknown_scope_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "x.toml", "id = \"x\"\nscope = \"everywhere\"");

        assert!(matches!(
            HandlerManifest::read(&path),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_explicit_unknown_executor() {
        let manifest = HandlerManifest {
            id: "ping".into(),
            executor: Some("missing".into()),
            ..Default::default()
        };

        let err = manifest
            .into_definition("general", Path::new("ping.toml"), &ExecutorCatalog::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownExecutor { ref executor, .. } if executor == "missing"));
    }

    #[test]
    fn test_executor_bound_by_id() {
        let catalog = ExecutorCatalog::new().command("ping", command_fn(|_, _| async { Ok(()) }));
        let manifest = HandlerManifest {
            id: "Ping".into(),
            ..Default::default()
        };

        assert_eq!(manifest.executor_key(), "Ping");
        assert!(
            manifest
                .into_definition("general", Path::new("ping.toml"), &catalog)
                .is_ok()
        );
    }

    #[test]
    fn test_validation_error_wrapped() {
        let manifest = HandlerManifest {
            id: "ping".into(),
            cooldown: Some(-2.0),
            ..Default::default()
        };

        let err = manifest
            .into_definition("general", Path::new("ping.toml"), &ExecutorCatalog::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::Validation { .. }));
    }
}
