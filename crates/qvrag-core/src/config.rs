//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RAG__CHUNK_SIZE`). Provides typed
//! `RagSettings` and helpers to expand `~` and `${VAR}` in paths.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self::from_figment(figment);
        config.settings()?.validate()?;
        tracing::debug!(env = %env_name, "configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The `[rag]` table, with defaults for anything not set.
    pub fn settings(&self) -> Result<RagSettings> {
        match self.figment.extract_inner::<RagSettings>("rag") {
            Ok(s) => Ok(s),
            Err(e) if e.missing() => Ok(RagSettings::default()),
            Err(e) => Err(Error::InvalidConfig(format!("Failed to read 'rag': {}", e))),
        }
    }
}

/// Distance function used by the vector store when ranking matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    L2,
    Cosine,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub collection_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub persist_directory: Option<String>,
    pub top_k: usize,
    pub max_json_chunk_size: usize,
    pub distance: Distance,
    pub embed_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            collection_name: "documents".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            persist_directory: None,
            top_k: 5,
            max_json_chunk_size: 300,
            distance: Distance::L2,
            embed_batch_size: 64,
        }
    }
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        if self.collection_name.trim().is_empty() {
            return Err(Error::InvalidConfig("collection_name must not be empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(Error::InvalidConfig("embed_batch_size must be greater than zero".into()));
        }
        Ok(())
    }

    /// Expanded persistence directory, if one is configured.
    pub fn persist_path(&self) -> Option<PathBuf> {
        self.persist_directory.as_deref().map(expand_path)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_when_no_files() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "test");
            let config = Config::load().map_err(|e| e.to_string())?;
            let s = config.settings().map_err(|e| e.to_string())?;
            assert_eq!(s, RagSettings::default());
            Ok(())
        });
    }

    #[test]
    fn env_file_and_vars_layer_in_order() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "test");
            jail.create_file(
                "config.toml",
                r#"
                [rag]
                collection_name = "base"
                chunk_size = 800
                "#,
            )?;
            jail.create_file(
                "config.test.toml",
                r#"
                [rag]
                collection_name = "testing"
                distance = "cosine"
                "#,
            )?;
            jail.set_env("APP_RAG__CHUNK_SIZE", "512");
            let s = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
            assert_eq!(s.collection_name, "testing");
            assert_eq!(s.chunk_size, 512);
            assert_eq!(s.chunk_overlap, 200);
            assert_eq!(s.distance, Distance::Cosine);
            Ok(())
        });
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("RUST_ENV", "test");
            jail.create_file("config.toml", "[rag]\nchunk_size = 100\nchunk_overlap = 100\n")?;
            assert!(matches!(Config::load(), Err(Error::InvalidConfig(_))));
            Ok(())
        });
    }

    #[test]
    fn persist_path_expands_env_vars() {
        Jail::expect_with(|jail| {
            jail.set_env("QVRAG_TEST_ROOT", "/srv/data");
            let s = RagSettings { persist_directory: Some("${QVRAG_TEST_ROOT}/db".into()), ..RagSettings::default() };
            assert_eq!(s.persist_path(), Some(PathBuf::from("/srv/data/db")));
            Ok(())
        });
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/opt/qvrag");
        assert_eq!(resolve_with_base(base, "db"), PathBuf::from("/opt/qvrag/db"));
        assert_eq!(resolve_with_base(base, "/abs/db"), PathBuf::from("/abs/db"));
    }
}
