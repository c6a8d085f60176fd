//! Server configuration — an ambient concern carried from the reference
//! crate regardless of scope. Grounded on
//! `cortex-server/src/config.rs`'s clap-derived struct with `env`-backed
//! defaults, trimmed to what a bare exercising shell around the four
//! CORE subsystems actually needs: one listen address and a data
//! directory, plus a TOML file as an alternative to flags/env.

use clap::Parser;
use memoria_core::ingest::IngestConfig;
use memoria_core::ssa::rerank::RerankConfig;
use memoria_core::ssa::spread::SpreadConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(name = "memoria-server")]
#[command(about = "Memoria personal memory server")]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "MEMORIA_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: SocketAddr,

    /// Data directory (holds the redb database file)
    #[arg(long, env = "MEMORIA_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Path to an optional `memoria.toml`; fields there fill in anything
    /// not given on the command line or via environment variable.
    #[arg(long, env = "MEMORIA_CONFIG", default_value = "memoria.toml")]
    pub config_file: PathBuf,

    /// Stage 5 dedup threshold, SSA hop decay/budget, and reranking
    /// weight profiles/recency half-lives — nested enough that they're
    /// only settable via `config_file`, never CLI flags/env.
    #[arg(skip)]
    pub ingest: IngestConfig,
    #[arg(skip)]
    pub spread: SpreadConfig,
    #[arg(skip)]
    pub rerank: RerankConfig,
}

/// The subset of [`Config`] that can come from a TOML file — the CORE
/// itself has no notion of configuration loading, but the shell around
/// it still needs somewhere to read deployment knobs from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    http_addr: Option<SocketAddr>,
    data_dir: Option<PathBuf>,
    ingest: IngestConfig,
    spread: SpreadConfig,
    rerank: RerankConfig,
}

impl Config {
    /// Parse CLI/env args, then backfill any field left at its clap
    /// default from `config_file` if that file exists. CLI/env always
    /// wins over the file.
    pub fn load() -> Self {
        let mut config = Self::parse();
        if let Ok(contents) = std::fs::read_to_string(&config.config_file) {
            if let Ok(file) = toml::from_str::<FileConfig>(&contents) {
                if let Some(addr) = file.http_addr {
                    if config.http_addr == default_http_addr() {
                        config.http_addr = addr;
                    }
                }
                if let Some(dir) = file.data_dir {
                    if config.data_dir == default_data_dir() {
                        config.data_dir = dir;
                    }
                }
                config.ingest = file.ingest;
                config.spread = file.spread;
                config.rerank = file.rerank;
            }
        }
        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("memoria.redb")
    }

    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }
}

fn default_http_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            data_dir: default_data_dir(),
            config_file: Path::new("memoria.toml").to_path_buf(),
            ingest: IngestConfig::default(),
            spread: SpreadConfig::default(),
            rerank: RerankConfig::default(),
        }
    }
}
