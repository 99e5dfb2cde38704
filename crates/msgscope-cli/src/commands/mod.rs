pub mod count;
pub mod replay;
pub mod reverse;
pub mod sessions;
pub mod tail;

use crate::dump::DumpLoader;
use anyhow::{Context, Result};
use clap::Args;
use futures::{Stream, StreamExt};
use msgscope_application::{MessageStreamService, MsgResult, SessionMessages, SessionService};
use msgscope_core::config::ScopeConfig;
use msgscope_core::session::Session;
use msgscope_infrastructure::{JsonCodec, MemoryStore, StaticArchitecture, load_config_or_default};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the log comes from and how to read it.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// JSON-lines log dump
    #[arg(long)]
    pub log: PathBuf,
    /// TOML file describing components and their ports
    #[arg(long)]
    pub architecture: PathBuf,
    /// Config file (defaults to the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Session to inspect
    #[arg(short, long)]
    pub session: String,
}

impl SessionArgs {
    pub fn session(&self) -> Session {
        Session::new(self.session.as_str())
    }
}

/// The services wired over a loaded dump.
pub struct Inspector {
    pub config: ScopeConfig,
    pub messages: Arc<MessageStreamService<Value>>,
    pub sessions: Arc<SessionService>,
    pub facade: SessionMessages<Value>,
    pub loader: DumpLoader,
}

impl Inspector {
    pub async fn open(source: &SourceArgs) -> Result<Self> {
        let config = load_config_or_default(source.config.as_deref())
            .context("Failed to load config")?;
        let architecture = StaticArchitecture::load(&source.architecture).with_context(|| {
            format!("Failed to load architecture {}", source.architecture.display())
        })?;

        let store = Arc::new(MemoryStore::new());
        let mut loader = DumpLoader::new(&source.log, store.clone());
        let loaded = loader.load_new().await?;
        tracing::info!(
            records = loaded,
            ports = architecture.port_count(),
            "Loaded {}",
            source.log.display()
        );

        let messages: Arc<MessageStreamService<Value>> = Arc::new(MessageStreamService::new(
            store.clone(),
            Arc::new(architecture),
            Arc::new(JsonCodec::new()),
            &config,
        ));
        let sessions = Arc::new(SessionService::new(store, config.keys.clone()));
        let facade = SessionMessages::new(messages.clone(), sessions.clone(), config.timestamps);

        Ok(Self {
            config,
            messages,
            sessions,
            facade,
            loader,
        })
    }
}

/// Writes each message as one JSON line. Returns how many were written.
pub async fn print_messages<S>(mut stream: S) -> Result<usize>
where
    S: Stream<Item = MsgResult<Value>> + Unpin,
{
    let stdout = std::io::stdout();
    let mut printed = 0;
    while let Some(item) = stream.next().await {
        let msg = item.context("Log store failed while streaming")?;
        let mut out = stdout.lock();
        serde_json::to_writer(&mut out, &*msg)?;
        writeln!(out)?;
        out.flush()?;
        printed += 1;
    }
    Ok(printed)
}
