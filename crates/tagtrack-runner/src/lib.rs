//! Ground station runner for the remote tag detector.
//!
//! Wires a [`ControlOrchestrator`](tagtrack_control::ControlOrchestrator) to a
//! UDP tunnel transport and a console display, configured from YAML and the
//! command line.

pub mod config;
pub mod display;
pub mod error;
pub mod transport;

use std::sync::Arc;

use tagtrack_catalog::{load_catalog_file, TagCatalog};
use tagtrack_control::{spawn_session, ControlOrchestrator, SessionHandle, TunnelTransport};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub use config::{ConfigOverrides, RunnerConfig, TransportConfig};
pub use display::{ConsoleDisplay, DisplayEvent, StatusBoard};
pub use error::{RunnerError, RunnerResult};
pub use transport::UdpTunnelTransport;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. `log` records from the
/// codec crate are forwarded to the same subscriber.
pub fn init_logging(default_level: &str) -> RunnerResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| RunnerError::Logging(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| RunnerError::Logging(e.to_string()))
}

/// Load the configured tag file, if any.
pub fn load_catalog(config: &RunnerConfig) -> RunnerResult<Option<TagCatalog>> {
    let Some(path) = &config.tag_file else {
        return Ok(None);
    };
    let catalog = load_catalog_file(path, &config.session.catalog_settings()).map_err(|source| {
        RunnerError::Catalog {
            path: path.clone(),
            source,
        }
    })?;
    info!("Runner: loaded {} tags from {}", catalog.len(), path.display());
    Ok(Some(catalog))
}

/// A running session with its display.
pub struct Runner {
    handle: SessionHandle,
    board: StatusBoard,
    transport: Arc<UdpTunnelTransport>,
}

impl Runner {
    /// Bind the transport and start the session.
    pub fn start(config: &RunnerConfig) -> RunnerResult<Self> {
        config.validate()?;
        let catalog = load_catalog(config)?;

        let transport = Arc::new(UdpTunnelTransport::bind(
            config.transport.bind_addr()?,
            config.transport.remote_addr()?,
        )?);
        let shared: Arc<dyn TunnelTransport> = transport.clone();

        let board = StatusBoard::new();
        let mut orchestrator = ControlOrchestrator::new(
            config.session.clone(),
            Arc::clone(&shared),
            Box::new(board.observer(config.json_events)),
        );
        if let Some(catalog) = catalog {
            orchestrator.load_catalog(catalog, std::time::Instant::now())?;
        }

        let handle = spawn_session(orchestrator, shared, config.receive_loop())?;
        Ok(Runner {
            handle,
            board,
            transport,
        })
    }

    /// The session handle.
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// The display board.
    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// The bound transport.
    pub fn transport(&self) -> &UdpTunnelTransport {
        &self.transport
    }

    /// Whether the session ended on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the session.
    pub fn stop(self) -> RunnerResult<()> {
        self.handle.stop()?;
        Ok(())
    }
}
