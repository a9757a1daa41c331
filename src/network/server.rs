//! TCP Server
//!
//! Accepts connections and hands each one to its own worker thread.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;

use super::Connection;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::store::Store;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// TCP server for respkv
pub struct Server {
    config: Config,
    listener: TcpListener,
    dispatcher: Dispatcher,
    connections: Arc<ConnectionRegistry>,
    shutdown: Arc<AtomicBool>,
}

/// Stops a running [`Server`] from another thread
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting and close live connections
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether shutdown has already been requested
    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Server {
    /// Validate the config and bind the listening socket
    pub fn bind(config: Config, store: Arc<Store>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking accept so the loop can notice shutdown
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", listener.local_addr()?);

        let dispatcher = Dispatcher::new(store, config.reply_mode);

        Ok(Self {
            config,
            listener,
            dispatcher,
            connections: Arc::new(ConnectionRegistry::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Start the server (blocking)
    ///
    /// Returns after shutdown once every connection worker has finished, or
    /// with an error if accepting fails.
    pub fn run(&self) -> Result<()> {
        let workers = WaitGroup::new();

        while !self.shutdown.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, addr)) => self.spawn_worker(stream, addr, workers.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::Interrupted | std::io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    self.connections.close_all();
                    return Err(e.into());
                }
            }
        }

        tracing::info!(
            "Shutting down, closing {} connection(s)",
            self.connections.len()
        );
        self.connections.close_all();
        workers.wait();

        Ok(())
    }

    /// Serve one accepted connection on its own thread
    fn spawn_worker(&self, stream: TcpStream, addr: SocketAddr, worker: WaitGroup) {
        if self.connections.len() >= self.config.max_connections {
            tracing::warn!(
                "Connection limit ({}) reached, rejecting {}",
                self.config.max_connections,
                addr
            );
            return;
        }

        // Accepted sockets may inherit the listener's non-blocking mode
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Failed to configure connection from {}: {}", addr, e);
            return;
        }

        let id = match self.connections.register(&stream) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Failed to register connection from {}: {}", addr, e);
                return;
            }
        };

        let dispatcher = self.dispatcher.clone();
        let config = self.config.clone();
        let registration = Registration {
            registry: Arc::clone(&self.connections),
            id,
        };

        let spawned = thread::Builder::new()
            .name(format!("respkv-conn-{}", id))
            .spawn(move || {
                let _worker = worker;
                let _registration = registration;

                let result = Connection::new(stream, dispatcher, &config)
                    .and_then(|mut connection| connection.handle());
                if let Err(e) = result {
                    tracing::debug!("Connection from {} closed with error: {}", addr, e);
                }
            });

        if let Err(e) = spawned {
            tracing::error!("Failed to spawn worker for {}: {}", addr, e);
        }
    }
}

/// Live connections, kept so shutdown can unblock their reads
#[derive(Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, TcpStream>>,
}

impl ConnectionRegistry {
    fn register(&self, stream: &TcpStream) -> std::io::Result<u64> {
        let handle = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.streams.lock().insert(id, handle);
        Ok(id)
    }

    fn remove(&self, id: u64) {
        self.streams.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.streams.lock().len()
    }

    fn close_all(&self) {
        for stream in self.streams.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Removes a connection from the registry when its worker ends
struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
