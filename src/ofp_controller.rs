use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::ControllerConfig;
use crate::connection::{ConnectionId, ConnectionInput, TransportCommand};
use crate::event::ControllerEvent;
use crate::ofp_device::ConnectionWorker;
use crate::session::Session;
use crate::switch::SwitchRegistry;

/// Consumer of controller events, e.g. a topology or routing module.
pub trait ControllerApp {
    fn event(&mut self, event: Arc<ControllerEvent>);

    fn start(&mut self) {
        // Default implementation is empty
    }
}

struct ControllerApps {
    apps: Vec<Box<dyn ControllerApp + Send + Sync>>,
}

impl ControllerApps {
    fn new() -> ControllerApps {
        ControllerApps { apps: Vec::new() }
    }

    fn start(&mut self) {
        for app in &mut self.apps {
            app.start();
        }
    }

    fn post(&mut self, event: ControllerEvent) {
        let event = Arc::new(event);
        for app in &mut self.apps {
            app.event(event.clone());
        }
    }

    fn register_app(&mut self, app: Box<dyn ControllerApp + Send + Sync>) {
        self.apps.push(app);
    }
}

/// The transport's end of one connection: feed it bytes, take its commands.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub input: UnboundedSender<ConnectionInput>,
    pub commands: UnboundedReceiver<TransportCommand>,
}

/// Owns the switch registry and fans the events of every connection out to the apps.
pub struct Controller {
    config: Arc<ControllerConfig>,
    registry: SwitchRegistry,
    next_connection: AtomicU64,
    event_tx: UnboundedSender<ControllerEvent>,
    event_rx: Mutex<Option<UnboundedReceiver<ControllerEvent>>>,
    apps: Arc<Mutex<ControllerApps>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Controller {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Controller {
            config: Arc::new(config),
            registry: SwitchRegistry::new(),
            next_connection: AtomicU64::new(1),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            apps: Arc::new(Mutex::new(ControllerApps::new())),
        }
    }

    pub fn config(&self) -> &Arc<ControllerConfig> {
        &self.config
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    pub fn register_app(&self, app: Box<dyn ControllerApp + Send + Sync>) {
        lock(&self.apps).register_app(app);
    }

    /// Start the apps and the event dispatcher. Must run inside a tokio runtime.
    ///
    /// Returns `None` if the controller was already started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let mut rx = lock(&self.event_rx).take()?;
        lock(&self.apps).start();
        let apps = self.apps.clone();
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!("dispatching {:?}", event);
                lock(&apps).post(event);
            }
            info!("event dispatcher stopped");
        }))
    }

    /// Create the core side of a new transport session and spawn its worker.
    pub fn open_connection(&self) -> ConnectionHandle {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let session = Session::new(
            id,
            self.config.clone(),
            self.registry.clone(),
            tokio::time::Instant::now().into_std(),
        );
        info!("{}: connection opened", id);
        let worker = ConnectionWorker::new(session, input_rx, command_tx, self.event_tx.clone());
        tokio::spawn(worker.run());
        ConnectionHandle {
            id,
            input: input_tx,
            commands: command_rx,
        }
    }
}
