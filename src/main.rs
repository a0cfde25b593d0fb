#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::{TcpListener, TcpStream};

use of_core::apps::EventLogger;
use of_core::config::ControllerConfig;
use of_core::ofp_controller::Controller;
use of_core::ofp_device;

#[derive(Parser, Debug)]
#[command(version, about = "OpenFlow 1.0/1.3 controller core")]
struct Args {
    /// YAML controller configuration. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// log4rs configuration file.
    #[arg(long, default_value = "log4rs.yml")]
    log_config: PathBuf,

    /// Overrides `listen_address` of the configuration.
    #[arg(short, long)]
    listen: Option<String>,
}

fn process(socket: TcpStream, controller: Arc<Controller>) {
    let handle = controller.open_connection();
    info!("{}: switch connected from {:?}", handle.id, socket.peer_addr().ok());
    tokio::spawn(async move {
        let id = handle.id;
        if let Err(e) = ofp_device::serve(socket, handle).await {
            warn!("{}: transport error: {}", id, e);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    log_panics::init();
    log4rs::init_file(&args.log_config, Default::default())
        .with_context(|| format!("loading log config {}", args.log_config.display()))?;
    info!("of_core starting");

    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }
    config.validate()?;

    let listen_address = config.listen_address.clone();
    let controller = Arc::new(Controller::new(config));
    controller.register_app(Box::new(EventLogger::new()));
    controller.start();

    let listener = TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("binding {}", listen_address))?;
    info!("OF controller listening on {}", listen_address);

    loop {
        match listener.accept().await {
            Ok((socket, _)) => process(socket, controller.clone()),
            Err(e) => error!("accept error = {:?}", e),
        }
    }
}
