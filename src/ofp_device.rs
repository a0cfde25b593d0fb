use std::future;
use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::connection::{ConnectionInput, TransportCommand};
use crate::event::ControllerEvent;
use crate::ofp_controller::ConnectionHandle;
use crate::session::Session;

const READ_BUFFER_SIZE: usize = 4096;

fn interval_after(period: std::time::Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

/// Runs one session: transport input, keepalive ticks and flow statistics polling are
/// serialized through a single task so the session never needs a lock.
pub struct ConnectionWorker {
    session: Session,
    input: UnboundedReceiver<ConnectionInput>,
    commands: UnboundedSender<TransportCommand>,
    events: UnboundedSender<ControllerEvent>,
}

impl ConnectionWorker {
    pub fn new(
        session: Session,
        input: UnboundedReceiver<ConnectionInput>,
        commands: UnboundedSender<TransportCommand>,
        events: UnboundedSender<ControllerEvent>,
    ) -> ConnectionWorker {
        ConnectionWorker {
            session,
            input,
            commands,
            events,
        }
    }

    pub async fn run(mut self) {
        let mut keepalive = interval_after(self.session.config.keepalive_interval());
        let mut stats = self.session.config.stats_interval().map(interval_after);

        while !self.session.is_closed() {
            tokio::select! {
                input = self.input.recv() => match input {
                    Some(ConnectionInput::Data(bytes)) => {
                        self.session.receive(&bytes, Instant::now().into_std())
                    }
                    Some(ConnectionInput::Closed) | None => self.session.transport_closed(),
                },
                _ = keepalive.tick() => self.session.tick(Instant::now().into_std()),
                _ = next_tick(&mut stats) => {
                    if self.session.request_flow_stats() {
                        debug!("{}: polling flow statistics", self.session.id());
                    }
                }
            }
            self.flush();
        }
        debug!("{}: worker finished", self.session.id());
    }

    fn flush(&mut self) {
        for command in self.session.drain_commands() {
            if self.commands.send(command).is_err() {
                debug!("{}: transport gone, dropping command", self.session.id());
            }
        }
        for event in self.session.drain_events() {
            if self.events.send(event).is_err() {
                warn!("{}: event dispatcher gone, dropping event", self.session.id());
            }
        }
    }
}

/// TCP adaptor: pump bytes between `stream` and the connection behind `handle` until
/// either side closes.
pub async fn serve(stream: TcpStream, handle: ConnectionHandle) -> io::Result<()> {
    let ConnectionHandle {
        id,
        input,
        mut commands,
    } = handle;
    let (mut reader, mut writer) = stream.into_split();

    let write_loop = async {
        while let Some(command) = commands.recv().await {
            match command {
                TransportCommand::Write(bytes) => writer.write_all(&bytes).await?,
                TransportCommand::Close => {
                    info!("{}: closing transport", id);
                    writer.shutdown().await?;
                    break;
                }
            }
        }
        Ok::<(), io::Error>(())
    };

    let read_loop = async {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    info!("{}: peer closed the connection", id);
                    break;
                }
                Ok(n) => {
                    if input.send(ConnectionInput::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{}: read failed: {}", id, e);
                    break;
                }
            }
        }
        if input.send(ConnectionInput::Closed).is_err() {
            debug!("{}: worker already gone", id);
        }
        Ok::<(), io::Error>(())
    };

    tokio::select! {
        res = write_loop => res,
        res = read_loop => res,
    }
}
