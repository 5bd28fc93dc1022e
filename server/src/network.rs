//! Server network layer: control responder, broadcast fan-out and the
//! session loop.
//!
//! Three tasks surround one state owner. The control responder reads one
//! request datagram at a time, decodes it, schedules the handler on the
//! worker pool and only then acknowledges, so acknowledgment never depends on
//! handler latency. The subscription listener tracks broadcast-socket
//! membership. The broadcaster drains the update queue and fans each encoded
//! message out to every subscriber. The session loop in [`Server::run`] is
//! the only code that touches the [`GameSession`].

use crate::game::{GameSession, ReadyOutcome, SessionCommand};
use log::{debug, error, info, warn};
use shared::dispatch::Router;
use shared::pool::WorkerPool;
use shared::protocol::{tags, Reply, Request, Update};
use shared::PlayerId;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

const POOL_WORKERS: usize = 4;
const POOL_CAPACITY: usize = 64;
const COMMAND_QUEUE: usize = 256;
const RECV_BUFFER: usize = 2048;

pub struct Server {
    control_socket: Arc<UdpSocket>,
    broadcast_socket: Arc<UdpSocket>,
    subscribers: Arc<RwLock<HashSet<SocketAddr>>>,
    session: GameSession,
    router: Arc<Router<Request>>,

    // Communication channels; the router's handlers hold the command senders.
    command_rx: mpsc::Receiver<SessionCommand>,
    update_tx: mpsc::UnboundedSender<Update>,
    update_rx: mpsc::UnboundedReceiver<Update>,
}

impl Server {
    pub async fn new(
        host: &str,
        control_port: u16,
        broadcast_port: u16,
        max_players: usize,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let control_socket = Arc::new(UdpSocket::bind((host, control_port)).await?);
        let broadcast_socket = Arc::new(UdpSocket::bind((host, broadcast_port)).await?);
        info!("control channel listening on {}", control_socket.local_addr()?);
        info!(
            "broadcast channel listening on {}",
            broadcast_socket.local_addr()?
        );

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let pool = Arc::new(WorkerPool::new(POOL_WORKERS, POOL_CAPACITY));
        let router = Arc::new(Self::build_router(&pool, &command_tx));

        Ok(Server {
            control_socket,
            broadcast_socket,
            subscribers: Arc::new(RwLock::new(HashSet::new())),
            session: GameSession::new(max_players),
            router,
            command_rx,
            update_tx,
            update_rx,
        })
    }

    pub fn control_addr(&self) -> std::io::Result<SocketAddr> {
        self.control_socket.local_addr()
    }

    pub fn broadcast_addr(&self) -> std::io::Result<SocketAddr> {
        self.broadcast_socket.local_addr()
    }

    /// Every control tag forwards its decoded request to the session loop;
    /// the router still drops anything without a registered handler.
    fn build_router(
        pool: &Arc<WorkerPool>,
        command_tx: &mpsc::Sender<SessionCommand>,
    ) -> Router<Request> {
        let mut router = Router::new(Arc::clone(pool));
        for tag in [
            tags::NEW_PLAYER,
            tags::PLAYER_READY,
            tags::NEW_POINT,
            tags::NEW_WINNER,
            tags::PLAYER_LEFT,
        ] {
            let command_tx = command_tx.clone();
            router.register(tag, move |request: Request| {
                let command_tx = command_tx.clone();
                async move {
                    if command_tx.send(SessionCommand::from(request)).await.is_err() {
                        warn!("session loop closed, dropping command");
                    }
                }
            });
        }
        router
    }

    /// Spawns the task that answers control requests.
    fn spawn_control_responder(&self) {
        let socket = Arc::clone(&self.control_socket);
        let router = Arc::clone(&self.router);

        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let reply = match std::str::from_utf8(&buffer[..len]) {
                            Ok(wire) => {
                                let wire = wire.trim();
                                debug!("request from {}: {}", addr, wire);
                                match Request::decode(wire) {
                                    Ok(request) => {
                                        if router.route(request).await {
                                            Reply::Accepted
                                        } else {
                                            Reply::Rejected
                                        }
                                    }
                                    Err(e) => {
                                        warn!("malformed request from {}: {}", addr, e);
                                        Reply::Rejected
                                    }
                                }
                            }
                            Err(_) => {
                                warn!("non-utf8 request from {}", addr);
                                Reply::Rejected
                            }
                        };

                        if let Err(e) = socket.send_to(reply.encode().as_bytes(), addr).await {
                            error!("failed to reply to {}: {}", addr, e);
                        }
                    }
                    Err(e) => {
                        error!("control receive error: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that tracks broadcast-socket membership.
    fn spawn_subscription_listener(&self) {
        let socket = Arc::clone(&self.broadcast_socket);
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let mut buffer = [0u8; 256];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        match std::str::from_utf8(&buffer[..len]).map(str::trim) {
                            Ok(wire) if wire == tags::SUBSCRIBE => {
                                if subscribers.write().await.insert(addr) {
                                    info!("subscriber {} added", addr);
                                }
                            }
                            Ok(wire) if wire == tags::UNSUBSCRIBE => {
                                if subscribers.write().await.remove(&addr) {
                                    info!("subscriber {} removed", addr);
                                }
                            }
                            _ => warn!("unexpected datagram on broadcast socket from {}", addr),
                        }
                    }
                    Err(e) => {
                        error!("subscription receive error: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that fans queued updates out to every subscriber.
    fn spawn_broadcaster(&mut self) {
        let socket = Arc::clone(&self.broadcast_socket);
        let subscribers = Arc::clone(&self.subscribers);
        let mut update_rx = std::mem::replace(&mut self.update_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(update) = update_rx.recv().await {
                let wire = update.encode();
                let addrs: Vec<SocketAddr> =
                    { subscribers.read().await.iter().copied().collect() };

                for addr in addrs {
                    if let Err(e) = socket.send_to(wire.as_bytes(), addr).await {
                        warn!("failed to publish to {}, dropping subscriber: {}", addr, e);
                        subscribers.write().await.remove(&addr);
                    }
                }
            }
        });
    }

    /// Main session loop: the single owner of the authoritative state.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_control_responder();
        self.spawn_subscription_listener();
        self.spawn_broadcaster();

        info!(
            "server started, waiting for up to {} players",
            self.session.max_players()
        );

        loop {
            match self.command_rx.recv().await {
                Some(command) => self.apply_command(command),
                None => {
                    info!("command channel closed, server stopping");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Applies one session command and publishes the resulting broadcasts.
    fn apply_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join { id, ip, name } => {
                let derived = PlayerId::new(&ip, &name);
                if id != derived {
                    warn!(
                        "join id '{}' does not match '{}', using derived identity",
                        id, derived
                    );
                }
                match self.session.join(&ip, &name) {
                    Ok(player) => self.publish(Update::PlayerJoined {
                        id: player.id,
                        ip: player.ip,
                        name: player.name,
                    }),
                    Err(e) => warn!("join refused for {}:{}: {}", ip, name, e),
                }
            }

            SessionCommand::Ready { id, ready } => match self.session.set_ready(&id, ready) {
                Ok(outcome) => {
                    if ready {
                        self.publish(Update::PlayerReady { id });
                    }
                    if let ReadyOutcome::RoundStarted { drawer, word } = outcome {
                        self.publish(Update::RoundStarted { drawer, word });
                    }
                }
                Err(e) => warn!("ready change dropped: {}", e),
            },

            // Pure relay: the session never inspects point coordinates.
            SessionCommand::Point { event } => self.publish(Update::Point(event)),

            SessionCommand::Winner { id } => match self.session.report_winner(&id) {
                Ok(()) => self.publish(Update::Winner { id }),
                Err(e @ crate::game::SessionError::StaleWinner(_)) => {
                    debug!("{}, ignored", e);
                }
                Err(e) => warn!("winner report dropped: {}", e),
            },

            SessionCommand::Leave { id } => match self.session.leave(&id) {
                Ok(outcome) => {
                    self.publish(Update::PlayerLeft { id });
                    if let Some((drawer, word)) = outcome.round_started {
                        self.publish(Update::RoundStarted { drawer, word });
                    }
                }
                Err(e) => warn!("leave dropped: {}", e),
            },
        }
    }

    fn publish(&self, update: Update) {
        if self.update_tx.send(update).is_err() {
            error!("broadcast queue closed, update lost");
        }
    }
}
