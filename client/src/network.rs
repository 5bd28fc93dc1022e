//! Client network layer: control requester, broadcast subscription and the
//! update handlers that keep the mirror converged.
//!
//! Outbound requests funnel through a single requester task that owns the
//! control socket, sends one request at a time and waits, with a bounded
//! timeout, for its `accepted`/`rejected` reply. Broadcasts arrive on a
//! separate subscription socket; the receive loop only decodes and hands the
//! typed update to the router, which schedules the mirror/presentation work
//! on the worker pool.

use crate::game::ClientGameState;
use crate::presentation::PresentationSurface;
use log::{debug, error, info, warn};
use shared::dispatch::{Router, Tagged};
use shared::pool::WorkerPool;
use shared::protocol::{tags, CodecError, PathEvent, Reply, Request, Update};
use shared::{Player, PlayerId, REQUEST_TIMEOUT};
use std::fmt;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{sleep, timeout, Duration};

const POOL_WORKERS: usize = 4;
const POOL_CAPACITY: usize = 64;
const REQUEST_QUEUE: usize = 256;
const RECV_BUFFER: usize = 2048;

/// Why a control request produced no usable reply.
#[derive(Debug)]
pub enum RequestError {
    Io(std::io::Error),
    /// No reply arrived within the bounded wait.
    TimedOut,
    MalformedReply(CodecError),
    /// The requester task is gone.
    ChannelClosed,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Io(e) => write!(f, "control channel i/o error: {}", e),
            RequestError::TimedOut => write!(f, "no reply within {:?}", REQUEST_TIMEOUT),
            RequestError::MalformedReply(e) => write!(f, "malformed reply: {}", e),
            RequestError::ChannelClosed => write!(f, "control requester is closed"),
        }
    }
}

impl std::error::Error for RequestError {}

struct QueuedRequest {
    request: Request,
    reply_tx: Option<oneshot::Sender<Result<Reply, RequestError>>>,
}

/// Cloneable entry point for local intents (ready, winner, leave) and mirror
/// reads; handed to the presentation driver.
#[derive(Clone)]
pub struct ClientHandle {
    request_tx: mpsc::Sender<QueuedRequest>,
    state: Arc<RwLock<ClientGameState>>,
    local_id: PlayerId,
}

impl ClientHandle {
    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    pub fn state(&self) -> Arc<RwLock<ClientGameState>> {
        Arc::clone(&self.state)
    }

    pub async fn is_drawer(&self) -> bool {
        self.state.read().await.is_drawer()
    }

    pub async fn set_ready(&self, ready: bool) -> Result<Reply, RequestError> {
        self.request(Request::Ready {
            id: self.local_id.clone(),
            ready,
        })
        .await
    }

    /// Declares a round winner (usually the local player after a correct
    /// guess).
    pub async fn report_winner(&self, winner: PlayerId) -> Result<Reply, RequestError> {
        self.request(Request::Winner { id: winner }).await
    }

    pub async fn leave(&self) -> Result<Reply, RequestError> {
        self.request(Request::Leave {
            id: self.local_id.clone(),
        })
        .await
    }

    async fn request(&self, request: Request) -> Result<Reply, RequestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(QueuedRequest {
                request,
                reply_tx: Some(reply_tx),
            })
            .await
            .map_err(|_| RequestError::ChannelClosed)?;
        reply_rx.await.map_err(|_| RequestError::ChannelClosed)?
    }
}

pub struct Client {
    control_socket: Arc<UdpSocket>,
    sub_socket: Arc<UdpSocket>,
    state: Arc<RwLock<ClientGameState>>,
    surface: Arc<dyn PresentationSurface>,
    pool: Arc<WorkerPool>,
    local: Player,

    request_tx: mpsc::Sender<QueuedRequest>,
    request_rx: mpsc::Receiver<QueuedRequest>,
    point_tx: mpsc::UnboundedSender<PathEvent>,
    point_rx: mpsc::UnboundedReceiver<PathEvent>,
    point_stream_open: bool,
}

impl Client {
    /// Binds and connects both channel sockets. The local identity ip
    /// defaults to the address the control socket routes from.
    pub async fn new(
        server_host: &str,
        control_port: u16,
        broadcast_port: u16,
        name: &str,
        ip_override: Option<&str>,
        surface: Arc<dyn PresentationSurface>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let control_socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        control_socket
            .connect((server_host, control_port))
            .await?;
        let sub_socket = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
        sub_socket.connect((server_host, broadcast_port)).await?;

        let ip = match ip_override {
            Some(ip) => ip.to_string(),
            None => control_socket.local_addr()?.ip().to_string(),
        };

        let mut state = ClientGameState::new();
        let local = state.register_local_player(&ip, name);
        info!("local player {} created", local.id);

        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (point_tx, point_rx) = mpsc::unbounded_channel();

        Ok(Client {
            control_socket,
            sub_socket,
            state: Arc::new(RwLock::new(state)),
            surface,
            pool: Arc::new(WorkerPool::new(POOL_WORKERS, POOL_CAPACITY)),
            local,
            request_tx,
            request_rx,
            point_tx,
            point_rx,
            point_stream_open: true,
        })
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            request_tx: self.request_tx.clone(),
            state: Arc::clone(&self.state),
            local_id: self.local.id.clone(),
        }
    }

    /// Sender side of the stroke-capture point stream.
    pub fn point_sender(&self) -> mpsc::UnboundedSender<PathEvent> {
        self.point_tx.clone()
    }

    /// Subscribes, announces the local player and runs the receive loop
    /// until the process shuts down.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_requester();

        // Subscribe before announcing ourselves so our own join echo and
        // everything after it is not missed.
        self.sub_socket.send(tags::SUBSCRIBE.as_bytes()).await?;

        let handle = self.handle();
        let join_reply = handle
            .request(Request::Join {
                id: self.local.id.clone(),
                ip: self.local.ip.clone(),
                name: self.local.name.clone(),
            })
            .await?;
        if join_reply != Reply::Accepted {
            return Err(format!("server rejected join for {}", self.local.id).into());
        }
        info!("joined session as {}", self.local.id);

        let router = self.build_update_router();
        let mut buffer = [0u8; RECV_BUFFER];

        loop {
            tokio::select! {
                result = self.sub_socket.recv(&mut buffer) => match result {
                    Ok(len) => match std::str::from_utf8(&buffer[..len]) {
                        Ok(wire) => match Update::decode(wire.trim()) {
                            Ok(update) => {
                                debug!("broadcast received: {}", update.tag());
                                router.route(update).await;
                            }
                            Err(e) => warn!("malformed broadcast dropped: {}", e),
                        },
                        Err(_) => warn!("non-utf8 broadcast dropped"),
                    },
                    Err(e) => {
                        error!("broadcast receive error: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                },

                maybe_event = self.point_rx.recv(), if self.point_stream_open => {
                    match maybe_event {
                        Some(event) => self.forward_point(event).await,
                        None => {
                            debug!("stroke capture dropped, point stream closed");
                            self.point_stream_open = false;
                        }
                    }
                },
            }
        }
    }

    /// Announces departure and drops the broadcast subscription. Best
    /// effort; failures are logged and ignored.
    pub async fn shutdown(&self) {
        if let Err(e) = self.handle().leave().await {
            warn!("leave request failed: {}", e);
        }
        if let Err(e) = self.sub_socket.send(tags::UNSUBSCRIBE.as_bytes()).await {
            warn!("unsubscribe failed: {}", e);
        }
    }

    /// Queues a captured point for transmission, fire-and-forget.
    async fn forward_point(&self, event: PathEvent) {
        let queued = QueuedRequest {
            request: Request::Point(event),
            reply_tx: None,
        };
        if self.request_tx.send(queued).await.is_err() {
            warn!("control requester closed, point dropped");
        }
    }

    /// Spawns the single-writer task owning the control socket.
    fn spawn_requester(&mut self) {
        let socket = Arc::clone(&self.control_socket);
        let mut request_rx = std::mem::replace(&mut self.request_rx, mpsc::channel(1).1);

        tokio::spawn(async move {
            let mut buffer = [0u8; 256];

            while let Some(QueuedRequest { request, reply_tx }) = request_rx.recv().await {
                let outcome = Self::exchange(&socket, &request, &mut buffer).await;
                match &outcome {
                    Ok(Reply::Accepted) => debug!("request '{}' accepted", request.tag()),
                    Ok(Reply::Rejected) => warn!("request '{}' rejected by server", request.tag()),
                    Err(e) => warn!("request '{}' failed: {}", request.tag(), e),
                }
                if let Some(reply_tx) = reply_tx {
                    let _ = reply_tx.send(outcome);
                }
            }
        });
    }

    /// One send and one bounded reply wait.
    async fn exchange(
        socket: &UdpSocket,
        request: &Request,
        buffer: &mut [u8],
    ) -> Result<Reply, RequestError> {
        // Drop any reply left over from a timed-out exchange so it cannot
        // pair with this request.
        while socket.try_recv(buffer).is_ok() {}

        socket
            .send(request.encode().as_bytes())
            .await
            .map_err(RequestError::Io)?;

        let len = timeout(REQUEST_TIMEOUT, socket.recv(buffer))
            .await
            .map_err(|_| RequestError::TimedOut)?
            .map_err(RequestError::Io)?;

        let text = std::str::from_utf8(&buffer[..len])
            .map_err(|_| RequestError::MalformedReply(CodecError::MissingTag))?;
        Reply::decode(text.trim()).map_err(RequestError::MalformedReply)
    }

    /// Wires every broadcast tag to its mirror mutation and presentation
    /// callback.
    fn build_update_router(&self) -> Router<Update> {
        let mut router = Router::new(Arc::clone(&self.pool));

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::NEW_PLAYER, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::PlayerJoined { id, ip, name } = update {
                    let added = { state.write().await.add_player(id, ip, name) };
                    if let Some(player) = added {
                        surface.on_player_joined(&player);
                    }
                }
            }
        });

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::PLAYER_READY, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::PlayerReady { id } = update {
                    state.write().await.set_ready(&id);
                    surface.on_player_ready(&id);
                }
            }
        });

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::NEW_POINT, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::Point(event) = update {
                    state.write().await.append_point(event);
                    surface.on_remote_point(&event);
                }
            }
        });

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::NEW_WINNER, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::Winner { id } = update {
                    let applied = { state.write().await.set_winner(id.clone()) };
                    if applied {
                        surface.on_player_won(&id);
                    }
                }
            }
        });

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::NEW_GAME, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::RoundStarted { drawer, word } = update {
                    {
                        state
                            .write()
                            .await
                            .start_round(drawer.clone(), word.clone());
                    }
                    surface.on_round_started(&drawer, &word);
                }
            }
        });

        let state = Arc::clone(&self.state);
        let surface = Arc::clone(&self.surface);
        router.register(tags::PLAYER_LEFT, move |update: Update| {
            let state = Arc::clone(&state);
            let surface = Arc::clone(&surface);
            async move {
                if let Update::PlayerLeft { id } = update {
                    state.write().await.remove_player(&id);
                    surface.on_player_left(&id);
                }
            }
        });

        router
    }
}
