//! Server network layer handling TCP connections and the fixed-rate game loop
//!
//! Every accepted socket gets its own task that performs the handshake and
//! then reads commands until the transport fails. Outbound frames go through
//! a bounded per-client channel drained by a dedicated writer task, so the
//! tick loop never blocks on a slow client; a client that lets its queue fill
//! up is disconnected.
//!
//! All game and client state lives in one [`Session`] behind a mutex. The
//! tick loop holds the lock for a whole simulate/broadcast step; connection
//! tasks take it only briefly to register or to store a command.

use crate::client_manager::{Client, ClientManager, OUTBOUND_QUEUE_FRAMES};
use crate::game::GameState;
use crate::settings::Settings;
use log::{debug, error, info, warn};
use shared::{
    encode_handshake, encode_line, select_command, Command, LineBuffer, ProtocolError, Tank,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep, sleep_until, Instant};

/// Size of the scratch buffer for each command read
const READ_CHUNK: usize = 4096;

/// Longest accepted handshake name line, terminator included
const MAX_NAME_LINE: u64 = 1024;

pub type SharedSession = Arc<Mutex<Session>>;

/// The game plus everyone connected to it
pub struct Session {
    game: GameState,
    clients: ClientManager,
}

impl Session {
    pub fn new(game: GameState) -> Self {
        Self {
            game,
            clients: ClientManager::new(),
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    /// Reserves a player ID and builds the ID/size/walls part of the
    /// handshake for it.
    pub fn handshake_preamble(&mut self) -> Result<(u32, String), ProtocolError> {
        let id = self.clients.allocate_id();
        let world = self.game.world();
        let preamble = encode_handshake(id, world.size(), world.walls())?;
        Ok((id, preamble))
    }

    /// Creates the player's tank and registers the client.
    ///
    /// The tank's own line is queued on `outbound` before the client becomes
    /// visible to the tick loop, so it always precedes the first frame.
    pub fn join(
        &mut self,
        id: u32,
        name: String,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
        close: oneshot::Sender<()>,
    ) -> Result<Tank, ProtocolError> {
        let tank = self.game.add_player(id, &name);
        let line = match encode_line(&tank) {
            Ok(line) => line,
            Err(e) => {
                self.game.remove_player(id);
                return Err(e);
            }
        };

        // A closed channel surfaces on the first broadcast.
        let _ = outbound.try_send(line);
        self.clients
            .add_client(Client::new(id, name, addr, outbound, close));
        Ok(tank)
    }

    pub fn set_command(&mut self, id: u32, command: Command) -> bool {
        self.game.set_command(id, command)
    }

    /// Runs one frame: simulate, broadcast, then advance disconnects.
    pub fn step(&mut self) {
        self.game.tick();

        let failed = match self.game.frame_lines() {
            Ok(frame) => self.clients.broadcast(&frame),
            Err(e) => {
                error!("Failed to encode frame {}: {}", self.game.tick, e);
                Vec::new()
            }
        };

        for client_id in &failed {
            self.game.mark_disconnected(*client_id);
        }
        for client in self.clients.advance_disconnects(&failed) {
            self.game.remove_player(client.id);
        }

        self.game.end_frame();
    }
}

/// TCP front end plus the tick loop driving a [`Session`]
pub struct Server {
    listener: TcpListener,
    session: SharedSession,
    frame_duration: Duration,
}

impl Server {
    pub async fn bind(addr: &str, settings: Settings) -> io::Result<Self> {
        Self::bind_with_game(addr, GameState::new(settings)).await
    }

    /// Binds with a prepared game, e.g. one with a seeded RNG.
    pub async fn bind_with_game(addr: &str, game: GameState) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let frame_duration = game.settings().frame_duration();
        Ok(Server {
            listener,
            session: Arc::new(Mutex::new(Session::new(game))),
            frame_duration,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> SharedSession {
        Arc::clone(&self.session)
    }

    /// Starts the tick loop and accepts connections forever.
    pub async fn run(self) {
        tokio::spawn(run_tick_loop(Arc::clone(&self.session), self.frame_duration));
        info!(
            "Server started, {} ms per frame",
            self.frame_duration.as_millis()
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    let session = Arc::clone(&self.session);
                    tokio::spawn(async move {
                        handle_connection(stream, addr, session).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Steps the session once per `period`, measured from fixed deadlines so
/// step time does not accumulate as drift.
async fn run_tick_loop(session: SharedSession, period: Duration) {
    let mut deadline = Instant::now() + period;

    loop {
        sleep_until(deadline).await;
        deadline += period;

        let now = Instant::now();
        if now > deadline {
            warn!("Tick loop running {:?} behind", now - deadline);
            deadline = now + period;
        }

        let mut session = session.lock().await;
        session.step();

        if session.game.tick % 600 == 0 {
            debug!(
                "Tick {}: {} clients, {} tanks",
                session.game.tick,
                session.clients.len(),
                session.game.world().tanks().count()
            );
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, session: SharedSession) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }

    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (id, name) = match handshake(&mut reader, &mut writer, &session).await {
        Ok(Some(joined)) => joined,
        Ok(None) => {
            debug!("Connection from {} closed before sending a name", addr);
            return;
        }
        Err(e) => {
            debug!("Handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_FRAMES);
    let (close_tx, close_rx) = oneshot::channel();
    let (reader_gone_tx, reader_gone_rx) = oneshot::channel::<()>();

    if let Err(e) = session
        .lock()
        .await
        .join(id, name, addr, outbound_tx, close_tx)
    {
        error!("Failed to add player {}: {}", id, e);
        return;
    }

    tokio::spawn(write_frames(writer, outbound_rx, reader_gone_rx, id));
    read_commands(reader, close_rx, id, session).await;
    drop(reader_gone_tx);
}

/// Reads the player's name and sends back ID, world size and walls.
///
/// Returns `Ok(None)` if the peer hung up before finishing its name line,
/// and an `InvalidData` error if the line runs past [`MAX_NAME_LINE`] bytes.
/// Either way no player ID is allocated.
pub async fn handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &SharedSession,
) -> io::Result<Option<(u32, String)>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    let read = (&mut *reader)
        .take(MAX_NAME_LINE)
        .read_until(b'\n', &mut raw)
        .await?;
    if raw.last() != Some(&b'\n') {
        if read as u64 >= MAX_NAME_LINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "name line too long",
            ));
        }
        return Ok(None);
    }
    let name = String::from_utf8_lossy(&raw)
        .trim_end_matches(['\r', '\n'])
        .to_string();

    let (id, preamble) = session
        .lock()
        .await
        .handshake_preamble()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    writer.write_all(preamble.as_bytes()).await?;
    writer.flush().await?;
    Ok(Some((id, name)))
}

/// Forwards queued frames to the socket until the channel closes, a write
/// fails, or the connection's reader goes away.
///
/// A write blocked on a peer that stopped reading is abandoned as soon as the
/// reader goes away.
pub async fn write_frames<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<String>,
    mut reader_gone: oneshot::Receiver<()>,
    client_id: u32,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = &mut reader_gone => break,
        };

        tokio::select! {
            result = writer.write_all(frame.as_bytes()) => {
                if let Err(e) = result {
                    debug!("Write to client {} failed: {}", client_id, e);
                    break;
                }
            }
            _ = &mut reader_gone => break,
        }
    }

    debug!("Writer for client {} finished", client_id);
}

/// Stores the command selected from each read until the transport fails or
/// the client is removed.
pub async fn read_commands<R>(
    mut reader: R,
    mut close: oneshot::Receiver<()>,
    client_id: u32,
    session: SharedSession,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            result = reader.read(&mut chunk) => match result {
                Ok(0) => {
                    debug!("Client {} closed its connection", client_id);
                    break;
                }
                Ok(n) => {
                    if let Some(command) = select_command(lines.push(&chunk[..n])) {
                        session.lock().await.set_command(client_id, command);
                    }
                }
                Err(e) => {
                    debug!("Read from client {} failed: {}", client_id, e);
                    break;
                }
            },
            _ = &mut close => {
                debug!("Client {} removed, closing reader", client_id);
                break;
            }
        }
    }
}
