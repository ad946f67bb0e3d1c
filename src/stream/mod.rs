//! Stream module - GDL-90 transmission scheduler
//!
//! Owns the outbound UDP socket and the live simulator. A single spawned
//! task multiplexes the 1 Hz heartbeat, the 5 Hz ownship+AHRS pair, the
//! setter command channel and shutdown. State is always integrated before
//! any frame of the same tick is built, so a frame never mixes field values
//! from two ticks.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

use crate::discovery::Endpoint;
use crate::protocol::{self, AircraftInfo};
use crate::sim::{FlightState, SimLimits, Simulator};

/// Streamer errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Already streaming")]
    AlreadyStreaming,

    #[error("Not streaming")]
    NotStreaming,
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Transmission timing
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Heartbeat send interval in ms
    pub heartbeat_interval_ms: u64,
    /// Ownship + AHRS send interval in ms (also the integration tick)
    pub telemetry_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            telemetry_interval_ms: 200,
        }
    }
}

/// Streamer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Stopped,
}

/// Events emitted by the streamer
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Published once per integration tick
    StateUpdate(FlightState),
}

/// Setter intents forwarded into the scheduling task
#[derive(Debug, Clone)]
enum Command {
    SetPosition { lat_deg: f64, lon_deg: f64 },
    SetTargetHeading(f64),
    SetTargetAltitude(f64),
    SetTargetSpeed(f64),
    SetTargetClimbRate(f64),
}

/// Handle for forwarding setter calls to a running streamer.
///
/// Setters only queue intent; the scheduling task applies them between
/// ticks. Calls after `stop()` are silently dropped.
#[derive(Debug, Clone)]
pub struct StreamerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl StreamerHandle {
    pub async fn set_position(&self, lat_deg: f64, lon_deg: f64) {
        let _ = self.cmd_tx.send(Command::SetPosition { lat_deg, lon_deg }).await;
    }

    pub async fn set_target_heading(&self, heading_deg: f64) {
        let _ = self.cmd_tx.send(Command::SetTargetHeading(heading_deg)).await;
    }

    pub async fn set_target_altitude(&self, altitude_ft: f64) {
        let _ = self.cmd_tx.send(Command::SetTargetAltitude(altitude_ft)).await;
    }

    pub async fn set_target_speed(&self, speed_kt: f64) {
        let _ = self.cmd_tx.send(Command::SetTargetSpeed(speed_kt)).await;
    }

    pub async fn set_target_climb_rate(&self, climb_fpm: f64) {
        let _ = self.cmd_tx.send(Command::SetTargetClimbRate(climb_fpm)).await;
    }
}

/// GDL-90 transmission scheduler
pub struct Streamer {
    config: StreamConfig,
    aircraft: AircraftInfo,
    limits: SimLimits,
    state: Arc<RwLock<StreamState>>,
    event_tx: mpsc::Sender<StreamEvent>,
    event_rx: Option<mpsc::Receiver<StreamEvent>>,
    cmd_tx: mpsc::Sender<Command>,
    cmd_rx: Option<mpsc::Receiver<Command>>,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl Streamer {
    pub fn new(config: StreamConfig, aircraft: AircraftInfo, limits: SimLimits) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        Self {
            config,
            aircraft,
            limits,
            state: Arc::new(RwLock::new(StreamState::Idle)),
            event_tx,
            event_rx: Some(event_rx),
            cmd_tx,
            cmd_rx: Some(cmd_rx),
            shutdown_tx: Arc::new(RwLock::new(None)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        self.event_rx.take()
    }

    /// Get a handle for setter calls
    pub fn handle(&self) -> StreamerHandle {
        StreamerHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Start streaming to `endpoint` from `initial_state`.
    ///
    /// Binds an ephemeral UDP socket and connects it to the peer; the peer
    /// endpoint is fixed for the lifetime of the stream. Bind failure is
    /// surfaced to the caller; send failures later are logged and ignored.
    pub async fn start(&mut self, endpoint: Endpoint, initial_state: FlightState) -> StreamResult<()> {
        {
            let state = self.state.read().await;
            if *state != StreamState::Idle {
                return Err(StreamError::AlreadyStreaming);
            }
        }

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(endpoint.socket_addr()).await?;

        let mut cmd_rx = self.cmd_rx.take().ok_or(StreamError::AlreadyStreaming)?;
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        {
            let mut st = self.shutdown_tx.write().await;
            *st = Some(shutdown_tx);
        }
        {
            let mut state = self.state.write().await;
            *state = StreamState::Streaming;
        }

        tracing::info!("Streaming GDL-90 to {}:{}", endpoint.ip, endpoint.port);

        let mut sim = Simulator::new(initial_state, self.limits.clone());
        let aircraft = self.aircraft.clone();
        let event_tx = self.event_tx.clone();
        let heartbeat_interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        let telemetry_interval = Duration::from_millis(self.config.telemetry_interval_ms);

        tokio::spawn(async move {
            let mut heartbeat_timer = tokio::time::interval(heartbeat_interval);
            let mut telemetry_timer = tokio::time::interval(telemetry_interval);
            let mut last_tick = Instant::now();

            loop {
                tokio::select! {
                    _ = heartbeat_timer.tick() => {
                        send_frame(&socket, &protocol::heartbeat(), "heartbeat").await;
                    }

                    _ = telemetry_timer.tick() => {
                        let now = Instant::now();
                        let dt = now.duration_since(last_tick).as_secs_f64();
                        last_tick = now;

                        // State fully advanced before any frame is built.
                        sim.integrate(dt);
                        // A lagging observer loses snapshots, not the
                        // stream; the next tick supersedes them anyway.
                        let _ = event_tx.try_send(StreamEvent::StateUpdate(sim.state().clone()));

                        send_frame(&socket, &protocol::ownship(sim.state(), &aircraft), "ownship").await;
                        send_frame(&socket, &protocol::ahrs(sim.state()), "ahrs").await;
                    }

                    Some(cmd) = cmd_rx.recv() => {
                        apply_command(&mut sim, cmd);
                    }

                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Socket drops here; no send can occur after shutdown.
            tracing::info!("Stream stopped");
        });

        Ok(())
    }

    /// Stop streaming. Cancels every periodic send atomically; no frame is
    /// transmitted after this returns and the task has observed shutdown.
    pub async fn stop(&self) -> StreamResult<()> {
        {
            let state = self.state.read().await;
            if *state != StreamState::Streaming {
                return Err(StreamError::NotStreaming);
            }
        }

        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
            // The task holds the receiver; wait for it to drop so callers
            // observe a quiesced socket.
            tx.closed().await;
        }

        let mut state = self.state.write().await;
        *state = StreamState::Stopped;
        Ok(())
    }

    pub async fn state(&self) -> StreamState {
        *self.state.read().await
    }
}

fn apply_command(sim: &mut Simulator, cmd: Command) {
    match cmd {
        Command::SetPosition { lat_deg, lon_deg } => sim.set_position(lat_deg, lon_deg),
        Command::SetTargetHeading(deg) => sim.set_target_heading(deg),
        Command::SetTargetAltitude(ft) => sim.set_target_altitude(ft),
        Command::SetTargetSpeed(kt) => sim.set_target_speed(kt),
        Command::SetTargetClimbRate(fpm) => sim.set_target_climb_rate(fpm),
    }
}

/// Fire-and-forget send: UDP gives no delivery guarantee and the next
/// periodic frame supersedes this one within 200 ms, so failures are only
/// logged.
async fn send_frame(socket: &UdpSocket, payload: &[u8], kind: &str) {
    let framed = protocol::frame(payload);
    if let Err(e) = socket.send(&framed).await {
        tracing::warn!("Failed to send {} frame: {}", kind, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{deframe, MSG_ID_HEARTBEAT, MSG_ID_OWNSHIP};
    use std::net::IpAddr;

    async fn local_receiver() -> (UdpSocket, Endpoint) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let endpoint = Endpoint {
            ip: IpAddr::from([127, 0, 0, 1]),
            port: addr.port(),
        };
        (socket, endpoint)
    }

    fn streamer() -> Streamer {
        Streamer::new(
            StreamConfig {
                heartbeat_interval_ms: 50,
                telemetry_interval_ms: 10,
            },
            AircraftInfo::default(),
            SimLimits::default(),
        )
    }

    fn decode_ownship_altitude(payload: &[u8]) -> u16 {
        (u16::from(payload[11]) << 4) | u16::from(payload[12] >> 4)
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (_rx_socket, endpoint) = local_receiver().await;
        let mut s = streamer();
        let state = FlightState::new(50.9010, 4.4840, 3000.0, 120.0, 90.0);

        s.start(endpoint.clone(), state.clone()).await.unwrap();
        assert_eq!(s.state().await, StreamState::Streaming);
        assert!(matches!(
            s.start(endpoint, state).await,
            Err(StreamError::AlreadyStreaming)
        ));
        s.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_fails() {
        let s = streamer();
        assert!(matches!(s.stop().await, Err(StreamError::NotStreaming)));
    }

    #[tokio::test]
    async fn test_transmits_valid_frames() {
        let (rx_socket, endpoint) = local_receiver().await;
        let mut s = streamer();
        s.start(
            endpoint,
            FlightState::new(50.9010, 4.4840, 3000.0, 120.0, 90.0),
        )
        .await
        .unwrap();

        let mut seen_heartbeat = false;
        let mut seen_ownship = false;
        let mut buf = [0u8; 1024];
        for _ in 0..20 {
            let n = tokio::time::timeout(Duration::from_secs(1), rx_socket.recv(&mut buf))
                .await
                .expect("no datagram within 1s")
                .unwrap();
            let payload = deframe(&buf[..n]).expect("invalid frame on the wire");
            match payload[0] {
                MSG_ID_HEARTBEAT => seen_heartbeat = true,
                MSG_ID_OWNSHIP => seen_ownship = true,
                _ => {}
            }
            if seen_heartbeat && seen_ownship {
                break;
            }
        }
        assert!(seen_heartbeat && seen_ownship);
        s.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_climb_is_visible_in_ownship_frames() {
        let (rx_socket, endpoint) = local_receiver().await;
        let mut s = streamer();
        let mut event_rx = s.take_event_receiver().unwrap();
        s.start(
            endpoint,
            FlightState::new(50.9010, 4.4840, 3000.0, 120.0, 90.0),
        )
        .await
        .unwrap();

        let handle = s.handle();
        handle.set_target_altitude(5000.0).await;
        handle.set_target_climb_rate(6000.0).await;

        let mut altitudes = Vec::new();
        let mut buf = [0u8; 1024];
        while altitudes.len() < 50 {
            let n = tokio::time::timeout(Duration::from_secs(1), rx_socket.recv(&mut buf))
                .await
                .expect("no datagram within 1s")
                .unwrap();
            let payload = deframe(&buf[..n]).unwrap();
            if payload[0] == MSG_ID_OWNSHIP {
                altitudes.push(decode_ownship_altitude(&payload));
            }
        }

        assert!(altitudes.windows(2).all(|w| w[1] >= w[0]));
        // 3000 ft encodes as 160; the climb must show.
        assert!(altitudes[0] >= 160);
        assert!(*altitudes.last().unwrap() > 160);

        // Snapshots flow to the observer as well.
        let event = tokio::time::timeout(Duration::from_secs(1), event_rx.recv())
            .await
            .unwrap();
        assert!(matches!(event, Some(StreamEvent::StateUpdate(_))));

        s.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_halts_transmission() {
        let (rx_socket, endpoint) = local_receiver().await;
        let mut s = streamer();
        s.start(
            endpoint,
            FlightState::new(50.9010, 4.4840, 3000.0, 120.0, 90.0),
        )
        .await
        .unwrap();

        let mut buf = [0u8; 1024];
        // Wait for at least one frame, then stop.
        tokio::time::timeout(Duration::from_secs(1), rx_socket.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        s.stop().await.unwrap();
        assert_eq!(s.state().await, StreamState::Stopped);

        // Drain anything already in flight, then expect silence.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx_socket.try_recv(&mut buf).is_ok() {}
        let result =
            tokio::time::timeout(Duration::from_millis(100), rx_socket.recv(&mut buf)).await;
        assert!(result.is_err(), "frame arrived after stop()");
    }
}
