//! Session with one external simulator.
//!
//! A [`Session`] owns the simulator handle and the transport to it. Any
//! failure after launch tears both down before the error is returned, so a
//! session is either fully usable or [`Disconnected`](SessionState::Disconnected)
//! and waiting for a fresh [`connect`](Session::connect).

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::thread;
use std::time::{Duration, Instant};

use boxsim_core::config::{BoxConfig, ComConfig};
use boxsim_core::types::{Bound, MotorCommand, SensorReadings, Workspace};
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, SessionError};
use crate::launcher::{Launcher, SimHandle};
use crate::message::{Message, MessageKind, PayloadWriter, Value};
use crate::sensors::decode_readings;
use crate::state_machine::{SessionState, SessionStateMachine};
use crate::transport::TcpTransport;

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Wait between launching the simulator and the first connection attempt.
    pub grace: Duration,
    /// Total time allowed to establish the TCP connection.
    pub connect: Duration,
    /// Deadline for every response except Step.
    pub control: Duration,
    /// Deadline for the Step response, which covers the whole trial.
    pub step: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from_config(&ComConfig::default())
    }
}

impl Timeouts {
    pub const fn from_config(com: &ComConfig) -> Self {
        Self {
            grace: Duration::from_millis(com.grace_ms),
            connect: Duration::from_millis(com.connect_timeout_ms),
            control: Duration::from_millis(com.control_timeout_ms),
            step: Duration::from_millis(com.step_timeout_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigureHeader
// ---------------------------------------------------------------------------

/// Fixed fields sent ahead of the configuration vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfigureHeader {
    pub step_freq: f64,
    pub step_iter: i32,
    pub iter_vel: i32,
    pub iter_pos: i32,
    pub self_collisions: bool,
}

impl ConfigureHeader {
    pub const fn from_config(config: &BoxConfig) -> Self {
        Self {
            step_freq: config.world.step_freq,
            step_iter: config.world.step_iter,
            iter_vel: config.world.iter_vel,
            iter_pos: config.world.iter_pos,
            self_collisions: config.arm.self_collisions,
        }
    }

    fn write(&self, w: &mut PayloadWriter) {
        w.put_double(self.step_freq)
            .put_int(self.step_iter)
            .put_int(self.iter_vel)
            .put_int(self.iter_pos)
            .put_int(i32::from(self.self_collisions));
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    launcher: Box<dyn Launcher>,
    timeouts: Timeouts,
    machine: SessionStateMachine,
    transport: Option<TcpTransport>,
    sim: Option<Box<dyn SimHandle>>,
    port: Option<u16>,
    conf: Vec<Value>,
    workspace: Option<Workspace>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.machine.state())
            .field("port", &self.port)
            .field("timeouts", &self.timeouts)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A disconnected session. Nothing is launched until [`connect`](Self::connect).
    pub fn new(launcher: Box<dyn Launcher>, timeouts: Timeouts) -> Self {
        Self {
            launcher,
            timeouts,
            machine: SessionStateMachine::new(),
            transport: None,
            sim: None,
            port: None,
            conf: Vec::new(),
            workspace: None,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Port the current simulator was launched on.
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Workspace reported by the last successful Configure.
    pub const fn workspace(&self) -> Option<Workspace> {
        self.workspace
    }

    /// Launch the simulator on a free localhost port and handshake with it.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.machine.begin_connect()?;

        let result = self.launch_and_open();
        if let Err(e) = result {
            self.teardown();
            return Err(e);
        }
        self.send_and_receive(&Message::empty(MessageKind::Hello), self.timeouts.control)?;
        info!(port = self.port, "simulator session connected");
        Ok(())
    }

    fn launch_and_open(&mut self) -> Result<(), SessionError> {
        let port = free_port()?;
        self.port = Some(port);
        self.sim = Some(self.launcher.launch(port)?);

        if !self.timeouts.grace.is_zero() {
            debug!(grace = ?self.timeouts.grace, "waiting for simulator start-up");
            thread::sleep(self.timeouts.grace);
        }
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        self.transport = Some(TcpTransport::connect(addr, self.timeouts.connect)?);
        Ok(())
    }

    /// Write `msg` and block for its response.
    ///
    /// The request is checked against the session state before anything is
    /// written. A response of kind Error is surfaced as
    /// [`ProtocolError::Remote`]. On any failure the session is torn down.
    pub fn send_and_receive(
        &mut self,
        msg: &Message,
        timeout: Duration,
    ) -> Result<Message, SessionError> {
        if self.transport.is_none() {
            return Err(SessionError::Disconnected);
        }
        if let Err(e) = self.machine.on_request(msg.kind) {
            self.teardown();
            return Err(e.into());
        }
        let result = self.exchange(msg, timeout);
        match result {
            Ok(response) => {
                self.machine.on_response(response.kind);
                Ok(response)
            }
            Err(e) => {
                warn!(kind = %msg.kind, error = %e, "exchange failed, tearing session down");
                self.teardown();
                Err(e)
            }
        }
    }

    fn exchange(&mut self, msg: &Message, timeout: Duration) -> Result<Message, SessionError> {
        let transport = self.transport.as_mut().ok_or(SessionError::Disconnected)?;
        let classify = |e| SessionError::from_exchange(e, msg.kind, timeout);

        debug!(kind = %msg.kind, bytes = msg.body.len(), "request");
        transport.send(msg).map_err(classify)?;
        let response = transport
            .receive(Instant::now() + timeout)
            .map_err(classify)?
            .ok_or(SessionError::Disconnected)?;
        debug!(kind = %response.kind, bytes = response.body.len(), "response");

        let expected = msg.kind.expected_response();
        if response.kind == MessageKind::Error {
            let text = response
                .read_text()
                .unwrap_or_else(|_| "<unreadable error payload>".into());
            return Err(ProtocolError::Remote(text).into());
        }
        if response.kind != expected {
            return Err(ProtocolError::UnexpectedKind {
                expected,
                got: response.kind,
            }
            .into());
        }
        Ok(response)
    }

    /// Tear the session down if a payload could not be built or decoded.
    fn guard<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, SessionError> {
        result.map_err(|e| {
            warn!(error = %e, "bad response payload, tearing session down");
            self.teardown();
            e.into()
        })
    }

    /// Send the world configuration and return the reachable workspace.
    pub fn configure(
        &mut self,
        header: &ConfigureHeader,
        conf: &[Value],
        channels: &[String],
    ) -> Result<Workspace, SessionError> {
        let mut w = PayloadWriter::new();
        header.write(&mut w);
        w.put_values(conf);
        let count = w.put_count(channels.len()).map(|_| ());
        self.guard(count)?;
        for name in channels {
            w.put_string(name);
        }

        let response =
            self.send_and_receive(&w.finish(MessageKind::Configure), self.timeouts.control)?;
        let workspace = self.guard(parse_workspace(&response))?;
        info!(
            x_min = workspace.x.min,
            x_max = workspace.x.max,
            y_min = workspace.y.min,
            y_max = workspace.y.max,
            channels = channels.len(),
            "simulator configured"
        );
        self.conf = conf.to_vec();
        self.workspace = Some(workspace);
        Ok(workspace)
    }

    /// One trial: Reset → Order → Step → Sensor.
    ///
    /// Returns the readings acknowledged by Reset (before the trial) and the
    /// readings collected after `steps` simulation steps.
    pub fn reset_and_run(
        &mut self,
        init_pose: &[f64],
        command: &MotorCommand,
        steps: u32,
    ) -> Result<(SensorReadings, SensorReadings), SessionError> {
        let control = self.timeouts.control;

        let mut w = PayloadWriter::new();
        let pose_len = w.put_count(init_pose.len()).map(|_| ());
        self.guard(pose_len)?;
        w.put_doubles(init_pose).put_values(&self.conf);
        let ack = self.send_and_receive(&w.finish(MessageKind::Reset), control)?;
        let pre = self.guard(decode_readings(&ack.body))?;

        let flat = command.flatten();
        let cmd_len = w.put_count(flat.len()).map(|_| ());
        self.guard(cmd_len)?;
        w.put_doubles(&flat);
        self.send_and_receive(&w.finish(MessageKind::Order), control)?;

        let steps = self.guard(
            i32::try_from(steps)
                .map_err(|_| ProtocolError::malformed(format!("step count {steps} too large"))),
        )?;
        w.put_int(steps);
        self.send_and_receive(&w.finish(MessageKind::Step), self.timeouts.step)?;

        let sensors = self.send_and_receive(&Message::empty(MessageKind::Sensor), control)?;
        let post = self.guard(decode_readings(&sensors.body))?;
        debug!(pre = pre.len(), post = post.len(), "trial finished");
        Ok((pre, post))
    }

    /// Say goodbye (best effort), disconnect and stop the simulator.
    ///
    /// Idempotent; safe after a failed connect.
    pub fn close(&mut self) {
        if self.transport.is_some() && self.state().is_connected() {
            let bye = Message::text(MessageKind::Bye, "bye");
            if let Err(e) = self.send_and_receive(&bye, self.timeouts.control) {
                warn!(error = %e, "simulator did not acknowledge bye");
            }
        }
        if self.transport.is_some() || self.sim.is_some() {
            self.teardown();
            info!("simulator session closed");
        }
    }

    fn teardown(&mut self) {
        self.machine.fail();
        if let Some(transport) = self.transport.take() {
            transport.shutdown();
        }
        if let Some(mut sim) = self.sim.take()
            && let Err(e) = sim.terminate()
        {
            warn!(error = %e, "failed to terminate simulator");
        }
        self.workspace = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_workspace(response: &Message) -> Result<Workspace, ProtocolError> {
    let mut r = response.reader();
    let (x_min, x_max, y_min, y_max) =
        (r.read_double()?, r.read_double()?, r.read_double()?, r.read_double()?);
    r.finish()?;
    let x = Bound::checked(0, x_min, x_max)
        .map_err(|e| ProtocolError::malformed(format!("workspace x range: {e}")))?;
    let y = Bound::checked(1, y_min, y_max)
        .map_err(|e| ProtocolError::malformed(format!("workspace y range: {e}")))?;
    Ok(Workspace::new(x, y))
}

/// Ask the OS for a port nobody is listening on.
fn free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
