//! In-process fake simulator.
//!
//! [`FakeLauncher`] binds the requested localhost port and serves one
//! connection on a background thread, answering every request the way the
//! real simulator does. Sensor payloads come from a [`Responder`] so tests
//! can script the physics; faults can be injected per message kind. Every
//! request is recorded in a [`FakeLog`].

use std::io;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use boxsim_core::types::{
    COLLISIONS_CHANNEL, Channel, JOINTS_CHANNEL, MotorCommand, SensorReadings,
};
use boxsim_protocol::conf_vector::{self, ConfLayout, DecodedConf};
use boxsim_protocol::framing::{read_frame, write_frame};
use boxsim_protocol::sensors::encode_readings;
use boxsim_protocol::{
    LaunchError, Launcher, Message, MessageKind, PayloadReader, PayloadWriter, ProtocolError,
    SimHandle, Value,
};
use tracing::debug;

const ACCEPT_POLL: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// What the fake knows when it has to produce sensor readings.
#[derive(Debug, Clone, Default)]
pub struct Trial {
    /// Channels requested at Configure time.
    pub channels: Vec<String>,
    pub init_pose: Vec<f64>,
    /// `None` when answering Reset (pre-trial readings).
    pub command: Option<MotorCommand>,
    pub steps: i32,
}

pub type Responder = Arc<dyn Fn(&Trial) -> SensorReadings + Send + Sync>;

/// Injected misbehaviour.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Answer requests of kind `on` with an Error message.
    RemoteError { on: MessageKind, message: String },
    /// Close the connection instead of answering `on`.
    Hangup { on: MessageKind },
    /// Answer `on` with a frame of kind `reply`.
    WrongKind { on: MessageKind, reply: MessageKind },
    /// Never open the port.
    NeverListen,
}

#[derive(Clone)]
pub struct FakeScript {
    /// `x_min, x_max, y_min, y_max` returned by Configure.
    pub workspace: [f64; 4],
    /// Layout the fake expects configuration vectors in.
    pub layout: ConfLayout,
    pub responder: Responder,
    /// Delay before acknowledging Step.
    pub step_delay: Duration,
    pub fault: Option<Fault>,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            workspace: [50.0, 750.0, 50.0, 750.0],
            layout: ConfLayout::Compact,
            responder: default_responder(),
            step_delay: Duration::ZERO,
            fault: None,
        }
    }
}

impl FakeScript {
    #[must_use]
    pub fn with_responder(
        mut self,
        f: impl Fn(&Trial) -> SensorReadings + Send + Sync + 'static,
    ) -> Self {
        self.responder = Arc::new(f);
        self
    }

    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    #[must_use]
    pub const fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_layout(mut self, layout: ConfLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Readings for whatever channels were requested.
///
/// `<obj>_pos` starts at the workspace centre and, after a trial, ends
/// shifted along x by `100 · tanh(Σ end_pose)`. `<obj>_vel` reports the
/// highest commanded speed. `joints` has one `[x, y, angle]` row per joint
/// spaced along x from the centre, with the angle taken from the commanded end
/// pose (the reset pose before a trial). `collisions` is always empty.
pub fn default_responder() -> Responder {
    Arc::new(|trial: &Trial| {
        let mut readings = SensorReadings::new();
        for name in &trial.channels {
            let channel = if name == COLLISIONS_CHANNEL {
                Channel::Collisions(Vec::new())
            } else if name.ends_with("_pos") {
                match &trial.command {
                    None => Channel::samples(2, &[&[400.0, 400.0]]),
                    Some(cmd) => {
                        let dx = 100.0 * cmd.end_pose.iter().sum::<f64>().tanh();
                        Channel::samples(2, &[&[400.0, 400.0], &[400.0 + dx, 400.0]])
                    }
                }
            } else if name == JOINTS_CHANNEL {
                let pose = trial
                    .command
                    .as_ref()
                    .map_or(&trial.init_pose, |cmd| &cmd.end_pose);
                let rows: Vec<[f64; 3]> = pose
                    .iter()
                    .zip(0_i32..)
                    .map(|(angle, i)| [400.0 + 20.0 * f64::from(i), 400.0, *angle])
                    .collect();
                let rows: Vec<&[f64]> = rows.iter().map(|r| &r[..]).collect();
                Channel::samples(3, &rows)
            } else if name.ends_with("_vel") {
                let speed = trial.command.as_ref().map_or(0.0, |cmd| {
                    cmd.max_speeds.iter().copied().fold(0.0, f64::max)
                });
                Channel::samples(2, &[&[0.0, 0.0], &[speed, 0.0]])
            } else {
                Channel::samples(1, &[&[0.0]])
            };
            readings.insert(name.clone(), channel);
        }
        readings
    })
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Everything the fake received.
#[derive(Debug, Clone, Default)]
pub struct FakeLog {
    pub launched_ports: Vec<u16>,
    pub requests: Vec<MessageKind>,
    /// `(step_freq, step_iter, iter_vel, iter_pos, self_collisions)`.
    pub header: Option<(f64, i32, i32, i32, i32)>,
    pub conf: Option<DecodedConf>,
    pub channels: Vec<String>,
    /// Initial poses received with each Reset.
    pub resets: Vec<Vec<f64>>,
    /// Whether each Reset echoed the configured vector.
    pub reset_echoes: Vec<bool>,
    pub commands: Vec<MotorCommand>,
    pub steps: Vec<i32>,
    pub bye: Option<String>,
    pub terminated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeLogHandle(Arc<Mutex<FakeLog>>);

impl FakeLogHandle {
    fn lock(&self) -> MutexGuard<'_, FakeLog> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> FakeLog {
        self.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Launcher / handle
// ---------------------------------------------------------------------------

pub struct FakeLauncher {
    script: FakeScript,
    log: FakeLogHandle,
}

impl FakeLauncher {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            log: FakeLogHandle::default(),
        }
    }

    /// Handle to the request log, shared with every simulator this launches.
    pub fn log(&self) -> FakeLogHandle {
        self.log.clone()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new(FakeScript::default())
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, port: u16) -> Result<Box<dyn SimHandle>, LaunchError> {
        self.log.lock().launched_ports.push(port);
        let stop = Arc::new(AtomicBool::new(false));
        if self.script.fault == Some(Fault::NeverListen) {
            return Ok(Box::new(FakeHandle {
                stop,
                log: self.log.clone(),
            }));
        }

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .and_then(|l| l.set_nonblocking(true).map(|()| l))
            .map_err(|e| LaunchError::Other(format!("fake simulator cannot bind {port}: {e}")))?;
        let server = FakeServer {
            script: self.script.clone(),
            log: self.log.clone(),
            trial: Trial::default(),
            conf: Vec::new(),
        };
        let flag = Arc::clone(&stop);
        thread::spawn(move || {
            if let Some(stream) = accept(&listener, &flag) {
                server.serve(stream);
            }
        });
        Ok(Box::new(FakeHandle {
            stop,
            log: self.log.clone(),
        }))
    }
}

struct FakeHandle {
    stop: Arc<AtomicBool>,
    log: FakeLogHandle,
}

impl SimHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.log.lock().terminated = true;
        Ok(())
    }
}

fn accept(listener: &TcpListener, stop: &AtomicBool) -> Option<TcpStream> {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false).ok()?;
                return Some(stream);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(_) => return None,
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

struct FakeServer {
    script: FakeScript,
    log: FakeLogHandle,
    trial: Trial,
    conf: Vec<Value>,
}

enum Reply {
    Send(Message),
    SendAndClose(Message),
    Hangup,
}

impl FakeServer {
    fn serve(mut self, mut stream: TcpStream) {
        loop {
            let request = match read_frame(&mut stream) {
                Ok(Some(msg)) => msg,
                Ok(None) | Err(_) => return,
            };
            debug!(kind = %request.kind, "fake simulator request");
            self.log.lock().requests.push(request.kind);

            let reply = match self.fault_for(request.kind) {
                Some(reply) => reply,
                None => match self.handle(&request) {
                    Ok(reply) => reply,
                    Err(e) => Reply::Send(Message::text(MessageKind::Error, &e.to_string())),
                },
            };
            match reply {
                Reply::Send(msg) => {
                    if write_frame(&mut stream, &msg).is_err() {
                        return;
                    }
                }
                Reply::SendAndClose(msg) => {
                    let _ = write_frame(&mut stream, &msg);
                    return;
                }
                Reply::Hangup => return,
            }
        }
    }

    fn fault_for(&self, kind: MessageKind) -> Option<Reply> {
        match self.script.fault.as_ref()? {
            Fault::RemoteError { on, message } if *on == kind => {
                Some(Reply::Send(Message::text(MessageKind::Error, message)))
            }
            Fault::Hangup { on } if *on == kind => Some(Reply::Hangup),
            Fault::WrongKind { on, reply } if *on == kind => {
                Some(Reply::Send(Message::empty(*reply)))
            }
            _ => None,
        }
    }

    fn handle(&mut self, request: &Message) -> Result<Reply, ProtocolError> {
        let mut r = request.reader();
        let reply = match request.kind {
            MessageKind::Hello => Message::empty(MessageKind::Hello),
            MessageKind::Configure => {
                let header = (
                    r.read_double()?,
                    r.read_int()?,
                    r.read_int()?,
                    r.read_int()?,
                    r.read_int()?,
                );
                let conf = read_conf(&mut r, self.script.layout)?;
                let decoded = conf_vector::decode(&conf, self.script.layout)?;
                let count = r.read_count()?;
                let channels = (0..count)
                    .map(|_| r.read_string())
                    .collect::<Result<Vec<_>, _>>()?;
                r.finish()?;

                let mut log = self.log.lock();
                log.header = Some(header);
                log.conf = Some(decoded);
                log.channels.clone_from(&channels);
                drop(log);

                self.trial.channels = channels;
                self.conf = conf;
                Message::values(
                    MessageKind::Configure,
                    &self.script.workspace.map(Value::Double),
                )
            }
            MessageKind::Reset => {
                let n = r.read_count()?;
                let pose = r.read_doubles(n)?;
                let echo = read_conf(&mut r, self.script.layout)?;
                r.finish()?;

                let mut log = self.log.lock();
                log.resets.push(pose.clone());
                log.reset_echoes.push(echo == self.conf);
                drop(log);

                self.trial.init_pose = pose;
                self.trial.command = None;
                self.sensor_message()?
            }
            MessageKind::Order => {
                let len = r.read_count()?;
                if len % 3 != 0 {
                    return Err(ProtocolError::malformed(format!(
                        "order of {len} doubles is not three per joint"
                    )));
                }
                let flat = r.read_doubles(len)?;
                r.finish()?;
                let n = len / 3;
                let command = MotorCommand::new(
                    flat[..n].to_vec(),
                    flat[n..2 * n].to_vec(),
                    flat[2 * n..].to_vec(),
                )
                .map_err(|e| ProtocolError::malformed(e.to_string()))?;
                self.log.lock().commands.push(command.clone());
                self.trial.command = Some(command);
                Message::empty(MessageKind::Order)
            }
            MessageKind::Step => {
                let steps = r.read_int()?;
                r.finish()?;
                self.log.lock().steps.push(steps);
                self.trial.steps = steps;
                if !self.script.step_delay.is_zero() {
                    thread::sleep(self.script.step_delay);
                }
                Message::empty(MessageKind::Step)
            }
            MessageKind::Sensor => self.sensor_message()?,
            MessageKind::Bye => {
                let text = request.read_text().unwrap_or_default();
                self.log.lock().bye = Some(text);
                return Ok(Reply::SendAndClose(Message::empty(MessageKind::Bye)));
            }
            other => {
                return Err(ProtocolError::malformed(format!("unsupported request {other}")));
            }
        };
        Ok(Reply::Send(reply))
    }

    fn sensor_message(&self) -> Result<Message, ProtocolError> {
        let readings = (self.script.responder)(&self.trial);
        Ok(Message::new(MessageKind::Sensor, encode_readings(&readings)?))
    }
}

/// Read a configuration vector off the wire. The type of each field follows
/// from the layout, which the bytes alone do not carry.
fn read_conf(r: &mut PayloadReader<'_>, layout: ConfLayout) -> Result<Vec<Value>, ProtocolError> {
    let mut out = Vec::new();
    let arm = r.read_int()?;
    out.push(Value::Int(arm));
    for _ in 0..arm.max(0) {
        out.push(Value::Double(r.read_double()?));
    }
    out.push(Value::Double(r.read_double()?));
    out.push(Value::Int(r.read_int()?));
    out.push(Value::Int(r.read_int()?));
    let toys = r.read_int()?;
    out.push(Value::Int(toys));
    for _ in 0..toys.max(0) {
        for _ in 0..3 {
            out.push(Value::Int(r.read_int()?));
        }
        for _ in 3..layout.fields_per_toy() {
            out.push(Value::Double(r.read_double()?));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn connect(port: u16) -> TcpStream {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match TcpStream::connect((Ipv4Addr::LOCALHOST, port)) {
                Ok(s) => return s,
                Err(e) if Instant::now() > deadline => panic!("fake never listened: {e}"),
                Err(_) => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    fn free_port() -> u16 {
        TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn roundtrip(stream: &mut TcpStream, msg: &Message) -> Message {
        write_frame(stream, msg).unwrap();
        read_frame(stream).unwrap().unwrap()
    }

    #[test]
    fn answers_hello_and_bye() {
        let launcher = FakeLauncher::default();
        let log = launcher.log();
        let port = free_port();
        let mut handle = launcher.launch(port).unwrap();

        let mut stream = connect(port);
        let hello = roundtrip(&mut stream, &Message::empty(MessageKind::Hello));
        assert_eq!(hello.kind, MessageKind::Hello);
        let bye = roundtrip(&mut stream, &Message::text(MessageKind::Bye, "bye"));
        assert_eq!(bye.kind, MessageKind::Bye);

        handle.terminate().unwrap();
        let log = log.snapshot();
        assert_eq!(log.requests, [MessageKind::Hello, MessageKind::Bye]);
        assert_eq!(log.bye.as_deref(), Some("bye"));
        assert!(log.terminated);
    }

    #[test]
    fn remote_error_fault() {
        let launcher = FakeLauncher::new(FakeScript::default().with_fault(Fault::RemoteError {
            on: MessageKind::Hello,
            message: "busy".into(),
        }));
        let port = free_port();
        let _handle = launcher.launch(port).unwrap();
        let mut stream = connect(port);
        let reply = roundtrip(&mut stream, &Message::empty(MessageKind::Hello));
        assert_eq!(reply.kind, MessageKind::Error);
        assert_eq!(reply.read_text().unwrap(), "busy");
    }

    #[test]
    fn order_count_is_number_of_doubles() {
        let launcher = FakeLauncher::default();
        let log = launcher.log();
        let port = free_port();
        let _handle = launcher.launch(port).unwrap();
        let mut stream = connect(port);

        let mut w = PayloadWriter::new();
        w.put_count(6)
            .unwrap()
            .put_doubles(&[0.1, 0.2, 1.0, 1.1, 0.5, 0.6]);
        let ack = roundtrip(&mut stream, &w.finish(MessageKind::Order));
        assert_eq!(ack.kind, MessageKind::Order);
        let command = &log.snapshot().commands[0];
        assert_eq!(command.start_pose, vec![0.1, 0.2]);
        assert_eq!(command.end_pose, vec![1.0, 1.1]);
        assert_eq!(command.max_speeds, vec![0.5, 0.6]);

        // A joint count is not a valid length.
        w.put_count(2).unwrap().put_doubles(&[0.0; 6]);
        let reply = roundtrip(&mut stream, &w.finish(MessageKind::Order));
        assert_eq!(reply.kind, MessageKind::Error);
        assert_eq!(log.snapshot().commands.len(), 1);
    }

    #[test]
    fn default_responder_moves_positions() {
        let responder = default_responder();
        let mut trial = Trial {
            channels: vec!["ball1_pos".into(), COLLISIONS_CHANNEL.into()],
            ..Trial::default()
        };
        let pre = responder(&trial);
        assert_eq!(pre.points("ball1_pos").unwrap().len(), 1);

        trial.command = Some(MotorCommand::new(vec![0.0], vec![1.0], vec![1.0]).unwrap());
        let post = responder(&trial);
        let pts = post.points("ball1_pos").unwrap();
        assert_eq!(pts.len(), 2);
        assert!(pts[1].x > pts[0].x);
        assert!(post.collisions().unwrap().is_empty());
    }

    #[test]
    fn default_responder_reports_joint_snapshot() {
        let responder = default_responder();
        let mut trial = Trial {
            channels: vec![JOINTS_CHANNEL.into()],
            init_pose: vec![0.1, 0.2],
            ..Trial::default()
        };
        let pre = responder(&trial);
        let rows = pre.rows(JOINTS_CHANNEL, 3).unwrap();
        assert_eq!(rows, vec![&[400.0, 400.0, 0.1][..], &[420.0, 400.0, 0.2][..]]);

        let command = MotorCommand::new(vec![0.1, 0.2], vec![-1.0, 1.0], vec![1.0; 2]).unwrap();
        trial.command = Some(command);
        let post = responder(&trial);
        let rows = post.rows(JOINTS_CHANNEL, 3).unwrap();
        let angles: Vec<f64> = rows.iter().map(|r| r[2]).collect();
        assert_eq!(angles, [-1.0, 1.0]);
    }
}
