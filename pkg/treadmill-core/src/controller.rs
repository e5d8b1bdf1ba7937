//! The upload/run protocol state machine that sits on top of
//! [`crate::serial::link::SerialLink`].
//!
//! [`TreadmillController`] walks the device through
//! `Idle -> Syncing -> Uploading -> Finalizing -> Starting -> Running`,
//! then hands the link's read half to a background listener for the
//! duration of the run so telemetry and an eventual completion frame are
//! never missed, while a second background task pings `HEARTBEAT` on a
//! fixed interval so the device's watchdog doesn't trip.

use crate::errors::{ControllerError, LinkError};
use crate::protocol::{self, tokens, TelemetryFrame};
use crate::serial::link::SerialLink;
use std::{
	path::Path,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc, Mutex as StdMutex,
	},
	time::Duration,
};
use tokio::{
	sync::{
		mpsc::{self, UnboundedReceiver},
		Mutex as AsyncMutex,
	},
	task::{Builder as TaskBuilder, JoinHandle},
};
use tracing::{debug, warn};

/// Called with every status-level message the controller produces,
/// including the synthetic `"FINISHED"` message emitted exactly once when a
/// run completes on its own.
pub type StatusSink = dyn Fn(&str) + Send + Sync;
/// Called with every successfully decoded telemetry frame during a run.
pub type TelemetrySink = dyn Fn(TelemetryFrame) + Send + Sync;

/// Drives a treadmill's microcontroller through its upload/run protocol.
pub struct TreadmillController {
	link: Arc<SerialLink>,
	status_sink: Arc<StdMutex<Option<Box<StatusSink>>>>,
	telemetry_sink: Arc<StdMutex<Option<Box<TelemetrySink>>>>,
	session_active: Arc<AtomicBool>,
	heartbeat_active: Arc<AtomicBool>,
	decode_task: AsyncMutex<Option<JoinHandle<()>>>,
	heartbeat_task: AsyncMutex<Option<JoinHandle<()>>>,
	telemetry_decode_errors: Arc<AtomicU64>,
}

impl TreadmillController {
	/// Open the serial link to `port_name` at `baud_rate` and build a
	/// controller around it. Does not send anything on the wire; call
	/// [`Self::run`] to begin the upload/run protocol.
	///
	/// ## Errors
	///
	/// If the underlying serial port cannot be opened.
	pub async fn initialize(
		port_name: impl AsRef<Path>,
		baud_rate: u32,
		read_timeout: Duration,
	) -> Result<Self, ControllerError> {
		let link = SerialLink::open(port_name, baud_rate, read_timeout).await?;
		Ok(Self {
			link: Arc::new(link),
			status_sink: Arc::new(StdMutex::new(None)),
			telemetry_sink: Arc::new(StdMutex::new(None)),
			session_active: Arc::new(AtomicBool::new(false)),
			heartbeat_active: Arc::new(AtomicBool::new(false)),
			decode_task: AsyncMutex::new(None),
			heartbeat_task: AsyncMutex::new(None),
			telemetry_decode_errors: Arc::new(AtomicU64::new(0)),
		})
	}

	/// Like [`Self::initialize`], using the protocol's default baud rate
	/// and read timeout.
	///
	/// ## Errors
	///
	/// See [`Self::initialize`].
	pub async fn initialize_default(port_name: impl AsRef<Path>) -> Result<Self, ControllerError> {
		Self::initialize(
			port_name,
			protocol::DEFAULT_BAUD_RATE,
			Duration::from_millis(protocol::DEFAULT_READ_TIMEOUT_MS),
		)
		.await
	}

	/// Register the callback that receives status messages.
	pub fn set_status_sink<F>(&self, sink: F)
	where
		F: Fn(&str) + Send + Sync + 'static,
	{
		*self.status_sink.lock().unwrap() = Some(Box::new(sink));
	}

	/// Register the callback that receives decoded telemetry frames.
	pub fn set_telemetry_sink<F>(&self, sink: F)
	where
		F: Fn(TelemetryFrame) + Send + Sync + 'static,
	{
		*self.telemetry_sink.lock().unwrap() = Some(Box::new(sink));
	}

	/// Whether the underlying link currently holds an open port.
	pub async fn is_connected(&self) -> bool {
		self.link.is_open().await
	}

	/// Whether a run session is currently active.
	pub fn is_running(&self) -> bool {
		self.session_active.load(Ordering::SeqCst)
	}

	/// Whether the heartbeat task is currently active.
	pub fn is_heartbeat_active(&self) -> bool {
		self.heartbeat_active.load(Ordering::SeqCst)
	}

	/// How many telemetry lines failed to decode since this controller was
	/// created. Decode failures are non-fatal and never end a run; this
	/// counter is the caller's only visibility into them besides logs.
	pub fn telemetry_decode_error_count(&self) -> u64 {
		self.telemetry_decode_errors.load(Ordering::Relaxed)
	}

	/// Direct access to the underlying link, for advanced use.
	pub fn link(&self) -> &SerialLink {
		&self.link
	}

	/// Upload `speed_commands` and start executing them.
	///
	/// Drives `Idle -> Syncing -> Uploading -> Finalizing -> Starting ->
	/// Running`. On success, a background listener and heartbeat task are
	/// left running; the run ends either via [`Self::stop`] or on its own
	/// once the device reports `profile_active=false`, at which point the
	/// status sink receives a one-time `"FINISHED"` message.
	///
	/// ## Errors
	///
	/// [`ControllerError::Preconditions`] if the link isn't open or
	/// `speed_commands` is empty; [`ControllerError::AlreadyRunning`] if a
	/// session is already active; [`ControllerError::ProtocolError`] or
	/// [`ControllerError::Timeout`] if the device doesn't respond as the
	/// protocol expects at any phase.
	pub async fn run(&self, speed_commands: &[String]) -> Result<(), ControllerError> {
		if !self.is_connected().await {
			return Err(ControllerError::Preconditions(
				"treadmill not connected; commands not sent",
			));
		}
		if speed_commands.is_empty() {
			return Err(ControllerError::Preconditions(
				"no speed commands provided",
			));
		}
		if self.session_active.load(Ordering::SeqCst) {
			return Err(ControllerError::AlreadyRunning);
		}

		if let Err(cause) = self.initiate_protocol().await {
			self.update_status(&format!("ERROR: {cause}"));
			return Err(cause);
		}
		if let Err(cause) = self.upload_commands(speed_commands).await {
			self.update_status(&format!("ERROR: {cause}"));
			return Err(cause);
		}
		if let Err(cause) = self.finalize_upload().await {
			self.update_status(&format!("ERROR: {cause}"));
			return Err(cause);
		}
		if let Err(cause) = self.start_execution().await {
			self.update_status(&format!("ERROR: {cause}"));
			return Err(cause);
		}

		// Mark the session active before the listener starts, so a telemetry
		// frame that arrives the instant the listener comes up is never
		// missed.
		self.session_active.store(true, Ordering::SeqCst);

		let (tx, rx) = mpsc::unbounded_channel();
		self.link.start_listener(tx).await?;
		self.spawn_decode_task(rx).await;
		self.start_heartbeat().await;

		Ok(())
	}

	/// Explicitly stop a running session.
	///
	/// ## Errors
	///
	/// [`ControllerError::Preconditions`] if the link isn't open;
	/// [`ControllerError::NotRunning`] if no session is active;
	/// [`ControllerError::ProtocolError`] or [`ControllerError::Timeout`]
	/// if the device doesn't confirm the stop.
	pub async fn stop(&self) -> Result<(), ControllerError> {
		if !self.is_connected().await {
			return Err(ControllerError::Preconditions(
				"treadmill not connected; cannot send stop command",
			));
		}
		// Mark the session inactive immediately, before the listener stops,
		// so a telemetry frame racing this call can never trigger the
		// completion path after we've already decided to stop explicitly.
		if !self.session_active.swap(false, Ordering::SeqCst) {
			return Err(ControllerError::NotRunning);
		}

		self.link.stop_listener().await?;
		self.join_decode_task().await;

		self.update_status("Stopping treadmill...");
		self.link.write_line(tokens::STOP_TM).await?;
		self.expect_line("stop", tokens::STOPPED).await?;

		self.stop_heartbeat().await;
		self.update_status("Treadmill stopped successfully");
		Ok(())
	}

	/// Stop the heartbeat and close the link.
	///
	/// ## Errors
	///
	/// If the underlying link fails to close.
	pub async fn disconnect(&self) -> Result<(), ControllerError> {
		self.stop_heartbeat().await;
		self.session_active.store(false, Ordering::SeqCst);
		// Closing the link stops the listener first, which drops the decode
		// task's channel sender and lets `rx.recv()` return `None`. Joining
		// the decode task before this would deadlock waiting on a sender
		// that's still held by a listener task we haven't asked to stop yet.
		let close_result = self.link.close().await;
		self.join_decode_task().await;
		close_result.map_err(ControllerError::Link)
	}

	/// Stop the heartbeat and reopen the link at the same port and baud
	/// rate it was originally opened with.
	///
	/// ## Errors
	///
	/// If the underlying link fails to reopen.
	pub async fn reconnect(&self) -> Result<(), ControllerError> {
		self.stop_heartbeat().await;
		self.session_active.store(false, Ordering::SeqCst);
		// Same ordering concern as `disconnect`: `reopen` closes (and so
		// stops the listener) before reopening, which is what lets the
		// decode task's `rx.recv()` observe the sender drop and return.
		let reopen_result = self.link.reopen().await;
		self.join_decode_task().await;
		reopen_result.map_err(ControllerError::Link)
	}

	// --- protocol phases ---------------------------------------------

	async fn initiate_protocol(&self) -> Result<(), ControllerError> {
		self.update_status("Initiating communication with treadmill...");

		// Force IDLE and drain whatever garbage (previous run state,
		// `INFO,ARDUINO_READY` banners) is sitting in the input buffer.
		self.link.write_line(tokens::STOP_TM).await?;
		for _ in 0..protocol::SYNC_DISCARD_ATTEMPTS {
			match self.read_line_tolerating_timeout().await? {
				Some(line) if line == tokens::STOPPED => break,
				Some(line) => debug!(line, "discarding stale data while synchronizing"),
				None => {}
			}
		}

		self.link.write_line(tokens::START_READ).await?;
		self.expect_line("initiate_protocol", tokens::READY).await?;
		self.update_status("Treadmill ready - sending commands...");
		Ok(())
	}

	async fn upload_commands(&self, commands: &[String]) -> Result<(), ControllerError> {
		for (index, command) in commands.iter().enumerate() {
			self.link.write_line(command).await?;
			self.update_status(&format!(
				"Command {}/{} sent",
				index + 1,
				commands.len()
			));
			self.expect_line("upload_commands", tokens::READY).await?;
		}
		Ok(())
	}

	async fn finalize_upload(&self) -> Result<(), ControllerError> {
		self.link.write_line(tokens::END_READ).await?;
		self.expect_line("finalize_upload", tokens::ACK).await
	}

	async fn start_execution(&self) -> Result<(), ControllerError> {
		self.update_status("All commands sent - starting treadmill...");
		self.link.write_line(tokens::RUN_TM).await?;
		self.expect_line("start_execution", tokens::RUNNING).await?;
		self.update_status("Treadmill running successfully");
		Ok(())
	}

	/// Read one line, treating a timeout the same as the device simply
	/// having nothing to say yet rather than a hard failure.
	async fn read_line_tolerating_timeout(&self) -> Result<Option<String>, ControllerError> {
		match self.link.read_line_default().await {
			Ok(line) => Ok(line),
			Err(LinkError::IoError(cause)) if cause.kind() == std::io::ErrorKind::TimedOut => Ok(None),
			Err(other) => Err(ControllerError::Link(other)),
		}
	}

	/// Wait for `expected`, silently discarding any `TEL,`/`INFO,` lines that
	/// arrive in the meantime: telemetry must never satisfy a protocol wait,
	/// and a stray frame must never fail one either.
	async fn expect_line(
		&self,
		phase: &'static str,
		expected: &'static str,
	) -> Result<(), ControllerError> {
		loop {
			match self.read_line_tolerating_timeout().await? {
				Some(line) if TelemetryFrame::looks_like_telemetry(&line) || protocol::looks_like_info(&line) => {
					debug!(phase, line, "discarding telemetry/info line while waiting for a protocol response");
				}
				Some(line) if line == expected => return Ok(()),
				Some(got) => {
					return Err(ControllerError::ProtocolError {
						phase,
						expected,
						got,
					})
				}
				None => return Err(ControllerError::Timeout { phase, expected }),
			}
		}
	}

	fn update_status(&self, message: &str) {
		if let Some(sink) = self.status_sink.lock().unwrap().as_ref() {
			sink(message);
		}
	}

	// --- telemetry listener --------------------------------------------

	async fn spawn_decode_task(&self, mut rx: UnboundedReceiver<String>) {
		let telemetry_sink = Arc::clone(&self.telemetry_sink);
		let status_sink = Arc::clone(&self.status_sink);
		let session_active = Arc::clone(&self.session_active);
		let heartbeat_active = Arc::clone(&self.heartbeat_active);
		let decode_errors = Arc::clone(&self.telemetry_decode_errors);

		let handle = TaskBuilder::new()
			.name("treadmill::controller::telemetry_decode")
			.spawn(async move {
				while let Some(line) = rx.recv().await {
					if protocol::looks_like_info(&line) {
						debug!(line, "ignoring informational line from device");
						continue;
					}
					if !TelemetryFrame::looks_like_telemetry(&line) {
						debug!(line, "ignoring unexpected non-telemetry line while running");
						continue;
					}

					match TelemetryFrame::decode(&line) {
						Ok(frame) => {
							if !frame.profile_active && try_complete_session(&session_active) {
								heartbeat_active.store(false, Ordering::SeqCst);
								let sink = status_sink.lock().unwrap();
								if let Some(sink) = sink.as_ref() {
									sink("Run completed successfully.");
									sink("FINISHED");
								}
							}

							if let Some(sink) = telemetry_sink.lock().unwrap().as_ref() {
								sink(frame);
							}
						}
						Err(cause) => {
							decode_errors.fetch_add(1, Ordering::Relaxed);
							warn!(?cause, line, "failed to decode telemetry frame");
						}
					}
				}
			})
			.expect("failed to spawn telemetry decode task");

		*self.decode_task.lock().await = Some(handle);
	}

	async fn join_decode_task(&self) {
		if let Some(handle) = self.decode_task.lock().await.take() {
			if let Err(cause) = handle.await {
				warn!(?cause, "telemetry decode task did not shut down cleanly");
			}
		}
	}

	// --- heartbeat -------------------------------------------------------

	async fn start_heartbeat(&self) {
		if !self.is_connected().await {
			warn!("cannot start heartbeat: treadmill not connected");
			return;
		}

		self.heartbeat_active.store(true, Ordering::SeqCst);

		let link = Arc::clone(&self.link);
		let heartbeat_active = Arc::clone(&self.heartbeat_active);
		let handle = TaskBuilder::new()
			.name("treadmill::controller::heartbeat")
			.spawn(async move {
				let mut ticker = tokio::time::interval(Duration::from_millis(
					protocol::HEARTBEAT_PERIOD_MS,
				));
				// `interval` fires immediately on the first tick; skip it so the
				// first beat goes out a full period after the run starts.
				ticker.tick().await;
				loop {
					ticker.tick().await;
					if !heartbeat_active.load(Ordering::SeqCst) {
						break;
					}
					if let Err(cause) = link.write_line(tokens::HEARTBEAT).await {
						warn!(?cause, "error sending heartbeat");
						heartbeat_active.store(false, Ordering::SeqCst);
						break;
					}
				}
			})
			.expect("failed to spawn heartbeat task");

		*self.heartbeat_task.lock().await = Some(handle);
		debug!(period_ms = protocol::HEARTBEAT_PERIOD_MS, "heartbeat started");
	}

	async fn stop_heartbeat(&self) {
		if self.heartbeat_active.swap(false, Ordering::SeqCst) {
			if let Some(handle) = self.heartbeat_task.lock().await.take() {
				handle.abort();
			}
			debug!("heartbeat stopped");
		}
	}
}

/// Atomically transition a run session from active to finished, returning
/// whether *this* call is the one that won the race.
///
/// Exactly one caller observes `true` even if multiple consecutive
/// `profile_active=false` telemetry frames arrive back to back, which keeps
/// the `"FINISHED"` status message a one-time event per run.
fn try_complete_session(session_active: &AtomicBool) -> bool {
	session_active
		.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
		.is_ok()
}

#[cfg(test)]
mod unit_tests {
	use super::*;

	#[test]
	fn try_complete_session_wins_exactly_once() {
		let session_active = AtomicBool::new(true);
		assert!(try_complete_session(&session_active));
		assert!(!try_complete_session(&session_active));
		assert!(!session_active.load(Ordering::SeqCst));
	}

	#[test]
	fn try_complete_session_is_a_no_op_when_not_running() {
		let session_active = AtomicBool::new(false);
		assert!(!try_complete_session(&session_active));
	}
}
