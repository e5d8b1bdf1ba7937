//! A line-oriented wrapper around [`super::AsyncSerialPort`].
//!
//! [`SerialLink`] owns the open/close lifecycle of the underlying serial
//! port and arbitrates between two mutually exclusive ways of consuming
//! incoming bytes: synchronous, timeout-bounded [`SerialLink::read_line`]
//! calls (used while driving the upload/run handshake), and a background
//! listener task that forwards every line it reads to a channel (used once
//! a run is underway and telemetry/status lines can arrive at any time).
//!
//! The listener is spawned with [`tokio::task::Builder`] onto the same
//! runtime the caller is already driving, the same way
//! `bridgectl`'s serial log watcher does it: there is no separate I/O
//! thread, the task simply waits on the next line or a stop signal via
//! `tokio::select!`.

use crate::errors::LinkError;
use pin_project_lite::pin_project;
use std::{
	future::Future,
	path::{Path, PathBuf},
	pin::Pin,
	string::FromUtf8Error,
	task::{Context, Poll},
	time::Duration,
};
use tokio::{
	io::{AsyncBufRead, AsyncWriteExt, BufReader},
	sync::{mpsc::UnboundedSender, oneshot, Mutex},
	task::{Builder as TaskBuilder, JoinHandle},
	time::timeout,
};
use tracing::{debug, warn};

use super::AsyncSerialPort;

macro_rules! ready {
	($e:expr $(,)?) => {
		match $e {
			std::task::Poll::Ready(t) => t,
			std::task::Poll::Pending => return std::task::Poll::Pending,
		}
	};
}

/// What the read half of the link is currently doing.
enum ReadMode {
	/// Nothing is reading right now; the reader is parked here between
	/// calls to [`SerialLink::read_line`].
	Idle(SerialLines<BufReader<AsyncSerialPort>>),
	/// A background task owns the reader; [`SerialLink::read_line`] must
	/// refuse to run until the listener is stopped.
	Listening {
		handle: JoinHandle<SerialLines<BufReader<AsyncSerialPort>>>,
		stop: oneshot::Sender<()>,
	},
	/// The link is closed; there is nothing to read from.
	Closed,
}

/// A line-oriented serial transport.
///
/// Construct with [`SerialLink::open`]. Cloning the port handle lets reads
/// and writes proceed concurrently: the write half is a plain
/// [`AsyncSerialPort`] clone behind a mutex, the read half is owned
/// exclusively by whichever of [`SerialLink::read_line`] or
/// [`SerialLink::start_listener`] is currently active.
pub struct SerialLink {
	port_path: PathBuf,
	baud_rate: u32,
	default_read_timeout: Duration,
	writer: Mutex<Option<AsyncSerialPort>>,
	reader: Mutex<ReadMode>,
}

impl SerialLink {
	/// List the serial ports visible on this machine.
	///
	/// ## Errors
	///
	/// If your platform is unsupported, or an OS error occurs.
	pub fn available_ports() -> std::io::Result<Vec<PathBuf>> {
		AsyncSerialPort::available_ports()
	}

	/// Open and configure the serial port at `port_path`, 8-N-1, no flow
	/// control, at `baud_rate`.
	///
	/// ## Errors
	///
	/// If the OS refuses to open or configure the device, or we can't
	/// clone the resulting handle for the write half.
	pub async fn open(
		port_path: impl AsRef<Path>,
		baud_rate: u32,
		default_read_timeout: Duration,
	) -> Result<Self, LinkError> {
		let port_path = port_path.as_ref().to_path_buf();
		let read_port =
			AsyncSerialPort::new(&port_path, baud_rate).map_err(|source| LinkError::LinkOpenError {
				port: port_path.display().to_string(),
				baud_rate,
				source,
			})?;
		let write_port = read_port
			.try_clone()
			.map_err(|source| LinkError::LinkOpenError {
				port: port_path.display().to_string(),
				baud_rate,
				source,
			})?;

		Ok(Self {
			port_path,
			baud_rate,
			default_read_timeout,
			writer: Mutex::new(Some(write_port)),
			reader: Mutex::new(ReadMode::Idle(SerialLines::new(BufReader::new(read_port)))),
		})
	}

	/// The path or device name this link was opened against.
	#[must_use]
	pub fn port_path(&self) -> &Path {
		&self.port_path
	}

	/// The baud rate this link was opened at.
	#[must_use]
	pub const fn baud_rate(&self) -> u32 {
		self.baud_rate
	}

	/// Whether the link currently holds an open port.
	pub async fn is_open(&self) -> bool {
		!matches!(*self.reader.lock().await, ReadMode::Closed) && self.writer.lock().await.is_some()
	}

	/// Close the link. Stops any active listener first.
	///
	/// ## Errors
	///
	/// If stopping an active listener task fails to join.
	pub async fn close(&self) -> Result<(), LinkError> {
		self.stop_listener().await?;
		*self.writer.lock().await = None;
		*self.reader.lock().await = ReadMode::Closed;
		Ok(())
	}

	/// Close (if necessary) and reopen the link at the same path and baud
	/// rate it was originally opened with.
	///
	/// ## Errors
	///
	/// If the underlying port cannot be reopened.
	pub async fn reopen(&self) -> Result<(), LinkError> {
		self.close().await?;

		let read_port = AsyncSerialPort::new(&self.port_path, self.baud_rate).map_err(|source| {
			LinkError::LinkOpenError {
				port: self.port_path.display().to_string(),
				baud_rate: self.baud_rate,
				source,
			}
		})?;
		let write_port = read_port
			.try_clone()
			.map_err(|source| LinkError::LinkOpenError {
				port: self.port_path.display().to_string(),
				baud_rate: self.baud_rate,
				source,
			})?;

		*self.writer.lock().await = Some(write_port);
		*self.reader.lock().await = ReadMode::Idle(SerialLines::new(BufReader::new(read_port)));
		Ok(())
	}

	/// Write a single line, appending the `\n` terminator the device
	/// expects.
	///
	/// ## Errors
	///
	/// If the link is closed, or the underlying write fails.
	pub async fn write_line(&self, line: &str) -> Result<(), LinkError> {
		let mut guard = self.writer.lock().await;
		let port = guard.as_mut().ok_or(LinkError::NotConnected)?;
		let mut framed = Vec::with_capacity(line.len() + 1);
		framed.extend_from_slice(line.as_bytes());
		framed.push(b'\n');
		port.write_all(&framed).await.map_err(LinkError::IoError)
	}

	/// Read a single line, waiting at most `timeout` for it to arrive.
	///
	/// Returns `Ok(None)` if the port reached EOF (the device went away)
	/// without a timeout ever tripping.
	///
	/// ## Errors
	///
	/// [`LinkError::InvalidState`] if a listener is currently active (stop
	/// it first with [`Self::stop_listener`]); [`LinkError::NotConnected`]
	/// if the link is closed; [`LinkError::IoError`] on a timeout or other
	/// transport failure.
	pub async fn read_line(&self, read_timeout: Duration) -> Result<Option<String>, LinkError> {
		let mut guard = self.reader.lock().await;
		match &mut *guard {
			ReadMode::Closed => Err(LinkError::NotConnected),
			ReadMode::Listening { .. } => Err(LinkError::InvalidState(
				"cannot call read_line while a listener is active",
			)),
			ReadMode::Idle(lines) => match timeout(read_timeout, lines.next_line()).await {
				Ok(Ok(line)) => Ok(line),
				Ok(Err(source)) => Err(LinkError::IoError(source)),
				Err(_elapsed) => Err(LinkError::IoError(std::io::Error::new(
					std::io::ErrorKind::TimedOut,
					"timed out waiting for a line from the serial link",
				))),
			},
		}
	}

	/// Read a single line using this link's configured default timeout.
	///
	/// ## Errors
	///
	/// See [`Self::read_line`].
	pub async fn read_line_default(&self) -> Result<Option<String>, LinkError> {
		self.read_line(self.default_read_timeout).await
	}

	/// Hand the read half over to a background task that forwards every
	/// line it reads to `sink`, until [`Self::stop_listener`] is called or
	/// the port reaches EOF.
	///
	/// This is the task [`crate::controller::TreadmillController`] keeps
	/// running for the duration of a run session, so that telemetry and
	/// late status lines are never missed while the caller is doing other
	/// work.
	///
	/// ## Errors
	///
	/// [`LinkError::InvalidState`] if a listener is already active;
	/// [`LinkError::NotConnected`] if the link is closed.
	pub async fn start_listener(&self, sink: UnboundedSender<String>) -> Result<(), LinkError> {
		let mut guard = self.reader.lock().await;
		let lines = match std::mem::replace(&mut *guard, ReadMode::Closed) {
			ReadMode::Idle(lines) => lines,
			ReadMode::Listening { .. } => {
				return Err(LinkError::InvalidState(
					"a listener is already active on this link",
				));
			}
			ReadMode::Closed => return Err(LinkError::NotConnected),
		};

		let (stop_tx, mut stop_rx) = oneshot::channel();
		let handle = TaskBuilder::new()
			.name("treadmill::serial_link::listener")
			.spawn(async move {
				let mut lines = lines;
				loop {
					tokio::select! {
						res = lines.next_line() => {
							match res {
								Ok(Some(line)) => {
									if sink.send(line).is_err() {
										debug!("listener sink dropped, shutting down");
										break;
									}
								}
								Ok(None) => {
									debug!("serial link reached EOF, shutting down listener");
									break;
								}
								Err(cause) => {
									warn!(?cause, "serial link read error, shutting down listener");
									break;
								}
							}
						}
						_ = &mut stop_rx => {
							debug!("listener received stop signal");
							break;
						}
					}
				}
				lines
			})
			.expect("failed to spawn serial link listener task");

		*guard = ReadMode::Listening {
			handle,
			stop: stop_tx,
		};
		Ok(())
	}

	/// Stop an active listener and reclaim the reader for
	/// [`Self::read_line`] use. A no-op if no listener is active.
	///
	/// ## Errors
	///
	/// If the listener task panicked instead of shutting down cleanly.
	pub async fn stop_listener(&self) -> Result<(), LinkError> {
		let mut guard = self.reader.lock().await;
		let (handle, stop) = match std::mem::replace(&mut *guard, ReadMode::Closed) {
			ReadMode::Listening { handle, stop } => (handle, stop),
			other @ (ReadMode::Idle(_) | ReadMode::Closed) => {
				*guard = other;
				return Ok(());
			}
		};

		let _ = stop.send(());
		let lines = handle
			.await
			.map_err(|cause| LinkError::IoError(std::io::Error::new(std::io::ErrorKind::Other, cause)))?;
		*guard = ReadMode::Idle(lines);
		Ok(())
	}

	/// Whether a background listener is currently active on this link.
	pub async fn is_listening(&self) -> bool {
		matches!(*self.reader.lock().await, ReadMode::Listening { .. })
	}
}

pin_project! {
	/// Reads newline-terminated lines from an [`AsyncBufRead`], tolerating
	/// (and stripping) a trailing carriage return.
	#[must_use = "streams do nothing unless polled"]
	struct SerialLines<ReaderTy> {
		#[pin]
		reader: ReaderTy,
		buf: String,
		bytes: Vec<u8>,
		read: usize,
	}
}

impl<ReaderTy> SerialLines<ReaderTy>
where
	ReaderTy: AsyncBufRead,
{
	fn new(reader: ReaderTy) -> Self {
		Self {
			reader,
			buf: String::new(),
			bytes: Vec::new(),
			read: 0,
		}
	}
}

impl<ReaderTy> SerialLines<ReaderTy>
where
	ReaderTy: AsyncBufRead + Unpin,
{
	async fn next_line(&mut self) -> std::io::Result<Option<String>> {
		poll_fn(|cx| Pin::new(&mut *self).poll_next_line(cx)).await
	}
}

impl<ReaderTy> SerialLines<ReaderTy>
where
	ReaderTy: AsyncBufRead,
{
	fn poll_next_line(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<Option<String>>> {
		let me = self.project();

		let n = ready!(read_line_internal(me.reader, cx, me.buf, me.bytes, me.read))?;
		debug_assert_eq!(*me.read, 0);

		if n == 0 && me.buf.is_empty() {
			return Poll::Ready(Ok(None));
		}

		if me.buf.ends_with('\n') {
			me.buf.pop();
			if me.buf.ends_with('\r') {
				me.buf.pop();
			}
		}

		Poll::Ready(Ok(Some(std::mem::take(me.buf))))
	}
}

fn read_line_internal<ReaderTy: AsyncBufRead + ?Sized>(
	reader: Pin<&mut ReaderTy>,
	cx: &mut Context<'_>,
	output: &mut String,
	buf: &mut Vec<u8>,
	read: &mut usize,
) -> Poll<std::io::Result<usize>> {
	let io_res = ready!(read_until_internal(reader, cx, b'\n', buf, read));
	let utf8_res = String::from_utf8(std::mem::take(buf));
	debug_assert!(buf.is_empty());
	debug_assert!(output.is_empty());
	finish_string_read(io_res, utf8_res, *read, output)
}

fn read_until_internal<ReaderTy: AsyncBufRead + ?Sized>(
	mut reader: Pin<&mut ReaderTy>,
	cx: &mut Context<'_>,
	delimiter: u8,
	buf: &mut Vec<u8>,
	read: &mut usize,
) -> Poll<std::io::Result<usize>> {
	loop {
		let (done, used) = {
			let available = ready!(reader.as_mut().poll_fill_buf(cx))?;
			if let Some(i) = available.iter().position(|byte| *byte == delimiter) {
				buf.extend_from_slice(&available[..=i]);
				(true, i + 1)
			} else {
				buf.extend_from_slice(available);
				(false, available.len())
			}
		};
		reader.as_mut().consume(used);
		*read += used;
		if done || used == 0 {
			return Poll::Ready(Ok(std::mem::replace(read, 0)));
		}
	}
}

fn put_back_original_data(output: &mut String, mut vector: Vec<u8>, num_bytes_read: usize) {
	let original_len = vector.len() - num_bytes_read;
	vector.truncate(original_len);
	*output = String::from_utf8(vector).expect("the original data must be valid utf-8");
}

fn finish_string_read(
	io_res: std::io::Result<usize>,
	utf8_res: Result<String, FromUtf8Error>,
	read: usize,
	output: &mut String,
) -> Poll<std::io::Result<usize>> {
	match (io_res, utf8_res) {
		(Ok(num_bytes), Ok(string)) => {
			debug_assert_eq!(read, 0);
			*output = string;
			Poll::Ready(Ok(num_bytes))
		}
		(Err(io_err), Ok(string)) => {
			*output = string;
			Poll::Ready(Err(io_err))
		}
		(Ok(num_bytes), Err(utf8_err)) => {
			debug_assert_eq!(read, 0);
			put_back_original_data(output, utf8_err.into_bytes(), num_bytes);
			Poll::Ready(Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				"stream did not contain valid UTF-8",
			)))
		}
		(Err(io_err), Err(utf8_err)) => {
			put_back_original_data(output, utf8_err.into_bytes(), read);
			Poll::Ready(Err(io_err))
		}
	}
}

/// Future for the [`poll_fn`] function. See
/// `bridgectl`'s serial helpers for the rationale behind the manual `!Unpin`
/// handling here instead of deriving it.
struct PollFn<F> {
	f: F,
}

fn poll_fn<T, F>(f: F) -> PollFn<F>
where
	F: FnMut(&mut Context<'_>) -> Poll<T>,
{
	PollFn { f }
}

impl<T, F> Future for PollFn<F>
where
	F: FnMut(&mut Context<'_>) -> Poll<T>,
{
	type Output = T;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		// Safety: we never construct a `Pin<&mut F>` anywhere, so accessing
		// `f` mutably in an unpinned way is sound.
		let me = unsafe { Pin::into_inner_unchecked(self) };
		(me.f)(cx)
	}
}

#[cfg(test)]
mod unit_tests {
	use super::*;
	use tokio::io::BufReader;

	#[tokio::test]
	async fn splits_on_lf_and_strips_trailing_cr() {
		let data: &[u8] = b"READY\r\nACK\nTEL,1,2,3\r\n";
		let mut lines = SerialLines::new(BufReader::new(data));

		assert_eq!(lines.next_line().await.unwrap(), Some("READY".to_owned()));
		assert_eq!(lines.next_line().await.unwrap(), Some("ACK".to_owned()));
		assert_eq!(
			lines.next_line().await.unwrap(),
			Some("TEL,1,2,3".to_owned())
		);
		assert_eq!(lines.next_line().await.unwrap(), None);
	}

	#[tokio::test]
	async fn trailing_data_without_newline_is_still_returned_on_eof() {
		let data: &[u8] = b"READY\npartial";
		let mut lines = SerialLines::new(BufReader::new(data));

		assert_eq!(lines.next_line().await.unwrap(), Some("READY".to_owned()));
		assert_eq!(lines.next_line().await.unwrap(), Some("partial".to_owned()));
		assert_eq!(lines.next_line().await.unwrap(), None);
	}

	#[tokio::test]
	async fn empty_input_yields_no_lines() {
		let data: &[u8] = b"";
		let mut lines = SerialLines::new(BufReader::new(data));
		assert_eq!(lines.next_line().await.unwrap(), None);
	}
}
