//! Motion input sources
//!
//! The sensor sends short text lines over serial. A background reader thread
//! decodes them and writes the latest command into a single-slot register;
//! the game tick takes whatever is there, once. Transport trouble never
//! reaches the tick: it is logged, counted, and shows up as `None`.

use std::io::{BufRead, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::sim::MotionCommand;

/// Transport-level failures, recorded for diagnostics only
#[derive(Debug, Error)]
pub enum InputError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable line: {0}")]
    Decode(#[from] std::str::Utf8Error),

    #[error("transport disconnected")]
    Disconnected,
}

/// Anything that can hand the game loop one command per tick
pub trait MotionSource {
    /// Latest command since the previous poll, `None` if there is nothing new.
    /// Must not block.
    fn poll(&mut self) -> MotionCommand;
}

impl<S: MotionSource + ?Sized> MotionSource for Box<S> {
    fn poll(&mut self) -> MotionCommand {
        (**self).poll()
    }
}

/// Maps raw sensor lines to commands
#[derive(Debug, Clone, Copy)]
pub struct LineDecoder {
    /// Accept the firmware's numeric codes: 1 = left, 2 = center, 3 = right
    pub digit_codes: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self { digit_codes: true }
    }
}

impl LineDecoder {
    pub fn new(digit_codes: bool) -> Self {
        Self { digit_codes }
    }

    pub fn decode(&self, line: &str) -> MotionCommand {
        let line = line.trim().to_lowercase();
        if line.contains("left") {
            MotionCommand::MoveLeft
        } else if line.contains("right") {
            MotionCommand::MoveRight
        } else if line.contains("mid") || line.contains("center") {
            MotionCommand::MoveCenter
        } else if self.digit_codes {
            match line.as_str() {
                "1" => MotionCommand::MoveLeft,
                "2" => MotionCommand::MoveCenter,
                "3" => MotionCommand::MoveRight,
                _ => MotionCommand::None,
            }
        } else {
            MotionCommand::None
        }
    }
}

/// Health of the transport behind a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportDiagnostics {
    pub connected: bool,
    pub lines_read: u64,
    pub errors: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<MotionCommand>,
    diagnostics: TransportDiagnostics,
}

/// Single-slot overwrite register shared between a producer and the tick
///
/// Writers replace whatever is pending; the reader takes and clears it.
#[derive(Debug, Clone, Default)]
pub struct MotionSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl MotionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave the slot half-written, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the pending command
    pub fn publish(&self, command: MotionCommand) {
        self.lock().pending = Some(command);
    }

    /// Take the pending command, leaving the slot empty
    pub fn take(&self) -> MotionCommand {
        self.lock().pending.take().unwrap_or_default()
    }

    pub fn diagnostics(&self) -> TransportDiagnostics {
        self.lock().diagnostics.clone()
    }

    fn set_connected(&self, connected: bool) {
        self.lock().diagnostics.connected = connected;
    }

    fn record_line(&self, command: MotionCommand) {
        let mut state = self.lock();
        state.diagnostics.lines_read += 1;
        state.pending = Some(command);
    }

    fn record_error(&self, error: &InputError) {
        let mut state = self.lock();
        state.diagnostics.errors += 1;
        state.diagnostics.last_error = Some(error.to_string());
    }
}

impl MotionSource for MotionSlot {
    fn poll(&mut self) -> MotionCommand {
        self.take()
    }
}

/// Motion source fed by a background thread reading a line stream
///
/// The stream is normally a serial device (115200 baud, configured outside
/// the game), but anything line-oriented works.
pub struct SerialMotionSource {
    slot: MotionSlot,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialMotionSource {
    /// Start reading `stream` on a background thread
    pub fn spawn<R>(stream: R, decoder: LineDecoder) -> Result<Self, InputError>
    where
        R: BufRead + Send + 'static,
    {
        let slot = MotionSlot::new();
        let stop = Arc::new(AtomicBool::new(false));
        slot.set_connected(true);

        let reader = {
            let slot = slot.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("motion-reader".into())
                .spawn(move || read_lines(stream, decoder, &slot, &stop))?
        };

        Ok(Self {
            slot,
            stop,
            reader: Some(reader),
        })
    }

    pub fn diagnostics(&self) -> TransportDiagnostics {
        self.slot.diagnostics()
    }

    /// Shared register the reader thread writes into
    pub fn slot(&self) -> &MotionSlot {
        &self.slot
    }

    pub fn is_connected(&self) -> bool {
        self.slot.diagnostics().connected
    }
}

impl MotionSource for SerialMotionSource {
    fn poll(&mut self) -> MotionCommand {
        self.slot.take()
    }
}

impl Drop for SerialMotionSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The reader may be parked in a blocking read; only join if it is done
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn read_lines<R: BufRead>(
    mut stream: R,
    decoder: LineDecoder,
    slot: &MotionSlot,
    stop: &AtomicBool,
) {
    // Holds a partial line across timed-out reads
    let mut buf = Vec::with_capacity(64);
    while !stop.load(Ordering::Relaxed) {
        match stream.read_until(b'\n', &mut buf) {
            Ok(0) => {
                // Unterminated tail before EOF
                if !buf.is_empty() {
                    decode_line(&buf, decoder, slot);
                }
                let err = InputError::Disconnected;
                log::warn!("Motion input closed: {}", err);
                slot.record_error(&err);
                break;
            }
            Ok(_) => {
                decode_line(&buf, decoder, slot);
                buf.clear();
            }
            // Non-blocking or timed-out ports: keep the partial line and retry
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                thread::sleep(Duration::from_millis(5));
            }
            Err(e) => {
                let err = InputError::from(e);
                log::warn!("Motion input failed: {}", err);
                slot.record_error(&err);
                break;
            }
        }
    }
    slot.set_connected(false);
}

fn decode_line(bytes: &[u8], decoder: LineDecoder, slot: &MotionSlot) {
    match std::str::from_utf8(bytes) {
        Ok(line) => {
            let command = decoder.decode(line);
            log::trace!("Motion line {:?} -> {:?}", line.trim(), command);
            slot.record_line(command);
        }
        Err(e) => {
            let err = InputError::from(e);
            log::warn!("Ignoring motion line: {}", err);
            slot.record_error(&err);
        }
    }
}

/// Replays a fixed command per tick, then `None` forever
#[derive(Debug, Clone, Default)]
pub struct ScriptedMotionSource {
    commands: Vec<MotionCommand>,
    cursor: usize,
}

impl ScriptedMotionSource {
    pub fn new(commands: Vec<MotionCommand>) -> Self {
        Self { commands, cursor: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.commands.len()
    }
}

impl MotionSource for ScriptedMotionSource {
    fn poll(&mut self) -> MotionCommand {
        let command = self.commands.get(self.cursor).copied().unwrap_or_default();
        self.cursor += 1;
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Instant;

    fn wait_for_disconnect(source: &SerialMotionSource) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while source.is_connected() {
            assert!(Instant::now() < deadline, "reader thread never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_decode_keywords() {
        let d = LineDecoder::default();
        assert_eq!(d.decode("LEFT\r\n"), MotionCommand::MoveLeft);
        assert_eq!(d.decode("motion: right"), MotionCommand::MoveRight);
        assert_eq!(d.decode("Mid"), MotionCommand::MoveCenter);
        assert_eq!(d.decode("Started!"), MotionCommand::None);
        assert_eq!(d.decode(""), MotionCommand::None);
        // "left" wins when both appear
        assert_eq!(d.decode("left then right"), MotionCommand::MoveLeft);
    }

    #[test]
    fn test_decode_digit_codes() {
        let d = LineDecoder::default();
        assert_eq!(d.decode("1\r\n"), MotionCommand::MoveLeft);
        assert_eq!(d.decode("2"), MotionCommand::MoveCenter);
        assert_eq!(d.decode("3"), MotionCommand::MoveRight);
        assert_eq!(d.decode("13"), MotionCommand::None);

        let d = LineDecoder::new(false);
        assert_eq!(d.decode("1"), MotionCommand::None);
        assert_eq!(d.decode("left"), MotionCommand::MoveLeft);
    }

    #[test]
    fn test_slot_overwrites_and_clears() {
        let mut slot = MotionSlot::new();
        assert_eq!(slot.poll(), MotionCommand::None);

        slot.publish(MotionCommand::MoveLeft);
        slot.publish(MotionCommand::MoveRight);
        assert_eq!(slot.poll(), MotionCommand::MoveRight);
        // Single-shot: consumed commands do not stick
        assert_eq!(slot.poll(), MotionCommand::None);
    }

    #[test]
    fn test_slot_shared_across_threads() {
        let mut slot = MotionSlot::new();
        let writer = slot.clone();
        thread::spawn(move || writer.publish(MotionCommand::MoveCenter))
            .join()
            .unwrap();
        assert_eq!(slot.poll(), MotionCommand::MoveCenter);
    }

    #[test]
    fn test_serial_source_keeps_latest_line() {
        let input = Cursor::new(b"Started!\nleft\n3\n".to_vec());
        let mut source = SerialMotionSource::spawn(input, LineDecoder::default()).unwrap();
        wait_for_disconnect(&source);

        assert_eq!(source.poll(), MotionCommand::MoveRight);
        assert_eq!(source.poll(), MotionCommand::None);

        let diag = source.diagnostics();
        assert_eq!(diag.lines_read, 3);
        // EOF counts as a disconnect
        assert_eq!(diag.errors, 1);
        assert!(!diag.connected);
    }

    #[test]
    fn test_serial_source_survives_bad_bytes() {
        let input = Cursor::new(b"\xff\xfe\n1\n".to_vec());
        let mut source = SerialMotionSource::spawn(input, LineDecoder::default()).unwrap();
        wait_for_disconnect(&source);

        assert_eq!(source.poll(), MotionCommand::MoveLeft);
        let diag = source.diagnostics();
        assert_eq!(diag.lines_read, 1);
        assert_eq!(diag.errors, 2);
    }

    struct BrokenPort;

    impl Read for BrokenPort {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::BrokenPipe, "device unplugged"))
        }
    }

    #[test]
    fn test_serial_source_transport_failure_degrades_to_none() {
        let mut source =
            SerialMotionSource::spawn(BufReader::new(BrokenPort), LineDecoder::default()).unwrap();
        wait_for_disconnect(&source);

        assert_eq!(source.poll(), MotionCommand::None);
        let diag = source.diagnostics();
        assert_eq!(diag.errors, 1);
        assert!(diag.last_error.unwrap().contains("device unplugged"));
    }

    /// Port that hands out one scripted chunk or error per read
    struct TimedPort {
        reads: VecDeque<std::io::Result<&'static [u8]>>,
    }

    impl Read for TimedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.reads.pop_front() {
                None => Ok(0),
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
            }
        }
    }

    fn timed_out() -> std::io::Error {
        std::io::Error::new(ErrorKind::TimedOut, "no data")
    }

    #[test]
    fn test_serial_source_joins_line_split_by_timeout() {
        let port = TimedPort {
            reads: VecDeque::from([Ok(&b"ri"[..]), Err(timed_out()), Ok(&b"ght\n"[..])]),
        };
        let mut source =
            SerialMotionSource::spawn(BufReader::new(port), LineDecoder::default()).unwrap();
        wait_for_disconnect(&source);

        assert_eq!(source.poll(), MotionCommand::MoveRight);
        let diag = source.diagnostics();
        assert_eq!(diag.lines_read, 1);
        // Only the EOF; the timeout is not an error
        assert_eq!(diag.errors, 1);
    }

    #[test]
    fn test_serial_source_decodes_unterminated_tail() {
        let port = TimedPort {
            reads: VecDeque::from([Ok(&b"3\nleft"[..]), Err(timed_out())]),
        };
        let mut source =
            SerialMotionSource::spawn(BufReader::new(port), LineDecoder::default()).unwrap();
        wait_for_disconnect(&source);

        assert_eq!(source.poll(), MotionCommand::MoveLeft);
        assert_eq!(source.diagnostics().lines_read, 2);
    }

    #[test]
    fn test_scripted_source() {
        let mut source =
            ScriptedMotionSource::new(vec![MotionCommand::MoveLeft, MotionCommand::None]);
        assert_eq!(source.poll(), MotionCommand::MoveLeft);
        assert_eq!(source.poll(), MotionCommand::None);
        assert!(source.is_exhausted());
        assert_eq!(source.poll(), MotionCommand::None);
    }
}
