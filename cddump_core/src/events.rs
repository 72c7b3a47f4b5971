/*!
# CD Dump: Progress & Log Events
*/

use std::{
	collections::VecDeque,
	sync::{
		mpsc::{
			Receiver,
			RecvTimeoutError,
			SyncSender,
			TryRecvError,
			sync_channel,
		},
		Arc,
		Condvar,
		Mutex,
	},
	time::{
		Duration,
		Instant,
	},
};



/// # Progress Channel Capacity.
///
/// Progress is advisory and arrives fast; a full channel means the
/// consumer is behind, not that the worker should stall, so the oldest
/// queued event is dropped in favor of the newest (see [`EventSink::progress`]).
const PROGRESS_CAPACITY: usize = 64;

/// # Log Channel Capacity.
///
/// Log events matter for auditing (bad blocks, sense data, mode changes),
/// so they aren't dropped silently; a full channel just means the consumer
/// missed some and a counter records that fact.
const LOG_CAPACITY: usize = 256;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Progress Event.
///
/// Fire-and-forget notifications describing dump progress. The worker
/// never blocks waiting for these to be consumed (§5).
pub enum ProgressEvent {
	/// # A new track has started.
	TrackStarted {
		/// # Track Number.
		track: u8,
	},

	/// # Sectors have advanced.
	Advanced {
		/// # Next Block To Read.
		next_block: i32,

		/// # Bad Blocks So Far.
		bad_blocks: u32,
	},

	/// # A speed sample was taken.
	Speed {
		/// # Megabytes Per Second.
		mbps: f64,
	},

	/// # The primary dump loop finished.
	PrimaryDone,

	/// # Error-recovery entered a new state.
	Recovering {
		/// # State Name.
		state: &'static str,
	},

	/// # The whole dump finished (or was cancelled).
	Finished {
		/// # Cancelled?
		cancelled: bool,
	},
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Log Event.
///
/// Structured, durable-ish notifications worth keeping a record of. These
/// are the things an MHDD/IBG-style side log, or a verbose CLI flag, would
/// want to see.
pub enum LogEvent {
	/// # A sector read failed and entered the bad-block set.
	SectorFailed {
		/// # LBA.
		lba: i32,
	},

	/// # A previously-bad sector was recovered.
	SectorRecovered {
		/// # LBA.
		lba: i32,
	},

	/// # A MODE SELECT was rejected by the drive.
	ModeSelectRejected,

	/// # Subchannel capability was downgraded.
	SubchannelDowngraded,

	/// # A soft error occurred but was tolerated ("force").
	SoftError {
		/// # Description.
		what: &'static str,
	},
}



/// # Shared Progress Queue State.
struct ProgressQueue {
	/// # Buffered Events, Oldest First.
	buf: VecDeque<ProgressEvent>,

	/// # Is The Sender Still Alive?
	connected: bool,
}

/// # Shared Progress Channel Guts.
struct ProgressShared {
	/// # Queue + Connection State.
	state: Mutex<ProgressQueue>,

	/// # Wakes A Blocked Receiver When Something Is Pushed Or The Sender Drops.
	condvar: Condvar,
}

/// # Progress Sender.
///
/// A bounded ring buffer rather than a plain `mpsc::SyncSender`: a full
/// `SyncSender` can only reject the newest send, which is backwards for
/// advisory progress data (see [`EventSink::progress`]) — this one evicts
/// the oldest queued event instead so the receiver always eventually sees
/// the freshest state.
struct ProgressSender(Arc<ProgressShared>);

impl ProgressSender {
	/// # Push, Evicting The Oldest Event If Full.
	fn push(&self, evt: ProgressEvent) {
		let mut state = lock(&self.0.state);
		if state.buf.len() >= PROGRESS_CAPACITY { state.buf.pop_front(); }
		state.buf.push_back(evt);
		drop(state);
		self.0.condvar.notify_one();
	}
}

impl Drop for ProgressSender {
	fn drop(&mut self) {
		let mut state = lock(&self.0.state);
		state.connected = false;
		drop(state);
		self.0.condvar.notify_all();
	}
}

/// # Progress Receiver.
///
/// Mirrors the two [`std::sync::mpsc::Receiver`] methods callers actually
/// use (`recv_timeout`, `try_recv`), backed by the drop-oldest ring buffer
/// instead of a channel.
pub struct ProgressReceiver(Arc<ProgressShared>);

impl ProgressReceiver {
	/// # Receive, Blocking Up To `timeout`.
	///
	/// ## Errors
	///
	/// Returns [`RecvTimeoutError::Timeout`] if nothing arrives in time, or
	/// [`RecvTimeoutError::Disconnected`] once the sender has dropped and
	/// the buffer is empty.
	pub fn recv_timeout(&self, timeout: Duration) -> Result<ProgressEvent, RecvTimeoutError> {
		let deadline = Instant::now() + timeout;
		let mut state = lock(&self.0.state);
		loop {
			if let Some(evt) = state.buf.pop_front() { return Ok(evt); }
			if !state.connected { return Err(RecvTimeoutError::Disconnected); }

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() { return Err(RecvTimeoutError::Timeout); }

			let (next_state, timeout_result) = self.0.condvar.wait_timeout(state, remaining)
				.unwrap_or_else(std::sync::PoisonError::into_inner);
			state = next_state;
			if timeout_result.timed_out() && state.buf.is_empty() {
				return Err(RecvTimeoutError::Timeout);
			}
		}
	}

	/// # Receive Without Blocking.
	///
	/// ## Errors
	///
	/// Returns [`TryRecvError::Empty`] if nothing is queued, or
	/// [`TryRecvError::Disconnected`] once the sender has dropped and the
	/// buffer is empty.
	pub fn try_recv(&self) -> Result<ProgressEvent, TryRecvError> {
		let mut state = lock(&self.0.state);
		if let Some(evt) = state.buf.pop_front() { Ok(evt) }
		else if state.connected { Err(TryRecvError::Empty) }
		else { Err(TryRecvError::Disconnected) }
	}
}

/// # Lock A Mutex, Recovering From Poisoning.
///
/// A panic elsewhere while holding this lock shouldn't make every future
/// progress update (or recv) panic too; the queue itself has no invariant
/// a torn update could violate.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}



/// # Event Sink.
///
/// The write-half of the event channel; owned by the dump worker.
pub struct EventSink {
	/// # Progress Queue.
	progress: ProgressSender,

	/// # Log Channel.
	log: SyncSender<LogEvent>,

	/// # Dropped Log Events.
	///
	/// Incremented whenever a log event couldn't be delivered because the
	/// receiver vanished or the channel stayed full.
	dropped_logs: u64,
}

impl EventSink {
	/// # Push Progress.
	///
	/// Coalescing: if the queue is full, the oldest entry is evicted to
	/// make room, so the consumer always sees the freshest state rather
	/// than stale history.
	pub fn progress(&self, evt: ProgressEvent) { self.progress.push(evt); }

	/// # Push Log Event.
	pub fn log(&mut self, evt: LogEvent) {
		if self.log.try_send(evt).is_err() { self.dropped_logs += 1; }
	}

	#[must_use]
	/// # Dropped Log Count.
	pub const fn dropped_logs(&self) -> u64 { self.dropped_logs }
}



/// # Event Source.
///
/// The read-half of the event channel; owned by whatever is rendering
/// progress (the `cddump` binary's `Progless`-backed UI, a test harness,
/// etc.).
pub struct EventSource {
	/// # Progress Queue.
	pub progress: ProgressReceiver,

	/// # Log Channel.
	pub log: Receiver<LogEvent>,
}



#[must_use]
/// # New Event Channel.
///
/// Build a connected [`EventSink`]/[`EventSource`] pair.
pub fn channel() -> (EventSink, EventSource) {
	let shared = Arc::new(ProgressShared {
		state: Mutex::new(ProgressQueue { buf: VecDeque::with_capacity(PROGRESS_CAPACITY), connected: true }),
		condvar: Condvar::new(),
	});
	let (l_tx, l_rx) = sync_channel(LOG_CAPACITY);
	(
		EventSink { progress: ProgressSender(Arc::clone(&shared)), log: l_tx, dropped_logs: 0 },
		EventSource { progress: ProgressReceiver(shared), log: l_rx },
	)
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_progress_coalesces() {
		let (sink, source) = channel();
		for i in 0..PROGRESS_CAPACITY as i32 * 2 {
			sink.progress(ProgressEvent::Advanced { next_block: i, bad_blocks: 0 });
		}

		// The oldest half should have been evicted; the first thing we
		// read back should be the oldest *surviving* event, not the
		// oldest event ever pushed.
		let Ok(ProgressEvent::Advanced { next_block, .. }) = source.progress.try_recv() else {
			panic!("expected a queued Advanced event");
		};
		assert_eq!(next_block, PROGRESS_CAPACITY as i32);

		// And the whole queue should be exactly PROGRESS_CAPACITY long
		// (one already drained above).
		let mut remaining = 0;
		while source.progress.try_recv().is_ok() { remaining += 1; }
		assert_eq!(remaining, PROGRESS_CAPACITY - 1);
	}

	#[test]
	fn t_progress_recv_timeout_disconnects() {
		let (sink, source) = channel();
		drop(sink);
		assert_eq!(
			source.progress.recv_timeout(Duration::from_millis(10)),
			Err(RecvTimeoutError::Disconnected),
		);
	}

	#[test]
	fn t_log_counts_drops() {
		let (mut sink, _source) = channel();
		for _ in 0..LOG_CAPACITY + 5 {
			sink.log(LogEvent::SectorFailed { lba: 0 });
		}
		assert!(sink.dropped_logs() > 0);
	}
}
