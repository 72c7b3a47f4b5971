/*!
# CD Dump
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

mod cli;
mod raw_sink;

use cddump_core::{
	channel,
	Crc32HashSink,
	DumpError,
	DumpSession,
	DumpSummary,
	KillSwitch,
	LibcdioHandle,
	LogEvent,
	ProgressEvent,
};
use cli::CliError;
use dactyl::NiceU32;
use fyi_msg::{
	Msg,
	Progless,
};
use raw_sink::RawSink;
use std::{
	sync::{
		atomic::{
			AtomicBool,
			Ordering::SeqCst,
		},
		mpsc::RecvTimeoutError,
		Arc,
	},
	time::Duration,
};
use utc2k::FmtUtc2k;



/// # Poll Interval While Waiting On The Dump Worker.
const POLL_INTERVAL: Duration = Duration::from_millis(150);



/// # Application Error.
///
/// Unifies CLI-parse failures and core dump failures for a single exit
/// path; never crosses into `cddump_core` (§1: parsing is the binary's
/// job).
enum AppError {
	/// # CLI Parsing Failed.
	Cli(CliError),

	/// # The Dump Itself Failed.
	Dump(DumpError),
}

impl std::fmt::Display for AppError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Cli(e) => e.fmt(f),
			Self::Dump(e) => e.fmt(f),
		}
	}
}

impl From<DumpError> for AppError {
	fn from(e: DumpError) -> Self { Self::Dump(e) }
}



/// # Main.
fn main() {
	match _main() {
		Ok(()) => {},
		Err(AppError::Cli(CliError::PrintHelp)) => helper(),
		Err(AppError::Cli(CliError::PrintVersion)) => {
			println!(concat!("CD Dump v", env!("CARGO_PKG_VERSION")));
		},
		Err(e) => {
			Msg::error(e.to_string()).eprint();
			std::process::exit(1);
		},
	}
}

/// # Actual Main.
fn _main() -> Result<(), AppError> {
	let parsed = cli::parse().map_err(AppError::Cli)?;

	let drive = LibcdioHandle::new(parsed.device.as_deref())?;
	let mut sink = RawSink::new(parsed.options.output_prefix().to_path_buf());
	let mut hash = Crc32HashSink::new();

	let (mut events, source) = channel();
	let kill = KillSwitch::default();

	let progress = Progless::default();
	sigint(kill.inner(), progress.clone());

	let summary = std::thread::scope(|scope| -> Result<DumpSummary, DumpError> {
		let handle = scope.spawn(move || {
			let mut session = DumpSession::new(&drive, &mut sink, parsed.options)
				.with_hash_sink(&mut hash);
			session.run(&mut events, &kill)
		});

		loop {
			match source.progress.recv_timeout(POLL_INTERVAL) {
				Ok(evt) => apply_progress(&progress, evt),
				Err(RecvTimeoutError::Timeout) => {},
				Err(RecvTimeoutError::Disconnected) => break,
			}
			while let Ok(evt) = source.log.try_recv() { apply_log(evt); }
			if handle.is_finished() { break; }
		}

		while let Ok(evt) = source.progress.try_recv() { apply_progress(&progress, evt); }
		while let Ok(evt) = source.log.try_recv() { apply_log(evt); }

		handle.join().unwrap_or(Err(DumpError::Bug("dump worker panicked")))
	})?;

	progress.finish();
	print_summary(&summary);

	if summary.cancelled { Err(AppError::Dump(DumpError::Aborted)) }
	else { Ok(()) }
}

/// # Apply One Progress Event To The Bar.
fn apply_progress(progress: &Progless, evt: ProgressEvent) {
	match evt {
		ProgressEvent::TrackStarted { track } => {
			progress.set_title(Some(Msg::custom("Dumping", 199, &format!("Track #{track}…"))));
		},
		ProgressEvent::Advanced { next_block, bad_blocks } => {
			let _res = progress.try_reset(0);
			progress.set_title(Some(Msg::custom(
				"Dumping",
				199,
				&format!("LBA {next_block}, {} bad", NiceU32::from(bad_blocks)),
			)));
			progress.increment();
		},
		ProgressEvent::Speed { mbps } => {
			progress.set_title(Some(Msg::custom("Dumping", 199, &format!("{mbps:.2} MB/s"))));
		},
		ProgressEvent::PrimaryDone => {
			progress.set_title(Some(Msg::custom("Recovering", 199, "Revisiting bad blocks…")));
		},
		ProgressEvent::Recovering { state } => {
			progress.set_title(Some(Msg::custom("Recovering", 199, state)));
		},
		ProgressEvent::Finished { cancelled } => {
			if cancelled { progress.set_title(Some(Msg::custom("Cancelled", 199, "Saving progress…"))); }
		},
	}
}

/// # Apply One Log Event.
///
/// Verbose, human-facing notes; these never block the worker (§5) and are
/// only ever printed, never stored.
fn apply_log(evt: LogEvent) {
	match evt {
		LogEvent::SectorFailed { lba } => eprintln!("\x1b[2msector {lba}: read failed\x1b[0m"),
		LogEvent::SectorRecovered { lba } => eprintln!("\x1b[2msector {lba}: recovered\x1b[0m"),
		LogEvent::ModeSelectRejected => eprintln!("\x1b[2mdrive rejected MODE SELECT\x1b[0m"),
		LogEvent::SubchannelDowngraded => eprintln!("\x1b[2msubchannel framing downgraded\x1b[0m"),
		LogEvent::SoftError { what } => eprintln!("\x1b[2m{what}\x1b[0m"),
	}
}

/// # Print The Final Summary (§7).
fn print_summary(summary: &DumpSummary) {
	eprintln!();
	eprintln!(
		"\x1b[1;38;5;199m{}\x1b[0m  {}",
		if summary.cancelled { "Dump cancelled." } else { "Dump complete." },
		FmtUtc2k::now(),
	);
	eprintln!("  Total time:    {:.1}s", summary.total_time.as_secs_f64());
	eprintln!("  Command time:  {:.1}s", summary.stats.command_time().as_secs_f64());
	eprintln!("  Write time:    {:.1}s", summary.stats.write_time().as_secs_f64());
	eprintln!("  Close time:    {:.1}s", summary.close_time.as_secs_f64());
	if let Some(v) = summary.stats.min_mbps() { eprintln!("  Slowest burst: {v:.2} MB/s"); }
	if let Some(v) = summary.stats.max_mbps() { eprintln!("  Fastest burst: {v:.2} MB/s"); }
	eprintln!("  Bad blocks:    {}", NiceU32::from(summary.bad_blocks));
	for (algorithm, digest) in &summary.digests {
		eprintln!("  {algorithm}:{}{}", " ".repeat(10_usize.saturating_sub(algorithm.len() + 1)), hex(digest));
	}
}

/// # Format Bytes As Lowercase Hex.
fn hex(bytes: &[u8]) -> String {
	use std::fmt::Write;
	bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
		let _res = write!(s, "{b:02x}");
		s
	})
}

/// # Hook Up CTRL+C.
fn sigint(killed: Arc<AtomicBool>, progress: Progless) {
	let _res = ctrlc::set_handler(move || {
		killed.store(true, SeqCst);
		progress.sigint();
	});
}

#[cold]
/// # Print Help.
fn helper() {
	println!(concat!(
		r#"
   .---.
  /     \   "#, "\x1b[38;5;199mCD Dump\x1b[0;38;5;69m v", env!("CARGO_PKG_VERSION"), "\x1b[0m", r#"
 |  (_)  |  Sector-level optical disc
  \     /   preservation.
   `---'

USAGE:
    cddump [OPTIONS] -o <PATH>

BASIC SETTINGS:
    -o, --output <PATH>   Output image prefix (required). Tracks, tags, and
                           the resume record are all derived from this path.
    -d, --dev <PATH>      Device path for the optical drive.
                           [default: auto]
    -p, --pass, --passes <NUM>
                           Number of retry passes to run against leftover bad
                           blocks once the primary dump finishes. [default: 1]
    -s, --skip <NUM>      Sectors to skip (zero-fill) past a failing read,
                           preserving alignment. [default: 64]
    -e, --encoding <NAME> Text encoding for CD-Text/ISRC payloads: ascii,
                           latin1, or shiftjis. [default: ascii]

WHEN ALL ELSE FAILS:
        --persistent       Attempt drive persistent-error-recovery mode
                           (MODE SELECT page 0x01) once retries are exhausted.
        --stop-on-error    Abort the whole dump on the first failed read,
                           rather than recording it as a bad block.
        --no-trim          Skip error recovery entirely; leave bad blocks as
                           zero-filled placeholders.
        --force            Tolerate soft failures (unsupported tags, a lead-in
                           that can't be read, subchannel downgrade, …) rather
                           than aborting.

MISCELLANEOUS:
        --dump-raw         Request raw (unprocessed) sector data where the
                           drive supports it.
        --dump-lead-in     Attempt to capture the disc's lead-in region.
        --no-metadata      Skip sidecar metadata generation on completion.
    -h, --help             Print help information and exit.
    -V, --version          Print version information and exit.

EARLY EXIT:
    Press CTRL+C to stop early. Progress is saved; the next run on the same
    output prefix resumes where this one left off.
"
	));
}
