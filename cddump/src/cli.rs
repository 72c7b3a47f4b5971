/*!
# CD Dump: CLI
*/

use argyle::Argument;
use cddump_core::{
	DumpOptions,
	TextEncoding,
};
use std::path::PathBuf;



#[derive(Debug)]
/// # CLI Error.
///
/// Parsing lives entirely in this binary (`cddump_core`'s `DumpOptions` is
/// just the typed landing spot); this type never crosses into the core
/// crate.
pub(super) enum CliError {
	/// # `-h`/`--help` Was Passed.
	PrintHelp,

	/// # `-V`/`--version` Was Passed.
	PrintVersion,

	/// # A Value Could Not Be Parsed.
	Parse(&'static str),

	/// # No Output Path Was Given.
	NoOutput,
}

impl std::fmt::Display for CliError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::PrintHelp | Self::PrintVersion => Ok(()),
			Self::Parse(what) => write!(f, "Unable to parse {what}."),
			Self::NoOutput => f.write_str("An output path (-o/--output) is required."),
		}
	}
}



/// # Parsed CLI Arguments.
pub(super) struct Parsed {
	/// # Dump Options.
	pub(super) options: DumpOptions,

	/// # Device Path.
	pub(super) device: Option<PathBuf>,
}



/// # Parse Options.
pub(super) fn parse() -> Result<Parsed, CliError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut opts = DumpOptions::default();
	let mut device = None;
	let mut output = None;

	for arg in args {
		match arg {
			Argument::Key("--dump-raw") => { opts = opts.with_raw(true); },
			Argument::Key("--dump-lead-in") => { opts = opts.with_lead_in(true); },
			Argument::Key("--force") => { opts = opts.with_force(true); },
			Argument::Key("-h" | "--help") => return Err(CliError::PrintHelp),
			Argument::Key("--no-metadata") => { opts = opts.with_no_metadata(true); },
			Argument::Key("--no-trim") => { opts = opts.with_no_trim(true); },
			Argument::Key("--persistent") => { opts = opts.with_persistent(true); },
			Argument::Key("--stop-on-error") => { opts = opts.with_stop_on_error(true); },
			Argument::Key("-V" | "--version") => return Err(CliError::PrintVersion),

			Argument::KeyWithValue("-d" | "--dev", s) => { device.replace(PathBuf::from(s)); },
			Argument::KeyWithValue("-e" | "--encoding", s) => {
				opts = opts.with_encoding(parse_encoding(&s)?);
			},
			Argument::KeyWithValue("-o" | "--output", s) => { output.replace(PathBuf::from(s)); },
			Argument::KeyWithValue("-p" | "--pass" | "--passes", s) => {
				let v: u8 = s.trim().parse().map_err(|_| CliError::Parse("-p/--passes"))?;
				opts = opts.with_retry_passes(v);
			},
			Argument::KeyWithValue("-s" | "--skip", s) => {
				let v: u32 = s.trim().parse().map_err(|_| CliError::Parse("-s/--skip"))?;
				opts = opts.with_skip(v);
			},

			_ => {},
		}
	}

	let prefix = output.ok_or(CliError::NoOutput)?;
	let mut path = prefix.clone();
	path.set_extension("bin");
	opts = opts.with_output_prefix(prefix).with_output_path(path);

	Ok(Parsed { options: opts, device })
}



/// # Parse Text Encoding.
fn parse_encoding(s: &str) -> Result<TextEncoding, CliError> {
	match s.trim().to_ascii_lowercase().as_str() {
		"ascii" => Ok(TextEncoding::Ascii),
		"latin1" => Ok(TextEncoding::Latin1),
		"shiftjis" | "shift-jis" => Ok(TextEncoding::ShiftJis),
		_ => Err(CliError::Parse("-e/--encoding")),
	}
}
