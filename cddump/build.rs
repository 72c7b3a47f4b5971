/*!
# CD Dump: Build
*/

use argyle::KeyWordsBuilder;
use std::path::PathBuf;



/// # Set Up CLI Arguments.
fn main() {
	println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

	let mut builder = KeyWordsBuilder::default();
	builder.push_keys([
		"--dump-raw",
		"--dump-lead-in",
		"--force",
		"-h", "--help",
		"--no-metadata",
		"--no-trim",
		"--persistent",
		"--stop-on-error",
		"-V", "--version",
	]);
	builder.push_keys_with_values([
		"-d", "--dev",
		"-e", "--encoding",
		"-o", "--output",
		"-p", "--pass", "--passes",
		"-s", "--skip",
	]);
	builder.save(out_path("argyle.rs"));
}

/// # Output Path.
///
/// Append the sub-path to OUT_DIR and return it.
fn out_path(stub: &str) -> PathBuf {
	std::fs::canonicalize(std::env::var("OUT_DIR").expect("Missing OUT_DIR."))
		.expect("Missing OUT_DIR.")
		.join(stub)
}
