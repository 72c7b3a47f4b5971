/*!
# CD Dump: Library
*/

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
	unsafe_code,
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

#![expect(clippy::redundant_pub_crate, reason = "Unresolvable.")]

mod abort;
mod atomicfile;
mod capability;
mod config;
mod drive;
mod dump;
mod engine;
mod error;
mod events;
mod extents;
mod framing;
mod hash;
mod ratelog;
mod recovery;
mod resume;
mod serial;
mod sink;
mod toc;

pub use abort::KillSwitch;
pub use capability::DriveCapabilities;
pub use config::{
	DumpOptions,
	TextEncoding,
};
pub use drive::{
	DriveHandle,
	Inquiry,
	LibcdioHandle,
	ModePageParameter,
	Sense,
};
pub use dump::{
	DumpLoop,
	DumpStats,
	LoopOutcome,
};
pub use engine::{
	DumpSession,
	DumpSummary,
	SidecarBuilder,
};
pub use error::DumpError;
pub use events::{
	channel,
	EventSink,
	EventSource,
	LogEvent,
	ProgressEvent,
	ProgressReceiver,
};
pub use extents::{
	BadBlockSet,
	Extents,
	ScanDirection,
};
pub use framing::{
	Framing,
	SubchannelFormat,
};
pub use hash::{
	Crc32HashSink,
	HashSink,
	NullHashSink,
};
pub use ratelog::{
	BlockOutcome,
	IbgLog,
	MhddLog,
};
pub use recovery::{
	Recovery,
	RecoveryState,
};
pub use resume::{
	DumpHardware,
	ResumeRecord,
};
pub use sink::{
	ImageSink,
	SectorTagKind,
};
pub use toc::{
	DiscFormat,
	MediaTagKind,
	MediaTags,
	MediaType,
	Msf,
	Track,
	TrackFlags,
	TrackKind,
	TocDescriptor,
	TocPlan,
	TocPlanner,
};
