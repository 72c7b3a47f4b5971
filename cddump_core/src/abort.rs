/*!
# CD Dump: Kill Switch
*/

use std::sync::{
	Arc,
	atomic::{
		AtomicBool,
		Ordering::Acquire,
	},
};



#[derive(Debug, Clone, Default)]
/// # Kill Switch.
///
/// A cooperative cancellation handle shared between the worker thread doing
/// the actual dumping and whatever owns the UI (a CTRL-C handler, a remote
/// control socket, etc.).
///
/// There is no global/static flag; every [`DumpSession`](crate::engine::DumpSession)
/// gets its own, passed in by the caller.
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
	#[must_use]
	/// # Dead?
	pub fn killed(&self) -> bool { self.0.load(Acquire) }

	#[must_use]
	/// # Inner Clone.
	pub fn inner(&self) -> Arc<AtomicBool> { Arc::clone(&self.0) }
}



#[cfg(test)]
mod test {
	use super::*;
	use std::sync::atomic::Ordering::Release;

	#[test]
	fn t_kill_switch() {
		let k = KillSwitch::default();
		assert!(! k.killed());
		k.inner().store(true, Release);
		assert!(k.killed());
	}
}
