/// Returns a guard that runs `f` when it goes out of scope, including during unwinding.
///
/// Used for timing log messages that must be emitted on every return path.
pub fn on_drop(f: impl FnOnce()) -> impl Drop {
    struct Deferred<F: FnOnce()>(Option<F>);
    impl<F: FnOnce()> Drop for Deferred<F> {
        fn drop(&mut self) {
            if let Some(f) = self.0.take() {
                f();
            }
        }
    }
    Deferred(Some(f))
}
