use std::fmt::Debug;

/// Log an error through `tracing` and keep going.
///
/// Usable on any `Result` whose error is `Debug` (notably eyre reports and store errors).
pub trait ForwardRefToTracing<T, E> {
    fn trace_err(self) -> Result<T, E>;
    fn trace_err_ok(self) -> Option<T>;
    fn trace_warn_ok(self, context: &str) -> Option<T>;
}

impl<T, E> ForwardRefToTracing<T, E> for Result<T, E>
where
    E: Debug,
{
    fn trace_err(self) -> Result<T, E> {
        self.inspect_err(|e| tracing::error!("{:?}", e))
    }

    fn trace_err_ok(self) -> Option<T> {
        self.trace_err().ok()
    }

    fn trace_warn_ok(self, context: &str) -> Option<T> {
        self.inspect_err(|e| tracing::warn!("{context}: {:?}", e)).ok()
    }
}

#[cfg(test)]
mod test {
    use super::ForwardRefToTracing;

    #[test]
    fn keeps_ok_values() {
        let ok: Result<u8, String> = Ok(3);
        assert_eq!(ok.trace_err_ok(), Some(3));
    }

    #[test]
    fn drops_errors() {
        let err: Result<u8, String> = Err("nope".to_owned());
        assert_eq!(err.clone().trace_err_ok(), None);
        assert_eq!(err.trace_warn_ok("while testing"), None);
    }
}
