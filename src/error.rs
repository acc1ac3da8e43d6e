pub trait ResultOkLogExt<T, E> {
    /// Logs the error at warn level and discards it.
    ///
    /// Per-file and per-sample failures are recovered locally and must never
    /// escalate past the caller; this keeps that policy in one place.
    fn ok_log(self) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }
}
