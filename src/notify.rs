/// User-visible notices. The host decides how to show them.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

/// Notices go to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, message: &str) {
        log::info!("notice: {message}");
    }
}
