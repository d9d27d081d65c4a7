//! Async download driver.
//!
//! [`download_history`] runs a [`StateMachine`] against a
//! [`FlowerPowerDevice`]: commands returned by the machine are executed in
//! order, their completions are fed back as events ahead of anything on the
//! notification stream, and the driver otherwise waits for the next
//! notification. A session with no event for `stall_timeout` is abandoned.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use flowerpower_types::HistoryLog;

use crate::error::{Error, Result};
use crate::protocol::{Command, Completion, Event, HostClock, StateMachine, system_clock};
use crate::traits::FlowerPowerDevice;

/// Default idle window before a download is abandoned.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Transfer progress, reported after every received fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadProgress {
    /// Fragments received so far.
    pub fragments: u32,
    /// Payload bytes received so far.
    pub bytes_received: usize,
    /// Total buffer length announced by the first fragment.
    pub expected_length: u32,
}

impl DownloadProgress {
    /// Fraction of the buffer received, between 0.0 and 1.0.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.expected_length == 0 {
            return 0.0;
        }
        (self.bytes_received as f32 / self.expected_length as f32).min(1.0)
    }
}

/// Type alias for the progress callback.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Options for a history download.
///
/// ```ignore
/// let options = DownloadOptions::default()
///     .stall_timeout(Duration::from_secs(30))
///     .with_progress(|p| println!("{:.0}%", p.fraction() * 100.0));
/// ```
#[derive(Clone, Default)]
pub struct DownloadOptions {
    /// Abandon the session when no event arrives within this window.
    /// `None` uses [`DEFAULT_STALL_TIMEOUT`].
    pub stall_timeout: Option<Duration>,
    /// Progress callback (optional).
    pub progress_callback: Option<ProgressCallback>,
    /// Token a supervisor can trigger to abort the download.
    pub cancel_token: Option<CancellationToken>,
    /// Host clock used to anchor record timestamps. Defaults to the system clock.
    pub clock: Option<HostClock>,
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("stall_timeout", &self.stall_timeout)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("cancel_token", &self.cancel_token)
            .field("clock", &self.clock.is_some())
            .finish()
    }
}

impl DownloadOptions {
    /// Create new download options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = Some(stall_timeout);
        self
    }

    /// Set a progress callback.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Abort the download when `token` is cancelled.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: HostClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn effective_stall_timeout(&self) -> Duration {
        self.stall_timeout.unwrap_or(DEFAULT_STALL_TIMEOUT)
    }

    fn report(&self, progress: DownloadProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// Download the complete history of `device`.
///
/// The device is asked to disconnect afterwards, whether the session
/// succeeded or not.
///
/// # Errors
///
/// - [`Error::Timeout`] if no event arrives within the stall timeout.
/// - [`Error::Disconnected`] if the notification stream ends before the
///   session finished.
/// - [`Error::Cancelled`] if the cancellation token fired.
/// - Any error from the state machine or the device.
#[tracing::instrument(level = "info", skip_all, fields(address = %device.address()))]
pub async fn download_history<D>(device: &D, options: DownloadOptions) -> Result<HistoryLog>
where
    D: FlowerPowerDevice + ?Sized,
{
    let clock = options.clock.clone().unwrap_or_else(system_clock);
    let mut machine = StateMachine::with_clock(device.address(), clock);

    let result = drive(device, &mut machine, &options).await;

    if machine.unexpected_status_count() > 0 {
        warn!(
            count = machine.unexpected_status_count(),
            "ignored unexpected transfer status values"
        );
    }
    if let Err(e) = device.disconnect().await {
        warn!("Failed to disconnect: {}", e);
    }

    match &result {
        Ok(log) => info!(measurements = log.len(), "download complete"),
        Err(e) => warn!(state = %machine.state(), "download failed: {}", e),
    }
    result
}

async fn drive<D>(
    device: &D,
    machine: &mut StateMachine,
    options: &DownloadOptions,
) -> Result<HistoryLog>
where
    D: FlowerPowerDevice + ?Sized,
{
    let stall_timeout = options.effective_stall_timeout();
    let cancel = options
        .cancel_token
        .clone()
        .unwrap_or_else(CancellationToken::new);
    let mut notifications = device.notifications().await?;

    let mut pending = VecDeque::from([Event::Start]);
    let mut stored = None;
    let mut reported_fragments = 0;

    loop {
        while let Some(event) = pending.pop_front() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            for command in machine.handle_event(event)? {
                if let Some(completion) = execute(device, command, &mut stored).await? {
                    match completion.into_event() {
                        Some(event) => pending.push_back(event),
                        None => debug!("completion without protocol event"),
                    }
                }
            }

            let session = machine.session();
            if session.fragment_count != reported_fragments {
                reported_fragments = session.fragment_count;
                options.report(DownloadProgress {
                    fragments: session.fragment_count,
                    bytes_received: session.bytes_received,
                    expected_length: session.expected_length,
                });
            }
        }

        if machine.finished() {
            break;
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = timeout(stall_timeout, notifications.next()) => next,
        };

        match next {
            Err(_) => {
                return Err(Error::timeout(
                    format!("waiting in state {}", machine.state()),
                    stall_timeout,
                ));
            }
            Ok(None) => {
                return Err(Error::Disconnected {
                    state: machine.state(),
                });
            }
            Ok(Some((characteristic, data))) => {
                let completion = Completion::Value {
                    characteristic,
                    data,
                };
                match completion.into_event() {
                    Some(event) => pending.push_back(event),
                    None => debug!(%characteristic, "ignoring notification"),
                }
            }
        }
    }

    stored.ok_or_else(|| Error::invalid_data("session finished without a history log"))
}

/// Execute one command. Returns the completion to feed back, if any.
async fn execute<D>(
    device: &D,
    command: Command,
    stored: &mut Option<HistoryLog>,
) -> Result<Option<Completion>>
where
    D: FlowerPowerDevice + ?Sized,
{
    let completion = match command {
        Command::Read(characteristic) => Completion::Value {
            characteristic,
            data: device.read(characteristic).await?,
        },
        Command::WriteByte(characteristic, value) => {
            device.write_byte(characteristic, value).await?;
            Completion::WriteComplete(characteristic)
        }
        Command::WriteU32Le(characteristic, value) => {
            device.write_u32_le(characteristic, value).await?;
            Completion::WriteComplete(characteristic)
        }
        Command::RegisterNotifications(characteristic) => {
            device.register_notifications(characteristic).await?;
            Completion::NotifyEnabled(characteristic)
        }
        Command::Store(log) => {
            *stored = Some(log);
            return Ok(None);
        }
    };
    Ok(Some(completion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let progress = DownloadProgress {
            fragments: 2,
            bytes_received: 36,
            expected_length: 72,
        };
        assert!((progress.fraction() - 0.5).abs() < f32::EPSILON);
        assert_eq!(DownloadProgress::default().fraction(), 0.0);
    }

    #[test]
    fn test_progress_fraction_clamped() {
        // The last fragment is padded past the announced length.
        let progress = DownloadProgress {
            fragments: 3,
            bytes_received: 54,
            expected_length: 40,
        };
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_options_default() {
        let options = DownloadOptions::default();
        assert_eq!(options.effective_stall_timeout(), DEFAULT_STALL_TIMEOUT);
        assert!(options.progress_callback.is_none());
        assert!(options.cancel_token.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = DownloadOptions::new()
            .stall_timeout(Duration::from_secs(5))
            .with_progress(|_| {})
            .clock(Arc::new(|| 42));
        assert_eq!(options.effective_stall_timeout(), Duration::from_secs(5));
        assert!(options.progress_callback.is_some());
        assert_eq!((options.clock.unwrap())(), 42);
    }

    #[test]
    fn test_options_debug_hides_callbacks() {
        let options = DownloadOptions::new().with_progress(|_| {});
        let debug = format!("{:?}", options);
        assert!(debug.contains("progress_callback: true"));
    }
}
