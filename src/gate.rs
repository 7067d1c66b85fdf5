//! Admission control in front of the dispatcher.
//!
//! The dispatcher never looks at rate-limit state. A transport layer owns an
//! [`AdmissionGate`] and calls [`Converter::convert_admitted`], which asks the
//! gate first and only then dispatches. A refused client gets
//! [`ConvertError::Rejected`] and no adapter runs.

use crate::convert::{ConversionResult, Converter};
use crate::error::ConvertError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Decides whether a client may start a conversion now.
pub trait AdmissionGate: Send + Sync {
    /// Admit (`true`) or refuse (`false`) one request from `client`.
    fn admit(&self, client: &str) -> bool;

    /// Seconds until `client` may try again after a refusal.
    fn retry_after_secs(&self, _client: &str) -> u64 {
        1
    }
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AdmissionGate for AllowAll {
    fn admit(&self, _client: &str) -> bool {
        true
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Allows `limit` requests per client in each fixed window.
///
/// `FixedWindowLimiter::per_minute(10)` matches a "10/minute" policy.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    fn clients(&self) -> std::sync::MutexGuard<'_, HashMap<String, Window>> {
        // The map stays consistent even if a holder panicked.
        self.clients.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AdmissionGate for FixedWindowLimiter {
    fn admit(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients();
        // Forget expired windows so idle clients do not accumulate.
        clients.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        true
    }

    fn retry_after_secs(&self, client: &str) -> u64 {
        let clients = self.clients();
        let Some(window) = clients.get(client) else {
            return 0;
        };
        let remaining = self
            .window
            .saturating_sub(Instant::now().duration_since(window.started));
        // Round up; a client told "0" would retry straight into the same window.
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

impl Converter {
    /// [`Converter::convert`] behind an admission check.
    ///
    /// # Errors
    /// [`ConvertError::Rejected`] when `gate` refuses `client`, plus every
    /// error of [`Converter::convert`].
    pub async fn convert_admitted(
        &self,
        gate: &dyn AdmissionGate,
        client: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<ConversionResult, ConvertError> {
        if !gate.admit(client) {
            let retry_after_secs = gate.retry_after_secs(client);
            debug!("Client {} rejected; retry after {}s", client, retry_after_secs);
            return Err(ConvertError::Rejected {
                client: client.to_string(),
                retry_after_secs,
            });
        }
        self.convert(filename, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::error::ErrorKind;

    struct DenyAll;

    impl AdmissionGate for DenyAll {
        fn admit(&self, _client: &str) -> bool {
            false
        }

        fn retry_after_secs(&self, _client: &str) -> u64 {
            42
        }
    }

    #[test]
    fn limiter_counts_per_client() {
        let gate = FixedWindowLimiter::per_minute(2);
        assert!(gate.admit("10.0.0.1"));
        assert!(gate.admit("10.0.0.1"));
        assert!(!gate.admit("10.0.0.1"));
        assert!(gate.admit("10.0.0.2"));

        let retry = gate.retry_after_secs("10.0.0.1");
        assert!((1..=60).contains(&retry), "got {retry}");
        assert_eq!(gate.retry_after_secs("never-seen"), 0);
    }

    #[test]
    fn limiter_window_expires() {
        let gate = FixedWindowLimiter::new(1, Duration::from_millis(50));
        assert!(gate.admit("c"));
        assert!(!gate.admit("c"));
        std::thread::sleep(Duration::from_millis(80));
        assert!(gate.admit("c"));
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_an_adapter() {
        // A converter pointing at a missing binary would fail with a process
        // error if dispatch happened.
        let converter = Converter::new(
            ConversionConfig::builder()
                .soffice_path("/definitely/not/installed/soffice")
                .build()
                .unwrap(),
        );
        let err = converter
            .convert_admitted(&DenyAll, "1.2.3.4", "legacy.doc", b"data")
            .await
            .unwrap_err();
        match err {
            ConvertError::Rejected {
                client,
                retry_after_secs,
            } => {
                assert_eq!(client, "1.2.3.4");
                assert_eq!(retry_after_secs, 42);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn admitted_requests_are_dispatched() {
        let err = tokio_test::block_on(Converter::default().convert_admitted(
            &AllowAll,
            "client",
            "notes.txt",
            b"hello",
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
