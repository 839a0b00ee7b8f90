//! Transfer Orchestration
//!
//! Drives the full pipeline for one payload: chunk encoding, script
//! assembly, paced emission over the output channel, and the cooperative
//! focus check after every step. A `TransferOperation` is single-shot:
//! once it reaches `Completed` or `Aborted` it cannot be reused, and a
//! fresh operation must be constructed to retry.

use crate::channel::{ChannelKind, OutputChannel};
use crate::config::types::TransferConfig;
use crate::transfer::chunk::{encoded_len, ChunkEncoder};
use crate::transfer::error::{Result, TransferError};
use crate::transfer::focus::{FocusGuard, FocusToken};
use crate::transfer::payload::{Payload, PayloadKind};
use crate::transfer::script::{Fragment, ScriptAssembler};
use crate::transfer::timing::TimingModel;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Assumed serial throughput for the pre-flight estimate: 115200 baud at
/// 10 wire bits per byte.
const SERIAL_BYTES_PER_SEC: f64 = 11_520.0;

/// Why a transfer reached `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The destination focus changed mid-transfer. Whatever was already
    /// delivered remains in the destination; nothing is rolled back.
    FocusLost,
    /// No destination context was available at start
    DestinationUnavailable,
    /// The payload source vanished before it could be read
    SourceMissing(String),
    /// The output channel failed to open or to send
    ChannelError(String),
    /// The payload could not be encoded for transmission
    EncodingFailure(String),
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::FocusLost => write!(f, "destination focus lost"),
            AbortReason::DestinationUnavailable => write!(f, "no destination context available"),
            AbortReason::SourceMissing(path) => write!(f, "payload source missing: {path}"),
            AbortReason::ChannelError(e) => write!(f, "channel error: {e}"),
            AbortReason::EncodingFailure(e) => write!(f, "encoding failure: {e}"),
        }
    }
}

impl From<TransferError> for AbortReason {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::FocusLost { .. } => AbortReason::FocusLost,
            TransferError::DestinationUnavailable => AbortReason::DestinationUnavailable,
            TransferError::SourceMissing(path) => {
                AbortReason::SourceMissing(path.display().to_string())
            }
            TransferError::ChannelOpen(e) | TransferError::Channel(e) => {
                AbortReason::ChannelError(e)
            }
            TransferError::Encoding(e) | TransferError::Archive(e) => {
                AbortReason::EncodingFailure(e)
            }
            TransferError::UnmappedCharacter(c) => {
                AbortReason::EncodingFailure(format!("unmapped character {c:?}"))
            }
            // The chunk source is the only IO inside the send loop
            TransferError::Io(e) => AbortReason::EncodingFailure(e.to_string()),
            TransferError::InvalidState(s) => AbortReason::ChannelError(s.to_string()),
        }
    }
}

/// Transfer lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// Constructed, estimate computed, nothing sent
    Created,
    /// The send loop is running
    Sending,
    /// Every fragment was delivered and every focus check passed
    Completed,
    /// The transfer stopped early; partial data may have been delivered
    Aborted(AbortReason),
}

impl TransferState {
    /// Whether the state is `Completed` or `Aborted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Aborted(_))
    }
}

/// Progress snapshot for one transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Fragments delivered so far
    pub fragments_sent: u64,
    /// Expected total fragment count (advisory)
    pub expected_fragments: u64,
    /// Units (events or bytes) accepted so far
    pub units_sent: u64,
    /// Time since the first fragment
    pub elapsed: Duration,
}

impl TransferProgress {
    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.expected_fragments == 0 {
            return 100.0;
        }
        (self.fragments_sent as f64 / self.expected_fragments as f64) * 100.0
    }

    /// Estimated time remaining, `None` before the first fragment lands
    pub fn eta(&self) -> Option<Duration> {
        if self.fragments_sent == 0 {
            return None;
        }
        let remaining = self.expected_fragments.saturating_sub(self.fragments_sent);
        Some(self.elapsed.mul_f64(remaining as f64 / self.fragments_sent as f64))
    }
}

/// One payload transfer over one output channel.
pub struct TransferOperation<C, G> {
    id: Uuid,
    payload: Payload,
    channel: C,
    guard: G,
    timing: TimingModel,
    chunk_size: usize,
    cooldown: Duration,
    estimated_runtime: Duration,
    state: TransferState,
    fragments_sent: u64,
    expected_fragments: u64,
    units_sent: u64,
    started: Option<Instant>,
}

impl<C: OutputChannel, G: FocusGuard> TransferOperation<C, G> {
    /// Construct an operation and compute its pre-flight runtime estimate.
    ///
    /// Nothing is sent until [`send`](Self::send) is called; the estimate
    /// is advisory, surfaced to the operator for confirmation, and not
    /// recomputed mid-flight.
    pub fn new(payload: Payload, channel: C, guard: G, config: &TransferConfig) -> Self {
        let timing =
            TimingModel::new(config.security_level).with_floor(channel.kind().delay_floor());
        let estimated_runtime = estimate_runtime(&payload, channel.kind(), config);

        Self {
            id: Uuid::new_v4(),
            payload,
            channel,
            guard,
            timing,
            chunk_size: config.chunk_size.max(1),
            cooldown: Duration::from_millis(config.cooldown_ms),
            estimated_runtime,
            state: TransferState::Created,
            fragments_sent: 0,
            expected_fragments: 0,
            units_sent: 0,
            started: None,
        }
    }

    /// Operation id, used to correlate log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Pre-flight runtime estimate
    pub fn estimated_runtime(&self) -> Duration {
        self.estimated_runtime
    }

    /// Consume the operation and hand back its channel.
    ///
    /// Useful once a terminal state is reached, e.g. to inspect or reuse
    /// the underlying resource for a fresh operation.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Progress snapshot
    pub fn progress(&self) -> TransferProgress {
        TransferProgress {
            fragments_sent: self.fragments_sent,
            expected_fragments: self.expected_fragments,
            units_sent: self.units_sent,
            elapsed: self.started.map(|t| t.elapsed()).unwrap_or(Duration::ZERO),
        }
    }

    /// Drive the pipeline to completion or abort.
    ///
    /// Blocks the calling task for the whole transfer, sleeping between
    /// fragments to implement pacing. Errors never escape: every failure
    /// is folded into the terminal state. Calling `send` on a consumed
    /// operation is a usage error and leaves the existing state untouched.
    pub async fn send(&mut self) -> &TransferState {
        if self.state != TransferState::Created {
            error!(id = %self.id, state = ?self.state, "send called on a consumed operation");
            return &self.state;
        }

        self.state = TransferState::Sending;
        info!(
            id = %self.id,
            kind = ?self.payload.kind(),
            channel = ?self.channel.kind(),
            bytes = self.payload.len(),
            estimated = ?self.estimated_runtime,
            "Transfer starting"
        );

        self.state = match self.run().await {
            Ok(()) => {
                info!(
                    id = %self.id,
                    fragments = self.fragments_sent,
                    units = self.units_sent,
                    "Transfer completed"
                );
                TransferState::Completed
            }
            Err(e) => {
                let reason = AbortReason::from(e);
                error!(
                    id = %self.id,
                    fragments = self.fragments_sent,
                    units = self.units_sent,
                    %reason,
                    "Transfer aborted"
                );
                TransferState::Aborted(reason)
            }
        };
        &self.state
    }

    async fn run(&mut self) -> Result<()> {
        let token = self.guard.capture()?;

        // A failed check before the first fragment aborts without ever
        // touching the channel
        if !self.guard.still_active(&token) {
            return Err(TransferError::FocusLost { fragments_sent: 0 });
        }

        self.channel.open().await?;
        let result = self.drive(token).await;

        if let Err(e) = self.channel.close().await {
            warn!(id = %self.id, error = %e, "Channel close failed");
        }
        result
    }

    async fn drive(&mut self, token: FocusToken) -> Result<()> {
        if !self.cooldown.is_zero() {
            debug!(id = %self.id, cooldown = ?self.cooldown, "Cooldown before first fragment");
            tokio::time::sleep(self.cooldown).await;
            if !self.guard.still_active(&token) {
                return Err(TransferError::FocusLost { fragments_sent: 0 });
            }
        }

        let assembler = ScriptAssembler::new(self.channel.kind().quote_style());
        let fragments: Box<dyn Iterator<Item = Result<Fragment>> + Send> =
            match self.payload.kind() {
                PayloadKind::Text => {
                    let text = self.payload.as_text().unwrap_or_default();
                    let fragments = assembler.text_fragments(&text, self.chunk_size);
                    self.expected_fragments = fragments.len() as u64;
                    Box::new(fragments.into_iter().map(Ok))
                }
                PayloadKind::FileArchive => {
                    let reader = self.payload.reader()?;
                    let chunks = ChunkEncoder::new(reader, self.chunk_size);
                    // Chunks plus the five script framing fragments
                    self.expected_fragments = self.payload.len().div_ceil(self.chunk_size as u64) + 5;
                    Box::new(assembler.archive_fragments(chunks, Utc::now()))
                }
            };

        self.started = Some(Instant::now());
        for fragment in fragments {
            let fragment = fragment?;

            let units = self.channel.send(&fragment.text).await?;
            self.fragments_sent += 1;
            self.units_sent += units;

            let percentage = self.progress().percentage();
            debug!(
                id = %self.id,
                fragment = self.fragments_sent,
                chunk = ?fragment.chunk,
                units,
                percentage,
                "Fragment delivered"
            );

            let delay = self.timing.delay(units);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if !self.guard.still_active(&token) {
                return Err(TransferError::FocusLost {
                    fragments_sent: self.fragments_sent,
                });
            }
        }

        Ok(())
    }
}

/// Pre-flight runtime estimate.
///
/// Keystroke/archive: `ceil(encoded / chunk_size)` chunks, floored at one
/// so a non-empty payload never estimates to zero, times the full-chunk
/// event cost. Keystroke/text: two events per byte. Serial: the larger of
/// wire time at the assumed link rate and the pacing time.
fn estimate_runtime(payload: &Payload, kind: ChannelKind, config: &TransferConfig) -> Duration {
    let multiplier = config.security_level.multiplier();
    let chunk_size = config.chunk_size.max(1) as u64;

    match kind {
        ChannelKind::Keystroke => match payload.kind() {
            PayloadKind::Text => millis(payload.len() as f64 * 2.0 * multiplier),
            PayloadKind::FileArchive => {
                let encoded = encoded_len(payload.len());
                let chunks = encoded.div_ceil(chunk_size).max(1);
                millis((chunks * chunk_size) as f64 * 2.0 * multiplier)
            }
        },
        ChannelKind::Serial => {
            let encoded = match payload.kind() {
                PayloadKind::Text => payload.len(),
                PayloadKind::FileArchive => encoded_len(payload.len()),
            };
            let wire = Duration::from_secs_f64(encoded as f64 / SERIAL_BYTES_PER_SEC);
            wire.max(millis(encoded as f64 * multiplier))
        }
    }
}

fn millis(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0) / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::timing::SecurityLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct RecordingChannel {
        kind: ChannelKind,
        opened: bool,
        closed: bool,
        sent: Vec<String>,
        fail_open: bool,
        fail_at: Option<usize>,
    }

    impl RecordingChannel {
        fn keystroke() -> Self {
            Self {
                kind: ChannelKind::Keystroke,
                opened: false,
                closed: false,
                sent: Vec::new(),
                fail_open: false,
                fail_at: None,
            }
        }
    }

    #[async_trait]
    impl OutputChannel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(TransferError::ChannelOpen("no port".into()));
            }
            self.opened = true;
            Ok(())
        }

        async fn send(&mut self, fragment: &str) -> Result<u64> {
            if self.fail_at == Some(self.sent.len()) {
                return Err(TransferError::Channel("device gone".into()));
            }
            self.sent.push(fragment.to_string());
            Ok(fragment.len() as u64)
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    /// Guard that reports active for the first `active_checks` checks
    struct ScriptedGuard {
        active_checks: u64,
        checks: Arc<AtomicU64>,
    }

    impl ScriptedGuard {
        fn active_for(active_checks: u64) -> Self {
            Self {
                active_checks,
                checks: Arc::new(AtomicU64::new(0)),
            }
        }

        fn always_active() -> Self {
            Self::active_for(u64::MAX)
        }
    }

    impl FocusGuard for ScriptedGuard {
        fn capture(&mut self) -> Result<FocusToken> {
            Ok(FocusToken::new(1))
        }

        fn still_active(&self, _token: &FocusToken) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) < self.active_checks
        }
    }

    fn test_config() -> TransferConfig {
        TransferConfig {
            security_level: SecurityLevel::VeryUnsafe,
            cooldown_ms: 0,
            chunk_size: 3,
        }
    }

    #[tokio::test]
    async fn test_text_transfer_completes_in_order() {
        let payload = Payload::text("abcdef");
        let mut op = TransferOperation::new(
            payload,
            RecordingChannel::keystroke(),
            ScriptedGuard::always_active(),
            &test_config(),
        );

        let state = op.send().await.clone();
        assert_eq!(state, TransferState::Completed);
        assert_eq!(op.channel.sent, vec!["abc", "def"]);
        assert!(op.channel.opened);
        assert!(op.channel.closed);

        let progress = op.progress();
        assert_eq!(progress.fragments_sent, 2);
        assert_eq!(progress.units_sent, 6);
        assert_eq!(progress.percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_focus_lost_before_start_never_touches_channel() {
        let payload = Payload::text("abc");
        let mut op = TransferOperation::new(
            payload,
            RecordingChannel::keystroke(),
            ScriptedGuard::active_for(0),
            &test_config(),
        );

        let state = op.send().await.clone();
        assert_eq!(state, TransferState::Aborted(AbortReason::FocusLost));
        assert!(!op.channel.opened);
        assert!(!op.channel.closed);
        assert!(op.channel.sent.is_empty());
    }

    #[tokio::test]
    async fn test_focus_lost_mid_transfer_stops_emission() {
        let payload = Payload::text("abcdefghi");
        // Pre-check plus one post-fragment check pass, the next fails
        let mut op = TransferOperation::new(
            payload,
            RecordingChannel::keystroke(),
            ScriptedGuard::active_for(2),
            &test_config(),
        );

        let state = op.send().await.clone();
        assert_eq!(state, TransferState::Aborted(AbortReason::FocusLost));
        assert_eq!(op.channel.sent.len(), 2);
        assert!(op.channel.closed);
        assert_eq!(op.progress().fragments_sent, 2);
    }

    #[tokio::test]
    async fn test_channel_open_failure_aborts_before_sending() {
        let payload = Payload::text("abc");
        let mut channel = RecordingChannel::keystroke();
        channel.fail_open = true;
        let mut op = TransferOperation::new(
            payload,
            channel,
            ScriptedGuard::always_active(),
            &test_config(),
        );

        let state = op.send().await.clone();
        assert!(matches!(state, TransferState::Aborted(AbortReason::ChannelError(_))));
        assert!(op.channel.sent.is_empty());
    }

    #[tokio::test]
    async fn test_channel_send_failure_aborts() {
        let payload = Payload::text("abcdef");
        let mut channel = RecordingChannel::keystroke();
        channel.fail_at = Some(1);
        let mut op = TransferOperation::new(
            payload,
            channel,
            ScriptedGuard::always_active(),
            &test_config(),
        );

        let state = op.send().await.clone();
        assert!(matches!(state, TransferState::Aborted(AbortReason::ChannelError(_))));
        assert_eq!(op.channel.sent.len(), 1);
        assert!(op.channel.closed);
    }

    #[tokio::test]
    async fn test_send_is_single_shot() {
        let payload = Payload::text("ab");
        let mut op = TransferOperation::new(
            payload,
            RecordingChannel::keystroke(),
            ScriptedGuard::always_active(),
            &test_config(),
        );

        assert_eq!(op.send().await.clone(), TransferState::Completed);
        let sent_after_first = op.channel.sent.len();

        // Second call is a usage error: state untouched, nothing re-sent
        assert_eq!(op.send().await.clone(), TransferState::Completed);
        assert_eq!(op.channel.sent.len(), sent_after_first);
    }

    #[tokio::test]
    async fn test_archive_transfer_emits_script_framing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"payload bytes here").unwrap();
        let payload = Payload::archive(&[file]).unwrap();

        let mut config = test_config();
        config.chunk_size = 192;
        let mut op = TransferOperation::new(
            payload,
            RecordingChannel::keystroke(),
            ScriptedGuard::always_active(),
            &config,
        );

        assert_eq!(op.send().await.clone(), TransferState::Completed);
        let sent = &op.channel.sent;
        assert_eq!(sent.first().unwrap(), "$b=@(");
        assert!(sent.iter().any(|f| f.starts_with(");$fs=")));
        assert_eq!(sent.last().unwrap(), "\r");
    }

    #[test]
    fn test_estimate_keystroke_text() {
        let payload = Payload::text("x".repeat(100).as_str());
        let config = TransferConfig {
            security_level: SecurityLevel::Safe,
            cooldown_ms: 0,
            chunk_size: 192,
        };
        // 100 chars x 2 events x 2ms
        assert_eq!(
            estimate_runtime(&payload, ChannelKind::Keystroke, &config),
            Duration::from_millis(400)
        );
    }

    #[test]
    fn test_estimate_floors_at_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tiny");
        std::fs::write(&file, b"ab").unwrap();
        let archive = Payload::archive(&[file]).unwrap();
        let config = TransferConfig {
            security_level: SecurityLevel::Average,
            cooldown_ms: 0,
            chunk_size: 1_000_000,
        };

        // Tiny archive, huge chunk size: still one full chunk's worth
        let estimate = estimate_runtime(&archive, ChannelKind::Keystroke, &config);
        assert_eq!(estimate, Duration::from_secs_f64(2_000_000.0 / 1000.0));
    }

    #[test]
    fn test_estimate_serial_scales_with_level() {
        let payload = Payload::text("x".repeat(1000).as_str());
        let slow = TransferConfig {
            security_level: SecurityLevel::Guaranteed,
            cooldown_ms: 0,
            chunk_size: 192,
        };
        let fast = TransferConfig {
            security_level: SecurityLevel::VeryUnsafe,
            cooldown_ms: 0,
            chunk_size: 192,
        };

        let slow_estimate = estimate_runtime(&payload, ChannelKind::Serial, &slow);
        let fast_estimate = estimate_runtime(&payload, ChannelKind::Serial, &fast);
        assert!(slow_estimate > fast_estimate);
        // The wire-time floor dominates at the fastest levels
        assert!(fast_estimate >= Duration::from_secs_f64(1000.0 / SERIAL_BYTES_PER_SEC));
    }
}
