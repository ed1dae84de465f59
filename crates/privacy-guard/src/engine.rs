//! Dimming decision engine
//!
//! Two states, Normal and Dimmed. A state flip needs a changed condition:
//! either the face count drops to one or less, or new browser content
//! arrives and gets a verdict. While the browser timestamp is unchanged the
//! engine keeps its current state and does not ask for a new verdict.

use serde::Serialize;
use signal_clients::BrightnessActuator;
use std::fmt;
use tracing::{debug, info, warn};

use crate::signals::{SensitivityCheck, SignalHub, Signals};
use crate::GuardError;

/// Brightness assumed when the display cannot be read at startup
pub const FALLBACK_BRIGHTNESS: u8 = 100;

/// The engine's persistent memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuardState {
    pub is_dimmed: bool,
    /// Brightness captured at startup and restored on un-dim
    pub original_brightness: u8,
    pub dimmed_brightness: u8,
    /// Timestamp of the last browser snapshot that was judged
    pub last_browser_timestamp: i64,
}

/// Outcome of the decision rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Dim,
    KeepDimmed,
    DoNotDim,
}

/// Why a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    InsufficientFaces(u32),
    PreservingDimmed(u32),
    NoNewBrowserData,
    NoContent,
    Sensitive(u32),
    NotSensitive(u32),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::InsufficientFaces(n) => write!(f, "only {} face(s) detected", n),
            Reason::PreservingDimmed(n) => write!(
                f,
                "multiple faces ({}), no new browser data, preserving state",
                n
            ),
            Reason::NoNewBrowserData => write!(f, "no new browser data"),
            Reason::NoContent => write!(f, "no content to analyze"),
            Reason::Sensitive(n) => write!(f, "multiple faces ({}) with sensitive content", n),
            Reason::NotSensitive(n) => write!(f, "content not sensitive ({} faces)", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
}

impl Verdict {
    fn new(decision: Decision, reason: Reason) -> Self {
        Self { decision, reason }
    }
}

/// A brightness change the engine performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Actuation {
    Dimmed(u8),
    Restored(u8),
}

impl Actuation {
    fn kind(&self) -> &'static str {
        match self {
            Actuation::Dimmed(_) => "dim",
            Actuation::Restored(_) => "restore",
        }
    }
}

/// What one cycle decided and did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleOutcome {
    pub face_count: u32,
    pub verdict: Verdict,
    pub actuation: Option<Actuation>,
}

/// Decision engine owning the brightness actuator
pub struct DecisionEngine {
    actuator: Box<dyn BrightnessActuator>,
    state: GuardState,
}

impl DecisionEngine {
    /// Capture the current brightness and start in Normal
    pub async fn new(actuator: Box<dyn BrightnessActuator>, dimmed_brightness: u8) -> Self {
        let original_brightness = match actuator.get().await {
            Ok(brightness) => brightness,
            Err(e) => {
                warn!(
                    "Could not read display brightness, assuming {}%: {}",
                    FALLBACK_BRIGHTNESS, e
                );
                FALLBACK_BRIGHTNESS
            }
        };
        info!(
            "Decision engine ready (original {}%, dimmed {}%)",
            original_brightness, dimmed_brightness
        );

        Self {
            actuator,
            state: GuardState {
                is_dimmed: false,
                original_brightness,
                dimmed_brightness: dimmed_brightness.min(100),
                last_browser_timestamp: 0,
            },
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Evaluate the decision rule. Records the browser timestamp when the
    /// snapshot is new; never touches the display.
    pub async fn decide(
        &mut self,
        signals: &Signals,
        sensitivity: &dyn SensitivityCheck,
    ) -> Verdict {
        let faces = signals.face_count;
        if faces <= 1 {
            return Verdict::new(Decision::DoNotDim, Reason::InsufficientFaces(faces));
        }

        let snapshot = &signals.snapshot;
        if snapshot.timestamp == self.state.last_browser_timestamp {
            return if self.state.is_dimmed {
                Verdict::new(Decision::KeepDimmed, Reason::PreservingDimmed(faces))
            } else {
                Verdict::new(Decision::DoNotDim, Reason::NoNewBrowserData)
            };
        }

        self.state.last_browser_timestamp = snapshot.timestamp;

        if !snapshot.has_content() {
            return Verdict::new(Decision::DoNotDim, Reason::NoContent);
        }

        if sensitivity.is_sensitive(&snapshot.content(), &snapshot.url).await {
            Verdict::new(Decision::Dim, Reason::Sensitive(faces))
        } else {
            Verdict::new(Decision::DoNotDim, Reason::NotSensitive(faces))
        }
    }

    /// Carry out the transition a verdict implies, if any.
    ///
    /// A failed brightness change leaves the state as it was; the next
    /// cycle re-evaluates and retries.
    pub async fn apply(&mut self, verdict: &Verdict) -> Result<Option<Actuation>, GuardError> {
        let actuation = match (verdict.decision, self.state.is_dimmed) {
            (Decision::Dim, false) => {
                info!("Dimming screen: {}", verdict.reason);
                self.set(self.state.dimmed_brightness).await?;
                self.state.is_dimmed = true;
                Actuation::Dimmed(self.state.dimmed_brightness)
            }
            (Decision::DoNotDim, true) => {
                info!("Restoring screen brightness: {}", verdict.reason);
                self.set(self.state.original_brightness).await?;
                self.state.is_dimmed = false;
                Actuation::Restored(self.state.original_brightness)
            }
            _ => {
                debug!("Screen state unchanged: {}", verdict.reason);
                return Ok(None);
            }
        };

        metrics::counter!("privacy_guard_actuations_total", "kind" => actuation.kind()).increment(1);
        Ok(Some(actuation))
    }

    /// Gather signals, decide, and apply
    pub async fn cycle(&mut self, hub: &SignalHub) -> Result<CycleOutcome, GuardError> {
        let signals = hub.gather().await;
        metrics::gauge!("privacy_guard_face_count").set(signals.face_count as f64);

        let verdict = self.decide(&signals, hub).await;
        let actuation = self.apply(&verdict).await?;

        Ok(CycleOutcome {
            face_count: signals.face_count,
            verdict,
            actuation,
        })
    }

    /// Restore the original brightness if dimmed, whatever the last verdict
    pub async fn stop(&mut self) -> Result<Option<Actuation>, GuardError> {
        if !self.state.is_dimmed {
            return Ok(None);
        }

        info!(
            "Restoring original brightness {}% on shutdown",
            self.state.original_brightness
        );
        self.set(self.state.original_brightness).await?;
        self.state.is_dimmed = false;
        Ok(Some(Actuation::Restored(self.state.original_brightness)))
    }

    async fn set(&self, percent: u8) -> Result<(), GuardError> {
        self.actuator
            .set(percent)
            .await
            .map_err(GuardError::Actuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use signal_clients::{BrowserSnapshot, SimulatedBrightness};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedCheck {
        verdict: bool,
        calls: AtomicUsize,
    }

    impl ScriptedCheck {
        fn answering(verdict: bool) -> Self {
            Self {
                verdict,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SensitivityCheck for ScriptedCheck {
        async fn is_sensitive(&self, _content: &str, _url: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict
        }
    }

    fn bank_page(timestamp: i64) -> BrowserSnapshot {
        BrowserSnapshot {
            url: "https://bank.example/acct".to_string(),
            title: String::new(),
            text_content: "Balance: $10,000".to_string(),
            timestamp,
        }
    }

    fn signals(face_count: u32, snapshot: BrowserSnapshot) -> Signals {
        Signals {
            face_count,
            snapshot,
        }
    }

    async fn engine_at(brightness: u8) -> (DecisionEngine, SimulatedBrightness) {
        let display = SimulatedBrightness::new(brightness);
        let engine = DecisionEngine::new(Box::new(display.clone()), 30).await;
        (engine, display)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let (engine, display) = engine_at(75).await;
        let state = engine.state();
        assert!(!state.is_dimmed);
        assert_eq!(state.original_brightness, 75);
        assert_eq!(state.dimmed_brightness, 30);
        assert_eq!(state.last_browser_timestamp, 0);
        assert!(display.writes().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_brightness_defaults_to_full() {
        let display = SimulatedBrightness::new(40);
        display.fail_reads(true);
        let engine = DecisionEngine::new(Box::new(display), 30).await;
        assert_eq!(engine.state().original_brightness, FALLBACK_BRIGHTNESS);
    }

    #[tokio::test]
    async fn test_sensitive_content_with_onlooker_dims() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        assert_eq!(verdict.decision, Decision::Dim);
        assert_eq!(verdict.reason, Reason::Sensitive(2));

        let actuation = engine.apply(&verdict).await.unwrap();
        assert_eq!(actuation, Some(Actuation::Dimmed(30)));
        assert_eq!(display.writes(), vec![30]);
        assert!(engine.state().is_dimmed);
        assert_eq!(engine.state().last_browser_timestamp, 5);
        assert_eq!(check.calls(), 1);
    }

    #[tokio::test]
    async fn test_insensitive_content_leaves_display_alone() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(false);

        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        assert_eq!(verdict.decision, Decision::DoNotDim);
        assert_eq!(engine.apply(&verdict).await.unwrap(), None);
        assert!(display.writes().is_empty());
        assert!(!engine.state().is_dimmed);
    }

    #[tokio::test]
    async fn test_single_face_restores() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        engine.apply(&verdict).await.unwrap();

        let verdict = engine.decide(&signals(1, bank_page(5)), &check).await;
        assert_eq!(verdict.decision, Decision::DoNotDim);
        assert_eq!(verdict.reason, Reason::InsufficientFaces(1));
        assert_eq!(
            engine.apply(&verdict).await.unwrap(),
            Some(Actuation::Restored(75))
        );
        assert_eq!(display.writes(), vec![30, 75]);
        assert!(!engine.state().is_dimmed);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_keeps_dimmed_without_new_check() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let verdict = engine.decide(&signals(3, bank_page(5)), &check).await;
        engine.apply(&verdict).await.unwrap();

        let verdict = engine.decide(&signals(3, bank_page(5)), &check).await;
        assert_eq!(verdict.decision, Decision::KeepDimmed);
        assert_eq!(verdict.reason, Reason::PreservingDimmed(3));
        assert_eq!(engine.apply(&verdict).await.unwrap(), None);

        assert_eq!(check.calls(), 1);
        assert_eq!(display.writes(), vec![30]);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_in_normal_is_not_rechecked() {
        let (mut engine, _display) = engine_at(75).await;
        let check = ScriptedCheck::answering(false);

        engine.decide(&signals(2, bank_page(5)), &check).await;
        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        assert_eq!(verdict.reason, Reason::NoNewBrowserData);
        assert_eq!(check.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_not_checked() {
        let (mut engine, _display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let empty = BrowserSnapshot {
            timestamp: 9,
            ..Default::default()
        };
        let verdict = engine.decide(&signals(2, empty), &check).await;
        assert_eq!(verdict.reason, Reason::NoContent);
        assert_eq!(engine.state().last_browser_timestamp, 9);
        assert_eq!(check.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_needs_a_url_to_be_checked() {
        let (mut engine, _display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let blank = BrowserSnapshot {
            title: "  ".to_string(),
            text_content: "\n".to_string(),
            timestamp: 3,
            ..Default::default()
        };
        let verdict = engine.decide(&signals(2, blank.clone()), &check).await;
        assert_eq!(verdict.reason, Reason::NoContent);
        assert_eq!(check.calls(), 0);

        let url_only = BrowserSnapshot {
            url: "https://bank.example".to_string(),
            timestamp: 4,
            ..blank
        };
        let verdict = engine.decide(&signals(2, url_only), &check).await;
        assert_eq!(verdict.decision, Decision::Dim);
        assert_eq!(check.calls(), 1);
    }

    #[tokio::test]
    async fn test_default_snapshot_matches_initial_timestamp() {
        // A failed snapshot fetch yields timestamp 0, which is never "new"
        let (mut engine, _display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let verdict = engine
            .decide(&signals(2, BrowserSnapshot::default()), &check)
            .await;
        assert_eq!(verdict.reason, Reason::NoNewBrowserData);
        assert_eq!(check.calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_do_not_dim_is_idempotent() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(false);

        for _ in 0..2 {
            let verdict = engine.decide(&signals(0, BrowserSnapshot::default()), &check).await;
            assert_eq!(engine.apply(&verdict).await.unwrap(), None);
        }
        assert!(display.writes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_dim_leaves_state_unchanged() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);
        display.fail_writes(true);

        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        let result = engine.apply(&verdict).await;
        assert!(matches!(result, Err(GuardError::Actuation(_))));
        assert!(!engine.state().is_dimmed);

        // Same snapshot next cycle: not new, so no retry until new data arrives
        display.fail_writes(false);
        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        assert_eq!(verdict.decision, Decision::DoNotDim);

        let verdict = engine.decide(&signals(2, bank_page(6)), &check).await;
        assert_eq!(
            engine.apply(&verdict).await.unwrap(),
            Some(Actuation::Dimmed(30))
        );
    }

    #[tokio::test]
    async fn test_stop_restores_original_once() {
        let (mut engine, display) = engine_at(75).await;
        let check = ScriptedCheck::answering(true);

        let verdict = engine.decide(&signals(2, bank_page(5)), &check).await;
        engine.apply(&verdict).await.unwrap();

        assert_eq!(engine.stop().await.unwrap(), Some(Actuation::Restored(75)));
        assert_eq!(engine.stop().await.unwrap(), None);
        assert_eq!(display.writes(), vec![30, 75]);
        assert_eq!(display.brightness(), 75);
    }

    #[tokio::test]
    async fn test_stop_when_normal_is_noop() {
        let (mut engine, display) = engine_at(75).await;
        assert_eq!(engine.stop().await.unwrap(), None);
        assert!(display.writes().is_empty());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            Reason::InsufficientFaces(1).to_string(),
            "only 1 face(s) detected"
        );
        assert_eq!(Reason::NoContent.to_string(), "no content to analyze");
    }

    proptest! {
        #[test]
        fn prop_few_faces_never_checks_or_dims(
            faces in 0u32..=1,
            timestamp in any::<i64>(),
            url in "[a-z:/.]{0,20}",
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (mut engine, _display) = engine_at(75).await;
                let check = ScriptedCheck::answering(true);
                let snapshot = BrowserSnapshot { url, timestamp, ..Default::default() };

                let verdict = engine.decide(&signals(faces, snapshot), &check).await;
                prop_assert_eq!(verdict.decision, Decision::DoNotDim);
                prop_assert_eq!(check.calls(), 0);
                prop_assert_eq!(engine.state().last_browser_timestamp, 0);
                Ok(())
            })?;
        }
    }
}
