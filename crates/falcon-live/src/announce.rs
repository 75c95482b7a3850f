//! Debounced voice announcements.
//!
//! Each applied batch is offered to the engine. A batch with nothing new in
//! it is ignored. Otherwise a single announcement is scheduled after the
//! settle window, and any newer batch in the meantime replaces it. The
//! announcement text is kept for display even when no speech backend exists.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use falcon_models::DetectionBatch;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::VoiceConfig;
use crate::metrics;
use crate::speech::{SpeechSink, Utterance};

/// Per-class counts in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounts(Vec<(String, usize)>);

impl ClassCounts {
    /// Count detections by display name.
    pub fn from_batch(batch: &DetectionBatch) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for detection in batch {
            let name = detection.display_name();
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        Self(counts)
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(n, c)| (n.as_str(), *c))
    }

    /// True when every class in `self` has the same count in `previous`.
    ///
    /// Classes that disappeared since `previous` are not considered, so a
    /// scene that only loses objects counts as unchanged.
    pub fn matches_previous(&self, previous: &ClassCounts) -> bool {
        !previous.is_empty() && self.iter().all(|(name, count)| previous.get(name) == Some(count))
    }
}

impl<const N: usize> From<[(&str, usize); N]> for ClassCounts {
    fn from(pairs: [(&str, usize); N]) -> Self {
        Self(pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect())
    }
}

/// Naive English plural: append "s" unless already ending in "s".
pub fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        name.to_string()
    } else {
        format!("{}s", name)
    }
}

/// Build announcement text, e.g. `Detected 3 objects. 2 Fire Alarms, Oxygen Tank`.
///
/// More than five distinct classes collapse to a class-count summary.
pub fn format_announcement(total: usize, counts: &ClassCounts) -> String {
    let mut text = format!(
        "Detected {} object{}. ",
        total,
        if total > 1 { "s" } else { "" }
    );

    if counts.len() <= 5 {
        let parts: Vec<String> = counts
            .iter()
            .map(|(name, count)| {
                if count == 1 {
                    name.to_string()
                } else {
                    format!("{} {}", count, pluralize(name))
                }
            })
            .collect();
        text.push_str(&parts.join(", "));
    } else {
        text.push_str(&format!("{} different types of objects", counts.len()));
    }

    text
}

/// What [`AnnouncementEngine::consider`] did with a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consideration {
    VoiceDisabled,
    EmptyBatch,
    /// Scene unchanged since the last considered batch
    Unchanged,
    /// A (new or replacement) announcement is pending
    Scheduled,
}

#[derive(Default)]
struct AnnouncementState {
    last_counts: ClassCounts,
    pending: Option<JoinHandle<()>>,
    /// Bumped on every schedule/cancel; a woken timer with an older value is stale.
    generation: u64,
    enabled: bool,
}

impl AnnouncementState {
    fn cancel_pending(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

struct EngineInner {
    settle: Duration,
    voice: VoiceConfig,
    speech: Option<Arc<dyn SpeechSink>>,
    state: Mutex<AnnouncementState>,
    last_announcement: watch::Sender<Option<String>>,
}

impl EngineInner {
    fn state(&self) -> MutexGuard<'_, AnnouncementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, generation: u64, total: usize, counts: &ClassCounts) {
        {
            let mut state = self.state();
            if state.generation != generation || !state.enabled {
                return;
            }
            state.pending = None;
        }

        let text = format_announcement(total, counts);
        self.last_announcement.send_replace(Some(text.clone()));
        metrics::record_announcement();

        match &self.speech {
            Some(speech) => {
                speech.cancel();
                if let Err(e) = speech.speak(&Utterance::new(text, &self.voice)) {
                    debug!(backend = speech.name(), "Speech failed: {}", e);
                }
            }
            None => trace!("No speech backend, announcement is display-only"),
        }
    }
}

/// Debounces detection batches into spoken summaries.
#[derive(Clone)]
pub struct AnnouncementEngine {
    inner: Arc<EngineInner>,
}

impl AnnouncementEngine {
    pub fn new(settle: Duration, voice: VoiceConfig, speech: Option<Arc<dyn SpeechSink>>) -> Self {
        let (last_announcement, _) = watch::channel(None);
        Self {
            inner: Arc::new(EngineInner {
                settle,
                voice,
                speech,
                state: Mutex::new(AnnouncementState::default()),
                last_announcement,
            }),
        }
    }

    /// Engine without a speech backend, starting disabled.
    pub fn silent() -> Self {
        Self::new(Duration::from_millis(2000), VoiceConfig::default(), None)
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.inner.state().enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state().enabled
    }

    pub fn has_speech(&self) -> bool {
        self.inner.speech.is_some()
    }

    /// Turn voice on or off. Turning it off drops any pending announcement
    /// and silences the current utterance.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.inner.state();
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;
        if !enabled {
            state.cancel_pending();
            drop(state);
            if let Some(speech) = &self.inner.speech {
                speech.cancel();
            }
        }
        debug!(enabled, "Voice announcements toggled");
    }

    /// Offer a freshly applied batch. Must be called inside a tokio runtime.
    pub fn consider(&self, batch: &DetectionBatch) -> Consideration {
        let mut state = self.inner.state();
        if !state.enabled {
            return Consideration::VoiceDisabled;
        }
        if batch.is_empty() {
            return Consideration::EmptyBatch;
        }

        let counts = ClassCounts::from_batch(batch);
        if counts.matches_previous(&state.last_counts) {
            return Consideration::Unchanged;
        }

        state.last_counts = counts.clone();
        state.cancel_pending();
        let generation = state.generation;
        let total = batch.len();

        let inner = Arc::clone(&self.inner);
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.settle).await;
            inner.fire(generation, total, &counts);
        }));
        Consideration::Scheduled
    }

    pub fn has_pending(&self) -> bool {
        self.inner.state().pending.is_some()
    }

    /// Drop the pending announcement and forget the last scene. Used when
    /// a session ends so the next one announces afresh.
    pub fn reset(&self) {
        let mut state = self.inner.state();
        state.cancel_pending();
        state.last_counts = ClassCounts::default();
        drop(state);
        if let Some(speech) = &self.inner.speech {
            speech.cancel();
        }
    }

    /// Text of the most recent announcement.
    pub fn last_announcement(&self) -> Option<String> {
        self.inner.last_announcement.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.last_announcement.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use falcon_models::{BoundingBox, Detection};

    fn batch(labels: &[&str]) -> DetectionBatch {
        labels
            .iter()
            .map(|l| Detection::new(*l, 0, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_format_single_object() {
        let text = format_announcement(1, &ClassCounts::from([("Fire Alarm", 1)]));
        assert_eq!(text, "Detected 1 object. Fire Alarm");
    }

    #[test]
    fn test_format_mixed_counts() {
        let counts = ClassCounts::from([("Fire Alarm", 2), ("Oxygen Tank", 1)]);
        assert_eq!(
            format_announcement(3, &counts),
            "Detected 3 objects. 2 Fire Alarms, Oxygen Tank"
        );
    }

    #[test]
    fn test_format_plural_appends_s() {
        let counts = ClassCounts::from([("Safety Switch Panel", 2)]);
        assert_eq!(
            format_announcement(2, &counts),
            "Detected 2 objects. 2 Safety Switch Panels"
        );
    }

    #[test]
    fn test_format_plural_of_name_ending_in_s() {
        let counts = ClassCounts::from([("Safety Switch Panels", 2)]);
        assert_eq!(
            format_announcement(2, &counts),
            "Detected 2 objects. 2 Safety Switch Panels"
        );
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("Fire Extinguisher"), "Fire Extinguishers");
        assert_eq!(pluralize("Safety Switch Panels"), "Safety Switch Panels");
        let counts = ClassCounts::from([("Fire Extinguisher", 3)]);
        assert_eq!(
            format_announcement(3, &counts),
            "Detected 3 objects. 3 Fire Extinguishers"
        );
    }

    #[test]
    fn test_format_many_classes_summarized() {
        let counts = ClassCounts::from([("A", 1), ("B", 1), ("C", 1), ("D", 1), ("E", 1), ("F", 1)]);
        assert_eq!(
            format_announcement(6, &counts),
            "Detected 6 objects. 6 different types of objects"
        );
    }

    #[test]
    fn test_counts_keep_first_appearance_order() {
        let counts = ClassCounts::from_batch(&batch(&["Oxygen_Tank", "Fire_Alarm", "Oxygen_Tank"]));
        let items: Vec<_> = counts.iter().collect();
        assert_eq!(items, vec![("Oxygen Tank", 2), ("Fire Alarm", 1)]);
    }

    #[test]
    fn test_disappearing_class_counts_as_unchanged() {
        let previous = ClassCounts::from([("A", 1), ("B", 1)]);
        assert!(ClassCounts::from([("A", 1)]).matches_previous(&previous));
        assert!(!ClassCounts::from([("A", 2)]).matches_previous(&previous));
        assert!(!ClassCounts::from([("C", 1)]).matches_previous(&previous));
        assert!(!ClassCounts::from([("A", 1)]).matches_previous(&ClassCounts::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_engine_ignores_batches() {
        let engine = AnnouncementEngine::silent();
        assert_eq!(engine.consider(&batch(&["A"])), Consideration::VoiceDisabled);
        assert!(!engine.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_kept_without_speech_backend() {
        let engine = AnnouncementEngine::silent().with_enabled(true);
        assert_eq!(engine.consider(&batch(&["Fire_Alarm"])), Consideration::Scheduled);
        assert_eq!(engine.consider(&batch(&[])), Consideration::EmptyBatch);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(
            engine.last_announcement().as_deref(),
            Some("Detected 1 object. Fire Alarm")
        );
        assert!(!engine.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_drops_pending() {
        let engine = AnnouncementEngine::silent().with_enabled(true);
        engine.consider(&batch(&["Fire_Alarm"]));
        engine.set_enabled(false);
        assert!(!engine.has_pending());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.last_announcement(), None);
    }
}
