//! On-screen transport controls
//!
//! Translates gestures into [`PlaybackController`] calls and owns the
//! control bar's own ephemeral state: visibility with its auto-hide timer and
//! the transient tap-zone feedback. Both timers belong to one
//! [`TransportControls`] instance.

use crate::{
    config::ControlsConfig,
    controller::PlaybackController,
    format_time,
    subscription::{lock_unpoisoned, Subscription},
    surface::FullscreenPlatform,
    Error, Result, TransportState,
};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

const VOLUME_STEP: f64 = 0.1;

/// Keyboard/remote control handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    PlayPause,
    SeekForward(f64),
    SeekBackward(f64),
    VolumeUp,
    VolumeDown,
    Mute,
    Fullscreen,
}

/// Horizontal region of the surface for touch seeking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapZone {
    Backward,
    Center,
    Forward,
}

impl TapZone {
    /// Zone for a normalized `[0, 1]` x position. Each edge zone spans
    /// `edge_fraction` of the width.
    pub fn from_position(x: f64, edge_fraction: f64) -> Self {
        if x < edge_fraction {
            TapZone::Backward
        } else if x > 1.0 - edge_fraction {
            TapZone::Forward
        } else {
            TapZone::Center
        }
    }
}

/// Transient icon shown after a tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapFeedback {
    pub zone: TapZone,
    /// Normalized x position the icon is drawn at
    pub anchor: f64,
}

impl TapFeedback {
    fn for_zone(zone: TapZone) -> Self {
        let anchor = match zone {
            TapZone::Backward => 0.15,
            TapZone::Center => 0.5,
            TapZone::Forward => 0.85,
        };
        Self { zone, anchor }
    }
}

#[derive(Debug)]
struct ControlsInner {
    visible: bool,
    hide_timer: Option<Subscription>,
    feedback: Option<TapFeedback>,
    feedback_timer: Option<Subscription>,
}

/// Control bar bound to one player
pub struct TransportControls {
    controller: PlaybackController,
    state: watch::Receiver<TransportState>,
    fullscreen: Option<Arc<dyn FullscreenPlatform>>,
    config: ControlsConfig,
    inner: Arc<Mutex<ControlsInner>>,
}

impl TransportControls {
    pub fn new(
        controller: PlaybackController,
        state: watch::Receiver<TransportState>,
        config: ControlsConfig,
    ) -> Self {
        Self {
            controller,
            state,
            fullscreen: None,
            config,
            inner: Arc::new(Mutex::new(ControlsInner {
                visible: true,
                hide_timer: None,
                feedback: None,
                feedback_timer: None,
            })),
        }
    }

    /// Platform used to leave fullscreen
    pub fn with_fullscreen(mut self, platform: Arc<dyn FullscreenPlatform>) -> Self {
        self.fullscreen = Some(platform);
        self
    }

    pub fn config(&self) -> &ControlsConfig {
        &self.config
    }

    fn snapshot(&self) -> TransportState {
        self.state.borrow().clone()
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Seek to a slider position in `[0, 100]`
    pub fn scrub(&self, percent: f64) {
        if percent.is_nan() {
            return;
        }
        let duration = self.controller.duration();
        self.controller
            .set_current_time(percent.clamp(0.0, 100.0) / 100.0 * duration);
    }

    pub fn skip_backward(&self) {
        self.seek_by(-self.config.skip_seconds);
    }

    pub fn skip_forward(&self) {
        self.seek_by(self.config.skip_seconds);
    }

    fn seek_by(&self, delta: f64) {
        let target = self.controller.current_time() + delta;
        debug!(delta, target, "Skip");
        self.controller.set_current_time(target.max(0.0));
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        if self.snapshot().is_playing {
            self.controller.pause();
            Ok(())
        } else {
            self.controller.play().await
        }
    }

    /// Toggle between silent and full volume
    pub fn toggle_mute(&self) {
        let target = if self.controller.volume() > 0.0 { 0.0 } else { 1.0 };
        self.controller.set_volume(target);
    }

    /// Volume slider position in `[0, 100]`
    pub fn set_volume_percent(&self, percent: f64) {
        self.controller.set_volume(percent / 100.0);
    }

    fn step_volume(&self, delta: f64) {
        let stepped = ((self.controller.volume() + delta) * 10.0).round() / 10.0;
        self.controller.set_volume(stepped);
    }

    /// Enter fullscreen through the surface, or leave it through the platform
    pub async fn toggle_fullscreen(&self) -> Result<()> {
        let is_fullscreen = match &self.fullscreen {
            Some(platform) => platform.is_fullscreen(),
            None => self.snapshot().is_fullscreen,
        };

        if !is_fullscreen {
            return self.controller.request_fullscreen().await;
        }
        match &self.fullscreen {
            Some(platform) => platform.exit_fullscreen().await.map_err(Error::FullscreenDenied),
            None => Ok(()),
        }
    }

    /// Apply a keyboard or remote action
    pub async fn handle(&self, action: ControlAction) -> Result<()> {
        match action {
            ControlAction::PlayPause => return self.toggle_play_pause().await,
            ControlAction::SeekForward(seconds) => self.seek_by(seconds.abs()),
            ControlAction::SeekBackward(seconds) => self.seek_by(-seconds.abs()),
            ControlAction::VolumeUp => self.step_volume(VOLUME_STEP),
            ControlAction::VolumeDown => self.step_volume(-VOLUME_STEP),
            ControlAction::Mute => self.toggle_mute(),
            ControlAction::Fullscreen => return self.toggle_fullscreen().await,
        }
        Ok(())
    }

    // =========================================================================
    // Touch
    // =========================================================================

    /// Handle a tap at normalized x position. Ignored on non-touch devices.
    pub async fn tap(&self, x: f64) -> Result<Option<TapZone>> {
        if !self.config.touch_device || x.is_nan() {
            return Ok(None);
        }

        let zone = TapZone::from_position(x.clamp(0.0, 1.0), self.config.edge_zone_fraction);
        self.show_feedback(zone);

        match zone {
            TapZone::Backward => self.skip_backward(),
            TapZone::Forward => self.skip_forward(),
            TapZone::Center => self.toggle_play_pause().await?,
        }
        Ok(Some(zone))
    }

    pub fn tap_feedback(&self) -> Option<TapFeedback> {
        lock_unpoisoned(&self.inner).feedback
    }

    fn show_feedback(&self, zone: TapZone) {
        let timer = spawn_timer(
            Arc::downgrade(&self.inner),
            self.config.tap_feedback_duration(),
            |inner, _| {
                inner.feedback = None;
                inner.feedback_timer.take()
            },
            self.state.clone(),
        );

        let previous = {
            let mut inner = lock_unpoisoned(&self.inner);
            inner.feedback = Some(TapFeedback::for_zone(zone));
            std::mem::replace(&mut inner.feedback_timer, timer)
        };
        drop(previous);
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    /// Show the controls and restart the idle timer
    pub fn pointer_moved(&self) {
        let timer = spawn_timer(
            Arc::downgrade(&self.inner),
            self.config.auto_hide_delay(),
            |inner, state| {
                if state.is_playing {
                    inner.visible = false;
                }
                inner.hide_timer.take()
            },
            self.state.clone(),
        );

        let previous = {
            let mut inner = lock_unpoisoned(&self.inner);
            inner.visible = true;
            std::mem::replace(&mut inner.hide_timer, timer)
        };
        drop(previous);
    }

    /// Pointer left the player: hide at once while playing
    pub fn pointer_left(&self) {
        let is_playing = self.snapshot().is_playing;
        let previous = {
            let mut inner = lock_unpoisoned(&self.inner);
            if is_playing {
                inner.visible = false;
            }
            inner.hide_timer.take()
        };
        drop(previous);
    }

    /// Controls are always shown while paused or on error
    pub fn is_visible(&self) -> bool {
        let state = self.snapshot();
        state.error.is_some() || !state.is_playing || lock_unpoisoned(&self.inner).visible
    }

    pub fn progress_percent(&self) -> f64 {
        self.snapshot().progress_percent()
    }

    /// Elapsed and total time labels
    pub fn time_labels(&self) -> (String, String) {
        let state = self.snapshot();
        (format_time(state.current_time), format_time(state.duration))
    }

    /// Cancel both timers
    pub fn release(&self) {
        let (hide, feedback) = {
            let mut inner = lock_unpoisoned(&self.inner);
            inner.feedback = None;
            (inner.hide_timer.take(), inner.feedback_timer.take())
        };
        drop(hide);
        drop(feedback);
    }
}

impl Drop for TransportControls {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run `expire` once after `delay`. The returned subscription cancels it.
fn spawn_timer<F>(
    inner: Weak<Mutex<ControlsInner>>,
    delay: Duration,
    expire: F,
    state: watch::Receiver<TransportState>,
) -> Option<Subscription>
where
    F: FnOnce(&mut ControlsInner, &TransportState) -> Option<Subscription> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let snapshot = state.borrow().clone();
        let own = {
            let mut guard = lock_unpoisoned(&inner);
            expire(&mut guard, &snapshot)
        };
        // Releasing our own handle is a no-op abort of a finishing task
        drop(own);
    });
    Some(Subscription::from_task(task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NativeBackend;
    use crate::controller::ControlBinding;
    use crate::headless::HeadlessSurface;
    use crate::surface::PlaybackSurface;

    fn controls(touch: bool) -> (TransportControls, Arc<HeadlessSurface>, watch::Sender<TransportState>) {
        let surface = HeadlessSurface::new();
        let binding = ControlBinding::default();
        binding.bind(Arc::new(NativeBackend::new(surface.clone())));
        let (tx, rx) = watch::channel(TransportState::default());
        let config = ControlsConfig {
            touch_device: touch,
            ..ControlsConfig::default()
        };
        (
            TransportControls::new(PlaybackController::new(binding), rx, config),
            surface,
            tx,
        )
    }

    fn playing(tx: &watch::Sender<TransportState>, is_playing: bool) {
        tx.send_modify(|s| s.is_playing = is_playing);
    }

    #[test]
    fn test_tap_zone_boundaries() {
        assert_eq!(TapZone::from_position(0.1, 0.3), TapZone::Backward);
        assert_eq!(TapZone::from_position(0.3, 0.3), TapZone::Center);
        assert_eq!(TapZone::from_position(0.5, 0.3), TapZone::Center);
        assert_eq!(TapZone::from_position(0.7, 0.3), TapZone::Center);
        assert_eq!(TapZone::from_position(0.9, 0.3), TapZone::Forward);
    }

    #[test]
    fn test_skip_backward_clamps_at_zero() {
        let (controls, surface, _tx) = controls(false);
        surface.set_duration(600.0);
        surface.set_current_time(5.0);

        controls.skip_backward();
        assert_eq!(surface.current_time(), 0.0);
    }

    #[test]
    fn test_skip_forward_clamps_at_duration() {
        let (controls, surface, _tx) = controls(false);
        surface.set_duration(60.0);
        surface.set_current_time(55.0);

        controls.skip_forward();
        assert_eq!(surface.current_time(), 60.0);
    }

    #[test]
    fn test_scrub_maps_percent_to_duration() {
        let (controls, surface, _tx) = controls(false);
        surface.set_duration(3_600.0);

        controls.scrub(25.0);
        assert_eq!(surface.current_time(), 900.0);
        controls.scrub(140.0);
        assert_eq!(surface.current_time(), 3_600.0);
    }

    #[test]
    fn test_mute_toggle_restores_full_volume() {
        let (controls, surface, _tx) = controls(false);
        controls.set_volume_percent(35.0);
        assert_eq!(surface.volume(), 0.35);

        controls.toggle_mute();
        assert_eq!(surface.volume(), 0.0);
        controls.toggle_mute();
        assert_eq!(surface.volume(), 1.0);
    }

    #[tokio::test]
    async fn test_volume_steps() {
        let (controls, surface, _tx) = controls(false);
        controls.set_volume_percent(50.0);

        controls.handle(ControlAction::VolumeUp).await.unwrap();
        assert_eq!(surface.volume(), 0.6);
        for _ in 0..10 {
            controls.handle(ControlAction::VolumeDown).await.unwrap();
        }
        assert_eq!(surface.volume(), 0.0);
    }

    #[tokio::test]
    async fn test_tap_ignored_without_touch() {
        let (controls, _surface, _tx) = controls(false);
        assert_eq!(controls.tap(0.1).await.unwrap(), None);
        assert_eq!(controls.tap_feedback(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_feedback_expires() {
        let (controls, surface, _tx) = controls(true);
        surface.set_duration(100.0);
        surface.set_current_time(50.0);

        assert_eq!(controls.tap(0.9).await.unwrap(), Some(TapZone::Forward));
        assert_eq!(surface.current_time(), 60.0);
        assert_eq!(controls.tap_feedback().map(|f| f.zone), Some(TapZone::Forward));

        tokio::time::sleep(Duration::from_millis(801)).await;
        assert_eq!(controls.tap_feedback(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_hide_only_while_playing() {
        let (controls, _surface, tx) = controls(false);

        controls.pointer_moved();
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert!(controls.is_visible());

        playing(&tx, true);
        controls.pointer_moved();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(controls.is_visible());
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!controls.is_visible());

        tx.send_modify(|s| s.error = Some("Lỗi".into()));
        assert!(controls.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_movement_restarts_idle_timer() {
        let (controls, _surface, tx) = controls(false);
        playing(&tx, true);

        controls.pointer_moved();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        controls.pointer_moved();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(controls.is_visible());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!controls.is_visible());
    }

    #[test]
    fn test_pointer_left_hides_when_playing() {
        let (controls, _surface, tx) = controls(false);
        controls.pointer_left();
        assert!(controls.is_visible());

        playing(&tx, true);
        controls.pointer_left();
        assert!(!controls.is_visible());
    }

    #[test]
    fn test_time_labels() {
        let (controls, _surface, tx) = controls(false);
        tx.send_modify(|s| {
            s.current_time = 75.0;
            s.duration = 3_725.0;
        });

        assert_eq!(controls.time_labels(), ("01:15".to_string(), "01:02:05".to_string()));
        assert!((controls.progress_percent() - 2.013).abs() < 0.01);
    }
}
