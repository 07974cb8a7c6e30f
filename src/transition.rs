//! Fade-out / swap / fade-in sequencing for room geometry changes.
//!
//! The particle material fades to nothing, the room is swapped while
//! nothing is visible, and the material fades back in. Times are the
//! simulation's real-time clock in milliseconds.

use airborne_common::RoomGeometry;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionState {
    Idle,
    FadingOut { started_at: f64 },
    Waiting { started_at: f64 },
    FadingIn { started_at: f64 },
}

/// Phase lengths in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionTimings {
    pub fade_out_ms: f64,
    pub wait_ms: f64,
    pub fade_in_ms: f64,
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            fade_out_ms: 600.0,
            wait_ms: 300.0,
            fade_in_ms: 600.0,
        }
    }
}

/// Work the owner must do after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionEvent {
    /// Swap bounds and reset the pool for this geometry, in one step.
    SwapGeometry(RoomGeometry),
    /// Back to idle at full opacity.
    Completed,
}

#[derive(Debug, Clone)]
pub struct TransitionController {
    state: TransitionState,
    timings: TransitionTimings,
    /// Geometry currently applied to the pool.
    current: RoomGeometry,
    /// Latest requested geometry not yet applied.
    pending: Option<RoomGeometry>,
}

impl TransitionController {
    pub fn new(current: RoomGeometry, timings: TransitionTimings) -> Self {
        Self {
            state: TransitionState::Idle,
            timings,
            current,
            pending: None,
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn current_geometry(&self) -> &RoomGeometry {
        &self.current
    }

    pub fn pending_geometry(&self) -> Option<&RoomGeometry> {
        self.pending.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransitionState::Idle
    }

    /// Asks for a new room. Returns true if the request was recorded.
    ///
    /// While idle, a geometry equal to the current one is ignored. During a
    /// transition the pending target is replaced and the running phase
    /// carries on untouched.
    pub fn request(&mut self, geometry: RoomGeometry, now_ms: f64) -> bool {
        match self.state {
            TransitionState::Idle => {
                if geometry == self.current {
                    return false;
                }
                log::debug!("Room change requested, fading out particles.");
                self.pending = Some(geometry);
                self.state = TransitionState::FadingOut { started_at: now_ms };
                true
            }
            _ => {
                if self.pending.is_none() && geometry == self.current {
                    return false;
                }
                log::debug!("Room change requested mid-transition ({:?}), replacing pending target.", self.state);
                self.pending = Some(geometry);
                true
            }
        }
    }

    /// Advances the state machine to `now_ms`. At most one phase boundary
    /// is crossed per call.
    pub fn update(&mut self, now_ms: f64) -> Option<TransitionEvent> {
        match self.state {
            TransitionState::Idle => None,
            TransitionState::FadingOut { started_at } => {
                if now_ms - started_at < self.timings.fade_out_ms {
                    return None;
                }
                self.state = TransitionState::Waiting { started_at: now_ms };
                self.take_pending()
            }
            TransitionState::Waiting { started_at } => {
                if now_ms - started_at < self.timings.wait_ms {
                    return None;
                }
                self.state = TransitionState::FadingIn { started_at: now_ms };
                // A request that arrived while waiting is still invisible to swap.
                self.take_pending()
            }
            TransitionState::FadingIn { started_at } => {
                // Requests during fade-in are swapped straight away; the fade is
                // not restarted, so the change is visible.
                if let Some(event) = self.take_pending() {
                    return Some(event);
                }
                if now_ms - started_at < self.timings.fade_in_ms {
                    return None;
                }
                self.state = TransitionState::Idle;
                log::debug!("Room transition complete.");
                Some(TransitionEvent::Completed)
            }
        }
    }

    fn take_pending(&mut self) -> Option<TransitionEvent> {
        let geometry = self.pending.take()?;
        if geometry == self.current {
            return None;
        }
        self.current = geometry;
        Some(TransitionEvent::SwapGeometry(geometry))
    }

    /// Material opacity (and size scale) at `now_ms`, 0-1.
    pub fn opacity(&self, now_ms: f64) -> f32 {
        let ramp = |started_at: f64, duration: f64| -> f32 {
            if duration <= 0.0 {
                1.0
            } else {
                ((now_ms - started_at) / duration).clamp(0.0, 1.0) as f32
            }
        };
        match self.state {
            TransitionState::Idle => 1.0,
            TransitionState::FadingOut { started_at } => 1.0 - ramp(started_at, self.timings.fade_out_ms),
            TransitionState::Waiting { .. } => 0.0,
            TransitionState::FadingIn { started_at } => ramp(started_at, self.timings.fade_in_ms),
        }
    }

    /// Drops any in-flight transition without applying the pending geometry.
    pub fn abandon(&mut self) {
        if !self.is_idle() {
            log::debug!("Abandoning room transition in state {:?}.", self.state);
        }
        self.state = TransitionState::Idle;
        self.pending = None;
    }
}
