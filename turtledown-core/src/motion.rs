//! Inertial pan and zoom.
//!
//! Velocities are in screen pixels (pan) and fractional scale change (zoom)
//! per 60 Hz tick. Each [`Inertia::tick`] applies them to a [`Navigator`] and
//! damps them; the host keeps ticking while it returns `true`.

use crate::navigator::Navigator;

pub const SLOWDOWN: f64 = 0.8;
pub const REST_THRESHOLD: f64 = 0.001;
pub const SCROLL_STEP: f64 = 0.02;
pub const DOUBLE_ACTIVATE_STEP: f64 = 0.15;

/// Screen pixels per millisecond of drag become this many pixels per tick.
const RELEASE_GAIN: f64 = 10.0;

/// Per-tick zoom factors are kept within this range so a long frame cannot
/// flip or explode the scale.
const MIN_TICK_ZOOM: f64 = 0.1;
const MAX_TICK_ZOOM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Inertia {
    pub vx: f64,
    pub vy: f64,
    pub vzoom: f64,
    pub slowdown: f64,
    /// Screen point zooming is anchored at.
    focus: (f64, f64),
}

impl Inertia {
    pub fn new(focus_x: f64, focus_y: f64) -> Self {
        Self {
            vx: 0.0,
            vy: 0.0,
            vzoom: 0.0,
            slowdown: SLOWDOWN,
            focus: (focus_x, focus_y),
        }
    }

    pub fn focus(&self) -> (f64, f64) {
        self.focus
    }

    pub fn set_focus(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.focus = (x, y);
        }
    }

    /// One scroll notch; positive zooms in.
    pub fn scroll(&mut self, notches: f64) {
        if notches.is_finite() && notches != 0.0 {
            self.vzoom += notches.signum() * SCROLL_STEP;
        }
    }

    pub fn double_activate(&mut self) {
        self.vzoom += DOUBLE_ACTIVATE_STEP;
    }

    /// End of a drag whose last step moved `(dx, dy)` screen pixels in
    /// `dt_ms` milliseconds.
    pub fn release_drag(&mut self, dx: f64, dy: f64, dt_ms: f64) {
        if !(dt_ms > 0.0 && dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.vx = RELEASE_GAIN * dx / dt_ms;
        self.vy = RELEASE_GAIN * dy / dt_ms;
    }

    /// Cancel all motion, e.g. when a new drag starts.
    pub fn stop(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
        self.vzoom = 0.0;
    }

    pub fn is_moving(&self) -> bool {
        self.vx.abs() + self.vy.abs() + self.vzoom.abs() > REST_THRESHOLD
    }

    /// Advance by `dt` seconds. Returns whether motion continues.
    pub fn tick(&mut self, dt: f64, nav: &mut Navigator) -> bool {
        if !(dt.is_finite() && dt > 0.0) {
            return self.is_moving();
        }
        let k = dt * 60.0;
        nav.pan(self.vx * k, self.vy * k);
        let factor = (1.0 + self.vzoom * k).clamp(MIN_TICK_ZOOM, MAX_TICK_ZOOM);
        if factor != 1.0 {
            nav.zoom_at(self.focus.0, self.focus.1, factor);
        }
        let damping = self.slowdown.powf(k);
        self.vx *= damping;
        self.vy *= damping;
        self.vzoom *= damping;
        if !self.is_moving() {
            self.stop();
            return false;
        }
        true
    }
}
