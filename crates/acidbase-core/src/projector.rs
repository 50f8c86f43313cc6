//! Fade-in projection for rendering.
//!
//! Turns canonical particles into what a frame should draw. Nothing here
//! touches the beaker: a [`RedrawLoop`] only holds the last particle list it
//! was handed and the frame it derived from it.

use std::rc::Rc;

use crate::config::ProjectorConfig;
use crate::particle::Particle;

/// A particle plus its per-frame presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayParticle {
    pub particle: Particle,
    pub opacity: f64,
    pub scale: f64,
}

/// Opacity and scale for a particle of age `now - created_at`.
pub fn fade_in(created_at: u64, now: u64, config: &ProjectorConfig) -> (f64, f64) {
    if config.fade_in_ms == 0 {
        return (1.0, 1.0);
    }
    let age = now.saturating_sub(created_at).min(config.fade_in_ms);
    let t = age as f64 / config.fade_in_ms as f64;
    (t, config.initial_scale + (1.0 - config.initial_scale) * t)
}

/// Project every particle for the frame at `now`.
pub fn project(particles: &[Particle], now: u64, config: &ProjectorConfig) -> Vec<DisplayParticle> {
    particles
        .iter()
        .map(|particle| {
            let (opacity, scale) = fade_in(particle.created_at, now, config);
            DisplayParticle {
                particle: particle.clone(),
                opacity,
                scale,
            }
        })
        .collect()
}

/// Whether any particle is still fading in at `now`.
pub fn is_animating(particles: &[Particle], now: u64, config: &ProjectorConfig) -> bool {
    particles
        .iter()
        .any(|p| now.saturating_sub(p.created_at) < config.fade_in_ms)
}

/// Frame driver that stops once nothing is fading in and restarts when it
/// is handed a different particle list.
#[derive(Debug)]
pub struct RedrawLoop {
    config: ProjectorConfig,
    input: Option<Rc<[Particle]>>,
    frame: Vec<DisplayParticle>,
    running: bool,
}

impl RedrawLoop {
    pub fn new(config: ProjectorConfig) -> Self {
        Self {
            config,
            input: None,
            frame: Vec::new(),
            running: false,
        }
    }

    /// Hand over the particle list to draw. The same list again is ignored.
    pub fn set_input(&mut self, particles: Rc<[Particle]>, now: u64) {
        if let Some(current) = &self.input {
            if Rc::ptr_eq(current, &particles) {
                return;
            }
        }
        self.input = Some(particles);
        self.running = true;
        self.render(now);
    }

    /// Produce the frame for `now`, or `None` once the loop has stopped.
    pub fn frame(&mut self, now: u64) -> Option<&[DisplayParticle]> {
        if !self.running {
            return None;
        }
        self.render(now);
        Some(&self.frame)
    }

    /// Stop requesting frames. The last frame stays available.
    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last rendered frame.
    pub fn current(&self) -> &[DisplayParticle] {
        &self.frame
    }

    fn render(&mut self, now: u64) {
        let Some(input) = &self.input else {
            self.frame.clear();
            self.running = false;
            return;
        };
        self.frame = project(input, now, &self.config);
        if !is_animating(input, now, &self.config) {
            self.running = false;
        }
    }
}
