use log::debug;

// Used as the step size before any frame has been timed.
pub const FIRST_FRAME_MS: f32 = 1.0;

// Measures wall clock time between frames. The measured delta is the simulation
// step size, so simulation speed follows the frame rate.
#[derive(Debug)]
pub struct FrameClock {
    frame_start: std::time::Instant,
    delta_ms: f32,
    // Frames slower than this are logged.
    frame_budget: std::time::Duration,
}

impl FrameClock {
    pub fn new(fps: f64) -> FrameClock {
        FrameClock {
            frame_start: std::time::Instant::now(),
            delta_ms: FIRST_FRAME_MS,
            frame_budget: std::time::Duration::from_secs_f64(1.0 / fps),
        }
    }

    // Step size for the current frame, in milliseconds.
    pub fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    // Call once per frame after presenting. Returns the new delta in milliseconds.
    pub fn tick(&mut self) -> f32 {
        let now = std::time::Instant::now();
        let elapsed = now.duration_since(self.frame_start);
        self.frame_start = now;
        if elapsed > self.frame_budget {
            debug!("Over time budget by: {:?}", elapsed - self.frame_budget);
        }
        self.delta_ms = elapsed.as_secs_f32() * 1000.0;
        self.delta_ms
    }
}
