/// Extra slots kept past the longest delay so linear interpolation can read
/// `idx` and `idx + 1` without touching the write head.
const INTERPOLATION_MARGIN: usize = 2;
const MIN_DELAY_SAMPLES: f32 = 1.0;

/// Circular buffer with a fractional read tap.
///
/// Capacity is fixed by [`DelayLine::allocate`], which is the only method that
/// allocates. Reading and writing are split so a feedback path can read the
/// delayed sample and then write `input + delayed * feedback`.
#[derive(Debug, Clone, Default)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the buffer to hold at least `max_delay_samples` and clear it.
    ///
    /// Does nothing beyond clearing when the capacity is already right.
    pub fn allocate(&mut self, max_delay_samples: usize) {
        let len = max_delay_samples + INTERPOLATION_MARGIN;
        if self.buffer.len() != len {
            self.buffer = vec![0.0; len];
        }
        self.reset();
    }

    /// Longest delay (in samples) that can be read.
    pub fn max_delay(&self) -> f32 {
        self.buffer.len().saturating_sub(INTERPOLATION_MARGIN) as f32
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.len() > INTERPOLATION_MARGIN
    }

    /// Read the sample written `delay_samples` ago (linear interpolation).
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        if len <= INTERPOLATION_MARGIN {
            return 0.0;
        }
        let delay = delay_samples.clamp(MIN_DELAY_SAMPLES, self.max_delay());

        let mut read_pos = self.write_pos as f32 - delay;
        if read_pos < 0.0 {
            read_pos += len as f32;
        }
        let idx_floor = read_pos.floor();
        let fraction = read_pos - idx_floor;
        let idx0 = (idx_floor as usize) % len;
        let idx1 = (idx0 + 1) % len;

        // Interpolate from the older sample toward the newer one
        let older = self.buffer[idx0];
        let newer = self.buffer[idx1];
        older + fraction * (newer - older)
    }

    /// Write at the head and advance it.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
