//! Sample-rate conversion shared by capture and transcription.

/// Resample a complete mono signal by linear interpolation.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).ceil() as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx0 = (src.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (src - idx0 as f64) as f32;
            samples[idx0] * (1.0 - frac) + samples[idx1] * frac
        })
        .collect()
}

/// Linear resampler for a signal arriving in arbitrary-sized chunks.
///
/// The read position and the last input sample carry over between calls, so
/// chunked output matches resampling the whole signal at once.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    ratio: f64,
    /// Position of the next output sample, in input samples, relative to
    /// `prev` (when present) or to the start of the next chunk.
    pos: f64,
    prev: Option<f32>,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        let ratio = if from_rate == 0 || to_rate == 0 {
            1.0
        } else {
            from_rate as f64 / to_rate as f64
        };
        Self {
            ratio,
            pos: 0.0,
            prev: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.ratio == 1.0
    }

    /// Resample the next chunk. Output that needs samples beyond this chunk is
    /// produced by the following call.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return input.to_vec();
        }
        let Some(&last) = input.last() else {
            return Vec::new();
        };

        let offset = usize::from(self.prev.is_some());
        let total = input.len() + offset;
        let prev = self.prev;
        let at = |i: usize| match (i, prev) {
            (0, Some(p)) => p,
            _ => input[i - offset],
        };

        let mut out = Vec::with_capacity((input.len() as f64 / self.ratio) as usize + 1);
        while self.pos + 1.0 < total as f64 {
            let idx0 = self.pos.floor() as usize;
            let frac = (self.pos - idx0 as f64) as f32;
            out.push(at(idx0) * (1.0 - frac) + at(idx0 + 1) * frac);
            self.pos += self.ratio;
        }

        // The last sample of this chunk becomes index 0 of the next one.
        self.pos -= (total - 1) as f64;
        self.prev = Some(last);
        out
    }
}
