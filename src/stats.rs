/// Append-only series of (time, value) samples.
pub struct TimeSeries {
    times: Vec<f64>,
    vals: Vec<f64>,
}

impl TimeSeries {
    pub fn with_capacity(n_samples: usize) -> Self {
        Self {
            times: Vec::with_capacity(n_samples),
            vals: Vec::with_capacity(n_samples),
        }
    }

    pub fn push(&mut self, time: f64, val: f64) {
        self.times.push(time);
        self.vals.push(val);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time-average of the series by the trapezoidal rule.
    ///
    /// The integral is divided by the nominal `horizon`, not the sampled
    /// span: a series that stops early understates the average.
    pub fn time_average(&self, horizon: f64) -> f64 {
        let mut area = 0.0;
        for idx in 1..self.times.len() {
            let dt = self.times[idx] - self.times[idx - 1];
            area += 0.5 * (self.vals[idx] + self.vals[idx - 1]) * dt;
        }
        area / horizon
    }
}
