//! Rolling-window helpers shared by forecasters and position models.

/// How a rolling window behaves before `window` observations exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Average whatever is available (at least one observation).
    Shrinking,
    /// Undefined until the window is full.
    Full,
}

/// Rolling arithmetic mean over `window` points ending at each index.
///
/// Undefined points are `None`. A zero window yields all `None`.
pub fn rolling_mean(values: &[f64], window: usize, policy: WindowPolicy) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), None);
        return out;
    }

    for i in 0..values.len() {
        let count = (i + 1).min(window);
        let defined = match policy {
            WindowPolicy::Shrinking => true,
            WindowPolicy::Full => count == window,
        };
        // summed per window so earlier values never leave rounding residue
        let mean = defined.then(|| values[i + 1 - count..=i].iter().sum::<f64>() / count as f64);
        out.push(mean);
    }
    out
}

/// Shift a signal one bar forward: `out[i] = signal[i - 1]`, `out[0] = fill`.
pub fn shift_forward(signal: &[f64], fill: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(signal.len());
    if !signal.is_empty() {
        out.push(fill);
        out.extend_from_slice(&signal[..signal.len() - 1]);
    }
    out
}
