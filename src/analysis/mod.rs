/// Analysis layer: derived series and their correlation.
///
/// ```text
///   Dataset ──► aggregate   rolling mean, resample, percent change
///                  │
///                  ▼
///             correlation  variation table → joint drop → OLS fit
/// ```

pub mod aggregate;
pub mod correlation;
