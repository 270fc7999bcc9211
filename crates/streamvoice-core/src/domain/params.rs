//! Synthesis tuning parameters.
//!
//! Every numeric field of [`SynthesisParams`] has a declared [`ParamRange`].
//! Values are clamped at the point where they are written (setters and
//! deserialization), so a `SynthesisParams` can never hold an out-of-range
//! value and consumers never need to re-check.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Ranges ─────────────────────────────────────────────────────────

/// Inclusive range and default for one numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange<T> {
    pub min: T,
    pub max: T,
    pub default: T,
}

impl<T: PartialOrd + Copy> ParamRange<T> {
    pub const fn new(min: T, max: T, default: T) -> Self {
        Self { min, max, default }
    }

    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Declared ranges for every numeric field of [`SynthesisParams`].
pub struct ParamRanges;

impl ParamRanges {
    pub const BATCH_SIZE: ParamRange<u32> = ParamRange::new(1, 200, 20);
    pub const BATCH_THRESHOLD: ParamRange<f32> = ParamRange::new(0.1, 1.0, 0.75);
    pub const TOP_K: ParamRange<u32> = ParamRange::new(1, 100, 5);
    pub const TOP_P: ParamRange<f32> = ParamRange::new(0.0, 1.0, 1.0);
    pub const TEMPERATURE: ParamRange<f32> = ParamRange::new(0.0, 1.0, 1.0);
    pub const REPETITION_PENALTY: ParamRange<f32> = ParamRange::new(0.0, 2.0, 1.35);
    pub const SPEED_FACTOR: ParamRange<f32> = ParamRange::new(0.6, 1.65, 1.0);
    pub const FRAGMENT_INTERVAL: ParamRange<f32> = ParamRange::new(0.01, 1.0, 0.3);
}

// ── Text split method ──────────────────────────────────────────────

/// How the engine splits input text before inference.
///
/// Serialized as the engine's `cutN` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextSplitMethod {
    /// No splitting.
    #[serde(rename = "cut0")]
    None,
    /// Every four sentences.
    #[serde(rename = "cut1")]
    FourSentences,
    /// Every fifty characters.
    #[serde(rename = "cut2")]
    FiftyChars,
    /// On Chinese full stops.
    #[serde(rename = "cut3")]
    ChinesePeriod,
    /// On English full stops.
    #[serde(rename = "cut4")]
    EnglishPeriod,
    /// On any punctuation mark.
    #[default]
    #[serde(rename = "cut5")]
    Punctuation,
}

impl TextSplitMethod {
    /// Every variant, in engine-code order (for pickers).
    pub const ALL: [Self; 6] = [
        Self::None,
        Self::FourSentences,
        Self::FiftyChars,
        Self::ChinesePeriod,
        Self::EnglishPeriod,
        Self::Punctuation,
    ];

    /// Engine identifier (`"cut0"` … `"cut5"`).
    pub const fn engine_code(self) -> &'static str {
        match self {
            Self::None => "cut0",
            Self::FourSentences => "cut1",
            Self::FiftyChars => "cut2",
            Self::ChinesePeriod => "cut3",
            Self::EnglishPeriod => "cut4",
            Self::Punctuation => "cut5",
        }
    }

    /// Human-readable label.
    pub const fn description(self) -> &'static str {
        match self {
            Self::None => "No splitting",
            Self::FourSentences => "Every 4 sentences",
            Self::FiftyChars => "Every 50 characters",
            Self::ChinesePeriod => "Chinese full stop",
            Self::EnglishPeriod => "English full stop",
            Self::Punctuation => "Punctuation",
        }
    }
}

impl fmt::Display for TextSplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ── Parameter set ──────────────────────────────────────────────────

/// Synthesis tuning values sent with every request.
///
/// Fields are private; every write goes through a clamping setter that
/// returns the value actually stored. Float setters ignore `NaN` and keep
/// the previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSynthesisParams")]
pub struct SynthesisParams {
    text_split_method: TextSplitMethod,
    batch_size: u32,
    batch_threshold: f32,
    split_bucket: bool,
    streaming_mode: bool,
    top_k: u32,
    top_p: f32,
    temperature: f32,
    repetition_penalty: f32,
    parallel_infer: bool,
    speed_factor: f32,
    fragment_interval: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            text_split_method: TextSplitMethod::default(),
            batch_size: ParamRanges::BATCH_SIZE.default,
            batch_threshold: ParamRanges::BATCH_THRESHOLD.default,
            split_bucket: true,
            streaming_mode: false,
            top_k: ParamRanges::TOP_K.default,
            top_p: ParamRanges::TOP_P.default,
            temperature: ParamRanges::TEMPERATURE.default,
            repetition_penalty: ParamRanges::REPETITION_PENALTY.default,
            parallel_infer: true,
            speed_factor: ParamRanges::SPEED_FACTOR.default,
            fragment_interval: ParamRanges::FRAGMENT_INTERVAL.default,
        }
    }
}

/// Write `value` into `slot`, clamped to `range`. `NaN` is rejected.
fn set_clamped_f32(slot: &mut f32, range: ParamRange<f32>, value: f32, name: &str) -> f32 {
    if value.is_nan() {
        tracing::warn!(param = name, "Ignoring NaN parameter value");
        return *slot;
    }
    let clamped = range.clamp(value);
    if (clamped - value).abs() > f32::EPSILON {
        tracing::debug!(param = name, requested = value, stored = clamped, "Parameter clamped");
    }
    *slot = clamped;
    clamped
}

fn set_clamped_u32(slot: &mut u32, range: ParamRange<u32>, value: u32, name: &str) -> u32 {
    let clamped = range.clamp(value);
    if clamped != value {
        tracing::debug!(param = name, requested = value, stored = clamped, "Parameter clamped");
    }
    *slot = clamped;
    clamped
}

impl SynthesisParams {
    // ── Getters ────────────────────────────────────────────────────

    pub const fn text_split_method(&self) -> TextSplitMethod {
        self.text_split_method
    }

    pub const fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub const fn batch_threshold(&self) -> f32 {
        self.batch_threshold
    }

    pub const fn split_bucket(&self) -> bool {
        self.split_bucket
    }

    /// Whether the session plays chunks as they arrive.
    pub const fn streaming_mode(&self) -> bool {
        self.streaming_mode
    }

    pub const fn top_k(&self) -> u32 {
        self.top_k
    }

    pub const fn top_p(&self) -> f32 {
        self.top_p
    }

    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    pub const fn repetition_penalty(&self) -> f32 {
        self.repetition_penalty
    }

    pub const fn parallel_infer(&self) -> bool {
        self.parallel_infer
    }

    pub const fn speed_factor(&self) -> f32 {
        self.speed_factor
    }

    pub const fn fragment_interval(&self) -> f32 {
        self.fragment_interval
    }

    // ── Setters ────────────────────────────────────────────────────

    pub const fn set_text_split_method(&mut self, method: TextSplitMethod) {
        self.text_split_method = method;
    }

    pub fn set_batch_size(&mut self, value: u32) -> u32 {
        set_clamped_u32(&mut self.batch_size, ParamRanges::BATCH_SIZE, value, "batch_size")
    }

    pub fn set_batch_threshold(&mut self, value: f32) -> f32 {
        set_clamped_f32(
            &mut self.batch_threshold,
            ParamRanges::BATCH_THRESHOLD,
            value,
            "batch_threshold",
        )
    }

    pub const fn set_split_bucket(&mut self, enabled: bool) {
        self.split_bucket = enabled;
    }

    pub const fn set_streaming_mode(&mut self, enabled: bool) {
        self.streaming_mode = enabled;
    }

    pub fn set_top_k(&mut self, value: u32) -> u32 {
        set_clamped_u32(&mut self.top_k, ParamRanges::TOP_K, value, "top_k")
    }

    pub fn set_top_p(&mut self, value: f32) -> f32 {
        set_clamped_f32(&mut self.top_p, ParamRanges::TOP_P, value, "top_p")
    }

    pub fn set_temperature(&mut self, value: f32) -> f32 {
        set_clamped_f32(
            &mut self.temperature,
            ParamRanges::TEMPERATURE,
            value,
            "temperature",
        )
    }

    pub fn set_repetition_penalty(&mut self, value: f32) -> f32 {
        set_clamped_f32(
            &mut self.repetition_penalty,
            ParamRanges::REPETITION_PENALTY,
            value,
            "repetition_penalty",
        )
    }

    pub const fn set_parallel_infer(&mut self, enabled: bool) {
        self.parallel_infer = enabled;
    }

    pub fn set_speed_factor(&mut self, value: f32) -> f32 {
        set_clamped_f32(
            &mut self.speed_factor,
            ParamRanges::SPEED_FACTOR,
            value,
            "speed_factor",
        )
    }

    pub fn set_fragment_interval(&mut self, value: f32) -> f32 {
        set_clamped_f32(
            &mut self.fragment_interval,
            ParamRanges::FRAGMENT_INTERVAL,
            value,
            "fragment_interval",
        )
    }

    /// Builder-style variant of [`set_streaming_mode`](Self::set_streaming_mode).
    #[must_use]
    pub const fn with_streaming_mode(mut self, enabled: bool) -> Self {
        self.streaming_mode = enabled;
        self
    }
}

// ── Deserialization ────────────────────────────────────────────────

/// Unchecked wire shape; converted through the clamping setters.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSynthesisParams {
    text_split_method: TextSplitMethod,
    batch_size: u32,
    batch_threshold: f32,
    split_bucket: bool,
    streaming_mode: bool,
    top_k: u32,
    top_p: f32,
    temperature: f32,
    repetition_penalty: f32,
    parallel_infer: bool,
    speed_factor: f32,
    fragment_interval: f32,
}

impl Default for RawSynthesisParams {
    fn default() -> Self {
        let d = SynthesisParams::default();
        Self {
            text_split_method: d.text_split_method,
            batch_size: d.batch_size,
            batch_threshold: d.batch_threshold,
            split_bucket: d.split_bucket,
            streaming_mode: d.streaming_mode,
            top_k: d.top_k,
            top_p: d.top_p,
            temperature: d.temperature,
            repetition_penalty: d.repetition_penalty,
            parallel_infer: d.parallel_infer,
            speed_factor: d.speed_factor,
            fragment_interval: d.fragment_interval,
        }
    }
}

impl From<RawSynthesisParams> for SynthesisParams {
    fn from(raw: RawSynthesisParams) -> Self {
        let mut params = Self::default();
        params.set_text_split_method(raw.text_split_method);
        params.set_batch_size(raw.batch_size);
        params.set_batch_threshold(raw.batch_threshold);
        params.set_split_bucket(raw.split_bucket);
        params.set_streaming_mode(raw.streaming_mode);
        params.set_top_k(raw.top_k);
        params.set_top_p(raw.top_p);
        params.set_temperature(raw.temperature);
        params.set_repetition_penalty(raw.repetition_penalty);
        params.set_parallel_infer(raw.parallel_infer);
        params.set_speed_factor(raw.speed_factor);
        params.set_fragment_interval(raw.fragment_interval);
        params
    }
}
