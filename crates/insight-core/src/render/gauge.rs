//! Price gauge, upside direction and signal badge

use crate::types::{FinancialForecast, Signal};
use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid number pattern"));

/// Markers never sit past this percentage of the bar
pub const MARKER_CAP: f64 = 95.0;

/// First number in a display price ("NT$1,050.5 元" → 1050.5), or 0
pub fn parse_price(text: &str) -> f64 {
    let cleaned = text.replace(',', "");
    NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0)
}

/// Current price vs fair value on a 0..100 bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceGauge {
    pub current: f64,
    pub fair: f64,
    /// Bar end: the larger price plus 20%
    pub max: f64,
    pub current_pct: f64,
    pub fair_pct: f64,
}

impl PriceGauge {
    pub fn new(current: f64, fair: f64) -> Self {
        let max = current.max(fair) * 1.2;
        let pct = |value: f64| if max > 0.0 { value / max * 100.0 } else { 0.0 };
        Self {
            current,
            fair,
            max,
            current_pct: pct(current),
            fair_pct: pct(fair),
        }
    }

    /// Gauge for a forecast, only when both prices parse to positive values
    pub fn from_forecast(forecast: &FinancialForecast) -> Option<Self> {
        let gauge = Self::new(
            parse_price(&forecast.current_price),
            parse_price(&forecast.fair_value),
        );
        gauge.is_visible().then_some(gauge)
    }

    pub fn is_visible(&self) -> bool {
        self.current > 0.0 && self.fair > 0.0
    }

    pub fn current_marker(&self) -> f64 {
        self.current_pct.min(MARKER_CAP)
    }

    pub fn fair_marker(&self) -> f64 {
        self.fair_pct.min(MARKER_CAP)
    }

    /// Start and width of the band between the two markers
    pub fn band(&self) -> (f64, f64) {
        let start = self.current_pct.min(self.fair_pct).min(MARKER_CAP);
        (start, (self.fair_pct - self.current_pct).abs())
    }

    /// Draw the gauge as `width` cells: `│` current, `◆` fair, `━` band
    pub fn bar(&self, width: usize) -> String {
        if width == 0 {
            return String::new();
        }
        let cell = |pct: f64| ((pct / 100.0 * width as f64).round() as usize).min(width - 1);

        let (start, span) = self.band();
        let band_from = cell(start);
        let band_to = cell((start + span).min(100.0));
        let current = cell(self.current_marker());
        let fair = cell(self.fair_marker());

        (0..width)
            .map(|i| {
                if i == current {
                    '│'
                } else if i == fair {
                    '◆'
                } else if (band_from..=band_to).contains(&i) {
                    '━'
                } else {
                    '─'
                }
            })
            .collect()
    }
}

/// Whether an upside string reads as positive
///
/// Positive when it carries a `+`, or has no `-` and is not `N/A`.
pub fn is_positive_upside(upside: &str) -> bool {
    upside.contains('+') || (!upside.contains('-') && upside != "N/A")
}

/// Colour family of a signal badge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTone {
    Green,
    Red,
    Amber,
}

impl From<Signal> for SignalTone {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Buy => SignalTone::Green,
            Signal::Sell => SignalTone::Red,
            Signal::Hold => SignalTone::Amber,
        }
    }
}

/// Badge text for a signal
pub fn signal_label(signal: Signal) -> &'static str {
    match signal {
        Signal::Buy => "● 買進訊號 (BUY)",
        Signal::Sell => "● 賣出訊號 (SELL)",
        Signal::Hold => "● 觀望/持倉 (HOLD)",
    }
}
