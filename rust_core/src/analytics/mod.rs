//! P/E ratio analytics
//!
//! Pure functions over a [`RawQuote`]:
//! - P/E ratio, preferring the API's own `metrics."pe/ratio"` and falling
//!   back to price / EPS
//! - Category and valuation signal derived from the ratio
//! - Opportunistic extraction of market fields
//!
//! Nothing here performs I/O or reads the clock; the observation timestamp is
//! an input so replaying a record reproduces the same result.

mod market_data;

pub use market_data::extract_market_data;

use tracing::{debug, info, warn};

use crate::models::quote::{
    metrics, parse_number, FIELD_CURRENCY, FIELD_CURRENT_PRICE, FIELD_DATA_TIMESTAMP,
    FIELD_EARNINGS_ANNOUNCEMENT,
};
use crate::models::{
    AnalyticsResult, PeAnalytics, PeCategory, RawQuote, ResultMetadata, ValuationSignal,
    ANALYSIS_TYPE, DEFAULT_CURRENCY, PROCESSING_SOURCE, PROCESSOR_VERSION,
};

/// Round to two decimal places, half to even on exact ties.
///
/// A tie is only a tie when `value * 100` is exact; otherwise the rounding
/// error of the product decides the direction. Values too large to scale are
/// returned unchanged.
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 {
        let error = value.mul_add(100.0, -scaled);
        if error == 0.0 {
            scaled.round_ties_even()
        } else if error > 0.0 {
            scaled.ceil()
        } else {
            scaled.floor()
        }
    } else {
        scaled.round()
    };
    rounded / 100.0
}

/// Compute the P/E ratio for a quote, or `None` if it cannot be determined.
///
/// A pre-computed ratio wins even if price and EPS disagree with it. An
/// unparseable ratio falls through to the price / EPS derivation. EPS of
/// exactly zero leaves the ratio undefined.
pub fn calculate_pe_ratio(quote: &RawQuote) -> Option<f64> {
    if let Some(raw) = quote.metric(metrics::PE_RATIO) {
        match parse_number(raw) {
            Some(pe) => {
                debug!(pe_ratio = pe, "Using provided P/E ratio");
                return Some(round2(pe));
            }
            None => warn!(value = %raw, "Invalid P/E ratio in metrics, falling back to calculation"),
        }
    }

    let price = quote.number(FIELD_CURRENT_PRICE);
    let eps = quote.metric_number(metrics::EPS);

    match (price, eps) {
        (Some(price), Some(eps)) if eps != 0.0 && (price / eps).is_finite() => {
            let pe = price / eps;
            debug!(price, eps, pe_ratio = pe, "Calculated P/E ratio");
            Some(round2(pe))
        }
        _ => {
            debug!(?price, ?eps, "Cannot calculate P/E ratio");
            None
        }
    }
}

/// Investment category for a P/E ratio. Upper bounds are exclusive.
pub fn categorize_pe_ratio(pe_ratio: f64) -> PeCategory {
    if pe_ratio <= 0.0 {
        PeCategory::NegativeEarnings
    } else if pe_ratio < 10.0 {
        PeCategory::Undervalued
    } else if pe_ratio < 15.0 {
        PeCategory::FairValue
    } else if pe_ratio < 25.0 {
        PeCategory::GrowthStock
    } else if pe_ratio < 50.0 {
        PeCategory::Expensive
    } else {
        PeCategory::HighlySpeculative
    }
}

/// Three-state trading signal for a P/E ratio.
///
/// Uses a coarser boundary set than [`categorize_pe_ratio`]; both tables are
/// part of the cached payload contract and must stay as they are.
pub fn valuation_signal(pe_ratio: f64) -> ValuationSignal {
    if pe_ratio <= 0.0 {
        ValuationSignal::Avoid
    } else if pe_ratio < 15.0 {
        ValuationSignal::Buy
    } else if pe_ratio < 25.0 {
        ValuationSignal::Hold
    } else {
        ValuationSignal::Sell
    }
}

/// Ratio, category and signal together, with sentinels when not computable.
pub fn pe_analytics(quote: &RawQuote) -> PeAnalytics {
    match calculate_pe_ratio(quote) {
        Some(pe) => PeAnalytics {
            pe_ratio: Some(pe),
            pe_category: categorize_pe_ratio(pe),
            valuation_signal: valuation_signal(pe),
        },
        None => PeAnalytics {
            pe_ratio: None,
            pe_category: PeCategory::InsufficientData,
            valuation_signal: ValuationSignal::Unknown,
        },
    }
}

fn result_metadata(quote: &RawQuote) -> ResultMetadata {
    ResultMetadata {
        processor_version: PROCESSOR_VERSION.to_string(),
        processing_source: PROCESSING_SOURCE.to_string(),
        analysis_type: ANALYSIS_TYPE.to_string(),
        data_timestamp: quote.field(FIELD_DATA_TIMESTAMP).cloned(),
        currency: quote
            .text(FIELD_CURRENCY)
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string(),
        next_earnings: quote.field(FIELD_EARNINGS_ANNOUNCEMENT).cloned(),
    }
}

/// Build the full analytics result for one quote.
///
/// `symbol` is the tracked identifier the record was published under and
/// `observed_at` the ISO-8601 timestamp to stamp the result with.
pub fn analyze(quote: &RawQuote, symbol: &str, observed_at: &str) -> AnalyticsResult {
    let analytics = pe_analytics(quote);
    let market_data = extract_market_data(quote);

    if analytics.pe_ratio.is_none() {
        warn!(symbol, "Could not calculate P/E ratio - missing data");
    }
    info!(
        symbol,
        pe_ratio = ?analytics.pe_ratio,
        price = ?market_data.current_price,
        signal = analytics.valuation_signal.as_str(),
        "Completed P/E analysis"
    );

    AnalyticsResult {
        symbol: symbol.to_string(),
        timestamp: observed_at.to_string(),
        original_data: quote.clone(),
        analytics,
        market_data,
        metadata: result_metadata(quote),
    }
}
