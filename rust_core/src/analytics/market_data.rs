use crate::models::quote::{
    metrics, FIELD_CURRENT_PRICE, FIELD_HIGH_PRICE, FIELD_HISTORICAL_PRICE, FIELD_LOW_PRICE,
    FIELD_OPEN_PRICE, FIELD_PRICE_CHANGE, FIELD_PRICE_CHANGE_PERCENT, FIELD_VOLUME,
};
use crate::models::{MarketData, RawQuote};

/// Copy the market fields present in the quote, values untouched.
///
/// A field that is missing or null is left out. Present values keep their
/// JSON type, so `"121.00"` stays a string and `1250000` stays an integer.
pub fn extract_market_data(quote: &RawQuote) -> MarketData {
    let top = |field: &str| quote.field(field).cloned();
    let metric = |name: &str| quote.metric(name).cloned();

    MarketData {
        current_price: top(FIELD_CURRENT_PRICE),
        open_price: top(FIELD_OPEN_PRICE),
        high_price: top(FIELD_HIGH_PRICE),
        low_price: top(FIELD_LOW_PRICE),
        price_change: top(FIELD_PRICE_CHANGE),
        price_change_percent: top(FIELD_PRICE_CHANGE_PERCENT),
        volume: top(FIELD_VOLUME),
        market_cap: metric(metrics::MARKET_CAP),
        avg_volume: metric(metrics::AVG_VOLUME),
        eps: metric(metrics::EPS),
        shares_outstanding: metric(metrics::SHARES_OUTSTANDING),
        historical_prices: top(FIELD_HISTORICAL_PRICE),
    }
}
