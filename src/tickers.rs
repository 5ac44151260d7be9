//! Token-symbol extraction from raw message text.
//!
//! Pulls `$CASHTAG` mentions and `BASE/QUOTE` style pair symbols out of a
//! message so callers can turn them into full-text search terms.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Ticker symbol, optionally with a wrapped/staked prefix.
const TICKER: &str = r"(?:st|w)?[A-Z]{2,10}";

static CASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\$({TICKER})")).expect("valid regex"));
static PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"({TICKER})\s?[-/_]\s?({TICKER})")).expect("valid regex"));

/// Extract `$SYMBOL` cashtags.
pub fn extract_cashtags(text: &str) -> Vec<String> {
    let symbols: BTreeSet<String> = CASHTAG
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    symbols.into_iter().collect()
}

/// Extract `BASE/QUOTE`, `BASE-QUOTE`, and `BASE_QUOTE` pairs.
pub fn extract_pairs(text: &str) -> Vec<(String, String)> {
    let pairs: BTreeSet<(String, String)> = PAIR
        .captures_iter(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect();
    pairs.into_iter().collect()
}

/// All token symbols mentioned in the text, deduplicated and sorted.
pub fn extract_token_mentions(text: &str) -> Vec<String> {
    let mut symbols: BTreeSet<String> = extract_cashtags(text).into_iter().collect();
    for (base, quote) in extract_pairs(text) {
        symbols.insert(base);
        symbols.insert(quote);
    }
    symbols.into_iter().collect()
}

/// Expand user-supplied symbols (`$BTC`, `BTC/USDT`) into plain full-text
/// terms. Tokens with no recognizable symbol pass through unchanged.
pub fn expand_terms(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for token in tokens {
        let mentions = extract_token_mentions(token);
        if mentions.is_empty() {
            out.push(token.clone());
        } else {
            out.extend(mentions);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cashtags() {
        assert_eq!(
            extract_token_mentions("Looking at $BTC and $ETH prices"),
            vec!["BTC", "ETH"]
        );
    }

    #[test]
    fn extracts_pairs_with_any_separator() {
        let mentions =
            extract_token_mentions("BTC/USDT is bullish while ETH-USDT consolidates and APT / USDC trades");
        assert_eq!(mentions, vec!["APT", "BTC", "ETH", "USDC", "USDT"]);
    }

    #[test]
    fn keeps_wrapped_and_staked_prefixes() {
        let mentions = extract_token_mentions("I hold $wETH and $stTON");
        assert_eq!(mentions, vec!["stTON", "wETH"]);
    }

    #[test]
    fn deduplicates_repeated_mentions() {
        let mentions = extract_token_mentions("$BTC $BTC BTC/USDT BTC-USDT");
        assert_eq!(mentions, vec!["BTC", "USDT"]);
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert!(extract_token_mentions("random text with no tokens").is_empty());
    }

    #[test]
    fn expand_terms_falls_back_to_raw_tokens() {
        let tokens = vec!["$BTC".to_string(), "staking".to_string()];
        assert_eq!(expand_terms(&tokens), vec!["BTC", "staking"]);
    }
}
