#![allow(clippy::unwrap_used, clippy::expect_used)]

use factbot_core::*;

// ---------------------------------------------------------------------------
// 1. RetrievedFact serialization roundtrip
// ---------------------------------------------------------------------------

#[test]
fn retrieved_fact_serialization_roundtrip() {
    let fact = RetrievedFact::new(42, "Lincoln signed the Emancipation Proclamation", 0.95);

    let json = serde_json::to_string(&fact).unwrap();
    let deserialized: RetrievedFact = serde_json::from_str(&json).unwrap();

    assert_eq!(deserialized.term_id, 42);
    assert_eq!(
        deserialized.fact,
        "Lincoln signed the Emancipation Proclamation"
    );
    assert_eq!(deserialized.score, 0.95);
    assert_eq!(deserialized, fact);
}

// ---------------------------------------------------------------------------
// 2. Error Display and From impls
// ---------------------------------------------------------------------------

#[test]
fn error_display_and_from_impls() {
    // String-based variants display correctly
    let store_err = FactbotError::Store("disk full".to_string());
    assert_eq!(store_err.to_string(), "Store error: disk full");

    let arg_err = FactbotError::InvalidArgument("no such term: 99".to_string());
    assert_eq!(arg_err.to_string(), "Invalid argument: no such term: 99");

    let provider_err = FactbotError::Provider("rate limited".to_string());
    assert_eq!(provider_err.to_string(), "Provider error: rate limited");

    let config_err = FactbotError::Config("bad threshold".to_string());
    assert_eq!(config_err.to_string(), "Config error: bad threshold");

    // From impls for ambient error sources
    let json_err = serde_json::from_str::<RetrievedFact>("not json").unwrap_err();
    let converted: FactbotError = json_err.into();
    assert!(matches!(converted, FactbotError::Json(_)));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let converted: FactbotError = io_err.into();
    assert!(matches!(converted, FactbotError::Io(_)));
}

// ---------------------------------------------------------------------------
// 3. Result alias works with ? propagation
// ---------------------------------------------------------------------------

#[test]
fn result_alias_propagates() {
    fn parse(s: &str) -> FactbotResult<RetrievedFact> {
        let fact: RetrievedFact = serde_json::from_str(s)?;
        Ok(fact)
    }

    assert!(parse("{bad").is_err());
    let ok = parse(r#"{"term_id":1,"fact":"f","score":0.5}"#).unwrap();
    assert_eq!(ok.term_id, 1);
}
