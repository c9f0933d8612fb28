//! Integration tests for link validation through the public API.

use grabber_core::parser::{MAX_URL_LENGTH, ValidationError, extract_link, extract_urls, validate};
use grabber_core::Provider;

#[test]
fn test_validate_accepts_share_text_for_every_provider() {
    let cases = [
        (Provider::Chingari, "Watch this on Chingari! https://chingari.io/share/post?id=5f1e"),
        (Provider::Likee, "Check out this video on Likee https://l.likee.video/v/Abc12"),
        (Provider::Roposo, "https://www.roposo.com/story/dance/3c9b1e7a, shared via Roposo"),
    ];

    for (provider, text) in cases {
        let validated = validate(text, provider).unwrap();
        assert_eq!(validated.provider(), provider);
        assert!(validated.as_str().starts_with("https://"));
    }
}

#[test]
fn test_validate_strips_trailing_punctuation() {
    let validated = validate("https://www.roposo.com/story/dance/3c9b1e7a, shared", Provider::Roposo)
        .unwrap();
    assert_eq!(validated.as_str(), "https://www.roposo.com/story/dance/3c9b1e7a");
}

#[test]
fn test_validate_empty_input_maps_to_enter_url() {
    let err = validate("", Provider::Chingari).unwrap_err();
    assert_eq!(err, ValidationError::Empty);
    assert_eq!(err.user_message(), "Enter URL");
}

#[test]
fn test_validate_non_link_maps_to_enter_valid_url() {
    let err = validate("hello world", Provider::Likee).unwrap_err();
    assert_eq!(err.user_message(), "Enter valid URL");
}

#[test]
fn test_validate_cross_provider_links_rejected() {
    for provider in Provider::all() {
        for other in Provider::all() {
            if provider == other {
                continue;
            }
            let link = format!("https://{}.example/v/1", other.marker());
            let err = validate(&link, provider).unwrap_err();
            assert_eq!(err.user_message(), "Enter valid URL", "{provider} accepted {link}");
        }
    }
}

#[test]
fn test_validate_marker_in_host_is_case_insensitive() {
    assert!(validate("https://WWW.LIKEE.VIDEO/v/abc", Provider::Likee).is_ok());
}

#[test]
fn test_validate_uses_first_url_only() {
    let err = validate(
        "https://example.com/x then https://likee.video/v/1",
        Provider::Likee,
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::WrongProvider { .. }));
}

#[test]
fn test_overlong_url_is_not_extracted() {
    let long = format!("https://likee.video/{}", "a".repeat(MAX_URL_LENGTH));
    let results = extract_urls(&long);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
    assert_eq!(validate(&long, Provider::Likee), Err(ValidationError::NoUrlFound));
}

#[test]
fn test_extract_link_pulls_url_from_clipboard_text() {
    assert_eq!(
        extract_link("I found this (https://chingari.io/share/post?id=1)").as_deref(),
        Some("https://chingari.io/share/post?id=1")
    );
    assert_eq!(extract_link(""), None);
}
