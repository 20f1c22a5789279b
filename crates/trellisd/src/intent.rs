use trellis_core::ProductFilter;

const GENDER_TERMS: &[&str] = &["men", "women", "boys", "girls"];
const COLOR_TERMS: &[&str] = &["red", "blue", "black", "white"];
const TYPE_TERMS: &[&str] = &[
    "bra", "bras", "shirt", "shirts", "t-shirt", "t-shirts", "pants", "jeans", "dress",
];

/// Extracts the gender/color/type filter triple from a user utterance by
/// matching words against the fixed vocabularies.
pub fn extract_filter(utterance: &str) -> ProductFilter {
    let lowered = utterance.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let gender = first_match(&words, GENDER_TERMS);
    let color = first_match(&words, COLOR_TERMS);
    let mut product_type = first_match(&words, TYPE_TERMS);

    // "t shirt" split across two words.
    if product_type.is_none() && words.contains(&"t") && words.contains(&"shirt") {
        product_type = Some("shirt".to_owned());
    }

    ProductFilter {
        gender,
        color,
        product_type,
    }
}

fn first_match(words: &[&str], vocabulary: &[&str]) -> Option<String> {
    words
        .iter()
        .find(|word| vocabulary.contains(*word))
        .map(|word| (*word).to_owned())
}
