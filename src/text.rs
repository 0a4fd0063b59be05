use std::cmp::Ordering;

use deunicode::deunicode;

/// Normalize a string for comparison.
/// Applies transliteration and lowercase (e.g., "Émile" -> "emile").
pub fn normalize(s: &str) -> String {
    deunicode(s).to_lowercase()
}

/// Locale-style ordering: accents and case are ignored first, the raw
/// string breaks ties so the order stays total.
pub fn collate(a: &str, b: &str) -> Ordering {
    normalize(a).cmp(&normalize(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_accents_and_case() {
        assert_eq!(normalize("Émile ZOLA"), "emile zola");
        assert_eq!(normalize("Иван"), "ivan");
    }

    #[test]
    fn collate_orders_accented_names_with_their_base_letter() {
        assert_eq!(collate("Émile", "Frank"), Ordering::Less);
        assert_eq!(collate("emile", "Emile"), Ordering::Greater);
        assert_eq!(collate("Anna", "Anna"), Ordering::Equal);
    }
}
