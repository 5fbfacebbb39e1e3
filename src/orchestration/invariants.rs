// Region-index alignment of per-region arrays

use tracing::warn;

use crate::core::types::{RegionTranslation, Style};

/// Pad or truncate the per-region arrays to `region_count` entries.
///
/// Missing texts and translations become empty, missing styles take
/// `default_style`. Returns how many arrays had to be corrected.
pub fn align_to_regions(
    region_count: usize,
    texts: &mut Vec<String>,
    translations: &mut Vec<RegionTranslation>,
    styles: &mut Vec<Style>,
    default_style: &Style,
) -> usize {
    let mut repaired = 0;

    if texts.len() != region_count {
        warn!("Texts: {} entries for {} regions, aligning", texts.len(), region_count);
        texts.resize(region_count, String::new());
        repaired += 1;
    }
    if translations.len() != region_count {
        warn!(
            "Translations: {} entries for {} regions, aligning",
            translations.len(),
            region_count
        );
        translations.resize_with(region_count, RegionTranslation::default);
        repaired += 1;
    }
    if styles.len() != region_count {
        warn!("Styles: {} entries for {} regions, aligning", styles.len(), region_count);
        styles.resize(region_count, default_style.clone());
        repaired += 1;
    }

    repaired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pads_and_truncates() {
        let mut texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut translations = vec![RegionTranslation::new("x")];
        let mut styles = Vec::new();
        let default_style = Style {
            rotation_degrees: 15.0,
            ..Style::default()
        };

        let repaired = align_to_regions(2, &mut texts, &mut translations, &mut styles, &default_style);

        assert_eq!(repaired, 3);
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(translations[1], RegionTranslation::default());
        assert_eq!(styles, vec![default_style.clone(), default_style]);
    }

    #[test]
    fn test_aligned_arrays_are_untouched() {
        let mut texts = vec![String::new()];
        let mut translations = vec![RegionTranslation::default()];
        let mut styles = vec![Style::default()];
        assert_eq!(
            align_to_regions(1, &mut texts, &mut translations, &mut styles, &Style::default()),
            0
        );
    }
}
