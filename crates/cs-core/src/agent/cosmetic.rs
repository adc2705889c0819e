//! Static stylesheet hiding ad overlays and banners

/// Id of the injected `<style>` element, used to inject it once per page.
pub const STYLE_ELEMENT_ID: &str = "cleanstream-cosmetic";

/// Build the stylesheet hiding every selector. Empty input yields an empty
/// string so callers can skip injection.
pub fn cosmetic_stylesheet<S: AsRef<str>>(selectors: &[S]) -> String {
    let selectors: Vec<&str> = selectors
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if selectors.is_empty() {
        return String::new();
    }
    format!("{} {{ display: none !important; }}", selectors.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AgentSettings;

    #[test]
    fn test_stylesheet_lists_all_selectors() {
        let css = cosmetic_stylesheet(&AgentSettings::default().hidden_selectors);
        assert!(css.starts_with(".ytp-ad-player-overlay, .ytp-ad-overlay-slot"));
        assert!(css.contains("#player-ads"));
        assert!(css.ends_with("{ display: none !important; }"));
    }

    #[test]
    fn test_empty_selectors() {
        assert_eq!(cosmetic_stylesheet::<&str>(&[]), "");
        assert_eq!(cosmetic_stylesheet(&[" ", ""]), "");
    }
}
