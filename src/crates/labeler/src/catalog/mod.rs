//! Built-in category presets

use crate::config::CategoryConfig;
use crate::error::{LabelerError, Result};
use serde::Deserialize;

const MARKET_APP: &str = include_str!("market_app.toml");

/// Names accepted by [`preset`]
pub const PRESETS: &[&str] = &["market-app"];

#[derive(Deserialize)]
struct CatalogFile {
    category: Vec<CategoryConfig>,
}

/// Categories of a named preset, in catalog order
pub fn preset(name: &str) -> Result<Vec<CategoryConfig>> {
    let source = match name {
        "market-app" => MARKET_APP,
        other => {
            return Err(LabelerError::Config(format!(
                "unknown preset '{}' (available: {})",
                other,
                PRESETS.join(", ")
            )))
        }
    };
    let catalog: CatalogFile = toml::from_str(source)?;
    Ok(catalog.category)
}

/// Keep only the named categories, in the order given
///
/// Matching ignores case and surrounding whitespace.
pub fn select(categories: &[CategoryConfig], names: &[String]) -> Result<Vec<CategoryConfig>> {
    names
        .iter()
        .map(|wanted| {
            let wanted = wanted.trim().to_lowercase();
            categories
                .iter()
                .find(|c| c.name.trim().to_lowercase() == wanted)
                .cloned()
                .ok_or_else(|| {
                    LabelerError::Config(format!("category '{}' is not defined", wanted))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_app_has_sixteen_categories() {
        let categories = preset("market-app").unwrap();
        assert_eq!(categories.len(), 16);
        assert_eq!(categories[0].name, "Güven");
        assert_eq!(categories[15].name, "Teslimat Süresi");
        assert!(categories.iter().all(|c| !c.description.trim().is_empty()));
        assert!(categories.iter().all(|c| c.target_positive.is_none()));
    }

    #[test]
    fn test_unknown_preset() {
        assert!(preset("sports").is_err());
    }

    #[test]
    fn test_select_by_name() {
        let categories = preset("market-app").unwrap();
        let selected = select(
            &categories,
            &["teslimat".to_string(), "İndirim".to_string()],
        )
        .unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "Teslimat");
        assert_eq!(selected[1].name, "İndirim");

        assert!(select(&categories, &["Hava Durumu".to_string()]).is_err());
    }
}
