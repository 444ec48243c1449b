//! Catalog report rendering.

use std::fmt::Write as _;

use crate::application::dto::{CatalogReport, ProductReport};

/// Output format for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Line severity in the text report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Partial,
    Failed,
    Empty,
}

impl Level {
    fn of(product: &ProductReport) -> Self {
        match (product.loaded.is_empty(), product.errors.is_empty()) {
            (true, true) => Self::Empty,
            (false, true) => Self::Ok,
            (false, false) => Self::Partial,
            (true, false) => Self::Failed,
        }
    }

    const fn marker(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Empty => "empty",
        }
    }
}

/// Renders `report` in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render(report: &CatalogReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => serde_json::to_string_pretty(report),
    }
}

fn render_text(report: &CatalogReport) -> String {
    let mut out = String::new();

    for product in &report.products {
        let owner = product.owner.as_deref().unwrap_or("-");
        let _ = write!(out, "[{:<7}] {owner}", Level::of(product).marker());
        if let Some(name) = &product.name {
            let _ = write!(out, " ({name})");
        }
        let _ = writeln!(
            out,
            ": {}/{} loaded",
            product.stats.loaded, product.stats.total
        );

        for image in &product.loaded {
            let source = if image.from_cache { "cached" } else { "probed" };
            let _ = writeln!(out, "    + {} {} [{source}]", image.image.id, image.url());
        }
        for url in &product.errors {
            let _ = writeln!(out, "    - {url}");
        }
    }

    let _ = writeln!(
        out,
        "{} loaded, {} failed; {}",
        report.loaded_count(),
        report.failed_count(),
        report.registry
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ImageStats;
    use crate::domain::entities::{ImageDescriptor, LoadedImage, NormalizedImage};
    use crate::infrastructure::image::ImageRegistry;

    fn report() -> CatalogReport {
        let image = NormalizedImage {
            id: "7_0".to_string(),
            url: "https://a.test/1.png".to_string(),
            description: "Image 1".to_string(),
            kind: "image".to_string(),
            index: 0,
            original: ImageDescriptor::from("https://a.test/1.png"),
        };
        CatalogReport {
            products: vec![
                ProductReport {
                    owner: Some("7".to_string()),
                    name: Some("Mug".to_string()),
                    loaded: vec![LoadedImage::new(image, true)],
                    errors: vec!["https://a.test/2.png".to_string()],
                    stats: ImageStats {
                        total: 2,
                        loaded: 1,
                        failed: 1,
                        ..ImageStats::default()
                    },
                },
                ProductReport {
                    owner: None,
                    name: None,
                    loaded: Vec::new(),
                    errors: Vec::new(),
                    stats: ImageStats::default(),
                },
            ],
            registry: ImageRegistry::new().stats(),
        }
    }

    #[test]
    fn test_text_report() {
        let text = render(&report(), ReportFormat::Text).unwrap();

        assert!(text.contains("[partial] 7 (Mug): 1/2 loaded"));
        assert!(text.contains("+ 7_0 https://a.test/1.png [cached]"));
        assert!(text.contains("- https://a.test/2.png"));
        assert!(text.contains("[empty  ] -: 0/0 loaded"));
        assert!(text.contains("1 loaded, 1 failed"));
    }

    #[test]
    fn test_json_report() {
        let json = render(&report(), ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["products"][0]["loaded"][0]["id"], "7_0");
        assert_eq!(value["products"][0]["loaded"][0]["from_cache"], true);
        assert_eq!(value["products"][0]["errors"][0], "https://a.test/2.png");
        assert!(value["products"][0]["loaded"][0].get("original").is_none());
        assert_eq!(value["registry"]["cache_size"], 0);
    }
}
