use crate::config::Config;
use crate::record::CatalogEntry;
use anyhow::Result;
use colored::*;

/// Load the external read-only catalog. Each configured source group lists
/// fallback locations tried in order; an unreachable group degrades to
/// nothing with a warning so the rest of the tool keeps working offline.
pub async fn load_catalog(config: &Config) -> Vec<CatalogEntry> {
    let client = reqwest::Client::new();
    let mut entries = Vec::new();

    for group in &config.catalog_sources {
        match load_group(&client, group).await {
            Some(mut rows) => entries.append(&mut rows),
            None => {
                if !group.is_empty() {
                    eprintln!(
                        "{}",
                        format!("Warning: no reachable catalog source in {:?}", group).yellow()
                    );
                }
            }
        }
    }

    entries
}

async fn load_group(client: &reqwest::Client, locations: &[String]) -> Option<Vec<CatalogEntry>> {
    for location in locations {
        if let Ok(rows) = fetch_source(client, location).await {
            return Some(rows);
        }
    }
    None
}

async fn fetch_source(client: &reqwest::Client, location: &str) -> Result<Vec<CatalogEntry>> {
    if location.starts_with("http") {
        let rows = client
            .get(location)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    } else {
        let content = tokio::fs::read_to_string(location).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn first_reachable_location_in_a_group_wins() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("banners.json");
        fs::write(
            &present,
            r#"[{"nombre": "Catalogo", "img_src": "https://cdn/c.png"}]"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.catalog_sources = vec![vec![
            dir.path().join("missing.json").display().to_string(),
            present.display().to_string(),
        ]];

        let entries = load_catalog(&config).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Catalogo");
    }

    #[tokio::test]
    async fn unreachable_groups_degrade_to_empty() {
        let mut config = Config::default();
        config.catalog_sources = vec![vec!["/nonexistent/banners.json".to_string()]];
        assert!(load_catalog(&config).await.is_empty());
    }
}
