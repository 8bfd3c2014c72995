//! Category catalog listing

use crate::catalog;
use crate::error::Result;
use colored::Colorize;
use tabled::{Table, Tabled};
use tooling::logging::truncate_for_log;

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Handle categories command
pub fn handle_categories(preset: &str, full: bool) -> Result<()> {
    let categories = catalog::preset(preset)?;

    let rows: Vec<CategoryRow> = categories
        .into_iter()
        .enumerate()
        .map(|(i, category)| CategoryRow {
            position: i + 1,
            name: category.name,
            description: if full {
                category.description
            } else {
                truncate_for_log(&category.description, 70)
            },
        })
        .collect();

    println!("{}", format!("Preset: {}", preset).bold());
    println!("{}", Table::new(rows));
    println!(
        "Available presets: {}",
        catalog::PRESETS.join(", ").cyan()
    );

    Ok(())
}
