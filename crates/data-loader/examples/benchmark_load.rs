use anyhow::Result;
use data_loader::{DataIndex, LoadConfig};
use std::time::Instant;

fn main() -> Result<()> {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let config = LoadConfig::new(&data_dir);

    println!("Loading dataset from {} with {} threads...\n", data_dir, config.threads);

    let start = Instant::now();
    let index = DataIndex::load_from_files(&config)?;
    let elapsed = start.elapsed();

    let (users, items, interactions) = index.counts();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Items: {}", items);
    println!("Interactions: {}", interactions);
    println!(
        "\nPerformance: {:.0} interactions/second",
        interactions as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
