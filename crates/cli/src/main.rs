use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{
    write_joined_interactions, DataIndex, Entity, InteractionType, ItemId, ItemProfile, LoadConfig,
    SimilarItem, Timestamp, UserId, UserProfile,
};
use evaluation::{BatchEvaluator, Dispatch, EvaluationConfig, GroundTruth};
use rand::Rng;
use recommender::{build_recommender, Algorithm, Recommendation, SimilarityEngine};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// cf-recs - Collaborative-filtering recommendation engine
#[derive(Parser)]
#[command(name = "cf-recs")]
#[command(about = "In-memory UserCF / ItemCF recommendation engine", long_about = None)]
struct Cli {
    /// Directory holding users.csv, items.csv and the interaction files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Worker threads (default: all cores)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// Shards per entity store
    #[arg(long, global = true)]
    shards: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dataset sizes and ID ranges
    Stats,

    /// Show a user's attributes and interaction history
    User {
        #[arg(long)]
        user_id: UserId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an item's attributes and interaction history
    Item {
        #[arg(long)]
        item_id: ItemId,

        /// Build the similarity index with this capacity and list the
        /// item's neighbours
        #[arg(long)]
        similar: Option<usize>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend items for one user
    Recommend {
        #[arg(long)]
        user_id: UserId,

        /// usercf or itemcf
        #[arg(long, default_value = "usercf")]
        algorithm: Algorithm,

        /// Neighbour users (UserCF) or similar items kept per item (ItemCF)
        #[arg(short, long, default_value = "20")]
        k: usize,

        /// Number of recommendations to return
        #[arg(long, default_value = "30")]
        limit: usize,
    },

    /// Score an algorithm against the held-out test interactions
    Evaluate {
        #[arg(long, default_value = "usercf")]
        algorithm: Algorithm,

        #[arg(short, long, default_value = "20")]
        k: usize,

        /// thread-group or job-pool
        #[arg(long, default_value = "thread-group")]
        dispatch: Dispatch,

        /// Test interactions (default: <data-dir>/interactions_test.csv)
        #[arg(long)]
        test_file: Option<PathBuf>,

        /// Per-user report
        #[arg(short, long, default_value = "rcmd_result.txt")]
        output: PathBuf,
    },

    /// Write all interactions, latest first, joined with user and item attributes
    ExportJoined {
        #[arg(short, long, default_value = "joined_interactions.tsv")]
        output: PathBuf,
    },

    /// Time recommendations for randomly chosen users
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,

        #[arg(long, default_value = "usercf")]
        algorithm: Algorithm,

        #[arg(short, long, default_value = "20")]
        k: usize,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = LoadConfig::new(&cli.data_dir);
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    if let Some(shards) = cli.shards {
        config = config.with_shard_count(shards);
    }

    // Load data index (this may take a moment)
    println!("Loading dataset from {}...", cli.data_dir.display());
    let start = Instant::now();
    let data_index = Arc::new(
        DataIndex::load_from_files(&config).context("Failed to load dataset")?,
    );
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Stats => handle_stats(&data_index),
        Commands::User { user_id, json } => handle_user(&data_index, user_id, json)?,
        Commands::Item {
            item_id,
            similar,
            json,
        } => handle_item(data_index, &config, item_id, similar, json)?,
        Commands::Recommend {
            user_id,
            algorithm,
            k,
            limit,
        } => handle_recommend(data_index, &config, user_id, algorithm, k, limit)?,
        Commands::Evaluate {
            algorithm,
            k,
            dispatch,
            test_file,
            output,
        } => {
            let test_file = test_file.unwrap_or_else(|| config.test_interactions_path());
            let eval_config = EvaluationConfig::new(algorithm, k)
                .with_threads(config.threads)
                .with_dispatch(dispatch);
            handle_evaluate(data_index, eval_config, test_file, output)?
        }
        Commands::ExportJoined { output } => handle_export(&data_index, output)?,
        Commands::Benchmark {
            requests,
            concurrent,
            algorithm,
            k,
        } => handle_benchmark(data_index, &config, requests, concurrent, algorithm, k)?,
    }

    Ok(())
}

/// Handle the 'stats' command
fn handle_stats(data_index: &DataIndex) {
    let (users, items, interactions) = data_index.counts();
    let (max_user, max_item) = data_index.max_ids();

    println!("{}", "Dataset:".bold().blue());
    println!("{}Users: {} (max ID {})", "• ".green(), users, max_user);
    println!("{}Items: {} (max ID {})", "• ".green(), items, max_item);
    println!("{}Interactions: {}", "• ".green(), interactions);
    println!("{}Store shards: {}", "• ".cyan(), data_index.users().shard_count());
}

#[derive(Serialize)]
struct InteractionView {
    peer_id: u32,
    kind: InteractionType,
    timestamp: Timestamp,
}

#[derive(Serialize)]
struct UserView<'a> {
    profile: &'a UserProfile,
    interested_items: Vec<ItemId>,
    interactions: Vec<InteractionView>,
}

#[derive(Serialize)]
struct ItemView<'a> {
    profile: &'a ItemProfile,
    interested_users: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similar_items: Option<Vec<SimilarItem>>,
    interactions: Vec<InteractionView>,
}

/// Every interaction of `entity`, latest first
fn interaction_history<E: Entity>(entity: &E) -> Vec<InteractionView> {
    let mut history: Vec<InteractionView> = InteractionType::ALL
        .iter()
        .flat_map(|&kind| entity.interactions().snapshot(kind))
        .flat_map(|(peer_id, records)| {
            records.into_iter().map(move |r| InteractionView {
                peer_id,
                kind: r.kind,
                timestamp: r.timestamp,
            })
        })
        .collect();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    history
}

fn print_history(history: &[InteractionView], peer_label: &str) {
    println!("Interactions ({}):", history.len());
    for kind in InteractionType::ALL {
        let count = history.iter().filter(|h| h.kind == kind).count();
        println!("  - {}: {}", kind, count);
    }
    for entry in history.iter().take(20) {
        println!(
            "  {} {} {} at {}",
            "•".cyan(),
            entry.kind,
            format!("{} {}", peer_label, entry.peer_id).bold(),
            entry.timestamp
        );
    }
    if history.len() > 20 {
        println!("  ... {} more", history.len() - 20);
    }
}

fn format_codes<'a>(codes: impl IntoIterator<Item = &'a u32>) -> String {
    codes
        .into_iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Handle the 'user' command
fn handle_user(data_index: &DataIndex, user_id: UserId, json: bool) -> Result<()> {
    let user = data_index
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let view = UserView {
        profile: &user.profile,
        interested_items: user.interested_items().iter().copied().collect(),
        interactions: interaction_history(user.as_ref()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let p = view.profile;
    println!("{}", format!("User ID: {}", user_id).bold().blue());
    println!("{}Job roles: {}", "• ".green(), format_codes(&p.job_roles));
    println!("{}Career level: {}", "• ".green(), p.career_level);
    println!("{}Discipline: {}", "• ".green(), p.discipline_id);
    println!("{}Industry: {}", "• ".green(), p.industry_id);
    println!("{}Location: {} / region {}", "• ".green(), p.country, p.region);
    println!(
        "{}Experience: {} CV entries, {} years, {} in current job",
        "• ".green(),
        p.cv_entries,
        p.experience_years,
        p.current_job_years
    );
    println!(
        "{}Education: degree {}, fields {}",
        "• ".green(),
        p.edu_degree,
        format_codes(&p.edu_fields)
    );
    println!("{}Interested in {} items", "• ".cyan(), view.interested_items.len());
    print_history(&view.interactions, "item");
    Ok(())
}

/// Handle the 'item' command
fn handle_item(
    data_index: Arc<DataIndex>,
    config: &LoadConfig,
    item_id: ItemId,
    similar: Option<usize>,
    json: bool,
) -> Result<()> {
    let item = data_index
        .get_item(item_id)
        .ok_or_else(|| anyhow!("Item {} not found", item_id))?;

    let similar_items = match similar {
        Some(k) => {
            SimilarityEngine::new(Arc::clone(&data_index))
                .with_threads(config.threads)
                .build_all(k)
                .context("Failed to build the item similarity index")?;
            Some(item.similar_items())
        }
        None => None,
    };
    let view = ItemView {
        profile: &item.profile,
        interested_users: item.interested_users().iter().copied().collect(),
        similar_items,
        interactions: interaction_history(item.as_ref()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let p = view.profile;
    println!("{}", format!("Item ID: {}", item_id).bold().blue());
    println!("{}Title tokens: {}", "• ".green(), format_codes(&p.title));
    println!("{}Career level: {}", "• ".green(), p.career_level);
    println!("{}Discipline: {}", "• ".green(), p.discipline_id);
    println!("{}Industry: {}", "• ".green(), p.industry_id);
    println!(
        "{}Location: {} / region {} ({:.4}, {:.4})",
        "• ".green(),
        p.country,
        p.region,
        p.latitude,
        p.longitude
    );
    println!("{}Employment type: {}", "• ".green(), p.employment_type);
    println!("{}Tags: {}", "• ".green(), format_codes(&p.tags));
    println!("{}Created at: {}", "• ".green(), p.created_at);
    println!("{}Active: {}", "• ".green(), p.active);
    println!("{}Interested users: {}", "• ".cyan(), view.interested_users.len());
    if let Some(similar_items) = &view.similar_items {
        println!("Similar items ({}):", similar_items.len());
        for s in similar_items {
            println!("  {} item {} ({:.4})", "•".cyan(), s.item_id.to_string().bold(), s.similarity);
        }
    }
    print_history(&view.interactions, "user");
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    data_index: Arc<DataIndex>,
    config: &LoadConfig,
    user_id: UserId,
    algorithm: Algorithm,
    k: usize,
    limit: usize,
) -> Result<()> {
    let user = data_index
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    let recommender = build_recommender(algorithm, Arc::clone(&data_index), config.threads);
    let start = Instant::now();
    let recommendations = recommender
        .recommend(&user, k, limit)
        .with_context(|| format!("{} failed for user {}", algorithm, user_id))?;

    print_recommendations(&recommendations, algorithm, user_id);
    println!("Computed in {:?}", start.elapsed());
    Ok(())
}

/// Handle the 'evaluate' command
fn handle_evaluate(
    data_index: Arc<DataIndex>,
    config: EvaluationConfig,
    test_file: PathBuf,
    output: PathBuf,
) -> Result<()> {
    let truth = Arc::new(
        GroundTruth::load(&test_file)
            .with_context(|| format!("Failed to load test data from {}", test_file.display()))?,
    );
    println!("Evaluating {} on {} test users...", config.algorithm, truth.len());

    let summary = BatchEvaluator::new(data_index, config)
        .run_to_file(truth, &output)
        .with_context(|| format!("Evaluation failed writing {}", output.display()))?;

    println!("{}", "Evaluation results:".bold().blue());
    println!("{}Users evaluated: {}", "• ".green(), summary.evaluated);
    println!("{}Users not found: {}", "• ".yellow(), summary.missing_users);
    println!("{}Users without recommendations: {}", "• ".yellow(), summary.empty_results);
    println!("{}Mean score: {:.3}", "• ".cyan(), summary.mean_score());
    println!("{}Time: {:?}", "• ".cyan(), summary.elapsed);
    println!("Total score: {}", format!("{:.3}", summary.total_score).bold());
    println!("Report written to {}", output.display());
    Ok(())
}

/// Handle the 'export-joined' command
fn handle_export(data_index: &DataIndex, output: PathBuf) -> Result<()> {
    let file = File::create(&output)
        .with_context(|| format!("Cannot open {} for writing", output.display()))?;
    let mut writer = BufWriter::new(file);
    let rows = write_joined_interactions(data_index, &mut writer)
        .context("Failed to export joined interactions")?;
    writer.flush()?;
    println!("{} Wrote {} rows to {}", "✓".green(), rows, output.display());
    Ok(())
}

/// Handle the 'benchmark' command
fn handle_benchmark(
    data_index: Arc<DataIndex>,
    config: &LoadConfig,
    requests: usize,
    concurrent: usize,
    algorithm: Algorithm,
    k: usize,
) -> Result<()> {
    let users = data_index.users().all();
    if users.is_empty() || requests == 0 {
        return Err(anyhow!("Nothing to benchmark"));
    }
    let recommender = build_recommender(algorithm, Arc::clone(&data_index), config.threads);

    // Shared indexes are built outside the timed section
    if algorithm == Algorithm::ItemCf {
        println!("Building item similarity index...");
    }
    recommender
        .prepare(k)
        .with_context(|| format!("Failed to prepare {}", algorithm))?;

    // Pick random users up front
    let mut rng = rand::rng();
    let picked: Vec<usize> = (0..requests)
        .map(|_| rng.random_range(0..users.len()))
        .collect();

    let concurrent = concurrent.clamp(1, requests);
    let chunk_size = requests.div_ceil(concurrent);
    let wall = Instant::now();
    let users = &users;
    let mut timings: Vec<Duration> = thread::scope(|scope| {
        let handles: Vec<_> = picked
            .chunks(chunk_size)
            .map(|chunk| {
                let recommender = Arc::clone(&recommender);
                scope.spawn(move || -> Result<Vec<Duration>> {
                    let mut timings = Vec::with_capacity(chunk.len());
                    for &i in chunk {
                        let start = Instant::now();
                        recommender.recommend(&users[i], k, 30)?;
                        timings.push(start.elapsed());
                    }
                    Ok(timings)
                })
            })
            .collect();

        let mut all = Vec::with_capacity(requests);
        for handle in handles {
            let timings = handle
                .join()
                .map_err(|_| anyhow!("Benchmark worker panicked"))??;
            all.extend(timings);
        }
        Ok::<_, anyhow::Error>(all)
    })?;
    let wall = wall.elapsed();

    let total_time: Duration = timings.iter().sum();
    let avg_latency = total_time / (timings.len() as u32);
    timings.sort();
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f64 / wall.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Algorithm: {} (k = {})", algorithm, k);
    println!("Wall time: {:?}", wall);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation], algorithm: Algorithm, user_id: UserId) {
    println!(
        "{}",
        format!("{} recommendations for user {}:", algorithm, user_id).bold().blue()
    );
    if recommendations.is_empty() {
        println!("{}", "No items to recommend (no usable history)".yellow());
        return;
    }
    for (rank, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. Item {} - Weight: {:.4}",
            (rank + 1).to_string().green(),
            rec.item_id,
            rec.weight
        );
    }
}
