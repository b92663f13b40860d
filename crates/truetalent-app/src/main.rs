// True talent entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout stays clean for leaderboards)
// 2. Load config
// 3. Load source tables
// 4. Build context tables (PAs, protection, location, opponents)
// 5. Compose the configured layers
// 6. Write the result table
// 7. Print leaderboards

use truetalent_core::config;
use truetalent_core::data::loader;
use truetalent_core::data::output;
use truetalent_core::engine::compose::{ProjectionRow, ProjectionTable};
use truetalent_core::engine::rankings::Leaderboard;
use truetalent_core::engine::Projector;

use anyhow::Context;
use tracing::info;

fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("True talent engine starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    let enabled: Vec<&str> = config.pipeline.layers.iter().map(|l| l.label()).collect();
    info!(
        "Config loaded: layers=[{}], boundary={:?}, min PA {}",
        enabled.join(", "),
        config.pipeline.boundary,
        config.pipeline.qualification.min_batter_pa
    );

    // 3. Load source tables
    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let tables = loader::load_all(&config, &base_dir).context("failed to load source tables")?;

    // 4. Build context tables
    let projector = Projector::new(&tables, &config);

    // 5. Compose
    let table = projector.project_configured();

    // 6. Write the result table
    let out = &config.pipeline.output;
    let out_path = base_dir.join(&out.path);
    output::write_table(&table, out.format, &out_path)
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    // 7. Print leaderboards
    print_leaderboards(
        &table,
        out.leaderboard_size,
        config.pipeline.qualification.min_batter_pa,
    );

    info!("Done");
    Ok(())
}

fn print_leaderboards(table: &ProjectionTable, limit: usize, min_pa: u32) {
    println!(
        "League wOBA {:.3} | heart% {:.3} | FIP- {:.1} | {} qualified batters",
        table.baselines.woba,
        table.baselines.heart_pct,
        table.baselines.fip_minus,
        table.rows.len()
    );
    for board in Leaderboard::ALL {
        let rows = table.leaderboard(board, limit, min_pa);
        if rows.is_empty() {
            continue;
        }
        println!();
        println!("{}", board.title());
        println!("{:<4} {:<24} {:<4} {:>5} {:>6} {:>6} {:>7}", "#", "Name", "Team", "PA", "wOBA", "Adj", "Boost");
        for (i, row) in rows.iter().enumerate() {
            print_row(i + 1, row);
        }
    }
}

fn print_row(rank: usize, row: &ProjectionRow) {
    println!(
        "{:<4} {:<24} {:<4} {:>5} {:>6.3} {:>6.3} {:>+7.3}",
        rank,
        row.name,
        row.team,
        row.pa,
        row.observed_woba,
        row.adjusted_woba,
        row.context_boost()
    );
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the default filter.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("truetalent=info,truetalent_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
