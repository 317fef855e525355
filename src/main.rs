use clap::Parser;
use cut_planner::config::{CapacityPolicy, DEFAULT_TIME_LIMIT_MS, SearchStrategy, SolverConfig};
use cut_planner::episode::Episode;
use cut_planner::sheet::Sheet;
use cut_planner::solver::Solver;
use cut_planner::types::{ItemRecord, Rect};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "cut_planner",
    about = "Plays a 2D cutting stock episode with the column-generation planner"
)]
struct Cli {
    /// Stock sheet dimensions (WxH, e.g. 10x8)
    #[arg(long)]
    stock: String,

    /// Number of stock sheets available
    #[arg(long, default_value_t = 10)]
    stocks: usize,

    /// Products as WxH:qty (e.g. 3x2:4 1x1:6)
    #[arg(long = "cuts", num_args = 1..)]
    cuts: Vec<String>,

    /// Placement search: row-major, or random[:ATTEMPTS] (default 100 attempts)
    #[arg(long, default_value = "row-major", value_parser = parse_strategy)]
    strategy: SearchStrategy,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// Pricing capacity: as-given or either
    #[arg(long, default_value = "as-given", value_parser = parse_capacity)]
    capacity: CapacityPolicy,

    /// Seed for random placement
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Column generation iteration cap
    #[arg(long, default_value_t = 500)]
    max_iterations: usize,

    /// Time budget per decision in milliseconds (0 = unlimited)
    #[arg(long, default_value_t = DEFAULT_TIME_LIMIT_MS)]
    time_limit: u64,

    /// Log level written to stderr: error, warn, info, debug, trace
    #[arg(long, default_value = "warn", value_parser = parse_log_level)]
    log_level: Level,
}

fn parse_capacity(s: &str) -> Result<CapacityPolicy, String> {
    match s {
        "as-given" => Ok(CapacityPolicy::AsGiven),
        "either" => Ok(CapacityPolicy::EitherOrientation),
        _ => Err(format!(
            "invalid capacity policy '{}', expected: as-given or either",
            s
        )),
    }
}

fn parse_strategy(s: &str) -> Result<SearchStrategy, String> {
    match s.split_once(':') {
        None if s == "row-major" => Ok(SearchStrategy::RowMajor),
        None if s == "random" => Ok(SearchStrategy::Random { attempts: 100 }),
        Some(("random", attempts)) => {
            let attempts = attempts
                .parse::<u32>()
                .map_err(|_| format!("invalid attempts in '{}'", s))?;
            Ok(SearchStrategy::Random { attempts })
        }
        _ => Err(format!(
            "invalid strategy '{}', expected: row-major, random or random:ATTEMPTS",
            s
        )),
    }
}

fn parse_log_level(s: &str) -> Result<Level, String> {
    s.parse::<Level>()
        .map_err(|_| format!("invalid log level '{}'", s))
}

fn parse_dimensions(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions '{}', expected WxH", s));
    }
    let w = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid width in '{}'", s))?;
    let h = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid height in '{}'", s))?;
    if w == 0 || h == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", s));
    }
    Ok(Rect::new(w, h))
}

fn parse_cut(s: &str) -> Result<ItemRecord, String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("invalid cut '{}', expected WxH:qty", s));
    }
    let rect = parse_dimensions(parts[0])?;
    let qty = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    Ok(ItemRecord::new(rect.w, rect.h, qty))
}

fn exit_with(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(cli.log_level)
        .init();

    let stock = parse_dimensions(&cli.stock).unwrap_or_else(|e| exit_with(e));
    let products: Vec<ItemRecord> = cli
        .cuts
        .iter()
        .map(|c| parse_cut(c))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| exit_with(e));

    let config = SolverConfig::new()
        .with_search(cli.strategy)
        .with_capacity(cli.capacity)
        .with_rotation(!cli.no_rotate)
        .with_max_iterations(cli.max_iterations)
        .with_time_limit(cli.time_limit);
    let solver = Solver::new(config);
    let mut episode = Episode::new(products, vec![Sheet::new(stock.w, stock.h); cli.stocks]);
    let mut rng = StdRng::seed_from_u64(cli.seed);

    while !episode.is_done() {
        let action = solver
            .decide(&episode.products, &episode.sheets, &mut rng)
            .unwrap_or_else(|e| exit_with(e));
        if action.is_none() {
            println!("No remaining piece fits on any sheet");
            break;
        }
        let (x, y) = action.position;
        println!("Sheet {}: {} @ ({}, {})", action.stock_idx + 1, action.rect(), x, y);
        episode.step(&action).unwrap_or_else(|e| exit_with(e));
    }
    episode.log_summary();

    println!();
    println!(
        "Summary: {} piece{} cut, {} sheet{} used, {:.1}% filled, {} piece{} left",
        episode.steps(),
        if episode.steps() == 1 { "" } else { "s" },
        episode.sheets_used(),
        if episode.sheets_used() == 1 { "" } else { "s" },
        episode.fill_percent(),
        episode.remaining(),
        if episode.remaining() == 1 { "" } else { "s" },
    );
}
