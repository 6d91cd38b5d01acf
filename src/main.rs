use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use retarget_node::chain::{genesis_header, BlockHeader, ChainIndex};
use retarget_node::config::NodeConfig;
use retarget_node::consensus_pow::{
    check_proof_of_work, next_work_required, target_to_difficulty, CompactTarget,
    ConsensusParams, NetworkKind, RetargetAlgorithm,
};
use retarget_node::miner::local::{LocalGenerator, LocalMempool, ManualClock, SharedChain, StaticScript};
use retarget_node::miner::{BlockGenerator, BlockProducer, Clock, ReserveScript, SystemClock};
use retarget_node::pow::{u256_from_hex, u256_to_hex};
use retarget_node::shutdown::Shutdown;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "retarget-node", version, about = "PoW retargeting engine and block producer")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// mainnet | testnet | regtest (overrides config and RETARGET_NETWORK)
    #[arg(long, global = true)]
    network: Option<NetworkKind>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode compact bits into a target
    DecodeBits {
        /// Compact bits as hex, e.g. 1e0fffff
        bits: CompactTarget,
    },

    /// Encode a 256-bit target (hex) as compact bits
    EncodeTarget { target: String },

    /// Check a hash against claimed bits; exits 1 on reject
    CheckPow {
        #[arg(long)]
        hash: String,

        #[arg(long)]
        bits: CompactTarget,
    },

    /// Compute the bits required for the block after a recorded chain
    NextWork {
        /// JSON array of {"time": <unix>, "bits": "<hex>"}, genesis first
        #[arg(long)]
        chain: PathBuf,

        /// Candidate timestamp (default: tip time + target spacing)
        #[arg(long)]
        time: Option<u32>,
    },

    /// Mine blocks on a fresh local chain and print each block's bits
    Simulate {
        #[arg(long, default_value_t = 50)]
        blocks: u64,

        /// Seconds between simulated blocks (default: target spacing)
        #[arg(long)]
        spacing: Option<i64>,
    },

    /// Run the block producer on a local chain until CTRL+C
    Run,
}

#[derive(Debug, Deserialize)]
struct HeaderRecord {
    time: u32,
    bits: String,
}

fn init_tracing(level: Option<&str>) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| level.map(str::to_string))
        .unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let mut config = NodeConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(network) = cli.network {
        config.network = network;
    }
    let params = config.consensus_params().context("resolving consensus params")?;

    match cli.cmd {
        Commands::DecodeBits { bits } => {
            let decoded = bits.decode();
            println!("bits:       {}", bits);
            println!("target:     {}", u256_to_hex(&decoded.value));
            println!("negative:   {}", decoded.negative);
            println!("overflow:   {}", decoded.overflow);
            println!(
                "difficulty: {:.6}",
                target_to_difficulty(&decoded.value, &params.pow_limit)
            );
        }

        Commands::EncodeTarget { target } => {
            let target = u256_from_hex(&target).context("parsing target")?;
            println!("{}", CompactTarget::encode(&target));
        }

        Commands::CheckPow { hash, bits } => {
            let hash = u256_from_hex(&hash).context("parsing hash")?;
            if check_proof_of_work(&hash, bits, &params) {
                println!("accept");
            } else {
                println!("reject");
                std::process::exit(1);
            }
        }

        Commands::NextWork { chain, time } => next_work(&chain, time, &params)?,

        Commands::Simulate { blocks, spacing } => simulate(blocks, spacing, &params)?,

        Commands::Run => run(config, params).await?,
    }

    Ok(())
}

fn next_work(path: &Path, time: Option<u32>, params: &ConsensusParams) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<HeaderRecord> =
        serde_json::from_str(&content).context("parsing chain records")?;

    let mut timeline = Vec::with_capacity(records.len());
    for (height, record) in records.iter().enumerate() {
        let bits: CompactTarget = record
            .bits
            .parse()
            .with_context(|| format!("bad bits at height {}", height))?;
        timeline.push((record.time, bits));
    }
    let chain = ChainIndex::from_timeline(timeline);

    let tip = chain.tip();
    let (prev_hash, candidate_time) = match tip {
        Some(tip) => {
            let time = match time {
                Some(time) => time,
                None => u32::try_from(tip.time().saturating_add(params.target_spacing))
                    .context("candidate time outside the 32-bit timestamp range")?,
            };
            (tip.hash(), time)
        }
        None => (Default::default(), time.unwrap_or_default()),
    };
    let candidate = BlockHeader::candidate(prev_hash, candidate_time, CompactTarget::default());

    let algorithm = RetargetAlgorithm::select(tip, params);
    let bits = next_work_required(tip, &candidate, params);
    println!("height:     {}", chain.height().map_or(0, |h| h + 1));
    println!("algorithm:  {}", algorithm.as_str());
    println!("bits:       {}", bits);
    println!("target:     {}", u256_to_hex(&bits.to_target()));
    println!(
        "difficulty: {:.6}",
        target_to_difficulty(&bits.to_target(), &params.pow_limit)
    );
    Ok(())
}

fn simulate(blocks: u64, spacing: Option<i64>, params: &ConsensusParams) -> Result<()> {
    let spacing = spacing.unwrap_or(params.target_spacing);
    if spacing < 0 {
        bail!("spacing must not be negative");
    }

    let start = SystemClock.now();
    let genesis_time = u32::try_from(start).context("clock outside the 32-bit timestamp range")?;
    let chain = SharedChain::new(ChainIndex::with_genesis(genesis_header(params, genesis_time)));
    let clock = Arc::new(ManualClock::new(start));
    let mempool = Arc::new(LocalMempool::new());
    let generator = LocalGenerator::new(chain.clone(), mempool, clock.clone(), params.clone());
    let script = ReserveScript(vec![0x51]);

    println!("{:>6}  {:<26}  {:>8}  {:>14}", "height", "algorithm", "bits", "difficulty");
    for _ in 0..blocks {
        clock.advance(spacing);
        let algorithm = RetargetAlgorithm::select(chain.read().tip(), params);
        generator
            .generate_blocks(&script, 1, u64::from(u32::MAX) + 1, true)
            .context("mining simulated block")?;

        let index = chain.read();
        if let Some(tip) = index.tip() {
            println!(
                "{:>6}  {:<26}  {:>8}  {:>14.4}",
                tip.height(),
                algorithm.as_str(),
                tip.bits(),
                target_to_difficulty(&tip.bits().to_target(), &params.pow_limit)
            );
        }
    }
    Ok(())
}

async fn run(config: NodeConfig, params: ConsensusParams) -> Result<()> {
    let script =
        ReserveScript::from_hex(&config.production.coinbase_script).context("coinbase_script")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let genesis_time =
        u32::try_from(clock.now()).context("clock outside the 32-bit timestamp range")?;
    let chain = SharedChain::new(ChainIndex::with_genesis(genesis_header(&params, genesis_time)));
    let mempool = Arc::new(LocalMempool::new());
    let generator = LocalGenerator::new(chain.clone(), mempool.clone(), clock.clone(), params);
    let shutdown = Shutdown::new();

    info!(network = %config.network, "starting local block producer");
    let producer = BlockProducer::new(
        config.production,
        Arc::new(chain),
        clock,
        mempool,
        Arc::new(generator),
        Arc::new(StaticScript(script)),
        shutdown.clone(),
    );

    let handle = tokio::spawn(producer.run());
    shutdown.wait_for_signal().await;

    let stats = handle.await.context("producer task")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
