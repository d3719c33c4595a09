//! Canopy simulator: drives a chain with a random fork workload.
//!
//! Builds blocks on the tip or, with probability `--fork-rate`, on a
//! randomly chosen earlier block. Blocks spend outputs visible on their
//! parent's branch, and some deliberately double-spend, so every rejection
//! path gets exercised. Prints a summary when done.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tracing::{debug, error, info, warn};

use canopy_chain::{BlockChain, ChainConfig, ChainEvent};
use canopy_core::{Block, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// Reward paid by every simulated coinbase.
const REWARD: u64 = 50;

#[derive(Debug, Parser)]
#[command(name = "canopy-sim", version, about = "Random fork workload against a canopy chain")]
struct Args {
    /// Number of blocks to submit.
    #[arg(long, default_value_t = 1_000)]
    blocks: u64,

    /// Probability that a block builds on a random earlier block instead of the tip.
    #[arg(long, default_value_t = 0.2)]
    fork_rate: f64,

    /// Probability that a block carries a conflicting double spend.
    #[arg(long, default_value_t = 0.05)]
    conflict_rate: f64,

    /// RNG seed; the same seed replays the same workload.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Override the configured cutoff age.
    #[arg(long)]
    cutoff_age: Option<u64>,

    /// Chain config file (TOML or JSON). CANOPY_* variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ChainConfig::default(),
        };
        if let Some(cutoff_age) = self.cutoff_age {
            config = config.with_cutoff_age(cutoff_age);
        }
        config.validate()?;
        Ok(config)
    }

    fn check_rates(&self) -> Result<()> {
        for (name, rate) in [("fork-rate", self.fork_rate), ("conflict-rate", self.conflict_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                bail!("--{name} must be within [0, 1], got {rate}");
            }
        }
        Ok(())
    }
}

/// Outcome counters, filled from the event stream.
#[derive(Debug, Default)]
struct SimStats {
    accepted: u64,
    rejected: BTreeMap<&'static str, u64>,
    pruned: usize,
    transactions_queued: u64,
    lagged: u64,
}

impl SimStats {
    fn record(&mut self, event: ChainEvent) {
        match event {
            ChainEvent::BlockAccepted { .. } => self.accepted += 1,
            ChainEvent::BlockRejected { reason, .. } => {
                *self.rejected.entry(reason.kind()).or_default() += 1;
            }
            ChainEvent::NodesPruned { removed, .. } => self.pruned += removed,
            ChainEvent::TransactionAdded { .. } => self.transactions_queued += 1,
        }
    }

    fn drain(&mut self, events: &mut Receiver<ChainEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.record(event),
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "event receiver lagged");
                    self.lagged += missed;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

/// Mints blocks and transactions for the workload.
struct Workload {
    rng: StdRng,
    next_tag: u64,
    fork_rate: f64,
    conflict_rate: f64,
    /// Every block ever accepted, pruned or not. Building on a pruned one
    /// exercises the unknown-parent path.
    history: Vec<Hash256>,
}

impl Workload {
    fn new(args: &Args, genesis: Hash256) -> Self {
        Self {
            rng: StdRng::seed_from_u64(args.seed),
            next_tag: 1,
            fork_rate: args.fork_rate,
            conflict_rate: args.conflict_rate,
            history: vec![genesis],
        }
    }

    fn owner(&mut self) -> Hash256 {
        Hash256(self.rng.r#gen())
    }

    fn coinbase(&mut self) -> Transaction {
        let tag = self.next_tag;
        self.next_tag += 1;
        let owner = self.owner();
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput { value: REWARD, owner }],
            lock_time: tag,
        }
    }

    fn spend(&mut self, outpoint: OutPoint, value: u64) -> Transaction {
        let owner = self.owner();
        Transaction {
            version: 1,
            inputs: vec![TxInput { previous_output: outpoint, signature: vec![] }],
            outputs: vec![TxOutput { value, owner }],
            lock_time: 0,
        }
    }

    fn pick_parent(&mut self, tip: Hash256) -> Hash256 {
        if self.rng.gen_bool(self.fork_rate) {
            self.history[self.rng.gen_range(0..self.history.len())]
        } else {
            tip
        }
    }

    /// Block on `parent` spending up to two random outputs of its branch,
    /// plus a conflicting spend at `conflict_rate`.
    fn block_on(&mut self, chain: &BlockChain, parent: Hash256) -> Block {
        let spendable = chain
            .utxo_pool_at(&parent)
            .map(|ledger| ledger.outpoints())
            .unwrap_or_default();

        let mut txs = Vec::new();
        if !spendable.is_empty() {
            for _ in 0..self.rng.gen_range(0..=2) {
                let outpoint = spendable[self.rng.gen_range(0..spendable.len())].clone();
                if txs.iter().any(|tx: &Transaction| {
                    tx.inputs.iter().any(|input| input.previous_output == outpoint)
                }) {
                    continue;
                }
                txs.push(self.spend(outpoint, 1));
            }
            if self.rng.gen_bool(self.conflict_rate) {
                if let Some(first) = txs.first() {
                    let outpoint = first.inputs[0].previous_output.clone();
                    txs.push(self.spend(outpoint, 2));
                }
            }
        }

        let coinbase = self.coinbase();
        let tag = coinbase.lock_time;
        Block::new(parent, tag, self.rng.r#gen(), coinbase, txs)
    }
}

fn run(args: Args) -> Result<()> {
    args.check_rates()?;
    let config = args.chain_config()?;
    info!(
        cutoff_age = config.cutoff_age,
        strategy = ?config.ledger_strategy,
        blocks = args.blocks,
        fork_rate = args.fork_rate,
        seed = args.seed,
        "starting simulation"
    );

    let genesis = Block::new(
        Hash256::ZERO,
        0,
        0,
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput { value: REWARD, owner: Hash256::ZERO }],
            lock_time: 0,
        },
        vec![],
    );
    let chain = BlockChain::with_config(genesis.clone(), config)?;
    let mut events = chain.subscribe();
    let mut workload = Workload::new(&args, genesis.hash());
    let mut stats = SimStats::default();

    for _ in 0..args.blocks {
        let tip = chain.max_height_block().hash();
        let parent = workload.pick_parent(tip);
        let block = workload.block_on(&chain, parent);

        // Queue the block's transactions first so confirmation drains them.
        for tx in &block.transactions {
            chain.add_transaction(tx.clone());
        }
        let hash = block.hash();
        match chain.process_block(block) {
            Ok(accepted) => {
                workload.history.push(hash);
                debug!(%hash, height = accepted.height, confirmed = accepted.confirmed, "block accepted");
            }
            Err(reason) => debug!(%hash, %reason, "block rejected"),
        }
        stats.drain(&mut events);
    }

    let tip = chain.max_height_block();
    let rejected: u64 = stats.rejected.values().sum();
    info!(
        accepted = stats.accepted,
        rejected,
        pruned = stats.pruned,
        retained = chain.block_count(),
        max_height = chain.max_height(),
        "simulation complete"
    );

    println!("blocks submitted:   {}", args.blocks);
    println!("accepted:           {}", stats.accepted);
    println!("rejected:           {rejected}");
    for (kind, count) in &stats.rejected {
        println!("  {kind:<28}{count}");
    }
    println!("nodes pruned:       {}", stats.pruned);
    println!("retained nodes:     {}", chain.block_count());
    println!("best height:        {}", chain.max_height());
    println!("best block:         {}", tip.hash());
    println!("tip utxos:          {}", chain.max_height_utxo_pool().len());
    println!("pending txs:        {}", chain.transaction_pool().len());
    println!("txs queued:         {}", stats.transactions_queued);
    if stats.lagged > 0 {
        println!("events missed:      {}", stats.lagged);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    if let Err(e) = run(args) {
        error!("simulation failed: {e:#}");
        process::exit(1);
    }
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `format = "json"` selects structured JSON output; anything else is text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["canopy-sim"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_parse() {
        let a = args(&[]);
        assert_eq!(a.blocks, 1_000);
        assert_eq!(a.cutoff_age, None);
        assert_eq!(a.chain_config().unwrap(), ChainConfig::default());
    }

    #[test]
    fn cutoff_override_applies() {
        let a = args(&["--cutoff-age", "4"]);
        assert_eq!(a.chain_config().unwrap().cutoff_age, 4);
    }

    #[test]
    fn zero_cutoff_is_rejected() {
        assert!(args(&["--cutoff-age", "0"]).chain_config().is_err());
    }

    #[test]
    fn rates_out_of_range_are_rejected() {
        assert!(args(&["--fork-rate", "1.5"]).check_rates().is_err());
        assert!(args(&["--fork-rate", "0.5"]).check_rates().is_ok());
    }

    #[test]
    fn same_seed_same_workload() {
        let a = args(&["--seed", "7", "--fork-rate", "0.5"]);
        let genesis = Block::new(Hash256::ZERO, 0, 0, Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput { value: REWARD, owner: Hash256::ZERO }],
            lock_time: 0,
        }, vec![]);
        let chain = BlockChain::new(genesis.clone());

        let mut first = Workload::new(&a, genesis.hash());
        let mut second = Workload::new(&a, genesis.hash());
        for _ in 0..5 {
            let x = first.block_on(&chain, genesis.hash());
            let y = second.block_on(&chain, genesis.hash());
            assert_eq!(x, y);
        }
    }

    #[test]
    fn stats_count_rejections_by_kind() {
        let mut stats = SimStats::default();
        stats.record(ChainEvent::BlockAccepted { hash: Hash256::ZERO, height: 1 });
        stats.record(ChainEvent::BlockRejected {
            hash: Hash256::ZERO,
            reason: canopy_core::RejectReason::DuplicateBlock(Hash256::ZERO),
        });
        stats.record(ChainEvent::NodesPruned { removed: 3, max_height: 9 });
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.pruned, 3);
        assert_eq!(stats.rejected.values().sum::<u64>(), 1);
    }
}
