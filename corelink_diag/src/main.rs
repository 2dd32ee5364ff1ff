//! # corelink region inspector
//!
//! Attaches to a file-backed channel region and prints its header and
//! per-direction counters. Reads are the same lock-free diagnostic
//! snapshots the channel itself exposes, so inspecting a live region is
//! safe - the counters may just be a poll cycle stale.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use corelink::{ChannelRegion, ChannelResult, Direction};

#[derive(Parser)]
#[command(name = "corelink_diag", about = "Inspect a corelink channel region")]
struct Args {
    /// Path to the file-backed channel region
    region: PathBuf,

    /// Re-read and print the counters every N milliseconds
    #[arg(long)]
    watch: Option<u64>,
}

fn print_snapshot(region: &ChannelRegion) {
    for direction in Direction::ALL {
        let stats = region.stats(direction);
        println!(
            "  {} | utilization {:>3}%",
            stats,
            stats.bytes_in_queue * 100 / stats.capacity.max(1)
        );
    }
}

fn main() -> ChannelResult<()> {
    tracing_subscriber::fmt().compact().init();
    let args = Args::parse();

    info!(region = %args.region.display(), "attaching to channel region");
    let region = ChannelRegion::open_file(&args.region)?;

    let header = region.header();
    println!("region: {}", args.region.display());
    println!(
        "  layout {:#010x}, capacity {} bytes/direction, max frame {} bytes",
        header.layout_version, header.capacity, header.max_frame_size
    );

    match args.watch {
        None => print_snapshot(&region),
        Some(interval) => loop {
            print_snapshot(&region);
            println!();
            std::thread::sleep(Duration::from_millis(interval));
        },
    }
    Ok(())
}
