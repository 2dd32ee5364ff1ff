//! Create a file-backed channel region, run some traffic, and leave the
//! file behind for `corelink_diag` to inspect

use std::path::Path;
use std::sync::Arc;

use corelink::{
    ChannelConfig, ChannelRegion, ChannelResult, CoreId, CrossCoreQueue, Direction, FrameBuffer,
    HsemBank, MessageKind, SoftHsemBank,
};

fn main() -> ChannelResult<()> {
    corelink::init_tracing();

    let path = Path::new("/tmp/corelink_example.shm");
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let config = ChannelConfig::default();
    println!(
        "Creating region at {} ({} bytes per direction)...",
        path.display(),
        config.capacity
    );
    let region = Arc::new(ChannelRegion::create_file(path, &config)?);
    let bank = Arc::new(SoftHsemBank::new());
    bank.init();

    let m4 = CrossCoreQueue::new(CoreId::Cm4, Arc::clone(&region), Arc::clone(&bank), &config);
    let m7 = CrossCoreQueue::new(CoreId::Cm7, Arc::clone(&region), Arc::clone(&bank), &config);
    m4.initialize(Direction::M4ToM7);
    m4.initialize(Direction::M7ToM4);

    // Some traffic so the counters and high-water marks are non-trivial.
    let mut buf = FrameBuffer::for_config(&config);
    for i in 0..20u16 {
        m4.send_message(Direction::M4ToM7, MessageKind(i), &vec![i as u8; 100])?;
    }
    for _ in 0..15 {
        m7.read_message(Direction::M4ToM7, &mut buf)?;
    }
    m7.send_message(Direction::M7ToM4, MessageKind(200), b"status report")?;

    for direction in Direction::ALL {
        println!("  {}", region.stats(direction));
    }
    println!("\nRegion left at {}; inspect it with:", path.display());
    println!("  cargo run -p corelink_diag -- {}", path.display());
    Ok(())
}
