//! Two threads playing the two cores' control loops over one channel

use std::sync::Arc;
use std::time::Duration;

use corelink::{
    ChannelConfig, ChannelRegion, ChannelResult, CoreId, CrossCoreQueue, Direction, FrameBuffer,
    HsemBank, MessageKind, ReadOutcome, SendOutcome, SoftHsemBank,
};

const KIND_PING: MessageKind = MessageKind(1);
const KIND_PONG: MessageKind = MessageKind(2);
const ROUNDS: u32 = 100;

fn main() -> ChannelResult<()> {
    corelink::init_tracing();

    println!("corelink dual-core loop example");
    println!("===============================");

    let config = ChannelConfig::default();
    let region = Arc::new(ChannelRegion::anonymous(&config)?);
    let bank = Arc::new(SoftHsemBank::new());

    // Bring-up order: semaphore bank first, then both directions.
    bank.init();
    let m4 = CrossCoreQueue::new(CoreId::Cm4, Arc::clone(&region), Arc::clone(&bank), &config);
    let m7 = CrossCoreQueue::new(CoreId::Cm7, Arc::clone(&region), Arc::clone(&bank), &config);
    m7.initialize(Direction::M4ToM7);
    m7.initialize(Direction::M7ToM4);

    // The M4 loop: poll for pings, answer each with a pong.
    let m4_loop = std::thread::spawn(move || -> ChannelResult<()> {
        let config = ChannelConfig::default();
        let mut buf = FrameBuffer::for_config(&config);
        let mut answered = 0u32;
        while answered < ROUNDS {
            if !m4.has_messages(Direction::M7ToM4) {
                std::thread::sleep(Duration::from_micros(50));
                continue;
            }
            if m4.read_message(Direction::M7ToM4, &mut buf)? == ReadOutcome::Frame {
                assert_eq!(buf.kind(), KIND_PING);
                let payload = buf.payload().to_vec();
                while m4.send_message(Direction::M4ToM7, KIND_PONG, &payload)?
                    == SendOutcome::Dropped
                {
                    std::thread::yield_now();
                }
                answered += 1;
            }
        }
        Ok(())
    });

    // The M7 loop: send pings, collect pongs.
    let mut buf = FrameBuffer::for_config(&config);
    for round in 0..ROUNDS {
        let payload = round.to_le_bytes();
        while m7.send_message(Direction::M7ToM4, KIND_PING, &payload)? == SendOutcome::Dropped {
            std::thread::yield_now();
        }

        loop {
            if m7.has_messages(Direction::M4ToM7) {
                if m7.read_message(Direction::M4ToM7, &mut buf)? == ReadOutcome::Frame {
                    assert_eq!(buf.kind(), KIND_PONG);
                    assert_eq!(buf.payload(), payload);
                    break;
                }
            }
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    m4_loop.join().unwrap()?;

    println!("✓ {ROUNDS} ping/pong rounds completed");
    for direction in Direction::ALL {
        println!("  {}", region.stats(direction));
    }
    Ok(())
}
