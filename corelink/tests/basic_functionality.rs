//! Basic functionality tests for the cross-core channel

use std::sync::Arc;

use corelink::{
    ChannelConfig, ChannelRegion, ChannelResult, CoreId, CrossCoreQueue, Direction, FrameBuffer,
    HsemBank, MessageKind, ReadOutcome, SendOutcome, SoftHsemBank,
};

fn setup(
    config: &ChannelConfig,
) -> (
    CrossCoreQueue<SoftHsemBank>,
    CrossCoreQueue<SoftHsemBank>,
) {
    let region = Arc::new(ChannelRegion::anonymous(config).unwrap());
    let bank = Arc::new(SoftHsemBank::new());
    bank.init();

    let m4 = CrossCoreQueue::new(CoreId::Cm4, Arc::clone(&region), Arc::clone(&bank), config);
    let m7 = CrossCoreQueue::new(CoreId::Cm7, region, bank, config);
    for direction in Direction::ALL {
        m4.initialize(direction);
    }
    (m4, m7)
}

#[test]
fn test_round_trip() -> ChannelResult<()> {
    let config = ChannelConfig::default();
    let (m4, m7) = setup(&config);

    m4.send_message(Direction::M4ToM7, MessageKind(5), &[0x01, 0x02, 0x03])?;
    assert!(m7.has_messages(Direction::M4ToM7));

    let mut buf = FrameBuffer::for_config(&config);
    assert_eq!(m7.read_message(Direction::M4ToM7, &mut buf)?, ReadOutcome::Frame);
    assert_eq!(buf.kind(), MessageKind(5));
    assert_eq!(buf.payload().len(), 3);
    assert_eq!(buf.payload(), &[0x01, 0x02, 0x03]);

    assert!(!m7.has_messages(Direction::M4ToM7));
    Ok(())
}

#[test]
fn test_fifo_order_batch() -> ChannelResult<()> {
    let config = ChannelConfig::default();
    let (m4, m7) = setup(&config);

    for i in 0..10u16 {
        let payload = [i as u8; 5];
        m4.send_message(Direction::M4ToM7, MessageKind(i), &payload)?;
    }

    let mut buf = FrameBuffer::for_config(&config);
    for i in 0..10u16 {
        assert_eq!(m7.read_message(Direction::M4ToM7, &mut buf)?, ReadOutcome::Frame);
        assert_eq!(buf.kind(), MessageKind(i));
        assert_eq!(buf.payload(), &[i as u8; 5]);
    }
    Ok(())
}

#[test]
fn test_empty_read_leaves_state_unchanged() -> ChannelResult<()> {
    let config = ChannelConfig::default();
    let (_m4, m7) = setup(&config);

    let mut buf = FrameBuffer::for_config(&config);
    assert_eq!(m7.read_message(Direction::M4ToM7, &mut buf)?, ReadOutcome::Empty);
    assert_eq!(buf.payload().len(), 0);

    let stats = m7.stats(Direction::M4ToM7);
    assert_eq!(stats.pending_messages, 0);
    assert_eq!(stats.bytes_in_queue, 0);
    assert_eq!(stats.max_pending_messages, 0);
    Ok(())
}

#[test]
fn test_backpressure_drop_leaves_state_unchanged() -> ChannelResult<()> {
    let config = ChannelConfig {
        capacity: 64,
        max_frame_size: 32,
        max_lock_attempts: None,
    };
    let (m4, _m7) = setup(&config);

    // Two 28-byte frames fill 56 of 64 bytes.
    m4.send_message(Direction::M4ToM7, MessageKind(1), &[0xAA; 24])?;
    m4.send_message(Direction::M4ToM7, MessageKind(2), &[0xBB; 24])?;
    let before = m4.stats(Direction::M4ToM7);

    // 16-byte frame needs more than the 8 free bytes: dropped whole.
    assert_eq!(
        m4.send_message(Direction::M4ToM7, MessageKind(3), &[0xCC; 12])?,
        SendOutcome::Dropped
    );
    assert_eq!(m4.stats(Direction::M4ToM7), before);
    Ok(())
}

#[test]
fn test_drop_then_drain_then_send_again() -> ChannelResult<()> {
    let config = ChannelConfig {
        capacity: 64,
        max_frame_size: 32,
        max_lock_attempts: None,
    };
    let (m4, m7) = setup(&config);

    m4.send_message(Direction::M4ToM7, MessageKind(1), &[1; 24])?;
    m4.send_message(Direction::M4ToM7, MessageKind(2), &[2; 24])?;
    assert_eq!(
        m4.send_message(Direction::M4ToM7, MessageKind(3), &[3; 12])?,
        SendOutcome::Dropped
    );

    // Drain one frame; the previously dropped size now fits.
    let mut buf = FrameBuffer::for_config(&config);
    m7.read_message(Direction::M4ToM7, &mut buf)?;
    assert_eq!(
        m4.send_message(Direction::M4ToM7, MessageKind(3), &[3; 12])?,
        SendOutcome::Enqueued
    );

    m7.read_message(Direction::M4ToM7, &mut buf)?;
    assert_eq!(buf.kind(), MessageKind(2));
    m7.read_message(Direction::M4ToM7, &mut buf)?;
    assert_eq!(buf.kind(), MessageKind(3));
    assert_eq!(buf.payload(), &[3; 12]);
    Ok(())
}

#[test]
fn test_file_backed_region_shared_between_mappings() -> ChannelResult<()> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channel.shm");
    let config = ChannelConfig::default();

    // Producer side creates the region, consumer side attaches through
    // an independent mapping of the same bytes.
    let producer_region = Arc::new(ChannelRegion::create_file(&path, &config)?);
    let consumer_region = Arc::new(ChannelRegion::open_file(&path)?);
    consumer_region.validate_header()?;

    let bank = Arc::new(SoftHsemBank::new());
    bank.init();

    let m4 = CrossCoreQueue::new(CoreId::Cm4, producer_region, Arc::clone(&bank), &config);
    let m7 = CrossCoreQueue::new(CoreId::Cm7, consumer_region, bank, &config);
    m4.initialize(Direction::M4ToM7);

    m4.send_message(Direction::M4ToM7, MessageKind(42), b"across mappings")?;

    assert!(m7.has_messages(Direction::M4ToM7));
    let mut buf = FrameBuffer::for_config(&config);
    assert_eq!(m7.read_message(Direction::M4ToM7, &mut buf)?, ReadOutcome::Frame);
    assert_eq!(buf.kind(), MessageKind(42));
    assert_eq!(buf.payload(), b"across mappings");
    Ok(())
}

#[test]
fn test_counters_track_every_operation() -> ChannelResult<()> {
    let config = ChannelConfig::default();
    let (m4, m7) = setup(&config);
    let mut buf = FrameBuffer::for_config(&config);

    for i in 1..=5u32 {
        m4.send_message(Direction::M4ToM7, MessageKind(0), &[0; 6])?;
        let stats = m4.stats(Direction::M4ToM7);
        assert_eq!(stats.pending_messages, i);
        assert_eq!(stats.bytes_in_queue, i * 10);
    }

    for i in (0..5u32).rev() {
        m7.read_message(Direction::M4ToM7, &mut buf)?;
        let stats = m7.stats(Direction::M4ToM7);
        assert_eq!(stats.pending_messages, i);
        assert_eq!(stats.bytes_in_queue, i * 10);
    }
    Ok(())
}
