#![allow(missing_docs)]
#![cfg(feature = "loom")]

use combofork::{
    batch::{BatchWriter, LeafBatch},
    config::{EnqueuePolicy, Encoding},
    destination::WriterDestination,
    error::RunError,
    queue::{self, QueueItem},
    sink::{SinkState, SinkWriter},
    types::{Combination, CombinationNode, DigitString},
};
use core::num::NonZeroUsize;
use loom::{
    sync::{Arc, Mutex},
    thread,
};
use std::io::{self, Write};

fn value(digits: &str) -> QueueItem {
    QueueItem::Value(Combination::Digits(digits.parse::<DigitString>().unwrap()))
}

fn capacity_one() -> NonZeroUsize {
    NonZeroUsize::new(1).unwrap()
}

/// Writer recording every byte in arrival order.
#[derive(Clone)]
struct Recorder(Arc<Mutex<Vec<u8>>>);

impl Recorder {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Broken;

impl Write for Broken {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn loom_end_of_stream_follows_every_value() {
    loom::model(|| {
        // Two leaves share the producer; the sentinel joins the second leaf
        // before signaling, exactly like the production subtree.
        let (producer, consumer) = queue::bounded(capacity_one(), EnqueuePolicy::Block);
        let producer = Arc::new(producer);

        let sink = thread::spawn(move || {
            SinkWriter::new(consumer, WriterDestination::new(Vec::new())).drain()
        });
        let leaf = {
            let producer = producer.clone();
            thread::spawn(move || producer.enqueue(value("1")))
        };

        producer.enqueue(value("2")).unwrap();
        leaf.join().unwrap().unwrap();
        producer.enqueue(QueueItem::EndOfStream).unwrap();
        drop(producer);

        let drained = sink.join().unwrap().unwrap();
        assert_eq!(drained.state, SinkState::Done);
        assert_eq!(drained.lines_written, 2);
        let mut lines: Vec<_> = std::str::from_utf8(&drained.output)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect();
        lines.sort_unstable();
        assert_eq!(lines, ["1", "2"]);
    });
}

#[test]
fn loom_failed_sink_releases_blocked_producer() {
    loom::model(|| {
        let (producer, consumer) = queue::bounded(capacity_one(), EnqueuePolicy::Block);

        let sink = thread::spawn(move || {
            SinkWriter::new(consumer, WriterDestination::with_capacity(0, Broken)).drain()
        });

        // At most one value is consumed and one buffered before the consumer
        // is dropped, so the third enqueue must observe the closed queue.
        let produced = ["1", "2", "3"]
            .into_iter()
            .try_for_each(|digits| producer.enqueue(value(digits)));
        drop(producer);

        assert!(matches!(produced, Err(RunError::SinkClosed)));
        assert!(matches!(
            sink.join().unwrap(),
            Err(RunError::DestinationWrite(_))
        ));
    });
}

#[test]
fn loom_producer_dropped_without_end_of_stream() {
    loom::model(|| {
        let (producer, consumer) = queue::bounded(capacity_one(), EnqueuePolicy::SpinBackoff);

        let leaf = thread::spawn(move || producer.enqueue(value("7")));
        let drained =
            SinkWriter::new(consumer, WriterDestination::new(Vec::new())).drain();

        leaf.join().unwrap().unwrap();
        assert!(matches!(drained, Err(RunError::ProducersVanished)));
    });
}

#[test]
fn loom_batches_never_interleave() {
    loom::model(|| {
        let recorder = Recorder::new();
        let writer = Arc::new(BatchWriter::new(WriterDestination::with_capacity(
            0,
            recorder.clone(),
        )));
        let root = CombinationNode::root(2);

        let other = {
            let writer = writer.clone();
            thread::spawn(move || {
                let batch = LeafBatch::children_of(&root.child(1), &Encoding::default());
                writer.write_batch(batch.as_slice())
            })
        };
        let batch = LeafBatch::children_of(&root.child(2), &Encoding::default());
        writer.write_batch(batch.as_slice()).unwrap();
        other.join().unwrap().unwrap();

        assert_eq!(writer.lock_acquisitions(), 2);
        assert_eq!(writer.lines_written(), 20);

        let bytes = recorder.0.lock().unwrap().clone();
        let lines: Vec<_> = std::str::from_utf8(&bytes).unwrap().lines().collect();
        assert_eq!(lines.len(), 20);
        let (first, second) = lines.split_at(10);
        for batch in [first, second] {
            let parent = &batch[0][..1];
            assert!(batch.iter().all(|line| line.starts_with(parent)));
        }
        assert_ne!(first[0][..1], second[0][..1]);
    });
}
