//! Demonstrates a producer and a consumer exchanging fixed-size records through a branch
//! of a unit pool, with backpressure when the consumer falls behind.

use std::thread;
use std::time::Duration;

use unit_pool::{Reader, UnitPool, Writer};

const RECORD_LENGTH: usize = 16;

fn produce(writer: &impl Writer, count: u32) {
    for sequence in 0..count {
        let record = format!("record-{sequence:04}");
        let written = writer.write(record.as_bytes()).unwrap();
        println!("produced {record} ({written} bytes)");
    }
}

fn consume(reader: &impl Reader, count: u32) {
    let mut buf = [0_u8; RECORD_LENGTH];

    for _ in 0..count {
        let len = reader.read(&mut buf).unwrap();
        println!(
            "consumed {}",
            String::from_utf8_lossy(buf.get(..len).unwrap_or_default())
        );

        // A slow consumer makes the producer wait for free units.
        thread::sleep(Duration::from_millis(10));
    }
}

fn main() {
    let root = UnitPool::builder()
        .name("example")
        .unit_length(RECORD_LENGTH)
        .unit_amount(4)
        .build()
        .unwrap();

    let records = root.branch("records", 2).unwrap();

    let producer = thread::spawn({
        let records = records.clone();
        move || produce(&records, 10)
    });

    consume(&records, 10);
    producer.join().unwrap();

    println!(
        "free units: {} of {}",
        root.free_units(),
        root.unit_amount()
    );

    root.close().unwrap();
    println!("closed: {}", records.is_closed());
}
