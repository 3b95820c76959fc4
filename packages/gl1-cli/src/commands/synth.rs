use crate::cli::SynthArgs;
use crate::exit_codes;
use crate::output;
use gl1_rs::{
    EventSequence, EventType, Gl1Decoder, Gl1Packet, RawEvent, SegmentWriter, GL1P_PROCESSORS,
    SCALER_CHANNELS,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct SynthOutput {
    run_number: i32,
    data_events: u32,
    duplicated: u32,
    missing_gl1: u32,
    first_sequence: Option<EventSequence>,
    last_sequence: Option<EventSequence>,
    segments: Vec<String>,
}

/// Every `n`th event (1-based) when `n` is set and non-zero.
fn every(n: Option<u32>, index: u32) -> bool {
    n.is_some_and(|n| n > 0 && (index + 1) % n == 0)
}

fn synthetic_record(sequence: EventSequence, index: u32) -> Gl1Packet {
    let mut record = Gl1Packet::new(sequence);
    let tick = u64::from(index);
    record.bco = 0x00ab_0000_0000 + tick * 120;
    record.bunch_number = tick % 120;
    record.trigger_input = 1 << (tick % 16);
    record.live_vector = record.trigger_input | 0x1;
    record.scaled_vector = record.live_vector & 0x3;
    record.gtm_busy_vector = if tick % 10 == 0 { 0x4 } else { 0 };

    for channel in 0..SCALER_CHANNELS {
        let raw = tick * (channel as u64 + 1);
        record.set_scaler(channel, 0, raw);
        record.set_scaler(channel, 1, raw * 9 / 10);
        record.set_scaler(channel, 2, raw / (channel as u64 + 1));
    }
    for processor in 0..GL1P_PROCESSORS {
        let raw = tick * 2 + processor as u64;
        record.set_gl1p_scaler(processor, 0, raw);
        record.set_gl1p_scaler(processor, 1, raw / 2);
        record.set_gl1p_scaler(processor, 2, raw / 4);
    }
    record
}

fn generate(args: &SynthArgs, out: &mut SynthOutput) -> Vec<RawEvent> {
    let decoder = Gl1Decoder::new(args.packet_id);
    let mut events = Vec::with_capacity(args.events as usize);
    let mut sequence = args.first_sequence;

    for index in 0..args.events {
        if index > 0 {
            if every(args.duplicate_every, index) {
                out.duplicated += 1;
            } else {
                sequence += 1;
            }
        }

        let mut event = RawEvent::new(args.run, sequence, EventType::Data);
        if every(args.missing_every, index) {
            out.missing_gl1 += 1;
        } else {
            event = event.with_packet(decoder.encode(&synthetic_record(sequence, index)));
        }

        out.first_sequence.get_or_insert(sequence);
        out.last_sequence = Some(sequence);
        events.push(event);
    }
    events
}

pub fn execute(args: SynthArgs) -> i32 {
    if args.per_segment == 0 {
        eprintln!("Error: --per-segment must be at least 1");
        return exit_codes::INPUT_ERROR;
    }
    if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
        eprintln!(
            "Error: Failed to create '{}': {}",
            args.output_dir.display(),
            e
        );
        return exit_codes::EXECUTION_ERROR;
    }

    let mut out = SynthOutput {
        run_number: args.run,
        data_events: args.events,
        duplicated: 0,
        missing_gl1: 0,
        first_sequence: None,
        last_sequence: None,
        segments: Vec::new(),
    };
    let events = generate(&args, &mut out);

    let mut chunks: Vec<Vec<RawEvent>> = events
        .chunks(args.per_segment as usize)
        .map(<[RawEvent]>::to_vec)
        .collect();
    if chunks.is_empty() {
        chunks.push(Vec::new());
    }
    if args.control_events {
        let begin = args.first_sequence - 1;
        let end = out.last_sequence.unwrap_or(begin) + 1;
        chunks[0].insert(0, RawEvent::new(args.run, begin, EventType::BeginRun));
        if let Some(last) = chunks.last_mut() {
            last.push(RawEvent::new(args.run, end, EventType::EndRun));
        }
    }

    for (segment, chunk) in chunks.iter().enumerate() {
        let path: PathBuf = args
            .output_dir
            .join(format!("gl1-{:08}-{:04}.gl1", args.run, segment));
        let result = SegmentWriter::create(&path).and_then(|mut writer| {
            for event in chunk {
                writer.write_event(event)?;
            }
            writer.finish().map(|_| ())
        });
        if let Err(e) = result {
            eprintln!("Error: Failed to write '{}': {}", path.display(), e);
            return exit_codes::EXECUTION_ERROR;
        }
        log::info!("Wrote {} events to {}", chunk.len(), path.display());
        out.segments.push(path.display().to_string());
    }

    if args.json {
        if !output::emit(&out, false, None) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!(
            "Wrote {} data events for run {} into {} segment(s) under {}",
            out.data_events,
            out.run_number,
            out.segments.len(),
            args.output_dir.display()
        );
    }
    exit_codes::SUCCESS
}
