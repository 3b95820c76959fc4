use crate::cli::ReplayArgs;
use crate::commands::open_input;
use crate::exit_codes;
use crate::output;
use gl1_rs::{EventSequence, JsonLinesSink, PoolStats};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct ReplaySummary {
    events_consumed: u64,
    records_consumed: u64,
    first_sequence: Option<EventSequence>,
    last_sequence: Option<EventSequence>,
    /// Consumed events that carried more than one record
    duplicated_events: u64,
    /// Sequences that showed up again after being consumed
    late_duplicates: u64,
    /// Sequence numbers skipped between consecutive consumed events
    missing_sequences: u64,
    segments_opened: usize,
    segments_failed: usize,
    packets_written: Option<u64>,
    stats: PoolStats,
}

/// Sequence numbers strictly between two consecutive consumed events.
fn missing_between(previous: EventSequence, current: EventSequence) -> u64 {
    let gap = i64::from(current) - i64::from(previous) - 1;
    u64::try_from(gap).unwrap_or(0)
}

pub fn execute(args: ReplayArgs) -> i32 {
    let mut input = match open_input(&args.source, &args.pool) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::INPUT_ERROR;
        }
    };

    let sink = match args.packets {
        Some(ref path) => match output::create_file_writer(path) {
            Ok(writer) => Some(Arc::new(JsonLinesSink::new(writer))),
            Err(e) => {
                eprintln!("Error: {}", e);
                return exit_codes::EXECUTION_ERROR;
            }
        },
        None => None,
    };
    if let Some(ref sink) = sink {
        input.set_sink(Some(sink.clone()));
    }

    let min_keep = input.config().min_keep;
    let mut summary = ReplaySummary {
        events_consumed: 0,
        records_consumed: 0,
        first_sequence: None,
        last_sequence: None,
        duplicated_events: 0,
        late_duplicates: 0,
        missing_sequences: 0,
        segments_opened: 0,
        segments_failed: 0,
        packets_written: None,
        stats: input.stats(),
    };

    loop {
        if args
            .max_events
            .is_some_and(|max| summary.events_consumed >= max)
        {
            log::info!("Stopping after {} events", summary.events_consumed);
            break;
        }

        input.fill_pool(min_keep);
        let Some(current) = input.buffer().first_key() else {
            break;
        };
        let records = input.buffer().get(current).map_or(0, <[_]>::len);

        match summary.last_sequence {
            Some(previous) if previous == current => summary.late_duplicates += 1,
            Some(previous) => {
                summary.missing_sequences += missing_between(previous, current);
                summary.events_consumed += 1;
            }
            None => {
                summary.first_sequence = Some(current);
                summary.events_consumed += 1;
            }
        }
        if records > 1 {
            summary.duplicated_events += 1;
        }
        summary.records_consumed += records as u64;
        summary.last_sequence = Some(current);

        log::debug!("Consumed event {} ({} records)", current, records);
        input.cleanup_used_packets(current);
    }

    summary.stats = input.stats();
    summary.segments_opened = input.source().segments_opened();
    summary.segments_failed = input.source().segments_failed();
    drop(input);

    if let Some(sink) = sink {
        if let Err(e) = sink.flush() {
            eprintln!("Error: Failed to flush packet stream: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
        summary.packets_written = Some(sink.written());
    }

    if !output::emit(&summary, args.compact, args.output.as_deref()) {
        return exit_codes::EXECUTION_ERROR;
    }
    exit_codes::SUCCESS
}
