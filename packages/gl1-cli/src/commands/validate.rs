use crate::cli::ValidateArgs;
use crate::exit_codes;
use crate::output;
use gl1_rs::{Decoded, EventSequence, Gl1Decoder, SegmentReader};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize, Default)]
struct SegmentReport {
    file: String,
    valid: bool,
    events: u64,
    data_events: u64,
    gl1_records: u64,
    anomalies: u64,
    run_number: Option<i32>,
    first_sequence: Option<EventSequence>,
    last_sequence: Option<EventSequence>,
    /// Data events whose sequence is lower than the one before
    out_of_order: u64,
    error: Option<String>,
}

fn check_segment(path: &Path, decoder: &Gl1Decoder) -> SegmentReport {
    let mut report = SegmentReport {
        file: path.display().to_string(),
        ..Default::default()
    };

    let reader = match SegmentReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    for event in reader {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };
        report.events += 1;
        report.run_number = Some(event.run_number);
        if !event.event_type.is_data() {
            continue;
        }

        report.data_events += 1;
        if report.last_sequence.is_some_and(|last| event.sequence < last) {
            report.out_of_order += 1;
        }
        report.first_sequence.get_or_insert(event.sequence);
        report.last_sequence = Some(event.sequence);

        match decoder.decode(&event) {
            Ok(Decoded::Record(_)) => report.gl1_records += 1,
            Ok(Decoded::Skip) => {}
            Err(e) => {
                log::warn!("{}: {}", report.file, e);
                report.anomalies += 1;
            }
        }
    }

    report.valid = report.out_of_order == 0;
    if !report.valid {
        report.error = Some(format!(
            "{} events arrive with a lower sequence than their predecessor",
            report.out_of_order
        ));
    }
    report
}

pub fn execute(args: ValidateArgs) -> i32 {
    let decoder = Gl1Decoder::new(args.packet_id);
    let reports: Vec<SegmentReport> = args
        .files
        .iter()
        .map(|path| check_segment(path, &decoder))
        .collect();

    if args.json {
        if !output::emit(&reports, false, None) {
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        for report in &reports {
            match report.error {
                Some(ref err) => eprintln!("Error: {}: {}", report.file, err),
                None => println!(
                    "Segment '{}' is valid ({} events, {} GL1 records, {} anomalies)",
                    report.file, report.events, report.gl1_records, report.anomalies
                ),
            }
        }
    }

    if reports.iter().all(|r| r.valid) {
        exit_codes::SUCCESS
    } else {
        exit_codes::INPUT_ERROR
    }
}
