use std::sync::Arc;

use fsm_error_log::{
    ErrorContext, ErrorFilter, ErrorLogService, HttpFailure, ServiceConfig, Severity, init_tracing,
    with_sync_error_handling,
};
use serde_json::json;

fn parse_hours(raw: &str) -> Result<f32, String> {
    let hours: f32 = raw.trim().parse().map_err(|_| format!("'{raw}' is not a number"))?;
    if !(0.0..=24.0).contains(&hours) {
        return Err(format!("{hours} hours is outside a working day"));
    }
    Ok(hours)
}

fn main() {
    // Console diagnostics; RUST_LOG overrides the filter
    init_tracing("fsm_error_log=info");

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("bad configuration ({err}), using defaults");
            ServiceConfig::default()
        }
    };
    let service = match ErrorLogService::from_config(&config) {
        Ok(service) => Arc::new(service),
        Err(err) => {
            eprintln!("cannot start error log: {err}");
            return;
        }
    };

    println!("--- Basic Usage Example ({} sink) ---\n", service.sink_name());

    // 1. A toast component listens for serious failures
    let toast = service.on_error(|record| {
        if record.severity() >= Severity::High {
            println!("   [TOAST] {}", record.user_message());
        }
    });

    // 2. An API call fails with the backend's JSON error body
    println!("1. Loading jobs with an expired token...");
    let record = service.handle_error(
        HttpFailure::response(401)
            .with_request("GET", "/api/jobs/")
            .with_body(json!({ "detail": "Authentication credentials were not provided." })),
        &ErrorContext::at("JobList", "load"),
    );
    println!("   id={} type={} message='{}'\n", record.id(), record.error_type(), record.message());

    // 3. A form handler wrapped so failures never reach the UI as errors
    println!("2. Submitting a timesheet...");
    let submit = with_sync_error_handling(
        Arc::clone(&service),
        ErrorContext::at("TimesheetForm", "submit").with_user_message("Please enter the hours worked."),
        parse_hours,
    );
    for input in ["7.5", "lots", "30"] {
        match submit.call(input).ok() {
            Some(hours) => println!("   '{input}' accepted: {hours}h"),
            None => println!("   '{input}' rejected"),
        }
    }

    // 4. Validation problem logged directly
    service.log_validation_error("postcode missing", "Please add a postcode.", None);

    toast.unsubscribe();

    println!("\n3. History (newest first):");
    for record in service.get_errors(&ErrorFilter::new().with_limit(10)) {
        println!("   [{}/{}] {}", record.severity(), record.error_type(), record.message());
    }

    let stats = service.stats();
    println!("\n4. Stats: {} logged, {} retained", stats.total_logged, stats.retained);

    match service.export_json() {
        Ok(json) => println!("\n5. Export is {} bytes of JSON", json.len()),
        Err(err) => eprintln!("export failed: {err}"),
    }
}
