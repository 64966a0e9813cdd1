//! Export a small grid to XLSX and CSV
//!
//! Run with: RUST_LOG=gridexport=debug cargo run --example basic_export

use gridexport::types::{record, Value};
use gridexport::{ExportConfig, ExportEvent, GridExporter, MemoryGrid, RegisteredEvents};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let grid = MemoryGrid::new()
        .column("name", "Name")
        .column("email", "Email")
        .column("address.city", "City")
        .column("zip", "Zip")
        .hidden_column("password", "Password")
        .display("email", |value, _record| {
            format!("<a href=\"mailto:{0}\">{0}</a>", value).into()
        })
        .records([
            record([
                ("name", Value::from("Ann &amp; Co")),
                ("email", Value::from("ann@example.com")),
                ("address", [("city", "Oslo")].into_iter().collect()),
                ("zip", Value::from("00123")),
                ("password", Value::from("hunter2")),
            ]),
            record([
                ("name", Value::from("Caf&eacute; Bo")),
                ("email", Value::from("bo@example.com")),
                ("address", [("city", "Lima")].into_iter().collect()),
                ("zip", Value::from("0042")),
                ("password", Value::from("secret")),
            ]),
        ]);

    let events = RegisteredEvents::new()
        .on(ExportEvent::BeforeExport, |ctx| {
            println!("Exporting {} columns to {}", ctx.headings.len(), ctx.file_name);
            Ok(())
        })
        .on(ExportEvent::BeforeSheet, |ctx| {
            ctx.sheet.title = "Customers".to_string();
            ctx.sheet.freeze_header = true;
            ctx.sheet.bold_header = true;
            ctx.sheet.auto_filter = true;
            Ok(())
        });

    let config = ExportConfig::from_env()?;
    let mut exporter = GridExporter::with_config(config);
    exporter
        .set_file_name("customers")
        .set_registered_events(events);

    let artifact = exporter.export(&grid)?;
    println!(
        "Wrote {} rows to {} ({} bytes, {})",
        artifact.row_count,
        artifact.path.display(),
        artifact.bytes,
        artifact.content_disposition()
    );

    exporter.reset().set_file_name("customers.csv").set_exclusion("email");
    let artifact = exporter.export(&grid)?;
    println!("Wrote {}", artifact.path.display());

    Ok(())
}
