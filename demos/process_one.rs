use std::{path::Path, sync::Arc};

use stem_master_core::{InMemoryJobStore, JobProcessor, ProcessorConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let mut args = std::env::args().skip(1);
    let input = args.next().expect("usage: process_one <audio> [out_dir]");
    let out = args.next().unwrap_or_else(|| "./out".into());

    let config = ProcessorConfig::default().with_output_root(&out);
    let store = Arc::new(InMemoryJobStore::new());
    let processor = JobProcessor::from_config(&config, store);

    let job = processor.run("demo", Path::new(&input))?;
    eprintln!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
