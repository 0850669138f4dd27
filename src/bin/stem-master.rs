use clap::{Parser, Subcommand};
use std::{path::PathBuf, process, sync::Arc, time::Duration};
use stem_master_core::{
    FsJobStore, JobProcessor, JobStatus, MasteringChain, MasteringConfig, ProcessorConfig,
    SampleEncoding, StemTag,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem-master")]
#[command(about = "Vocal/instrumental separation with automatic mastering", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate a file and master both stems as a tracked job
    Process {
        #[arg(short, long)]
        input: PathBuf,

        /// Defaults to a random UUID
        #[arg(short, long)]
        job_id: Option<String>,

        #[arg(short, long, env = "STEM_MASTER_OUTPUT_DIR")]
        output: Option<PathBuf>,

        /// Where job records are kept, defaults to <output>/jobs
        #[arg(long)]
        store_dir: Option<PathBuf>,

        #[arg(long, env = "STEM_MASTER_DEMUCS_BIN")]
        demucs_bin: Option<String>,

        #[arg(long, default_value = "cpu")]
        device: String,

        /// Expose masters as <base-url>/<job-id>/<file> instead of paths
        #[arg(long)]
        base_url: Option<String>,

        /// Write 32-bit float WAV instead of 16-bit PCM
        #[arg(long)]
        float: bool,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Run the mastering chain on a single stem file
    Master {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "vocals")]
        tag: StemTag,

        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        #[arg(long)]
        float: bool,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Print a job record as JSON
    Status {
        #[arg(short, long)]
        job_id: String,

        #[arg(short, long, env = "STEM_MASTER_OUTPUT_DIR")]
        output: Option<PathBuf>,

        /// Defaults to <output>/jobs
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Fail running jobs that have not progressed within the lease
    Reap {
        #[arg(short, long, env = "STEM_MASTER_OUTPUT_DIR")]
        output: Option<PathBuf>,

        /// Defaults to <output>/jobs
        #[arg(long)]
        store_dir: Option<PathBuf>,

        #[arg(long, default_value_t = 3600)]
        lease_secs: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let quiet = match &cli.command {
        Commands::Process { quiet, .. } | Commands::Master { quiet, .. } => *quiet,
        _ => false,
    };
    init_tracing(quiet);

    let result = match cli.command {
        Commands::Process {
            input,
            job_id,
            output,
            store_dir,
            demucs_bin,
            device,
            base_url,
            float,
            quiet,
        } => {
            let mut config = with_output(output);
            if let Some(bin) = demucs_bin {
                config.separator.program = bin;
            }
            config.separator.device = device;
            config.public_base_url = base_url;
            config.mastering.encoding = encoding(float);
            handle_process(input, job_id, store_dir, config, quiet)
        }
        Commands::Master {
            input,
            tag,
            output,
            float,
            quiet,
        } => handle_master(input, tag, output, float, quiet),
        Commands::Status {
            job_id,
            output,
            store_dir,
        } => handle_status(job_id, store_dir, with_output(output)),
        Commands::Reap {
            output,
            store_dir,
            lease_secs,
        } => handle_reap(store_dir, with_output(output), lease_secs),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn encoding(float: bool) -> SampleEncoding {
    if float {
        SampleEncoding::Float32
    } else {
        SampleEncoding::Pcm16
    }
}

fn with_output(output: Option<PathBuf>) -> ProcessorConfig {
    match output {
        Some(output) => ProcessorConfig::default().with_output_root(output),
        None => ProcessorConfig::default(),
    }
}

/// `--store-dir` if given, else `<output>/jobs` for every subcommand.
fn open_store(
    store_dir: Option<PathBuf>,
    config: &ProcessorConfig,
) -> Result<FsJobStore, Box<dyn std::error::Error>> {
    let dir = store_dir.unwrap_or_else(|| config.store_dir());
    Ok(FsJobStore::open(dir)?)
}

fn handle_process(
    input: PathBuf,
    job_id: Option<String>,
    store_dir: Option<PathBuf>,
    config: ProcessorConfig,
    quiet: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }

    let store = Arc::new(open_store(store_dir, &config)?);
    let processor = JobProcessor::from_config(&config, store);

    let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let job = processor.run(&job_id, &input)?;

    if quiet {
        // Quiet mode: just print paths
        if let (Some(v), Some(i)) = (&job.vocals_master_url, &job.instrumental_master_url) {
            println!("{}", v);
            println!("{}", i);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&job)?);
    }

    Ok(match job.status {
        JobStatus::Done => 0,
        _ => 2,
    })
}

fn handle_master(
    input: PathBuf,
    tag: StemTag,
    output: PathBuf,
    float: bool,
    quiet: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }

    let chain = MasteringChain::new(MasteringConfig {
        encoding: encoding(float),
        ..MasteringConfig::default()
    });
    let path = chain.master_file(&input, tag, &output)?;

    if quiet {
        println!("{}", path.display());
    } else {
        eprintln!("Master written: {}", path.display());
    }
    Ok(0)
}

fn handle_status(
    job_id: String,
    store_dir: Option<PathBuf>,
    config: ProcessorConfig,
) -> Result<i32, Box<dyn std::error::Error>> {
    use stem_master_core::JobStore;

    let store = open_store(store_dir, &config)?;
    let job = store
        .get(&job_id)?
        .ok_or_else(|| stem_master_core::MasterError::JobNotFound(job_id.clone()))?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(0)
}

fn handle_reap(
    store_dir: Option<PathBuf>,
    config: ProcessorConfig,
    lease_secs: u64,
) -> Result<i32, Box<dyn std::error::Error>> {
    let store = Arc::new(open_store(store_dir, &config)?);
    let processor = JobProcessor::from_config(&config, store);
    let reaped = processor.reap_stale(Duration::from_secs(lease_secs))?;

    for job in &reaped {
        println!("{}", job.job_id);
    }
    eprintln!("Reaped {} stale job(s)", reaped.len());
    Ok(0)
}
