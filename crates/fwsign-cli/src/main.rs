//! fwsign - post-build firmware signing for OTA releases
//!
//! Registered as a post-build hook, `fwsign sign <firmware.bin>` signs the
//! freshly built binary and publishes `firmware.img` and `manifest.json`.

mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fwsign_core::{
    config::CONFIG_FILE_NAME, version, Backend, Error, Pipeline, PipelineConfig,
    PipelineOutcome, Prerequisite, PrerequisiteKind, Signature, SignedImage,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fwsign")]
#[command(about = "Sign firmware images and publish OTA update manifests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a firmware binary and publish the signed image and manifest
    Sign(SignArgs),

    /// Verify a signed image against a public key
    Verify {
        /// Signed firmware image
        image: PathBuf,

        #[command(flatten)]
        project: ProjectArgs,

        /// PEM public verification key
        #[arg(long)]
        public_key: Option<PathBuf>,

        /// Signature backend
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
    },

    /// Print the firmware version resolved from the metadata header
    Version {
        #[command(flatten)]
        project: ProjectArgs,

        /// Header declaring the firmware version constants
        #[arg(long)]
        metadata: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        project: ProjectArgs,

        /// Write it to fwsign.json in the project directory
        #[arg(long)]
        write: bool,
    },
}

#[derive(Args)]
struct SignArgs {
    /// Unsigned firmware binary produced by the build
    binary: PathBuf,

    #[command(flatten)]
    project: ProjectArgs,

    /// PEM private signing key
    #[arg(long)]
    private_key: Option<PathBuf>,

    /// PEM public verification key
    #[arg(long)]
    public_key: Option<PathBuf>,

    /// Header declaring the firmware version constants
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Output directory for the signed image and manifest
    #[arg(long)]
    release_dir: Option<PathBuf>,

    /// Signature backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// openssl program used by the openssl backend
    #[arg(long)]
    openssl: Option<PathBuf>,

    /// Exit non-zero when signing fails (a skip still exits zero)
    #[arg(long)]
    strict: bool,
}

impl SignArgs {
    /// Effective config with command-line overrides applied
    fn pipeline(&self) -> Result<Pipeline> {
        let mut config = self.project.load()?;
        if let Some(path) = &self.private_key {
            config.private_key = path.clone();
        }
        if let Some(path) = &self.public_key {
            config.public_key = path.clone();
        }
        if let Some(path) = &self.metadata {
            config.metadata = path.clone();
        }
        if let Some(path) = &self.release_dir {
            config.release_dir = path.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if let Some(path) = &self.openssl {
            config.openssl_path = path.clone();
        }
        let config = config.resolve_paths(&self.project.project_dir);
        Ok(Pipeline::from_config(&config)?)
    }
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root; relative paths resolve against it
    #[arg(short = 'C', long, default_value = ".")]
    project_dir: PathBuf,

    /// Config file (default: $FWSIGN_CONFIG, then <project>/fwsign.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ProjectArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig::discover(&self.project_dir, self.config.as_deref())
            .context("loading fwsign configuration")?;
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Rsa,
    Openssl,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Rsa => Backend::Rsa,
            BackendArg::Openssl => Backend::Openssl,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fwsign=info,fwsign_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sign(args) => handle_sign(&args),

        Commands::Verify {
            image,
            project,
            public_key,
            backend,
        } => {
            let mut config = project.load()?;
            if let Some(path) = public_key {
                config.public_key = path;
            }
            if let Some(backend) = backend {
                config.backend = backend.into();
            }
            let config = config.resolve_paths(&project.project_dir);
            handle_verify(&config, &image)
        }

        Commands::Version { project, metadata } => {
            let mut config = project.load()?;
            if let Some(path) = metadata {
                config.metadata = path;
            }
            let config = config.resolve_paths(&project.project_dir);
            report::version(&version::resolve(&config.metadata, &config.version_markers));
            Ok(())
        }

        Commands::Config { project, write } => {
            let config = project.load()?;
            if write {
                let path = project.project_dir.join(CONFIG_FILE_NAME);
                config.save(&path)?;
                println!("✓ Configuration written to {}", path.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

fn handle_sign(args: &SignArgs) -> Result<()> {
    let pipeline = match args.pipeline() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            report::unconfigured(&e);
            if args.strict {
                return Err(e.context("firmware signing is misconfigured"));
            }
            return Ok(());
        }
    };
    info!("Signing {:?} into {:?}", args.binary, pipeline.target().dir);

    let run = pipeline.run(&args.binary);
    match &run.outcome {
        PipelineOutcome::Complete(summary) => report::complete(summary),
        PipelineOutcome::Skipped(missing) => report::skipped(missing),
        PipelineOutcome::Failed { stage, error } => {
            report::failed(*stage, error);
            if args.strict {
                anyhow::bail!("firmware {} failed", stage);
            }
        }
    }

    Ok(())
}

fn handle_verify(config: &PipelineConfig, image_path: &Path) -> Result<()> {
    if !config.public_key.is_file() {
        return Err(Error::MissingPrerequisite(Prerequisite::new(
            PrerequisiteKind::PublicKey,
            &config.public_key,
        ))
        .into());
    }

    let engine = config.engine();
    let signature_len = engine.signature_len(&config.public_key)?;
    let image = SignedImage::read(image_path, signature_len)?;
    let signature = Signature::new(image.signature().to_vec());

    println!("Image: {}", image_path.display());
    println!("  Size:      {} bytes", report::grouped(image.len() as u64));
    println!("  Signature: {} bytes", signature_len);
    println!("  Firmware:  {} bytes", report::grouped(image.payload().len() as u64));

    if engine.verify(&config.public_key, image.payload(), &signature)? {
        println!("✓ Signature verification successful");
        Ok(())
    } else {
        anyhow::bail!("signature verification failed for {}", image_path.display())
    }
}
