use anyhow::{Context, Result};
use clap::Parser;
use stowage::{
    bundle::Bundle,
    cli::{Cli, Commands},
    config::Config,
    constants::platform::MULTI_OS,
    manifest::Platform,
    publish::{Publisher, Signature},
    pull::pull_bundle,
    reference::{display_reference, ensure_oci_prefix, reference_from_metadata},
    registry::{Connector, OciConnector, Remote},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Publish {
            bundle,
            destination,
            signature,
            insecure,
        } => {
            let config = Config::load()?;

            let destination = destination
                .or_else(|| config.default_destination.clone())
                .context("Either DESTINATION, STOWAGE_REPO or default_destination must be set")?;

            let mut bundle_def = Bundle::load(&bundle)?;
            bundle_def.stamp_build(env!("CARGO_PKG_VERSION"));
            let signature = Signature::load(signature.as_deref())?;

            let publisher = Publisher::new(OciConnector::new(config, insecure));
            publisher
                .publish(&bundle_def, &destination, signature)
                .await
                .with_context(|| format!("Failed to publish {}", bundle.display()))?;

            let reference =
                reference_from_metadata(&ensure_oci_prefix(&destination), &bundle_def.metadata)?;
            let shown = display_reference(&reference);

            // Print only the bundle reference to stdout
            println!("{}", shown);

            info!("To inspect the bundle: stowage inspect {}", shown);
            info!(
                "To pull the bundle: stowage pull {} --arch {}",
                shown, bundle_def.metadata.architecture
            );
        }
        Commands::Inspect {
            reference,
            insecure,
        } => {
            let config = Config::load()?;
            let connector = OciConnector::new(config, insecure);
            let remote = connector.connect(&reference, &host_platform())?;

            let json = match remote.fetch_index().await? {
                Some(index) => serde_json::to_string_pretty(&index)?,
                None => {
                    let manifest = remote
                        .fetch_root()
                        .await
                        .with_context(|| format!("Nothing to inspect at {}", reference))?;
                    serde_json::to_string_pretty(&manifest.manifest)?
                }
            };
            println!("{}", json);
        }
        Commands::Pull {
            reference,
            arch,
            output,
            insecure,
        } => {
            let config = Config::load()?;
            let platform = arch
                .map(|arch| Platform::new(&arch, MULTI_OS))
                .unwrap_or_else(host_platform);
            let connector = OciConnector::new(config, insecure);
            let remote = connector.connect(&reference, &platform)?;

            let written = pull_bundle(&remote, &output)
                .await
                .with_context(|| format!("Failed to pull {}", reference))?;

            for path in written {
                println!("{}", path.display());
            }
        }
        Commands::Version => {
            println!("stowage {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Platform of the running host, in registry architecture names
fn host_platform() -> Platform {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    Platform::new(arch, MULTI_OS)
}
