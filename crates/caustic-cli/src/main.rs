//! Caustic command-line interface.
//!
//! Ray-trace lens models described by TOML job files:
//! ```sh
//! caustic-cli run job.toml
//! caustic-cli validate job.toml
//! caustic-cli profiles
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caustic-cli")]
#[command(about = "Caustic: Multi-Plane Strong-Lensing Ray Tracer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ray-trace a lens model from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without tracing.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// List the profiles and cosmologies a job file can use.
    Profiles,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Caustic Ray Tracer");
            println!("==================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            let scale = job.grid.pixel_scale;

            runner::write_array_csv(&result.image, &out_dir.join("image.csv"), "Image-plane image", (scale, scale))?;

            for (i, plane_image) in result.plane_images.iter().enumerate() {
                let path = out_dir.join(format!("plane_{i}.csv"));
                let title = format!("Plane {i} image");
                runner::write_array_csv(&plane_image.array, &path, &title, plane_image.pixel_scales)?;
            }

            if let Some((deflections_y, deflections_x)) = &result.deflections {
                runner::write_array_csv(deflections_y, &out_dir.join("deflections_y.csv"), "Deflections (y)", (scale, scale))?;
                runner::write_array_csv(deflections_x, &out_dir.join("deflections_x.csv"), "Deflections (x)", (scale, scale))?;
            }

            if job.output.save_json {
                runner::write_summary_json(&result, &out_dir.join("summary.json"))?;
            }

            println!("Ray tracing complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let _job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Profiles => {
            println!("Available profiles:");
            println!();
            println!("  Light ([[galaxy.light]]):");
            println!("    spherical_gaussian  - centre, intensity, sigma");
            println!();
            println!("  Mass ([[galaxy.mass]]):");
            println!("    spherical_isothermal - centre, einstein_radius");
            println!();
            println!("  Cosmology ([cosmology]):");
            println!("    preset = \"Planck15\" | \"WMAP9\"");
            println!("    h0, omega_m, t_cmb, n_eff, m_nu (flat ΛCDM)");
            Ok(())
        }
    }
}
