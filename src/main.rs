use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nix::unistd::Uid;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usbdrive::config::load_config;
use usbdrive::gadget::{GadgetPaths, MountOptions};
use usbdrive::msd::{MountRequest, MsdController};
use usbdrive::AppError;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

/// usbdrive command line arguments
#[derive(Parser, Debug)]
#[command(name = "usbdrive")]
#[command(version, about = "Mount disk images as USB mass storage", long_about = None)]
struct CliArgs {
    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "error", global = true)]
    log_level: LogLevel,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mount a disk image as USB device (default mode is read-write)
    Mount(MountArgs),
    /// Unmount currently mounted image
    Unmount(UnmountArgs),
    /// Show current mount status
    Status,
    /// Print usbdrive version
    Version,
}

#[derive(Args, Debug)]
struct MountArgs {
    /// Image file to expose
    file: Option<PathBuf>,

    /// Load configuration from file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mount as read-write (default)
    #[arg(long, conflicts_with = "ro")]
    rw: bool,

    /// Mount as read-only
    #[arg(long)]
    ro: bool,

    /// Mount as CDROM device
    #[arg(long)]
    cdrom: bool,

    /// Force backend: configfs, udc (legacy) or sysfs
    #[arg(short = 'f', long, value_name = "BACKEND")]
    force: Option<String>,

    /// Preview operation without executing
    #[arg(short = 'n', long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct UnmountArgs {
    /// Force backend: configfs, udc (legacy) or sysfs
    #[arg(short = 'f', long, value_name = "BACKEND")]
    force: Option<String>,

    /// Preview operation without executing
    #[arg(short = 'n', long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose);

    let controller = MsdController::new(GadgetPaths::default());

    match args.command {
        Command::Mount(mount) => run_mount(&controller, mount),
        Command::Unmount(unmount) => run_unmount(&controller, unmount),
        Command::Status => {
            run_status(&controller);
            Ok(())
        }
        Command::Version => {
            println!("usbdrive version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Mount and unmount, dry runs included, need root
fn require_root() -> Result<(), AppError> {
    check_root(Uid::effective())
}

fn check_root(uid: Uid) -> Result<(), AppError> {
    if !uid.is_root() {
        return Err(AppError::PermissionDenied("must run as root".to_string()));
    }
    Ok(())
}

fn mount_request(args: MountArgs) -> anyhow::Result<MountRequest> {
    if let Some(config_path) = &args.config {
        let config = load_config(config_path).context("failed to load config")?;
        tracing::info!("Loaded configuration: {}", config_path.display());

        let mut request = MountRequest::from(config);
        if args.force.is_some() {
            request.backend = args.force;
        }
        return Ok(request);
    }

    let file = args
        .file
        .ok_or_else(|| AppError::Config("missing file argument".to_string()))?;

    // CDROM implies read-only unless --rw asks otherwise (which is then rejected)
    let options = MountOptions {
        read_write: args.rw || (!args.ro && !args.cdrom),
        cdrom: args.cdrom,
    };

    Ok(MountRequest {
        file,
        options,
        backend: args.force,
    })
}

fn run_mount(controller: &MsdController, args: MountArgs) -> anyhow::Result<()> {
    require_root()?;
    let dry_run = args.dry_run;
    let request = mount_request(args)?;

    if dry_run {
        let plan = controller
            .plan_mount(&request)
            .context("invalid mount request")?;
        println!("Dry run: Would mount with the following settings:");
        println!("  Backend: {}", plan.backend);
        println!("  File: {}", plan.image.path.display());
        println!(
            "  Size: {} bytes ({})",
            plan.image.size,
            plan.image.size_display()
        );
        println!("  Mode: {}", plan.mode);
        println!("  Capabilities: {}", plan.capabilities);
        for warning in &plan.warnings {
            println!("  WARNING: {}", warning);
        }
        return Ok(());
    }

    controller
        .mount(&request)
        .context("mount failed (try running with -v for verbose output)")?;
    Ok(())
}

fn run_unmount(controller: &MsdController, args: UnmountArgs) -> anyhow::Result<()> {
    require_root()?;
    if args.dry_run {
        let plan = controller.plan_unmount(args.force.as_deref())?;
        println!("Dry run: Would unmount using backend: {}", plan.backend);
        match &plan.current.file {
            Some(file) if plan.current.mounted => {
                println!("  Currently mounted: {}", file.display());
                println!("  Current mode: {}", plan.current.mode());
            }
            _ => println!("  Status: No image currently mounted"),
        }
        return Ok(());
    }

    controller
        .unmount(args.force.as_deref())
        .context("unmount failed (try running with -v for verbose output)")?;
    Ok(())
}

fn run_status(controller: &MsdController) {
    let Some((backend, status)) = controller.status() else {
        println!("No active USB gadget found");
        return;
    };

    println!("Backend: {}", backend);
    match status.file.as_ref() {
        Some(file) if status.mounted => {
            println!("Status: Mounted");
            println!("File: {}", file.display());
            println!("Mode: {}", status.mode());
        }
        _ => println!("Status: Not mounted"),
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "usbdrive=error",
        LogLevel::Warn => "usbdrive=warn",
        LogLevel::Info => "usbdrive=info",
        LogLevel::Verbose => "usbdrive=debug",
        LogLevel::Debug => "usbdrive=debug",
        LogLevel::Trace => "usbdrive=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_root() {
        assert!(check_root(Uid::from_raw(0)).is_ok());
        assert!(matches!(
            check_root(Uid::from_raw(1000)),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_dry_run_flags_parse() {
        let args = CliArgs::parse_from(["usbdrive", "mount", "-n", "--cdrom", "x.iso"]);
        let Command::Mount(mount) = args.command else {
            panic!("expected mount subcommand");
        };
        assert!(mount.dry_run);
        assert!(mount.cdrom);

        let request = mount_request(mount).unwrap();
        assert!(!request.options.read_write);
        assert!(request.options.cdrom);
    }
}
