use std::path::PathBuf;

use fadebright::{FadebrightBuilder, FadebrightError};

use clap::{ArgGroup, Parser};

/// Smoothly ramp a backlight and report brightness changes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
            ArgGroup::new("action")
                .required(true)
                .args(["get", "set", "inc", "dec", "watch"]),
        ))]
struct Args {
    /// Backlight control directory to use instead of the configured one
    #[arg(long, value_name = "path")]
    device: Option<PathBuf>,

    /// Print out the current backlight brightness, as a percentage of the
    /// maximum brightness supported.
    #[arg(long)]
    get: bool,

    /// Ramps the backlight brightness to the specified level.
    #[arg(long, value_name = "percent")]
    set: Option<f64>,

    /// Increases brightness by the specified amount.
    #[arg(long, value_name = "percent")]
    inc: Option<f64>,

    /// Decreases brightness by the specified amount.
    #[arg(long, value_name = "percent")]
    dec: Option<f64>,

    /// Print each distinct brightness value as it changes, with the actor
    /// that requested it (if any).
    #[arg(long)]
    watch: bool,

    /// Actor recorded against --set/--inc/--dec for change attribution
    #[arg(long, value_name = "name")]
    actor: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), FadebrightError> {
    env_logger::init();
    let args = Args::parse();

    let mut builder = FadebrightBuilder::new();
    if let Some(device) = &args.device {
        builder = builder.with_device_path(device);
    }
    let mut fadebright = builder.build().await?;

    if let Some(set) = args.set {
        fadebright.set_brightness(set, args.actor).await?;
    } else if args.watch {
        fadebright.watch()?;
        loop {
            let change = fadebright.next_change().await?;
            match &change.requesting_actor {
                Some(actor) => println!("{} (set by {actor})", change.percentage),
                None => println!("{}", change.percentage),
            }
        }
    } else {
        let brightness = fadebright.get_current_brightness_percentage().await?;
        if args.get {
            println!("{brightness}");
        } else if let Some(inc) = args.inc {
            fadebright
                .set_brightness(brightness as f64 + inc, args.actor)
                .await?;
        } else if let Some(dec) = args.dec {
            fadebright
                .set_brightness(brightness as f64 - dec, args.actor)
                .await?;
        }
    }

    Ok(())
}
