use std::env;

use anyhow::Context;
use fcm_client::{to_options, FCMClient, FcmConfig, Options, ResponseRecord};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  fcm-send token <device_token> [options_json]");
    eprintln!("  fcm-send topic <topic> [options_json]");
    eprintln!("  fcm-send condition <condition> [options_json]");
    eprintln!("  fcm-send legacy <registration_id>[,<registration_id>...] [options_json]");
    eprintln!();
    eprintln!("Configuration is read from FCM_* environment variables (or .env).");
    std::process::exit(1);
}

fn print_record(record: Option<ResponseRecord>) -> anyhow::Result<()> {
    match record {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("not sent: request declined locally"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        usage();
    }

    let options: Options = match args.get(3) {
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("options must be valid JSON")?;
            to_options(&value)?
        }
        None => Options::new(),
    };

    let config = FcmConfig::from_env().context("failed to load FCM configuration")?;
    let client = FCMClient::from_config(config)?;
    let target = args[2].as_str();

    tracing::info!("fcm-send {} {}", args[1], target);

    match args[1].as_str() {
        "token" => print_record(Some(client.send_to_token(target, &options).await?)),
        "topic" => print_record(Some(client.send_to_topic(target, &options).await?)),
        "condition" => print_record(client.send_to_condition(target, &options).await?),
        "legacy" => {
            let ids: Vec<String> = target.split(',').map(str::to_string).collect();
            print_record(client.send_notification(ids, &options).await?)
        }
        _ => usage(),
    }
}
