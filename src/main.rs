use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thumbgen::{
    logger::{self, LoggerConfig},
    AspectRatio, CancellationToken, Config, Responses, SlotOutcome, ThumbnailClient,
    ThumbnailRequest,
};

const USAGE: &str = "usage: thumbgen <image-path> [out-dir] | thumbgen serve";

fn answer(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn responses_from_env() -> Responses {
    Responses {
        video_type: answer("THUMB_VIDEO_TYPE"),
        style: answer("THUMB_STYLE"),
        mood: answer("THUMB_MOOD"),
        audience: answer("THUMB_AUDIENCE"),
        context: answer("THUMB_CONTEXT"),
        placement: answer("THUMB_PLACEMENT"),
        ..Default::default()
    }
}

#[cfg(feature = "server")]
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    thumbgen::server::run(config).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_config: Config) -> Result<(), Box<dyn std::error::Error>> {
    Err("thumbgen was built without the `server` feature".into())
}

async fn generate(
    config: Config,
    image_path: &Path,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = fs::read(image_path)?;
    log::info!(
        "📷 Loaded base image {} ({} bytes)",
        image_path.display(),
        image.len()
    );

    let client = ThumbnailClient::new(&config)?;
    let request = ThumbnailRequest::new(responses_from_env()).with_base_image(STANDARD.encode(&image));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("⚠️  Interrupted, cancelling outstanding requests");
            ctrl_c.cancel();
        }
    });

    let batch = client.generate_thumbnails(&request, &cancel).await?;
    log::info!("✍️  Rewritten prompt: {}", batch.rewritten_prompt);

    fs::create_dir_all(out_dir)?;
    let mut written = 0;
    for (index, thumbnail) in batch.thumbnails.iter().enumerate() {
        for ratio in AspectRatio::ALL {
            match thumbnail.slot(ratio) {
                SlotOutcome::Ready { data_url } => {
                    let (extension, bytes) = decode_data_url(data_url)?;
                    let path = out_dir.join(format!(
                        "thumb_{}_{}.{}",
                        index + 1,
                        ratio.as_str(),
                        extension
                    ));
                    fs::write(&path, bytes)?;
                    println!("{}", path.display());
                    written += 1;
                }
                SlotOutcome::Failed { code, message, .. } => {
                    log::error!(
                        "❌ thumb_{} {} failed [{}]: {}",
                        index + 1,
                        ratio,
                        code,
                        message
                    );
                }
            }
        }
    }

    log::info!("✅ Wrote {} thumbnail(s) to {}", written, out_dir.display());
    if written == 0 {
        return Err("no thumbnails were generated".into());
    }
    Ok(())
}

fn decode_data_url(data_url: &str) -> Result<(&str, Vec<u8>), Box<dyn std::error::Error>> {
    let (header, payload) = data_url
        .split_once(";base64,")
        .ok_or("slot did not contain a base64 data URL")?;
    let extension = match header.trim_start_matches("data:") {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    };
    Ok((extension, STANDARD.decode(payload)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    logger::init_with_config(LoggerConfig::development().with_env_level())?;

    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Config::from_env();
    logger::log_config_info(&config);

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("serve") => serve(config).await,
        Some(image_path) => {
            let out_dir = args
                .get(1)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            generate(config, Path::new(image_path), &out_dir).await
        }
        None => {
            eprintln!("{}", USAGE);
            Err("missing image path".into())
        }
    }
}
