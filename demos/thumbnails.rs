use std::env;
use std::time::Duration;
use thumbgen::{
    CancellationToken, Config, FanOut, OpenRouterConfig, Responses, RetryPolicy, RewriteConfig,
    ThumbnailClient, ThumbnailRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    thumbgen::logger::init()?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found");
    }

    let api_key = env::var("OPENROUTER_API_KEY")?;
    let image_path = env::args().nth(1).ok_or("usage: thumbnails <image-path>")?;

    let mut rewrite = RewriteConfig::new();
    if let Ok(openai_key) = env::var("OPENAI_API_KEY") {
        rewrite = rewrite.with_credentials(openai_key);
    }

    let config = Config::new()
        .with_openrouter(
            OpenRouterConfig::new()
                .with_credentials(api_key)
                .with_timeout(Duration::from_secs(90)),
        )
        .with_rewrite(rewrite)
        .with_retry(RetryPolicy::new().with_max_attempts(3));

    let client = ThumbnailClient::new(&config)?;

    let image = std::fs::read(&image_path)?;
    let request = ThumbnailRequest::new(Responses {
        video_type: Some("cooking tutorial".to_string()),
        style: Some("bright and clean".to_string()),
        mood: Some("warm".to_string()),
        audience: Some("home cooks".to_string()),
        ..Default::default()
    })
    .with_placement("left")
    .with_base_image({
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(image)
    })
    .with_variations(1)
    .with_fan_out(FanOut::Sequential);

    let batch = client
        .generate_thumbnails(&request, &CancellationToken::new())
        .await?;

    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}
