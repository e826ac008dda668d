use std::env;

use s3wire::{AddressingStyle, Auth, Client, types::ListEntry};

#[allow(clippy::result_large_err)]
#[tokio::main]
async fn main() -> Result<(), s3wire::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let endpoint = match env::var("S3_TEST_ENDPOINT") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Set S3_TEST_ENDPOINT to run this example (e.g. http://127.0.0.1:9000).");
            return Ok(());
        }
    };

    let bucket = match env::var("S3_TEST_BUCKET") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Set S3_TEST_BUCKET to the bucket you want to list.");
            return Ok(());
        }
    };

    let region = env::var("S3_TEST_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let auth = match Auth::from_env() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY: {err}");
            return Ok(());
        }
    };

    let client = Client::builder(&endpoint)?
        .region(region)
        .auth(auth)
        .addressing_style(AddressingStyle::Auto)
        .build()?;

    let mut listing = client
        .objects()
        .list(&bucket)
        .delimiter("/")
        .max_keys(1000)
        .paginator();

    let mut shown = 0u32;
    while let Some(entry) = listing.next_entry().await? {
        match entry {
            ListEntry::Object(obj) => println!("{} ({} bytes)", obj.key(), obj.size()),
            ListEntry::CommonPrefix(prefix) => println!("{prefix}"),
        }

        shown += 1;
        if shown >= 3000 {
            if let Some(marker) = listing.resume_marker() {
                println!("... more entries; resume with marker {marker}");
            }
            break;
        }
    }
    listing.close();

    Ok(())
}
