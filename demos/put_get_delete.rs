use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use s3wire::{Auth, Client};

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
            eprintln!("Set S3_TEST_BUCKET to a bucket you can write to.");
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
        .build()?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let key = format!("demos/put-get-delete-{now}.txt");

    let put = client
        .objects()
        .put(&bucket, &key)
        .content_type("text/plain")
        .metadata("origin", "s3wire-demo")
        .content_md5(true)
        .idempotent(true)
        .body_bytes("hello from s3wire\n")
        .send()
        .await?;
    println!("stored with etag {}", put.etag().unwrap_or("-"));

    let head = client.objects().head(&bucket, &key).send().await?;
    println!(
        "{} bytes, metadata {:?}",
        head.attributes().content_length().unwrap_or(0),
        head.attributes().user_metadata()
    );

    let got = client.objects().get(&bucket, &key).send().await?;
    let mut stdout = tokio::io::stdout();
    let written = got.write_to(&mut stdout).await?;
    println!("downloaded {written} bytes");

    client.objects().delete(&bucket, &key).send().await?;
    println!("pool: {:?}", client.pool_stats());
    Ok(())
}
