use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use futures_util::stream;
use s3wire::{Auth, CancellationToken, Client};

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
    let key = format!("demos/put-stream-{now}.txt");

    let chunk1 = Bytes::from_static(b"hello ");
    let chunk2 = Bytes::from_static(b"stream\n");
    let content_length = (chunk1.len() + chunk2.len()) as u64;
    let body = stream::iter([Ok(chunk1), Ok(chunk2)]);

    client
        .objects()
        .put(&bucket, &key)
        .content_type("text/plain")
        .body_stream(body, content_length)
        .send()
        .await?;

    // Read the object back in small pieces, giving up after two seconds.
    let token = CancellationToken::new();
    let deadline = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        deadline.cancel();
    });

    let mut got = client
        .objects()
        .get(&bucket, &key)
        .cancel_token(token)
        .send()
        .await?;
    let mut buf = [0u8; 4];
    let mut total = 0usize;
    loop {
        let n = got.body_mut().read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    println!("uploaded and read back {total} bytes via stream");

    client.objects().delete(&bucket, &key).send().await?;
    Ok(())
}
