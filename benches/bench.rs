use std::{convert::Infallible, hint::black_box, net::SocketAddr, time::Duration};

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http_body_util::Full;
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, runtime::Runtime};

fn listing(keys: usize) -> Bytes {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>bench</Name><Prefix></Prefix><Marker></Marker><MaxKeys>1000</MaxKeys>\
         <IsTruncated>false</IsTruncated>",
    );
    for i in 0..keys {
        xml.push_str(&format!(
            "<Contents><Key>logs/2024/{i:08}.json</Key>\
             <LastModified>2024-05-01T12:00:00.000Z</LastModified>\
             <ETag>&quot;9b2cf535f27731c974343645a3985328&quot;</ETag><Size>{i}</Size>\
             <StorageClass>STANDARD</StorageClass></Contents>"
        ));
    }
    xml.push_str("</ListBucketResult>");
    Bytes::from(xml)
}

/// Serves `body` to every request on a loopback port.
fn serve(rt: &Runtime, body: Bytes) -> SocketAddr {
    rt.block_on(async move {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind bench server");
        let addr = listener.local_addr().expect("bench server address");
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |_req| {
                        let body = body.clone();
                        async move { Ok::<_, Infallible>(http::Response::new(Full::new(body))) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });
        addr
    })
}

fn client(addr: SocketAddr, version: s3wire::SignatureVersion) -> s3wire::Client {
    let creds = s3wire::Credentials::new("AKIDEXAMPLE", "SECRETKEYEXAMPLE")
        .expect("static credentials must be valid");

    s3wire::Client::builder(format!("http://{addr}"))
        .expect("endpoint must be valid")
        .region("us-east-1")
        .auth(s3wire::Auth::Static(creds))
        .signature_version(version)
        .build()
        .expect("client must build")
}

fn bench_head_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let addr = serve(&rt, Bytes::new());

    let mut group = c.benchmark_group("head_roundtrip");
    group.measurement_time(Duration::from_secs(3));

    for (label, version) in [
        ("sigv4", s3wire::SignatureVersion::V4),
        ("sigv2", s3wire::SignatureVersion::V2),
    ] {
        let client = client(addr, version);
        group.bench_function(BenchmarkId::new("pooled", label), |b| {
            b.to_async(&rt).iter(|| async {
                let out = client
                    .objects()
                    .head(black_box("bench"), black_box("a/b/c/object.txt"))
                    .send()
                    .await
                    .expect("head must succeed");
                black_box(out);
            });
        });
    }

    group.finish();
}

fn bench_list_page(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("list_page");
    group.measurement_time(Duration::from_secs(3));

    for keys in [10usize, 1000] {
        let addr = serve(&rt, listing(keys));
        let client = client(addr, s3wire::SignatureVersion::V4);
        group.bench_with_input(BenchmarkId::new("parse", keys), &keys, |b, &keys| {
            b.to_async(&rt).iter(|| async {
                let page = client
                    .objects()
                    .list(black_box("bench"))
                    .send()
                    .await
                    .expect("list must succeed");
                assert_eq!(page.objects().len(), keys);
                black_box(page);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_head_roundtrip, bench_list_page);
criterion_main!(benches);
