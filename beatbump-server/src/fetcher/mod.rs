//! Range Fetcher: parallel HTTP range downloader with ordered reassembly
//! (spec §4.2, §9).
//!
//! `W` workers pull chunk indices from a shared atomic counter, each chunk's
//! bytes land on a single-slot channel, and one consumer drains those
//! channels strictly in index order. This keeps reassembly ordered without a
//! shared lock on the output sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use reqwest::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub const CHUNK_SIZE: u64 = 10 * 1024 * 1024;
pub const WORKER_COUNT: usize = 5;

/// Downloads `url` into `sink`, using parallel range requests when
/// `content_length` is known and a single streaming GET otherwise.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    content_length: u64,
    sink: &mut (impl AsyncWrite + Unpin),
    cancel: CancellationToken,
) -> Result<()> {
    if content_length == 0 {
        return fetch_streaming(client, url, sink, cancel).await;
    }

    let chunk_count = content_length.div_ceil(CHUNK_SIZE) as usize;
    let next_index = Arc::new(AtomicUsize::new(0));
    let mut receivers = Vec::with_capacity(chunk_count);
    let mut senders: Vec<Option<oneshot::Sender<Result<Bytes>>>> = Vec::with_capacity(chunk_count);
    for _ in 0..chunk_count {
        let (tx, rx) = oneshot::channel();
        senders.push(Some(tx));
        receivers.push(rx);
    }
    let senders = Arc::new(std::sync::Mutex::new(senders));

    let mut workers = Vec::with_capacity(WORKER_COUNT);
    for _ in 0..WORKER_COUNT {
        let client = client.clone();
        let url = url.to_string();
        let next_index = next_index.clone();
        let senders = senders.clone();
        let cancel = cancel.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                if index >= chunk_count {
                    break;
                }
                let sender = {
                    let mut guard = senders.lock().expect("sender mutex poisoned");
                    guard[index].take()
                };
                let Some(sender) = sender else { continue };

                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(Error::Other("fetch cancelled".to_string())),
                    result = fetch_chunk(&client, &url, index as u64, content_length) => result,
                };
                let is_err = result.is_err();
                let _ = sender.send(result);
                if is_err {
                    break;
                }
            }
        }));
    }

    let result = consume_in_order(receivers, sink, cancel.clone()).await;

    for worker in workers {
        worker.abort();
    }

    result
}

async fn fetch_chunk(client: &reqwest::Client, url: &str, index: u64, content_length: u64) -> Result<Bytes> {
    let start = index * CHUNK_SIZE;
    let end = ((start + CHUNK_SIZE).min(content_length)) - 1;
    let expected_len = end - start + 1;

    let response = client
        .get(url)
        .header("Range", format!("bytes={start}-{end}"))
        .send()
        .await
        .map_err(|e| Error::DownloadFailed(format!("range request failed: {e}")))?;

    if response.status() != StatusCode::PARTIAL_CONTENT && !response.status().is_success() {
        return Err(Error::DownloadFailed(format!(
            "range request returned status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::DownloadFailed(format!("failed reading chunk body: {e}")))?;

    if bytes.len() as u64 != expected_len {
        return Err(Error::DownloadFailed(format!(
            "short read: expected {expected_len} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(bytes)
}

async fn consume_in_order(
    receivers: Vec<oneshot::Receiver<Result<Bytes>>>,
    sink: &mut (impl AsyncWrite + Unpin),
    cancel: CancellationToken,
) -> Result<()> {
    for receiver in receivers {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Other("fetch cancelled".to_string())),
            result = receiver => result.map_err(|_| Error::DownloadFailed("worker dropped before sending chunk".to_string()))?,
        }?;

        sink.write_all(&chunk).await.map_err(Error::Io)?;
    }
    sink.flush().await.map_err(Error::Io)?;
    Ok(())
}

async fn fetch_streaming(
    client: &reqwest::Client,
    url: &str,
    sink: &mut (impl AsyncWrite + Unpin),
    cancel: CancellationToken,
) -> Result<()> {
    use futures::StreamExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::DownloadFailed(format!("streaming request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::DownloadFailed(format!(
            "streaming request returned status {}",
            response.status()
        )));
    }

    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Other("fetch cancelled".to_string())),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                sink.write_all(&chunk).await.map_err(Error::Io)?;
            }
            Some(Err(e)) => return Err(Error::DownloadFailed(format!("stream error: {e}"))),
            None => break,
        }
    }
    sink.flush().await.map_err(Error::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn serve_range_body(body: &'static [u8]) -> String {
        use std::net::SocketAddr;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let url = format!("http://{addr}/body");

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                tokio::spawn(serve_one(stream, body));
            }
        });

        url
    }

    async fn serve_one(stream: tokio::net::TcpStream, body: &'static [u8]) {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.is_err() {
            return;
        }

        let mut range: Option<(u64, u64)> = None;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                break;
            }
            if line == "\r\n" {
                break;
            }
            if let Some(value) = line.strip_prefix("Range: bytes=") {
                let value = value.trim();
                if let Some((start, end)) = value.split_once('-') {
                    range = Some((start.parse().unwrap(), end.parse().unwrap()));
                }
            }
        }

        let (status, payload): (&str, &[u8]) = match range {
            Some((start, end)) => (
                "206 Partial Content",
                &body[start as usize..=(end as usize).min(body.len() - 1)],
            ),
            None => ("200 OK", body),
        };

        let header = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        );
        let _ = tokio::io::AsyncWriteExt::write_all(&mut writer, header.as_bytes()).await;
        let _ = tokio::io::AsyncWriteExt::write_all(&mut writer, payload).await;
        let _ = tokio::io::AsyncWriteExt::shutdown(&mut writer).await;
    }

    #[tokio::test]
    async fn fetch_reassembles_multi_chunk_body_in_order() {
        let body: Vec<u8> = (0..(CHUNK_SIZE * 2 + 123)).map(|i| (i % 251) as u8).collect();
        let body: &'static [u8] = Box::leak(body.into_boxed_slice());
        let url = serve_range_body(body).await;

        let client = reqwest::Client::new();
        let mut out = Vec::new();
        fetch(&client, &url, body.len() as u64, &mut out, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn fetch_falls_back_to_streaming_when_length_unknown() {
        let body: &'static [u8] = b"hello world streaming body";
        let url = serve_range_body(body).await;

        let client = reqwest::Client::new();
        let mut out = Vec::new();
        fetch(&client, &url, 0, &mut out, CancellationToken::new()).await.unwrap();

        assert_eq!(out, body);
    }
}
