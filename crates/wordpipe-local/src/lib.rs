use encoding_rs::Encoding;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use wordpipe_core::{Document, Error, FetchBackend, FetchRequest, Result};

pub mod cache;
pub mod clean;
pub mod extract;
pub mod pipeline;
pub mod rank;
pub mod stopwords;
pub mod tokenize;

/// Desktop browser identity; some news sites refuse obvious bot agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
}

impl LocalFetcher {
    pub fn new() -> Result<Self> {
        let mut default_headers = reqwest::header::HeaderMap::new();
        default_headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            // Per-request timeouts (FetchRequest.timeout_ms) override this.
            .connect_timeout(Duration::from_millis(wordpipe_core::DEFAULT_TIMEOUT_MS))
            .timeout(Duration::from_millis(wordpipe_core::DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self { client })
    }

    fn apply_headers(
        &self,
        mut rb: reqwest::RequestBuilder,
        headers: &BTreeMap<String, String>,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                rb = rb.header(name, value);
            }
        }
        rb
    }
}

/// `charset=` parameter of a Content-Type header value.
fn declared_charset(content_type: Option<&str>) -> Option<String> {
    content_type?.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        if !k.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let v = v.trim().trim_matches(|c| c == '"' || c == '\'');
        (!v.is_empty()).then(|| v.to_ascii_lowercase())
    })
}

/// Decode a body by looking at the bytes, not at what the server claims.
///
/// A BOM wins; otherwise the encoding is guessed from the content.
pub fn decode_body(bytes: &[u8]) -> (String, &'static Encoding) {
    if let Some((enc, _)) = Encoding::for_bom(bytes) {
        let (text, _) = enc.decode_with_bom_removal(bytes);
        return (text.into_owned(), enc);
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    let (text, _) = enc.decode_without_bom_handling(bytes);
    (text.into_owned(), enc)
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<Document> {
        let mut timings_ms = BTreeMap::new();
        let url = req.parse_url()?;
        info!(url = %url, "fetching page");

        let t_req = std::time::Instant::now();
        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        rb = self.apply_headers(rb, &req.headers);
        let resp = rb.send().await.map_err(|e| Error::Network(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "http status {} for {final_url}",
                status.as_u16()
            )));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Network(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        timings_ms.insert("network_fetch".to_string(), t_req.elapsed().as_millis());
        if truncated {
            warn!(max_bytes, url = %final_url, "response body truncated");
        }

        let t_dec = std::time::Instant::now();
        let declared = declared_charset(content_type.as_deref());
        let (text, encoding) = decode_body(&bytes);
        timings_ms.insert("decode".to_string(), t_dec.elapsed().as_millis());
        debug!(
            bytes = bytes.len(),
            encoding = encoding.name(),
            declared = declared.as_deref().unwrap_or("-"),
            "decoded body"
        );

        Ok(Document {
            url: req.url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            declared_charset: declared,
            encoding: encoding.name().to_string(),
            text,
            truncated,
            timings_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    const ZH: &str = "自然语言处理是人工智能领域中的一个重要方向，它研究能实现人与计算机之间用自然语言进行有效通信的各种理论和方法。";

    #[test]
    fn declared_charset_parses_content_type_params() {
        assert_eq!(
            declared_charset(Some("text/html; charset=GBK")).as_deref(),
            Some("gbk")
        );
        assert_eq!(
            declared_charset(Some("text/html;Charset=\"utf-8\"")).as_deref(),
            Some("utf-8")
        );
        assert_eq!(declared_charset(Some("text/html")), None);
        assert_eq!(declared_charset(None), None);
    }

    #[test]
    fn decode_body_honors_bom() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(ZH.as_bytes());
        let (text, enc) = decode_body(&bytes);
        assert_eq!(enc, encoding_rs::UTF_8);
        assert_eq!(text, ZH);
    }

    #[tokio::test]
    async fn fetch_decodes_utf8_page_and_sends_browser_user_agent() {
        let app = Router::new().route(
            "/",
            get(|headers: axum::http::HeaderMap| async move {
                let ua = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    format!("<html><body><p>{ZH}</p><p>{ua}</p></body></html>"),
                )
            }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let doc = fetcher
            .fetch(&FetchRequest::new(format!("http://{addr}/")))
            .await
            .unwrap();
        assert_eq!(doc.status, 200);
        assert_eq!(doc.encoding, "UTF-8");
        assert_eq!(doc.declared_charset.as_deref(), Some("utf-8"));
        assert!(doc.text.contains(ZH));
        assert!(doc.text.contains("Mozilla/5.0"), "body={}", doc.text);
        assert!(!doc.truncated);
    }

    #[tokio::test]
    async fn fetch_ignores_wrong_declared_charset() {
        // GBK bytes served with a utf-8 label: the label is wrong, the content decides.
        let body = format!("<html><body><article>{}</article></body></html>", ZH.repeat(8));
        let (gbk, _, _) = encoding_rs::GBK.encode(&body);
        let gbk = gbk.into_owned();
        let app = Router::new().route(
            "/",
            get(move || {
                let gbk = gbk.clone();
                async move { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], gbk) }
            }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let doc = fetcher
            .fetch(&FetchRequest::new(format!("http://{addr}/")))
            .await
            .unwrap();
        assert_eq!(doc.encoding, "GBK");
        assert!(doc.text.contains(ZH));
    }

    #[tokio::test]
    async fn fetch_fails_on_non_success_status() {
        let app = Router::new().route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "<html><body><p>没有</p></body></html>") }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let err = fetcher
            .fetch(&FetchRequest::new(format!("http://{addr}/missing")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_error");
        assert!(err.to_string().contains("404"), "err={err}");
    }

    #[tokio::test]
    async fn fetch_times_out_without_retry() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let mut req = FetchRequest::new(format!("http://{addr}/slow"));
        req.timeout_ms = Some(200);
        let t0 = std::time::Instant::now();
        let err = fetcher.fetch(&req).await.unwrap_err();
        assert_eq!(err.kind(), "network_error");
        assert!(t0.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn fetch_reports_connection_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = LocalFetcher::new().unwrap();
        let mut req = FetchRequest::new(format!("http://{addr}/"));
        req.timeout_ms = Some(2_000);
        let err = fetcher.fetch(&req).await.unwrap_err();
        assert_eq!(err.kind(), "network_error");
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_url_before_sending() {
        let fetcher = LocalFetcher::new().unwrap();
        let err = fetcher
            .fetch(&FetchRequest::new("www.example.com/no-scheme"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "network_error");
        assert!(err.to_string().contains("invalid url"));
    }

    #[tokio::test]
    async fn fetch_truncates_at_max_bytes_and_forwards_extra_headers() {
        let app = Router::new().route(
            "/",
            get(|headers: axum::http::HeaderMap| async move {
                let lang = headers
                    .get(header::ACCEPT_LANGUAGE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                format!("{lang}:{}", "x".repeat(10_000))
            }),
        );
        let addr = serve(app).await;

        let fetcher = LocalFetcher::new().unwrap();
        let mut req = FetchRequest::new(format!("http://{addr}/"));
        req.max_bytes = Some(100);
        req.headers
            .insert("Accept-Language".to_string(), "zh-CN".to_string());
        let doc = fetcher.fetch(&req).await.unwrap();
        assert!(doc.truncated);
        assert_eq!(doc.text.len(), 100);
        assert!(doc.text.starts_with("zh-CN:"));
    }
}
