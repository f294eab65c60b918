//! Mock release registry for tests. The servers run on a runtime owned by the
//! fixture, so the blocking client can be driven from the test thread.

use axum::Router;
use axum::body::Body;
use axum::routing::get;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::release::GITHUB_ACCEPT;

pub struct Registry {
    server: MockServer,
    rt: tokio::runtime::Runtime,
}

impl Registry {
    pub fn start() -> Self {
        let rt = tokio::runtime::Runtime::new().expect("test runtime");
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    /// `GET /repos/{owner}/{repo}/releases/latest`, only with the GitHub v3
    /// Accept header.
    pub fn latest_release(&self, owner: &str, repo: &str, body: serde_json::Value) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!("/repos/{owner}/{repo}/releases/latest")))
                .and(header("accept", GITHUB_ACCEPT))
                .respond_with(ResponseTemplate::new(200).set_body_json(body)),
        );
    }

    /// Serves `body` with a Content-Length.
    pub fn asset(&self, route: &str, body: Vec<u8>) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(
                    ResponseTemplate::new(200).set_body_raw(body, "application/octet-stream"),
                ),
        );
    }

    pub fn status(&self, route: &str, status: u16) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope")),
        );
    }

    /// Serves `chunks` as a streamed body, so the response is chunked and
    /// carries no Content-Length. Returns the full URL of `route`.
    pub fn streamed_asset(&self, route: &'static str, chunks: Vec<Vec<u8>>) -> String {
        let app = Router::new().route(
            route,
            get(move || {
                let chunks = chunks.clone();
                async move {
                    Body::from_stream(futures_util::stream::iter(
                        chunks.into_iter().map(Ok::<_, std::io::Error>),
                    ))
                }
            }),
        );

        let listener = self
            .rt
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("bind streamed asset listener");
        let addr = listener.local_addr().expect("streamed asset addr");
        self.rt.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}{route}")
    }
}
