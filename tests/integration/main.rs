//! Integration tests for repoprobe

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn repoprobe(config: &std::path::Path) -> Command {
        let mut cmd = cargo_bin_cmd!("repoprobe");
        cmd.env("REPOPROBE_CONFIG", config);
        cmd
    }

    /// Temp dir holding a config file whose cache lives next to it
    fn workspace(extra: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        let config = dir.path().join("config.toml");
        fs::write(
            &config,
            format!(
                "[cache]\ndir = {:?}\n{}",
                cache.display().to_string(),
                extra
            ),
        )
        .unwrap();
        (dir, config)
    }

    #[test]
    fn help_displays() {
        let (_dir, config) = workspace("");
        repoprobe(&config)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("caching reverse proxy"));
    }

    #[test]
    fn version_displays() {
        let (_dir, config) = workspace("");
        repoprobe(&config)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("repoprobe"));
    }

    #[test]
    fn config_path() {
        let (_dir, config) = workspace("");
        repoprobe(&config)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_masks_passwords() {
        let (_dir, config) = workspace(
            r#"
[[repositories]]
name = "private"
url = "https://nexus.example.com/maven/"
username = "deploy"
password = "hunter2"
"#,
        );
        repoprobe(&config)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[server]"))
            .stdout(predicate::str::contains("deploy"))
            .stdout(predicate::str::contains("hunter2").not());
    }

    #[test]
    fn config_init_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("nested").join("config.toml");
        repoprobe(&config)
            .args(["config", "init"])
            .assert()
            .success();
        let written = fs::read_to_string(&config).unwrap();
        assert!(written.contains("[http]"));
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "[server]\nport = \"not a number\"\n").unwrap();
        repoprobe(&config)
            .args(["cache", "path"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_path_uses_config() {
        let (dir, config) = workspace("");
        repoprobe(&config)
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                dir.path().join("cache").display().to_string(),
            ));
    }

    #[test]
    fn cache_list_empty_json() {
        let (_dir, config) = workspace("");
        repoprobe(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn cache_show_missing_record() {
        let (_dir, config) = workspace("");
        repoprobe(&config)
            .args(["cache", "show", "org/example/lib/1.0/lib-1.0.jar"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No cache record"));
    }

    #[test]
    fn cache_show_reads_legacy_record() {
        let (dir, config) = workspace("");
        let cache = dir.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        let path = "org/example/lib/1.0/lib-1.0.jar";
        fs::write(
            cache.join(repoprobe::cache::record::record_file_name(path)),
            r#"{"target":"org/example/lib/1.0/lib-1.0.jar","url":"https://h1/org/example/lib/1.0/lib-1.0.jar","sha1":"abc","found":true,"headers":{}}"#,
        )
        .unwrap();

        repoprobe(&config)
            .args(["cache", "show", path])
            .assert()
            .success()
            .stdout(predicate::str::contains("https://h1/org/example/lib/1.0/lib-1.0.jar"));

        repoprobe(&config)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(path));
    }
}

mod proxy_tests {
    use axum::body::{Body, Bytes};
    use axum::extract::State;
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use repoprobe::cache::record::record_file_name;
    use repoprobe::cache::{ResolutionCache, ResolutionRecord};
    use repoprobe::config::schema::{HttpConfig, RepositoryConfig};
    use repoprobe::config::Config;
    use repoprobe::proxy::{ProxyContext, ProxyServer};
    use repoprobe::realm::{basic_auth_value, AuthRealmRegistry};
    use repoprobe::upstream::{Upstream as _, UreqUpstream};
    use std::collections::{BTreeMap, HashMap};
    use std::io::Read;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use ureq::{Agent, RequestBuilder};

    const JAR: &str = "org/example/lib/1.0/lib-1.0.jar";
    const JAR_SHA1: &str = "org/example/lib/1.0/lib-1.0.jar.sha1";
    const SOURCES: &str = "org/example/lib/1.0/lib-1.0-sources.jar";
    const JAR_BYTES: &[u8] = b"PK\x03\x04 not really a jar";
    const CHECKSUM: &str = "2c26b46b68ffc68ff99b453c1d30413413422d70";

    struct File {
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    }

    /// In-memory Maven repository served over HTTP
    #[derive(Default)]
    struct MockRepo {
        files: HashMap<String, File>,
        authorization: Option<String>,
        hits: Mutex<Vec<(String, String)>>,
    }

    impl MockRepo {
        fn with_jar(mut self) -> Self {
            self.files.insert(
                JAR.to_string(),
                File {
                    headers: vec![("etag", "\"lib-1.0\"".to_string())],
                    body: JAR_BYTES.to_vec(),
                },
            );
            self.files.insert(
                JAR_SHA1.to_string(),
                File {
                    headers: Vec::new(),
                    body: CHECKSUM.as_bytes().to_vec(),
                },
            );
            self
        }

        fn without(mut self, path: &str) -> Self {
            self.files.remove(path);
            self
        }

        fn requiring(mut self, username: &str, password: &str) -> Self {
            self.authorization = Some(basic_auth_value(username, password));
            self
        }

        fn hits(&self, method: &str, path: &str) -> usize {
            self.hits
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, p)| m == method && p == path)
                .count()
        }

        fn total_hits(&self) -> usize {
            self.hits.lock().unwrap().len()
        }
    }

    async fn mock_handler(
        State(repo): State<Arc<MockRepo>>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
    ) -> Response {
        let path = uri.path().trim_start_matches('/').to_string();
        repo.hits
            .lock()
            .unwrap()
            .push((method.to_string(), path.clone()));

        if let Some(expected) = &repo.authorization {
            if headers.get_all(AUTHORIZATION).iter().count() != 1 {
                return StatusCode::BAD_REQUEST.into_response();
            }
            let given = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
            if given != Some(expected.as_str()) {
                return StatusCode::UNAUTHORIZED.into_response();
            }
        }

        match repo.files.get(&path) {
            Some(file) => {
                let mut response = (StatusCode::OK, file.body.clone()).into_response();
                for (name, value) in &file.headers {
                    response
                        .headers_mut()
                        .insert(*name, HeaderValue::from_str(value).unwrap());
                }
                response
            }
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }

    /// Serve `repo` on an ephemeral port and return its base URL
    async fn serve_repo(repo: Arc<MockRepo>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(mock_handler).with_state(repo);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    struct Upstream<'a> {
        name: &'a str,
        url: String,
        credentials: Option<(&'a str, &'a str)>,
    }

    async fn start_proxy(upstreams: &[Upstream<'_>], cache_dir: &Path) -> ProxyServer {
        let mut config = Config::default();
        for upstream in upstreams {
            config.repositories.push(RepositoryConfig {
                name: upstream.name.to_string(),
                url: upstream.url.clone(),
                username: upstream.credentials.map(|(u, _)| u.to_string()),
                password: upstream.credentials.map(|(_, p)| p.to_string()),
            });
        }

        let context = ProxyContext::from_config(&config, Some(cache_dir.to_path_buf())).unwrap();
        let mut server = ProxyServer::with_port(Arc::new(context), 0);
        server.start().await.unwrap();
        server
    }

    struct Reply {
        status: u16,
        headers: ureq::http::HeaderMap,
        body: Vec<u8>,
    }

    impl Reply {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).and_then(|v| v.to_str().ok())
        }
    }

    /// Issue a request the way a build tool would, without following redirects
    async fn send(method: &'static str, url: String) -> Reply {
        send_with(method, url, Vec::new()).await
    }

    fn with_headers<B>(
        mut request: RequestBuilder<B>,
        headers: &[(&'static str, String)],
    ) -> RequestBuilder<B> {
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        request
    }

    async fn send_with(
        method: &'static str,
        url: String,
        headers: Vec<(&'static str, String)>,
    ) -> Reply {
        tokio::task::spawn_blocking(move || {
            let config = Agent::config_builder()
                .http_status_as_error(false)
                .max_redirects(0)
                .build();
            let agent = Agent::new_with_config(config);

            let mut response = match method {
                "HEAD" => with_headers(agent.head(&url), &headers).call(),
                "GET" => with_headers(agent.get(&url), &headers).call(),
                "POST" => with_headers(agent.post(&url), &headers).send_empty(),
                other => panic!("unsupported method {other}"),
            }
            .unwrap();

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = if method == "HEAD" {
                Vec::new()
            } else {
                response.body_mut().read_to_vec().unwrap()
            };
            Reply {
                status,
                headers,
                body,
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn head_is_answered_from_cache_after_first_probe() {
        let repo = Arc::new(MockRepo::default().with_jar());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url: url.clone(),
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        let first = send("HEAD", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(first.status, 200);
        assert_eq!(first.header("etag"), Some("\"lib-1.0\""));

        let second = send("HEAD", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(second.status, 200);
        assert_eq!(second.header("etag"), Some("\"lib-1.0\""));

        assert_eq!(repo.hits("HEAD", JAR), 1);
        assert_eq!(repo.hits("GET", JAR_SHA1), 1);

        let record = ResolutionCache::open(cache.path())
            .unwrap()
            .get(JAR)
            .unwrap()
            .unwrap();
        assert!(record.found);
        assert_eq!(record.resolved_url, format!("{}{}", url, JAR));
        assert_eq!(record.checksum, CHECKSUM);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn get_redirects_to_first_repository_holding_the_artifact() {
        let empty = Arc::new(MockRepo::default());
        let first = Arc::new(MockRepo::default().with_jar());
        let second = Arc::new(MockRepo::default().with_jar());
        let empty_url = serve_repo(Arc::clone(&empty)).await;
        let first_url = serve_repo(Arc::clone(&first)).await;
        let second_url = serve_repo(Arc::clone(&second)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[
                Upstream {
                    name: "empty",
                    url: empty_url,
                    credentials: None,
                },
                Upstream {
                    name: "first",
                    url: first_url.clone(),
                    credentials: None,
                },
                Upstream {
                    name: "second",
                    url: second_url,
                    credentials: None,
                },
            ],
            cache.path(),
        )
        .await;

        let reply = send("GET", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(reply.status, 302);
        assert_eq!(
            reply.header("location"),
            Some(format!("{}{}", first_url, JAR).as_str())
        );

        assert_eq!(empty.hits("HEAD", JAR), 1);
        assert_eq!(first.hits("HEAD", JAR), 1);
        assert_eq!(second.total_hits(), 0);

        // Served from the record; nobody is asked again
        let again = send("GET", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(again.status, 302);
        assert_eq!(empty.total_hits(), 1);
        assert_eq!(first.hits("HEAD", JAR), 1);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn checksum_is_served_from_cache() {
        let repo = Arc::new(MockRepo::default().with_jar());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url,
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        assert_eq!(
            send("HEAD", format!("{}/{}", proxy.endpoint(), JAR))
                .await
                .status,
            200
        );

        let reply = send("GET", format!("{}/{}", proxy.endpoint(), JAR_SHA1)).await;
        assert_eq!(reply.status, 200);
        assert_eq!(String::from_utf8(reply.body).unwrap(), CHECKSUM);
        assert_eq!(repo.hits("GET", JAR_SHA1), 1);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn missing_sources_are_remembered() {
        let repo = Arc::new(MockRepo::default().with_jar());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url,
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        let first = send("GET", format!("{}/{}", proxy.endpoint(), SOURCES)).await;
        assert_eq!(first.status, 404);
        let second = send("GET", format!("{}/{}", proxy.endpoint(), SOURCES)).await;
        assert_eq!(second.status, 404);

        assert_eq!(repo.hits("HEAD", SOURCES), 1);

        let record = ResolutionCache::open(cache.path())
            .unwrap()
            .get(SOURCES)
            .unwrap()
            .unwrap();
        assert!(!record.found);
        assert!(record.resolved_url.is_empty());

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unknown_artifact_is_reprobed() {
        let repo = Arc::new(MockRepo::default());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url,
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        assert_eq!(
            send("GET", format!("{}/{}", proxy.endpoint(), JAR))
                .await
                .status,
            404
        );
        assert_eq!(
            send("HEAD", format!("{}/{}", proxy.endpoint(), JAR))
                .await
                .status,
            404
        );
        assert_eq!(repo.hits("HEAD", JAR), 2);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn authenticated_repository_is_streamed_through() {
        let repo = Arc::new(
            MockRepo::default()
                .with_jar()
                .requiring("deploy", "s3cret"),
        );
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "private",
                url,
                credentials: Some(("deploy", "s3cret")),
            }],
            cache.path(),
        )
        .await;

        let reply = send("GET", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, JAR_BYTES);
        assert_eq!(
            reply.header("content-length"),
            Some(JAR_BYTES.len().to_string().as_str())
        );
        assert!(reply.header("location").is_none());

        assert_eq!(repo.hits("HEAD", JAR), 1);
        assert_eq!(repo.hits("GET", JAR), 1);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn missing_checksum_is_a_gateway_error() {
        let repo = Arc::new(MockRepo::default().with_jar().without(JAR_SHA1));
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url,
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        let reply = send("GET", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(reply.status, 502);
        assert!(ResolutionCache::open(cache.path())
            .unwrap()
            .get(JAR)
            .unwrap()
            .is_none());

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn other_methods_are_rejected() {
        let repo = Arc::new(MockRepo::default().with_jar());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "central",
                url,
                credentials: None,
            }],
            cache.path(),
        )
        .await;

        let reply = send("POST", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(reply.status, 405);
        assert_eq!(repo.total_hits(), 0);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn records_survive_a_restart() {
        let repo = Arc::new(MockRepo::default().with_jar());
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let upstreams = [Upstream {
            name: "central",
            url: url.clone(),
            credentials: None,
        }];

        let mut proxy = start_proxy(&upstreams, cache.path()).await;
        assert_eq!(
            send("GET", format!("{}/{}", proxy.endpoint(), JAR))
                .await
                .status,
            302
        );
        proxy.stop().await.unwrap();
        assert!(!proxy.is_running());

        let mut restarted = start_proxy(&upstreams, cache.path()).await;
        let reply = send("GET", format!("{}/{}", restarted.endpoint(), JAR)).await;
        assert_eq!(reply.status, 302);
        assert_eq!(
            reply.header("location"),
            Some(format!("{}{}", url, JAR).as_str())
        );
        assert_eq!(repo.hits("HEAD", JAR), 1);

        restarted.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn realm_credentials_replace_client_authorization() {
        let repo = Arc::new(
            MockRepo::default()
                .with_jar()
                .requiring("deploy", "s3cret"),
        );
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();
        let mut proxy = start_proxy(
            &[Upstream {
                name: "private",
                url,
                credentials: Some(("deploy", "s3cret")),
            }],
            cache.path(),
        )
        .await;

        let reply = send_with(
            "HEAD",
            format!("{}/{}", proxy.endpoint(), JAR),
            vec![("authorization", basic_auth_value("guest", "guest"))],
        )
        .await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("etag"), Some("\"lib-1.0\""));
        assert_eq!(repo.hits("HEAD", JAR), 1);

        proxy.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rejected_credentials_are_relayed_without_body() {
        let repo = Arc::new(
            MockRepo::default()
                .with_jar()
                .requiring("deploy", "s3cret"),
        );
        let url = serve_repo(Arc::clone(&repo)).await;
        let cache = TempDir::new().unwrap();

        // Resolved earlier, before the password was rotated upstream
        let record = ResolutionRecord::found(
            JAR,
            format!("{}{}", url, JAR),
            CHECKSUM,
            BTreeMap::new(),
        );
        std::fs::write(
            cache.path().join(record_file_name(JAR)),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();

        let mut proxy = start_proxy(
            &[Upstream {
                name: "private",
                url,
                credentials: Some(("deploy", "expired")),
            }],
            cache.path(),
        )
        .await;

        let reply = send("GET", format!("{}/{}", proxy.endpoint(), JAR)).await;
        assert_eq!(reply.status, 401);
        assert!(reply.body.is_empty());
        assert!(reply.header("location").is_none());
        assert_eq!(repo.hits("HEAD", JAR), 0);
        assert_eq!(repo.hits("GET", JAR), 1);

        proxy.stop().await.unwrap();
    }

    /// Ten 10-byte chunks, 100ms apart
    async fn slow_body() -> Response {
        let chunks = futures_util::stream::unfold(0u8, |sent| async move {
            if sent == 10 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            Some((
                Ok::<_, std::io::Error>(Bytes::from_static(b"0123456789")),
                sent + 1,
            ))
        });
        Response::new(Body::from_stream(chunks))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_body_outlasting_read_timeout_is_streamed_completely() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/slow.jar", get(slow_body));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = format!("http://{}/slow.jar", addr);
        let body = tokio::task::spawn_blocking(move || {
            let upstream = UreqUpstream::new(
                &HttpConfig {
                    connect_timeout_ms: 1000,
                    read_timeout_ms: 400,
                },
                Arc::new(AuthRealmRegistry::new()),
            );
            let mut passthrough = upstream.open(&url).unwrap();
            assert_eq!(passthrough.status, 200);
            let mut body = Vec::new();
            passthrough.body.read_to_end(&mut body).unwrap();
            body
        })
        .await
        .unwrap();

        assert_eq!(body.len(), 100);
        assert!(body.starts_with(b"0123456789"));
    }
}
