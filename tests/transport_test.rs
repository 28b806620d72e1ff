//! Integration tests for the HTTP transport against a local stub server

#[cfg(feature = "http")]
mod http_tests {
    use serde_json::Value;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use wifi_fingerprint_agent::{
        collector::EmitterId,
        config::ServerConfig,
        core::{EmitterSummary, FingerprintBuilder, ScanMode},
        error::EngineError,
        transport::{FingerprintTransport, HttpTransport},
    };

    /// A captured request: path, authorization header and JSON body.
    struct Captured {
        path: String,
        authorization: Option<String>,
        body: Value,
    }

    /// Serve exactly one request with the given status line and body.
    fn serve_once(status: &'static str, response: &'static str) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind stub server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("Failed to accept");
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();

            let mut content_length = 0;
            let mut authorization = None;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    match name.to_ascii_lowercase().as_str() {
                        "content-length" => content_length = value.trim().parse().unwrap(),
                        "authorization" => authorization = Some(value.trim().to_string()),
                        _ => {}
                    }
                }
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{response}",
                response.len()
            )
            .unwrap();
            stream.flush().unwrap();

            Captured {
                path,
                authorization,
                body: serde_json::from_slice(&body).unwrap(),
            }
        });

        (base_url, handle)
    }

    fn fingerprint(mode: ScanMode, location: Option<&str>) -> wifi_fingerprint_agent::Fingerprint {
        FingerprintBuilder::new().build(
            vec![EmitterSummary {
                emitter: EmitterId::from("00:11:22:33:44:55"),
                mean: -61.5,
                std_dev: 2.5,
                samples: 4,
            }],
            mode,
            location.map(str::to_string),
            4,
        )
    }

    #[test]
    fn test_upload_posts_objects_and_lid() {
        let (base_url, server) = serve_once("200 OK", r#"{"x": 3, "y": 7}"#);
        let mut config = ServerConfig::new(base_url);
        config.username = Some("mapper".to_string());
        config.password = Some("secret".to_string());
        let transport = HttpTransport::new(config).expect("Failed to create transport");

        let response = transport
            .submit(&fingerprint(ScanMode::Upload, Some("room-7")))
            .expect("Upload failed");
        assert_eq!(response["x"], 3);

        let captured = server.join().unwrap();
        assert_eq!(captured.path, "/api/v1/accesspoints/");
        assert!(captured
            .authorization
            .as_deref()
            .is_some_and(|a| a.starts_with("Basic ")));
        assert_eq!(captured.body["lid"], "room-7");
        assert_eq!(captured.body["objects"][0]["bssid"], "00:11:22:33:44:55");
        assert_eq!(captured.body["objects"][0]["mean"], -61.5);
        assert_eq!(captured.body["objects"][0]["stddev"], 2.5);
    }

    #[test]
    fn test_query_posts_device_id() {
        let (base_url, server) = serve_once("200 OK", r#"{"location": "Room 7"}"#);
        let transport = HttpTransport::new(ServerConfig::new(base_url)).unwrap();

        let response = transport
            .submit(&fingerprint(ScanMode::Query, None))
            .unwrap();
        assert_eq!(response["location"], "Room 7");

        let captured = server.join().unwrap();
        assert_eq!(captured.path, "/api/v1/locate/");
        assert_eq!(captured.body["device_id"], transport.device_id());
        assert!(captured.body.get("lid").is_none());
        assert!(captured.authorization.is_none());
    }

    #[test]
    fn test_error_status_with_error_body_is_passed_through() {
        let (base_url, server) = serve_once("404 Not Found", r#"{"error": "no match"}"#);
        let transport = HttpTransport::new(ServerConfig::new(base_url)).unwrap();

        let response = transport
            .submit(&fingerprint(ScanMode::Query, None))
            .unwrap();
        assert_eq!(response["error"], "no match");
        server.join().unwrap();
    }

    #[test]
    fn test_server_error_is_transport_failure() {
        let (base_url, server) = serve_once("500 Internal Server Error", "oops");
        let transport = HttpTransport::new(ServerConfig::new(base_url)).unwrap();

        let result = transport.submit(&fingerprint(ScanMode::Query, None));
        assert!(matches!(result, Err(EngineError::Transport(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_undecodable_success_body_is_protocol_error() {
        let (base_url, server) = serve_once("200 OK", "not json");
        let transport = HttpTransport::new(ServerConfig::new(base_url)).unwrap();

        let result = transport.submit(&fingerprint(ScanMode::Upload, Some("lab")));
        assert!(matches!(result, Err(EngineError::Protocol(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_server_is_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let transport =
            HttpTransport::new(ServerConfig::new(format!("http://127.0.0.1:{port}"))).unwrap();

        let result = transport.submit(&fingerprint(ScanMode::Query, None));
        assert!(matches!(result, Err(EngineError::Transport(_))));
    }
}
