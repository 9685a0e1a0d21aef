use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use jotter::auth::AuthService;
use jotter::server::{router, AppState};
use jotter::store::NoteStore;

// Full-strength PBKDF2 would make the suite crawl.
const TEST_ROUNDS: u32 = 1_000;

pub struct TestServer {
    pub url: String,
    #[allow(dead_code)]
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        let store = Arc::new(NoteStore::open_in_memory().unwrap());
        let auth = Arc::new(AuthService::new(
            store.clone(),
            "integration-test-secret",
            30,
            TEST_ROUNDS,
        ));
        let app = router(
            AppState { store, auth },
            &["http://localhost:3000".to_string()],
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            url: format!("http://{addr}"),
            addr,
        }
    }
}
