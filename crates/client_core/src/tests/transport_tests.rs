use super::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use shared::protocol::{ExtensionListResponse, EXTENSIONS_ROUTE};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct ServerState {
    items: Arc<Mutex<Vec<RawExtensionItem>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    reject_writes: bool,
}

async fn handle_list(State(state): State<ServerState>) -> Json<ExtensionListResponse> {
    Json(ExtensionListResponse {
        items: state.items.lock().await.clone(),
    })
}

async fn handle_add(
    State(state): State<ServerState>,
    Json(item): Json<RawExtensionItem>,
) -> StatusCode {
    if state.reject_writes {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.items.lock().await.push(item);
    StatusCode::CREATED
}

async fn handle_delete(
    State(state): State<ServerState>,
    Path(ext_name): Path<String>,
) -> StatusCode {
    state.deleted.lock().await.push(ext_name.clone());
    if state.reject_writes {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut items = state.items.lock().await;
    let before = items.len();
    items.retain(|item| item.ext_name != ext_name);
    if items.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn spawn_store_server(state: ServerState) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route(EXTENSIONS_ROUTE, get(handle_list).post(handle_add))
        .route(
            &format!("{EXTENSIONS_ROUTE}/:ext_name"),
            delete(handle_delete),
        )
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}{EXTENSIONS_ROUTE}"))
}

async fn spawn_broken_server() -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route(
        EXTENSIONS_ROUTE,
        get(|| async { (StatusCode::OK, "{\"unexpected\": true}") }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}{EXTENSIONS_ROUTE}"))
}

fn ext(raw: &str) -> ExtensionName {
    ExtensionName::parse(raw).expect("valid extension")
}

#[test]
fn item_url_appends_encoded_segment() {
    let store = HttpExtensionStore::new("http://localhost:8080/api/fix/extensions/").expect("url");
    assert_eq!(
        store.item_url(&ext("exe")).as_str(),
        "http://localhost:8080/api/fix/extensions/exe"
    );

    let store = HttpExtensionStore::new("http://localhost:8080/api/fix/extensions").expect("url");
    assert_eq!(
        store.item_url(&ext("tar")).as_str(),
        "http://localhost:8080/api/fix/extensions/tar"
    );
}

#[test]
fn rejects_unusable_base_url() {
    assert!(matches!(
        HttpExtensionStore::new("not a url"),
        Err(StoreError::InvalidUrl { .. })
    ));
    assert!(matches!(
        HttpExtensionStore::new("mailto:admin@example.com"),
        Err(StoreError::InvalidUrl { .. })
    ));
}

#[tokio::test]
async fn http_store_round_trips_against_server() {
    let state = ServerState::default();
    let base_url = spawn_store_server(state.clone()).await.expect("spawn server");
    let store = HttpExtensionStore::new(&base_url).expect("store");

    store
        .add(&ExtensionItem::fixed(ext("exe")))
        .await
        .expect("add fixed");
    store
        .add(&ExtensionItem::custom(ext("foo")))
        .await
        .expect("add custom");

    let items = store.fetch_all().await.expect("fetch");
    assert_eq!(
        items,
        vec![
            RawExtensionItem {
                ext_name: "exe".to_string(),
                ext_type: ExtType::Fixed,
            },
            RawExtensionItem {
                ext_name: "foo".to_string(),
                ext_type: ExtType::Custom,
            },
        ]
    );

    store.remove(&ext("foo")).await.expect("remove");
    assert_eq!(*state.deleted.lock().await, vec!["foo".to_string()]);
    assert_eq!(state.items.lock().await.len(), 1);
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let state = ServerState {
        reject_writes: true,
        ..ServerState::default()
    };
    let base_url = spawn_store_server(state).await.expect("spawn server");
    let store = HttpExtensionStore::new(&base_url).expect("store");

    let err = store
        .add(&ExtensionItem::custom(ext("foo")))
        .await
        .expect_err("must fail");
    assert!(matches!(
        err,
        StoreError::Status { status } if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
    ));

    let err = store.remove(&ext("foo")).await.expect_err("must fail");
    assert!(matches!(err, StoreError::Status { .. }));
}

#[tokio::test]
async fn malformed_snapshot_body_is_a_decode_error() {
    let base_url = spawn_broken_server().await.expect("spawn server");
    let store = HttpExtensionStore::new(&base_url).expect("store");

    let err = store.fetch_all().await.expect_err("must fail");
    assert!(matches!(err, StoreError::Decode(_)));
}

#[tokio::test]
async fn unreachable_store_degrades_to_empty_blocklist() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let settings = ControllerSettings {
        base_url: format!("http://{addr}{EXTENSIONS_ROUTE}"),
        ..ControllerSettings::default()
    };
    let controller = ExtensionSetController::from_settings(&settings).expect("controller");

    let err = controller.load_snapshot().await.expect_err("must fail");
    assert!(matches!(
        err,
        ControllerError::InitialLoad(StoreError::Transport(_))
    ));
    assert_eq!(controller.view().await.count_display, "0/200");
}

#[tokio::test]
async fn controller_stays_in_step_with_http_store() {
    let state = ServerState::default();
    state.items.lock().await.extend([
        RawExtensionItem {
            ext_name: "exe".to_string(),
            ext_type: ExtType::Fixed,
        },
        RawExtensionItem {
            ext_name: "foo".to_string(),
            ext_type: ExtType::Custom,
        },
    ]);
    let base_url = spawn_store_server(state.clone()).await.expect("spawn server");
    let settings = ControllerSettings {
        base_url,
        ..ControllerSettings::default()
    };
    let controller = ExtensionSetController::from_settings(&settings).expect("controller");

    controller.load_snapshot().await.expect("load");
    assert_eq!(controller.view().await.count_display, "1/200");

    controller.add_custom("Bar").await.expect("add");
    controller.remove_custom("foo").await.expect("remove");
    controller
        .set_fixed_membership("exe", false)
        .await
        .expect("uncheck");

    let remote: Vec<String> = state
        .items
        .lock()
        .await
        .iter()
        .map(|item| item.ext_name.clone())
        .collect();
    assert_eq!(remote, vec!["bar".to_string()]);

    // a fresh controller sees the same state
    let reloaded = ExtensionSetController::from_settings(&settings).expect("controller");
    reloaded.load_snapshot().await.expect("reload");
    assert_eq!(
        reloaded.custom_extensions().await,
        controller.custom_extensions().await
    );
    assert!(reloaded.fixed_extensions().await.is_empty());
}
