use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::Value;
use tower::ServiceExt;

async fn test_app() -> (Router, ApiContext) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext::new(storage);
    let app = build_router(Arc::new(AppState { api: api.clone() }), 64 * 1024);
    (app, api)
}

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn store_request(code: &str, name: &str) -> Request<Body> {
    Request::post("/admin/catalog/families/create")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "code": code,
                "name": name,
                "attribute_groups": [
                    { "name": "General", "custom_attributes": [{ "id": 1 }, { "id": 2 }] }
                ]
            })
            .to_string(),
        ))
        .expect("request")
}

async fn family_id(api: &ApiContext, code: &str) -> i64 {
    api.storage
        .find_family_by_code(code)
        .await
        .expect("lookup")
        .expect("family exists")
        .id
        .0
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _api) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn index_serves_page_or_grid_depending_on_ajax_header() {
    let (app, _api) = test_app().await;

    let page = app
        .clone()
        .oneshot(
            Request::get("/admin/catalog/families")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(json_body(page).await["view"], catalog_api::INDEX_VIEW);

    let grid = app
        .oneshot(
            Request::get("/admin/catalog/families?sort=code&order=asc&per_page=5")
                .header("x-requested-with", "XMLHttpRequest")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(grid.status(), StatusCode::OK);
    let grid = json_body(grid).await;
    assert_eq!(grid["records"][0]["code"], "default");
    assert_eq!(grid["meta"]["per_page"], 5);
    assert_eq!(grid["meta"]["sort"], "code");
}

#[tokio::test]
async fn create_form_binds_default_family_and_attributes() {
    let (app, _api) = test_app().await;
    let response = app
        .oneshot(
            Request::get("/admin/catalog/families/create")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let view = json_body(response).await;
    assert_eq!(view["view"], catalog_api::CREATE_VIEW);
    assert_eq!(view["data"]["attributeFamily"]["code"], "default");
    assert!(view["data"]["customAttributes"]
        .as_array()
        .expect("attributes")
        .iter()
        .any(|a| a["code"] == "sku" && a["type"] == "text"));
}

#[tokio::test]
async fn store_redirects_to_listing_with_success_flash() {
    let (app, api) = test_app().await;
    let response = app
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        families_index_route()
    );

    let body = json_body(response).await;
    assert_eq!(body["flash"]["level"], "success");
    assert_eq!(body["flash"]["message"], catalog_api::messages::CREATE_SUCCESS);
    assert!(api
        .storage
        .find_family_by_code("shoes")
        .await
        .expect("lookup")
        .is_some());
}

#[tokio::test]
async fn store_with_duplicate_code_is_unprocessable() {
    let (app, api) = test_app().await;
    let response = app
        .oneshot(store_request("default", "Default again"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = json_body(response).await;
    assert_eq!(body["code"], "validation");
    assert_eq!(
        body["errors"]["code"][0],
        catalog_api::messages::CODE_TAKEN
    );
    assert_eq!(api.storage.count_families().await.expect("count"), 1);
}

#[tokio::test]
async fn edit_unknown_family_is_not_found() {
    let (app, _api) = test_app().await;
    let response = app
        .oneshot(
            Request::get("/admin/catalog/families/edit/9999")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_family_id_is_json_not_found() {
    let (app, _api) = test_app().await;
    for request in [
        Request::get("/admin/catalog/families/edit/abc"),
        Request::delete("/admin/catalog/families/edit/abc"),
    ] {
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "not_found");
    }
}

#[tokio::test]
async fn update_with_own_code_redirects() {
    let (app, api) = test_app().await;
    app.clone()
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("store");
    let id = family_id(&api, "shoes").await;

    let response = app
        .oneshot(
            Request::put(format!("/admin/catalog/families/edit/{id}"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "code": "shoes", "name": "Sneakers" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        json_body(response).await["flash"]["message"],
        catalog_api::messages::UPDATE_SUCCESS
    );
}

#[tokio::test]
async fn destroy_maps_guards_to_bad_request() {
    let (app, api) = test_app().await;
    let default_id = family_id(&api, "default").await;

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/admin/catalog/families/edit/{default_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        catalog_api::messages::LAST_DELETE_ERROR
    );

    app.clone()
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("store");
    let shoes = family_id(&api, "shoes").await;

    let response = app
        .oneshot(
            Request::delete(format!("/admin/catalog/families/edit/{shoes}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["message"],
        catalog_api::messages::DELETE_SUCCESS
    );
}

#[tokio::test]
async fn mass_delete_with_get_flashes_error_and_goes_back() {
    let (app, api) = test_app().await;
    app.clone()
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("store");
    let shoes = family_id(&api, "shoes").await;

    let response = app
        .oneshot(
            Request::get("/admin/catalog/families/mass-delete")
                .header(header::REFERER, "/admin/catalog/families?page=2")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/admin/catalog/families?page=2"
    );
    let body = json_body(response).await;
    assert_eq!(body["flash"]["level"], "error");
    assert!(api
        .storage
        .find_family(AttributeFamilyId(shoes))
        .await
        .expect("lookup")
        .is_some());
}

#[tokio::test]
async fn mass_delete_form_post_without_override_flashes_error() {
    let (app, api) = test_app().await;
    app.clone()
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("store");
    let shoes = family_id(&api, "shoes").await;

    let response = app
        .oneshot(
            Request::post("/admin/catalog/families/mass-delete")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(format!("indexes={shoes}")))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let body = json_body(response).await;
    assert_eq!(body["flash"]["level"], "error");
    assert_eq!(
        body["flash"]["message"],
        catalog_api::messages::MASS_METHOD_ERROR
    );
    assert_eq!(api.storage.count_families().await.expect("count"), 2);
}

#[tokio::test]
async fn mass_delete_form_post_with_override_deletes() {
    let (app, api) = test_app().await;
    app.clone()
        .oneshot(store_request("shoes", "Shoes"))
        .await
        .expect("store");
    let shoes = family_id(&api, "shoes").await;

    let response = app
        .oneshot(
            Request::post("/admin/catalog/families/mass-delete")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(format!("_method=delete&indexes={shoes}")))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        json_body(response).await["flash"]["message"],
        catalog_api::messages::MASS_DELETE_SUCCESS
    );
    assert!(api
        .storage
        .find_family(AttributeFamilyId(shoes))
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn mass_delete_with_put_ignores_unreadable_body() {
    let (app, api) = test_app().await;
    let response = app
        .oneshot(
            Request::put("/admin/catalog/families/mass-delete")
                .header("content-type", "text/plain")
                .body(Body::from("not json"))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(json_body(response).await["flash"]["level"], "error");
    assert_eq!(api.storage.count_families().await.expect("count"), 1);
}

#[tokio::test]
async fn mass_delete_reports_partial_failure() {
    let (app, api) = test_app().await;
    for code in ["alpha", "bravo", "charlie"] {
        app.clone()
            .oneshot(store_request(code, code))
            .await
            .expect("store");
    }
    let a = family_id(&api, "alpha").await;
    let b = family_id(&api, "bravo").await;
    let c = family_id(&api, "charlie").await;
    api.storage
        .create_product("bravo-1", AttributeFamilyId(b))
        .await
        .expect("product");

    let response = app
        .oneshot(
            Request::delete("/admin/catalog/families/mass-delete")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "indexes": format!("{a},{b},{c}") }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        families_index_route()
    );
    let body = json_body(response).await;
    assert_eq!(body["flash"]["level"], "info");
    assert_eq!(
        body["flash"]["message"],
        catalog_api::messages::MASS_PARTIAL_ACTION
    );
    assert_eq!(api.storage.count_families().await.expect("count"), 2);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let app = build_router(
        Arc::new(AppState {
            api: ApiContext::new(storage),
        }),
        16,
    );
    let payload = serde_json::json!({ "code": "shoes", "name": "Shoes" }).to_string();
    let request = Request::post("/admin/catalog/families/create")
        .header("content-type", "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
