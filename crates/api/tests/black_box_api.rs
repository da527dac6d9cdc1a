use reqwest::StatusCode;
use serde_json::{Value, json};

use stockroom_api::app::router_for;
use stockroom_infra::InMemoryStore;
use std::sync::Arc;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let app = router_for(Arc::new(InMemoryStore::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        Self::read(res).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        Self::read(res).await
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        Self::read(res).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.delete(self.url(path)).send().await.unwrap();
        Self::read(res).await
    }

    async fn read(res: reqwest::Response) -> (StatusCode, Value) {
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_item(&self, code: &str) -> String {
        let (status, item) = self
            .post(
                "/items",
                json!({ "code": code, "description": format!("Item {code}"), "cost": "2.00", "price": "5.00" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "body={item}");
        item["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn decimal(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.as_f64().unwrap(),
    }
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn purchase_receive_then_sale_send_moves_stock() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    // Purchase: Acme, 10 × 2.00.
    let (status, header) = srv
        .post("/purchases/headers", json!({ "supplier_name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "body={header}");
    assert_eq!(header["code"], "0000000001");
    let purchase_id = header["id"].as_str().unwrap().to_string();

    let (status, detail) = srv
        .post(
            "/purchases/details",
            json!({ "header_id": purchase_id, "item_id": item_id, "quantity": 10, "cost": "2.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body={detail}");
    assert_eq!(decimal(&detail["amount"]), 20.0);

    let (status, received) = srv
        .post(&format!("/purchases/headers/{purchase_id}/receive"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "body={received}");
    assert_eq!(received["status"], "confirmed");

    let (status, entry) = srv.get(&format!("/stock/{item_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["quantity"], 10);

    // Sale: Bob, 3 × 5.00, item given by code.
    let (status, header) = srv
        .post(
            "/sales/headers",
            json!({ "customer_name": "Bob", "customer_phone": "555-0100" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body={header}");
    assert_eq!(header["code"], "0000000001");
    let sale_id = header["id"].as_str().unwrap().to_string();

    let (status, detail) = srv
        .post(
            "/sales/details",
            json!({ "header_id": sale_id, "item": "X", "quantity": 3, "price": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body={detail}");
    assert_eq!(decimal(&detail["amount"]), 15.0);

    let (status, _) = srv
        .post(&format!("/sales/headers/{sale_id}/send"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, levels) = srv.get("/stock").await;
    let levels = levels.as_array().unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[0]["item_code"], "X");
    assert_eq!(levels[0]["quantity"], 7);
}

#[tokio::test]
async fn confirmed_orders_are_frozen() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    let (_, header) = srv
        .post("/purchases/headers", json!({ "supplier_name": "Acme" }))
        .await;
    let id = header["id"].as_str().unwrap().to_string();
    let (_, detail) = srv
        .post(
            "/purchases/details",
            json!({ "header_id": id, "item_id": item_id, "quantity": 1, "cost": 1 }),
        )
        .await;
    let detail_id = detail["id"].as_str().unwrap().to_string();

    let (status, _) = srv.post(&format!("/purchases/headers/{id}/receive"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = srv.post(&format!("/purchases/headers/{id}/receive"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_confirmed");

    let (status, _) = srv
        .put(
            &format!("/purchases/details/{detail_id}"),
            json!({ "item_id": item_id, "quantity": 5, "cost": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = srv.delete(&format!("/purchases/details/{detail_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = srv.delete(&format!("/purchases/headers/{id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, entry) = srv.get(&format!("/stock/{item_id}")).await;
    assert_eq!(entry["quantity"], 1);
}

#[tokio::test]
async fn draft_header_can_be_edited_and_deleted() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    let (_, header) = srv
        .post("/sales/headers", json!({ "customer_name": "Bob" }))
        .await;
    let id = header["id"].as_str().unwrap().to_string();

    let (status, updated) = srv
        .put(
            &format!("/sales/headers/{id}"),
            json!({ "code": "42", "customer_name": "Robert" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body={updated}");
    assert_eq!(updated["code"], "0000000042");

    let (status, found) = srv.get("/sales/headers/code/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], id.as_str());

    let (status, found) = srv.get("/sales/headers/search?customer=rob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found.as_array().unwrap().len(), 1);

    srv.post(
        "/sales/details",
        json!({ "header_id": id, "item_id": item_id, "quantity": 2, "price": "5.00" }),
    )
    .await;
    let (status, view) = srv.get(&format!("/sales/headers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["details"][0]["item_code"], "X");

    let (status, _) = srv.delete(&format!("/sales/headers/{id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = srv.get(&format!("/sales/headers/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn bad_input_is_rejected() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    let (status, body) = srv.get("/purchases/headers/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, _) = srv
        .post("/purchases/headers", json!({ "supplier_name": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, header) = srv
        .post("/purchases/headers", json!({ "supplier_name": "Acme" }))
        .await;
    let id = header["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            "/purchases/details",
            json!({ "header_id": id, "item_id": item_id, "quantity": 0, "cost": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv
        .post(
            "/purchases/details",
            json!({ "header_id": id, "item": "UNKNOWN", "quantity": 1, "cost": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv
        .put(&format!("/purchases/headers/{id}"), json!({ "supplier_name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stock_can_be_adjusted_by_hand() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    let (status, _) = srv.get(&format!("/stock/{item_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, entry) = srv.put(&format!("/stock/{item_id}"), json!({ "delta": -4 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["quantity"], -4);

    let (status, entry) = srv.put(&format!("/stock/{item_id}"), json!({ "quantity": 6 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["quantity"], 2);

    let (status, level) = srv.get(&format!("/stock/{item_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["quantity"], 2);
    assert_eq!(level["item_code"], "X");
    assert_eq!(level["item_description"], "Item X");

    let (status, _) = srv.put(&format!("/stock/{item_id}"), json!({ "delta": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn items_can_be_updated_and_deleted() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;
    let other_id = srv.create_item("Y").await;

    let (status, item) = srv
        .put(
            &format!("/items/{item_id}"),
            json!({ "code": "X-2", "description": "Renamed", "cost": "3.00", "price": "7.00", "active": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body={item}");
    assert_eq!(item["code"], "X-2");
    assert_eq!(item["active"], false);

    let (status, found) = srv.get("/items/code/X-2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], item_id.as_str());

    let (status, body) = srv
        .put(
            &format!("/items/{item_id}"),
            json!({ "code": "Y", "description": "Clash", "cost": 1, "price": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "body={body}");

    let (status, _) = srv
        .put(
            &format!("/items/{item_id}"),
            json!({ "code": "", "description": "Renamed", "cost": 1, "price": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    srv.put(&format!("/stock/{other_id}"), json!({ "delta": 1 })).await;
    let (status, body) = srv.delete(&format!("/items/{other_id}")).await;
    assert_eq!(status, StatusCode::CONFLICT, "body={body}");

    let (status, _) = srv.delete(&format!("/items/{item_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = srv.get(&format!("/items/{item_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overflowing_line_is_rejected_without_breaking_the_store() {
    let srv = TestServer::spawn().await;
    let item_id = srv.create_item("X").await;

    let (_, header) = srv
        .post("/purchases/headers", json!({ "supplier_name": "Acme" }))
        .await;
    let id = header["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            "/purchases/details",
            json!({
                "header_id": id,
                "item_id": item_id,
                "quantity": i64::MAX,
                "cost": "79228162514264337593543950335"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body={body}");
    assert_eq!(body["error"], "validation_error");

    let (status, headers) = srv.get("/purchases/headers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.as_array().unwrap().len(), 1);

    let (status, _) = srv
        .post(
            "/purchases/details",
            json!({ "header_id": id, "item_id": item_id, "quantity": 1, "cost": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}
